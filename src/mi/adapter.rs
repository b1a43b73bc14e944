use crate::engine::error::Error;
use crate::mi::{MiResponse, MiSession, ResultClass, Value};
use log::Level;

/// Tracing level of a single gdb/mi exchange.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub enum Verbosity {
    /// Traffic goes to the debug log.
    #[default]
    Quiet,
    /// Traffic is always shown.
    Noisy,
}

impl Verbosity {
    fn level(self) -> Level {
        match self {
            Verbosity::Quiet => Level::Debug,
            Verbosity::Noisy => Level::Info,
        }
    }
}

/// Expected shape of an evaluated expression.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Expect {
    Str,
    Int,
}

/// Outcome of an expression evaluation.
#[derive(Clone, Debug, PartialEq)]
pub enum Evaluation {
    Str(String),
    Int(i64),
    /// gdb refused to evaluate the expression.
    Error(String),
}

const TRACE_LIMIT: usize = 300;

/// Typed requests over a gdb/mi session.
pub struct Gdb<S: MiSession> {
    session: S,
    verbosity: Verbosity,
}

impl<S: MiSession> Gdb<S> {
    pub fn new(session: S, verbosity: Verbosity) -> Self {
        Self { session, verbosity }
    }

    pub fn session_mut(&mut self) -> &mut S {
        &mut self.session
    }

    /// Send a command traced at the session verbosity.
    pub fn send(&mut self, command: &str, args: &[&str]) -> Result<MiResponse, Error> {
        self.send_with(self.verbosity, command, args)
    }

    /// Send a command whose traffic is shown whatever the session verbosity is.
    pub fn send_noisy(&mut self, command: &str, args: &[&str]) -> Result<MiResponse, Error> {
        self.send_with(Verbosity::Noisy, command, args)
    }

    pub fn send_with(
        &mut self,
        verbosity: Verbosity,
        command: &str,
        args: &[&str],
    ) -> Result<MiResponse, Error> {
        let level = verbosity.level();
        log::log!(target: "gdb", level, "rewind -> gdb: {}", command_line(command, args));

        let response = self.session.send(command, args)?;

        if log::log_enabled!(target: "gdb", level) {
            let mut text = format!("^{} {:?}", response.class, response.results);
            if text.len() > TRACE_LIMIT {
                let cut = (0..=TRACE_LIMIT)
                    .rev()
                    .find(|&idx| text.is_char_boundary(idx))
                    .unwrap_or(0);
                text.truncate(cut);
                text.push_str("...");
            }
            log::log!(target: "gdb", level, "gdb -> rewind: {text}");
        }
        Ok(response)
    }

    /// Evaluate an expression and return gdb's printed value.
    /// Any result class but `done` means gdb or our expectations about it are broken.
    pub fn evaluate_raw(&mut self, expression: &str) -> Result<String, Error> {
        let response = self.send("data-evaluate-expression", &[expression])?;
        let command = command_line("data-evaluate-expression", &[expression]);
        if response.class != ResultClass::Done {
            return Err(Error::MiNotDone(command, response.class));
        }
        value_field(&response, command)
    }

    /// Evaluate an expression of C string type.
    pub fn evaluate_string(&mut self, expression: &str) -> Result<String, Error> {
        parse_string_response(&self.evaluate_raw(expression)?)
    }

    /// Evaluate an expression of integer type.
    pub fn evaluate_int(&mut self, expression: &str) -> Result<i64, Error> {
        let raw = self.evaluate_raw(expression)?;
        raw.trim()
            .parse::<i64>()
            .map_err(|e| Error::IntResponse(expression.to_string(), e))
    }

    /// Evaluate an expression that gdb may legitimately refuse (symbol out of scope and the like).
    pub fn evaluate(&mut self, expression: &str, expect: Expect) -> Result<Evaluation, Error> {
        let response = self.send("data-evaluate-expression", &[expression])?;
        let command = command_line("data-evaluate-expression", &[expression]);
        match response.class {
            ResultClass::Done => {
                let raw = value_field(&response, command)?;
                match expect {
                    Expect::Str => parse_string_response(&raw).map(Evaluation::Str),
                    Expect::Int => raw
                        .trim()
                        .parse::<i64>()
                        .map(Evaluation::Int)
                        .map_err(|e| Error::IntResponse(expression.to_string(), e)),
                }
            }
            ResultClass::Error => Ok(Evaluation::Error(
                response.error_message().unwrap_or_default().to_string(),
            )),
            class => Err(Error::MiNotDone(command, class)),
        }
    }
}

fn command_line(command: &str, args: &[&str]) -> String {
    if args.is_empty() {
        command.to_string()
    } else {
        format!("{command} {}", args.join(" "))
    }
}

fn value_field(response: &MiResponse, command: String) -> Result<String, Error> {
    response
        .get("value")
        .and_then(Value::as_const)
        .map(ToString::to_string)
        .ok_or(Error::MiMissingField(command, "value"))
}

/// Extract the contents of a printed `char *`, like `0x7f261d8624e8 "some string here"`.
/// An empty string is printed as `0x7f44a33a9c1e ""`.
pub(crate) fn parse_string_response(response: &str) -> Result<String, Error> {
    match (response.find('"'), response.rfind('"')) {
        (Some(first), Some(last)) if first != last => Ok(unquote(&response[first + 1..last])),
        _ => Err(Error::StringResponse(response.to_string())),
    }
}

/// Collapse every `\"` into `"`, everything else is kept as is.
pub fn unquote(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\' && chars.peek() == Some(&'"') {
            continue;
        }
        result.push(c);
    }
    result
}

#[cfg(test)]
mod test {
    use super::*;
    use std::collections::VecDeque;

    /// Replays canned responses and records sent commands.
    #[derive(Default)]
    struct Canned {
        sent: Vec<String>,
        responses: VecDeque<MiResponse>,
    }

    impl MiSession for Canned {
        fn send(&mut self, command: &str, args: &[&str]) -> Result<MiResponse, Error> {
            self.sent.push(command_line(command, args));
            self.responses.pop_front().ok_or(Error::MiClosed)
        }
    }

    fn gdb(responses: Vec<MiResponse>) -> Gdb<Canned> {
        Gdb::new(
            Canned {
                sent: vec![],
                responses: responses.into(),
            },
            Verbosity::Quiet,
        )
    }

    fn done_value(value: &str) -> MiResponse {
        MiResponse::new(
            ResultClass::Done,
            vec![("value".to_string(), Value::Const(value.to_string()))],
        )
    }

    #[test]
    fn test_unquote() {
        struct TestCase {
            input: &'static str,
            expected: &'static str,
        }
        let cases = [
            TestCase {
                input: r#"He said \"hi\""#,
                expected: r#"He said "hi""#,
            },
            TestCase {
                input: "",
                expected: "",
            },
            TestCase {
                input: "plain",
                expected: "plain",
            },
            TestCase {
                input: r"C:\path\to",
                expected: r"C:\path\to",
            },
            TestCase {
                input: r#"trailing\"#,
                expected: r#"trailing\"#,
            },
        ];
        for tc in cases {
            assert_eq!(unquote(tc.input), tc.expected);
        }
    }

    #[test]
    fn test_parse_string_response() {
        assert_eq!(
            parse_string_response(r#"0x7f261d8624e8 "some string here""#).unwrap(),
            "some string here"
        );
        assert_eq!(parse_string_response(r#"0x7f44a33a9c1e """#).unwrap(), "");
        assert_eq!(
            parse_string_response(r#"0x1 "<response status=\"break\"/>""#).unwrap(),
            r#"<response status="break"/>"#
        );

        for bad in ["0x0", r#"0x1 "half"#, ""] {
            assert!(matches!(
                parse_string_response(bad),
                Err(Error::StringResponse(s)) if s == bad
            ));
        }
    }

    #[test]
    fn test_evaluate_string_and_int() {
        let mut gdb = gdb(vec![
            done_value(r#"0x55d1 "index.php""#),
            done_value("3"),
        ]);
        assert_eq!(gdb.evaluate_string("filename").unwrap(), "index.php");
        assert_eq!(gdb.evaluate_int("level").unwrap(), 3);
        assert_eq!(
            gdb.session.sent,
            vec![
                "data-evaluate-expression filename",
                "data-evaluate-expression level"
            ]
        );
    }

    #[test]
    fn test_evaluate_failures_are_fatal() {
        let mut gdb = gdb(vec![
            MiResponse::new(ResultClass::Error, vec![]),
            MiResponse::new(ResultClass::Done, vec![]),
            done_value("not a number"),
        ]);

        let err = gdb.evaluate_raw("level").unwrap_err();
        assert!(matches!(err, Error::MiNotDone(_, ResultClass::Error)));
        assert!(err.is_fatal());

        let err = gdb.evaluate_raw("level").unwrap_err();
        assert!(matches!(err, Error::MiMissingField(_, "value")));
        assert!(err.is_fatal());

        let err = gdb.evaluate_int("level").unwrap_err();
        assert!(matches!(err, Error::IntResponse(ref expr, _) if expr == "level"));
        assert!(err.is_fatal());

        let err = gdb.evaluate_raw("level").unwrap_err();
        assert!(matches!(err, Error::MiClosed));
    }

    #[test]
    fn test_evaluate_tolerates_gdb_errors() {
        let mut gdb = gdb(vec![
            MiResponse::new(
                ResultClass::Error,
                vec![(
                    "msg".to_string(),
                    Value::Const("No symbol \"level\" in current context.".to_string()),
                )],
            ),
            done_value("12"),
        ]);
        assert_eq!(
            gdb.evaluate("level", Expect::Int).unwrap(),
            Evaluation::Error("No symbol \"level\" in current context.".to_string())
        );
        assert_eq!(
            gdb.evaluate("level", Expect::Int).unwrap(),
            Evaluation::Int(12)
        );
    }
}
