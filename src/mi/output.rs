//! gdb/mi output records parser.
use crate::engine::error::Error;
use crate::mi::ResultClass;
use chumsky::prelude::*;
use chumsky::Parser;
use itertools::Itertools;

type Err<'a> = extra::Err<Rich<'a, char>>;

/// Value part of a `variable=value` result.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Const(String),
    Tuple(Vec<(String, Value)>),
    List(Vec<Value>),
    ResultList(Vec<(String, Value)>),
}

impl Value {
    pub fn as_const(&self) -> Option<&str> {
        match self {
            Value::Const(s) => Some(s),
            _ => None,
        }
    }

    /// Field of a tuple or of a list of results.
    pub fn get(&self, name: &str) -> Option<&Value> {
        match self {
            Value::Tuple(results) | Value::ResultList(results) => find(results, name),
            _ => None,
        }
    }
}

pub fn find<'r>(results: &'r [(String, Value)], name: &str) -> Option<&'r Value> {
    results
        .iter()
        .find(|(variable, _)| variable == name)
        .map(|(_, value)| value)
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum AsyncKind {
    /// `*` - execution state changes.
    Exec,
    /// `+` - progress of slow operations.
    Status,
    /// `=` - supplementary information.
    Notify,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum StreamKind {
    Console,
    Target,
    Log,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Record {
    Result {
        token: Option<u64>,
        class: ResultClass,
        results: Vec<(String, Value)>,
    },
    Async {
        token: Option<u64>,
        kind: AsyncKind,
        class: String,
        results: Vec<(String, Value)>,
    },
    Stream {
        kind: StreamKind,
        text: String,
    },
    Prompt,
}

fn char_bytes(c: char) -> Vec<u8> {
    c.to_string().into_bytes()
}

/// C string as printed by gdb. Bytes outside of ASCII come as octal escapes,
/// so the content is decoded as bytes first.
fn c_string<'a>() -> impl Parser<'a, &'a str, String, Err<'a>> + Clone {
    let octal = one_of("01234567")
        .repeated()
        .at_least(1)
        .at_most(3)
        .to_slice()
        .try_map(|digits: &str, span| {
            u8::from_str_radix(digits, 8)
                .map(|byte| vec![byte])
                .map_err(|e| Rich::custom(span, e))
        });
    let escape = just('\\').ignore_then(octal.or(any().map(|c: char| match c {
        'n' => vec![b'\n'],
        't' => vec![b'\t'],
        'r' => vec![b'\r'],
        'a' => vec![0x07],
        'b' => vec![0x08],
        'e' => vec![0x1b],
        'f' => vec![0x0c],
        'v' => vec![0x0b],
        other => char_bytes(other),
    })));

    none_of("\\\"")
        .map(char_bytes)
        .or(escape)
        .repeated()
        .collect::<Vec<_>>()
        .map(|chunks| String::from_utf8_lossy(&chunks.concat()).into_owned())
        .delimited_by(just('"'), just('"'))
        .labelled("c-string")
}

fn variable<'a>() -> impl Parser<'a, &'a str, String, Err<'a>> + Clone {
    any()
        .filter(|c: &char| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
        .repeated()
        .at_least(1)
        .to_slice()
        .map(|s: &str| s.to_string())
        .labelled("variable")
}

fn value<'a>() -> impl Parser<'a, &'a str, Value, Err<'a>> + Clone {
    recursive(|value| {
        let result = variable().then_ignore(just('=')).then(value.clone());

        let tuple = result
            .clone()
            .separated_by(just(','))
            .collect::<Vec<_>>()
            .delimited_by(just('{'), just('}'))
            .map(Value::Tuple);

        let results_list = result
            .separated_by(just(','))
            .at_least(1)
            .collect::<Vec<_>>()
            .map(Value::ResultList);
        let values_list = value
            .separated_by(just(','))
            .collect::<Vec<_>>()
            .map(Value::List);
        let list = results_list
            .or(values_list)
            .delimited_by(just('['), just(']'));

        choice((c_string().map(Value::Const), tuple, list))
    })
}

fn results<'a>() -> impl Parser<'a, &'a str, Vec<(String, Value)>, Err<'a>> + Clone {
    just(',')
        .ignore_then(variable().then_ignore(just('=')).then(value()))
        .repeated()
        .collect::<Vec<_>>()
}

fn token<'a>() -> impl Parser<'a, &'a str, Option<u64>, Err<'a>> + Clone {
    text::int(10)
        .try_map(|s: &str, span| s.parse::<u64>().map_err(|e| Rich::custom(span, e)))
        .or_not()
}

fn result_class<'a>() -> impl Parser<'a, &'a str, ResultClass, Err<'a>> + Clone {
    choice((
        just("done").to(ResultClass::Done),
        just("running").to(ResultClass::Running),
        just("connected").to(ResultClass::Connected),
        just("error").to(ResultClass::Error),
        just("exit").to(ResultClass::Exit),
    ))
    .labelled("result class")
}

fn record<'a>() -> impl Parser<'a, &'a str, Record, Err<'a>> {
    let result_record = token()
        .then_ignore(just('^'))
        .then(result_class())
        .then(results())
        .map(|((token, class), results)| Record::Result {
            token,
            class,
            results,
        });

    let async_kind = choice((
        just('*').to(AsyncKind::Exec),
        just('+').to(AsyncKind::Status),
        just('=').to(AsyncKind::Notify),
    ));
    let async_record = token()
        .then(async_kind)
        .then(variable())
        .then(results())
        .map(|(((token, kind), class), results)| Record::Async {
            token,
            kind,
            class,
            results,
        });

    let stream_kind = choice((
        just('~').to(StreamKind::Console),
        just('@').to(StreamKind::Target),
        just('&').to(StreamKind::Log),
    ));
    let stream_record = stream_kind
        .then(c_string())
        .map(|(kind, text)| Record::Stream { kind, text });

    let prompt = just("(gdb)").padded().to(Record::Prompt);

    choice((result_record, async_record, stream_record, prompt)).then_ignore(end())
}

/// Parse a single line of gdb/mi output.
pub fn parse_record(line: &str) -> Result<Record, Error> {
    record()
        .parse(line.trim_end())
        .into_result()
        .map_err(|errors| {
            let reason = errors.iter().map(ToString::to_string).join("; ");
            Error::MiParse(line.to_string(), reason)
        })
}
