use rewind_dbgp::dbgp::packet::{frame, read_packet};
use rewind_dbgp::dbgp::DbgpTransport;
use rewind_dbgp::engine::error::Error;
use rewind_dbgp::engine::notify::{StopEvent, StopNotifier};
use rewind_dbgp::engine::{Session, SessionOptions, Status};
use rewind_dbgp::mi::{Gdb, MiResponse, MiSession, ResultClass, Value, Verbosity};
use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::io::Cursor;
use std::rc::Rc;

/// gdb attached to a replay of a PHP script.
struct FakeGdb {
    notifier: StopNotifier,
    /// Stops reported for consecutive continues.
    stops: VecDeque<&'static str>,
    /// PHP stack level at the break location.
    level: i64,
    /// Execution is stopped inside the break location frame, `level` and friends are in scope.
    in_php_frame: bool,
    /// What the replayed runtime answers to forwarded commands, as printed by gdb.
    xdebug_answer: &'static str,
    next_breakpoint: u32,
    sent: Rc<RefCell<Vec<String>>>,
}

impl MiSession for FakeGdb {
    fn send(&mut self, command: &str, args: &[&str]) -> Result<MiResponse, Error> {
        self.sent
            .borrow_mut()
            .push(format!("{command} {}", args.join(" ")).trim_end().to_string());

        let done = |results: Vec<(&str, Value)>| {
            MiResponse::new(
                ResultClass::Done,
                results
                    .into_iter()
                    .map(|(name, value)| (name.to_string(), value))
                    .collect(),
            )
        };
        let constant = |s: &str| Value::Const(s.to_string());

        let response = match command {
            "exec-continue" => {
                if let Some(id) = self.stops.pop_front() {
                    self.notifier.notify(StopEvent::new(id));
                }
                MiResponse::new(ResultClass::Running, vec![])
            }
            "break-insert" => {
                let number = self.next_breakpoint.to_string();
                self.next_breakpoint += 1;
                done(vec![(
                    "bkpt",
                    Value::Tuple(vec![("number".to_string(), constant(&number))]),
                )])
            }
            "data-evaluate-expression" => match args[0] {
                "level" | "filename" | "lineno" if !self.in_php_frame => MiResponse::new(
                    ResultClass::Error,
                    vec![("msg".to_string(), constant("No symbol \"level\" in current context."))],
                ),
                "level" => done(vec![("value", constant(&self.level.to_string()))]),
                "filename" => done(vec![("value", constant(r#"0x55d1 "/srv/index.php""#))]),
                "lineno" => done(vec![("value", constant("7"))]),
                expr if expr.starts_with("dontbug_xdebug_cmd(") => {
                    done(vec![("value", constant(self.xdebug_answer))])
                }
                _ => MiResponse::new(
                    ResultClass::Error,
                    vec![("msg".to_string(), constant("No symbol in current context."))],
                ),
            },
            _ => done(vec![]),
        };
        Ok(response)
    }
}

/// IDE sending scripted commands and decoding every packet it gets.
struct FakeIde {
    commands: VecDeque<&'static str>,
    packets: Rc<RefCell<Vec<String>>>,
}

impl DbgpTransport for FakeIde {
    fn read_command(&mut self) -> Result<Option<String>, Error> {
        Ok(self.commands.pop_front().map(ToString::to_string))
    }

    fn write_packet(&mut self, payload: &str) -> Result<(), Error> {
        let mut reader = Cursor::new(frame(payload));
        let decoded = read_packet(&mut reader)?.ok_or(Error::MiClosed)?;
        self.packets.borrow_mut().push(decoded);
        Ok(())
    }
}

struct Harness {
    session: Session<FakeGdb, FakeIde>,
    sent: Rc<RefCell<Vec<String>>>,
    packets: Rc<RefCell<Vec<String>>>,
}

struct Scenario {
    commands: Vec<&'static str>,
    stops: Vec<&'static str>,
    level: i64,
    in_php_frame: bool,
    xdebug_answer: &'static str,
    reverse: bool,
}

impl Default for Scenario {
    fn default() -> Self {
        Self {
            commands: vec![],
            stops: vec![],
            level: 0,
            in_php_frame: true,
            xdebug_answer: r#"0x1 "<response command=\"stack_get\" transaction_id=\"5\"/>""#,
            reverse: false,
        }
    }
}

impl Scenario {
    fn build(self) -> Harness {
        let notifier = StopNotifier::new();
        let sent = Rc::new(RefCell::new(vec![]));
        let packets = Rc::new(RefCell::new(vec![]));

        let gdb = FakeGdb {
            notifier: notifier.clone(),
            stops: self.stops.into(),
            level: self.level,
            in_php_frame: self.in_php_frame,
            xdebug_answer: self.xdebug_answer,
            next_breakpoint: 2,
            sent: sent.clone(),
        };
        let ide = FakeIde {
            commands: self.commands.into(),
            packets: packets.clone(),
        };
        let options = SessionOptions {
            entry_file: "/srv/index.php".to_string(),
            idekey: "rewind".to_string(),
            break_source: "dontbug_break.c".to_string(),
            source_map: HashMap::from([
                ("/srv/index.php".to_string(), 10),
                ("/srv/lib.php".to_string(), 500),
            ]),
            reverse: self.reverse,
        };

        Harness {
            session: Session::new(Gdb::new(gdb, Verbosity::Quiet), ide, notifier, options),
            sent,
            packets,
        }
    }
}

impl Harness {
    fn packets(&self) -> Vec<String> {
        self.packets.borrow().clone()
    }

    fn sent(&self) -> Vec<String> {
        self.sent.borrow().clone()
    }
}

#[test]
fn test_temporary_breakpoint_scenario() {
    let mut harness = Scenario {
        commands: vec![
            "breakpoint_set -i 1 -t line -f file:///srv/index.php -n 7 -r 1",
            "run -i 2",
            "breakpoint_get -i 3 -d 2",
            "stop -i 4",
        ],
        stops: vec!["2"],
        ..Scenario::default()
    }
    .build();

    harness.session.run().unwrap();
    assert_eq!(harness.session.status(), Status::Stopped);
    assert!(harness.session.breakpoints().is_empty());

    let packets = harness.packets();
    assert_eq!(packets.len(), 5);
    assert!(packets[0].starts_with("<init "));
    assert!(packets[0].contains(r#"fileuri="file:///srv/index.php""#));
    assert!(packets[0].contains(r#"idekey="rewind""#));

    assert!(packets[1].contains(r#"command="breakpoint_set" transaction_id="1" state="enabled" id="2""#));
    assert!(packets[2].contains(r#"command="run" transaction_id="2" status="break" reason="ok""#));
    assert!(packets[2].contains(
        r#"<xdebug:message filename="file:///srv/index.php" lineno="7"></xdebug:message>"#
    ));
    assert!(packets[3].contains(r#"<error code="205">"#));
    assert!(packets[4].contains(r#"command="stop" transaction_id="4" status="stopped" reason="ok""#));

    let sent = harness.sent();
    assert_eq!(sent[0], "break-insert -f -t dontbug_break.c:17");
    assert_eq!(sent[1], "exec-continue");
}

#[test]
fn test_reverse_run() {
    let mut harness = Scenario {
        commands: vec!["run -i 1 -z 1", "run -i 2"],
        stops: vec!["no-history", "signal-received"],
        ..Scenario::default()
    }
    .build();
    harness.session.run().unwrap();

    let continues: Vec<_> = harness
        .sent()
        .into_iter()
        .filter(|cmd| cmd.starts_with("exec-continue"))
        .collect();
    assert_eq!(continues, vec!["exec-continue --reverse", "exec-continue"]);

    let packets = harness.packets();
    assert!(packets[1].contains(r#"command="run" transaction_id="1" status="break""#));
    assert!(packets[2].contains(r#"command="run" transaction_id="2" status="break""#));
}

#[test]
fn test_ambient_reverse_steps() {
    struct TestCase {
        command: &'static str,
        expected: Vec<&'static str>,
    }
    let cases = vec![
        TestCase {
            command: "step_into -i 1",
            expected: vec![
                "break-enable 1",
                "exec-continue --reverse",
                "break-disable 1",
            ],
        },
        TestCase {
            command: "step_over -i 1",
            expected: vec![
                "data-evaluate-expression level",
                "break-condition 1 level <= 3",
                "break-enable 1",
                "exec-continue --reverse",
                "break-disable 1",
                "break-condition 1",
            ],
        },
        TestCase {
            command: "step_out -i 1 -z 0",
            expected: vec![
                "data-evaluate-expression level",
                "break-condition 1 level < 3",
                "break-enable 1",
                "exec-continue",
                "break-disable 1",
                "break-condition 1",
            ],
        },
    ];

    for tc in cases {
        let mut harness = Scenario {
            commands: vec![tc.command],
            stops: vec!["1"],
            level: 3,
            reverse: true,
            ..Scenario::default()
        }
        .build();
        harness.session.run().unwrap();

        let sent: Vec<_> = harness
            .sent()
            .into_iter()
            .filter(|cmd| !cmd.starts_with("data-evaluate-expression filename"))
            .filter(|cmd| !cmd.starts_with("data-evaluate-expression lineno"))
            .collect();
        assert_eq!(sent, tc.expected, "{}", tc.command);
        assert_eq!(harness.session.status(), Status::Break);
        assert!(harness.packets()[1].contains(r#"status="break""#));
    }
}

#[test]
fn test_breakpoint_management() {
    let mut harness = Scenario {
        commands: vec![
            "breakpoint_set -i 1 -t line -f file:///srv/lib.php -n 3 -s disabled",
            "breakpoint_set -i 2 -t line -f file:///srv/index.php -n 9 -h 4",
            "breakpoint_set -i 3 -t line -f file:///srv/other.php -n 1",
            "breakpoint_set -i 4 -t watch -f file:///srv/index.php -n 1",
            "breakpoint_update -i 5 -d 2 -s enabled",
            "breakpoint_list -i 6",
            "breakpoint_remove -i 7 -d 3",
            "breakpoint_remove -i 8 -d 3",
            "breakpoint_update -i 9 -d 3 -n 12",
        ],
        ..Scenario::default()
    }
    .build();
    harness.session.run().unwrap();

    let packets = harness.packets();
    assert!(packets[1].contains(r#"state="disabled" id="2""#));
    assert!(packets[2].contains(r#"state="enabled" id="3""#));
    assert!(packets[3].contains(r#"<error code="200">"#));
    assert!(packets[4].contains(r#"<error code="201">"#));
    assert!(!packets[5].contains("<error"));
    assert!(packets[6].contains(
        r#"<breakpoint id="2" type="line" state="enabled" filename="file:///srv/lib.php" lineno="3" temporary="0"/>"#
    ));
    assert!(packets[6].contains(r#"<breakpoint id="3" type="line" state="enabled" filename="file:///srv/index.php" lineno="9" temporary="0" hit_value="4"/>"#));
    assert!(!packets[7].contains("<error"));
    assert!(packets[8].contains(r#"<error code="205">"#));
    assert!(packets[9].contains(r#"<error code="3">"#));

    let sent = harness.sent();
    assert_eq!(
        sent,
        vec![
            "break-insert -f -d dontbug_break.c:503",
            "break-insert -f -i 3 dontbug_break.c:19",
            "break-enable 2",
            "break-delete 3",
        ]
    );
    assert_eq!(harness.session.breakpoints().len(), 1);
}

#[test]
fn test_forwarded_commands() {
    let mut harness = Scenario {
        commands: vec![
            "stack_get -i 1",
            "run -i 2",
            "stack_depth -i 3",
            "stack_get -i 4 -d 2",
            "stack_get -i 5 -d 1",
        ],
        stops: vec!["1"],
        level: 1,
        ..Scenario::default()
    }
    .build();
    harness.session.run().unwrap();

    let packets = harness.packets();
    // nothing to inspect before the replay reaches a PHP line
    assert!(packets[1].contains(r#"<error code="5">"#));
    assert!(packets[3].contains(r#"command="stack_depth" transaction_id="3" depth="2""#));
    assert!(packets[4].contains(r#"<error code="301">"#));
    assert_eq!(
        packets[5],
        r#"<response command="stack_get" transaction_id="5"/>"#
    );

    let forwarded = harness
        .sent()
        .into_iter()
        .find(|cmd| cmd.contains("dontbug_xdebug_cmd"))
        .unwrap();
    assert_eq!(
        forwarded,
        r#"data-evaluate-expression dontbug_xdebug_cmd("stack_get -i 5 -d 1")"#
    );
}

#[test]
fn test_malformed_forward_answer_is_fatal() {
    let mut harness = Scenario {
        commands: vec!["run -i 1", "context_names -i 2", "status -i 3"],
        stops: vec!["1"],
        xdebug_answer: "0x0",
        ..Scenario::default()
    }
    .build();

    let err = harness.session.run().unwrap_err();
    assert!(err.is_fatal());
    assert!(matches!(
        err,
        Error::Forward(ref cmd, ref cause) if cmd == "context_names -i 2" && matches!(**cause, Error::StringResponse(_))
    ));
    assert_eq!(harness.packets().len(), 2);
}

#[test]
fn test_end_of_recording() {
    let mut harness = Scenario {
        commands: vec!["run -i 1", "status -i 2", "run -i 3", "run -i 4 -z 1", "detach -i 5"],
        stops: vec!["exited-normally", "2"],
        ..Scenario::default()
    }
    .build();
    harness.session.run().unwrap();

    let packets = harness.packets();
    assert!(packets[1].contains(r#"command="run" transaction_id="1" status="stopping""#));
    assert!(!packets[1].contains("xdebug:message"));
    assert!(packets[2].contains(r#"status="stopping" reason="ok""#));
    assert!(packets[3].contains(r#"<error code="5">"#));
    assert!(packets[4].contains(r#"command="run" transaction_id="4" status="break""#));
    assert!(packets[5].contains(r#"status="stopped""#));
}

#[test]
fn test_features_and_closed_connection() {
    let mut harness = Scenario {
        commands: vec![
            "feature_get -i 1 -n language_name",
            "feature_get -i 2 -n notify_ok",
            "feature_set -i 3 -n max_depth -v 3",
            "feature_set -i 4 -n language_name -v Hack",
            "feature_get -i 5 -n max_depth",
            "feature_get -i 6 -n unknown",
            "feature_set -i 7 -n max_depth",
            "property_set -i 8 -n $a -- MQ==",
        ],
        ..Scenario::default()
    }
    .build();

    // the IDE goes away without stop
    harness.session.run().unwrap();
    assert_eq!(harness.session.status(), Status::Starting);
    assert_eq!(harness.session.last_sequence_num(), 8);

    let packets = harness.packets();
    assert!(packets[1].contains(r#"feature_name="language_name" supported="1"><![CDATA[PHP]]>"#));
    assert!(packets[2].contains(r#"supported="1"><![CDATA[0]]>"#));
    assert!(packets[3].contains(r#"feature="max_depth" success="1""#));
    assert!(packets[4].contains(r#"feature="language_name" success="0""#));
    assert!(packets[5].contains("<![CDATA[3]]>"));
    assert!(packets[6].contains(r#"supported="0""#));
    assert!(packets[7].contains(r#"<error code="3">"#));
    assert!(packets[8].contains(r#"<error code="4">"#));
    assert!(harness.sent().is_empty());
}

#[test]
fn test_step_outside_php_frame() {
    struct TestCase {
        commands: Vec<&'static str>,
        stops: Vec<&'static str>,
        expected_continue: &'static str,
    }
    let cases = vec![
        // before the first PHP line
        TestCase {
            commands: vec!["step_over -i 1"],
            stops: vec!["1"],
            expected_continue: "exec-continue",
        },
        // back from the end of the recording
        TestCase {
            commands: vec!["run -i 1", "step_out -i 2 -z 1"],
            stops: vec!["exited-normally", "1"],
            expected_continue: "exec-continue --reverse",
        },
    ];

    for tc in cases {
        let last = tc.commands.len();
        let mut harness = Scenario {
            commands: tc.commands,
            stops: tc.stops,
            in_php_frame: false,
            ..Scenario::default()
        }
        .build();
        harness.session.run().unwrap();

        let packets = harness.packets();
        assert!(!packets[last].contains("<error"), "{}", packets[last]);
        assert!(packets[last].contains(r#"status="break""#));
        assert!(!packets[last].contains("xdebug:message"));

        // no level condition, the step stops at whatever line comes next
        let sent = harness.sent();
        assert!(!sent.iter().any(|cmd| cmd.starts_with("break-condition")));
        let enable = sent.iter().position(|cmd| cmd == "break-enable 1").unwrap();
        assert_eq!(sent[enable + 1], tc.expected_continue);
        assert_eq!(sent[enable + 2], "break-disable 1");
        assert_eq!(harness.session.status(), Status::Break);
    }
}

#[test]
fn test_breakpoint_line_overflow() {
    let mut harness = Scenario {
        commands: vec!["breakpoint_set -i 1 -t line -f file:///srv/index.php -n 4294967295"],
        ..Scenario::default()
    }
    .build();
    harness.session.run().unwrap();

    assert!(harness.packets()[1].contains(r#"<error code="3">"#));
    assert!(harness.sent().is_empty());
}
