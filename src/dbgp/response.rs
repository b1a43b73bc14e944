//! DBGp xml payloads.

use crate::engine::error::Error;
use std::fmt::{Display, Write};

pub const NAMESPACE: &str = "urn:debugger_protocol_v1";
pub const XDEBUG_NAMESPACE: &str = "http://xdebug.org/dbgp/xdebug";

/// Builder of a `<response>` element answering a single command.
#[derive(Clone, Debug)]
pub struct Response {
    attrs: Vec<(&'static str, String)>,
    body: String,
}

impl Response {
    pub fn new(command: &str, seq_num: u32) -> Self {
        Self {
            attrs: vec![
                ("command", escape(command)),
                ("transaction_id", seq_num.to_string()),
            ],
            body: String::new(),
        }
    }

    pub fn attr(mut self, name: &'static str, value: impl Display) -> Self {
        self.attrs.push((name, escape(&value.to_string())));
        self
    }

    /// Append raw xml as a child.
    pub fn child(mut self, xml: &str) -> Self {
        self.body.push_str(xml);
        self
    }

    pub fn render(&self) -> String {
        let mut xml = format!(r#"<response xmlns="{NAMESPACE}" xmlns:xdebug="{XDEBUG_NAMESPACE}""#);
        for (name, value) in &self.attrs {
            _ = write!(xml, r#" {name}="{value}""#);
        }
        if self.body.is_empty() {
            xml.push_str("/>");
        } else {
            _ = write!(xml, ">{}</response>", self.body);
        }
        xml
    }
}

/// Error response for a recoverable failure.
pub fn error(command: &str, seq_num: u32, err: &Error) -> String {
    Response::new(command, seq_num)
        .child(&format!(
            r#"<error code="{}"><message>{}</message></error>"#,
            err.dbgp_code(),
            cdata(&err.to_string())
        ))
        .render()
}

/// Session description sent right after connecting to the IDE.
pub struct Init<'a> {
    pub fileuri: &'a str,
    pub idekey: &'a str,
    pub appid: u32,
    pub language_version: &'a str,
}

impl Init<'_> {
    pub fn render(&self) -> String {
        format!(
            concat!(
                r#"<init xmlns="{ns}" xmlns:xdebug="{xns}" fileuri="{fileuri}" language="PHP" "#,
                r#"xdebug:language_version="{lang}" protocol_version="1.0" appid="{appid}" idekey="{idekey}">"#,
                r#"<engine version="{version}">{engine}</engine>"#,
                "</init>"
            ),
            ns = NAMESPACE,
            xns = XDEBUG_NAMESPACE,
            fileuri = escape(self.fileuri),
            lang = escape(self.language_version),
            appid = self.appid,
            idekey = escape(self.idekey),
            version = env!("CARGO_PKG_VERSION"),
            engine = cdata(env!("CARGO_PKG_NAME")),
        )
    }
}

/// Escape text for an xml attribute or element.
pub fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            c => escaped.push(c),
        }
    }
    escaped
}

pub fn cdata(text: &str) -> String {
    format!("<![CDATA[{}]]>", text.replace("]]>", "]]]]><![CDATA[>"))
}

/// Drop the xml declaration, if any, from a payload produced elsewhere.
pub fn strip_declaration(xml: &str) -> &str {
    let trimmed = xml.trim_start();
    if trimmed.starts_with("<?xml") {
        if let Some(end) = trimmed.find("?>") {
            return trimmed[end + 2..].trim_start();
        }
    }
    trimmed
}
