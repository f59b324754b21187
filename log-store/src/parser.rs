//! Combined access-log grammar with a trailing response time.
//!
//! ```text
//! 10.0.0.1 - - [10/Oct/2023:13:55:36 +0000] "GET /index.html HTTP/1.1" 200 1024 "-" "curl/7.0" 12
//! ```
//!
//! Lines that do not match are not errors; callers drop them.

use std::sync::LazyLock;

use regex::Regex;
use tracing::trace;

use crate::record::LogRecord;

static LOG_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r#"^(?P<ip>\S+) \S+ \S+ \[(?P<timestamp>[^\]]+)\] "#,
        r#""(?P<method>\S+) (?P<endpoint>\S+) \S+" "#,
        r#"(?P<status>\d{3}) (?P<size>\d+) "#,
        r#""(?P<referer>[^"]*)" "#,
        r#""(?P<user_agent>[^"]*)" "#,
        r#"(?P<response_time>\d+)"#,
    ))
    .unwrap_or_else(|e| panic!("log line grammar does not compile: {e}"))
});

/// Parses one line; `None` when it does not follow the grammar.
pub fn parse_line(line: &str) -> Option<LogRecord> {
    let Some(c) = LOG_LINE.captures(line) else {
        trace!(len = line.len(), "line does not match log grammar");
        return None;
    };
    let field = |name: &str| c.name(name).map_or_else(String::new, |m| m.as_str().to_string());

    Some(LogRecord {
        raw: line.to_string(),
        ip: field("ip"),
        timestamp: field("timestamp"),
        request_type: field("method"),
        endpoint: field("endpoint"),
        status: field("status"),
        size: field("size"),
        referer: field("referer"),
        user_agent: field("user_agent"),
        response_time: field("response_time"),
    })
}
