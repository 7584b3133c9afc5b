//! Responder.
//!
//! Formats outbound JSON frames by hand rather than via `serde_json::to_string`
//! of a struct: field presence and ordering are part of the wire contract,
//! and record/error strings arriving from the driver are already JSON text
//! that must be escaped-and-wrapped, never re-decoded.

use crate::client::ClientId;
use crate::protocol::request::{FuncValue, RequestIdValue};

/// What the response body carries beyond `requestId`/`type`/`clientId`.
#[derive(Debug, Clone)]
pub enum ResponseKind {
    /// A plain success ack (connect, disconnect, listen, unlisten).
    Success,
    /// `executeSql` success: number of affected rows.
    SuccessCount(i64),
    /// `query`/`moreQueryResults` success: already-encoded record strings.
    SuccessRecords(Vec<String>),
    /// Any error response.
    Error(String),
    /// Unsolicited LISTEN notification.
    UnsolicitedNotification(String),
    /// Unsolicited connection-lost event.
    UnsolicitedConnectionLost(String),
}

/// Collapses pre-escaped quote runs of the given backslash depth down to a
/// bare quote. Called at depth 7, then 3, then 1, in that order, before the
/// bare quotes left behind are re-escaped once. This ordering is part of the
/// wire contract and must not be reshuffled.
fn collapse_quote_run(s: &str, depth: usize) -> String {
    let pattern = format!("{}{}", "\\".repeat(depth), "\"");
    s.replace(&pattern, "\"")
}

/// Escapes a string that is about to be embedded as a single JSON string
/// value, tolerating record values that are themselves nested JSON blobs up
/// to three levels deep (escape sequences multiply 1 -> 3 -> 7 backslashes).
pub fn escape_value(raw: &str) -> String {
    let mut s = raw.to_string();
    s = collapse_quote_run(&s, 7);
    s = collapse_quote_run(&s, 3);
    s = collapse_quote_run(&s, 1);
    s = s.replace('"', "\\\"");
    s = s.replace('\t', "\\t");
    s = s.replace('\n', "\\n");
    s
}

fn write_request_id(out: &mut String, id: &RequestIdValue) {
    match id {
        RequestIdValue::Id(n) => out.push_str(&n.to_string()),
        RequestIdValue::Missing => out.push_str("\"Missing requestId\""),
    }
}

/// Formats a single response frame for `client_id` in reply to
/// (`request_id`, `func`), with fields in this order:
/// `requestId`, `type`, [`unsolicited`], [`success`], [extra key], `clientId`.
pub fn format_response(
    request_id: &RequestIdValue,
    func: &FuncValue,
    client_id: ClientId,
    kind: &ResponseKind,
) -> String {
    let mut out = String::from("{\"requestId\":");
    write_request_id(&mut out, request_id);
    out.push_str(",\"type\":\"");
    out.push_str(func.as_str());
    out.push('"');

    match kind {
        ResponseKind::Success => {
            out.push_str(",\"success\":true");
        }
        ResponseKind::SuccessCount(count) => {
            out.push_str(",\"success\":true,\"count\":");
            out.push_str(&count.to_string());
        }
        ResponseKind::SuccessRecords(records) => {
            out.push_str(",\"success\":true,\"records\":[");
            for (i, record) in records.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push('"');
                out.push_str(&escape_value(record));
                out.push('"');
            }
            out.push(']');
        }
        ResponseKind::Error(message) => {
            out.push_str(",\"success\":false,\"error\":\"");
            out.push_str(&escape_value(message));
            out.push('"');
        }
        ResponseKind::UnsolicitedNotification(notification) => {
            out.push_str(",\"unsolicited\":true,\"notification\":\"");
            out.push_str(&escape_value(notification));
            out.push('"');
        }
        ResponseKind::UnsolicitedConnectionLost(error) => {
            out.push_str(",\"unsolicited\":true,\"connectionLostError\":\"");
            out.push_str(&escape_value(error));
            out.push('"');
        }
    }

    out.push_str(",\"clientId\":\"");
    out.push_str(&client_id.to_string());
    out.push_str("\"}");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn cid() -> ClientId {
        ClientId::from(Uuid::nil())
    }

    #[test]
    fn success_query_response_has_expected_field_order() {
        let response = format_response(
            &RequestIdValue::Id(2),
            &FuncValue::Known("query".to_string()),
            cid(),
            &ResponseKind::SuccessRecords(vec!["1".to_string()]),
        );
        assert_eq!(
            response,
            format!(
                r#"{{"requestId":2,"type":"query","success":true,"records":["1"],"clientId":"{}"}}"#,
                cid()
            )
        );
    }

    #[test]
    fn error_response_has_success_false_and_error() {
        let response = format_response(
            &RequestIdValue::Id(5),
            &FuncValue::Known("query".to_string()),
            cid(),
            &ResponseKind::Error("Operation NOT allowed since not connected".to_string()),
        );
        assert!(response.contains(r#""success":false"#));
        assert!(response.contains(r#""error":"Operation NOT allowed since not connected""#));
    }

    #[test]
    fn missing_request_id_and_func_use_literal_markers() {
        let response = format_response(
            &RequestIdValue::Missing,
            &FuncValue::Missing,
            cid(),
            &ResponseKind::Error("Invalid session".to_string()),
        );
        assert!(response.starts_with(r#"{"requestId":"Missing requestId","type":"Missing requestType""#));
    }

    #[test]
    fn unsolicited_listen_omits_success() {
        let response = format_response(
            &RequestIdValue::Id(9),
            &FuncValue::Known("listen".to_string()),
            cid(),
            &ResponseKind::UnsolicitedNotification("hello".to_string()),
        );
        assert!(response.contains(r#""unsolicited":true"#));
        assert!(!response.contains("\"success\""));
    }

    #[test]
    fn escape_handles_quotes_tabs_newlines() {
        let raw = "line1\tline2\nsaid \"hi\"";
        let escaped = escape_value(raw);
        assert_eq!(escaped, "line1\\tline2\\nsaid \\\"hi\\\"");
    }

    #[test]
    fn escape_round_trips_three_levels_of_nested_quoting() {
        // Level 1: a literal quote.       "
        // Level 2: escaped once.          \"
        // Level 3: escaped twice more.    \"\"\"\"\"\"\" (7 backslashes + quote)
        let level1 = "\"";
        let level2 = collapse_quote_run(level1, 0); // no-op baseline
        assert_eq!(level2, level1);

        let depth7 = format!("{}{}", "\\".repeat(7), "\"");
        let depth3 = format!("{}{}", "\\".repeat(3), "\"");
        let depth1 = "\\\"";

        assert_eq!(collapse_quote_run(&depth7, 7), "\"");
        assert_eq!(collapse_quote_run(&depth3, 3), "\"");
        assert_eq!(collapse_quote_run(depth1, 1), "\"");

        // Full pipeline: nested JSON blob containing a depth-7 run collapses
        // down to a single escaped quote in the final output.
        let nested = format!("value:{}", depth7);
        let escaped = escape_value(&nested);
        assert_eq!(escaped, "value:\\\"");
    }
}
