//! Request Decoder.
//!
//! Parses an inbound WebSocket text frame into a tagged [`DecodedRequest`].
//! A hand-rolled `serde_json::Value` walk is used instead of a derived,
//! internally-tagged enum because unknown/malformed `func` values must
//! decode to `Unknown` rather than fail deserialization outright.

use serde_json::Value;

use crate::db::ConnectRequest;

/// The `requestId` field as it will be echoed in the response. A missing
/// `requestId` is replaced by the literal string `"Missing requestId"`
/// rather than a number.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestIdValue {
    Id(i64),
    Missing,
}

/// The `func` field, echoed back as the response's `type`. A missing `func`
/// is replaced by the literal string `"Missing requestType"`.
#[derive(Debug, Clone, PartialEq)]
pub enum FuncValue {
    Known(String),
    Missing,
}

impl FuncValue {
    pub fn as_str(&self) -> &str {
        match self {
            FuncValue::Known(s) => s.as_str(),
            FuncValue::Missing => "Missing requestType",
        }
    }
}

/// Common envelope fields present (or defaulted) on every inbound frame.
#[derive(Debug, Clone)]
pub struct Envelope {
    pub request_id: RequestIdValue,
    pub func: FuncValue,
    pub session_id: Option<String>,
    pub raw: String,
}

#[derive(Debug, Clone)]
pub enum DecodedRequest {
    Connect {
        envelope: Envelope,
        connect: ConnectRequest,
    },
    Disconnect {
        envelope: Envelope,
        discard_connection: bool,
    },
    Query {
        envelope: Envelope,
        sql: String,
        record_count: i64,
    },
    MoreQueryResults {
        envelope: Envelope,
    },
    ExecuteSql {
        envelope: Envelope,
        sql: String,
    },
    Listen {
        envelope: Envelope,
        channel: String,
    },
    Unlisten {
        envelope: Envelope,
        channel: String,
    },
    Unknown {
        envelope: Envelope,
        detail: String,
    },
}

impl DecodedRequest {
    pub fn envelope(&self) -> &Envelope {
        match self {
            DecodedRequest::Connect { envelope, .. }
            | DecodedRequest::Disconnect { envelope, .. }
            | DecodedRequest::Query { envelope, .. }
            | DecodedRequest::MoreQueryResults { envelope }
            | DecodedRequest::ExecuteSql { envelope, .. }
            | DecodedRequest::Listen { envelope, .. }
            | DecodedRequest::Unlisten { envelope, .. }
            | DecodedRequest::Unknown { envelope, .. } => envelope,
        }
    }
}

fn envelope_from(value: &Value, raw: &str) -> Envelope {
    let request_id = match value.get("requestId").and_then(Value::as_i64) {
        Some(id) => RequestIdValue::Id(id),
        None => RequestIdValue::Missing,
    };
    let func = match value.get("func").and_then(Value::as_str) {
        Some(f) => FuncValue::Known(f.to_string()),
        None => FuncValue::Missing,
    };
    let session_id = value
        .get("sessionId")
        .and_then(Value::as_str)
        .map(|s| s.to_string());
    Envelope {
        request_id,
        func,
        session_id,
        raw: raw.to_string(),
    }
}

/// Decodes a single JSON text frame. Never fails: a non-object payload or a
/// JSON parse error both degrade to `Unknown` carrying a human-readable
/// detail.
pub fn decode(text: &str) -> DecodedRequest {
    let value: Value = match serde_json::from_str(text) {
        Ok(v) => v,
        Err(e) => {
            let envelope = Envelope {
                request_id: RequestIdValue::Missing,
                func: FuncValue::Missing,
                session_id: None,
                raw: text.to_string(),
            };
            return DecodedRequest::Unknown {
                envelope,
                detail: format!("Malformed JSON: {}", e),
            };
        }
    };

    let envelope = envelope_from(&value, text);
    let func = match &envelope.func {
        FuncValue::Known(f) => f.clone(),
        FuncValue::Missing => {
            return DecodedRequest::Unknown {
                envelope,
                detail: "Missing requestType".to_string(),
            };
        }
    };

    match func.as_str() {
        "connect" => {
            let host = value.get("host").and_then(Value::as_str).unwrap_or("").to_string();
            let port = value
                .get("port")
                .and_then(Value::as_u64)
                .map(|p| p as u16)
                .unwrap_or(0);
            let database = value
                .get("database")
                .and_then(Value::as_str)
                .unwrap_or("")
                .to_string();
            let user = value.get("user").and_then(Value::as_str).unwrap_or("").to_string();
            let password = value
                .get("password")
                .and_then(Value::as_str)
                .unwrap_or("")
                .to_string();
            DecodedRequest::Connect {
                envelope,
                connect: ConnectRequest {
                    host,
                    port,
                    database,
                    user,
                    password,
                },
            }
        }
        "disconnect" => {
            let discard_connection = value
                .get("discardConnection")
                .and_then(Value::as_bool)
                .unwrap_or(false);
            DecodedRequest::Disconnect {
                envelope,
                discard_connection,
            }
        }
        "query" => {
            let sql = value.get("sql").and_then(Value::as_str).unwrap_or("").to_string();
            let record_count = value.get("recordCount").and_then(Value::as_i64).unwrap_or(0);
            DecodedRequest::Query {
                envelope,
                sql,
                record_count,
            }
        }
        "moreQueryResults" => DecodedRequest::MoreQueryResults { envelope },
        "executeSql" => {
            let sql = value.get("sql").and_then(Value::as_str).unwrap_or("").to_string();
            DecodedRequest::ExecuteSql { envelope, sql }
        }
        "listen" => {
            let channel = value
                .get("channel")
                .and_then(Value::as_str)
                .unwrap_or("")
                .to_string();
            DecodedRequest::Listen { envelope, channel }
        }
        "unlisten" => {
            let channel = value
                .get("channel")
                .and_then(Value::as_str)
                .unwrap_or("")
                .to_string();
            DecodedRequest::Unlisten { envelope, channel }
        }
        other => {
            let detail = format!("Unrecognized requestType: {}", other);
            DecodedRequest::Unknown { envelope, detail }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_connect() {
        let text = r#"{"func":"connect","requestId":1,"sessionId":"s","host":"h","port":5432,"database":"d","user":"u","password":"p"}"#;
        match decode(text) {
            DecodedRequest::Connect { envelope, connect } => {
                assert_eq!(envelope.request_id, RequestIdValue::Id(1));
                assert_eq!(connect.host, "h");
                assert_eq!(connect.port, 5432);
            }
            other => panic!("expected Connect, got {:?}", other),
        }
    }

    #[test]
    fn missing_request_id_becomes_missing_marker() {
        let text = r#"{"func":"disconnect","sessionId":"s"}"#;
        let decoded = decode(text);
        assert_eq!(decoded.envelope().request_id, RequestIdValue::Missing);
    }

    #[test]
    fn missing_func_becomes_unknown() {
        let text = r#"{"requestId":1,"sessionId":"s"}"#;
        match decode(text) {
            DecodedRequest::Unknown { envelope, detail } => {
                assert_eq!(envelope.func, FuncValue::Missing);
                assert_eq!(detail, "Missing requestType");
            }
            other => panic!("expected Unknown, got {:?}", other),
        }
    }

    #[test]
    fn unrecognized_func_becomes_unknown_with_detail() {
        let text = r#"{"func":"frobnicate","requestId":2,"sessionId":"s"}"#;
        match decode(text) {
            DecodedRequest::Unknown { detail, .. } => {
                assert!(detail.contains("frobnicate"));
            }
            other => panic!("expected Unknown, got {:?}", other),
        }
    }

    #[test]
    fn malformed_json_becomes_unknown() {
        let decoded = decode("not json");
        assert!(matches!(decoded, DecodedRequest::Unknown { .. }));
    }
}
