//! Response messages, decoded from server structures.

use std::collections::HashMap;

use super::metadata::Notification;
use super::signature;
use crate::bolt::error::{classify_failure, BoltError, BoltResult};
use crate::bolt::packstream::{self, Structure, Value};

/// All server-to-client messages.
#[derive(Debug, Clone)]
pub enum Response {
    /// The request completed; metadata describes the outcome.
    Success(Success),
    /// One row of a result stream.
    Record(Record),
    /// The request was skipped because an earlier one failed.
    Ignored,
    /// The request failed with a coded error.
    Failure(Failure),
}

impl Response {
    /// Decode one response message from its PackStream bytes.
    pub fn from_bytes(bytes: &[u8]) -> BoltResult<Self> {
        let value = packstream::decode(bytes)?;
        let structure = value
            .as_structure()
            .ok_or_else(|| BoltError::Protocol("response is not a structure".to_string()))?;
        Self::from_structure(structure)
    }

    /// Interpret a decoded structure as a response.
    pub fn from_structure(s: &Structure) -> BoltResult<Self> {
        match s.tag {
            signature::SUCCESS => Ok(Response::Success(Success {
                metadata: field_map(s, 0),
            })),
            signature::RECORD => {
                let values = s
                    .field(0)
                    .and_then(Value::as_list)
                    .map(|items| items.to_vec())
                    .unwrap_or_default();
                Ok(Response::Record(Record { values }))
            }
            signature::IGNORED => Ok(Response::Ignored),
            signature::FAILURE => {
                let metadata = field_map(s, 0);
                let code = metadata
                    .get("code")
                    .and_then(Value::as_str)
                    .ok_or_else(|| {
                        BoltError::Protocol("FAILURE is missing its code".to_string())
                    })?
                    .to_string();
                let message = metadata
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                Ok(Response::Failure(Failure { code, message }))
            }
            other => Err(BoltError::Protocol(format!(
                "unknown response signature 0x{other:02X}"
            ))),
        }
    }

    /// Upper-case category name, for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Response::Success(_) => "SUCCESS",
            Response::Record(_) => "RECORD",
            Response::Ignored => "IGNORED",
            Response::Failure(_) => "FAILURE",
        }
    }

    /// Whether this is a RECORD.
    pub fn is_record(&self) -> bool {
        matches!(self, Response::Record(_))
    }
}

fn field_map(s: &Structure, index: usize) -> HashMap<String, Value> {
    s.field(index)
        .and_then(Value::as_map)
        .cloned()
        .unwrap_or_default()
}

/// SUCCESS metadata with typed accessors for the canonical keys.
#[derive(Debug, Clone, Default)]
pub struct Success {
    /// The raw metadata map.
    pub metadata: HashMap<String, Value>,
}

impl Success {
    /// Metadata value under `key`.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.metadata.get(key)
    }

    /// Server agent string, e.g. `Neo4j/5.12.0`.
    pub fn server(&self) -> Option<&str> {
        self.get("server").and_then(Value::as_str)
    }

    /// Server-assigned connection id.
    pub fn connection_id(&self) -> Option<&str> {
        self.get("connection_id").and_then(Value::as_str)
    }

    /// Column names from a RUN SUCCESS.
    pub fn fields(&self) -> Option<Vec<String>> {
        self.get("fields").and_then(Value::as_string_list)
    }

    /// Query id from a RUN SUCCESS inside an explicit transaction.
    pub fn qid(&self) -> Option<i64> {
        self.get("qid").and_then(Value::as_int)
    }

    /// Whether the stream is paused awaiting another PULL/DISCARD.
    pub fn has_more(&self) -> bool {
        self.get("has_more").and_then(Value::as_bool).unwrap_or(false)
    }

    /// Bookmark issued by the server, under `bookmark` or `bookmarks`.
    pub fn bookmark(&self) -> Option<String> {
        if let Some(bookmark) = self.get("bookmark").and_then(Value::as_str) {
            return Some(bookmark.to_string());
        }
        self.get("bookmarks")
            .and_then(Value::as_string_list)
            .and_then(|list| list.into_iter().last())
    }

    /// Database the work ran against.
    pub fn db(&self) -> Option<&str> {
        self.get("db").and_then(Value::as_str)
    }

    /// Update counters as a name-to-count map.
    pub fn stats(&self) -> Option<HashMap<String, i64>> {
        self.get("stats").and_then(Value::as_map).map(|map| {
            map.iter()
                .filter_map(|(k, v)| v.as_int().map(|i| (k.clone(), i)))
                .collect()
        })
    }

    /// Notifications attached to the result, if any.
    pub fn notifications(&self) -> Vec<Notification> {
        self.get("notifications")
            .and_then(Value::as_list)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|v| v.as_map().and_then(Notification::from_map))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// String-valued connection hints from a HELLO SUCCESS.
    pub fn hints(&self) -> HashMap<String, String> {
        self.get("hints")
            .and_then(Value::as_map)
            .map(|map| {
                map.iter()
                    .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// RECORD - one row of values.
#[derive(Debug, Clone, Default)]
pub struct Record {
    /// The row's values, ordered per the RUN SUCCESS `fields`.
    pub values: Vec<Value>,
}

impl Record {
    /// Value at `index`.
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// Number of values in the row.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the row is empty.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// FAILURE - coded server error.
#[derive(Debug, Clone)]
pub struct Failure {
    /// Dotted status code, e.g. `Neo.ClientError.Statement.SyntaxError`.
    pub code: String,
    /// Human-readable message.
    pub message: String,
}

impl Failure {
    /// Translate into the typed error taxonomy.
    pub fn into_error(self) -> BoltError {
        classify_failure(&self.code, &self.message)
    }
}

impl std::fmt::Display for Failure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bolt::packstream::encode;

    fn response_from(tag: u8, fields: Vec<Value>) -> BoltResult<Response> {
        let bytes = encode(&Value::Structure(Structure::new(tag, fields))).unwrap();
        Response::from_bytes(&bytes)
    }

    fn success_with(entries: &[(&str, Value)]) -> Success {
        let mut metadata = HashMap::new();
        for (k, v) in entries {
            metadata.insert(k.to_string(), v.clone());
        }
        Success { metadata }
    }

    #[test]
    fn test_decode_success() {
        let mut metadata = HashMap::new();
        metadata.insert("server".to_string(), Value::String("Neo4j/5.12.0".into()));
        let response = response_from(signature::SUCCESS, vec![Value::Map(metadata)]).unwrap();
        match response {
            Response::Success(success) => {
                assert_eq!(success.server(), Some("Neo4j/5.12.0"))
            }
            other => panic!("expected SUCCESS, got {}", other.name()),
        }
    }

    #[test]
    fn test_decode_record() {
        let response = response_from(
            signature::RECORD,
            vec![Value::List(vec![Value::Integer(1), Value::String("a".into())])],
        )
        .unwrap();
        match response {
            Response::Record(record) => {
                assert_eq!(record.len(), 2);
                assert_eq!(record.get(0).unwrap().as_int(), Some(1));
                assert!(!record.is_empty());
            }
            other => panic!("expected RECORD, got {}", other.name()),
        }
    }

    #[test]
    fn test_decode_ignored() {
        let response = response_from(signature::IGNORED, vec![]).unwrap();
        assert!(matches!(response, Response::Ignored));
    }

    #[test]
    fn test_decode_failure() {
        let mut metadata = HashMap::new();
        metadata.insert(
            "code".to_string(),
            Value::String("Neo.ClientError.Statement.SyntaxError".into()),
        );
        metadata.insert(
            "message".to_string(),
            Value::String("Invalid syntax near RETUR".into()),
        );
        let response = response_from(signature::FAILURE, vec![Value::Map(metadata)]).unwrap();
        match response {
            Response::Failure(failure) => {
                assert_eq!(failure.code, "Neo.ClientError.Statement.SyntaxError");
                let err = failure.into_error();
                assert!(matches!(err, BoltError::Syntax(m) if m == "Invalid syntax near RETUR"));
            }
            other => panic!("expected FAILURE, got {}", other.name()),
        }
    }

    #[test]
    fn test_failure_without_code_is_protocol_error() {
        let err = response_from(signature::FAILURE, vec![Value::Map(HashMap::new())])
            .unwrap_err();
        assert!(matches!(err, BoltError::Protocol(_)));
    }

    #[test]
    fn test_unknown_signature() {
        let err = response_from(0x55, vec![]).unwrap_err();
        assert!(matches!(err, BoltError::Protocol(_)));
    }

    #[test]
    fn test_non_structure_bytes() {
        let bytes = encode(&Value::Integer(5)).unwrap();
        let err = Response::from_bytes(&bytes).unwrap_err();
        assert!(matches!(err, BoltError::Protocol(_)));
    }

    #[test]
    fn test_success_helpers() {
        let success = success_with(&[
            ("fields", Value::List(vec![Value::String("n".into())])),
            ("qid", Value::Integer(7)),
            ("has_more", Value::Boolean(true)),
            ("db", Value::String("movies".into())),
        ]);
        assert_eq!(success.fields().unwrap(), vec!["n"]);
        assert_eq!(success.qid(), Some(7));
        assert!(success.has_more());
        assert_eq!(success.db(), Some("movies"));
        assert_eq!(success.bookmark(), None);
    }

    #[test]
    fn test_bookmark_singular_and_plural() {
        let success = success_with(&[("bookmark", Value::String("bm:1".into()))]);
        assert_eq!(success.bookmark().as_deref(), Some("bm:1"));

        let success = success_with(&[(
            "bookmarks",
            Value::List(vec![Value::String("bm:1".into()), Value::String("bm:2".into())]),
        )]);
        assert_eq!(success.bookmark().as_deref(), Some("bm:2"));
    }

    #[test]
    fn test_stats_filters_non_ints() {
        let mut counters = HashMap::new();
        counters.insert("nodes-created".to_string(), Value::Integer(3));
        counters.insert("contains-updates".to_string(), Value::Boolean(true));
        let success = success_with(&[("stats", Value::Map(counters))]);

        let stats = success.stats().unwrap();
        assert_eq!(stats.get("nodes-created"), Some(&3));
        assert!(!stats.contains_key("contains-updates"));
    }

    #[test]
    fn test_hints() {
        let mut hints = HashMap::new();
        hints.insert(
            "connection.recv_timeout_seconds".to_string(),
            Value::String("120".into()),
        );
        let success = success_with(&[("hints", Value::Map(hints))]);
        assert_eq!(
            success.hints().get("connection.recv_timeout_seconds"),
            Some(&"120".to_string())
        );
    }

    #[test]
    fn test_notifications_extraction() {
        let mut n = HashMap::new();
        n.insert(
            "code".to_string(),
            Value::String("Neo.ClientNotification.Statement.CartesianProduct".into()),
        );
        n.insert("title".to_string(), Value::String("Cartesian product".into()));
        n.insert("severity".to_string(), Value::String("WARNING".into()));
        let success = success_with(&[("notifications", Value::List(vec![Value::Map(n)]))]);

        let notifications = success.notifications();
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].title, "Cartesian product");
    }
}
