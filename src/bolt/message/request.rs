//! Request messages, encoded version-aware.
//!
//! Option-bag fields live in a trailing "extra" map and are emitted only
//! when present; absent options never appear, and fields a protocol
//! revision does not know about are withheld even when set.

use std::collections::HashMap;
use std::time::Duration;

use super::signature;
use crate::bolt::packstream::{Structure, Value};
use crate::bolt::version::BoltVersion;

/// All client-to-server messages.
#[derive(Debug, Clone)]
pub enum Request {
    /// HELLO - open the session, with credentials before 5.1.
    Hello(HelloMessage),
    /// LOGON - authenticate (5.1+).
    Logon(LogonMessage),
    /// LOGOFF - drop authentication (5.1+).
    Logoff,
    /// GOODBYE - graceful close.
    Goodbye,
    /// RESET - clear failure state.
    Reset,
    /// RUN - execute a statement.
    Run(RunMessage),
    /// BEGIN - open an explicit transaction.
    Begin(TxOptions),
    /// COMMIT - commit the open transaction.
    Commit,
    /// ROLLBACK - abandon the open transaction.
    Rollback,
    /// PULL - fetch records from a stream.
    Pull(PullMessage),
    /// DISCARD - drop records from a stream.
    Discard(DiscardMessage),
    /// ROUTE - fetch the routing table (4.3+).
    Route(RouteMessage),
    /// TELEMETRY - report the driver API in use (5.4+).
    Telemetry(i64),
}

impl Request {
    /// The message signature byte.
    pub fn signature(&self) -> u8 {
        match self {
            Request::Hello(_) => signature::HELLO,
            Request::Logon(_) => signature::LOGON,
            Request::Logoff => signature::LOGOFF,
            Request::Goodbye => signature::GOODBYE,
            Request::Reset => signature::RESET,
            Request::Run(_) => signature::RUN,
            Request::Begin(_) => signature::BEGIN,
            Request::Commit => signature::COMMIT,
            Request::Rollback => signature::ROLLBACK,
            Request::Pull(_) => signature::PULL,
            Request::Discard(_) => signature::DISCARD,
            Request::Route(_) => signature::ROUTE,
            Request::Telemetry(_) => signature::TELEMETRY,
        }
    }

    /// Upper-case message name, for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Request::Hello(_) => "HELLO",
            Request::Logon(_) => "LOGON",
            Request::Logoff => "LOGOFF",
            Request::Goodbye => "GOODBYE",
            Request::Reset => "RESET",
            Request::Run(_) => "RUN",
            Request::Begin(_) => "BEGIN",
            Request::Commit => "COMMIT",
            Request::Rollback => "ROLLBACK",
            Request::Pull(_) => "PULL",
            Request::Discard(_) => "DISCARD",
            Request::Route(_) => "ROUTE",
            Request::Telemetry(_) => "TELEMETRY",
        }
    }

    /// Encode for the negotiated `version`.
    pub fn to_structure(&self, version: BoltVersion) -> Structure {
        match self {
            Request::Hello(msg) => msg.to_structure(version),
            Request::Logon(msg) => msg.to_structure(),
            Request::Logoff => Structure::new(signature::LOGOFF, vec![]),
            Request::Goodbye => Structure::new(signature::GOODBYE, vec![]),
            Request::Reset => Structure::new(signature::RESET, vec![]),
            Request::Run(msg) => msg.to_structure(version),
            Request::Begin(options) => Structure::new(
                signature::BEGIN,
                vec![Value::Map(options.to_extra(version))],
            ),
            Request::Commit => Structure::new(signature::COMMIT, vec![]),
            Request::Rollback => Structure::new(signature::ROLLBACK, vec![]),
            Request::Pull(msg) => msg.to_structure(version),
            Request::Discard(msg) => msg.to_structure(version),
            Request::Route(msg) => msg.to_structure(version),
            Request::Telemetry(api) => {
                Structure::new(signature::TELEMETRY, vec![Value::Integer(*api)])
            }
        }
    }
}

/// HELLO - session opening.
#[derive(Debug, Clone, Default)]
pub struct HelloMessage {
    /// Client identification, e.g. `boltwire/0.3`.
    pub user_agent: String,
    /// Username for the basic scheme (pre-5.1 only).
    pub principal: Option<String>,
    /// Password for the basic scheme (pre-5.1 only).
    pub credentials: Option<String>,
    /// Routing context advertised to the server (4.1+).
    pub routing: Option<HashMap<String, Value>>,
    /// Minimum notification severity the server should report (5.2+).
    pub notifications_minimum_severity: Option<String>,
    /// Notification categories the server should withhold (5.2+).
    pub notifications_disabled_categories: Option<Vec<String>>,
}

impl HelloMessage {
    fn to_structure(&self, version: BoltVersion) -> Structure {
        let mut extra = HashMap::new();
        extra.insert(
            "user_agent".to_string(),
            Value::String(self.user_agent.clone()),
        );

        // From 5.1 credentials travel in LOGON instead.
        if !version.supports_reauth() {
            extra.insert("scheme".to_string(), Value::String("basic".to_string()));
            if let Some(principal) = &self.principal {
                extra.insert("principal".to_string(), Value::String(principal.clone()));
            }
            if let Some(credentials) = &self.credentials {
                extra.insert(
                    "credentials".to_string(),
                    Value::String(credentials.clone()),
                );
            }
        }

        if version >= BoltVersion::V4_1 {
            if let Some(routing) = &self.routing {
                extra.insert("routing".to_string(), Value::Map(routing.clone()));
            }
        }

        if version.supports_notification_filtering() {
            if let Some(severity) = &self.notifications_minimum_severity {
                extra.insert(
                    "notifications_minimum_severity".to_string(),
                    Value::String(severity.clone()),
                );
            }
            if let Some(categories) = &self.notifications_disabled_categories {
                extra.insert(
                    "notifications_disabled_categories".to_string(),
                    categories.clone().into(),
                );
            }
        }

        Structure::new(signature::HELLO, vec![Value::Map(extra)])
    }
}

/// LOGON - basic-scheme authentication (5.1+).
#[derive(Debug, Clone)]
pub struct LogonMessage {
    /// Username.
    pub principal: String,
    /// Password.
    pub credentials: String,
}

impl LogonMessage {
    fn to_structure(&self) -> Structure {
        let mut auth = HashMap::new();
        auth.insert("scheme".to_string(), Value::String("basic".to_string()));
        auth.insert(
            "principal".to_string(),
            Value::String(self.principal.clone()),
        );
        auth.insert(
            "credentials".to_string(),
            Value::String(self.credentials.clone()),
        );
        Structure::new(signature::LOGON, vec![Value::Map(auth)])
    }
}

/// Option bag shared by BEGIN and the RUN extra map.
#[derive(Debug, Clone, Default)]
pub struct TxOptions {
    /// Request read-only routing and execution.
    pub readonly: bool,
    /// Database to run against; the server default when absent.
    pub database: Option<String>,
    /// Causal-consistency checkpoints to wait for.
    pub bookmarks: Vec<String>,
    /// Opaque metadata attached to the transaction.
    pub tx_metadata: HashMap<String, Value>,
    /// Server-enforced transaction timeout.
    pub tx_timeout: Option<Duration>,
    /// User to impersonate (4.4+).
    pub imp_user: Option<String>,
    /// Minimum notification severity (5.2+).
    pub notifications_minimum_severity: Option<String>,
    /// Disabled notification categories (5.2+).
    pub notifications_disabled_categories: Option<Vec<String>>,
}

impl TxOptions {
    /// Build the extra map for `version`, emitting only present options.
    pub fn to_extra(&self, version: BoltVersion) -> HashMap<String, Value> {
        let mut extra = HashMap::new();

        if self.readonly {
            extra.insert("mode".to_string(), Value::String("r".to_string()));
        }
        if let Some(db) = &self.database {
            extra.insert("db".to_string(), Value::String(db.clone()));
        }
        if !self.bookmarks.is_empty() {
            extra.insert("bookmarks".to_string(), self.bookmarks.clone().into());
        }
        if !self.tx_metadata.is_empty() {
            extra.insert(
                "tx_metadata".to_string(),
                Value::Map(self.tx_metadata.clone()),
            );
        }
        if let Some(timeout) = self.tx_timeout {
            extra.insert(
                "tx_timeout".to_string(),
                Value::Integer(timeout.as_millis() as i64),
            );
        }
        if version.supports_impersonation() {
            if let Some(user) = &self.imp_user {
                extra.insert("imp_user".to_string(), Value::String(user.clone()));
            }
        }
        if version.supports_notification_filtering() {
            if let Some(severity) = &self.notifications_minimum_severity {
                extra.insert(
                    "notifications_minimum_severity".to_string(),
                    Value::String(severity.clone()),
                );
            }
            if let Some(categories) = &self.notifications_disabled_categories {
                extra.insert(
                    "notifications_disabled_categories".to_string(),
                    categories.clone().into(),
                );
            }
        }

        extra
    }
}

/// RUN - statement execution.
#[derive(Debug, Clone)]
pub struct RunMessage {
    /// The statement text.
    pub statement: String,
    /// Statement parameters.
    pub parameters: HashMap<String, Value>,
    /// Transaction options for the auto-commit extra map.
    pub options: TxOptions,
}

impl RunMessage {
    /// Create a RUN with no parameters and default options.
    pub fn new(statement: impl Into<String>) -> Self {
        Self {
            statement: statement.into(),
            parameters: HashMap::new(),
            options: TxOptions::default(),
        }
    }

    fn to_structure(&self, version: BoltVersion) -> Structure {
        Structure::new(
            signature::RUN,
            vec![
                Value::String(self.statement.clone()),
                Value::Map(self.parameters.clone()),
                Value::Map(self.options.to_extra(version)),
            ],
        )
    }
}

/// PULL - fetch up to `n` records (`-1` for all).
#[derive(Debug, Clone, Copy)]
pub struct PullMessage {
    /// Record budget; `-1` means the whole stream.
    pub n: i64,
    /// Stream to pull from; negative targets the last one.
    pub qid: i64,
}

impl PullMessage {
    /// Pull the entire (last) stream.
    pub fn all() -> Self {
        Self { n: -1, qid: -1 }
    }

    fn to_structure(&self, version: BoltVersion) -> Structure {
        stream_request(signature::PULL, self.n, self.qid, version)
    }
}

/// DISCARD - drop up to `n` records (`-1` for all).
#[derive(Debug, Clone, Copy)]
pub struct DiscardMessage {
    /// Record budget; `-1` means the whole stream.
    pub n: i64,
    /// Stream to discard from; negative targets the last one.
    pub qid: i64,
}

impl DiscardMessage {
    /// Discard the entire (last) stream.
    pub fn all() -> Self {
        Self { n: -1, qid: -1 }
    }

    fn to_structure(&self, version: BoltVersion) -> Structure {
        stream_request(signature::DISCARD, self.n, self.qid, version)
    }
}

/// Bolt 3 has no record budgets: PULL_ALL and DISCARD_ALL carry no fields.
/// From 4.0 the extra map holds `n`, and `qid` when it names a stream.
fn stream_request(sig: u8, n: i64, qid: i64, version: BoltVersion) -> Structure {
    if !version.supports_streaming() {
        return Structure::new(sig, vec![]);
    }
    let mut extra = HashMap::new();
    extra.insert("n".to_string(), Value::Integer(n));
    if qid >= 0 {
        extra.insert("qid".to_string(), Value::Integer(qid));
    }
    Structure::new(sig, vec![Value::Map(extra)])
}

/// ROUTE - routing table request (4.3+).
#[derive(Debug, Clone, Default)]
pub struct RouteMessage {
    /// Routing context, normally echoed from the connection URI.
    pub context: HashMap<String, Value>,
    /// Bookmarks the routing table must be consistent with.
    pub bookmarks: Vec<String>,
    /// Database to route for; `None` means the default database.
    pub database: Option<String>,
    /// User to impersonate (4.4+).
    pub imp_user: Option<String>,
}

impl RouteMessage {
    fn to_structure(&self, version: BoltVersion) -> Structure {
        let db = match &self.database {
            Some(db) => Value::String(db.clone()),
            None => Value::Null,
        };
        let mut fields = vec![
            Value::Map(self.context.clone()),
            self.bookmarks.clone().into(),
            db,
        ];
        if version.supports_impersonation() {
            if let Some(user) = &self.imp_user {
                fields.push(Value::String(user.clone()));
            }
        }
        Structure::new(signature::ROUTE, fields)
    }
}
