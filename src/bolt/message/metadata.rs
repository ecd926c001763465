//! Structured views over SUCCESS metadata: notifications and routing tables.

use std::collections::HashMap;

use crate::bolt::packstream::Value;

/// A server notification attached to a result.
#[derive(Debug, Clone)]
pub struct Notification {
    /// Notification code, e.g. `Neo.ClientNotification.Statement.CartesianProduct`.
    pub code: String,
    /// Short title.
    pub title: String,
    /// Longer description.
    pub description: String,
    /// Reported severity.
    pub severity: NotificationSeverity,
    /// Category name (5.x servers).
    pub category: Option<String>,
    /// Where in the statement the notification points, if anywhere.
    pub position: Option<Position>,
}

impl Notification {
    /// Parse a notification from its metadata map. Returns `None` without a
    /// code.
    pub fn from_map(map: &HashMap<String, Value>) -> Option<Self> {
        let code = map.get("code").and_then(Value::as_str)?.to_string();
        let title = map
            .get("title")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let description = map
            .get("description")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let severity = map
            .get("severity")
            .and_then(Value::as_str)
            .map(NotificationSeverity::parse)
            .unwrap_or(NotificationSeverity::Information);
        let category = map
            .get("category")
            .and_then(Value::as_str)
            .map(str::to_string);
        let position = map.get("position").and_then(Value::as_map).and_then(|pos| {
            Some(Position {
                offset: pos.get("offset").and_then(Value::as_int)?,
                line: pos.get("line").and_then(Value::as_int)?,
                column: pos.get("column").and_then(Value::as_int)?,
            })
        });

        Some(Self {
            code,
            title,
            description,
            severity,
            category,
            position,
        })
    }
}

/// Notification severity as reported by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationSeverity {
    /// Something is likely wrong with the statement.
    Warning,
    /// Purely informational.
    Information,
}

impl NotificationSeverity {
    /// Parse a severity string; anything unrecognised is informational.
    pub fn parse(s: &str) -> Self {
        if s.eq_ignore_ascii_case("warning") {
            NotificationSeverity::Warning
        } else {
            NotificationSeverity::Information
        }
    }

    /// The wire spelling.
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationSeverity::Warning => "WARNING",
            NotificationSeverity::Information => "INFORMATION",
        }
    }
}

/// Location of a notification within the statement text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    /// Byte offset from the start of the statement.
    pub offset: i64,
    /// 1-based line.
    pub line: i64,
    /// 1-based column.
    pub column: i64,
}

/// Role a server plays in a routing table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerRole {
    /// Serves routing requests.
    Route,
    /// Accepts writes.
    Write,
    /// Serves reads.
    Read,
}

impl ServerRole {
    /// Parse a role string.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ROUTE" => Some(ServerRole::Route),
            "WRITE" => Some(ServerRole::Write),
            "READ" => Some(ServerRole::Read),
            _ => None,
        }
    }
}

/// Routing table from a ROUTE SUCCESS.
#[derive(Debug, Clone, Default)]
pub struct RoutingTable {
    /// Seconds the table stays valid.
    pub ttl: i64,
    /// Database the table routes for.
    pub db: Option<String>,
    /// `host:port` addresses serving routing requests.
    pub routers: Vec<String>,
    /// Addresses accepting writes.
    pub writers: Vec<String>,
    /// Addresses serving reads.
    pub readers: Vec<String>,
}

impl RoutingTable {
    /// Parse the `rt` entry of a ROUTE SUCCESS metadata map.
    pub fn from_metadata(metadata: &HashMap<String, Value>) -> Option<Self> {
        let rt = metadata.get("rt").and_then(Value::as_map)?;

        let mut table = RoutingTable {
            ttl: rt.get("ttl").and_then(Value::as_int).unwrap_or(300),
            db: rt.get("db").and_then(Value::as_str).map(str::to_string),
            ..Default::default()
        };

        for server in rt.get("servers").and_then(Value::as_list)? {
            let Some(entry) = server.as_map() else {
                continue;
            };
            let role = entry
                .get("role")
                .and_then(Value::as_str)
                .and_then(ServerRole::parse);
            let addresses = entry
                .get("addresses")
                .and_then(Value::as_string_list)
                .unwrap_or_default();
            match role {
                Some(ServerRole::Route) => table.routers.extend(addresses),
                Some(ServerRole::Write) => table.writers.extend(addresses),
                Some(ServerRole::Read) => table.readers.extend(addresses),
                None => {}
            }
        }

        Some(table)
    }
}
