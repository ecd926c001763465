//! Connection configuration and server-reported metadata.

use std::collections::HashMap;
use std::time::Duration;

use crate::bolt::message::Success;
use crate::bolt::version::BoltVersion;

/// Default client identification sent in HELLO.
pub const DEFAULT_USER_AGENT: &str = concat!("boltwire/", env!("CARGO_PKG_VERSION"));

const DEFAULT_CONNECTION_TIMEOUT_MS: u64 = 30_000;

/// Immutable configuration a connection is created with.
///
/// Once a version is negotiated the connection swaps in a derived copy via
/// [`ConnectionSettings::with_version`]; credentials are never mutated.
#[derive(Debug, Clone)]
pub struct ConnectionSettings {
    /// Username for the basic scheme.
    pub username: String,
    /// Password for the basic scheme.
    pub password: String,
    /// Client identification string.
    pub user_agent: String,
    /// Database RUN/BEGIN default to.
    pub database: Option<String>,
    /// Minimum notification severity to report.
    pub notifications_minimum_severity: Option<String>,
    /// Notification categories to withhold.
    pub notifications_disabled_categories: Option<Vec<String>>,
    /// TCP/TLS connect budget in milliseconds.
    pub connection_timeout_ms: u64,
    /// Read/write inactivity budget in milliseconds; 0 disables it.
    pub socket_timeout_ms: u64,
    /// Enable TCP keep-alive.
    pub keep_alive: bool,
    /// Negotiated protocol version; uninitialized until the handshake.
    pub version: BoltVersion,
}

impl ConnectionSettings {
    /// Settings with basic credentials and defaults everywhere else.
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            database: None,
            notifications_minimum_severity: None,
            notifications_disabled_categories: None,
            connection_timeout_ms: DEFAULT_CONNECTION_TIMEOUT_MS,
            socket_timeout_ms: 0,
            keep_alive: false,
            version: BoltVersion::UNINITIALIZED,
        }
    }

    /// Start a builder with basic credentials.
    pub fn builder(
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> ConnectionSettingsBuilder {
        ConnectionSettingsBuilder {
            settings: Self::new(username, password),
        }
    }

    /// Derived copy carrying the negotiated `version`.
    pub fn with_version(&self, version: BoltVersion) -> Self {
        let mut derived = self.clone();
        derived.version = version;
        derived
    }

    /// Connect budget as a [`Duration`].
    pub fn connection_timeout(&self) -> Duration {
        Duration::from_millis(self.connection_timeout_ms)
    }

    /// Inactivity budget as a [`Duration`]; `None` when disabled.
    pub fn socket_timeout(&self) -> Option<Duration> {
        match self.socket_timeout_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        }
    }
}

/// Builder for [`ConnectionSettings`].
#[derive(Debug)]
pub struct ConnectionSettingsBuilder {
    settings: ConnectionSettings,
}

impl ConnectionSettingsBuilder {
    /// Override the user agent.
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.settings.user_agent = user_agent.into();
        self
    }

    /// Set the default database.
    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.settings.database = Some(database.into());
        self
    }

    /// Filter notifications below `severity`.
    pub fn with_notifications_minimum_severity(mut self, severity: impl Into<String>) -> Self {
        self.settings.notifications_minimum_severity = Some(severity.into());
        self
    }

    /// Withhold notifications in `categories`.
    pub fn with_notifications_disabled_categories(mut self, categories: Vec<String>) -> Self {
        self.settings.notifications_disabled_categories = Some(categories);
        self
    }

    /// Set the connect budget in milliseconds.
    pub fn with_connection_timeout_ms(mut self, ms: u64) -> Self {
        self.settings.connection_timeout_ms = ms;
        self
    }

    /// Set the inactivity budget in milliseconds; 0 disables it.
    pub fn with_socket_timeout_ms(mut self, ms: u64) -> Self {
        self.settings.socket_timeout_ms = ms;
        self
    }

    /// Enable TCP keep-alive.
    pub fn with_keep_alive(mut self, keep_alive: bool) -> Self {
        self.settings.keep_alive = keep_alive;
        self
    }

    /// Finish the builder.
    pub fn build(self) -> ConnectionSettings {
        self.settings
    }
}

/// What the server reported about itself at authentication time.
#[derive(Debug, Clone, Default)]
pub struct ConnectionMetadata {
    /// Full agent string, e.g. `Neo4j/5.12.0`.
    pub server_agent: String,
    /// Version token after the first `/` of the agent string.
    pub server_version: String,
    /// Server-assigned connection id.
    pub connection_id: Option<String>,
    /// Free-form connection hints.
    pub hints: HashMap<String, String>,
}

impl ConnectionMetadata {
    /// Extract metadata from a HELLO/LOGON SUCCESS.
    pub fn from_success(success: &Success) -> Self {
        let server_agent = success.server().unwrap_or_default().to_string();
        let server_version = server_agent
            .split_once('/')
            .map(|(_, version)| version.to_string())
            .unwrap_or_default();
        Self {
            server_agent,
            server_version,
            connection_id: success.connection_id().map(str::to_string),
            hints: success.hints(),
        }
    }
}
