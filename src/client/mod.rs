//! The stateful client: connection lifecycle, settings and trust policy.
//!
//! [`Connection`] is the session object: one transport, one protocol state
//! machine, all operations serialised. Multiple connections are fully
//! independent.

mod connection;
mod settings;
mod stream;
pub mod trust;

pub use connection::{Connection, ConnectionState, StreamBatch};
pub use settings::{
    ConnectionMetadata, ConnectionSettings, ConnectionSettingsBuilder, DEFAULT_USER_AGENT,
};
pub use stream::{RecordStream, DEFAULT_FETCH_SIZE};
pub use trust::{CertificateValidator, KnownHosts, TrustStrategy};
