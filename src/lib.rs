//! # boltwire
//!
//! Client-side core of the Bolt protocol, the binary connection-oriented
//! protocol spoken by Neo4j-compatible graph databases.
//!
//! The crate covers the protocol mechanics a driver is built on: version
//! negotiation (legacy and manifest style, Bolt 3.0 through 5.6), chunked
//! message framing, the PackStream value codec, version-aware message
//! construction, the connection state machine with pipelined
//! request/response correlation, bookmark tracking and a typed server-error
//! taxonomy. Pooling, cluster routing caches and retry policies belong to
//! the layers above.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use boltwire::{Connection, ConnectionSettings, TxOptions};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let settings = ConnectionSettings::builder("neo4j", "password")
//!         .with_database("movies")
//!         .build();
//!
//!     let mut conn = Connection::tcp("localhost", 7687, settings);
//!     conn.open().await?;
//!     println!("connected with Bolt {}", conn.version());
//!
//!     let summary = conn
//!         .run("RETURN $x AS x", boltwire::params! { "x" => 42 }, TxOptions::default())
//!         .await?;
//!     println!("columns: {:?}", summary.fields());
//!
//!     let batch = conn.pull(-1, -1).await?;
//!     for record in &batch.records {
//!         println!("{:?}", record.values);
//!     }
//!
//!     conn.close().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Transactions
//!
//! ```rust,no_run
//! # use boltwire::{Connection, ConnectionSettings, TxOptions};
//! # use std::collections::HashMap;
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! # let mut conn = Connection::tcp("localhost", 7687, ConnectionSettings::new("u", "p"));
//! conn.begin(TxOptions::default()).await?;
//! conn.run("CREATE (n:Node)", HashMap::new(), TxOptions::default()).await?;
//! conn.discard(-1, -1).await?;
//! let bookmark = conn.commit().await?;
//! # Ok(())
//! # }
//! ```
//!
//! The bookmark a COMMIT returns is tracked on the connection and threaded
//! into the next BEGIN or auto-commit RUN automatically, preserving causal
//! consistency across transactions.
//!
//! ## Modules
//!
//! - [`bolt`] - wire protocol: versions, handshake, framing, messages,
//!   PackStream, errors
//! - [`client`] - the connection state machine, settings and trust policy
//! - [`transport`] - the byte-stream contract and the TCP implementation

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod bolt;
pub mod client;
pub mod transport;

pub use bolt::error::{BoltError, BoltResult};
pub use bolt::message::{
    Notification, NotificationSeverity, Record, Request, Response, RoutingTable, Success,
    TxOptions,
};
pub use bolt::packstream::{Node, Path, Relationship, Structure, Value};
pub use bolt::version::{BoltCapabilities, BoltVersion};
pub use client::{
    Connection, ConnectionMetadata, ConnectionSettings, ConnectionState, RecordStream,
    StreamBatch, TrustStrategy,
};
pub use transport::{TcpTransport, Transport};

/// Build a statement parameter map.
///
/// ```rust
/// let params = boltwire::params! {
///     "name" => "Alice",
///     "age" => 42,
/// };
/// assert_eq!(params.len(), 2);
/// ```
#[macro_export]
macro_rules! params {
    () => {
        std::collections::HashMap::<String, $crate::Value>::new()
    };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut map = std::collections::HashMap::new();
        $(
            map.insert($key.to_string(), $crate::Value::from($value));
        )+
        map
    }};
}
