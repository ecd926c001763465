//! The Bolt wire protocol: versions, handshake, framing, messages, values
//! and errors.
//!
//! Everything here is transport-agnostic protocol mechanics. The stateful
//! session driving these pieces lives in [`crate::client`].

pub mod chunk;
pub mod error;
pub mod handshake;
pub mod message;
pub mod packstream;
pub mod version;

pub use chunk::{ChunkCodec, END_MARKER, MAX_CHUNK_SIZE};
pub use error::{classify_failure, BoltError, BoltResult};
pub use handshake::{build_handshake, BOLT_MAGIC, HANDSHAKE_RESPONSE_SIZE, HANDSHAKE_SIZE};
pub use message::{Request, Response};
pub use version::{BoltCapabilities, BoltVersion};
