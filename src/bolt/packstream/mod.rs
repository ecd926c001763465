//! PackStream, the value codec beneath every Bolt message.
//!
//! PackStream serializes a small universe of values: null, booleans, 64-bit
//! integers and floats, byte arrays, UTF-8 strings, lists, string-keyed maps
//! and tagged structures. Every Bolt message is a single structure whose tag
//! byte is the message signature.
//!
//! The rest of the crate treats this module as a black box: requests hand it
//! a [`Structure`] to flatten into bytes, responses hand it bytes to read one
//! structure back out. Graph values (nodes, relationships, paths) arrive as
//! structures and can be viewed through the typed wrappers in
//! [`structures`].

pub mod decoder;
pub mod encoder;
pub mod marker;
pub mod structures;
mod value;

pub use decoder::{decode, Decoder};
pub use encoder::{encode, encode_value};
pub use structures::{Node, Path, Relationship, UnboundRelationship};
pub use value::{Structure, Value};

use std::fmt;

/// Errors raised while encoding or decoding PackStream data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PackStreamError {
    /// Ran out of input mid-value.
    UnexpectedEof,
    /// A marker byte outside the format.
    UnknownMarker(u8),
    /// String data was not valid UTF-8.
    InvalidUtf8,
    /// A map key decoded to something other than a string.
    InvalidMapKey,
    /// A collection too large for the widest size header.
    TooLarge(&'static str, usize),
    /// A structure with the wrong tag or field shape.
    InvalidStructure(String),
    /// Input had trailing bytes after the decoded value.
    TrailingBytes(usize),
}

impl fmt::Display for PackStreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PackStreamError::UnexpectedEof => write!(f, "unexpected end of input"),
            PackStreamError::UnknownMarker(m) => write!(f, "unknown marker byte 0x{m:02X}"),
            PackStreamError::InvalidUtf8 => write!(f, "string data is not valid UTF-8"),
            PackStreamError::InvalidMapKey => write!(f, "map keys must be strings"),
            PackStreamError::TooLarge(what, n) => write!(f, "{what} of size {n} cannot be encoded"),
            PackStreamError::InvalidStructure(msg) => write!(f, "invalid structure: {msg}"),
            PackStreamError::TrailingBytes(n) => {
                write!(f, "{n} trailing byte(s) after decoded value")
            }
        }
    }
}

impl std::error::Error for PackStreamError {}
