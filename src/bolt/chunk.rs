//! Chunked message framing.
//!
//! On the wire every Bolt message is carried as a run of chunks, each
//! prefixed with a big-endian `u16` payload length, terminated by a
//! zero-length chunk (`0x00 0x00`). A single message may span many chunks;
//! many messages may be back to back in one read. [`ChunkCodec`] converts
//! between whole message payloads and this framing, tolerating partial reads
//! and skipping empty (NOOP keep-alive) messages.

use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use super::error::BoltError;

/// Largest payload a single chunk can carry.
pub const MAX_CHUNK_SIZE: usize = 65_535;

/// Zero-length chunk terminating a message.
pub const END_MARKER: [u8; 2] = [0x00, 0x00];

/// Default ceiling for a reassembled message.
const DEFAULT_MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

/// Codec translating between message payloads and chunked frames.
#[derive(Debug)]
pub struct ChunkCodec {
    max_message_size: usize,
    assembly: BytesMut,
}

impl ChunkCodec {
    /// Create a codec with the default message-size ceiling.
    pub fn new() -> Self {
        Self::with_max_message_size(DEFAULT_MAX_MESSAGE_SIZE)
    }

    /// Create a codec rejecting messages reassembling beyond
    /// `max_message_size` bytes.
    pub fn with_max_message_size(max_message_size: usize) -> Self {
        Self {
            max_message_size,
            assembly: BytesMut::with_capacity(4096),
        }
    }

    /// Frame `payload` into `dst`: length-prefixed chunks plus terminator.
    pub fn write_message(&self, payload: &[u8], dst: &mut BytesMut) {
        dst.reserve(payload.len() + (payload.len() / MAX_CHUNK_SIZE + 1) * 2 + 2);
        for chunk in payload.chunks(MAX_CHUNK_SIZE) {
            dst.put_u16(chunk.len() as u16);
            dst.put_slice(chunk);
        }
        dst.put_slice(&END_MARKER);
    }
}

impl Default for ChunkCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for ChunkCodec {
    type Item = BytesMut;
    type Error = BoltError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            if src.len() < 2 {
                return Ok(None);
            }

            let chunk_size = u16::from_be_bytes([src[0], src[1]]) as usize;

            if chunk_size == 0 {
                src.advance(2);
                if self.assembly.is_empty() {
                    // NOOP keep-alive, nothing to surface.
                    continue;
                }
                return Ok(Some(self.assembly.split()));
            }

            if src.len() < 2 + chunk_size {
                return Ok(None);
            }

            if self.assembly.len() + chunk_size > self.max_message_size {
                return Err(BoltError::Protocol(format!(
                    "message exceeds {} bytes while reassembling chunks",
                    self.max_message_size
                )));
            }

            src.advance(2);
            self.assembly.extend_from_slice(&src[..chunk_size]);
            src.advance(chunk_size);
        }
    }
}

impl<'a> Encoder<&'a [u8]> for ChunkCodec {
    type Error = BoltError;

    fn encode(&mut self, payload: &[u8], dst: &mut BytesMut) -> Result<(), Self::Error> {
        self.write_message(payload, dst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(payload: &[u8]) -> BytesMut {
        let mut codec = ChunkCodec::new();
        let mut out = BytesMut::new();
        codec.encode(payload, &mut out).unwrap();
        out
    }

    fn unframe_all(codec: &mut ChunkCodec, src: &mut BytesMut) -> Vec<Vec<u8>> {
        let mut out = Vec::new();
        while let Some(message) = codec.decode(src).unwrap() {
            out.push(message.to_vec());
        }
        out
    }

    #[test]
    fn test_small_message() {
        let out = frame(&[0xB0, 0x0F]);
        assert_eq!(&out[..], &[0x00, 0x02, 0xB0, 0x0F, 0x00, 0x00]);
    }

    #[test]
    fn test_exactly_one_chunk() {
        let payload = vec![0xAB; MAX_CHUNK_SIZE];
        let out = frame(&payload);
        // One full chunk plus terminator.
        assert_eq!(out.len(), 2 + MAX_CHUNK_SIZE + 2);
        assert_eq!(&out[0..2], &[0xFF, 0xFF]);
        assert_eq!(&out[out.len() - 2..], &END_MARKER);
    }

    #[test]
    fn test_one_byte_over_chunk_limit() {
        let payload = vec![0xCD; MAX_CHUNK_SIZE + 1];
        let out = frame(&payload);
        // 65535-byte chunk, 1-byte chunk, terminator.
        assert_eq!(out.len(), 2 + MAX_CHUNK_SIZE + 2 + 1 + 2);
        assert_eq!(&out[0..2], &[0xFF, 0xFF]);
        let second = 2 + MAX_CHUNK_SIZE;
        assert_eq!(&out[second..second + 2], &[0x00, 0x01]);
        assert_eq!(&out[out.len() - 2..], &END_MARKER);
    }

    #[test]
    fn test_roundtrip_large_message() {
        let payload: Vec<u8> = (0..70_000u32).map(|i| i as u8).collect();
        let mut framed = frame(&payload);

        let mut codec = ChunkCodec::new();
        let messages = unframe_all(&mut codec, &mut framed);
        assert_eq!(messages, vec![payload]);
        assert!(framed.is_empty());
    }

    #[test]
    fn test_partial_frames() {
        let framed = frame(b"hello bolt");
        let mut codec = ChunkCodec::new();
        let mut src = BytesMut::new();

        // Feed one byte at a time; nothing surfaces until the terminator.
        for (i, byte) in framed.iter().enumerate() {
            src.put_u8(*byte);
            let decoded = codec.decode(&mut src).unwrap();
            if i < framed.len() - 1 {
                assert!(decoded.is_none(), "surfaced early at byte {i}");
            } else {
                assert_eq!(decoded.unwrap().as_ref(), b"hello bolt");
            }
        }
    }

    #[test]
    fn test_concatenated_messages() {
        let mut src = frame(b"first");
        src.extend_from_slice(&frame(b"second"));
        src.extend_from_slice(&frame(b"third"));

        let mut codec = ChunkCodec::new();
        let messages = unframe_all(&mut codec, &mut src);
        assert_eq!(messages, vec![b"first".to_vec(), b"second".to_vec(), b"third".to_vec()]);
    }

    #[test]
    fn test_noop_skipped() {
        let mut src = BytesMut::new();
        src.put_slice(&END_MARKER); // empty message
        src.extend_from_slice(&frame(&[0x42]));

        let mut codec = ChunkCodec::new();
        let messages = unframe_all(&mut codec, &mut src);
        assert_eq!(messages, vec![vec![0x42]]);
    }

    #[test]
    fn test_message_split_across_chunks() {
        // Hand-framed: "ab" + "cd" in two chunks of one message.
        let mut src = BytesMut::new();
        src.put_slice(&[0x00, 0x02, b'a', b'b', 0x00, 0x02, b'c', b'd', 0x00, 0x00]);

        let mut codec = ChunkCodec::new();
        let messages = unframe_all(&mut codec, &mut src);
        assert_eq!(messages, vec![b"abcd".to_vec()]);
    }

    #[test]
    fn test_oversized_message_rejected() {
        let mut codec = ChunkCodec::with_max_message_size(8);
        let mut src = frame(&[0u8; 16]);
        let err = codec.decode(&mut src).unwrap_err();
        assert!(matches!(err, BoltError::Protocol(_)));
    }

    #[test]
    fn test_declared_size_larger_than_buffer_waits() {
        let mut codec = ChunkCodec::new();
        let mut src = BytesMut::new();
        src.put_slice(&[0x00, 0x10, 0x01]); // claims 16 bytes, only 1 present
        assert!(codec.decode(&mut src).unwrap().is_none());
        // Buffer untouched until the chunk completes.
        assert_eq!(src.len(), 3);
    }
}
