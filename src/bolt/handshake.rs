//! Bolt handshake: preamble exchange and version negotiation.
//!
//! The client opens with the 4-byte magic preamble followed by four 4-byte
//! version slots, each proposing a contiguous band of minor versions. The
//! server answers either with a single chosen version (legacy negotiation)
//! or, when it replies with the manifest sentinel, with a full list of
//! offered version bands that the client picks from and confirms.

use bytes::{Buf, BytesMut};

use super::error::{BoltError, BoltResult};
use super::version::BoltVersion;
use crate::transport::Transport;

/// The magic preamble every Bolt connection opens with.
pub const BOLT_MAGIC: [u8; 4] = [0x60, 0x60, 0xB0, 0x17];

/// Size of the client handshake message: magic + four version slots.
pub const HANDSHAKE_SIZE: usize = 20;

/// Size of the server's initial reply.
pub const HANDSHAKE_RESPONSE_SIZE: usize = 4;

/// Major byte a server uses to announce manifest-style negotiation.
pub const MANIFEST_MAJOR: u8 = 0xFF;

/// A contiguous band of minor versions: `major.(minor-range) ..= major.minor`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionRange {
    /// Major version of the band.
    pub major: u8,
    /// Highest minor version in the band.
    pub minor: u8,
    /// How many earlier minors the band also covers.
    pub range: u8,
}

impl VersionRange {
    /// Create a band.
    pub const fn new(major: u8, minor: u8, range: u8) -> Self {
        Self {
            major,
            minor,
            range,
        }
    }

    /// Wire form `[minor, range, 0, major]`.
    pub fn to_bytes(self) -> [u8; 4] {
        [self.minor, self.range, 0, self.major]
    }

    /// Parse a band from its wire form.
    pub fn from_bytes(bytes: [u8; 4]) -> Self {
        Self::new(bytes[3], bytes[0], bytes[1])
    }

    /// Whether `version` falls inside the band.
    pub fn covers(self, version: BoltVersion) -> bool {
        self.major == version.major
            && version.minor <= self.minor
            && version.minor >= self.minor.saturating_sub(self.range)
    }

    /// Minor versions in the band, highest first.
    pub fn minors_high_to_low(self) -> impl Iterator<Item = u8> {
        let low = self.minor.saturating_sub(self.range);
        (low..=self.minor).rev()
    }
}

/// Version bands the client proposes, in preference order (highest first).
pub const CLIENT_PROPOSALS: [VersionRange; 4] = [
    VersionRange::new(5, 6, 6), // Bolt 5.0 ..= 5.6
    VersionRange::new(4, 4, 2), // Bolt 4.2 ..= 4.4
    VersionRange::new(4, 1, 1), // Bolt 4.0 ..= 4.1
    VersionRange::new(3, 0, 0), // Bolt 3.0
];

/// Build the 20-byte client handshake: magic plus four proposal slots.
/// Unused slots stay zeroed.
pub fn build_handshake() -> [u8; HANDSHAKE_SIZE] {
    let mut message = [0u8; HANDSHAKE_SIZE];
    message[0..4].copy_from_slice(&BOLT_MAGIC);
    for (i, proposal) in CLIENT_PROPOSALS.iter().enumerate() {
        let offset = 4 + i * 4;
        message[offset..offset + 4].copy_from_slice(&proposal.to_bytes());
    }
    message
}

/// How the server's 4-byte reply is to be read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ServerReply {
    /// Legacy negotiation settled on this version.
    Negotiated(BoltVersion),
    /// A manifest (count + offerings + capability mask) follows.
    ManifestFollows { style: u8 },
    /// All proposals rejected.
    Rejected,
}

fn classify_reply(bytes: [u8; 4]) -> ServerReply {
    match bytes[3] {
        0 => ServerReply::Rejected,
        MANIFEST_MAJOR => ServerReply::ManifestFollows { style: bytes[0] },
        _ => ServerReply::Negotiated(BoltVersion::new(bytes[3], bytes[0])),
    }
}

/// Pick the highest client-supported version covered by some server
/// offering: proposals are walked highest first, minors within each band
/// high to low.
pub fn select_from_manifest(offerings: &[VersionRange]) -> Option<BoltVersion> {
    for proposal in &CLIENT_PROPOSALS {
        for minor in proposal.minors_high_to_low() {
            let candidate = BoltVersion::new(proposal.major, minor);
            if offerings.iter().any(|offer| offer.covers(candidate)) {
                return Some(candidate);
            }
        }
    }
    None
}

/// Decode an LEB128 varint from the front of `buf`, consuming it.
/// Returns `None` while the encoding is still incomplete.
fn take_varint(buf: &mut BytesMut) -> BoltResult<Option<u64>> {
    let mut value: u64 = 0;
    let mut shift = 0u32;
    for (i, &byte) in buf.iter().enumerate() {
        if shift >= 64 {
            return Err(BoltError::Protocol(
                "manifest varint exceeds 64 bits".to_string(),
            ));
        }
        value |= u64::from(byte & 0x7F) << shift;
        if byte & 0x80 == 0 {
            buf.advance(i + 1);
            return Ok(Some(value));
        }
        shift += 7;
    }
    Ok(None)
}

/// Incremental reader over a transport, buffering partial receives.
struct Feed<'a, T: Transport> {
    transport: &'a mut T,
    buf: BytesMut,
}

impl<'a, T: Transport> Feed<'a, T> {
    fn new(transport: &'a mut T) -> Self {
        Self {
            transport,
            buf: BytesMut::with_capacity(256),
        }
    }

    async fn fill(&mut self) -> BoltResult<()> {
        let chunk = self.transport.receive(4096).await?;
        if chunk.is_empty() {
            return Err(BoltError::Connection(
                "connection closed during handshake".to_string(),
            ));
        }
        self.buf.extend_from_slice(&chunk);
        Ok(())
    }

    async fn take_exact<const N: usize>(&mut self) -> BoltResult<[u8; N]> {
        while self.buf.len() < N {
            self.fill().await?;
        }
        let mut out = [0u8; N];
        out.copy_from_slice(&self.buf[..N]);
        self.buf.advance(N);
        Ok(out)
    }

    async fn take_varint(&mut self) -> BoltResult<u64> {
        loop {
            if let Some(value) = take_varint(&mut self.buf)? {
                return Ok(value);
            }
            self.fill().await?;
        }
    }
}

/// Drive the full handshake over `transport` and return the negotiated
/// version.
pub async fn negotiate<T: Transport>(transport: &mut T) -> BoltResult<BoltVersion> {
    transport.send(&build_handshake()).await?;

    let mut feed = Feed::new(transport);
    let reply: [u8; HANDSHAKE_RESPONSE_SIZE] = feed.take_exact().await?;

    match classify_reply(reply) {
        ServerReply::Rejected => Err(BoltError::Connection(
            "Server rejected all protocol versions".to_string(),
        )),
        ServerReply::Negotiated(version) => {
            tracing::debug!(%version, "negotiated Bolt version");
            Ok(version)
        }
        ServerReply::ManifestFollows { style } => {
            if style != 1 {
                return Err(BoltError::Protocol(format!(
                    "unsupported negotiation manifest style {style}"
                )));
            }
            let count = feed.take_varint().await?;
            let mut offerings = Vec::with_capacity(count.min(64) as usize);
            for _ in 0..count {
                offerings.push(VersionRange::from_bytes(feed.take_exact().await?));
            }
            // Capability mask: consumed, no bits assigned yet.
            let _capabilities = feed.take_varint().await?;

            match select_from_manifest(&offerings) {
                Some(version) => {
                    transport.send(&version.encode()).await?;
                    tracing::debug!(%version, "negotiated Bolt version from manifest");
                    Ok(version)
                }
                None => {
                    transport.send(&[0, 0, 0, 0]).await?;
                    Err(BoltError::Connection(
                        "No mutually supported Bolt version found".to_string(),
                    ))
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::testing::ScriptedTransport;

    #[test]
    fn test_build_handshake_layout() {
        let message = build_handshake();
        assert_eq!(message.len(), 20);
        assert_eq!(&message[0..4], &[0x60, 0x60, 0xB0, 0x17]);
        assert_eq!(&message[4..8], &[6, 6, 0, 5]); // 5.0..=5.6
        assert_eq!(&message[8..12], &[4, 2, 0, 4]); // 4.2..=4.4
        assert_eq!(&message[12..16], &[1, 1, 0, 4]); // 4.0..=4.1
        assert_eq!(&message[16..20], &[0, 0, 0, 3]); // 3.0
    }

    #[test]
    fn test_classify_reply() {
        assert_eq!(classify_reply([0, 0, 0, 0]), ServerReply::Rejected);
        assert_eq!(
            classify_reply([4, 0, 0, 5]),
            ServerReply::Negotiated(BoltVersion::V5_4)
        );
        assert_eq!(
            classify_reply([1, 0, 0, 0xFF]),
            ServerReply::ManifestFollows { style: 1 }
        );
    }

    #[test]
    fn test_range_covers() {
        let band = VersionRange::new(4, 4, 2);
        assert!(band.covers(BoltVersion::V4_4));
        assert!(band.covers(BoltVersion::V4_3));
        assert!(band.covers(BoltVersion::V4_2));
        assert!(!band.covers(BoltVersion::V4_1));
        assert!(!band.covers(BoltVersion::V5_0));
        assert_eq!(
            band.minors_high_to_low().collect::<Vec<_>>(),
            vec![4, 3, 2]
        );
    }

    #[test]
    fn test_select_highest_overlap() {
        // Server offers everything in 5.x: client takes its own max, 5.6.
        let offerings = vec![VersionRange::new(5, 6, 6)];
        assert_eq!(select_from_manifest(&offerings), Some(BoltVersion::V5_6));

        // Server stops at 5.3: client walks its band down to 5.3.
        let offerings = vec![VersionRange::new(5, 3, 3)];
        assert_eq!(select_from_manifest(&offerings), Some(BoltVersion::V5_3));

        // Only 4.x on offer.
        let offerings = vec![VersionRange::new(4, 4, 4)];
        assert_eq!(select_from_manifest(&offerings), Some(BoltVersion::V4_4));

        // Nothing the client speaks.
        let offerings = vec![VersionRange::new(6, 0, 0), VersionRange::new(2, 0, 0)];
        assert_eq!(select_from_manifest(&offerings), None);

        assert_eq!(select_from_manifest(&[]), None);
    }

    #[test]
    fn test_varint() {
        let mut buf = BytesMut::from(&[0x05][..]);
        assert_eq!(take_varint(&mut buf).unwrap(), Some(5));
        assert!(buf.is_empty());

        // 300 = 0xAC 0x02
        let mut buf = BytesMut::from(&[0xAC, 0x02, 0xFF][..]);
        assert_eq!(take_varint(&mut buf).unwrap(), Some(300));
        assert_eq!(&buf[..], &[0xFF]);

        // Incomplete: continuation bit set with no following byte yet.
        let mut buf = BytesMut::from(&[0x80][..]);
        assert_eq!(take_varint(&mut buf).unwrap(), None);
        assert_eq!(buf.len(), 1);

        // Overlong encodings are rejected.
        let mut buf = BytesMut::from(&[0xFF; 11][..]);
        assert!(take_varint(&mut buf).is_err());
    }

    #[tokio::test]
    async fn test_negotiate_legacy() {
        let mut t = ScriptedTransport::new();
        t.server_sends(vec![4, 0, 0, 5]);

        let version = negotiate(&mut t).await.unwrap();
        assert_eq!(version, BoltVersion::V5_4);
        assert_eq!(t.outbound.len(), HANDSHAKE_SIZE);
        assert_eq!(&t.outbound[0..4], &BOLT_MAGIC);
    }

    #[tokio::test]
    async fn test_negotiate_legacy_split_reply() {
        // Reply dribbles in two bytes at a time.
        let mut t = ScriptedTransport::new();
        t.server_sends(vec![3, 0]);
        t.server_sends(vec![0, 5]);

        let version = negotiate(&mut t).await.unwrap();
        assert_eq!(version, BoltVersion::V5_3);
    }

    #[tokio::test]
    async fn test_negotiate_rejection() {
        let mut t = ScriptedTransport::new();
        t.server_sends(vec![0, 0, 0, 0]);

        let err = negotiate(&mut t).await.unwrap_err();
        match err {
            BoltError::Connection(msg) => {
                assert_eq!(msg, "Server rejected all protocol versions")
            }
            other => panic!("expected Connection error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_negotiate_manifest() {
        let mut t = ScriptedTransport::new();
        let mut reply = vec![1, 0, 0, 0xFF]; // manifest style 1
        reply.push(2); // two offerings
        reply.extend_from_slice(&[6, 2, 0, 5]); // 5.4..=5.6
        reply.extend_from_slice(&[4, 4, 0, 4]); // 4.0..=4.4
        reply.push(0); // capability mask
        t.server_sends(reply);

        let version = negotiate(&mut t).await.unwrap();
        assert_eq!(version, BoltVersion::V5_6);
        // Confirmation written back after the 20-byte proposal.
        assert_eq!(&t.outbound[HANDSHAKE_SIZE..], &[6, 0, 0, 5]);
    }

    #[tokio::test]
    async fn test_negotiate_manifest_no_overlap() {
        let mut t = ScriptedTransport::new();
        let mut reply = vec![1, 0, 0, 0xFF];
        reply.push(1);
        reply.extend_from_slice(&[0, 0, 0, 6]); // only 6.0
        reply.push(0);
        t.server_sends(reply);

        let err = negotiate(&mut t).await.unwrap_err();
        match err {
            BoltError::Connection(msg) => {
                assert_eq!(msg, "No mutually supported Bolt version found")
            }
            other => panic!("expected Connection error, got {other:?}"),
        }
        assert_eq!(&t.outbound[HANDSHAKE_SIZE..], &[0, 0, 0, 0]);
    }

    #[tokio::test]
    async fn test_negotiate_manifest_zero_offerings() {
        let mut t = ScriptedTransport::new();
        t.server_sends(vec![1, 0, 0, 0xFF, 0, 0]); // zero offerings, empty mask

        let err = negotiate(&mut t).await.unwrap_err();
        assert!(matches!(err, BoltError::Connection(_)));
    }

    #[tokio::test]
    async fn test_negotiate_manifest_unknown_style() {
        let mut t = ScriptedTransport::new();
        t.server_sends(vec![2, 0, 0, 0xFF]);

        let err = negotiate(&mut t).await.unwrap_err();
        assert!(matches!(err, BoltError::Protocol(_)));
    }
}
