//! Bolt protocol version model.
//!
//! A Bolt version is a `(major, minor)` pair, totally ordered. On the wire a
//! version occupies four bytes laid out as `[minor, range, 0, major]`, where
//! `range` lets a peer propose a contiguous band of minor versions ending at
//! `minor`. The capability set of a connection is derived purely from the
//! negotiated version.

use std::fmt;

/// A Bolt protocol version.
///
/// `(0, 0)` is reserved and means "not negotiated yet"; [`BoltVersion::parse`]
/// never produces it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct BoltVersion {
    /// Major version number.
    pub major: u8,
    /// Minor version number.
    pub minor: u8,
}

impl BoltVersion {
    /// Bolt 3.0 (Neo4j 3.5) - explicit transactions, GOODBYE
    pub const V3_0: BoltVersion = BoltVersion::new(3, 0);
    /// Bolt 4.0 (Neo4j 4.0) - reactive streaming, query ids, multi-database
    pub const V4_0: BoltVersion = BoltVersion::new(4, 0);
    /// Bolt 4.1 (Neo4j 4.1) - routing context in HELLO
    pub const V4_1: BoltVersion = BoltVersion::new(4, 1);
    /// Bolt 4.2 (Neo4j 4.2)
    pub const V4_2: BoltVersion = BoltVersion::new(4, 2);
    /// Bolt 4.3 (Neo4j 4.3) - ROUTE message
    pub const V4_3: BoltVersion = BoltVersion::new(4, 3);
    /// Bolt 4.4 (Neo4j 4.4) - impersonation
    pub const V4_4: BoltVersion = BoltVersion::new(4, 4);
    /// Bolt 5.0 (Neo4j 5.0) - element ids
    pub const V5_0: BoltVersion = BoltVersion::new(5, 0);
    /// Bolt 5.1 - LOGON/LOGOFF re-authentication
    pub const V5_1: BoltVersion = BoltVersion::new(5, 1);
    /// Bolt 5.2 - notification filtering
    pub const V5_2: BoltVersion = BoltVersion::new(5, 2);
    /// Bolt 5.3 - bolt agent metadata
    pub const V5_3: BoltVersion = BoltVersion::new(5, 3);
    /// Bolt 5.4 - TELEMETRY message
    pub const V5_4: BoltVersion = BoltVersion::new(5, 4);
    /// Bolt 5.5
    pub const V5_5: BoltVersion = BoltVersion::new(5, 5);
    /// Bolt 5.6
    pub const V5_6: BoltVersion = BoltVersion::new(5, 6);

    /// The reserved "not negotiated" version.
    pub const UNINITIALIZED: BoltVersion = BoltVersion::new(0, 0);

    /// Create a version from its parts.
    pub const fn new(major: u8, minor: u8) -> Self {
        Self { major, minor }
    }

    /// Encode as the 4-byte wire form `[minor, 0, 0, major]`.
    pub fn encode(self) -> [u8; 4] {
        self.encode_with_range(0)
    }

    /// Encode as `[minor, range, 0, major]`, proposing the minor band
    /// `minor - range ..= minor`.
    pub fn encode_with_range(self, range: u8) -> [u8; 4] {
        [self.minor, range, 0, self.major]
    }

    /// Parse a 4-byte wire version. Returns `None` for the all-zero
    /// "no version" reply (major byte 0).
    pub fn parse(bytes: [u8; 4]) -> Option<Self> {
        let major = bytes[3];
        if major == 0 {
            return None;
        }
        Some(Self::new(major, bytes[0]))
    }

    /// Whether this is the reserved uninitialized version.
    pub fn is_uninitialized(self) -> bool {
        self == Self::UNINITIALIZED
    }

    /// Derive the capability set for this version.
    pub fn capabilities(self) -> BoltCapabilities {
        BoltCapabilities::for_version(self)
    }

    /// Reactive streaming with `n`-bounded PULL/DISCARD (4.0+).
    pub fn supports_streaming(self) -> bool {
        self >= Self::V4_0
    }

    /// Query ids for interleaved result streams (4.0+).
    pub fn supports_query_ids(self) -> bool {
        self >= Self::V4_0
    }

    /// Server notifications in SUCCESS metadata (4.1+).
    pub fn supports_notifications(self) -> bool {
        self >= Self::V4_1
    }

    /// The ROUTE message (4.3+).
    pub fn supports_routing(self) -> bool {
        self >= Self::V4_3
    }

    /// Impersonated users in BEGIN/RUN/ROUTE (4.4+).
    pub fn supports_impersonation(self) -> bool {
        self >= Self::V4_4
    }

    /// LOGON/LOGOFF re-authentication; credentials leave HELLO (5.1+).
    pub fn supports_reauth(self) -> bool {
        self >= Self::V5_1
    }

    /// Notification severity/category filtering (5.2+).
    pub fn supports_notification_filtering(self) -> bool {
        self >= Self::V5_2
    }

    /// The TELEMETRY message (5.4+).
    pub fn supports_telemetry(self) -> bool {
        self >= Self::V5_4
    }
}

impl fmt::Display for BoltVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// The feature set a negotiated version unlocks.
///
/// Grows monotonically with the version: everything available at version `v`
/// is still available at any `v' > v`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoltCapabilities {
    /// Explicit BEGIN/COMMIT/ROLLBACK transactions.
    pub transactions: bool,
    /// Bookmark passing and tracking.
    pub bookmarks: bool,
    /// `n`-bounded PULL/DISCARD streaming.
    pub streaming: bool,
    /// Query ids distinguishing interleaved result streams.
    pub query_id: bool,
    /// Notifications in SUCCESS metadata.
    pub notifications: bool,
    /// The ROUTE message.
    pub routing: bool,
    /// LOGON/LOGOFF re-authentication.
    pub reauth: bool,
    /// Notification severity/category filtering.
    pub notification_filtering: bool,
    /// The TELEMETRY message.
    pub telemetry: bool,
}

impl BoltCapabilities {
    /// Derive the capability set for `version`.
    pub fn for_version(version: BoltVersion) -> Self {
        Self {
            transactions: true,
            bookmarks: true,
            streaming: version.supports_streaming(),
            query_id: version.supports_query_ids(),
            notifications: version.supports_notifications(),
            routing: version.supports_routing(),
            reauth: version.supports_reauth(),
            notification_filtering: version.supports_notification_filtering(),
            telemetry: version.supports_telemetry(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_versions() -> Vec<BoltVersion> {
        vec![
            BoltVersion::V3_0,
            BoltVersion::V4_0,
            BoltVersion::V4_1,
            BoltVersion::V4_2,
            BoltVersion::V4_3,
            BoltVersion::V4_4,
            BoltVersion::V5_0,
            BoltVersion::V5_1,
            BoltVersion::V5_2,
            BoltVersion::V5_3,
            BoltVersion::V5_4,
            BoltVersion::V5_5,
            BoltVersion::V5_6,
        ]
    }

    #[test]
    fn test_version_ordering() {
        assert!(BoltVersion::V5_0 > BoltVersion::V4_4);
        assert!(BoltVersion::V4_4 > BoltVersion::V4_3);
        assert!(BoltVersion::V5_6 > BoltVersion::V5_1);
        assert!(BoltVersion::V3_0 < BoltVersion::V4_0);

        let versions = all_versions();
        for pair in versions.windows(2) {
            assert!(pair[0] < pair[1]);
        }
    }

    #[test]
    fn test_version_encode() {
        assert_eq!(BoltVersion::V5_4.encode(), [4, 0, 0, 5]);
        assert_eq!(BoltVersion::V4_3.encode(), [3, 0, 0, 4]);
        assert_eq!(BoltVersion::V3_0.encode(), [0, 0, 0, 3]);
    }

    #[test]
    fn test_version_encode_with_range() {
        assert_eq!(BoltVersion::V5_6.encode_with_range(6), [6, 6, 0, 5]);
        assert_eq!(BoltVersion::V4_4.encode_with_range(2), [4, 2, 0, 4]);
    }

    #[test]
    fn test_version_parse() {
        assert_eq!(BoltVersion::parse([4, 0, 0, 5]), Some(BoltVersion::V5_4));
        assert_eq!(BoltVersion::parse([0, 0, 0, 3]), Some(BoltVersion::V3_0));
        assert_eq!(BoltVersion::parse([0, 0, 0, 0]), None);
    }

    #[test]
    fn test_encode_parse_roundtrip() {
        for v in all_versions() {
            assert_eq!(BoltVersion::parse(v.encode()), Some(v));
        }
    }

    #[test]
    fn test_version_display() {
        assert_eq!(BoltVersion::V4_3.to_string(), "4.3");
        assert_eq!(BoltVersion::V5_6.to_string(), "5.6");
    }

    #[test]
    fn test_uninitialized() {
        assert!(BoltVersion::default().is_uninitialized());
        assert!(!BoltVersion::V3_0.is_uninitialized());
    }

    #[test]
    fn test_capability_thresholds() {
        let v3 = BoltVersion::V3_0.capabilities();
        assert!(v3.transactions);
        assert!(v3.bookmarks);
        assert!(!v3.streaming);
        assert!(!v3.routing);

        let v40 = BoltVersion::V4_0.capabilities();
        assert!(v40.streaming);
        assert!(v40.query_id);
        assert!(!v40.notifications);

        let v43 = BoltVersion::V4_3.capabilities();
        assert!(v43.routing);
        assert!(!v43.reauth);

        let v51 = BoltVersion::V5_1.capabilities();
        assert!(v51.reauth);
        assert!(!v51.notification_filtering);

        let v54 = BoltVersion::V5_4.capabilities();
        assert!(v54.telemetry);
        assert!(v54.routing);
        assert!(v54.notification_filtering);
    }

    #[test]
    fn test_capabilities_monotone() {
        fn count(c: BoltCapabilities) -> u32 {
            [
                c.transactions,
                c.bookmarks,
                c.streaming,
                c.query_id,
                c.notifications,
                c.routing,
                c.reauth,
                c.notification_filtering,
                c.telemetry,
            ]
            .iter()
            .filter(|&&b| b)
            .count() as u32
        }

        fn subset(lo: BoltCapabilities, hi: BoltCapabilities) -> bool {
            (!lo.transactions || hi.transactions)
                && (!lo.bookmarks || hi.bookmarks)
                && (!lo.streaming || hi.streaming)
                && (!lo.query_id || hi.query_id)
                && (!lo.notifications || hi.notifications)
                && (!lo.routing || hi.routing)
                && (!lo.reauth || hi.reauth)
                && (!lo.notification_filtering || hi.notification_filtering)
                && (!lo.telemetry || hi.telemetry)
        }

        let versions = all_versions();
        for lo in &versions {
            for hi in &versions {
                if hi >= lo {
                    assert!(
                        subset(lo.capabilities(), hi.capabilities()),
                        "capabilities of {} not a subset of {}",
                        lo,
                        hi
                    );
                    assert!(count(lo.capabilities()) <= count(hi.capabilities()));
                }
            }
        }
    }
}
