//! Certificate trust policy for encrypted transports.
//!
//! The protocol core never inspects certificates itself; a TLS transport
//! calls into a [`CertificateValidator`] at handshake time with the peer's
//! SHA-1 fingerprint. Strategies range from trusting the system roots to a
//! trust-on-first-use file keyed by `host:port`.

use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use crate::bolt::error::{BoltError, BoltResult};

// Serialises read-modify-write cycles on known-hosts files within this
// process; the atomic rename below covers everything else.
static KNOWN_HOSTS_LOCK: Mutex<()> = Mutex::new(());

/// How a TLS transport decides whether to trust a server certificate.
#[derive(Debug, Clone, Default)]
pub enum TrustStrategy {
    /// Only certificates signed by the system root store.
    #[default]
    SystemCertificates,
    /// Trust anything presented. Development use only.
    TrustAll,
    /// Trust only certificates matching one of these SHA-1 fingerprints
    /// (lower-case hex).
    Pinned(Vec<String>),
    /// Trust the first certificate seen per `host:port` and persist it to
    /// the file at this path.
    TrustOnFirstUse(PathBuf),
}

/// Validator handed to the TLS layer.
#[derive(Debug)]
pub struct CertificateValidator {
    hostname: String,
    port: u16,
    strategy: TrustStrategy,
}

impl CertificateValidator {
    /// Create a validator for a `hostname:port` endpoint.
    pub fn new(hostname: impl Into<String>, port: u16, strategy: TrustStrategy) -> Self {
        Self {
            hostname: hostname.into(),
            port,
            strategy,
        }
    }

    /// Whether a certificate with `sha1_hex` may be trusted for this
    /// endpoint, beyond what the chain validation already established.
    pub fn should_trust(&self, chain_valid: bool, sha1_hex: &str) -> BoltResult<bool> {
        match &self.strategy {
            TrustStrategy::SystemCertificates => Ok(chain_valid),
            TrustStrategy::TrustAll => Ok(true),
            TrustStrategy::Pinned(fingerprints) => Ok(fingerprints
                .iter()
                .any(|f| f.eq_ignore_ascii_case(sha1_hex))),
            TrustStrategy::TrustOnFirstUse(path) => {
                let store = KnownHosts::load(path)?;
                match store.get(&self.hostname, self.port) {
                    Some(known) => Ok(known.eq_ignore_ascii_case(sha1_hex)),
                    None => Ok(true),
                }
            }
        }
    }

    /// Record that a certificate was trusted, persisting it for
    /// trust-on-first-use.
    pub fn did_trust(&self, sha1_hex: &str) -> BoltResult<()> {
        if let TrustStrategy::TrustOnFirstUse(path) = &self.strategy {
            KnownHosts::record(path, &self.hostname, self.port, sha1_hex)?;
        }
        Ok(())
    }
}

/// Persisted `host:port -> sha1-hex` store for trust-on-first-use.
#[derive(Debug, Default)]
pub struct KnownHosts {
    entries: HashMap<String, String>,
}

impl KnownHosts {
    /// Load the store; a missing file is an empty store.
    pub fn load(path: &Path) -> BoltResult<Self> {
        let _guard = KNOWN_HOSTS_LOCK.lock();
        Self::load_unlocked(path)
    }

    fn load_unlocked(path: &Path) -> BoltResult<Self> {
        let mut entries = HashMap::new();
        match fs::read_to_string(path) {
            Ok(contents) => {
                for line in contents.lines() {
                    let line = line.trim();
                    if line.is_empty() || line.starts_with('#') {
                        continue;
                    }
                    if let Some((endpoint, fingerprint)) = line.split_once(' ') {
                        entries.insert(endpoint.to_string(), fingerprint.to_string());
                    }
                }
                Ok(Self { entries })
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(BoltError::Service(format!(
                "cannot read known-hosts file {}: {e}",
                path.display()
            ))),
        }
    }

    /// The stored fingerprint for an endpoint.
    pub fn get(&self, hostname: &str, port: u16) -> Option<&str> {
        self.entries
            .get(&format!("{hostname}:{port}"))
            .map(String::as_str)
    }

    /// Number of stored endpoints.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the store has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Record a fingerprint for an endpoint. Performs a read-modify-write
    /// under the store lock with an atomic replace; an existing entry is
    /// never overwritten.
    pub fn record(path: &Path, hostname: &str, port: u16, sha1_hex: &str) -> BoltResult<()> {
        let _guard = KNOWN_HOSTS_LOCK.lock();

        let mut store = Self::load_unlocked(path)?;
        let endpoint = format!("{hostname}:{port}");
        if store.entries.contains_key(&endpoint) {
            return Ok(());
        }
        store
            .entries
            .insert(endpoint, sha1_hex.to_ascii_lowercase());

        let mut lines: Vec<String> = store
            .entries
            .iter()
            .map(|(endpoint, fingerprint)| format!("{endpoint} {fingerprint}"))
            .collect();
        lines.sort();

        let tmp = path.with_extension("tmp");
        let write = || -> std::io::Result<()> {
            let mut file = fs::File::create(&tmp)?;
            for line in &lines {
                writeln!(file, "{line}")?;
            }
            file.sync_all()?;
            fs::rename(&tmp, path)
        };
        write().map_err(|e| {
            BoltError::Service(format!(
                "cannot update known-hosts file {}: {e}",
                path.display()
            ))
        })
    }
}
