use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Network identity of one replica.
///
/// Supplied once at startup and never changed; a handle keeps talking to the
/// same address across reconnects.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct ReplicaAddr {
    pub host: String,
    pub port: u16,
}

impl ReplicaAddr {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for ReplicaAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

impl FromStr for ReplicaAddr {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (host, port) = s
            .rsplit_once(':')
            .ok_or_else(|| format!("missing port in replica address '{}'", s))?;

        let host = host.trim_start_matches('[').trim_end_matches(']');
        if host.is_empty() {
            return Err(format!("missing host in replica address '{}'", s));
        }

        let port: u16 = port
            .parse()
            .map_err(|_| format!("invalid port in replica address '{}'", s))?;
        if port == 0 {
            return Err(format!("port 0 is not a valid replica port ('{}')", s));
        }

        Ok(Self::new(host, port))
    }
}

/// Longest reply line accepted from a replica, terminator included.
pub const DEFAULT_MAX_REPLY_BYTES: u64 = 16 * 1024 * 1024;

/// Deadlines and limits applied by every handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplicaOptions {
    pub connect_timeout: Duration,
    /// Bounds the wait for the handle as well as each exchange.
    pub request_timeout: Duration,
    pub max_reply_bytes: u64,
}

impl Default for ReplicaOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(2),
            request_timeout: Duration::from_secs(5),
            max_reply_bytes: DEFAULT_MAX_REPLY_BYTES,
        }
    }
}

/// Failures talking to a single replica.
///
/// These never leave the fan-out loop; the reducer logs them and drops that
/// replica from the aggregate.
#[derive(Debug, thiserror::Error)]
pub enum ReplicaError {
    #[error("could not connect to replica {addr}: {source}")]
    Connect {
        addr: ReplicaAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("i/o failure talking to replica {addr}: {source}")]
    Io {
        addr: ReplicaAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("replica {addr} did not answer within {after:?}")]
    Timeout { addr: ReplicaAddr, after: Duration },

    #[error("replica {addr} closed the connection before replying")]
    Closed { addr: ReplicaAddr },

    #[error("reply from replica {addr} exceeds {limit} bytes")]
    Oversized { addr: ReplicaAddr, limit: u64 },

    #[error("handle for replica {addr} has been closed")]
    NotConnected { addr: ReplicaAddr },
}

impl ReplicaError {
    pub fn addr(&self) -> &ReplicaAddr {
        match self {
            ReplicaError::Connect { addr, .. }
            | ReplicaError::Io { addr, .. }
            | ReplicaError::Timeout { addr, .. }
            | ReplicaError::Closed { addr }
            | ReplicaError::Oversized { addr, .. }
            | ReplicaError::NotConnected { addr } => addr,
        }
    }
}

/// Point-in-time copy of a handle's counters, used by the stats reporter.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReplicaStatsSnapshot {
    pub addr: ReplicaAddr,
    pub connected: bool,
    pub requests: u64,
    pub failures: u64,
    pub reconnects: u64,
    pub timeouts: u64,
}
