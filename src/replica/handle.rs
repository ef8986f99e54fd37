//! Connection Handle
//!
//! A reliable request/response channel to one replica. Each handle owns at most
//! one live `ReplicaConnection` behind an async mutex, so concurrent reduction
//! sessions can share the handle list without interleaving their exchanges on
//! the same socket.
//!
//! ## Retry contract
//! A failed attempt (I/O error, peer close, or deadline expiry) drops the socket,
//! reconnects to the same address and retries the same line exactly once. A
//! second failure is returned to the caller.
//!
//! Waiting for the handle is bounded by the request deadline too: a caller that
//! cannot get the socket in time gets `Timeout` and never touches the wire.

use super::connection::ReplicaConnection;
use super::types::{ReplicaAddr, ReplicaError, ReplicaOptions, ReplicaStatsSnapshot};

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;

const PING: &str = "PING";
const PONG: &str = "PONG";

#[derive(Debug, Default)]
struct ReplicaStats {
    requests: AtomicU64,
    failures: AtomicU64,
    reconnects: AtomicU64,
    timeouts: AtomicU64,
    connected: AtomicBool,
}

pub struct ReplicaHandle {
    addr: ReplicaAddr,
    options: ReplicaOptions,
    conn: Mutex<Option<ReplicaConnection>>,
    closed: AtomicBool,
    stats: ReplicaStats,
}

impl ReplicaHandle {
    /// Opens the socket immediately; fails if the replica is unreachable.
    pub async fn open(addr: ReplicaAddr, options: ReplicaOptions) -> Result<Arc<Self>, ReplicaError> {
        let conn = ReplicaConnection::open(&addr, options.connect_timeout).await?;
        let handle = Self::with_connection(addr, options, Some(conn));
        handle.stats.connected.store(true, Ordering::Relaxed);
        Ok(Arc::new(handle))
    }

    /// Creates a handle with no socket yet. The first request opens it.
    pub fn detached(addr: ReplicaAddr, options: ReplicaOptions) -> Arc<Self> {
        Arc::new(Self::with_connection(addr, options, None))
    }

    /// Tries to open the socket and falls back to a detached handle.
    ///
    /// A reachable replica is probed with `PING`; an unexpected answer is only
    /// logged.
    pub async fn connect(addr: ReplicaAddr, options: ReplicaOptions) -> Arc<Self> {
        match Self::open(addr.clone(), options).await {
            Ok(handle) => {
                match handle.ping().await {
                    Ok(true) => tracing::info!("Replica {} is up", addr),
                    Ok(false) => tracing::warn!("Replica {} answered PING unexpectedly", addr),
                    Err(e) => tracing::warn!("Health probe for replica {} failed: {}", addr, e),
                }
                handle
            }
            Err(e) => {
                tracing::warn!(
                    "Replica {} unreachable at startup, will connect on first request: {}",
                    addr,
                    e
                );
                Self::detached(addr, options)
            }
        }
    }

    fn with_connection(
        addr: ReplicaAddr,
        options: ReplicaOptions,
        conn: Option<ReplicaConnection>,
    ) -> Self {
        Self {
            addr,
            options,
            conn: Mutex::new(conn),
            closed: AtomicBool::new(false),
            stats: ReplicaStats::default(),
        }
    }

    pub fn addr(&self) -> &ReplicaAddr {
        &self.addr
    }

    /// Sends one line and waits for one reply line.
    ///
    /// The lock is held for the whole exchange including the retry, so replies
    /// always pair with the request that produced them.
    pub async fn request(&self, line: &str) -> Result<String, ReplicaError> {
        if self.is_closed() {
            return Err(self.not_connected());
        }

        let wait = tokio::time::timeout(self.options.request_timeout, self.conn.lock()).await;
        self.stats.requests.fetch_add(1, Ordering::Relaxed);

        let Ok(mut slot) = wait else {
            let e = self.timeout_error(self.options.request_timeout);
            tracing::warn!("Replica {} busy, skipping request: {}", self.addr, e);
            self.count_timeout(&e);
            self.stats.failures.fetch_add(1, Ordering::Relaxed);
            return Err(e);
        };

        if self.is_closed() {
            return Err(self.not_connected());
        }

        let first = match self.attempt(&mut slot, line).await {
            Ok(reply) => return Ok(reply),
            Err(e) => e,
        };

        tracing::warn!("Request to replica {} failed, reconnecting: {}", self.addr, first);
        self.stats.reconnects.fetch_add(1, Ordering::Relaxed);

        match self.attempt(&mut slot, line).await {
            Ok(reply) => {
                tracing::info!("Reconnected to replica {}", self.addr);
                Ok(reply)
            }
            Err(e) => {
                self.stats.failures.fetch_add(1, Ordering::Relaxed);
                Err(e)
            }
        }
    }

    /// One try: open the socket if there is none, then exchange under the
    /// request deadline. Any failure leaves the slot empty.
    async fn attempt(
        &self,
        slot: &mut Option<ReplicaConnection>,
        line: &str,
    ) -> Result<String, ReplicaError> {
        if slot.is_none() {
            match ReplicaConnection::open(&self.addr, self.options.connect_timeout).await {
                Ok(fresh) => {
                    *slot = Some(fresh);
                    self.stats.connected.store(true, Ordering::Relaxed);
                }
                Err(e) => {
                    self.stats.connected.store(false, Ordering::Relaxed);
                    self.count_timeout(&e);
                    return Err(e);
                }
            }
        }

        let Some(conn) = slot.as_mut() else {
            return Err(self.not_connected());
        };

        let exchange = conn.exchange(line, self.options.max_reply_bytes);
        let result = match tokio::time::timeout(self.options.request_timeout, exchange).await {
            Ok(result) => result,
            Err(_) => Err(self.timeout_error(self.options.request_timeout)),
        };

        if let Err(e) = &result {
            self.count_timeout(e);
            // A late reply on this socket would pair with the wrong request.
            *slot = None;
            self.stats.connected.store(false, Ordering::Relaxed);
        }

        result
    }

    fn count_timeout(&self, error: &ReplicaError) {
        if matches!(error, ReplicaError::Timeout { .. }) {
            self.stats.timeouts.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn timeout_error(&self, after: Duration) -> ReplicaError {
        ReplicaError::Timeout {
            addr: self.addr.clone(),
            after,
        }
    }

    fn not_connected(&self) -> ReplicaError {
        ReplicaError::NotConnected {
            addr: self.addr.clone(),
        }
    }

    /// Liveness probe. `Ok(true)` when the replica answered `PONG`.
    pub async fn ping(&self) -> Result<bool, ReplicaError> {
        let reply = self.request(PING).await?;
        Ok(reply.trim() == PONG)
    }

    /// Releases the socket. Later requests fail with `NotConnected`.
    pub async fn close(&self) {
        let mut slot = self.conn.lock().await;
        self.closed.store(true, Ordering::Release);
        self.stats.connected.store(false, Ordering::Relaxed);

        if let Some(conn) = slot.take() {
            conn.shutdown().await;
            tracing::debug!("Closed connection to replica {}", self.addr);
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub fn stats(&self) -> ReplicaStatsSnapshot {
        ReplicaStatsSnapshot {
            addr: self.addr.clone(),
            connected: self.stats.connected.load(Ordering::Relaxed),
            requests: self.stats.requests.load(Ordering::Relaxed),
            failures: self.stats.failures.load(Ordering::Relaxed),
            reconnects: self.stats.reconnects.load(Ordering::Relaxed),
            timeouts: self.stats.timeouts.load(Ordering::Relaxed),
        }
    }
}
