//! Raw line channel to one replica.
//!
//! A `ReplicaConnection` is a single TCP socket plus its buffered read half.
//! It knows nothing about retries or locking; `ReplicaHandle` owns one and
//! replaces it when the socket goes bad.

use super::types::{ReplicaAddr, ReplicaError};

use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};

pub struct ReplicaConnection {
    addr: ReplicaAddr,
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl ReplicaConnection {
    /// Establishes a TCP connection to `addr`, bounded by `connect_timeout`.
    pub async fn open(addr: &ReplicaAddr, connect_timeout: Duration) -> Result<Self, ReplicaError> {
        let connect = TcpStream::connect((addr.host.as_str(), addr.port));

        let stream = match tokio::time::timeout(connect_timeout, connect).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(source)) => {
                return Err(ReplicaError::Connect {
                    addr: addr.clone(),
                    source,
                });
            }
            Err(_) => {
                return Err(ReplicaError::Timeout {
                    addr: addr.clone(),
                    after: connect_timeout,
                });
            }
        };

        if let Err(e) = stream.set_nodelay(true) {
            tracing::debug!("Could not set TCP_NODELAY for {}: {}", addr, e);
        }

        let (read_half, write_half) = stream.into_split();

        tracing::debug!("Connected to replica {}", addr);

        Ok(Self {
            addr: addr.clone(),
            reader: BufReader::new(read_half),
            writer: write_half,
        })
    }

    /// Writes one line and reads exactly one reply line back.
    ///
    /// The reply is returned without its line terminator. A reply longer than
    /// `max_reply_bytes` is an error and leaves the socket unusable.
    pub async fn exchange(&mut self, line: &str, max_reply_bytes: u64) -> Result<String, ReplicaError> {
        let mut payload = single_line(line);
        payload.push('\n');

        self.writer
            .write_all(payload.as_bytes())
            .await
            .map_err(|source| self.io_error(source))?;
        self.writer
            .flush()
            .await
            .map_err(|source| self.io_error(source))?;

        let mut reply = String::new();
        let read = (&mut self.reader)
            .take(max_reply_bytes)
            .read_line(&mut reply)
            .await
            .map_err(|source| self.io_error(source))?;

        if read == 0 {
            return Err(ReplicaError::Closed {
                addr: self.addr.clone(),
            });
        }
        if !reply.ends_with('\n') && read as u64 >= max_reply_bytes {
            return Err(ReplicaError::Oversized {
                addr: self.addr.clone(),
                limit: max_reply_bytes,
            });
        }

        let trimmed = reply.trim_end_matches(['\r', '\n']).len();
        reply.truncate(trimmed);
        Ok(reply)
    }

    /// Shuts the write half down and drops the socket.
    pub async fn shutdown(mut self) {
        if let Err(e) = self.writer.shutdown().await {
            tracing::debug!("Shutdown of connection to {} failed: {}", self.addr, e);
        }
    }

    fn io_error(&self, source: std::io::Error) -> ReplicaError {
        ReplicaError::Io {
            addr: self.addr.clone(),
            source,
        }
    }
}

/// Removes embedded line breaks so a request always occupies one line on the wire.
pub fn single_line(line: &str) -> String {
    line.chars().filter(|c| *c != '\n' && *c != '\r').collect()
}
