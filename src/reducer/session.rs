//! Reduction Session
//!
//! One session per dispatcher connection. It reads command lines until the
//! stream ends, reduces each one and writes the payload lines followed by the
//! sentinel. A read failure, or a command line longer than the session's
//! limit, ends only this session.

use super::reducer::Reducer;
use super::types::{MAX_COMMAND_BYTES, SENTINEL, SessionId};

use std::io::{Error, ErrorKind};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};

pub struct ReductionSession {
    id: SessionId,
    reducer: Reducer,
    max_line_bytes: u64,
}

impl ReductionSession {
    pub fn new(id: SessionId, reducer: Reducer) -> Self {
        Self {
            id,
            reducer,
            max_line_bytes: MAX_COMMAND_BYTES,
        }
    }

    pub fn with_max_line_bytes(mut self, max_line_bytes: u64) -> Self {
        self.max_line_bytes = max_line_bytes;
        self
    }

    /// Runs until the dispatcher closes its side. Returns the number of
    /// commands answered.
    pub async fn run<R, W>(&self, mut reader: R, mut writer: W) -> std::io::Result<u64>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut buf = String::new();
        let mut answered = 0u64;

        loop {
            buf.clear();
            let read = (&mut reader)
                .take(self.max_line_bytes)
                .read_line(&mut buf)
                .await?;
            if read == 0 {
                break;
            }
            if !buf.ends_with('\n') && read as u64 >= self.max_line_bytes {
                tracing::warn!(
                    "Session {} sent a command longer than {} bytes, closing",
                    self.id.0,
                    self.max_line_bytes
                );
                return Err(Error::new(ErrorKind::InvalidData, "command line too long"));
            }

            let line = buf.trim_end_matches(['\r', '\n']);
            tracing::debug!("Session {} received: {}", self.id.0, line);

            let output = self.reducer.reduce(line).await;
            write_response(&mut writer, &output).await?;
            answered += 1;
        }

        tracing::debug!("Session {} reached end of stream", self.id.0);
        writer.shutdown().await?;
        Ok(answered)
    }
}

/// Writes `lines` and the sentinel as one buffered chunk.
pub async fn write_response<W>(writer: &mut W, lines: &[String]) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut buf = String::new();
    for line in lines {
        buf.push_str(line);
        buf.push('\n');
    }
    buf.push_str(SENTINEL);
    buf.push('\n');

    writer.write_all(buf.as_bytes()).await?;
    writer.flush().await
}
