//! Scripted loopback replicas for socket tests.

use crate::replica::types::ReplicaAddr;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// What a mock replica does with one request line.
#[derive(Debug, Clone)]
pub enum Reply {
    /// Answer with this line and keep the connection open.
    Line(String),
    /// Answer with this line, then drop the connection.
    LineThenClose(String),
    /// Drop the connection without answering.
    Close,
    /// Never answer.
    Hang,
}

pub fn line(text: &str) -> Reply {
    Reply::Line(text.to_string())
}

pub struct MockReplica {
    pub addr: ReplicaAddr,
    accepted: Arc<AtomicUsize>,
    requests: Arc<AtomicUsize>,
    task: JoinHandle<()>,
}

impl MockReplica {
    pub async fn spawn<F>(respond: F) -> Self
    where
        F: Fn(&str) -> Reply + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let accepted = Arc::new(AtomicUsize::new(0));
        let requests = Arc::new(AtomicUsize::new(0));
        let respond = Arc::new(respond);

        let task = {
            let accepted = accepted.clone();
            let requests = requests.clone();
            tokio::spawn(async move {
                loop {
                    let Ok((stream, _)) = listener.accept().await else {
                        break;
                    };
                    accepted.fetch_add(1, Ordering::SeqCst);

                    let respond = respond.clone();
                    let requests = requests.clone();
                    tokio::spawn(async move {
                        let (read_half, mut write_half) = stream.into_split();
                        let mut reader = BufReader::new(read_half);
                        let mut buf = String::new();

                        loop {
                            buf.clear();
                            match reader.read_line(&mut buf).await {
                                Ok(0) | Err(_) => break,
                                Ok(_) => {}
                            }
                            requests.fetch_add(1, Ordering::SeqCst);

                            match (*respond)(buf.trim_end()) {
                                Reply::Line(reply) => {
                                    let out = format!("{}\n", reply);
                                    if write_half.write_all(out.as_bytes()).await.is_err() {
                                        break;
                                    }
                                }
                                Reply::LineThenClose(reply) => {
                                    let out = format!("{}\n", reply);
                                    let _ = write_half.write_all(out.as_bytes()).await;
                                    break;
                                }
                                Reply::Close => break,
                                Reply::Hang => std::future::pending::<()>().await,
                            }
                        }
                    });
                }
            })
        };

        Self {
            addr: ReplicaAddr::new("127.0.0.1", port),
            accepted,
            requests,
            task,
        }
    }

    /// Replica that answers every line with the same reply.
    pub async fn fixed(reply: &str) -> Self {
        let reply = reply.to_string();
        Self::spawn(move |request| {
            if request == "PING" {
                line("PONG")
            } else {
                Reply::Line(reply.clone())
            }
        })
        .await
    }

    pub fn accepted(&self) -> usize {
        self.accepted.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

impl Drop for MockReplica {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// An address nothing is listening on.
pub async fn unreachable_addr() -> ReplicaAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    ReplicaAddr::new("127.0.0.1", port)
}
