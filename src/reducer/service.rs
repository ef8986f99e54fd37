use super::reducer::Reducer;
use super::session::ReductionSession;
use super::types::SessionId;
use crate::replica::handle::ReplicaHandle;

use anyhow::Result;
use dashmap::DashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::BufReader;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

/// Accepts dispatcher connections and runs one `ReductionSession` per connection.
///
/// All sessions share the same replica handles; the handles serialize their
/// own exchanges.
pub struct ReductionService {
    reducer: Reducer,
    sessions: Arc<DashMap<SessionId, SocketAddr>>,
}

impl ReductionService {
    pub fn new(replicas: Vec<Arc<ReplicaHandle>>) -> Arc<Self> {
        Arc::new(Self {
            reducer: Reducer::new(replicas),
            sessions: Arc::new(DashMap::new()),
        })
    }

    pub fn reducer(&self) -> &Reducer {
        &self.reducer
    }

    pub fn active_sessions(&self) -> usize {
        self.sessions.len()
    }

    /// Accept loop. Runs until the listener itself fails to be polled.
    pub async fn serve(self: Arc<Self>, listener: TcpListener) -> Result<()> {
        let local = listener.local_addr()?;
        tracing::info!(
            "Reduction service listening on {} with {} replica(s)",
            local,
            self.reducer.replicas().len()
        );

        loop {
            match listener.accept().await {
                Ok((stream, peer)) => {
                    let service = self.clone();
                    tokio::spawn(async move {
                        service.handle_connection(stream, peer).await;
                    });
                }
                Err(e) => {
                    tracing::error!("Failed to accept dispatcher connection: {}", e);
                    tokio::time::sleep(Duration::from_millis(100)).await;
                }
            }
        }
    }

    async fn handle_connection(&self, stream: TcpStream, peer: SocketAddr) {
        let id = SessionId::new();
        self.sessions.insert(id.clone(), peer);
        tracing::info!("Dispatcher connected from {} (session {})", peer, id.0);

        if let Err(e) = stream.set_nodelay(true) {
            tracing::debug!("Could not set TCP_NODELAY for {}: {}", peer, e);
        }

        let (read_half, write_half) = stream.into_split();
        let session = ReductionSession::new(id.clone(), self.reducer.clone());

        match session.run(BufReader::new(read_half), write_half).await {
            Ok(answered) => {
                tracing::info!(
                    "Dispatcher {} disconnected after {} command(s) (session {})",
                    peer,
                    answered,
                    id.0
                );
            }
            Err(e) => {
                tracing::warn!("Session {} with {} ended on error: {}", id.0, peer, e);
            }
        }

        self.sessions.remove(&id);
    }

    /// Periodically logs per-replica counters and the number of live sessions.
    pub fn spawn_stats_reporter(self: &Arc<Self>, every: Duration) -> JoinHandle<()> {
        let service = self.clone();

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            // The first tick fires immediately.
            interval.tick().await;

            loop {
                interval.tick().await;

                let snapshots: Vec<_> = service
                    .reducer
                    .replicas()
                    .iter()
                    .map(|replica| replica.stats())
                    .collect();

                tracing::info!(
                    "Reducer stats: {} live session(s), {} replica(s)",
                    service.active_sessions(),
                    snapshots.len()
                );
                for s in &snapshots {
                    tracing::info!(
                        "  - {} connected={} requests={} failures={} reconnects={} timeouts={}",
                        s.addr,
                        s.connected,
                        s.requests,
                        s.failures,
                        s.reconnects,
                        s.timeouts
                    );
                }

                match serde_json::to_string(&snapshots) {
                    Ok(json) => tracing::debug!("Replica stats snapshot: {}", json),
                    Err(e) => tracing::debug!("Could not encode stats snapshot: {}", e),
                }
            }
        })
    }

    /// Releases every replica socket.
    pub async fn shutdown(&self) {
        tracing::info!("Closing {} replica handle(s)", self.reducer.replicas().len());
        self.reducer.close().await;
    }
}
