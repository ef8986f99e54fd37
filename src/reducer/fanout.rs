use super::types::ERROR_TAG;
use crate::replica::handle::ReplicaHandle;
use crate::replica::types::ReplicaAddr;

use std::sync::Arc;

/// Replies gathered from one fan-out, in configured replica order.
///
/// Replicas that failed are absent from `replies` and listed in `failed`.
#[derive(Debug, Default)]
pub struct FanOut {
    pub replies: Vec<String>,
    pub failed: Vec<ReplicaAddr>,
}

impl FanOut {
    pub fn answered(&self) -> usize {
        self.replies.len()
    }

    pub fn error_replies(&self) -> usize {
        self.replies
            .iter()
            .filter(|reply| reply.starts_with(ERROR_TAG))
            .count()
    }

    /// True when some replica failed to answer or answered with an error.
    pub fn is_degraded(&self) -> bool {
        !self.failed.is_empty() || self.error_replies() > 0
    }
}

/// Sends `line` to every replica concurrently.
///
/// Each request runs in its own task, so a stalled replica only holds its own
/// slot and an abandoned session does not cancel requests already sent.
/// Results are collected by walking the replicas in configured order.
pub async fn fan_out(replicas: &[Arc<ReplicaHandle>], line: &str) -> FanOut {
    let tasks: Vec<_> = replicas
        .iter()
        .map(|replica| {
            let replica = replica.clone();
            let line = line.to_string();
            tokio::spawn(async move { replica.request(&line).await })
        })
        .collect();

    let mut result = FanOut::default();

    for (replica, task) in replicas.iter().zip(tasks) {
        match task.await {
            Ok(Ok(reply)) => {
                tracing::trace!("Replica {} answered: {}", replica.addr(), reply);
                result.replies.push(reply);
            }
            Ok(Err(e)) => {
                tracing::warn!("Skipping replica {} for this reduction: {}", e.addr(), e);
                result.failed.push(e.addr().clone());
            }
            Err(e) => {
                tracing::error!("Request task for replica {} aborted: {}", replica.addr(), e);
                result.failed.push(replica.addr().clone());
            }
        }
    }

    result
}
