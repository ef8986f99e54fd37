//! Command Reduction
//!
//! Turns one inbound command line into the output lines of its consolidated
//! answer: parse, fan out to every replica, apply the command's policy.

use super::fanout::fan_out;
use super::policy;
use super::types::*;
use crate::replica::handle::ReplicaHandle;

use std::sync::Arc;

#[derive(Clone)]
pub struct Reducer {
    replicas: Arc<Vec<Arc<ReplicaHandle>>>,
}

impl Reducer {
    /// `replicas` order is the tie-break order for every first-seen policy.
    pub fn new(replicas: Vec<Arc<ReplicaHandle>>) -> Self {
        Self {
            replicas: Arc::new(replicas),
        }
    }

    pub fn replicas(&self) -> &[Arc<ReplicaHandle>] {
        &self.replicas
    }

    /// Produces the payload lines for `line`. The sentinel is added by the session.
    pub async fn reduce(&self, line: &str) -> Vec<String> {
        if self.replicas.is_empty() {
            tracing::warn!("Cannot reduce '{}': no replicas configured", line);
            return vec![NO_REPLICAS_MESSAGE.to_string()];
        }

        let command = Command::parse(line);

        // Unknown keywords are answered by the policy without touching replicas.
        if command.policy == Policy::Unknown {
            tracing::warn!("Unknown command for reduction: {}", command.keyword);
            return policy::apply(&command, &[]);
        }

        tracing::debug!(
            "Reducing {} ({} byte payload) across {} replicas",
            command.keyword,
            command.data.len(),
            self.replicas.len()
        );

        let gathered = fan_out(&self.replicas, &command.line).await;

        if gathered.is_degraded() {
            tracing::warn!(
                "Degraded reduction for {}: {}/{} replicas answered, {} with errors",
                command.keyword,
                gathered.answered(),
                self.replicas.len(),
                gathered.error_replies()
            );
        }

        policy::apply(&command, &gathered.replies)
    }

    /// Closes every replica handle.
    pub async fn close(&self) {
        for replica in self.replicas.iter() {
            replica.close().await;
        }
    }
}
