//! Catalog Reduction Tier
//!
//! Library crate behind the `catalog-reducer` binary (`main.rs`).
//!
//! A fleet of replica stores each holds a full copy of a retail catalog. The
//! dispatcher forwards client and manager commands here; this crate sends each
//! command to every replica and folds their answers into one canonical reply.
//!
//! ## Modules
//! - **`replica`**: one long-lived, lock-protected connection handle per configured replica,
//!   with a single transparent reconnect-and-retry and per-request deadlines.
//! - **`reducer`**: command parsing, fan-out, the reduction policies and the per-connection
//!   session loop behind a TCP accept service.
//! - **`config`**: process-argument configuration and startup errors.

pub mod config;
pub mod reducer;
pub mod replica;

#[cfg(test)]
pub(crate) mod test_support;
