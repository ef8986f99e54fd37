//! Replica Connection Module
//!
//! Owns the reduction tier's view of the replica fleet: one long-lived handle per
//! configured `host:port` address.
//!
//! ## Core Concepts
//! - **Line exchange**: a request is one newline-terminated line, the reply is exactly one line.
//! - **Reconnect-and-retry**: a failed exchange drops the socket, reconnects to the same address
//!   and retries once. A second failure is reported to the caller.
//! - **Serialized access**: the socket sits behind an async mutex, so sessions sharing a handle
//!   never interleave request/response pairs.
//! - **Deadlines**: connects and exchanges are bounded; expiry counts as an I/O failure.

pub mod connection;
pub mod handle;
pub mod types;

#[cfg(test)]
mod tests;
