//! Reduction Module
//!
//! The reduce side of the catalog backend. Every dispatcher command is sent to all
//! replicas and their independent answers are folded into one canonical reply.
//!
//! ## Reduction Policies
//! - **Aggregate counts** (`GET_SALES_BY_*`): `name:amount` lists; the first replica to report a
//!   name decides its amount, later copies are discarded, then a total is appended.
//! - **Mutations** (`ADD_STORE`, `ADD_PRODUCT`, `REMOVE_PRODUCT`, `BUY`, `REVIEW`): any `SUCCESS`
//!   wins, reported from the last one in replica order; otherwise all `ERROR` details are joined.
//! - **Search** (`FILTER_STORES`, `FIND_STORES_WITHIN_RANGE`): object arrays are merged and
//!   de-duplicated by `StoreName`, first occurrence in replica order wins.
//! - **Detail** (`GET_STORE_DETAILS`): first populated, non-error reply.
//!
//! ## Fault Tolerance
//! A replica that fails or times out is logged and left out of that reduction. The answer is
//! always built from whatever replicas responded.
//!
//! ## Submodules
//! - **`command`**: keyword parsing and the keyword → policy table.
//! - **`policy`**: pure consolidation functions.
//! - **`fragments`**: brace-aware splitting and field extraction for replica JSON.
//! - **`fanout`**: concurrent per-replica requests, collected in configured order.
//! - **`reducer`**: glues parsing, fan-out and policies together.
//! - **`session`**: the per-connection read/reduce/write loop.
//! - **`service`**: accept loop, session registry and stats reporter.

pub mod command;
pub mod fanout;
pub mod fragments;
pub mod policy;
pub mod reducer;
pub mod service;
pub mod session;
pub mod types;
