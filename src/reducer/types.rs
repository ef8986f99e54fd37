use serde::{Deserialize, Serialize};

/// Terminates every response written back to the dispatcher.
pub const SENTINEL: &str = "END_REDUCER";

/// Longest command line a dispatcher may send, terminator included.
pub const MAX_COMMAND_BYTES: u64 = 1024 * 1024;

pub const NO_REPLICAS_MESSAGE: &str = "Reducer Error: No replicas configured";
pub const STORE_NOT_FOUND_MESSAGE: &str =
    "Error: Store not found or could not retrieve store details.";
pub const UNKNOWN_ERROR: &str = "Unknown error";

/// Field that identifies a store inside search results.
pub const IDENTITY_FIELD: &str = "StoreName";

pub const SUCCESS_TAG: &str = "SUCCESS|";
pub const ERROR_TAG: &str = "ERROR|";

/// Identifies one dispatcher connection for the lifetime of its session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

/// Catalog edits whose replies are tagged `SUCCESS|...` or `ERROR|...`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationKind {
    AddStore,
    AddProduct,
    RemoveProduct,
    /// `SUCCESS|store|product|quantity`
    Purchase,
    /// `SUCCESS|store|rating|votes`
    Review,
}

/// How the replies to one command are consolidated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Policy {
    /// `name:amount` lists, first occurrence of a name wins, plus a total.
    AggregateCounts,
    /// Any success wins (the last one in replica order), else all errors.
    Mutation(MutationKind),
    /// Bracketed object arrays, de-duplicated by `StoreName`.
    Search,
    /// First populated, non-error reply.
    Detail,
    Unknown,
}

/// One inbound line split into keyword and payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub keyword: String,
    pub data: String,
    /// The line as received; forwarded to replicas unmodified.
    pub line: String,
    pub policy: Policy,
}

/// A single reply entry that could not be interpreted. Skipped, never fatal.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MalformedReply {
    #[error("expected name:amount, got '{0}'")]
    BadPair(String),

    #[error("non-numeric amount '{amount}' for '{name}'")]
    BadAmount { name: String, amount: String },

    #[error("invalid {field} '{value}' in success payload")]
    BadField { field: &'static str, value: String },
}
