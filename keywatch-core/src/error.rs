//! Error types for keywatch storage operations.

use core::fmt;

/// Convenience alias used throughout the crate.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur while reading or writing persisted state.
///
/// There is deliberately no bus error kind: change-bus dispatch is a
/// direct call, and a panicking listener propagates to the publisher's
/// caller rather than being swallowed inside the bus.
#[derive(Debug)]
pub enum StoreError {
    /// The backend failed to read, or has shut down while a read was
    /// pending.
    Read(String),

    /// The backend failed to write or delete, or the value could not be
    /// serialized to text in the first place.
    Write(String),

    /// The persisted text exists but could not be deserialized (e.g.
    /// corrupted encoding, or the stored shape no longer matches the
    /// requested type).
    Deserialization(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Read(msg) => write!(f, "storage read error: {}", msg),
            StoreError::Write(msg) => write!(f, "storage write error: {}", msg),
            StoreError::Deserialization(msg) => {
                write!(f, "storage deserialization error: {}", msg)
            }
        }
    }
}

impl std::error::Error for StoreError {}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Deserialization(e.to_string())
    }
}
