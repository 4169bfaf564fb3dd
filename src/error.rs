//! Error types for the patch engine

use thiserror::Error;

/// Result type for patch operations
pub type PatchResult<T> = Result<T, PatchError>;

/// Errors surfaced by pattern scanning, memory protection and patching
#[derive(Debug, Error)]
pub enum PatchError {
    /// The signature was not found in the target module. Usually means the
    /// target binary changed and the shipped layout is stale.
    #[error("signature not found in target module")]
    SignatureNotFound,

    /// The operating environment refused to make the page range writable
    #[error("memory protection change failed at {addr:#x} (len {len}): {reason}")]
    ProtectionFailed {
        addr: usize,
        len: usize,
        reason: String,
    },

    /// Reverse was requested while no patch is active
    #[error("no patch is active")]
    NotPatched,

    /// Apply was requested while a patch is already active
    #[error("patch already applied")]
    AlreadyPatched,

    /// A signature string could not be parsed, or was empty
    #[error("invalid signature pattern: {0}")]
    InvalidPattern(String),

    /// A read through the foreign-memory boundary failed
    #[error("read of {len} bytes at {addr:#x} failed")]
    ReadFailed { addr: usize, len: usize },

    /// A write through the foreign-memory boundary failed
    #[error("write of {len} bytes at {addr:#x} failed")]
    WriteFailed { addr: usize, len: usize },

    /// A mirror cell lives above the 4 GiB boundary and cannot be encoded
    /// into a 4-byte pointer slot
    #[error("storage cell at {addr:#x} does not fit in a 4-byte slot")]
    SlotOverflow { addr: usize },
}
