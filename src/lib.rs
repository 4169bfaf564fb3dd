//! Pounce Uncap
//!
//! Signature-scan-and-live-patch engine for the pounce damage range
//! limits. Locates a known code fragment in a loaded server module by
//! byte signature, rewrites its float pointer operands to read from
//! plugin-owned mirror cells, keeps the mirrored bounds and their derived
//! values in sync with host configuration, and restores the original
//! operands on teardown.
//!
//! This crate can be used as:
//! - A Rust library (rlib) for direct integration
//! - A dynamic library (cdylib) loaded by a host plugin via the FFI
//!   surface in [`ffi`]

pub mod bounds;
pub mod config;
pub mod error;
pub mod memory;
pub mod patch;

#[cfg(any(target_os = "windows", target_os = "linux"))]
pub mod ffi;

// Re-export commonly used types
pub use bounds::{recompute, Bounds, DerivedValues, ZeroRangePolicy};
pub use config::{ConfigError, UncapConfig, DEFAULT_MAX_RANGE, DEFAULT_MIN_RANGE};
pub use error::{PatchError, PatchResult};
#[cfg(any(target_os = "windows", target_os = "linux"))]
pub use memory::LiveModule;
pub use memory::{scan, FakeModule, ForeignSlot, ModuleMemory, Signature, SLOT_WIDTH};
pub use patch::{
    DerivedKind, PatchLayout, PatchRecord, PatchSession, Platform, SessionStatus, LAYOUTS,
    SITE_COUNT,
};
