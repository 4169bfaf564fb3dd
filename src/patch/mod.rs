//! Signature patching
//!
//! The layout table says where to patch on each platform; the session
//! does the patching and holds everything needed to undo it.

mod layout;
mod session;

pub use layout::{DerivedKind, PatchLayout, Platform, LAYOUTS, SITE_COUNT};
pub use session::{PatchRecord, PatchSession, SessionStatus};
