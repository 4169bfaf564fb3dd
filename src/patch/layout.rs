//! Per-platform patch layouts
//!
//! The signature, the site offsets and the sentinel policy are data tied
//! to one binary build per platform. Selecting a layout once at startup
//! keeps the matching and patching code itself platform-agnostic.

use crate::bounds::ZeroRangePolicy;
use crate::memory::SLOT_WIDTH;

/// Number of rewritten pointer slots per match
pub const SITE_COUNT: usize = 3;

/// Target platform of a server binary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Windows,
    Linux,
}

impl Platform {
    /// Platform of the running process, if a layout is shipped for it
    pub fn current() -> Option<Self> {
        #[cfg(target_os = "windows")]
        {
            Some(Platform::Windows)
        }
        #[cfg(target_os = "linux")]
        {
            Some(Platform::Linux)
        }
        #[cfg(not(any(target_os = "windows", target_os = "linux")))]
        {
            None
        }
    }

    /// Parse a platform identifier ("windows" / "linux")
    pub fn from_id(id: &str) -> Option<Self> {
        match id.to_ascii_lowercase().as_str() {
            "windows" => Some(Platform::Windows),
            "linux" => Some(Platform::Linux),
            _ => None,
        }
    }

    /// Stable identifier for logs and status output
    pub fn id(&self) -> &'static str {
        match self {
            Platform::Windows => "windows",
            Platform::Linux => "linux",
        }
    }
}

/// Which derived value the third patched slot reads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DerivedKind {
    /// `1 / (upper - lower)`
    ScaleFactor,
    /// `-upper`
    NegatedUpper,
}

/// Everything build-specific about one platform's patch
#[derive(Debug, Clone, Copy)]
pub struct PatchLayout {
    pub platform: Platform,
    /// Signature locating the range-check code fragment
    pub signature: &'static str,
    /// Slot offsets from the signature match, in patch order. The later
    /// slots sit past the signature itself, inside the following
    /// instructions of the same fragment.
    pub site_offsets: [usize; SITE_COUNT],
    /// Meaning of the third slot's mirrored value
    pub derived_kind: DerivedKind,
    /// Sentinel substituted for a zero-width range
    pub zero_range_policy: ZeroRangePolicy,
}

/// Shipped layout table
pub static LAYOUTS: [PatchLayout; 2] = [
    PatchLayout {
        platform: Platform::Windows,
        signature: "D9 E8 D9 C0 D9 05 ?? ?? ?? ?? D8 D3 DF E0 F6 C4 05",
        site_offsets: [6, 36, 61],
        derived_kind: DerivedKind::ScaleFactor,
        zero_range_policy: ZeroRangePolicy::LargestFinite,
    },
    PatchLayout {
        platform: Platform::Linux,
        signature: "66 0F 6E ?? F3 0F 51 ?? F3 0F 11 ?? ?? ?? ?? ?? D9 83 ?? ?? ?? ?? D9 85 ?? ?? ?? ?? DF E9 0F 86",
        site_offsets: [18, 47, 71],
        derived_kind: DerivedKind::NegatedUpper,
        zero_range_policy: ZeroRangePolicy::LargestFinite,
    },
];

impl PatchLayout {
    /// Layout for a platform from the shipped table
    pub fn for_platform(platform: Platform) -> &'static PatchLayout {
        LAYOUTS
            .iter()
            .find(|l| l.platform == platform)
            .expect("every Platform variant has a shipped layout")
    }

    /// Byte span from the match start covering every patched slot
    pub fn span(&self) -> usize {
        self.site_offsets[SITE_COUNT - 1] + SLOT_WIDTH
    }
}
