//! Pattern scanning for memory signature matching

use super::ModuleMemory;
use crate::error::{PatchError, PatchResult};

/// A byte signature with wildcard positions
///
/// Parsed from strings like `"D9 E8 D9 C0 D9 05 ?? ?? ?? ?? D8 D3"`:
/// - Regular bytes are hex values (e.g., "D9", "05")
/// - Wildcards are "??" or "?" and match any byte
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    bytes: Vec<Option<u8>>,
}

impl Signature {
    /// Parse a signature string. Empty patterns and malformed tokens are
    /// rejected before any scanning happens.
    pub fn parse(pattern: &str) -> PatchResult<Self> {
        let mut bytes = Vec::new();
        for token in pattern.split_whitespace() {
            if token == "??" || token == "?" {
                bytes.push(None);
            } else {
                let value = u8::from_str_radix(token, 16)
                    .map_err(|_| PatchError::InvalidPattern(format!("bad token '{token}'")))?;
                bytes.push(Some(value));
            }
        }
        if bytes.is_empty() {
            return Err(PatchError::InvalidPattern("empty pattern".into()));
        }
        Ok(Self { bytes })
    }

    /// Number of positions in the signature
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Always false; parsing rejects empty patterns
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Check the signature against a byte window of the same length
    fn matches(&self, window: &[u8]) -> bool {
        self.bytes
            .iter()
            .zip(window)
            .all(|(expected, &actual)| expected.map_or(true, |b| b == actual))
    }
}

/// Scan the module region for the signature
///
/// Returns the absolute address of the first byte of the lowest-address
/// match, or `None` if the signature does not occur. Candidate starts are
/// bounded so no comparison ever reads past the region.
pub fn scan(mem: &dyn ModuleMemory, sig: &Signature) -> Option<usize> {
    let region_len = mem.len();
    if sig.len() > region_len {
        return None;
    }

    let mut data = vec![0u8; region_len];
    mem.read(mem.base(), &mut data).ok()?;

    (0..=region_len - sig.len())
        .find(|&i| sig.matches(&data[i..i + sig.len()]))
        .map(|i| mem.base() + i)
}
