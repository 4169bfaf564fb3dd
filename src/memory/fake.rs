//! Deterministic in-memory module backend
//!
//! Backs tests and embedding hosts that want to exercise the engine
//! without a live process. Tracks per-byte writability so a write that was
//! not preceded by [`ModuleMemory::make_writable`] fails the same way a
//! write to a read-only code page would.

use super::ModuleMemory;
use crate::error::{PatchError, PatchResult};

/// Fake module memory with protection tracking and fault injection
pub struct FakeModule {
    base: usize,
    data: Vec<u8>,
    writable: Vec<bool>,
    deny_protect: bool,
    fail_write_at: Option<usize>,
}

impl FakeModule {
    /// Create a zero-filled, read-only module covering
    /// `[base, base + size)`
    pub fn new(base: usize, size: usize) -> Self {
        Self {
            base,
            data: vec![0u8; size],
            writable: vec![false; size],
            deny_protect: false,
            fail_write_at: None,
        }
    }

    /// Place bytes into the backing image, ignoring protection. This is
    /// the loader side of the fake, not a patch write.
    pub fn load(&mut self, addr: usize, bytes: &[u8]) {
        let offset = addr - self.base;
        self.data[offset..offset + bytes.len()].copy_from_slice(bytes);
    }

    /// Refuse all subsequent `make_writable` calls
    pub fn deny_protection(&mut self) {
        self.deny_protect = true;
    }

    /// Fail every write that starts at `addr`
    pub fn fail_write_at(&mut self, addr: usize) {
        self.fail_write_at = Some(addr);
    }

    /// Whether every byte of `[addr, addr + len)` is currently writable
    pub fn is_writable(&self, addr: usize, len: usize) -> bool {
        self.range(addr, len)
            .map(|offset| self.writable[offset..offset + len].iter().all(|&w| w))
            .unwrap_or(false)
    }

    /// Copy of the bytes at `[addr, addr + len)`, for assertions
    pub fn snapshot(&self, addr: usize, len: usize) -> Vec<u8> {
        let offset = self.range(addr, len).expect("snapshot out of range");
        self.data[offset..offset + len].to_vec()
    }

    fn range(&self, addr: usize, len: usize) -> Option<usize> {
        let offset = addr.checked_sub(self.base)?;
        let end = offset.checked_add(len)?;
        (end <= self.data.len()).then_some(offset)
    }
}

impl ModuleMemory for FakeModule {
    fn base(&self) -> usize {
        self.base
    }

    fn len(&self) -> usize {
        self.data.len()
    }

    fn read(&self, addr: usize, buf: &mut [u8]) -> PatchResult<()> {
        let offset = self.range(addr, buf.len()).ok_or(PatchError::ReadFailed {
            addr,
            len: buf.len(),
        })?;
        buf.copy_from_slice(&self.data[offset..offset + buf.len()]);
        Ok(())
    }

    fn write(&mut self, addr: usize, bytes: &[u8]) -> PatchResult<()> {
        let len = bytes.len();
        match self.range(addr, len) {
            Some(offset)
                if self.fail_write_at != Some(addr)
                    && self.writable[offset..offset + len].iter().all(|&w| w) =>
            {
                self.data[offset..offset + len].copy_from_slice(bytes);
                Ok(())
            }
            _ => Err(PatchError::WriteFailed { addr, len }),
        }
    }

    fn make_writable(&mut self, addr: usize, len: usize) -> PatchResult<()> {
        if self.deny_protect {
            return Err(PatchError::ProtectionFailed {
                addr,
                len,
                reason: "protection change denied".into(),
            });
        }
        let offset = self.range(addr, len).ok_or(PatchError::ProtectionFailed {
            addr,
            len,
            reason: "range outside module".into(),
        })?;
        self.writable[offset..offset + len]
            .iter_mut()
            .for_each(|w| *w = true);
        Ok(())
    }
}
