//! Live in-process module backend
//!
//! All raw-pointer access to the host process lives in this file. Reads
//! and writes accept absolute addresses that may fall outside the scanned
//! code span, because the patched operands point into the module's data
//! sections.

#![cfg(any(target_os = "windows", target_os = "linux"))]

use std::ptr;

use super::ModuleMemory;
use crate::error::PatchResult;

#[cfg(target_os = "linux")]
use super::linux;
#[cfg(target_os = "windows")]
use super::windows;

/// Module memory of the process this code is running in
pub struct LiveModule {
    base: usize,
    len: usize,
}

impl LiveModule {
    /// Wrap a loaded module's address range.
    ///
    /// # Safety
    ///
    /// `base..base + len` must describe a mapped module image for the
    /// lifetime of the value, and every address handed to [`ModuleMemory`]
    /// operations must stay mapped in this process. The engine only
    /// dereferences the module span and the pointer operands embedded in
    /// it.
    pub unsafe fn new(base: usize, len: usize) -> Self {
        Self { base, len }
    }
}

impl ModuleMemory for LiveModule {
    fn base(&self) -> usize {
        self.base
    }

    fn len(&self) -> usize {
        self.len
    }

    fn read(&self, addr: usize, buf: &mut [u8]) -> PatchResult<()> {
        // Validity of `addr` is the creator's contract, see `new`.
        unsafe {
            ptr::copy_nonoverlapping(addr as *const u8, buf.as_mut_ptr(), buf.len());
        }
        Ok(())
    }

    fn write(&mut self, addr: usize, bytes: &[u8]) -> PatchResult<()> {
        unsafe {
            ptr::copy_nonoverlapping(bytes.as_ptr(), addr as *mut u8, bytes.len());
        }
        Ok(())
    }

    fn make_writable(&mut self, addr: usize, len: usize) -> PatchResult<()> {
        #[cfg(target_os = "windows")]
        {
            windows::make_writable(addr, len)
        }
        #[cfg(target_os = "linux")]
        {
            linux::make_writable(addr, len)
        }
    }
}
