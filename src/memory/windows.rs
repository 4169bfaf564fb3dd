//! Windows page protection via VirtualProtect

#![cfg(target_os = "windows")]

use core::ffi::c_void;

use windows::Win32::System::Memory::{
    VirtualProtect, PAGE_EXECUTE_READWRITE, PAGE_PROTECTION_FLAGS,
};

use crate::error::{PatchError, PatchResult};

/// Mark the pages covering `[addr, addr + len)` readable, writable and
/// executable. VirtualProtect adjusts every page the range touches.
pub(crate) fn make_writable(addr: usize, len: usize) -> PatchResult<()> {
    let mut old = PAGE_PROTECTION_FLAGS(0);

    unsafe { VirtualProtect(addr as *const c_void, len, PAGE_EXECUTE_READWRITE, &mut old) }
        .map_err(|e| PatchError::ProtectionFailed {
            addr,
            len,
            reason: e.to_string(),
        })
}
