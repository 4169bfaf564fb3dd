//! Linux page protection via mprotect

#![cfg(target_os = "linux")]

use std::io;

use crate::error::{PatchError, PatchResult};

/// Mark the pages covering `[addr, addr + len)` readable, writable and
/// executable. mprotect wants page-aligned arguments, so the range is
/// widened to page boundaries.
pub(crate) fn make_writable(addr: usize, len: usize) -> PatchResult<()> {
    let page = unsafe { libc::sysconf(libc::_SC_PAGESIZE) } as usize;
    let start = addr & !(page - 1);
    let end = (addr + len + page - 1) & !(page - 1);

    let rc = unsafe {
        libc::mprotect(
            start as *mut libc::c_void,
            end - start,
            libc::PROT_READ | libc::PROT_WRITE | libc::PROT_EXEC,
        )
    };

    if rc != 0 {
        return Err(PatchError::ProtectionFailed {
            addr,
            len,
            reason: io::Error::last_os_error().to_string(),
        });
    }
    Ok(())
}
