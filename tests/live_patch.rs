//! Patch round-trip against live process memory
//!
//! Maps an anonymous low (32-bit addressable) region, lays a fake server
//! module into it and runs the real `LiveModule` backend over it,
//! mprotect included. MAP_32BIT keeps every embedded pointer encodable in
//! a 4-byte slot, like the 32-bit server processes the patch targets.

#![cfg(all(target_os = "linux", target_arch = "x86_64"))]

use pounce_uncap::{
    DerivedKind, LiveModule, ModuleMemory, PatchError, PatchLayout, PatchSession, Platform,
    SITE_COUNT,
};

const MODULE_LEN: usize = 0x2000;
const MATCH_OFF: usize = 0x80;
const DATA_OFF: usize = 0x1000;

struct LowRegion {
    base: usize,
}

impl LowRegion {
    fn map() -> Option<Self> {
        let ptr = unsafe {
            libc::mmap(
                std::ptr::null_mut(),
                MODULE_LEN,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_PRIVATE | libc::MAP_ANONYMOUS | libc::MAP_32BIT,
                -1,
                0,
            )
        };
        (ptr != libc::MAP_FAILED).then(|| Self { base: ptr as usize })
    }

    fn write(&self, offset: usize, bytes: &[u8]) {
        unsafe {
            std::ptr::copy_nonoverlapping(
                bytes.as_ptr(),
                (self.base + offset) as *mut u8,
                bytes.len(),
            );
        }
    }
}

impl Drop for LowRegion {
    fn drop(&mut self) {
        unsafe {
            libc::munmap(self.base as *mut libc::c_void, MODULE_LEN);
        }
    }
}

fn lay_out_module(region: &LowRegion, layout: &PatchLayout) {
    let sig: Vec<u8> = layout
        .signature
        .split_whitespace()
        .map(|t| u8::from_str_radix(t, 16).unwrap_or(0x90))
        .collect();
    region.write(MATCH_OFF, &sig);

    let third = match layout.derived_kind {
        DerivedKind::ScaleFactor => 1.0 / 700.0f32,
        DerivedKind::NegatedUpper => -1000.0f32,
    };
    region.write(DATA_OFF, &300.0f32.to_le_bytes());
    region.write(DATA_OFF + 4, &1000.0f32.to_le_bytes());
    region.write(DATA_OFF + 8, &third.to_le_bytes());

    for (i, &offset) in layout.site_offsets.iter().enumerate() {
        let target = (region.base + DATA_OFF + i * 4) as u32;
        region.write(MATCH_OFF + offset, &target.to_le_bytes());
    }
}

#[test]
fn live_apply_reverse_round_trip() {
    let _ = env_logger::builder().is_test(true).try_init();

    let Some(region) = LowRegion::map() else {
        eprintln!("MAP_32BIT mapping unavailable, skipping");
        return;
    };

    let layout = PatchLayout::for_platform(Platform::Linux);
    lay_out_module(&region, layout);

    let mut mem = unsafe { LiveModule::new(region.base, MODULE_LEN) };

    let mut before = vec![0u8; layout.span()];
    mem.read(region.base + MATCH_OFF, &mut before).unwrap();

    let bindings: [u32; SITE_COUNT] = [
        (region.base + DATA_OFF + 0x20) as u32,
        (region.base + DATA_OFF + 0x24) as u32,
        (region.base + DATA_OFF + 0x28) as u32,
    ];
    let mut session = PatchSession::with_bindings(layout, bindings).unwrap();

    match session.apply(&mut mem) {
        Ok(base) => assert_eq!(base, region.base + MATCH_OFF),
        // some hardened environments refuse RWX pages; nothing to test then
        Err(PatchError::ProtectionFailed { .. }) => {
            eprintln!("environment refused RWX protection, skipping");
            return;
        }
        Err(e) => panic!("apply failed: {e}"),
    }

    for (i, &offset) in layout.site_offsets.iter().enumerate() {
        let slot = mem.read_u32(region.base + MATCH_OFF + offset).unwrap();
        assert_eq!(slot, bindings[i]);
    }
    assert_eq!(session.mirrored_lower(), 300.0);
    assert_eq!(session.mirrored_upper(), 1000.0);
    assert_eq!(session.mirrored_derived(), -1000.0);

    session.reverse(&mut mem).unwrap();

    let mut after = vec![0u8; layout.span()];
    mem.read(region.base + MATCH_OFF, &mut after).unwrap();
    assert_eq!(after, before);
}
