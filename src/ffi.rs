//! FFI surface for dynamic loading
//!
//! The host plugin calls `pounce_uncap_init` once at load with the server
//! module's address range, forwards console-variable changes through the
//! `set_range` functions, and calls `pounce_uncap_shutdown` at unload.
//! Functions returning `*mut c_char` return null on success and an error
//! string on failure; the caller frees it with `pounce_uncap_free_string`.

#![cfg(any(target_os = "windows", target_os = "linux"))]

use std::ffi::{CStr, CString};
use std::os::raw::c_char;

use log::warn;
use once_cell::sync::Lazy;
use parking_lot::Mutex;

use crate::config::UncapConfig;
use crate::memory::LiveModule;
use crate::patch::{PatchLayout, PatchSession, Platform, SessionStatus};

struct LiveSession {
    session: PatchSession,
    mem: LiveModule,
}

static SESSION: Lazy<Mutex<Option<LiveSession>>> = Lazy::new(|| Mutex::new(None));

fn error_string(message: String) -> *mut c_char {
    CString::new(message).unwrap().into_raw()
}

/// Patch the server module and activate the session.
///
/// `config_json` may be null for defaults. Any patch failure refuses
/// activation so the host can abort its own startup.
#[no_mangle]
pub extern "C" fn pounce_uncap_init(
    module_base: usize,
    module_len: usize,
    config_json: *const c_char,
) -> *mut c_char {
    if module_base == 0 || module_len == 0 {
        return error_string("null module range".into());
    }

    let config = if config_json.is_null() {
        UncapConfig::default()
    } else {
        let raw = unsafe { CStr::from_ptr(config_json).to_string_lossy() };
        match UncapConfig::from_json_str(&raw) {
            Ok(config) => config,
            Err(e) => return error_string(format!("bad config: {e}")),
        }
    };

    let platform = match config.platform_override().or_else(Platform::current) {
        Some(platform) => platform,
        None => return error_string("no patch layout for this platform".into()),
    };

    let mut guard = SESSION.lock();
    if guard.is_some() {
        return error_string("already initialized".into());
    }

    let mut session = match PatchSession::new(PatchLayout::for_platform(platform)) {
        Ok(session) => session,
        Err(e) => return error_string(e.to_string()),
    };

    // Caller attests the module range; see `LiveModule::new`.
    let mut mem = unsafe { LiveModule::new(module_base, module_len) };

    if let Err(e) = session.apply(&mut mem) {
        warn!("couldn't patch pounce variables, giving up: {e}");
        return error_string(e.to_string());
    }
    session.set_bounds(config.min_range, config.max_range);

    *guard = Some(LiveSession { session, mem });
    std::ptr::null_mut()
}

/// Restore the original operands and drop the session.
///
/// Unpatching is best-effort: the session is dropped even when a slot
/// write fails, and the failure is returned for the host to report.
#[no_mangle]
pub extern "C" fn pounce_uncap_shutdown() -> *mut c_char {
    let mut guard = SESSION.lock();
    let Some(mut live) = guard.take() else {
        return error_string("not initialized".into());
    };

    match live.session.reverse(&mut live.mem) {
        Ok(()) => std::ptr::null_mut(),
        Err(e) => {
            warn!("unpatch incomplete: {e}");
            error_string(e.to_string())
        }
    }
}

/// Forward a changed minimum-range value. Returns false when no session
/// is active.
#[no_mangle]
pub extern "C" fn pounce_uncap_set_range_min(value: f32) -> bool {
    match SESSION.lock().as_mut() {
        Some(live) => {
            live.session.set_lower_bound(value);
            true
        }
        None => false,
    }
}

/// Forward a changed maximum-range value. Returns false when no session
/// is active.
#[no_mangle]
pub extern "C" fn pounce_uncap_set_range_max(value: f32) -> bool {
    match SESSION.lock().as_mut() {
        Some(live) => {
            live.session.set_upper_bound(value);
            true
        }
        None => false,
    }
}

/// Whether a patch session is active
#[no_mangle]
pub extern "C" fn pounce_uncap_is_patched() -> bool {
    SESSION
        .lock()
        .as_ref()
        .map(|live| live.session.is_patched())
        .unwrap_or(false)
}

/// Session status as a JSON string. Caller must free the returned string
/// with `pounce_uncap_free_string`.
#[no_mangle]
pub extern "C" fn pounce_uncap_status_json() -> *mut c_char {
    let status = SESSION
        .lock()
        .as_ref()
        .map(|live| live.session.status())
        .unwrap_or_default();

    let json = serde_json::to_string(&status).unwrap_or_else(|_| "{}".to_string());
    CString::new(json).unwrap().into_raw()
}

/// Free a string returned by this library
#[no_mangle]
pub extern "C" fn pounce_uncap_free_string(s: *mut c_char) {
    if !s.is_null() {
        unsafe {
            let _ = CString::from_raw(s);
        }
    }
}

/// Library version
#[no_mangle]
pub extern "C" fn pounce_uncap_version() -> *const c_char {
    static VERSION: &[u8] = b"0.1.0\0";
    VERSION.as_ptr() as *const c_char
}

/// Plugin display name
#[no_mangle]
pub extern "C" fn pounce_uncap_name() -> *const c_char {
    static NAME: &[u8] = b"Pounce Damage Uncap\0";
    NAME.as_ptr() as *const c_char
}

/// Plugin author
#[no_mangle]
pub extern "C" fn pounce_uncap_author() -> *const c_char {
    static AUTHOR: &[u8] = b"Pounce Uncap Contributors\0";
    AUTHOR.as_ptr() as *const c_char
}

/// Plugin description
#[no_mangle]
pub extern "C" fn pounce_uncap_description() -> *const c_char {
    static DESCRIPTION: &[u8] = b"Patches the server binary to uncap the pounce damage range limits.\0";
    DESCRIPTION.as_ptr() as *const c_char
}
