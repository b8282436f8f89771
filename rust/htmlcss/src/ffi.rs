//! C ABI for the string pool and dictionary
//!
//! Strings cross the boundary as pool ids (0 = none). Null handles are
//! tolerated everywhere: reads return the empty result and writes do
//! nothing. Invalid UTF-8 arguments are treated like null.

use std::ffi::{c_char, c_int, CStr, CString};
use std::ptr;

use zerocopy::IntoBytes;

use crate::dict::Dict;
use crate::string_pool::{StringId, StringPool};

/// Dictionary handle. The pool it was created over must outlive it.
pub type DictHandle = Dict<'static>;

unsafe fn arg_str<'a>(s: *const c_char) -> Option<&'a str> {
    if s.is_null() {
        return None;
    }
    CStr::from_ptr(s).to_str().ok()
}

// ============================================================================
// Initialization
// ============================================================================

/// Initialize logging (honors `RUST_LOG`)
#[no_mangle]
pub extern "C" fn hc_init() {
    let _ = env_logger::try_init();
}

/// Get library version
#[no_mangle]
pub extern "C" fn hc_version() -> *const c_char {
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr() as *const c_char
}

// ============================================================================
// String Pool FFI
// ============================================================================

/// Create a new string pool
#[no_mangle]
pub extern "C" fn hc_pool_new() -> *mut StringPool {
    Box::into_raw(Box::new(StringPool::new()))
}

/// Free a string pool. Every dictionary created over it must be freed first.
#[no_mangle]
pub extern "C" fn hc_pool_free(pool: *mut StringPool) {
    if !pool.is_null() {
        unsafe {
            drop(Box::from_raw(pool));
        }
    }
}

/// Intern a string and return its ID (0 on failure)
#[no_mangle]
pub extern "C" fn hc_pool_intern(pool: *const StringPool, s: *const c_char) -> u32 {
    if pool.is_null() {
        return 0;
    }
    unsafe {
        let Some(s) = arg_str(s) else {
            return 0;
        };
        match (*pool).intern(s) {
            Ok(interned) => interned.id().0,
            Err(err) => {
                log::error!("hc_pool_intern: {err}");
                0
            }
        }
    }
}

/// Get a copy of the string for an ID; free it with `hc_string_free`
#[no_mangle]
pub extern "C" fn hc_pool_get(pool: *const StringPool, id: u32) -> *mut c_char {
    if pool.is_null() {
        return ptr::null_mut();
    }
    unsafe {
        if let Some(s) = (*pool).get(StringId(id)) {
            if let Ok(c_string) = CString::new(s.as_str()) {
                return c_string.into_raw();
            }
        }
    }
    ptr::null_mut()
}

/// Free a string returned by hc_pool_get
#[no_mangle]
pub extern "C" fn hc_string_free(s: *mut c_char) {
    if !s.is_null() {
        unsafe {
            drop(CString::from_raw(s));
        }
    }
}

/// Get the number of interned strings
#[no_mangle]
pub extern "C" fn hc_pool_len(pool: *const StringPool) -> u32 {
    if pool.is_null() {
        return 0;
    }
    let len = unsafe { (*pool).len() };
    u32::try_from(len).unwrap_or(u32::MAX)
}

// ============================================================================
// Dictionary FFI
// ============================================================================

/// Create a dictionary over `pool`
#[no_mangle]
pub extern "C" fn hc_dict_new(pool: *const StringPool) -> *mut DictHandle {
    if pool.is_null() {
        return ptr::null_mut();
    }
    let pool: &'static StringPool = unsafe { &*pool };
    Box::into_raw(Box::new(Dict::new(pool)))
}

/// Free a dictionary; the pool is left alone
#[no_mangle]
pub extern "C" fn hc_dict_free(dict: *mut DictHandle) {
    if !dict.is_null() {
        unsafe {
            drop(Box::from_raw(dict));
        }
    }
}

/// Number of key/value pairs
#[no_mangle]
pub extern "C" fn hc_dict_count(dict: *const DictHandle) -> usize {
    if dict.is_null() {
        return 0;
    }
    unsafe { (*dict).count() }
}

/// Value ID for a key, or 0 if absent
#[no_mangle]
pub extern "C" fn hc_dict_get(dict: *const DictHandle, key: *const c_char) -> u32 {
    if dict.is_null() {
        return 0;
    }
    unsafe {
        arg_str(key)
            .and_then(|key| (*dict).get(key))
            .map_or(0, |value| value.id().0)
    }
}

/// Value ID at `index` in sorted order, storing the key ID in `key`.
///
/// Returns 0 (and leaves `key` alone) when `index` is out of range.
#[no_mangle]
pub extern "C" fn hc_dict_index(
    dict: *const DictHandle,
    index: usize,
    key: *mut u32,
) -> u32 {
    if dict.is_null() || key.is_null() {
        return 0;
    }
    unsafe {
        match (*dict).index_at(index) {
            Some((k, v)) => {
                *key = k.id().0;
                v.id().0
            }
            None => 0,
        }
    }
}

/// Set a key/value pair. Returns 0 on success, -1 on failure.
#[no_mangle]
pub extern "C" fn hc_dict_set(
    dict: *mut DictHandle,
    key: *const c_char,
    value: *const c_char,
) -> c_int {
    if dict.is_null() {
        return -1;
    }
    unsafe {
        let (Some(key), Some(value)) = (arg_str(key), arg_str(value)) else {
            return -1;
        };
        match (*dict).set(key, value) {
            Ok(()) => 0,
            Err(err) => {
                log::error!("hc_dict_set: {err}");
                -1
            }
        }
    }
}

/// Remove a key, if present
#[no_mangle]
pub extern "C" fn hc_dict_remove(dict: *mut DictHandle, key: *const c_char) {
    if dict.is_null() {
        return;
    }
    unsafe {
        if let Some(key) = arg_str(key) {
            (*dict).remove(key);
        }
    }
}

/// Copy the sorted pairs as native-endian `(key id, value id)` u32 records.
///
/// Returns the number of bytes the export needs. Nothing is written unless
/// `buffer` is non-null and `length` is large enough.
#[no_mangle]
pub extern "C" fn hc_dict_export(
    dict: *const DictHandle,
    buffer: *mut u8,
    length: usize,
) -> usize {
    if dict.is_null() {
        return 0;
    }
    unsafe {
        let ids = (*dict).to_ids();
        let bytes = ids.as_bytes();
        if !buffer.is_null() && length >= bytes.len() {
            ptr::copy_nonoverlapping(bytes.as_ptr(), buffer, bytes.len());
        }
        bytes.len()
    }
}
