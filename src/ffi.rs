//! Shared helpers for the C entry points.

use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::{ptr, slice};

use crate::error::{cstring_from_str_lossy, hashring_error_t, write_error};
use crate::server::ServerSpec;

/// A server description passed in from C.
///
/// `vnodes` of 0 uses the ring's default virtual node count and `weight` of 0
/// is treated as 1.
#[allow(non_camel_case_types)]
#[repr(C)]
pub struct hashring_server_t {
    pub address: *const c_char,
    pub weight: u32,
    pub vnodes: u32,
}

pub(crate) fn read_cstr(
    value: *const c_char,
    field: &'static str,
    out_error: *mut *mut hashring_error_t,
) -> Option<String> {
    if value.is_null() {
        write_error(out_error, format!("{field} was null"));
        return None;
    }
    // Safety: caller guarantees a valid, NUL-terminated C string.
    let cstr = unsafe { CStr::from_ptr(value) };
    Some(cstr.to_string_lossy().into_owned())
}

pub(crate) fn read_optional_cstr(value: *const c_char) -> Option<String> {
    if value.is_null() {
        return None;
    }
    // Safety: caller guarantees a valid, NUL-terminated C string.
    let cstr = unsafe { CStr::from_ptr(value) };
    Some(cstr.to_string_lossy().into_owned())
}

pub(crate) fn read_servers(
    servers: *const hashring_server_t,
    len: usize,
    out_error: *mut *mut hashring_error_t,
) -> Option<Vec<ServerSpec>> {
    if len == 0 {
        return Some(Vec::new());
    }
    if servers.is_null() {
        write_error(out_error, "servers was null");
        return None;
    }
    // Safety: caller guarantees `servers` points to `len` initialized entries.
    let servers = unsafe { slice::from_raw_parts(servers, len) };
    servers
        .iter()
        .map(|server| {
            let address = read_cstr(server.address, "server address", out_error)?;
            Some(
                ServerSpec::new(address)
                    .with_weight(server.weight.max(1))
                    .with_vnodes(server.vnodes),
            )
        })
        .collect()
}

pub(crate) fn into_c_string(value: &str) -> *mut c_char {
    cstring_from_str_lossy(value).into_raw()
}

/// Hands a list of strings to C as a heap array of heap strings.
pub(crate) fn into_c_string_array(values: Vec<String>, out_len: *mut usize) -> *mut *mut c_char {
    let items: Box<[*mut c_char]> = values.iter().map(|value| into_c_string(value)).collect();
    if !out_len.is_null() {
        // Safety: out_len is non-null and points to writable memory.
        unsafe {
            *out_len = items.len();
        }
    }
    if items.is_empty() {
        return ptr::null_mut();
    }
    Box::into_raw(items) as *mut *mut c_char
}

/// Frees an array returned by `hashring_range` together with its strings.
#[unsafe(no_mangle)]
pub extern "C" fn hashring_string_array_free(items: *mut *mut c_char, len: usize) {
    if items.is_null() {
        return;
    }
    // Safety: items and len must come from a single hashring call.
    let items = unsafe { Box::from_raw(ptr::slice_from_raw_parts_mut(items, len)) };
    for item in items.iter().copied().filter(|item| !item.is_null()) {
        // Safety: every item was produced by `CString::into_raw`.
        unsafe {
            drop(CString::from_raw(item));
        }
    }
}
