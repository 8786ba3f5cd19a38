use std::ffi::CString;
use std::os::raw::c_char;
use std::ptr;

use thiserror::Error;

/// Errors raised while building or mutating a ring.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RingError {
    #[error("unsupported hash algorithm `{0}`")]
    UnknownAlgorithm(String),
    #[error("unknown compatibility mode `{0}`")]
    UnknownCompatibility(String),
    #[error("server address was empty")]
    EmptyAddress,
    #[error("invalid port `{port}` in server `{address}`")]
    InvalidPort { address: String, port: String },
    #[error("server `{0}` has a weight of zero")]
    ZeroWeight(String),
    #[error("server `{0}` is not part of the ring")]
    UnknownServer(String),
}

pub type Result<T, E = RingError> = std::result::Result<T, E>;

/// Opaque error type for C callers.
#[allow(non_camel_case_types)]
#[repr(C)]
pub struct hashring_error_t;

struct ErrorHandle {
    message: CString,
}

pub(crate) fn cstring_from_str_lossy(value: &str) -> CString {
    let sanitized = value.replace('\0', " ");
    CString::new(sanitized).unwrap_or_default()
}

pub(crate) fn clear_error(out_error: *mut *mut hashring_error_t) {
    if !out_error.is_null() {
        // Safety: caller provided a valid out_error pointer.
        unsafe {
            *out_error = ptr::null_mut();
        }
    }
}

pub(crate) fn write_error(out_error: *mut *mut hashring_error_t, message: impl Into<String>) {
    let message = message.into();
    log::debug!("reporting error to caller: {message}");
    if out_error.is_null() {
        return;
    }
    let handle = Box::new(ErrorHandle {
        message: cstring_from_str_lossy(&message),
    });
    // Safety: out_error is non-null and points to writable memory.
    unsafe {
        *out_error = Box::into_raw(handle) as *mut hashring_error_t;
    }
}

/// Returns the message for an error allocated by hashring.
///
/// The returned pointer is valid as long as the error handle is alive.
#[unsafe(no_mangle)]
pub extern "C" fn hashring_error_message(error: *const hashring_error_t) -> *const c_char {
    if error.is_null() {
        return ptr::null();
    }
    // Safety: error must be a valid handle allocated by hashring.
    let handle = unsafe { &*(error as *const ErrorHandle) };
    handle.message.as_ptr()
}

/// Frees an error returned by hashring.
#[unsafe(no_mangle)]
pub extern "C" fn hashring_error_free(error: *mut hashring_error_t) {
    if error.is_null() {
        return;
    }
    // Safety: error must be a valid handle allocated by hashring.
    unsafe {
        drop(Box::from_raw(error as *mut ErrorHandle));
    }
}

/// Frees a string allocated by hashring.
#[unsafe(no_mangle)]
pub extern "C" fn hashring_string_free(value: *mut c_char) {
    if value.is_null() {
        return;
    }
    // Safety: value must be a string returned by a hashring function.
    unsafe {
        drop(CString::from_raw(value));
    }
}
