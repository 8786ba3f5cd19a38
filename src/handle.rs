//! C bindings for the hash ring.

use std::os::raw::c_char;
use std::panic::AssertUnwindSafe;
use std::ptr;

use once_cell::sync::Lazy;

use crate::cache::DEFAULT_CACHE_SIZE;
use crate::config::{Compatibility, DEFAULT_VNODE_COUNT, RingConfig};
use crate::digest::{Algorithm, DigestEncoding};
use crate::error::{
    RingError, clear_error, cstring_from_str_lossy, hashring_error_t, write_error,
};
use crate::ffi::{
    hashring_server_t, into_c_string, into_c_string_array, read_cstr, read_optional_cstr,
    read_servers,
};
use crate::ring::HashRing;

/// Opaque hash ring handle for C callers.
///
/// A handle must not be used from two threads at the same time.
#[allow(non_camel_case_types)]
#[repr(C)]
pub struct hashring_t;

/// Replica layout presets.
#[allow(non_camel_case_types)]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[repr(C)]
pub enum hashring_compatibility_t {
    HASHRING_COMPATIBILITY_KETAMA = 0,
    HASHRING_COMPATIBILITY_HASH_RING = 1,
}

impl From<hashring_compatibility_t> for Compatibility {
    fn from(value: hashring_compatibility_t) -> Self {
        match value {
            hashring_compatibility_t::HASHRING_COMPATIBILITY_KETAMA => Compatibility::Ketama,
            hashring_compatibility_t::HASHRING_COMPATIBILITY_HASH_RING => Compatibility::HashRing,
        }
    }
}

/// Ring configuration for `hashring_create`.
///
/// A null `algorithm` selects md5. `replicas` of 0 takes the count from
/// `compatibility`.
#[allow(non_camel_case_types)]
#[repr(C)]
pub struct hashring_config_t {
    pub algorithm: *const c_char,
    pub compatibility: hashring_compatibility_t,
    pub vnode_count: u32,
    pub replicas: u32,
    pub max_cache_size: usize,
    pub hex_digest: bool,
}

struct RingHandle {
    ring: HashRing,
}

static VERSION: Lazy<std::ffi::CString> =
    Lazy::new(|| cstring_from_str_lossy(env!("CARGO_PKG_VERSION")));

/// Returns the library version.
///
/// The returned pointer is owned by hashring and must not be freed.
#[unsafe(no_mangle)]
pub extern "C" fn hashring_version() -> *const c_char {
    VERSION.as_ptr()
}

/// Fills `config` with the ketama defaults.
#[unsafe(no_mangle)]
pub extern "C" fn hashring_config_init(config: *mut hashring_config_t) {
    if config.is_null() {
        return;
    }
    // Safety: caller provided a writable config pointer.
    unsafe {
        *config = hashring_config_t {
            algorithm: ptr::null(),
            compatibility: hashring_compatibility_t::HASHRING_COMPATIBILITY_KETAMA,
            vnode_count: DEFAULT_VNODE_COUNT,
            replicas: 0,
            max_cache_size: DEFAULT_CACHE_SIZE,
            hex_digest: false,
        };
    }
}

fn ring_config(config: Option<&hashring_config_t>) -> Result<RingConfig, String> {
    let Some(config) = config else {
        return Ok(RingConfig::default());
    };
    let algorithm = match read_optional_cstr(config.algorithm) {
        Some(name) => name.parse::<Algorithm>().map_err(|err| err.to_string())?,
        None => Algorithm::default(),
    };
    let encoding = if config.hex_digest {
        DigestEncoding::Hex
    } else {
        DigestEncoding::Raw
    };
    let mut ring_config = RingConfig::default()
        .algorithm(algorithm)
        .encoding(encoding)
        .vnode_count(config.vnode_count)
        .max_cache_size(config.max_cache_size)
        .compatibility(config.compatibility.into());
    if config.replicas > 0 {
        ring_config = ring_config.replicas(config.replicas);
    }
    Ok(ring_config)
}

fn ring_ref<'a>(ring: *const hashring_t) -> Option<&'a HashRing> {
    if ring.is_null() {
        return None;
    }
    // Safety: ring must be a valid handle allocated by hashring.
    let handle = unsafe { &*(ring as *const RingHandle) };
    Some(&handle.ring)
}

fn ring_mut<'a>(ring: *mut hashring_t) -> Option<&'a mut HashRing> {
    if ring.is_null() {
        return None;
    }
    // Safety: ring must be a valid handle allocated by hashring and not be
    // shared with another thread during the call.
    let handle = unsafe { &mut *(ring as *mut RingHandle) };
    Some(&mut handle.ring)
}

/// Creates a ring from `len` servers. `config` may be null for defaults.
///
/// The returned handle must be released with `hashring_free`.
#[unsafe(no_mangle)]
pub extern "C" fn hashring_create(
    servers: *const hashring_server_t,
    len: usize,
    config: *const hashring_config_t,
    out_error: *mut *mut hashring_error_t,
) -> *mut hashring_t {
    clear_error(out_error);
    // Safety: a non-null config must point to a valid hashring_config_t.
    let config = match ring_config(unsafe { config.as_ref() }) {
        Ok(config) => config,
        Err(message) => {
            write_error(out_error, message);
            return ptr::null_mut();
        }
    };
    let Some(specs) = read_servers(servers, len, out_error) else {
        return ptr::null_mut();
    };

    let result = std::panic::catch_unwind(AssertUnwindSafe(|| HashRing::new(specs, config)));
    match result {
        Ok(Ok(ring)) => Box::into_raw(Box::new(RingHandle { ring })) as *mut hashring_t,
        Ok(Err(err)) => {
            write_error(out_error, err.to_string());
            ptr::null_mut()
        }
        Err(_) => {
            write_error(out_error, "panic while building hash ring");
            ptr::null_mut()
        }
    }
}

/// Frees a ring handle.
#[unsafe(no_mangle)]
pub extern "C" fn hashring_free(ring: *mut hashring_t) {
    if ring.is_null() {
        return;
    }
    // Safety: ring must be a valid handle allocated by hashring.
    unsafe {
        drop(Box::from_raw(ring as *mut RingHandle));
    }
}

/// Returns the server responsible for `key`, or null if the ring is empty.
///
/// The returned string is heap-allocated and must be freed with
/// `hashring_string_free`.
#[unsafe(no_mangle)]
pub extern "C" fn hashring_get(
    ring: *mut hashring_t,
    key: *const c_char,
    out_error: *mut *mut hashring_error_t,
) -> *mut c_char {
    clear_error(out_error);
    let Some(ring) = ring_mut(ring) else {
        write_error(out_error, "ring handle was null");
        return ptr::null_mut();
    };
    let Some(key) = read_cstr(key, "key", out_error) else {
        return ptr::null_mut();
    };
    let result = std::panic::catch_unwind(AssertUnwindSafe(|| ring.get(&key).map(into_c_string)));
    match result {
        Ok(server) => server.unwrap_or(ptr::null_mut()),
        Err(_) => {
            write_error(out_error, "panic while looking up key");
            ptr::null_mut()
        }
    }
}

/// Returns the ring point `key` hashes to.
#[unsafe(no_mangle)]
pub extern "C" fn hashring_key_value(
    ring: *const hashring_t,
    key: *const c_char,
    out_error: *mut *mut hashring_error_t,
) -> u32 {
    clear_error(out_error);
    let Some(ring) = ring_ref(ring) else {
        write_error(out_error, "ring handle was null");
        return 0;
    };
    let Some(key) = read_cstr(key, "key", out_error) else {
        return 0;
    };
    match std::panic::catch_unwind(AssertUnwindSafe(|| ring.hash_value(&key))) {
        Ok(value) => value,
        Err(_) => {
            write_error(out_error, "panic while hashing key");
            0
        }
    }
}

/// Returns the index of the node owning `point`. A null or empty ring yields 0.
#[unsafe(no_mangle)]
pub extern "C" fn hashring_find(ring: *const hashring_t, point: u32) -> usize {
    ring_ref(ring).map_or(0, |ring| ring.find(point))
}

/// Collects up to `size` servers clockwise from `key`. A `size` of 0 means
/// one per server.
///
/// The returned array holds `*out_len` strings and must be freed with
/// `hashring_string_array_free`. An empty result is returned as null.
#[unsafe(no_mangle)]
pub extern "C" fn hashring_range(
    ring: *const hashring_t,
    key: *const c_char,
    size: usize,
    unique: bool,
    out_len: *mut usize,
    out_error: *mut *mut hashring_error_t,
) -> *mut *mut c_char {
    clear_error(out_error);
    if out_len.is_null() {
        write_error(out_error, "out_len was null");
        return ptr::null_mut();
    }
    // Safety: out_len is non-null and points to writable memory.
    unsafe {
        *out_len = 0;
    }
    let Some(ring) = ring_ref(ring) else {
        write_error(out_error, "ring handle was null");
        return ptr::null_mut();
    };
    let Some(key) = read_cstr(key, "key", out_error) else {
        return ptr::null_mut();
    };
    let size = if size == 0 { None } else { Some(size) };
    match std::panic::catch_unwind(AssertUnwindSafe(|| ring.range(&key, size, unique))) {
        Ok(servers) => into_c_string_array(servers, out_len),
        Err(_) => {
            write_error(out_error, "panic while collecting range");
            ptr::null_mut()
        }
    }
}

/// Adds servers and rebuilds the ring. Servers already present are skipped.
#[unsafe(no_mangle)]
pub extern "C" fn hashring_add(
    ring: *mut hashring_t,
    servers: *const hashring_server_t,
    len: usize,
    out_error: *mut *mut hashring_error_t,
) -> bool {
    clear_error(out_error);
    let Some(ring) = ring_mut(ring) else {
        write_error(out_error, "ring handle was null");
        return false;
    };
    let Some(specs) = read_servers(servers, len, out_error) else {
        return false;
    };
    match std::panic::catch_unwind(AssertUnwindSafe(|| ring.add(specs))) {
        Ok(Ok(_)) => true,
        Ok(Err(err)) => {
            write_error(out_error, err.to_string());
            false
        }
        Err(_) => {
            write_error(out_error, "panic while adding servers");
            false
        }
    }
}

/// Removes a server and rebuilds the ring. Returns false with an error if the
/// server was not a member.
#[unsafe(no_mangle)]
pub extern "C" fn hashring_remove(
    ring: *mut hashring_t,
    server: *const c_char,
    out_error: *mut *mut hashring_error_t,
) -> bool {
    clear_error(out_error);
    let Some(ring) = ring_mut(ring) else {
        write_error(out_error, "ring handle was null");
        return false;
    };
    let Some(server) = read_cstr(server, "server", out_error) else {
        return false;
    };
    match std::panic::catch_unwind(AssertUnwindSafe(|| ring.remove(&server))) {
        Ok(true) => true,
        Ok(false) => {
            write_error(out_error, RingError::UnknownServer(server).to_string());
            false
        }
        Err(_) => {
            write_error(out_error, "panic while removing server");
            false
        }
    }
}

/// Hot-swaps server `from` for `to`, keeping the continuum.
#[unsafe(no_mangle)]
pub extern "C" fn hashring_swap(
    ring: *mut hashring_t,
    from: *const c_char,
    to: *const c_char,
    out_error: *mut *mut hashring_error_t,
) -> bool {
    clear_error(out_error);
    let Some(ring) = ring_mut(ring) else {
        write_error(out_error, "ring handle was null");
        return false;
    };
    let Some(from) = read_cstr(from, "from", out_error) else {
        return false;
    };
    let Some(to) = read_cstr(to, "to", out_error) else {
        return false;
    };
    match std::panic::catch_unwind(AssertUnwindSafe(|| ring.swap(&from, &to))) {
        Ok(Ok(())) => true,
        Ok(Err(err)) => {
            write_error(out_error, err.to_string());
            false
        }
        Err(_) => {
            write_error(out_error, "panic while swapping servers");
            false
        }
    }
}

/// Drops the continuum and the lookup cache. Servers are kept; call
/// `hashring_add` to rebuild.
#[unsafe(no_mangle)]
pub extern "C" fn hashring_reset(ring: *mut hashring_t) {
    if let Some(ring) = ring_mut(ring) {
        ring.reset();
    }
}

/// Number of points on the continuum.
#[unsafe(no_mangle)]
pub extern "C" fn hashring_size(ring: *const hashring_t) -> usize {
    ring_ref(ring).map_or(0, HashRing::len)
}

/// Number of servers in the ring.
#[unsafe(no_mangle)]
pub extern "C" fn hashring_server_count(ring: *const hashring_t) -> usize {
    ring_ref(ring).map_or(0, |ring| ring.servers().len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults() {
        let mut config = std::mem::MaybeUninit::<hashring_config_t>::uninit();
        hashring_config_init(config.as_mut_ptr());
        let config = unsafe { config.assume_init() };
        assert_eq!(ring_config(Some(&config)), Ok(RingConfig::default()));
        assert_eq!(ring_config(None), Ok(RingConfig::default()));
    }

    #[test]
    fn config_overrides() {
        let algorithm = std::ffi::CString::new("sha1").unwrap();
        let config = hashring_config_t {
            algorithm: algorithm.as_ptr(),
            compatibility: hashring_compatibility_t::HASHRING_COMPATIBILITY_HASH_RING,
            vnode_count: 10,
            replicas: 0,
            max_cache_size: 0,
            hex_digest: true,
        };
        let resolved = ring_config(Some(&config)).unwrap();
        assert_eq!(resolved.algorithm, Algorithm::Sha1);
        assert_eq!(resolved.encoding, DigestEncoding::Hex);
        assert_eq!(resolved.vnode_count, 10);
        assert_eq!(resolved.replica_count(), 3);
        assert_eq!(resolved.max_cache_size, 0);
    }

    #[test]
    fn unknown_algorithm_is_reported() {
        let algorithm = std::ffi::CString::new("whirlpool").unwrap();
        let mut config = std::mem::MaybeUninit::<hashring_config_t>::uninit();
        hashring_config_init(config.as_mut_ptr());
        let mut config = unsafe { config.assume_init() };
        config.algorithm = algorithm.as_ptr();
        assert_eq!(
            ring_config(Some(&config)),
            Err("unsupported hash algorithm `whirlpool`".to_string())
        );
    }
}
