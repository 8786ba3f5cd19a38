//! Ketama compatible consistent hashing with C bindings.
//!
//! Ring points are built by [`hash_value`], which packs four digest bytes
//! into a 32-bit integer. [`HashRing`] maps keys onto weighted servers using
//! those points, and the `hashring_*` symbols expose both to C callers.

mod cache;
mod config;
mod digest;
mod error;
mod ffi;
mod handle;
mod hash_value;
mod logging;
mod ring;
mod server;

pub use cache::{DEFAULT_CACHE_SIZE, LookupCache};
pub use config::{Compatibility, DEFAULT_VNODE_COUNT, MAX_REPLICAS, RingConfig};
pub use digest::{Algorithm, CustomDigest, DigestEncoding, crc32, crc32_digest, point};
pub use error::{
    Result, RingError, hashring_error_free, hashring_error_message, hashring_error_t,
    hashring_string_free,
};
pub use ffi::{hashring_server_t, hashring_string_array_free};
pub use handle::{
    hashring_add, hashring_compatibility_t, hashring_config_init, hashring_config_t,
    hashring_create, hashring_find, hashring_free, hashring_get, hashring_key_value,
    hashring_range, hashring_remove, hashring_reset, hashring_server_count, hashring_size,
    hashring_swap, hashring_t, hashring_version,
};
pub use hash_value::{
    hash_bytes, hash_value, hash_value_f64, hash_value_unmasked, hashring_hash_value,
    hashring_hash_value_f64, hashring_hash_value_unmasked, truncate_to_int,
};
pub use logging::{
    hashring_log_callback_t, hashring_log_config_init, hashring_log_config_t, hashring_log_init,
    hashring_log_level_t, hashring_log_record_t,
};
pub use ring::{HashRing, Node};
pub use server::{DEFAULT_PORT, Server, ServerSpec};
