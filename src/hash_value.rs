//! Packing of four byte lanes into a single 32-bit ring point.

/// Packs four bytes into a `u32`, most significant lane first.
///
/// Every input is masked to its low eight bits before it is shifted into
/// place, so out-of-range values can never spill into a neighbouring lane.
///
/// ```
/// assert_eq!(hashring::hash_value(18, 52, 171, 205), 0x1234_ABCD);
/// assert_eq!(hashring::hash_value(256, 0, 0, 0), 0);
/// ```
#[inline]
pub const fn hash_value(b0: i32, b1: i32, b2: i32, b3: i32) -> u32 {
    hash_value_unmasked(b0 & 0xff, b1 & 0xff, b2 & 0xff, b3 & 0xff)
}

/// Packs four integers into a `u32` without masking them first.
///
/// This reproduces the historical native addon bit for bit: an input wider
/// than a byte is OR-ed over the lanes below its own, and a negative input
/// sets every bit from its lane downwards.
#[inline]
pub const fn hash_value_unmasked(b0: i32, b1: i32, b2: i32, b3: i32) -> u32 {
    ((b0 << 24) | (b1 << 16) | (b2 << 8) | b3) as u32
}

/// Packs four bytes into a `u32`.
#[inline]
pub const fn hash_bytes(lanes: [u8; 4]) -> u32 {
    u32::from_be_bytes(lanes)
}

/// Converts a host number to the signed integer fed to the packer.
///
/// Fractions are truncated toward zero, NaN becomes 0 and values beyond the
/// `i32` range saturate.
#[inline]
pub fn truncate_to_int(value: f64) -> i32 {
    value as i32
}

/// Packs four host numbers with the unmasked policy and returns the result as
/// a double. Every `u32` is exactly representable as an `f64`.
pub fn hash_value_f64(b0: f64, b1: f64, b2: f64, b3: f64) -> f64 {
    f64::from(hash_value_unmasked(
        truncate_to_int(b0),
        truncate_to_int(b1),
        truncate_to_int(b2),
        truncate_to_int(b3),
    ))
}

/// C entry point for the masked packer.
#[unsafe(no_mangle)]
pub extern "C" fn hashring_hash_value(b0: i32, b1: i32, b2: i32, b3: i32) -> u32 {
    hash_value(b0, b1, b2, b3)
}

/// C entry point for the unmasked (legacy) packer.
#[unsafe(no_mangle)]
pub extern "C" fn hashring_hash_value_unmasked(b0: i32, b1: i32, b2: i32, b3: i32) -> u32 {
    hash_value_unmasked(b0, b1, b2, b3)
}

/// C entry point for hosts whose only numeric type is a double.
///
/// Uses the unmasked policy, matching the original addon's `hash` function.
#[unsafe(no_mangle)]
pub extern "C" fn hashring_hash_value_f64(b0: f64, b1: f64, b2: f64, b3: f64) -> f64 {
    hash_value_f64(b0, b1, b2, b3)
}
