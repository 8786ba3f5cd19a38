//! Message digests that feed ring points.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use data_encoding::HEXLOWER;
use md5::Md5;
use sha1::{Digest, Sha1};

use crate::error::RingError;
use crate::hash_value::hash_value;

/// Hash algorithm used to place servers and keys on the ring.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Algorithm {
    #[default]
    Md5,
    Sha1,
    Crc32,
    /// A caller supplied digest. Never produced by parsing a name.
    Custom(CustomDigest),
}

/// A named digest function supplied by the caller.
///
/// Two custom digests compare equal when their names do.
#[derive(Clone, Copy)]
pub struct CustomDigest {
    name: &'static str,
    digest: fn(&[u8]) -> Vec<u8>,
}

impl CustomDigest {
    pub const fn new(name: &'static str, digest: fn(&[u8]) -> Vec<u8>) -> Self {
        Self { name, digest }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn digest(&self, key: &[u8]) -> Vec<u8> {
        (self.digest)(key)
    }
}

impl fmt::Debug for CustomDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomDigest")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl PartialEq for CustomDigest {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for CustomDigest {}

impl Hash for CustomDigest {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

/// How digest bytes are presented to the point packer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum DigestEncoding {
    /// The digest bytes themselves.
    #[default]
    Raw,
    /// The ASCII codes of the lower-case hex rendering of the digest.
    Hex,
}

impl Algorithm {
    pub fn name(self) -> &'static str {
        match self {
            Algorithm::Md5 => "md5",
            Algorithm::Sha1 => "sha1",
            Algorithm::Crc32 => "crc32",
            Algorithm::Custom(custom) => custom.name(),
        }
    }

    /// Digests `key`.
    ///
    /// CRC-32 is not a byte digest. See [`crc32_digest`] for the bytes it
    /// produces.
    pub fn digest(self, key: &[u8]) -> Vec<u8> {
        match self {
            Algorithm::Md5 => Md5::digest(key).to_vec(),
            Algorithm::Sha1 => Sha1::digest(key).to_vec(),
            Algorithm::Crc32 => crc32_digest(key),
            Algorithm::Custom(custom) => custom.digest(key),
        }
    }

    pub fn digest_with(self, key: &[u8], encoding: DigestEncoding) -> Vec<u8> {
        let digest = self.digest(key);
        match encoding {
            DigestEncoding::Raw => digest,
            DigestEncoding::Hex => HEXLOWER.encode(&digest).into_bytes(),
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Algorithm {
    type Err = RingError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "md5" => Ok(Algorithm::Md5),
            "sha1" | "sha-1" => Ok(Algorithm::Sha1),
            "crc32" | "crc-32" => Ok(Algorithm::Crc32),
            _ => Err(RingError::UnknownAlgorithm(value.to_string())),
        }
    }
}

/// Packs the four digest bytes of `replica` into a ring point.
///
/// Each replica reads its group of four bytes in little-endian order, as
/// libketama does. Positions past the end of the digest read as zero.
pub fn point(digest: &[u8], replica: usize) -> u32 {
    let byte = |offset: usize| -> i32 {
        digest
            .get(replica * 4 + offset)
            .copied()
            .map(i32::from)
            .unwrap_or(0)
    };
    hash_value(byte(3), byte(2), byte(1), byte(0))
}

const CRC32_TABLE: [u32; 256] = {
    let mut table = [0u32; 256];
    let mut n = 0;
    while n < 256 {
        let mut crc = n as u32;
        let mut bit = 0;
        while bit < 8 {
            crc = if crc & 1 == 1 {
                0xedb8_8320 ^ (crc >> 1)
            } else {
                crc >> 1
            };
            bit += 1;
        }
        table[n] = crc;
        n += 1;
    }
    table
};

/// IEEE CRC-32.
pub fn crc32(bytes: &[u8]) -> u32 {
    let mut crc = u32::MAX;
    for &b in bytes {
        crc = (crc >> 8) ^ CRC32_TABLE[((crc ^ u32::from(b)) & 0xff) as usize];
    }
    !crc
}

/// The digest bytes ketama rings have always used for CRC-32.
///
/// The checksum runs over the low byte of every UTF-16 code unit of the key.
/// Its decimal rendering is turned into a list of character codes, and that
/// list, joined with commas, is what gets packed. For `"123456789"` the
/// checksum is `3421780262` and the digest is the ASCII of
/// `"51,52,50,49,55,56,48,50,54,50"`.
pub fn crc32_digest(key: &[u8]) -> Vec<u8> {
    let units: Vec<u8> = String::from_utf8_lossy(key)
        .encode_utf16()
        .map(|unit| unit as u8)
        .collect();
    crc32(&units)
        .to_string()
        .bytes()
        .map(|digit| digit.to_string())
        .collect::<Vec<_>>()
        .join(",")
        .into_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_algorithm_names() {
        assert_eq!("md5".parse::<Algorithm>(), Ok(Algorithm::Md5));
        assert_eq!("SHA1".parse::<Algorithm>(), Ok(Algorithm::Sha1));
        assert_eq!(" crc32 ".parse::<Algorithm>(), Ok(Algorithm::Crc32));
        assert_eq!(
            "whirlpool".parse::<Algorithm>(),
            Err(RingError::UnknownAlgorithm("whirlpool".into()))
        );
        assert_eq!(Algorithm::default().to_string(), "md5");
    }

    #[test]
    fn crc32_check_values() {
        assert_eq!(crc32(b""), 0);
        assert_eq!(crc32(b"123456789"), 0xcbf4_3926);
        assert_eq!(crc32(b"The quick brown fox jumps over the lazy dog"), 0x414f_a339);
    }

    #[test]
    fn crc32_digest_joins_decimal_char_codes() {
        assert_eq!(
            Algorithm::Crc32.digest(b"123456789"),
            b"51,52,50,49,55,56,48,50,54,50".to_vec()
        );
        assert_eq!(Algorithm::Crc32.digest(b"key0"), b"49,53,51,50,55,49,50,49,51,52".to_vec());
        // Only the low byte of each UTF-16 unit reaches the checksum.
        assert_eq!(crc32_digest("\u{0141}".as_bytes()), crc32_digest(b"A"));
    }

    #[test]
    fn custom_digest_is_called_and_named() {
        fn reversed(key: &[u8]) -> Vec<u8> {
            key.iter().rev().copied().collect()
        }
        let custom = Algorithm::Custom(CustomDigest::new("reversed", reversed));
        assert_eq!(custom.digest(b"abcd"), b"dcba".to_vec());
        assert_eq!(custom.to_string(), "reversed");
        assert_eq!(custom, Algorithm::Custom(CustomDigest::new("reversed", reversed)));
        assert_eq!(
            "reversed".parse::<Algorithm>(),
            Err(RingError::UnknownAlgorithm("reversed".into()))
        );
        assert_eq!(point(&custom.digest(&[1, 2, 3, 4]), 0), 0x0102_0304);
    }

    #[test]
    fn md5_and_sha1_digests() {
        assert_eq!(
            HEXLOWER.encode(&Algorithm::Md5.digest(b"")),
            "d41d8cd98f00b204e9800998ecf8427e"
        );
        assert_eq!(
            HEXLOWER.encode(&Algorithm::Sha1.digest(b"abc")),
            "a9993e364706816aba3e25717850c26c9cd0d89d"
        );
    }

    #[test]
    fn hex_encoding_uses_ascii_codes() {
        let hex = Algorithm::Md5.digest_with(b"", DigestEncoding::Hex);
        assert_eq!(hex, b"d41d8cd98f00b204e9800998ecf8427e".to_vec());
    }

    #[test]
    fn points_read_little_endian_groups() {
        let digest = [0x01, 0x02, 0x03, 0x04, 0xaa, 0xbb, 0xcc, 0xdd];
        assert_eq!(point(&digest, 0), 0x0403_0201);
        assert_eq!(point(&digest, 1), 0xddcc_bbaa);
        assert_eq!(point(&digest, 2), 0);
        assert_eq!(point(&[0x10, 0x20], 0), 0x0000_2010);
    }
}
