use std::str::FromStr;

use crate::cache::DEFAULT_CACHE_SIZE;
use crate::digest::{Algorithm, DigestEncoding};
use crate::error::RingError;

pub const DEFAULT_VNODE_COUNT: u32 = 40;
pub const MAX_REPLICAS: u32 = 4;

/// Point layouts of the two common ketama implementations.
///
/// libketama places four points per virtual node, the python `hash_ring`
/// package three.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Compatibility {
    #[default]
    Ketama,
    HashRing,
}

impl Compatibility {
    pub fn replicas(self) -> u32 {
        match self {
            Compatibility::Ketama => 4,
            Compatibility::HashRing => 3,
        }
    }
}

impl FromStr for Compatibility {
    type Err = RingError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "ketama" | "libketama" => Ok(Compatibility::Ketama),
            "hash_ring" | "hashring" => Ok(Compatibility::HashRing),
            _ => Err(RingError::UnknownCompatibility(value.to_string())),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RingConfig {
    pub algorithm: Algorithm,
    pub encoding: DigestEncoding,
    /// Virtual nodes per server before weighting.
    pub vnode_count: u32,
    replicas: u32,
    pub max_cache_size: usize,
}

impl RingConfig {
    pub fn algorithm(mut self, algorithm: Algorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    pub fn encoding(mut self, encoding: DigestEncoding) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn vnode_count(mut self, vnode_count: u32) -> Self {
        self.vnode_count = vnode_count;
        self
    }

    /// Points per virtual node, clamped to `1..=MAX_REPLICAS`.
    pub fn replicas(mut self, replicas: u32) -> Self {
        self.replicas = replicas.clamp(1, MAX_REPLICAS);
        self
    }

    pub fn compatibility(self, compatibility: Compatibility) -> Self {
        self.replicas(compatibility.replicas())
    }

    pub fn max_cache_size(mut self, max_cache_size: usize) -> Self {
        self.max_cache_size = max_cache_size;
        self
    }

    pub fn replica_count(&self) -> u32 {
        self.replicas
    }
}

impl Default for RingConfig {
    fn default() -> Self {
        Self {
            algorithm: Algorithm::default(),
            encoding: DigestEncoding::default(),
            vnode_count: DEFAULT_VNODE_COUNT,
            replicas: Compatibility::default().replicas(),
            max_cache_size: DEFAULT_CACHE_SIZE,
        }
    }
}
