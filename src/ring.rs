//! Ketama style consistent hash ring.
//!
//! Every server is expanded into a number of virtual nodes proportional to
//! its weight. Each virtual node is digested and the digest is cut into up to
//! four 32-bit points on the continuum. A key belongs to the first point at
//! or after its own hash value, wrapping around at the end of the ring.

use std::collections::{BTreeMap, HashSet};

use log::{debug, info, trace};

use crate::cache::LookupCache;
use crate::config::RingConfig;
use crate::digest;
use crate::error::{Result, RingError};
use crate::server::{Server, ServerSpec};

/// A single point on the continuum.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Node {
    pub value: u32,
    pub server: String,
}

pub struct HashRing {
    config: RingConfig,
    servers: Vec<Server>,
    ring: Vec<Node>,
    cache: LookupCache,
}

impl HashRing {
    pub fn new<I, S>(servers: I, config: RingConfig) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<ServerSpec>,
    {
        let mut ring = Self {
            cache: LookupCache::new(config.max_cache_size),
            config,
            servers: Vec::new(),
            ring: Vec::new(),
        };
        ring.merge(servers)?;
        ring.continuum();
        Ok(ring)
    }

    pub fn with_servers<I, S>(servers: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<ServerSpec>,
    {
        HashRing::new(servers, RingConfig::default())
    }

    pub fn config(&self) -> &RingConfig {
        &self.config
    }

    pub fn servers(&self) -> &[Server] {
        &self.servers
    }

    pub fn nodes(&self) -> &[Node] {
        &self.ring
    }

    /// Number of points on the continuum.
    pub fn len(&self) -> usize {
        self.ring.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    pub fn cache(&self) -> &LookupCache {
        &self.cache
    }

    /// Validates `specs` and appends the ones not yet present. Returns the
    /// number of servers added. Nothing is added if any spec is invalid.
    fn merge<I, S>(&mut self, specs: I) -> Result<usize>
    where
        I: IntoIterator<Item = S>,
        S: Into<ServerSpec>,
    {
        let mut known: HashSet<String> =
            self.servers.iter().map(|s| s.address.clone()).collect();
        let mut added = Vec::new();
        for spec in specs {
            let server = Server::from_spec(&spec.into())?;
            if known.insert(server.address.clone()) {
                added.push(server);
            }
        }
        let count = added.len();
        self.servers.extend(added);
        Ok(count)
    }

    /// An explicit count only applies when it is set and differs from the
    /// ring default. Otherwise the weighted share is used.
    fn vnodes_for(&self, server: &Server, total_weight: f64) -> u32 {
        match server.vnodes {
            Some(vnodes) if vnodes > 0 && vnodes != self.config.vnode_count => return vnodes,
            _ => {}
        }
        let share = f64::from(server.weight) / total_weight;
        (share * f64::from(self.config.vnode_count) * self.servers.len() as f64).floor() as u32
    }

    fn digest(&self, key: &str) -> Vec<u8> {
        self.config
            .algorithm
            .digest_with(key.as_bytes(), self.config.encoding)
    }

    /// Rebuilds the continuum from the current server list.
    fn continuum(&mut self) {
        self.ring.clear();
        if self.servers.is_empty() {
            return;
        }

        let total_weight: f64 = self.servers.iter().map(|s| f64::from(s.weight)).sum();
        let replicas = self.config.replica_count() as usize;
        let mut ring = Vec::new();

        for server in &self.servers {
            let vnodes = self.vnodes_for(server, total_weight);
            for i in 0..vnodes {
                let digest = self.digest(&format!("{}-{}", server.address, i));
                for replica in 0..replicas {
                    ring.push(Node {
                        value: digest::point(&digest, replica),
                        server: server.address.clone(),
                    });
                }
            }
        }

        ring.sort_by_key(|node| node.value);
        self.ring = ring;
        debug!(
            "built continuum with {} points for {} servers ({}, {} replicas)",
            self.ring.len(),
            self.servers.len(),
            self.config.algorithm,
            replicas
        );
    }

    /// The point `key` hashes to.
    pub fn hash_value(&self, key: &str) -> u32 {
        digest::point(&self.digest(key), 0)
    }

    /// Index of the node owning `point`: the first node whose value is not
    /// below it, or 0 when the point lies past the last node.
    pub fn find(&self, point: u32) -> usize {
        let index = self.ring.partition_point(|node| node.value < point);
        if index == self.ring.len() { 0 } else { index }
    }

    /// Looks up the server responsible for `key`.
    pub fn get(&mut self, key: &str) -> Option<&str> {
        if self.cache.peek(key).is_some() {
            trace!("cache hit for `{key}`");
            return self.cache.get(key);
        }
        let index = self.find(self.hash_value(key));
        let node = self.ring.get(index)?;
        self.cache.insert(key, &node.server);
        Some(node.server.as_str())
    }

    /// Collects servers clockwise from the position of `key`.
    ///
    /// `size` defaults to the number of servers. With `unique` every server
    /// appears at most once.
    pub fn range(&self, key: &str, size: Option<usize>, unique: bool) -> Vec<String> {
        if self.ring.is_empty() {
            return Vec::new();
        }
        let size = size.filter(|&size| size > 0).unwrap_or(self.servers.len());
        let position = self.find(self.hash_value(key));
        let mut servers: Vec<String> = Vec::new();

        let clockwise = self.ring[position..].iter().chain(&self.ring[..position]);
        for node in clockwise {
            if unique && servers.contains(&node.server) {
                continue;
            }
            servers.push(node.server.clone());
            if servers.len() == size {
                break;
            }
        }
        servers
    }

    /// Points owned by each server, in ring order.
    ///
    /// With `filter` only the named servers are reported; otherwise every
    /// server is, including ones that own no points.
    pub fn points(&self, filter: Option<&[&str]>) -> BTreeMap<String, Vec<u32>> {
        let mut nodes: BTreeMap<String, Vec<u32>> = match filter {
            Some(names) => names.iter().map(|name| (name.to_string(), Vec::new())).collect(),
            None => self
                .servers
                .iter()
                .map(|server| (server.address.clone(), Vec::new()))
                .collect(),
        };
        for node in &self.ring {
            if let Some(points) = nodes.get_mut(&node.server) {
                points.push(node.value);
            }
        }
        nodes
    }

    /// Hot-swaps `from` for `to` without recomputing the continuum.
    ///
    /// `to` takes over every point and cached key of `from`. Adding and
    /// removing instead would give `to` its own, different points.
    pub fn swap(&mut self, from: &str, to: &str) -> Result<()> {
        let from = from.trim();
        let Some(index) = self.servers.iter().position(|s| s.address == from) else {
            return Err(RingError::UnknownServer(from.to_string()));
        };
        self.servers[index].rename(to)?;
        let to = self.servers[index].address.clone();

        for node in self.ring.iter_mut().filter(|node| node.server == from) {
            node.server.clone_from(&to);
        }
        let cached = self.cache.replace_value(from, &to);
        info!("swapped `{from}` for `{to}` ({cached} cached keys moved)");
        Ok(())
    }

    /// Adds servers and rebuilds the ring. Servers already present are
    /// skipped. Returns the number of servers added.
    pub fn add<I, S>(&mut self, servers: I) -> Result<usize>
    where
        I: IntoIterator<Item = S>,
        S: Into<ServerSpec>,
    {
        let added = self.merge(servers)?;
        info!("added {added} servers, {} in ring", self.servers.len());
        self.reset();
        self.continuum();
        Ok(added)
    }

    /// Removes `server` and rebuilds the ring. Returns whether it was a member.
    pub fn remove(&mut self, server: &str) -> bool {
        let server = server.trim();
        let before = self.servers.len();
        self.servers.retain(|s| s.address != server);
        let removed = self.servers.len() != before;
        if removed {
            info!("removed `{server}`, {} in ring", self.servers.len());
        }
        self.reset();
        self.continuum();
        removed
    }

    /// Drops the continuum and every cached lookup. Servers are kept.
    pub fn reset(&mut self) {
        self.ring.clear();
        self.cache.clear();
    }

    /// Resets the ring and forgets all servers.
    pub fn end(&mut self) {
        self.reset();
        self.servers.clear();
    }
}
