//! Server descriptions accepted by the ring.

use std::fmt;
use std::str::FromStr;

use crate::error::{Result, RingError};

/// Port assumed when an address does not carry one.
pub const DEFAULT_PORT: u16 = 11211;

/// A server as supplied by the caller, before validation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServerSpec {
    pub address: String,
    pub weight: u32,
    /// Explicit virtual node count; `None` uses the ring default.
    pub vnodes: Option<u32>,
}

impl ServerSpec {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            weight: 1,
            vnodes: None,
        }
    }

    pub fn with_weight(mut self, weight: u32) -> Self {
        self.weight = weight;
        self
    }

    /// Sets an explicit virtual node count. 0 keeps the ring default.
    pub fn with_vnodes(mut self, vnodes: u32) -> Self {
        self.vnodes = (vnodes > 0).then_some(vnodes);
        self
    }
}

impl From<&str> for ServerSpec {
    fn from(address: &str) -> Self {
        ServerSpec::new(address)
    }
}

impl From<String> for ServerSpec {
    fn from(address: String) -> Self {
        ServerSpec::new(address)
    }
}

impl<S: Into<String>> From<(S, u32)> for ServerSpec {
    fn from((address, weight): (S, u32)) -> Self {
        ServerSpec::new(address).with_weight(weight)
    }
}

/// A validated ring member.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Server {
    /// The address exactly as supplied; this is what gets hashed.
    pub address: String,
    pub host: String,
    pub port: u16,
    pub weight: u32,
    pub vnodes: Option<u32>,
}

impl Server {
    pub fn from_spec(spec: &ServerSpec) -> Result<Self> {
        let address = spec.address.trim();
        if address.is_empty() {
            return Err(RingError::EmptyAddress);
        }
        if spec.weight == 0 {
            return Err(RingError::ZeroWeight(address.to_string()));
        }
        let (host, port) = split_host_port(address)?;
        Ok(Self {
            address: address.to_string(),
            host,
            port,
            weight: spec.weight,
            vnodes: spec.vnodes,
        })
    }

    /// Renames the server in place, keeping its weight and vnodes.
    pub(crate) fn rename(&mut self, address: &str) -> Result<()> {
        let renamed = Server::from_spec(&ServerSpec {
            address: address.to_string(),
            weight: self.weight,
            vnodes: self.vnodes,
        })?;
        *self = renamed;
        Ok(())
    }
}

impl FromStr for Server {
    type Err = RingError;

    fn from_str(value: &str) -> Result<Self> {
        Server::from_spec(&ServerSpec::new(value))
    }
}

impl fmt::Display for Server {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.address)
    }
}

fn split_host_port(address: &str) -> Result<(String, u16)> {
    let invalid_port = |port: &str| RingError::InvalidPort {
        address: address.to_string(),
        port: port.to_string(),
    };

    if let Some(rest) = address.strip_prefix('[') {
        let Some((host, tail)) = rest.split_once(']') else {
            return Ok((address.to_string(), DEFAULT_PORT));
        };
        return match tail.strip_prefix(':') {
            Some(port) => Ok((host.to_string(), port.parse().map_err(|_| invalid_port(port))?)),
            None if tail.is_empty() => Ok((host.to_string(), DEFAULT_PORT)),
            None => Err(invalid_port(tail)),
        };
    }

    // A bare IPv6 address has several colons and no port.
    if address.matches(':').count() > 1 {
        return Ok((address.to_string(), DEFAULT_PORT));
    }

    match address.split_once(':') {
        Some((host, port)) => Ok((host.to_string(), port.parse().map_err(|_| invalid_port(port))?)),
        None => Ok((address.to_string(), DEFAULT_PORT)),
    }
}
