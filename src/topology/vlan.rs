// VLANs and IP networks

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{AttackGraphError, Result};
use crate::topology::ip_address::IpAddress;

/// Handle of a VLAN in the topology arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct VlanId(pub(crate) usize);

impl fmt::Display for VlanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "vlan#{}", self.0)
    }
}

/// An IP network: address plus netmask
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Network {
    pub address: IpAddress,
    pub mask: IpAddress,
}

impl Network {
    pub fn new(address: IpAddress, mask: IpAddress) -> Self {
        Self { address, mask }
    }

    /// The /32 network of a single address
    pub fn host(address: IpAddress) -> Self {
        Self { address, mask: IpAddress::HOST_MASK }
    }

    pub fn internet() -> Self {
        Self { address: IpAddress::ANY, mask: IpAddress::ANY }
    }

    /// Whether `other` lies inside this network
    pub fn contains_network(&self, other: &Network) -> bool {
        IpAddress::network_in_other_network(other.address, other.mask, self.address, self.mask)
    }

    pub fn contains_address(&self, address: IpAddress) -> bool {
        self.contains_network(&Network::host(address))
    }

    pub fn is_included_in(&self, other: &Network) -> bool {
        other.contains_network(self)
    }

    /// 0.0.0.0/0
    pub fn is_internet(&self) -> bool {
        self.address == IpAddress::ANY && self.mask == IpAddress::ANY
    }
}

impl FromStr for Network {
    type Err = AttackGraphError;

    /// Parses "a.b.c.d/n"
    fn from_str(value: &str) -> Result<Self> {
        let (address, prefix) = value
            .split_once('/')
            .ok_or_else(|| AttackGraphError::Format(format!("Wrong network format: {}", value)))?;
        let prefix_length = prefix
            .trim()
            .parse::<u32>()
            .map_err(|_| AttackGraphError::Format(format!("Wrong network format: {}", value)))?;
        Ok(Self::new(IpAddress::new(address)?, IpAddress::ipv4_netmask(prefix_length)?))
    }
}

impl TryFrom<String> for Network {
    type Error = AttackGraphError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Network> for String {
    fn from(value: Network) -> Self {
        value.to_string()
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.address, self.mask.mask_prefix_length())
    }
}

/// A layer-2 broadcast domain.
///
/// Members are not stored: the interfaces whose `vlan` handle points here are
/// the members.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vlan {
    /// Unique key inside a topology
    pub label: String,
    pub name: String,
    pub network: Option<Network>,
}

impl Vlan {
    pub fn new(label: &str, name: &str) -> Self {
        Self { label: label.to_string(), name: name.to_string(), network: None }
    }
}

impl fmt::Display for Vlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VLAN {} ({})", self.label, self.name)?;
        if let Some(network) = &self.network {
            write!(f, " {}", network)?;
        }
        Ok(())
    }
}
