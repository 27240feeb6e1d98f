// IPv4 addresses and masks

use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{AttackGraphError, Result};

/// A 32-bit IPv4 value, used both for addresses and for netmasks
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct IpAddress(u32);

impl IpAddress {
    pub const ANY: IpAddress = IpAddress(0);
    pub const HOST_MASK: IpAddress = IpAddress(u32::MAX);

    pub fn new(address: &str) -> Result<Self> {
        address.parse()
    }

    pub fn from_u32(value: u32) -> Self {
        Self(value)
    }

    pub fn to_u32(self) -> u32 {
        self.0
    }

    /// Whether `candidate` is a dotted-quad IPv4 address
    pub fn is_an_ip_address(candidate: &str) -> bool {
        candidate.parse::<Ipv4Addr>().is_ok()
    }

    /// Netmask with the `prefix_length` high bits set
    pub fn ipv4_netmask(prefix_length: u32) -> Result<Self> {
        match prefix_length {
            0 => Ok(Self(0)),
            1..=32 => Ok(Self(u32::MAX << (32 - prefix_length))),
            _ => Err(AttackGraphError::InvalidMask(prefix_length)),
        }
    }

    /// Prefix length of this value read as a netmask
    pub fn mask_prefix_length(self) -> u32 {
        self.0.leading_ones()
    }

    /// `(ip1 & mask1 & mask2) == (ip2 & mask2)`: the network ip1/mask1 lies
    /// inside the network ip2/mask2
    pub fn network_in_other_network(
        ip1: IpAddress,
        mask1: IpAddress,
        ip2: IpAddress,
        mask2: IpAddress,
    ) -> bool {
        (ip1.0 & mask1.0 & mask2.0) == (ip2.0 & mask2.0)
    }
}

impl FromStr for IpAddress {
    type Err = AttackGraphError;

    fn from_str(address: &str) -> Result<Self> {
        address
            .trim()
            .parse::<Ipv4Addr>()
            .map(|parsed| Self(u32::from(parsed)))
            .map_err(|_| AttackGraphError::InvalidIpAddress(address.to_string()))
    }
}

impl TryFrom<String> for IpAddress {
    type Error = AttackGraphError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<IpAddress> for String {
    fn from(value: IpAddress) -> Self {
        value.to_string()
    }
}

impl fmt::Display for IpAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", Ipv4Addr::from(self.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn masks_round_trip_through_prefix_lengths() {
        assert_eq!(IpAddress::ipv4_netmask(0).unwrap().to_string(), "0.0.0.0");
        assert_eq!(IpAddress::ipv4_netmask(24).unwrap().to_string(), "255.255.255.0");
        assert_eq!(IpAddress::ipv4_netmask(32).unwrap(), IpAddress::HOST_MASK);
        assert_eq!(IpAddress::new("255.255.240.0").unwrap().mask_prefix_length(), 20);
        assert!(IpAddress::ipv4_netmask(33).is_err());
    }

    #[test]
    fn invalid_addresses_are_rejected() {
        assert!(IpAddress::new("10.0.0.256").is_err());
        assert!(IpAddress::new("web-server").is_err());
        assert!(!IpAddress::is_an_ip_address("web-server"));
        assert!(IpAddress::is_an_ip_address("192.168.1.1"));
    }

    #[test]
    fn network_membership() {
        let host = IpAddress::new("10.0.1.42").unwrap();
        let network = IpAddress::new("10.0.1.0").unwrap();
        let slash24 = IpAddress::ipv4_netmask(24).unwrap();
        let slash16 = IpAddress::ipv4_netmask(16).unwrap();

        assert!(IpAddress::network_in_other_network(host, IpAddress::HOST_MASK, network, slash24));
        assert!(!IpAddress::network_in_other_network(
            IpAddress::new("10.0.2.1").unwrap(),
            IpAddress::HOST_MASK,
            network,
            slash24
        ));
        // a /16 is not inside a /24
        assert!(!IpAddress::network_in_other_network(
            IpAddress::new("10.0.0.0").unwrap(),
            slash16,
            network,
            slash24
        ));
    }
}
