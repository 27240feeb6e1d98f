// Hosts and their network interfaces

use std::fmt;

use indexmap::IndexMap;

use crate::information_system::inventory::{SecurityRequirement, Service};
use crate::topology::firewall::FirewallRulesTable;
use crate::topology::ip_address::IpAddress;
use crate::topology::routing::RoutingTable;
use crate::topology::vlan::{Network, VlanId};

/// Handle of a host in the topology arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
pub struct HostId(pub(crate) usize);

impl fmt::Display for HostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "host#{}", self.0)
    }
}

/// A network interface of a host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interface {
    pub name: String,
    pub address: IpAddress,
    /// Owning host
    pub host: HostId,
    pub vlan: VlanId,
    pub network: Option<Network>,
    pub connected_to_the_internet: bool,
}

impl Interface {
    pub fn new(name: &str, address: IpAddress, host: HostId, vlan: VlanId) -> Self {
        Self {
            name: name.to_string(),
            address,
            host,
            vlan,
            network: None,
            connected_to_the_internet: false,
        }
    }

    /// Combine two views of the same physical interface.
    ///
    /// `vlan_is_named` tells whether a VLAN handle points at a VLAN with a
    /// non-empty name; the topology owns the VLANs so it answers for us.
    pub fn merge(first: &Interface, second: &Interface, vlan_is_named: impl Fn(VlanId) -> bool) -> Interface {
        let real_name = |name: &str| !name.is_empty() && !name.starts_with("int");
        let name = if real_name(&second.name) {
            second.name.clone()
        } else if real_name(&first.name) {
            first.name.clone()
        } else if !second.name.is_empty() {
            second.name.clone()
        } else {
            first.name.clone()
        };

        let vlan = if vlan_is_named(first.vlan) { first.vlan } else { second.vlan };

        Interface {
            name,
            address: first.address,
            host: first.host,
            vlan,
            network: second.network.or(first.network),
            connected_to_the_internet: first.connected_to_the_internet || second.connected_to_the_internet,
        }
    }
}

impl fmt::Display for Interface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} : {}", self.name, self.address)?;
        if self.connected_to_the_internet {
            write!(f, " (internet)")?;
        }
        Ok(())
    }
}

/// A machine of the topology, with its filtering, routing and inventory
#[derive(Debug, Clone)]
pub struct Host {
    pub id: HostId,
    /// May be empty or an IP address for discovered machines
    pub name: String,
    pub interfaces: IndexMap<String, Interface>,
    pub input_firewall: FirewallRulesTable,
    pub output_firewall: FirewallRulesTable,
    pub routing_table: RoutingTable,
    /// Network services running on the host, by service name
    pub services: IndexMap<String, Service>,
    pub security_requirements: Vec<SecurityRequirement>,
}

impl Host {
    pub fn new(id: HostId, name: &str) -> Self {
        Self {
            id,
            name: name.to_string(),
            interfaces: IndexMap::new(),
            input_firewall: FirewallRulesTable::new_input(),
            output_firewall: FirewallRulesTable::new_output(),
            routing_table: RoutingTable::default(),
            services: IndexMap::new(),
            security_requirements: Vec::new(),
        }
    }

    pub fn has_ip(&self, address: IpAddress) -> bool {
        self.interfaces.values().any(|interface| interface.address == address)
    }

    pub fn ip_addresses(&self) -> Vec<IpAddress> {
        self.interfaces.values().map(|interface| interface.address).collect()
    }

    pub fn first_ip_address(&self) -> Option<IpAddress> {
        self.interfaces.values().next().map(|interface| interface.address)
    }

    pub fn interface_by_ip(&self, address: IpAddress) -> Option<&Interface> {
        self.interfaces.values().find(|interface| interface.address == address)
    }

    pub fn connected_to_the_internet(&self) -> bool {
        self.interfaces.values().any(|interface| interface.connected_to_the_internet)
    }

    /// Whether one of the addresses of the host is inside `network`
    pub fn in_network(&self, network: &Network) -> bool {
        self.interfaces.values().any(|interface| network.contains_address(interface.address))
    }

    /// Sum of the security requirement metrics of the host
    pub fn metric(&self) -> f64 {
        self.security_requirements.iter().map(|requirement| requirement.metric).sum()
    }

    /// Service listening on `port`, if any
    pub fn service_on_port(&self, port: u16) -> Option<&Service> {
        self.services.values().find(|service| service.port == port)
    }
}

impl fmt::Display for Host {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ip(address: &str) -> IpAddress {
        IpAddress::new(address).unwrap()
    }

    #[test]
    fn merged_interface_keeps_the_real_name() {
        let discovered = Interface::new("int1", ip("10.0.0.5"), HostId(0), VlanId(3));
        let mut declared = Interface::new("eth0", ip("10.0.0.5"), HostId(1), VlanId(1));
        declared.network = Some("10.0.0.0/24".parse().unwrap());
        let mut internet = discovered.clone();
        internet.connected_to_the_internet = true;

        let merged = Interface::merge(&internet, &declared, |vlan| vlan == VlanId(1));
        assert_eq!(merged.name, "eth0");
        assert_eq!(merged.vlan, VlanId(1));
        assert_eq!(merged.network, declared.network);
        assert!(merged.connected_to_the_internet);

        let merged = Interface::merge(&declared, &discovered, |vlan| vlan == VlanId(1));
        assert_eq!(merged.name, "eth0");
        assert_eq!(merged.vlan, VlanId(1));
    }

    #[test]
    fn host_address_queries() {
        let mut host = Host::new(HostId(0), "web");
        assert_eq!(host.first_ip_address(), None);
        host.interfaces.insert("eth0".into(), Interface::new("eth0", ip("10.0.0.5"), HostId(0), VlanId(0)));
        host.interfaces.insert("eth1".into(), Interface::new("eth1", ip("192.168.1.5"), HostId(0), VlanId(1)));
        assert_eq!(host.first_ip_address(), Some(ip("10.0.0.5")));
        assert!(host.has_ip(ip("192.168.1.5")));
        assert!(host.in_network(&"192.168.0.0/16".parse().unwrap()));
        assert!(!host.connected_to_the_internet());
    }
}
