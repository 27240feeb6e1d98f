//! JSON description of a topology
//!
//! The description is a plain serde document. `Topology::from_description`
//! replays it through the arena API so that every handle is created the same
//! way as for a topology built in code.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::information_system::inventory::{SecurityRequirement, Service};
use crate::topology::firewall::{Action, FirewallRule, FirewallRulesTable, Protocol, Table};
use crate::topology::ip_address::IpAddress;
use crate::topology::port_range::PortRange;
use crate::topology::routing::Route;
use crate::topology::vlan::Network;
use crate::topology::Topology;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TopologyDescription {
    #[serde(default)]
    pub vlans: Vec<VlanDescription>,
    #[serde(default)]
    pub hosts: Vec<HostDescription>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VlanDescription {
    pub label: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub network: Option<Network>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostDescription {
    pub name: String,
    #[serde(default)]
    pub interfaces: Vec<InterfaceDescription>,
    #[serde(default)]
    pub routes: Vec<Route>,
    #[serde(default)]
    pub input_firewall: Option<FirewallTableDescription>,
    #[serde(default)]
    pub output_firewall: Option<FirewallTableDescription>,
    #[serde(default)]
    pub services: Vec<Service>,
    #[serde(default)]
    pub security_requirements: Vec<SecurityRequirement>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterfaceDescription {
    pub name: String,
    pub ip: IpAddress,
    /// Label of the VLAN; a label not declared in `vlans` is registered on the fly
    #[serde(default)]
    pub vlan: Option<String>,
    #[serde(default)]
    pub network: Option<Network>,
    #[serde(default)]
    pub connected_to_the_internet: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FirewallTableDescription {
    #[serde(default = "accept")]
    pub default_action: Action,
    #[serde(default)]
    pub rules: Vec<FirewallRuleDescription>,
}

fn accept() -> Action {
    Action::Accept
}

/// A rule where every omitted field matches everything
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FirewallRuleDescription {
    pub action: Action,
    #[serde(default = "any_protocol")]
    pub protocol: Protocol,
    #[serde(default = "any_network")]
    pub source: Network,
    #[serde(default = "PortRange::any")]
    pub source_port: PortRange,
    #[serde(default = "any_network")]
    pub destination: Network,
    #[serde(default = "PortRange::any")]
    pub destination_port: PortRange,
}

fn any_protocol() -> Protocol {
    Protocol::Any
}

fn any_network() -> Network {
    Network::internet()
}

impl FirewallTableDescription {
    fn apply_to(&self, table: &mut FirewallRulesTable) {
        table.default_action = self.default_action;
        for rule in &self.rules {
            table.push_rule(FirewallRule::new(
                rule.action,
                rule.protocol,
                rule.source.address,
                rule.source.mask,
                rule.source_port,
                rule.destination.address,
                rule.destination.mask,
                rule.destination_port,
                Table::Input,
            ));
        }
    }
}

impl TopologyDescription {
    pub fn from_json_str(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }
}

impl Topology {
    pub fn from_description(description: &TopologyDescription) -> Result<Topology> {
        let mut topology = Topology::new();
        for vlan in &description.vlans {
            let name = vlan.name.clone().unwrap_or_else(|| vlan.label.clone());
            let id = topology.add_vlan(&vlan.label, &name);
            if let Some(registered) = topology.vlan_mut(id) {
                registered.network = vlan.network;
            }
        }

        for host_description in &description.hosts {
            let host = topology.add_host(&host_description.name);
            for interface in &host_description.interfaces {
                let vlan = interface.vlan.as_deref().map(|label| topology.get_new_or_existing_vlan(label));
                topology.add_interface(host, &interface.name, interface.ip, vlan)?;
                if let Some(added) = topology
                    .host_mut(host)
                    .and_then(|current| current.interfaces.get_mut(&interface.name))
                {
                    added.network = interface.network;
                    added.connected_to_the_internet = interface.connected_to_the_internet;
                }
            }
            for route in &host_description.routes {
                topology.add_route(host, route.clone())?;
            }
            if let Some(current) = topology.host_mut(host) {
                if let Some(table) = &host_description.input_firewall {
                    table.apply_to(&mut current.input_firewall);
                }
                if let Some(table) = &host_description.output_firewall {
                    table.apply_to(&mut current.output_firewall);
                }
                for service in &host_description.services {
                    current.services.insert(service.name.clone(), service.clone());
                }
                current.security_requirements = host_description.security_requirements.clone();
            }
        }

        log::info!(
            "Topology loaded: {} hosts, {} VLANs",
            topology.host_count(),
            topology.vlans().len()
        );
        Ok(topology)
    }

    pub fn from_json_str(content: &str) -> Result<Topology> {
        Topology::from_description(&TopologyDescription::from_json_str(content)?)
    }

    pub fn load_json(path: &Path) -> Result<Topology> {
        Topology::from_json_str(&std::fs::read_to_string(path)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SMALL_NETWORK: &str = r#"{
        "vlans": [ { "label": "100", "name": "lan", "network": "10.0.0.0/24" } ],
        "hosts": [
            {
                "name": "gateway",
                "interfaces": [
                    { "name": "eth0", "ip": "10.0.0.1", "vlan": "100" },
                    { "name": "eth1", "ip": "157.159.103.10", "connected_to_the_internet": true }
                ],
                "input_firewall": {
                    "default_action": "ACCEPT",
                    "rules": [ { "action": "DROP", "protocol": "TCP", "destination": "10.0.0.0/24", "destination_port": "22" } ]
                }
            },
            {
                "name": "web",
                "interfaces": [ { "name": "eth0", "ip": "10.0.0.2", "vlan": "100" } ],
                "routes": [ { "destination": "0.0.0.0", "mask": "0.0.0.0", "gateway": "10.0.0.1", "interface": "eth0" } ],
                "services": [
                    {
                        "name": "http_server", "ip_address": "10.0.0.2", "port": 80,
                        "vulnerabilities": { "CVE-2014-6271": { "cve": "CVE-2014-6271", "cvss": 10.0 } }
                    }
                ],
                "security_requirements": [ { "name": "availability", "metric": 70.0 } ]
            }
        ]
    }"#;

    #[test]
    fn loads_hosts_vlans_and_tables() {
        let topology = Topology::from_json_str(SMALL_NETWORK).unwrap();
        assert_eq!(topology.host_count(), 2);
        assert_eq!(topology.vlans().len(), 1);

        let gateway = topology.existing_host_by_name("gateway").unwrap();
        let web = topology.existing_host_by_name("web").unwrap();
        let gateway_host = topology.host(gateway).unwrap();
        assert!(gateway_host.connected_to_the_internet());
        assert_eq!(gateway_host.input_firewall.rules.len(), 1);
        assert_eq!(gateway_host.input_firewall.rules[0].destination_port_range, PortRange::single(22));

        let web_host = topology.host(web).unwrap();
        assert_eq!(web_host.metric(), 70.0);
        assert_eq!(web_host.services["http_server"].vulnerabilities.len(), 1);
        assert_eq!(topology.get_route_to_internet(web), vec![web, gateway]);
    }

    #[test]
    fn unknown_interface_in_route_is_rejected() {
        let broken = r#"{ "hosts": [ { "name": "h", "routes": [
            { "destination": "0.0.0.0", "mask": "0.0.0.0", "gateway": "10.0.0.1", "interface": "eth9" } ] } ] }"#;
        assert!(Topology::from_json_str(broken).is_err());
    }
}
