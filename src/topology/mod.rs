//! Network topology model and packet forwarding simulation
//!
//! The topology owns every host in an arena keyed by `HostId` and every VLAN in
//! an arena indexed by `VlanId`. Interfaces refer to their host and VLAN through
//! these handles, so VLAN membership and "directly accessible" neighbours are
//! computed by scanning rather than stored.

pub mod description;
pub mod firewall;
pub mod host;
pub mod ip_address;
pub mod port_range;
pub mod routing;
pub mod vlan;

use std::collections::BTreeMap;
use std::fmt;

use log::{debug, warn};
use rand::Rng;

use crate::error::{AttackGraphError, Result};

pub use firewall::{Action, FirewallRule, FirewallRulesTable, Packet, Protocol, Table};
pub use host::{Host, HostId, Interface};
pub use ip_address::IpAddress;
pub use port_range::PortRange;
pub use routing::{Route, RoutingTable};
pub use vlan::{Network, Vlan, VlanId};

/// Hop limit used when none is configured
pub const DEFAULT_MAX_HOPS: usize = 64;

/// Source port used for simulated client connections
pub const CLIENT_SOURCE_PORT: u16 = 1025;

// ============================================================================
// TOPOLOGY
// ============================================================================

#[derive(Debug)]
pub struct Topology {
    hosts: BTreeMap<HostId, Host>,
    next_host_id: usize,
    /// Every VLAN ever created, registered or not
    vlans: Vec<Vlan>,
    /// Label -> VLAN for the VLANs declared in the topology
    registered_vlans: BTreeMap<String, VlanId>,
    max_hops: usize,
}

impl Default for Topology {
    fn default() -> Self {
        Self::new()
    }
}

impl Topology {
    pub fn new() -> Self {
        Self {
            hosts: BTreeMap::new(),
            next_host_id: 0,
            vlans: Vec::new(),
            registered_vlans: BTreeMap::new(),
            max_hops: DEFAULT_MAX_HOPS,
        }
    }

    pub fn with_max_hops(mut self, max_hops: usize) -> Self {
        self.max_hops = max_hops;
        self
    }

    pub fn max_hops(&self) -> usize {
        self.max_hops
    }

    // ------------------------------------------------------------------------
    // Hosts
    // ------------------------------------------------------------------------

    pub fn add_host(&mut self, name: &str) -> HostId {
        let id = HostId(self.next_host_id);
        self.next_host_id += 1;
        self.hosts.insert(id, Host::new(id, name));
        id
    }

    pub fn host(&self, id: HostId) -> Option<&Host> {
        self.hosts.get(&id)
    }

    pub fn host_mut(&mut self, id: HostId) -> Option<&mut Host> {
        self.hosts.get_mut(&id)
    }

    fn existing_host(&self, id: HostId) -> Result<&Host> {
        self.hosts.get(&id).ok_or_else(|| AttackGraphError::UnknownHost(id.to_string()))
    }

    fn existing_host_mut(&mut self, id: HostId) -> Result<&mut Host> {
        self.hosts.get_mut(&id).ok_or_else(|| AttackGraphError::UnknownHost(id.to_string()))
    }

    /// Hosts in insertion order
    pub fn hosts(&self) -> impl Iterator<Item = &Host> {
        self.hosts.values()
    }

    pub fn host_ids(&self) -> Vec<HostId> {
        self.hosts.keys().copied().collect()
    }

    pub fn host_count(&self) -> usize {
        self.hosts.len()
    }

    pub fn host_name(&self, id: HostId) -> &str {
        self.hosts.get(&id).map(|host| host.name.as_str()).unwrap_or("")
    }

    pub fn remove_host(&mut self, id: HostId) -> Option<Host> {
        self.hosts.remove(&id)
    }

    pub fn existing_host_by_ip_address(&self, address: IpAddress) -> Option<HostId> {
        self.hosts.values().find(|host| host.has_ip(address)).map(|host| host.id)
    }

    pub fn existing_host_by_name(&self, name: &str) -> Option<HostId> {
        self.hosts.values().find(|host| host.name == name).map(|host| host.id)
    }

    /// Host owning `address`, created with a single `int1` interface if missing
    pub fn get_host_by_ip_address(&mut self, address: IpAddress) -> Result<HostId> {
        if let Some(existing) = self.existing_host_by_ip_address(address) {
            return Ok(existing);
        }
        let id = self.add_host(&address.to_string());
        self.add_interface(id, "int1", address, None)?;
        debug!("Host {} created for unknown address", address);
        Ok(id)
    }

    pub fn get_interface_by_ip_address(&self, address: IpAddress) -> Option<&Interface> {
        self.hosts.values().find_map(|host| host.interface_by_ip(address))
    }

    pub fn get_hosts_in_network(&self, network: &Network) -> Vec<HostId> {
        self.hosts.values().filter(|host| host.in_network(network)).map(|host| host.id).collect()
    }

    // ------------------------------------------------------------------------
    // VLANs and interfaces
    // ------------------------------------------------------------------------

    pub fn vlan(&self, id: VlanId) -> Option<&Vlan> {
        self.vlans.get(id.0)
    }

    pub fn vlan_mut(&mut self, id: VlanId) -> Option<&mut Vlan> {
        self.vlans.get_mut(id.0)
    }

    /// Registered VLANs, ordered by label
    pub fn vlans(&self) -> Vec<(VlanId, &Vlan)> {
        self.registered_vlans
            .values()
            .filter_map(|id| self.vlans.get(id.0).map(|vlan| (*id, vlan)))
            .collect()
    }

    pub fn registered_vlan(&self, label: &str) -> Option<VlanId> {
        self.registered_vlans.get(label).copied()
    }

    /// Register a VLAN, replacing a previous one with the same label
    pub fn add_vlan(&mut self, label: &str, name: &str) -> VlanId {
        let id = VlanId(self.vlans.len());
        self.vlans.push(Vlan::new(label, name));
        self.registered_vlans.insert(label.to_string(), id);
        id
    }

    pub fn get_new_or_existing_vlan(&mut self, label: &str) -> VlanId {
        match self.registered_vlans.get(label) {
            Some(existing) => *existing,
            None => self.add_vlan(label, label),
        }
    }

    /// VLAN private to a single link, not registered in the topology
    fn new_implicit_vlan(&mut self) -> VlanId {
        let label = rand::thread_rng().gen_range(0..10000).to_string();
        let id = VlanId(self.vlans.len());
        self.vlans.push(Vlan::new(&label, ""));
        id
    }

    /// Add an interface to a host, or return the existing one with that name.
    /// Without a VLAN the interface gets a fresh unregistered one.
    pub fn add_interface(
        &mut self,
        host: HostId,
        name: &str,
        address: IpAddress,
        vlan: Option<VlanId>,
    ) -> Result<&Interface> {
        let already_present = self.existing_host(host)?.interfaces.contains_key(name);
        if !already_present {
            let vlan = match vlan {
                Some(vlan) => vlan,
                None => self.new_implicit_vlan(),
            };
            self.existing_host_mut(host)?
                .interfaces
                .insert(name.to_string(), Interface::new(name, address, host, vlan));
        }
        self.existing_host(host)?
            .interfaces
            .get(name)
            .ok_or_else(|| AttackGraphError::InterfaceNotOnHost {
                host: self.host_name(host).to_string(),
                interface: name.to_string(),
            })
    }

    fn check_interface(&self, host: HostId, interface: &str) -> Result<()> {
        if self.existing_host(host)?.interfaces.contains_key(interface) {
            Ok(())
        } else {
            Err(AttackGraphError::InterfaceNotOnHost {
                host: self.host_name(host).to_string(),
                interface: interface.to_string(),
            })
        }
    }

    pub fn add_route(&mut self, host: HostId, route: Route) -> Result<()> {
        self.check_interface(host, &route.interface)?;
        self.existing_host_mut(host)?.routing_table.add_route(route);
        Ok(())
    }

    pub fn add_default_gateway(&mut self, host: HostId, gateway: IpAddress, interface: &str) -> Result<()> {
        self.add_route(host, Route::new(IpAddress::ANY, IpAddress::ANY, gateway, interface))
    }

    /// Hosts having an interface in `vlan`, in host order
    pub fn hosts_in_vlan(&self, vlan: VlanId) -> Vec<HostId> {
        self.hosts
            .values()
            .filter(|host| host.interfaces.values().any(|interface| interface.vlan == vlan))
            .map(|host| host.id)
            .collect()
    }

    /// Other hosts sharing a VLAN with `host`, following the interface order
    pub fn directly_accessible_hosts(&self, host: HostId) -> Vec<HostId> {
        let mut result = Vec::new();
        if let Some(current) = self.hosts.get(&host) {
            for interface in current.interfaces.values() {
                for neighbour in self.hosts_in_vlan(interface.vlan) {
                    if neighbour != host && !result.contains(&neighbour) {
                        result.push(neighbour);
                    }
                }
            }
        }
        result
    }

    /// Host sharing a VLAN with `host` that owns `address`
    pub fn host_in_vlan(&self, host: HostId, address: IpAddress) -> Option<HostId> {
        self.directly_accessible_hosts(host)
            .into_iter()
            .find(|neighbour| self.hosts.get(neighbour).map(|h| h.has_ip(address)).unwrap_or(false))
    }

    fn next_hop(&self, host: &Host, address: IpAddress) -> Result<IpAddress> {
        host.routing_table
            .next_hop(address)
            .ok_or_else(|| AttackGraphError::MissingDefaultGateway(host.name.clone()))
    }

    // ------------------------------------------------------------------------
    // Routing
    // ------------------------------------------------------------------------

    /// Follow a packet to `address` hop by hop, appending every host crossed
    pub fn route_a_packet_to(
        &self,
        host: HostId,
        address: IpAddress,
        ttl: usize,
        used_hosts: &mut Vec<HostId>,
    ) -> Result<()> {
        let current = self.existing_host(host)?;
        used_hosts.push(host);
        if ttl == 0 {
            return Err(AttackGraphError::Routing(format!(
                "Routing problem, TTL is null : packet to {} deleted on host {}",
                address, current.name
            )));
        }
        if current.has_ip(address) {
            return Ok(());
        }

        if let Some(neighbour) = self.host_in_vlan(host, address) {
            debug!("{} -> {} : destination in the same VLAN", current.name, self.host_name(neighbour));
            return self.route_a_packet_to(neighbour, address, ttl - 1, used_hosts);
        }

        let gateway = self.next_hop(current, address)?;
        match self.host_in_vlan(host, gateway) {
            Some(next_host) => {
                debug!("{} -> {} : via gateway {}", current.name, self.host_name(next_host), gateway);
                self.route_a_packet_to(next_host, address, ttl - 1, used_hosts)
            }
            None => Err(AttackGraphError::Routing(
                "Routing problem, there is no route corresponding to the packet or the destination host is on the internet"
                    .to_string(),
            )),
        }
    }

    /// Hosts crossed by a packet from `from` to the first address of `to`
    pub fn route_between_hosts(&self, from: HostId, to: HostId) -> Result<Vec<HostId>> {
        let destination = self.existing_host(to)?.first_ip_address().ok_or(AttackGraphError::NoInterface)?;
        let mut used_hosts = Vec::new();
        self.route_a_packet_to(from, destination, self.max_hops, &mut used_hosts)?;
        Ok(used_hosts)
    }

    /// Hosts from `host` up to the first internet-connected host through the
    /// default gateways; empty when the internet can not be reached
    pub fn get_route_to_internet(&self, host: HostId) -> Vec<HostId> {
        let mut route = Vec::new();
        let mut current = host;
        for _hop in 0..self.max_hops {
            let Some(current_host) = self.hosts.get(&current) else {
                return Vec::new();
            };
            route.push(current);
            if current_host.connected_to_the_internet() {
                return route;
            }
            let Some(gateway) = current_host.routing_table.next_hop(IpAddress::ANY) else {
                return Vec::new();
            };
            match self.existing_host_by_ip_address(gateway) {
                Some(next_host) => current = next_host,
                None => return Vec::new(),
            }
        }
        Vec::new()
    }

    /// Routes from every internet-connected host to `host`. A route ending with
    /// another route is dropped, the shorter one is kept.
    pub fn get_routes_from_internet(&self, host: HostId) -> Result<Vec<Vec<HostId>>> {
        let destination = self.existing_host(host)?.first_ip_address().ok_or(AttackGraphError::NoInterface)?;
        let mut routes: Vec<Vec<HostId>> = Vec::new();
        for gateway in self.hosts.values().filter(|candidate| candidate.connected_to_the_internet()) {
            let mut route = Vec::new();
            self.route_a_packet_to(gateway.id, destination, self.max_hops, &mut route)?;
            routes.push(route);
        }

        let mut kept: Vec<Vec<HostId>> = Vec::new();
        for route in routes {
            if kept.iter().any(|existing| route.ends_with(existing)) {
                continue;
            }
            kept.retain(|existing| !existing.ends_with(&route));
            kept.push(route);
        }
        Ok(kept)
    }

    // ------------------------------------------------------------------------
    // Packet filtering
    // ------------------------------------------------------------------------

    /// Whether a packet crosses every firewall of `route`.
    ///
    /// The first host only filters its output when it is the real sender and the
    /// last host only filters its input when it is the real receiver.
    pub fn send_a_packet_on_a_route(&self, route: &[HostId], packet: &Packet) -> bool {
        let mut hosts: Vec<&Host> = Vec::with_capacity(route.len());
        for id in route {
            match self.hosts.get(id) {
                Some(host) => hosts.push(host),
                None => {
                    warn!("Host {:?} of the route is not in the topology ({})", id, packet);
                    return false;
                }
            }
        }
        if hosts.len() <= 1 {
            return hosts.len() == 1;
        }

        let blocked = |host: &Host, direction: &str| {
            debug!("Don't pass {}\"{}\" ({})", direction, host.name, packet);
            false
        };

        let first = hosts[0];
        if self.existing_host_by_ip_address(packet.source) == Some(first.id) {
            if !first.output_firewall.packet_can_pass(packet) {
                return blocked(first, "host output of ");
            }
        } else if !first.input_firewall.packet_can_pass(packet) || !first.output_firewall.packet_can_pass(packet) {
            return blocked(first, "host ");
        }

        for host in &hosts[1..hosts.len() - 1] {
            if !host.input_firewall.packet_can_pass(packet) || !host.output_firewall.packet_can_pass(packet) {
                return blocked(host, "host ");
            }
        }

        let last = hosts[hosts.len() - 1];
        if self.existing_host_by_ip_address(packet.destination) == Some(last.id) {
            if !last.input_firewall.packet_can_pass(packet) {
                return blocked(last, "input of host ");
            }
        } else if !last.input_firewall.packet_can_pass(packet) || !last.output_firewall.packet_can_pass(packet) {
            return blocked(last, "host ");
        }

        true
    }

    pub fn send_a_packet_from_a_host_to_another_succeed(
        &self,
        source: IpAddress,
        source_port: u16,
        destination: IpAddress,
        destination_port: u16,
        protocol: Protocol,
    ) -> Result<bool> {
        let from = self
            .existing_host_by_ip_address(source)
            .ok_or_else(|| AttackGraphError::UnknownHost(source.to_string()))?;
        let to = self
            .existing_host_by_ip_address(destination)
            .ok_or_else(|| AttackGraphError::UnknownHost(destination.to_string()))?;
        let route = self.route_between_hosts(from, to)?;
        let packet = Packet::between_hosts(protocol, source, source_port, destination, destination_port);
        Ok(self.send_a_packet_on_a_route(&route, &packet))
    }

    pub fn send_a_packet_on_a_route_from_internet(
        &self,
        route: &[HostId],
        address: IpAddress,
        port: u16,
        protocol: Protocol,
    ) -> bool {
        let packet = Packet {
            protocol,
            source: IpAddress::ANY,
            source_mask: IpAddress::ANY,
            source_port: CLIENT_SOURCE_PORT,
            destination: address,
            destination_mask: IpAddress::HOST_MASK,
            destination_port: port,
        };
        self.send_a_packet_on_a_route(route, &packet)
    }

    /// Walk a packet from `from` and return the host whose filtering or routing
    /// stops it, `None` when it is delivered or leaves on the internet
    pub fn host_that_prevents_sending_a_packet(
        &self,
        from: HostId,
        packet: &Packet,
        ttl: usize,
    ) -> Result<Option<HostId>> {
        let current = self.existing_host(from)?;
        if ttl == 0 {
            return Ok(Some(from));
        }

        if current.has_ip(packet.destination) {
            let blocked = !current.input_firewall.packet_can_pass(packet) && !current.has_ip(packet.source);
            return Ok(if blocked { Some(from) } else { None });
        }

        if current.has_ip(packet.source) {
            if !current.output_firewall.packet_can_pass(packet) {
                return Ok(Some(from));
            }
        } else if !current.input_firewall.packet_can_pass(packet) || !current.output_firewall.packet_can_pass(packet) {
            return Ok(Some(from));
        }

        if let Some(neighbour) = self.host_in_vlan(from, packet.destination) {
            return self.host_that_prevents_sending_a_packet(neighbour, packet, ttl - 1);
        }

        let gateway = self.next_hop(current, packet.destination)?;
        match self.existing_host_by_ip_address(gateway) {
            Some(next_host) => self.host_that_prevents_sending_a_packet(next_host, packet, ttl - 1),
            None if current.connected_to_the_internet() => Ok(None),
            None => Ok(Some(from)),
        }
    }

    pub fn send_packet_succeed(&self, from: HostId, packet: &Packet) -> Result<bool> {
        Ok(self.host_that_prevents_sending_a_packet(from, packet, self.max_hops)?.is_none())
    }

    /// Whether `from` can reach `destination` from any of its addresses
    pub fn send_a_packet_to_succeed(
        &self,
        from: HostId,
        destination: IpAddress,
        destination_port: u16,
        protocol: Protocol,
    ) -> Result<bool> {
        for source in self.existing_host(from)?.ip_addresses() {
            let packet = Packet::between_hosts(protocol, source, CLIENT_SOURCE_PORT, destination, destination_port);
            if self.send_packet_succeed(from, &packet)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    // ------------------------------------------------------------------------
    // Merging
    // ------------------------------------------------------------------------

    /// Replace two views of the same machine by a single host.
    pub fn merge_two_hosts(&mut self, first: HostId, second: HostId) -> Result<HostId> {
        let h1 = self.existing_host(first)?.clone();
        let h2 = self.existing_host(second)?.clone();

        let meaningful = |name: &str| !name.is_empty() && !IpAddress::is_an_ip_address(name);
        let name = if meaningful(&h1.name) {
            h1.name.clone()
        } else if meaningful(&h2.name) {
            h2.name.clone()
        } else if !h1.name.is_empty() {
            h1.name.clone()
        } else {
            h2.name.clone()
        };

        let merged_id = self.add_host(&name);
        let vlan_is_named = |vlan: VlanId| self.vlans.get(vlan.0).map(|v| !v.name.is_empty()).unwrap_or(false);

        let mut merged = Host::new(merged_id, &name);
        merged.input_firewall =
            if h1.input_firewall.is_empty() { h2.input_firewall.clone() } else { h1.input_firewall.clone() };
        merged.output_firewall =
            if h1.output_firewall.is_empty() { h2.output_firewall.clone() } else { h1.output_firewall.clone() };
        merged.routing_table =
            if h1.routing_table.is_empty() { h2.routing_table.clone() } else { h1.routing_table.clone() };

        for interface in h2.interfaces.values() {
            let combined = match h1.interface_by_ip(interface.address) {
                Some(same_address) => Interface::merge(interface, same_address, vlan_is_named),
                None => interface.clone(),
            };
            merged.interfaces.insert(combined.name.clone(), Interface { host: merged_id, ..combined });
        }
        for interface in h1.interfaces.values() {
            if !merged.has_ip(interface.address) {
                merged.interfaces.insert(interface.name.clone(), Interface { host: merged_id, ..interface.clone() });
            }
        }

        merged.services = h1.services.clone();
        for (service_name, service) in &h2.services {
            merged.services.entry(service_name.clone()).or_insert_with(|| service.clone());
        }
        merged.security_requirements = h1.security_requirements.clone();
        merged.security_requirements.extend(h2.security_requirements.iter().cloned());

        self.hosts.remove(&first);
        self.hosts.remove(&second);
        self.hosts.insert(merged_id, merged);
        debug!("Hosts {} and {} merged into {}", h1.name, h2.name, name);
        Ok(merged_id)
    }
}

impl Clone for Topology {
    /// Copy every host and VLAN of the arena. Handles stay valid in the copy.
    fn clone(&self) -> Self {
        let mut copy = Topology {
            hosts: BTreeMap::new(),
            next_host_id: self.next_host_id,
            vlans: self.vlans.clone(),
            registered_vlans: self.registered_vlans.clone(),
            max_hops: self.max_hops,
        };
        for (id, host) in &self.hosts {
            if host.first_ip_address().is_none() {
                warn!("Problem when copying the topology: host without ip address ({})", host.name);
            }
            copy.hosts.insert(*id, host.clone());
        }
        copy
    }
}

impl fmt::Display for Topology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Topology :")?;
        for host in self.hosts.values() {
            writeln!(f, "    - {}", host)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ip(address: &str) -> IpAddress {
        IpAddress::new(address).unwrap()
    }

    /// A -- B -- C, each link its own VLAN, B routing between them
    fn three_hop_line() -> (Topology, [HostId; 3]) {
        let mut topology = Topology::new();
        let a = topology.add_host("A");
        let b = topology.add_host("B");
        let c = topology.add_host("C");
        let left = topology.add_vlan("10", "left");
        let right = topology.add_vlan("20", "right");
        topology.add_interface(a, "eth0", ip("10.0.0.2"), Some(left)).unwrap();
        topology.add_interface(b, "eth0", ip("10.0.0.1"), Some(left)).unwrap();
        topology.add_interface(b, "eth1", ip("10.0.1.1"), Some(right)).unwrap();
        topology.add_interface(c, "eth0", ip("10.0.1.2"), Some(right)).unwrap();
        topology.add_default_gateway(a, ip("10.0.0.1"), "eth0").unwrap();
        topology.add_default_gateway(c, ip("10.0.1.1"), "eth0").unwrap();
        (topology, [a, b, c])
    }

    fn ssh(from: &str, to: &str) -> Packet {
        Packet::between_hosts(Protocol::Tcp, ip(from), CLIENT_SOURCE_PORT, ip(to), 22)
    }

    #[test]
    fn packet_crosses_a_three_host_route() {
        let (topology, [a, _b, c]) = three_hop_line();
        let route = topology.route_between_hosts(a, c).unwrap();
        assert_eq!(route.len(), 3);
        assert!(topology.send_a_packet_on_a_route(&route, &ssh("10.0.0.2", "10.0.1.2")));
    }

    #[test]
    fn intermediate_output_rule_blocks_the_packet() {
        let (mut topology, [a, b, c]) = three_hop_line();
        topology.host_mut(b).unwrap().output_firewall.add_firewall_rule(
            Action::Drop,
            Protocol::Tcp,
            IpAddress::ANY,
            IpAddress::ANY,
            PortRange::any(),
            ip("10.0.1.2"),
            IpAddress::HOST_MASK,
            PortRange::single(22),
        );
        let route = topology.route_between_hosts(a, c).unwrap();
        assert!(!topology.send_a_packet_on_a_route(&route, &ssh("10.0.0.2", "10.0.1.2")));
        assert_eq!(
            topology.host_that_prevents_sending_a_packet(a, &ssh("10.0.0.2", "10.0.1.2"), 64).unwrap(),
            Some(b)
        );
        assert!(!topology.send_a_packet_to_succeed(a, ip("10.0.1.2"), 22, Protocol::Tcp).unwrap());
        assert!(topology.send_a_packet_to_succeed(a, ip("10.0.1.2"), 80, Protocol::Tcp).unwrap());

        // same route once the rule is gone
        topology.host_mut(b).unwrap().output_firewall.rules.clear();
        assert!(topology.send_a_packet_on_a_route(&route, &ssh("10.0.0.2", "10.0.1.2")));
    }

    #[test]
    fn degenerate_routes() {
        let (topology, [a, _b, _c]) = three_hop_line();
        let packet = ssh("10.0.0.2", "10.0.1.2");
        assert!(topology.send_a_packet_on_a_route(&[a], &packet));
        assert!(!topology.send_a_packet_on_a_route(&[], &packet));
    }

    #[test]
    fn route_through_an_unknown_host_fails() {
        let (topology, [a, _b, c]) = three_hop_line();
        let packet = ssh("10.0.0.2", "10.0.1.2");
        assert!(!topology.send_a_packet_on_a_route(&[a, HostId(999), c], &packet));
        assert!(!topology.send_a_packet_on_a_route(&[HostId(999), c], &packet));
    }

    #[test]
    fn sender_output_is_checked_but_not_its_input() {
        let (mut topology, [a, _b, c]) = three_hop_line();
        let host_a = topology.host_mut(a).unwrap();
        host_a.input_firewall.default_action = Action::Drop;
        let route = topology.route_between_hosts(a, c).unwrap();
        assert!(topology.send_a_packet_on_a_route(&route, &ssh("10.0.0.2", "10.0.1.2")));

        topology.host_mut(a).unwrap().output_firewall.default_action = Action::Drop;
        assert!(!topology.send_a_packet_on_a_route(&route, &ssh("10.0.0.2", "10.0.1.2")));
    }

    #[test]
    fn ttl_exhaustion_is_a_routing_error() {
        let (topology, [a, _b, _c]) = three_hop_line();
        let mut used = Vec::new();
        let error = topology.route_a_packet_to(a, ip("10.0.1.2"), 1, &mut used).unwrap_err();
        assert!(error.to_string().starts_with("Routing problem, TTL is null"));
        assert_eq!(used.len(), 2);
    }

    #[test]
    fn missing_gateway_and_missing_interface() {
        let mut topology = Topology::new();
        let lonely = topology.add_host("lonely");
        let empty = topology.add_host("empty");
        topology.add_interface(lonely, "eth0", ip("192.168.0.2"), None).unwrap();
        let other = topology.add_host("other");
        topology.add_interface(other, "eth0", ip("172.16.0.2"), None).unwrap();

        assert!(matches!(
            topology.route_between_hosts(lonely, empty),
            Err(AttackGraphError::NoInterface)
        ));
        assert!(matches!(
            topology.route_between_hosts(lonely, other),
            Err(AttackGraphError::MissingDefaultGateway(name)) if name == "lonely"
        ));
        assert!(topology.add_default_gateway(lonely, ip("192.168.0.1"), "eth7").is_err());
    }

    #[test]
    fn merge_keeps_the_real_name_and_the_rules() {
        let mut topology = Topology::new();
        let discovered = topology.add_host("10.0.0.1");
        topology.add_interface(discovered, "int1", ip("10.0.0.1"), None).unwrap();
        topology.host_mut(discovered).unwrap().output_firewall.add_firewall_rule(
            Action::Drop,
            Protocol::Any,
            IpAddress::ANY,
            IpAddress::ANY,
            PortRange::any(),
            IpAddress::ANY,
            IpAddress::ANY,
            PortRange::single(23),
        );
        let declared = topology.add_host("web-server");
        let dmz = topology.add_vlan("30", "dmz");
        topology.add_interface(declared, "eth0", ip("10.0.0.1"), Some(dmz)).unwrap();
        topology.add_interface(declared, "eth1", ip("10.0.5.1"), None).unwrap();

        let merged = topology.merge_two_hosts(discovered, declared).unwrap();
        let host = topology.host(merged).unwrap();
        assert_eq!(host.name, "web-server");
        assert_eq!(host.output_firewall.rules.len(), 1);
        assert_eq!(host.interfaces.len(), 2);
        assert_eq!(host.interfaces["eth0"].vlan, dmz);
        assert!(host.interfaces.values().all(|interface| interface.host == merged));
        assert_eq!(topology.host_count(), 1);
        assert_eq!(topology.existing_host_by_ip_address(ip("10.0.5.1")), Some(merged));
    }

    #[test]
    fn lookups_create_hosts_on_demand() {
        let mut topology = Topology::new();
        let created = topology.get_host_by_ip_address(ip("8.8.8.8")).unwrap();
        assert_eq!(topology.get_host_by_ip_address(ip("8.8.8.8")).unwrap(), created);
        assert_eq!(topology.host_name(created), "8.8.8.8");
        assert_eq!(topology.get_interface_by_ip_address(ip("8.8.8.8")).unwrap().name, "int1");
        assert!(topology.vlans().is_empty());
        assert_eq!(topology.get_hosts_in_network(&"8.8.0.0/16".parse().unwrap()), vec![created]);
    }

    #[test]
    fn clone_is_independent() {
        let (topology, [a, _b, _c]) = three_hop_line();
        let mut copy = topology.clone();
        copy.host_mut(a).unwrap().name = "renamed".to_string();
        assert_eq!(topology.host_name(a), "A");
        assert_eq!(copy.host(a).unwrap().first_ip_address(), topology.host(a).unwrap().first_ip_address());
    }
}
