//! Firewall rules and ordered rule tables
//!
//! A table is evaluated first-match: the first rule covering a packet decides,
//! LOG rules are skipped, and the default action applies when nothing matches.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{AttackGraphError, Result};
use crate::topology::ip_address::IpAddress;
use crate::topology::port_range::PortRange;

/// What a rule does with the packets it matches
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Action {
    Accept,
    Drop,
    Log,
}

impl Action {
    /// "drop" and "log" are recognised, anything else accepts
    pub fn from_name(action: &str) -> Self {
        match action.to_lowercase().as_str() {
            "drop" => Action::Drop,
            "log" => Action::Log,
            _ => Action::Accept,
        }
    }
}

impl From<String> for Action {
    fn from(value: String) -> Self {
        Action::from_name(&value)
    }
}

impl From<Action> for String {
    fn from(value: Action) -> Self {
        value.to_string()
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Accept => write!(f, "ACCEPT"),
            Action::Drop => write!(f, "DROP"),
            Action::Log => write!(f, "LOG"),
        }
    }
}

/// Transport protocol of a packet or a rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Protocol {
    Tcp,
    Udp,
    Any,
    Icmp,
}

impl Protocol {
    pub fn from_name(protocol: &str) -> Self {
        match protocol.to_lowercase().as_str() {
            "tcp" | "httpprotocol" => Protocol::Tcp,
            "udp" => Protocol::Udp,
            "icmp" => Protocol::Icmp,
            _ => Protocol::Any,
        }
    }

    /// ANY contains every protocol, others only themselves
    pub fn contained(self, protocol: Protocol) -> bool {
        self == Protocol::Any || self == protocol
    }
}

impl From<String> for Protocol {
    fn from(value: String) -> Self {
        Protocol::from_name(&value)
    }
}

impl From<Protocol> for String {
    fn from(value: Protocol) -> Self {
        value.to_string()
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Tcp => write!(f, "TCP"),
            Protocol::Udp => write!(f, "UDP"),
            Protocol::Any => write!(f, "ANY"),
            Protocol::Icmp => write!(f, "ICMP"),
        }
    }
}

/// Netfilter chain a rule belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Table {
    Input,
    Output,
    Forward,
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Table::Input => write!(f, "INPUT"),
            Table::Output => write!(f, "OUTPUT"),
            Table::Forward => write!(f, "FORWARD"),
        }
    }
}

/// A single filtering rule
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FirewallRule {
    pub action: Action,
    pub protocol: Protocol,
    pub source: IpAddress,
    pub source_mask: IpAddress,
    pub source_port_range: PortRange,
    pub destination: IpAddress,
    pub destination_mask: IpAddress,
    pub destination_port_range: PortRange,
    pub table: Table,
}

fn parse_iptables_address(address: &str) -> Result<(IpAddress, IpAddress)> {
    match address.split_once('/') {
        Some((ip, prefix)) => {
            let prefix_length = prefix
                .trim()
                .parse::<u32>()
                .map_err(|_| AttackGraphError::InvalidIpAddress(address.to_string()))?;
            Ok((IpAddress::new(ip)?, IpAddress::ipv4_netmask(prefix_length)?))
        }
        None => Ok((IpAddress::new(address)?, IpAddress::HOST_MASK)),
    }
}

fn parse_iptables_ports(value: &str) -> Result<PortRange> {
    let invalid = || AttackGraphError::InvalidPortRange(value.to_string());
    match value.split_once(':') {
        Some((min, max)) => Ok(PortRange::new(
            min.parse().map_err(|_| invalid())?,
            max.parse().map_err(|_| invalid())?,
        )),
        None => Ok(PortRange::single(value.parse().map_err(|_| invalid())?)),
    }
}

impl FirewallRule {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        action: Action,
        protocol: Protocol,
        source: IpAddress,
        source_mask: IpAddress,
        source_port_range: PortRange,
        destination: IpAddress,
        destination_mask: IpAddress,
        destination_port_range: PortRange,
        table: Table,
    ) -> Self {
        Self {
            action,
            protocol,
            source,
            source_mask,
            source_port_range,
            destination,
            destination_mask,
            destination_port_range,
            table,
        }
    }

    /// Build a rule from the columns of `iptables -L -n` output:
    /// target, protocol, source, destination and the trailing options
    /// (`spt:`, `spts:a:b`, `dpt:`, `dpts:a:b`).
    pub fn parse_iptables_params(
        target: &str,
        protocol: &str,
        source: &str,
        destination: &str,
        options: &str,
        table: Table,
    ) -> Result<Self> {
        let action = match target {
            "ACCEPT" => Action::Accept,
            "DROP" => Action::Drop,
            _ => return Err(AttackGraphError::Format(format!("Error in parsing rule: target {}", target))),
        };
        let protocol = match protocol {
            "tcp" => Protocol::Tcp,
            "udp" => Protocol::Udp,
            "all" => Protocol::Any,
            _ => return Err(AttackGraphError::Format(format!("Error in parsing rule: protocol {}", protocol))),
        };
        let (source, source_mask) = parse_iptables_address(source)?;
        let (destination, destination_mask) = parse_iptables_address(destination)?;

        let mut source_port_range = PortRange::any();
        let mut destination_port_range = PortRange::any();
        for option in options.split_whitespace() {
            if let Some(value) = option.strip_prefix("spts:").or_else(|| option.strip_prefix("spt:")) {
                source_port_range = parse_iptables_ports(value)?;
            } else if let Some(value) = option.strip_prefix("dpts:").or_else(|| option.strip_prefix("dpt:")) {
                destination_port_range = parse_iptables_ports(value)?;
            }
        }

        Ok(Self::new(
            action,
            protocol,
            source,
            source_mask,
            source_port_range,
            destination,
            destination_mask,
            destination_port_range,
            table,
        ))
    }

    /// The `iptables -I` command that deploys this rule
    pub fn to_iptables_add_rule(&self) -> String {
        let mut command = format!(
            "iptables -I {} -s {}/{} -d {}/{} -p {} ",
            self.table,
            self.source,
            self.source_mask.mask_prefix_length(),
            self.destination,
            self.destination_mask.mask_prefix_length(),
            self.protocol
        );
        if !self.source_port_range.any {
            command.push_str(&format!(
                " --sport {}:{} ",
                self.source_port_range.min, self.source_port_range.max
            ));
        }
        if !self.destination_port_range.any {
            command.push_str(&format!(
                " --dport {}:{} ",
                self.destination_port_range.min, self.destination_port_range.max
            ));
        }
        command.push_str(&format!(" -j {} ", self.action));
        command
    }

    /// Whether every packet matched by this rule is also matched by `other`
    pub fn included_into_rule(&self, other: &FirewallRule) -> bool {
        IpAddress::network_in_other_network(self.source, self.source_mask, other.source, other.source_mask)
            && other.source_port_range.contains_range(&self.source_port_range)
            && IpAddress::network_in_other_network(
                self.destination,
                self.destination_mask,
                other.destination,
                other.destination_mask,
            )
            && other.destination_port_range.contains_range(&self.destination_port_range)
    }

    fn same_match_as(&self, other: &FirewallRule) -> bool {
        self.protocol == other.protocol
            && self.source == other.source
            && self.source_mask == other.source_mask
            && self.source_port_range == other.source_port_range
            && self.destination == other.destination
            && self.destination_mask == other.destination_mask
            && self.destination_port_range == other.destination_port_range
    }
}

impl fmt::Display for FirewallRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[action={}, source={}/{}:{}, destination={}/{}:{}, protocol={}]",
            self.action,
            self.source,
            self.source_mask.mask_prefix_length(),
            self.source_port_range,
            self.destination,
            self.destination_mask.mask_prefix_length(),
            self.destination_port_range,
            self.protocol
        )
    }
}

/// Description of a packet checked against a table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Packet {
    pub protocol: Protocol,
    pub source: IpAddress,
    pub source_mask: IpAddress,
    pub source_port: u16,
    pub destination: IpAddress,
    pub destination_mask: IpAddress,
    pub destination_port: u16,
}

impl Packet {
    /// Host-to-host packet with /32 masks
    pub fn between_hosts(
        protocol: Protocol,
        source: IpAddress,
        source_port: u16,
        destination: IpAddress,
        destination_port: u16,
    ) -> Self {
        Self {
            protocol,
            source,
            source_mask: IpAddress::HOST_MASK,
            source_port,
            destination,
            destination_mask: IpAddress::HOST_MASK,
            destination_port,
        }
    }
}

impl fmt::Display for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} From : {}/{}:{} To {}/{}:{}",
            self.protocol,
            self.source,
            self.source_mask.mask_prefix_length(),
            self.source_port,
            self.destination,
            self.destination_mask.mask_prefix_length(),
            self.destination_port
        )
    }
}

/// Ordered rule list of the INPUT or OUTPUT chain of a host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FirewallRulesTable {
    #[serde(default)]
    pub rules: Vec<FirewallRule>,
    #[serde(default = "default_policy")]
    pub default_action: Action,
    #[serde(skip, default = "default_table")]
    table: Table,
}

fn default_policy() -> Action {
    Action::Accept
}

fn default_table() -> Table {
    Table::Input
}

impl FirewallRulesTable {
    pub fn new_input() -> Self {
        Self { rules: Vec::new(), default_action: Action::Accept, table: Table::Input }
    }

    pub fn new_output() -> Self {
        Self { rules: Vec::new(), default_action: Action::Accept, table: Table::Output }
    }

    pub fn table(&self) -> Table {
        self.table
    }

    pub(crate) fn set_table(&mut self, table: Table) {
        self.table = table;
        for rule in &mut self.rules {
            rule.table = table;
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Append a rule to the chain, replacing any rule with the same match
    #[allow(clippy::too_many_arguments)]
    pub fn add_firewall_rule(
        &mut self,
        action: Action,
        protocol: Protocol,
        source: IpAddress,
        source_mask: IpAddress,
        source_port_range: PortRange,
        destination: IpAddress,
        destination_mask: IpAddress,
        destination_port_range: PortRange,
    ) -> &FirewallRule {
        let rule = FirewallRule::new(
            action,
            protocol,
            source,
            source_mask,
            source_port_range,
            destination,
            destination_mask,
            destination_port_range,
            self.table,
        );
        self.push_rule(rule)
    }

    /// Same as `add_firewall_rule` for an already built rule
    pub fn push_rule(&mut self, mut rule: FirewallRule) -> &FirewallRule {
        rule.table = self.table;
        self.rules.retain(|existing| !existing.same_match_as(&rule));
        self.rules.push(rule);
        &self.rules[self.rules.len() - 1]
    }

    pub fn packet_can_pass(&self, packet: &Packet) -> bool {
        self.range_can_pass(
            packet.protocol,
            packet.source,
            packet.source_mask,
            PortRange::single(packet.source_port),
            packet.destination,
            packet.destination_mask,
            PortRange::single(packet.destination_port),
        )
    }

    #[allow(clippy::too_many_arguments)]
    pub fn range_can_pass(
        &self,
        protocol: Protocol,
        source: IpAddress,
        source_mask: IpAddress,
        source_port_range: PortRange,
        destination: IpAddress,
        destination_mask: IpAddress,
        destination_port_range: PortRange,
    ) -> bool {
        // loopback traffic is never filtered
        if source == destination
            && source_mask.mask_prefix_length() == 32
            && destination_mask.mask_prefix_length() == 32
        {
            return true;
        }

        for rule in &self.rules {
            let matches = rule.protocol.contained(protocol)
                && IpAddress::network_in_other_network(source, source_mask, rule.source, rule.source_mask)
                && IpAddress::network_in_other_network(
                    destination,
                    destination_mask,
                    rule.destination,
                    rule.destination_mask,
                )
                && rule.source_port_range.contains_range(&source_port_range)
                && rule.destination_port_range.contains_range(&destination_port_range);
            if !matches {
                continue;
            }
            match rule.action {
                Action::Accept => return true,
                Action::Drop => return false,
                Action::Log => {}
            }
        }

        self.default_action == Action::Accept
    }

    /// Rules of this table that overlap `rule` with a different action
    pub fn conflicts_with(&self, rule: &FirewallRule) -> Vec<&FirewallRule> {
        self.rules
            .iter()
            .filter(|candidate| {
                candidate.action != rule.action
                    && (rule.included_into_rule(candidate) || candidate.included_into_rule(rule))
            })
            .collect()
    }

    pub fn rule_conflicts_with_table(&self, rule: &FirewallRule) -> bool {
        !self.conflicts_with(rule).is_empty()
    }
}

impl fmt::Display for FirewallRulesTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "FirewallRulesTable : defaultAction={}", self.default_action)?;
        for (index, rule) in self.rules.iter().enumerate() {
            writeln!(f, "Rule {} {}", index, rule)?;
        }
        Ok(())
    }
}
