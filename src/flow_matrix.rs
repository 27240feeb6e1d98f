//! Flow matrix: authorized flows between VLANs, addresses and the internet
//!
//! The matrix is an overlay consulted next to the firewall simulation. An empty
//! matrix authorizes every flow.

use std::fmt;
use std::path::Path;

use crate::error::{AttackGraphError, Result};
use crate::topology::{Interface, IpAddress, PortRange, Protocol, Topology, VlanId};
use crate::xml::XmlElement;

/// One end of a flow matrix line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowMatrixElement {
    Vlan(VlanId),
    /// Address of an interface of the topology
    Ip(IpAddress),
    Internet,
}

impl FlowMatrixElement {
    fn from_xml(element: &XmlElement, topology: &mut Topology) -> Result<Self> {
        let kind = element.attribute("type").unwrap_or("");
        let resource = element.attribute("resource").unwrap_or("");
        match kind {
            "VLAN" => Ok(FlowMatrixElement::Vlan(topology.get_new_or_existing_vlan(resource))),
            "IP" => {
                let address = IpAddress::new(resource)
                    .map_err(|_| AttackGraphError::FlowMatrix(format!("The resource is not an IP address: {}", resource)))?;
                if topology.get_interface_by_ip_address(address).is_none() {
                    return Err(AttackGraphError::FlowMatrix(format!(
                        "No interface of the topology has the address {}",
                        address
                    )));
                }
                Ok(FlowMatrixElement::Ip(address))
            }
            "INTERNET" => Ok(FlowMatrixElement::Internet),
            other => Err(AttackGraphError::FlowMatrix(format!(
                "The flow matrix line element type is not VLAN, IP or INTERNET : it is {}",
                other
            ))),
        }
    }

    /// Whether the interface belongs to this element; the internet contains no interface
    pub fn contains(&self, interface: &Interface, topology: &Topology) -> bool {
        match self {
            FlowMatrixElement::Internet => false,
            FlowMatrixElement::Ip(address) => interface.address == *address,
            FlowMatrixElement::Vlan(vlan) => topology
                .vlan(*vlan)
                .and_then(|vlan| vlan.network)
                .map(|network| network.contains_address(interface.address))
                .unwrap_or(false),
        }
    }

    pub fn is_internet(&self) -> bool {
        matches!(self, FlowMatrixElement::Internet)
    }
}

impl fmt::Display for FlowMatrixElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlowMatrixElement::Vlan(vlan) => write!(f, "VLAN {}", vlan),
            FlowMatrixElement::Ip(address) => write!(f, "IP {}", address),
            FlowMatrixElement::Internet => write!(f, "INTERNET"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowMatrixLine {
    pub source: FlowMatrixElement,
    pub destination: FlowMatrixElement,
    pub source_port: PortRange,
    pub destination_port: PortRange,
    pub protocol: Protocol,
}

impl FlowMatrixLine {
    fn from_xml(element: &XmlElement, topology: &mut Topology) -> Result<Self> {
        Ok(Self {
            source: FlowMatrixElement::from_xml(element.required_child("source")?, topology)?,
            destination: FlowMatrixElement::from_xml(element.required_child("destination")?, topology)?,
            source_port: element.required_child_text("source_port")?.parse()?,
            destination_port: element.required_child_text("destination_port")?.parse()?,
            protocol: Protocol::from_name(element.required_child_text("protocol")?),
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlowMatrix {
    pub lines: Vec<FlowMatrixLine>,
}

impl FlowMatrix {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse `<flow-matrix>`; VLAN resources are registered in the topology
    pub fn from_xml(element: &XmlElement, topology: &mut Topology) -> Result<Self> {
        let lines = element
            .children_named("flow-matrix-line")
            .map(|line| FlowMatrixLine::from_xml(line, topology))
            .collect::<Result<Vec<_>>>()?;
        log::info!("Flow matrix loaded with {} lines", lines.len());
        Ok(Self { lines })
    }

    pub fn from_xml_str(content: &str, topology: &mut Topology) -> Result<Self> {
        Self::from_xml(&XmlElement::parse(content)?, topology)
    }

    pub fn load(path: &Path, topology: &mut Topology) -> Result<Self> {
        Self::from_xml_str(&std::fs::read_to_string(path)?, topology)
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Whether a flow from `source` to `destination` on `port` is authorized
    pub fn access_authorized(
        &self,
        source: &Interface,
        destination: &Interface,
        port: u16,
        protocol: Protocol,
        topology: &Topology,
    ) -> bool {
        if self.lines.is_empty() || source.vlan == destination.vlan {
            return true;
        }
        self.lines.iter().any(|line| {
            line.source.contains(source, topology)
                && line.destination.contains(destination, topology)
                && line.destination_port.in_range(port)
                && protocols_match(line.protocol, protocol)
        })
    }

    pub fn access_authorized_from_internet(
        &self,
        destination: &Interface,
        port: u16,
        protocol: Protocol,
        topology: &Topology,
    ) -> bool {
        if self.lines.is_empty() {
            return true;
        }
        self.lines.iter().any(|line| {
            line.source.is_internet()
                && line.destination.contains(destination, topology)
                && line.destination_port.in_range(port)
                && protocols_match(line.protocol, protocol)
        })
    }
}

/// ANY on either side matches
fn protocols_match(line: Protocol, packet: Protocol) -> bool {
    line == Protocol::Any || packet == Protocol::Any || line == packet
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::HostId;

    fn ip(address: &str) -> IpAddress {
        IpAddress::new(address).unwrap()
    }

    struct Fixture {
        topology: Topology,
        user: HostId,
        colleague: HostId,
        database: HostId,
    }

    fn fixture() -> Fixture {
        let mut topology = Topology::new();
        let office = topology.add_vlan("office", "office");
        let servers = topology.add_vlan("servers", "servers");
        topology.vlan_mut(office).unwrap().network = Some("10.1.0.0/24".parse().unwrap());
        topology.vlan_mut(servers).unwrap().network = Some("10.2.0.0/24".parse().unwrap());
        let user = topology.add_host("user");
        let colleague = topology.add_host("colleague");
        let database = topology.add_host("database");
        topology.add_interface(user, "eth0", ip("10.1.0.10"), Some(office)).unwrap();
        topology.add_interface(colleague, "eth0", ip("10.1.0.11"), Some(office)).unwrap();
        topology.add_interface(database, "eth0", ip("10.2.0.5"), Some(servers)).unwrap();
        Fixture { topology, user, colleague, database }
    }

    fn interface(topology: &Topology, host: HostId) -> Interface {
        topology.host(host).unwrap().interfaces["eth0"].clone()
    }

    const MATRIX: &str = r#"<flow-matrix>
        <flow-matrix-line>
            <source type="VLAN" resource="office"/>
            <destination type="IP" resource="10.2.0.5"/>
            <source_port>any</source_port>
            <destination_port>1521</destination_port>
            <protocol>TCP</protocol>
        </flow-matrix-line>
        <flow-matrix-line>
            <source type="INTERNET" resource=""/>
            <destination type="VLAN" resource="servers"/>
            <source_port>any</source_port>
            <destination_port>443</destination_port>
            <protocol>ANY</protocol>
        </flow-matrix-line>
    </flow-matrix>"#;

    #[test]
    fn empty_matrix_authorizes_everything() {
        let Fixture { topology, user, database, .. } = fixture();
        let matrix = FlowMatrix::new();
        let (from, to) = (interface(&topology, user), interface(&topology, database));
        assert!(matrix.access_authorized(&from, &to, 22, Protocol::Udp, &topology));
        assert!(matrix.access_authorized_from_internet(&to, 3389, Protocol::Tcp, &topology));
    }

    #[test]
    fn same_vlan_is_always_authorized() {
        let Fixture { mut topology, user, colleague, .. } = fixture();
        let matrix = FlowMatrix::from_xml_str(MATRIX, &mut topology).unwrap();
        let (from, to) = (interface(&topology, user), interface(&topology, colleague));
        assert!(matrix.access_authorized(&from, &to, 6000, Protocol::Udp, &topology));
    }

    #[test]
    fn lines_select_port_and_protocol() {
        let Fixture { mut topology, user, database, .. } = fixture();
        let matrix = FlowMatrix::from_xml_str(MATRIX, &mut topology).unwrap();
        let (from, to) = (interface(&topology, user), interface(&topology, database));

        assert!(matrix.access_authorized(&from, &to, 1521, Protocol::Tcp, &topology));
        assert!(matrix.access_authorized(&from, &to, 1521, Protocol::Any, &topology));
        assert!(!matrix.access_authorized(&from, &to, 1521, Protocol::Udp, &topology));
        assert!(!matrix.access_authorized(&from, &to, 22, Protocol::Tcp, &topology));
        // reverse direction is not declared
        assert!(!matrix.access_authorized(&to, &from, 1521, Protocol::Tcp, &topology));

        assert!(matrix.access_authorized_from_internet(&to, 443, Protocol::Tcp, &topology));
        assert!(!matrix.access_authorized_from_internet(&from, 443, Protocol::Tcp, &topology));
    }

    #[test]
    fn any_protocol_from_the_internet_matches_a_tcp_line() {
        let Fixture { mut topology, database, .. } = fixture();
        let tcp_only = MATRIX.replace("<protocol>ANY</protocol>", "<protocol>TCP</protocol>");
        let matrix = FlowMatrix::from_xml_str(&tcp_only, &mut topology).unwrap();
        let to = interface(&topology, database);

        assert!(matrix.access_authorized_from_internet(&to, 443, Protocol::Any, &topology));
        assert!(matrix.access_authorized_from_internet(&to, 443, Protocol::Tcp, &topology));
        assert!(!matrix.access_authorized_from_internet(&to, 443, Protocol::Udp, &topology));
    }

    #[test]
    fn malformed_lines_are_rejected() {
        let Fixture { mut topology, .. } = fixture();
        let unknown_type = MATRIX.replace(r#"type="INTERNET""#, r#"type="DMZ""#);
        assert!(matches!(
            FlowMatrix::from_xml_str(&unknown_type, &mut topology),
            Err(AttackGraphError::FlowMatrix(_))
        ));
        let unknown_address = MATRIX.replace("10.2.0.5", "10.9.9.9");
        assert!(FlowMatrix::from_xml_str(&unknown_address, &mut topology).is_err());
        let missing_protocol = MATRIX.replace("<protocol>TCP</protocol>", "");
        assert!(matches!(
            FlowMatrix::from_xml_str(&missing_protocol, &mut topology),
            Err(AttackGraphError::Format(_))
        ));
    }
}
