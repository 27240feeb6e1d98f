//! Information system: the topology plus its inventory and flow matrix
//!
//! This is the view the attack graph is reasoned against. Hosts are looked up
//! by the names and addresses found in datalog facts, and the whole system can
//! be exported as a MulVAL datalog program.

pub mod graph;
pub mod inventory;

use std::path::Path;

use log::info;
use serde::Serialize;

use crate::error::{AttackGraphError, Result};
use crate::flow_matrix::{FlowMatrix, FlowMatrixElement};
use crate::topology::{Host, HostId, IpAddress, PortRange, Protocol, Topology};

pub use graph::{InformationSystemGraph, InformationSystemGraphArc, InformationSystemGraphVertex, VertexKind};
pub use inventory::{SecurityRequirement, Service, Vulnerability};

/// Handle of the transient "internet" machine, never stored in the topology
pub const INTERNET_HOST_ID: HostId = HostId(usize::MAX);

#[derive(Debug, Clone)]
pub struct InformationSystem {
    pub topology: Topology,
    pub flow_matrix: FlowMatrix,
    pub attacker_located_on_internet: bool,
    pub machines_of_attacker: Vec<HostId>,
    internet_host: Host,
}

#[derive(Serialize)]
struct SecurityRequirementJson {
    name: String,
    metric: &'static str,
}

#[derive(Serialize)]
struct HostJson {
    name: String,
    security_requirements: Vec<SecurityRequirementJson>,
}

#[derive(Serialize)]
struct HostsListJson {
    hosts: Vec<HostJson>,
}

impl InformationSystem {
    pub fn new(topology: Topology) -> Self {
        Self {
            topology,
            flow_matrix: FlowMatrix::new(),
            attacker_located_on_internet: true,
            machines_of_attacker: Vec::new(),
            internet_host: Host::new(INTERNET_HOST_ID, "internet"),
        }
    }

    pub fn with_flow_matrix(mut self, flow_matrix: FlowMatrix) -> Self {
        self.flow_matrix = flow_matrix;
        self
    }

    /// Topology JSON plus an optional flow matrix XML file
    pub fn load(topology_path: &Path, flow_matrix_path: Option<&Path>) -> Result<Self> {
        let mut topology = Topology::load_json(topology_path)?;
        let flow_matrix = match flow_matrix_path {
            Some(path) => FlowMatrix::load(path, &mut topology)?,
            None => FlowMatrix::new(),
        };
        info!("Information system loaded from {}", topology_path.display());
        Ok(Self::new(topology).with_flow_matrix(flow_matrix))
    }

    /// Host of the topology, or the transient internet machine
    pub fn machine(&self, id: HostId) -> Option<&Host> {
        if id == INTERNET_HOST_ID {
            Some(&self.internet_host)
        } else {
            self.topology.host(id)
        }
    }

    pub fn machine_name(&self, id: HostId) -> &str {
        self.machine(id).map(|host| host.name.as_str()).unwrap_or("")
    }

    /// Host by name; "internet" resolves to the transient internet machine
    pub fn existing_machine_by_name(&self, name: &str) -> Option<HostId> {
        self.topology
            .existing_host_by_name(name)
            .or_else(|| (name == "internet").then_some(INTERNET_HOST_ID))
    }

    pub fn existing_machine_by_name_or_ip_address(&self, name_or_address: &str) -> Option<HostId> {
        match IpAddress::new(name_or_address) {
            Ok(address) => self.topology.existing_host_by_ip_address(address),
            Err(_) => self.existing_machine_by_name(name_or_address),
        }
    }

    /// Host owning `address`, created with an `int1` interface if missing
    pub fn get_machine_by_ip_address(&mut self, address: IpAddress) -> Result<HostId> {
        self.topology.get_host_by_ip_address(address)
    }

    /// Resolve an address through the topology, or a name, creating the host
    /// when it does not exist yet
    pub fn get_host_by_name_or_ip_address(&mut self, name_or_address: &str) -> Result<HostId> {
        if IpAddress::is_an_ip_address(name_or_address) {
            return self.get_machine_by_ip_address(IpAddress::new(name_or_address)?);
        }
        match self.existing_machine_by_name(name_or_address) {
            Some(existing) => Ok(existing),
            None => Ok(self.topology.add_host(name_or_address)),
        }
    }

    pub fn routes_from_internet_to(&self, to: HostId) -> Result<Vec<Vec<HostId>>> {
        self.topology.get_routes_from_internet(to)
    }

    pub fn route_to_internet_from(&self, from: HostId) -> Vec<HostId> {
        self.topology.get_route_to_internet(from)
    }

    pub fn route_between_hosts(&self, from: HostId, to: HostId) -> Result<Vec<HostId>> {
        self.topology.route_between_hosts(from, to)
    }

    /// Names and security requirements of every host, as JSON
    pub fn hosts_list_json(&self) -> Result<String> {
        let hosts = self
            .topology
            .hosts()
            .map(|host| HostJson {
                name: host.name.clone(),
                security_requirements: host
                    .security_requirements
                    .iter()
                    .map(|requirement| SecurityRequirementJson {
                        name: requirement.name.clone(),
                        metric: requirement.metric_plain_text(),
                    })
                    .collect(),
            })
            .collect();
        Ok(serde_json::to_string(&HostsListJson { hosts })?)
    }

    // ========================================================================
    // MulVAL datalog export
    // ========================================================================

    fn element_name(&self, element: &FlowMatrixElement) -> String {
        match element {
            FlowMatrixElement::Internet => "internet".to_string(),
            FlowMatrixElement::Ip(address) => address.to_string(),
            FlowMatrixElement::Vlan(vlan) => self
                .topology
                .vlan(*vlan)
                .map(|vlan| vlan.name.clone())
                .unwrap_or_default(),
        }
    }

    fn mulval_port(port: &PortRange) -> Result<String> {
        if port.any {
            Ok("_".to_string())
        } else if port.min == port.max {
            Ok(port.min.to_string())
        } else {
            Err(AttackGraphError::FlowMatrix(
                "Minimum and Maximum port range are not yet managed.".to_string(),
            ))
        }
    }

    /// The MulVAL input program describing this information system
    pub fn export_to_mulval_datalog(&self) -> Result<String> {
        let mut lines: Vec<String> = Vec::new();
        let banner = |lines: &mut Vec<String>, title: &str| {
            lines.push("/**********************************/".to_string());
            lines.push(title.to_string());
            lines.push("/**********************************/".to_string());
        };

        banner(&mut lines, "/*    Add Internet                */");
        lines.push("attackerLocated(internet_host).".to_string());
        lines.push("hasIP(internet_host,'1.1.1.1').".to_string());
        lines.push("defaultLocalFilteringBehavior('internet_host',allow).".to_string());
        lines.push("isInVlan('1.1.1.1','internet').".to_string());
        lines.push(String::new());

        for host in self.topology.hosts() {
            banner(&mut lines, &format!("/*    Add Host {} */", host.name));
            lines.push(format!("attackerLocated('{}').", host.name));
            lines.push(format!("attackGoal(execCode('{}', _)).", host.name));
            for interface in host.interfaces.values() {
                lines.push(format!("hasIP('{}','{}').", host.name, interface.address));
                let vlan_name = self.topology.vlan(interface.vlan).map(|vlan| vlan.name.as_str()).unwrap_or("");
                if !vlan_name.is_empty() {
                    lines.push(format!("isInVlan('{}','{}').", interface.address, vlan_name));
                }
            }
            lines.push(format!("hostAllowAccessToAllIP('{}').", host.name));
            for service in host.services.values() {
                lines.push(format!("installed('{}','{}').", host.name, service.name));
                if service.port != 0 {
                    let address = service.ip_address.map(|address| address.to_string()).unwrap_or_default();
                    lines.push(format!(
                        "networkServiceInfo('{}', '{}', '{}', {}, 'user').",
                        address, service.name, service.protocol, service.port
                    ));
                }
                for vulnerability in service.vulnerabilities.values() {
                    lines.push(format!(
                        "vulProperty('{}', {}, {}).",
                        vulnerability.cve, vulnerability.exploit_type, vulnerability.exploit_goal
                    ));
                    lines.push(format!(
                        "vulExists('{}', '{}', '{}', {}, {}).",
                        host.name, vulnerability.cve, service.name, vulnerability.exploit_type, vulnerability.exploit_goal
                    ));
                    lines.push(format!("cvss('{}',{}).", vulnerability.cve, vulnerability.cvss_level()));
                }
            }
            lines.push(String::new());
        }

        if self.flow_matrix.is_empty() {
            let vlans = self.topology.vlans();
            for (from_id, from) in &vlans {
                for (to_id, to) in &vlans {
                    if from_id != to_id {
                        lines.push(format!("vlanToVlan('{}','{}',_,_).", from.name, to.name));
                    }
                }
            }
        } else {
            for line in &self.flow_matrix.lines {
                let port = Self::mulval_port(&line.destination_port)?;
                let protocol = match line.protocol {
                    Protocol::Any => "_".to_string(),
                    other => format!("'{}'", other),
                };
                let predicate = match (&line.source, &line.destination) {
                    (FlowMatrixElement::Ip(_), FlowMatrixElement::Ip(_)) => "haclprimit",
                    (_, FlowMatrixElement::Ip(_)) => "vlanToIP",
                    (FlowMatrixElement::Ip(_), _) => "ipToVlan",
                    (FlowMatrixElement::Internet, FlowMatrixElement::Internet) => {
                        return Err(AttackGraphError::FlowMatrix("Unknown values of flow matrix".to_string()))
                    }
                    _ => "vlanToVlan",
                };
                lines.push(format!(
                    "{}('{}','{}', {},{}).",
                    predicate,
                    self.element_name(&line.source),
                    self.element_name(&line.destination),
                    port,
                    protocol
                ));
            }
        }

        banner(&mut lines, "/******     General Rules    ******/");
        lines.push("defaultLocalFilteringBehavior(_,allow).".to_string());
        lines.push(String::new());
        Ok(lines.join("\n"))
    }

    pub fn write_mulval_datalog(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.export_to_mulval_datalog()?)?;
        info!("MulVAL input written to {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ip(address: &str) -> IpAddress {
        IpAddress::new(address).unwrap()
    }

    fn small_system() -> InformationSystem {
        let mut topology = Topology::new();
        let lan = topology.add_vlan("1", "lan");
        let dmz = topology.add_vlan("2", "dmz");
        let web = topology.add_host("web");
        topology.add_interface(web, "eth0", ip("192.168.2.10"), Some(dmz)).unwrap();
        let workstation = topology.add_host("workstation");
        topology.add_interface(workstation, "eth0", ip("192.168.1.10"), Some(lan)).unwrap();

        let mut http = Service::new("http_server");
        http.ip_address = Some(ip("192.168.2.10"));
        http.port = 80;
        http.get_new_or_existing_vulnerability("CVE-2014-6271").cvss = Some(10.0);
        topology.host_mut(web).unwrap().services.insert(http.name.clone(), http);
        InformationSystem::new(topology)
    }

    #[test]
    fn datalog_export_of_hosts_and_services() {
        let datalog = small_system().export_to_mulval_datalog().unwrap();
        assert!(datalog.contains("attackerLocated(internet_host).\n"));
        assert!(datalog.contains("hasIP('web','192.168.2.10').\n"));
        assert!(datalog.contains("isInVlan('192.168.2.10','dmz').\n"));
        assert!(datalog.contains("networkServiceInfo('192.168.2.10', 'http_server', 'TCP', 80, 'user').\n"));
        assert!(datalog.contains("vulExists('web', 'CVE-2014-6271', 'http_server', remoteExploit, privEscalation).\n"));
        assert!(datalog.contains("cvss('CVE-2014-6271',h).\n"));
        assert!(datalog.trim_end().ends_with("defaultLocalFilteringBehavior(_,allow)."));
    }

    #[test]
    fn empty_flow_matrix_connects_every_pair_of_vlans() {
        let datalog = small_system().export_to_mulval_datalog().unwrap();
        assert!(datalog.contains("vlanToVlan('lan','dmz',_,_).\n"));
        assert!(datalog.contains("vlanToVlan('dmz','lan',_,_).\n"));
        assert!(!datalog.contains("vlanToVlan('lan','lan'"));
    }

    #[test]
    fn flow_matrix_lines_become_access_predicates() {
        let mut system = small_system();
        let matrix = r#"<flow-matrix>
            <flow-matrix-line>
                <source type="INTERNET" resource=""/><destination type="IP" resource="192.168.2.10"/>
                <source_port>any</source_port><destination_port>80</destination_port><protocol>TCP</protocol>
            </flow-matrix-line>
            <flow-matrix-line>
                <source type="VLAN" resource="1"/><destination type="VLAN" resource="2"/>
                <source_port>any</source_port><destination_port>any</destination_port><protocol>ANY</protocol>
            </flow-matrix-line>
        </flow-matrix>"#;
        system.flow_matrix = FlowMatrix::from_xml_str(matrix, &mut system.topology).unwrap();
        let datalog = system.export_to_mulval_datalog().unwrap();
        assert!(datalog.contains("vlanToIP('internet','192.168.2.10', 80,'TCP').\n"));
        assert!(datalog.contains("vlanToVlan('lan','dmz', _,_).\n"));

        system.flow_matrix.lines[0].destination_port = PortRange::new(80, 90);
        assert!(system.export_to_mulval_datalog().is_err());
    }

    #[test]
    fn host_resolution() {
        let mut system = small_system();
        let web = system.topology.existing_host_by_name("web").unwrap();
        assert_eq!(system.get_host_by_name_or_ip_address("192.168.2.10").unwrap(), web);
        assert_eq!(system.existing_machine_by_name("internet"), Some(INTERNET_HOST_ID));
        assert_eq!(system.machine_name(INTERNET_HOST_ID), "internet");

        let before = system.topology.host_count();
        let created = system.get_host_by_name_or_ip_address("mail").unwrap();
        assert_eq!(system.topology.host_count(), before + 1);
        assert_eq!(system.get_host_by_name_or_ip_address("mail").unwrap(), created);
        assert_eq!(system.existing_machine_by_name_or_ip_address("10.0.0.99"), None);
    }
}
