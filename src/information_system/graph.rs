// Topological view of an attack: machines and networks linked by exploitable accesses

use std::fmt;

use serde::Serialize;

use crate::error::Result;
use crate::information_system::InformationSystem;
use crate::topology::{HostId, Network};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VertexKind {
    Machine(HostId),
    Network(Network),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InformationSystemGraphVertex {
    pub kind: VertexKind,
    pub machine_of_attacker: bool,
    pub compromised: bool,
    pub target: bool,
}

impl InformationSystemGraphVertex {
    fn new(kind: VertexKind) -> Self {
        Self { kind, machine_of_attacker: false, compromised: false, target: false }
    }

    pub fn machine(&self) -> Option<HostId> {
        match self.kind {
            VertexKind::Machine(host) => Some(host),
            VertexKind::Network(_) => None,
        }
    }
}

/// Arc between two vertex indices, labelled with the exploited vulnerability
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InformationSystemGraphArc {
    pub source: usize,
    pub destination: usize,
    pub related_vulnerability: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct InformationSystemGraph {
    pub vertices: Vec<InformationSystemGraphVertex>,
    pub arcs: Vec<InformationSystemGraphArc>,
}

// Wire format of the graph export
#[derive(Serialize)]
struct ArcJson {
    src: usize,
    dst: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    label: Option<String>,
}

#[derive(Serialize)]
struct VertexJson {
    id: usize,
    #[serde(rename = "type")]
    kind: &'static str,
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    ip_addresses: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    ip_address: Option<String>,
    compromised: bool,
    source_of_attack: bool,
    target: bool,
}

#[derive(Serialize)]
struct ArcsJson {
    arc: Vec<ArcJson>,
}

#[derive(Serialize)]
struct VerticesJson {
    vertex: Vec<VertexJson>,
}

#[derive(Serialize)]
struct GraphJson {
    arcs: ArcsJson,
    vertices: VerticesJson,
}

impl InformationSystemGraph {
    pub fn new() -> Self {
        Self::default()
    }

    fn get_or_create(&mut self, kind: VertexKind) -> usize {
        if let Some(index) = self.vertices.iter().position(|vertex| vertex.kind == kind) {
            return index;
        }
        self.vertices.push(InformationSystemGraphVertex::new(kind));
        self.vertices.len() - 1
    }

    /// Index of the vertex of `machine`, created if needed
    pub fn get_machine_vertex(&mut self, machine: HostId) -> usize {
        self.get_or_create(VertexKind::Machine(machine))
    }

    pub fn get_network_vertex(&mut self, network: Network) -> usize {
        self.get_or_create(VertexKind::Network(network))
    }

    pub fn vertex_mut(&mut self, index: usize) -> Option<&mut InformationSystemGraphVertex> {
        self.vertices.get_mut(index)
    }

    /// Add an arc unless one already links the same two vertices
    pub fn add_arc(&mut self, source: usize, destination: usize, related_vulnerability: Option<String>) {
        let exists = self
            .arcs
            .iter()
            .any(|arc| arc.source == source && arc.destination == destination);
        if !exists {
            self.arcs.push(InformationSystemGraphArc { source, destination, related_vulnerability });
        }
    }

    pub fn add_target(&mut self, target: HostId) {
        for vertex in &mut self.vertices {
            if vertex.kind == VertexKind::Machine(target) {
                vertex.target = true;
            }
        }
    }

    /// `{"arcs":{"arc":[...]},"vertices":{"vertex":[...]}}`, the vertex index being its id
    pub fn to_json(&self, information_system: &InformationSystem) -> Result<String> {
        let arcs = self
            .arcs
            .iter()
            .map(|arc| ArcJson {
                src: arc.source,
                dst: arc.destination,
                label: arc.related_vulnerability.clone(),
            })
            .collect();

        let vertices = self
            .vertices
            .iter()
            .enumerate()
            .map(|(id, vertex)| {
                let (kind, name, ip_addresses, ip_address) = match vertex.kind {
                    VertexKind::Machine(host) => {
                        let addresses = information_system
                            .machine(host)
                            .map(|machine| machine.ip_addresses().iter().map(ToString::to_string).collect())
                            .unwrap_or_default();
                        ("MACHINE", information_system.machine_name(host).to_string(), Some(addresses), None)
                    }
                    VertexKind::Network(network) => (
                        "NETWORK",
                        String::new(),
                        None,
                        Some(format!("{}/{}", network.address, network.mask)),
                    ),
                };
                VertexJson {
                    id,
                    kind,
                    name,
                    ip_addresses,
                    ip_address,
                    compromised: vertex.compromised,
                    source_of_attack: vertex.machine_of_attacker,
                    target: vertex.target,
                }
            })
            .collect();

        let graph = GraphJson { arcs: ArcsJson { arc: arcs }, vertices: VerticesJson { vertex: vertices } };
        Ok(serde_json::to_string(&graph)?)
    }

    /// Graphviz rendering, attacker machines in blue, targets in red and
    /// compromised machines in orange
    pub fn to_dot(&self, information_system: &InformationSystem) -> String {
        let mut dot = String::from("digraph InformationSystem {\n    rankdir=LR;\n    node [shape=box, style=filled];\n\n");
        for (id, vertex) in self.vertices.iter().enumerate() {
            let label = match vertex.kind {
                VertexKind::Machine(host) => information_system.machine_name(host).to_string(),
                VertexKind::Network(network) => network.to_string(),
            };
            let color = if vertex.machine_of_attacker {
                "lightblue"
            } else if vertex.target {
                "red"
            } else if vertex.compromised {
                "orange"
            } else {
                "lightgreen"
            };
            dot.push_str(&format!("    v{} [label=\"{}\", fillcolor={}];\n", id, label, color));
        }
        dot.push('\n');
        for arc in &self.arcs {
            let label = arc.related_vulnerability.as_deref().unwrap_or("");
            dot.push_str(&format!("    v{} -> v{} [label=\"{}\"];\n", arc.source, arc.destination, label));
        }
        dot.push_str("}\n");
        dot
    }
}

impl fmt::Display for InformationSystemGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "InformationSystemGraph ({} vertices, {} arcs)", self.vertices.len(), self.arcs.len())
    }
}
