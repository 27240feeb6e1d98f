// Name-based snapshot of an attack path, comparable across topology reloads

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::information_system::{InformationSystem, InformationSystemGraph, InformationSystemGraphVertex, VertexKind};

use super::AttackPath;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TopologyVertexType {
    Machine,
    Network,
}

/// A vertex of the topology graph, identified by its machine name or its
/// network ("address/mask")
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerializableVertex {
    pub machine: String,
    pub network: String,
    pub vertex_type: TopologyVertexType,
    pub machine_of_attacker: bool,
    pub compromised: bool,
    pub target: bool,
}

impl SerializableVertex {
    pub fn new(vertex: &InformationSystemGraphVertex, information_system: &InformationSystem) -> Self {
        let (machine, network, vertex_type) = match vertex.kind {
            VertexKind::Machine(host) => (
                information_system.machine_name(host).to_string(),
                String::new(),
                TopologyVertexType::Machine,
            ),
            VertexKind::Network(network) => (
                String::new(),
                format!("{}/{}", network.address, network.mask),
                TopologyVertexType::Network,
            ),
        };
        Self {
            machine,
            network,
            vertex_type,
            machine_of_attacker: vertex.machine_of_attacker,
            compromised: vertex.compromised,
            target: vertex.target,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerializableArc {
    pub source: usize,
    pub destination: usize,
    pub label: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SerializableAttackPath {
    pub vertices: BTreeMap<usize, SerializableVertex>,
    pub arcs: Vec<SerializableArc>,
}

impl SerializableAttackPath {
    pub fn from_graph(graph: &InformationSystemGraph, information_system: &InformationSystem) -> Self {
        let vertices = graph
            .vertices
            .iter()
            .enumerate()
            .map(|(id, vertex)| (id, SerializableVertex::new(vertex, information_system)))
            .collect();
        let arcs = graph
            .arcs
            .iter()
            .map(|arc| SerializableArc {
                source: arc.source,
                destination: arc.destination,
                label: arc
                    .related_vulnerability
                    .as_ref()
                    .map(|cve| format!("vulnerability:{}", cve))
                    .unwrap_or_default(),
            })
            .collect();
        Self { vertices, arcs }
    }

    pub fn from_attack_path(attack_path: &AttackPath, information_system: &mut InformationSystem) -> Result<Self> {
        let graph = attack_path.related_topology_graph(information_system)?;
        Ok(Self::from_graph(&graph, information_system))
    }

    /// Every vertex of `other` has an equal vertex in `self`; arcs are ignored
    pub fn is_similar_to(&self, other: &SerializableAttackPath) -> bool {
        other
            .vertices
            .values()
            .all(|vertex| self.vertices.values().any(|candidate| candidate == vertex))
    }
}
