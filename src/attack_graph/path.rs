// Attack path: the part of an attack graph that leads to one goal

use std::cmp::Ordering;
use std::collections::HashSet;
use std::fmt;
use std::path::Path;

use crate::error::{AttackGraphError, Result};
use crate::information_system::{InformationSystem, InformationSystemGraph};
use crate::scoring::VertexType;
use crate::topology::HostId;
use crate::xml::XmlElement;

use super::{parse_vertex_id, AttackGraph, Vertex, VertexId};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttackPath {
    pub graph: AttackGraph,
    pub scoring: f64,
}

impl AttackPath {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn from_vertex(vertex: Vertex) -> Self {
        let mut path = Self::new();
        path.graph.add_vertex(vertex);
        path
    }

    /// Union of the vertices, arcs of `self` then arcs of `other`
    pub(crate) fn merged_with(&self, other: &AttackPath) -> AttackPath {
        let mut merged = self.clone();
        for vertex in other.graph.vertices.values() {
            merged.graph.add_vertex(vertex.clone());
        }
        merged.graph.arcs.extend(other.graph.arcs.iter().copied());
        merged
    }

    // ------------------------------------------------------------------------
    // Scoring XML
    // ------------------------------------------------------------------------

    /// Read an `<attack_path>` of the scoring output; its vertices are taken
    /// from `attack_graph`
    pub fn from_xml(element: &XmlElement, attack_graph: &AttackGraph) -> Result<Self> {
        let mut path = Self::new();
        if let Some(scoring) = element.child_text("scoring") {
            path.scoring = scoring
                .trim()
                .parse()
                .map_err(|_| AttackGraphError::Format(format!("Invalid attack path scoring: {}", scoring)))?;
        }
        if let Some(arcs) = element.child("arcs") {
            for arc in arcs.children_named("arc") {
                let (Some(src), Some(dst)) = (arc.child_text("src"), arc.child_text("dst")) else {
                    continue;
                };
                // the scoring output keeps the MulVAL orientation
                let destination = parse_vertex_id(src)?;
                let source = parse_vertex_id(dst)?;
                for id in [source, destination] {
                    if path.graph.vertex(id).is_none() {
                        path.graph.add_vertex(attack_graph.vertex_from_id(id)?.clone());
                    }
                }
                path.graph.add_arc(source, destination);
            }
        }
        Ok(path)
    }

    pub fn to_xml(&self) -> XmlElement {
        let mut root = XmlElement::new("attack_path");
        root.push(XmlElement::with_text("scoring", self.scoring));
        let mut arcs = XmlElement::new("arcs");
        for arc in &self.graph.arcs {
            let mut element = XmlElement::new("arc");
            element
                .push(XmlElement::with_text("src", arc.destination))
                .push(XmlElement::with_text("dst", arc.source));
            arcs.push(element);
        }
        root.push(arcs);
        root
    }

    /// Attack paths of a scoring output file, by decreasing scoring
    pub fn load_attack_paths_from_file(path: &Path, attack_graph: &AttackGraph) -> Result<Vec<AttackPath>> {
        let root = XmlElement::parse(&std::fs::read_to_string(path)?)?;
        let mut result = root
            .children_named("attack_path")
            .map(|element| AttackPath::from_xml(element, attack_graph))
            .collect::<Result<Vec<_>>>()?;
        sort_attack_paths(&mut result);
        Ok(result)
    }

    /// Heuristic likelihood: every vulnerability, CVSS level and incompetent
    /// user on the path divides it
    pub fn compute_scoring(&mut self) {
        self.scoring = 1.0;
        for command in self.graph.vertices.values().filter_map(Vertex::command) {
            if command.command == "vulExists" {
                self.scoring *= 1.0 / 2.0;
            }
            if command.command == "cvss" {
                match command.param(1) {
                    Some("l") => self.scoring *= 1.0 / 5.0,
                    Some("m") => self.scoring *= 1.0 / 10.0,
                    Some("h") => self.scoring *= 1.0 / 20.0,
                    _ => {}
                }
            } else if command.command == "inCompetent" {
                self.scoring *= 1.0 / 100.0;
            }
        }
    }

    // ------------------------------------------------------------------------
    // Structure
    // ------------------------------------------------------------------------

    /// The vertex without children (the last one when several qualify)
    pub fn goal(&self) -> Option<VertexId> {
        self.graph
            .vertices
            .keys()
            .copied()
            .filter(|id| self.graph.children(*id).is_empty())
            .last()
    }

    /// Leaves an administrator can act on: vulnerabilities, accesses, VLAN
    /// facts and attacker locations without premise, and every hacl
    pub fn leaves_that_can_be_remediated(&self) -> Vec<VertexId> {
        self.graph
            .vertices
            .values()
            .filter(|vertex| {
                let Some(command) = vertex.command() else {
                    return false;
                };
                let name = command.command.as_str();
                if self.graph.parents(vertex.id).is_empty() {
                    matches!(name, "vulExists" | "hacl" | "haclprimit")
                        || name.to_lowercase().contains("vlan")
                        || name.contains("attackerLocated")
                } else {
                    name == "hacl"
                }
            })
            .map(|vertex| vertex.id)
            .collect()
    }

    pub fn leaf_mandatory_for_goal(&self, leaf: VertexId) -> bool {
        self.leaves_mandatory_for_goal(&[leaf])
    }

    /// Whether removing all of `leaves` breaks every derivation of the goal
    pub fn leaves_mandatory_for_goal(&self, leaves: &[VertexId]) -> bool {
        match self.goal() {
            Some(goal) => self.leaves_mandatory_for_vertex(leaves, goal, &mut HashSet::new()),
            None => false,
        }
    }

    fn leaves_mandatory_for_vertex(&self, leaves: &[VertexId], id: VertexId, already_seen: &mut HashSet<VertexId>) -> bool {
        if leaves.contains(&id) {
            return true;
        }
        let Some(vertex) = self.graph.vertex(id) else {
            return false;
        };
        match vertex.vertex_type {
            VertexType::Leaf => false,
            VertexType::And => {
                already_seen.insert(id);
                let mut result = false;
                for parent in self.graph.parents(id) {
                    if !already_seen.contains(&parent) {
                        result = result || self.leaves_mandatory_for_vertex(leaves, parent, already_seen);
                    }
                }
                already_seen.remove(&id);
                result
            }
            VertexType::Or => {
                already_seen.insert(id);
                let mut result = true;
                for parent in self.graph.parents(id) {
                    if !already_seen.contains(&parent) {
                        result = result && self.leaves_mandatory_for_vertex(leaves, parent, already_seen);
                    }
                }
                already_seen.remove(&id);
                result
            }
        }
    }

    /// Minimal groups of remediable leaves that each cut the path, smallest
    /// groups first. A leaf belonging to a group is not reused in larger ones.
    pub fn sufficient_leaves_to_cut_path(&self) -> Vec<Vec<VertexId>> {
        let mut result = Vec::new();
        let mut remaining = self.leaves_that_can_be_remediated();
        let mut size = 1;
        while size <= remaining.len() {
            let mut used: Vec<VertexId> = Vec::new();
            for combination in combinations(size, remaining.len()) {
                let leaves: Vec<VertexId> = combination.iter().map(|&index| remaining[index]).collect();
                if self.leaves_mandatory_for_goal(&leaves) {
                    used.extend(leaves.iter().copied());
                    result.push(leaves);
                }
            }
            remaining.retain(|leaf| !used.contains(leaf));
            size += 1;
        }
        result
    }

    /// Routes the attacker's packets take to exploit the vulnerability of a
    /// `vulExists` leaf:
    /// leaf -> exploit rule <- netAccess <- access rule <- hacl
    pub fn attacker_route_to_a_vulnerability(
        &self,
        leaf: VertexId,
        information_system: &mut InformationSystem,
    ) -> Result<Vec<Vec<HostId>>> {
        let exploit = *self
            .graph
            .children(leaf)
            .first()
            .ok_or_else(|| AttackGraphError::Format(format!("The leaf {} has no child", leaf)))?;
        let climbing_error = || AttackGraphError::Format(format!("Problem while going up to the hacl for the leaf {}", leaf));
        let access = self
            .graph
            .parent_with_command(exploit, "netAccess")
            .or_else(|| self.graph.parent_with_command(exploit, "accessMaliciousInput"))
            .ok_or_else(climbing_error)?;
        let access_rule = *self.graph.parents(access).first().ok_or_else(climbing_error)?;
        let hacl = self
            .graph
            .parent_with_command(access_rule, "hacl")
            .ok_or_else(|| AttackGraphError::Format("No hacl.".to_string()))?;
        let command = self
            .graph
            .vertex_from_id(hacl)?
            .command()
            .ok_or(AttackGraphError::NotAHacl)?;
        command.get_routes_between_hosts_of_hacl(information_system)
    }

    /// Topological view of the path, its goal machine marked as the target
    pub fn related_topology_graph(&self, information_system: &mut InformationSystem) -> Result<InformationSystemGraph> {
        let mut result = self.graph.get_related_topology_graph(information_system)?;
        let target = self
            .goal()
            .and_then(|goal| self.graph.vertex(goal))
            .and_then(|goal| goal.related_machine(information_system));
        if let Some(target) = target {
            result.add_target(target);
        }
        Ok(result)
    }
}

/// Decreasing scoring
pub fn sort_attack_paths(attack_paths: &mut [AttackPath]) {
    attack_paths.sort_by(|a, b| b.scoring.partial_cmp(&a.scoring).unwrap_or(Ordering::Equal));
}

/// Every `k`-element subset of `0..n`, as increasing index lists in lexicographic order
pub fn combinations(k: usize, n: usize) -> Vec<Vec<usize>> {
    fn extend(k: usize, n: usize, start: usize, current: &mut Vec<usize>, result: &mut Vec<Vec<usize>>) {
        if current.len() == k {
            result.push(current.clone());
            return;
        }
        for index in start..n {
            current.push(index);
            extend(k, n, index + 1, current, result);
            current.pop();
        }
    }
    let mut result = Vec::new();
    extend(k, n, 0, &mut Vec::with_capacity(k), &mut result);
    result
}

impl fmt::Display for AttackPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AttackPath : ")?;
        for id in self.graph.vertices.keys() {
            write!(f, "{} - ", id)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attack_graph::tests::small_graph;
    use crate::information_system::INTERNET_HOST_ID;
    use crate::topology::{IpAddress, Topology};

    fn only_path() -> AttackPath {
        small_graph().generate_attack_paths().remove(0)
    }

    #[test]
    fn goal_and_remediable_leaves() {
        let path = only_path();
        assert_eq!(path.goal(), Some(1));
        // networkServiceInfo cannot be remediated
        assert_eq!(path.leaves_that_can_be_remediated(), vec![3, 7, 8]);
        assert!(path.leaf_mandatory_for_goal(3));
        assert!(path.leaf_mandatory_for_goal(7));
        assert!(!path.leaf_mandatory_for_goal(99));
    }

    #[test]
    fn each_mandatory_leaf_is_a_sufficient_cut() {
        let path = only_path();
        assert_eq!(path.sufficient_leaves_to_cut_path(), vec![vec![3], vec![7], vec![8]]);
    }

    #[test]
    fn combinations_in_lexicographic_order() {
        assert_eq!(combinations(2, 3), vec![vec![0, 1], vec![0, 2], vec![1, 2]]);
        assert_eq!(combinations(1, 2), vec![vec![0], vec![1]]);
        assert!(combinations(3, 2).is_empty());
    }

    #[test]
    fn attacker_route_goes_through_the_hacl() {
        let mut topology = Topology::new();
        let web = topology.add_host("web");
        topology.add_interface(web, "eth0", IpAddress::new("10.0.0.2").unwrap(), None).unwrap();
        topology.host_mut(web).unwrap().interfaces["eth0"].connected_to_the_internet = true;
        let mut system = InformationSystem::new(topology);

        let path = only_path();
        let routes = path.attacker_route_to_a_vulnerability(3, &mut system).unwrap();
        assert_eq!(routes, vec![vec![web]]);
        assert!(path.attacker_route_to_a_vulnerability(1, &mut system).is_err());

        let graph = path.related_topology_graph(&mut system).unwrap();
        let target = graph.vertices.iter().find(|vertex| vertex.target).unwrap();
        assert_eq!(target.machine(), Some(web));
        assert!(graph.vertices.iter().any(|vertex| vertex.machine() == Some(INTERNET_HOST_ID)));
    }

    #[test]
    fn scoring_file_is_read_back_sorted() {
        let graph = small_graph();
        let file = tempfile::NamedTempFile::new().unwrap();
        let mut low = AttackPath::from_xml(&only_path().to_xml(), &graph).unwrap();
        low.scoring = 0.25;
        let mut high = low.clone();
        high.scoring = 3.0;
        let mut root = XmlElement::new("attack_paths");
        root.push(low.to_xml()).push(high.to_xml());
        std::fs::write(file.path(), root.to_xml_string().unwrap()).unwrap();

        let paths = AttackPath::load_attack_paths_from_file(file.path(), &graph).unwrap();
        assert_eq!(paths.iter().map(|path| path.scoring).collect::<Vec<_>>(), vec![3.0, 0.25]);
        assert_eq!(paths[0].graph.vertices.len(), 8);
        assert_eq!(paths[0].goal(), Some(1));
    }
}
