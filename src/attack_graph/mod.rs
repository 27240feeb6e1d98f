//! MulVAL attack graph
//!
//! Vertices are facts (LEAF), derivation rules (AND) and derived facts (OR).
//! Arcs go from a premise to the conclusion it supports. MulVAL files store
//! them the other way round, so `<src>` is read as the conclusion.

pub mod path;
pub mod serializable;

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::path::Path;

use log::info;

use crate::error::{AttackGraphError, Result};
use crate::fact::{names_the_internet, DatalogCommand, Fact, FactKind};
use crate::information_system::{InformationSystem, InformationSystemGraph, SecurityRequirement, INTERNET_HOST_ID};
use crate::scoring::{self, ImpactMetric, VertexInput, VertexType};
use crate::topology::HostId;
use crate::xml::XmlElement;

pub use path::AttackPath;
pub use serializable::{SerializableArc, SerializableAttackPath, SerializableVertex};

pub type VertexId = i64;

/// Predicates an attacker tries to reach
const ATTACKER_GOALS: [&str; 3] = ["execCode", "accessFile", "principalCompromised"];

#[derive(Debug, Clone, PartialEq)]
pub struct Vertex {
    pub id: VertexId,
    pub fact: Fact,
    pub mulval_metric: f64,
    pub vertex_type: VertexType,
    pub impact_metrics: Vec<ImpactMetric>,
}

impl Vertex {
    pub fn new(id: VertexId, fact: &str, mulval_metric: f64, vertex_type: VertexType) -> Self {
        Self {
            id,
            fact: Fact::new(fact),
            mulval_metric,
            vertex_type,
            impact_metrics: Vec::new(),
        }
    }

    pub fn command(&self) -> Option<&DatalogCommand> {
        self.fact.datalog_command()
    }

    pub fn is_command(&self, name: &str) -> bool {
        self.fact.is_command(name)
    }

    /// Rule whose text contains `text`, or datalog fact whose predicate contains it
    fn is_of_type(&self, is_rule: bool, text: &str) -> bool {
        match &self.fact.kind {
            FactKind::Rule(rule) => is_rule && rule.text.contains(text),
            FactKind::DatalogCommand(command) => !is_rule && command.command.contains(text),
            FactKind::Unparsed => false,
        }
    }

    /// Machine the fact is about, if it exists in the information system
    pub fn related_machine(&self, information_system: &InformationSystem) -> Option<HostId> {
        let command = self.command()?;
        let index = match command.command.as_str() {
            "vulExists" | "execCode" | "netAccess" | "canAccessHost" | "accessMaliciousInput"
            | "networkServiceInfo" | "attackerLocated" | "accessFile" => 0,
            "hacl" | "hasAccount" => 1,
            _ => return None,
        };
        information_system.existing_machine_by_name_or_ip_address(command.param(index)?)
    }

    fn from_xml(element: &XmlElement) -> Result<Self> {
        let id = parse_vertex_id(element.required_child_text("id")?)?;
        let metric = element.child_text("metric").unwrap_or("0");
        let mulval_metric = metric
            .trim()
            .parse()
            .map_err(|_| AttackGraphError::Format(format!("Invalid metric for vertex {}: {}", id, metric)))?;
        Ok(Self::new(
            id,
            element.required_child_text("fact")?,
            mulval_metric,
            element.required_child_text("type")?.trim().parse()?,
        ))
    }
}

impl fmt::Display for Vertex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.id, self.fact)
    }
}

/// Ids are integers, possibly written as floating point numbers ("3.0")
pub(crate) fn parse_vertex_id(text: &str) -> Result<VertexId> {
    let invalid = || AttackGraphError::Format(format!("Invalid vertex id: {}", text));
    let id = text.trim().parse::<f64>().map_err(|_| invalid())?;
    if id.fract() != 0.0 || id < VertexId::MIN as f64 || id > VertexId::MAX as f64 {
        return Err(invalid());
    }
    Ok(id as VertexId)
}

/// Premise -> conclusion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Arc {
    pub source: VertexId,
    pub destination: VertexId,
}

impl Arc {
    pub fn new(source: VertexId, destination: VertexId) -> Self {
        Self { source, destination }
    }
}

/// Parallel tables handed to the scoring engine
#[derive(Debug, Clone, PartialEq)]
pub struct ScoringTables {
    pub vertices: Vec<VertexInput>,
    pub arcs: Vec<(f64, f64)>,
    pub impact_metrics: Vec<Vec<ImpactMetric>>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttackGraph {
    pub vertices: BTreeMap<VertexId, Vertex>,
    pub arcs: Vec<Arc>,
    pub global_score: f64,
}

impl AttackGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_vertex(&mut self, vertex: Vertex) {
        self.vertices.insert(vertex.id, vertex);
    }

    pub fn add_arc(&mut self, source: VertexId, destination: VertexId) {
        self.arcs.push(Arc::new(source, destination));
    }

    // ------------------------------------------------------------------------
    // MulVAL XML
    // ------------------------------------------------------------------------

    pub fn from_xml(root: &XmlElement) -> Result<Self> {
        let mut graph = Self::new();
        if let Some(vertices) = root.child("vertices") {
            for element in vertices.children_named("vertex") {
                graph.add_vertex(Vertex::from_xml(element)?);
            }
        }
        if let Some(arcs) = root.child("arcs") {
            for element in arcs.children_named("arc") {
                let destination = parse_vertex_id(element.required_child_text("src")?)?;
                let source = parse_vertex_id(element.required_child_text("dst")?)?;
                graph.vertex_from_id(source)?;
                graph.vertex_from_id(destination)?;
                graph.add_arc(source, destination);
            }
        }
        info!("Attack graph loaded: {} vertices, {} arcs", graph.vertices.len(), graph.arcs.len());
        Ok(graph)
    }

    pub fn from_xml_str(content: &str) -> Result<Self> {
        Self::from_xml(&XmlElement::parse(content)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        Self::from_xml_str(&std::fs::read_to_string(path)?)
    }

    pub fn to_xml(&self) -> XmlElement {
        let mut root = XmlElement::new("attack_graph");
        let mut arcs = XmlElement::new("arcs");
        for arc in &self.arcs {
            let mut element = XmlElement::new("arc");
            element
                .push(XmlElement::with_text("src", arc.destination))
                .push(XmlElement::with_text("dst", arc.source));
            arcs.push(element);
        }
        root.push(arcs);

        let mut vertices = XmlElement::new("vertices");
        for vertex in self.vertices.values() {
            let mut element = XmlElement::new("vertex");
            element
                .push(XmlElement::with_text("id", vertex.id))
                .push(XmlElement::with_text("fact", &vertex.fact.fact_string))
                .push(XmlElement::with_text("metric", vertex.mulval_metric))
                .push(XmlElement::with_text("type", vertex.vertex_type));
            vertices.push(element);
        }
        root.push(vertices);
        root
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_xml().to_xml_string()?)?;
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Navigation
    // ------------------------------------------------------------------------

    pub fn vertex(&self, id: VertexId) -> Option<&Vertex> {
        self.vertices.get(&id)
    }

    pub fn vertex_from_id(&self, id: VertexId) -> Result<&Vertex> {
        self.vertices.get(&id).ok_or(AttackGraphError::UnknownVertex(id))
    }

    /// Premises of `id`, in arc order
    pub fn parents(&self, id: VertexId) -> Vec<VertexId> {
        self.arcs
            .iter()
            .filter(|arc| arc.destination == id)
            .map(|arc| arc.source)
            .collect()
    }

    /// Conclusions supported by `id`, in arc order
    pub fn children(&self, id: VertexId) -> Vec<VertexId> {
        self.arcs
            .iter()
            .filter(|arc| arc.source == id)
            .map(|arc| arc.destination)
            .collect()
    }

    /// First parent whose datalog predicate is exactly `command`
    pub fn parent_with_command(&self, id: VertexId, command: &str) -> Option<VertexId> {
        self.parents(id)
            .into_iter()
            .find(|parent| self.vertex(*parent).map(|vertex| vertex.is_command(command)).unwrap_or(false))
    }

    pub fn child_of_type(&self, id: VertexId, is_rule: bool, text: &str) -> Option<VertexId> {
        self.children(id)
            .into_iter()
            .find(|child| self.vertex(*child).map(|vertex| vertex.is_of_type(is_rule, text)).unwrap_or(false))
    }

    pub fn parent_of_type(&self, id: VertexId, is_rule: bool, text: &str) -> Option<VertexId> {
        self.parents(id)
            .into_iter()
            .find(|parent| self.vertex(*parent).map(|vertex| vertex.is_of_type(is_rule, text)).unwrap_or(false))
    }

    // ------------------------------------------------------------------------
    // Deletion
    // ------------------------------------------------------------------------

    pub fn delete_arc(&mut self, source: VertexId, destination: VertexId) {
        self.arcs.retain(|arc| !(arc.source == source && arc.destination == destination));
    }

    /// Delete a vertex and what can no longer be derived without it
    pub fn delete_vertex(&mut self, id: VertexId) {
        if self.vertices.remove(&id).is_none() {
            return;
        }
        let children = self.children(id);
        let parents = self.parents(id);

        for child in children {
            self.delete_arc(id, child);
            match self.vertex(child).map(|vertex| vertex.vertex_type) {
                Some(VertexType::And) => self.delete_vertex(child),
                // an OR conclusion goes with its last premise
                Some(VertexType::Or) if self.parents(child).is_empty() => self.delete_vertex(child),
                _ => {}
            }
        }

        for parent in parents {
            if self.children(parent) == [id] && self.parents(parent).is_empty() {
                self.delete_vertex(parent);
            }
            self.delete_arc(parent, id);
        }

        self.delete_unreachable_vertices();
    }

    /// Delete every vertex that no set of leaves can derive
    pub fn delete_unreachable_vertices(&mut self) {
        let unreachable: Vec<VertexId> = self
            .vertices
            .keys()
            .copied()
            .filter(|id| self.minimum_prerequisite_leaves_to(*id).is_empty())
            .collect();
        if unreachable.is_empty() {
            return;
        }
        for id in unreachable {
            self.delete_vertex(id);
        }
        self.delete_unreachable_vertices();
    }

    // ------------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------------

    /// Smallest set of leaves from which `id` can be derived, empty when it cannot
    pub fn minimum_prerequisite_leaves_to(&self, id: VertexId) -> Vec<VertexId> {
        self.minimum_prerequisite_leaves(id, &mut HashSet::new())
    }

    fn minimum_prerequisite_leaves(&self, id: VertexId, already_seen: &mut HashSet<VertexId>) -> Vec<VertexId> {
        let Some(vertex) = self.vertex(id) else {
            return Vec::new();
        };
        if already_seen.contains(&id) {
            return Vec::new();
        }
        match vertex.vertex_type {
            VertexType::Leaf => vec![id],
            VertexType::Or => {
                already_seen.insert(id);
                let mut minimum: Vec<VertexId> = Vec::new();
                for parent in self.parents(id) {
                    let leaves = self.minimum_prerequisite_leaves(parent, already_seen);
                    if !leaves.is_empty() && (minimum.is_empty() || leaves.len() < minimum.len()) {
                        minimum = leaves;
                    }
                }
                already_seen.remove(&id);
                minimum
            }
            VertexType::And => {
                already_seen.insert(id);
                let mut leaves = Vec::new();
                for parent in self.parents(id) {
                    let parent_leaves = self.minimum_prerequisite_leaves(parent, already_seen);
                    if parent_leaves.is_empty() {
                        already_seen.remove(&id);
                        return Vec::new();
                    }
                    leaves.extend(parent_leaves);
                }
                already_seen.remove(&id);
                leaves
            }
        }
    }

    /// Every simple path of arcs from `from` to `to`
    pub fn existing_attack_paths_between(&self, from: VertexId, to: VertexId) -> Result<Vec<Vec<VertexId>>> {
        self.vertex_from_id(from)?;
        self.vertex_from_id(to)?;
        let mut result = Vec::new();
        self.explore(from, to, &mut Vec::new(), &mut HashSet::new(), &mut result);
        Ok(result)
    }

    fn explore(
        &self,
        position: VertexId,
        target: VertexId,
        path: &mut Vec<VertexId>,
        taboo: &mut HashSet<VertexId>,
        result: &mut Vec<Vec<VertexId>>,
    ) {
        path.push(position);
        if position == target {
            result.push(path.clone());
        } else {
            taboo.insert(position);
            let mut next: Vec<VertexId> = self.children(position);
            next.sort_unstable();
            next.dedup();
            for child in next {
                if !taboo.contains(&child) {
                    self.explore(child, target, path, taboo, result);
                }
            }
            taboo.remove(&position);
        }
        path.pop();
    }

    // ------------------------------------------------------------------------
    // Attack paths
    // ------------------------------------------------------------------------

    /// Every attack path to every attacker goal, with its heuristic scoring
    pub fn generate_attack_paths(&self) -> Vec<AttackPath> {
        let goals: Vec<VertexId> = self
            .vertices
            .values()
            .filter(|vertex| ATTACKER_GOALS.iter().any(|goal| vertex.is_command(goal)))
            .map(|vertex| vertex.id)
            .collect();

        let mut result = Vec::new();
        for goal in goals {
            result.extend(self.possible_attack_paths_to(goal, &mut HashSet::new()).unwrap_or_default());
        }
        for path in &mut result {
            path.compute_scoring();
        }
        info!("Number of attack path : {}", result.len());
        result
    }

    fn possible_attack_paths_to(&self, id: VertexId, already_seen: &mut HashSet<VertexId>) -> Option<Vec<AttackPath>> {
        let vertex = self.vertex(id)?;
        if already_seen.contains(&id) {
            return None;
        }
        match vertex.vertex_type {
            VertexType::Leaf => Some(vec![AttackPath::from_vertex(vertex.clone())]),
            VertexType::Or => {
                already_seen.insert(id);
                let mut result = Vec::new();
                for parent in self.parents(id) {
                    let Some(paths) = self.possible_attack_paths_to(parent, already_seen) else {
                        continue;
                    };
                    for mut path in paths {
                        path.graph.add_vertex(vertex.clone());
                        path.graph.add_arc(parent, id);
                        result.push(path);
                    }
                }
                already_seen.remove(&id);
                Some(result)
            }
            VertexType::And => {
                already_seen.insert(id);
                let mut per_parent = Vec::new();
                for parent in self.parents(id) {
                    let Some(mut paths) = self.possible_attack_paths_to(parent, already_seen) else {
                        already_seen.remove(&id);
                        return Some(Vec::new());
                    };
                    for path in &mut paths {
                        path.graph.add_vertex(vertex.clone());
                        path.graph.add_arc(parent, id);
                    }
                    per_parent.push(paths);
                }
                already_seen.remove(&id);
                combine_premises(per_parent)
            }
        }
    }

    // ------------------------------------------------------------------------
    // Scoring
    // ------------------------------------------------------------------------

    /// Impact of every `execCode` vertex: the security metric of its host
    pub fn load_metrics_from_topology(&mut self, information_system: &mut InformationSystem) -> Result<()> {
        let targets: Vec<(VertexId, String)> = self
            .vertices
            .values()
            .filter(|vertex| vertex.is_command("execCode"))
            .filter_map(|vertex| {
                let host = vertex.command()?.param(0)?;
                (!host.is_empty()).then(|| (vertex.id, host.to_string()))
            })
            .collect();

        for (id, host_name) in targets {
            let host = information_system.get_host_by_name_or_ip_address(&host_name)?;
            let metric = information_system.machine(host).map(|machine| machine.metric()).unwrap_or(0.0);
            if let Some(vertex) = self.vertices.get_mut(&id) {
                vertex.impact_metrics.push(ImpactMetric::new(metric, 1.0));
            }
        }
        Ok(())
    }

    /// Security requirements of the machines an attacker can execute code on
    pub fn impacted_security_requirements(&self, information_system: &InformationSystem) -> Vec<SecurityRequirement> {
        let mut result: Vec<SecurityRequirement> = Vec::new();
        for vertex in self.vertices.values().filter(|vertex| vertex.is_command("execCode")) {
            let machine = vertex
                .command()
                .and_then(|command| command.param(0))
                .and_then(|name| information_system.existing_machine_by_name_or_ip_address(name))
                .and_then(|id| information_system.machine(id));
            if let Some(machine) = machine {
                for requirement in &machine.security_requirements {
                    if !result.contains(requirement) {
                        result.push(requirement.clone());
                    }
                }
            }
        }
        result
    }

    /// Scoring tables; the scoring engine sees each arc from its conclusion
    pub fn to_scoring_input(&self) -> ScoringTables {
        let vertices = self
            .vertices
            .values()
            .map(|vertex| VertexInput {
                id: vertex.id as f64,
                fact: vertex.fact.fact_string.clone(),
                mulval_metric: vertex.mulval_metric,
                vertex_type: vertex.vertex_type.to_string(),
            })
            .collect();
        let arcs = self
            .arcs
            .iter()
            .map(|arc| (arc.destination as f64, arc.source as f64))
            .collect();
        let impact_metrics = self.vertices.values().map(|vertex| vertex.impact_metrics.clone()).collect();
        ScoringTables { vertices, arcs, impact_metrics }
    }

    /// Score the graph, write its attack paths to `output_path` and read them
    /// back sorted by decreasing scoring
    pub fn score_attack_graph_and_get_attack_paths(
        &mut self,
        output_path: &Path,
        previous_max_score: f64,
    ) -> Result<Vec<AttackPath>> {
        info!("Generate input for scoring function");
        let tables = self.to_scoring_input();
        info!("Compute global score and compute attack paths");
        self.global_score = scoring::score_attack_graph(
            &tables.vertices,
            &tables.arcs,
            &tables.impact_metrics,
            output_path,
            previous_max_score,
        )?;
        AttackPath::load_attack_paths_from_file(output_path, self)
    }

    // ------------------------------------------------------------------------
    // Topological view
    // ------------------------------------------------------------------------

    /// Machines and exploited accesses of this graph
    pub fn get_related_topology_graph(&self, information_system: &mut InformationSystem) -> Result<InformationSystemGraph> {
        let mut result = InformationSystemGraph::new();

        for vertex in self.vertices.values() {
            let Some(command) = vertex.command() else {
                continue;
            };
            match command.command.as_str() {
                "hacl" => {
                    let (Some(from_name), Some(to_name)) = (command.param(0), command.param(1)) else {
                        continue;
                    };
                    let from = result.get_machine_vertex(machine_for(information_system, from_name)?);
                    let to = result.get_machine_vertex(machine_for(information_system, to_name)?);
                    result.add_arc(from, to, self.vulnerability_exploited_through(vertex.id));
                }
                "attackerLocated" => {
                    let Some(name) = command.param(0) else {
                        continue;
                    };
                    let attacker = result.get_machine_vertex(machine_for(information_system, name)?);
                    if let Some(attacker) = result.vertex_mut(attacker) {
                        attacker.machine_of_attacker = true;
                    }
                }
                "vulExists" => {
                    let Some(name) = command.param(0) else {
                        continue;
                    };
                    let machine = result.get_machine_vertex(information_system.get_host_by_name_or_ip_address(name)?);
                    if let Some(machine) = result.vertex_mut(machine) {
                        machine.compromised = true;
                    }
                }
                _ => {}
            }
        }
        Ok(result)
    }

    /// CVE exploited with the access granted by a hacl vertex:
    /// hacl -> network access rule -> netAccess -> remote exploit <- vulExists
    fn vulnerability_exploited_through(&self, hacl: VertexId) -> Option<String> {
        let access = self
            .child_of_type(hacl, true, "direct network access")
            .or_else(|| self.child_of_type(hacl, true, "multi-hop access"))?;
        let net_access = self.child_of_type(access, false, "netAccess")?;
        let exploit = self.child_of_type(net_access, true, "remote exploit of a server program")?;
        let vulnerability = self.vertex(self.parent_of_type(exploit, false, "vulExists")?)?;
        let command = vulnerability.command()?;
        if command.params.len() > 2 {
            command.param(1).map(str::to_string)
        } else {
            None
        }
    }
}

/// Host named in a fact; the internet names map to the internet machine
pub(crate) fn machine_for(information_system: &mut InformationSystem, name: &str) -> Result<HostId> {
    if names_the_internet(name) {
        Ok(INTERNET_HOST_ID)
    } else {
        information_system.get_host_by_name_or_ip_address(name)
    }
}

/// Cartesian product of the attack paths of the premises of an AND vertex
fn combine_premises(mut per_parent: Vec<Vec<AttackPath>>) -> Option<Vec<AttackPath>> {
    let mut combined = per_parent.pop()?;
    while let Some(current) = per_parent.pop() {
        let mut next = Vec::with_capacity(combined.len() * current.len());
        for rest in &combined {
            for path in &current {
                next.push(rest.merged_with(path));
            }
        }
        combined = next;
    }
    Some(combined)
}

impl fmt::Display for AttackGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Vertices =")?;
        for vertex in self.vertices.values() {
            writeln!(f, "{}", vertex)?;
        }
        writeln!(f, "Arcs =")?;
        for arc in &self.arcs {
            writeln!(f, "{} -> {}", arc.source, arc.destination)?;
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::topology::{IpAddress, Topology};

    /// Remote exploit of `web` from the internet, plus an unrelated leaf
    pub(crate) const SMALL_GRAPH: &str = r#"<attack_graph>
        <arcs>
            <arc><src>1</src><dst>2</dst></arc>
            <arc><src>2</src><dst>3</dst></arc>
            <arc><src>2</src><dst>4</dst></arc>
            <arc><src>2</src><dst>5</dst></arc>
            <arc><src>4</src><dst>6</dst></arc>
            <arc><src>6</src><dst>7</dst></arc>
            <arc><src>6</src><dst>8</dst></arc>
        </arcs>
        <vertices>
            <vertex><id>1</id><fact>execCode(web,root)</fact><metric>0</metric><type>OR</type></vertex>
            <vertex><id>2</id><fact>RULE 2 (remote exploit of a server program)</fact><metric>0</metric><type>AND</type></vertex>
            <vertex><id>3</id><fact>vulExists(web,'CVE-2014-6271',http,remoteExploit,privEscalation)</fact><metric>1</metric><type>LEAF</type></vertex>
            <vertex><id>4</id><fact>netAccess(web,tcp,'80')</fact><metric>0</metric><type>OR</type></vertex>
            <vertex><id>5</id><fact>networkServiceInfo(web,http,tcp,'80',root)</fact><metric>1</metric><type>LEAF</type></vertex>
            <vertex><id>6</id><fact>RULE 6 (direct network access)</fact><metric>0</metric><type>AND</type></vertex>
            <vertex><id>7</id><fact>hacl(internet,web,tcp,'80')</fact><metric>1</metric><type>LEAF</type></vertex>
            <vertex><id>8</id><fact>attackerLocated(internet)</fact><metric>1</metric><type>LEAF</type></vertex>
        </vertices>
    </attack_graph>"#;

    pub(crate) fn small_graph() -> AttackGraph {
        AttackGraph::from_xml_str(SMALL_GRAPH).unwrap()
    }

    #[test]
    fn arcs_are_inverted_when_loading() {
        let graph = small_graph();
        assert_eq!(graph.vertices.len(), 8);
        assert_eq!(graph.parents(1), vec![2]);
        assert_eq!(graph.children(2), vec![1]);
        assert_eq!(graph.parents(2), vec![3, 4, 5]);
        assert_eq!(graph.parent_with_command(2, "netAccess"), Some(4));
        assert_eq!(graph.child_of_type(7, true, "direct network access"), Some(6));

        let reloaded = AttackGraph::from_xml(&graph.to_xml()).unwrap();
        assert_eq!(reloaded.arcs, graph.arcs);
    }

    #[test]
    fn unknown_vertex_in_arc_is_rejected() {
        let broken = SMALL_GRAPH.replace("<src>6</src><dst>8</dst>", "<src>6</src><dst>80</dst>");
        assert!(matches!(AttackGraph::from_xml_str(&broken), Err(AttackGraphError::UnknownVertex(80))));
    }

    #[test]
    fn vertex_ids_must_be_integers() {
        assert_eq!(parse_vertex_id("3").unwrap(), 3);
        assert_eq!(parse_vertex_id(" 3.0 ").unwrap(), 3);
        assert!(matches!(parse_vertex_id("1.5"), Err(AttackGraphError::Format(_))));
        assert!(matches!(parse_vertex_id("NaN"), Err(AttackGraphError::Format(_))));
        assert!(matches!(parse_vertex_id("one"), Err(AttackGraphError::Format(_))));

        let fractional = SMALL_GRAPH.replace("<id>5</id>", "<id>5.5</id>");
        assert!(matches!(AttackGraph::from_xml_str(&fractional), Err(AttackGraphError::Format(_))));
    }

    #[test]
    fn minimum_leaves_and_paths() {
        let graph = small_graph();
        let mut leaves = graph.minimum_prerequisite_leaves_to(1);
        leaves.sort_unstable();
        assert_eq!(leaves, vec![3, 5, 7, 8]);

        let paths = graph.existing_attack_paths_between(7, 1).unwrap();
        assert_eq!(paths, vec![vec![7, 6, 4, 2, 1]]);
        assert!(graph.existing_attack_paths_between(1, 7).unwrap().is_empty());
        assert!(graph.existing_attack_paths_between(1, 99).is_err());
    }

    #[test]
    fn deleting_a_leaf_cuts_what_depends_on_it() {
        let mut graph = small_graph();
        graph.delete_vertex(7);
        // the access rule, netAccess, the exploit and the goal are gone
        for id in [1, 2, 4, 6, 7] {
            assert!(graph.vertex(id).is_none(), "vertex {} should be deleted", id);
        }
        assert!(graph.arcs.iter().all(|arc| arc.source != 7 && arc.destination != 7));
    }

    #[test]
    fn generated_paths_are_scored() {
        let graph = small_graph();
        let paths = graph.generate_attack_paths();
        assert_eq!(paths.len(), 1);
        assert_eq!(paths[0].graph.vertices.len(), 8);
        // one vulExists halves the scoring
        assert_eq!(paths[0].scoring, 0.5);
    }

    #[test]
    fn scoring_input_inverts_arcs() {
        let tables = small_graph().to_scoring_input();
        assert_eq!(tables.vertices.len(), 8);
        assert_eq!(tables.arcs[0], (1.0, 2.0));
        assert_eq!(tables.vertices[0].vertex_type, "OR");
    }

    #[test]
    fn related_topology_graph_labels_hacl_with_exploited_cve() {
        let mut topology = Topology::new();
        let web = topology.add_host("web");
        topology.add_interface(web, "eth0", IpAddress::new("10.0.0.2").unwrap(), None).unwrap();
        let mut system = InformationSystem::new(topology);

        let graph = small_graph().get_related_topology_graph(&mut system).unwrap();
        assert_eq!(graph.vertices.len(), 2);
        assert_eq!(graph.arcs.len(), 1);
        assert_eq!(graph.arcs[0].related_vulnerability.as_deref(), Some("CVE-2014-6271"));
        let attacker = &graph.vertices[graph.arcs[0].source];
        assert_eq!(attacker.machine(), Some(INTERNET_HOST_ID));
        assert!(attacker.machine_of_attacker);
        assert!(graph.vertices[graph.arcs[0].destination].compromised);
    }
}
