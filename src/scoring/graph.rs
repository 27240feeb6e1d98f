// Scoring view of an attack graph: flat vertex and arc lists with numeric ids

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{AttackGraphError, Result};

/// Kind of a MulVAL vertex
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum VertexType {
    And,
    Or,
    Leaf,
}

impl FromStr for VertexType {
    type Err = AttackGraphError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "AND" => Ok(VertexType::And),
            "OR" => Ok(VertexType::Or),
            "LEAF" => Ok(VertexType::Leaf),
            other => Err(AttackGraphError::Format(format!("Unknown vertex type: {}", other))),
        }
    }
}

impl fmt::Display for VertexType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VertexType::And => write!(f, "AND"),
            VertexType::Or => write!(f, "OR"),
            VertexType::Leaf => write!(f, "LEAF"),
        }
    }
}

/// Weighted impact attached to a vertex
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ImpactMetric {
    pub value: f64,
    pub weight: f64,
}

impl ImpactMetric {
    pub fn new(value: f64, weight: f64) -> Self {
        Self { value, weight }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoringVertex {
    pub id: f64,
    pub fact: String,
    pub mulval_metric: f64,
    pub vertex_type: VertexType,
    pub impact_metrics: Vec<ImpactMetric>,
}

impl ScoringVertex {
    pub fn new(id: f64, fact: &str, mulval_metric: f64, vertex_type: VertexType) -> Self {
        Self {
            id,
            fact: fact.to_string(),
            mulval_metric,
            vertex_type,
            impact_metrics: Vec::new(),
        }
    }
}

/// Arc as the scoring engine sees it: `source` is the conclusion and
/// `destination` the premise it depends on
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoringArc {
    pub source: f64,
    pub destination: f64,
}

impl ScoringArc {
    pub fn new(source: f64, destination: f64) -> Self {
        Self { source, destination }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScoringGraph {
    pub arcs: Vec<ScoringArc>,
    pub vertices: Vec<ScoringVertex>,
}

impl ScoringGraph {
    pub fn new(arcs: Vec<ScoringArc>, vertices: Vec<ScoringVertex>) -> Self {
        Self { arcs, vertices }
    }

    /// Vertices reached by the arcs leaving `id`, `None` when there are none.
    /// Arcs pointing to an unknown vertex are skipped.
    pub fn predecessors(&self, id: f64) -> Option<Vec<&ScoringVertex>> {
        let result: Vec<&ScoringVertex> = self
            .arcs
            .iter()
            .filter(|arc| arc.source == id)
            .filter_map(|arc| self.vertex_on_id(arc.destination))
            .collect();
        if result.is_empty() {
            None
        } else {
            Some(result)
        }
    }

    pub fn predecessor_ids(&self, id: f64) -> Option<Vec<f64>> {
        let result: Vec<f64> = self
            .arcs
            .iter()
            .filter(|arc| arc.source == id)
            .map(|arc| arc.destination)
            .collect();
        if result.is_empty() {
            None
        } else {
            Some(result)
        }
    }

    /// Number of arcs whose source is `id`
    pub fn ingoing_arcs_number(&self, id: f64) -> f64 {
        self.arcs.iter().filter(|arc| arc.source == id).count() as f64
    }

    /// Number of arcs whose destination is `id`
    pub fn outgoing_arcs_number(&self, id: f64) -> f64 {
        self.arcs.iter().filter(|arc| arc.destination == id).count() as f64
    }

    pub fn vertices_on_type(&self, vertex_type: VertexType) -> Vec<&ScoringVertex> {
        self.vertices.iter().filter(|vertex| vertex.vertex_type == vertex_type).collect()
    }

    pub fn vertices_on_type_and_fact(&self, vertex_type: VertexType, fact_prefix: &str) -> Vec<&ScoringVertex> {
        self.vertices
            .iter()
            .filter(|vertex| vertex.vertex_type == vertex_type && vertex.fact.starts_with(fact_prefix))
            .collect()
    }

    pub fn vertex_on_id(&self, id: f64) -> Option<&ScoringVertex> {
        self.vertices.iter().find(|vertex| vertex.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ScoringGraph {
        ScoringGraph::new(
            vec![ScoringArc::new(1.0, 2.0), ScoringArc::new(2.0, 3.0), ScoringArc::new(1.0, 4.0)],
            vec![
                ScoringVertex::new(1.0, "execCode(web,root)", 1.0, VertexType::Or),
                ScoringVertex::new(2.0, "RULE 2 (remote exploit of a server program)", 0.8, VertexType::And),
                ScoringVertex::new(3.0, "vulExists(web,'CVE-2014-6271',http,remoteExploit,privEscalation)", 1.0, VertexType::Leaf),
                ScoringVertex::new(4.0, "netAccess(web,tcp,80)", 1.0, VertexType::Or),
                ScoringVertex::new(5.0, "attackerLocated(internet)", 1.0, VertexType::Leaf),
            ],
        )
    }

    #[test]
    fn isolated_vertex_has_no_predecessor_and_no_arcs() {
        let graph = sample();
        assert!(graph.predecessors(5.0).is_none());
        assert!(graph.predecessor_ids(5.0).is_none());
        assert_eq!(graph.ingoing_arcs_number(5.0), 0.0);
        assert_eq!(graph.outgoing_arcs_number(5.0), 0.0);
    }

    #[test]
    fn arc_counts_follow_the_scoring_orientation() {
        let graph = sample();
        let predecessors: Vec<f64> = graph.predecessors(1.0).unwrap().iter().map(|vertex| vertex.id).collect();
        assert_eq!(predecessors, vec![2.0, 4.0]);
        assert_eq!(graph.ingoing_arcs_number(1.0), 2.0);
        assert_eq!(graph.outgoing_arcs_number(1.0), 0.0);
        assert_eq!(graph.outgoing_arcs_number(3.0), 1.0);
    }

    #[test]
    fn type_and_fact_queries_keep_scan_order() {
        let graph = sample();
        let or_ids: Vec<f64> = graph.vertices_on_type(VertexType::Or).iter().map(|vertex| vertex.id).collect();
        assert_eq!(or_ids, vec![1.0, 4.0]);
        assert_eq!(graph.vertices_on_type_and_fact(VertexType::Or, "execCode").len(), 1);
        assert!(graph.vertices_on_type_and_fact(VertexType::Leaf, "execCode").is_empty());
        assert!(graph.vertex_on_id(42.0).is_none());
        assert!("NAND".parse::<VertexType>().is_err());
    }
}
