//! Attack graph scoring
//!
//! The scoring engine takes the attack graph as parallel tables (vertices,
//! arcs and impact metrics), explores the attack path of every `execCode` OR
//! vertex, writes the paths with their score to an XML file and returns the
//! normalized global score of the graph.

pub mod attack_paths;
pub mod formulas;
pub mod graph;

use std::path::Path;

use log::info;

use crate::error::{AttackGraphError, Result};
use crate::xml::XmlElement;

pub use graph::{ImpactMetric, ScoringArc, ScoringGraph, ScoringVertex, VertexType};

/// One row of the vertex table
#[derive(Debug, Clone, PartialEq)]
pub struct VertexInput {
    pub id: f64,
    pub fact: String,
    pub mulval_metric: f64,
    pub vertex_type: String,
}

/// An explored attack path and its normalized score
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredAttackPath {
    pub scoring: f64,
    pub graph: ScoringGraph,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoringResult {
    pub global_score: f64,
    pub attack_paths: Vec<ScoredAttackPath>,
}

/// Build the scoring graph from the vertex, arc and impact metric tables.
/// `impact_metrics[i]` belongs to `vertices[i]`.
pub fn build_scoring_graph(
    vertices: &[VertexInput],
    arcs: &[(f64, f64)],
    impact_metrics: &[Vec<ImpactMetric>],
) -> Result<ScoringGraph> {
    if impact_metrics.len() != vertices.len() {
        return Err(AttackGraphError::Format(format!(
            "{} impact metric lists for {} vertices",
            impact_metrics.len(),
            vertices.len()
        )));
    }
    let vertices = vertices
        .iter()
        .zip(impact_metrics)
        .map(|(input, metrics)| {
            let mut vertex = ScoringVertex::new(input.id, &input.fact, input.mulval_metric, input.vertex_type.parse()?);
            vertex.impact_metrics = metrics.clone();
            Ok(vertex)
        })
        .collect::<Result<Vec<_>>>()?;
    let arcs = arcs.iter().map(|&(source, destination)| ScoringArc::new(source, destination)).collect();
    Ok(ScoringGraph::new(arcs, vertices))
}

/// Score a graph and explore the attack paths of its targets.
/// Targets whose attack path cannot be explored are skipped.
pub fn score_graph(graph: &ScoringGraph, previous_max_score: f64) -> ScoringResult {
    let targets = graph.vertices_on_type_and_fact(VertexType::Or, "execCode");
    info!("Generate Attack Paths");
    let attack_paths = attack_paths::attack_paths(&targets, graph)
        .into_iter()
        .flatten()
        .map(|path| ScoredAttackPath {
            scoring: formulas::min_max(formulas::global_score(&path), path.vertices.len() as f64),
            graph: path,
        })
        .collect();
    ScoringResult {
        global_score: formulas::min_max(formulas::global_score(graph), previous_max_score),
        attack_paths,
    }
}

/// `<attack_paths>` document, ids written as floating point numbers
pub fn attack_paths_to_xml(attack_paths: &[ScoredAttackPath]) -> XmlElement {
    let mut root = XmlElement::new("attack_paths");
    for path in attack_paths {
        let mut path_element = XmlElement::new("attack_path");
        path_element.push(XmlElement::with_text("scoring", format!("{:?}", path.scoring)));
        let mut arcs = XmlElement::new("arcs");
        for arc in &path.graph.arcs {
            let mut arc_element = XmlElement::new("arc");
            arc_element
                .push(XmlElement::with_text("src", format!("{:?}", arc.source)))
                .push(XmlElement::with_text("dst", format!("{:?}", arc.destination)));
            arcs.push(arc_element);
        }
        path_element.push(arcs);
        root.push(path_element);
    }
    root
}

/// Scoring entry point: score the tables, write the attack paths to
/// `output_path` and return the normalized global score
pub fn score_attack_graph(
    vertices: &[VertexInput],
    arcs: &[(f64, f64)],
    impact_metrics: &[Vec<ImpactMetric>],
    output_path: &Path,
    previous_max_score: f64,
) -> Result<f64> {
    let graph = build_scoring_graph(vertices, arcs, impact_metrics)?;
    let result = score_graph(&graph, previous_max_score);
    std::fs::write(output_path, attack_paths_to_xml(&result.attack_paths).to_xml_string()?)?;
    info!("Attack paths generated ({}) in {}", result.attack_paths.len(), output_path.display());
    Ok(result.global_score)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(id: f64, fact: &str, vertex_type: &str) -> VertexInput {
        VertexInput { id, fact: fact.to_string(), mulval_metric: 1.0, vertex_type: vertex_type.to_string() }
    }

    #[test]
    fn tables_must_agree() {
        let vertices = vec![input(1.0, "execCode(a,root)", "OR")];
        assert!(build_scoring_graph(&vertices, &[], &[]).is_err());
        let bad_type = vec![input(1.0, "execCode(a,root)", "XOR")];
        assert!(build_scoring_graph(&bad_type, &[], &[vec![]]).is_err());
    }

    #[test]
    fn writes_paths_with_float_ids() {
        let vertices = vec![
            input(1.0, "execCode(web,root)", "OR"),
            input(2.0, "RULE 2 (remote exploit of a server program)", "AND"),
            input(3.0, "vulExists(web,'CVE-1',http)", "LEAF"),
            input(4.0, "execCode(db,root)", "OR"),
        ];
        let arcs = vec![(1.0, 2.0), (2.0, 3.0)];
        let metrics = vec![vec![ImpactMetric::new(10.0, 1.0)], vec![], vec![], vec![]];
        let output = tempfile::NamedTempFile::new().unwrap();

        let score = score_attack_graph(&vertices, &arcs, &metrics, output.path(), 1.0).unwrap();
        assert!(score > 10.0);

        let written = XmlElement::parse(&std::fs::read_to_string(output.path()).unwrap()).unwrap();
        // execCode(db) has no premise and is skipped
        assert_eq!(written.children_named("attack_path").count(), 1);
        let arc = written.children[0].required_child("arcs").unwrap().children[0].clone();
        assert_eq!(arc.child_text("src"), Some("1.0"));
        assert_eq!(arc.child_text("dst"), Some("2.0"));
    }
}
