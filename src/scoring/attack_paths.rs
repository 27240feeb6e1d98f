// Attack path exploration over the scoring graph
//
// An attack path to a target is the subgraph of everything the target needs:
// every premise of an AND vertex, and at least one satisfiable premise of an
// OR vertex. OR vertices already on the current branch are forbidden to
// break cycles.

use super::graph::{ScoringArc, ScoringGraph, ScoringVertex, VertexType};

/// One-arc graph `vertex -> dependency`
pub fn atomic_graph(vertex: &ScoringVertex, dependency: &ScoringVertex) -> ScoringGraph {
    ScoringGraph::new(
        vec![ScoringArc::new(vertex.id, dependency.id)],
        vec![vertex.clone(), dependency.clone()],
    )
}

/// Union of two graphs keeping first-seen order; arcs are unique by
/// (source, destination) and vertices by id
pub fn merge_graphs(successor: ScoringGraph, predecessor: &ScoringGraph) -> ScoringGraph {
    let mut result = successor;
    for arc in &predecessor.arcs {
        let exists = result
            .arcs
            .iter()
            .any(|existing| existing.source == arc.source && existing.destination == arc.destination);
        if !exists {
            result.arcs.push(*arc);
        }
    }
    for vertex in &predecessor.vertices {
        if !result.vertices.iter().any(|existing| existing.id == vertex.id) {
            result.vertices.push(vertex.clone());
        }
    }
    result
}

fn merge_into(result: Option<ScoringGraph>, other: ScoringGraph) -> ScoringGraph {
    match result {
        Some(graph) => merge_graphs(graph, &other),
        None => other,
    }
}

/// Explore the attack path ending at `vertex`, `None` when it cannot be satisfied
pub fn explore_attack_path(graph: &ScoringGraph, vertex: &ScoringVertex, forbidden: &[f64]) -> Option<ScoringGraph> {
    let mut forbidden = forbidden.to_vec();
    if vertex.vertex_type == VertexType::Or && forbidden.is_empty() {
        forbidden.push(vertex.id);
    }
    let predecessors = graph.predecessors(vertex.id)?;

    match vertex.vertex_type {
        VertexType::And => {
            let mut buffers = Vec::with_capacity(predecessors.len());
            for dependency in predecessors {
                match dependency.vertex_type {
                    VertexType::Leaf => buffers.push(atomic_graph(vertex, dependency)),
                    VertexType::Or => {
                        if forbidden.contains(&dependency.id) {
                            return None;
                        }
                        forbidden.push(dependency.id);
                        // one missing premise removes the whole branch
                        let explored = explore_attack_path(graph, dependency, &forbidden)?;
                        buffers.push(merge_graphs(atomic_graph(vertex, dependency), &explored));
                    }
                    // an AND premise of an AND vertex is not a MulVAL shape
                    VertexType::And => return None,
                }
            }
            buffers.into_iter().fold(None, |result, buffer| Some(merge_into(result, buffer)))
        }
        VertexType::Or => {
            let mut result: Option<ScoringGraph> = None;
            for dependency in predecessors {
                match dependency.vertex_type {
                    VertexType::Leaf => result = Some(merge_into(result, atomic_graph(vertex, dependency))),
                    VertexType::And => {
                        if let Some(explored) = explore_attack_path(graph, dependency, &forbidden) {
                            let branch = merge_graphs(atomic_graph(vertex, dependency), &explored);
                            result = Some(merge_into(result, branch));
                        }
                    }
                    VertexType::Or => {}
                }
            }
            result
        }
        VertexType::Leaf => None,
    }
}

/// Attack path of every target, `None` for the targets that cannot be reached
pub fn attack_paths(targets: &[&ScoringVertex], graph: &ScoringGraph) -> Vec<Option<ScoringGraph>> {
    targets
        .iter()
        .map(|target| explore_attack_path(graph, target, &[]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vertex(id: f64, vertex_type: VertexType) -> ScoringVertex {
        ScoringVertex::new(id, &format!("v{}", id), 1.0, vertex_type)
    }

    #[test]
    fn merge_deduplicates_arcs_and_vertices() {
        let (a, b, c) = (vertex(1.0, VertexType::Or), vertex(2.0, VertexType::And), vertex(3.0, VertexType::Leaf));
        let merged = merge_graphs(atomic_graph(&a, &b), &atomic_graph(&a, &b));
        assert_eq!(merged.arcs.len(), 1);
        assert_eq!(merged.vertices.len(), 2);

        let merged = merge_graphs(merged, &atomic_graph(&b, &c));
        let ids: Vec<f64> = merged.vertices.iter().map(|vertex| vertex.id).collect();
        assert_eq!(ids, vec![1.0, 2.0, 3.0]);
        assert_eq!(merged.arcs[1], ScoringArc::new(2.0, 3.0));
    }

    #[test]
    fn or_target_collects_satisfiable_branches() {
        // 1 (OR) <- 2 (AND) <- {3 LEAF, 4 LEAF}; 1 <- 5 (AND) <- 6 (OR, no premise)
        let graph = ScoringGraph::new(
            vec![
                ScoringArc::new(1.0, 2.0),
                ScoringArc::new(2.0, 3.0),
                ScoringArc::new(2.0, 4.0),
                ScoringArc::new(1.0, 5.0),
                ScoringArc::new(5.0, 6.0),
            ],
            vec![
                vertex(1.0, VertexType::Or),
                vertex(2.0, VertexType::And),
                vertex(3.0, VertexType::Leaf),
                vertex(4.0, VertexType::Leaf),
                vertex(5.0, VertexType::And),
                vertex(6.0, VertexType::Or),
            ],
        );
        let path = explore_attack_path(&graph, &graph.vertices[0], &[]).unwrap();
        let mut ids: Vec<f64> = path.vertices.iter().map(|vertex| vertex.id).collect();
        ids.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert_eq!(ids, vec![1.0, 2.0, 3.0, 4.0]);
        assert_eq!(path.arcs.len(), 3);
    }

    #[test]
    fn cycle_through_forbidden_or_is_rejected() {
        // 1 (OR) <- 2 (AND) <- 1 (OR): the only derivation of 1 needs 1 itself
        let graph = ScoringGraph::new(
            vec![ScoringArc::new(1.0, 2.0), ScoringArc::new(2.0, 1.0)],
            vec![vertex(1.0, VertexType::Or), vertex(2.0, VertexType::And)],
        );
        assert!(explore_attack_path(&graph, &graph.vertices[0], &[]).is_none());
    }

    #[test]
    fn vertex_without_premise_has_no_path() {
        let graph = ScoringGraph::new(vec![], vec![vertex(1.0, VertexType::Or)]);
        let targets: Vec<&ScoringVertex> = graph.vertices.iter().collect();
        assert_eq!(attack_paths(&targets, &graph), vec![None]);
    }
}
