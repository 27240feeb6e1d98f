//! Exploitability and impact formulas
//!
//! `global_score = risk_score + impact_score`. The risk part weights every
//! vertex by its MulVAL metric and its arc counts, averaged per vertex type.
//! Terms whose denominator is zero contribute nothing.

use super::graph::{ScoringGraph, VertexType};

pub fn global_score(graph: &ScoringGraph) -> f64 {
    risk_score(graph) + impact_score(graph)
}

pub fn risk_score(graph: &ScoringGraph) -> f64 {
    let and_vertices = graph.vertices_on_type(VertexType::And);
    let or_vertices = graph.vertices_on_type(VertexType::Or);
    let leaf_vertices = graph.vertices_on_type(VertexType::Leaf);
    let a = and_vertices.len() as f64;
    let o = or_vertices.len() as f64;
    let l = leaf_vertices.len() as f64;

    let r_and: f64 = and_vertices
        .iter()
        .map(|vertex| {
            let outgoing = graph.outgoing_arcs_number(vertex.id);
            let ingoing = graph.ingoing_arcs_number(vertex.id);
            if ingoing == 0.0 {
                0.0
            } else {
                vertex.mulval_metric * (outgoing / ingoing) / a
            }
        })
        .sum();

    let r_or: f64 = or_vertices
        .iter()
        .map(|vertex| {
            vertex.mulval_metric
                * graph.outgoing_arcs_number(vertex.id)
                * graph.ingoing_arcs_number(vertex.id)
                * o
        })
        .sum();

    // a leaf has no ingoing arc and a unit metric
    let r_leaf: f64 = leaf_vertices
        .iter()
        .map(|vertex| graph.outgoing_arcs_number(vertex.id) / l)
        .sum();

    r_and + r_or + r_leaf
}

pub fn impact_score(graph: &ScoringGraph) -> f64 {
    graph
        .vertices
        .iter()
        .flat_map(|vertex| vertex.impact_metrics.iter())
        .map(|metric| metric.value * metric.weight)
        .sum()
}

pub fn min_max(raw_score: f64, max_score: f64) -> f64 {
    raw_score / max_score
}

pub fn rnad(raw_score: f64, max_score: f64) -> f64 {
    ((raw_score - max_score) / max_score).abs()
}

pub fn p_norm(scores: &[f64], p: f64) -> f64 {
    scores.iter().map(|score| score.powf(p)).sum::<f64>().powf(1.0 / p)
}

/// Standard score of `raw_score` against `scores`, with the sample standard deviation
pub fn z_raw_score(scores: &[f64], raw_score: f64) -> f64 {
    (raw_score - a2(scores)) / sample_standard_deviation(scores)
}

pub fn a1(scores: &[f64]) -> f64 {
    scores.iter().sum()
}

pub fn a2(scores: &[f64]) -> f64 {
    a1(scores) / scores.len() as f64
}

fn sample_standard_deviation(scores: &[f64]) -> f64 {
    if scores.len() < 2 {
        return 0.0;
    }
    let mean = a2(scores);
    let variance = scores.iter().map(|score| (score - mean).powi(2)).sum::<f64>() / (scores.len() - 1) as f64;
    variance.sqrt()
}
