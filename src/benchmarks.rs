// Benchmark module for the incremental compromise closure and the scoring engine
// Compares the initial fixpoint against the incremental update of a remediation

use std::collections::HashMap;
use std::time::{Duration, Instant};

use log::info;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::attack_graph::{AttackGraph, Vertex, VertexId};
use crate::error::Result;
use crate::reachability::{
    compute_with_remediation, evaluate_remediations, AttackerLocation, FactRemoval, HaclEdge, ReachabilityFacts,
    VulnerableHost,
};
use crate::scoring::{self, VertexType};

// Results from a reachability benchmark run
#[derive(Debug, Clone)]
pub struct BenchmarkResults {
    pub number_of_nodes: usize,
    pub initial_computation_time: Duration,
    pub incremental_update_time: Duration,
    pub speedup_factor: f64,
    pub number_of_compromised_hosts_initial: usize,
    pub number_of_compromised_hosts_after_patch: usize,
}

impl BenchmarkResults {
    pub fn print_summary(&self) {
        println!("=== BENCHMARK RESULTS ===");
        println!("Network size: {} nodes", self.number_of_nodes);
        println!("Initial computation: {:?}", self.initial_computation_time);
        println!("Incremental update:  {:?}", self.incremental_update_time);
        println!("Speedup factor: {:.2}x", self.speedup_factor);
        println!("Compromised hosts (initial): {}", self.number_of_compromised_hosts_initial);
        println!("Compromised hosts (after patch): {}", self.number_of_compromised_hosts_after_patch);
        println!();
    }
}

// Results from a scoring benchmark run
#[derive(Debug, Clone)]
pub struct ScoringBenchmarkResults {
    pub number_of_vertices: usize,
    pub scoring_time: Duration,
    pub number_of_attack_paths: usize,
    pub global_score: f64,
}

// ============================================================================
// Generated networks
// ============================================================================

fn vulnerable(host: &str, cve: String) -> VulnerableHost {
    VulnerableHost::new(host, &cve)
}

fn ssh(source: &str, destination: &str) -> HaclEdge {
    HaclEdge::new(source, destination, "tcp", "22")
}

// Linear chain: node_0 -> node_1 -> ... -> node_(n-1)
// Each node is vulnerable, the attacker starts at node_0
pub fn generate_chain_network(number_of_nodes: usize) -> ReachabilityFacts {
    let mut facts = ReachabilityFacts::default();
    for node_index in 0..number_of_nodes {
        let node_name = format!("node_{}", node_index);
        facts.vulnerabilities.push(vulnerable(&node_name, format!("CVE-CHAIN-{}", node_index)));
        if node_index + 1 < number_of_nodes {
            facts.hacls.push(ssh(&node_name, &format!("node_{}", node_index + 1)));
        }
    }
    facts.attacker_locations.push(AttackerLocation::new("node_0"));
    facts
}

// Grid where every node reaches its right and bottom neighbours
// The attacker starts at the top-left corner
pub fn generate_mesh_network(grid_width: usize, grid_height: usize) -> ReachabilityFacts {
    let mut facts = ReachabilityFacts::default();
    let node_name = |x: usize, y: usize| format!("node_{}_{}", x, y);

    for y in 0..grid_height {
        for x in 0..grid_width {
            let current_node = node_name(x, y);
            facts.vulnerabilities.push(vulnerable(&current_node, format!("CVE-MESH-{}-{}", x, y)));
            if x + 1 < grid_width {
                facts.hacls.push(ssh(&current_node, &node_name(x + 1, y)));
            }
            if y + 1 < grid_height {
                facts.hacls.push(ssh(&current_node, &node_name(x, y + 1)));
            }
        }
    }
    facts.attacker_locations.push(AttackerLocation::new(&node_name(0, 0)));
    facts
}

// Hub reaching N leaves, converges in two iterations
pub fn generate_star_network(number_of_leaves: usize) -> ReachabilityFacts {
    let mut facts = ReachabilityFacts::default();
    facts.vulnerabilities.push(vulnerable("hub", "CVE-HUB-0".to_string()));
    for leaf_index in 0..number_of_leaves {
        let leaf_name = format!("leaf_{}", leaf_index);
        facts.vulnerabilities.push(vulnerable(&leaf_name, format!("CVE-LEAF-{}", leaf_index)));
        facts.hacls.push(ssh("hub", &leaf_name));
    }
    facts.attacker_locations.push(AttackerLocation::new("hub"));
    facts
}

// Random directed network, reproducible from `seed`
// Each host is vulnerable with probability 1/2, the attacker is on the internet
pub fn generate_random_network(number_of_hosts: usize, edge_probability: f64, seed: u64) -> ReachabilityFacts {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut facts = ReachabilityFacts::default();
    facts.attacker_locations.push(AttackerLocation::new("internet"));

    let hosts: Vec<String> = (0..number_of_hosts).map(|index| format!("host_{}", index)).collect();
    for (index, host) in hosts.iter().enumerate() {
        if rng.gen_bool(0.5) {
            facts.vulnerabilities.push(vulnerable(host, format!("CVE-RANDOM-{}", index)));
        }
        if rng.gen_bool(edge_probability) {
            facts.hacls.push(ssh("internet", host));
        }
        for other in &hosts {
            if other != host && rng.gen_bool(edge_probability) {
                facts.hacls.push(ssh(host, other));
            }
        }
    }
    facts
}

struct GraphBuilder {
    graph: AttackGraph,
    next_id: VertexId,
    exec_code: HashMap<String, VertexId>,
}

impl GraphBuilder {
    fn add(&mut self, fact: String, vertex_type: VertexType) -> VertexId {
        let id = self.next_id;
        self.next_id += 1;
        self.graph.add_vertex(Vertex::new(id, &fact, 1.0, vertex_type));
        id
    }

    fn exec_code(&mut self, host: &str) -> VertexId {
        if let Some(&id) = self.exec_code.get(host) {
            return id;
        }
        let id = self.add(format!("execCode({},root)", host), VertexType::Or);
        self.exec_code.insert(host.to_string(), id);
        id
    }
}

// MulVAL-shaped attack graph of the facts:
// execCode(d) <- RULE 2 <- {execCode(s), hacl(s,d), vulExists(d)}
pub fn attack_graph_from_facts(facts: &ReachabilityFacts) -> AttackGraph {
    let mut builder = GraphBuilder { graph: AttackGraph::new(), next_id: 1, exec_code: HashMap::new() };

    for location in &facts.attacker_locations {
        let located = builder.add(format!("attackerLocated({})", location.host), VertexType::Leaf);
        let rule = builder.add("RULE 0 (Attacker located)".to_string(), VertexType::And);
        let target = builder.exec_code(&location.host);
        builder.graph.add_arc(located, rule);
        builder.graph.add_arc(rule, target);
    }

    let mut vulnerability_leaves: HashMap<String, Vec<VertexId>> = HashMap::new();
    for vulnerability in &facts.vulnerabilities {
        let leaf = builder.add(
            format!("vulExists({},'{}',ssh,remoteExploit,privEscalation)", vulnerability.host, vulnerability.cve),
            VertexType::Leaf,
        );
        vulnerability_leaves.entry(vulnerability.host.clone()).or_default().push(leaf);
    }

    for hacl in &facts.hacls {
        let Some(leaves) = vulnerability_leaves.get(&hacl.destination) else {
            continue;
        };
        let access = builder.add(
            format!("hacl({},{},{},'{}')", hacl.source, hacl.destination, hacl.protocol, hacl.port),
            VertexType::Leaf,
        );
        let source = builder.exec_code(&hacl.source);
        let target = builder.exec_code(&hacl.destination);
        for &leaf in leaves {
            let rule = builder.add("RULE 2 (remote exploit of a server program)".to_string(), VertexType::And);
            builder.graph.add_arc(source, rule);
            builder.graph.add_arc(access, rule);
            builder.graph.add_arc(leaf, rule);
            builder.graph.add_arc(rule, target);
        }
    }
    builder.graph
}

// ============================================================================
// Reachability benchmarks
// ============================================================================

// Initial fixpoint, then the removal of `patch`
pub fn run_reachability_benchmark(facts: &ReachabilityFacts, patch: FactRemoval, number_of_nodes: usize) -> BenchmarkResults {
    let report = compute_with_remediation(facts, &[patch]);
    BenchmarkResults {
        number_of_nodes,
        initial_computation_time: report.initial_computation_time,
        incremental_update_time: report.incremental_update_time,
        speedup_factor: report.speedup_factor(),
        number_of_compromised_hosts_initial: report.compromised_before.len(),
        number_of_compromised_hosts_after_patch: report.compromised_after.len(),
    }
}

// Patching node_1 cuts the chain after node_0
pub fn run_chain_benchmark(number_of_nodes: usize) -> BenchmarkResults {
    let facts = generate_chain_network(number_of_nodes);
    let patch = FactRemoval::Vulnerability(VulnerableHost::new("node_1", "CVE-CHAIN-1"));
    run_reachability_benchmark(&facts, patch, number_of_nodes)
}

// Cutting the first access of the grid
pub fn run_mesh_benchmark(grid_width: usize, grid_height: usize) -> BenchmarkResults {
    let facts = generate_mesh_network(grid_width, grid_height);
    let patch = FactRemoval::Hacl(ssh("node_0_0", "node_1_0"));
    run_reachability_benchmark(&facts, patch, grid_width * grid_height)
}

// Patching leaf_0 only protects that leaf
pub fn run_star_benchmark(number_of_leaves: usize) -> BenchmarkResults {
    let facts = generate_star_network(number_of_leaves);
    let patch = FactRemoval::Vulnerability(VulnerableHost::new("leaf_0", "CVE-LEAF-0"));
    run_reachability_benchmark(&facts, patch, number_of_leaves + 1)
}

// Run multiple chain benchmarks with increasing sizes
pub fn run_scalability_benchmark(sizes: &[usize]) -> Vec<BenchmarkResults> {
    sizes.iter().map(|&size| run_chain_benchmark(size)).collect()
}

// Extended results for random cut benchmark
#[derive(Debug, Clone)]
pub struct RandomCutBenchmarkResults {
    pub number_of_nodes: usize,
    pub number_of_iterations: usize,
    pub initial_computation_time: Duration,
    pub average_incremental_time: Duration,
    pub min_incremental_time: Duration,
    pub max_incremental_time: Duration,
    pub average_speedup: f64,
}

// Patch a random node of the chain, measure, restore; repeated `iterations` times
// Cutting at position k only retracts the n - k nodes after it
// An empty chain has nothing to cut
pub fn run_chain_random_cut_benchmark(number_of_nodes: usize, iterations: usize, seed: u64) -> RandomCutBenchmarkResults {
    let facts = generate_chain_network(number_of_nodes);
    let mut rng = StdRng::seed_from_u64(seed);
    let cuts = if number_of_nodes == 0 { 0 } else { iterations };
    let candidates: Vec<FactRemoval> = (0..cuts)
        .map(|_| {
            let k = rng.gen_range(0..number_of_nodes);
            FactRemoval::Vulnerability(VulnerableHost::new(&format!("node_{}", k), &format!("CVE-CHAIN-{}", k)))
        })
        .collect();

    let (initial_time, impacts) = evaluate_remediations(&facts, &candidates);
    let times: Vec<Duration> = impacts.iter().map(|impact| impact.update_time).collect();

    let min_time = times.iter().min().copied().unwrap_or_default();
    let max_time = times.iter().max().copied().unwrap_or_default();
    let average_time = if times.is_empty() {
        Duration::ZERO
    } else {
        times.iter().sum::<Duration>() / times.len() as u32
    };
    let average_speedup = if average_time.as_nanos() > 0 {
        initial_time.as_secs_f64() / average_time.as_secs_f64()
    } else {
        f64::INFINITY
    };

    RandomCutBenchmarkResults {
        number_of_nodes,
        number_of_iterations: candidates.len(),
        initial_computation_time: initial_time,
        average_incremental_time: average_time,
        min_incremental_time: min_time,
        max_incremental_time: max_time,
        average_speedup,
    }
}

// ============================================================================
// Scoring benchmark
// ============================================================================

// Time the scoring engine on the MulVAL graph of the facts
pub fn run_scoring_benchmark(facts: &ReachabilityFacts) -> Result<ScoringBenchmarkResults> {
    let attack_graph = attack_graph_from_facts(facts);
    let tables = attack_graph.to_scoring_input();
    let graph = scoring::build_scoring_graph(&tables.vertices, &tables.arcs, &tables.impact_metrics)?;

    let start = Instant::now();
    let result = scoring::score_graph(&graph, 1.0);
    let scoring_time = start.elapsed();
    info!("{} vertices scored in {:?}", graph.vertices.len(), scoring_time);

    Ok(ScoringBenchmarkResults {
        number_of_vertices: graph.vertices.len(),
        scoring_time,
        number_of_attack_paths: result.attack_paths.len(),
        global_score: result.global_score,
    })
}

// ============================================================================
// Tables
// ============================================================================

// Print a table of benchmark results
pub fn print_benchmark_table(results: &[BenchmarkResults]) {
    println!("| Nodes | Initial (ms) | Incremental (us) | Speedup | Compromised | After patch |");
    println!("|-------|--------------|------------------|---------|-------------|-------------|");
    for result in results {
        println!(
            "| {:>5} | {:>12.2} | {:>16.2} | {:>6.1}x | {:>11} | {:>11} |",
            result.number_of_nodes,
            result.initial_computation_time.as_secs_f64() * 1000.0,
            result.incremental_update_time.as_secs_f64() * 1_000_000.0,
            result.speedup_factor,
            result.number_of_compromised_hosts_initial,
            result.number_of_compromised_hosts_after_patch,
        );
    }
}

// Print results table for random cut benchmark
pub fn print_random_cut_benchmark_table(results: &[RandomCutBenchmarkResults]) {
    println!("| Nodes | Iterations | Initial (ms) | Avg Incr (us) | Min (us) | Max (us) | Avg Speedup |");
    println!("|-------|------------|--------------|---------------|----------|----------|-------------|");
    for result in results {
        println!(
            "| {:>5} | {:>10} | {:>12.2} | {:>13.2} | {:>8.2} | {:>8.2} | {:>10.1}x |",
            result.number_of_nodes,
            result.number_of_iterations,
            result.initial_computation_time.as_secs_f64() * 1000.0,
            result.average_incremental_time.as_secs_f64() * 1_000_000.0,
            result.min_incremental_time.as_secs_f64() * 1_000_000.0,
            result.max_incremental_time.as_secs_f64() * 1_000_000.0,
            result.average_speedup,
        );
    }
}

pub fn print_scoring_benchmark_table(results: &[ScoringBenchmarkResults]) {
    println!("| Vertices | Scoring (ms) | Attack paths | Global score |");
    println!("|----------|--------------|--------------|--------------|");
    for result in results {
        println!(
            "| {:>8} | {:>12.2} | {:>12} | {:>12.4} |",
            result.number_of_vertices,
            result.scoring_time.as_secs_f64() * 1000.0,
            result.number_of_attack_paths,
            result.global_score,
        );
    }
}
