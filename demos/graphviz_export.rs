// Graphviz Export Demo - compromised hosts before and after a patch
// Run with: cargo run --release --example graphviz_export
// Then: dot -Tpng graph_initial.dot -o graph_initial.png
//       dot -Tpng graph_final.dot -o graph_final.png

use std::collections::BTreeSet;
use std::fs::File;
use std::io::Write;

use attack_graph_remediation::benchmarks::generate_chain_network;
use attack_graph_remediation::reachability::{self, FactRemoval, ReachabilityFacts, VulnerableHost};

const NUMBER_OF_NODES: usize = 10;
const PATCHED_NODE: &str = "node_4";

/// Hosts, accesses and compromised hosts of one state of the network
struct AttackGraphState<'a> {
    facts: &'a ReachabilityFacts,
    compromised: BTreeSet<&'a str>,
    attacker_start: &'a str,
    target_node: &'a str,
}

impl<'a> AttackGraphState<'a> {
    fn new(facts: &'a ReachabilityFacts, compromised: &'a [String], target_node: &'a str) -> Self {
        Self {
            facts,
            compromised: compromised.iter().map(String::as_str).collect(),
            attacker_start: facts.attacker_locations.first().map(|location| location.host.as_str()).unwrap_or_default(),
            target_node,
        }
    }

    fn nodes(&self) -> BTreeSet<&'a str> {
        let facts: &'a ReachabilityFacts = self.facts;
        let mut nodes: BTreeSet<&str> = facts.vulnerabilities.iter().map(|vulnerability| vulnerability.host.as_str()).collect();
        for hacl in &facts.hacls {
            nodes.insert(&hacl.source);
            nodes.insert(&hacl.destination);
        }
        nodes
    }

    fn export_to_dot(&self, filename: &str, title: &str) -> std::io::Result<()> {
        let mut file = File::create(filename)?;

        writeln!(file, "digraph AttackGraph {{")?;
        writeln!(file, "    label=\"{}\";", title)?;
        writeln!(file, "    labelloc=\"t\";")?;
        writeln!(file, "    fontsize=20;")?;
        writeln!(file, "    rankdir=LR;")?;
        writeln!(file, "    node [shape=box, style=filled];")?;
        writeln!(file)?;

        for node in self.nodes() {
            let compromised = self.compromised.contains(node);
            let (color, label_suffix) = if node == self.attacker_start {
                ("lightblue", " [ATTACKER]")
            } else if node == self.target_node {
                if compromised {
                    ("red", " [TARGET - COMPROMISED!]")
                } else {
                    ("lightgreen", " [TARGET - SAFE]")
                }
            } else if compromised {
                ("orange", " [COMPROMISED]")
            } else {
                ("white", "")
            };
            writeln!(file, "    \"{}\" [fillcolor={}, label=\"{}{}\"];", node, color, node, label_suffix)?;
        }
        writeln!(file)?;

        for hacl in &self.facts.hacls {
            let exploited = self.compromised.contains(hacl.source.as_str()) && self.compromised.contains(hacl.destination.as_str());
            let (color, penwidth) = if exploited { ("red", "2.0") } else { ("black", "1.0") };
            writeln!(
                file,
                "    \"{}\" -> \"{}\" [label=\"{}/{}\", color={}, penwidth={}];",
                hacl.source, hacl.destination, hacl.protocol, hacl.port, color, penwidth
            )?;
        }

        writeln!(file, "}}")?;
        println!("Exported: {}", filename);
        Ok(())
    }
}

fn main() -> std::io::Result<()> {
    println!("=================================================");
    println!("  Attack Graph Visualization with Graphviz");
    println!("=================================================\n");

    // node_0 -> node_1 -> ... -> node_9, the last node is the target
    let facts = generate_chain_network(NUMBER_OF_NODES);
    let target = format!("node_{}", NUMBER_OF_NODES - 1);
    let patch = FactRemoval::Vulnerability(VulnerableHost::new(PATCHED_NODE, "CVE-CHAIN-4"));

    println!("Applying patch: {}\n", patch);
    let report = reachability::compute_with_remediation(&facts, &[patch]);

    AttackGraphState::new(&facts, &report.compromised_before, &target)
        .export_to_dot("graph_initial.dot", "Initial Attack Graph - All nodes compromised")?;
    println!("Initial state: attacker reaches {} nodes including TARGET\n", report.compromised_before.len());

    AttackGraphState::new(&facts, &report.compromised_after, &target)
        .export_to_dot("graph_final.dot", "After Patching node_4 - Attack path broken")?;
    println!(
        "After patch: attacker reaches {} nodes, {} protected\n",
        report.compromised_after.len(),
        report.protected_hosts().len()
    );

    println!("=================================================");
    println!("  Visualization files generated!");
    println!("=================================================");
    println!();
    println!("To convert to PNG images, run:");
    println!("  dot -Tpng graph_initial.dot -o graph_initial.png");
    println!("  dot -Tpng graph_final.dot -o graph_final.png");
    println!();
    println!("Legend:");
    println!("  - Blue node: Attacker starting position");
    println!("  - Orange nodes: Compromised by attacker");
    println!("  - Red node: Target compromised");
    println!("  - Green node: Target safe");
    println!("  - Red edges: Exploited access");
    println!("  - Black edges: Network access (not exploited)");
    Ok(())
}
