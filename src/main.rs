//! Command line entry point
//!
//! Each subcommand loads its inputs (MulVAL attack graph XML, topology JSON,
//! optional flow matrix XML), runs one part of the library and prints a
//! report. Errors are logged and end the process with a non-zero status.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use log::{error, info};

use attack_graph_remediation::attack_graph::path::sort_attack_paths;
use attack_graph_remediation::attack_graph::AttackGraph;
use attack_graph_remediation::benchmarks::{
    generate_chain_network, print_benchmark_table, print_random_cut_benchmark_table, print_scoring_benchmark_table,
    run_chain_random_cut_benchmark, run_scalability_benchmark, run_scoring_benchmark, run_star_benchmark,
};
use attack_graph_remediation::config::Config;
use attack_graph_remediation::error::{AttackGraphError, Result};
use attack_graph_remediation::information_system::InformationSystem;
use attack_graph_remediation::reachability::{
    compute_compromised_hosts, evaluate_remediations, FactRemoval, ReachabilityFacts,
};
use attack_graph_remediation::remediation::dynamic::remediations_for_alert_json;
use attack_graph_remediation::remediation::{
    deployable_remediations, Alert, CostParameters, InMemoryKnowledgeBase, RemediationContext,
};
use attack_graph_remediation::topology::{IpAddress, Protocol, CLIENT_SOURCE_PORT};

#[derive(Parser)]
#[command(name = "attack-graph", version, about = "Attack graph scoring, network simulation and remediation costing")]
struct Cli {
    /// TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Score a MulVAL attack graph and write its attack paths
    Score {
        attack_graph: PathBuf,
        #[arg(long)]
        output: PathBuf,
        /// Topology whose security requirements weigh the execCode vertices
        #[arg(long)]
        topology: Option<PathBuf>,
    },
    /// Route a packet between two hosts of a topology
    Route {
        topology: PathBuf,
        source: String,
        destination: String,
        #[arg(long, default_value_t = 80)]
        port: u16,
        #[arg(long, default_value = "tcp")]
        protocol: String,
        #[arg(long)]
        flow_matrix: Option<PathBuf>,
    },
    /// Print the information system graph of an attack graph
    IsGraph {
        attack_graph: PathBuf,
        topology: PathBuf,
        /// Graphviz output instead of JSON
        #[arg(long)]
        dot: bool,
    },
    /// Candidate remediations of every attack path, cheapest first
    Remediate {
        attack_graph: PathBuf,
        topology: PathBuf,
        #[arg(long)]
        knowledge_base: Option<PathBuf>,
        #[arg(long)]
        flow_matrix: Option<PathBuf>,
        /// Only propose patches for the vulnerabilities
        #[arg(long)]
        no_snort_rules: bool,
    },
    /// MulVAL datalog input of a topology
    Datalog {
        topology: PathBuf,
        #[arg(long)]
        flow_matrix: Option<PathBuf>,
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Compromised hosts of an attack graph, computed incrementally
    Reachability {
        attack_graph: PathBuf,
        /// Measure the removal of every hacl and vulnerability
        #[arg(long)]
        evaluate: bool,
    },
    /// Remediations answering an intrusion alert
    Alert {
        #[arg(long)]
        source: String,
        #[arg(long)]
        destination: String,
        #[arg(long)]
        cve: Option<String>,
    },
    /// Reachability and scoring benchmarks on generated networks
    Benchmark {
        #[arg(long, value_delimiter = ',', value_parser = network_size, default_values_t = vec![10, 50, 100, 200])]
        sizes: Vec<usize>,
        #[arg(long, value_delimiter = ',', value_parser = network_size, default_values_t = vec![10, 20, 50])]
        scoring_sizes: Vec<usize>,
        #[arg(long, default_value_t = 10)]
        iterations: usize,
        #[arg(long, default_value_t = 42)]
        seed: u64,
    },
}

fn network_size(value: &str) -> std::result::Result<usize, String> {
    match value.parse::<usize>() {
        Ok(0) => Err("a network has at least one node".to_string()),
        Ok(size) => Ok(size),
        Err(err) => Err(err.to_string()),
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    if let Err(err) = run(cli) {
        error!("{}", err);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };

    match cli.command {
        Command::Score { attack_graph, output, topology } => score(&config, &attack_graph, &output, topology.as_deref()),
        Command::Route { topology, source, destination, port, protocol, flow_matrix } => {
            let system = load_information_system(&config, &topology, flow_matrix.as_deref())?;
            route(&system, &source, &destination, port, Protocol::from_name(&protocol))
        }
        Command::IsGraph { attack_graph, topology, dot } => {
            let attack_graph = AttackGraph::load(&attack_graph)?;
            let mut system = load_information_system(&config, &topology, None)?;
            let graph = attack_graph.get_related_topology_graph(&mut system)?;
            if dot {
                println!("{}", graph.to_dot(&system));
            } else {
                println!("{}", graph.to_json(&system)?);
            }
            Ok(())
        }
        Command::Remediate { attack_graph, topology, knowledge_base, flow_matrix, no_snort_rules } => {
            let mut system = load_information_system(&config, &topology, flow_matrix.as_deref())?;
            let knowledge_base = match knowledge_base {
                Some(path) => InMemoryKnowledgeBase::load(&path)?,
                None => InMemoryKnowledgeBase::new(),
            };
            remediate(&config, &attack_graph, &mut system, &knowledge_base, !no_snort_rules)
        }
        Command::Datalog { topology, flow_matrix, output } => {
            let system = load_information_system(&config, &topology, flow_matrix.as_deref())?;
            match output {
                Some(path) => {
                    system.write_mulval_datalog(&path)?;
                    info!("MulVAL input written to {}", path.display());
                }
                None => println!("{}", system.export_to_mulval_datalog()?),
            }
            Ok(())
        }
        Command::Reachability { attack_graph, evaluate } => reachability(&attack_graph, evaluate),
        Command::Alert { source, destination, cve } => {
            let alert = Alert { source: IpAddress::new(&source)?, destination: IpAddress::new(&destination)?, cve };
            println!("{}", remediations_for_alert_json(&alert, &config)?);
            Ok(())
        }
        Command::Benchmark { sizes, scoring_sizes, iterations, seed } => {
            benchmark(&sizes, &scoring_sizes, iterations, seed)
        }
    }
}

fn print_banner(title: &str) {
    println!("╔══════════════════════════════════════════════════════════════════╗");
    println!("║ {:<64} ║", title);
    println!("╚══════════════════════════════════════════════════════════════════╝");
    println!();
}

fn print_phase(number: usize, title: &str) {
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("PHASE {}: {}", number, title);
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!();
}

fn load_information_system(config: &Config, topology: &Path, flow_matrix: Option<&Path>) -> Result<InformationSystem> {
    let mut system = InformationSystem::load(topology, flow_matrix)?;
    system.topology = std::mem::take(&mut system.topology).with_max_hops(config.max_hops);
    Ok(system)
}

// ============================================================================
// Subcommands
// ============================================================================

fn score(config: &Config, attack_graph_path: &Path, output: &Path, topology: Option<&Path>) -> Result<()> {
    print_banner("Attack graph scoring");

    print_phase(1, "Loading the MulVAL attack graph");
    let mut attack_graph = AttackGraph::load(attack_graph_path)?;
    println!("  {} vertices, {} arcs", attack_graph.vertices.len(), attack_graph.arcs.len());
    if let Some(topology) = topology {
        let mut system = load_information_system(config, topology, None)?;
        attack_graph.load_metrics_from_topology(&mut system)?;
        println!("  impact metrics loaded from {}", topology.display());
    }
    println!();

    print_phase(2, "Scoring and attack paths");
    let attack_paths = attack_graph.score_attack_graph_and_get_attack_paths(output, config.previous_max_score)?;
    println!("  Global score: {:.4}", attack_graph.global_score);
    println!("  {} attack paths written to {}", attack_paths.len(), output.display());
    for (index, path) in attack_paths.iter().enumerate() {
        println!("  [{}] {:.4}  {}", index, path.scoring, path);
    }
    Ok(())
}

fn route(system: &InformationSystem, source: &str, destination: &str, port: u16, protocol: Protocol) -> Result<()> {
    let lookup = |name: &str| {
        system
            .existing_machine_by_name_or_ip_address(name)
            .ok_or_else(|| AttackGraphError::UnknownHost(name.to_string()))
    };
    let from = lookup(source)?;
    let to = lookup(destination)?;

    let route = system.route_between_hosts(from, to)?;
    let names: Vec<&str> = route.iter().map(|&host| system.machine_name(host)).collect();
    println!("Route: {}", names.join(" -> "));

    let addresses = (
        system.machine(from).and_then(|host| host.first_ip_address()),
        system.machine(to).and_then(|host| host.first_ip_address()),
    );
    let (Some(source_address), Some(destination_address)) = addresses else {
        return Err(AttackGraphError::NoInterface);
    };
    let passes = system.topology.send_a_packet_from_a_host_to_another_succeed(
        source_address,
        CLIENT_SOURCE_PORT,
        destination_address,
        port,
        protocol,
    )?;
    println!("Packet {} {} -> {}:{} {}", protocol, source_address, destination_address, port, if passes { "passes" } else { "is blocked" });

    let interfaces = (
        system.topology.get_interface_by_ip_address(source_address),
        system.topology.get_interface_by_ip_address(destination_address),
    );
    if let (Some(source_interface), Some(destination_interface)) = interfaces {
        let authorized =
            system.flow_matrix.access_authorized(source_interface, destination_interface, port, protocol, &system.topology);
        println!("Flow matrix: {}", if authorized { "authorized" } else { "not authorized" });
    }
    Ok(())
}

fn remediate(
    config: &Config,
    attack_graph_path: &Path,
    system: &mut InformationSystem,
    knowledge_base: &InMemoryKnowledgeBase,
    use_snort_rules: bool,
) -> Result<()> {
    print_banner("Remediation of the attack paths");

    let attack_graph = AttackGraph::load(attack_graph_path)?;
    let mut attack_paths = attack_graph.generate_attack_paths();
    sort_attack_paths(&mut attack_paths);

    let mut context = RemediationContext::new(knowledge_base, CostParameters::load(&config.cost_parameters_path)?);
    context.use_snort_rules = use_snort_rules;

    for (index, path) in attack_paths.iter().enumerate() {
        print_phase(index + 1, &format!("Attack path {} (scoring {:.4})", index, path.scoring));
        let remediations = deployable_remediations(path, system, &context)?;
        if remediations.is_empty() {
            println!("  no remediation found");
        }
        for remediation in &remediations {
            let actions: Vec<String> = remediation
                .actions
                .iter()
                .map(|deployable| format!("{} on {}", deployable.action().action_type(), system.machine_name(deployable.host())))
                .collect();
            let habit_index = remediation.habit_index(config, system)?;
            println!("  cost {:>10.2}  habit {:>3}  {}", remediation.cost, habit_index, actions.join(", "));
        }
        println!();
    }
    Ok(())
}

fn reachability(attack_graph_path: &Path, evaluate: bool) -> Result<()> {
    print_banner("Incremental compromise reachability");

    let attack_graph = AttackGraph::load(attack_graph_path)?;
    let facts = ReachabilityFacts::from_attack_graph(&attack_graph);

    print_phase(1, "Initial fixpoint");
    for host in compute_compromised_hosts(&facts) {
        println!("  + execCode({})", host);
    }
    println!();

    if evaluate {
        print_phase(2, "Removing each fact alone");
        let candidates: Vec<FactRemoval> = facts
            .hacls
            .iter()
            .cloned()
            .map(FactRemoval::Hacl)
            .chain(facts.vulnerabilities.iter().cloned().map(FactRemoval::Vulnerability))
            .collect();
        let (initial_time, impacts) = evaluate_remediations(&facts, &candidates);
        println!("  initial computation: {:?}", initial_time);
        for impact in impacts {
            println!(
                "  {:<60} {:>4} compromised  ({:?})",
                impact.removal.to_string(),
                impact.compromised_hosts.len(),
                impact.update_time
            );
        }
    }
    Ok(())
}

fn benchmark(sizes: &[usize], scoring_sizes: &[usize], iterations: usize, seed: u64) -> Result<()> {
    print_banner("Incremental reachability and scoring benchmarks");

    print_phase(1, "Chain networks");
    print_benchmark_table(&run_scalability_benchmark(sizes));
    println!();

    print_phase(2, "Star networks");
    let star_results: Vec<_> = sizes.iter().map(|&size| run_star_benchmark(size)).collect();
    print_benchmark_table(&star_results);
    println!();

    print_phase(3, "Random cuts of chain networks");
    let random_cut_results: Vec<_> = sizes
        .iter()
        .map(|&size| run_chain_random_cut_benchmark(size, iterations, seed))
        .collect();
    print_random_cut_benchmark_table(&random_cut_results);
    println!();

    print_phase(4, "Scoring of chain attack graphs");
    let scoring_results = scoring_sizes
        .iter()
        .map(|&size| run_scoring_benchmark(&generate_chain_network(size)))
        .collect::<Result<Vec<_>>>()?;
    print_scoring_benchmark_table(&scoring_results);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn benchmark_sizes_are_positive() {
        let cli = Cli::try_parse_from(["attack-graph", "benchmark", "--sizes", "5,20"]).unwrap();
        match cli.command {
            Command::Benchmark { sizes, .. } => assert_eq!(sizes, vec![5, 20]),
            _ => panic!("expected the benchmark command"),
        }

        assert!(Cli::try_parse_from(["attack-graph", "benchmark", "--sizes", "10,0"]).is_err());
        assert!(Cli::try_parse_from(["attack-graph", "benchmark", "--scoring-sizes", "0"]).is_err());
    }
}
