// Benchmark runner: incremental reachability against full recomputation
// Run with: cargo run --release --example run_benchmarks

use attack_graph_remediation::benchmarks::{
    generate_chain_network, generate_random_network, print_benchmark_table, print_random_cut_benchmark_table,
    print_scoring_benchmark_table, run_chain_benchmark, run_chain_random_cut_benchmark, run_mesh_benchmark,
    run_scoring_benchmark, run_star_benchmark, BenchmarkResults,
};

const SEED: u64 = 42;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    println!("==========================================================");
    println!("  Attack Graph Remediation: Scalability Benchmark");
    println!("  Measuring incremental vs full recomputation");
    println!("==========================================================");
    println!();

    // PART 1: Star network (two iterations whatever the size)
    println!("PART 1: Star Network Benchmarks (O(1) iteration depth)");
    println!("--------------------------------------------------------");
    let star_sizes = [50, 100, 200, 500, 1000];
    let mut star_results = Vec::new();
    for (index, &number_of_leaves) in star_sizes.iter().enumerate() {
        println!("[{}/{}] Testing star with {} leaves...", index + 1, star_sizes.len(), number_of_leaves);
        let result = run_star_benchmark(number_of_leaves);
        result.print_summary();
        star_results.push(result);
    }

    // PART 2: Chain network (one iteration per node)
    println!();
    println!("PART 2: Chain Network Benchmarks (O(N) iteration depth)");
    println!("--------------------------------------------------------");
    let chain_sizes = [10, 50, 100, 200];
    let mut chain_results = Vec::new();
    for (index, &number_of_nodes) in chain_sizes.iter().enumerate() {
        println!("[{}/{}] Testing chain with {} nodes...", index + 1, chain_sizes.len(), number_of_nodes);
        let result = run_chain_benchmark(number_of_nodes);
        result.print_summary();
        chain_results.push(result);
    }

    // PART 3: Mesh network, cut at the attacker's corner
    println!();
    println!("PART 3: Mesh Network Benchmarks");
    println!("-------------------------------");
    let mesh_sides = [5, 10, 20];
    let mut mesh_results = Vec::new();
    for &side in &mesh_sides {
        println!("Testing {}x{} mesh...", side, side);
        let result = run_mesh_benchmark(side, side);
        result.print_summary();
        mesh_results.push(result);
    }

    println!();
    println!("==========================================================");
    println!("  RESULTS TABLES");
    println!("==========================================================");
    println!();
    println!("--- Star Network ---");
    print_benchmark_table(&star_results);
    println!();
    println!("--- Chain Network ---");
    print_benchmark_table(&chain_results);
    println!();
    println!("--- Mesh Network ---");
    print_benchmark_table(&mesh_results);

    // PART 4: Random cuts, the speedup depends on where the chain is cut
    println!();
    println!("PART 4: Chain Network Random Cut Benchmark");
    println!("-------------------------------------------");
    let iterations = 100;
    let random_cut_results: Vec<_> = [50, 100, 200]
        .iter()
        .map(|&number_of_nodes| {
            println!("Random cuts on chain with {} nodes ({} iterations)...", number_of_nodes, iterations);
            run_chain_random_cut_benchmark(number_of_nodes, iterations, SEED)
        })
        .collect();
    print_random_cut_benchmark_table(&random_cut_results);

    // PART 5: Scoring of the equivalent MulVAL graphs
    println!();
    println!("PART 5: Attack Graph Scoring");
    println!("----------------------------");
    let mut scoring_results = Vec::new();
    for facts in [generate_chain_network(10), generate_chain_network(50), generate_random_network(30, 0.1, SEED)] {
        match run_scoring_benchmark(&facts) {
            Ok(result) => scoring_results.push(result),
            Err(error) => eprintln!("Scoring benchmark failed: {}", error),
        }
    }
    print_scoring_benchmark_table(&scoring_results);

    println!();
    println!("--- LaTeX format (Star) ---");
    print_latex_table(&star_results);
}

fn print_latex_table(results: &[BenchmarkResults]) {
    println!("\\begin{{tabular}}{{|r|r|r|r|}}");
    println!("\\hline");
    println!("Nodes & Initial (ms) & Incremental ($\\mu$s) & Speedup \\\\");
    println!("\\hline");
    for r in results {
        let initial_ms = r.initial_computation_time.as_secs_f64() * 1000.0;
        let incremental_us = r.incremental_update_time.as_secs_f64() * 1_000_000.0;
        println!("{} & {:.2} & {:.2} & {:.1}x \\\\", r.number_of_nodes, initial_ms, incremental_us, r.speedup_factor);
    }
    println!("\\hline");
    println!("\\end{{tabular}}");
}
