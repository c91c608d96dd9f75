//! Scenario runner
//!
//! Drives the seed scenarios end-to-end over in-memory transports. A
//! demonstration harness, not a substitute for the crates' own test suites.

use rcrdt::scenarios::{self, ScenarioResult};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let rt = tokio::runtime::Runtime::new().unwrap();
    let args: Vec<String> = std::env::args().collect();

    let all_passed = if args.len() > 1 {
        match args[1].as_str() {
            "all" => rt.block_on(run_all()),
            "convergence" => rt.block_on(run_convergence()),
            "consistency" => rt.block_on(run_consistency()),
            "pruning" => rt.block_on(run_pruning()),
            "help" | "--help" | "-h" => {
                print_usage();
                true
            }
            other => {
                println!("Unknown scenario group: {other}");
                print_usage();
                false
            }
        }
    } else {
        rt.block_on(run_all())
    };

    if !all_passed {
        std::process::exit(1);
    }
}

fn print_usage() {
    println!("╔════════════════════════════════════════════════════════════╗");
    println!("║            REPLICATION ENGINE SCENARIO RUNNER               ║");
    println!("╚════════════════════════════════════════════════════════════╝");
    println!();
    println!("Usage: cargo run [scenario_group]");
    println!();
    println!("Available groups:");
    println!("  all          - Run every seed scenario (default)");
    println!("  convergence  - S1, S2: local round trip and gossip convergence");
    println!("  consistency  - S3, S4, S5: type safety, read-repair, delete finality");
    println!("  pruning      - S6: full removed-node pruning lifecycle");
    println!("  help         - Show this help message");
}

fn print_group(title: &str, results: &[ScenarioResult]) {
    println!("\n── {title} ──");
    for result in results {
        result.print();
    }
}

async fn run_convergence() -> bool {
    let results = vec![scenarios::s1_local_round_trip().await, scenarios::s2_two_node_convergence().await];
    print_group("Convergence", &results);
    summarize(&results)
}

async fn run_consistency() -> bool {
    let results = vec![
        scenarios::s3_conflicting_type_rejected().await,
        scenarios::s4_read_repair().await,
        scenarios::s5_delete_finality().await,
    ];
    print_group("Consistency", &results);
    summarize(&results)
}

async fn run_pruning() -> bool {
    let results = vec![scenarios::s6_pruning_lifecycle().await];
    print_group("Pruning", &results);
    summarize(&results)
}

async fn run_all() -> bool {
    println!("\n╔════════════════════════════════════════════════════════════╗");
    println!("║            REPLICATION ENGINE SCENARIO RUNNER               ║");
    println!("╚════════════════════════════════════════════════════════════╝");

    let mut all = Vec::new();
    all.push(scenarios::s1_local_round_trip().await);
    all.push(scenarios::s2_two_node_convergence().await);
    print_group("Convergence (S1-S2)", &all[all.len() - 2..]);

    let before = all.len();
    all.push(scenarios::s3_conflicting_type_rejected().await);
    all.push(scenarios::s4_read_repair().await);
    all.push(scenarios::s5_delete_finality().await);
    print_group("Consistency (S3-S5)", &all[before..]);

    let before = all.len();
    all.push(scenarios::s6_pruning_lifecycle().await);
    print_group("Pruning (S6)", &all[before..]);

    summarize(&all)
}

fn summarize(results: &[ScenarioResult]) -> bool {
    let passed = results.iter().filter(|r| r.passed).count();
    println!("\n{passed}/{} scenarios passed", results.len());
    passed == results.len()
}
