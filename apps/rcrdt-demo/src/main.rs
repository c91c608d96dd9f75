//! # rcrdt demo
//!
//! A standalone CLI demo of the replication engine's PN-Counter over a
//! handful of simulated nodes. Each node owns its own `LocalStore` and
//! mutates a counter locally; "sync" applies the uniform incoming-write
//! rule directly, the same absorption path the engine uses for gossip and
//! write replication.

use std::collections::{BTreeSet, HashMap};
use std::io::{self, Write};

use clap::{Parser, Subcommand};
use colored::*;
use rcrdt_core::value::CrdtValue;
use rcrdt_core::{NodeId, PnCounter};
use rcrdt_engine::pipeline::incoming::apply_incoming;
use rcrdt_envelope::Envelope;
use rcrdt_store::LocalStore;

#[derive(Parser)]
#[command(name = "rcrdt-demo")]
#[command(about = "CRDT-based distributed counter demo (replication engine)")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Basic demo: two nodes increment, sync, and converge
    Demo,
    /// Conflict scenario: concurrent updates across 3 nodes, merge-order independence
    Conflict,
    /// Network partition simulation: split, independent work, heal, full convergence
    Partition,
    /// Interactive REPL for manual experimentation
    Interactive,
}

/// A simulated node: its own `NodeId` and `LocalStore`.
struct Replica {
    id: String,
    node: NodeId,
    store: LocalStore,
}

impl Replica {
    fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            node: NodeId::new(id, 1),
            store: LocalStore::new(),
        }
    }

    fn counter(&self, name: &str) -> PnCounter {
        match self.store.get(name) {
            Some(entry) => match entry.envelope.data {
                CrdtValue::PnCounter(c) => c,
                _ => PnCounter::new(),
            },
            None => PnCounter::new(),
        }
    }

    fn increment(&self, name: &str, amount: u64) {
        let mut c = self.counter(name);
        c.increment(&self.node, amount);
        self.store.set(name.to_string(), Envelope::new(CrdtValue::PnCounter(c)));
    }

    fn decrement(&self, name: &str, amount: u64) {
        let mut c = self.counter(name);
        c.decrement(&self.node, amount);
        self.store.set(name.to_string(), Envelope::new(CrdtValue::PnCounter(c)));
    }

    fn value(&self, name: &str) -> i64 {
        self.counter(name).value()
    }

    fn counter_names(&self) -> Vec<String> {
        let mut names = self.store.list_live_keys();
        names.sort();
        names
    }

    /// Apply the uniform incoming-write rule for every key `other` holds.
    fn sync_from(&self, other: &Replica) {
        for key in other.store.list_live_keys() {
            let Some(entry) = other.store.get(&key) else { continue };
            let local = self.store.get(&key);
            if let Some(merged) = apply_incoming(local.as_ref(), entry.envelope, &self.node, &BTreeSet::new()) {
                self.store.set(key, merged);
            }
        }
    }
}

// ─── Pretty printing ──────────────────────────────────────────────────────

fn header(text: &str) {
    let bar = "═".repeat(60);
    println!("\n{}", bar.bright_cyan());
    println!("  {}", text.bold().bright_white());
    println!("{}", bar.bright_cyan());
}

fn section(text: &str) {
    println!("\n{} {}", "▸".bright_yellow(), text.bold());
}

fn step(text: &str) {
    println!("  {} {}", "•".bright_green(), text);
}

fn sync_arrow(from: &str, to: &str) {
    println!(
        "  {} {} {} {}",
        from.bright_magenta(),
        "──sync──▶".bright_cyan(),
        to.bright_magenta(),
        "✓".bright_green()
    );
}

fn show_replica(replica: &Replica) {
    let border = "─".repeat(44);
    println!("  ┌{}┐", border);
    println!(
        "  │ {:^42} │",
        format!("Node: {}", replica.id).bright_yellow().to_string()
    );
    println!("  ├{}┤", border);

    let names = replica.counter_names();
    if names.is_empty() {
        println!("  │ {:^42} │", "(no counters)".dimmed().to_string());
    } else {
        for name in &names {
            let line = format!("  {:<16} = {:>5}", name, replica.value(name));
            println!("  │ {:<42} │", line);
        }
    }
    println!("  └{}┘", border);
}

fn convergence_check(replicas: &[&Replica]) -> bool {
    if replicas.len() < 2 {
        return true;
    }
    let base = &replicas[0];
    for r in &replicas[1..] {
        let mut names = base.counter_names();
        for n in r.counter_names() {
            if !names.contains(&n) {
                names.push(n);
            }
        }
        for name in &names {
            if base.value(name) != r.value(name) {
                return false;
            }
        }
    }
    true
}

fn convergence_result(converged: bool) {
    if converged {
        println!(
            "\n  {} {}",
            "✓".bright_green().bold(),
            "ALL NODES CONVERGED — values are identical!".bright_green().bold()
        );
    } else {
        println!(
            "\n  {} {}",
            "✗".bright_red().bold(),
            "DIVERGENCE DETECTED — nodes differ!".bright_red().bold()
        );
    }
}

// ─── Demo ──────────────────────────────────────────────────────────────────

fn run_demo() {
    header("DEMO — Basic Counter Tracking & CRDT Sync");

    section("Phase 1: Two nodes increment independently");
    let alice = Replica::new("alice");
    let bob = Replica::new("bob");

    alice.increment("page_views", 5);
    step("alice: page_views += 5");
    alice.increment("page_views", 3);
    step("alice: page_views += 3  (total contribution: 8)");

    bob.increment("page_views", 10);
    step("bob:   page_views += 10");
    bob.increment("likes", 2);
    step("bob:   likes += 2");

    show_replica(&alice);
    show_replica(&bob);

    section("Phase 2: Bidirectional sync via CRDT merge");
    alice.sync_from(&bob);
    sync_arrow("bob", "alice");
    bob.sync_from(&alice);
    sync_arrow("alice", "bob");

    section("Phase 3: Post-sync state");
    show_replica(&alice);
    show_replica(&bob);

    let ok = convergence_check(&[&alice, &bob]);
    convergence_result(ok);

    section("Final values");
    step(&format!("page_views = {} (alice:8 + bob:10)", alice.value("page_views")));
    step(&format!("likes = {} (bob:2)", alice.value("likes")));
}

// ─── Conflict ──────────────────────────────────────────────────────────────

fn run_conflict() {
    header("CONFLICT — Concurrent Updates, Merge-Order Independence");

    section("Phase 1: Three nodes make concurrent edits to the same counters");
    let r1 = Replica::new("node-1");
    let r2 = Replica::new("node-2");
    let r3 = Replica::new("node-3");

    r1.increment("score", 100);
    r1.decrement("score", 10);
    step("node-1: score += 100, score -= 10");

    r2.increment("score", 50);
    r2.increment("bonus", 25);
    step("node-2: score += 50, bonus += 25");

    r3.increment("score", 75);
    r3.decrement("score", 5);
    r3.increment("bonus", 10);
    step("node-3: score += 75, score -= 5, bonus += 10");

    section("Pre-sync (diverged)");
    show_replica(&r1);
    show_replica(&r2);
    show_replica(&r3);

    section("Phase 2: Merge in 3 different orders to prove commutativity");

    let order_a = Replica::new("order-A");
    order_a.sync_from(&r1);
    order_a.sync_from(&r2);
    order_a.sync_from(&r3);
    step(&format!(
        "Order A (r1→r2→r3): score={}, bonus={}",
        order_a.value("score"),
        order_a.value("bonus")
    ));

    let order_b = Replica::new("order-B");
    order_b.sync_from(&r3);
    order_b.sync_from(&r1);
    order_b.sync_from(&r2);
    step(&format!(
        "Order B (r3→r1→r2): score={}, bonus={}",
        order_b.value("score"),
        order_b.value("bonus")
    ));

    let order_c = Replica::new("order-C");
    order_c.sync_from(&r2);
    order_c.sync_from(&r3);
    order_c.sync_from(&r1);
    step(&format!(
        "Order C (r2→r3→r1): score={}, bonus={}",
        order_c.value("score"),
        order_c.value("bonus")
    ));

    let ok = convergence_check(&[&order_a, &order_b, &order_c]);
    section("Merge-order independence");
    convergence_result(ok);
    step(&format!("score = {} (100+50+75 − 10−5 = 210)", order_a.value("score")));
    step(&format!("bonus = {} (25+10 = 35)", order_a.value("bonus")));

    section("Phase 3: Idempotence — merging the same state twice");
    let before = order_a.value("score");
    order_a.sync_from(&r1);
    order_a.sync_from(&r1);
    let after = order_a.value("score");
    if before == after {
        step(&format!("Idempotent ✓  score stayed {} after duplicate merges", after));
    } else {
        step(&format!("IDEMPOTENCE FAILURE: {} → {} ✗", before, after));
    }
}

// ─── Partition ─────────────────────────────────────────────────────────────

fn run_partition() {
    header("PARTITION — Network Split, Independent Work, Heal & Converge");

    section("Phase 1: Create 4 nodes in 2 data-centers, establish shared baseline");
    let east1 = Replica::new("east-1");
    let east2 = Replica::new("east-2");
    let west1 = Replica::new("west-1");
    let west2 = Replica::new("west-2");

    east1.increment("requests", 100);
    east2.sync_from(&east1);
    west1.sync_from(&east1);
    west2.sync_from(&east1);
    step("Baseline: requests = 100, synced to all 4 nodes");

    section("Phase 2: NETWORK PARTITION");
    println!("  {}   {}", "╔══════════════════╗".bright_blue(), "╔══════════════════╗".bright_red());
    println!("  {}   {}", "║  EAST DC         ║".bright_blue(), "║  WEST DC         ║".bright_red());
    println!("  {}   {}", "║  east-1, east-2  ║".bright_blue(), "║  west-1, west-2  ║".bright_red());
    println!("  {}   {}", "╚══════════════════╝".bright_blue(), "╚══════════════════╝".bright_red());
    println!("  {}", "         ╳╳╳ PARTITION ╳╳╳".bright_red().bold());

    east1.increment("requests", 50);
    east1.increment("errors", 3);
    east2.increment("requests", 30);
    east2.decrement("errors", 1);
    east1.sync_from(&east2);
    east2.sync_from(&east1);
    step("East: east-1 +50 req, +3 err; east-2 +30 req, −1 err correction");
    step("East internal sync complete");

    west1.increment("requests", 200);
    west1.increment("latency_spikes", 7);
    west2.increment("requests", 150);
    west2.increment("latency_spikes", 3);
    west1.sync_from(&west2);
    west2.sync_from(&west1);
    step("West: west-1 +200 req, +7 spikes; west-2 +150 req, +3 spikes");
    step("West internal sync complete");

    section("Pre-heal state");
    show_replica(&east1);
    show_replica(&west1);

    section("Phase 3: PARTITION HEALS");
    println!("  {}", "         ════ HEALED ════".bright_green().bold());

    for r in [&east2, &west1, &west2] {
        r.sync_from(&east1);
    }
    for r in [&east1, &east2, &west2] {
        r.sync_from(&west1);
    }
    sync_arrow("east", "west");
    sync_arrow("west", "east");
    step("Full mesh sync across all 4 nodes");

    section("Phase 4: Post-heal state");
    show_replica(&east1);
    show_replica(&west1);

    let ok = convergence_check(&[&east1, &east2, &west1, &west2]);
    convergence_result(ok);

    step(&format!("requests       = {} (100+50+30+200+150 = 530)", east1.value("requests")));
    step(&format!("errors         = {} (3−1 = 2)", east1.value("errors")));
    step(&format!("latency_spikes = {} (7+3 = 10)", east1.value("latency_spikes")));
}

// ─── Interactive REPL ──────────────────────────────────────────────────────

fn run_interactive() {
    header("INTERACTIVE REPL — Replication Engine Counter Demo");

    let mut replicas: HashMap<String, Replica> = HashMap::new();

    println!();
    println!("  {}", "Commands:".bold().underline());
    println!("    {} <name>                   Create a new node", "node".bright_cyan());
    println!("    {} <node> <counter> [n]      Increment counter by n (default 1)", "inc".bright_cyan());
    println!("    {} <node> <counter> [n]      Decrement counter by n (default 1)", "dec".bright_cyan());
    println!("    {} <from> <to>              Merge from → to", "sync".bright_cyan());
    println!("    {} <name>                  Show node state", "show".bright_cyan());
    println!("    {}                          Show all nodes", "list".bright_cyan());
    println!("    {} <n1> <n2>               Check convergence between two nodes", "check".bright_cyan());
    println!("    {}                          Exit", "quit".bright_cyan());
    println!();

    loop {
        print!("{}", "rcrdt> ".bright_cyan().bold());
        io::stdout().flush().unwrap();

        let mut input = String::new();
        if io::stdin().read_line(&mut input).is_err() || input.is_empty() {
            break;
        }
        let parts: Vec<&str> = input.trim().split_whitespace().collect();
        if parts.is_empty() {
            continue;
        }

        match parts[0] {
            "node" | "n" => {
                if parts.len() < 2 {
                    println!("  {} Usage: node <name>", "!".bright_red());
                    continue;
                }
                let name = parts[1];
                if replicas.contains_key(name) {
                    println!("  {} Node '{}' already exists", "!".bright_yellow(), name);
                } else {
                    replicas.insert(name.to_string(), Replica::new(name));
                    step(&format!("Created node '{}'", name));
                }
            }

            "inc" | "+" => {
                if parts.len() < 3 {
                    println!("  {} Usage: inc <node> <counter> [amount]", "!".bright_red());
                    continue;
                }
                let amount: u64 = parts.get(3).and_then(|s| s.parse().ok()).unwrap_or(1);
                if let Some(replica) = replicas.get(parts[1]) {
                    replica.increment(parts[2], amount);
                    step(&format!("{}.{} += {} → {}", parts[1], parts[2], amount, replica.value(parts[2])));
                } else {
                    println!("  {} Unknown node '{}'", "!".bright_red(), parts[1]);
                }
            }

            "dec" | "-" => {
                if parts.len() < 3 {
                    println!("  {} Usage: dec <node> <counter> [amount]", "!".bright_red());
                    continue;
                }
                let amount: u64 = parts.get(3).and_then(|s| s.parse().ok()).unwrap_or(1);
                if let Some(replica) = replicas.get(parts[1]) {
                    replica.decrement(parts[2], amount);
                    step(&format!("{}.{} -= {} → {}", parts[1], parts[2], amount, replica.value(parts[2])));
                } else {
                    println!("  {} Unknown node '{}'", "!".bright_red(), parts[1]);
                }
            }

            "sync" => {
                if parts.len() < 3 {
                    println!("  {} Usage: sync <from> <to>", "!".bright_red());
                    continue;
                }
                let (from, to) = (parts[1], parts[2]);
                if !replicas.contains_key(from) || !replicas.contains_key(to) {
                    println!("  {} Unknown node", "!".bright_red());
                    continue;
                }
                // Borrow split: clone keys instead of holding both refs at once.
                let from_keys = replicas[from].store.list_live_keys();
                for key in from_keys {
                    if let Some(entry) = replicas[from].store.get(&key) {
                        let to_node = &replicas[to];
                        let local = to_node.store.get(&key);
                        if let Some(merged) =
                            apply_incoming(local.as_ref(), entry.envelope, &to_node.node, &BTreeSet::new())
                        {
                            to_node.store.set(key, merged);
                        }
                    }
                }
                sync_arrow(from, to);
            }

            "show" | "s" => {
                if parts.len() < 2 {
                    println!("  {} Usage: show <name>", "!".bright_red());
                    continue;
                }
                if let Some(replica) = replicas.get(parts[1]) {
                    show_replica(replica);
                } else {
                    println!("  {} Unknown node '{}'", "!".bright_red(), parts[1]);
                }
            }

            "list" | "ls" => {
                if replicas.is_empty() {
                    println!("  {}", "(no nodes)".dimmed());
                } else {
                    let mut names: Vec<_> = replicas.keys().collect();
                    names.sort();
                    for name in names {
                        show_replica(&replicas[name]);
                    }
                }
            }

            "check" => {
                if parts.len() < 3 {
                    println!("  {} Usage: check <n1> <n2>", "!".bright_red());
                    continue;
                }
                let (n1, n2) = (parts[1], parts[2]);
                match (replicas.get(n1), replicas.get(n2)) {
                    (Some(r1), Some(r2)) => {
                        let ok = convergence_check(&[r1, r2]);
                        convergence_result(ok);
                    }
                    _ => println!("  {} One or both nodes not found", "!".bright_red()),
                }
            }

            "quit" | "exit" | "q" => {
                println!("  {}", "Goodbye!".dimmed());
                break;
            }

            "help" | "h" | "?" => {
                println!("  node <name> | inc <n> <c> [amt] | dec <n> <c> [amt]");
                println!("  sync <from> <to> | show <n> | list | check <n1> <n2> | quit");
            }

            other => {
                println!("  {} Unknown command '{}' — type 'help'", "?".bright_yellow(), other);
            }
        }
    }
}

// ─── Entry point ───────────────────────────────────────────────────────────

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Demo => run_demo(),
        Commands::Conflict => run_conflict(),
        Commands::Partition => run_partition(),
        Commands::Interactive => run_interactive(),
    }
}
