//! multiswap-engine CLI
//!
//! Find multi-party swap cycles in a market snapshot from the command line.
//!
//! # Usage
//!
//! ```bash
//! # Opportunities for one user
//! multiswap-engine opportunities --input market.json --user user-0007
//!
//! # Only value-balanced cycles, as JSON
//! multiswap-engine opportunities --input market.json --user user-0007 --balanced-only --format json
//!
//! # Generate a random market for testing
//! multiswap-engine generate --users 50 --items-per-user 2 --seed 7
//! ```

use multiswap_engine::core::category::Category;
use multiswap_engine::core::config::EngineConfig;
use multiswap_engine::core::snapshot::MarketSnapshot;
use multiswap_engine::core::user::UserId;
use multiswap_engine::engine::SwapEngine;
use multiswap_engine::graph::want_graph::OpportunityFilters;
use multiswap_engine::market::{InMemoryMarketplace, LogNotifier};
use multiswap_engine::simulation::market_gen::{generate_random_market, MarketConfig};
use std::fs;
use std::process;
use std::sync::Arc;

fn print_usage() {
    eprintln!(
        r#"multiswap-engine — multi-party barter cycle matching

USAGE:
    multiswap-engine <COMMAND> [OPTIONS]

COMMANDS:
    opportunities   List scored swap cycles for one user
    generate        Generate a random market snapshot (for testing)
    help            Show this message

OPTIONS (opportunities):
    --input <FILE>      Path to JSON market snapshot
    --user <ID>         Requesting user
    --config <FILE>     JSON engine configuration (defaults otherwise)
    --category <NAME>   Only cycles where the user receives this category
    --min-trust <N>     Leave out users below this trust score
    --max-length <N>    Longest cycle to consider
    --balanced-only     Only cycles with comparable item values
    --format <FORMAT>   Output format: text (default) or json

OPTIONS (generate):
    --users <N>           Number of users (default: 50)
    --items-per-user <N>  Items listed per user (default: 2)
    --wants-per-user <N>  Wants declared per user (default: 2)
    --seed <N>            RNG seed (default: 42)
    --output <FILE>       Write to file instead of stdout

Set RUST_LOG=debug for search diagnostics.

EXAMPLES:
    multiswap-engine opportunities --input market.json --user user-0003
    multiswap-engine opportunities --input market.json --user user-0003 --max-length 3 --format json
    multiswap-engine generate --users 200 --seed 7 --output market.json"#
    );
}

fn fail(message: impl std::fmt::Display) -> ! {
    eprintln!("{}", message);
    process::exit(1);
}

fn next_value(args: &[String], i: usize, flag: &str, what: &str) -> String {
    args.get(i)
        .cloned()
        .unwrap_or_else(|| fail(format!("{} requires {}", flag, what)))
}

fn next_number<T: std::str::FromStr>(args: &[String], i: usize, flag: &str) -> T {
    args.get(i)
        .and_then(|s| s.parse().ok())
        .unwrap_or_else(|| fail(format!("{} requires a number", flag)))
}

fn load_snapshot(path: &str) -> MarketSnapshot {
    let content = fs::read_to_string(path)
        .unwrap_or_else(|e| fail(format!("Error reading file '{}': {}", path, e)));

    MarketSnapshot::from_json_str(&content).unwrap_or_else(|e| {
        eprintln!("Error parsing JSON: {}", e);
        eprintln!("Expected format:");
        eprintln!(
            r#"{{
  "users": [ {{ "id": "ana", "trust_score": 92, "city": "Lyon", "region": "ARA" }} ],
  "items": [ {{ "id": "bike-1", "owner": "ana", "category": "bikes", "value": "120", "city": "Lyon" }} ],
  "wants": [ {{ "user": "ana", "category": "books" }} ],
  "taxonomy": [ {{ "name": "novels", "parent": "books" }} ]
}}"#
        );
        process::exit(1);
    })
}

fn cmd_opportunities(args: &[String]) {
    let mut input_path = None;
    let mut user = None;
    let mut config_path = None;
    let mut filters = OpportunityFilters::default();
    let mut format = "text".to_string();
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--input" => {
                i += 1;
                input_path = Some(next_value(args, i, "--input", "a file path"));
            }
            "--user" => {
                i += 1;
                user = Some(next_value(args, i, "--user", "a user id"));
            }
            "--config" => {
                i += 1;
                config_path = Some(next_value(args, i, "--config", "a file path"));
            }
            "--category" => {
                i += 1;
                filters.category = Some(Category::new(next_value(
                    args,
                    i,
                    "--category",
                    "a category name",
                )));
            }
            "--min-trust" => {
                i += 1;
                filters.min_trust_score = Some(next_number(args, i, "--min-trust"));
            }
            "--max-length" => {
                i += 1;
                filters.max_cycle_length = Some(next_number(args, i, "--max-length"));
            }
            "--balanced-only" => filters.balanced_only = true,
            "--format" => {
                i += 1;
                format = next_value(args, i, "--format", "'text' or 'json'");
            }
            _ => fail(format!("Unknown option: {}", args[i])),
        }
        i += 1;
    }

    let path = input_path.unwrap_or_else(|| fail("Error: --input <FILE> is required"));
    let user = UserId::new(user.unwrap_or_else(|| fail("Error: --user <ID> is required")));
    let config = match config_path {
        Some(p) => EngineConfig::from_json_file(&p).unwrap_or_else(|e| fail(e)),
        None => EngineConfig::default(),
    };

    let market = Arc::new(InMemoryMarketplace::new(load_snapshot(&path)));
    let engine = SwapEngine::new(config, market, Arc::new(LogNotifier)).unwrap_or_else(|e| fail(e));
    let report = engine
        .find_opportunities(&user, &filters)
        .unwrap_or_else(|e| fail(format!("Error: {}", e)));

    if format == "json" {
        let json = serde_json::to_string_pretty(&report)
            .unwrap_or_else(|e| fail(format!("Error encoding JSON: {}", e)));
        println!("{}", json);
        return;
    }

    if report.opportunities.is_empty() {
        println!("No swap cycles found for {}.", user);
        return;
    }
    for (i, opp) in report.opportunities.iter().enumerate() {
        println!(
            "#{} [{}] score {:.3} ({}-way{})",
            i + 1,
            opp.tier,
            opp.total_score,
            opp.len(),
            if opp.is_value_balanced { ", balanced" } else { "" }
        );
        for node in &opp.nodes {
            println!(
                "    {:<12} gives {:<20} ({} {}, {})",
                node.user.to_string(),
                node.gives.id.to_string(),
                node.gives.category,
                node.gives.value,
                node.city
            );
        }
        println!(
            "    trust {:.2}  balance {:.2}  location {:.2}  category {:.2}",
            opp.trust_score, opp.value_balance_score, opp.location_score, opp.category_score
        );
    }
    println!();
    print!("{}", report.stats);
    if report.truncated {
        println!("(search budget exhausted; results may be incomplete)");
    }
}

fn cmd_generate(args: &[String]) {
    let mut config = MarketConfig::default();
    let mut output_path: Option<String> = None;
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--users" => {
                i += 1;
                config.user_count = next_number(args, i, "--users");
            }
            "--items-per-user" => {
                i += 1;
                config.items_per_user = next_number(args, i, "--items-per-user");
            }
            "--wants-per-user" => {
                i += 1;
                config.wants_per_user = next_number(args, i, "--wants-per-user");
            }
            "--seed" => {
                i += 1;
                config.seed = next_number(args, i, "--seed");
            }
            "--output" => {
                i += 1;
                output_path = Some(next_value(args, i, "--output", "a file path"));
            }
            _ => fail(format!("Unknown option: {}", args[i])),
        }
        i += 1;
    }

    let snap = generate_random_market(&config);
    let json = serde_json::to_string_pretty(&snap)
        .unwrap_or_else(|e| fail(format!("Error encoding JSON: {}", e)));

    if let Some(path) = output_path {
        fs::write(&path, &json)
            .unwrap_or_else(|e| fail(format!("Error writing to '{}': {}", path, e)));
        eprintln!(
            "Generated {} users, {} items, {} wants → {}",
            snap.users().len(),
            snap.items().len(),
            snap.wants().len(),
            path
        );
    } else {
        println!("{}", json);
    }
}

fn main() {
    env_logger::init();
    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        print_usage();
        process::exit(1);
    }

    let command = args[1].as_str();
    let rest = &args[2..];

    match command {
        "opportunities" => cmd_opportunities(rest),
        "generate" => cmd_generate(rest),
        "help" | "--help" | "-h" => print_usage(),
        _ => {
            eprintln!("Unknown command: {}", command);
            print_usage();
            process::exit(1);
        }
    }
}
