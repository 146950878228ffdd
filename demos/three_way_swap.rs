//! Three-way swap discovery and confirmation example.
//!
//! Ana wants a book, Ben wants a bike, Chloé wants a lamp. Nobody can swap
//! directly with anyone else, but the three of them together can.

use multiswap_engine::core::config::EngineConfig;
use multiswap_engine::core::item::{Item, Want};
use multiswap_engine::core::snapshot::MarketSnapshot;
use multiswap_engine::core::user::{UserId, UserProfile};
use multiswap_engine::engine::SwapEngine;
use multiswap_engine::graph::want_graph::OpportunityFilters;
use multiswap_engine::market::{InMemoryMarketplace, LogNotifier};
use rust_decimal_macros::dec;
use std::sync::Arc;

fn main() {
    println!("╔═══════════════════════════════════════════╗");
    println!("║  multiswap-engine: Three-Way Swap         ║");
    println!("╚═══════════════════════════════════════════╝\n");

    let mut snap = MarketSnapshot::new();
    snap.add_user(UserProfile::new("ana", 96, "Lyon", "ARA"));
    snap.add_user(UserProfile::new("ben", 88, "Lyon", "ARA"));
    snap.add_user(UserProfile::new("chloe", 91, "Grenoble", "ARA"));

    println!("Listings:");
    println!("  ana   offers a city bike   (€120), wants books");
    println!("  ben   offers a desk lamp   (€45),  wants bikes");
    println!("  chloe offers a novel set   (€60),  wants lamps\n");

    snap.add_item(Item::new("bike-1", "ana", "bikes", dec!(120), "Lyon").with_title("City bike"));
    snap.add_item(Item::new("lamp-1", "ben", "lamps", dec!(45), "Lyon").with_title("Desk lamp"));
    snap.add_item(
        Item::new("novels-1", "chloe", "books", dec!(60), "Grenoble").with_title("Novel set"),
    );
    snap.add_want(Want::new("ana", "books"));
    snap.add_want(Want::new("ben", "bikes"));
    snap.add_want(Want::new("chloe", "lamps"));

    let engine = match SwapEngine::new(
        EngineConfig::default(),
        Arc::new(InMemoryMarketplace::new(snap)),
        Arc::new(LogNotifier),
    ) {
        Ok(engine) => engine,
        Err(e) => {
            eprintln!("engine setup failed: {}", e);
            return;
        }
    };

    let ana = UserId::new("ana");
    let report = match engine.find_opportunities(&ana, &OpportunityFilters::default()) {
        Ok(report) => report,
        Err(e) => {
            eprintln!("search failed: {}", e);
            return;
        }
    };

    let Some(best) = report.opportunities.first() else {
        println!("No cycle found.");
        return;
    };

    println!("Best cycle ({}, score {:.3}):", best.tier, best.total_score);
    for node in &best.nodes {
        println!("  {:<6} gives {:<10} (€{})", node.user.to_string(), node.gives.id.to_string(), node.gives.value);
    }
    println!(
        "  trust {:.2} | value balance {:.2} | location {:.2} | category {:.2}",
        best.trust_score, best.value_balance_score, best.location_score, best.category_score
    );
    println!(
        "  value-balanced: {} (largest gap {:.0}%)\n",
        best.is_value_balanced,
        best.max_value_deviation * dec!(100)
    );

    let created = match engine.create_multi_swap(best, &ana) {
        Ok(created) => created,
        Err(e) => {
            eprintln!("could not commit: {}", e);
            return;
        }
    };
    println!("Swap {} created, confirm before {}\n", created.id, created.expires_at);

    for user in ["ana", "ben", "chloe"] {
        match engine.confirm(created.id, &UserId::new(user)) {
            Ok(outcome) => println!(
                "  {:<6} confirmed, {} remaining{}",
                user,
                outcome.remaining_count,
                if outcome.all_confirmed { " → all confirmed" } else { "" }
            ),
            Err(e) => println!("  {:<6} could not confirm: {}", user, e),
        }
    }

    if let Err(e) = engine.complete(created.id) {
        eprintln!("handoff failed: {}", e);
    }
    println!("\n{}", engine.stats());
}
