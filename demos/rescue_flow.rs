//! Rejection and rescue example.
//!
//! A four-user market holds two overlapping cycles. When one participant
//! walks away from the first swap, the engine voids it and immediately
//! finds the remaining participants another way through.

use multiswap_engine::core::clock::ManualClock;
use multiswap_engine::core::config::EngineConfig;
use multiswap_engine::core::item::{Item, Want};
use multiswap_engine::core::snapshot::MarketSnapshot;
use multiswap_engine::core::user::{UserId, UserProfile};
use multiswap_engine::engine::SwapEngine;
use multiswap_engine::graph::want_graph::OpportunityFilters;
use multiswap_engine::market::{InMemoryMarketplace, RecordingNotifier};
use multiswap_engine::multiswap::events::RejectionReason;
use chrono::{Duration, Utc};
use rust_decimal_macros::dec;
use std::sync::Arc;

fn market() -> MarketSnapshot {
    let mut snap = MarketSnapshot::new();
    for (user, trust) in [("ana", 95), ("ben", 90), ("chloe", 85), ("dev", 80)] {
        snap.add_user(UserProfile::new(user, trust, "Paris", "IDF"));
    }
    snap.add_item(Item::new("guitar", "ana", "guitars", dec!(150), "Paris"));
    snap.add_item(Item::new("console", "ben", "video-games", dec!(140), "Paris"));
    snap.add_item(Item::new("drill", "ben", "drills", dec!(130), "Paris"));
    snap.add_item(Item::new("vinyls", "chloe", "vinyl", dec!(160), "Paris"));
    snap.add_item(Item::new("amp", "dev", "vinyl", dec!(145), "Paris"));
    snap.add_want(Want::new("ana", "vinyl"));
    snap.add_want(Want::new("ben", "guitars"));
    snap.add_want(Want::new("chloe", "video-games"));
    snap.add_want(Want::new("dev", "drills"));
    snap
}

fn main() {
    println!("╔═══════════════════════════════════════════╗");
    println!("║  multiswap-engine: Rejection and Rescue   ║");
    println!("╚═══════════════════════════════════════════╝\n");

    let notifier = Arc::new(RecordingNotifier::new());
    let clock = Arc::new(ManualClock::new(Utc::now()));
    let engine = match SwapEngine::new(
        EngineConfig::default(),
        Arc::new(InMemoryMarketplace::new(market())),
        notifier.clone(),
    ) {
        Ok(engine) => engine.with_clock(clock.clone()),
        Err(e) => {
            eprintln!("engine setup failed: {}", e);
            return;
        }
    };

    let ana = UserId::new("ana");
    let found = engine
        .find_opportunities(&ana, &OpportunityFilters::default())
        .map(|r| r.opportunities)
        .unwrap_or_default();
    println!("ana sees {} cycles:", found.len());
    for opp in &found {
        println!("  {} [{} {:.3}]", opp.key, opp.tier, opp.total_score);
    }

    let Some(with_chloe) = found.iter().find(|o| o.contains_user(&"chloe".into())) else {
        println!("no cycle through chloe");
        return;
    };
    let swap = match engine.create_multi_swap(with_chloe, &ana) {
        Ok(swap) => swap,
        Err(e) => {
            eprintln!("could not commit: {}", e);
            return;
        }
    };
    println!("\nCommitted swap {} ({})", swap.id, with_chloe.key);

    clock.advance(Duration::hours(5));
    let _ = engine.confirm(swap.id, &ana);
    println!("ana confirmed; chloe declines.\n");

    match engine.reject(swap.id, &"chloe".into(), Some(RejectionReason::TooFar)) {
        Ok(response) => {
            println!("Orphaned: {:?}", response.affected_participants);
            for proposal in &response.alternatives {
                println!("  alternatives for {}:", proposal.user);
                if proposal.is_empty() {
                    println!("    (none)");
                }
                for opp in &proposal.opportunities {
                    println!("    {} [{} {:.3}]", opp.key, opp.tier, opp.total_score);
                }
            }
        }
        Err(e) => eprintln!("reject failed: {}", e),
    }

    println!("\nNotifications sent:");
    for (user, notification) in notifier.sent() {
        println!("  {:<6} {:?}", user.to_string(), notification);
    }
    println!("\n{}", engine.stats());
}
