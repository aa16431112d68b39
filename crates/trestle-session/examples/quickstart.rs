//! Quick Start Example
//!
//! Drives one transfer session against the simulated engine: type an
//! amount, review the quote, accept, and watch the step checklist settle.

use std::sync::Arc;

use tokio_stream::StreamExt;
use trestle_engine::sim::SimulatedEngine;
use trestle_session::prelude::*;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let engine = Arc::new(SimulatedEngine::builder().fee_bps(50).build());
    let config = SessionConfig::new(
        FlowKind::Transfer,
        Network::Mainnet,
        "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa".parse()?,
    )
    .on_complete(|amount| {
        if let Some(amount) = amount {
            println!("✅ Delivered {amount} on the destination chain");
        }
    });

    let session = Session::spawn(engine, config);

    // 1. Type an amount; the debounce window coalesces the keystrokes.
    session.set_amount("1");
    session.set_amount("10");

    // 2. Wait for the engine's quote.
    let quoted = session.wait_for(|s| s.phase == Phase::Proposed).await?;
    let route = quoted.route.expect("proposed phase carries a route");
    println!(
        "💱 Quoted: send {} {} -> receive {} {} (fees {})",
        quoted.inputs.amount().unwrap_or("?"),
        route.sources[0].token,
        route.destination.amount,
        route.destination.token,
        route.fees.total,
    );

    // 3. Accept and watch the checklist.
    session.accept();
    let mut snapshots = session.snapshots();
    while let Some(snapshot) = snapshots.next().await {
        for step in &snapshot.steps {
            let mark = if step.completed { "✔" } else { " " };
            println!("  [{mark}] {}", step.raw.label);
        }
        if snapshot.phase == Phase::Completed {
            println!(
                "🎉 Done in {:.1}s — {}",
                snapshot.elapsed.as_secs_f64(),
                snapshot.explorer_url.as_deref().unwrap_or("(no explorer url)"),
            );
            break;
        }
        if let Some(error) = &snapshot.error {
            println!("❌ Failed: {error}");
            break;
        }
    }

    Ok(())
}
