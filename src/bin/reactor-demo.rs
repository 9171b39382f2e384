// Chain Reactor demo binary - negotiate a live API and compose a chain link

//! Point this at any HTTP API with a credential and watch the core do its
//! thing: probe the six credential encodings, discover capabilities, register
//! a trigger/action pair, compose a chain link and run it once.
//!
//! ```bash
//! reactor-demo --url https://api.openweathermap.org --secret $OWM_KEY --name weather
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use serde_json::json;
use tracing::info;
use tracing_subscriber::EnvFilter;

use chain_reactor::{AutomationEngine, NewConnection, RuleRegistry, RunOutcome};

#[derive(Parser, Debug)]
#[command(name = "reactor-demo")]
#[command(about = "Negotiate an API connection and run a demo chain link")]
struct Args {
    /// Base URL of the API to connect
    #[arg(long, env = "REACTOR_URL")]
    url: String,

    /// API credential; the probe works out where it goes
    #[arg(long, env = "REACTOR_SECRET", default_value = "")]
    secret: String,

    /// Display name for the connection
    #[arg(long, default_value = "demo-api")]
    name: String,

    /// Optional webhook callback URL stored on the connection
    #[arg(long)]
    webhook: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let engine = AutomationEngine::new();

    info!(url = %args.url, "negotiating connection");
    let mut request = NewConnection::new(&args.name, &args.url, &args.secret);
    if let Some(webhook) = &args.webhook {
        request = request.with_webhook(webhook);
    }
    let connection = engine.register_connection(request).await?;

    println!("connection #{} ({})", connection.id, connection.name);
    println!("  accepted credential shape: {}", connection.auth_shape);
    println!("  events:");
    for event in &connection.events {
        println!("    {} - {}", event.id, event.description);
    }
    println!("  actions:");
    for action in &connection.actions {
        println!("    {} - {}", action.id, action.description);
    }

    // Wire one executable trigger/action pair and run it through a chain link
    let fired = Arc::new(AtomicBool::new(false));
    let flag = fired.clone();

    engine.register_trigger(
        "demo.tick",
        RuleRegistry::trigger(|| async { Ok(json!({"tick": true})) }),
    )?;
    engine.register_action(
        "demo.print",
        RuleRegistry::action(move |payload| {
            let flag = flag.clone();
            async move {
                println!("  action received: {payload}");
                flag.store(true, Ordering::SeqCst);
                Ok(())
            }
        }),
    )?;

    let link = engine
        .compose_workflow(
            "demo-link",
            &["demo.tick".to_string()],
            RuleRegistry::condition(|results| results[0]["tick"] == json!(true)),
            &["demo.print".to_string()],
            connection.id,
        )
        .await?;
    println!("composed chain link #{} ({})", link.id, link.name);

    let report = engine.run_workflow(link.id).await?;
    match report.outcome {
        RunOutcome::Fired { actions } => {
            println!("run {}: fired {} action(s)", report.run_id, actions.len());
        }
        other => println!("run {}: {:?}", report.run_id, other),
    }
    assert!(fired.load(Ordering::SeqCst));

    Ok(())
}
