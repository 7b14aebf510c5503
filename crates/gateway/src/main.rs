use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use wf_domain::config::Config;
use wf_gateway::cli::{repl, Cli, Command};
use wf_gateway::state::AppState;
use wf_gateway::{api, bootstrap};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        // Default to serve when no subcommand is given.
        None | Some(Command::Serve) => {
            let config = Arc::new(Config::from_env());
            init_tracing(&config, true);
            let state = bootstrap::build_app_state(config.clone())?;
            run_server(state).await
        }
        Some(Command::Chat { thread }) => {
            let config = Arc::new(Config::from_env());
            init_tracing(&config, false);
            let state = bootstrap::build_app_state(config)?;
            repl::chat(state, thread).await
        }
        Some(Command::Version) => {
            println!("wayfarer {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

/// Structured JSON logs for the server, compact stderr logs for the REPL.
fn init_tracing(config: &Config, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("{},wf_gateway=debug", config.server.log_level))
    });
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.compact().init();
    }
}

async fn run_server(state: AppState) -> anyhow::Result<()> {
    tracing::info!("Wayfarer starting");

    let max_concurrent = state.config.server.max_concurrent;
    let app = api::router()
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .layer(tower_http::cors::CorsLayer::permissive())
        .layer(tower::limit::ConcurrencyLimitLayer::new(max_concurrent))
        .with_state(state.clone());

    // ── Periodic thread-lock pruning ─────────────────────────────────
    {
        let locks = state.thread_locks.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(std::time::Duration::from_secs(60));
            loop {
                interval.tick().await;
                locks.prune_idle();
            }
        });
    }

    let addr = format!("{}:{}", state.config.server.host, state.config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding to {addr}"))?;

    tracing::info!(addr = %addr, "Wayfarer listening");

    axum::serve(listener, app)
        .await
        .context("axum server error")?;

    Ok(())
}
