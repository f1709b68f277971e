//! # Slices - catalog server
//!
//! The binary for the slices reference-graph catalog.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                   apps/slices (THE BINARY)               │
//! │                                                          │
//! │  ┌─────────────┐   ┌─────────────┐   ┌───────────────┐   │
//! │  │    CLI      │   │  HTTP API   │   │ SearchGateway │   │
//! │  │   (clap)    │   │   (axum)    │   │   (reqwest)   │   │
//! │  └──────┬──────┘   └──────┬──────┘   └───────────────┘   │
//! │         └────────┬────────┘                              │
//! │                  ▼                                       │
//! │          ┌───────────────┐                               │
//! │          │  slices-core  │                               │
//! │          └───────────────┘                               │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! slices init
//! slices import -f seed.json
//! slices server --host 0.0.0.0 --port 8080
//! slices resolve 1,2 --refs-only
//! ```

use clap::Parser;
use slices::cli;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    // SLICES_LOG_FORMAT=json switches to machine-parseable output.
    let log_format = std::env::var("SLICES_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "slices=info,slices_core=info,tower_http=debug".into());

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
        }
    }

    let cli = cli::Cli::parse();

    if !cli.quiet && !cli.json_mode {
        print_banner();
    }

    if let Err(e) = cli::execute(cli).await {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}

fn print_banner() {
    println!(
        r#"
  ┌─┐┬  ┬┌─┐┌─┐┌─┐
  └─┐│  ││  ├┤ └─┐
  └─┘┴─┘┴└─┘└─┘└─┘  v{}
"#,
        env!("CARGO_PKG_VERSION")
    );
}
