//! `fret` -- freight shipment tracking and chat client.
//!
//! # Environment variables
//!
//! | Variable                       | Required | Default                     | Description                  |
//! |--------------------------------|----------|-----------------------------|------------------------------|
//! | `FRET_API_URL`                 | no       | `http://localhost:5000/api` | REST base URL                |
//! | `FRET_SOCKET_URL`              | no       | `ws://localhost:5000`       | Chat socket base URL         |
//! | `FRET_API_TOKEN`               | no       | --                          | Bearer token                 |
//! | `FRET_ROLE`                    | no       | `client`                    | Dashboard role               |
//! | `FRET_USER_ID`                 | chat     | --                          | Signed-in user id            |
//! | `FRET_REQUEST_TIMEOUT_SECS`    | no       | `30`                        | HTTP timeout                 |
//! | `FRET_OUTBOUND_QUEUE_CAPACITY` | no       | `256`                       | Chat emits kept offline      |

use clap::Parser;
use fret_cli::args::Cli;
use fret_cli::commands;
use fret_cli::state::AppState;
use fret_client::api::ApiError;
use fret_client::config::ClientConfig;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fret=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Erreur: {}", user_message(&e));
        tracing::debug!(error = ?e, "Command failed");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = ClientConfig::from_env()?;
    if let Some(role) = cli.role {
        config.role = role;
    }

    tracing::debug!(api_url = %config.api_url, role = %config.role, "Starting fret");

    let state = AppState::new(config)?;
    commands::run(&state, cli.command).await
}

/// API errors show the server's message or the generic fallback; anything
/// else shows its own text.
fn user_message(error: &anyhow::Error) -> String {
    match error.downcast_ref::<ApiError>() {
        Some(api) => api.user_message(),
        None => error.to_string(),
    }
}
