//! Corkboard CLI and REST API entry point.
//!
//! Binary name: `cork`
//!
//! Parses CLI arguments, initializes storage and services, then dispatches
//! to the matching command handler or starts the API server.

mod cli;
mod http;
mod state;

use clap::Parser;
use clap_complete::generate;
use corkboard_observe::{TracingOptions, init_tracing, shutdown_tracing};
use corkboard_types::identity::ExternalAssertion;

use cli::{Cli, Commands};
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let tracing_options = TracingOptions {
        verbosity: cli.verbose,
        quiet: cli.quiet,
        json: cli.json,
        enable_otel: cli.otel,
    };
    if let Err(e) = init_tracing(&tracing_options) {
        eprintln!("Warning: could not initialize logging: {e}");
    }

    let result = run(cli).await;
    shutdown_tracing();
    result
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    // Shell completions don't need app state
    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = <Cli as clap::CommandFactory>::command();
        generate(*shell, &mut cmd, "cork", &mut std::io::stdout());
        return Ok(());
    }

    let ephemeral = matches!(cli.command, Commands::Serve { ephemeral: true, .. });
    let state = AppState::init(ephemeral).await?;
    let json = cli.json;

    match cli.command {
        Commands::Register {
            email,
            password,
            username,
        } => cli::account::register(&state, email, password, username, json).await?,

        Commands::Login { email, password } => cli::account::login(&state, email, password, json).await?,

        Commands::LoginExternal {
            provider,
            subject,
            email,
            name,
        } => {
            let assertion = ExternalAssertion {
                provider,
                subject,
                email,
                display_name: name,
            };
            cli::account::login_external(&state, assertion, json).await?;
        }

        Commands::Logout => cli::account::logout(&state, json).await?,

        Commands::Whoami => cli::account::whoami(&state, json).await?,

        Commands::Post { title, content } => cli::board::post(&state, title, content, json).await?,

        Commands::Edit { id, title, content } => cli::board::edit(&state, &id, title, content, json).await?,

        Commands::Delete { id, force } => cli::board::delete(&state, &id, force, json).await?,

        Commands::List { limit, mine } => cli::board::list(&state, limit, mine, json).await?,

        Commands::Watch => cli::board::watch(&state, json).await?,

        Commands::Status => cli::status::status(&state, json).await?,

        Commands::Serve { port, host, .. } => {
            let host = host.unwrap_or_else(|| state.config.server.host.clone());
            let port = port.unwrap_or(state.config.server.port);
            serve(state, &host, port).await?;
        }

        Commands::Completions { .. } => unreachable!("handled above"),
    }

    Ok(())
}

/// Attach the live board and serve the API until Ctrl+C or SIGTERM.
async fn serve(state: AppState, host: &str, port: u16) -> anyhow::Result<()> {
    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    let subscription = state.board.subscribe().await;

    println!(
        "  {} Corkboard API listening on {} ({} store)",
        console::style("📌").bold(),
        console::style(format!("http://{addr}")).cyan(),
        state.store.kind()
    );
    println!("  {}", console::style("Press Ctrl+C to stop").dim());

    let router = http::router::build_router(state.clone());
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    subscription.unsubscribe().await;
    println!("\n  Server stopped.");
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to listen for Ctrl+C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
