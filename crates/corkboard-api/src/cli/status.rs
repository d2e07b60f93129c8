//! Status dashboard command.

use anyhow::Result;
use console::style;

use crate::cli::session::open_identity;
use crate::state::AppState;

/// Show where data lives, who is signed in and how big the board is.
pub async fn status(state: &AppState, json: bool) -> Result<()> {
    let identity = open_identity(state).await?;
    let session = identity.session();

    let accounts: (i64,) = sqlx_count(state, "SELECT COUNT(*) FROM accounts").await?;
    let messages: (i64,) =
        sqlx_count(state, "SELECT COUNT(*) FROM documents WHERE collection = 'messages'").await?;
    let config = &state.config;

    if json {
        let status = serde_json::json!({
            "version": env!("CARGO_PKG_VERSION"),
            "data_dir": state.data_dir.display().to_string(),
            "store": state.store.kind(),
            "signed_in": session.display_name,
            "principal": session.principal,
            "accounts": accounts.0,
            "messages": messages.0,
            "server": { "host": config.server.host, "port": config.server.port },
            "poll_interval_ms": config.sync.poll_interval_ms,
        });
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    println!();
    println!("  {} Corkboard v{}", style("📌").bold(), env!("CARGO_PKG_VERSION"));
    println!();

    println!("  {}", style("── Session ──").dim());
    match &session.display_name {
        Some(name) if session.is_authenticated() => {
            println!("  Signed in: {}", style(name).cyan());
        }
        _ => println!("  Signed in: {}", style("no").yellow()),
    }
    println!();

    println!("  {}", style("── Board ──").dim());
    println!("  Messages: {}", style(messages.0).bold());
    println!("  Accounts: {}", style(accounts.0).bold());
    println!();

    println!("  {}", style("── System ──").dim());
    println!("  Data dir: {}", style(state.data_dir.display()).dim());
    println!("  Database: {}", style("SQLite (WAL mode)").dim());
    println!(
        "  Server:   {}",
        style(format!("http://{}:{}", config.server.host, config.server.port)).dim()
    );
    println!();

    Ok(())
}

async fn sqlx_count(state: &AppState, query: &str) -> Result<(i64,)> {
    Ok(sqlx::query_as(query).fetch_one(&state.db_pool.reader).await?)
}
