//! Board CLI commands: post, edit, delete, list, watch.

use std::sync::Arc;

use anyhow::{Context, Result, anyhow, bail};
use chrono::{DateTime, Utc};
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;
use dialoguer::{Confirm, Input};

use corkboard_types::event::SyncState;
use corkboard_types::message::{Message, MessageInput};

use crate::cli::print_notifications;
use crate::cli::session::{open_identity, require_login};
use crate::state::AppState;

/// Post a new message as the signed-in user.
///
/// # Examples
///
/// ```bash
/// cork post --title "Lost cat" --content "Grey, answers to Miso"
/// ```
pub async fn post(state: &AppState, title: Option<String>, content: Option<String>, json: bool) -> Result<()> {
    let identity = open_identity(state).await?;
    let (principal, author_name) = require_login(&identity.session())?;

    let title = match title {
        Some(t) => t,
        None => Input::<String>::new().with_prompt("Title").interact_text()?,
    };
    let content = match content {
        Some(c) => c,
        None => Input::<String>::new().with_prompt("Message").interact_text()?,
    };

    let mut toasts = state.notifications.subscribe();
    let id = state
        .writer_for(&principal)
        .create(&MessageInput::new(title, content), &principal, &author_name)
        .await
        .context("could not post message")?;

    if json {
        println!("{}", serde_json::json!({ "id": id }));
    } else {
        print_notifications(&mut toasts, json);
        println!("  {}  {}", style("ID:").bold(), style(&id).dim());
    }
    Ok(())
}

/// Replace title and/or content of one of your messages.
pub async fn edit(
    state: &AppState,
    id: &str,
    title: Option<String>,
    content: Option<String>,
    json: bool,
) -> Result<()> {
    let identity = open_identity(state).await?;
    let (principal, _) = require_login(&identity.session())?;

    let current = find_message(state, id).await?;
    let input = match (title, content) {
        (None, None) => MessageInput::new(
            Input::<String>::new()
                .with_prompt("Title")
                .with_initial_text(&current.title)
                .interact_text()?,
            Input::<String>::new()
                .with_prompt("Message")
                .with_initial_text(&current.content)
                .interact_text()?,
        ),
        (title, content) => MessageInput::new(
            title.unwrap_or(current.title),
            content.unwrap_or(current.content),
        ),
    };

    let mut toasts = state.notifications.subscribe();
    state
        .writer_for(&principal)
        .update(id, &input)
        .await
        .with_context(|| format!("could not update message '{id}'"))?;

    if json {
        println!("{}", serde_json::json!({ "id": id, "updated": true }));
    } else {
        print_notifications(&mut toasts, json);
    }
    Ok(())
}

/// Delete one of your messages, asking first unless `force`.
pub async fn delete(state: &AppState, id: &str, force: bool, json: bool) -> Result<()> {
    let identity = open_identity(state).await?;
    let (principal, _) = require_login(&identity.session())?;

    if !force && !json {
        let message = find_message(state, id).await?;
        let confirmed = Confirm::new()
            .with_prompt(format!("Delete '{}'?", message.title))
            .default(false)
            .interact()?;
        if !confirmed {
            println!("  Cancelled.");
            return Ok(());
        }
    }

    let mut toasts = state.notifications.subscribe();
    state
        .writer_for(&principal)
        .delete(id)
        .await
        .with_context(|| format!("could not delete message '{id}'"))?;

    if json {
        println!("{}", serde_json::json!({ "id": id, "deleted": true }));
    } else {
        print_notifications(&mut toasts, json);
    }
    Ok(())
}

/// List messages in a table, newest first.
pub async fn list(state: &AppState, limit: Option<usize>, mine: bool, json: bool) -> Result<()> {
    let owner = if mine {
        let identity = open_identity(state).await?;
        Some(require_login(&identity.session())?.0)
    } else {
        None
    };

    let messages = load_board(state).await?;
    let shown: Vec<&Message> = messages
        .iter()
        .filter(|m| owner.as_ref().is_none_or(|p| &m.author_id == p))
        .take(limit.unwrap_or(usize::MAX))
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&shown)?);
        return Ok(());
    }

    if shown.is_empty() {
        println!();
        println!(
            "  {} No messages yet. Post one with: {}",
            style("i").blue().bold(),
            style("cork post").yellow()
        );
        println!();
        return Ok(());
    }

    println!();
    println!("{}", message_table(&shown, Utc::now()));
    println!();
    println!(
        "  {} message{}",
        style(shown.len()).bold(),
        if shown.len() == 1 { "" } else { "s" }
    );
    println!();
    Ok(())
}

/// Print the board on every applied snapshot until Ctrl+C.
pub async fn watch(state: &AppState, json: bool) -> Result<()> {
    let handle = state.board.subscribe().await;
    let mut view = state.board.watch_messages();
    let mut sync = state.board.watch_state();

    if !json {
        println!(
            "  {} Watching the board. {}",
            style("◉").cyan().bold(),
            style("Press Ctrl+C to stop").dim()
        );
    }

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            changed = view.changed() => {
                if changed.is_err() {
                    break;
                }
                let current = view.borrow_and_update().clone();
                if json {
                    println!("{}", serde_json::to_string(&current.messages[..])?);
                } else {
                    let rows: Vec<&Message> = current.messages.iter().collect();
                    println!();
                    println!(
                        "  {} {}",
                        style(format!("#{}", current.applied)).dim(),
                        style(Utc::now().format("%H:%M:%S")).dim()
                    );
                    println!("{}", message_table(&rows, Utc::now()));
                }
            }
            changed = sync.changed() => {
                if changed.is_err() {
                    break;
                }
                let now = *sync.borrow_and_update();
                if now == SyncState::Error && !json {
                    eprintln!(
                        "  {} Lost the live connection; showing the last known board.",
                        style("!").yellow().bold()
                    );
                }
            }
        }
    }

    handle.unsubscribe().await;
    Ok(())
}

/// Attach to the board, wait for the first snapshot and detach.
async fn load_board(state: &AppState) -> Result<Arc<[Message]>> {
    let handle = state.board.subscribe().await;
    let reached = state
        .board
        .watch_state()
        .wait_for(|s| matches!(s, SyncState::Synced | SyncState::Error))
        .await
        .map(|s| *s);
    let messages = state.board.messages();
    handle.unsubscribe().await;

    match reached {
        Ok(SyncState::Synced) => Ok(messages),
        Ok(_) => bail!("could not load messages from the {} store", state.store.kind()),
        Err(e) => Err(anyhow!("board closed while loading: {e}")),
    }
}

async fn find_message(state: &AppState, id: &str) -> Result<Message> {
    load_board(state)
        .await?
        .iter()
        .find(|m| m.id == id)
        .cloned()
        .ok_or_else(|| anyhow!("message '{id}' not found"))
}

fn message_table(messages: &[&Message], now: DateTime<Utc>) -> Table {
    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);

    table.set_header(vec![
        Cell::new("Title").fg(Color::White),
        Cell::new("Message").fg(Color::White),
        Cell::new("Author").fg(Color::White),
        Cell::new("Posted").fg(Color::White),
        Cell::new("ID").fg(Color::White),
    ]);

    for m in messages {
        let posted = if m.updated_at > m.created_at {
            format!("{} (edited)", format_relative_time(m.created_at, now))
        } else {
            format_relative_time(m.created_at, now)
        };
        table.add_row(vec![
            Cell::new(&m.title).fg(Color::Cyan),
            Cell::new(&m.content),
            Cell::new(&m.author_name),
            Cell::new(posted).fg(Color::DarkGrey),
            Cell::new(&m.id).fg(Color::DarkGrey),
        ]);
    }
    table
}

fn format_relative_time(at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let secs = (now - at).num_seconds().max(0);
    match secs {
        0..=59 => "just now".to_string(),
        60..=3_599 => format!("{}m ago", secs / 60),
        3_600..=86_399 => format!("{}h ago", secs / 3_600),
        _ if secs < 7 * 86_400 => format!("{}d ago", secs / 86_400),
        _ => at.format("%Y-%m-%d").to_string(),
    }
}
