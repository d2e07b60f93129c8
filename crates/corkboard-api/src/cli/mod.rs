//! CLI command definitions for the `cork` binary.
//!
//! Uses clap derive macros for argument parsing. Commands are flat verbs
//! (`cork post`, `cork list`, `cork login`).

pub mod account;
pub mod board;
pub mod session;
pub mod status;

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use console::style;
use tokio::sync::broadcast;

use corkboard_types::event::{Notification, NotificationLevel};

/// A community message board in your terminal.
#[derive(Parser)]
#[command(name = "cork", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for verbose, -vv for debug/trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Export tracing spans to stdout via OpenTelemetry.
    #[arg(long, global = true, env = "CORKBOARD_OTEL")]
    pub otel: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create an account and sign in.
    Register {
        #[arg(long)]
        email: Option<String>,

        /// Password (prompted for when omitted).
        #[arg(long, env = "CORKBOARD_PASSWORD", hide_env_values = true)]
        password: Option<String>,

        /// Display name (a random one is generated when omitted).
        #[arg(long)]
        username: Option<String>,
    },

    /// Sign in with email and password.
    Login {
        #[arg(long)]
        email: Option<String>,

        /// Password (prompted for when omitted).
        #[arg(long, env = "CORKBOARD_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },

    /// Sign in with an identity asserted by an external provider.
    #[command(name = "login-external")]
    LoginExternal {
        /// Provider name, e.g. "github".
        #[arg(long)]
        provider: String,

        /// The provider's stable user id.
        #[arg(long)]
        subject: String,

        #[arg(long)]
        email: Option<String>,

        /// Display name known to the provider.
        #[arg(long)]
        name: Option<String>,
    },

    /// Sign out and forget the stored session.
    Logout,

    /// Show who is signed in.
    Whoami,

    /// Post a new message.
    Post {
        #[arg(short, long)]
        title: Option<String>,

        #[arg(short, long)]
        content: Option<String>,
    },

    /// Edit one of your messages. Omitted fields keep their current value.
    Edit {
        /// Message id.
        id: String,

        #[arg(short, long)]
        title: Option<String>,

        #[arg(short, long)]
        content: Option<String>,
    },

    /// Delete one of your messages.
    #[command(alias = "rm")]
    Delete {
        /// Message id.
        id: String,

        /// Skip confirmation prompt.
        #[arg(long)]
        force: bool,
    },

    /// List messages, newest first.
    #[command(alias = "ls")]
    List {
        /// Show at most this many messages.
        #[arg(short = 'n', long)]
        limit: Option<usize>,

        /// Only your own messages.
        #[arg(long)]
        mine: bool,
    },

    /// Follow the board live until Ctrl+C.
    Watch,

    /// Show data dir, store, session and board status.
    Status,

    /// Start the REST/WebSocket API server.
    Serve {
        /// Port to listen on [default: config `server.port`].
        #[arg(short, long, env = "CORKBOARD_PORT")]
        port: Option<u16>,

        /// Host to bind to [default: config `server.host`].
        #[arg(long, env = "CORKBOARD_HOST")]
        host: Option<String>,

        /// Keep messages and profiles in memory only.
        #[arg(long)]
        ephemeral: bool,
    },

    /// Generate shell completions.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}

/// Print success notifications raised by the last operation.
///
/// Failures are not printed here; they come back as errors and are reported
/// once by `main`.
pub fn print_notifications(rx: &mut broadcast::Receiver<Notification>, json: bool) {
    while let Ok(notification) = rx.try_recv() {
        if json || notification.level != NotificationLevel::Success {
            continue;
        }
        println!("  {} {}", style("✓").green().bold(), notification.message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_post_and_globals() {
        let cli = Cli::try_parse_from(["cork", "post", "-t", "Hi", "-c", "There", "--json", "-vv"]).unwrap();
        assert!(cli.json);
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Post { title, content } => {
                assert_eq!(title.as_deref(), Some("Hi"));
                assert_eq!(content.as_deref(), Some("There"));
            }
            _ => panic!("expected post"),
        }
    }

    #[test]
    fn test_parse_aliases() {
        assert!(matches!(
            Cli::try_parse_from(["cork", "ls", "-n", "5"]).unwrap().command,
            Commands::List { limit: Some(5), mine: false }
        ));
        assert!(matches!(
            Cli::try_parse_from(["cork", "rm", "abc", "--force"]).unwrap().command,
            Commands::Delete { force: true, .. }
        ));
    }
}
