//! Account CLI commands: register, login, login-external, logout, whoami.

use anyhow::{Context, Result};
use console::style;
use dialoguer::{Input, Password};

use corkboard_types::identity::{Credentials, ExternalAssertion, Session};

use crate::cli::print_notifications;
use crate::cli::session::open_identity;
use crate::state::AppState;

fn prompt_email(email: Option<String>) -> Result<String> {
    match email {
        Some(e) => Ok(e),
        None => Ok(Input::<String>::new().with_prompt("Email").interact_text()?),
    }
}

fn prompt_password(password: Option<String>, confirm: bool) -> Result<String> {
    if let Some(p) = password {
        return Ok(p);
    }
    let mut prompt = Password::new().with_prompt("Password");
    if confirm {
        prompt = prompt.with_confirmation("Confirm password", "Passwords do not match");
    }
    Ok(prompt.interact()?)
}

/// Create an account, store its profile and stay signed in.
///
/// # Examples
///
/// ```bash
/// cork register --email ada@example.com --username Ada
/// ```
pub async fn register(
    state: &AppState,
    email: Option<String>,
    password: Option<String>,
    username: Option<String>,
    json: bool,
) -> Result<()> {
    let email = prompt_email(email)?;
    let password = prompt_password(password, true)?;
    let identity = open_identity(state).await?;
    let mut toasts = state.notifications.subscribe();

    let session = identity
        .register(&Credentials::new(email, password), username.as_deref())
        .await
        .context("registration failed")?;

    print_notifications(&mut toasts, json);
    print_session(&session, json)
}

/// Sign in with email and password.
pub async fn login(state: &AppState, email: Option<String>, password: Option<String>, json: bool) -> Result<()> {
    let email = prompt_email(email)?;
    let password = prompt_password(password, false)?;
    let identity = open_identity(state).await?;
    let mut toasts = state.notifications.subscribe();

    let session = identity
        .login(&Credentials::new(email, password))
        .await
        .context("login failed")?;

    print_notifications(&mut toasts, json);
    print_session(&session, json)
}

/// Sign in with an identity asserted by an external provider.
pub async fn login_external(state: &AppState, assertion: ExternalAssertion, json: bool) -> Result<()> {
    let identity = open_identity(state).await?;
    let mut toasts = state.notifications.subscribe();

    let session = identity
        .login_with_external_provider(&assertion)
        .await
        .with_context(|| format!("{} sign-in failed", assertion.provider))?;

    print_notifications(&mut toasts, json);
    print_session(&session, json)
}

pub async fn logout(state: &AppState, json: bool) -> Result<()> {
    let identity = open_identity(state).await?;
    let was = identity.session().display_name;
    let mut toasts = state.notifications.subscribe();

    identity.logout().await.context("logout failed")?;

    if json {
        println!("{}", serde_json::json!({ "signed_out": was }));
    } else {
        print_notifications(&mut toasts, json);
    }
    Ok(())
}

pub async fn whoami(state: &AppState, json: bool) -> Result<()> {
    let identity = open_identity(state).await?;
    print_session(&identity.session(), json)
}

fn print_session(session: &Session, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(session)?);
        return Ok(());
    }

    match (&session.principal, &session.display_name) {
        (Some(id), name) => {
            println!();
            println!(
                "  {}  {}",
                style("Signed in as:").bold(),
                style(name.as_deref().unwrap_or(id.as_str())).cyan()
            );
            if let Some(email) = &session.email {
                println!("  {}         {}", style("Email:").bold(), email);
            }
            println!("  {}            {}", style("ID:").bold(), style(id).dim());
            println!();
        }
        (None, _) => {
            println!(
                "  {} Not signed in. Run: {}",
                style("i").blue().bold(),
                style("cork login").yellow()
            );
        }
    }
    Ok(())
}
