//! `dq login` and `dq logout`.

use std::sync::Arc;

use anyhow::{bail, Result};

use crate::admin::{self, AdminController, AdminView, Event};
use crate::api::{ApiClient, Backend};
use crate::config::Config;
use crate::console::LineReader;
use crate::error::ApiError;
use crate::session::{FileTokenStore, Session};

/// Environment variable consulted when `--password` is not given.
pub const PASSWORD_ENV: &str = "DQ_PASSWORD";

pub async fn run_login(config: &Config, username: &str, password: Option<String>) -> Result<()> {
    let password = match password.or_else(|| std::env::var(PASSWORD_ENV).ok()) {
        Some(p) => p,
        None => {
            eprint!("Password for {}: ", username);
            LineReader::stdin().next_line().await?.unwrap_or_default()
        }
    };
    if password.is_empty() {
        bail!("a password is required");
    }

    let backend = ApiClient::new(config)?;
    let token = match backend.login(username, &password).await {
        Ok(token) => token,
        Err(e) => {
            let reason = match e {
                ApiError::Unauthorized(detail) => detail,
                other => other.user_message(),
            };
            eprintln!("Error: login failed: {}", reason);
            std::process::exit(1);
        }
    };

    let mut session = Session::open(Box::new(FileTokenStore::new(&config.session.store_path)))?;
    session.sign_in(token.access_token)?;
    tracing::debug!(path = %config.session.store_path.display(), "token stored");
    println!("Signed in as {}.", username);
    Ok(())
}

pub async fn run_logout(config: &Config) -> Result<()> {
    let backend: Arc<dyn Backend> = Arc::new(ApiClient::new(config)?);
    let session = Session::open(Box::new(FileTokenStore::new(&config.session.store_path)))?;
    if !session.is_signed_in() {
        println!("Not signed in.");
        return Ok(());
    }

    let mut controller = AdminController::new(backend, session);
    controller.dispatch(Event::Logout, &mut Quiet).await?;
    println!("Signed out.");
    Ok(())
}

/// Logout prints its own confirmation, so effects are only logged.
struct Quiet;

impl AdminView for Quiet {
    fn apply(&mut self, effect: &admin::Effect) {
        tracing::debug!(?effect, "logout");
    }
}
