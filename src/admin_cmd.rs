//! `dq admin ...` and `dq health`.
//!
//! Each subcommand opens the persisted session, builds an
//! [`AdminController`] and feeds it the same events the admin page would
//! produce. Confirmations (delete, rebuild, backup) are asked on the
//! terminal unless `--yes` is given.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;

use crate::admin::{AdminController, Confirmation, Event};
use crate::api::{ApiClient, Backend};
use crate::config::Config;
use crate::console::{LineReader, OutputFormat, TerminalView};
use crate::progress::{NoProgress, ProgressMode};
use crate::session::{FileTokenStore, Session};
use crate::upload::collect_upload_files;

fn open_controller(config: &Config) -> Result<AdminController> {
    let backend: Arc<dyn Backend> = Arc::new(ApiClient::new(config)?);
    let store = FileTokenStore::new(&config.session.store_path);
    let session = Session::open(Box::new(store))?;
    Ok(AdminController::new(backend, session))
}

fn finish(view: &TerminalView) {
    if view.failed() {
        std::process::exit(1);
    }
}

/// Run the session guard. Returns `false` (after redirecting) when there is
/// no token.
async fn guard(controller: &mut AdminController, view: &mut TerminalView) -> Result<bool> {
    if controller.is_signed_in() {
        return Ok(true);
    }
    controller.dispatch(Event::Load, view).await?;
    Ok(false)
}

pub async fn run_list(config: &Config, format: OutputFormat) -> Result<()> {
    let mut controller = open_controller(config)?;
    let mut view = TerminalView::new(format, Box::new(NoProgress));
    controller.dispatch(Event::Load, &mut view).await?;
    finish(&view);
    Ok(())
}

pub async fn run_upload(
    config: &Config,
    paths: &[PathBuf],
    progress: ProgressMode,
    format: OutputFormat,
) -> Result<()> {
    let mut controller = open_controller(config)?;
    let mut view = TerminalView::new(format, progress.reporter());
    if !guard(&mut controller, &mut view).await? {
        finish(&view);
    }

    let files = collect_upload_files(paths)?;
    tracing::info!(files = files.len(), "uploading");
    controller
        .dispatch(Event::FilesSelected(files), &mut view)
        .await?;
    finish(&view);
    Ok(())
}

pub async fn run_delete(
    config: &Config,
    filename: &str,
    yes: bool,
    format: OutputFormat,
) -> Result<()> {
    let mut controller = open_controller(config)?;
    let mut view = TerminalView::new(format, Box::new(NoProgress));
    if !guard(&mut controller, &mut view).await? {
        finish(&view);
    }

    controller
        .dispatch(Event::DeleteRequested(filename.to_string()), &mut view)
        .await?;
    let confirmed = yes
        || LineReader::stdin()
            .confirm(&format!(
                "Delete '{}'? This removes it from the index.",
                filename
            ))
            .await?;
    let event = if confirmed {
        Event::DeleteConfirmed
    } else {
        Event::DeleteCancelled
    };
    controller.dispatch(event, &mut view).await?;
    if !confirmed {
        eprintln!("Cancelled.");
    }
    finish(&view);
    Ok(())
}

/// Shared flow for the confirmation-gated operations.
async fn run_confirmed(
    config: &Config,
    request: Event,
    confirmation: Confirmation,
    yes: bool,
    format: OutputFormat,
) -> Result<()> {
    let mut controller = open_controller(config)?;
    let mut view = TerminalView::new(format, Box::new(NoProgress));
    if !guard(&mut controller, &mut view).await? {
        finish(&view);
    }

    controller.dispatch(request, &mut view).await?;
    let confirmed = yes || LineReader::stdin().confirm(confirmation.prompt()).await?;
    if confirmed {
        controller.dispatch(Event::Confirmed, &mut view).await?;
    } else {
        controller.dispatch(Event::Cancelled, &mut view).await?;
        eprintln!("Cancelled.");
    }
    finish(&view);
    Ok(())
}

pub async fn run_rebuild(config: &Config, yes: bool, format: OutputFormat) -> Result<()> {
    run_confirmed(
        config,
        Event::RebuildRequested,
        Confirmation::RebuildIndex,
        yes,
        format,
    )
    .await
}

pub async fn run_backup(config: &Config, yes: bool, format: OutputFormat) -> Result<()> {
    run_confirmed(
        config,
        Event::BackupRequested,
        Confirmation::Backup,
        yes,
        format,
    )
    .await
}

pub async fn run_stats(config: &Config, format: OutputFormat) -> Result<()> {
    let mut controller = open_controller(config)?;
    let mut view = TerminalView::new(format, Box::new(NoProgress));
    if !guard(&mut controller, &mut view).await? {
        finish(&view);
    }
    controller
        .dispatch(Event::StatsRequested, &mut view)
        .await?;
    finish(&view);
    Ok(())
}

/// System status needs no session.
pub async fn run_health(config: &Config, format: OutputFormat) -> Result<()> {
    let mut controller = open_controller(config)?;
    let mut view = TerminalView::new(format, Box::new(NoProgress));
    controller
        .dispatch(Event::HealthRequested, &mut view)
        .await?;
    finish(&view);
    Ok(())
}
