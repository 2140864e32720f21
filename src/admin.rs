//! Admin session and document-management state machine.
//!
//! [`AdminMachine`] holds the session guard, the delete modal target, the
//! pending confirmation and at most one in-flight request. Network work is
//! requested through [`Effect::Request`]; [`AdminController`] performs it
//! with the session token attached and feeds the outcome back as the
//! matching `*Settled` / `*Loaded` event.
//!
//! Uploads go through an [`UploadQueue`]: one file in flight, a banner per
//! file, and exactly one document refresh once the last file settles.

use std::collections::VecDeque;
use std::sync::Arc;

use crate::api::Backend;
use crate::error::{ApiError, StateError};
use crate::models::{Ack, BackupReceipt, Document, Health, IndexStats, UploadResponse};
use crate::session::Session;
use crate::upload::{BatchSummary, UploadFile, UploadQueue};

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// The admin surface was opened.
    Load,
    Refresh,
    FilesSelected(Vec<UploadFile>),
    UploadSettled(Result<UploadResponse, ApiError>),
    DocumentsLoaded(Result<Vec<Document>, ApiError>),
    DeleteRequested(String),
    DeleteConfirmed,
    DeleteCancelled,
    DeleteSettled(Result<Ack, ApiError>),
    RebuildRequested,
    BackupRequested,
    /// Answer to an [`Effect::Prompt`].
    Confirmed,
    Cancelled,
    RebuildSettled(Result<Ack, ApiError>),
    BackupSettled(Result<BackupReceipt, ApiError>),
    HealthRequested,
    HealthLoaded(Result<Health, ApiError>),
    StatsRequested,
    StatsLoaded(Result<IndexStats, ApiError>),
    Logout,
}

impl Event {
    fn name(&self) -> &'static str {
        match self {
            Event::Load => "load",
            Event::Refresh => "refresh",
            Event::FilesSelected(_) => "file selection",
            Event::UploadSettled(_) => "upload result",
            Event::DocumentsLoaded(_) => "document listing",
            Event::DeleteRequested(_) => "delete request",
            Event::DeleteConfirmed => "delete confirmation",
            Event::DeleteCancelled => "delete cancellation",
            Event::DeleteSettled(_) => "delete result",
            Event::RebuildRequested => "rebuild request",
            Event::BackupRequested => "backup request",
            Event::Confirmed => "confirmation",
            Event::Cancelled => "cancellation",
            Event::RebuildSettled(_) => "rebuild result",
            Event::BackupSettled(_) => "backup result",
            Event::HealthRequested => "health check",
            Event::HealthLoaded(_) => "health result",
            Event::StatsRequested => "stats request",
            Event::StatsLoaded(_) => "stats result",
            Event::Logout => "logout",
        }
    }

    fn needs_session(&self) -> bool {
        !matches!(
            self,
            Event::Load | Event::HealthRequested | Event::HealthLoaded(_)
        )
    }
}

/// Long-running operations that need an explicit yes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirmation {
    RebuildIndex,
    Backup,
}

impl Confirmation {
    pub fn prompt(self) -> &'static str {
        match self {
            Confirmation::RebuildIndex => {
                "Rebuild the entire index? This may take several minutes."
            }
            Confirmation::Backup => "Create a backup of the vector store?",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BannerKind {
    Success,
    Error,
    Info,
}

/// Network work for the controller. The token is attached by the controller.
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    ListDocuments,
    Upload {
        index: usize,
        total: usize,
        file: UploadFile,
    },
    DeleteDocument(String),
    RebuildIndex,
    CreateBackup,
    CheckHealth,
    FetchStats,
}

impl Request {
    fn needs_token(&self) -> bool {
        !matches!(self, Request::CheckHealth)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    RedirectToLogin,
    /// Remove the persisted token.
    ClearToken,
    /// Transient status banner.
    Banner { kind: BannerKind, message: String },
    /// File `index` of `total` is about to be sent.
    UploadProgress {
        index: usize,
        total: usize,
        percent: u8,
        filename: String,
    },
    UploadFileSettled {
        index: usize,
        total: usize,
        filename: String,
        ok: bool,
    },
    UploadFinished(BatchSummary),
    ShowDocuments(Vec<Document>),
    /// Explicit "no documents" placeholder.
    ShowEmptyDocuments,
    /// Inline error in place of the document table.
    ShowListError(String),
    OpenDeleteModal(String),
    CloseDeleteModal,
    Prompt(Confirmation),
    ShowHealth(Health),
    ShowStats(IndexStats),
    Request(Request),
}

#[derive(Debug, Clone, PartialEq)]
enum InFlight {
    Listing,
    Uploading(UploadQueue),
    Deleting(String),
    Rebuilding,
    BackingUp,
    CheckingHealth,
    FetchingStats,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AdminMachine {
    signed_in: bool,
    in_flight: Option<InFlight>,
    modal: Option<String>,
    confirm: Option<Confirmation>,
}

impl AdminMachine {
    pub fn new(signed_in: bool) -> Self {
        Self {
            signed_in,
            in_flight: None,
            modal: None,
            confirm: None,
        }
    }

    pub fn is_signed_in(&self) -> bool {
        self.signed_in
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Filename named by the open delete modal.
    pub fn delete_target(&self) -> Option<&str> {
        self.modal.as_deref()
    }

    pub fn pending_confirmation(&self) -> Option<Confirmation> {
        self.confirm
    }

    pub fn handle(&mut self, event: Event) -> Result<Vec<Effect>, StateError> {
        let name = event.name();
        if event.needs_session() && !self.signed_in {
            return Err(StateError::NotAuthenticated);
        }

        match event {
            Event::Load => {
                if !self.signed_in {
                    return Ok(vec![Effect::RedirectToLogin]);
                }
                self.start(InFlight::Listing, Request::ListDocuments)
            }
            Event::Refresh => self.start(InFlight::Listing, Request::ListDocuments),

            Event::FilesSelected(files) => {
                self.ensure_idle()?;
                if files.is_empty() {
                    return Ok(vec![banner(BannerKind::Info, "No files selected.")]);
                }
                let mut queue = UploadQueue::new(files);
                let effects = next_upload(&mut queue);
                self.in_flight = Some(InFlight::Uploading(queue));
                Ok(effects)
            }
            Event::UploadSettled(outcome) => {
                let mut queue = match self.in_flight.take() {
                    Some(InFlight::Uploading(queue)) => queue,
                    other => {
                        self.in_flight = other;
                        return self.unexpected(name);
                    }
                };
                let effects = self.settle_upload(&mut queue, outcome);
                if !queue.is_finished() {
                    self.in_flight = Some(InFlight::Uploading(queue));
                }
                Ok(effects)
            }

            Event::DocumentsLoaded(outcome) => {
                self.finish(|f| matches!(f, InFlight::Listing), name)?;
                Ok(match outcome {
                    Ok(docs) if docs.is_empty() => vec![Effect::ShowEmptyDocuments],
                    Ok(docs) => vec![Effect::ShowDocuments(docs)],
                    Err(err) if err.is_unauthorized() => self.expire(),
                    Err(err) => {
                        tracing::warn!(error = %err, "listing documents failed");
                        vec![Effect::ShowListError(format!(
                            "Error loading documents: {}",
                            err.user_message()
                        ))]
                    }
                })
            }

            Event::DeleteRequested(filename) => {
                self.modal = Some(filename.clone());
                Ok(vec![Effect::OpenDeleteModal(filename)])
            }
            Event::DeleteCancelled => {
                self.modal.take().ok_or(StateError::NoDeleteTarget)?;
                Ok(vec![Effect::CloseDeleteModal])
            }
            Event::DeleteConfirmed => {
                self.ensure_idle()?;
                let filename = self.modal.take().ok_or(StateError::NoDeleteTarget)?;
                let mut effects = vec![Effect::CloseDeleteModal];
                effects.extend(self.start(
                    InFlight::Deleting(filename.clone()),
                    Request::DeleteDocument(filename),
                )?);
                Ok(effects)
            }
            Event::DeleteSettled(outcome) => {
                let filename = match self.in_flight.take() {
                    Some(InFlight::Deleting(filename)) => filename,
                    other => {
                        self.in_flight = other;
                        return self.unexpected(name);
                    }
                };
                match outcome {
                    Ok(_) => {
                        let mut effects = vec![banner(
                            BannerKind::Success,
                            format!("Document '{}' deleted successfully", filename),
                        )];
                        effects.extend(self.start(InFlight::Listing, Request::ListDocuments)?);
                        Ok(effects)
                    }
                    Err(err) => {
                        tracing::warn!(error = %err, filename = %filename, "delete failed");
                        Ok(vec![banner(
                            BannerKind::Error,
                            format!("Error deleting document: {}", err.user_message()),
                        )])
                    }
                }
            }

            Event::RebuildRequested => self.ask(Confirmation::RebuildIndex),
            Event::BackupRequested => self.ask(Confirmation::Backup),
            Event::Confirmed => {
                let confirmation = self.confirm.ok_or(StateError::NothingToConfirm)?;
                self.ensure_idle()?;
                self.confirm = None;
                match confirmation {
                    Confirmation::RebuildIndex => {
                        self.start(InFlight::Rebuilding, Request::RebuildIndex)
                    }
                    Confirmation::Backup => self.start(InFlight::BackingUp, Request::CreateBackup),
                }
            }
            Event::Cancelled => {
                self.confirm.take().ok_or(StateError::NothingToConfirm)?;
                Ok(Vec::new())
            }
            Event::RebuildSettled(outcome) => {
                self.finish(|f| matches!(f, InFlight::Rebuilding), name)?;
                Ok(vec![match outcome {
                    Ok(_) => banner(
                        BannerKind::Success,
                        "Index rebuild initiated. This may take a few minutes.",
                    ),
                    Err(err) => {
                        tracing::warn!(error = %err, "rebuild failed");
                        banner(
                            BannerKind::Error,
                            format!("Error rebuilding index: {}", err.user_message()),
                        )
                    }
                }])
            }
            Event::BackupSettled(outcome) => {
                self.finish(|f| matches!(f, InFlight::BackingUp), name)?;
                Ok(vec![match outcome {
                    Ok(receipt) => banner(
                        BannerKind::Success,
                        format!("Backup created at {}", receipt.backup_path),
                    ),
                    Err(err) => {
                        tracing::warn!(error = %err, "backup failed");
                        banner(
                            BannerKind::Error,
                            format!("Error creating backup: {}", err.user_message()),
                        )
                    }
                }])
            }

            Event::HealthRequested => self.start(InFlight::CheckingHealth, Request::CheckHealth),
            Event::HealthLoaded(outcome) => {
                self.finish(|f| matches!(f, InFlight::CheckingHealth), name)?;
                Ok(vec![match outcome {
                    Ok(health) => Effect::ShowHealth(health),
                    Err(err) => banner(
                        BannerKind::Error,
                        format!("Error checking system status: {}", err.user_message()),
                    ),
                }])
            }

            Event::StatsRequested => self.start(InFlight::FetchingStats, Request::FetchStats),
            Event::StatsLoaded(outcome) => {
                self.finish(|f| matches!(f, InFlight::FetchingStats), name)?;
                Ok(match outcome {
                    Ok(stats) => vec![Effect::ShowStats(stats)],
                    Err(err) if err.is_unauthorized() => self.expire(),
                    Err(err) => vec![banner(
                        BannerKind::Error,
                        format!("Error loading statistics: {}", err.user_message()),
                    )],
                })
            }

            Event::Logout => {
                self.ensure_idle()?;
                self.modal = None;
                self.confirm = None;
                self.signed_in = false;
                Ok(vec![Effect::ClearToken, Effect::RedirectToLogin])
            }
        }
    }

    fn ensure_idle(&self) -> Result<(), StateError> {
        if self.in_flight.is_some() {
            return Err(StateError::Busy);
        }
        Ok(())
    }

    fn start(&mut self, in_flight: InFlight, request: Request) -> Result<Vec<Effect>, StateError> {
        self.ensure_idle()?;
        self.in_flight = Some(in_flight);
        Ok(vec![Effect::Request(request)])
    }

    fn ask(&mut self, confirmation: Confirmation) -> Result<Vec<Effect>, StateError> {
        self.ensure_idle()?;
        self.confirm = Some(confirmation);
        Ok(vec![Effect::Prompt(confirmation)])
    }

    /// Clear the in-flight slot if it matches, otherwise reject the result.
    fn finish(
        &mut self,
        expected: impl Fn(&InFlight) -> bool,
        event: &'static str,
    ) -> Result<(), StateError> {
        match &self.in_flight {
            Some(f) if expected(f) => {
                self.in_flight = None;
                Ok(())
            }
            _ => Err(StateError::Unexpected {
                state: self.state_name(),
                event,
            }),
        }
    }

    fn unexpected<T>(&self, event: &'static str) -> Result<T, StateError> {
        Err(StateError::Unexpected {
            state: self.state_name(),
            event,
        })
    }

    fn state_name(&self) -> &'static str {
        match &self.in_flight {
            None => "idle",
            Some(InFlight::Listing) => "loading documents",
            Some(InFlight::Uploading(_)) => "uploading",
            Some(InFlight::Deleting(_)) => "deleting",
            Some(InFlight::Rebuilding) => "rebuilding the index",
            Some(InFlight::BackingUp) => "creating a backup",
            Some(InFlight::CheckingHealth) => "checking system status",
            Some(InFlight::FetchingStats) => "loading statistics",
        }
    }

    /// The backend rejected the token: forget it and go back to login.
    fn expire(&mut self) -> Vec<Effect> {
        tracing::info!("session expired; redirecting to login");
        self.signed_in = false;
        self.modal = None;
        self.confirm = None;
        vec![Effect::ClearToken, Effect::RedirectToLogin]
    }

    fn settle_upload(
        &mut self,
        queue: &mut UploadQueue,
        outcome: Result<UploadResponse, ApiError>,
    ) -> Vec<Effect> {
        let (index, total) = match queue.in_flight() {
            Some((index, _)) => (index, queue.total()),
            None => return Vec::new(),
        };
        let failure = match &outcome {
            Ok(resp) if resp.status.eq_ignore_ascii_case("error") => Some(resp.message.clone()),
            Ok(_) => None,
            Err(err) => Some(err.user_message()),
        };
        let ok = failure.is_none();
        let filename = queue
            .settle(ok)
            .map(|f| f.filename.clone())
            .unwrap_or_default();

        let mut effects = vec![Effect::UploadFileSettled {
            index,
            total,
            filename: filename.clone(),
            ok,
        }];
        match failure {
            None => effects.push(banner(
                BannerKind::Success,
                format!("'{}' uploaded successfully", filename),
            )),
            Some(message) => {
                tracing::warn!(filename = %filename, error = %message, "upload failed");
                effects.push(banner(
                    BannerKind::Error,
                    format!("Failed to upload '{}': {}", filename, message),
                ));
            }
        }

        if queue.is_finished() {
            effects.push(Effect::UploadFinished(queue.summary()));
            self.in_flight = Some(InFlight::Listing);
            effects.push(Effect::Request(Request::ListDocuments));
        } else {
            effects.extend(next_upload(queue));
        }
        effects
    }
}

fn next_upload(queue: &mut UploadQueue) -> Vec<Effect> {
    let percent = queue.percent();
    let total = queue.total();
    match queue.start_next() {
        Some((index, file)) => vec![
            Effect::UploadProgress {
                index,
                total,
                percent,
                filename: file.filename.clone(),
            },
            Effect::Request(Request::Upload { index, total, file }),
        ],
        None => Vec::new(),
    }
}

fn banner(kind: BannerKind, message: impl Into<String>) -> Effect {
    Effect::Banner {
        kind,
        message: message.into(),
    }
}

/// Applies admin effects to a concrete UI.
pub trait AdminView {
    fn apply(&mut self, effect: &Effect);
}

/// Drives an [`AdminMachine`] against a [`Backend`] and a [`Session`].
///
/// Requests run one at a time; each outcome is fed back before the next
/// queued event is handled, so an upload batch never has two files on the
/// wire.
pub struct AdminController {
    machine: AdminMachine,
    backend: Arc<dyn Backend>,
    session: Session,
}

impl AdminController {
    pub fn new(backend: Arc<dyn Backend>, session: Session) -> Self {
        let machine = AdminMachine::new(session.is_signed_in());
        Self {
            machine,
            backend,
            session,
        }
    }

    pub fn machine(&self) -> &AdminMachine {
        &self.machine
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn is_signed_in(&self) -> bool {
        self.machine.is_signed_in()
    }

    pub async fn dispatch(
        &mut self,
        event: Event,
        view: &mut dyn AdminView,
    ) -> Result<(), StateError> {
        let mut queue = VecDeque::from([event]);
        while let Some(event) = queue.pop_front() {
            let effects = self.machine.handle(event)?;
            let mut requests = Vec::new();
            for effect in effects {
                match effect {
                    Effect::Request(request) => requests.push(request),
                    Effect::ClearToken => {
                        if let Err(err) = self.session.sign_out() {
                            tracing::error!(error = %err, "failed to clear session token");
                        }
                        view.apply(&Effect::ClearToken);
                    }
                    other => view.apply(&other),
                }
            }
            for request in requests {
                queue.push_back(self.execute(request).await?);
            }
        }
        Ok(())
    }

    async fn execute(&self, request: Request) -> Result<Event, StateError> {
        let token = if request.needs_token() {
            self.session
                .token()
                .map(str::to_string)
                .ok_or(StateError::NotAuthenticated)?
        } else {
            String::new()
        };
        let backend = &self.backend;
        Ok(match request {
            Request::ListDocuments => Event::DocumentsLoaded(backend.list_documents(&token).await),
            Request::Upload { file, .. } => Event::UploadSettled(backend.upload(&token, &file).await),
            Request::DeleteDocument(filename) => {
                Event::DeleteSettled(backend.delete_document(&token, &filename).await)
            }
            Request::RebuildIndex => Event::RebuildSettled(backend.rebuild_index(&token).await),
            Request::CreateBackup => Event::BackupSettled(backend.backup(&token).await),
            Request::CheckHealth => Event::HealthLoaded(backend.health().await),
            Request::FetchStats => Event::StatsLoaded(backend.stats(&token).await),
        })
    }
}
