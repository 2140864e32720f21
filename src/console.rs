//! Terminal front end for the interaction machines.
//!
//! [`TerminalView`] applies query and admin effects to stdout/stderr in one
//! of three output formats. Results go to stdout; notices, banners and
//! progress go to stderr so piped output stays clean. Effects that only make
//! sense for a graphical UI (focus, scrolling, enabling controls) are no-ops
//! here.

use std::io::Write;

use anyhow::Result;
use clap::ValueEnum;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};

use crate::admin::{self, AdminView, BannerKind};
use crate::progress::{UploadProgressEvent, UploadProgressReporter};
use crate::query::{self, QueryView};
use crate::render::{
    assistant_bubble_html, document_table_html, document_table_text, error_alert_html,
    user_bubble_html,
};
use crate::stats;

/// How results are printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Plain text for humans.
    #[default]
    Text,
    /// Escaped HTML fragments.
    Html,
    /// JSON, one value per result.
    Json,
}

pub struct TerminalView {
    format: OutputFormat,
    progress: Box<dyn UploadProgressReporter>,
    interactive: bool,
    failed: bool,
    redirected: bool,
}

impl TerminalView {
    pub fn new(format: OutputFormat, progress: Box<dyn UploadProgressReporter>) -> Self {
        Self {
            format,
            progress,
            interactive: atty::is(atty::Stream::Stderr),
            failed: false,
            redirected: false,
        }
    }

    /// Whether anything shown since the last [`TerminalView::reset`] was an error.
    pub fn failed(&self) -> bool {
        self.failed
    }

    /// Whether the session guard sent the user back to login.
    pub fn redirected(&self) -> bool {
        self.redirected
    }

    pub fn reset(&mut self) {
        self.failed = false;
        self.redirected = false;
    }

    fn json(&self, value: &impl serde::Serialize) {
        match serde_json::to_string_pretty(value) {
            Ok(s) => println!("{}", s),
            Err(e) => eprintln!("Error: cannot encode result: {}", e),
        }
    }

    fn error(&mut self, message: &str) {
        self.failed = true;
        match self.format {
            OutputFormat::Text => eprintln!("Error: {}", message),
            OutputFormat::Html => println!("{}", error_alert_html(message)),
            OutputFormat::Json => self.json(&serde_json::json!({ "error": message })),
        }
    }

    fn status_line(&self, line: &str) {
        if self.interactive && self.format == OutputFormat::Text {
            let mut err = std::io::stderr().lock();
            let _ = write!(err, "\r{:<40}\r{}", "", line);
            let _ = err.flush();
        }
    }
}

impl QueryView for TerminalView {
    fn apply(&mut self, effect: &query::Effect) {
        use query::Effect;
        match effect {
            Effect::Notice(message) => {
                self.failed = true;
                eprintln!("{}", message);
            }
            Effect::AppendUserBubble(question) => {
                if self.format == OutputFormat::Html {
                    println!("{}", user_bubble_html(question));
                }
            }
            Effect::ShowTyping => self.status_line("thinking..."),
            Effect::RemoveTyping => self.status_line(""),
            Effect::RenderAnswer(view) => match self.format {
                OutputFormat::Text => println!("{}\n", view.to_terminal()),
                OutputFormat::Html => println!("{}", assistant_bubble_html(view)),
                OutputFormat::Json => self.json(&view.answer),
            },
            Effect::RenderError(message) => self.error(message),
            Effect::ResetTranscript { examples } => {
                println!("Ask a question about your documents.");
                for (i, example) in examples.iter().enumerate() {
                    println!("  /{}  {}", i + 1, example);
                }
                println!();
            }
            Effect::SetInputEnabled(_)
            | Effect::SetSubmitLabel(_)
            | Effect::HideResults
            | Effect::FocusInput
            | Effect::ScrollToEnd { .. }
            | Effect::ConfirmNewChat
            | Effect::Send(_) => {}
        }
    }
}

impl AdminView for TerminalView {
    fn apply(&mut self, effect: &admin::Effect) {
        use admin::Effect;
        match effect {
            Effect::RedirectToLogin => {
                self.failed = true;
                self.redirected = true;
                eprintln!("Not signed in. Run `dq login --username <name>` first.");
            }
            Effect::ClearToken => tracing::debug!("session token cleared"),
            Effect::Banner { kind, message } => match kind {
                BannerKind::Error => {
                    self.failed = true;
                    eprintln!("Error: {}", message);
                }
                BannerKind::Success | BannerKind::Info => eprintln!("{}", message),
            },
            Effect::UploadProgress {
                index,
                total,
                percent,
                filename,
            } => self.progress.report(&UploadProgressEvent::Started {
                filename: filename.clone(),
                index: *index,
                total: *total,
                percent: *percent,
            }),
            Effect::UploadFileSettled {
                index,
                total,
                filename,
                ok,
            } => self.progress.report(&UploadProgressEvent::Settled {
                filename: filename.clone(),
                index: *index,
                total: *total,
                ok: *ok,
            }),
            Effect::UploadFinished(summary) => {
                self.progress.report(&UploadProgressEvent::Finished {
                    total: summary.total,
                    succeeded: summary.succeeded,
                    failed: summary.failed,
                });
                if self.format == OutputFormat::Json {
                    self.json(&serde_json::json!({
                        "total": summary.total,
                        "succeeded": summary.succeeded,
                        "failed": summary.failed,
                    }));
                }
            }
            Effect::ShowDocuments(docs) => match self.format {
                OutputFormat::Text => println!("{}", document_table_text(docs)),
                OutputFormat::Html => println!("{}", document_table_html(docs)),
                OutputFormat::Json => self.json(docs),
            },
            Effect::ShowEmptyDocuments => match self.format {
                OutputFormat::Text => println!("{}", document_table_text(&[])),
                OutputFormat::Html => println!("{}", document_table_html(&[])),
                OutputFormat::Json => println!("[]"),
            },
            Effect::ShowListError(message) => self.error(message),
            Effect::ShowHealth(health) => match self.format {
                OutputFormat::Text => print!("{}", stats::health_text(health)),
                OutputFormat::Html => println!("{}", stats::health_html(health)),
                OutputFormat::Json => self.json(health),
            },
            Effect::ShowStats(index_stats) => match self.format {
                OutputFormat::Text => print!("{}", stats::stats_text(index_stats)),
                OutputFormat::Html => println!("{}", stats::stats_html(index_stats)),
                OutputFormat::Json => self.json(index_stats),
            },
            Effect::OpenDeleteModal(_)
            | Effect::CloseDeleteModal
            | Effect::Prompt(_)
            | Effect::Request(_) => {}
        }
    }
}

/// Line-oriented stdin for the interactive commands.
pub struct LineReader {
    lines: Lines<BufReader<Stdin>>,
}

impl LineReader {
    pub fn stdin() -> Self {
        Self {
            lines: BufReader::new(tokio::io::stdin()).lines(),
        }
    }

    /// Next line without its terminator, or `None` at end of input.
    pub async fn next_line(&mut self) -> Result<Option<String>> {
        Ok(self.lines.next_line().await?)
    }

    /// Ask a yes/no question on stderr. Anything but `y`/`yes` is a no.
    pub async fn confirm(&mut self, prompt: &str) -> Result<bool> {
        eprint!("{} [y/N] ", prompt);
        let _ = std::io::stderr().flush();
        Ok(self
            .next_line()
            .await?
            .map(|answer| matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
            .unwrap_or(false))
    }
}
