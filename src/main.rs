//! # docquery CLI (`dq`)
//!
//! The `dq` binary asks questions against a document question-answering
//! backend and manages the documents it indexes.
//!
//! ## Usage
//!
//! ```bash
//! dq --config ./config/dq.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `dq ask "<question>"` | Ask a single question |
//! | `dq chat` | Interactive chat with history |
//! | `dq login --username <name>` | Sign in and store the session token |
//! | `dq logout` | Forget the session token |
//! | `dq admin list` | List uploaded documents |
//! | `dq admin upload <paths>...` | Upload files one at a time |
//! | `dq admin delete <filename>` | Delete a document |
//! | `dq admin rebuild` | Rebuild the index from all documents |
//! | `dq admin stats` | Show index statistics |
//! | `dq admin backup` | Back up the vector store |
//! | `dq health` | Show backend status |
//!
//! ## Examples
//!
//! ```bash
//! # One question, plain text
//! dq ask "What were the Q3 sales figures?"
//!
//! # Same, as JSON for scripts
//! dq ask "What were the Q3 sales figures?" --format json
//!
//! # Upload a folder of reports with JSON progress on stderr
//! dq admin upload ./reports --progress json
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use docquery::console::OutputFormat;
use docquery::progress::ProgressMode;
use docquery::{admin_cmd, chat, config, login};

/// docquery CLI, a terminal client for a document question-answering
/// service.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. Without one, built-in defaults are used and the backend is
/// expected at `http://localhost:8000` (override with `DQ_BASE_URL`).
#[derive(Parser)]
#[command(
    name = "dq",
    about = "docquery: ask questions about your documents and manage the index behind them",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/dq.toml`; a missing file means built-in defaults.
    #[arg(long, global = true, default_value = "./config/dq.toml")]
    config: PathBuf,

    /// Verbose logging (debug level). `DQ_LOG` takes precedence.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Ask a single question.
    ///
    /// Prints the answer, every source with its excerpt, and the
    /// processing time.
    Ask {
        /// The question.
        question: String,

        /// Output format.
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Interactive chat.
    ///
    /// Reads questions from stdin. `/1`..`/4` ask an example question,
    /// `/new` starts over, `/quit` leaves.
    Chat {
        /// Output format.
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Sign in as an administrator and store the session token.
    Login {
        #[arg(long, short)]
        username: String,

        /// Password. Falls back to `DQ_PASSWORD`, then a prompt on stdin.
        #[arg(long)]
        password: Option<String>,
    },

    /// Forget the stored session token.
    Logout,

    /// Manage indexed documents. Requires `dq login`.
    Admin {
        #[command(subcommand)]
        action: AdminAction,
    },

    /// Show backend status and version. No sign-in needed.
    Health {
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },
}

/// Document management subcommands.
#[derive(Subcommand)]
enum AdminAction {
    /// List uploaded documents with their indexing status.
    List {
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Upload files, strictly one at a time.
    ///
    /// Directories are walked recursively for .pdf, .docx, .doc, .xlsx and
    /// .xls files. A failed file is reported and the rest still upload.
    Upload {
        /// Files or directories.
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Progress on stderr: auto (human if TTY), off, human, json.
        #[arg(long, default_value = "auto")]
        progress: ProgressMode,

        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Delete a document and remove it from the index.
    Delete {
        filename: String,

        /// Skip the confirmation prompt.
        #[arg(long, short)]
        yes: bool,

        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Rebuild the index from every uploaded document.
    ///
    /// The backend only acknowledges the start; this may take minutes.
    Rebuild {
        #[arg(long, short)]
        yes: bool,

        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Show index statistics.
    Stats {
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Back up the vector store on the server.
    Backup {
        #[arg(long, short)]
        yes: bool,

        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },
}

fn init_tracing(verbose: bool) -> anyhow::Result<()> {
    let level = if verbose { "debug" } else { "warn" };

    let filter = tracing_subscriber::EnvFilter::try_from_env("DQ_LOG")
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|error| anyhow::anyhow!("failed to initialize tracing subscriber: {error}"))?;

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose)?;

    let cfg = config::load_or_default(&cli.config)?;

    match cli.command {
        Commands::Ask { question, format } => {
            chat::run_ask(&cfg, &question, format).await?;
        }
        Commands::Chat { format } => {
            chat::run_chat(&cfg, format).await?;
        }
        Commands::Login { username, password } => {
            login::run_login(&cfg, &username, password).await?;
        }
        Commands::Logout => {
            login::run_logout(&cfg).await?;
        }
        Commands::Admin { action } => match action {
            AdminAction::List { format } => {
                admin_cmd::run_list(&cfg, format).await?;
            }
            AdminAction::Upload {
                paths,
                progress,
                format,
            } => {
                admin_cmd::run_upload(&cfg, &paths, progress, format).await?;
            }
            AdminAction::Delete {
                filename,
                yes,
                format,
            } => {
                admin_cmd::run_delete(&cfg, &filename, yes, format).await?;
            }
            AdminAction::Rebuild { yes, format } => {
                admin_cmd::run_rebuild(&cfg, yes, format).await?;
            }
            AdminAction::Stats { format } => {
                admin_cmd::run_stats(&cfg, format).await?;
            }
            AdminAction::Backup { yes, format } => {
                admin_cmd::run_backup(&cfg, yes, format).await?;
            }
        },
        Commands::Health { format } => {
            admin_cmd::run_health(&cfg, format).await?;
        }
    }

    Ok(())
}
