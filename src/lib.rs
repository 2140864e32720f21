//! # docquery
//!
//! Client for a retrieval-augmented document question-answering service.
//!
//! The backend does the hard work (chunking, embedding, vector search and
//! answer generation). This crate is the interaction layer in front of it: a
//! typed API client and two explicit state machines that decide what the
//! user sees and which request goes out next.
//!
//! ## Architecture
//!
//! ```text
//!  ┌──────────────┐ events  ┌──────────────┐ commands ┌────────────┐
//!  │ TerminalView │────────▶│ QueryMachine │─────────▶│ ApiClient  │──▶ /api/query
//!  │   (dq CLI)   │◀────────│ AdminMachine │◀─────────│ (Backend)  │──▶ /api/admin/*
//!  └──────────────┘ effects └──────┬───────┘ outcomes └────────────┘──▶ /health
//!                                  │
//!                            ┌─────▼─────┐
//!                            │  Session  │ token in storage.json
//!                            └───────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! dq ask "What were the Q3 sales figures?"
//! dq chat
//! dq login --username admin
//! dq admin upload ./reports
//! dq admin list
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`api`] | `Backend` trait and the `reqwest` client |
//! | [`query`] | Query state machine and controller |
//! | [`admin`] | Admin state machine and controller |
//! | [`session`] | Persisted bearer token |
//! | [`upload`] | Sequential upload queue |
//! | [`render`] | Escaping, answer markup, badges, sizes |
//! | [`stats`] | Index statistics and system status panels |
//! | [`console`] | Terminal view for both machines |
//! | [`progress`] | Upload progress on stderr |
//! | [`config`] | TOML configuration |
//! | [`models`] | Wire types |
//! | [`error`] | Error types |

pub mod admin;
pub mod admin_cmd;
pub mod api;
pub mod chat;
pub mod config;
pub mod console;
pub mod error;
pub mod login;
pub mod models;
pub mod progress;
pub mod query;
pub mod render;
pub mod session;
pub mod stats;
pub mod upload;
