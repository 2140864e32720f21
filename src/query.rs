//! Query interaction state machine.
//!
//! ```text
//!            Submit (non-empty)            Settled(Ok | Err)
//!   ┌──────┐ ─────────────────▶ ┌─────────┐ ─────────────────▶ Success | Error
//!   │ Idle │                    │ Pending │                         │
//!   └──────┘ ◀──────────────────┴─────────┴─────────────────────────┘
//!      │  ▲        (always: re-enable input, focus, scroll)
//!      │  └─ NewChatConfirmed / NewChatCancelled
//!      ▼
//!   ConfirmingNewChat   (chat variant only)
//! ```
//!
//! [`QueryMachine::handle`] is pure: it consumes an [`Event`] and returns the
//! [`Effect`]s the front end must apply, including the [`Effect::Send`]
//! command that asks the controller to perform the network call. The
//! success and error states are transient; once their effects are emitted
//! the machine is back in [`QueryState::Idle`].

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use crate::api::Backend;
use crate::config::QueryConfig;
use crate::error::{ApiError, StateError};
use crate::models::{Answer, ChatTurn, Query};
use crate::render::AnswerView;

/// Presentation variant of the query front end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variant {
    /// One result panel, replaced on every question.
    SingleShot,
    /// Running transcript with history.
    Chat,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryState {
    Idle,
    Pending { question: String },
    ConfirmingNewChat,
}

impl QueryState {
    fn name(&self) -> &'static str {
        match self {
            QueryState::Idle => "idle",
            QueryState::Pending { .. } => "waiting for an answer",
            QueryState::ConfirmingNewChat => "confirming a new chat",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// Submit button or accelerator key.
    Submit(String),
    /// A preset example question was picked (0-based).
    ExampleSelected(usize),
    /// The network call finished.
    Settled(Result<Answer, ApiError>),
    NewChatRequested,
    NewChatConfirmed,
    NewChatCancelled,
}

impl Event {
    fn name(&self) -> &'static str {
        match self {
            Event::Submit(_) => "submit",
            Event::ExampleSelected(_) => "example question",
            Event::Settled(_) => "query result",
            Event::NewChatRequested => "new chat",
            Event::NewChatConfirmed => "new chat confirmation",
            Event::NewChatCancelled => "new chat cancellation",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitLabel {
    Ready,
    Loading,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Blocking notice; nothing else changes.
    Notice(String),
    SetInputEnabled(bool),
    SetSubmitLabel(SubmitLabel),
    /// Single-shot: hide the previous result and the empty-state placeholder.
    HideResults,
    AppendUserBubble(String),
    ShowTyping,
    RemoveTyping,
    RenderAnswer(AnswerView),
    RenderError(String),
    FocusInput,
    ScrollToEnd { delay: Duration },
    /// Ask the user to confirm discarding the conversation.
    ConfirmNewChat,
    /// Empty transcript with the welcome placeholder and example shortcuts.
    ResetTranscript { examples: Vec<String> },
    /// Command: perform the query call and feed back [`Event::Settled`].
    Send(Query),
}

/// Explicit state machine behind both query front ends.
#[derive(Debug, Clone)]
pub struct QueryMachine {
    variant: Variant,
    state: QueryState,
    history: Vec<ChatTurn>,
    top_k: u32,
    source_limit: usize,
    scroll_delay: Duration,
    examples: Vec<String>,
}

impl QueryMachine {
    pub fn new(variant: Variant, config: &QueryConfig) -> Self {
        Self {
            variant,
            state: QueryState::Idle,
            history: Vec::new(),
            top_k: config.top_k,
            source_limit: config.chat_source_limit,
            scroll_delay: config.scroll_settle(),
            examples: config.examples.clone(),
        }
    }

    pub fn variant(&self) -> Variant {
        self.variant
    }

    pub fn state(&self) -> &QueryState {
        &self.state
    }

    pub fn history(&self) -> &[ChatTurn] {
        &self.history
    }

    pub fn examples(&self) -> &[String] {
        &self.examples
    }

    pub fn handle(&mut self, event: Event) -> Result<Vec<Effect>, StateError> {
        match (&self.state, event) {
            (QueryState::Idle, Event::Submit(question)) => Ok(self.submit(&question)),
            (QueryState::Idle, Event::ExampleSelected(idx)) => {
                let question = self
                    .examples
                    .get(idx)
                    .cloned()
                    .ok_or(StateError::UnknownExample(idx + 1))?;
                Ok(self.submit(&question))
            }
            (QueryState::Pending { .. }, Event::Submit(_) | Event::ExampleSelected(_)) => {
                Err(StateError::Busy)
            }
            (QueryState::Pending { .. }, Event::Settled(outcome)) => Ok(self.settle(outcome)),

            (_, Event::NewChatRequested) if self.variant != Variant::Chat => {
                Err(StateError::NotChat)
            }
            (QueryState::Idle, Event::NewChatRequested) => {
                self.state = QueryState::ConfirmingNewChat;
                Ok(vec![Effect::ConfirmNewChat])
            }
            (QueryState::Pending { .. }, Event::NewChatRequested) => Err(StateError::Busy),
            (QueryState::ConfirmingNewChat, Event::NewChatConfirmed) => {
                self.history.clear();
                self.state = QueryState::Idle;
                Ok(vec![
                    Effect::ResetTranscript {
                        examples: self.examples.clone(),
                    },
                    Effect::FocusInput,
                ])
            }
            (QueryState::ConfirmingNewChat, Event::NewChatCancelled) => {
                self.state = QueryState::Idle;
                Ok(vec![Effect::FocusInput])
            }
            (_, Event::NewChatConfirmed | Event::NewChatCancelled) => {
                Err(StateError::NothingToConfirm)
            }

            (state, event) => Err(StateError::Unexpected {
                state: state.name(),
                event: event.name(),
            }),
        }
    }

    fn submit(&mut self, raw: &str) -> Vec<Effect> {
        let question = raw.trim();
        if question.is_empty() {
            return vec![Effect::Notice("Please enter a question.".to_string())];
        }

        self.state = QueryState::Pending {
            question: question.to_string(),
        };

        let mut effects = vec![
            Effect::SetInputEnabled(false),
            Effect::SetSubmitLabel(SubmitLabel::Loading),
        ];
        match self.variant {
            Variant::SingleShot => effects.push(Effect::HideResults),
            Variant::Chat => {
                effects.push(Effect::AppendUserBubble(question.to_string()));
                effects.push(Effect::ShowTyping);
                effects.push(Effect::ScrollToEnd {
                    delay: self.scroll_delay,
                });
            }
        }
        effects.push(Effect::Send(Query::new(question, self.top_k)));
        effects
    }

    fn settle(&mut self, outcome: Result<Answer, ApiError>) -> Vec<Effect> {
        let question = match std::mem::replace(&mut self.state, QueryState::Idle) {
            QueryState::Pending { question } => question,
            _ => String::new(),
        };

        let mut effects = Vec::new();
        if self.variant == Variant::Chat {
            effects.push(Effect::RemoveTyping);
        }

        match outcome {
            Ok(answer) => {
                let view = match self.variant {
                    Variant::SingleShot => AnswerView::full(answer.clone()),
                    Variant::Chat => AnswerView::compact(answer.clone(), self.source_limit),
                };
                if self.variant == Variant::Chat {
                    self.history.push(ChatTurn {
                        question,
                        answer: answer.answer,
                        sources: answer.sources,
                        timestamp: chrono::Utc::now(),
                    });
                }
                effects.push(Effect::RenderAnswer(view));
            }
            Err(err) => {
                tracing::warn!(error = %err, "query failed");
                effects.push(Effect::RenderError(format!(
                    "Sorry, something went wrong: {}",
                    err.user_message()
                )));
            }
        }

        effects.push(Effect::SetInputEnabled(true));
        effects.push(Effect::SetSubmitLabel(SubmitLabel::Ready));
        effects.push(Effect::FocusInput);
        if self.variant == Variant::Chat {
            effects.push(Effect::ScrollToEnd {
                delay: self.scroll_delay,
            });
        }
        effects
    }
}

/// Applies query effects to a concrete UI.
pub trait QueryView {
    fn apply(&mut self, effect: &Effect);
}

/// Drives a [`QueryMachine`] against a [`Backend`].
///
/// View effects are applied before the command in the same batch runs, so
/// the UI is already in its pending state while the request is in flight.
pub struct QueryController {
    machine: QueryMachine,
    backend: Arc<dyn Backend>,
}

impl QueryController {
    pub fn new(machine: QueryMachine, backend: Arc<dyn Backend>) -> Self {
        Self { machine, backend }
    }

    pub fn machine(&self) -> &QueryMachine {
        &self.machine
    }

    pub async fn dispatch(
        &mut self,
        event: Event,
        view: &mut dyn QueryView,
    ) -> Result<(), StateError> {
        let mut queue = VecDeque::from([event]);
        while let Some(event) = queue.pop_front() {
            let effects = self.machine.handle(event)?;
            let mut commands = Vec::new();
            for effect in effects {
                match effect {
                    Effect::Send(query) => commands.push(query),
                    other => view.apply(&other),
                }
            }
            for query in commands {
                let outcome = self.backend.query(&query).await;
                queue.push_back(Event::Settled(outcome));
            }
        }
        Ok(())
    }
}
