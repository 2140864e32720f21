//! `dq ask` and `dq chat`.
//!
//! Both commands drive a [`QueryController`]: `ask` sends one question in
//! the single-shot variant, `chat` keeps a transcript and reads questions
//! from stdin until `/quit` or end of input.

use std::sync::Arc;

use anyhow::Result;

use crate::api::{ApiClient, Backend};
use crate::config::Config;
use crate::console::{LineReader, OutputFormat, TerminalView};
use crate::error::StateError;
use crate::progress::NoProgress;
use crate::query::{Event, QueryController, QueryMachine, Variant};

pub async fn run_ask(config: &Config, question: &str, format: OutputFormat) -> Result<()> {
    let backend: Arc<dyn Backend> = Arc::new(ApiClient::new(config)?);
    let machine = QueryMachine::new(Variant::SingleShot, &config.query);
    let mut controller = QueryController::new(machine, backend);
    let mut view = TerminalView::new(format, Box::new(NoProgress));

    controller
        .dispatch(Event::Submit(question.to_string()), &mut view)
        .await?;

    if view.failed() {
        std::process::exit(1);
    }
    Ok(())
}

/// A line typed at the chat prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
enum ChatInput {
    Question(String),
    Example(usize),
    NewChat,
    Quit,
    Help,
}

fn parse_input(line: &str) -> ChatInput {
    let trimmed = line.trim();
    match trimmed {
        "/quit" | "/exit" | "/q" => ChatInput::Quit,
        "/new" => ChatInput::NewChat,
        "/help" | "/?" => ChatInput::Help,
        _ => match trimmed.strip_prefix('/').map(str::parse::<usize>) {
            Some(Ok(n)) if n >= 1 => ChatInput::Example(n - 1),
            _ => ChatInput::Question(line.to_string()),
        },
    }
}

const HELP: &str = "Type a question and press Enter.\n  \
/1../N  ask an example question\n  \
/new    start a new chat\n  \
/quit   leave";

pub async fn run_chat(config: &Config, format: OutputFormat) -> Result<()> {
    let backend: Arc<dyn Backend> = Arc::new(ApiClient::new(config)?);
    let machine = QueryMachine::new(Variant::Chat, &config.query);
    let mut controller = QueryController::new(machine, backend);
    let mut view = TerminalView::new(format, Box::new(NoProgress));
    let mut input = LineReader::stdin();
    let interactive = atty::is(atty::Stream::Stdin);

    welcome(controller.machine().examples());

    loop {
        if interactive {
            eprint!("> ");
        }
        let Some(line) = input.next_line().await? else {
            break;
        };

        let event = match parse_input(&line) {
            ChatInput::Quit => break,
            ChatInput::Help => {
                eprintln!("{}", HELP);
                continue;
            }
            ChatInput::Question(q) => Event::Submit(q),
            ChatInput::Example(i) => Event::ExampleSelected(i),
            ChatInput::NewChat => {
                controller.dispatch(Event::NewChatRequested, &mut view).await?;
                let confirmed = input
                    .confirm("Start a new chat? The current conversation will be cleared.")
                    .await?;
                if confirmed {
                    Event::NewChatConfirmed
                } else {
                    Event::NewChatCancelled
                }
            }
        };

        view.reset();
        match controller.dispatch(event, &mut view).await {
            Ok(()) => {}
            Err(err @ StateError::UnknownExample(_)) => eprintln!("{}", err),
            Err(err) => return Err(err.into()),
        }
    }

    tracing::debug!(turns = controller.machine().history().len(), "chat ended");
    Ok(())
}

fn welcome(examples: &[String]) {
    println!("Ask a question about your documents. Type /help for commands.");
    for (i, example) in examples.iter().enumerate() {
        println!("  /{}  {}", i + 1, example);
    }
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_commands() {
        assert_eq!(parse_input("/quit"), ChatInput::Quit);
        assert_eq!(parse_input("  /new "), ChatInput::NewChat);
        assert_eq!(parse_input("/2"), ChatInput::Example(1));
        assert_eq!(parse_input("/help"), ChatInput::Help);
    }

    #[test]
    fn everything_else_is_a_question() {
        assert_eq!(
            parse_input("What is /etc?"),
            ChatInput::Question("What is /etc?".into())
        );
        assert_eq!(parse_input("/0"), ChatInput::Question("/0".into()));
        assert_eq!(parse_input("/usr"), ChatInput::Question("/usr".into()));
        assert_eq!(parse_input(""), ChatInput::Question("".into()));
    }
}
