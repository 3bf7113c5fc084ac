use std::io::{self, Write};

use chrono::Local;
use futures::FutureExt;
use futures::future::{BoxFuture, OptionFuture};
use saathi_llm::ASSISTANT_NAME;
use snafu::{ResultExt, Snafu};
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::chat::{ChatController, ConversationSnapshot, Message, MessageId, Role, SubmitOutcome};

pub const USER_LABEL: &str = "Aap";
pub const DISCLAIMER: &str = "AI can make mistakes. Please verify important financial information.";
pub const BUSY_HINT: &str = "(Jawab aa raha hai, thora intezar karein...)";

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum AppError {
    #[snafu(display("failed to read terminal input on `{stage}`: {source}"))]
    ReadInput {
        stage: &'static str,
        source: io::Error,
    },
    #[snafu(display("failed to write terminal output on `{stage}`: {source}"))]
    WriteOutput {
        stage: &'static str,
        source: io::Error,
    },
}

/// One line of user input, interpreted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Send(String),
    NewChat,
    Help,
    Quit,
    Blank,
}

impl Command {
    pub fn parse(line: &str) -> Self {
        let trimmed = line.trim();
        match trimmed {
            "" => Self::Blank,
            "/new" => Self::NewChat,
            "/help" | "/?" => Self::Help,
            "/quit" | "/exit" => Self::Quit,
            _ => Self::Send(line.trim_end_matches(['\r', '\n']).to_string()),
        }
    }
}

/// Prints each message once, in order, plus a one-off line when a reply is pending.
///
/// Tracks the last printed id rather than a count so a reset followed by new messages is
/// still printed correctly.
#[derive(Debug, Default)]
pub struct TranscriptPrinter {
    last_printed: Option<MessageId>,
    was_loading: bool,
}

impl TranscriptPrinter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn render(
        &mut self,
        snapshot: &ConversationSnapshot,
        out: &mut impl Write,
    ) -> io::Result<()> {
        let already_printed = self.last_printed;
        for message in snapshot
            .messages
            .iter()
            .filter(|message| already_printed.is_none_or(|last| message.id > last))
        {
            writeln!(out, "{}", format_message(message))?;
            self.last_printed = Some(message.id);
        }

        if snapshot.is_loading && !self.was_loading {
            writeln!(out, "{ASSISTANT_NAME} soch raha hai...")?;
        }
        self.was_loading = snapshot.is_loading;
        out.flush()
    }
}

pub fn format_message(message: &Message) -> String {
    let time = message.timestamp.with_timezone(&Local).format("%H:%M");
    match (message.role, message.is_error) {
        (Role::User, _) => format!("[{time}] {USER_LABEL}: {}", message.content),
        (Role::Model, false) => format!("[{time}] {ASSISTANT_NAME}: {}", message.content),
        (Role::Model, true) => {
            format!("[{time}] {ASSISTANT_NAME} (error): {}", message.content)
        }
    }
}

pub fn write_banner(out: &mut impl Write) -> io::Result<()> {
    writeln!(out, "Salam! {ASSISTANT_NAME} here.")?;
    writeln!(
        out,
        "Business ideas, marketing strategies, aur cost estimates for the Pakistani market."
    )?;
    writeln!(out, "{DISCLAIMER}")?;
    writeln!(out, "Type /help for commands.")?;
    writeln!(out)
}

pub fn write_help(out: &mut impl Write) -> io::Result<()> {
    writeln!(out, "  /new   start a new chat")?;
    writeln!(out, "  /help  show this list")?;
    writeln!(out, "  /quit  exit (Ctrl-D works too)")
}

/// Drives the conversation from stdin until `/quit` or end of input.
///
/// Input, the outstanding turn, and redraws share one task: reading the next line never
/// waits on the model, and the model reply is printed as soon as it settles.
pub async fn run(controller: &ChatController) -> Result<(), AppError> {
    let stdout = io::stdout();
    let mut printer = TranscriptPrinter::new();
    let mut updates = controller.subscribe();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut in_flight: Option<BoxFuture<'_, SubmitOutcome>> = None;

    write_banner(&mut stdout.lock()).context(WriteOutputSnafu { stage: "banner" })?;

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context(ReadInputSnafu { stage: "next-line" })? else {
                    break;
                };

                match Command::parse(&line) {
                    Command::Quit => break,
                    Command::Blank => {}
                    Command::Help => {
                        write_help(&mut stdout.lock())
                            .context(WriteOutputSnafu { stage: "help" })?;
                    }
                    Command::NewChat => {
                        controller.reset();
                        writeln!(stdout.lock(), "--- New Chat ---")
                            .context(WriteOutputSnafu { stage: "new-chat" })?;
                    }
                    Command::Send(text) => {
                        if in_flight.is_some() {
                            // The controller drops it anyway; tell the user why nothing happened.
                            let outcome = controller.submit(text).await;
                            tracing::debug!(?outcome, "submit while awaiting a reply");
                            writeln!(stdout.lock(), "{BUSY_HINT}")
                                .context(WriteOutputSnafu { stage: "busy-hint" })?;
                        } else {
                            in_flight = Some(controller.submit(text).boxed());
                        }
                    }
                }
            }
            Some(outcome) = OptionFuture::from(in_flight.as_mut()), if in_flight.is_some() => {
                tracing::debug!(?outcome, "turn finished");
                in_flight = None;
            }
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = updates.borrow_and_update().clone();
                printer
                    .render(&snapshot, &mut stdout.lock())
                    .context(WriteOutputSnafu { stage: "render" })?;
            }
        }
    }

    if in_flight.is_some() {
        tracing::info!("exiting with a reply still pending");
    }
    Ok(())
}
