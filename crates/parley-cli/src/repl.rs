//! Interactive chat loop
//!
//! Reads one line at a time, renders the conversation with crossterm styling
//! and understands a few commands: `/clear`, `/history`, `/help`, `exit`.

use anyhow::Result;
use crossterm::style::Stylize;
use std::io::Write;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use crate::client::ChatClient;

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Message(String),
    Clear,
    History,
    Help,
    Exit,
    Empty,
}

impl Command {
    pub fn parse(line: &str) -> Self {
        let trimmed = line.trim();
        match trimmed.to_lowercase().as_str() {
            "" => Command::Empty,
            "exit" | "quit" | "/exit" | "/quit" => Command::Exit,
            "/clear" => Command::Clear,
            "/history" => Command::History,
            "/help" => Command::Help,
            _ => Command::Message(trimmed.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Speaker {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    pub speaker: Speaker,
    pub content: String,
}

/// What the user has seen so far; cleared together with the agent.
#[derive(Debug, Default)]
pub struct Transcript {
    entries: Vec<Entry>,
}

impl Transcript {
    pub fn push(&mut self, speaker: Speaker, content: impl Into<String>) {
        self.entries.push(Entry {
            speaker,
            content: content.into(),
        });
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

fn render_entry(out: &mut impl Write, entry: &Entry) -> std::io::Result<()> {
    match entry.speaker {
        Speaker::User => writeln!(out, "{} {}", "You:".bold().green(), entry.content),
        Speaker::Assistant => writeln!(out, "{} {}", "Assistant:".bold().cyan(), entry.content),
    }
}

pub struct Repl<C: ChatClient> {
    client: C,
    transcript: Transcript,
}

impl<C: ChatClient> Repl<C> {
    pub fn new(client: C) -> Self {
        Self {
            client,
            transcript: Transcript::default(),
        }
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    /// Handle one input line. Returns `false` once the user asked to leave.
    pub async fn handle_line(&mut self, line: &str, out: &mut impl Write) -> Result<bool> {
        match Command::parse(line) {
            Command::Empty => {}
            Command::Exit => return Ok(false),
            Command::Help => {
                writeln!(out, "{}", "Type a message and press Enter to chat.".dim())?;
                writeln!(out, "{}", "/clear resets the conversation, /history shows it again, exit quits.".dim())?;
            }
            Command::History => {
                if self.transcript.entries().is_empty() {
                    writeln!(out, "{}", "(no messages yet)".dim())?;
                }
                for entry in self.transcript.entries() {
                    render_entry(out, entry)?;
                }
            }
            Command::Clear => match self.client.clear_chat().await {
                Ok(true) => {
                    self.transcript.clear();
                    writeln!(out, "{}", "Conversation cleared.".yellow())?;
                }
                Ok(false) => writeln!(out, "{}", "The agent could not clear the conversation.".red())?,
                Err(e) => {
                    log::error!("Error clearing chat: {}", e);
                    writeln!(out, "{} {}", "Error:".bold().red(), e)?;
                }
            },
            Command::Message(message) => {
                self.transcript.push(Speaker::User, message.clone());
                let reply = match self.client.send_message(&message).await {
                    Ok(reply) => reply,
                    Err(e) => {
                        log::error!("Chat request failed: {}", e);
                        format!("Error: {}", e)
                    }
                };
                self.transcript.push(Speaker::Assistant, reply.clone());
                render_entry(
                    out,
                    &Entry {
                        speaker: Speaker::Assistant,
                        content: reply,
                    },
                )?;
            }
        }
        out.flush()?;
        Ok(true)
    }

    /// Run until `exit` or end of input.
    pub async fn run<R: AsyncBufRead + Unpin>(&mut self, input: R, out: &mut impl Write) -> Result<()> {
        writeln!(
            out,
            "{} {}",
            "Chatting with".bold(),
            self.client.name().bold().magenta()
        )?;
        writeln!(out, "{}", "Type /help for commands.".dim())?;

        let mut lines = input.lines();
        loop {
            write!(out, "{} ", ">".bold().green())?;
            out.flush()?;

            let Some(line) = lines.next_line().await? else {
                writeln!(out)?;
                break;
            };
            if !self.handle_line(&line, out).await? {
                break;
            }
        }

        writeln!(out, "{}", "Goodbye!".dim())?;
        Ok(())
    }
}
