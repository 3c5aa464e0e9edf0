//! Console commands and the stdin reader thread.
//!
//! Reading stdin blocks, so it lives on its own OS thread and forwards lines
//! with `blocking_send`; the poll loop drains them without waiting.

use tokio::sync::mpsc;

/// One typed command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostCommand {
    /// Feed a transcript to the speech recognizer.
    Hear(String),
    /// Simulate a gesture arriving (menu value or class index).
    Gesture(String),
    /// Run the `understand` block.
    Understand(String),
    /// Run the `speak` block.
    Speak(String),
    /// Run the `setvoice` block.
    Voice(String),
    /// Print lifecycle and channel state.
    Status,
    /// New program load: reset the lifecycle and hat edges.
    Reset,
    Help,
    Quit,
}

pub const USAGE: &str = "\
commands:
  hear <text>         speak to the recognizer
  gesture <name|n>    send a gesture (e.g. pan_left, 13)
  understand <text>   classify a sentence
  speak <text>        synthesise text
  voice <name>        set voice (or Random)
  status | reset | help | quit";

/// Parse a typed line.  Blank lines yield `None`; unknown words are an error
/// message.
pub fn parse_command(line: &str) -> Option<Result<HostCommand, String>> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim().to_string()),
        None => (line, String::new()),
    };

    let command = match word.to_lowercase().as_str() {
        "hear" => HostCommand::Hear(rest),
        "gesture" => HostCommand::Gesture(rest),
        "understand" => HostCommand::Understand(rest),
        "speak" => HostCommand::Speak(rest),
        "voice" => HostCommand::Voice(rest),
        "status" => HostCommand::Status,
        "reset" => HostCommand::Reset,
        "help" | "?" => HostCommand::Help,
        "quit" | "exit" => HostCommand::Quit,
        other => return Some(Err(format!("unknown command {other:?}; try help"))),
    };
    Some(Ok(command))
}

/// Spawn a thread that forwards stdin lines to `tx` until EOF or until the
/// receiver is dropped.
pub fn spawn_stdin_reader(tx: mpsc::Sender<String>) -> std::io::Result<std::thread::JoinHandle<()>> {
    std::thread::Builder::new()
        .name("stdin-reader".into())
        .spawn(move || {
            for line in std::io::stdin().lines() {
                let Ok(line) = line else { break };
                if tx.blocking_send(line).is_err() {
                    break;
                }
            }
            log::debug!("host: stdin closed");
        })
}
