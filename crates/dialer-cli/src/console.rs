//! Line-oriented operator console: command parsing and output formatting.

use dialer_session::{Notification, SessionHandle};
use dialer_types::CallState;
use std::io::BufRead;
use thiserror::Error;
use tokio::sync::mpsc;

/// Help text printed for `help` and on unknown commands.
pub const HELP: &str = "\
commands:
  call <number> [text...]  place a call, optionally speaking text on connect
  say <text>               speak text into the active call
  hangup                   end the call
  status                   show the current state
  quit                     tear down and exit";

/// One parsed console line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Call {
        target: String,
        text: Option<String>,
    },
    Say(String),
    Hangup,
    Status,
    Help,
    Quit,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConsoleError {
    #[error("unknown command: {0}")]
    Unknown(String),

    #[error("{0} needs an argument")]
    MissingArgument(&'static str),
}

impl ConsoleCommand {
    /// Parses one input line. Blank lines yield `Ok(None)`.
    pub fn parse(line: &str) -> Result<Option<Self>, ConsoleError> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }
        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (line, ""),
        };

        let command = match word.to_ascii_lowercase().as_str() {
            "call" | "dial" => {
                let (target, text) = match rest.split_once(char::is_whitespace) {
                    Some((target, text)) => (target, Some(text.trim())),
                    None => (rest, None),
                };
                if target.is_empty() {
                    return Err(ConsoleError::MissingArgument("call"));
                }
                Self::Call {
                    target: target.to_string(),
                    text: text.filter(|t| !t.is_empty()).map(str::to_string),
                }
            }
            "say" => {
                if rest.is_empty() {
                    return Err(ConsoleError::MissingArgument("say"));
                }
                Self::Say(rest.to_string())
            }
            "hangup" | "end" => Self::Hangup,
            "status" => Self::Status,
            "help" | "?" => Self::Help,
            "quit" | "exit" => Self::Quit,
            other => return Err(ConsoleError::Unknown(other.to_string())),
        };
        Ok(Some(command))
    }
}

/// Runs `command` against the session and returns the line to print, if
/// any. `Quit` is handled by the caller.
pub async fn execute(handle: &SessionHandle, command: ConsoleCommand) -> Option<String> {
    let result = match command {
        ConsoleCommand::Call { target, text } => handle.start(target, text).await,
        ConsoleCommand::Say(text) => handle.send_text(text).await,
        ConsoleCommand::Hangup => handle.end().await,
        ConsoleCommand::Status => return Some(status_line(handle.state())),
        ConsoleCommand::Help => return Some(HELP.to_string()),
        ConsoleCommand::Quit => return None,
    };
    result.err().map(|e| format!("error: {e}"))
}

/// Reads lines from `reader` on a dedicated thread and forwards them.
///
/// A blocked read never holds up runtime shutdown: the thread is detached
/// and dies with the process. The channel closes at end of input.
pub fn spawn_line_reader<R>(
    reader: R,
) -> std::io::Result<mpsc::UnboundedReceiver<std::io::Result<String>>>
where
    R: BufRead + Send + 'static,
{
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::Builder::new()
        .name("dialer-console".to_string())
        .spawn(move || {
            for line in reader.lines() {
                if tx.send(line).is_err() {
                    break;
                }
            }
        })?;
    Ok(rx)
}

pub fn status_line(state: CallState) -> String {
    let hint = match state {
        CallState::Uninitialized => "no device registered",
        CallState::DeviceInitializing => "registering device",
        CallState::DeviceReady => "ready to call",
        CallState::Connecting => "dialing",
        CallState::Active => "in call, use `say` to speak",
        CallState::Ending => "hanging up",
        CallState::Ended => "call ended, ready to call",
        CallState::Failed => "call failed, ready to retry",
        CallState::DeviceFailed => "device unavailable, restart to retry",
    };
    format!("[{state}] {hint}")
}

pub fn describe(notification: &Notification) -> String {
    match notification {
        Notification::CallStarted { call_id: Some(id) } => format!("call started ({id})"),
        Notification::CallStarted { call_id: None } => "call started".to_string(),
        Notification::CallEnded => "call ended".to_string(),
        Notification::Error(e) => format!("error: {e}"),
    }
}
