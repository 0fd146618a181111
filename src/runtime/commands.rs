//! Line commands read from stdin.

use std::io::{self, BufRead};
use std::path::PathBuf;
use std::sync::mpsc::Sender;
use std::thread;
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::CommandError;
use crate::mpris::ControlCmd;

/// Everything the event loop can be asked to do.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Control(ControlCmd),
    List,
    Show(String),
    Play { playlist: String, index: usize },
    Scan(PathBuf),
    Remove(String),
    Clear,
    Status,
}

impl From<ControlCmd> for Command {
    fn from(cmd: ControlCmd) -> Self {
        Self::Control(cmd)
    }
}

/// Parse one input line. Blank lines yield `None`.
///
/// Playlist names may contain spaces; for `play` a trailing number is the
/// track index.
pub fn parse(line: &str) -> Result<Option<Command>, CommandError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let (word, rest) = line
        .split_once(char::is_whitespace)
        .map_or((line, ""), |(w, r)| (w, r.trim()));

    let needs = |command: &'static str, what: &'static str| {
        if rest.is_empty() {
            Err(CommandError::MissingArgument { command, what })
        } else {
            Ok(rest.to_string())
        }
    };

    let cmd = match word.to_ascii_lowercase().as_str() {
        "list" | "ls" => Command::List,
        "show" => Command::Show(needs("show", "a playlist name")?),
        "play" => {
            let rest = needs("play", "a playlist name")?;
            let (name, index) = match rest.rsplit_once(char::is_whitespace) {
                Some((name, idx)) => match idx.parse::<usize>() {
                    Ok(i) => (name.trim().to_string(), i),
                    Err(_) => (rest.clone(), 0),
                },
                None => (rest.clone(), 0),
            };
            Command::Play {
                playlist: name,
                index,
            }
        }
        "pause" => Command::Control(ControlCmd::Pause),
        "resume" => Command::Control(ControlCmd::Play),
        "toggle" => Command::Control(ControlCmd::PlayPause),
        "stop" => Command::Control(ControlCmd::Stop),
        "next" => Command::Control(ControlCmd::Next),
        "prev" | "previous" => Command::Control(ControlCmd::Prev),
        "seek" => {
            let arg = needs("seek", "a position in seconds")?;
            let to = arg
                .parse::<f64>()
                .ok()
                .and_then(|s| Duration::try_from_secs_f64(s).ok())
                .ok_or(CommandError::InvalidSeconds(arg))?;
            Command::Control(ControlCmd::SetPosition(to))
        }
        "scan" => Command::Scan(PathBuf::from(needs("scan", "a directory")?)),
        "remove" | "rm" => Command::Remove(needs("remove", "a playlist name")?),
        "clear" => Command::Clear,
        "status" => Command::Status,
        "quit" | "exit" => Command::Control(ControlCmd::Quit),
        other => return Err(CommandError::Unknown(other.to_string())),
    };
    Ok(Some(cmd))
}

/// Read stdin on its own thread, forwarding parsed commands. Parse errors
/// are printed and the line is dropped.
pub fn spawn_stdin_reader(tx: Sender<Command>) {
    let spawned = thread::Builder::new()
        .name("stdin".into())
        .spawn(move || {
            for line in io::stdin().lock().lines() {
                let line = match line {
                    Ok(l) => l,
                    Err(e) => {
                        warn!(error = %e, "stdin read failed");
                        break;
                    }
                };
                match parse(&line) {
                    Ok(Some(cmd)) => {
                        if tx.send(cmd).is_err() {
                            break;
                        }
                    }
                    Ok(None) => {}
                    Err(e) => println!("{e}"),
                }
            }
            debug!("stdin closed");
        });
    if let Err(e) = spawned {
        warn!(error = %e, "could not start stdin reader");
    }
}
