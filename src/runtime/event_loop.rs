use std::io::{self, Write};
use std::path::Path;
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::time::Duration;

use tracing::{debug, warn};

use crate::audio::{PlaybackEngine, PlaybackEvent, PlaybackSession};
use crate::config::{ScanStrategy, Settings};
use crate::error::ScanError;
use crate::library::{PlaylistRegistry, ScanReport, flat_listing, scan_flat, scan_tree};
use crate::mpris::{ControlCmd, MprisHandle};
use crate::store::TrackRecord;

use super::commands::Command;
use super::mpris_sync;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// Owns the registry and engine and applies commands to them.
pub struct Controller {
    pub settings: Settings,
    pub registry: PlaylistRegistry,
    pub engine: PlaybackEngine,
}

/// Scan `dir` with the configured strategy into `registry`.
pub fn scan_library(
    registry: &mut PlaylistRegistry,
    dir: &Path,
    settings: &Settings,
) -> Result<ScanReport, ScanError> {
    let library = &settings.library;
    match library.strategy {
        ScanStrategy::Tree => scan_tree(registry, dir, library),
        ScanStrategy::Flat => {
            let (entries, mut unreadable) = flat_listing(dir, library)?;
            let mut report = scan_flat(registry, entries, library)?;
            report.skipped.append(&mut unreadable);
            Ok(report)
        }
    }
}

fn clock(d: Duration) -> String {
    let secs = d.as_secs();
    format!("{}:{:02}", secs / 60, secs % 60)
}

fn describe(session: &PlaybackSession) -> String {
    let Some(title) = session.title() else {
        return "idle".to_string();
    };
    let who = session
        .metadata
        .as_ref()
        .map_or(title, |m| m.display());
    let state = if session.playing { "playing" } else { "paused" };
    let length = session.duration.map_or("?".to_string(), clock);
    format!(
        "{state}: {who} [{} / {length}] ({}/{})",
        clock(session.position),
        session.queue_position + 1,
        session.queue.len()
    )
}

impl Controller {
    pub fn new(settings: Settings, registry: PlaylistRegistry, engine: PlaybackEngine) -> Self {
        Self {
            settings,
            registry,
            engine,
        }
    }

    pub fn scan(&mut self, dir: &Path, out: &mut impl Write) -> io::Result<()> {
        match scan_library(&mut self.registry, dir, &self.settings) {
            Ok(report) => {
                writeln!(
                    out,
                    "scanned {}: {} playlists, {} tracks",
                    dir.display(),
                    report.playlist_count(),
                    report.track_count()
                )?;
                for failure in &report.skipped {
                    writeln!(
                        out,
                        "  skipped {}: {}",
                        failure.path.display(),
                        failure.reason
                    )?;
                }
            }
            Err(ScanError::Cancelled) => writeln!(out, "nothing to scan in {}", dir.display())?,
            Err(e) => writeln!(out, "scan failed: {e}")?,
        }
        Ok(())
    }

    pub fn handle(&mut self, cmd: Command, out: &mut impl Write) -> io::Result<Flow> {
        debug!(?cmd, "command");
        match cmd {
            Command::Control(ControlCmd::Quit) => return Ok(Flow::Quit),
            Command::Control(c) => self.control(c, out)?,
            Command::List => {
                if self.registry.is_empty() {
                    writeln!(out, "no playlists")?;
                }
                for p in self.registry.iter() {
                    let note = if p.needs_rescan() { " (rescan needed)" } else { "" };
                    writeln!(out, "{} - {} tracks{note}", p.name, p.track_count)?;
                }
            }
            Command::Show(name) => match self.registry.get(&name) {
                Some(p) if p.needs_rescan() => {
                    writeln!(out, "{name}: {} tracks, rescan to load them", p.track_count)?
                }
                Some(p) => {
                    for (i, t) in p.tracks.iter().enumerate() {
                        writeln!(out, "{i:>3}  {}", t.fallback_title())?;
                    }
                }
                None => writeln!(out, "no playlist named {name}")?,
            },
            Command::Play { playlist, index } => {
                let Some(p) = self.registry.get(&playlist) else {
                    writeln!(out, "no playlist named {playlist}")?;
                    return Ok(Flow::Continue);
                };
                let Some(track) = p.tracks.get(index).cloned() else {
                    writeln!(out, "{playlist} has no track {index}")?;
                    return Ok(Flow::Continue);
                };
                let queue = p.tracks.clone();
                if let Err(e) = self.engine.play(track, Some(queue)) {
                    writeln!(out, "{e}")?;
                }
            }
            Command::Scan(dir) => self.scan(&dir, out)?,
            Command::Remove(name) => match self.registry.remove(&name) {
                Some(_) => writeln!(out, "removed {name}")?,
                None => writeln!(out, "no playlist named {name}")?,
            },
            Command::Clear => {
                self.registry.clear();
                writeln!(out, "all playlists removed")?;
            }
            Command::Status => writeln!(out, "{}", describe(self.engine.session()))?,
        }
        Ok(Flow::Continue)
    }

    fn control(&mut self, cmd: ControlCmd, out: &mut impl Write) -> io::Result<()> {
        let result = match cmd {
            ControlCmd::Play => {
                self.engine.resume();
                Ok(())
            }
            ControlCmd::Pause | ControlCmd::Stop => {
                self.engine.pause();
                Ok(())
            }
            ControlCmd::PlayPause => {
                self.engine.toggle_play_pause();
                Ok(())
            }
            ControlCmd::Next => self.engine.next(),
            ControlCmd::Prev => self.engine.previous(),
            ControlCmd::SeekBy(offset) => {
                let now = self.engine.session().position;
                let delta = Duration::from_micros(offset.unsigned_abs());
                let target = if offset < 0 {
                    now.saturating_sub(delta)
                } else {
                    now + delta
                };
                self.engine.seek(target);
                Ok(())
            }
            ControlCmd::SetPosition(to) => {
                self.engine.seek(to);
                Ok(())
            }
            ControlCmd::Quit => Ok(()),
        };
        if let Err(e) = result {
            writeln!(out, "{e}")?;
        }
        Ok(())
    }

    /// Mirror one engine event to MPRIS and the store.
    pub fn apply_event(&mut self, event: &PlaybackEvent, mpris: &MprisHandle) {
        mpris_sync::apply(mpris, event, self.engine.session());
        if let PlaybackEvent::MetadataChanged(meta) = event {
            self.registry
                .store_mut()
                .save_track(&TrackRecord::from(meta));
        }
    }
}

/// Run until `quit`, or until every command source is gone.
pub fn run(
    controller: &mut Controller,
    commands: &Receiver<Command>,
    events: &Receiver<PlaybackEvent>,
    mpris: &MprisHandle,
) {
    let tick = Duration::from_millis(controller.settings.playback.tick_ms);
    let mut stdout = io::stdout();

    loop {
        let mut flow = Flow::Continue;
        match commands.recv_timeout(tick) {
            Ok(cmd) => {
                let pending = std::iter::once(cmd).chain(commands.try_iter());
                for cmd in pending {
                    match controller.handle(cmd, &mut stdout) {
                        Ok(Flow::Quit) => {
                            flow = Flow::Quit;
                            break;
                        }
                        Ok(Flow::Continue) => {}
                        Err(e) => warn!(error = %e, "could not write to stdout"),
                    }
                }
                let _ = stdout.flush();
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                debug!("no command sources left");
                flow = Flow::Quit;
            }
        }

        controller.engine.tick();
        for event in events.try_iter() {
            controller.apply_event(&event, mpris);
        }

        if flow == Flow::Quit {
            return;
        }
    }
}
