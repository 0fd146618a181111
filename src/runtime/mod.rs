use std::env;
use std::path::PathBuf;
use std::sync::{Arc, mpsc};

use anyhow::Context;
use tracing::{info, warn};

use crate::audio::{PlaybackEngine, RodioOutput};
use crate::library::{LoftyExtractor, PlaylistRegistry};
use crate::mpris::{self, ControlCmd, Forward};
use crate::store::LibraryStore;

mod commands;
mod event_loop;
mod logging;
mod mpris_sync;
mod settings;

pub use commands::{Command, parse};
pub use event_loop::{Controller, Flow, scan_library};


pub fn run() -> anyhow::Result<()> {
    let (settings, problem) = settings::load_settings();
    logging::init(&settings.logging);
    if let Some(problem) = problem {
        warn!("{problem}");
    }

    let dir = env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .or_else(|| settings.library.root.clone())
        .or_else(|| env::current_dir().ok())
        .context("no music directory given and no current directory")?;

    let mut registry = PlaylistRegistry::new(LibraryStore::from_settings(&settings));
    registry.restore();

    let output = RodioOutput::open_default().context("opening the audio output")?;
    let mut engine = PlaybackEngine::new(Box::new(output), Arc::new(LoftyExtractor));
    let events = engine.subscribe();

    let mut controller = Controller::new(settings, registry, engine);
    let mut stdout = std::io::stdout();
    controller.scan(&dir, &mut stdout)?;

    let (tx, rx) = mpsc::channel::<Command>();
    let mpris = if controller.settings.playback.mpris {
        let mpris_tx = tx.clone();
        let forward: Forward = Arc::new(move |cmd: ControlCmd| {
            let _ = mpris_tx.send(Command::from(cmd));
        });
        mpris::spawn_mpris(forward)
    } else {
        mpris::detached()
    };
    commands::spawn_stdin_reader(tx);

    info!(dir = %dir.display(), "ready");
    event_loop::run(&mut controller, &rx, &events, &mpris);

    controller.engine.shutdown();
    Ok(())
}
