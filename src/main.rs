use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;

use anyhow::{Context, Result};
use tracing::{info, warn};

use codybot::app::App;
use codybot::config::Config;
use codybot::instructions::load_instructions;
use codybot::logging::init_file_logging;
use codybot::provider::RunEvent;
use codybot::providers::provider_for_config;
use codybot::runtime::{RunEventSink, RuntimeController};
use codybot::tui::{run_event_loop, LoopEvent, Screen, TerminalSession, UiState};

fn main() -> Result<()> {
    let config = Config::from_process().context("invalid configuration")?;

    let _log_guard = match &config.log_file {
        Some(path) => Some(
            init_file_logging(path, &config.log_filter)
                .with_context(|| format!("failed to open log file {}", path.display()))?,
        ),
        None => None,
    };
    info!(
        provider = config.provider.as_str(),
        model = %config.model,
        base_url = %config.base_url,
        "starting codybot"
    );

    let loaded = load_instructions(&config.instructions_path);
    let screen = if loaded.file_exists {
        Screen::Chat
    } else {
        Screen::Setup
    };

    let provider = provider_for_config(&config).context("failed to initialize provider")?;
    let app = Arc::new(Mutex::new(App::new(loaded.instructions)));

    let (events_tx, events_rx) = mpsc::channel::<LoopEvent>();
    let run_tx = events_tx.clone();
    let sink: RunEventSink = Arc::new(move |event: RunEvent| {
        let _ = run_tx.send(LoopEvent::Run(event));
    });
    let controller = RuntimeController::new(Arc::clone(&app), provider, sink);

    thread::Builder::new()
        .name("codybot-input".to_string())
        .spawn(move || loop {
            match crossterm::event::read() {
                Ok(event) => {
                    if events_tx.send(LoopEvent::Input(event)).is_err() {
                        break;
                    }
                }
                Err(error) => {
                    warn!(%error, "terminal input reader stopped");
                    break;
                }
            }
        })
        .context("failed to spawn input reader")?;

    let mut ui = UiState::new(
        screen,
        &config.model,
        &config.base_url,
        &config.instructions_path,
    );

    let mut session = TerminalSession::enter().context("failed to initialize terminal")?;
    let outcome = run_event_loop(session.terminal_mut(), &controller, &mut ui, &events_rx);
    drop(session);

    outcome.context("terminal loop failed")?;
    info!("codybot exited");
    Ok(())
}
