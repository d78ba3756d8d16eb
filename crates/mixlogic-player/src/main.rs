//! MixLogic Player - headless two-deck mixer
//!
//! This is the line-command front end for the mixing engine. It:
//! 1. Opens the audio output (or a silent null output when none is available)
//! 2. Owns the mixer state and edits it from commands read on stdin
//! 3. Calls `synchronize` after every change
//!
//! Set RUST_LOG=debug for verbose output.

mod command;
mod session;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};

use mixlogic_core::audio::{list_output_devices, start_audio_system, AudioHandle};
use mixlogic_core::clock::{Clock, SystemClock};
use mixlogic_core::config::{default_config_path, load_or_create_config, EngineConfig};
use mixlogic_core::engine::{MixEngine, MixRenderer};
use mixlogic_core::explain::{explain_mix, explainer_from_config};
use mixlogic_core::state::AppState;
use mixlogic_core::{DeckId, StereoBuffer};

use command::{Command, HELP};
use session::DeckPosition;

/// Output for machines without a usable audio device
///
/// Drains the command queue and renders into a scratch buffer at roughly
/// real-time pace so the engine behaves the same as with a device.
fn spawn_null_output(mut renderer: MixRenderer, block_frames: usize) -> tokio::task::JoinHandle<()> {
    let period = Duration::from_secs_f64(block_frames as f64 / renderer.sample_rate().max(1) as f64);
    tokio::spawn(async move {
        let mut buffer = StereoBuffer::silence(block_frames);
        let mut ticker = tokio::time::interval(period);
        while !renderer.is_shut_down() {
            ticker.tick().await;
            renderer.render(&mut buffer);
        }
        log::debug!("Null output stopped");
    })
}

fn positions(engine: &MixEngine) -> [DeckPosition; 2] {
    DeckId::ALL.map(|deck| DeckPosition {
        position: engine.position(deck),
        duration: engine.duration(deck),
    })
}

async fn load_file(engine: &mut MixEngine, state: &mut AppState, deck: DeckId, path: &std::path::Path) -> Result<()> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {:?}", path))?;

    let installed = engine
        .load_track(deck, bytes)
        .await
        .with_context(|| format!("Failed to decode {:?}", path))?;
    if !installed {
        anyhow::bail!("{} is busy, try loading again", deck);
    }

    let name = session::track_name(path);
    log::info!("Loaded {:?} onto {}", name, deck);
    state.deck_mut(deck).mark_loaded(name);
    // A fresh track starts stopped
    state.deck_mut(deck).is_playing = false;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    log::info!("mixlogic-player starting up");

    let config_path = default_config_path();
    let config: EngineConfig = load_or_create_config(&config_path);
    let explainer = explainer_from_config(&config.explain);
    let clock: Arc<dyn Clock> = Arc::new(SystemClock::new());

    let (mut engine, _audio_handle): (MixEngine, Option<AudioHandle>) =
        match start_audio_system(&config, clock.clone()) {
            Ok(system) => {
                println!(
                    "Audio output running ({} Hz, ~{:.1} ms latency)",
                    system.handle.sample_rate(),
                    system.handle.latency_ms()
                );
                (system.engine, Some(system.handle))
            }
            Err(e) => {
                log::error!("Could not start audio output: {}", e);
                eprintln!("Running without audio output");
                let (engine, renderer) = MixEngine::new(&config, clock.clone());
                spawn_null_output(renderer, config.clamped_buffer_size());
                (engine, None)
            }
        };

    let mut state = AppState::default();
    engine.synchronize(&state);

    println!("MixLogic Player - type 'help' for commands");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("Failed to read stdin")? {
        if line.trim().is_empty() {
            continue;
        }

        let command = match line.parse::<Command>() {
            Ok(command) => command,
            Err(e) => {
                println!("error: {}", e);
                continue;
            }
        };

        match command {
            Command::Quit => break,
            Command::Help => println!("{}", HELP),
            Command::Status => {
                println!(
                    "{}",
                    session::status_report(&state, positions(&engine), engine.dropped_commands())
                );
            }
            Command::Explain => println!("{}", explain_mix(explainer.clone(), state.clone()).await),
            Command::Devices => match list_output_devices() {
                Ok(devices) => {
                    for device in devices {
                        println!("  {}  rates: {:?}", device, device.sample_rates);
                    }
                }
                Err(e) => println!("error: {}", e),
            },
            Command::Unload(deck) => {
                if engine.unload_track(deck) {
                    state.deck_mut(deck).mark_unloaded();
                    engine.synchronize(&state);
                    println!("{} unloaded", deck);
                } else {
                    println!("error: {} is busy, try again", deck);
                }
            }
            Command::Load { deck, ref path } => match load_file(&mut engine, &mut state, deck, path).await {
                Ok(()) => {
                    engine.synchronize(&state);
                    println!("{} loaded: {}", deck, state.deck(deck).track_name);
                }
                Err(e) => println!("error: {:#}", e),
            },
            ref other => match session::apply(&mut state, other) {
                Ok(true) => engine.synchronize(&state),
                Ok(false) => {}
                Err(e) => println!("error: {}", e),
            },
        }
    }

    engine.shutdown();
    log::info!("mixlogic-player stopped");
    Ok(())
}
