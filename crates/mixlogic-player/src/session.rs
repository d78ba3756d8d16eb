//! Mixer state edits and status output for the line interface

use mixlogic_core::crossfade::SignalStrength;
use mixlogic_core::state::{fader_from_speed, speed_from_fader, AppState, SPEED_MAX, SPEED_MIN};
use mixlogic_core::DeckId;

use crate::command::Command;

/// Apply a state-editing command to the mixer state
///
/// Returns `Ok(true)` when the state changed and the engine needs a
/// `synchronize`, `Ok(false)` for commands that do not touch the state.
pub fn apply(state: &mut AppState, command: &Command) -> Result<bool, String> {
    match *command {
        Command::Play(deck) => {
            if !state.set_playing(deck, true) {
                return Err(format!("{} has no track loaded", deck));
            }
        }
        Command::Stop(deck) => {
            state.set_playing(deck, false);
        }
        Command::Volume { deck, value } => {
            state.deck_mut(deck).volume = value.clamp(0.0, 1.0);
        }
        Command::Eq { deck, band, value } => {
            state.deck_mut(deck).eq.set_band(band, value);
        }
        Command::Speed { deck, value } => {
            state.deck_mut(deck).speed = value.clamp(SPEED_MIN, SPEED_MAX);
        }
        Command::Pitch { deck, position } => {
            state.deck_mut(deck).speed = speed_from_fader(position);
        }
        Command::Sync(deck) => state.sync_speed(deck),
        Command::Crossfader(value) => state.mixer.crossfader = value.clamp(-1.0, 1.0),
        Command::Master(value) => state.mixer.master_volume = value.clamp(0.0, 1.0),
        Command::Load { .. }
        | Command::Unload(_)
        | Command::Status
        | Command::Explain
        | Command::Devices
        | Command::Help
        | Command::Quit => {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Transport position of one deck as seen by the engine
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DeckPosition {
    pub position: f64,
    pub duration: f64,
}

fn format_time(seconds: f64) -> String {
    let total = seconds.max(0.0) as u64;
    format!("{}:{:02}", total / 60, total % 60)
}

fn percent(value: f32) -> u32 {
    (value.clamp(0.0, 1.0) * 100.0).round() as u32
}

/// Multi-line status report: deck settings, positions and signal flow
pub fn status_report(state: &AppState, positions: [DeckPosition; 2], dropped_commands: u64) -> String {
    let signal = SignalStrength::from_state(state);
    let mut lines = Vec::new();

    for deck in DeckId::ALL {
        let s = state.deck(deck);
        let pos = positions[deck.index()];
        let transport = if s.wants_playback() {
            "PLAYING"
        } else if s.is_loaded {
            "STOPPED"
        } else {
            "EMPTY"
        };
        lines.push(format!(
            "{} [{}] {} {}/{}",
            deck,
            transport,
            s.track_name,
            format_time(pos.position),
            format_time(pos.duration)
        ));
        lines.push(format!(
            "  vol {}%  eq {}/{}/{}  speed {:.3}x (pitch {}%)",
            percent(s.volume),
            percent(s.eq.low),
            percent(s.eq.mid),
            percent(s.eq.high),
            s.speed,
            percent(fader_from_speed(s.speed))
        ));
        let ch = signal.channel(deck);
        lines.push(format!(
            "  signal: source {:.2} > eq {:.2} > fader {:.2} > xfade {:.2}",
            ch.source, ch.post_eq, ch.post_fader, ch.post_crossfade
        ));
    }

    let sync = if state.is_speed_synced() { "synced" } else { "not synced" };
    lines.push(format!(
        "Mixer: crossfader {:+.2}  master {}%  speed {}",
        state.mixer.crossfader,
        percent(state.mixer.master_volume),
        sync
    ));
    lines.push(format!("  master signal {:.2}", signal.master));
    if dropped_commands > 0 {
        lines.push(format!("  {} engine commands dropped", dropped_commands));
    }
    lines.join("\n")
}

/// Name shown for a loaded file
pub fn track_name(path: &std::path::Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
