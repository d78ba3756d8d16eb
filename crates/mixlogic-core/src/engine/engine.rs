//! Control-side mix engine
//!
//! [`MixEngine`] reconciles the UI's [`AppState`] with the live render
//! graph. It owns the per-deck transports and talks to the
//! [`MixRenderer`] only through the lock-free command queue, so no call
//! here ever waits on the audio thread.

use std::sync::Arc;

use crate::audio_file::{DecodeError, SymphoniaDecoder, TrackDecoder};
use crate::clock::Clock;
use crate::config::EngineConfig;
use crate::crossfade::crossfade_gains;
use crate::loader::{PendingTrack, TrackLoader};
use crate::state::{AppState, EqState};
use crate::types::{DeckId, NUM_DECKS};

use super::command::{command_channel_with_capacity, EngineCommand, COMMAND_QUEUE_CAPACITY};
use super::renderer::MixRenderer;
use super::transport::{TransportController, TransportState};

/// Parameter values last handed to the renderer
///
/// `None` means "unknown": nothing sent yet, or the last push was dropped.
#[derive(Debug, Default)]
struct SentParams {
    master_volume: Option<f32>,
    crossfade_gain: [Option<f32>; NUM_DECKS],
    volume: [Option<f32>; NUM_DECKS],
    eq: [Option<EqState>; NUM_DECKS],
}

/// The control half of the mixing engine
pub struct MixEngine {
    commands: rtrb::Producer<EngineCommand>,
    transports: [TransportController; NUM_DECKS],
    clock: Arc<dyn Clock>,
    loader: TrackLoader,
    /// Generation of the track installed on each deck
    installed_generation: [u64; NUM_DECKS],
    sent: SentParams,
    dropped_commands: u64,
    sample_rate: u32,
    shut_down: bool,
}

impl MixEngine {
    /// Create an engine and its renderer, decoding with Symphonia
    ///
    /// The renderer goes to the audio thread (or a test); the engine stays
    /// with the UI.
    pub fn new(config: &EngineConfig, clock: Arc<dyn Clock>) -> (Self, MixRenderer) {
        let decoder = Arc::new(SymphoniaDecoder::new(config.sample_rate));
        Self::with_decoder(config, clock, decoder)
    }

    /// Create an engine using a custom track decoder
    pub fn with_decoder(
        config: &EngineConfig,
        clock: Arc<dyn Clock>,
        decoder: Arc<dyn TrackDecoder>,
    ) -> (Self, MixRenderer) {
        Self::build(config, clock, decoder, COMMAND_QUEUE_CAPACITY)
    }

    fn build(
        config: &EngineConfig,
        clock: Arc<dyn Clock>,
        decoder: Arc<dyn TrackDecoder>,
        queue_capacity: usize,
    ) -> (Self, MixRenderer) {
        let (producer, consumer) = command_channel_with_capacity(queue_capacity);
        let renderer = MixRenderer::new(config, consumer);

        log::info!(
            "Mix engine created: {}Hz, queue capacity {}",
            config.sample_rate,
            queue_capacity
        );

        let engine = Self {
            commands: producer,
            transports: [TransportController::new(), TransportController::new()],
            clock,
            loader: TrackLoader::new(decoder),
            installed_generation: [0; NUM_DECKS],
            sent: SentParams::default(),
            dropped_commands: 0,
            sample_rate: config.sample_rate,
            shut_down: false,
        };
        (engine, renderer)
    }

    /// Push a command, dropping it with a warning if the queue is full
    fn push(&mut self, cmd: EngineCommand) -> bool {
        match self.commands.push(cmd) {
            Ok(()) => true,
            Err(rtrb::PushError::Full(cmd)) => {
                self.dropped_commands += 1;
                log::warn!("Command queue full, dropping {:?}", cmd);
                false
            }
        }
    }

    fn has_room(&self) -> bool {
        self.commands.slots() > 0
    }

    /// Reconcile the live graph with a mixer snapshot
    ///
    /// Safe to call at any rate; an unchanged snapshot sends nothing.
    pub fn synchronize(&mut self, state: &AppState) {
        if self.shut_down {
            return;
        }
        let now = self.clock.now();

        let master = state.mixer.clamped_master_volume();
        if self.sent.master_volume != Some(master) {
            let ok = self.push(EngineCommand::SetMasterVolume { volume: master });
            self.sent.master_volume = ok.then_some(master);
        }

        let (gain_a, gain_b) = crossfade_gains(state.mixer.crossfader);
        for (deck, gain) in [(DeckId::A, gain_a), (DeckId::B, gain_b)] {
            let i = deck.index();
            if self.sent.crossfade_gain[i] != Some(gain) {
                let ok = self.push(EngineCommand::SetCrossfadeGain { deck, gain });
                self.sent.crossfade_gain[i] = ok.then_some(gain);
            }
        }

        for deck in DeckId::ALL {
            self.reconcile_transport(deck, state, now);
            self.propagate_channel(deck, state);
        }
    }

    fn reconcile_transport(&mut self, deck: DeckId, state: &AppState, now: f64) {
        let desired = state.deck(deck);
        let speed = desired.clamped_speed();
        let i = deck.index();

        let transition = match (desired.wants_playback(), self.transports[i].state()) {
            (true, TransportState::Stopped) | (false, TransportState::Playing) => {
                if !self.has_room() {
                    // Left for the next synchronize
                    self.dropped_commands += 1;
                    log::warn!("Command queue full, deferring transport change on {}", deck);
                    return;
                }
                if desired.wants_playback() {
                    self.transports[i].play(now, speed).map(|start| {
                        log::debug!(
                            "{} play: voice #{} at {:.3}s, rate {:.3}",
                            deck,
                            start.voice,
                            start.start_seconds,
                            start.rate
                        );
                        EngineCommand::StartVoice {
                            deck,
                            voice: start.voice,
                            start_seconds: start.start_seconds,
                            rate: start.rate,
                        }
                    })
                } else {
                    self.transports[i].stop(now).map(|voice| {
                        log::debug!(
                            "{} stop: voice #{}, resume at {:.3}s",
                            deck,
                            voice,
                            self.transports[i].offset()
                        );
                        EngineCommand::StopVoice { deck, voice }
                    })
                }
            }
            _ => None,
        };
        if let Some(cmd) = transition {
            self.push(cmd);
        }

        if self.transports[i].is_playing() && self.has_room() {
            if let Some(voice) = self.transports[i].set_speed(speed) {
                self.push(EngineCommand::SetRate { deck, voice, rate: speed });
            }
        }
    }

    fn propagate_channel(&mut self, deck: DeckId, state: &AppState) {
        let desired = state.deck(deck);
        let i = deck.index();

        let volume = desired.clamped_volume();
        if self.sent.volume[i] != Some(volume) {
            let ok = self.push(EngineCommand::SetVolume { deck, volume });
            self.sent.volume[i] = ok.then_some(volume);
        }

        let eq = desired.eq.clamped();
        if self.sent.eq[i] != Some(eq) {
            let ok = self.push(EngineCommand::SetEq {
                deck,
                low: eq.low,
                mid: eq.mid,
                high: eq.high,
            });
            self.sent.eq[i] = ok.then_some(eq);
        }
    }

    /// Install a decoded track on its deck
    ///
    /// Returns false if the track is stale (a newer load was already
    /// installed), the engine is shut down, or the queue is full. The
    /// deck's previous track and position are untouched in that case.
    pub fn install_track(&mut self, pending: PendingTrack) -> bool {
        let deck = pending.deck;
        let i = deck.index();

        if self.shut_down {
            log::warn!("Engine shut down, not installing track on {}", deck);
            return false;
        }
        if pending.generation <= self.installed_generation[i] {
            log::warn!(
                "Ignoring stale load on {} (generation {}, installed {})",
                deck,
                pending.generation,
                self.installed_generation[i]
            );
            return false;
        }

        let duration = pending.track.duration();
        if !self.push(EngineCommand::LoadTrack { deck, track: pending.track }) {
            return false;
        }
        // The renderer releases the running voice together with the old track
        self.transports[i].load(duration);
        self.installed_generation[i] = pending.generation;

        log::info!(
            "Loaded {:.1}s track on {} (generation {})",
            duration,
            deck,
            pending.generation
        );
        true
    }

    /// Decode `bytes` and install the result on `deck`
    ///
    /// On error nothing changes. `Ok(false)` means the decode finished
    /// but a newer load had already been installed.
    pub async fn load_track(&mut self, deck: DeckId, bytes: Vec<u8>) -> Result<bool, DecodeError> {
        let pending = self.loader.load(deck, bytes).await.map_err(|e| {
            log::warn!("Failed to load track on {}: {}", deck, e);
            e
        })?;
        Ok(self.install_track(pending))
    }

    /// Remove the track from a deck, stopping it if it is playing
    ///
    /// Returns false when the engine is shut down or the queue is full;
    /// the deck keeps its track in that case.
    pub fn unload_track(&mut self, deck: DeckId) -> bool {
        if self.shut_down || !self.has_room() {
            log::warn!("Cannot unload {} right now", deck);
            return false;
        }
        self.push(EngineCommand::UnloadTrack { deck });
        if let Some(voice) = self.transports[deck.index()].unload() {
            log::debug!("{} unload released voice #{}", deck, voice);
        }
        log::info!("Unloaded {}", deck);
        true
    }

    /// Cloneable loader for decoding tracks on other tasks
    pub fn loader(&self) -> TrackLoader {
        self.loader.clone()
    }

    pub fn transport_state(&self, deck: DeckId) -> TransportState {
        self.transports[deck.index()].state()
    }

    /// Derived playback position of a deck in seconds
    pub fn position(&self, deck: DeckId) -> f64 {
        self.transports[deck.index()].position(self.clock.now())
    }

    /// Duration of the deck's track in seconds (0 when empty)
    pub fn duration(&self, deck: DeckId) -> f64 {
        self.transports[deck.index()].duration()
    }

    /// Commands dropped because the queue was full
    pub fn dropped_commands(&self) -> u64 {
        self.dropped_commands
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down
    }

    /// Stop both decks and release the renderer's voices and tracks
    ///
    /// Further `synchronize` and load calls are ignored.
    pub fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        let now = self.clock.now();
        for deck in DeckId::ALL {
            if let Some(voice) = self.transports[deck.index()].stop(now) {
                self.push(EngineCommand::StopVoice { deck, voice });
            }
        }
        self.push(EngineCommand::Shutdown);
        self.shut_down = true;
        log::info!("Mix engine shut down");
    }
}

impl Drop for MixEngine {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for MixEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MixEngine")
            .field("transports", &self.transports)
            .field("installed_generation", &self.installed_generation)
            .field("dropped_commands", &self.dropped_commands)
            .field("shut_down", &self.shut_down)
            .finish()
    }
}
