//! Mixer state - the UI-owned description of the desired mix
//!
//! `AppState` is the single source of truth for the whole mixer. It is owned
//! and mutated by the UI layer only; the engine receives `&AppState`
//! snapshots in [`MixEngine::synchronize`](crate::engine::MixEngine::synchronize)
//! and copies out the values it needs on every call.

use serde::{Deserialize, Serialize};

use crate::types::DeckId;

/// Lowest playback speed (-8%)
pub const SPEED_MIN: f32 = 0.92;
/// Highest playback speed (+8%)
pub const SPEED_MAX: f32 = 1.08;
/// Speed differences below this count as "in sync"
pub const SPEED_SYNC_EPSILON: f32 = 0.001;

/// Track name shown for an empty deck
pub const NO_TRACK_LOADED: &str = "No Track Loaded";

/// Clamp a value into `[min, max]`, replacing NaN/inf with `fallback`
#[inline]
pub(crate) fn clamp_or(value: f32, min: f32, max: f32, fallback: f32) -> f32 {
    if value.is_finite() {
        value.clamp(min, max)
    } else {
        fallback
    }
}

/// Map a speed fader position (0-1) to a playback speed
pub fn speed_from_fader(position: f32) -> f32 {
    SPEED_MIN + clamp_or(position, 0.0, 1.0, 0.5) * (SPEED_MAX - SPEED_MIN)
}

/// Map a playback speed to its speed fader position (0-1)
pub fn fader_from_speed(speed: f32) -> f32 {
    (clamp_or(speed, SPEED_MIN, SPEED_MAX, 1.0) - SPEED_MIN) / (SPEED_MAX - SPEED_MIN)
}

/// 3-band EQ knob positions (0.0 = -20dB, 0.5 = flat, 1.0 = +20dB)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EqState {
    pub low: f32,
    pub mid: f32,
    pub high: f32,
}

impl EqState {
    /// All bands at the flat position
    pub const FLAT: EqState = EqState { low: 0.5, mid: 0.5, high: 0.5 };

    /// Copy with every band clamped to `[0, 1]`
    pub fn clamped(&self) -> Self {
        Self {
            low: clamp_or(self.low, 0.0, 1.0, 0.5),
            mid: clamp_or(self.mid, 0.0, 1.0, 0.5),
            high: clamp_or(self.high, 0.0, 1.0, 0.5),
        }
    }

    /// Mean knob position of the three bands
    pub fn average(&self) -> f32 {
        (self.low + self.mid + self.high) / 3.0
    }

    /// Set one band by name ("low", "mid", "high")
    pub fn set_band(&mut self, band: EqBand, value: f32) {
        let value = clamp_or(value, 0.0, 1.0, 0.5);
        match band {
            EqBand::Low => self.low = value,
            EqBand::Mid => self.mid = value,
            EqBand::High => self.high = value,
        }
    }
}

impl Default for EqState {
    fn default() -> Self {
        Self::FLAT
    }
}

/// EQ band selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EqBand {
    Low,
    Mid,
    High,
}

impl std::str::FromStr for EqBand {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" | "lo" => Ok(EqBand::Low),
            "mid" => Ok(EqBand::Mid),
            "high" | "hi" => Ok(EqBand::High),
            other => Err(format!("unknown EQ band '{}'", other)),
        }
    }
}

/// Desired state of one deck
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeckState {
    /// Play button state (only meaningful when `is_loaded`)
    pub is_playing: bool,
    /// Channel fader (0.0 to 1.0)
    pub volume: f32,
    /// EQ knob positions
    pub eq: EqState,
    /// Playback speed (0.92 to 1.08, ±8%)
    pub speed: f32,
    /// Name of the loaded file
    pub track_name: String,
    /// Whether a track is ready to play
    pub is_loaded: bool,
}

impl DeckState {
    /// Empty deck with the given fader position
    pub fn empty(volume: f32) -> Self {
        Self {
            is_playing: false,
            volume,
            eq: EqState::FLAT,
            speed: 1.0,
            track_name: NO_TRACK_LOADED.to_string(),
            is_loaded: false,
        }
    }

    /// Whether the engine should actually be sounding this deck
    ///
    /// `is_playing` without `is_loaded` is not a valid request and is ignored.
    pub fn wants_playback(&self) -> bool {
        self.is_playing && self.is_loaded
    }

    /// Fader value clamped to `[0, 1]`
    pub fn clamped_volume(&self) -> f32 {
        clamp_or(self.volume, 0.0, 1.0, 0.0)
    }

    /// Speed clamped to `[SPEED_MIN, SPEED_MAX]`
    pub fn clamped_speed(&self) -> f32 {
        clamp_or(self.speed, SPEED_MIN, SPEED_MAX, 1.0)
    }

    /// Record a successful track load
    pub fn mark_loaded(&mut self, track_name: impl Into<String>) {
        self.track_name = track_name.into();
        self.is_loaded = true;
    }

    /// Return to the empty-deck display, keeping fader and knob positions
    pub fn mark_unloaded(&mut self) {
        self.track_name = NO_TRACK_LOADED.to_string();
        self.is_loaded = false;
        self.is_playing = false;
    }
}

/// Desired state of the mixer section
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MixerState {
    /// Crossfader (-1.0 = full A, 0.0 = center, 1.0 = full B)
    pub crossfader: f32,
    /// Master output volume (0.0 to 1.0)
    pub master_volume: f32,
}

impl MixerState {
    /// Crossfader clamped to `[-1, 1]`
    pub fn clamped_crossfader(&self) -> f32 {
        clamp_or(self.crossfader, -1.0, 1.0, 0.0)
    }

    /// Master volume clamped to `[0, 1]`
    pub fn clamped_master_volume(&self) -> f32 {
        clamp_or(self.master_volume, 0.0, 1.0, 0.0)
    }
}

impl Default for MixerState {
    fn default() -> Self {
        Self {
            crossfader: -0.5,
            master_volume: 0.8,
        }
    }
}

/// Full mixer configuration: two decks plus the mixer section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppState {
    pub deck_a: DeckState,
    pub deck_b: DeckState,
    pub mixer: MixerState,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            deck_a: DeckState::empty(0.8),
            deck_b: DeckState::empty(0.0),
            mixer: MixerState::default(),
        }
    }
}

impl AppState {
    /// Get a deck's state
    pub fn deck(&self, id: DeckId) -> &DeckState {
        match id {
            DeckId::A => &self.deck_a,
            DeckId::B => &self.deck_b,
        }
    }

    /// Get a deck's state mutably
    pub fn deck_mut(&mut self, id: DeckId) -> &mut DeckState {
        match id {
            DeckId::A => &mut self.deck_a,
            DeckId::B => &mut self.deck_b,
        }
    }

    /// Copy the other deck's speed onto `target`
    ///
    /// Only `target` changes; the source deck is left untouched.
    pub fn sync_speed(&mut self, target: DeckId) {
        let speed = self.deck(target.other()).speed;
        self.deck_mut(target).speed = speed;
    }

    /// Whether both decks run at the same speed
    pub fn is_speed_synced(&self) -> bool {
        (self.deck_a.speed - self.deck_b.speed).abs() < SPEED_SYNC_EPSILON
    }

    /// Request playback on a deck, honoring the loaded invariant
    ///
    /// Returns false (and leaves the state untouched) if the deck is empty.
    pub fn set_playing(&mut self, id: DeckId, playing: bool) -> bool {
        let deck = self.deck_mut(id);
        if playing && !deck.is_loaded {
            return false;
        }
        deck.is_playing = playing;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let state = AppState::default();
        assert_eq!(state.deck_a.volume, 0.8);
        assert_eq!(state.deck_b.volume, 0.0);
        assert_eq!(state.deck_a.eq, EqState::FLAT);
        assert_eq!(state.deck_a.track_name, NO_TRACK_LOADED);
        assert!(!state.deck_a.is_loaded);
        assert_eq!(state.mixer.crossfader, -0.5);
        assert_eq!(state.mixer.master_volume, 0.8);
    }

    #[test]
    fn test_speed_sync_copies_to_target_only() {
        let mut state = AppState::default();
        state.deck_a.speed = 1.0;
        state.deck_b.speed = 1.08;

        state.sync_speed(DeckId::A);

        assert_eq!(state.deck_a.speed, 1.08);
        assert_eq!(state.deck_b.speed, 1.08);
        assert!(state.is_speed_synced());

        state.deck_b.speed = 0.95;
        assert!(!state.is_speed_synced());
        assert_eq!(state.deck_a.speed, 1.08);
    }

    #[test]
    fn test_set_playing_requires_loaded() {
        let mut state = AppState::default();
        assert!(!state.set_playing(DeckId::A, true));
        assert!(!state.deck_a.is_playing);

        state.deck_a.mark_loaded("track.wav");
        assert!(state.set_playing(DeckId::A, true));
        assert!(state.deck_a.wants_playback());
        assert_eq!(state.deck_a.track_name, "track.wav");

        state.deck_a.volume = 0.3;
        state.deck_a.mark_unloaded();
        assert!(!state.deck_a.is_playing);
        assert!(!state.deck_a.is_loaded);
        assert_eq!(state.deck_a.track_name, NO_TRACK_LOADED);
        assert_eq!(state.deck_a.volume, 0.3);
    }

    #[test]
    fn test_clamping() {
        let mut deck = DeckState::empty(1.5);
        deck.speed = 2.0;
        assert_eq!(deck.clamped_volume(), 1.0);
        assert_eq!(deck.clamped_speed(), SPEED_MAX);

        deck.volume = f32::NAN;
        assert_eq!(deck.clamped_volume(), 0.0);

        let mixer = MixerState { crossfader: -3.0, master_volume: -0.2 };
        assert_eq!(mixer.clamped_crossfader(), -1.0);
        assert_eq!(mixer.clamped_master_volume(), 0.0);

        let eq = EqState { low: -1.0, mid: 0.3, high: 9.0 }.clamped();
        assert_eq!(eq, EqState { low: 0.0, mid: 0.3, high: 1.0 });
    }

    #[test]
    fn test_speed_fader_mapping() {
        assert!((speed_from_fader(0.0) - SPEED_MIN).abs() < 1e-6);
        assert!((speed_from_fader(1.0) - SPEED_MAX).abs() < 1e-6);
        assert!((speed_from_fader(0.5) - 1.0).abs() < 1e-6);
        assert!((fader_from_speed(1.0) - 0.5).abs() < 1e-5);
    }

    #[test]
    fn test_yaml_snapshot_roundtrip() {
        let mut state = AppState::default();
        state.deck_b.eq.set_band(EqBand::High, 0.9);
        let yaml = serde_yaml::to_string(&state).unwrap();
        let back: AppState = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(back, state);
    }
}
