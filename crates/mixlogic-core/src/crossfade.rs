//! Crossfade law and signal-strength metric
//!
//! The crossfade law is shared by the audio engine and by visualization
//! consumers, so it lives here as a pure function.
//!
//! The law is **linear with a center overlap**, not equal-power:
//!
//! | crossfader | gain A | gain B |
//! |-----------:|-------:|-------:|
//! |       -1.0 |    1.0 |    0.0 |
//! |        0.0 |    1.0 |    1.0 |
//! |        1.0 |    0.0 |    1.0 |
//!
//! Meters and the explanation prompt are calibrated against this exact
//! mapping. Do not switch it to an equal-power curve.

use crate::state::{clamp_or, AppState, DeckState};
use crate::types::DeckId;

/// Gains applied to deck A and deck B for a crossfader position
///
/// `cf` is clamped to `[-1, 1]` first.
#[inline]
pub fn crossfade_gains(cf: f32) -> (f32, f32) {
    let cf = clamp_or(cf, -1.0, 1.0, 0.0);
    let gain_a = if cf > 0.0 { 1.0 - cf } else { 1.0 };
    let gain_b = if cf < 0.0 { 1.0 + cf } else { 1.0 };
    (gain_a, gain_b)
}

/// Crossfade gain for a single deck
#[inline]
pub fn crossfade_gain(cf: f32, deck: DeckId) -> f32 {
    let (a, b) = crossfade_gains(cf);
    match deck {
        DeckId::A => a,
        DeckId::B => b,
    }
}

/// Perceptual loudness factor of the EQ knobs (0.2 at full cut, 1.0 at full boost)
#[inline]
pub fn eq_factor(deck: &DeckState) -> f32 {
    deck.eq.clamped().average() * 0.8 + 0.2
}

/// Opacity for a signal wire of the given strength
#[inline]
pub fn wire_opacity(strength: f32) -> f32 {
    0.2 + strength.clamp(0.0, 1.0) * 0.8
}

/// Illustrative signal strength at each stage of one channel
///
/// This is a visualization heuristic, not a measurement of the audio.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ChannelSignal {
    /// 1.0 while the deck is playing, otherwise 0.0
    pub source: f32,
    /// After the EQ stage
    pub post_eq: f32,
    /// After the channel fader
    pub post_fader: f32,
    /// After the crossfader
    pub post_crossfade: f32,
}

impl ChannelSignal {
    /// Compute the stages for one deck given its crossfade gain
    pub fn compute(deck: &DeckState, crossfade_gain: f32) -> Self {
        let source = if deck.is_playing { 1.0 } else { 0.0 };
        let post_eq = source * eq_factor(deck);
        let post_fader = post_eq * deck.clamped_volume();
        let post_crossfade = post_fader * crossfade_gain;
        Self {
            source,
            post_eq,
            post_fader,
            post_crossfade,
        }
    }
}

/// Signal strength of both channels and the master bus
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SignalStrength {
    pub deck_a: ChannelSignal,
    pub deck_b: ChannelSignal,
    /// `min(1, (a + b) * master_volume)`
    pub master: f32,
}

impl SignalStrength {
    /// Compute every stage from a mixer snapshot
    pub fn from_state(state: &AppState) -> Self {
        let (gain_a, gain_b) = crossfade_gains(state.mixer.crossfader);
        let deck_a = ChannelSignal::compute(&state.deck_a, gain_a);
        let deck_b = ChannelSignal::compute(&state.deck_b, gain_b);
        let master = ((deck_a.post_crossfade + deck_b.post_crossfade)
            * state.mixer.clamped_master_volume())
        .min(1.0);
        Self {
            deck_a,
            deck_b,
            master,
        }
    }

    /// Channel stages for one deck
    pub fn channel(&self, deck: DeckId) -> &ChannelSignal {
        match deck {
            DeckId::A => &self.deck_a,
            DeckId::B => &self.deck_b,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f32 = 1e-6;

    #[test]
    fn test_crossfade_endpoints() {
        assert_eq!(crossfade_gains(-1.0), (1.0, 0.0));
        assert_eq!(crossfade_gains(0.0), (1.0, 1.0));
        assert_eq!(crossfade_gains(1.0), (0.0, 1.0));
        assert_eq!(crossfade_gains(-0.5), (1.0, 0.5));
        assert_eq!(crossfade_gains(0.25), (0.75, 1.0));
    }

    #[test]
    fn test_crossfade_totality() {
        for i in 0..=2000 {
            let cf = -1.0 + i as f32 * 0.001;
            let (a, b) = crossfade_gains(cf);
            assert!((0.0..=1.0).contains(&a), "gain A out of range at {}", cf);
            assert!((0.0..=1.0).contains(&b), "gain B out of range at {}", cf);
            assert_eq!(a == 1.0 && b == 1.0, cf == 0.0, "both-full iff center at {}", cf);
            assert_eq!(a == 0.0, cf == 1.0, "A silent iff cf=1 at {}", cf);
            assert_eq!(b == 0.0, cf == -1.0, "B silent iff cf=-1 at {}", cf);
        }
    }

    #[test]
    fn test_crossfade_clamps_input() {
        assert_eq!(crossfade_gains(-7.0), (1.0, 0.0));
        assert_eq!(crossfade_gains(3.0), (0.0, 1.0));
        assert_eq!(crossfade_gains(f32::NAN), (1.0, 1.0));
    }

    #[test]
    fn test_basic_mix_signal_strength() {
        let mut state = AppState::default();
        state.deck_a.is_loaded = true;
        state.deck_a.is_playing = true;
        state.deck_a.volume = 0.8;
        state.mixer.crossfader = -0.5;
        state.mixer.master_volume = 0.8;

        let signal = SignalStrength::from_state(&state);

        // Flat EQ: avg 0.5 * 0.8 + 0.2 = 0.6
        assert!((signal.deck_a.post_eq - 0.6).abs() < EPS);
        assert!((signal.deck_a.post_crossfade - 0.48).abs() < EPS);
        assert_eq!(signal.deck_b.post_crossfade, 0.0);
        assert!((signal.master - 0.384).abs() < EPS);
    }

    #[test]
    fn test_full_eq_boost_gives_unit_factor() {
        let mut state = AppState::default();
        state.deck_a.is_playing = true;
        state.deck_a.is_loaded = true;
        state.deck_a.volume = 0.8;
        state.deck_a.eq = crate::state::EqState { low: 1.0, mid: 1.0, high: 1.0 };
        state.mixer.crossfader = -0.5;
        state.mixer.master_volume = 0.8;

        let signal = SignalStrength::from_state(&state);
        assert!((signal.deck_a.post_crossfade - 0.8).abs() < EPS);
        assert!((signal.master - 0.64).abs() < EPS);
        assert_eq!(signal.deck_b.source, 0.0);
    }

    #[test]
    fn test_full_crossfade_to_b() {
        let mut state = AppState::default();
        for deck in DeckId::ALL {
            let d = state.deck_mut(deck);
            d.is_loaded = true;
            d.is_playing = true;
            d.volume = 1.0;
        }
        state.mixer.crossfader = 1.0;

        assert_eq!(crossfade_gain(1.0, DeckId::A), 0.0);
        assert_eq!(crossfade_gain(1.0, DeckId::B), 1.0);

        let signal = SignalStrength::from_state(&state);
        assert_eq!(signal.channel(DeckId::A).post_crossfade, 0.0);
        assert!(signal.channel(DeckId::B).post_crossfade > 0.0);
    }

    #[test]
    fn test_master_is_capped() {
        let mut state = AppState::default();
        for deck in DeckId::ALL {
            let d = state.deck_mut(deck);
            d.is_loaded = true;
            d.is_playing = true;
            d.volume = 1.0;
            d.eq = crate::state::EqState { low: 1.0, mid: 1.0, high: 1.0 };
        }
        state.mixer.crossfader = 0.0;
        state.mixer.master_volume = 1.0;
        assert_eq!(SignalStrength::from_state(&state).master, 1.0);
    }

    #[test]
    fn test_wire_opacity() {
        assert!((wire_opacity(0.0) - 0.2).abs() < EPS);
        assert!((wire_opacity(1.0) - 1.0).abs() < EPS);
    }
}
