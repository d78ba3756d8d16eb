//! Per-deck transport bookkeeping
//!
//! The transport lives on the control side and never asks the render path
//! where a voice is. Position is derived from wall-clock timestamps taken
//! at play/stop transitions:
//!
//! ```text
//! position = offset + (now - start_time) * rate_at_start   (mod duration)
//! ```
//!
//! `rate_at_start` is the rate the deck was started with. Speed changes
//! during the same playing interval glide the audio but do not feed back
//! into the offset, so the resume point drifts slightly after a mid-play
//! speed change.

use super::voice::VoiceId;

/// Lifecycle state of one deck
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportState {
    /// No track installed
    Empty,
    /// Track installed, not sounding
    Stopped,
    /// A voice is running
    Playing,
}

/// Voice to start on the render path
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VoiceStart {
    pub voice: VoiceId,
    /// Start position in seconds, already wrapped into the track
    pub start_seconds: f64,
    pub rate: f32,
}

/// Play/stop/resume state machine for one deck
#[derive(Debug, Clone)]
pub struct TransportController {
    state: TransportState,
    /// Track length in seconds
    duration: f64,
    /// Resume position in seconds
    offset: f64,
    /// Wall-clock time of the last play
    start_time: f64,
    rate_at_start: f32,
    /// Rate remembered for the next play, or the live rate while playing
    speed: f32,
    active_voice: Option<VoiceId>,
    next_voice: VoiceId,
}

impl Default for TransportController {
    fn default() -> Self {
        Self::new()
    }
}

impl TransportController {
    pub fn new() -> Self {
        Self {
            state: TransportState::Empty,
            duration: 0.0,
            offset: 0.0,
            start_time: 0.0,
            rate_at_start: 1.0,
            speed: 1.0,
            active_voice: None,
            next_voice: 1,
        }
    }

    pub fn state(&self) -> TransportState {
        self.state
    }

    pub fn is_playing(&self) -> bool {
        self.state == TransportState::Playing
    }

    pub fn is_loaded(&self) -> bool {
        self.state != TransportState::Empty
    }

    /// Duration of the installed track in seconds (0 when empty)
    pub fn duration(&self) -> f64 {
        self.duration
    }

    /// Resume offset in seconds
    pub fn offset(&self) -> f64 {
        self.offset
    }

    /// Current rate (live while playing, pending while stopped)
    pub fn speed(&self) -> f32 {
        self.speed
    }

    pub fn active_voice(&self) -> Option<VoiceId> {
        self.active_voice
    }

    fn wrap(&self, seconds: f64) -> f64 {
        if self.duration > 0.0 {
            seconds.rem_euclid(self.duration)
        } else {
            0.0
        }
    }

    /// Derived playback position in seconds, wrapped into the track
    pub fn position(&self, now: f64) -> f64 {
        match self.state {
            TransportState::Empty => 0.0,
            TransportState::Stopped => self.wrap(self.offset),
            TransportState::Playing => {
                let elapsed = (now - self.start_time).max(0.0);
                self.wrap(self.offset + elapsed * self.rate_at_start as f64)
            }
        }
    }

    /// Install a track of `duration` seconds
    ///
    /// Valid from any state. Stops playback first and resets the offset.
    /// Returns the voice that was playing, if any.
    pub fn load(&mut self, duration: f64) -> Option<VoiceId> {
        let released = self.active_voice.take();
        self.duration = if duration.is_finite() { duration.max(0.0) } else { 0.0 };
        self.offset = 0.0;
        self.state = TransportState::Stopped;
        released
    }

    /// Start a fresh voice at the resume offset
    ///
    /// No-op (returns `None`) when empty or already playing.
    pub fn play(&mut self, now: f64, speed: f32) -> Option<VoiceStart> {
        if self.state != TransportState::Stopped {
            return None;
        }

        let voice = self.next_voice;
        self.next_voice += 1;

        if speed.is_finite() {
            self.speed = speed;
        }
        self.offset = self.wrap(self.offset);
        self.start_time = now;
        self.rate_at_start = self.speed;
        self.active_voice = Some(voice);
        self.state = TransportState::Playing;

        Some(VoiceStart {
            voice,
            start_seconds: self.offset,
            rate: self.speed,
        })
    }

    /// Stop the running voice and accumulate the elapsed position
    ///
    /// No-op (returns `None`) unless playing.
    pub fn stop(&mut self, now: f64) -> Option<VoiceId> {
        if self.state != TransportState::Playing {
            return None;
        }
        let elapsed = (now - self.start_time).max(0.0);
        self.offset = self.wrap(self.offset + elapsed * self.rate_at_start as f64);
        self.state = TransportState::Stopped;
        self.active_voice.take()
    }

    /// Change the playback rate
    ///
    /// While playing, returns the voice whose rate must glide to `speed`
    /// (only if the rate actually changed). While stopped the value is
    /// remembered for the next play.
    pub fn set_speed(&mut self, speed: f32) -> Option<VoiceId> {
        if !speed.is_finite() || speed == self.speed {
            return None;
        }
        self.speed = speed;
        match self.state {
            TransportState::Playing => self.active_voice,
            _ => None,
        }
    }

    /// Drop the track and return to `Empty`
    pub fn unload(&mut self) -> Option<VoiceId> {
        let released = self.active_voice.take();
        self.state = TransportState::Empty;
        self.duration = 0.0;
        self.offset = 0.0;
        released
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    fn loaded(duration: f64) -> TransportController {
        let mut transport = TransportController::new();
        transport.load(duration);
        transport
    }

    #[test]
    fn test_empty_transport_ignores_play_and_stop() {
        let mut transport = TransportController::new();
        assert_eq!(transport.play(0.0, 1.0), None);
        assert_eq!(transport.stop(1.0), None);
        assert_eq!(transport.state(), TransportState::Empty);
        assert_eq!(transport.position(5.0), 0.0);
    }

    #[test]
    fn test_play_twice_is_noop() {
        let mut transport = loaded(10.0);
        let first = transport.play(0.0, 1.0);
        assert!(first.is_some());
        assert_eq!(transport.play(0.5, 1.0), None);
        assert_eq!(transport.active_voice(), first.map(|s| s.voice));
    }

    #[test]
    fn test_stop_when_stopped_is_noop() {
        let mut transport = loaded(10.0);
        assert_eq!(transport.stop(3.0), None);
        assert_eq!(transport.offset(), 0.0);
    }

    #[test]
    fn test_resume_idempotence() {
        for &speed in &[0.92f32, 1.0, 1.08] {
            for &t in &[0.0f64, 0.25, 1.0, 3.7, 9.99, 12.5, 41.0] {
                let mut transport = loaded(10.0);
                transport.play(100.0, speed);
                let at_stop = transport.position(100.0 + t);
                transport.stop(100.0 + t);

                let resumed = transport.play(200.0, speed).unwrap();
                let expected = (t * speed as f64).rem_euclid(10.0);
                assert!((resumed.start_seconds - expected).abs() < 1e-6, "t={} speed={}", t, speed);
                assert!((resumed.start_seconds - at_stop).abs() < EPS);
                assert!((transport.position(200.0) - at_stop).abs() < EPS);
            }
        }
    }

    #[test]
    fn test_position_advances_with_rate() {
        let mut transport = loaded(60.0);
        transport.play(0.0, 1.08);
        assert!((transport.position(10.0) - 10.8).abs() < 1e-5);
    }

    #[test]
    fn test_load_resets_position_and_stops() {
        let mut transport = loaded(10.0);
        let start = transport.play(0.0, 1.0).unwrap();
        transport.stop(4.0);
        transport.play(4.0, 1.0);

        let released = transport.load(20.0);
        assert!(released.is_some());
        assert_ne!(released, Some(start.voice));
        assert_eq!(transport.state(), TransportState::Stopped);
        assert_eq!(transport.offset(), 0.0);
        assert_eq!(transport.duration(), 20.0);
    }

    #[test]
    fn test_voice_ids_increase() {
        let mut transport = loaded(10.0);
        let a = transport.play(0.0, 1.0).unwrap().voice;
        transport.stop(1.0);
        let b = transport.play(1.0, 1.0).unwrap().voice;
        assert!(b > a);
    }

    #[test]
    fn test_set_speed_while_stopped_is_remembered() {
        let mut transport = loaded(10.0);
        assert_eq!(transport.set_speed(1.05), None);
        assert_eq!(transport.speed(), 1.05);
    }

    #[test]
    fn test_set_speed_while_playing_targets_voice() {
        let mut transport = loaded(10.0);
        let voice = transport.play(0.0, 1.0).unwrap().voice;
        assert_eq!(transport.set_speed(1.02), Some(voice));
        // Unchanged speed needs no update
        assert_eq!(transport.set_speed(1.02), None);
    }

    #[test]
    fn test_mid_play_speed_change_uses_rate_at_start() {
        let mut transport = loaded(100.0);
        transport.play(0.0, 1.0);
        transport.set_speed(1.08);
        transport.stop(10.0);
        assert!((transport.offset() - 10.0).abs() < EPS);
    }

    #[test]
    fn test_clock_going_backwards_does_not_rewind() {
        let mut transport = loaded(10.0);
        transport.play(5.0, 1.0);
        transport.stop(4.0);
        assert_eq!(transport.offset(), 0.0);
    }

    #[test]
    fn test_unload() {
        let mut transport = loaded(10.0);
        transport.play(0.0, 1.0);
        assert!(transport.unload().is_some());
        assert_eq!(transport.state(), TransportState::Empty);
        assert!(!transport.is_loaded());
    }
}
