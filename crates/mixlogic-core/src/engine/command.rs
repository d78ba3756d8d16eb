//! Lock-free command queue from the control side to the renderer
//!
//! [`MixEngine`](super::MixEngine) pushes commands without ever blocking;
//! [`MixRenderer`](super::MixRenderer) drains the queue at the start of
//! every block, so parameter changes land on block boundaries.
//!
//! The queue is an `rtrb` single-producer single-consumer ring buffer: no
//! allocation after construction, wait-free push and pop.

use crate::audio_file::DecodedTrack;
use crate::types::DeckId;

use super::voice::VoiceId;

/// Commands sent from the control thread to the render thread
pub enum EngineCommand {
    // Track management
    /// Swap in a decoded track, releasing any running voice on the deck
    LoadTrack { deck: DeckId, track: DecodedTrack },
    /// Remove the track from a deck
    UnloadTrack { deck: DeckId },

    // Transport
    /// Start a voice at `start_seconds` into the track
    StartVoice {
        deck: DeckId,
        voice: VoiceId,
        start_seconds: f64,
        rate: f32,
    },
    /// Release a voice; ignored if `voice` is no longer current
    StopVoice { deck: DeckId, voice: VoiceId },
    /// Glide a voice to a new playback rate
    SetRate { deck: DeckId, voice: VoiceId, rate: f32 },

    // Channel parameters (full values, never deltas)
    SetVolume { deck: DeckId, volume: f32 },
    SetEq { deck: DeckId, low: f32, mid: f32, high: f32 },
    SetCrossfadeGain { deck: DeckId, gain: f32 },

    // Master
    SetMasterVolume { volume: f32 },

    /// Release all voices and tracks; the renderer outputs silence afterwards
    Shutdown,
}

impl std::fmt::Debug for EngineCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineCommand::LoadTrack { deck, track } => {
                write!(f, "LoadTrack({}, {:.2}s)", deck, track.duration())
            }
            EngineCommand::UnloadTrack { deck } => write!(f, "UnloadTrack({})", deck),
            EngineCommand::StartVoice { deck, voice, start_seconds, rate } => write!(
                f,
                "StartVoice({}, #{}, at {:.3}s, rate {:.3})",
                deck, voice, start_seconds, rate
            ),
            EngineCommand::StopVoice { deck, voice } => write!(f, "StopVoice({}, #{})", deck, voice),
            EngineCommand::SetRate { deck, voice, rate } => {
                write!(f, "SetRate({}, #{}, {:.3})", deck, voice, rate)
            }
            EngineCommand::SetVolume { deck, volume } => write!(f, "SetVolume({}, {:.3})", deck, volume),
            EngineCommand::SetEq { deck, low, mid, high } => {
                write!(f, "SetEq({}, {:.2}/{:.2}/{:.2})", deck, low, mid, high)
            }
            EngineCommand::SetCrossfadeGain { deck, gain } => {
                write!(f, "SetCrossfadeGain({}, {:.3})", deck, gain)
            }
            EngineCommand::SetMasterVolume { volume } => write!(f, "SetMasterVolume({:.3})", volume),
            EngineCommand::Shutdown => write!(f, "Shutdown"),
        }
    }
}

/// Command queue capacity
///
/// One `synchronize` pushes at most a dozen commands, so this absorbs
/// several hundred calls between two render blocks.
pub const COMMAND_QUEUE_CAPACITY: usize = 4096;

/// Create a new command channel (producer/consumer pair)
///
/// The producer belongs to the control thread, the consumer to the
/// render thread.
pub fn command_channel() -> (rtrb::Producer<EngineCommand>, rtrb::Consumer<EngineCommand>) {
    command_channel_with_capacity(COMMAND_QUEUE_CAPACITY)
}

pub(crate) fn command_channel_with_capacity(
    capacity: usize,
) -> (rtrb::Producer<EngineCommand>, rtrb::Consumer<EngineCommand>) {
    rtrb::RingBuffer::new(capacity.max(1))
}
