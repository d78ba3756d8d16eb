//! Real-time half of the engine
//!
//! [`MixRenderer`] owns the audio graph: one voice slot and one
//! [`ChannelChain`] per deck plus the [`MasterStage`]. It is driven by the
//! output backend (or directly by tests) and never allocates while
//! rendering; all buffers are sized at construction.

use crate::audio_file::DecodedTrack;
use crate::config::{EngineConfig, SmoothingConfig, MAX_BUFFER_SIZE};
use crate::types::{DeckId, StereoBuffer, StereoSample, NUM_DECKS};

use super::command::EngineCommand;
use super::mixer::{ChannelChain, MasterStage};
use super::voice::{Voice, VoiceId};

/// Render-side state of one deck
struct RenderChannel {
    track: Option<DecodedTrack>,
    voice: Option<Voice>,
    chain: ChannelChain,
    buffer: StereoBuffer,
}

impl RenderChannel {
    fn new(smoothing: &SmoothingConfig, sample_rate: u32) -> Self {
        Self {
            track: None,
            voice: None,
            chain: ChannelChain::new(smoothing, sample_rate),
            buffer: StereoBuffer::silence(MAX_BUFFER_SIZE),
        }
    }

    fn voice_matches(&self, id: VoiceId) -> bool {
        self.voice.as_ref().map_or(false, |v| v.id() == id)
    }

    /// Render this channel's contribution for `len` frames into `self.buffer`
    fn render(&mut self, len: usize) {
        self.buffer.set_len_from_capacity(len);
        match self.voice.as_mut() {
            Some(voice) => voice.render(self.buffer.as_mut_slice()),
            None => self.buffer.fill_silence(),
        }
        self.chain.process(self.buffer.as_mut_slice());
    }
}

/// The render graph, fed by [`EngineCommand`]s
pub struct MixRenderer {
    commands: rtrb::Consumer<EngineCommand>,
    channels: [RenderChannel; NUM_DECKS],
    master: MasterStage,
    mix: StereoBuffer,
    sample_rate: u32,
    rate_time_constant: f32,
    shut_down: bool,
}

impl MixRenderer {
    pub(crate) fn new(config: &EngineConfig, commands: rtrb::Consumer<EngineCommand>) -> Self {
        let sample_rate = config.sample_rate.max(1);
        let smoothing = config.smoothing;
        Self {
            commands,
            channels: [
                RenderChannel::new(&smoothing, sample_rate),
                RenderChannel::new(&smoothing, sample_rate),
            ],
            master: MasterStage::new(&smoothing, sample_rate),
            mix: StereoBuffer::silence(MAX_BUFFER_SIZE),
            sample_rate,
            rate_time_constant: smoothing.speed_time_constant,
            shut_down: false,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Whether a `Shutdown` command has been processed
    pub fn is_shut_down(&self) -> bool {
        self.shut_down
    }

    /// Whether the deck currently has a running voice
    pub fn is_voice_active(&self, deck: DeckId) -> bool {
        self.channels[deck.index()].voice.is_some()
    }

    /// Id of the deck's running voice
    pub fn active_voice(&self, deck: DeckId) -> Option<VoiceId> {
        self.channels[deck.index()].voice.as_ref().map(|v| v.id())
    }

    /// Current (smoothed) playback rate of the deck's running voice
    pub fn voice_rate(&self, deck: DeckId) -> Option<f32> {
        self.channels[deck.index()].voice.as_ref().map(|v| v.rate())
    }

    pub fn has_track(&self, deck: DeckId) -> bool {
        self.channels[deck.index()].track.is_some()
    }

    pub fn channel_chain(&self, deck: DeckId) -> &ChannelChain {
        &self.channels[deck.index()].chain
    }

    pub fn master(&self) -> &MasterStage {
        &self.master
    }

    /// Apply every queued command
    pub fn process_commands(&mut self) {
        while let Ok(cmd) = self.commands.pop() {
            self.apply(cmd);
        }
    }

    fn apply(&mut self, cmd: EngineCommand) {
        if self.shut_down {
            return;
        }
        match cmd {
            EngineCommand::LoadTrack { deck, track } => {
                let channel = &mut self.channels[deck.index()];
                // Old voice and track are released here; basedrop defers the free
                channel.voice = None;
                channel.track = Some(track);
                channel.chain.reset();
            }
            EngineCommand::UnloadTrack { deck } => {
                let channel = &mut self.channels[deck.index()];
                channel.voice = None;
                channel.track = None;
            }
            EngineCommand::StartVoice { deck, voice, start_seconds, rate } => {
                let sample_rate = self.sample_rate;
                let rate_tc = self.rate_time_constant;
                let channel = &mut self.channels[deck.index()];
                if let Some(track) = channel.track.as_ref() {
                    channel.voice = Some(Voice::new(
                        voice,
                        track.samples().clone(),
                        track.sample_rate(),
                        sample_rate,
                        start_seconds,
                        rate,
                        rate_tc,
                    ));
                }
            }
            EngineCommand::StopVoice { deck, voice } => {
                let channel = &mut self.channels[deck.index()];
                if channel.voice_matches(voice) {
                    channel.voice = None;
                }
            }
            EngineCommand::SetRate { deck, voice, rate } => {
                if let Some(v) = self.channels[deck.index()].voice.as_mut() {
                    if v.id() == voice {
                        v.set_rate(rate);
                    }
                }
            }
            EngineCommand::SetVolume { deck, volume } => {
                self.channels[deck.index()].chain.set_volume(volume);
            }
            EngineCommand::SetEq { deck, low, mid, high } => {
                self.channels[deck.index()].chain.set_eq(low, mid, high);
            }
            EngineCommand::SetCrossfadeGain { deck, gain } => {
                self.channels[deck.index()].chain.set_crossfade_gain(gain);
            }
            EngineCommand::SetMasterVolume { volume } => {
                self.master.set_volume(volume);
            }
            EngineCommand::Shutdown => {
                for channel in self.channels.iter_mut() {
                    channel.voice = None;
                    channel.track = None;
                }
                self.shut_down = true;
            }
        }
    }

    /// Render one block at the master output
    ///
    /// `output.len()` frames are produced; blocks longer than the
    /// pre-allocated size are rendered in chunks.
    pub fn render(&mut self, output: &mut StereoBuffer) {
        self.process_commands();

        let total = output.len();
        let mut done = 0;
        while done < total {
            let len = (total - done).min(MAX_BUFFER_SIZE);
            self.render_chunk(len);
            output.as_mut_slice()[done..done + len].copy_from_slice(&self.mix.as_slice()[..len]);
            done += len;
        }
    }

    /// Render into an interleaved stereo `f32` slice
    ///
    /// `channels` is the device channel count; the mix goes to the first
    /// two channels and the rest are zeroed.
    pub fn render_interleaved(&mut self, output: &mut [f32], channels: usize) {
        self.process_commands();

        let channels = channels.max(1);
        let total = output.len() / channels;
        let mut done = 0;
        while done < total {
            let len = (total - done).min(MAX_BUFFER_SIZE);
            self.render_chunk(len);

            let frames = &mut output[done * channels..(done + len) * channels];
            if channels == 2 {
                frames.copy_from_slice(self.mix.as_interleaved());
                done += len;
                continue;
            }
            for (frame, sample) in frames.chunks_exact_mut(channels).zip(self.mix.iter()) {
                frame.fill(0.0);
                if channels == 1 {
                    frame[0] = (sample.left + sample.right) * 0.5;
                } else {
                    frame[0] = sample.left;
                    frame[1] = sample.right;
                }
            }
            done += len;
        }
    }

    fn render_chunk(&mut self, len: usize) {
        self.mix.set_len_from_capacity(len);
        self.mix.fill_silence();

        if self.shut_down {
            return;
        }

        for channel in self.channels.iter_mut() {
            channel.render(len);
            for (out, s) in self.mix.iter_mut().zip(channel.buffer.iter()) {
                *out += *s;
            }
        }
        self.master.process(self.mix.as_mut_slice());
    }
}

impl std::fmt::Debug for MixRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MixRenderer")
            .field("sample_rate", &self.sample_rate)
            .field("voice_a", &self.active_voice(DeckId::A))
            .field("voice_b", &self.active_voice(DeckId::B))
            .field("shut_down", &self.shut_down)
            .finish()
    }
}
