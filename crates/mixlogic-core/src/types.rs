//! Common types for MixLogic
//!
//! Fundamental audio types shared by the control and render halves of the
//! engine: stereo samples, stereo buffers and the two deck identities.

use serde::{Deserialize, Serialize};

/// Default engine sample rate (48kHz - standard professional audio rate)
/// The output backend may negotiate a different rate at runtime.
pub const SAMPLE_RATE: u32 = 48000;

/// Number of decks on the mixer
pub const NUM_DECKS: usize = 2;

/// Audio sample type (32-bit float for processing)
pub type Sample = f32;

/// Deck identifiers
///
/// The mixer has exactly two symmetric channels. Selecting a deck is always
/// done through this enum, never through a string key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(usize)]
pub enum DeckId {
    A = 0,
    B = 1,
}

impl DeckId {
    /// Both decks in channel order
    pub const ALL: [DeckId; NUM_DECKS] = [DeckId::A, DeckId::B];

    /// Channel index (0 for A, 1 for B)
    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    /// The opposite deck
    pub fn other(self) -> Self {
        match self {
            DeckId::A => DeckId::B,
            DeckId::B => DeckId::A,
        }
    }

    /// Display name
    pub fn name(self) -> &'static str {
        match self {
            DeckId::A => "Deck A",
            DeckId::B => "Deck B",
        }
    }
}

impl std::str::FromStr for DeckId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "a" | "deck_a" | "decka" => Ok(DeckId::A),
            "b" | "deck_b" | "deckb" => Ok(DeckId::B),
            other => Err(format!("unknown deck '{}'", other)),
        }
    }
}

impl std::fmt::Display for DeckId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// One stereo frame
///
/// `#[repr(C)]` fixes the layout to `[left, right]`, so a frame slice can
/// be reinterpreted as interleaved `f32`s.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct StereoSample {
    pub left: Sample,
    pub right: Sample,
}

impl StereoSample {
    #[inline]
    pub fn new(left: Sample, right: Sample) -> Self {
        Self { left, right }
    }

    #[inline]
    pub fn silence() -> Self {
        Self::default()
    }

    /// Same value on both sides
    #[inline]
    pub fn mono(value: Sample) -> Self {
        Self::new(value, value)
    }

    /// Larger of the two absolute values
    #[inline]
    pub fn peak(&self) -> Sample {
        self.left.abs().max(self.right.abs())
    }
}

impl std::ops::Add for StereoSample {
    type Output = Self;

    #[inline]
    fn add(self, rhs: Self) -> Self {
        Self::new(self.left + rhs.left, self.right + rhs.right)
    }
}

impl std::ops::AddAssign for StereoSample {
    #[inline]
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl std::ops::Mul<Sample> for StereoSample {
    type Output = Self;

    #[inline]
    fn mul(self, gain: Sample) -> Self {
        Self::new(self.left * gain, self.right * gain)
    }
}

impl std::ops::MulAssign<Sample> for StereoSample {
    #[inline]
    fn mul_assign(&mut self, gain: Sample) {
        *self = *self * gain;
    }
}

/// Owned run of stereo frames
///
/// Holds decoded tracks as well as the renderer's per-block scratch space.
#[derive(Debug, Clone, Default)]
pub struct StereoBuffer {
    frames: Vec<StereoSample>,
}

impl StereoBuffer {
    /// `len` frames of silence
    pub fn silence(len: usize) -> Self {
        Self {
            frames: vec![StereoSample::silence(); len],
        }
    }

    pub fn from_vec(frames: Vec<StereoSample>) -> Self {
        Self { frames }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Resize within the capacity reserved at construction
    ///
    /// Growing exposes silent frames. Safe on the audio thread as long as
    /// `new_len` never exceeds the original length.
    #[inline]
    pub fn set_len_from_capacity(&mut self, new_len: usize) {
        debug_assert!(new_len <= self.frames.capacity(), "buffer would reallocate");
        if new_len > self.frames.len() {
            self.frames.resize(new_len, StereoSample::silence());
        } else {
            self.frames.truncate(new_len);
        }
    }

    pub fn fill_silence(&mut self) {
        self.frames.fill(StereoSample::silence());
    }

    #[inline]
    pub fn as_slice(&self) -> &[StereoSample] {
        &self.frames
    }

    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [StereoSample] {
        &mut self.frames
    }

    /// Interleaved `[L, R, L, R, ...]` view without copying
    #[inline]
    pub fn as_interleaved(&self) -> &[Sample] {
        bytemuck::cast_slice(&self.frames)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, StereoSample> {
        self.frames.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, StereoSample> {
        self.frames.iter_mut()
    }

    /// Peak absolute sample over both sides
    pub fn peak(&self) -> Sample {
        self.frames.iter().fold(0.0, |acc, s| acc.max(s.peak()))
    }
}
