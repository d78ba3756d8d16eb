//! Render-side playback of one decoded track
//!
//! A voice reads its track in a loop at a variable, smoothed rate. Voices
//! are created on play and released on stop; each carries the id the
//! control side assigned so stale commands can be told apart.

use basedrop::Shared;

use crate::types::{StereoBuffer, StereoSample};

use super::smoothing::SmoothedParam;

/// Identifier of one playback instance, unique per deck
pub type VoiceId = u64;

/// Catmull-Rom interpolation between `s1` and `s2`
#[inline]
fn cubic_interpolate(
    s0: StereoSample,
    s1: StereoSample,
    s2: StereoSample,
    s3: StereoSample,
    t: f32,
) -> StereoSample {
    let t2 = t * t;
    let t3 = t2 * t;

    let c0 = -0.5 * t3 + t2 - 0.5 * t;
    let c1 = 1.5 * t3 - 2.5 * t2 + 1.0;
    let c2 = -1.5 * t3 + 2.0 * t2 + 0.5 * t;
    let c3 = 0.5 * t3 - 0.5 * t2;

    StereoSample {
        left: s0.left * c0 + s1.left * c1 + s2.left * c2 + s3.left * c3,
        right: s0.right * c0 + s1.right * c1 + s2.right * c2 + s3.right * c3,
    }
}

/// One looping playback instance
pub struct Voice {
    id: VoiceId,
    samples: Shared<StereoBuffer>,
    /// Read position in source frames
    position: f64,
    /// Source frames advanced per output frame at rate 1.0
    step: f64,
    rate: SmoothedParam,
}

impl Voice {
    /// Start reading `samples` at `start_seconds`
    ///
    /// `source_rate` is the track's sample rate, `output_rate` the
    /// renderer's. The start position wraps around the track length.
    pub fn new(
        id: VoiceId,
        samples: Shared<StereoBuffer>,
        source_rate: u32,
        output_rate: u32,
        start_seconds: f64,
        rate: f32,
        rate_time_constant: f32,
    ) -> Self {
        let len = samples.len() as f64;
        let start = start_seconds.max(0.0) * source_rate as f64;
        let position = if len > 0.0 { start.rem_euclid(len) } else { 0.0 };
        Self {
            id,
            samples,
            position,
            step: source_rate as f64 / output_rate.max(1) as f64,
            rate: SmoothedParam::new(rate, rate_time_constant, output_rate),
        }
    }

    #[inline]
    pub fn id(&self) -> VoiceId {
        self.id
    }

    /// Current read position in source frames
    pub fn position(&self) -> f64 {
        self.position
    }

    /// Glide to a new playback rate
    pub fn set_rate(&mut self, rate: f32) {
        self.rate.set_target(rate);
    }

    pub fn rate(&self) -> f32 {
        self.rate.current()
    }

    /// Overwrite `out` with the next frames of the track
    pub fn render(&mut self, out: &mut [StereoSample]) {
        let src = self.samples.as_slice();
        let len = src.len();
        if len == 0 {
            out.fill(StereoSample::silence());
            return;
        }
        let len_f = len as f64;

        for frame in out.iter_mut() {
            let idx = self.position as usize % len;
            let t = (self.position - self.position.floor()) as f32;

            let s0 = src[(idx + len - 1) % len];
            let s1 = src[idx];
            let s2 = src[(idx + 1) % len];
            let s3 = src[(idx + 2) % len];
            *frame = cubic_interpolate(s0, s1, s2, s3, t);

            self.position += self.step * self.rate.next() as f64;
            if self.position >= len_f {
                self.position -= len_f;
                // Guard against steps larger than the whole track
                if self.position >= len_f {
                    self.position = self.position.rem_euclid(len_f);
                }
            }
        }
    }
}
