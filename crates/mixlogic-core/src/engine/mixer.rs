//! Channel processing chains and the master stage
//!
//! Each deck owns one [`ChannelChain`]:
//!
//! ```text
//! voice → low shelf → peaking mid → high shelf → channel gain → crossfade gain
//! ```
//!
//! Both chains sum into the [`MasterStage`], which applies the master gain.
//! All gains are smoothed so fader moves never click.

use crate::config::SmoothingConfig;
use crate::types::StereoSample;

use super::eq::ThreeBandEq;
use super::smoothing::SmoothedParam;

/// One deck's signal path after the voice
#[derive(Debug, Clone)]
pub struct ChannelChain {
    eq: ThreeBandEq,
    volume: SmoothedParam,
    crossfade: SmoothedParam,
}

impl ChannelChain {
    /// New chain with flat EQ and both gains at zero
    pub fn new(smoothing: &SmoothingConfig, sample_rate: u32) -> Self {
        Self {
            eq: ThreeBandEq::new(smoothing.eq_time_constant, sample_rate),
            volume: SmoothedParam::new(0.0, smoothing.gain_time_constant, sample_rate),
            crossfade: SmoothedParam::new(0.0, smoothing.gain_time_constant, sample_rate),
        }
    }

    /// EQ knob positions (0-1 each)
    pub fn set_eq(&mut self, low: f32, mid: f32, high: f32) {
        self.eq.set_knobs(low, mid, high);
    }

    /// Channel fader (0-1, linear)
    pub fn set_volume(&mut self, volume: f32) {
        self.volume.set_target(volume.clamp(0.0, 1.0));
    }

    /// Gain from the crossfade law (0-1)
    pub fn set_crossfade_gain(&mut self, gain: f32) {
        self.crossfade.set_target(gain.clamp(0.0, 1.0));
    }

    pub fn eq(&self) -> &ThreeBandEq {
        &self.eq
    }

    /// Current smoothed (channel gain, crossfade gain)
    pub fn gains(&self) -> (f32, f32) {
        (self.volume.current(), self.crossfade.current())
    }

    /// Run a block through the chain in place
    pub fn process(&mut self, block: &mut [StereoSample]) {
        self.eq.process(block);
        for sample in block.iter_mut() {
            let gain = self.volume.next() * self.crossfade.next();
            *sample *= gain;
        }
    }

    /// Clear filter memory
    pub fn reset(&mut self) {
        self.eq.reset();
    }
}

/// Master gain applied to the summed channels
#[derive(Debug, Clone)]
pub struct MasterStage {
    gain: SmoothedParam,
}

impl MasterStage {
    pub fn new(smoothing: &SmoothingConfig, sample_rate: u32) -> Self {
        Self {
            gain: SmoothedParam::new(0.0, smoothing.gain_time_constant, sample_rate),
        }
    }

    pub fn set_volume(&mut self, volume: f32) {
        self.gain.set_target(volume.clamp(0.0, 1.0));
    }

    pub fn volume(&self) -> f32 {
        self.gain.current()
    }

    pub fn process(&mut self, block: &mut [StereoSample]) {
        for sample in block.iter_mut() {
            *sample *= self.gain.next();
        }
    }
}
