//! 3-band channel EQ
//!
//! Low shelf at 320 Hz, peaking mid at 1 kHz, high shelf at 3.2 kHz.
//! Knob positions map linearly onto ±20 dB with 0.5 as flat.

use crate::types::StereoSample;

use super::smoothing::SmoothedParam;

/// Low shelf corner frequency
pub const EQ_LOW_FREQ: f32 = 320.0;
/// Mid peaking center frequency
pub const EQ_MID_FREQ: f32 = 1000.0;
/// High shelf corner frequency
pub const EQ_HIGH_FREQ: f32 = 3200.0;
/// Q for the mid band
const EQ_MID_Q: f32 = std::f32::consts::FRAC_1_SQRT_2;
/// Full knob travel in dB (from -20 to +20)
const EQ_RANGE_DB: f32 = 40.0;
/// Gains closer to 0 dB than this bypass the biquad
const FLAT_DB: f32 = 0.01;

/// Convert an EQ knob position (0-1) to a gain in dB
///
/// 0.0 = -20dB, 0.5 = 0dB, 1.0 = +20dB
#[inline]
pub fn eq_to_db(value: f32) -> f32 {
    (value - 0.5) * EQ_RANGE_DB
}

/// Biquad filter coefficients (normalized, a0 = 1)
#[derive(Debug, Clone, Copy, PartialEq)]
struct BiquadCoeffs {
    b0: f32,
    b1: f32,
    b2: f32,
    a1: f32,
    a2: f32,
}

impl BiquadCoeffs {
    /// Low shelf, shelf slope S = 1
    fn low_shelf(freq: f32, gain_db: f32, sample_rate: f32) -> Self {
        let a = 10.0_f32.powf(gain_db / 40.0);
        let w0 = 2.0 * std::f32::consts::PI * freq / sample_rate;
        let cos_w0 = w0.cos();
        let alpha = w0.sin() / 2.0 * std::f32::consts::SQRT_2;
        let two_sqrt_a_alpha = 2.0 * a.sqrt() * alpha;

        let a0 = (a + 1.0) + (a - 1.0) * cos_w0 + two_sqrt_a_alpha;
        Self {
            b0: (a * ((a + 1.0) - (a - 1.0) * cos_w0 + two_sqrt_a_alpha)) / a0,
            b1: (2.0 * a * ((a - 1.0) - (a + 1.0) * cos_w0)) / a0,
            b2: (a * ((a + 1.0) - (a - 1.0) * cos_w0 - two_sqrt_a_alpha)) / a0,
            a1: (-2.0 * ((a - 1.0) + (a + 1.0) * cos_w0)) / a0,
            a2: ((a + 1.0) + (a - 1.0) * cos_w0 - two_sqrt_a_alpha) / a0,
        }
    }

    /// Peaking bell
    fn peaking(freq: f32, gain_db: f32, q: f32, sample_rate: f32) -> Self {
        let a = 10.0_f32.powf(gain_db / 40.0);
        let w0 = 2.0 * std::f32::consts::PI * freq / sample_rate;
        let cos_w0 = w0.cos();
        let alpha = w0.sin() / (2.0 * q);

        let a0 = 1.0 + alpha / a;
        Self {
            b0: (1.0 + alpha * a) / a0,
            b1: (-2.0 * cos_w0) / a0,
            b2: (1.0 - alpha * a) / a0,
            a1: (-2.0 * cos_w0) / a0,
            a2: (1.0 - alpha / a) / a0,
        }
    }

    /// High shelf, shelf slope S = 1
    fn high_shelf(freq: f32, gain_db: f32, sample_rate: f32) -> Self {
        let a = 10.0_f32.powf(gain_db / 40.0);
        let w0 = 2.0 * std::f32::consts::PI * freq / sample_rate;
        let cos_w0 = w0.cos();
        let alpha = w0.sin() / 2.0 * std::f32::consts::SQRT_2;
        let two_sqrt_a_alpha = 2.0 * a.sqrt() * alpha;

        let a0 = (a + 1.0) - (a - 1.0) * cos_w0 + two_sqrt_a_alpha;
        Self {
            b0: (a * ((a + 1.0) + (a - 1.0) * cos_w0 + two_sqrt_a_alpha)) / a0,
            b1: (-2.0 * a * ((a - 1.0) + (a + 1.0) * cos_w0)) / a0,
            b2: (a * ((a + 1.0) + (a - 1.0) * cos_w0 - two_sqrt_a_alpha)) / a0,
            a1: (2.0 * ((a - 1.0) - (a + 1.0) * cos_w0)) / a0,
            a2: ((a + 1.0) - (a - 1.0) * cos_w0 - two_sqrt_a_alpha) / a0,
        }
    }

    fn passthrough() -> Self {
        Self { b0: 1.0, b1: 0.0, b2: 0.0, a1: 0.0, a2: 0.0 }
    }
}

/// Direct form I state for both sides
#[derive(Debug, Clone, Copy, Default)]
struct BiquadState {
    x1: StereoSample,
    x2: StereoSample,
    y1: StereoSample,
    y2: StereoSample,
}

impl BiquadState {
    #[inline]
    fn process(&mut self, input: StereoSample, c: &BiquadCoeffs) -> StereoSample {
        let out = StereoSample::new(
            c.b0 * input.left + c.b1 * self.x1.left + c.b2 * self.x2.left
                - c.a1 * self.y1.left
                - c.a2 * self.y2.left,
            c.b0 * input.right + c.b1 * self.x1.right + c.b2 * self.x2.right
                - c.a1 * self.y1.right
                - c.a2 * self.y2.right,
        );
        self.x2 = self.x1;
        self.x1 = input;
        self.y2 = self.y1;
        self.y1 = out;
        out
    }
}

#[derive(Debug, Clone, Copy)]
enum BandKind {
    LowShelf,
    Peaking,
    HighShelf,
}

/// One EQ band: smoothed gain, cached coefficients, filter memory
#[derive(Debug, Clone)]
struct EqBandFilter {
    kind: BandKind,
    freq: f32,
    gain_db: SmoothedParam,
    coeffs: BiquadCoeffs,
    coeffs_db: f32,
    state: BiquadState,
}

impl EqBandFilter {
    fn new(kind: BandKind, freq: f32, time_constant: f32, sample_rate: u32) -> Self {
        Self {
            kind,
            freq,
            gain_db: SmoothedParam::new(0.0, time_constant, sample_rate),
            coeffs: BiquadCoeffs::passthrough(),
            coeffs_db: 0.0,
            state: BiquadState::default(),
        }
    }

    /// Advance the smoothed gain by one block and refresh coefficients
    fn update(&mut self, block_len: usize, sample_rate: f32) {
        let db = self.gain_db.advance(block_len);
        if db == self.coeffs_db {
            return;
        }
        self.coeffs = if db.abs() < FLAT_DB {
            BiquadCoeffs::passthrough()
        } else {
            match self.kind {
                BandKind::LowShelf => BiquadCoeffs::low_shelf(self.freq, db, sample_rate),
                BandKind::Peaking => BiquadCoeffs::peaking(self.freq, db, EQ_MID_Q, sample_rate),
                BandKind::HighShelf => BiquadCoeffs::high_shelf(self.freq, db, sample_rate),
            }
        };
        self.coeffs_db = db;
    }
}

/// Low shelf → peaking mid → high shelf
#[derive(Debug, Clone)]
pub struct ThreeBandEq {
    low: EqBandFilter,
    mid: EqBandFilter,
    high: EqBandFilter,
    sample_rate: u32,
}

impl ThreeBandEq {
    pub fn new(time_constant: f32, sample_rate: u32) -> Self {
        Self {
            low: EqBandFilter::new(BandKind::LowShelf, EQ_LOW_FREQ, time_constant, sample_rate),
            mid: EqBandFilter::new(BandKind::Peaking, EQ_MID_FREQ, time_constant, sample_rate),
            high: EqBandFilter::new(BandKind::HighShelf, EQ_HIGH_FREQ, time_constant, sample_rate),
            sample_rate,
        }
    }

    /// Set knob positions (0-1); gains glide towards the new values
    pub fn set_knobs(&mut self, low: f32, mid: f32, high: f32) {
        self.low.gain_db.set_target(eq_to_db(low.clamp(0.0, 1.0)));
        self.mid.gain_db.set_target(eq_to_db(mid.clamp(0.0, 1.0)));
        self.high.gain_db.set_target(eq_to_db(high.clamp(0.0, 1.0)));
    }

    /// Target gains in dB (low, mid, high)
    pub fn target_db(&self) -> (f32, f32, f32) {
        (
            self.low.gain_db.target(),
            self.mid.gain_db.target(),
            self.high.gain_db.target(),
        )
    }

    /// Current smoothed gains in dB (low, mid, high)
    pub fn current_db(&self) -> (f32, f32, f32) {
        (
            self.low.gain_db.current(),
            self.mid.gain_db.current(),
            self.high.gain_db.current(),
        )
    }

    /// Filter a block in place
    pub fn process(&mut self, block: &mut [StereoSample]) {
        let sr = self.sample_rate as f32;
        self.low.update(block.len(), sr);
        self.mid.update(block.len(), sr);
        self.high.update(block.len(), sr);

        for sample in block.iter_mut() {
            let mut s = *sample;
            s = self.low.state.process(s, &self.low.coeffs);
            s = self.mid.state.process(s, &self.mid.coeffs);
            s = self.high.state.process(s, &self.high.coeffs);
            *sample = s;
        }
    }

    /// Clear filter memory
    pub fn reset(&mut self) {
        self.low.state = BiquadState::default();
        self.mid.state = BiquadState::default();
        self.high.state = BiquadState::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SR: u32 = 48000;

    fn sine_block(freq: f32, len: usize) -> Vec<StereoSample> {
        (0..len)
            .map(|i| {
                let v = (2.0 * std::f32::consts::PI * freq * i as f32 / SR as f32).sin();
                StereoSample::mono(v)
            })
            .collect()
    }

    fn rms(block: &[StereoSample]) -> f32 {
        let sum: f32 = block.iter().map(|s| s.left * s.left).sum();
        (sum / block.len() as f32).sqrt()
    }

    #[test]
    fn test_eq_mapping_fixed_points() {
        assert_eq!(eq_to_db(0.0), -20.0);
        assert_eq!(eq_to_db(0.5), 0.0);
        assert_eq!(eq_to_db(1.0), 20.0);
    }

    #[test]
    fn test_eq_mapping_is_affine_and_increasing() {
        let mut prev = eq_to_db(0.0);
        for i in 1..=100 {
            let v = i as f32 / 100.0;
            let db = eq_to_db(v);
            assert!(db > prev);
            assert!((db - (-20.0 + 40.0 * v)).abs() < 1e-4);
            prev = db;
        }
    }

    #[test]
    fn test_flat_eq_is_transparent() {
        let mut eq = ThreeBandEq::new(0.1, SR);
        let input = sine_block(440.0, 1024);
        let mut block = input.clone();
        eq.process(&mut block);
        for (a, b) in input.iter().zip(block.iter()) {
            assert!((a.left - b.left).abs() < 1e-6);
        }
    }

    #[test]
    fn test_low_cut_attenuates_bass() {
        let mut eq = ThreeBandEq::new(0.0, SR);
        eq.set_knobs(0.0, 0.5, 0.5);

        let mut block = sine_block(60.0, SR as usize / 2);
        eq.process(&mut block);

        // Skip the filter's settling time
        let level = rms(&block[SR as usize / 4..]);
        let reference = std::f32::consts::FRAC_1_SQRT_2;
        assert!(level < reference * 0.2, "bass should be cut, rms {}", level);
    }

    #[test]
    fn test_high_boost_raises_treble() {
        let mut eq = ThreeBandEq::new(0.0, SR);
        eq.set_knobs(0.5, 0.5, 1.0);

        let mut block = sine_block(12000.0, SR as usize / 4);
        eq.process(&mut block);

        let level = rms(&block[SR as usize / 8..]);
        let reference = std::f32::consts::FRAC_1_SQRT_2;
        assert!(level > reference * 5.0, "treble should be boosted, rms {}", level);
    }

    #[test]
    fn test_gain_glides() {
        let mut eq = ThreeBandEq::new(0.1, SR);
        eq.set_knobs(1.0, 0.5, 0.0);
        assert_eq!(eq.target_db(), (20.0, 0.0, -20.0));

        let mut block = vec![StereoSample::silence(); 256];
        eq.process(&mut block);
        let (low, _, high) = eq.current_db();
        assert!(low > 0.0 && low < 20.0);
        assert!(high < 0.0 && high > -20.0);
    }
}
