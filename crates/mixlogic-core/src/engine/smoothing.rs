//! Parameter smoothing
//!
//! Every control written into the render graph goes through a
//! [`SmoothedParam`] so fader moves and knob turns glide instead of
//! stepping. The law is a one-pole exponential approach with a time
//! constant τ:
//!
//! ```text
//! current += (target - current) * (1 - e^(-1 / (τ * fs)))
//! ```
//!
//! After τ seconds about 63% of a step has been applied.

/// Below this distance the value snaps onto the target
const SNAP_EPSILON: f32 = 1e-6;

/// A render-side parameter that approaches its target exponentially
#[derive(Debug, Clone)]
pub struct SmoothedParam {
    current: f32,
    target: f32,
    coeff: f32,
}

impl SmoothedParam {
    /// Create a parameter resting at `initial`
    pub fn new(initial: f32, time_constant: f32, sample_rate: u32) -> Self {
        Self {
            current: initial,
            target: initial,
            coeff: Self::coeff_for(time_constant, sample_rate),
        }
    }

    fn coeff_for(time_constant: f32, sample_rate: u32) -> f32 {
        let samples = time_constant * sample_rate.max(1) as f32;
        if samples <= 0.0 {
            1.0
        } else {
            1.0 - (-1.0 / samples).exp()
        }
    }

    /// Set the value to glide towards
    #[inline]
    pub fn set_target(&mut self, target: f32) {
        if target.is_finite() {
            self.target = target;
        }
    }

    #[inline]
    pub fn target(&self) -> f32 {
        self.target
    }

    #[inline]
    pub fn current(&self) -> f32 {
        self.current
    }

    /// Whether the value is still moving
    #[inline]
    pub fn is_smoothing(&self) -> bool {
        self.current != self.target
    }

    /// Advance one sample and return the new value
    #[inline]
    pub fn next(&mut self) -> f32 {
        if self.current != self.target {
            self.current += (self.target - self.current) * self.coeff;
            if (self.target - self.current).abs() < SNAP_EPSILON {
                self.current = self.target;
            }
        }
        self.current
    }

    /// Advance `n` samples at once and return the new value
    ///
    /// Used for parameters that are only evaluated once per block.
    pub fn advance(&mut self, n: usize) -> f32 {
        if self.current == self.target || n == 0 {
            return self.current;
        }
        let remaining = (1.0 - self.coeff).powi(n as i32);
        self.current = self.target + (self.current - self.target) * remaining;
        if (self.target - self.current).abs() < SNAP_EPSILON {
            self.current = self.target;
        }
        self.current
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SR: u32 = 48000;

    #[test]
    fn test_one_time_constant_reaches_63_percent() {
        let mut param = SmoothedParam::new(0.0, 0.01, SR);
        param.set_target(1.0);

        let steps = (0.01 * SR as f32) as usize;
        let mut value = 0.0;
        for _ in 0..steps {
            value = param.next();
        }
        let expected = 1.0 - (-1.0f32).exp();
        assert!((value - expected).abs() < 0.01, "got {}", value);
    }

    #[test]
    fn test_block_advance_matches_per_sample() {
        let mut a = SmoothedParam::new(-20.0, 0.1, SR);
        let mut b = a.clone();
        a.set_target(20.0);
        b.set_target(20.0);

        for _ in 0..512 {
            a.next();
        }
        b.advance(512);
        assert!((a.current() - b.current()).abs() < 1e-3);
    }

    #[test]
    fn test_eventually_snaps_to_target() {
        let mut param = SmoothedParam::new(1.0, 0.01, SR);
        param.set_target(0.0);
        param.advance(SR as usize);
        assert_eq!(param.current(), 0.0);
        assert!(!param.is_smoothing());
    }

    #[test]
    fn test_non_finite_targets_ignored() {
        let mut param = SmoothedParam::new(0.5, 0.01, SR);
        param.set_target(f32::NAN);
        param.set_target(f32::INFINITY);
        param.advance(64);
        assert_eq!(param.target(), 0.5);
        assert_eq!(param.current(), 0.5);
    }

    #[test]
    fn test_zero_time_constant_is_a_step() {
        let mut param = SmoothedParam::new(0.0, 0.0, SR);
        param.set_target(1.0);
        assert_eq!(param.next(), 1.0);
    }
}
