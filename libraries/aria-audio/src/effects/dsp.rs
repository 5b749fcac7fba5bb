/// Shared DSP building blocks for the effect units
///
/// Single-channel RBJ biquad sections with exponentially smoothed
/// coefficient updates so parameter changes during playback do not click.

/// Per-sample smoothing factor for coefficient interpolation. Roughly a
/// few milliseconds of transition time at 44.1kHz.
const SMOOTH_COEFF: f32 = 0.002;

/// Flush tiny filter outputs to zero; denormals stall the FPU.
const DENORMAL_FLOOR: f32 = 1e-15;

pub(super) fn db_to_amplitude(db: f32) -> f32 {
    10.0f32.powf(db / 20.0)
}

/// One second-order filter section for a single channel.
#[derive(Debug, Clone)]
pub(super) struct Biquad {
    target_b0: f32,
    target_b1: f32,
    target_b2: f32,
    target_a1: f32,
    target_a2: f32,

    b0: f32,
    b1: f32,
    b2: f32,
    a1: f32,
    a2: f32,

    x1: f32,
    x2: f32,
    y1: f32,
    y2: f32,
}

impl Default for Biquad {
    fn default() -> Self {
        Self::new()
    }
}

impl Biquad {
    /// Neutral (identity) section.
    pub fn new() -> Self {
        Self {
            target_b0: 1.0,
            target_b1: 0.0,
            target_b2: 0.0,
            target_a1: 0.0,
            target_a2: 0.0,
            b0: 1.0,
            b1: 0.0,
            b2: 0.0,
            a1: 0.0,
            a2: 0.0,
            x1: 0.0,
            x2: 0.0,
            y1: 0.0,
            y2: 0.0,
        }
    }

    fn set_targets(&mut self, b0: f32, b1: f32, b2: f32, a0: f32, a1: f32, a2: f32) {
        self.target_b0 = b0 / a0;
        self.target_b1 = b1 / a0;
        self.target_b2 = b2 / a0;
        self.target_a1 = a1 / a0;
        self.target_a2 = a2 / a0;
    }

    /// Angular frequency, with the corner clamped below Nyquist to keep
    /// the section stable.
    fn omega(sample_rate: f32, frequency: f32) -> (f32, f32, f32) {
        let clamped = frequency.clamp(1.0, sample_rate * 0.45);
        let omega = 2.0 * std::f32::consts::PI * clamped / sample_rate;
        (omega, omega.sin(), omega.cos())
    }

    pub fn set_peaking(&mut self, sample_rate: f32, frequency: f32, q: f32, gain_db: f32) {
        if sample_rate < 1.0 {
            return;
        }
        let a = 10.0f32.powf(gain_db / 40.0);
        let (_, sin_w, cos_w) = Self::omega(sample_rate, frequency);
        let alpha = sin_w / (2.0 * q);

        self.set_targets(
            1.0 + alpha * a,
            -2.0 * cos_w,
            1.0 - alpha * a,
            1.0 + alpha / a,
            -2.0 * cos_w,
            1.0 - alpha / a,
        );
    }

    pub fn set_low_pass(&mut self, sample_rate: f32, frequency: f32, q: f32) {
        if sample_rate < 1.0 {
            return;
        }
        let (_, sin_w, cos_w) = Self::omega(sample_rate, frequency);
        let alpha = sin_w / (2.0 * q);

        self.set_targets(
            (1.0 - cos_w) / 2.0,
            1.0 - cos_w,
            (1.0 - cos_w) / 2.0,
            1.0 + alpha,
            -2.0 * cos_w,
            1.0 - alpha,
        );
    }

    pub fn set_high_pass(&mut self, sample_rate: f32, frequency: f32, q: f32) {
        if sample_rate < 1.0 {
            return;
        }
        let (_, sin_w, cos_w) = Self::omega(sample_rate, frequency);
        let alpha = sin_w / (2.0 * q);

        self.set_targets(
            (1.0 + cos_w) / 2.0,
            -(1.0 + cos_w),
            (1.0 + cos_w) / 2.0,
            1.0 + alpha,
            -2.0 * cos_w,
            1.0 - alpha,
        );
    }

    pub fn set_notch(&mut self, sample_rate: f32, frequency: f32, q: f32) {
        if sample_rate < 1.0 {
            return;
        }
        let (_, sin_w, cos_w) = Self::omega(sample_rate, frequency);
        let alpha = sin_w / (2.0 * q);

        self.set_targets(
            1.0,
            -2.0 * cos_w,
            1.0,
            1.0 + alpha,
            -2.0 * cos_w,
            1.0 - alpha,
        );
    }

    #[inline]
    fn smooth(&mut self) {
        self.b0 += SMOOTH_COEFF * (self.target_b0 - self.b0);
        self.b1 += SMOOTH_COEFF * (self.target_b1 - self.b1);
        self.b2 += SMOOTH_COEFF * (self.target_b2 - self.b2);
        self.a1 += SMOOTH_COEFF * (self.target_a1 - self.a1);
        self.a2 += SMOOTH_COEFF * (self.target_a2 - self.a2);
    }

    #[inline]
    pub fn process_sample(&mut self, x: f32) -> f32 {
        self.smooth();

        let mut y = self.b0 * x + self.b1 * self.x1 + self.b2 * self.x2
            - self.a1 * self.y1
            - self.a2 * self.y2;
        if y.abs() < DENORMAL_FLOOR {
            y = 0.0;
        }

        self.x2 = self.x1;
        self.x1 = x;
        self.y2 = self.y1;
        self.y1 = y;
        y
    }

    /// Clear filter memory, keeping coefficients.
    pub fn reset_state(&mut self) {
        self.x1 = 0.0;
        self.x2 = 0.0;
        self.y1 = 0.0;
        self.y2 = 0.0;
        // Jump active coefficients to target so stale smoothing does not
        // bleed across a seek.
        self.b0 = self.target_b0;
        self.b1 = self.target_b1;
        self.b2 = self.target_b2;
        self.a1 = self.target_a1;
        self.a2 = self.target_a2;
    }
}

/// Simple one-pole low-pass, used in feedback paths.
#[derive(Debug, Clone, Copy)]
pub(super) struct OnePole {
    coeff: f32,
    state: f32,
}

impl OnePole {
    pub fn new() -> Self {
        Self {
            coeff: 1.0,
            state: 0.0,
        }
    }

    pub fn set_cutoff(&mut self, sample_rate: f32, cutoff: f32) {
        if sample_rate < 1.0 {
            return;
        }
        let clamped = cutoff.clamp(10.0, sample_rate * 0.45);
        self.coeff =
            1.0 - (-2.0 * std::f32::consts::PI * clamped / sample_rate).exp();
    }

    #[inline]
    pub fn process_sample(&mut self, x: f32) -> f32 {
        self.state += self.coeff * (x - self.state);
        if self.state.abs() < DENORMAL_FLOOR {
            self.state = 0.0;
        }
        self.state
    }

    pub fn reset_state(&mut self) {
        self.state = 0.0;
    }
}
