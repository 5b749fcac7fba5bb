/// Reverb unit
///
/// Schroeder topology: four parallel feedback combs with damping, then two
/// allpass diffusers, per channel. Space presets scale the comb delays and
/// feedback.
use super::unit::{EffectProcessor, UnitStateMachine};
use serde::{Deserialize, Serialize};

/// Base comb delays at 44.1kHz, mutually prime.
const COMB_DELAYS: [usize; 4] = [1116, 1188, 1277, 1356];
const ALLPASS_DELAYS: [usize; 2] = [556, 441];
const ALLPASS_GAIN: f32 = 0.5;

/// Right channel reads slightly longer lines for stereo spread.
const STEREO_SPREAD: usize = 23;

/// Simulated space, selecting delay scale, feedback, and damping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReverbSpace {
    SmallRoom,
    MediumRoom,
    LargeRoom,
    MediumHall,
    LargeHall,
    Plate,
    Cathedral,
}

impl ReverbSpace {
    /// (delay scale, comb feedback, damping cutoff fraction of Nyquist)
    fn parameters(self) -> (f32, f32, f32) {
        match self {
            Self::SmallRoom => (0.7, 0.74, 0.35),
            Self::MediumRoom => (1.0, 0.79, 0.30),
            Self::LargeRoom => (1.3, 0.83, 0.28),
            Self::MediumHall => (1.6, 0.86, 0.25),
            Self::LargeHall => (2.0, 0.89, 0.22),
            Self::Plate => (0.9, 0.85, 0.50),
            Self::Cathedral => (2.6, 0.92, 0.18),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReverbPreset {
    pub space: ReverbSpace,
    /// Wet mix, 0 to 100 percent
    pub amount: f32,
}

struct Comb {
    buffer: Vec<f32>,
    pos: usize,
    feedback: f32,
    damp_state: f32,
    damp: f32,
}

impl Comb {
    fn new(delay: usize, feedback: f32, damp: f32) -> Self {
        Self {
            buffer: vec![0.0; delay.max(1)],
            pos: 0,
            feedback,
            damp_state: 0.0,
            damp,
        }
    }

    #[inline]
    fn process_sample(&mut self, x: f32) -> f32 {
        let out = self.buffer[self.pos];
        self.damp_state = out * (1.0 - self.damp) + self.damp_state * self.damp;
        self.buffer[self.pos] = x + self.damp_state * self.feedback;
        self.pos = (self.pos + 1) % self.buffer.len();
        out
    }

    fn reset(&mut self) {
        self.buffer.fill(0.0);
        self.damp_state = 0.0;
        self.pos = 0;
    }
}

struct Allpass {
    buffer: Vec<f32>,
    pos: usize,
}

impl Allpass {
    fn new(delay: usize) -> Self {
        Self {
            buffer: vec![0.0; delay.max(1)],
            pos: 0,
        }
    }

    #[inline]
    fn process_sample(&mut self, x: f32) -> f32 {
        let delayed = self.buffer[self.pos];
        let out = delayed - x;
        self.buffer[self.pos] = x + delayed * ALLPASS_GAIN;
        self.pos = (self.pos + 1) % self.buffer.len();
        out
    }

    fn reset(&mut self) {
        self.buffer.fill(0.0);
        self.pos = 0;
    }
}

struct ChannelReverb {
    combs: Vec<Comb>,
    allpasses: Vec<Allpass>,
}

impl ChannelReverb {
    fn new(space: ReverbSpace, sample_rate: f32, spread: usize) -> Self {
        let (scale, feedback, damp_fraction) = space.parameters();
        let rate_scale = sample_rate / 44100.0;
        let damp = 1.0 - damp_fraction;

        let combs = COMB_DELAYS
            .iter()
            .map(|d| {
                let delay = ((*d as f32 * scale * rate_scale) as usize) + spread;
                Comb::new(delay, feedback, damp)
            })
            .collect();
        let allpasses = ALLPASS_DELAYS
            .iter()
            .map(|d| Allpass::new(((*d as f32 * rate_scale) as usize) + spread))
            .collect();

        Self { combs, allpasses }
    }

    #[inline]
    fn process_sample(&mut self, x: f32) -> f32 {
        let mut wet = 0.0;
        for comb in &mut self.combs {
            wet += comb.process_sample(x);
        }
        wet *= 0.25;
        for allpass in &mut self.allpasses {
            wet = allpass.process_sample(wet);
        }
        wet
    }

    fn reset(&mut self) {
        for comb in &mut self.combs {
            comb.reset();
        }
        for allpass in &mut self.allpasses {
            allpass.reset();
        }
    }
}

pub struct ReverbUnit {
    pub state: UnitStateMachine,
    space: ReverbSpace,
    amount: f32,
    channels: Vec<ChannelReverb>,
    configured_rate: f32,
    presets: Vec<(String, ReverbPreset)>,
}

impl ReverbUnit {
    pub fn new() -> Self {
        Self {
            state: UnitStateMachine::bypassed(),
            space: ReverbSpace::MediumHall,
            amount: 50.0,
            channels: Vec::new(),
            configured_rate: 0.0,
            presets: Vec::new(),
        }
    }

    pub fn space(&self) -> ReverbSpace {
        self.space
    }

    pub fn set_space(&mut self, space: ReverbSpace) {
        if self.space != space {
            self.space = space;
            // Comb lengths depend on the space. Rebuild here, in the
            // control domain, when the channel layout is already known.
            if !self.channels.is_empty() {
                let channel_count = self.channels.len();
                let rate = self.configured_rate;
                self.rebuild(channel_count, rate);
            }
        }
    }

    pub fn amount(&self) -> f32 {
        self.amount
    }

    pub fn set_amount(&mut self, amount: f32) {
        self.amount = amount.clamp(0.0, 100.0);
    }

    pub fn snapshot(&self) -> ReverbPreset {
        ReverbPreset {
            space: self.space,
            amount: self.amount,
        }
    }

    pub fn apply(&mut self, preset: &ReverbPreset) {
        self.set_space(preset.space);
        self.set_amount(preset.amount);
    }

    pub fn save_preset(&mut self, name: &str) {
        let snapshot = self.snapshot();
        if let Some(slot) = self.presets.iter_mut().find(|(n, _)| n == name) {
            slot.1 = snapshot;
        } else {
            self.presets.push((name.to_string(), snapshot));
        }
    }

    pub fn apply_preset(&mut self, name: &str) -> bool {
        if let Some((_, preset)) = self.presets.iter().find(|(n, _)| n == name) {
            let preset = preset.clone();
            self.apply(&preset);
            true
        } else {
            false
        }
    }

    fn rebuild(&mut self, channel_count: usize, sample_rate: f32) {
        self.channels = (0..channel_count)
            .map(|ch| {
                let spread = if ch % 2 == 1 { STEREO_SPREAD } else { 0 };
                ChannelReverb::new(self.space, sample_rate, spread)
            })
            .collect();
        self.configured_rate = sample_rate;
    }
}

impl EffectProcessor for ReverbUnit {
    fn prepare(&mut self, channel_count: usize, sample_rate: u32) {
        let rate = sample_rate as f32;
        if self.channels.len() != channel_count || (rate - self.configured_rate).abs() > 1.0 {
            self.rebuild(channel_count, rate);
        }
    }

    fn process(&mut self, planes: &mut [Vec<f32>], sample_rate: u32) {
        let rate = sample_rate as f32;
        // Fallback only; `prepare` builds the combs before the stream runs.
        if self.channels.len() != planes.len() || (rate - self.configured_rate).abs() > 1.0 {
            self.rebuild(planes.len(), rate);
        }

        let wet_gain = self.amount / 100.0;
        let dry_gain = 1.0 - wet_gain;

        for (plane, reverb) in planes.iter_mut().zip(&mut self.channels) {
            for sample in plane.iter_mut() {
                let dry = *sample;
                let wet = reverb.process_sample(dry);
                *sample = dry * dry_gain + wet * wet_gain;
            }
        }
    }

    fn reset(&mut self) {
        for channel in &mut self.channels {
            channel.reset();
        }
    }
}

impl Default for ReverbUnit {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prepare_builds_combs_and_space_changes_keep_them_built() {
        let mut unit = ReverbUnit::new();
        unit.prepare(2, 44100);
        assert_eq!(unit.channels.len(), 2);

        unit.set_space(ReverbSpace::Cathedral);
        assert_eq!(unit.channels.len(), 2);
    }

    #[test]
    fn zero_amount_is_dry_passthrough() {
        let mut unit = ReverbUnit::new();
        unit.set_amount(0.0);

        let mut planes = vec![vec![0.25f32; 512]; 2];
        unit.process(&mut planes, 44100);
        assert!(planes[0].iter().all(|s| (*s - 0.25).abs() < 1e-6));
    }

    #[test]
    fn impulse_produces_a_tail() {
        let mut unit = ReverbUnit::new();
        unit.set_amount(100.0);
        unit.set_space(ReverbSpace::LargeHall);

        let mut planes = vec![vec![0.0f32; 44100]; 2];
        planes[0][0] = 1.0;
        planes[1][0] = 1.0;
        unit.process(&mut planes, 44100);

        // Energy well after the impulse means reflections are present.
        let tail: f32 = planes[0][8000..16000].iter().map(|s| s.abs()).sum();
        assert!(tail > 0.01);
    }

    #[test]
    fn amount_is_clamped() {
        let mut unit = ReverbUnit::new();
        unit.set_amount(250.0);
        assert_eq!(unit.amount(), 100.0);
    }
}
