/// Delay (echo) unit
///
/// Ring-buffer delay line per channel with a damped feedback path.
use super::dsp::OnePole;
use super::unit::{EffectProcessor, UnitStateMachine};
use serde::{Deserialize, Serialize};

const MAX_DELAY_SECONDS: f32 = 2.0;
const MIN_DELAY_SECONDS: f32 = 0.01;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DelayPreset {
    /// Wet mix, 0 to 100 percent
    pub amount: f32,
    /// Echo time in seconds
    pub time_seconds: f32,
    /// Feedback, 0 to 100 percent
    pub feedback: f32,
    /// Low-pass cutoff applied to the feedback path, in Hz
    pub cutoff_hz: f32,
}

struct DelayLine {
    ring: Vec<f32>,
    pos: usize,
    damper: OnePole,
}

impl DelayLine {
    fn new(capacity: usize) -> Self {
        Self {
            ring: vec![0.0; capacity.max(1)],
            pos: 0,
            damper: OnePole::new(),
        }
    }

    fn reset(&mut self) {
        self.ring.fill(0.0);
        self.pos = 0;
        self.damper.reset_state();
    }
}

pub struct DelayUnit {
    pub state: UnitStateMachine,
    amount: f32,
    time_seconds: f32,
    feedback: f32,
    cutoff_hz: f32,
    lines: Vec<DelayLine>,
    configured_rate: f32,
    presets: Vec<(String, DelayPreset)>,
}

impl DelayUnit {
    pub fn new() -> Self {
        Self {
            state: UnitStateMachine::bypassed(),
            amount: 50.0,
            time_seconds: 0.35,
            feedback: 40.0,
            cutoff_hz: 8000.0,
            lines: Vec::new(),
            configured_rate: 0.0,
            presets: Vec::new(),
        }
    }

    pub fn amount(&self) -> f32 {
        self.amount
    }

    pub fn set_amount(&mut self, amount: f32) {
        self.amount = amount.clamp(0.0, 100.0);
    }

    pub fn time_seconds(&self) -> f32 {
        self.time_seconds
    }

    pub fn set_time_seconds(&mut self, time: f32) {
        self.time_seconds = time.clamp(MIN_DELAY_SECONDS, MAX_DELAY_SECONDS);
    }

    pub fn feedback(&self) -> f32 {
        self.feedback
    }

    pub fn set_feedback(&mut self, feedback: f32) {
        self.feedback = feedback.clamp(0.0, 100.0);
    }

    pub fn cutoff_hz(&self) -> f32 {
        self.cutoff_hz
    }

    pub fn set_cutoff_hz(&mut self, cutoff: f32) {
        self.cutoff_hz = cutoff.clamp(10.0, 20000.0);
        for line in &mut self.lines {
            line.damper.set_cutoff(self.configured_rate, self.cutoff_hz);
        }
    }

    pub fn snapshot(&self) -> DelayPreset {
        DelayPreset {
            amount: self.amount,
            time_seconds: self.time_seconds,
            feedback: self.feedback,
            cutoff_hz: self.cutoff_hz,
        }
    }

    pub fn apply(&mut self, preset: &DelayPreset) {
        self.set_amount(preset.amount);
        self.set_time_seconds(preset.time_seconds);
        self.set_feedback(preset.feedback);
        self.set_cutoff_hz(preset.cutoff_hz);
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
        let capacity = (MAX_DELAY_SECONDS * sample_rate) as usize + 1;
        self.lines = (0..channel_count).map(|_| DelayLine::new(capacity)).collect();
        self.configured_rate = sample_rate;
        for line in &mut self.lines {
            line.damper.set_cutoff(sample_rate, self.cutoff_hz);
        }
    }
}

impl EffectProcessor for DelayUnit {
    fn prepare(&mut self, channel_count: usize, sample_rate: u32) {
        let rate = sample_rate as f32;
        if self.lines.len() != channel_count || (rate - self.configured_rate).abs() > 1.0 {
            self.rebuild(channel_count, rate);
        }
    }

    fn process(&mut self, planes: &mut [Vec<f32>], sample_rate: u32) {
        let rate = sample_rate as f32;
        // Fallback only; `prepare` builds the lines before the stream runs.
        if self.lines.len() != planes.len() || (rate - self.configured_rate).abs() > 1.0 {
            self.rebuild(planes.len(), rate);
        }

        let wet_gain = self.amount / 100.0;
        let feedback = self.feedback / 100.0;
        let delay_samples = ((self.time_seconds * rate) as usize).max(1);

        for (plane, line) in planes.iter_mut().zip(&mut self.lines) {
            let len = line.ring.len();
            for sample in plane.iter_mut() {
                let read_pos = (line.pos + len - delay_samples % len) % len;
                let echo = line.ring[read_pos];

                let damped = line.damper.process_sample(echo);
                line.ring[line.pos] = *sample + damped * feedback;
                line.pos = (line.pos + 1) % len;

                *sample += echo * wet_gain;
            }
        }
    }

    fn reset(&mut self) {
        for line in &mut self.lines {
            line.reset();
        }
    }
}

impl Default for DelayUnit {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn echo_appears_after_the_delay_time() {
        let mut unit = DelayUnit::new();
        unit.set_amount(100.0);
        unit.set_time_seconds(0.1);
        unit.set_feedback(0.0);

        let mut planes = vec![vec![0.0f32; 8820]; 1];
        planes[0][0] = 1.0;
        unit.process(&mut planes, 44100);

        let echo_at = 4410;
        assert!(planes[0][echo_at].abs() > 0.5);
        // Nothing between the impulse and the first echo.
        assert!(planes[0][100..echo_at - 1].iter().all(|s| s.abs() < 1e-6));
    }

    #[test]
    fn prepare_builds_the_delay_lines_ahead_of_processing() {
        let mut unit = DelayUnit::new();
        unit.prepare(2, 44100);
        assert_eq!(unit.lines.len(), 2);

        // Processing at the prepared configuration reuses the lines.
        let capacity = unit.lines[0].ring.len();
        let mut planes = vec![vec![0.0f32; 512]; 2];
        unit.process(&mut planes, 44100);
        assert_eq!(unit.lines[0].ring.len(), capacity);
    }

    #[test]
    fn parameters_are_clamped() {
        let mut unit = DelayUnit::new();
        unit.set_time_seconds(50.0);
        assert_eq!(unit.time_seconds(), MAX_DELAY_SECONDS);
        unit.set_feedback(150.0);
        assert_eq!(unit.feedback(), 100.0);
    }
}
