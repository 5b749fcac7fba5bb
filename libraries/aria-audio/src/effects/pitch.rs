/// Pitch shift unit
///
/// Delay-line pitch shifter: two read taps sweep a short delay window at a
/// rate offset from the write rate, crossfaded with half-period sine
/// windows. Latency is one window; timbre shifts audibly at extreme
/// settings, which matches the unit's ±2 octave range.
use super::unit::{EffectProcessor, UnitStateMachine};
use serde::{Deserialize, Serialize};

/// Pitch range, in cents (±2 octaves).
const MAX_PITCH_CENTS: f32 = 2400.0;

/// Sweep window, in samples.
const WINDOW: usize = 4096;

const RING: usize = WINDOW * 2;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PitchShiftPreset {
    pub pitch_cents: f32,
}

struct ChannelState {
    ring: Vec<f32>,
    write_pos: usize,
    phase: f32,
}

impl ChannelState {
    fn new() -> Self {
        Self {
            ring: vec![0.0; RING],
            write_pos: 0,
            phase: 0.0,
        }
    }

    #[inline]
    fn read_tap(&self, delay: f32) -> f32 {
        let pos = self.write_pos as f32 - 1.0 - delay;
        let pos = pos.rem_euclid(RING as f32);
        let i0 = pos as usize;
        let i1 = (i0 + 1) % RING;
        let frac = pos - i0 as f32;
        self.ring[i0] * (1.0 - frac) + self.ring[i1] * frac
    }

    fn reset(&mut self) {
        self.ring.fill(0.0);
        self.write_pos = 0;
        self.phase = 0.0;
    }
}

pub struct PitchShiftUnit {
    pub state: UnitStateMachine,
    pitch_cents: f32,
    channels: [ChannelState; 2],
    presets: Vec<(String, PitchShiftPreset)>,
}

impl PitchShiftUnit {
    pub fn new() -> Self {
        Self {
            state: UnitStateMachine::bypassed(),
            pitch_cents: 0.0,
            channels: [ChannelState::new(), ChannelState::new()],
            presets: Vec::new(),
        }
    }

    pub fn pitch_cents(&self) -> f32 {
        self.pitch_cents
    }

    pub fn set_pitch_cents(&mut self, cents: f32) {
        self.pitch_cents = cents.clamp(-MAX_PITCH_CENTS, MAX_PITCH_CENTS);
    }

    /// Frequency ratio corresponding to the current pitch setting.
    pub fn ratio(&self) -> f32 {
        2.0f32.powf(self.pitch_cents / 1200.0)
    }

    pub fn snapshot(&self) -> PitchShiftPreset {
        PitchShiftPreset {
            pitch_cents: self.pitch_cents,
        }
    }

    pub fn apply(&mut self, preset: &PitchShiftPreset) {
        self.set_pitch_cents(preset.pitch_cents);
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
}

impl EffectProcessor for PitchShiftUnit {
    fn process(&mut self, planes: &mut [Vec<f32>], _sample_rate: u32) {
        let ratio = self.ratio();
        if (ratio - 1.0).abs() < 1e-6 {
            return;
        }
        // Tap sweep rate: the taps drift away from the write head at
        // (1 - ratio) samples per sample.
        let increment = (1.0 - ratio) / WINDOW as f32;

        for (plane, ch) in planes.iter_mut().zip(&mut self.channels) {
            for sample in plane.iter_mut() {
                ch.ring[ch.write_pos] = *sample;
                ch.write_pos = (ch.write_pos + 1) % RING;

                ch.phase = (ch.phase + increment).rem_euclid(1.0);
                let t1 = ch.phase;
                let t2 = (ch.phase + 0.5).rem_euclid(1.0);

                let g1 = (std::f32::consts::PI * t1).sin();
                let g2 = (std::f32::consts::PI * t2).sin();

                let out = ch.read_tap(t1 * WINDOW as f32) * g1
                    + ch.read_tap(t2 * WINDOW as f32) * g2;
                *sample = out;
            }
        }
    }

    fn reset(&mut self) {
        for ch in &mut self.channels {
            ch.reset();
        }
    }
}

impl Default for PitchShiftUnit {
    fn default() -> Self {
        Self::new()
    }
}
