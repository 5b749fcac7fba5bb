/// Time stretch unit
///
/// Changes playback rate. Unlike the in-place units, a rate change alters
/// buffer length, so this unit runs in the decode domain: the engine passes
/// each scheduled buffer through `stretch` before enqueueing it for the
/// render path. Inside the render chain the unit is a pass-through.
use super::unit::{EffectProcessor, UnitStateMachine};
use aria_core::CanonicalBuffer;
use serde::{Deserialize, Serialize};

const MIN_RATE: f32 = 0.25;
const MAX_RATE: f32 = 4.0;

/// Overlap-add synthesis window.
const OLA_WINDOW: usize = 2048;
const OLA_HOP: usize = OLA_WINDOW / 4;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeStretchPreset {
    pub rate: f32,
    pub shift_pitch: bool,
}

pub struct TimeStretchUnit {
    pub state: UnitStateMachine,
    rate: f32,
    /// When set, the rate change also shifts pitch (plain resampling
    /// instead of overlap-add).
    shift_pitch: bool,
    presets: Vec<(String, TimeStretchPreset)>,
}

impl TimeStretchUnit {
    pub fn new() -> Self {
        Self {
            state: UnitStateMachine::bypassed(),
            rate: 1.0,
            shift_pitch: false,
            presets: Vec::new(),
        }
    }

    pub fn rate(&self) -> f32 {
        self.rate
    }

    pub fn set_rate(&mut self, rate: f32) {
        self.rate = rate.clamp(MIN_RATE, MAX_RATE);
    }

    pub fn shift_pitch(&self) -> bool {
        self.shift_pitch
    }

    pub fn set_shift_pitch(&mut self, shift: bool) {
        self.shift_pitch = shift;
    }

    pub fn snapshot(&self) -> TimeStretchPreset {
        TimeStretchPreset {
            rate: self.rate,
            shift_pitch: self.shift_pitch,
        }
    }

    pub fn apply(&mut self, preset: &TimeStretchPreset) {
        self.set_rate(preset.rate);
        self.set_shift_pitch(preset.shift_pitch);
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

    /// Time-scale a decoded buffer by the current rate. `rate > 1.0`
    /// shortens the buffer (faster playback). A neutral rate or inactive
    /// state returns the input unchanged.
    pub fn stretch(&self, buffer: CanonicalBuffer) -> CanonicalBuffer {
        if !self.state.is_active() || (self.rate - 1.0).abs() < 1e-6 {
            return buffer;
        }
        if self.shift_pitch {
            self.resample(buffer)
        } else {
            self.overlap_add(buffer)
        }
    }

    /// Varispeed: linear-interpolated resample, pitch follows rate.
    fn resample(&self, buffer: CanonicalBuffer) -> CanonicalBuffer {
        let in_len = buffer.frames();
        let out_len = ((in_len as f32 / self.rate) as usize).max(1);

        let planes = buffer
            .planes
            .iter()
            .map(|plane| {
                (0..out_len)
                    .map(|i| {
                        let pos = i as f32 * self.rate;
                        let i0 = (pos as usize).min(in_len.saturating_sub(1));
                        let i1 = (i0 + 1).min(in_len.saturating_sub(1));
                        let frac = pos - i0 as f32;
                        plane[i0] * (1.0 - frac) + plane[i1] * frac
                    })
                    .collect()
            })
            .collect();

        let mut out = CanonicalBuffer::new(planes, buffer.sample_rate);
        out.start_seconds = buffer.start_seconds;
        out
    }

    /// Overlap-add with a Hann window: tempo changes, pitch preserved.
    fn overlap_add(&self, buffer: CanonicalBuffer) -> CanonicalBuffer {
        let in_len = buffer.frames();
        if in_len < OLA_WINDOW {
            return self.resample(buffer);
        }
        let out_len = ((in_len as f32 / self.rate) as usize).max(1);
        let analysis_hop = (OLA_HOP as f32 * self.rate).max(1.0) as usize;

        let window: Vec<f32> = (0..OLA_WINDOW)
            .map(|i| {
                let x = std::f32::consts::TAU * i as f32 / OLA_WINDOW as f32;
                0.5 * (1.0 - x.cos())
            })
            .collect();

        let planes: Vec<Vec<f32>> = buffer
            .planes
            .iter()
            .map(|plane| {
                let mut out = vec![0.0f32; out_len + OLA_WINDOW];
                let mut norm = vec![0.0f32; out_len + OLA_WINDOW];

                let mut out_pos = 0usize;
                let mut in_pos = 0usize;
                while out_pos < out_len && in_pos + OLA_WINDOW <= in_len {
                    for (i, w) in window.iter().enumerate() {
                        out[out_pos + i] += plane[in_pos + i] * w;
                        norm[out_pos + i] += w;
                    }
                    out_pos += OLA_HOP;
                    in_pos += analysis_hop;
                }

                out.truncate(out_len);
                for (sample, n) in out.iter_mut().zip(&norm) {
                    if *n > 1e-3 {
                        *sample /= n;
                    }
                }
                out
            })
            .collect();

        let mut out = CanonicalBuffer::new(planes, buffer.sample_rate);
        out.start_seconds = buffer.start_seconds;
        out
    }
}

impl EffectProcessor for TimeStretchUnit {
    /// Pass-through: the rate is applied in the decode domain via
    /// `stretch`, never on the render thread.
    fn process(&mut self, _planes: &mut [Vec<f32>], _sample_rate: u32) {}

    fn reset(&mut self) {}
}

impl Default for TimeStretchUnit {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tone(frames: usize) -> CanonicalBuffer {
        let plane: Vec<f32> = (0..frames)
            .map(|i| (std::f32::consts::TAU * 220.0 * i as f32 / 44100.0).sin())
            .collect();
        CanonicalBuffer::new(vec![plane.clone(), plane], 44100)
    }

    #[test]
    fn inactive_unit_leaves_buffer_untouched() {
        let mut unit = TimeStretchUnit::new();
        unit.set_rate(2.0);
        let buffer = tone(8192);
        let out = unit.stretch(buffer.clone());
        assert_eq!(out.frames(), buffer.frames());
    }

    #[test]
    fn double_rate_halves_length() {
        let mut unit = TimeStretchUnit::new();
        unit.state.toggle();
        unit.set_rate(2.0);

        let out = unit.stretch(tone(16384));
        let expected = 16384 / 2;
        assert!((out.frames() as i64 - expected as i64).abs() <= OLA_WINDOW as i64);
        assert_eq!(out.channel_count(), 2);
    }

    #[test]
    fn varispeed_half_rate_doubles_length() {
        let mut unit = TimeStretchUnit::new();
        unit.state.toggle();
        unit.set_rate(0.5);
        unit.set_shift_pitch(true);

        let out = unit.stretch(tone(4096));
        assert_eq!(out.frames(), 8192);
    }

    #[test]
    fn rate_is_clamped() {
        let mut unit = TimeStretchUnit::new();
        unit.set_rate(100.0);
        assert_eq!(unit.rate(), MAX_RATE);
        unit.set_rate(0.0);
        assert_eq!(unit.rate(), MIN_RATE);
    }
}
