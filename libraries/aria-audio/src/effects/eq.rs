/// 10-band graphic equalizer unit
use super::dsp::{db_to_amplitude, Biquad};
use super::unit::{EffectProcessor, UnitStateMachine};
use serde::{Deserialize, Serialize};

pub const EQ_BAND_COUNT: usize = 10;

/// ISO octave center frequencies.
pub const EQ_BAND_FREQUENCIES: [f32; EQ_BAND_COUNT] = [
    31.0, 62.0, 125.0, 250.0, 500.0, 1000.0, 2000.0, 4000.0, 8000.0, 16000.0,
];

/// Q for octave-wide graphic EQ bands.
const BAND_Q: f32 = 1.41;

const MAX_GAIN_DB: f32 = 20.0;

/// Snapshot of the EQ's parameters, also used as a named user preset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EqPreset {
    pub band_gains_db: [f32; EQ_BAND_COUNT],
    pub global_gain_db: f32,
}

/// Graphic equalizer: ten octave bands plus a global gain, stereo.
///
/// Channels beyond the first two pass through untouched.
pub struct EqUnit {
    pub state: UnitStateMachine,
    band_gains_db: [f32; EQ_BAND_COUNT],
    global_gain_db: f32,
    filters: [[Biquad; EQ_BAND_COUNT]; 2],
    configured_rate: f32,
    presets: Vec<(String, EqPreset)>,
}

impl EqUnit {
    pub fn new() -> Self {
        Self {
            state: UnitStateMachine::bypassed(),
            band_gains_db: [0.0; EQ_BAND_COUNT],
            global_gain_db: 0.0,
            filters: Default::default(),
            configured_rate: 0.0,
            presets: Vec::new(),
        }
    }

    pub fn band_gain_db(&self, band: usize) -> f32 {
        self.band_gains_db[band]
    }

    pub fn set_band_gain_db(&mut self, band: usize, gain_db: f32) {
        if band < EQ_BAND_COUNT {
            self.band_gains_db[band] = gain_db.clamp(-MAX_GAIN_DB, MAX_GAIN_DB);
            self.reconfigure();
        }
    }

    pub fn band_gains_db(&self) -> [f32; EQ_BAND_COUNT] {
        self.band_gains_db
    }

    pub fn set_band_gains_db(&mut self, gains: [f32; EQ_BAND_COUNT]) {
        for (slot, gain) in self.band_gains_db.iter_mut().zip(gains) {
            *slot = gain.clamp(-MAX_GAIN_DB, MAX_GAIN_DB);
        }
        self.reconfigure();
    }

    pub fn global_gain_db(&self) -> f32 {
        self.global_gain_db
    }

    pub fn set_global_gain_db(&mut self, gain_db: f32) {
        self.global_gain_db = gain_db.clamp(-MAX_GAIN_DB, MAX_GAIN_DB);
    }

    pub fn snapshot(&self) -> EqPreset {
        EqPreset {
            band_gains_db: self.band_gains_db,
            global_gain_db: self.global_gain_db,
        }
    }

    pub fn apply(&mut self, preset: &EqPreset) {
        self.set_band_gains_db(preset.band_gains_db);
        self.set_global_gain_db(preset.global_gain_db);
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

    pub fn preset_names(&self) -> impl Iterator<Item = &str> {
        self.presets.iter().map(|(n, _)| n.as_str())
    }

    fn reconfigure(&mut self) {
        if self.configured_rate < 1.0 {
            return;
        }
        for channel in &mut self.filters {
            for (band, filter) in channel.iter_mut().enumerate() {
                filter.set_peaking(
                    self.configured_rate,
                    EQ_BAND_FREQUENCIES[band],
                    BAND_Q,
                    self.band_gains_db[band],
                );
            }
        }
    }
}

impl EffectProcessor for EqUnit {
    fn process(&mut self, planes: &mut [Vec<f32>], sample_rate: u32) {
        let rate = sample_rate as f32;
        if (rate - self.configured_rate).abs() > f32::EPSILON {
            self.configured_rate = rate;
            self.reconfigure();
        }

        let global = db_to_amplitude(self.global_gain_db);
        for (ch, plane) in planes.iter_mut().enumerate().take(2) {
            let filters = &mut self.filters[ch];
            for sample in plane.iter_mut() {
                let mut s = *sample;
                for filter in filters.iter_mut() {
                    s = filter.process_sample(s);
                }
                *sample = s * global;
            }
        }
    }

    fn reset(&mut self) {
        for channel in &mut self.filters {
            for filter in channel {
                filter.reset_state();
            }
        }
    }
}

impl Default for EqUnit {
    fn default() -> Self {
        Self::new()
    }
}
