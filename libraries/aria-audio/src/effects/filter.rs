/// Multi-band filter unit
///
/// Each band removes or passes a frequency range, realized with biquad
/// sections per channel. Bands are user-defined and processed in series.
use super::dsp::Biquad;
use super::unit::{EffectProcessor, UnitStateMachine};
use serde::{Deserialize, Serialize};

const BUTTERWORTH_Q: f32 = 0.707;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BandType {
    /// Pass only [min, max]
    BandPass,
    /// Remove [min, max]
    BandStop,
    /// Pass below max
    LowPass,
    /// Pass above min
    HighPass,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FilterBand {
    pub band_type: BandType,
    /// Lower bound in Hz (unused for LowPass)
    pub min_freq: f32,
    /// Upper bound in Hz (unused for HighPass)
    pub max_freq: f32,
}

impl FilterBand {
    pub fn band_pass(min_freq: f32, max_freq: f32) -> Self {
        Self {
            band_type: BandType::BandPass,
            min_freq,
            max_freq,
        }
    }

    pub fn band_stop(min_freq: f32, max_freq: f32) -> Self {
        Self {
            band_type: BandType::BandStop,
            min_freq,
            max_freq,
        }
    }

    pub fn low_pass(max_freq: f32) -> Self {
        Self {
            band_type: BandType::LowPass,
            min_freq: 0.0,
            max_freq,
        }
    }

    pub fn high_pass(min_freq: f32) -> Self {
        Self {
            band_type: BandType::HighPass,
            min_freq,
            max_freq: 0.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterPreset {
    pub bands: Vec<FilterBand>,
}

/// Up to two biquad sections realize one band on one channel.
struct BandSections {
    first: Biquad,
    second: Option<Biquad>,
}

pub struct FilterUnit {
    pub state: UnitStateMachine,
    bands: Vec<FilterBand>,
    /// Outer: channel; inner: one entry per band.
    sections: Vec<Vec<BandSections>>,
    configured_rate: f32,
    presets: Vec<(String, FilterPreset)>,
}

impl FilterUnit {
    pub fn new() -> Self {
        Self {
            state: UnitStateMachine::bypassed(),
            bands: Vec::new(),
            sections: Vec::new(),
            configured_rate: 0.0,
            presets: Vec::new(),
        }
    }

    pub fn bands(&self) -> &[FilterBand] {
        &self.bands
    }

    /// Append a band, returning its index.
    pub fn add_band(&mut self, band: FilterBand) -> usize {
        self.bands.push(band);
        self.refresh_sections();
        self.bands.len() - 1
    }

    pub fn update_band(&mut self, index: usize, band: FilterBand) {
        if index < self.bands.len() {
            self.bands[index] = band;
            self.refresh_sections();
        }
    }

    /// Remove bands at the given indices. Processed in descending order
    /// so earlier removals do not shift later indices.
    pub fn remove_bands(&mut self, indices: &[usize]) {
        let mut sorted: Vec<usize> = indices.to_vec();
        sorted.sort_unstable_by(|a, b| b.cmp(a));
        sorted.dedup();
        for index in sorted {
            if index < self.bands.len() {
                self.bands.remove(index);
            }
        }
        self.refresh_sections();
    }

    pub fn snapshot(&self) -> FilterPreset {
        FilterPreset {
            bands: self.bands.clone(),
        }
    }

    pub fn apply(&mut self, preset: &FilterPreset) {
        self.bands = preset.bands.clone();
        self.refresh_sections();
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

    fn build_sections(band: &FilterBand, rate: f32) -> BandSections {
        let mut first = Biquad::new();
        let mut second = None;

        match band.band_type {
            BandType::LowPass => {
                first.set_low_pass(rate, band.max_freq, BUTTERWORTH_Q);
            }
            BandType::HighPass => {
                first.set_high_pass(rate, band.min_freq, BUTTERWORTH_Q);
            }
            BandType::BandPass => {
                first.set_high_pass(rate, band.min_freq, BUTTERWORTH_Q);
                let mut lp = Biquad::new();
                lp.set_low_pass(rate, band.max_freq, BUTTERWORTH_Q);
                second = Some(lp);
            }
            BandType::BandStop => {
                // Notch centered geometrically in the stop range; Q from
                // its width.
                let center = (band.min_freq.max(1.0) * band.max_freq.max(1.0)).sqrt();
                let width = (band.max_freq - band.min_freq).max(1.0);
                first.set_notch(rate, center, (center / width).clamp(0.1, 30.0));
            }
        }

        first.reset_state();
        if let Some(s) = &mut second {
            s.reset_state();
        }
        BandSections { first, second }
    }

    /// Rebuild the biquad sections for the current bands, keeping the
    /// already-configured channel count and rate. Band edits happen in
    /// the control domain, so the render path never has to.
    fn refresh_sections(&mut self) {
        if self.sections.is_empty() {
            return;
        }
        let channel_count = self.sections.len();
        let rate = self.configured_rate;
        self.rebuild(channel_count, rate);
    }

    fn rebuild(&mut self, channel_count: usize, rate: f32) {
        self.sections = (0..channel_count)
            .map(|_| {
                self.bands
                    .iter()
                    .map(|band| Self::build_sections(band, rate))
                    .collect()
            })
            .collect();
        self.configured_rate = rate;
    }
}

impl EffectProcessor for FilterUnit {
    fn prepare(&mut self, channel_count: usize, sample_rate: u32) {
        let rate = sample_rate as f32;
        if self.sections.len() != channel_count
            || self.sections.first().map_or(true, |c| c.len() != self.bands.len())
            || (rate - self.configured_rate).abs() > 1.0
        {
            self.rebuild(channel_count, rate);
        }
    }

    fn process(&mut self, planes: &mut [Vec<f32>], sample_rate: u32) {
        if self.bands.is_empty() {
            return;
        }
        let rate = sample_rate as f32;
        // Fallback only; `prepare` builds the sections before the stream runs.
        if self.sections.len() != planes.len()
            || self.sections.first().map_or(true, |c| c.len() != self.bands.len())
            || (rate - self.configured_rate).abs() > 1.0
        {
            self.rebuild(planes.len(), rate);
        }

        for (plane, channel) in planes.iter_mut().zip(&mut self.sections) {
            for sample in plane.iter_mut() {
                let mut s = *sample;
                for band in channel.iter_mut() {
                    s = band.first.process_sample(s);
                    if let Some(second) = &mut band.second {
                        s = second.process_sample(s);
                    }
                }
                *sample = s;
            }
        }
    }

    fn reset(&mut self) {
        for channel in &mut self.sections {
            for band in channel {
                band.first.reset_state();
                if let Some(second) = &mut band.second {
                    second.reset_state();
                }
            }
        }
    }
}

impl Default for FilterUnit {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prepare_builds_sections_for_every_band_and_channel() {
        let mut unit = FilterUnit::new();
        unit.add_band(FilterBand::low_pass(4000.0));
        unit.prepare(2, 48000);
        assert_eq!(unit.sections.len(), 2);
        assert_eq!(unit.sections[0].len(), 1);
    }

    #[test]
    fn band_edits_rebuild_sections_in_the_control_domain() {
        let mut unit = FilterUnit::new();
        unit.add_band(FilterBand::low_pass(4000.0));
        unit.prepare(2, 48000);

        unit.add_band(FilterBand::high_pass(100.0));
        assert_eq!(unit.sections[0].len(), 2);

        unit.remove_bands(&[0]);
        assert_eq!(unit.sections[0].len(), 1);
    }

    fn tone(freq: f32, frames: usize) -> Vec<f32> {
        (0..frames)
            .map(|i| (std::f32::consts::TAU * freq * i as f32 / 44100.0).sin())
            .collect()
    }

    fn energy(samples: &[f32]) -> f64 {
        samples.iter().map(|s| f64::from(s * s)).sum()
    }

    #[test]
    fn low_pass_band_removes_highs() {
        let mut unit = FilterUnit::new();
        unit.add_band(FilterBand::low_pass(500.0));

        let mut planes = vec![tone(8000.0, 44100)];
        let before = energy(&planes[0][4410..]);
        unit.process(&mut planes, 44100);
        let after = energy(&planes[0][4410..]);
        assert!(after < before * 0.05);
    }

    #[test]
    fn band_removal_descending_keeps_indices_valid() {
        let mut unit = FilterUnit::new();
        unit.add_band(FilterBand::low_pass(100.0));
        unit.add_band(FilterBand::high_pass(200.0));
        unit.add_band(FilterBand::band_stop(300.0, 400.0));

        unit.remove_bands(&[0, 2]);
        assert_eq!(unit.bands().len(), 1);
        assert_eq!(unit.bands()[0].band_type, BandType::HighPass);
    }

    #[test]
    fn no_bands_is_passthrough() {
        let mut unit = FilterUnit::new();
        let mut planes = vec![vec![0.5f32; 64]];
        unit.process(&mut planes, 44100);
        assert!(planes[0].iter().all(|s| (*s - 0.5).abs() < 1e-6));
    }
}
