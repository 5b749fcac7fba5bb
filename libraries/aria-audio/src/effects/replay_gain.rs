/// Replay gain unit
///
/// Applies a per-track or per-album loudness correction as a scalar gain.
/// Gain values come from an external scanner/tag reader; this unit only
/// applies them.
use super::dsp::db_to_amplitude;
use super::unit::{EffectProcessor, UnitStateMachine};
use serde::{Deserialize, Serialize};

const MAX_PREAMP_DB: f32 = 12.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReplayGainMode {
    /// Prefer the track gain, falling back to album gain
    PreferTrack,
    /// Prefer the album gain, falling back to track gain
    PreferAlbum,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayGainPreset {
    pub mode: ReplayGainMode,
    pub preamp_db: f32,
    pub prevent_clipping: bool,
}

pub struct ReplayGainUnit {
    pub state: UnitStateMachine,
    mode: ReplayGainMode,
    preamp_db: f32,
    prevent_clipping: bool,
    /// Gain/peak values for the current track, absent until provided.
    track_gain_db: Option<f32>,
    album_gain_db: Option<f32>,
    track_peak: Option<f32>,
    presets: Vec<(String, ReplayGainPreset)>,
}

impl ReplayGainUnit {
    pub fn new() -> Self {
        Self {
            state: UnitStateMachine::bypassed(),
            mode: ReplayGainMode::PreferTrack,
            preamp_db: 0.0,
            prevent_clipping: true,
            track_gain_db: None,
            album_gain_db: None,
            track_peak: None,
            presets: Vec::new(),
        }
    }

    pub fn mode(&self) -> ReplayGainMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: ReplayGainMode) {
        self.mode = mode;
    }

    pub fn preamp_db(&self) -> f32 {
        self.preamp_db
    }

    pub fn set_preamp_db(&mut self, preamp: f32) {
        self.preamp_db = preamp.clamp(-MAX_PREAMP_DB, MAX_PREAMP_DB);
    }

    pub fn prevent_clipping(&self) -> bool {
        self.prevent_clipping
    }

    pub fn set_prevent_clipping(&mut self, prevent: bool) {
        self.prevent_clipping = prevent;
    }

    /// Install the scanned gain values for the current track. Pass `None`
    /// to clear (e.g. on track change before the scan completes).
    pub fn set_track_values(
        &mut self,
        track_gain_db: Option<f32>,
        album_gain_db: Option<f32>,
        track_peak: Option<f32>,
    ) {
        self.track_gain_db = track_gain_db;
        self.album_gain_db = album_gain_db;
        self.track_peak = track_peak;
    }

    /// The gain actually applied, in dB. Zero when no values are known.
    pub fn effective_gain_db(&self) -> f32 {
        let base = match self.mode {
            ReplayGainMode::PreferTrack => self.track_gain_db.or(self.album_gain_db),
            ReplayGainMode::PreferAlbum => self.album_gain_db.or(self.track_gain_db),
        };
        let Some(base) = base else {
            return 0.0;
        };
        let mut gain = base + self.preamp_db;

        // Cap the gain so peak * gain stays at or below full scale.
        if self.prevent_clipping {
            if let Some(peak) = self.track_peak {
                if peak > 0.0 {
                    let headroom_db = -20.0 * peak.log10();
                    gain = gain.min(headroom_db);
                }
            }
        }
        gain
    }

    pub fn snapshot(&self) -> ReplayGainPreset {
        ReplayGainPreset {
            mode: self.mode,
            preamp_db: self.preamp_db,
            prevent_clipping: self.prevent_clipping,
        }
    }

    pub fn apply(&mut self, preset: &ReplayGainPreset) {
        self.set_mode(preset.mode);
        self.set_preamp_db(preset.preamp_db);
        self.set_prevent_clipping(preset.prevent_clipping);
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

impl EffectProcessor for ReplayGainUnit {
    fn process(&mut self, planes: &mut [Vec<f32>], _sample_rate: u32) {
        let gain = db_to_amplitude(self.effective_gain_db());
        if (gain - 1.0).abs() < 1e-6 {
            return;
        }
        for plane in planes.iter_mut() {
            for sample in plane.iter_mut() {
                *sample *= gain;
            }
        }
    }

    fn reset(&mut self) {}
}

impl Default for ReplayGainUnit {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_values_means_unity_gain() {
        let unit = ReplayGainUnit::new();
        assert_eq!(unit.effective_gain_db(), 0.0);
    }

    #[test]
    fn mode_selects_track_or_album_gain() {
        let mut unit = ReplayGainUnit::new();
        unit.set_track_values(Some(-3.0), Some(-6.0), None);

        assert_eq!(unit.effective_gain_db(), -3.0);
        unit.set_mode(ReplayGainMode::PreferAlbum);
        assert_eq!(unit.effective_gain_db(), -6.0);
    }

    #[test]
    fn falls_back_when_preferred_value_is_missing() {
        let mut unit = ReplayGainUnit::new();
        unit.set_track_values(None, Some(-4.5), None);
        assert_eq!(unit.effective_gain_db(), -4.5);
    }

    #[test]
    fn clipping_prevention_caps_positive_gain() {
        let mut unit = ReplayGainUnit::new();
        // Peak 0.5 leaves ~6dB of headroom.
        unit.set_track_values(Some(9.0), None, Some(0.5));
        let gain = unit.effective_gain_db();
        assert!(gain < 6.1);

        unit.set_prevent_clipping(false);
        assert_eq!(unit.effective_gain_db(), 9.0);
    }

    #[test]
    fn process_scales_samples() {
        let mut unit = ReplayGainUnit::new();
        unit.set_track_values(Some(-6.0), None, None);

        let mut planes = vec![vec![0.8f32; 16]];
        unit.process(&mut planes, 44100);
        assert!((planes[0][0] - 0.8 * 0.501).abs() < 0.01);
    }
}
