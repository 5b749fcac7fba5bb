/// Master unit presets
///
/// The Master unit itself is a switch over the whole native chain; its
/// on/off propagation lives in the graph. What it owns is the preset
/// capability: a named snapshot of every native unit's settings.
use super::delay::DelayPreset;
use super::eq::EqPreset;
use super::filter::FilterPreset;
use super::pitch::PitchShiftPreset;
use super::replay_gain::ReplayGainPreset;
use super::reverb::ReverbPreset;
use super::time_stretch::TimeStretchPreset;
use serde::{Deserialize, Serialize};

/// Snapshot of all native unit settings, saved and applied as one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MasterPreset {
    pub eq: EqPreset,
    pub pitch_shift: PitchShiftPreset,
    pub time_stretch: TimeStretchPreset,
    pub reverb: ReverbPreset,
    pub delay: DelayPreset,
    pub filter: FilterPreset,
    pub replay_gain: ReplayGainPreset,
}
