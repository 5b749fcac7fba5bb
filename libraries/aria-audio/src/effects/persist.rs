/// Serializable graph state
///
/// The load/save contract with the outer persistence layer: the graph
/// produces and consumes these opaque-to-the-caller blobs.
use super::delay::DelayPreset;
use super::eq::EqPreset;
use super::filter::FilterPreset;
use super::hosted::ComponentId;
use super::pitch::PitchShiftPreset;
use super::replay_gain::ReplayGainPreset;
use super::reverb::ReverbPreset;
use super::state::UnitState;
use super::time_stretch::TimeStretchPreset;
use serde::{Deserialize, Serialize};

/// Activation state plus parameters for one unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnitPersistentState<P> {
    pub state: UnitState,
    pub params: P,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostedUnitPersistentState {
    pub id: ComponentId,
    pub name: String,
    pub state: UnitState,
}

/// Complete persisted form of the effects graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphPersistentState {
    pub master_state: UnitState,
    pub eq: UnitPersistentState<EqPreset>,
    pub pitch_shift: UnitPersistentState<PitchShiftPreset>,
    pub time_stretch: UnitPersistentState<TimeStretchPreset>,
    pub reverb: UnitPersistentState<ReverbPreset>,
    pub delay: UnitPersistentState<DelayPreset>,
    pub filter: UnitPersistentState<FilterPreset>,
    pub replay_gain: UnitPersistentState<ReplayGainPreset>,
    pub hosted: Vec<HostedUnitPersistentState>,
}
