//! Effects processing graph
//!
//! An ordered chain of effect units operating in place on canonical-format
//! planar f32 buffers. Each unit carries a small activation state machine
//! (`bypassed` / `active` / `suppressed`); the Master unit propagates
//! suppression to the native units. Hosted units are third-party processors
//! added and removed at runtime by index.

mod delay;
mod dsp;
mod eq;
mod filter;
mod graph;
mod hosted;
mod master;
mod persist;
mod pitch;
mod profiles;
mod replay_gain;
mod reverb;
mod state;
mod time_stretch;
mod unit;

pub use delay::{DelayPreset, DelayUnit};
pub use eq::{EqPreset, EqUnit, EQ_BAND_COUNT, EQ_BAND_FREQUENCIES};
pub use filter::{BandType, FilterBand, FilterPreset, FilterUnit};
pub use graph::{EffectsGraph, GraphChangeListener, UnitKind};
pub use hosted::{ComponentId, ComponentRegistry, HostedUnit};
pub use master::MasterPreset;
pub use persist::{GraphPersistentState, HostedUnitPersistentState, UnitPersistentState};
pub use pitch::{PitchShiftPreset, PitchShiftUnit};
pub use profiles::{SoundProfile, SoundProfiles};
pub use replay_gain::{ReplayGainMode, ReplayGainPreset, ReplayGainUnit};
pub use reverb::{ReverbPreset, ReverbSpace, ReverbUnit};
pub use state::{aggregate_state, UnitState};
pub use time_stretch::{TimeStretchPreset, TimeStretchUnit};
pub use unit::{EffectProcessor, UnitStateMachine};
