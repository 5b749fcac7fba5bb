/// The effects graph
///
/// Ordered chain: EQ, pitch shift, time stretch, reverb, delay, filter,
/// replay gain, then the hosted sub-chain. Native units are permanent;
/// hosted units come and go at runtime. The Master unit gates the whole
/// chain through suppression propagation.
use super::hosted::{ComponentId, ComponentRegistry, HostedUnit};
use super::master::MasterPreset;
use super::persist::{GraphPersistentState, HostedUnitPersistentState, UnitPersistentState};
use super::state::{aggregate_state, UnitState};
use super::unit::{EffectProcessor, UnitStateMachine};
use super::{
    DelayUnit, EqUnit, FilterUnit, PitchShiftUnit, ReplayGainUnit, ReverbUnit, TimeStretchUnit,
};

/// Identifies a unit in the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitKind {
    Master,
    Eq,
    PitchShift,
    TimeStretch,
    Reverb,
    Delay,
    Filter,
    ReplayGain,
}

/// Hook bracketing structural chain changes.
///
/// The engine uses this to pause and resume the render path around
/// insertions and removals, so the render thread never observes a chain
/// mid-mutation and never contends on a lock.
pub trait GraphChangeListener: Send {
    fn pre_change(&mut self);
    fn post_change(&mut self);
}

pub struct EffectsGraph {
    master: UnitStateMachine,
    pub eq: EqUnit,
    pub pitch_shift: PitchShiftUnit,
    pub time_stretch: TimeStretchUnit,
    pub reverb: ReverbUnit,
    pub delay: DelayUnit,
    pub filter: FilterUnit,
    pub replay_gain: ReplayGainUnit,
    hosted: Vec<HostedUnit>,
    registry: ComponentRegistry,
    listener: Option<Box<dyn GraphChangeListener>>,
    master_presets: Vec<(String, MasterPreset)>,
    prepared: Option<(usize, u32)>,
}

impl EffectsGraph {
    pub fn new() -> Self {
        Self {
            // Master defaults on so individually activated units are heard.
            master: UnitStateMachine::new(UnitState::Active),
            eq: EqUnit::new(),
            pitch_shift: PitchShiftUnit::new(),
            time_stretch: TimeStretchUnit::new(),
            reverb: ReverbUnit::new(),
            delay: DelayUnit::new(),
            filter: FilterUnit::new(),
            replay_gain: ReplayGainUnit::new(),
            hosted: Vec::new(),
            registry: ComponentRegistry::new(),
            listener: None,
            master_presets: Vec::new(),
            prepared: None,
        }
    }

    /// Build every unit's channel- and rate-dependent state in the
    /// control domain so `process` finds it ready. Units added later
    /// are prepared on insertion with the remembered configuration.
    pub fn prepare(&mut self, channel_count: usize, sample_rate: u32) {
        self.eq.prepare(channel_count, sample_rate);
        self.pitch_shift.prepare(channel_count, sample_rate);
        self.time_stretch.prepare(channel_count, sample_rate);
        self.reverb.prepare(channel_count, sample_rate);
        self.delay.prepare(channel_count, sample_rate);
        self.filter.prepare(channel_count, sample_rate);
        self.replay_gain.prepare(channel_count, sample_rate);
        for unit in &mut self.hosted {
            unit.processor_mut().prepare(channel_count, sample_rate);
        }
        self.prepared = Some((channel_count, sample_rate));
    }

    pub fn set_change_listener(&mut self, listener: Box<dyn GraphChangeListener>) {
        self.listener = Some(listener);
    }

    pub fn registry_mut(&mut self) -> &mut ComponentRegistry {
        &mut self.registry
    }

    pub fn unit_state(&self, kind: UnitKind) -> UnitState {
        match kind {
            UnitKind::Master => self.master.state(),
            UnitKind::Eq => self.eq.state.state(),
            UnitKind::PitchShift => self.pitch_shift.state.state(),
            UnitKind::TimeStretch => self.time_stretch.state.state(),
            UnitKind::Reverb => self.reverb.state.state(),
            UnitKind::Delay => self.delay.state.state(),
            UnitKind::Filter => self.filter.state.state(),
            UnitKind::ReplayGain => self.replay_gain.state.state(),
        }
    }

    /// Toggle a unit. Toggling Master propagates suppression to every
    /// other unit: children configured "on" report `Suppressed` while
    /// Master is off, and resume `Active` when it comes back.
    pub fn toggle_unit(&mut self, kind: UnitKind) -> UnitState {
        if kind == UnitKind::Master {
            let new_state = self.master.toggle();
            match new_state {
                UnitState::Bypassed => self.for_each_unit(UnitStateMachine::suppress),
                UnitState::Active => self.for_each_unit(UnitStateMachine::unsuppress),
                UnitState::Suppressed => {}
            }
            return new_state;
        }

        let master_active = self.master.is_active();
        let sm = match kind {
            UnitKind::Eq => &mut self.eq.state,
            UnitKind::PitchShift => &mut self.pitch_shift.state,
            UnitKind::TimeStretch => &mut self.time_stretch.state,
            UnitKind::Reverb => &mut self.reverb.state,
            UnitKind::Delay => &mut self.delay.state,
            UnitKind::Filter => &mut self.filter.state,
            UnitKind::ReplayGain => &mut self.replay_gain.state,
            UnitKind::Master => unreachable!(),
        };
        let new_state = sm.toggle();
        // The unit was turned on while Master is off; it joins the
        // suppressed set instead.
        if new_state == UnitState::Active && !master_active {
            sm.suppress();
            return sm.state();
        }
        new_state
    }

    fn for_each_unit(&mut self, f: fn(&mut UnitStateMachine)) {
        f(&mut self.eq.state);
        f(&mut self.pitch_shift.state);
        f(&mut self.time_stretch.state);
        f(&mut self.reverb.state);
        f(&mut self.delay.state);
        f(&mut self.filter.state);
        f(&mut self.replay_gain.state);
        for unit in &mut self.hosted {
            f(&mut unit.state);
        }
    }

    /// Aggregate state of the hosted sub-chain.
    pub fn audio_units_state(&self) -> UnitState {
        aggregate_state(self.hosted.iter().map(|u| u.state.state()))
    }

    pub fn hosted_units(&self) -> &[HostedUnit] {
        &self.hosted
    }

    pub fn hosted_unit_mut(&mut self, index: usize) -> Option<&mut HostedUnit> {
        self.hosted.get_mut(index)
    }

    /// Instantiate a registered component and append it to the chain,
    /// returning its index. `None` if the component is unknown.
    pub fn add_audio_unit(
        &mut self,
        component_type: u32,
        component_subtype: u32,
    ) -> Option<usize> {
        let id = ComponentId::new(component_type, component_subtype);
        let mut unit = self.registry.instantiate(id)?;
        if let Some((channel_count, sample_rate)) = self.prepared {
            unit.processor_mut().prepare(channel_count, sample_rate);
        }

        if let Some(listener) = &mut self.listener {
            listener.pre_change();
        }
        self.hosted.push(unit);
        let index = self.hosted.len() - 1;
        if let Some(listener) = &mut self.listener {
            listener.post_change();
        }
        Some(index)
    }

    /// Remove hosted units at the given indices, applied in descending
    /// order so remaining indices stay valid.
    pub fn remove_audio_units(&mut self, indices: &[usize]) {
        let mut sorted: Vec<usize> = indices.to_vec();
        sorted.sort_unstable_by(|a, b| b.cmp(a));
        sorted.dedup();

        if let Some(listener) = &mut self.listener {
            listener.pre_change();
        }
        for index in sorted {
            if index < self.hosted.len() {
                self.hosted.remove(index);
            }
        }
        if let Some(listener) = &mut self.listener {
            listener.post_change();
        }
    }

    /// Run the chain over one buffer, in order, skipping non-active
    /// units.
    pub fn process(&mut self, planes: &mut [Vec<f32>], sample_rate: u32) {
        if self.eq.state.is_active() {
            self.eq.process(planes, sample_rate);
        }
        if self.pitch_shift.state.is_active() {
            self.pitch_shift.process(planes, sample_rate);
        }
        if self.time_stretch.state.is_active() {
            self.time_stretch.process(planes, sample_rate);
        }
        if self.reverb.state.is_active() {
            self.reverb.process(planes, sample_rate);
        }
        if self.delay.state.is_active() {
            self.delay.process(planes, sample_rate);
        }
        if self.filter.state.is_active() {
            self.filter.process(planes, sample_rate);
        }
        if self.replay_gain.state.is_active() {
            self.replay_gain.process(planes, sample_rate);
        }
        for unit in &mut self.hosted {
            if unit.state.is_active() {
                unit.processor_mut().process(planes, sample_rate);
            }
        }
    }

    /// Drop all accumulated DSP state (seek, track change).
    pub fn reset(&mut self) {
        self.eq.reset();
        self.pitch_shift.reset();
        self.time_stretch.reset();
        self.reverb.reset();
        self.delay.reset();
        self.filter.reset();
        self.replay_gain.reset();
        for unit in &mut self.hosted {
            unit.processor_mut().reset();
        }
    }

    pub fn save_master_preset(&mut self, name: &str) {
        let snapshot = MasterPreset {
            eq: self.eq.snapshot(),
            pitch_shift: self.pitch_shift.snapshot(),
            time_stretch: self.time_stretch.snapshot(),
            reverb: self.reverb.snapshot(),
            delay: self.delay.snapshot(),
            filter: self.filter.snapshot(),
            replay_gain: self.replay_gain.snapshot(),
        };
        if let Some(slot) = self.master_presets.iter_mut().find(|(n, _)| n == name) {
            slot.1 = snapshot;
        } else {
            self.master_presets.push((name.to_string(), snapshot));
        }
    }

    pub fn apply_master_preset(&mut self, name: &str) -> bool {
        let Some((_, preset)) = self.master_presets.iter().find(|(n, _)| n == name) else {
            return false;
        };
        let preset = preset.clone();
        self.eq.apply(&preset.eq);
        self.pitch_shift.apply(&preset.pitch_shift);
        self.time_stretch.apply(&preset.time_stretch);
        self.reverb.apply(&preset.reverb);
        self.delay.apply(&preset.delay);
        self.filter.apply(&preset.filter);
        self.replay_gain.apply(&preset.replay_gain);
        true
    }

    /// Produce the opaque persisted-state blob for the outer layer.
    pub fn persistent_state(&self) -> GraphPersistentState {
        GraphPersistentState {
            master_state: self.master.state(),
            eq: UnitPersistentState {
                state: self.eq.state.state(),
                params: self.eq.snapshot(),
            },
            pitch_shift: UnitPersistentState {
                state: self.pitch_shift.state.state(),
                params: self.pitch_shift.snapshot(),
            },
            time_stretch: UnitPersistentState {
                state: self.time_stretch.state.state(),
                params: self.time_stretch.snapshot(),
            },
            reverb: UnitPersistentState {
                state: self.reverb.state.state(),
                params: self.reverb.snapshot(),
            },
            delay: UnitPersistentState {
                state: self.delay.state.state(),
                params: self.delay.snapshot(),
            },
            filter: UnitPersistentState {
                state: self.filter.state.state(),
                params: self.filter.snapshot(),
            },
            replay_gain: UnitPersistentState {
                state: self.replay_gain.state.state(),
                params: self.replay_gain.snapshot(),
            },
            hosted: self
                .hosted
                .iter()
                .map(|u| HostedUnitPersistentState {
                    id: u.id(),
                    name: u.name().to_string(),
                    state: u.state.state(),
                })
                .collect(),
        }
    }

    /// Reconstruct unit parameters and states from a persisted blob.
    /// Hosted units are re-instantiated through the registry; entries
    /// whose component is no longer registered are skipped.
    pub fn restore(&mut self, persisted: &GraphPersistentState) {
        self.master.set_state(persisted.master_state);

        self.eq.apply(&persisted.eq.params);
        self.eq.state.set_state(persisted.eq.state);
        self.pitch_shift.apply(&persisted.pitch_shift.params);
        self.pitch_shift.state.set_state(persisted.pitch_shift.state);
        self.time_stretch.apply(&persisted.time_stretch.params);
        self.time_stretch.state.set_state(persisted.time_stretch.state);
        self.reverb.apply(&persisted.reverb.params);
        self.reverb.state.set_state(persisted.reverb.state);
        self.delay.apply(&persisted.delay.params);
        self.delay.state.set_state(persisted.delay.state);
        self.filter.apply(&persisted.filter.params);
        self.filter.state.set_state(persisted.filter.state);
        self.replay_gain.apply(&persisted.replay_gain.params);
        self.replay_gain.state.set_state(persisted.replay_gain.state);

        if let Some(listener) = &mut self.listener {
            listener.pre_change();
        }
        self.hosted.clear();
        for entry in &persisted.hosted {
            if let Some(mut unit) = self.registry.instantiate(entry.id) {
                unit.state.set_state(entry.state);
                if let Some((channel_count, sample_rate)) = self.prepared {
                    unit.processor_mut().prepare(channel_count, sample_rate);
                }
                self.hosted.push(unit);
            }
        }
        if let Some(listener) = &mut self.listener {
            listener.post_change();
        }
    }
}

impl Default for EffectsGraph {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct Passthrough;

    impl EffectProcessor for Passthrough {
        fn process(&mut self, _planes: &mut [Vec<f32>], _sample_rate: u32) {}
        fn reset(&mut self) {}
    }

    struct PrepareRecorder {
        channels_seen: Arc<AtomicUsize>,
    }

    impl EffectProcessor for PrepareRecorder {
        fn process(&mut self, _planes: &mut [Vec<f32>], _sample_rate: u32) {}

        fn prepare(&mut self, channel_count: usize, _sample_rate: u32) {
            self.channels_seen.store(channel_count, Ordering::SeqCst);
        }

        fn reset(&mut self) {}
    }

    fn graph_with_component() -> EffectsGraph {
        let mut graph = EffectsGraph::new();
        graph
            .registry_mut()
            .register(ComponentId::new(1, 1), "Passthrough", || {
                Box::new(Passthrough)
            });
        graph
    }

    #[test]
    fn units_added_after_prepare_are_prepared_on_insertion() {
        let channels_seen = Arc::new(AtomicUsize::new(0));
        let mut graph = EffectsGraph::new();
        let recorded = Arc::clone(&channels_seen);
        graph
            .registry_mut()
            .register(ComponentId::new(9, 9), "Recorder", move || {
                Box::new(PrepareRecorder {
                    channels_seen: Arc::clone(&recorded),
                })
            });

        graph.prepare(2, 48000);
        graph.add_audio_unit(9, 9);
        assert_eq!(channels_seen.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn master_toggle_suppresses_and_restores_children() {
        let mut graph = EffectsGraph::new();
        graph.toggle_unit(UnitKind::Eq);
        graph.toggle_unit(UnitKind::Reverb);
        assert_eq!(graph.unit_state(UnitKind::Eq), UnitState::Active);

        graph.toggle_unit(UnitKind::Master);
        assert_eq!(graph.unit_state(UnitKind::Master), UnitState::Bypassed);
        assert_eq!(graph.unit_state(UnitKind::Eq), UnitState::Suppressed);
        assert_eq!(graph.unit_state(UnitKind::Reverb), UnitState::Suppressed);
        // Off-by-choice stays bypassed, not suppressed.
        assert_eq!(graph.unit_state(UnitKind::Delay), UnitState::Bypassed);

        graph.toggle_unit(UnitKind::Master);
        assert_eq!(graph.unit_state(UnitKind::Eq), UnitState::Active);
        assert_eq!(graph.unit_state(UnitKind::Delay), UnitState::Bypassed);
    }

    #[test]
    fn activating_a_unit_under_bypassed_master_suppresses_it() {
        let mut graph = EffectsGraph::new();
        graph.toggle_unit(UnitKind::Master);

        let state = graph.toggle_unit(UnitKind::Eq);
        assert_eq!(state, UnitState::Suppressed);
    }

    #[test]
    fn add_remove_hosted_units_preserves_order() {
        let mut graph = graph_with_component();
        assert_eq!(graph.add_audio_unit(1, 1), Some(0));
        assert_eq!(graph.add_audio_unit(1, 1), Some(1));
        assert_eq!(graph.add_audio_unit(1, 1), Some(2));

        if let Some(unit) = graph.hosted_unit_mut(1) {
            unit.state.toggle();
        }
        graph.remove_audio_units(&[0, 2]);

        assert_eq!(graph.hosted_units().len(), 1);
        assert_eq!(graph.hosted_units()[0].state.state(), UnitState::Active);
    }

    #[test]
    fn unknown_component_is_rejected() {
        let mut graph = EffectsGraph::new();
        assert_eq!(graph.add_audio_unit(9, 9), None);
    }

    #[test]
    fn structural_changes_are_bracketed() {
        struct Counter {
            pre: Arc<AtomicUsize>,
            post: Arc<AtomicUsize>,
        }
        impl GraphChangeListener for Counter {
            fn pre_change(&mut self) {
                self.pre.fetch_add(1, Ordering::SeqCst);
            }
            fn post_change(&mut self) {
                self.post.fetch_add(1, Ordering::SeqCst);
            }
        }

        let pre = Arc::new(AtomicUsize::new(0));
        let post = Arc::new(AtomicUsize::new(0));
        let mut graph = graph_with_component();
        graph.set_change_listener(Box::new(Counter {
            pre: Arc::clone(&pre),
            post: Arc::clone(&post),
        }));

        graph.add_audio_unit(1, 1);
        graph.remove_audio_units(&[0]);
        assert_eq!(pre.load(Ordering::SeqCst), 2);
        assert_eq!(post.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn aggregate_hosted_state() {
        let mut graph = graph_with_component();
        graph.add_audio_unit(1, 1);
        graph.add_audio_unit(1, 1);
        assert_eq!(graph.audio_units_state(), UnitState::Bypassed);

        if let Some(unit) = graph.hosted_unit_mut(0) {
            unit.state.toggle();
        }
        assert_eq!(graph.audio_units_state(), UnitState::Active);

        graph.toggle_unit(UnitKind::Master);
        assert_eq!(graph.audio_units_state(), UnitState::Suppressed);
    }

    #[test]
    fn persist_restore_round_trip() {
        let mut graph = graph_with_component();
        graph.toggle_unit(UnitKind::Eq);
        graph.eq.set_band_gain_db(3, 6.0);
        graph.delay.set_time_seconds(0.8);
        graph.add_audio_unit(1, 1);
        if let Some(unit) = graph.hosted_unit_mut(0) {
            unit.state.toggle();
        }

        let persisted = graph.persistent_state();
        let json = serde_json::to_string(&persisted).unwrap();
        let decoded: GraphPersistentState = serde_json::from_str(&json).unwrap();

        let mut restored = graph_with_component();
        restored.restore(&decoded);

        assert_eq!(restored.unit_state(UnitKind::Eq), UnitState::Active);
        assert_eq!(restored.eq.band_gain_db(3), 6.0);
        assert_eq!(restored.delay.time_seconds(), 0.8);
        assert_eq!(restored.hosted_units().len(), 1);
        assert_eq!(restored.hosted_units()[0].state.state(), UnitState::Active);
    }

    #[test]
    fn master_preset_snapshot_and_apply() {
        let mut graph = EffectsGraph::new();
        graph.reverb.set_amount(80.0);
        graph.save_master_preset("wet");
        graph.reverb.set_amount(10.0);

        assert!(graph.apply_master_preset("wet"));
        assert_eq!(graph.reverb.amount(), 80.0);
        assert!(!graph.apply_master_preset("nope"));
    }
}
