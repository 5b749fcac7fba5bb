/// Per-unit state machine and the processing trait
use super::state::UnitState;

/// Trait for effect processors in the graph chain.
///
/// # Real-time constraints
/// `process` runs on the render path: no allocation, no blocking, no locks.
/// Buffers are canonical-format planes (one `Vec<f32>` per channel, equal
/// lengths), processed in place.
pub trait EffectProcessor: Send {
    fn process(&mut self, planes: &mut [Vec<f32>], sample_rate: u32);

    /// Build channel-count and sample-rate dependent state ahead of the
    /// first `process` call. Runs in the control domain, where allocation
    /// is fine. Units without such state ignore it.
    fn prepare(&mut self, _channel_count: usize, _sample_rate: u32) {}

    /// Drop accumulated filter/delay state (seek, track change).
    fn reset(&mut self);
}

/// The activation state machine shared by every effect unit.
#[derive(Debug, Clone, Copy)]
pub struct UnitStateMachine {
    state: UnitState,
}

impl UnitStateMachine {
    pub fn new(state: UnitState) -> Self {
        Self { state }
    }

    pub fn bypassed() -> Self {
        Self::new(UnitState::Bypassed)
    }

    pub fn state(&self) -> UnitState {
        self.state
    }

    /// Whether this unit should process audio right now.
    pub fn is_active(&self) -> bool {
        self.state == UnitState::Active
    }

    /// Flip between `Bypassed` and `Active`. A `Suppressed` unit toggles
    /// to `Active`; `Suppressed` is never a toggle result.
    pub fn toggle(&mut self) -> UnitState {
        self.state = if self.state == UnitState::Active {
            UnitState::Bypassed
        } else {
            UnitState::Active
        };
        self.state
    }

    /// Master went off: an `Active` unit becomes `Suppressed` so the UI
    /// can tell "off because parent is off" from "off by choice".
    pub fn suppress(&mut self) {
        if self.state == UnitState::Active {
            self.state = UnitState::Suppressed;
        }
    }

    /// Master came back on: a `Suppressed` unit resumes `Active`.
    pub fn unsuppress(&mut self) {
        if self.state == UnitState::Suppressed {
            self.state = UnitState::Active;
        }
    }

    pub(crate) fn set_state(&mut self, state: UnitState) {
        self.state = state;
    }
}

impl Default for UnitStateMachine {
    fn default() -> Self {
        Self::bypassed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toggle_flips_bypassed_and_active() {
        let mut sm = UnitStateMachine::bypassed();
        assert_eq!(sm.toggle(), UnitState::Active);
        assert_eq!(sm.toggle(), UnitState::Bypassed);
    }

    #[test]
    fn toggle_never_yields_suppressed() {
        let mut sm = UnitStateMachine::new(UnitState::Suppressed);
        assert_eq!(sm.toggle(), UnitState::Active);
    }

    #[test]
    fn suppression_round_trip() {
        let mut sm = UnitStateMachine::new(UnitState::Active);
        sm.suppress();
        assert_eq!(sm.state(), UnitState::Suppressed);
        sm.unsuppress();
        assert_eq!(sm.state(), UnitState::Active);
    }

    #[test]
    fn bypassed_units_ignore_suppression() {
        let mut sm = UnitStateMachine::bypassed();
        sm.suppress();
        assert_eq!(sm.state(), UnitState::Bypassed);
        sm.unsuppress();
        assert_eq!(sm.state(), UnitState::Bypassed);
    }
}
