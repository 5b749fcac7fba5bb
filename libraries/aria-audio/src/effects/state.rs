/// Effect unit activation states
use serde::{Deserialize, Serialize};

/// Activation state of one effect unit.
///
/// `Suppressed` means the unit is individually configured "on" but forcibly
/// inactive because the Master unit is off. It is never entered by a direct
/// toggle, only by Master propagation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnitState {
    Bypassed,
    Active,
    Suppressed,
}

/// Aggregate state across a set of units, by priority: any `Active` wins,
/// then any `Suppressed`, else `Bypassed`.
pub fn aggregate_state<I: IntoIterator<Item = UnitState>>(states: I) -> UnitState {
    let mut saw_suppressed = false;
    for state in states {
        match state {
            UnitState::Active => return UnitState::Active,
            UnitState::Suppressed => saw_suppressed = true,
            UnitState::Bypassed => {}
        }
    }
    if saw_suppressed {
        UnitState::Suppressed
    } else {
        UnitState::Bypassed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use UnitState::*;

    #[test]
    fn any_active_wins() {
        assert_eq!(aggregate_state([Bypassed, Active, Suppressed]), Active);
        assert_eq!(aggregate_state([Suppressed, Active]), Active);
    }

    #[test]
    fn suppressed_beats_bypassed() {
        assert_eq!(aggregate_state([Bypassed, Suppressed, Bypassed]), Suppressed);
    }

    #[test]
    fn all_bypassed() {
        assert_eq!(aggregate_state([Bypassed, Bypassed]), Bypassed);
        assert_eq!(aggregate_state([]), Bypassed);
    }
}
