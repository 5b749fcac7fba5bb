/// Persisted-state value types shared across crates
use serde::{Deserialize, Serialize};

/// Remembered output-device preference, matched by name and unique id at
/// startup. The device may no longer exist; matching is best-effort.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DevicePersistentState {
    pub name: String,
    pub uid: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_state_round_trips_through_json() {
        let state = DevicePersistentState {
            name: "External DAC".into(),
            uid: "dac-0042".into(),
        };
        let json = serde_json::to_string(&state).unwrap();
        let back: DevicePersistentState = serde_json::from_str(&json).unwrap();
        assert_eq!(back, state);
    }
}
