/// Per-track sound profiles
///
/// A profile captures the complete sound setup (volume, pan, and the whole
/// graph state) for one file, so it can be restored whenever that file
/// plays again.
use super::persist::GraphPersistentState;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SoundProfile {
    pub volume: f32,
    pub pan: f32,
    pub graph: GraphPersistentState,
}

/// Profiles keyed by track path.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SoundProfiles {
    profiles: HashMap<PathBuf, SoundProfile>,
}

impl SoundProfiles {
    pub fn new() -> Self {
        Self {
            profiles: HashMap::new(),
        }
    }

    /// Save (or replace) the profile for a track.
    pub fn save(&mut self, path: &Path, profile: SoundProfile) {
        self.profiles.insert(path.to_path_buf(), profile);
    }

    pub fn get(&self, path: &Path) -> Option<&SoundProfile> {
        self.profiles.get(path)
    }

    pub fn remove(&mut self, path: &Path) -> Option<SoundProfile> {
        self.profiles.remove(path)
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.profiles.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effects::EffectsGraph;

    #[test]
    fn save_and_restore_by_path() {
        let mut graph = EffectsGraph::new();
        graph.reverb.set_amount(75.0);

        let mut profiles = SoundProfiles::new();
        let path = Path::new("/music/track.flac");
        profiles.save(
            path,
            SoundProfile {
                volume: 0.8,
                pan: -0.2,
                graph: graph.persistent_state(),
            },
        );

        let profile = profiles.get(path).unwrap();
        assert_eq!(profile.volume, 0.8);

        let mut restored = EffectsGraph::new();
        restored.restore(&profile.graph);
        assert_eq!(restored.reverb.amount(), 75.0);

        assert!(profiles.remove(path).is_some());
        assert!(profiles.is_empty());
    }
}
