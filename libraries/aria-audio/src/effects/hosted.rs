/// Hosted (external) effect units
///
/// Third-party processors loaded through a registry of factories and
/// inserted into the chain at runtime. A hosted unit's identity is its
/// component type + subtype pair, stable regardless of chain position.
use super::unit::{EffectProcessor, UnitStateMachine};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Stable identity of a hosted component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ComponentId {
    pub component_type: u32,
    pub component_subtype: u32,
}

impl ComponentId {
    pub fn new(component_type: u32, component_subtype: u32) -> Self {
        Self {
            component_type,
            component_subtype,
        }
    }
}

/// One hosted unit instance in the chain.
pub struct HostedUnit {
    pub state: UnitStateMachine,
    id: ComponentId,
    name: String,
    processor: Box<dyn EffectProcessor>,
}

impl HostedUnit {
    pub fn new(id: ComponentId, name: String, processor: Box<dyn EffectProcessor>) -> Self {
        Self {
            state: UnitStateMachine::bypassed(),
            id,
            name,
            processor,
        }
    }

    pub fn id(&self) -> ComponentId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn processor_mut(&mut self) -> &mut dyn EffectProcessor {
        self.processor.as_mut()
    }
}

type Factory = Box<dyn Fn() -> Box<dyn EffectProcessor> + Send + Sync>;

/// Registry of instantiable hosted components.
#[derive(Default)]
pub struct ComponentRegistry {
    factories: HashMap<ComponentId, (String, Factory)>,
}

impl ComponentRegistry {
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    pub fn register<F>(&mut self, id: ComponentId, name: &str, factory: F)
    where
        F: Fn() -> Box<dyn EffectProcessor> + Send + Sync + 'static,
    {
        self.factories
            .insert(id, (name.to_string(), Box::new(factory)));
    }

    /// Instantiate a registered component, or `None` if unknown.
    pub fn instantiate(&self, id: ComponentId) -> Option<HostedUnit> {
        self.factories
            .get(&id)
            .map(|(name, factory)| HostedUnit::new(id, name.clone(), factory()))
    }

    pub fn available(&self) -> impl Iterator<Item = (ComponentId, &str)> {
        self.factories.iter().map(|(id, (name, _))| (*id, name.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Gain(f32);

    impl EffectProcessor for Gain {
        fn process(&mut self, planes: &mut [Vec<f32>], _sample_rate: u32) {
            for plane in planes.iter_mut() {
                for s in plane.iter_mut() {
                    *s *= self.0;
                }
            }
        }
        fn reset(&mut self) {}
    }

    #[test]
    fn registry_instantiates_registered_components() {
        let mut registry = ComponentRegistry::new();
        let id = ComponentId::new(0x61756678, 1);
        registry.register(id, "Test Gain", || Box::new(Gain(0.5)));

        let mut unit = registry.instantiate(id).unwrap();
        assert_eq!(unit.id(), id);
        assert_eq!(unit.name(), "Test Gain");

        let mut planes = vec![vec![1.0f32; 4]];
        unit.processor_mut().process(&mut planes, 44100);
        assert_eq!(planes[0][0], 0.5);
    }

    #[test]
    fn unknown_component_yields_none() {
        let registry = ComponentRegistry::new();
        assert!(registry.instantiate(ComponentId::new(1, 2)).is_none());
    }
}
