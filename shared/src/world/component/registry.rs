use std::collections::HashMap;

use log::warn;

use super::{component::Component, error::ComponentError};

type Constructor = fn() -> Box<dyn Component>;

fn construct<T: Component + Default>() -> Box<dyn Component> {
    Box::new(T::default())
}

/// Maps component kind names to constructors, so that a replica can build
/// components it only knows by name from the wire
#[derive(Clone, Default)]
pub struct ComponentRegistry {
    constructors: HashMap<&'static str, Constructor>,
}

impl ComponentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add<T: Component + Default>(&mut self) -> &mut Self {
        let kind = T::default().kind();
        if self.constructors.insert(kind, construct::<T>).is_some() {
            warn!("Component kind '{}' registered twice, keeping the latest", kind);
        }
        self
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.constructors.contains_key(kind)
    }

    pub fn kinds(&self) -> Vec<&'static str> {
        let mut kinds: Vec<&'static str> = self.constructors.keys().copied().collect();
        kinds.sort_unstable();
        kinds
    }

    pub fn create(&self, kind: &str) -> Result<Box<dyn Component>, ComponentError> {
        self.constructors
            .get(kind)
            .map(|constructor| constructor())
            .ok_or_else(|| ComponentError::KindNotRegistered {
                kind: kind.to_string(),
            })
    }
}
