//! Factory map from representation names to constructors.

use std::collections::BTreeMap;

use molscope_core::{MolscopeError, OwnerId, Result};

use super::{
    BallStickRepresentation, BaseRepresentation, Representation, RepresentationParameters,
    SpacefillRepresentation,
};

/// Builds a representation for one owner.
pub type RepresentationFactory =
    Box<dyn Fn(OwnerId, &RepresentationParameters) -> Box<dyn Representation>>;

/// Registry of representation factories, keyed by name.
///
/// The stage receives one at construction; there is no global table.
#[derive(Default)]
pub struct RepresentationRegistry {
    factories: BTreeMap<String, RepresentationFactory>,
}

impl RepresentationRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with `"spacefill"`, `"ball+stick"` and `"base"`.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register("spacefill", |owner, params| {
            Box::new(SpacefillRepresentation::new(owner, params))
        });
        registry.register("ball+stick", |owner, params| {
            Box::new(BallStickRepresentation::new(owner, params))
        });
        registry.register("base", |owner, params| {
            Box::new(BaseRepresentation::new(owner, params))
        });
        registry
    }

    /// Registers a factory, replacing any previous one of the same name.
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn(OwnerId, &RepresentationParameters) -> Box<dyn Representation> + 'static,
    {
        let name = name.into();
        if self.factories.insert(name.clone(), Box::new(factory)).is_some() {
            log::debug!("replaced representation factory '{name}'");
        }
    }

    /// Builds the representation registered as `name`.
    pub fn create(
        &self,
        name: &str,
        owner: OwnerId,
        params: &RepresentationParameters,
    ) -> Result<Box<dyn Representation>> {
        let Some(factory) = self.factories.get(name) else {
            log::error!("unknown representation '{name}'");
            return Err(MolscopeError::UnknownRepresentation(name.to_string()));
        };
        Ok(factory(owner, params))
    }

    /// Checks if a factory is registered as `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Registered names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }
}

impl std::fmt::Debug for RepresentationRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RepresentationRegistry")
            .field("names", &self.factories.keys().collect::<Vec<_>>())
            .finish()
    }
}
