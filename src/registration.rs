//! Registration specs and the immutable per-container registration.

use std::sync::Arc;

use crate::config::{PropertyBag, PropertyValue};
use crate::container::cache::CacheSlot;
use crate::definition::Definition;
use crate::lifetime::Lifetime;

/// What a caller hands to [`Container::load`](crate::Container::load):
/// a definition plus its static configuration.
///
/// A bare definition converts directly, covering the common no-config
/// case:
///
/// ```rust
/// use keystone_di::{Container, Definition, DiResult, Injectable, RegistrationSpec};
///
/// #[derive(Default)]
/// struct Clock;
/// impl Injectable for Clock {}
///
/// # fn main() -> DiResult<()> {
/// let clock = Definition::builder("clock", Clock::default).build()?;
/// let container = Container::new();
/// container.load([("clock", &clock)])?;
/// assert!(container.has("clock"));
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct RegistrationSpec {
    pub(crate) definition: Arc<Definition>,
    pub(crate) config: PropertyBag,
}

impl RegistrationSpec {
    /// Spec for `definition` with no static configuration.
    pub fn of(definition: &Arc<Definition>) -> Self {
        Self {
            definition: definition.clone(),
            config: PropertyBag::new(),
        }
    }

    /// Spec for `definition` with the given static configuration.
    pub fn with_config(definition: &Arc<Definition>, config: PropertyBag) -> Self {
        Self {
            definition: definition.clone(),
            config,
        }
    }

    /// Builder-style static configuration entry.
    pub fn with(mut self, property: impl AsRef<str>, value: impl Into<PropertyValue>) -> Self {
        self.config.set(property, value);
        self
    }

    pub fn definition(&self) -> &Arc<Definition> {
        &self.definition
    }

    pub fn config(&self) -> &PropertyBag {
        &self.config
    }
}

impl From<&Arc<Definition>> for RegistrationSpec {
    fn from(definition: &Arc<Definition>) -> Self {
        RegistrationSpec::of(definition)
    }
}

impl From<Arc<Definition>> for RegistrationSpec {
    fn from(definition: Arc<Definition>) -> Self {
        RegistrationSpec::of(&definition)
    }
}

/// A resolved, immutable binding of an identifier to a definition within
/// one container. The singleton cache cell lives on the registration
/// itself, so the cache's owner is the container the id was loaded into.
pub(crate) struct Registration {
    pub(crate) definition: Arc<Definition>,
    pub(crate) static_config: PropertyBag,
    pub(crate) lifetime: Lifetime,
    pub(crate) single_slot: CacheSlot,
}

impl Registration {
    pub(crate) fn new(spec: RegistrationSpec, lifetime: Lifetime) -> Self {
        Self {
            definition: spec.definition,
            static_config: spec.config,
            lifetime,
            single_slot: CacheSlot::new(),
        }
    }
}
