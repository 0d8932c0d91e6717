//! Instantiable definitions and the registration-time builder API.
//!
//! A [`Definition`] is the opaque handle to a type the container can
//! instantiate: a display name, an optional parent definition (metadata is
//! inherited along explicit parent links), and a type-erased allocator
//! producing an inert value. Declared metadata (configurable properties,
//! injection points, lifetime) lives in the process-wide
//! [`metadata`](crate::metadata) registry, keyed by definition identity.

use std::any::TypeId;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::error::DiResult;
use crate::identifier::Identifier;
use crate::internal::{Construction, ErasedConstruction};
use crate::lifecycle::Injectable;
use crate::lifetime::Lifetime;
use crate::metadata::{self, TransformFn};
use crate::schema::Schema;

static NEXT_DEFINITION: AtomicU64 = AtomicU64::new(1);

pub(crate) type Allocator = Arc<dyn Fn() -> Box<dyn ErasedConstruction> + Send + Sync>;

/// Process-unique identity of a definition.
///
/// Two definitions are the same declaration iff their ids are equal; names
/// are display-only and may repeat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DefinitionId(u64);

impl DefinitionId {
    fn next() -> Self {
        DefinitionId(NEXT_DEFINITION.fetch_add(1, Ordering::Relaxed))
    }

    /// The raw numeric identity.
    pub fn value(&self) -> u64 {
        self.0
    }
}

/// An instantiable type blueprint, independent of any particular instance.
///
/// Created through [`Definition::builder`] (concrete types) or
/// [`Definition::base`] (abstract bases that exist only to carry inherited
/// metadata). Equality and hashing are by identity, never by name.
pub struct Definition {
    id: DefinitionId,
    name: Arc<str>,
    parent: Option<Arc<Definition>>,
    type_name: &'static str,
    type_id: Option<TypeId>,
    allocator: Option<Allocator>,
}

impl Definition {
    /// Starts building a definition for a concrete type.
    ///
    /// The constructor produces the inert value; configuration, injection,
    /// and asynchronous initialization are applied by the container
    /// afterwards. No constructor should perform async work.
    pub fn builder<T, F>(name: impl AsRef<str>, constructor: F) -> DefinitionBuilder
    where
        T: Injectable,
        F: Fn() -> T + Send + Sync + 'static,
    {
        DefinitionBuilder {
            name: Arc::from(name.as_ref()),
            parent: None,
            type_name: std::any::type_name::<T>(),
            type_id: TypeId::of::<T>(),
            allocator: Arc::new(move || Box::new(Construction::new(constructor()))),
            configurables: Vec::new(),
            injections: Vec::new(),
            lifetime: None,
        }
    }

    /// Creates an abstract base definition.
    ///
    /// A base cannot be instantiated; it exists so derived definitions can
    /// inherit its declared metadata (and so a locked lifetime on it pins
    /// every descendant).
    pub fn base(name: impl AsRef<str>) -> Arc<Definition> {
        Arc::new(Definition {
            id: DefinitionId::next(),
            name: Arc::from(name.as_ref()),
            parent: None,
            type_name: "<abstract>",
            type_id: None,
            allocator: None,
        })
    }

    /// The definition's identity.
    pub fn id(&self) -> DefinitionId {
        self.id
    }

    /// Display name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Parent definition, when this one extends another.
    pub fn parent(&self) -> Option<&Arc<Definition>> {
        self.parent.as_ref()
    }

    /// Name of the concrete Rust type behind this definition.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Whether this definition is an abstract base.
    pub fn is_abstract(&self) -> bool {
        self.allocator.is_none()
    }

    /// Whether `ancestor` appears in this definition's parent chain
    /// (a definition is not its own ancestor).
    pub fn extends(&self, ancestor: &Arc<Definition>) -> bool {
        let mut current = self.parent.as_ref();
        while let Some(level) = current {
            if level.id == ancestor.id {
                return true;
            }
            current = level.parent.as_ref();
        }
        false
    }

    /// `TypeId` of the concrete Rust type, absent for abstract bases.
    pub fn type_id(&self) -> Option<TypeId> {
        self.type_id
    }

    pub(crate) fn allocator(&self) -> Option<&Allocator> {
        self.allocator.as_ref()
    }
}

impl PartialEq for Definition {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Definition {}

impl Hash for Definition {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for Definition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Definition")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("type", &self.type_name)
            .finish()
    }
}

/// Builder collecting a definition's declared metadata.
///
/// The builder is the explicit stand-in for attribute-style registration:
/// it is expected to run once, at startup, before any container loads the
/// definition. [`build`](DefinitionBuilder::build) mints the definition and
/// writes the declarations into the process-wide metadata registry, the
/// lifetime declaration first, so a conflict with a locked ancestor
/// surfaces before any other metadata lands.
pub struct DefinitionBuilder {
    name: Arc<str>,
    parent: Option<Arc<Definition>>,
    type_name: &'static str,
    type_id: TypeId,
    allocator: Allocator,
    configurables: Vec<(String, Arc<dyn Schema>, Option<TransformFn>)>,
    injections: Vec<(String, Option<Identifier>, bool)>,
    lifetime: Option<(Lifetime, bool)>,
}

impl DefinitionBuilder {
    /// Declares `parent` as the definition this one extends. Declared
    /// metadata of the whole ancestor chain is inherited.
    pub fn extends(mut self, parent: &Arc<Definition>) -> Self {
        self.parent = Some(parent.clone());
        self
    }

    /// Declares a configurable property validated by `schema`.
    pub fn configurable(mut self, property: impl AsRef<str>, schema: impl Schema + 'static) -> Self {
        self.configurables
            .push((property.as_ref().to_string(), Arc::new(schema), None));
        self
    }

    /// Declares a configurable property with a transform applied to the
    /// checked (or defaulted) value.
    pub fn configurable_with<F>(
        mut self,
        property: impl AsRef<str>,
        schema: impl Schema + 'static,
        transform: F,
    ) -> Self
    where
        F: Fn(crate::config::PropertyValue) -> crate::config::PropertyValue + Send + Sync + 'static,
    {
        self.configurables.push((
            property.as_ref().to_string(),
            Arc::new(schema),
            Some(Arc::new(transform)),
        ));
        self
    }

    /// Declares a required injection point; the lookup key is inferred
    /// from the property name.
    pub fn inject(mut self, property: impl AsRef<str>) -> Self {
        self.injections.push((property.as_ref().to_string(), None, true));
        self
    }

    /// Declares a required injection point with an explicit lookup key.
    pub fn inject_from(mut self, property: impl AsRef<str>, lookup: impl Into<Identifier>) -> Self {
        self.injections
            .push((property.as_ref().to_string(), Some(lookup.into()), true));
        self
    }

    /// Declares an optional injection point; resolution misses leave the
    /// dependency unresolved instead of failing construction.
    pub fn inject_optional(mut self, property: impl AsRef<str>) -> Self {
        self.injections.push((property.as_ref().to_string(), None, false));
        self
    }

    /// Declares an optional injection point with an explicit lookup key.
    pub fn inject_optional_from(
        mut self,
        property: impl AsRef<str>,
        lookup: impl Into<Identifier>,
    ) -> Self {
        self.injections
            .push((property.as_ref().to_string(), Some(lookup.into()), false));
        self
    }

    /// Declares the lifetime kind.
    pub fn lifetime(mut self, kind: Lifetime) -> Self {
        self.lifetime = Some((kind, false));
        self
    }

    /// Declares the lifetime kind and locks it, so no derived definition
    /// may declare a different kind.
    pub fn lifetime_locked(mut self, kind: Lifetime) -> Self {
        self.lifetime = Some((kind, true));
        self
    }

    /// Mints the definition and registers its metadata.
    ///
    /// Fails with [`DiError::LifetimeLocked`](crate::DiError::LifetimeLocked)
    /// when the declared kind conflicts with a locked ancestor declaration;
    /// in that case no metadata is registered at all.
    pub fn build(self) -> DiResult<Arc<Definition>> {
        let definition = Arc::new(Definition {
            id: DefinitionId::next(),
            name: self.name,
            parent: self.parent,
            type_name: self.type_name,
            type_id: Some(self.type_id),
            allocator: Some(self.allocator),
        });
        if let Some((kind, lock)) = self.lifetime {
            metadata::declare_lifetime(&definition, kind, lock)?;
        }
        for (property, schema, transform) in self.configurables {
            metadata::declare_configurable_arc(&definition, property, schema, transform);
        }
        for (property, lookup, required) in self.injections {
            metadata::declare_injection(&definition, property, lookup, required);
        }
        Ok(definition)
    }
}
