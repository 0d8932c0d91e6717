//! Process-wide metadata registry for definition declarations.
//!
//! Declarations accumulate per definition identity: configurable
//! properties, injection points, and the lifetime declaration. Resolution
//! merges a definition's ancestor chain exactly once and caches the result.
//!
//! The registry has a single well-defined initialization phase: all
//! `declare_*` calls are expected to complete before any
//! [`Container::load`](crate::Container::load) resolves the definition.
//! There is no teardown; definitions are static for the process lifetime.

use std::collections::HashMap;
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::RwLock;

use crate::config::PropertyValue;
use crate::definition::{Definition, DefinitionId};
use crate::error::{DiError, DiResult};
use crate::identifier::Identifier;
use crate::lifetime::{Lifetime, LifetimeDeclaration};
use crate::schema::Schema;

/// Transform applied to a checked (or defaulted) configuration value.
pub type TransformFn = Arc<dyn Fn(PropertyValue) -> PropertyValue + Send + Sync>;

/// A declared configurable property.
#[derive(Clone)]
pub struct ConfigurableDescriptor {
    /// Property name, also the key looked up in raw configuration
    pub property: String,
    /// Schema validating the supplied value
    pub schema: Arc<dyn Schema>,
    /// Optional transform applied after the schema check
    pub transform: Option<TransformFn>,
}

/// A declared injection point.
#[derive(Debug, Clone)]
pub struct InjectionDescriptor {
    /// Property name the dependency is delivered under
    pub property: String,
    /// Identifier resolved through the container chain
    pub lookup: Identifier,
    /// Whether a resolution miss fails construction
    pub required: bool,
}

/// Effective metadata of a definition after merging its ancestor chain.
///
/// Configurables and injections are in declaration order, ancestors first;
/// a re-declaration in a derived definition replaces the ancestor's entry
/// in place, preserving its position so validation order stays stable.
pub struct ResolvedMetadata {
    pub configurables: Vec<ConfigurableDescriptor>,
    pub injections: Vec<InjectionDescriptor>,
    pub lifetime: LifetimeDeclaration,
}

#[derive(Default)]
struct DeclaredMetadata {
    configurables: Vec<ConfigurableDescriptor>,
    injections: Vec<InjectionDescriptor>,
    lifetime: Option<LifetimeDeclaration>,
}

struct MetadataRegistry {
    declared: RwLock<HashMap<DefinitionId, DeclaredMetadata>>,
    resolved: RwLock<HashMap<DefinitionId, Arc<ResolvedMetadata>>>,
}

static REGISTRY: Lazy<MetadataRegistry> = Lazy::new(|| MetadataRegistry {
    declared: RwLock::new(HashMap::new()),
    resolved: RwLock::new(HashMap::new()),
});

/// Declares a configurable property on `definition`.
pub fn declare_configurable(
    definition: &Arc<Definition>,
    property: impl AsRef<str>,
    schema: impl Schema + 'static,
) {
    declare_configurable_arc(definition, property.as_ref().to_string(), Arc::new(schema), None);
}

/// Declares a configurable property with a transform applied to the
/// checked (or defaulted) value.
pub fn declare_configurable_with<F>(
    definition: &Arc<Definition>,
    property: impl AsRef<str>,
    schema: impl Schema + 'static,
    transform: F,
) where
    F: Fn(PropertyValue) -> PropertyValue + Send + Sync + 'static,
{
    declare_configurable_arc(
        definition,
        property.as_ref().to_string(),
        Arc::new(schema),
        Some(Arc::new(transform)),
    );
}

pub(crate) fn declare_configurable_arc(
    definition: &Arc<Definition>,
    property: String,
    schema: Arc<dyn Schema>,
    transform: Option<TransformFn>,
) {
    let descriptor = ConfigurableDescriptor { property, schema, transform };
    {
        let mut declared = REGISTRY.declared.write();
        let entry = declared.entry(definition.id()).or_default();
        match entry.configurables.iter_mut().find(|c| c.property == descriptor.property) {
            Some(existing) => *existing = descriptor,
            None => entry.configurables.push(descriptor),
        }
    }
    invalidate();
}

/// Declares an injection point on `definition`.
///
/// When `lookup` is `None` the key is inferred from the property name.
/// Required injections fail construction on a resolution miss; optional
/// ones are delivered unresolved.
pub fn declare_injection(
    definition: &Arc<Definition>,
    property: impl AsRef<str>,
    lookup: Option<Identifier>,
    required: bool,
) {
    let property = property.as_ref().to_string();
    let lookup = lookup.unwrap_or_else(|| Identifier::name(&property));
    let descriptor = InjectionDescriptor { property, lookup, required };
    {
        let mut declared = REGISTRY.declared.write();
        let entry = declared.entry(definition.id()).or_default();
        match entry.injections.iter_mut().find(|i| i.property == descriptor.property) {
            Some(existing) => *existing = descriptor,
            None => entry.injections.push(descriptor),
        }
    }
    invalidate();
}

/// Declares the lifetime kind of `definition`, optionally locking it.
///
/// Fails with [`DiError::LifetimeLocked`] when a locked declaration on the
/// definition itself or any ancestor pins a different kind. A lock on the
/// definition itself survives a same-kind re-declaration.
pub fn declare_lifetime(definition: &Arc<Definition>, kind: Lifetime, lock: bool) -> DiResult<()> {
    {
        let mut declared = REGISTRY.declared.write();

        let mut current = Some(definition.clone());
        while let Some(level) = current {
            if let Some(declaration) = declared.get(&level.id()).and_then(|m| m.lifetime) {
                if declaration.locked && declaration.kind != kind {
                    return Err(DiError::LifetimeLocked {
                        definition: definition.name().to_string(),
                    });
                }
            }
            current = level.parent().cloned();
        }

        let entry = declared.entry(definition.id()).or_default();
        let already_locked = entry.lifetime.map_or(false, |d| d.locked);
        entry.lifetime = Some(LifetimeDeclaration {
            kind,
            locked: lock || already_locked,
        });
    }
    invalidate();
    Ok(())
}

/// Locks the definition's currently effective lifetime kind.
pub fn lock_lifetime(definition: &Arc<Definition>) -> DiResult<()> {
    let kind = effective_lifetime(definition).kind;
    declare_lifetime(definition, kind, true)
}

/// The effective lifetime declaration: the nearest declared walking
/// self-then-ancestors, defaulting to an unlocked `Transient`.
pub fn effective_lifetime(definition: &Arc<Definition>) -> LifetimeDeclaration {
    let declared = REGISTRY.declared.read();
    let mut current = Some(definition.clone());
    while let Some(level) = current {
        if let Some(declaration) = declared.get(&level.id()).and_then(|m| m.lifetime) {
            return declaration;
        }
        current = level.parent().cloned();
    }
    LifetimeDeclaration::of(Lifetime::Transient)
}

/// Resolves the effective metadata for `definition`, merging the ancestor
/// chain exactly once per definition (memoized).
pub fn resolve(definition: &Arc<Definition>) -> Arc<ResolvedMetadata> {
    if let Some(cached) = REGISTRY.resolved.read().get(&definition.id()) {
        return cached.clone();
    }
    let merged = Arc::new(merge_chain(definition));
    REGISTRY
        .resolved
        .write()
        .entry(definition.id())
        .or_insert(merged)
        .clone()
}

fn merge_chain(definition: &Arc<Definition>) -> ResolvedMetadata {
    // root-first so derived declarations override ancestors in place
    let mut chain = Vec::new();
    let mut current = Some(definition.clone());
    while let Some(level) = current {
        current = level.parent().cloned();
        chain.push(level);
    }
    chain.reverse();

    let declared = REGISTRY.declared.read();
    let mut configurables: Vec<ConfigurableDescriptor> = Vec::new();
    let mut injections: Vec<InjectionDescriptor> = Vec::new();
    let mut lifetime = None;

    for level in &chain {
        let Some(entry) = declared.get(&level.id()) else { continue };
        for descriptor in &entry.configurables {
            match configurables.iter_mut().find(|c| c.property == descriptor.property) {
                Some(existing) => *existing = descriptor.clone(),
                None => configurables.push(descriptor.clone()),
            }
        }
        for descriptor in &entry.injections {
            match injections.iter_mut().find(|i| i.property == descriptor.property) {
                Some(existing) => *existing = descriptor.clone(),
                None => injections.push(descriptor.clone()),
            }
        }
        if let Some(declaration) = entry.lifetime {
            lifetime = Some(declaration);
        }
    }

    ResolvedMetadata {
        configurables,
        injections,
        lifetime: lifetime.unwrap_or(LifetimeDeclaration::of(Lifetime::Transient)),
    }
}

// Declarations after a resolve are a startup-ordering bug, but dropping the
// memo keeps late declarations visible instead of silently stale.
fn invalidate() {
    REGISTRY.resolved.write().clear();
}
