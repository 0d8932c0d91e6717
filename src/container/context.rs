//! Context handed to `init` and `bootstrap` hooks.

use std::any::Any;
use std::sync::Arc;

use crate::error::DiResult;
use crate::identifier::Identifier;
use crate::lifecycle::InstanceHandle;

use super::Container;

/// The constructing container plus the in-flight resolution path.
///
/// Resolutions issued through the context continue the current path, so a
/// hook that resolves its own identifier (directly or transitively) fails
/// with [`DiError::Circular`](crate::DiError::Circular) instead of
/// deadlocking on its own in-flight construction.
///
/// During `bootstrap` the context additionally carries the already-sealed
/// instance handle, which is how a module adopts itself into its child
/// container as a back-reference.
pub struct InitContext {
    container: Container,
    path: Vec<Identifier>,
    instance: Option<InstanceHandle>,
}

impl InitContext {
    pub(crate) fn new(container: Container, path: Vec<Identifier>) -> Self {
        Self {
            container,
            path,
            instance: None,
        }
    }

    pub(crate) fn for_bootstrap(
        container: Container,
        path: Vec<Identifier>,
        instance: InstanceHandle,
    ) -> Self {
        Self {
            container,
            path,
            instance: Some(instance),
        }
    }

    /// The container the instance is being constructed in.
    pub fn container(&self) -> &Container {
        &self.container
    }

    /// The sealed handle of the instance being bootstrapped. `None`
    /// during `init`, when the instance is not yet shared.
    pub fn instance(&self) -> Option<&InstanceHandle> {
        self.instance.as_ref()
    }

    /// Resolves an object, continuing the current resolution path.
    pub async fn get<T: Any + Send + Sync>(&self, id: impl Into<Identifier>) -> DiResult<Arc<T>> {
        self.resolve(id).await?.downcast()
    }

    /// Untyped resolution, continuing the current resolution path.
    pub async fn resolve(&self, id: impl Into<Identifier>) -> DiResult<InstanceHandle> {
        let id = id.into();
        self.container.resolve_path(&id, None, &self.path).await
    }

    pub(crate) fn path(&self) -> &[Identifier] {
        &self.path
    }
}
