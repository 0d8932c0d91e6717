//! Type-erased two-phase construction machinery.
//!
//! A definition's allocator produces a [`Construction`] holding the inert
//! concrete value. The container drives configure/inject/init against the
//! still-exclusively-owned value and only then seals it into a shared
//! allocation. Keeping the concrete type through the pipeline means the
//! sealed instance can be handed out both as `dyn Injectable` (for
//! lifecycle hooks) and as `dyn Any` (for typed downcasts) from a single
//! allocation.

use std::any::Any;
use std::sync::Arc;

use async_trait::async_trait;

use crate::config::ValidatedConfig;
use crate::container::InitContext;
use crate::error::DiResult;
use crate::lifecycle::{Injectable, InjectionSet};

/// The two views of a sealed instance, both pointing at the same allocation.
pub(crate) struct SealedParts {
    pub(crate) object: Arc<dyn Injectable>,
    pub(crate) any: Arc<dyn Any + Send + Sync>,
}

/// Object-safe facade over an in-flight construction of a concrete type.
#[async_trait]
pub(crate) trait ErasedConstruction: Send {
    fn configure(&mut self, config: &ValidatedConfig) -> DiResult<()>;

    fn inject(&mut self, deps: &InjectionSet) -> DiResult<()>;

    async fn init(&mut self, ctx: &mut InitContext) -> DiResult<()>;

    /// Best-effort teardown of a partially constructed value after a
    /// failed `init`. Runs the destroy hook on the not-yet-shared value.
    async fn discard(&mut self) -> DiResult<()>;

    fn seal(self: Box<Self>) -> SealedParts;
}

pub(crate) struct Construction<T: Injectable> {
    value: T,
}

impl<T: Injectable> Construction<T> {
    pub(crate) fn new(value: T) -> Self {
        Self { value }
    }
}

#[async_trait]
impl<T: Injectable> ErasedConstruction for Construction<T> {
    fn configure(&mut self, config: &ValidatedConfig) -> DiResult<()> {
        self.value.configure(config)
    }

    fn inject(&mut self, deps: &InjectionSet) -> DiResult<()> {
        self.value.inject(deps)
    }

    async fn init(&mut self, ctx: &mut InitContext) -> DiResult<()> {
        self.value.init(ctx).await
    }

    async fn discard(&mut self) -> DiResult<()> {
        self.value.destroy().await
    }

    fn seal(self: Box<Self>) -> SealedParts {
        let shared = Arc::new(self.value);
        SealedParts {
            object: shared.clone(),
            any: shared,
        }
    }
}
