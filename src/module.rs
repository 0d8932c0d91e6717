//! Modules: managed objects that own a child container.
//!
//! A [`Module`] is an ordinary managed object whose `init` creates a child
//! container and loads the module's declared entries into it. Everything a
//! module loads lives in the child scope; the module instance itself lives
//! in whatever container it was registered in. After the module reaches
//! `Ready`, its bootstrap sequence runs: the module adopts itself into the
//! child under the id `module` (so nested objects can inject the module
//! back-reference) and then executes the declared bootstrap items in
//! order. Destroying a module destroys its child container's instances
//! first.
//!
//! The module base definition is a locked `Singleton`: derived definitions
//! cannot re-declare a different lifetime kind, which keeps a module's
//! scoping assumptions intact no matter what application code declares.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use parking_lot::Mutex;

use crate::config::ValidatedConfig;
use crate::container::{Container, InitContext};
use crate::definition::Definition;
use crate::error::{DiError, DiResult};
use crate::identifier::Identifier;
use crate::lifecycle::Injectable;
use crate::lifetime::Lifetime;
use crate::metadata;
use crate::registration::RegistrationSpec;
use crate::schema::schemas;

/// Identifier the module adopts itself under in its child container.
pub const MODULE_BACK_REFERENCE: &str = "module";

type BootstrapFn =
    Arc<dyn Fn(Container) -> Pin<Box<dyn Future<Output = DiResult<()>> + Send>> + Send + Sync>;

#[derive(Clone)]
enum BootstrapKind {
    Resolve(Identifier),
    Run(BootstrapFn),
}

/// One step of a module's ordered bootstrap sequence.
#[derive(Clone)]
pub struct BootstrapItem {
    kind: BootstrapKind,
}

impl BootstrapItem {
    /// Resolves `id` in the module's child container, eagerly
    /// constructing it.
    pub fn resolve(id: impl Into<Identifier>) -> Self {
        Self {
            kind: BootstrapKind::Resolve(id.into()),
        }
    }

    /// Runs an async callable against the module's child container.
    pub fn run<F, Fut>(callable: F) -> Self
    where
        F: Fn(Container) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = DiResult<()>> + Send + 'static,
    {
        Self {
            kind: BootstrapKind::Run(Arc::new(move |container| Box::pin(callable(container)))),
        }
    }
}

/// Declarative configuration of a module: what the child container loads
/// and what runs once the module is ready.
///
/// Passed to the module as the opaque `options` configurable:
///
/// ```rust
/// use keystone_di::{BootstrapItem, Definition, DiResult, Injectable, Module, ModuleOptions,
///     PropertyValue, RegistrationSpec};
///
/// #[derive(Default)]
/// struct Worker;
/// impl Injectable for Worker {}
///
/// # fn main() -> DiResult<()> {
/// let worker = Definition::builder("worker", Worker::default).build()?;
/// let app = Module::definition("app")?;
///
/// let options = ModuleOptions::new()
///     .entry("worker", RegistrationSpec::of(&worker))
///     .bootstrap(BootstrapItem::resolve("worker"));
///
/// let spec = RegistrationSpec::of(&app).with("options", PropertyValue::object(options));
/// # let _ = spec;
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Default)]
pub struct ModuleOptions {
    entries: Vec<(Identifier, RegistrationSpec)>,
    bootstrap: Vec<BootstrapItem>,
}

impl ModuleOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an entry loaded into the module's child container.
    pub fn entry(mut self, id: impl Into<Identifier>, spec: impl Into<RegistrationSpec>) -> Self {
        self.entries.push((id.into(), spec.into()));
        self
    }

    /// Appends a bootstrap step; steps run in declaration order after the
    /// module reaches `Ready`.
    pub fn bootstrap(mut self, item: BootstrapItem) -> Self {
        self.bootstrap.push(item);
        self
    }

    pub fn entries(&self) -> &[(Identifier, RegistrationSpec)] {
        &self.entries
    }
}

static MODULE_BASE: Lazy<Arc<Definition>> = Lazy::new(|| {
    let base = Definition::base("module");
    metadata::declare_lifetime(&base, Lifetime::Singleton, true)
        .expect("the module base carries the first lifetime declaration for itself");
    base
});

/// A managed object owning a child container.
pub struct Module {
    options: ModuleOptions,
    child: Mutex<Option<Container>>,
}

impl Module {
    fn inert() -> Module {
        Module {
            options: ModuleOptions::new(),
            child: Mutex::new(None),
        }
    }

    /// The abstract module base definition: `Singleton`, locked.
    ///
    /// Definitions extending the base inherit the locked declaration;
    /// declaring any other lifetime kind on them fails with
    /// [`DiError::LifetimeLocked`].
    pub fn base() -> &'static Arc<Definition> {
        &MODULE_BASE
    }

    /// Builds a concrete module definition extending the base, with the
    /// single opaque configurable `options`.
    pub fn definition(name: impl AsRef<str>) -> DiResult<Arc<Definition>> {
        Definition::builder(name, Module::inert)
            .extends(Module::base())
            .configurable("options", schemas::object::<ModuleOptions>().optional())
            .build()
    }

    /// The options the module was loaded with.
    pub fn options(&self) -> &ModuleOptions {
        &self.options
    }

    /// The module's child container.
    pub fn container(&self) -> DiResult<Container> {
        self.child
            .lock()
            .clone()
            .ok_or_else(|| DiError::Lifecycle("module container is not initialized".to_string()))
    }

    /// Resolves an object from the module's child container.
    pub async fn get<T: std::any::Any + Send + Sync>(
        &self,
        id: impl Into<Identifier>,
    ) -> DiResult<Arc<T>> {
        self.container()?.get(id).await
    }

    /// Whether `id` resolves from the module's child container (or its
    /// ancestors).
    pub fn has(&self, id: impl Into<Identifier>) -> bool {
        match self.container() {
            Ok(container) => container.has(id),
            Err(_) => false,
        }
    }
}

#[async_trait]
impl Injectable for Module {
    fn configure(&mut self, config: &ValidatedConfig) -> DiResult<()> {
        if let Some(options) = config.try_object::<ModuleOptions>("options") {
            self.options = options.as_ref().clone();
        }
        Ok(())
    }

    async fn init(&mut self, ctx: &mut InitContext) -> DiResult<()> {
        let child = ctx.container().create_child();
        child.load(self.options.entries.iter().cloned())?;
        *self.child.lock() = Some(child);
        Ok(())
    }

    async fn bootstrap(&self, ctx: &mut InitContext) -> DiResult<()> {
        let child = self.container()?;

        // the back-reference goes in first so every bootstrap step (and
        // everything resolved later) can inject the module
        if let Some(instance) = ctx.instance() {
            child.adopt(Identifier::name(MODULE_BACK_REFERENCE), instance.clone())?;
        }

        for item in &self.options.bootstrap {
            match &item.kind {
                BootstrapKind::Resolve(id) => {
                    // continue the module's own resolution path so a
                    // bootstrap entry reaching back to the module's id
                    // reports a cycle instead of waiting on it
                    child.resolve_path(id, None, ctx.path()).await?;
                }
                BootstrapKind::Run(callable) => callable(child.clone()).await?,
            }
        }
        Ok(())
    }

    async fn destroy(&self) -> DiResult<()> {
        // the child container and everything it cached go down before the
        // module itself is considered destroyed
        let child = self.child.lock().take();
        if let Some(child) = child {
            child.destroy().await?;
        }
        Ok(())
    }
}
