//! The container: registration storage, the resolution engine, lifecycle
//! orchestration, and hierarchical scoping.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Instant;

use parking_lot::{Mutex, RwLock};

use crate::config::{ConfigValidator, PropertyBag, ValidateOptions};
use crate::error::{DiError, DiResult};
use crate::identifier::Identifier;
use crate::internal::BoxFuture;
use crate::lifecycle::{InstanceHandle, LifecycleStatus, StatusCell};
use crate::lifetime::Lifetime;
use crate::metadata;
use crate::observer::{ContainerObserver, Observers};
use crate::registration::{Registration, RegistrationSpec};
use crate::tracker::WeakInstanceTracker;

pub(crate) mod cache;
mod context;

pub use context::InitContext;

use cache::CacheSlot;

const MAX_RESOLUTION_DEPTH: usize = 1024;

/// The dependency-injection container.
///
/// A container owns a map of identifier-to-registration bindings, caches
/// singleton and scoped instances, weakly tracks transients, and holds a
/// non-owning back-reference to an optional parent. Lookups that miss
/// locally delegate to the parent; a miss at the root is an
/// [`Unresolved`](DiError::Unresolved) error, never a silent absence.
///
/// Cloning a container clones a handle to the same container.
///
/// # Examples
///
/// ```rust
/// use keystone_di::{
///     schemas, Container, Definition, DiResult, Injectable, Lifetime, RegistrationSpec,
///     ValidatedConfig,
/// };
///
/// #[derive(Default)]
/// struct HttpService {
///     port: u16,
/// }
///
/// impl Injectable for HttpService {
///     fn configure(&mut self, config: &ValidatedConfig) -> DiResult<()> {
///         self.port = config.get("port")?;
///         Ok(())
///     }
/// }
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> DiResult<()> {
/// let service = Definition::builder("http", HttpService::default)
///     .configurable("port", schemas::unsigned())
///     .lifetime(Lifetime::Singleton)
///     .build()?;
///
/// let container = Container::new();
/// container.load([("http", RegistrationSpec::of(&service).with("port", 8080))])?;
///
/// let http = container.get::<HttpService>("http").await?;
/// assert_eq!(http.port, 8080);
///
/// container.destroy().await?;
/// # Ok(())
/// # }
/// ```
pub struct Container {
    inner: Arc<ContainerInner>,
}

struct ContainerInner {
    parent: Option<Weak<ContainerInner>>,
    registrations: RwLock<HashMap<Identifier, Arc<Registration>>>,
    scoped: Mutex<HashMap<Identifier, Arc<CacheSlot>>>,
    adopted: RwLock<HashMap<Identifier, InstanceHandle>>,
    /// Cached instances in construction-completion order; destroyed LIFO.
    teardown: Mutex<Vec<InstanceHandle>>,
    tracker: WeakInstanceTracker,
    observers: Observers,
    destroyed: AtomicBool,
}

impl Clone for Container {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl Default for Container {
    fn default() -> Self {
        Self::new()
    }
}

impl Container {
    /// Creates an empty root container.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(ContainerInner {
                parent: None,
                registrations: RwLock::new(HashMap::new()),
                scoped: Mutex::new(HashMap::new()),
                adopted: RwLock::new(HashMap::new()),
                teardown: Mutex::new(Vec::new()),
                tracker: WeakInstanceTracker::new(),
                observers: Observers::new(),
                destroyed: AtomicBool::new(false),
            }),
        }
    }

    /// Creates a child container delegating unresolved lookups to `self`.
    ///
    /// The child holds only a non-owning back-reference: a child never
    /// keeps its parent alive, and destroying a child never touches the
    /// parent. Registrations in the child shadow same-named parent
    /// registrations, which is the intended mechanism for scoped
    /// overrides. The child starts with a snapshot of the parent's
    /// observers.
    pub fn create_child(&self) -> Container {
        Container {
            inner: Arc::new(ContainerInner {
                parent: Some(Arc::downgrade(&self.inner)),
                registrations: RwLock::new(HashMap::new()),
                scoped: Mutex::new(HashMap::new()),
                adopted: RwLock::new(HashMap::new()),
                teardown: Mutex::new(Vec::new()),
                tracker: WeakInstanceTracker::new(),
                observers: self.inner.observers.snapshot(),
                destroyed: AtomicBool::new(false),
            }),
        }
    }

    /// The parent container, when one exists and is still alive.
    pub fn parent(&self) -> Option<Container> {
        self.inner
            .parent
            .as_ref()
            .and_then(Weak::upgrade)
            .map(|inner| Container { inner })
    }

    /// Registers an observer for resolution and teardown events.
    pub fn add_observer(&self, observer: Arc<dyn ContainerObserver>) {
        self.inner.observers.add(observer);
    }

    /// The weak tracker for this container's transient instances.
    pub fn tracker(&self) -> &WeakInstanceTracker {
        &self.inner.tracker
    }

    /// Whether [`destroy`](Container::destroy) has run.
    pub fn is_destroyed(&self) -> bool {
        self.inner.destroyed.load(Ordering::Acquire)
    }

    /// Loads a batch of registrations.
    ///
    /// Each entry binds an identifier to a definition plus static
    /// configuration. The effective lifetime is computed once, here, and
    /// is fixed for as long as this container holds the registration.
    ///
    /// Fails with [`DiError::DuplicateRegistration`] when an id is already
    /// bound **in this container** (shadowing an ancestor is allowed and
    /// intentional); on failure nothing from the batch is registered.
    pub fn load<I, K, S>(&self, specs: I) -> DiResult<()>
    where
        I: IntoIterator<Item = (K, S)>,
        K: Into<Identifier>,
        S: Into<RegistrationSpec>,
    {
        self.ensure_alive()?;
        let staged: Vec<(Identifier, RegistrationSpec)> = specs
            .into_iter()
            .map(|(id, spec)| (id.into(), spec.into()))
            .collect();

        {
            let registrations = self.inner.registrations.read();
            let adopted = self.inner.adopted.read();
            for (index, (id, _)) in staged.iter().enumerate() {
                let duplicate = registrations.contains_key(id)
                    || adopted.contains_key(id)
                    || staged[..index].iter().any(|(seen, _)| seen == id);
                if duplicate {
                    return Err(DiError::DuplicateRegistration(id.clone()));
                }
            }
        }

        let mut registrations = self.inner.registrations.write();
        for (id, spec) in staged {
            let lifetime = metadata::resolve(spec.definition()).lifetime.kind;
            registrations.insert(id, Arc::new(Registration::new(spec, lifetime)));
        }
        Ok(())
    }

    /// Registers a single entry; sugar over [`load`](Container::load).
    /// Returns the identifier for chaining into a `get`.
    pub fn set(
        &self,
        id: impl Into<Identifier>,
        spec: impl Into<RegistrationSpec>,
    ) -> DiResult<Identifier> {
        let id = id.into();
        self.load([(id.clone(), spec.into())])?;
        Ok(id)
    }

    /// Registers and immediately resolves a single entry.
    pub async fn create_object<T: std::any::Any + Send + Sync>(
        &self,
        id: impl Into<Identifier>,
        spec: impl Into<RegistrationSpec>,
    ) -> DiResult<Arc<T>> {
        let id = self.set(id, spec)?;
        self.get(id).await
    }

    /// Whether `id` resolves anywhere up the container chain.
    pub fn has(&self, id: impl Into<Identifier>) -> bool {
        let id = id.into();
        let mut level = self.clone();
        loop {
            if level.inner.adopted.read().contains_key(&id)
                || level.inner.registrations.read().contains_key(&id)
            {
                return true;
            }
            match level.parent() {
                Some(parent) => level = parent,
                None => return false,
            }
        }
    }

    /// Resolves `id` to a typed instance.
    ///
    /// Looks up the cached instance under the registration's lifetime
    /// policy, or constructs one: validates configuration, resolves
    /// injected dependencies recursively (possibly from ancestor
    /// containers), runs `init`, and caches or tracks the result.
    /// Concurrent calls for the same singleton or scoped id coalesce onto
    /// a single construction.
    pub async fn get<T: std::any::Any + Send + Sync>(
        &self,
        id: impl Into<Identifier>,
    ) -> DiResult<Arc<T>> {
        let id = id.into();
        self.resolve_path(&id, None, &[]).await?.downcast()
    }

    /// Like [`get`](Container::get), with per-call configuration overrides
    /// layered over the registration's static configuration.
    ///
    /// Overrides participate only in a construction that actually runs; a
    /// cache hit returns the existing instance untouched.
    pub async fn get_with<T: std::any::Any + Send + Sync>(
        &self,
        id: impl Into<Identifier>,
        overrides: PropertyBag,
    ) -> DiResult<Arc<T>> {
        let id = id.into();
        self.resolve_path(&id, Some(&overrides), &[]).await?.downcast()
    }

    /// Untyped resolution.
    pub async fn resolve(&self, id: impl Into<Identifier>) -> DiResult<InstanceHandle> {
        let id = id.into();
        self.resolve_path(&id, None, &[]).await
    }

    /// Lifecycle status of the locally cached or adopted entry for `id`.
    pub fn status_of(&self, id: impl Into<Identifier>) -> Option<LifecycleStatus> {
        let id = id.into();
        if let Some(handle) = self.inner.adopted.read().get(&id) {
            return Some(handle.status());
        }
        if let Some(registration) = self.inner.registrations.read().get(&id) {
            if registration.lifetime == Lifetime::Singleton {
                return registration.single_slot.peek().map(|handle| handle.status());
            }
        }
        let slot = self.inner.scoped.lock().get(&id).cloned();
        slot.and_then(|slot| slot.peek()).map(|handle| handle.status())
    }

    /// Installs an already-built instance under `id`.
    ///
    /// Adopted instances resolve like registrations but are never
    /// destroyed by this container; their construction owner remains
    /// responsible. This is how a module exposes itself to the objects in
    /// its child container.
    pub fn adopt(&self, id: impl Into<Identifier>, handle: InstanceHandle) -> DiResult<()> {
        self.ensure_alive()?;
        let id = id.into();
        if self.inner.registrations.read().contains_key(&id)
            || self.inner.adopted.read().contains_key(&id)
        {
            return Err(DiError::DuplicateRegistration(id));
        }
        self.inner.adopted.write().insert(id, handle);
        Ok(())
    }

    /// Destroys the cached instance for a locally registered singleton or
    /// scoped entry, leaving the registration in place. The next `get`
    /// constructs a fresh instance. A no-op when nothing is cached.
    pub async fn destroy_entry(&self, id: impl Into<Identifier>) -> DiResult<()> {
        let id = id.into();
        if !self.has(&id) {
            return Err(DiError::Unresolved(id));
        }
        let local_singleton = {
            let registrations = self.inner.registrations.read();
            registrations
                .get(&id)
                .filter(|registration| registration.lifetime == Lifetime::Singleton)
                .cloned()
        };
        let taken = match local_singleton {
            Some(registration) => registration.single_slot.take(),
            None => {
                let slot = self.inner.scoped.lock().remove(&id);
                slot.and_then(|slot| slot.take())
            }
        };
        if let Some(handle) = taken {
            destroy_handle(&handle).await?;
            self.inner.observers.destroyed(&id);
        }
        Ok(())
    }

    /// Destroys and re-creates the cached entry for `id` in place.
    ///
    /// The registration and identifier are preserved; the instance is
    /// not. Reload yields a fresh instance built under the same binding.
    pub async fn reload(&self, id: impl Into<Identifier>) -> DiResult<InstanceHandle> {
        let id = id.into();
        self.destroy_entry(id.clone()).await?;
        self.resolve(id).await
    }

    /// Explicitly destroys a transient instance constructed by this
    /// container, routing the status transitions through the container.
    pub async fn destroy_transient<T: std::any::Any + Send + Sync>(
        &self,
        instance: &Arc<T>,
    ) -> DiResult<()> {
        let ptr = Arc::as_ptr(instance) as *const ();
        let handle = self.inner.tracker.find(ptr).ok_or_else(|| {
            DiError::Lifecycle("instance is not a tracked transient of this container".to_string())
        })?;
        destroy_handle(&handle).await?;
        self.inner.observers.destroyed(handle.id());
        Ok(())
    }

    /// Destroys this container.
    ///
    /// Locally cached singleton and scoped instances are destroyed in
    /// reverse construction order, then still-live tracked transients,
    /// then the registration map is released. Hook errors are collected
    /// (every instance still gets its teardown attempt) and the first
    /// error is returned at the end, with the rest reported to observers.
    /// Destroying an already-destroyed container is a no-op; a destroyed
    /// container rejects further loads and resolutions.
    pub async fn destroy(&self) -> DiResult<()> {
        if self.inner.destroyed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        let mut first_error: Option<DiError> = None;

        let mut cached = {
            let mut teardown = self.inner.teardown.lock();
            std::mem::take(&mut *teardown)
        };
        while let Some(handle) = cached.pop() {
            match destroy_handle(&handle).await {
                Ok(()) => self.inner.observers.destroyed(handle.id()),
                Err(error) => {
                    self.inner.observers.cleanup_failed(handle.id(), &error);
                    first_error.get_or_insert(error);
                }
            }
        }

        for handle in self.inner.tracker.drain_live() {
            match destroy_handle(&handle).await {
                Ok(()) => self.inner.observers.destroyed(handle.id()),
                Err(error) => {
                    self.inner.observers.cleanup_failed(handle.id(), &error);
                    first_error.get_or_insert(error);
                }
            }
        }

        self.inner.registrations.write().clear();
        self.inner.scoped.lock().clear();
        self.inner.adopted.write().clear();

        match first_error {
            None => Ok(()),
            Some(error) => Err(error),
        }
    }

    fn ensure_alive(&self) -> DiResult<()> {
        if self.is_destroyed() {
            Err(DiError::Lifecycle("container has been destroyed".to_string()))
        } else {
            Ok(())
        }
    }

    /// The resolution engine. `path` is the chain of identifiers currently
    /// under construction in this logical resolution; the cycle check runs
    /// before any coalescing cell is touched, so a cycle fails fast
    /// instead of deadlocking on its own in-flight construction.
    pub(crate) fn resolve_path<'a>(
        &'a self,
        id: &'a Identifier,
        overrides: Option<&'a PropertyBag>,
        path: &'a [Identifier],
    ) -> BoxFuture<'a, DiResult<InstanceHandle>> {
        Box::pin(async move {
            self.ensure_alive()?;
            if path.iter().any(|pending| pending == id) {
                let mut cycle = path.to_vec();
                cycle.push(id.clone());
                return Err(DiError::Circular(cycle));
            }
            if path.len() >= MAX_RESOLUTION_DEPTH {
                return Err(DiError::DepthExceeded(path.len()));
            }

            // walk self-then-ancestors for an adopted handle or the
            // owning registration
            let mut level = self.clone();
            loop {
                if let Some(handle) = level.inner.adopted.read().get(id).cloned() {
                    return Ok(handle);
                }
                let registration = level.inner.registrations.read().get(id).cloned();
                if let Some(registration) = registration {
                    return self
                        .resolve_registration(&level, &registration, id, overrides, path)
                        .await;
                }
                match level.parent() {
                    Some(parent) => level = parent,
                    None => return Err(DiError::Unresolved(id.clone())),
                }
            }
        })
    }

    /// Dispatches on the registration's lifetime. `owner` is the container
    /// the registration was loaded into; `self` is the container the
    /// resolution was issued against.
    async fn resolve_registration(
        &self,
        owner: &Container,
        registration: &Arc<Registration>,
        id: &Identifier,
        overrides: Option<&PropertyBag>,
        path: &[Identifier],
    ) -> DiResult<InstanceHandle> {
        match registration.lifetime {
            Lifetime::Transient => {
                // never cached; dependencies resolve in the resolving
                // container, and the resolving container tracks it
                let handle = self.construct(registration, id, overrides, path, None).await?;
                self.inner.tracker.track(&handle);
                Ok(handle)
            }
            Lifetime::Scoped => {
                // one instance per resolving container, even when the
                // registration is inherited from an ancestor
                let slot = self.scoped_slot(id);
                let cell = slot.cell();
                let handle = cell
                    .get_or_try_init(|| self.construct(registration, id, overrides, path, Some(self)))
                    .await?
                    .clone();
                Ok(handle)
            }
            Lifetime::Singleton => {
                // the cell lives on the registration, so the instance is
                // shared by every container resolving through the owner;
                // dependencies resolve in the owner's context so a
                // singleton never captures descendant-scoped state
                let cell = registration.single_slot.cell();
                let handle = cell
                    .get_or_try_init(|| {
                        owner.construct(registration, id, overrides, path, Some(owner))
                    })
                    .await?
                    .clone();
                Ok(handle)
            }
        }
    }

    fn scoped_slot(&self, id: &Identifier) -> Arc<CacheSlot> {
        let mut scoped = self.inner.scoped.lock();
        scoped
            .entry(id.clone())
            .or_insert_with(|| Arc::new(CacheSlot::new()))
            .clone()
    }

    /// Builds one instance, with observer notifications around the actual
    /// construction (cache hits never reach this point).
    async fn construct(
        &self,
        registration: &Arc<Registration>,
        id: &Identifier,
        overrides: Option<&PropertyBag>,
        path: &[Identifier],
        cache_owner: Option<&Container>,
    ) -> DiResult<InstanceHandle> {
        let observing = self.inner.observers.has_observers();
        let started = Instant::now();
        if observing {
            self.inner.observers.resolving(id);
        }
        let result = self
            .construct_inner(registration, id, overrides, path, cache_owner)
            .await;
        if observing {
            match &result {
                Ok(_) => self.inner.observers.resolved(id, started.elapsed()),
                Err(error) => self.inner.observers.resolution_failed(id, error),
            }
        }
        result
    }

    /// The two-phase build: validate configuration, resolve injections,
    /// allocate inert, configure, inject, init, seal, bootstrap, record.
    /// Any failure leaves the container as if the construction never
    /// happened; a failure after partial acquisition triggers best-effort
    /// cleanup whose own errors are reported as secondary.
    async fn construct_inner(
        &self,
        registration: &Arc<Registration>,
        id: &Identifier,
        overrides: Option<&PropertyBag>,
        path: &[Identifier],
        cache_owner: Option<&Container>,
    ) -> DiResult<InstanceHandle> {
        let definition = registration.definition.clone();
        let allocator = definition.allocator().cloned().ok_or_else(|| {
            DiError::Lifecycle(format!(
                "definition \"{}\" is abstract and cannot be instantiated",
                definition.name()
            ))
        })?;

        let raw = match overrides {
            Some(overrides) => registration.static_config.merged(overrides),
            None => registration.static_config.clone(),
        };
        let config = ConfigValidator::validate(&definition, &raw, ValidateOptions::default()).await?;

        let mut child_path = path.to_vec();
        child_path.push(id.clone());

        let resolved = metadata::resolve(&definition);
        let mut deps = crate::lifecycle::InjectionSet::new();
        for injection in &resolved.injections {
            match self.resolve_path(&injection.lookup, None, &child_path).await {
                Ok(handle) => deps.insert(injection.property.clone(), Some(handle)),
                Err(DiError::Unresolved(_)) if !injection.required => {
                    deps.insert(injection.property.clone(), None);
                }
                Err(error) => return Err(error),
            }
        }

        let mut construction = allocator();
        let status = Arc::new(StatusCell::new());
        construction.configure(&config)?;
        construction.inject(&deps)?;

        status.set(LifecycleStatus::Initializing);
        let mut ctx = InitContext::new(self.clone(), child_path.clone());
        if let Err(error) = construction.init(&mut ctx).await {
            // cleanup-on-failure: release whatever the partial instance
            // acquired; the original error always wins
            status.set(LifecycleStatus::Destroying);
            if let Err(cleanup) = construction.discard().await {
                self.inner.observers.cleanup_failed(id, &cleanup);
            }
            status.set(LifecycleStatus::Destroyed);
            return Err(error);
        }

        let sealed = construction.seal();
        let handle = InstanceHandle::new(id.clone(), definition, sealed.object, sealed.any, status);
        handle.status_cell().set(LifecycleStatus::Ready);

        let mut ctx = InitContext::for_bootstrap(self.clone(), child_path, handle.clone());
        if let Err(error) = handle.object().bootstrap(&mut ctx).await {
            // a failed bootstrap tears the instance back down before the
            // error propagates; it is never cached
            if let Err(cleanup) = destroy_handle(&handle).await {
                self.inner.observers.cleanup_failed(id, &cleanup);
            }
            return Err(error);
        }

        if let Some(owner) = cache_owner {
            owner.inner.teardown.lock().push(handle.clone());
        }
        Ok(handle)
    }
}

/// Status-guarded destruction of one instance. Idempotent: only the caller
/// that wins the transition into `Destroying` runs the hook; everyone else
/// sees a no-op.
pub(crate) async fn destroy_handle(handle: &InstanceHandle) -> DiResult<()> {
    loop {
        match handle.status() {
            LifecycleStatus::Destroying | LifecycleStatus::Destroyed => return Ok(()),
            current => {
                if handle
                    .status_cell()
                    .transition(current, LifecycleStatus::Destroying)
                {
                    break;
                }
            }
        }
    }
    let result = handle.object().destroy().await;
    handle.status_cell().set(LifecycleStatus::Destroyed);
    result
}
