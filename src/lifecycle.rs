//! The object-lifecycle protocol for managed instances.
//!
//! Every object a [`Container`](crate::Container) manages implements
//! [`Injectable`]. The container alone drives status transitions; user code
//! only supplies the hook bodies.

use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use crate::config::ValidatedConfig;
use crate::container::InitContext;
use crate::definition::Definition;
use crate::error::{DiError, DiResult};
use crate::identifier::Identifier;

/// Lifecycle status of a managed instance.
///
/// Statuses advance strictly forward; `Destroyed` is terminal. Transitions
/// are driven exclusively by the container; hook bodies never transition
/// an instance themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleStatus {
    /// Allocated, not yet configured or initialized
    Created,
    /// `init` is running
    Initializing,
    /// Fully constructed and available for use
    Ready,
    /// `destroy` is running
    Destroying,
    /// Terminal; destroying again is a no-op
    Destroyed,
}

impl LifecycleStatus {
    fn as_u8(self) -> u8 {
        match self {
            LifecycleStatus::Created => 0,
            LifecycleStatus::Initializing => 1,
            LifecycleStatus::Ready => 2,
            LifecycleStatus::Destroying => 3,
            LifecycleStatus::Destroyed => 4,
        }
    }

    fn from_u8(raw: u8) -> LifecycleStatus {
        match raw {
            0 => LifecycleStatus::Created,
            1 => LifecycleStatus::Initializing,
            2 => LifecycleStatus::Ready,
            3 => LifecycleStatus::Destroying,
            _ => LifecycleStatus::Destroyed,
        }
    }
}

/// Atomic status cell shared between an instance handle and its caches.
pub(crate) struct StatusCell(AtomicU8);

impl StatusCell {
    pub(crate) fn new() -> Self {
        Self(AtomicU8::new(LifecycleStatus::Created.as_u8()))
    }

    pub(crate) fn get(&self) -> LifecycleStatus {
        LifecycleStatus::from_u8(self.0.load(Ordering::Acquire))
    }

    pub(crate) fn set(&self, status: LifecycleStatus) {
        self.0.store(status.as_u8(), Ordering::Release);
    }

    /// Compare-and-swap transition; returns whether this caller won.
    pub(crate) fn transition(&self, from: LifecycleStatus, to: LifecycleStatus) -> bool {
        self.0
            .compare_exchange(from.as_u8(), to.as_u8(), Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

/// Protocol implemented by every managed instance.
///
/// All hooks default to no-ops, so a plain `impl Injectable for T {}` is a
/// valid managed object. `configure`, `inject`, and `init` run while the
/// container still owns the value exclusively; `bootstrap` and `destroy`
/// run on the shared instance, so implementations needing mutation there
/// use interior mutability.
///
/// `init` must not perform work in the constructor's place that belongs to
/// allocation: allocators produce inert values and the container
/// orchestrates the rest.
///
/// # Examples
///
/// ```rust
/// use keystone_di::{
///     schemas, Container, Definition, DiResult, Injectable, InjectionSet, Lifetime,
///     RegistrationSpec, ValidatedConfig,
/// };
/// use std::sync::Arc;
///
/// #[derive(Default)]
/// struct Database {
///     url: String,
/// }
///
/// impl Injectable for Database {
///     fn configure(&mut self, config: &ValidatedConfig) -> DiResult<()> {
///         self.url = config.get("url")?;
///         Ok(())
///     }
/// }
///
/// #[derive(Default)]
/// struct Repository {
///     db: Option<Arc<Database>>,
/// }
///
/// impl Injectable for Repository {
///     fn inject(&mut self, deps: &InjectionSet) -> DiResult<()> {
///         self.db = Some(deps.get("db")?);
///         Ok(())
///     }
/// }
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> DiResult<()> {
/// let database = Definition::builder("database", Database::default)
///     .configurable("url", schemas::string())
///     .lifetime(Lifetime::Singleton)
///     .build()?;
/// let repository = Definition::builder("repository", Repository::default)
///     .inject("db")
///     .build()?;
///
/// let container = Container::new();
/// container.load([
///     ("db", RegistrationSpec::of(&database).with("url", "postgres://localhost")),
///     ("repo", RegistrationSpec::of(&repository)),
/// ])?;
///
/// let repo = container.get::<Repository>("repo").await?;
/// assert_eq!(repo.db.as_ref().unwrap().url, "postgres://localhost");
/// # container.destroy().await?;
/// # Ok(())
/// # }
/// ```
#[async_trait]
pub trait Injectable: Any + Send + Sync {
    /// Receives the validated configuration before `inject` and `init`.
    fn configure(&mut self, _config: &ValidatedConfig) -> DiResult<()> {
        Ok(())
    }

    /// Receives the resolved dependency references.
    fn inject(&mut self, _deps: &InjectionSet) -> DiResult<()> {
        Ok(())
    }

    /// Asynchronous initialization. May resolve further objects through the
    /// context; those resolutions participate in cycle detection.
    async fn init(&mut self, _ctx: &mut InitContext) -> DiResult<()> {
        Ok(())
    }

    /// Runs after the instance has reached `Ready` and is already shared,
    /// so resolutions triggered here may inject the instance back. A
    /// failure tears the instance down before the error propagates.
    async fn bootstrap(&self, _ctx: &mut InitContext) -> DiResult<()> {
        Ok(())
    }

    /// Releases whatever the instance acquired. Must be safe to call when
    /// `init` never completed; implementations release only what they
    /// actually hold.
    async fn destroy(&self) -> DiResult<()> {
        Ok(())
    }
}

/// Shared handle to a managed instance.
///
/// Carries the two erased views of the instance plus its status cell. The
/// handle is what caches, trackers, and teardown lists store; typed access
/// goes through [`downcast`](InstanceHandle::downcast).
#[derive(Clone)]
pub struct InstanceHandle {
    id: Identifier,
    definition: Arc<Definition>,
    object: Arc<dyn Injectable>,
    any: Arc<dyn Any + Send + Sync>,
    status: Arc<StatusCell>,
}

impl InstanceHandle {
    pub(crate) fn new(
        id: Identifier,
        definition: Arc<Definition>,
        object: Arc<dyn Injectable>,
        any: Arc<dyn Any + Send + Sync>,
        status: Arc<StatusCell>,
    ) -> Self {
        Self { id, definition, object, any, status }
    }

    /// The identifier this instance was resolved under.
    pub fn id(&self) -> &Identifier {
        &self.id
    }

    /// The definition this instance was built from.
    pub fn definition(&self) -> &Arc<Definition> {
        &self.definition
    }

    /// Current lifecycle status.
    pub fn status(&self) -> LifecycleStatus {
        self.status.get()
    }

    /// Typed view of the instance.
    pub fn downcast<T: Any + Send + Sync>(&self) -> DiResult<Arc<T>> {
        self.any
            .clone()
            .downcast::<T>()
            .map_err(|_| DiError::TypeMismatch(std::any::type_name::<T>()))
    }

    pub(crate) fn object(&self) -> &Arc<dyn Injectable> {
        &self.object
    }

    pub(crate) fn any(&self) -> &Arc<dyn Any + Send + Sync> {
        &self.any
    }

    pub(crate) fn status_cell(&self) -> &Arc<StatusCell> {
        &self.status
    }

    /// Thin pointer to the instance allocation, for identity bookkeeping.
    pub(crate) fn data_ptr(&self) -> *const () {
        Arc::as_ptr(&self.any) as *const ()
    }
}

impl fmt::Debug for InstanceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstanceHandle")
            .field("id", &self.id)
            .field("definition", &self.definition.name())
            .field("status", &self.status())
            .finish()
    }
}

/// Resolved dependencies handed to [`Injectable::inject`].
///
/// Entries appear in injection declaration order. Optional injections that
/// missed everywhere up the container chain are present but unresolved;
/// [`try_get`](InjectionSet::try_get) returns `None` for those.
pub struct InjectionSet {
    entries: Vec<(String, Option<InstanceHandle>)>,
}

impl InjectionSet {
    pub(crate) fn new() -> Self {
        Self { entries: Vec::new() }
    }

    pub(crate) fn insert(&mut self, property: String, handle: Option<InstanceHandle>) {
        self.entries.push((property, handle));
    }

    /// Typed access to a required dependency.
    pub fn get<T: Any + Send + Sync>(&self, property: &str) -> DiResult<Arc<T>> {
        match self.entries.iter().find(|(name, _)| name == property) {
            Some((_, Some(handle))) => handle.downcast(),
            _ => Err(DiError::Unresolved(Identifier::name(property))),
        }
    }

    /// Typed access to an optional dependency.
    pub fn try_get<T: Any + Send + Sync>(&self, property: &str) -> Option<Arc<T>> {
        self.get(property).ok()
    }

    /// The untyped handle for a resolved dependency.
    pub fn handle(&self, property: &str) -> Option<&InstanceHandle> {
        self.entries
            .iter()
            .find(|(name, _)| name == property)
            .and_then(|(_, handle)| handle.as_ref())
    }

    /// Whether the named dependency was resolved.
    pub fn is_resolved(&self, property: &str) -> bool {
        self.handle(property).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
