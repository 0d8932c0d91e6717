//! Diagnostic observers for container resolution and teardown events.
//!
//! The container itself performs no logging; observers are the hook point
//! for tracing, metrics, and the reporting channel for suppressed cleanup
//! errors. Observer calls are made synchronously; keep implementations
//! lightweight.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;

use crate::error::DiError;
use crate::identifier::Identifier;

/// Observer of container resolution and teardown events.
///
/// `resolving`/`resolved` fire around actual constructions, not cache
/// hits. `cleanup_failed` reports secondary errors that were suppressed in
/// favor of an original error (a failing destroy during
/// cleanup-on-failure, a teardown hook error during container destroy).
///
/// # Examples
///
/// ```
/// use keystone_di::{Container, ContainerObserver, Identifier};
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// struct TimingObserver;
///
/// impl ContainerObserver for TimingObserver {
///     fn resolving(&self, id: &Identifier) {
///         println!("building {}", id);
///     }
///
///     fn resolved(&self, id: &Identifier, duration: Duration) {
///         println!("built {} in {:?}", id, duration);
///     }
/// }
///
/// let container = Container::new();
/// container.add_observer(Arc::new(TimingObserver));
/// ```
pub trait ContainerObserver: Send + Sync {
    /// Construction of `id` is starting.
    fn resolving(&self, id: &Identifier);

    /// Construction of `id` completed.
    fn resolved(&self, id: &Identifier, duration: Duration);

    /// Construction of `id` failed with `error`.
    fn resolution_failed(&self, _id: &Identifier, _error: &DiError) {}

    /// A cached instance of `id` was destroyed.
    fn destroyed(&self, _id: &Identifier) {}

    /// A cleanup step for `id` failed; the error was suppressed in favor
    /// of the operation's primary outcome.
    fn cleanup_failed(&self, _id: &Identifier, _error: &DiError) {}
}

/// Fan-out over the registered observers with a cheap no-observer path.
pub(crate) struct Observers {
    observers: RwLock<Vec<Arc<dyn ContainerObserver>>>,
}

impl Observers {
    pub(crate) fn new() -> Self {
        Self {
            observers: RwLock::new(Vec::new()),
        }
    }

    pub(crate) fn add(&self, observer: Arc<dyn ContainerObserver>) {
        self.observers.write().push(observer);
    }

    /// Copy of the current observer list, for child containers.
    pub(crate) fn snapshot(&self) -> Observers {
        Observers {
            observers: RwLock::new(self.observers.read().clone()),
        }
    }

    #[inline]
    pub(crate) fn has_observers(&self) -> bool {
        !self.observers.read().is_empty()
    }

    pub(crate) fn resolving(&self, id: &Identifier) {
        for observer in self.observers.read().iter() {
            observer.resolving(id);
        }
    }

    pub(crate) fn resolved(&self, id: &Identifier, duration: Duration) {
        for observer in self.observers.read().iter() {
            observer.resolved(id, duration);
        }
    }

    pub(crate) fn resolution_failed(&self, id: &Identifier, error: &DiError) {
        for observer in self.observers.read().iter() {
            observer.resolution_failed(id, error);
        }
    }

    pub(crate) fn destroyed(&self, id: &Identifier) {
        for observer in self.observers.read().iter() {
            observer.destroyed(id);
        }
    }

    pub(crate) fn cleanup_failed(&self, id: &Identifier, error: &DiError) {
        for observer in self.observers.read().iter() {
            observer.cleanup_failed(id, error);
        }
    }
}

/// Built-in observer that logs events to the console.
///
/// Useful during development; production code should implement
/// [`ContainerObserver`] against its own logging infrastructure.
pub struct LoggingObserver {
    prefix: String,
}

impl LoggingObserver {
    /// Observer with the default prefix.
    pub fn new() -> Self {
        Self {
            prefix: "[keystone-di]".to_string(),
        }
    }

    /// Observer with a custom prefix.
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }
}

impl Default for LoggingObserver {
    fn default() -> Self {
        Self::new()
    }
}

impl ContainerObserver for LoggingObserver {
    fn resolving(&self, id: &Identifier) {
        println!("{} Resolving: {}", self.prefix, id);
    }

    fn resolved(&self, id: &Identifier, duration: Duration) {
        println!("{} Resolved: {} in {:?}", self.prefix, id, duration);
    }

    fn resolution_failed(&self, id: &Identifier, error: &DiError) {
        eprintln!("{} FAILED resolving {}: {}", self.prefix, id, error);
    }

    fn destroyed(&self, id: &Identifier) {
        println!("{} Destroyed: {}", self.prefix, id);
    }

    fn cleanup_failed(&self, id: &Identifier, error: &DiError) {
        eprintln!("{} CLEANUP FAILED for {}: {}", self.prefix, id, error);
    }
}
