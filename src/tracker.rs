//! Weak tracking of transient instances.
//!
//! Transients are never cached, but the container still wants to know
//! about them: for live-instance counting, for reclaim callbacks, and so
//! container teardown can destroy transients that are still alive. The
//! tracker holds only weak references; it never keeps an instance alive.
//!
//! Rust has no garbage-collector finalizers, so reclamation is observed by
//! opportunistic pruning: every touch of the tracker (a new track, a
//! count, a drain) sweeps dead entries and fires the registered reclaim
//! callbacks. Counts are therefore approximate by contract, and reclaim
//! callbacks are bookkeeping only, never a substitute for an explicit
//! destroy.

use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::definition::{Definition, DefinitionId};
use crate::identifier::Identifier;
use crate::lifecycle::{Injectable, InstanceHandle, StatusCell};

type ReclaimCallback = Arc<dyn Fn() + Send + Sync>;

struct TrackedEntry {
    id: Identifier,
    definition: Arc<Definition>,
    object: Weak<dyn Injectable>,
    any: Weak<dyn Any + Send + Sync>,
    status: Arc<StatusCell>,
}

impl TrackedEntry {
    fn upgrade(&self) -> Option<InstanceHandle> {
        let object = self.object.upgrade()?;
        let any = self.any.upgrade()?;
        Some(InstanceHandle::new(
            self.id.clone(),
            self.definition.clone(),
            object,
            any,
            self.status.clone(),
        ))
    }
}

#[derive(Default)]
struct TrackerInner {
    entries: HashMap<DefinitionId, Vec<TrackedEntry>>,
    callbacks: HashMap<DefinitionId, Vec<ReclaimCallback>>,
}

/// Per-container weak tracker for transient instances.
pub struct WeakInstanceTracker {
    inner: Mutex<TrackerInner>,
}

impl WeakInstanceTracker {
    pub(crate) fn new() -> Self {
        Self {
            inner: Mutex::new(TrackerInner::default()),
        }
    }

    /// Records a non-owning reference to a freshly constructed transient.
    pub(crate) fn track(&self, handle: &InstanceHandle) {
        let fired = {
            let mut inner = self.inner.lock();
            let fired = Self::prune_locked(&mut inner);
            inner
                .entries
                .entry(handle.definition().id())
                .or_default()
                .push(TrackedEntry {
                    id: handle.id().clone(),
                    definition: handle.definition().clone(),
                    object: Arc::downgrade(handle.object()),
                    any: Arc::downgrade(handle.any()),
                    status: handle.status_cell().clone(),
                });
            fired
        };
        for callback in fired {
            callback();
        }
    }

    /// Approximate count of live tracked instances of `definition`.
    pub fn live_count(&self, definition: &Arc<Definition>) -> usize {
        let (count, fired) = {
            let mut inner = self.inner.lock();
            let fired = Self::prune_locked(&mut inner);
            let count = inner
                .entries
                .get(&definition.id())
                .map_or(0, |bucket| bucket.len());
            (count, fired)
        };
        for callback in fired {
            callback();
        }
        count
    }

    /// Registers a callback fired once per tracked instance of
    /// `definition` observed as reclaimed during pruning.
    pub fn on_reclaimed(&self, definition: &Arc<Definition>, callback: impl Fn() + Send + Sync + 'static) {
        self.inner
            .lock()
            .callbacks
            .entry(definition.id())
            .or_default()
            .push(Arc::new(callback));
    }

    /// Sweeps dead entries and fires reclaim callbacks.
    pub fn prune(&self) {
        let fired = {
            let mut inner = self.inner.lock();
            Self::prune_locked(&mut inner)
        };
        for callback in fired {
            callback();
        }
    }

    /// Takes every still-live tracked instance, for container teardown.
    pub(crate) fn drain_live(&self) -> Vec<InstanceHandle> {
        let mut live = Vec::new();
        let mut fired: Vec<ReclaimCallback> = Vec::new();
        {
            let mut inner = self.inner.lock();
            let drained: Vec<(DefinitionId, Vec<TrackedEntry>)> = inner.entries.drain().collect();
            for (definition, bucket) in drained {
                for entry in bucket {
                    match entry.upgrade() {
                        Some(handle) => live.push(handle),
                        None => {
                            if let Some(callbacks) = inner.callbacks.get(&definition) {
                                fired.extend(callbacks.iter().cloned());
                            }
                        }
                    }
                }
            }
        }
        for callback in fired {
            callback();
        }
        live
    }

    /// Finds the tracked instance backing the given allocation pointer.
    pub(crate) fn find(&self, ptr: *const ()) -> Option<InstanceHandle> {
        let inner = self.inner.lock();
        for bucket in inner.entries.values() {
            for entry in bucket {
                if let Some(handle) = entry.upgrade() {
                    if handle.data_ptr() == ptr {
                        return Some(handle);
                    }
                }
            }
        }
        None
    }

    fn prune_locked(inner: &mut TrackerInner) -> Vec<ReclaimCallback> {
        let mut fired = Vec::new();
        for (definition, bucket) in inner.entries.iter_mut() {
            let before = bucket.len();
            bucket.retain(|entry| entry.any.strong_count() > 0);
            let reclaimed = before - bucket.len();
            if reclaimed > 0 {
                if let Some(callbacks) = inner.callbacks.get(definition) {
                    for _ in 0..reclaimed {
                        fired.extend(callbacks.iter().cloned());
                    }
                }
            }
        }
        inner.entries.retain(|_, bucket| !bucket.is_empty());
        fired
    }
}
