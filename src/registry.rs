use std::any::{Any, TypeId};
use std::fmt;
use std::sync::{Arc, OnceLock};

use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;

use crate::key::SlotIndex;
use crate::local;
use crate::result::{Error, Result};

/// A registry guaranteeing exactly one live instance per registered type.
///
/// Each payload type `T` gets one slot; the first successful
/// [`get_or_create`](Registry::get_or_create) for `T` constructs the
/// instance and every later call returns a clone of the same `Arc<T>`.
/// Instances live as long as the registry; there is no eviction or
/// teardown.
///
/// All operations take `&self` and are safe to call from any number of
/// threads concurrently. Builders for distinct types never serialize
/// against each other: exclusivity is scoped to the slot under
/// construction, not the whole registry.
pub struct Registry {
    /// Map from the payload's `TypeId` to its slot. Write-locked only while
    /// inserting a slot for a type seen for the first time.
    slot_map: RwLock<FxHashMap<TypeId, SlotIndex>>,

    /// Slot storage. Append-only; slots are pushed only while the write
    /// lock on `slot_map` is held, and an allocated slot is never removed.
    slots: boxcar::Vec<Slot>,
}

/// Per-type storage: the single instance once built, and the lock that
/// serializes construction attempts for this type only.
struct Slot {
    type_name: &'static str,

    /// Publication point for the instance. Empty while the slot is empty or
    /// constructing; set exactly once, under `build_lock`, when
    /// construction succeeds. Readers on the fast path either see nothing
    /// or see the fully built instance.
    instance: OnceLock<Arc<dyn Any + Send + Sync>>,

    build_lock: Mutex<()>,
}

impl Slot {
    fn new(type_name: &'static str) -> Self {
        Self {
            type_name,
            instance: OnceLock::new(),
            build_lock: Mutex::new(()),
        }
    }
}

impl Registry {
    pub fn new() -> Self {
        Self {
            slot_map: Default::default(),
            slots: boxcar::Vec::new(),
        }
    }

    /// Returns the instance of `T` if one has already been constructed.
    ///
    /// This is the fast path on its own: it takes no exclusive lock, never
    /// constructs, and never waits on another caller's construction.
    /// Returns `None` while the slot for `T` is empty or still under
    /// construction.
    pub fn get<T>(&self) -> Option<Arc<T>>
    where
        T: Send + Sync + 'static,
    {
        let index = self.slot_map.read().get(&TypeId::of::<T>()).copied()?;
        let slot = &self.slots[index.as_usize()];
        let instance = slot.instance.get()?.clone();
        Some(assert_payload_type(instance, slot.type_name))
    }

    /// Returns the single instance of `T`, constructing it with `build` if
    /// no call has constructed it yet.
    ///
    /// Repeated calls for the same `T` return the identical instance
    /// ([`Arc::ptr_eq`] holds between the results), no matter how many
    /// callers race on a fresh type; the builder runs at most once per
    /// successful construction. Distinct types never share an instance.
    ///
    /// Fails with a recursive-construction error if `build` (directly or
    /// through other builders it triggers) requests `T` again on the same
    /// thread. Builders that form a cycle *across* threads are not detected
    /// and deadlock; such builder graphs are a forbidden usage pattern.
    pub fn get_or_create<T>(&self, build: impl FnOnce() -> T) -> Result<Arc<T>>
    where
        T: Send + Sync + 'static,
    {
        self.get_or_try_create(|| Ok::<T, std::convert::Infallible>(build()))
    }

    /// Like [`get_or_create`](Registry::get_or_create), for builders that
    /// can fail.
    ///
    /// If `build` fails while holding the construction lock, the error is
    /// returned as a construction-failed error carrying the cause, and the
    /// slot stays empty: the failure is not cached, and the next call for
    /// `T` (including one already blocked on the lock) retries construction
    /// from scratch.
    ///
    /// A caller that loses the construction race never runs its builder at
    /// all; its closure is dropped unused. Side effects a builder performs
    /// before the registry accepts its result are the caller's
    /// responsibility to keep idempotent.
    pub fn get_or_try_create<T, E>(
        &self,
        build: impl FnOnce() -> std::result::Result<T, E>,
    ) -> Result<Arc<T>>
    where
        T: Send + Sync + 'static,
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        // Fast path: the overwhelmingly common case is that the instance
        // already exists.
        if let Some(instance) = self.get::<T>() {
            return Ok(instance);
        }

        self.get_or_create_slow(build)
    }

    #[cold]
    #[inline(never)]
    fn get_or_create_slow<T, E>(
        &self,
        build: impl FnOnce() -> std::result::Result<T, E>,
    ) -> Result<Arc<T>>
    where
        T: Send + Sync + 'static,
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        let type_id = TypeId::of::<T>();
        let type_name = std::any::type_name::<T>();
        let slot = self.slot(type_id, type_name);

        // A builder re-entering its own construction would block forever on
        // `build_lock` below; check before blocking.
        if let Some(cycle) = local::find_cycle(type_id) {
            return Err(Error::recursive_construction(cycle));
        }

        let _exclusive = slot.build_lock.lock();

        // Another caller may have finished construction while we raced to
        // the slow path or waited on the lock.
        if let Some(instance) = slot.instance.get() {
            crate::tracing::trace!("reusing existing instance of `{}`", type_name);
            return Ok(assert_payload_type(instance.clone(), type_name));
        }

        let in_progress = local::begin_construction(type_id, type_name);
        let outcome = build();
        drop(in_progress);

        match outcome {
            Ok(instance) => {
                let instance = Arc::new(instance);
                let shared: Arc<dyn Any + Send + Sync> = instance.clone();
                // The slot is still empty: we hold `build_lock` and
                // re-checked after acquiring it.
                let prev = slot.instance.set(shared);
                debug_assert!(prev.is_ok());
                crate::tracing::debug!("created new instance of `{}`", type_name);
                Ok(instance)
            }
            Err(source) => {
                crate::tracing::debug!(
                    "construction of `{}` failed, leaving the slot empty",
                    type_name
                );
                Err(Error::construction_failed(type_name, source.into()))
            }
        }
    }

    /// Returns the slot for `type_id`, allocating it on first sight of the
    /// type.
    fn slot(&self, type_id: TypeId, type_name: &'static str) -> &Slot {
        if let Some(index) = self.slot_map.read().get(&type_id).copied() {
            return &self.slots[index.as_usize()];
        }

        let mut slot_map = self.slot_map.write();
        let index = *slot_map
            .entry(type_id)
            .or_insert_with(|| SlotIndex::from(self.slots.push(Slot::new(type_name))));
        &self.slots[index.as_usize()]
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (_, slot) in self.slots.iter() {
            let state = if slot.instance.get().is_some() {
                "ready"
            } else {
                "empty"
            };
            map.entry(&slot.type_name, &state);
        }
        map.finish()
    }
}

/// Downcasts a slot's payload back to the type it was keyed under.
///
/// # Panics
///
/// If the slot holds some other type, which would mean the slot map and the
/// slot storage disagree.
fn assert_payload_type<T: Send + Sync + 'static>(
    instance: Arc<dyn Any + Send + Sync>,
    type_name: &'static str,
) -> Arc<T> {
    match instance.downcast::<T>() {
        Ok(instance) => instance,
        Err(_) => panic!(
            "slot for `{type_name}` does not hold a `{}`",
            std::any::type_name::<T>()
        ),
    }
}
