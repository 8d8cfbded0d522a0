//! Object pool management
//!
//! An [`ObjectPool`] hands out fixed-type objects and recycles them. Slots are
//! reused after release, so callers hold a [`PoolHandle`] rather than a
//! reference: every release bumps the slot's generation, which turns a stale
//! handle into a lookup miss instead of a use-after-free.
//!
//! Releasing an object runs its [`Destruct`] hook exactly once before the slot
//! returns to the free list. The hook receives an environment chosen by the
//! caller, so objects can tear down state that lives outside the pool.

use alloc::vec::Vec;

use nos_api::{Error, Result};

/// Teardown hook run when an object is released to its pool
pub trait Destruct<E: ?Sized> {
    /// Release every resource the object holds outside the pool
    fn destruct(&mut self, env: &mut E);
}

/// Handle to a live pool object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PoolHandle {
    index: u32,
    generation: u32,
}

impl PoolHandle {
    /// Slot index inside the pool
    pub fn index(&self) -> usize {
        self.index as usize
    }
}

/// Object pool statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Objects currently handed out
    pub live: usize,
    /// Released slots waiting for reuse
    pub free: usize,
    /// Successful acquisitions since creation
    pub acquired: u64,
    /// Releases since creation
    pub released: u64,
    /// Acquisitions refused for lack of memory
    pub failed: u64,
}

struct Slot<T> {
    object: T,
    generation: u32,
    live: bool,
}

/// A pool of `T` objects with generation-checked handles
pub struct ObjectPool<T> {
    name: &'static str,
    slots: Vec<Slot<T>>,
    free_list: Vec<u32>,
    max_objects: usize,
    stats: PoolStats,
}

impl<T: Default> ObjectPool<T> {
    /// Create an empty pool that never holds more than `max_objects` slots
    pub fn new(name: &'static str, max_objects: usize) -> Self {
        Self {
            name,
            slots: Vec::new(),
            free_list: Vec::new(),
            max_objects: max_objects.min(u32::MAX as usize),
            stats: PoolStats::default(),
        }
    }

    /// Take an object from the pool
    ///
    /// A recycled object keeps whatever its destruct hook left behind unless
    /// `zero` is set, in which case it is reset to `T::default()`.
    pub fn acquire(&mut self, zero: bool) -> Result<PoolHandle> {
        if let Some(index) = self.free_list.pop() {
            let slot = &mut self.slots[index as usize];
            if zero {
                slot.object = T::default();
            }
            slot.live = true;
            let generation = slot.generation;
            self.stats.free -= 1;
            return Ok(self.handed_out(index, generation));
        }

        let index = self.grow(T::default())?;
        Ok(self.handed_out(index, 0))
    }

    /// Move an already-built object into the pool
    ///
    /// Used for objects created before the pool existed; they are released
    /// like any other object afterwards.
    pub fn insert(&mut self, object: T) -> Result<PoolHandle> {
        if let Some(index) = self.free_list.pop() {
            let slot = &mut self.slots[index as usize];
            slot.object = object;
            slot.live = true;
            let generation = slot.generation;
            self.stats.free -= 1;
            return Ok(self.handed_out(index, generation));
        }

        let index = self.grow(object)?;
        Ok(self.handed_out(index, 0))
    }

    fn grow(&mut self, object: T) -> Result<u32> {
        if self.slots.len() >= self.max_objects {
            self.stats.failed += 1;
            mm_debug!("{}: pool limit {} reached", self.name, self.max_objects);
            return Err(Error::OutOfMemory);
        }
        // Reserve the free-list entry now so release never allocates
        let free_room = self.slots.len() + 1 - self.free_list.len();
        if self.slots.try_reserve(1).is_err() || self.free_list.try_reserve(free_room).is_err() {
            self.stats.failed += 1;
            return Err(Error::OutOfMemory);
        }
        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            object,
            generation: 0,
            live: true,
        });
        Ok(index)
    }

    fn handed_out(&mut self, index: u32, generation: u32) -> PoolHandle {
        self.stats.live += 1;
        self.stats.acquired += 1;
        PoolHandle { index, generation }
    }
}

impl<T> ObjectPool<T> {
    /// Return an object to the pool, running its destruct hook first
    ///
    /// Fails with `InvalidArgument` for a stale or foreign handle; the hook
    /// does not run in that case.
    pub fn release<E: ?Sized>(&mut self, handle: PoolHandle, env: &mut E) -> Result<()>
    where
        T: Destruct<E>,
    {
        let slot = self
            .live_slot_mut(handle)
            .ok_or(Error::InvalidArgument("stale pool handle"))?;
        slot.object.destruct(env);
        slot.live = false;
        slot.generation = slot.generation.wrapping_add(1);

        self.free_list.push(handle.index);
        self.stats.live -= 1;
        self.stats.free += 1;
        self.stats.released += 1;
        Ok(())
    }

    /// Shared access to a live object
    pub fn get(&self, handle: PoolHandle) -> Option<&T> {
        self.slots
            .get(handle.index())
            .filter(|slot| slot.live && slot.generation == handle.generation)
            .map(|slot| &slot.object)
    }

    /// Exclusive access to a live object
    pub fn get_mut(&mut self, handle: PoolHandle) -> Option<&mut T> {
        self.live_slot_mut(handle).map(|slot| &mut slot.object)
    }

    /// True if `handle` refers to a live object
    pub fn contains(&self, handle: PoolHandle) -> bool {
        self.get(handle).is_some()
    }

    /// Pool name, used in log messages
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Objects currently handed out
    pub fn len(&self) -> usize {
        self.stats.live
    }

    /// True if no object is handed out
    pub fn is_empty(&self) -> bool {
        self.stats.live == 0
    }

    /// Get pool statistics
    pub fn stats(&self) -> PoolStats {
        self.stats
    }

    fn live_slot_mut(&mut self, handle: PoolHandle) -> Option<&mut Slot<T>> {
        self.slots
            .get_mut(handle.index())
            .filter(|slot| slot.live && slot.generation == handle.generation)
    }
}
