//! Index-stable registry for externally owned entries
//!
//! Dense slot vector plus a LIFO free stack of vacant indices, so
//! insert and remove are O(1) amortized and recently vacated slots are
//! reused first. The registry holds whatever reference type it is given
//! (typically an `Rc`); removing an entry only drops that reference.
//!
//! `len()` is maintained alongside the slots and always equals the number
//! of entries reachable through `iter()`.

use crate::error::{UniversalError, UniversalResult};
use crate::id::Handle;

struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

/// Slab of entries addressed by generation-checked handles
pub struct Registry<T> {
    slots: Vec<Slot<T>>,

    /// LIFO stack of vacant slot indices
    free_stack: Vec<u32>,

    /// Number of occupied slots
    len: usize,
}

impl<T> Registry<T> {
    pub const fn new() -> Self {
        Self {
            slots: Vec::new(),
            free_stack: Vec::new(),
            len: 0,
        }
    }

    /// Insert an entry, returning its handle.
    ///
    /// Fails with `AllocationFailed` if the slot vector cannot grow; the
    /// registry is unchanged in that case.
    pub fn insert(&mut self, value: T) -> UniversalResult<Handle> {
        if let Some(index) = self.free_stack.pop() {
            let slot = &mut self.slots[index as usize];
            debug_assert!(slot.value.is_none());
            slot.value = Some(value);
            self.len += 1;
            return Ok(Handle::new(index, slot.generation));
        }

        if self.slots.len() >= u32::MAX as usize {
            return Err(UniversalError::AllocationFailed("registry slot"));
        }
        self.slots
            .try_reserve(1)
            .map_err(|_| UniversalError::AllocationFailed("registry slot"))?;
        // Reserve the matching free-stack room now so remove() never allocates.
        self.free_stack
            .try_reserve(self.slots.len() + 1 - self.free_stack.len())
            .map_err(|_| UniversalError::AllocationFailed("registry free stack"))?;

        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            value: Some(value),
        });
        self.len += 1;
        Ok(Handle::new(index, 0))
    }

    /// Remove the entry behind `handle`.
    ///
    /// Unknown or stale handles return `None` and change nothing.
    pub fn remove(&mut self, handle: Handle) -> Option<T> {
        let slot = self.slots.get_mut(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        let value = slot.value.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free_stack.push(handle.index);
        self.len -= 1;
        Some(value)
    }

    pub fn get(&self, handle: Handle) -> Option<&T> {
        let slot = self.slots.get(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        slot.value.as_ref()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Occupied entries in slot order
    pub fn iter(&self) -> impl Iterator<Item = (Handle, &T)> + '_ {
        self.slots.iter().enumerate().filter_map(|(i, slot)| {
            slot.value
                .as_ref()
                .map(|v| (Handle::new(i as u32, slot.generation), v))
        })
    }
}

impl<T> Default for Registry<T> {
    fn default() -> Self {
        Self::new()
    }
}
