//! Typed columnar component pools.
//!
//! A pool stores every value of one component type owned by one archetype.
//! Storage is organized as fixed-size blocks with a parallel occupancy
//! bitmap and a free list of released slots:
//!
//! - appends prefer free-list reuse, keeping slot indices dense,
//! - blocks are heap-allocated and never move, so interior pointers stay
//!   valid until the slot itself is deleted or the pool compacts,
//! - compaction renumbers surviving slots in ascending order and reports the
//!   old-to-new mapping so entity bookkeeping can follow.
//!
//! ## Invariants
//!
//! - A slot index is live iff its occupancy bit is set.
//! - `free_slots` only contains dead slots below the high-water mark.
//! - Every pool of one archetype has the same set of live slots, which is
//!   what makes the per-archetype slot index meaningful.
//!
//! ## Unsafe code
//!
//! Values live in `MaybeUninit` cells guarded by the occupancy bitmap; all
//! reads and drops check the bitmap first. Cells are wrapped in `UnsafeCell`
//! because the view machinery hands out mutable component borrows reached
//! through a shared archetype reference. Exclusivity of those borrows is
//! guaranteed by the `&mut Storage` threading on the public API.

use std::any::{type_name, Any};
use std::cell::UnsafeCell;
use std::mem::MaybeUninit;
use std::ptr::NonNull;

use crate::engine::component::Component;
use crate::engine::types::{SlotIndex, BLOCK_CAP};

/// One fixed-capacity storage block.
type Block<T> = Box<[UnsafeCell<MaybeUninit<T>>; BLOCK_CAP]>;

/// Type-erased interface over a [`BlockPool`].
///
/// Object safety is what lets an archetype hold one pool per component type
/// behind a uniform interface; typed access goes through `as_any` downcasts.
pub(crate) trait ComponentPool: Any + Send {
    /// Writes a value into a recycled or fresh slot and returns it.
    ///
    /// Panics if the erased value is not of the pool's element type; callers
    /// resolve pools by `TypeId` so a mismatch is an internal invariant
    /// violation.
    fn append(&mut self, value: Box<dyn Any + Send>) -> SlotIndex;

    /// Moves the value out of a slot, releasing it. Returns `None` if the
    /// slot is vacant.
    fn take(&mut self, slot: SlotIndex) -> Option<Box<dyn Any + Send>>;

    /// Overwrites the value in an occupied slot.
    fn replace(&mut self, slot: SlotIndex, value: Box<dyn Any + Send>);

    /// Drops the value in a slot and releases it. Vacant slots are ignored.
    fn delete(&mut self, slot: SlotIndex);

    /// Returns the occupancy bit for a slot.
    fn has(&self, slot: SlotIndex) -> bool;

    /// Number of live values.
    fn len(&self) -> usize;

    /// Renumbers live slots densely, returning `(old, new)` pairs in
    /// ascending slot order. The free list is cleared and block storage
    /// shrinks to the minimum needed for the survivors.
    fn compact(&mut self) -> Vec<(SlotIndex, SlotIndex)>;

    /// Iterates live slot indices in ascending order.
    fn slots(&self) -> Box<dyn Iterator<Item = SlotIndex> + '_>;

    /// Upcast for typed downcasting.
    fn as_any(&self) -> &dyn Any;

    /// Mutable upcast for typed downcasting.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Block-allocated storage for values of a single component type.
pub(crate) struct BlockPool<T> {
    blocks: Vec<Block<T>>,
    /// Occupancy bitmap, one word per block.
    filled: Vec<u64>,
    free_slots: Vec<SlotIndex>,
    /// High-water mark: all slots at or above it have never been used.
    next_slot: SlotIndex,
    live: usize,
}

impl<T: Component> BlockPool<T> {
    pub(crate) fn new() -> Self {
        Self {
            blocks: Vec::new(),
            filled: Vec::new(),
            free_slots: Vec::new(),
            next_slot: 0,
            live: 0,
        }
    }

    #[inline]
    fn is_set(&self, slot: SlotIndex) -> bool {
        let word = (slot as usize) / BLOCK_CAP;
        let bit = (slot as usize) % BLOCK_CAP;
        word < self.filled.len() && (self.filled[word] >> bit) & 1 == 1
    }

    #[inline]
    fn set_bit(&mut self, slot: SlotIndex) {
        let word = (slot as usize) / BLOCK_CAP;
        let bit = (slot as usize) % BLOCK_CAP;
        self.filled[word] |= 1u64 << bit;
    }

    #[inline]
    fn clear_bit(&mut self, slot: SlotIndex) {
        let word = (slot as usize) / BLOCK_CAP;
        let bit = (slot as usize) % BLOCK_CAP;
        self.filled[word] &= !(1u64 << bit);
    }

    fn ensure_block(&mut self, slot: SlotIndex) {
        let block = (slot as usize) / BLOCK_CAP;
        while self.blocks.len() <= block {
            self.blocks
                .push(Box::new(std::array::from_fn(|_| {
                    UnsafeCell::new(MaybeUninit::uninit())
                })));
            self.filled.push(0);
        }
    }

    /// Raw pointer to a slot's cell. The slot must be within allocated
    /// blocks; occupancy is the caller's concern.
    #[inline]
    fn cell_ptr(&self, slot: SlotIndex) -> *mut T {
        let block = (slot as usize) / BLOCK_CAP;
        let index = (slot as usize) % BLOCK_CAP;
        self.blocks[block][index].get().cast::<T>()
    }

    /// Writes a value into the next slot, reusing the free list when
    /// possible.
    pub(crate) fn push(&mut self, value: T) -> SlotIndex {
        let slot = match self.free_slots.pop() {
            Some(slot) => slot,
            None => {
                let slot = self.next_slot;
                self.next_slot += 1;
                self.ensure_block(slot);
                slot
            }
        };

        unsafe {
            self.cell_ptr(slot).write(value);
        }
        self.set_bit(slot);
        self.live += 1;
        slot
    }

    /// Shared reference to the value in an occupied slot.
    pub(crate) fn get(&self, slot: SlotIndex) -> Option<&T> {
        if !self.is_set(slot) {
            return None;
        }
        Some(unsafe { &*self.cell_ptr(slot) })
    }

    /// Exclusive reference to the value in an occupied slot.
    pub(crate) fn get_mut(&mut self, slot: SlotIndex) -> Option<&mut T> {
        if !self.is_set(slot) {
            return None;
        }
        Some(unsafe { &mut *self.cell_ptr(slot) })
    }

    /// Interior pointer to the value in an occupied slot.
    ///
    /// Writing through the pointer is only sound while the caller holds
    /// exclusive access to the owning storage; the view iterators uphold
    /// this by consuming `&mut Storage`.
    pub(crate) fn slot_ptr(&self, slot: SlotIndex) -> Option<NonNull<T>> {
        if !self.is_set(slot) {
            return None;
        }
        NonNull::new(self.cell_ptr(slot))
    }
}

impl<T: Component> ComponentPool for BlockPool<T> {
    fn append(&mut self, value: Box<dyn Any + Send>) -> SlotIndex {
        match value.downcast::<T>() {
            Ok(value) => self.push(*value),
            Err(_) => panic!(
                "component value does not match pool element type {}",
                type_name::<T>()
            ),
        }
    }

    fn take(&mut self, slot: SlotIndex) -> Option<Box<dyn Any + Send>> {
        if !self.is_set(slot) {
            return None;
        }
        let value = unsafe { self.cell_ptr(slot).read() };
        self.clear_bit(slot);
        self.free_slots.push(slot);
        self.live -= 1;
        Some(Box::new(value))
    }

    fn replace(&mut self, slot: SlotIndex, value: Box<dyn Any + Send>) {
        assert!(
            self.is_set(slot),
            "replace on vacant slot {slot} of pool {}",
            type_name::<T>()
        );
        match value.downcast::<T>() {
            Ok(value) => unsafe {
                std::ptr::drop_in_place(self.cell_ptr(slot));
                self.cell_ptr(slot).write(*value);
            },
            Err(_) => panic!(
                "component value does not match pool element type {}",
                type_name::<T>()
            ),
        }
    }

    fn delete(&mut self, slot: SlotIndex) {
        if !self.is_set(slot) {
            return;
        }
        unsafe {
            std::ptr::drop_in_place(self.cell_ptr(slot));
        }
        self.clear_bit(slot);
        self.free_slots.push(slot);
        self.live -= 1;
    }

    fn has(&self, slot: SlotIndex) -> bool {
        self.is_set(slot)
    }

    fn len(&self) -> usize {
        self.live
    }

    fn compact(&mut self) -> Vec<(SlotIndex, SlotIndex)> {
        let mut mapping = Vec::with_capacity(self.live);
        let mut write: SlotIndex = 0;

        for read in 0..self.next_slot {
            if !self.is_set(read) {
                continue;
            }
            if read != write {
                unsafe {
                    let value = self.cell_ptr(read).read();
                    self.cell_ptr(write).write(value);
                }
            }
            mapping.push((read, write));
            write += 1;
        }

        let blocks_needed =
            (write as usize) / BLOCK_CAP + usize::from((write as usize) % BLOCK_CAP != 0);
        self.blocks.truncate(blocks_needed);
        self.filled.truncate(blocks_needed);
        for (index, word) in self.filled.iter_mut().enumerate() {
            let occupied = (write as usize) - index * BLOCK_CAP;
            *word = if occupied >= BLOCK_CAP {
                u64::MAX
            } else {
                (1u64 << occupied) - 1
            };
        }

        self.free_slots.clear();
        self.next_slot = write;
        mapping
    }

    fn slots(&self) -> Box<dyn Iterator<Item = SlotIndex> + '_> {
        Box::new((0..self.next_slot).filter(move |&slot| self.is_set(slot)))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl<T> Drop for BlockPool<T> {
    fn drop(&mut self) {
        for slot in 0..self.next_slot {
            let word = (slot as usize) / BLOCK_CAP;
            let bit = (slot as usize) % BLOCK_CAP;
            if (self.filled[word] >> bit) & 1 == 1 {
                let block = (slot as usize) / BLOCK_CAP;
                let index = (slot as usize) % BLOCK_CAP;
                unsafe {
                    std::ptr::drop_in_place(self.blocks[block][index].get().cast::<T>());
                }
            }
        }
    }
}
