//! NodeArena: generation-tagged slots over a `Vector`, with a free list.
//!
//! Storage is drawn from the arena's allocator, so chain nodes of a map
//! show up in the same allocation traffic as its bucket array. A freed
//! slot is reused by the next insert; its generation is bumped so a key
//! to the old occupant no longer resolves.

use crate::alloc::Allocator;
use crate::vector::Vector;
use core::mem;
use core::ops::{Index, IndexMut};

/// Stable handle to an occupied slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) struct NodeKey {
    idx: u32,
    generation: u32,
}

#[derive(Clone, Debug)]
enum Slot<T> {
    Occupied { generation: u32, value: T },
    Vacant { generation: u32, next_free: Option<u32> },
}

impl<T> Slot<T> {
    fn get(&self, generation: u32) -> Option<&T> {
        match self {
            Slot::Occupied { generation: g, value } if *g == generation => Some(value),
            _ => None,
        }
    }

    fn get_mut(&mut self, generation: u32) -> Option<&mut T> {
        match self {
            Slot::Occupied { generation: g, value } if *g == generation => Some(value),
            _ => None,
        }
    }
}

#[derive(Clone)]
pub(crate) struct NodeArena<T, A: Allocator> {
    slots: Vector<Slot<T>, A>,
    free_top: Option<u32>,
}

impl<T, A: Allocator> NodeArena<T, A> {
    /// Empty arena; nothing is allocated until the first insert.
    pub(crate) fn new_in(alloc: A) -> Self {
        Self {
            slots: Vector::with_capacity_in(0, alloc),
            free_top: None,
        }
    }

    /// Occupied slots, by a full scan.
    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.values().count()
    }

    pub(crate) fn insert(&mut self, value: T) -> NodeKey {
        if let Some(idx) = self.free_top {
            let slot = &mut self.slots[idx as usize];
            let (generation, next_free) = match *slot {
                Slot::Vacant { generation, next_free } => (generation, next_free),
                Slot::Occupied { .. } => unreachable!("free list points at an occupied slot"),
            };
            *slot = Slot::Occupied { generation, value };
            self.free_top = next_free;
            return NodeKey { idx, generation };
        }
        let idx = u32::try_from(self.slots.len()).unwrap_or_else(|_| panic!("node arena is full"));
        self.slots.push_back(Slot::Occupied {
            generation: 0,
            value,
        });
        NodeKey { idx, generation: 0 }
    }

    /// Take the value out of `key`'s slot and push the slot onto the free
    /// list. `None` for a stale or vacant key.
    pub(crate) fn remove(&mut self, key: NodeKey) -> Option<T> {
        let slot = self.slots.get_mut(key.idx as usize)?;
        slot.get(key.generation)?;
        let vacant = Slot::Vacant {
            generation: key.generation.wrapping_add(1),
            next_free: self.free_top,
        };
        let Slot::Occupied { value, .. } = mem::replace(slot, vacant) else {
            return None;
        };
        self.free_top = Some(key.idx);
        Some(value)
    }

    pub(crate) fn get(&self, key: NodeKey) -> Option<&T> {
        self.slots.get(key.idx as usize)?.get(key.generation)
    }

    /// Drop every value. The slot buffer is kept for reuse.
    pub(crate) fn clear(&mut self) {
        self.slots.clear();
        self.free_top = None;
    }

    /// Remove every value, last slot first. The arena is empty afterwards.
    pub(crate) fn drain(&mut self) -> impl Iterator<Item = T> + '_ {
        self.free_top = None;
        core::iter::from_fn(move || loop {
            match self.slots.pop()? {
                Slot::Occupied { value, .. } => return Some(value),
                Slot::Vacant { .. } => continue,
            }
        })
    }

    pub(crate) fn values(&self) -> impl Iterator<Item = &T> {
        self.slots.iter().filter_map(|s| match s {
            Slot::Occupied { value, .. } => Some(value),
            Slot::Vacant { .. } => None,
        })
    }

    pub(crate) fn values_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.slots.iter_mut().filter_map(|s| match s {
            Slot::Occupied { value, .. } => Some(value),
            Slot::Vacant { .. } => None,
        })
    }
}

impl<T, A: Allocator> Index<NodeKey> for NodeArena<T, A> {
    type Output = T;

    fn index(&self, key: NodeKey) -> &T {
        self.get(key).expect("stale node key")
    }
}

impl<T, A: Allocator> IndexMut<NodeKey> for NodeArena<T, A> {
    fn index_mut(&mut self, key: NodeKey) -> &mut T {
        self.slots
            .get_mut(key.idx as usize)
            .and_then(|s| s.get_mut(key.generation))
            .expect("stale node key")
    }
}
