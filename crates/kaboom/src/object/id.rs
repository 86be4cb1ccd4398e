//! # ObjId — Generational Handles for Game Objects
//!
//! Game code keeps [`ObjId`]s around freely (a bullet remembers who fired it,
//! the camera follows the player). Objects, however, are destroyed all the
//! time, and their arena slots are reused. Each handle therefore pairs a slot
//! index with a **generation** that is bumped whenever the slot is freed:
//!
//! ```text
//! ObjId { index: 5, generation: 0 }  ← original bean
//! ObjId { index: 5, generation: 1 }  ← a coin that reused the slot
//! ```
//!
//! A stale handle still says `generation: 0`, so every lookup through it
//! misses instead of touching the coin.

use std::fmt;

#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjId {
    pub(crate) index: u32,
    pub(crate) generation: u32,
}

impl ObjId {
    pub fn index(self) -> u32 {
        self.index
    }

    pub fn generation(self) -> u32 {
        self.generation
    }
}

impl fmt::Debug for ObjId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Obj({}v{})", self.index, self.generation)
    }
}

impl fmt::Display for ObjId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.index, self.generation)
    }
}

/// Slot allocator for the scene arena.
///
/// ```text
/// generations: [0, 1, 0, 2, 0]   ← one generation per slot ever allocated
/// free_list:   [1, 3]            ← slots available for reuse
/// ```
pub(crate) struct IdAllocator {
    generations: Vec<u32>,
    free_list: Vec<u32>,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self {
            generations: Vec::new(),
            free_list: Vec::new(),
        }
    }

    pub fn allocate(&mut self) -> ObjId {
        if let Some(index) = self.free_list.pop() {
            let generation = self.generations[index as usize];
            ObjId { index, generation }
        } else {
            let index = self.generations.len() as u32;
            self.generations.push(0);
            ObjId { index, generation: 0 }
        }
    }

    /// Free a slot. Returns `false` for a stale handle.
    pub fn deallocate(&mut self, id: ObjId) -> bool {
        if !self.is_live(id) {
            return false;
        }
        self.generations[id.index as usize] += 1;
        self.free_list.push(id.index);
        true
    }

    pub fn is_live(&self, id: ObjId) -> bool {
        self.generations.get(id.index as usize) == Some(&id.generation)
    }

    pub fn live_count(&self) -> usize {
        self.generations.len() - self.free_list.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocates_sequentially() {
        let mut ids = IdAllocator::new();
        let a = ids.allocate();
        let b = ids.allocate();
        assert_eq!((a.index, b.index), (0, 1));
        assert_eq!(ids.live_count(), 2);
    }

    #[test]
    fn reuse_bumps_generation() {
        let mut ids = IdAllocator::new();
        let a = ids.allocate();
        assert!(ids.deallocate(a));
        let b = ids.allocate();
        assert_eq!(b.index, a.index);
        assert_eq!(b.generation, 1);
        assert!(!ids.is_live(a));
        assert!(ids.is_live(b));
    }

    #[test]
    fn double_free_is_rejected() {
        let mut ids = IdAllocator::new();
        let a = ids.allocate();
        assert!(ids.deallocate(a));
        assert!(!ids.deallocate(a));
        assert_eq!(ids.live_count(), 0);
    }
}
