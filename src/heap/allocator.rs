//! Generational arena for reference-counted cells
//!
//! Every heap value (object, array) lives in a cell addressed by a
//! [`Handle`]: an index plus the generation the cell had when the value was
//! allocated. Freeing a cell bumps its generation, so stale handles are
//! detected instead of aliasing a newer value. Cells are never moved.
//!
//! ```text
//!   cells: [ gen=3 rc=1 T ][ gen=1 free ][ gen=0 rc=2 T ] ...
//!   free:  [ 1 ]
//! ```

use log::debug;

/// Reference to a cell in an [`Arena`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle {
    index: u32,
    generation: u32,
}

impl Handle {
    /// Cell index
    #[inline]
    pub fn index(self) -> u32 {
        self.index
    }

    /// Generation the cell had at allocation time
    #[inline]
    pub fn generation(self) -> u32 {
        self.generation
    }
}

/// One arena slot
#[derive(Debug)]
struct Cell<T> {
    generation: u32,
    refcount: u32,
    value: Option<T>,
}

/// Allocation statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AllocStats {
    /// Currently live cells
    pub live: usize,
    /// Highest number of simultaneously live cells
    pub peak: usize,
    /// Total successful allocations
    pub allocations: u64,
    /// Total cells freed
    pub frees: u64,
    /// Allocation attempts refused because the limit was reached
    pub oom_count: u64,
}

/// Reference-counted arena
#[derive(Debug)]
pub struct Arena<T> {
    cells: Vec<Cell<T>>,
    free: Vec<u32>,
    /// Maximum number of live cells (None = unbounded)
    limit: Option<usize>,
    stats: AllocStats,
}

impl<T> Arena<T> {
    /// Create an unbounded arena
    pub fn new() -> Self {
        Arena {
            cells: Vec::new(),
            free: Vec::new(),
            limit: None,
            stats: AllocStats::default(),
        }
    }

    /// Create an arena that refuses allocations beyond `limit` live cells
    pub fn with_limit(limit: Option<usize>) -> Self {
        Arena {
            limit,
            ..Self::new()
        }
    }

    /// Allocate a cell holding `value` with refcount 1
    ///
    /// Returns None when the live-cell limit is reached.
    pub fn alloc(&mut self, value: T) -> Option<Handle> {
        if let Some(limit) = self.limit {
            if self.stats.live >= limit {
                self.stats.oom_count += 1;
                debug!("arena exhausted at {} live cells", self.stats.live);
                return None;
            }
        }

        let handle = if let Some(index) = self.free.pop() {
            let cell = &mut self.cells[index as usize];
            cell.refcount = 1;
            cell.value = Some(value);
            Handle {
                index,
                generation: cell.generation,
            }
        } else {
            let index = u32::try_from(self.cells.len()).ok()?;
            self.cells.push(Cell {
                generation: 0,
                refcount: 1,
                value: Some(value),
            });
            Handle {
                index,
                generation: 0,
            }
        };

        self.stats.live += 1;
        self.stats.peak = self.stats.peak.max(self.stats.live);
        self.stats.allocations += 1;
        Some(handle)
    }

    /// Allocate a default-initialized cell
    pub fn alloc_default(&mut self) -> Option<Handle>
    where
        T: Default,
    {
        self.alloc(T::default())
    }

    #[inline]
    fn cell(&self, handle: Handle) -> Option<&Cell<T>> {
        self.cells
            .get(handle.index as usize)
            .filter(|c| c.generation == handle.generation && c.value.is_some())
    }

    #[inline]
    fn cell_mut(&mut self, handle: Handle) -> Option<&mut Cell<T>> {
        self.cells
            .get_mut(handle.index as usize)
            .filter(|c| c.generation == handle.generation && c.value.is_some())
    }

    /// Check whether the handle still refers to a live cell
    #[inline]
    pub fn contains(&self, handle: Handle) -> bool {
        self.cell(handle).is_some()
    }

    /// Borrow a live value
    #[inline]
    pub fn get(&self, handle: Handle) -> Option<&T> {
        self.cell(handle).and_then(|c| c.value.as_ref())
    }

    /// Mutably borrow a live value
    #[inline]
    pub fn get_mut(&mut self, handle: Handle) -> Option<&mut T> {
        self.cell_mut(handle).and_then(|c| c.value.as_mut())
    }

    /// Current reference count (None for dead handles)
    pub fn refcount(&self, handle: Handle) -> Option<u32> {
        self.cell(handle).map(|c| c.refcount)
    }

    /// Increment the reference count
    ///
    /// Returns false for a dead handle.
    pub fn retain(&mut self, handle: Handle) -> bool {
        match self.cell_mut(handle) {
            Some(cell) => {
                cell.refcount = cell.refcount.saturating_add(1);
                true
            }
            None => {
                debug!("retain of dead handle {:?}", handle);
                false
            }
        }
    }

    /// Decrement the reference count
    ///
    /// When the count reaches zero the cell is freed and its value returned
    /// so the caller can release whatever the value owned.
    pub fn release(&mut self, handle: Handle) -> Option<T> {
        let Some(cell) = self.cell_mut(handle) else {
            debug!("release of dead handle {:?}", handle);
            return None;
        };

        cell.refcount -= 1;
        if cell.refcount > 0 {
            return None;
        }

        let value = cell.value.take();
        cell.generation = cell.generation.wrapping_add(1);
        self.free.push(handle.index);
        self.stats.live -= 1;
        self.stats.frees += 1;
        value
    }

    /// Snapshot of the allocation statistics
    pub fn stats(&self) -> AllocStats {
        self.stats
    }

    /// Number of live cells
    #[inline]
    pub fn live(&self) -> usize {
        self.stats.live
    }

    /// Drop every cell regardless of reference counts
    ///
    /// Returns the number of cells that were still live. Outstanding handles
    /// become dead.
    pub fn shutdown(&mut self) -> usize {
        let leaked = self.stats.live;
        for (index, cell) in self.cells.iter_mut().enumerate() {
            if cell.value.take().is_some() {
                cell.generation = cell.generation.wrapping_add(1);
                cell.refcount = 0;
                self.free.push(index as u32);
            }
        }
        self.stats.frees += leaked as u64;
        self.stats.live = 0;
        leaked
    }

    /// Iterate over live handles
    pub fn handles(&self) -> impl Iterator<Item = Handle> + '_ {
        self.cells.iter().enumerate().filter_map(|(index, cell)| {
            cell.value.as_ref().map(|_| Handle {
                index: index as u32,
                generation: cell.generation,
            })
        })
    }
}

impl<T> Default for Arena<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alloc_and_get() {
        let mut arena = Arena::new();
        let a = arena.alloc(10).unwrap();
        let b = arena.alloc(20).unwrap();

        assert_eq!(arena.get(a), Some(&10));
        assert_eq!(arena.get(b), Some(&20));
        assert_eq!(arena.refcount(a), Some(1));
        assert_eq!(arena.live(), 2);
    }

    #[test]
    fn test_retain_release_frees_once() {
        let mut arena = Arena::new();
        let h = arena.alloc("cell").unwrap();

        for _ in 0..3 {
            assert!(arena.retain(h));
        }
        assert_eq!(arena.refcount(h), Some(4));

        for _ in 0..3 {
            assert_eq!(arena.release(h), None);
            assert!(arena.contains(h));
        }
        assert_eq!(arena.release(h), Some("cell"));
        assert!(!arena.contains(h));

        // A further release is rejected, not a double free
        assert_eq!(arena.release(h), None);
        assert_eq!(arena.stats().frees, 1);
    }

    #[test]
    fn test_stale_handle_after_reuse() {
        let mut arena = Arena::new();
        let old = arena.alloc(1).unwrap();
        arena.release(old);

        let new = arena.alloc(2).unwrap();
        assert_eq!(old.index(), new.index());
        assert_ne!(old.generation(), new.generation());
        assert_eq!(arena.get(old), None);
        assert_eq!(arena.get(new), Some(&2));
    }

    #[test]
    fn test_limit_counts_oom() {
        let mut arena = Arena::with_limit(Some(1));
        let first = arena.alloc(1);
        assert!(first.is_some());
        assert!(arena.alloc(2).is_none());
        assert_eq!(arena.stats().oom_count, 1);

        arena.release(first.unwrap());
        assert!(arena.alloc(3).is_some());
    }

    #[test]
    fn test_stats_and_shutdown() {
        let mut arena: Arena<u32> = Arena::new();
        let a = arena.alloc_default().unwrap();
        let _b = arena.alloc(5).unwrap();
        arena.release(a);

        let stats = arena.stats();
        assert_eq!(stats.live, 1);
        assert_eq!(stats.peak, 2);
        assert_eq!(stats.allocations, 2);

        assert_eq!(arena.shutdown(), 1);
        assert_eq!(arena.live(), 0);
        assert_eq!(arena.handles().count(), 0);
    }
}
