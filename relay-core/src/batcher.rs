//! Typed producer facade over an [`Arena`].

use crate::arena::Arena;
use crate::viewer::Viewer;
use std::fmt;
use std::marker::PhantomData;
use std::ptr;

/// Append-only, typed handle restricting an [`Arena`] to element type `T`.
///
/// A `Batcher` borrows the arena mutably, so only one producer can stage into
/// it at a time; the borrow ends before the arena can be drained.
///
/// # Example
///
/// ```
/// use relay_core::{Arena, Batcher};
///
/// let mut arena = Arena::new();
/// let mut batch = Batcher::<u32>::new(&mut arena);
/// batch.push_back(1);
/// batch.emplace_back(|| 2);
/// batch.insert([3, 4]);
/// assert_eq!(batch.len(), 4);
/// ```
pub struct Batcher<'a, T: 'static> {
    arena: &'a mut Arena,
    _marker: PhantomData<T>,
}

impl<'a, T: 'static> Batcher<'a, T> {
    /// Wrap `arena`.
    ///
    /// # Panics
    ///
    /// Panics if the arena currently holds values of another type.
    #[track_caller]
    pub fn new(arena: &'a mut Arena) -> Self {
        arena.count::<T>();
        Self {
            arena,
            _marker: PhantomData,
        }
    }

    /// Append one value.
    pub fn push_back(&mut self, event: T) {
        self.arena.construct(event);
    }

    /// Append the value built by `make` and return it.
    pub fn emplace_back<F: FnOnce() -> T>(&mut self, make: F) -> &mut T {
        self.arena.construct_with(make)
    }

    /// Append every value of `events`.
    pub fn insert<I: IntoIterator<Item = T>>(&mut self, events: I) {
        self.arena.insert(events);
    }

    /// Drop every staged value and release the arena's storage.
    pub fn clear(&mut self) {
        let staged: *mut [T] = self.arena.as_mut_slice::<T>();
        // Forget the values before dropping them, so a panicking destructor
        // cannot leave them reachable for a second drop.
        self.arena.reset();
        // SAFETY: the values were initialised and are no longer reachable
        // through the arena. The allocation is still live until clear().
        unsafe { ptr::drop_in_place(staged) };
        self.arena.clear();
    }

    /// Drop the values past the first `len`.
    pub fn truncate(&mut self, len: usize) {
        let count = self.len();
        if len >= count {
            return;
        }
        let staged: *mut [T] = self.arena.as_mut_slice::<T>();
        // SAFETY: shrinking only; values past len are dropped right after and
        // never read again.
        unsafe {
            self.arena.resize(len * crate::info::stride_of::<T>());
            let tail = ptr::slice_from_raw_parts_mut(staged.cast::<T>().add(len), count - len);
            ptr::drop_in_place(tail);
        }
    }

    /// Resize to `len` values, cloning `value` into new slots or dropping the tail.
    pub fn resize(&mut self, len: usize, value: T)
    where
        T: Clone,
    {
        let count = self.len();
        if len <= count {
            self.truncate(len);
            return;
        }
        for _ in count + 1..len {
            self.arena.construct(value.clone());
        }
        self.arena.construct(value);
    }

    /// Number of staged values.
    pub fn len(&self) -> usize {
        self.arena.count::<T>()
    }

    pub fn is_empty(&self) -> bool {
        self.arena.is_empty()
    }

    /// Read-only view of the staged values.
    pub fn view(&self) -> Viewer<'_, T> {
        Viewer::new(self.arena)
    }
}

impl<T: 'static> fmt::Debug for Batcher<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Batcher")
            .field("element", &std::any::type_name::<T>())
            .field("len", &self.len())
            .finish()
    }
}
