//! Read-only, zero-copy view over staged events.

use crate::arena::Arena;
use std::fmt;
use std::ops::Deref;

/// Borrowed slice of the `T` values currently resident in an [`Arena`].
///
/// Building a viewer never allocates or copies. It is valid for one cycle:
/// the borrow it holds prevents the arena from growing, resetting or clearing
/// while the view is alive.
pub struct Viewer<'a, T> {
    events: &'a [T],
}

impl<'a, T: 'static> Viewer<'a, T> {
    /// View the contents of `arena`.
    ///
    /// # Panics
    ///
    /// Panics if the arena currently holds values of another type.
    #[track_caller]
    pub fn new(arena: &'a Arena) -> Self {
        Self {
            events: arena.as_slice::<T>(),
        }
    }
}

impl<'a, T> Viewer<'a, T> {
    /// View over nothing.
    pub const fn empty() -> Self {
        Self { events: &[] }
    }

    /// Wrap an existing slice.
    pub const fn from_slice(events: &'a [T]) -> Self {
        Self { events }
    }

    /// Element at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of range.
    #[track_caller]
    pub fn at(&self, index: usize) -> &'a T {
        &self.events[index]
    }

    /// The viewed values.
    pub const fn as_slice(&self) -> &'a [T] {
        self.events
    }
}

impl<T> Deref for Viewer<'_, T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        self.events
    }
}

impl<T> Clone for Viewer<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Viewer<'_, T> {}

impl<T> Default for Viewer<'_, T> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<'a, T> IntoIterator for Viewer<'a, T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.events.iter()
    }
}

impl<'a, T> IntoIterator for &Viewer<'a, T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.events.iter()
    }
}

impl<T: fmt::Debug> fmt::Debug for Viewer<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.events).finish()
    }
}
