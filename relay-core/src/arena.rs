//! Growable, type-erased byte arena.
//!
//! An [`Arena`] stores values of one payload type at a time, packed back to
//! back at `stride` intervals inside a single 64-byte aligned allocation.
//! It tracks bytes, not elements, and never runs destructors: teardown of
//! non-trivial payloads belongs to whoever owns the arena (see
//! [`Batcher::clear`](crate::Batcher::clear) and the dispatcher's teardown
//! delegate).
//!
//! # Growth
//!
//! ```text
//! len + stride > capacity  ──→  capacity = max(capacity * 2, len + stride)
//! ```
//!
//! Growth moves the bytes to a new allocation. References returned by
//! [`Arena::construct`] borrow the arena, so holding one across a growing
//! call is rejected by the borrow checker rather than left dangling.

use crate::error::{fatal, ArenaError};
use crate::info::{stride_of, EventInfo};
use std::alloc::{self, Layout};
use std::any;
use std::fmt;
use std::mem;
use std::ptr::{self, NonNull};
use std::slice;

/// Alignment of every arena allocation. Payload types may not exceed it.
pub const ARENA_ALIGN: usize = 64;

/// Growable byte buffer holding a contiguous run of one payload type.
pub struct Arena {
    data: NonNull<u8>,
    /// Used bytes
    len: usize,
    /// Allocated bytes
    capacity: usize,
    /// Type currently resident, set by the first `construct`
    element: Option<EventInfo>,
}

impl Arena {
    /// Create an empty arena. Does not allocate.
    pub fn new() -> Self {
        Self {
            data: dangling(),
            len: 0,
            capacity: 0,
            element: None,
        }
    }

    /// Create an empty arena with room for `capacity` bytes.
    pub fn with_capacity(capacity: usize) -> Self {
        let mut arena = Self::new();
        arena.reserve(capacity);
        arena
    }

    /// Append `value`, growing if needed, and return a reference to it.
    ///
    /// # Panics
    ///
    /// Panics if the arena is non-empty and holds a different type.
    pub fn construct<T: 'static>(&mut self, value: T) -> &mut T {
        const {
            assert!(
                mem::align_of::<T>() <= ARENA_ALIGN,
                "payload alignment exceeds ARENA_ALIGN"
            )
        };

        let stride = self.bind::<T>().stride;
        self.grow_for(stride);
        debug_assert_eq!(self.len % stride, 0);

        let offset = self.len;
        // SAFETY: grow_for guarantees offset + stride <= capacity. The base is
        // ARENA_ALIGN aligned and offset is a multiple of stride, which is a
        // multiple of align_of::<T>(), so the slot is aligned for T.
        unsafe {
            let slot = self.data.as_ptr().add(offset).cast::<T>();
            slot.write(value);
            self.len += stride;
            &mut *slot
        }
    }

    /// Append the value produced by `make`.
    pub fn construct_with<T: 'static, F: FnOnce() -> T>(&mut self, make: F) -> &mut T {
        self.construct(make())
    }

    /// Append every value of `values`.
    pub fn insert<T: 'static, I: IntoIterator<Item = T>>(&mut self, values: I) {
        let values = values.into_iter();
        let (lower, _) = values.size_hint();
        if lower > 0 {
            let stride = self.bind::<T>().stride;
            self.grow_for(lower.saturating_mul(stride));
        }
        for value in values {
            self.construct(value);
        }
    }

    /// Read the `T` stored at byte `offset`.
    ///
    /// # Panics
    ///
    /// Panics if the arena does not hold `T` or `offset` is not the start of
    /// a resident element.
    #[track_caller]
    pub fn get<T: 'static>(&self, offset: usize) -> &T {
        match self.try_get(offset) {
            Ok(value) => value,
            Err(err) => fatal(err),
        }
    }

    /// Checked form of [`Arena::get`].
    pub fn try_get<T: 'static>(&self, offset: usize) -> Result<&T, ArenaError> {
        self.check::<T>(offset)?;
        // SAFETY: check() verified T is the resident type and that a whole,
        // initialised element starts at offset.
        Ok(unsafe { &*self.data.as_ptr().add(offset).cast::<T>() })
    }

    /// Mutable form of [`Arena::get`].
    #[track_caller]
    pub fn get_mut<T: 'static>(&mut self, offset: usize) -> &mut T {
        if let Err(err) = self.check::<T>(offset) {
            fatal(err)
        }
        // SAFETY: as in try_get; &mut self guarantees exclusivity.
        unsafe { &mut *self.data.as_ptr().add(offset).cast::<T>() }
    }

    /// All resident elements as a slice. Empty when nothing is resident.
    ///
    /// # Panics
    ///
    /// Panics if the arena is non-empty and holds a different type.
    #[track_caller]
    pub fn as_slice<T: 'static>(&self) -> &[T] {
        let count = self.resident::<T>();
        // SAFETY: resident() verified the type; count elements of T are
        // initialised and contiguous from an aligned, non-null base.
        unsafe { slice::from_raw_parts(self.data.as_ptr().cast::<T>(), count) }
    }

    /// Mutable form of [`Arena::as_slice`].
    #[track_caller]
    pub fn as_mut_slice<T: 'static>(&mut self) -> &mut [T] {
        let count = self.resident::<T>();
        // SAFETY: as in as_slice; &mut self guarantees exclusivity.
        unsafe { slice::from_raw_parts_mut(self.data.as_ptr().cast::<T>(), count) }
    }

    /// Number of resident `T` values.
    #[track_caller]
    pub fn count<T: 'static>(&self) -> usize {
        self.resident::<T>()
    }

    /// Base pointer of the buffer.
    pub fn as_ptr(&self) -> *const u8 {
        self.data.as_ptr()
    }

    /// Forget every resident value, keeping the allocation.
    ///
    /// No destructor runs. Values with drop glue must be torn down first or
    /// they leak.
    pub fn reset(&mut self) {
        self.len = 0;
    }

    /// Release the allocation and forget the resident type.
    ///
    /// No destructor runs.
    pub fn clear(&mut self) {
        self.release();
        self.data = dangling();
        self.len = 0;
        self.capacity = 0;
        self.element = None;
    }

    /// Set the used length to `len` bytes, growing the allocation if needed.
    ///
    /// # Safety
    ///
    /// Bytes in `old_len..len` are uninitialised; they must be written with
    /// valid values of the resident type before being read. Shrinking does
    /// not drop the values past `len`.
    pub unsafe fn resize(&mut self, len: usize) {
        if len > self.capacity {
            self.reserve(len);
        }
        self.len = len;
    }

    /// Grow the allocation to at least `capacity` bytes.
    pub fn reserve(&mut self, capacity: usize) {
        if capacity <= self.capacity {
            return;
        }

        let layout = layout_for(capacity);
        // SAFETY: capacity > self.capacity >= 0, so the layout is non-zero sized.
        let raw = unsafe { alloc::alloc(layout) };
        let Some(fresh) = NonNull::new(raw) else {
            alloc::handle_alloc_error(layout)
        };

        if self.len > 0 {
            // SAFETY: both buffers are valid for len bytes and distinct allocations.
            unsafe { ptr::copy_nonoverlapping(self.data.as_ptr(), fresh.as_ptr(), self.len) };
        }

        self.release();
        self.data = fresh;
        self.capacity = capacity;
    }

    /// Copy the resident bytes into an independently owned arena.
    ///
    /// The copy is shallow, so it is refused for types with drop glue.
    pub fn try_clone(&self) -> Result<Arena, ArenaError> {
        if let Some(info) = self.element.filter(|info| info.needs_drop && self.len > 0) {
            return Err(ArenaError::NonTrivialCopy { name: info.name });
        }

        let mut copy = Arena::with_capacity(self.capacity);
        if self.len > 0 {
            // SAFETY: copy owns at least self.capacity >= self.len bytes.
            unsafe { ptr::copy_nonoverlapping(self.data.as_ptr(), copy.data.as_ptr(), self.len) };
        }
        copy.len = self.len;
        copy.element = self.element;
        Ok(copy)
    }

    /// Move the contents out, leaving this arena empty.
    pub fn take(&mut self) -> Arena {
        mem::take(self)
    }

    /// Used bytes.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Allocated bytes.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Info of the resident type, if one has been constructed.
    pub fn element(&self) -> Option<&EventInfo> {
        self.element.as_ref()
    }

    // ------------------------------------------------------------------------
    // internals
    // ------------------------------------------------------------------------

    /// Bind the arena to `T`, allowed whenever nothing is resident.
    #[track_caller]
    fn bind<T: 'static>(&mut self) -> EventInfo {
        match self.element {
            Some(info) if info.is::<T>() => info,
            Some(info) if self.len > 0 => fatal(ArenaError::TypeMismatch {
                held: info.name,
                requested: any::type_name::<T>(),
            }),
            _ => {
                let info = EventInfo::of::<T>();
                self.element = Some(info);
                info
            }
        }
    }

    #[track_caller]
    fn resident<T: 'static>(&self) -> usize {
        match self.element {
            _ if self.len == 0 => 0,
            Some(info) if info.is::<T>() => self.len / info.stride,
            Some(info) => fatal(ArenaError::TypeMismatch {
                held: info.name,
                requested: any::type_name::<T>(),
            }),
            None => 0,
        }
    }

    fn check<T: 'static>(&self, offset: usize) -> Result<(), ArenaError> {
        let stride = match self.element {
            Some(info) if info.is::<T>() => info.stride,
            Some(info) if self.len > 0 => {
                return Err(ArenaError::TypeMismatch {
                    held: info.name,
                    requested: any::type_name::<T>(),
                })
            }
            _ => stride_of::<T>(),
        };

        let in_bounds = offset
            .checked_add(stride)
            .is_some_and(|end| end <= self.len);
        if !in_bounds || offset % stride != 0 {
            return Err(ArenaError::OutOfBounds {
                name: any::type_name::<T>(),
                offset,
                stride,
                len: self.len,
            });
        }
        Ok(())
    }

    fn grow_for(&mut self, additional: usize) {
        let Some(required) = self.len.checked_add(additional) else {
            capacity_overflow()
        };
        if required > self.capacity {
            self.reserve(self.capacity.saturating_mul(2).max(required));
        }
    }

    fn release(&mut self) {
        if self.capacity > 0 {
            // SAFETY: data was allocated in reserve() with this exact layout.
            unsafe { alloc::dealloc(self.data.as_ptr(), layout_for(self.capacity)) };
        }
    }
}

impl Default for Arena {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Arena {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for Arena {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Arena")
            .field("element", &self.element.map(|info| info.name))
            .field("len", &self.len)
            .field("capacity", &self.capacity)
            .finish()
    }
}

/// Non-null, ARENA_ALIGN aligned placeholder for the unallocated state.
fn dangling() -> NonNull<u8> {
    // SAFETY: ARENA_ALIGN is non-zero.
    unsafe { NonNull::new_unchecked(ARENA_ALIGN as *mut u8) }
}

fn layout_for(capacity: usize) -> Layout {
    match Layout::from_size_align(capacity, ARENA_ALIGN) {
        Ok(layout) => layout,
        Err(_) => capacity_overflow(),
    }
}

#[cold]
fn capacity_overflow() -> ! {
    panic!("arena capacity overflow")
}

// =============================================================================
// TESTS
// =============================================================================
