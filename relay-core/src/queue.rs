//! Fixed-capacity FIFO page of heterogeneous event records.
//!
//! The queue is the only structure that keeps true emission order across
//! payload types. Every record is a header followed by the payload at its
//! natural alignment:
//!
//! ```text
//! ┌──────────────────────────┬─────────┬───────────────┬─────────┐
//! │ RecordHeader             │ padding │ payload (T)   │ padding │ next record ...
//! │ {key, payload, next}     │         │               │         │
//! └──────────────────────────┴─────────┴───────────────┴─────────┘
//! ^ read cursor                                                  ^ header.next
//! ```
//!
//! The page never grows. A push that does not fit is a precondition
//! violation, keeping the hot path allocation-free once the page exists.

use crate::error::{fatal, QueueError};
use crate::info::TypeKey;
use std::alloc::{self, Layout};
use std::any;
use std::fmt;
use std::mem;
use std::ptr::NonNull;

/// Default page size in bytes (1 MiB).
pub const PAGE_SIZE: usize = 4096 * 256;

/// Largest payload accepted by any queue, checked at compile time per type.
pub const MAX_RECORD_SIZE: usize = PAGE_SIZE / 4;

/// Alignment of the page allocation. Payload types may not exceed it.
pub const PAGE_ALIGN: usize = 64;

const HEADER_SIZE: usize = mem::size_of::<RecordHeader>();
const HEADER_ALIGN: usize = mem::align_of::<RecordHeader>();

#[derive(Clone, Copy)]
#[repr(C)]
struct RecordHeader {
    key: TypeKey,
    /// Absolute offset of the payload
    payload: usize,
    /// Absolute offset of the next record
    next: usize,
}

/// Single-page FIFO of tagged event records.
pub struct EventQueue {
    /// Allocated lazily on the first push
    page: Option<NonNull<u8>>,
    capacity: usize,
    read: usize,
    write: usize,
    records: usize,
}

impl EventQueue {
    /// Queue with the default [`PAGE_SIZE`].
    pub fn new() -> Self {
        Self::with_capacity(PAGE_SIZE)
    }

    /// Queue with a page of `capacity` bytes.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is smaller than one record header.
    pub fn with_capacity(capacity: usize) -> Self {
        assert!(
            capacity >= HEADER_SIZE,
            "queue page must hold at least one record header"
        );
        Self {
            page: None,
            capacity,
            read: 0,
            write: 0,
            records: 0,
        }
    }

    /// Append one record.
    ///
    /// # Panics
    ///
    /// Panics if the record does not fit in the remaining page space.
    #[track_caller]
    pub fn push<T: 'static>(&mut self, event: T) {
        if let Err(err) = self.try_push(event) {
            fatal(err)
        }
    }

    /// Checked form of [`EventQueue::push`]. The event is dropped on error.
    pub fn try_push<T: 'static>(&mut self, event: T) -> Result<(), QueueError> {
        const {
            assert!(
                mem::size_of::<T>() <= MAX_RECORD_SIZE,
                "payload exceeds MAX_RECORD_SIZE"
            );
            assert!(
                mem::align_of::<T>() <= PAGE_ALIGN,
                "payload alignment exceeds PAGE_ALIGN"
            );
        };

        let size = mem::size_of::<T>();
        let limit = self.capacity / 4;
        if size > limit {
            return Err(QueueError::RecordTooLarge {
                name: any::type_name::<T>(),
                size,
                limit,
            });
        }

        let start = self.write;
        let payload = align_up(start + HEADER_SIZE, mem::align_of::<T>());
        let next = align_up(payload + size, HEADER_ALIGN);
        if next > self.capacity {
            return Err(QueueError::Full {
                name: any::type_name::<T>(),
                needed: next - start,
                remaining: self.capacity - start,
                capacity: self.capacity,
            });
        }

        let page = self.page();
        let header = RecordHeader {
            key: TypeKey::of::<T>(),
            payload,
            next,
        };
        // SAFETY: start and payload lie inside the page with room for the
        // header and payload (next <= capacity). start is a multiple of
        // HEADER_ALIGN and payload a multiple of align_of::<T>(), both
        // relative to a PAGE_ALIGN aligned base.
        unsafe {
            page.as_ptr().add(start).cast::<RecordHeader>().write(header);
            page.as_ptr().add(payload).cast::<T>().write(event);
        }

        self.write = next;
        self.records += 1;
        Ok(())
    }

    /// Type of the record at the read cursor, without consuming it.
    pub fn check(&self) -> Option<TypeKey> {
        self.header().map(|header| header.key)
    }

    /// Payload of the record at the read cursor.
    ///
    /// The pointer stays valid until the next push or reset; reading it as
    /// anything other than the type reported by [`check`](Self::check) is
    /// undefined behaviour.
    pub fn peek(&self) -> Option<NonNull<u8>> {
        let header = self.header()?;
        let page = self.page?;
        // SAFETY: header.payload was computed inside the page by try_push.
        Some(unsafe { NonNull::new_unchecked(page.as_ptr().add(header.payload)) })
    }

    /// Advance the read cursor past one record. No destructor runs.
    pub fn pop(&mut self) {
        if let Some(header) = self.header() {
            self.read = header.next;
            self.records -= 1;
        }
    }

    /// Check whether every record has been read.
    pub fn is_empty(&self) -> bool {
        self.read >= self.write
    }

    /// Rewind both cursors. Unread records are forgotten, not dropped.
    pub fn reset(&mut self) {
        self.read = 0;
        self.write = 0;
        self.records = 0;
    }

    /// Unread records.
    pub fn len(&self) -> usize {
        self.records
    }

    /// Page size in bytes.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Bytes between the read and write cursors.
    pub fn used(&self) -> usize {
        self.write - self.read
    }

    /// Bytes still writable before a reset.
    pub fn remaining(&self) -> usize {
        self.capacity - self.write
    }

    fn header(&self) -> Option<RecordHeader> {
        if self.is_empty() {
            return None;
        }
        let page = self.page?;
        // SAFETY: read < write, so a header written by try_push starts at read.
        Some(unsafe { page.as_ptr().add(self.read).cast::<RecordHeader>().read() })
    }

    fn page(&mut self) -> NonNull<u8> {
        if let Some(page) = self.page {
            return page;
        }
        let layout = page_layout(self.capacity);
        // SAFETY: capacity >= HEADER_SIZE > 0.
        let raw = unsafe { alloc::alloc(layout) };
        let Some(page) = NonNull::new(raw) else {
            alloc::handle_alloc_error(layout)
        };
        self.page = Some(page);
        page
    }
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for EventQueue {
    fn drop(&mut self) {
        if let Some(page) = self.page.take() {
            // SAFETY: allocated in page() with the same layout.
            unsafe { alloc::dealloc(page.as_ptr(), page_layout(self.capacity)) };
        }
    }
}

impl fmt::Debug for EventQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventQueue")
            .field("records", &self.records)
            .field("read", &self.read)
            .field("write", &self.write)
            .field("capacity", &self.capacity)
            .finish()
    }
}

fn page_layout(capacity: usize) -> Layout {
    match Layout::from_size_align(capacity, PAGE_ALIGN) {
        Ok(layout) => layout,
        Err(_) => panic!("queue page of {} bytes overflows isize", capacity),
    }
}

const fn align_up(offset: usize, align: usize) -> usize {
    (offset + align - 1) & !(align - 1)
}

// =============================================================================
// TESTS
// =============================================================================
