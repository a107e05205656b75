//! Fuzz test for the RELAY event queue
//!
//! Drives a small queue with an arbitrary mix of pushes of differently sized
//! and aligned payloads, pops and resets, mirroring every step in a
//! `VecDeque` model. Looks for:
//! - Panics on the checked paths
//! - Misaligned or overlapping records
//! - Records read back with the wrong type or value
//!
//! Run with: cargo +nightly fuzz run queue_fuzz -- -max_total_time=60

#![no_main]

use libfuzzer_sys::fuzz_target;
use relay_core::{EventQueue, QueueError, MIN_QUEUE_PAGE_SIZE};
use std::collections::VecDeque;

#[derive(Debug, Clone, Copy, PartialEq)]
enum Record {
    Byte(u8),
    Word(u64),
    Block([u8; 24]),
    Wide(Wide),
    Empty,
}

#[derive(Debug, Clone, Copy, PartialEq)]
#[repr(align(32))]
struct Wide(u16);

#[derive(Debug, Clone, Copy, PartialEq)]
struct Marker;

fn push(queue: &mut EventQueue, record: Record) -> Result<(), QueueError> {
    match record {
        Record::Byte(value) => queue.try_push(value),
        Record::Word(value) => queue.try_push(value),
        Record::Block(value) => queue.try_push(value),
        Record::Wide(value) => queue.try_push(value),
        Record::Empty => queue.try_push(Marker),
    }
}

fn read(queue: &EventQueue) -> Option<Record> {
    let key = queue.check()?;
    let payload = queue.peek()?;
    // SAFETY: each payload is read as the type check() reports for it.
    unsafe {
        if key.is::<u8>() {
            Some(Record::Byte(payload.cast::<u8>().read()))
        } else if key.is::<u64>() {
            assert_eq!(payload.as_ptr() as usize % 8, 0, "u64 payload misaligned");
            Some(Record::Word(payload.cast::<u64>().read()))
        } else if key.is::<[u8; 24]>() {
            Some(Record::Block(payload.cast::<[u8; 24]>().read()))
        } else if key.is::<Wide>() {
            assert_eq!(payload.as_ptr() as usize % 32, 0, "Wide payload misaligned");
            Some(Record::Wide(payload.cast::<Wide>().read()))
        } else if key.is::<Marker>() {
            Some(Record::Empty)
        } else {
            panic!("unexpected record type {key}");
        }
    }
}

fuzz_target!(|data: &[u8]| {
    let mut queue = EventQueue::with_capacity(MIN_QUEUE_PAGE_SIZE);
    let mut model = VecDeque::new();

    for chunk in data.chunks(3) {
        let [op, a, b] = match chunk {
            [op, a, b] => [*op, *a, *b],
            _ => break,
        };
        let word = (u64::from(a) << 8) | u64::from(b);

        match op % 8 {
            0 => {
                queue.reset();
                model.clear();
            }
            1 | 2 => {
                let expected = model.pop_front();
                assert_eq!(read(&queue), expected, "queue diverged from model");
                queue.pop();
            }
            _ => {
                let record = match op % 8 {
                    3 => Record::Byte(a),
                    4 => Record::Word(word),
                    5 => Record::Block([a ^ b; 24]),
                    6 => Record::Wide(Wide(word as u16)),
                    _ => Record::Empty,
                };
                match push(&mut queue, record) {
                    Ok(()) => model.push_back(record),
                    Err(QueueError::Full { remaining, .. }) => {
                        assert!(remaining <= queue.capacity());
                    }
                    Err(err) => panic!("unexpected queue error: {err}"),
                }
            }
        }

        assert_eq!(queue.len(), model.len(), "record count diverged");
        assert_eq!(queue.is_empty(), model.is_empty());
        assert!(queue.used() <= queue.capacity());
    }

    while let Some(expected) = model.pop_front() {
        assert_eq!(read(&queue), Some(expected), "queue diverged while draining");
        queue.pop();
    }
    assert!(queue.is_empty());
});
