//! Property-Based Tests for Event Storage
//!
//! **Property 1: Growth Transparency**
//!
//! For any sequence of constructs, the arena SHALL read back every value in
//! insertion order regardless of how many times it reallocated.
//!
//! **Property 2: Copy Independence**
//!
//! For any trivially copyable payload, a cloned arena SHALL be unaffected by
//! later writes to its source, and vice versa.
//!
//! **Property 3: Queue Order**
//!
//! For any interleaving of payload types, the event queue SHALL return the
//! records in push order with their original types and values.

use proptest::prelude::*;
use relay_core::{Arena, Batcher, EventQueue, QueueError, Viewer, ARENA_ALIGN};

// ============================================================================
// PAYLOADS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
struct Collision {
    entity: u64,
    other: u64,
    force: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct KeyEvent {
    key: i32,
    pressed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(align(16))]
struct Wide(u16);

/// One record of an interleaved queue script.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Record {
    Collision(Collision),
    Key(KeyEvent),
    Wide(Wide),
    Byte(u8),
}

// ============================================================================
// PROPERTY TEST STRATEGIES
// ============================================================================

fn collision_strategy() -> impl Strategy<Value = Collision> {
    (any::<u64>(), any::<u64>(), -1000.0f32..1000.0).prop_map(|(entity, other, force)| {
        Collision {
            entity,
            other,
            force,
        }
    })
}

fn key_event_strategy() -> impl Strategy<Value = KeyEvent> {
    (any::<i32>(), any::<bool>()).prop_map(|(key, pressed)| KeyEvent { key, pressed })
}

fn record_strategy() -> impl Strategy<Value = Record> {
    prop_oneof![
        collision_strategy().prop_map(Record::Collision),
        key_event_strategy().prop_map(Record::Key),
        any::<u16>().prop_map(|v| Record::Wide(Wide(v))),
        any::<u8>().prop_map(Record::Byte),
    ]
}

fn push_record(queue: &mut EventQueue, record: Record) -> Result<(), QueueError> {
    match record {
        Record::Collision(event) => queue.try_push(event),
        Record::Key(event) => queue.try_push(event),
        Record::Wide(event) => queue.try_push(event),
        Record::Byte(event) => queue.try_push(event),
    }
}

fn pop_record(queue: &mut EventQueue) -> Option<Record> {
    let key = queue.check()?;
    let payload = queue.peek()?;
    // SAFETY: each read matches the type reported by check().
    let record = unsafe {
        if key.is::<Collision>() {
            Record::Collision(payload.cast::<Collision>().as_ptr().read())
        } else if key.is::<KeyEvent>() {
            Record::Key(payload.cast::<KeyEvent>().as_ptr().read())
        } else if key.is::<Wide>() {
            Record::Wide(payload.cast::<Wide>().as_ptr().read())
        } else {
            Record::Byte(payload.cast::<u8>().as_ptr().read())
        }
    };
    queue.pop();
    Some(record)
}

// ============================================================================
// PROPERTIES
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// **Property 1: Growth Transparency**
    #[test]
    fn prop_arena_growth_preserves_order(events in prop::collection::vec(collision_strategy(), 0..300)) {
        let mut arena = Arena::new();
        for event in &events {
            arena.construct(*event);
        }

        prop_assert_eq!(arena.count::<Collision>(), events.len());
        prop_assert_eq!(arena.as_slice::<Collision>(), events.as_slice());
        prop_assert!(arena.capacity() >= arena.len());
        prop_assert_eq!(arena.as_ptr() as usize % ARENA_ALIGN, 0);
    }

    /// **Property 1: Growth Transparency (batched)**
    #[test]
    fn prop_batcher_insert_matches_push(events in prop::collection::vec(key_event_strategy(), 0..200)) {
        let mut pushed = Arena::new();
        let mut inserted = Arena::new();
        {
            let mut batch = Batcher::new(&mut pushed);
            for event in &events {
                batch.push_back(*event);
            }
        }
        Batcher::new(&mut inserted).insert(events.iter().copied());

        let pushed_view = Viewer::<KeyEvent>::new(&pushed);
        let inserted_view = Viewer::<KeyEvent>::new(&inserted);
        prop_assert_eq!(pushed_view.as_slice(), inserted_view.as_slice());
        prop_assert_eq!(pushed_view.as_slice(), events.as_slice());
    }

    /// **Property 2: Copy Independence**
    #[test]
    fn prop_try_clone_is_independent(
        initial in prop::collection::vec(any::<u32>(), 1..100),
        extra in prop::collection::vec(any::<u32>(), 0..50),
        patch in any::<u32>(),
    ) {
        let mut source = Arena::new();
        source.insert(initial.iter().copied());
        let mut copy = source.try_clone().unwrap();

        for value in &extra {
            source.construct(*value);
        }
        *copy.get_mut::<u32>(0) = patch;

        let mut expected_source = initial.clone();
        expected_source.extend(&extra);
        let mut expected_copy = initial.clone();
        expected_copy[0] = patch;

        prop_assert_eq!(source.as_slice::<u32>(), expected_source.as_slice());
        prop_assert_eq!(copy.as_slice::<u32>(), expected_copy.as_slice());
    }

    /// **Property 3: Queue Order**
    #[test]
    fn prop_queue_is_fifo_across_types(records in prop::collection::vec(record_strategy(), 0..500)) {
        let mut queue = EventQueue::new();
        for record in &records {
            prop_assert!(push_record(&mut queue, *record).is_ok());
        }
        prop_assert_eq!(queue.len(), records.len());

        let mut drained = Vec::with_capacity(records.len());
        while let Some(record) = pop_record(&mut queue) {
            drained.push(record);
        }

        prop_assert!(queue.is_empty());
        prop_assert_eq!(drained, records);
    }

    /// **Property 3: Queue Order (bounded page)**
    ///
    /// A small page accepts a prefix of the script and rejects the rest
    /// without disturbing what was already queued.
    #[test]
    fn prop_full_queue_keeps_accepted_prefix(records in prop::collection::vec(record_strategy(), 1..400)) {
        let mut queue = EventQueue::with_capacity(4096);
        let mut accepted = Vec::new();
        for record in &records {
            match push_record(&mut queue, *record) {
                Ok(()) => accepted.push(*record),
                Err(err) => {
                    let is_full = matches!(err, QueueError::Full { capacity: 4096, .. });
                    prop_assert!(is_full);
                    break;
                }
            }
        }

        let mut drained = Vec::new();
        while let Some(record) = pop_record(&mut queue) {
            drained.push(record);
        }
        prop_assert_eq!(drained, accepted);
    }
}
