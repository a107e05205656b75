//! Fuzz test for the RELAY arena
//!
//! Constructs, truncates and clones arenas of a fixed payload type from
//! arbitrary operation bytes and compares the resident slice against a `Vec`
//! model after every step. Checked lookups at arbitrary offsets must either
//! return the element at that offset or fail cleanly.
//!
//! Run with: cargo +nightly fuzz run arena_fuzz -- -max_total_time=60

#![no_main]

use libfuzzer_sys::fuzz_target;
use relay_core::{stride_of, Arena, Batcher, ARENA_ALIGN};

#[derive(Debug, Clone, Copy, PartialEq)]
#[repr(C)]
struct Sample {
    id: u32,
    weight: u16,
    tag: u8,
}

fuzz_target!(|data: &[u8]| {
    let stride = stride_of::<Sample>();
    let mut arena = Arena::new();
    let mut model: Vec<Sample> = Vec::new();

    for chunk in data.chunks(2) {
        let [op, arg] = match chunk {
            [op, arg] => [*op, *arg],
            _ => break,
        };

        match op % 6 {
            0 | 1 => {
                let sample = Sample {
                    id: (u32::from(op) << 8) | u32::from(arg),
                    weight: u16::from(arg),
                    tag: op,
                };
                arena.construct(sample);
                model.push(sample);
            }
            2 => {
                let count = usize::from(arg % 16);
                let batch: Vec<_> = (0..count)
                    .map(|i| Sample { id: i as u32, weight: 0, tag: arg })
                    .collect();
                Batcher::<Sample>::new(&mut arena).insert(batch.iter().copied());
                model.extend(batch);
            }
            3 => {
                let len = usize::from(arg).min(model.len());
                Batcher::<Sample>::new(&mut arena).truncate(len);
                model.truncate(len);
            }
            4 => {
                let offset = usize::from(arg) * 4;
                match arena.try_get::<Sample>(offset) {
                    Ok(sample) => {
                        assert_eq!(offset % stride, 0, "lookup accepted a misaligned offset");
                        assert_eq!(Some(sample), model.get(offset / stride));
                    }
                    Err(_) => {
                        assert!(offset % stride != 0 || offset / stride >= model.len());
                    }
                }
            }
            _ => {
                let copy = match arena.try_clone() {
                    Ok(copy) => copy,
                    Err(err) => panic!("plain payload refused by try_clone: {err}"),
                };
                assert_eq!(copy.len(), arena.len());
                if !model.is_empty() {
                    assert_eq!(copy.as_slice::<Sample>(), model.as_slice());
                }
                if arg % 2 == 0 {
                    arena = copy;
                }
            }
        }

        assert_eq!(arena.len(), model.len() * stride);
        assert!(arena.len() <= arena.capacity());
        assert_eq!(arena.as_ptr() as usize % ARENA_ALIGN, 0);
        if !model.is_empty() {
            assert_eq!(arena.as_slice::<Sample>(), model.as_slice());
        }
    }
});
