use std::collections::HashSet;
use std::thread;

use ndarray::array;
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::error::DqnError;
use crate::replay_buffer::{ReplayBuffer, SharedReplayBuffer, Transition};

fn transition(id: usize) -> Transition {
    Transition::new(array![id as f32], id % 4, 0.0, array![(id + 1) as f32], false)
}

fn ids<'a, I: Iterator<Item = &'a Transition>>(iter: I) -> Vec<usize> {
    iter.map(|t| t.state[0] as usize).collect()
}

#[test]
fn test_zero_capacity_rejected() {
    assert!(ReplayBuffer::new(0).is_err());
}

#[test]
fn test_insert_and_sample() {
    let mut buffer = ReplayBuffer::new(10).unwrap();
    let mut rng = StdRng::seed_from_u64(0);
    let t = transition(7);
    buffer.insert(t.clone());
    assert_eq!(buffer.len(), 1);
    let sample = buffer.sample(1, &mut rng).unwrap();
    assert_eq!(sample[0], &t);
}

#[test]
fn test_fifo_eviction_returns_oldest() {
    let mut buffer = ReplayBuffer::new(3).unwrap();
    for i in 0..3 {
        assert!(buffer.insert(transition(i)).is_none());
    }
    assert!(buffer.is_full());

    let evicted = buffer.insert(transition(3)).unwrap();
    assert_eq!(evicted.state[0], 0.0);
    let evicted = buffer.insert(transition(4)).unwrap();
    assert_eq!(evicted.state[0], 1.0);

    assert_eq!(buffer.len(), 3);
    assert_eq!(ids(buffer.iter()), vec![2, 3, 4]);
    assert_eq!(buffer.total_inserted(), 5);
}

#[test]
fn test_get_by_age_after_wrap() {
    let mut buffer = ReplayBuffer::new(4).unwrap();
    for i in 0..10 {
        buffer.insert(transition(i));
    }
    let by_age: Vec<usize> = (0..4).map(|i| buffer.get(i).unwrap().state[0] as usize).collect();
    assert_eq!(by_age, vec![6, 7, 8, 9]);
    assert!(buffer.get(4).is_none());
}

#[test]
fn test_sample_is_distinct_and_from_contents() {
    let mut buffer = ReplayBuffer::new(50).unwrap();
    for i in 0..80 {
        buffer.insert(transition(i));
    }
    let stored: HashSet<usize> = ids(buffer.iter()).into_iter().collect();
    let mut rng = StdRng::seed_from_u64(3);
    for _ in 0..20 {
        let batch = buffer.sample(50, &mut rng).unwrap();
        assert_eq!(batch.len(), 50);
        let drawn: HashSet<usize> = ids(batch.into_iter()).into_iter().collect();
        assert_eq!(drawn.len(), 50);
        assert!(drawn.is_subset(&stored));
    }
}

#[test]
fn test_sampling_covers_old_and_new_entries() {
    let mut buffer = ReplayBuffer::new(20).unwrap();
    for i in 0..20 {
        buffer.insert(transition(i));
    }
    let mut rng = StdRng::seed_from_u64(11);
    let mut counts = [0usize; 20];
    for _ in 0..2000 {
        for t in buffer.sample(4, &mut rng).unwrap() {
            counts[t.state[0] as usize] += 1;
        }
    }
    // 8000 draws over 20 slots, 400 expected each
    assert!(counts.iter().all(|&c| c > 250 && c < 550), "{:?}", counts);
}

#[test]
fn test_sample_before_warmup_is_recoverable() {
    let mut buffer = ReplayBuffer::new(10).unwrap();
    let mut rng = StdRng::seed_from_u64(0);
    buffer.insert(transition(0));
    let err = buffer.sample(2, &mut rng).unwrap_err();
    assert_eq!(err, DqnError::InsufficientData { requested: 2, available: 1 });
    assert!(err.is_recoverable());
    assert!(!buffer.can_sample(2));
    assert!(buffer.can_sample(1));
}

#[test]
fn test_capacity_100_scenario() {
    let mut buffer = ReplayBuffer::new(100).unwrap();
    let mut rng = StdRng::seed_from_u64(42);

    for i in 0..32 {
        buffer.insert(transition(i));
    }
    assert_eq!(buffer.sample(32, &mut rng).unwrap().len(), 32);

    for i in 32..82 {
        buffer.insert(transition(i));
    }
    assert_eq!(buffer.len(), 82);
    assert_eq!(ids(buffer.iter()), (0..82).collect::<Vec<_>>());

    for i in 82..112 {
        buffer.insert(transition(i));
    }
    assert_eq!(buffer.len(), 100);
    assert_eq!(ids(buffer.iter()), (12..112).collect::<Vec<_>>());
}

#[test]
fn test_clear() {
    let mut buffer = ReplayBuffer::new(5).unwrap();
    for i in 0..7 {
        buffer.insert(transition(i));
    }
    buffer.clear();
    assert!(buffer.is_empty());
    buffer.insert(transition(100));
    assert_eq!(ids(buffer.iter()), vec![100]);
}

#[test]
fn test_shared_buffer_single_writer_many_readers() {
    let shared = SharedReplayBuffer::new(64).unwrap();
    for i in 0..16 {
        shared.insert(transition(i));
    }

    let writer = {
        let shared = shared.clone();
        thread::spawn(move || {
            for i in 16..500 {
                shared.insert(transition(i));
            }
        })
    };
    let readers: Vec<_> = (0..3)
        .map(|seed| {
            let shared = shared.clone();
            thread::spawn(move || {
                let mut rng = StdRng::seed_from_u64(seed);
                for _ in 0..200 {
                    let batch = shared.sample(16, &mut rng).unwrap();
                    let distinct: HashSet<usize> = ids(batch.iter()).into_iter().collect();
                    assert_eq!(distinct.len(), 16);
                }
            })
        })
        .collect();

    writer.join().unwrap();
    for reader in readers {
        reader.join().unwrap();
    }

    assert_eq!(shared.len(), 64);
    assert_eq!(ids(shared.snapshot().iter()), (436..500).collect::<Vec<_>>());
}
