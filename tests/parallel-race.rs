//! Concurrent callers racing on fresh types: the builder runs exactly once
//! per type, every caller observes the identical instance, and builders for
//! unrelated types do not serialize against each other.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use once_registry::Registry;
use test_log::test;

struct Shared {
    built_by: usize,
}

struct Left;
struct Right;

#[test]
fn racing_callers_observe_one_instance() {
    const THREADS: usize = 16;

    let registry = Arc::new(Registry::new());
    let builds = Arc::new(AtomicUsize::new(0));
    let barrier = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|caller| {
            let registry = Arc::clone(&registry);
            let builds = Arc::clone(&builds);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                registry
                    .get_or_create(|| {
                        builds.fetch_add(1, Ordering::SeqCst);
                        Shared { built_by: caller }
                    })
                    .unwrap()
            })
        })
        .collect();

    let instances: Vec<Arc<Shared>> = handles
        .into_iter()
        .map(|handle| handle.join().unwrap())
        .collect();

    assert_eq!(builds.load(Ordering::SeqCst), 1);
    for pair in instances.windows(2) {
        assert!(Arc::ptr_eq(&pair[0], &pair[1]));
    }
    assert!(instances[0].built_by < THREADS);
}

#[test]
fn waiters_see_the_winners_instance() {
    let registry = Arc::new(Registry::new());
    let entered = Arc::new(Barrier::new(2));

    let winner = {
        let registry = Arc::clone(&registry);
        let entered = Arc::clone(&entered);
        thread::spawn(move || {
            registry
                .get_or_create(|| {
                    entered.wait();
                    // Hold the construction open long enough for the other
                    // caller to reach the slot's lock.
                    thread::sleep(Duration::from_millis(50));
                    Shared { built_by: 0 }
                })
                .unwrap()
        })
    };

    entered.wait();
    let waited = registry
        .get_or_create(|| Shared { built_by: 1 })
        .unwrap();
    let won = winner.join().unwrap();

    assert!(Arc::ptr_eq(&won, &waited));
    assert_eq!(waited.built_by, 0);
}

/// Both builders park on one barrier inside their construction. The barrier
/// only releases if the two constructions run concurrently, so this hangs
/// if slots ever share an exclusive section.
#[test]
fn unrelated_types_construct_concurrently() {
    let registry = Arc::new(Registry::new());
    let rendezvous = Arc::new(Barrier::new(2));

    let left = {
        let registry = Arc::clone(&registry);
        let rendezvous = Arc::clone(&rendezvous);
        thread::spawn(move || {
            registry
                .get_or_create(|| {
                    rendezvous.wait();
                    Left
                })
                .unwrap()
        })
    };

    let right = {
        let registry = Arc::clone(&registry);
        let rendezvous = Arc::clone(&rendezvous);
        thread::spawn(move || {
            registry
                .get_or_create(|| {
                    rendezvous.wait();
                    Right
                })
                .unwrap()
        })
    };

    left.join().unwrap();
    right.join().unwrap();

    assert!(registry.get::<Left>().is_some());
    assert!(registry.get::<Right>().is_some());
}
