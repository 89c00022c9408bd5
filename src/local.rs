//! Thread-local record of the constructions in progress on this thread.
//!
//! Per-type construction locks are not reentrant: a builder that requests
//! its own type again (directly, or through a chain of other builders) would
//! block on a lock its own thread already holds. The registry consults this
//! stack before blocking, so such cycles surface as
//! [`Error::recursive_construction`](crate::result::Error) instead of
//! deadlocking. Cycles spanning multiple threads cannot be seen from here
//! and remain a forbidden usage pattern.

use std::any::TypeId;
use std::cell::RefCell;

thread_local! {
    /// Stack of types whose builders are currently executing on this thread,
    /// outermost first.
    static CONSTRUCTING: RefCell<Vec<ActiveConstruction>> = const { RefCell::new(Vec::new()) };
}

struct ActiveConstruction {
    type_id: TypeId,
    type_name: &'static str,
}

/// If `type_id` is already under construction on this thread, returns the
/// participant type names from that construction to the top of the stack,
/// with the repeated head appended. Returns `None` when there is no cycle.
pub(crate) fn find_cycle(type_id: TypeId) -> Option<Vec<&'static str>> {
    CONSTRUCTING.with(|stack| {
        let stack = stack.borrow();
        let head = stack.iter().position(|active| active.type_id == type_id)?;
        let mut cycle: Vec<&'static str> =
            stack[head..].iter().map(|active| active.type_name).collect();
        cycle.push(stack[head].type_name);
        Some(cycle)
    })
}

/// Marks `type_id` as under construction on this thread until the returned
/// guard is dropped. The caller must hold the slot's build lock.
pub(crate) fn begin_construction(
    type_id: TypeId,
    type_name: &'static str,
) -> ConstructionGuard {
    CONSTRUCTING.with(|stack| {
        stack
            .borrow_mut()
            .push(ActiveConstruction { type_id, type_name });
    });
    ConstructionGuard { type_id }
}

pub(crate) struct ConstructionGuard {
    type_id: TypeId,
}

impl Drop for ConstructionGuard {
    fn drop(&mut self) {
        CONSTRUCTING.with(|stack| {
            let popped = stack.borrow_mut().pop();
            debug_assert!(popped.is_some_and(|active| active.type_id == self.type_id));
        });
    }
}
