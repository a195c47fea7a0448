//! # Reentrant Lock
//!
//! Recursive mutual exclusion with reentrancy accounting. The upper stack's
//! call graph re-enters locks from nested contexts, so a non-reentrant mutex
//! would deadlock a thread against itself.
//!
//! Acquisition returns a scoped [`ReentrantGuard`] whose drop is the release:
//! every exit path, early returns and panics included, releases exactly one
//! level. The depth counter is a lock-discipline invariant, not a recursion
//! tracker exposed to callers: a top-level acquire must observe depth 1 and
//! its release must observe depth 0, and a violation is a hard fault in
//! every build profile since it signals a bug in the calling stack, not an
//! environmental condition.

use std::marker::PhantomData;
use std::sync::{Condvar, Mutex, PoisonError};
use std::thread::{self, ThreadId};

use crate::domain::ThreadingTier;

#[derive(Debug, Default)]
struct OwnerState {
    owner: Option<ThreadId>,
    depth: u32,
}

/// A recursive mutex owned by exactly one higher-level object (a connection,
/// a global stack context) for that object's lifetime.
///
/// Only threads operating on behalf of the owning object may acquire it; the
/// PAL does not arbitrate between competing owners. OS resources are
/// released on drop, and the guard's borrow makes dropping a held lock a
/// compile error.
#[derive(Debug)]
pub struct ReentrantLock {
    state: Mutex<OwnerState>,
    released: Condvar,
    tier: ThreadingTier,
}

impl ReentrantLock {
    /// Construct an unheld lock for the given threading tier.
    #[must_use]
    pub fn new(tier: ThreadingTier) -> Self {
        Self {
            state: Mutex::new(OwnerState::default()),
            released: Condvar::new(),
            tier,
        }
    }

    /// Block until this thread holds the lock, then return the guard that
    /// releases it.
    ///
    /// Reentrant: the owning thread may acquire again while already holding
    /// the lock. In the [`ThreadingTier::SingleThreaded`] tier a contended
    /// acquire from a second thread is a composition bug and faults.
    #[must_use = "dropping the guard releases the lock immediately"]
    pub fn acquire(&self) -> ReentrantGuard<'_> {
        let me = thread::current().id();
        let mut st = self.lock_state();

        if st.owner.is_some_and(|owner| owner != me) {
            assert!(
                self.tier == ThreadingTier::LockEnabled,
                "lock contention in a single-threaded composition"
            );
            while st.owner.is_some_and(|owner| owner != me) {
                st = self
                    .released
                    .wait(st)
                    .unwrap_or_else(PoisonError::into_inner);
            }
        }

        let top_level = st.owner.is_none();
        st.owner = Some(me);
        st.depth += 1;
        if top_level {
            assert_eq!(st.depth, 1, "reentrancy counter skewed at acquisition");
        }

        ReentrantGuard {
            lock: self,
            top_level,
            _not_send: PhantomData,
        }
    }

    /// Debug-only invariant probe: the calling thread holds the lock at
    /// exactly `expected` levels. Compiles to nothing in release builds.
    pub fn assert_held(&self, expected: u32) {
        #[cfg(debug_assertions)]
        {
            let st = self.lock_state();
            assert_eq!(
                st.owner,
                Some(thread::current().id()),
                "lock not held by the asserting thread"
            );
            assert_eq!(st.depth, expected, "unexpected reentrancy depth");
        }
        #[cfg(not(debug_assertions))]
        let _ = expected;
    }

    /// Current reentrancy depth (0 when unheld).
    #[must_use]
    pub fn depth(&self) -> u32 {
        self.lock_state().depth
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, OwnerState> {
        // The state mutex only guards the two accounting fields; a panic
        // while holding it cannot leave them torn.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Scope of one acquisition level. Dropping releases that level.
///
/// Not `Send`: ownership is bound to the acquiring thread.
#[derive(Debug)]
pub struct ReentrantGuard<'a> {
    lock: &'a ReentrantLock,
    top_level: bool,
    _not_send: PhantomData<*const ()>,
}

impl Drop for ReentrantGuard<'_> {
    fn drop(&mut self) {
        let mut st = self.lock.lock_state();
        assert!(st.depth > 0, "lock released more often than acquired");
        st.depth -= 1;
        if self.top_level {
            assert_eq!(st.depth, 0, "reentrancy counter nonzero at top-level release");
        }
        if st.depth == 0 {
            st.owner = None;
            drop(st);
            self.lock.released.notify_one();
        }
    }
}
