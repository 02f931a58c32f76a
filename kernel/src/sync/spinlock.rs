// =============================================================================
// CoreLink - Binary Spinlock
// =============================================================================
//
// One 32-bit word in shared memory: 0 = free, 1 = held.  Any core can take
// it; there is no owner identity, no reentrancy and no fairness.
//
// HOW IT WORKS:
//   - To lock: compare-and-swap the word from FREE to HELD with Acquire
//     ordering.  On failure, spin on plain loads until the word reads FREE
//     again, then retry the CAS (test-and-test-and-set keeps the cache
//     line shared while we wait).
//   - To unlock: store FREE with Release ordering, then broadcast a wake
//     event so every parked core re-evaluates whatever it waits for.
//
// The wake on unlock is untargeted.  Nobody is told "the lock is yours";
// cores that parked for an unrelated reason wake up too and go back to
// sleep after re-checking.
//
// WHAT IT DOES NOT DO:
//   - Time out.  acquire() spins until it wins, however long that takes.
//   - Detect deadlock.  Calling acquire() twice on one core without a
//     release in between spins forever.
//   - Check the releaser.  release() from a core that never acquired the
//     lock frees it anyway; callers must not do that.
//
// The word is plain shared memory with no static initializer on bare
// metal, so init() must run once, before any core can observe the lock.
//
// =============================================================================

use core::cell::UnsafeCell;
use core::hint::spin_loop;
use core::ops::{Deref, DerefMut};
use core::sync::atomic::{AtomicU32, Ordering};

const FREE: u32 = 0;
const HELD: u32 = 1;

/// A bare lock word with explicit acquire / release.
///
/// This is the form that lives at a fixed address in shared memory and
/// guards data that is not itself a Rust value (the console, for one).
/// For data that is, prefer [`SpinLock<T>`], which releases on drop.
#[derive(Debug)]
#[repr(transparent)]
pub struct RawSpinLock {
    word: AtomicU32,
}

impl RawSpinLock {
    /// A free lock.  `const` so it can sit in a `static`.
    pub const fn new() -> Self {
        Self {
            word: AtomicU32::new(FREE),
        }
    }

    /// Force the lock free.
    ///
    /// Only for the init pass over shared memory: no other core may touch
    /// the lock while this runs.
    pub fn init(&self) {
        self.word.store(FREE, Ordering::Relaxed);
    }

    /// Spin until this core holds the lock.
    ///
    /// On return, every write made by the previous holder before its
    /// `release` is visible to us (Acquire on the winning CAS).
    pub fn acquire(&self) {
        loop {
            if self
                .word
                .compare_exchange_weak(FREE, HELD, Ordering::Acquire, Ordering::Relaxed)
                .is_ok()
            {
                return;
            }
            while self.word.load(Ordering::Relaxed) != FREE {
                spin_loop();
            }
        }
    }

    /// Take the lock if it is free right now.
    pub fn try_acquire(&self) -> bool {
        self.word
            .compare_exchange(FREE, HELD, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
    }

    /// Free the lock and wake every parked core.
    ///
    /// Release ordering publishes all writes made inside the critical
    /// section to the next core that acquires.
    pub fn release(&self) {
        self.word.store(FREE, Ordering::Release);
        khal::event::send_event();
    }

    /// Whether some core currently holds the lock.  Racy by nature; for
    /// diagnostics and tests.
    pub fn is_locked(&self) -> bool {
        self.word.load(Ordering::Relaxed) != FREE
    }
}

impl Default for RawSpinLock {
    fn default() -> Self {
        Self::new()
    }
}

/// A spinlock that owns the data it protects.
///
/// `#[repr(C)]` keeps the lock word first and the data right behind it,
/// so a `SpinLock<T>` has a fixed layout in shared memory.
///
/// # Examples
/// ```
/// use corelink::SpinLock;
///
/// static COUNTER: SpinLock<u64> = SpinLock::new(0);
///
/// {
///     let mut guard = COUNTER.lock();
///     *guard += 1;
/// } // released (and a wake broadcast sent) here
/// assert_eq!(*COUNTER.lock(), 1);
/// ```
#[repr(C)]
pub struct SpinLock<T> {
    raw: RawSpinLock,
    data: UnsafeCell<T>,
}

// SAFETY: the lock hands out access to `T` to one core at a time, so
// sharing the lock is fine as long as `T` may move between cores.
unsafe impl<T: Send> Send for SpinLock<T> {}
unsafe impl<T: Send> Sync for SpinLock<T> {}

impl<T> SpinLock<T> {
    pub const fn new(value: T) -> Self {
        Self {
            raw: RawSpinLock::new(),
            data: UnsafeCell::new(value),
        }
    }

    /// Spin until the lock is ours; released when the guard drops.
    pub fn lock(&self) -> SpinLockGuard<'_, T> {
        self.raw.acquire();
        SpinLockGuard { lock: self }
    }

    /// Take the lock only if nobody holds it.
    pub fn try_lock(&self) -> Option<SpinLockGuard<'_, T>> {
        if self.raw.try_acquire() {
            Some(SpinLockGuard { lock: self })
        } else {
            None
        }
    }

    /// Direct access when `&mut self` already proves exclusivity.
    pub fn get_mut(&mut self) -> &mut T {
        self.data.get_mut()
    }

    /// The underlying lock word.
    pub fn raw(&self) -> &RawSpinLock {
        &self.raw
    }
}

/// RAII guard for a held [`SpinLock`].
///
/// Dropping it stores FREE (Release) and broadcasts a wake event.
pub struct SpinLockGuard<'a, T> {
    lock: &'a SpinLock<T>,
}

impl<T> Deref for SpinLockGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        // SAFETY: we hold the lock.
        unsafe { &*self.lock.data.get() }
    }
}

impl<T> DerefMut for SpinLockGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: we hold the lock.
        unsafe { &mut *self.lock.data.get() }
    }
}

impl<T> Drop for SpinLockGuard<'_, T> {
    fn drop(&mut self) {
        self.lock.raw.release();
    }
}
