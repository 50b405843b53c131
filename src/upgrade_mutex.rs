// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Port of sync_prim/upgrade_mutex.hpp (upgrade_mutex class).
// Three-mode blocking mutex packed into one atomic word.
// - Bit 31 marks the exclusive writer.
// - Bit 30 marks the upgradeable holder.
// - Bit 29 marks an in-progress upgrade draining readers.
// - Bits 0-28 count concurrent shared holders.

#[cfg(loom)]
use loom::sync::atomic::{AtomicU32, Ordering};
#[cfg(loom)]
use loom::sync::{Condvar, Mutex, MutexGuard};
#[cfg(not(loom))]
use std::sync::atomic::{AtomicU32, Ordering};
#[cfg(not(loom))]
use std::sync::{Condvar, Mutex, MutexGuard};

use std::sync::PoisonError;

const WRITE_LOCKED: u32 = 1 << 31;
const UPGRADE_LOCKED: u32 = 1 << 30;
const UPGRADE_PENDING: u32 = 1 << 29;
const READER_MASK: u32 = !(WRITE_LOCKED | UPGRADE_LOCKED | UPGRADE_PENDING);
const ONE_READER: u32 = 1;

/// A blocking mutex with three access modes and atomic transitions
/// between them.
///
/// Port of `sync_prim::upgrade_mutex`. The modes:
///
/// 1. Shared: any number of concurrent holders.
/// 2. Upgradeable: a single holder that coexists with shared holders and
///    can promote itself to exclusive without releasing.
/// 3. Exclusive: a single holder, alone.
///
/// The whole lock state lives in one `AtomicU32`, so uncontended
/// acquisition and every release mutate it with a single atomic
/// operation. Contended acquirers park on one of two condition variables:
/// `gate1` for
/// shared/upgradeable acquirers, `gate2` for exclusive acquirers and for
/// an upgradeable holder draining readers inside
/// [`upgrade_to_unique`](Self::upgrade_to_unique).
///
/// While an upgrade is draining, new shared acquirers are held back by the
/// pending bit, so a steady stream of readers cannot starve the promotion.
///
/// The matching release must run on the thread that acquired, exactly once
/// per acquisition. Releasing a mode that is not held, or dropping the
/// mutex while held, is a usage error with no runtime check.
pub struct UpgradeMutex {
    state: AtomicU32,
    inner: Mutex<()>,
    gate1: Condvar,
    gate2: Condvar,
}

impl UpgradeMutex {
    /// Create a new unlocked mutex.
    #[cfg(not(loom))]
    pub const fn new() -> Self {
        Self {
            state: AtomicU32::new(0),
            inner: Mutex::new(()),
            gate1: Condvar::new(),
            gate2: Condvar::new(),
        }
    }

    /// Create a new unlocked mutex (loom primitives are not `const`).
    #[cfg(loom)]
    pub fn new() -> Self {
        Self {
            state: AtomicU32::new(0),
            inner: Mutex::new(()),
            gate1: Condvar::new(),
            gate2: Condvar::new(),
        }
    }

    // The inner mutex serializes predicate checks only; it guards no data,
    // so a poisoned guard can be taken over as-is.
    fn inner_lock(&self) -> MutexGuard<'_, ()> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn wait<'a>(&self, gate: &Condvar, guard: MutexGuard<'a, ()>) -> MutexGuard<'a, ()> {
        gate.wait(guard).unwrap_or_else(PoisonError::into_inner)
    }

    // Barrier: briefly acquire the inner mutex so an acquirer that already
    // failed its predicate is in cond_wait before the notify fires. Without
    // this the notify can land between a waiter's check and its park and be
    // lost for good.
    fn sync_with_waiters(&self) {
        drop(self.inner_lock());
    }

    /// Acquire the exclusive (write) lock, blocking until no other holder
    /// of any mode remains.
    pub fn lock(&self) {
        let mut guard = self.inner_lock();
        loop {
            // Exclusive access requires the entire word to be zero: no
            // readers, no upgradeable holder, no other writer.
            if self
                .state
                .compare_exchange(0, WRITE_LOCKED, Ordering::Acquire, Ordering::Relaxed)
                .is_ok()
            {
                return;
            }
            guard = self.wait(&self.gate2, guard);
        }
    }

    /// Release the exclusive lock.
    pub fn unlock(&self) {
        self.state.fetch_sub(WRITE_LOCKED, Ordering::Release);
        self.sync_with_waiters();

        // One writer at a time; waking all would just stampede the CAS.
        self.gate2.notify_one();

        // Readers and an upgrader can all succeed together.
        self.gate1.notify_all();
    }

    /// Acquire a shared (read) lock. Blocks while a writer holds the mutex
    /// or an upgrade is draining; coexists with other readers and with an
    /// upgradeable holder.
    pub fn lock_shared(&self) {
        let mut guard = self.inner_lock();
        loop {
            let state = self.state.load(Ordering::Relaxed);
            if state & (WRITE_LOCKED | UPGRADE_PENDING) == 0 {
                debug_assert!(
                    state & READER_MASK != READER_MASK,
                    "reader count overflow"
                );
                match self.state.compare_exchange(
                    state,
                    state + ONE_READER,
                    Ordering::Acquire,
                    Ordering::Relaxed,
                ) {
                    Ok(_) => return,
                    // The word moved under us; re-evaluate without sleeping.
                    Err(_) => continue,
                }
            }
            guard = self.wait(&self.gate1, guard);
        }
    }

    /// Release a shared (read) lock.
    pub fn unlock_shared(&self) {
        let old = self.state.fetch_sub(ONE_READER, Ordering::Release);
        debug_assert!(old & READER_MASK != 0, "unlock_shared without a read lock");

        if old & READER_MASK == ONE_READER {
            self.sync_with_waiters();
            if old & UPGRADE_LOCKED == 0 {
                // Last holder out; a waiting writer may proceed.
                self.gate2.notify_one();
            } else {
                // Last reader out from under an upgradeable holder. If that
                // holder is draining in upgrade_to_unique it is parked on
                // gate2 next to any exclusive acquirers; notify_one could
                // hand the wakeup to a writer whose predicate then fails,
                // losing it. Wake everyone and let predicates sort it out.
                self.gate2.notify_all();
            }
        }
    }

    /// Acquire the upgradeable lock. Blocks while a writer or another
    /// upgradeable holder is present; coexists with readers.
    pub fn lock_upgrade(&self) {
        let mut guard = self.inner_lock();
        loop {
            let state = self.state.load(Ordering::Relaxed);
            if state & (WRITE_LOCKED | UPGRADE_LOCKED) == 0 {
                match self.state.compare_exchange(
                    state,
                    state | UPGRADE_LOCKED,
                    Ordering::Acquire,
                    Ordering::Relaxed,
                ) {
                    Ok(_) => return,
                    Err(_) => continue,
                }
            }
            guard = self.wait(&self.gate1, guard);
        }
    }

    /// Release the upgradeable lock.
    pub fn unlock_upgrade(&self) {
        let old = self.state.fetch_sub(UPGRADE_LOCKED, Ordering::Release);
        self.sync_with_waiters();

        // No readers were present, so the mutex went fully free and a
        // waiting writer may proceed. (The pending bit cannot be set here;
        // only upgrade_to_unique clears the upgrade flag with it.)
        if old & READER_MASK == 0 {
            self.gate2.notify_one();
        }

        // A new upgrader, or readers blocked behind a drain, may proceed.
        self.gate1.notify_all();
    }

    /// Promote the upgradeable lock to exclusive, in place.
    ///
    /// Sets the pending bit so new readers block, then waits on `gate2`
    /// for the existing readers to drain, then rewrites the word to
    /// "writer only". The caller must hold the upgradeable lock and is
    /// considered the exclusive holder once this returns.
    pub fn upgrade_to_unique(&self) {
        let mut guard = self.inner_lock();

        // From this instant new shared acquirers are held back.
        self.state.fetch_or(UPGRADE_PENDING, Ordering::Acquire);

        while self.state.load(Ordering::Relaxed) & READER_MASK != 0 {
            guard = self.wait(&self.gate2, guard);
        }

        // Swap upgrade + pending for the write flag in one store. No
        // notification: the mutex is now exclusively ours.
        self.state.store(WRITE_LOCKED, Ordering::Release);
    }

    /// Demote the exclusive lock to upgradeable, in place.
    ///
    /// The caller must hold the exclusive lock and is considered the
    /// upgradeable holder once this returns. Never blocks.
    pub fn unique_to_upgrade(&self) {
        self.state.store(UPGRADE_LOCKED, Ordering::Release);
        self.sync_with_waiters();
        self.gate1.notify_all();
    }

    /// Demote the exclusive lock to a single shared lock, in place.
    ///
    /// The caller must hold the exclusive lock and owns one read lock once
    /// this returns. Never blocks.
    pub fn unique_to_shared(&self) {
        self.state.store(ONE_READER, Ordering::Release);
        self.sync_with_waiters();
        self.gate1.notify_all();
    }
}

#[cfg(not(loom))]
impl Default for UpgradeMutex {
    fn default() -> Self {
        Self::new()
    }
}
