// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Port of sync_prim/upgrade_mutex.hpp (lock guard templates).
// The C++ guards reference a bare mutex and the protected data lives
// elsewhere; in Rust the data moves into the lock and the guards hand out
// (mutable) references, so the type system enforces what the C++ API
// documents: one release per acquisition, transitions consume the old
// guard, a scoped upgrade cannot outlive the upgradeable hold it wraps.

use std::cell::UnsafeCell;
use std::mem;
use std::ops::{Deref, DerefMut};

use crate::UpgradeMutex;

/// Reader-writer lock with an upgradeable third mode, protecting a `T`.
///
/// Any number of [`read`](Self::read) guards may be held at once, together
/// with at most one [`upgradable_read`](Self::upgradable_read) guard. A
/// [`write`](Self::write) guard excludes everything else. The upgradable
/// guard can promote itself to a write guard without releasing, either
/// permanently with [`UpgradableReadGuard::upgrade`] or for a scope with
/// [`UpgradableReadGuard::with_upgraded`]. That closes the classic gap
/// where a reader re-checks state after reacquiring as a writer.
pub struct UpgradeRwLock<T: ?Sized> {
    raw: UpgradeMutex,
    data: UnsafeCell<T>,
}

unsafe impl<T: ?Sized + Send> Send for UpgradeRwLock<T> {}
unsafe impl<T: ?Sized + Send + Sync> Sync for UpgradeRwLock<T> {}

impl<T> UpgradeRwLock<T> {
    /// Create an unlocked lock holding `value`.
    #[cfg(not(loom))]
    pub const fn new(value: T) -> Self {
        Self {
            raw: UpgradeMutex::new(),
            data: UnsafeCell::new(value),
        }
    }

    /// Create an unlocked lock holding `value` (loom builds are not `const`).
    #[cfg(loom)]
    pub fn new(value: T) -> Self {
        Self {
            raw: UpgradeMutex::new(),
            data: UnsafeCell::new(value),
        }
    }

    /// Consume the lock and return the protected value.
    pub fn into_inner(self) -> T {
        self.data.into_inner()
    }
}

impl<T: ?Sized> UpgradeRwLock<T> {
    /// Acquire a shared read lock, blocking while a writer is present or
    /// an upgrade is draining.
    pub fn read(&self) -> ReadGuard<'_, T> {
        self.raw.lock_shared();
        ReadGuard { lock: self }
    }

    /// Acquire the upgradeable read lock, blocking while a writer or
    /// another upgradeable holder is present.
    pub fn upgradable_read(&self) -> UpgradableReadGuard<'_, T> {
        self.raw.lock_upgrade();
        UpgradableReadGuard { lock: self }
    }

    /// Acquire the exclusive write lock, blocking until every other holder
    /// is gone.
    pub fn write(&self) -> WriteGuard<'_, T> {
        self.raw.lock();
        WriteGuard { lock: self }
    }

    /// Mutable access without locking: `&mut self` proves no guard exists.
    pub fn get_mut(&mut self) -> &mut T {
        self.data.get_mut()
    }
}

#[cfg(not(loom))]
impl<T: Default> Default for UpgradeRwLock<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

/// Shared read access. Released on drop.
pub struct ReadGuard<'a, T: ?Sized> {
    lock: &'a UpgradeRwLock<T>,
}

impl<T: ?Sized> Deref for ReadGuard<'_, T> {
    type Target = T;
    fn deref(&self) -> &T {
        // Safety: a shared lock is held, so no writer can exist.
        unsafe { &*self.lock.data.get() }
    }
}

impl<T: ?Sized> Drop for ReadGuard<'_, T> {
    fn drop(&mut self) {
        self.lock.raw.unlock_shared();
    }
}

/// Upgradeable read access: read-only until upgraded. Released on drop.
pub struct UpgradableReadGuard<'a, T: ?Sized> {
    lock: &'a UpgradeRwLock<T>,
}

impl<'a, T: ?Sized> UpgradableReadGuard<'a, T> {
    /// Promote to a write guard without releasing.
    ///
    /// Blocks until the readers that were already in have drained; new
    /// readers arriving during the drain wait behind the upgrade, so a
    /// steady read load cannot starve this call.
    pub fn upgrade(self) -> WriteGuard<'a, T> {
        let lock = self.lock;
        mem::forget(self);
        lock.raw.upgrade_to_unique();
        WriteGuard { lock }
    }

    /// Run `f` with exclusive access, then return to the upgradeable hold.
    ///
    /// Equivalent to a [`ScopedUpgrade`] around the call; the downgrade
    /// runs even if `f` panics.
    pub fn with_upgraded<R>(&mut self, f: impl FnOnce(&mut T) -> R) -> R {
        let mut scope = ScopedUpgrade::new(self);
        f(&mut *scope)
    }
}

impl<T: ?Sized> Deref for UpgradableReadGuard<'_, T> {
    type Target = T;
    fn deref(&self) -> &T {
        // Safety: the upgradeable lock excludes writers; concurrent
        // readers only take shared references.
        unsafe { &*self.lock.data.get() }
    }
}

impl<T: ?Sized> Drop for UpgradableReadGuard<'_, T> {
    fn drop(&mut self) {
        self.lock.raw.unlock_upgrade();
    }
}

/// Exclusive write access. Released on drop.
pub struct WriteGuard<'a, T: ?Sized> {
    lock: &'a UpgradeRwLock<T>,
}

impl<'a, T: ?Sized> WriteGuard<'a, T> {
    /// Demote to the upgradeable read lock without releasing. Readers
    /// blocked on the lock may proceed. Never blocks.
    pub fn downgrade_to_upgradable(self) -> UpgradableReadGuard<'a, T> {
        let lock = self.lock;
        mem::forget(self);
        lock.raw.unique_to_upgrade();
        UpgradableReadGuard { lock }
    }

    /// Demote to a shared read lock without releasing. Never blocks.
    pub fn downgrade_to_read(self) -> ReadGuard<'a, T> {
        let lock = self.lock;
        mem::forget(self);
        lock.raw.unique_to_shared();
        ReadGuard { lock }
    }
}

impl<T: ?Sized> Deref for WriteGuard<'_, T> {
    type Target = T;
    fn deref(&self) -> &T {
        // Safety: the write lock is exclusive.
        unsafe { &*self.lock.data.get() }
    }
}

impl<T: ?Sized> DerefMut for WriteGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        // Safety: the write lock is exclusive.
        unsafe { &mut *self.lock.data.get() }
    }
}

impl<T: ?Sized> Drop for WriteGuard<'_, T> {
    fn drop(&mut self) {
        self.lock.raw.unlock();
    }
}

/// Temporary exclusive access inside an upgradeable hold.
///
/// Port of `sync_prim::scoped_upgrade`: construction promotes the hold to
/// exclusive, drop demotes it back to upgradeable, on every exit path.
/// The mutable borrow of the upgradable guard pins it for the duration,
/// so the scope cannot outlive the hold it wraps.
pub struct ScopedUpgrade<'a, 'b, T: ?Sized> {
    guard: &'b mut UpgradableReadGuard<'a, T>,
}

impl<'a, 'b, T: ?Sized> ScopedUpgrade<'a, 'b, T> {
    /// Promote `guard`'s hold to exclusive for the lifetime of the scope.
    pub fn new(guard: &'b mut UpgradableReadGuard<'a, T>) -> Self {
        guard.lock.raw.upgrade_to_unique();
        Self { guard }
    }
}

impl<T: ?Sized> Deref for ScopedUpgrade<'_, '_, T> {
    type Target = T;
    fn deref(&self) -> &T {
        // Safety: upgraded to exclusive in new().
        unsafe { &*self.guard.lock.data.get() }
    }
}

impl<T: ?Sized> DerefMut for ScopedUpgrade<'_, '_, T> {
    fn deref_mut(&mut self) -> &mut T {
        // Safety: upgraded to exclusive in new().
        unsafe { &mut *self.guard.lock.data.get() }
    }
}

impl<T: ?Sized> Drop for ScopedUpgrade<'_, '_, T> {
    fn drop(&mut self) {
        self.guard.lock.raw.unique_to_upgrade();
    }
}
