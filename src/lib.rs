// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Pure Rust implementation of the sync_prim upgradeable mutex.
// Same state encoding and wakeup protocol as the C++ library: one packed
// 32-bit word, an internal mutex for blocking decisions, two condition
// variable gates.

mod upgrade_mutex;
pub use upgrade_mutex::UpgradeMutex;

mod rw_lock;
pub use rw_lock::{
    ReadGuard, ScopedUpgrade, UpgradableReadGuard, UpgradeRwLock, WriteGuard,
};
