// Copyright 2024 - Shroud Network <dev@shroud.network>
// SPDX-License-Identifier: Apache-2.0

//! Process-wide bring-up and teardown of the crypto layer.
//!
//! [`initialize`] is idempotent and must run before any primitive is used:
//! it installs the shared-lock bridge, optionally probes for accelerated
//! backends, and performs the startup seeding of the CSPRNG. [`teardown`]
//! releases everything and is safe to call even after a failed or partial
//! initialization.

use std::sync::Mutex;

use thiserror::Error;
use tracing::{debug, info};

use crate::random::{self, RandomError};

/// Whether to look for hardware-accelerated implementations at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acceleration {
    /// Use the default implementations.
    Off,
    /// Probe for accelerated backends and log what each primitive uses.
    On,
    /// As [`Acceleration::Off`], but without announcing the decision; for
    /// callers that bring the library up before their configuration is
    /// parsed.
    Tentative,
}

#[derive(Debug, Error)]
pub enum GlobalError {
    #[error("failed to seed the random number generator: {0}")]
    Seed(#[from] RandomError),
}

static INITIALIZED: Mutex<bool> = Mutex::new(false);

/// Bring the crypto layer up. Subsequent calls after a successful first
/// return immediately.
pub fn initialize(accel: Acceleration) -> Result<(), GlobalError> {
    let mut initialized = INITIALIZED.lock().expect("global init lock poisoned");
    if *initialized {
        return Ok(());
    }

    // Locks must exist before any backend can be driven from two threads.
    locking::install(backend_lock_count());

    match accel {
        Acceleration::On => {
            info!("Initializing crypto acceleration support.");
            for (primitive, backend) in probe_backends() {
                info!("Using {backend} for {primitive}");
            }
        }
        Acceleration::Tentative => debug!("Initializing crypto library."),
        Acceleration::Off => {}
    }

    random::seed_rng(true)?;
    *initialized = true;
    Ok(())
}

/// Tear the crypto layer down: neutralize the lock bridge and wipe the
/// seeded generator.
pub fn teardown() {
    let mut initialized = INITIALIZED.lock().expect("global init lock poisoned");
    locking::uninstall();
    random::unseed();
    *initialized = false;
}

/// How many shared locks the backing primitives ask us to manage. The
/// pure-Rust backends carry their own synchronization and request none;
/// a bridged engine backend raises this.
fn backend_lock_count() -> usize {
    0
}

fn probe_backends() -> [(&'static str, &'static str); 5] {
    let aes = if cpu_has_aes() {
        "hardware AES instructions"
    } else {
        "the software implementation"
    };
    let sha = if cpu_has_sha() {
        "hardware SHA extensions"
    } else {
        "the software compression function"
    };
    [
        ("RSA", "the portable bignum implementation"),
        ("DH", "the portable bignum implementation"),
        ("RAND", "the seeded ChaCha generator"),
        ("SHA1", sha),
        ("AES", aes),
    ]
}

#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
fn cpu_has_aes() -> bool {
    std::arch::is_x86_feature_detected!("aes")
}

#[cfg(not(any(target_arch = "x86", target_arch = "x86_64")))]
fn cpu_has_aes() -> bool {
    false
}

#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
fn cpu_has_sha() -> bool {
    std::arch::is_x86_feature_detected!("sha")
}

#[cfg(not(any(target_arch = "x86", target_arch = "x86_64")))]
fn cpu_has_sha() -> bool {
    false
}

pub mod locking {
    //! Shared-lock bridge for backends that cannot carry their own
    //! synchronization.
    //!
    //! The table is installed at initialization and *neutralized, never
    //! freed*, at teardown: a lock request arriving during late shutdown
    //! gets `None` back instead of touching a dead table.

    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Mutex, MutexGuard, OnceLock};

    struct LockTable {
        locks: OnceLock<Vec<Mutex<()>>>,
        active: AtomicBool,
    }

    impl LockTable {
        const fn new() -> Self {
            LockTable {
                locks: OnceLock::new(),
                active: AtomicBool::new(false),
            }
        }

        fn install(&self, n: usize) {
            let _ = self.locks.set((0..n).map(|_| Mutex::new(())).collect());
            self.active.store(true, Ordering::Release);
        }

        fn lock(&self, n: usize) -> Option<MutexGuard<'_, ()>> {
            if !self.active.load(Ordering::Acquire) {
                return None;
            }
            let locks = self.locks.get()?;
            locks.get(n).map(|m| m.lock().expect("backend lock poisoned"))
        }

        fn uninstall(&self) {
            self.active.store(false, Ordering::Release);
        }
    }

    static TABLE: LockTable = LockTable::new();

    pub fn install(n: usize) {
        TABLE.install(n);
    }

    /// Acquire shared lock `n`; dropping the guard releases it. Returns
    /// `None`, silently, once the table has been torn down or for an
    /// out-of-range index.
    pub fn lock(n: usize) -> Option<MutexGuard<'static, ()>> {
        TABLE.lock(n)
    }

    pub fn uninstall() {
        TABLE.uninstall();
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn locks_work_until_uninstalled_and_stay_null_safe_after() {
            let table = LockTable::new();

            // not installed yet: silently absent
            assert!(table.lock(0).is_none());

            table.install(4);
            {
                let _guard = table.lock(2).expect("installed lock must be acquirable");
            }
            assert!(table.lock(3).is_some());
            assert!(table.lock(4).is_none());

            table.uninstall();
            assert!(table.lock(2).is_none());

            // reinstalling reactivates the leaked table
            table.install(4);
            assert!(table.lock(2).is_some());
        }

        #[test]
        fn distinct_indices_are_independent() {
            let table = LockTable::new();
            table.install(2);
            let _a = table.lock(0).unwrap();
            // holding lock 0 must not block lock 1
            let _b = table.lock(1).unwrap();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initialize_is_idempotent() {
        initialize(Acceleration::Off).unwrap();
        initialize(Acceleration::On).unwrap();
        initialize(Acceleration::Tentative).unwrap();

        let mut buf = [0u8; 8];
        random::random_bytes(&mut buf).expect("initialize must seed the generator");
    }
}
