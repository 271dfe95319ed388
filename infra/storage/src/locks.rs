//! Mutual exclusion for check-then-act sequences.
//!
//! Two layers:
//! - a store-wide gate: bulk operations (delete-all, clearing restore) hold it
//!   exclusively, every other mutation holds it shared;
//! - striped mutexes keyed by resolved path, held across validate + mutate of
//!   a single object.
//!
//! Guards release on drop, so every exit path (including `?`) unlocks.

use fxhash::FxHasher;
use std::hash::{Hash, Hasher};
use std::path::Path;
use tokio::sync::{Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};

const STRIPES: usize = 64;

#[derive(Debug)]
pub(crate) struct PathLocks {
    gate: RwLock<()>,
    stripes: Box<[Mutex<()>]>,
}

/// Held guards for one or two paths.
#[derive(Debug)]
pub(crate) struct PathGuards<'a> {
    _first: MutexGuard<'a, ()>,
    _second: Option<MutexGuard<'a, ()>>,
}

impl PathLocks {
    pub(crate) fn new() -> Self {
        Self { gate: RwLock::new(()), stripes: (0..STRIPES).map(|_| Mutex::new(())).collect() }
    }

    pub(crate) async fn shared(&self) -> RwLockReadGuard<'_, ()> {
        self.gate.read().await
    }

    pub(crate) async fn exclusive(&self) -> RwLockWriteGuard<'_, ()> {
        self.gate.write().await
    }

    pub(crate) async fn lock(&self, path: &Path) -> PathGuards<'_> {
        PathGuards { _first: self.stripes[stripe_of(path)].lock().await, _second: None }
    }

    /// Locks two paths in stripe order so concurrent moves in opposite
    /// directions cannot deadlock.
    pub(crate) async fn lock_pair(&self, a: &Path, b: &Path) -> PathGuards<'_> {
        let (low, high) = {
            let (x, y) = (stripe_of(a), stripe_of(b));
            if x <= y { (x, y) } else { (y, x) }
        };

        let first = self.stripes[low].lock().await;
        let second = if low == high { None } else { Some(self.stripes[high].lock().await) };
        PathGuards { _first: first, _second: second }
    }
}

fn stripe_of(path: &Path) -> usize {
    let mut hasher = FxHasher::default();
    path.hash(&mut hasher);
    (hasher.finish() as usize) % STRIPES
}
