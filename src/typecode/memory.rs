//! In-memory store for allocator tests.
//!
//! Clones share state. [`MemoryStore::claim`] plays the part of the
//! `(allocation_domain, typecode)` unique index: a second claim of the same
//! code in the same domain fails.

use std::{
    collections::{BTreeSet, HashMap},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
};

use super::{lowest_unused, AllocationDomain, TypecodeRange, TypecodeStore};

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    used: Arc<Mutex<HashMap<AllocationDomain, BTreeSet<i32>>>>,
    fail_next: Arc<AtomicBool>,
}

impl MemoryStore {
    pub fn with_used(domain: AllocationDomain, codes: impl IntoIterator<Item = i32>) -> Self {
        let store = Self::default();
        store.extend(domain, codes);
        store
    }

    pub fn extend(&self, domain: AllocationDomain, codes: impl IntoIterator<Item = i32>) {
        self.used
            .lock()
            .unwrap()
            .entry(domain)
            .or_default()
            .extend(codes);
    }

    /// Records `code` as used. Returns `false` if it already was.
    pub fn claim(&self, domain: AllocationDomain, code: i32) -> bool {
        self.used
            .lock()
            .unwrap()
            .entry(domain)
            .or_default()
            .insert(code)
    }

    /// Makes the next lookup fail with a pool timeout.
    pub fn fail_next(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }
}

impl TypecodeStore for MemoryStore {
    async fn lowest_unused(
        &mut self,
        domain: AllocationDomain,
        range: TypecodeRange,
    ) -> Result<Option<i32>, sqlx::Error> {
        // give concurrent callers a chance to interleave between read and claim
        tokio::task::yield_now().await;

        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(sqlx::Error::PoolTimedOut);
        }

        let used = self.used.lock().unwrap();
        Ok(lowest_unused(
            range,
            used.get(&domain).into_iter().flatten().copied(),
        ))
    }
}
