//! Sequential id allocation for newly seeded merged-index parents.
//!
//! Promotion of an unmatched place creates a new parent document under a
//! fresh numeric id. Ids are handed out by an [`IdAllocator`] owned by
//! the caller (never a process-wide counter), and the provided
//! implementation reads the index maximum once and then increments
//! atomically, so concurrent runs within one process cannot assign
//! colliding ids. Cross-process deployments must route all seeding
//! through a single writer.

use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;

use crate::error::AlignError;
use crate::index::gateway::SearchIndexGateway;

/// Hands out fresh sequential numeric ids for seed parents.
#[async_trait]
pub trait IdAllocator: Send + Sync {
    async fn next_id(&self) -> Result<i64, AlignError>;
}

/// Atomic-increment allocator seeded from the index's current maximum id.
pub struct AtomicSeedAllocator {
    next: AtomicI64,
}

impl AtomicSeedAllocator {
    /// Start allocating from `start` (the first id returned).
    pub fn starting_at(start: i64) -> Self {
        Self { next: AtomicI64::new(start) }
    }

    /// Read the current maximum of `field` in `index` and allocate from
    /// max + 1.
    pub async fn from_index(
        gateway: &dyn SearchIndexGateway,
        index: &str,
        field: &str,
    ) -> Result<Self, AlignError> {
        let max = gateway.max_numeric_id(index, field).await?;
        Ok(Self::starting_at(max + 1))
    }
}

#[async_trait]
impl IdAllocator for AtomicSeedAllocator {
    async fn next_id(&self) -> Result<i64, AlignError> {
        Ok(self.next.fetch_add(1, Ordering::SeqCst))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn ids_are_sequential_and_unique() {
        let alloc = AtomicSeedAllocator::starting_at(100);
        assert_eq!(alloc.next_id().await.unwrap(), 100);
        assert_eq!(alloc.next_id().await.unwrap(), 101);
        assert_eq!(alloc.next_id().await.unwrap(), 102);
    }

    #[tokio::test]
    async fn concurrent_allocation_never_collides() {
        use std::collections::HashSet;
        use std::sync::Arc;

        let alloc = Arc::new(AtomicSeedAllocator::starting_at(1));
        let mut handles = Vec::new();
        for _ in 0..8 {
            let a = Arc::clone(&alloc);
            handles.push(tokio::spawn(async move {
                let mut got = Vec::new();
                for _ in 0..50 {
                    got.push(a.next_id().await.unwrap());
                }
                got
            }));
        }
        let mut seen = HashSet::new();
        for h in handles {
            for id in h.await.unwrap() {
                assert!(seen.insert(id), "id {id} allocated twice");
            }
        }
        assert_eq!(seen.len(), 400);
    }
}
