//! Free-list-backed unique-ID pool for counters.
//!
//! Two disjoint sets: ids currently assigned (`active`) and ids previously
//! assigned and now free (`freed`). Allocation reuses the lowest freed id
//! first to bound fragmentation. An overlap between the sets is corruption
//! and makes the pool instance unusable for further allocation.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::PoolError;

/// Recyclable pool of non-negative counter ids.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdPool {
    active: BTreeSet<u32>,
    freed: BTreeSet<u32>,
}

impl IdPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active(&self) -> &BTreeSet<u32> {
        &self.active
    }

    pub fn freed(&self) -> &BTreeSet<u32> {
        &self.freed
    }

    fn check(&self) -> Result<(), PoolError> {
        if let Some(&id) = self.active.intersection(&self.freed).next() {
            return Err(PoolError::Corrupted { id });
        }
        Ok(())
    }

    /// Issue a fresh id: the lowest freed id if any, otherwise 0 for an
    /// empty pool, otherwise one past the highest active id. The returned id
    /// is active before this call returns.
    pub fn allocate(&mut self) -> Result<u32, PoolError> {
        self.check()?;
        let id = if let Some(&lowest) = self.freed.iter().next() {
            self.freed.remove(&lowest);
            lowest
        } else if let Some(&highest) = self.active.iter().next_back() {
            highest + 1
        } else {
            0
        };
        if !self.active.insert(id) {
            return Err(PoolError::Corrupted { id });
        }
        Ok(id)
    }

    /// Return an active id to the recyclable set. Rejects ids that are not
    /// currently active, leaving the pool unchanged.
    pub fn release(&mut self, id: u32) -> Result<(), PoolError> {
        self.check()?;
        if !self.active.remove(&id) {
            return Err(PoolError::ReleaseOfInactiveId { id });
        }
        self.freed.insert(id);
        Ok(())
    }
}
