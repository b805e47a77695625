//! Counters: variable-tracking entities living outside the normal cycle.
//!
//! Counter ids come from a process-wide recyclable [`IdPool`]. Creation is
//! all-or-nothing: if the pool cannot produce a valid id, or persisting the
//! pool or counter fails, no counter exists afterwards and no id leaks. A
//! counter never carries a sentinel or unset id.

pub mod pool;

pub use pool::IdPool;

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result, StorageError};
use crate::events::{Event, EventSink};
use crate::storage::Persistence;

/// A running count attached to a variable, identified by a recyclable id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counter {
    pub id: u32,
    /// Name of the variable this counter counts for.
    pub variable: String,
    pub count: i64,
}

/// Service owning the counter pool and counter persistence.
pub struct CounterService {
    store: Arc<dyn Persistence>,
    sink: Arc<dyn EventSink>,
    pool: Mutex<IdPool>,
}

impl CounterService {
    /// Construct the service, rehydrating the id pool from persistence.
    pub fn new(store: Arc<dyn Persistence>, sink: Arc<dyn EventSink>) -> Result<Self> {
        let pool = store.load_pool()?.unwrap_or_default();
        Ok(Self {
            store,
            sink,
            pool: Mutex::new(pool),
        })
    }

    fn lock_pool(&self) -> MutexGuard<'_, IdPool> {
        self.pool.lock().expect("counter pool lock poisoned")
    }

    /// Create a counter for a variable.
    ///
    /// Allocates an id, persists the pool and the counter, and only then
    /// returns the counter. Any failure rolls the allocation back in memory
    /// and surfaces the error; creation of the dependent variable must not
    /// proceed.
    pub fn create(&self, variable: &str) -> Result<Counter> {
        let mut pool = self.lock_pool();
        let id = pool.allocate()?;
        let counter = Counter {
            id,
            variable: variable.to_string(),
            count: 0,
        };
        if let Err(err) = self.persist_creation(&pool, &counter) {
            // Undo the in-memory allocation so the id is not stranded.
            let _ = pool.release(id);
            return Err(err.into());
        }
        self.sink.emit(Event::CounterAllocated {
            id,
            variable: counter.variable.clone(),
            at: Utc::now(),
        });
        Ok(counter)
    }

    fn persist_creation(&self, pool: &IdPool, counter: &Counter) -> Result<(), StorageError> {
        self.store.save_pool(pool)?;
        self.store.save_counter(counter)
    }

    /// Destroy a counter, returning its id to the recyclable set.
    ///
    /// The pool is persisted before the counter row is touched, and any
    /// persistence failure rolls the in-memory release back, so a reported
    /// error always leaves both the counter and its id intact.
    pub fn remove(&self, id: u32) -> Result<()> {
        let mut pool = self.lock_pool();
        let before = pool.clone();
        pool.release(id)?;
        if let Err(err) = self.persist_removal(&pool, id) {
            *pool = before;
            return Err(err.into());
        }
        self.sink.emit(Event::CounterReleased { id, at: Utc::now() });
        Ok(())
    }

    fn persist_removal(&self, pool: &IdPool, id: u32) -> Result<(), StorageError> {
        self.store.save_pool(pool)?;
        self.store.delete_counter(id)
    }

    /// Bump a counter's running count. Returns the new count.
    pub fn increment(&self, id: u32, by: i64) -> Result<i64> {
        let _held = self.lock_pool();
        let mut counter = self
            .store
            .load_counter(id)?
            .ok_or(CoreError::Storage(StorageError::NotFound {
                what: "counter",
                id: id.to_string(),
            }))?;
        counter.count += by;
        self.store.save_counter(&counter)?;
        Ok(counter.count)
    }

    pub fn list(&self) -> Result<Vec<Counter>> {
        Ok(self.store.list_counters()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::MemorySink;
    use crate::storage::MemoryStore;

    fn service() -> (CounterService, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let sink = Arc::new(MemorySink::new());
        let service = CounterService::new(store.clone(), sink).unwrap();
        (service, store)
    }

    #[test]
    fn test_create_assigns_sequential_then_recycled_ids() {
        let (service, _) = service();
        assert_eq!(service.create("sneezes").unwrap().id, 0);
        assert_eq!(service.create("coffees").unwrap().id, 1);

        service.remove(0).unwrap();
        // Lowest freed id comes back first.
        assert_eq!(service.create("headaches").unwrap().id, 0);
    }

    #[test]
    fn test_remove_unknown_id_is_rejected() {
        let (service, _) = service();
        assert!(service.remove(7).is_err());
    }

    #[test]
    fn test_increment_updates_running_count() {
        let (service, _) = service();
        let counter = service.create("sneezes").unwrap();
        assert_eq!(service.increment(counter.id, 1).unwrap(), 1);
        assert_eq!(service.increment(counter.id, 3).unwrap(), 4);
    }

    #[test]
    fn test_increment_unknown_counter_fails() {
        let (service, _) = service();
        assert!(service.increment(42, 1).is_err());
    }

    #[test]
    fn test_failed_persistence_aborts_creation() {
        let (service, store) = service();
        store.fail_next_save();
        assert!(service.create("sneezes").is_err());

        // Nothing was created and the id was not stranded: the next create
        // still gets id 0.
        assert!(service.list().unwrap().is_empty());
        assert_eq!(service.create("sneezes").unwrap().id, 0);
    }

    #[test]
    fn test_failed_persistence_aborts_removal() {
        let (service, store) = service();
        service.create("sneezes").unwrap();

        store.fail_next_save();
        assert!(service.remove(0).is_err());

        // The counter survives and its id stays active, in memory and
        // durably: a service rebuilt from the same store sees the counter
        // and still refuses to hand out id 0.
        assert_eq!(service.list().unwrap().len(), 1);
        let rebuilt = CounterService::new(store, Arc::new(MemorySink::new())).unwrap();
        assert_eq!(rebuilt.list().unwrap().len(), 1);
        assert_eq!(rebuilt.create("coffees").unwrap().id, 1);

        // A later attempt without the fault succeeds and recycles the id.
        service.remove(0).unwrap();
        assert_eq!(service.create("headaches").unwrap().id, 0);
    }

    #[test]
    fn test_pool_survives_service_reconstruction() {
        let store = Arc::new(MemoryStore::new());
        let sink = Arc::new(MemorySink::new());
        {
            let service = CounterService::new(store.clone(), sink.clone()).unwrap();
            service.create("sneezes").unwrap();
            service.create("coffees").unwrap();
        }
        let service = CounterService::new(store, sink).unwrap();
        assert_eq!(service.create("headaches").unwrap().id, 2);
    }
}
