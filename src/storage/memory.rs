//! In-process item store.
//!
//! Stands in for browser `localStorage`: used by short-lived clients that
//! only mirror the host, and by tests.

use crate::error::Result;
use crate::model::Item;

use super::ItemStore;

/// Item store that keeps the array in memory.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    items: Vec<Item>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with `items`.
    #[must_use]
    pub fn with_items(items: Vec<Item>) -> Self {
        Self { items }
    }
}

impl ItemStore for MemoryStore {
    fn load(&self) -> Result<Vec<Item>> {
        Ok(self.items.clone())
    }

    fn store(&mut self, items: &[Item]) -> Result<()> {
        self.items = items.to_vec();
        Ok(())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}
