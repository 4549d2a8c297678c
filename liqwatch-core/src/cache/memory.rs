//! In-process feature cache for tests and `--no-cache` runs.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::{validate_key, CacheError, CacheMeta, FeatureCache};
use crate::domain::FeatureTable;

#[derive(Debug, Default)]
pub struct MemoryFeatureCache {
    entries: Mutex<BTreeMap<String, (FeatureTable, CacheMeta)>>,
}

impl MemoryFeatureCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, (FeatureTable, CacheMeta)>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

impl FeatureCache for MemoryFeatureCache {
    fn name(&self) -> &str {
        "memory"
    }

    fn load(&self, ticker: &str) -> Result<Option<FeatureTable>, CacheError> {
        validate_key(ticker)?;
        Ok(self.lock().get(ticker).map(|(table, _)| table.clone()))
    }

    fn store(&self, ticker: &str, table: &FeatureTable) -> Result<(), CacheError> {
        validate_key(ticker)?;
        let meta = CacheMeta::for_table(table);
        self.lock().insert(ticker.to_string(), (table.clone(), meta));
        Ok(())
    }

    fn invalidate(&self, ticker: &str) -> Result<(), CacheError> {
        validate_key(ticker)?;
        self.lock().remove(ticker);
        Ok(())
    }

    fn entries(&self) -> Result<Vec<CacheMeta>, CacheError> {
        Ok(self.lock().values().map(|(_, meta)| meta.clone()).collect())
    }
}
