use serde_json::Value;

use super::{KeyValueStore, BATCHES_KEY};
use crate::ideas::IdeaBatch;

pub const MAX_BATCHES_STORED: usize = 12;

/// Newest-first list of archived generation runs, capped at
/// [`MAX_BATCHES_STORED`]; the oldest batch is evicted on overflow.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchArchive {
    batches: Vec<IdeaBatch>,
}

impl BatchArchive {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads the archive, skipping entries that no longer deserialize and
    /// falling back to an empty archive when the stored value is unusable.
    pub fn load(store: &mut dyn KeyValueStore) -> Self {
        let mut archive = Self::new();
        let Some(Value::Array(rows)) = store.get(BATCHES_KEY) else {
            return archive;
        };
        for row in rows {
            if let Ok(batch) = serde_json::from_value::<IdeaBatch>(row) {
                archive.batches.push(batch);
            }
        }
        archive.batches.truncate(MAX_BATCHES_STORED);
        archive
    }

    pub fn persist(&self, store: &mut dyn KeyValueStore) -> anyhow::Result<()> {
        store.set(BATCHES_KEY, serde_json::to_value(&self.batches)?)
    }

    /// Puts `batch` at the front and evicts whatever falls past the cap.
    pub fn record(&mut self, batch: IdeaBatch) {
        self.batches.insert(0, batch);
        self.batches.truncate(MAX_BATCHES_STORED);
    }

    pub fn get(&self, batch_id: &str) -> Option<&IdeaBatch> {
        self.batches.iter().find(|batch| batch.id == batch_id)
    }

    pub fn batches(&self) -> &[IdeaBatch] {
        self.batches.as_slice()
    }

    pub fn len(&self) -> usize {
        self.batches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }
}
