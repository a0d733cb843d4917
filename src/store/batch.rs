//! Scoped batch writer with failed-object tracking.
//!
//! A [`BatchSink`] owns the failure list for one collection. Opening a
//! [`BatchScope`] clears that list, so callers that want to resubmit failures
//! must copy them out first.

use serde_json::{Map, Value};
use tracing::{debug, error};
use uuid::Uuid;

use super::{ObjectOutcome, StoreObject, VectorStore};

/// A record the store refused during a flush.
#[derive(Debug, Clone, PartialEq)]
pub struct FailedSubmission {
    pub id: Uuid,
    pub properties: Map<String, Value>,
    pub message: String,
}

pub struct BatchSink<'s> {
    store: &'s dyn VectorStore,
    collection: String,
    batch_size: usize,
    failed: Vec<FailedSubmission>,
}

impl<'s> BatchSink<'s> {
    pub fn new(
        store: &'s dyn VectorStore,
        collection: impl Into<String>,
        batch_size: usize,
    ) -> Self {
        Self {
            store,
            collection: collection.into(),
            batch_size: batch_size.max(1),
            failed: Vec::new(),
        }
    }

    /// Start a new batch. Clears failures left over from the previous one.
    pub fn open_batch(&mut self) -> BatchScope<'_, 's> {
        self.failed.clear();
        let capacity = self.batch_size;
        BatchScope {
            sink: self,
            buffer: Vec::with_capacity(capacity),
        }
    }

    /// Failures recorded since the current batch was opened.
    pub fn failed_objects(&self) -> &[FailedSubmission] {
        &self.failed
    }

    async fn send(&mut self, objects: Vec<StoreObject>) {
        let outcomes = self.store.insert_batch(&self.collection, &objects).await;
        let mut rejected = 0usize;
        let mut outcomes = outcomes.into_iter();
        for obj in objects {
            let message = match outcomes.next() {
                Some(ObjectOutcome::Accepted) => continue,
                Some(ObjectOutcome::Rejected(message)) => message,
                None => "no result returned for object".to_string(),
            };
            rejected += 1;
            self.failed.push(FailedSubmission {
                id: obj.id,
                properties: obj.properties,
                message,
            });
        }
        debug!(
            target = "store",
            collection = %self.collection,
            rejected,
            "batch flushed"
        );
    }
}

/// Accumulation window for one batch.
///
/// Call [`BatchScope::finish`] to close it; that flushes whatever is still
/// queued.
pub struct BatchScope<'a, 's> {
    sink: &'a mut BatchSink<'s>,
    buffer: Vec<StoreObject>,
}

impl BatchScope<'_, '_> {
    /// Queue an object, sending a full batch when the threshold is reached.
    /// A missing `id` gets a fresh random one; the id used is returned.
    pub async fn add(&mut self, properties: Map<String, Value>, id: Option<Uuid>) -> Uuid {
        let id = id.unwrap_or_else(Uuid::new_v4);
        self.buffer.push(StoreObject { id, properties });
        if self.buffer.len() >= self.sink.batch_size {
            self.flush().await;
        }
        id
    }

    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// Send everything queued so far.
    pub async fn flush(&mut self) {
        if self.buffer.is_empty() {
            return;
        }
        let pending = std::mem::replace(&mut self.buffer, Vec::with_capacity(self.sink.batch_size));
        self.sink.send(pending).await;
    }

    /// Flush and close the scope. Returns the number of failed objects.
    pub async fn finish(mut self) -> usize {
        self.flush().await;
        self.sink.failed.len()
    }
}

impl Drop for BatchScope<'_, '_> {
    fn drop(&mut self) {
        if !self.buffer.is_empty() {
            error!(
                target = "store",
                collection = %self.sink.collection,
                unsent = self.buffer.len(),
                "batch scope dropped without finish(); queued objects were not sent"
            );
        }
    }
}
