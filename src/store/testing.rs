//! In-memory [`VectorStore`] for unit tests.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{Map, Value};
use uuid::Uuid;

use super::schema::CollectionSchema;
use super::{ObjectOutcome, StoreObject, VectorStore};
use crate::error::{IngestError, Result};

#[derive(Default)]
struct State {
    collections: HashSet<String>,
    objects: HashMap<String, BTreeMap<Uuid, Map<String, Value>>>,
    /// asin -> remaining rejections (`u32::MAX` = always)
    rejections: HashMap<String, u32>,
    create_calls: usize,
    delete_calls: usize,
    insert_calls: usize,
}

#[derive(Default)]
pub(crate) struct ScriptedStore {
    state: Mutex<State>,
    offline: bool,
}

impl ScriptedStore {
    pub(crate) fn offline() -> Self {
        Self {
            offline: true,
            ..Self::default()
        }
    }

    /// Reject the object whose `asin` property equals `asin` the next `times` writes.
    pub(crate) fn reject(self, asin: &str, times: u32) -> Self {
        self.state
            .lock()
            .unwrap()
            .rejections
            .insert(asin.to_string(), times);
        self
    }

    pub(crate) fn reject_always(self, asin: &str) -> Self {
        self.reject(asin, u32::MAX)
    }

    pub(crate) fn create_calls(&self) -> usize {
        self.state.lock().unwrap().create_calls
    }

    pub(crate) fn delete_calls(&self) -> usize {
        self.state.lock().unwrap().delete_calls
    }

    pub(crate) fn insert_calls(&self) -> usize {
        self.state.lock().unwrap().insert_calls
    }

    pub(crate) fn stored(&self, collection: &str) -> BTreeMap<Uuid, Map<String, Value>> {
        self.state
            .lock()
            .unwrap()
            .objects
            .get(collection)
            .cloned()
            .unwrap_or_default()
    }

    pub(crate) fn stored_asins(&self, collection: &str) -> Vec<String> {
        let mut asins: Vec<String> = self
            .stored(collection)
            .values()
            .filter_map(|p| p.get("asin").and_then(Value::as_str).map(str::to_string))
            .collect();
        asins.sort();
        asins
    }
}

#[async_trait]
impl VectorStore for ScriptedStore {
    async fn is_live(&self) -> Result<bool> {
        Ok(!self.offline)
    }

    async fn collection_exists(&self, name: &str) -> Result<bool> {
        if self.offline {
            return Err(IngestError::Connection("offline".into()));
        }
        Ok(self.state.lock().unwrap().collections.contains(name))
    }

    async fn create_collection(&self, schema: &CollectionSchema) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.create_calls += 1;
        if !state.collections.insert(schema.name.clone()) {
            return Err(IngestError::Store {
                status: 422,
                body: format!("class {} already exists", schema.class_name()),
            });
        }
        Ok(())
    }

    async fn delete_collection(&self, name: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.delete_calls += 1;
        state.collections.remove(name);
        state.objects.remove(name);
        Ok(())
    }

    async fn insert_batch(&self, collection: &str, objects: &[StoreObject]) -> Vec<ObjectOutcome> {
        let mut state = self.state.lock().unwrap();
        state.insert_calls += 1;
        let mut outcomes = Vec::with_capacity(objects.len());
        for obj in objects {
            let asin = obj
                .properties
                .get("asin")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            if let Some(remaining) = state.rejections.get_mut(&asin) {
                if *remaining > 0 {
                    if *remaining != u32::MAX {
                        *remaining -= 1;
                    }
                    outcomes.push(ObjectOutcome::Rejected(format!("rejected {asin}")));
                    continue;
                }
            }
            state
                .objects
                .entry(collection.to_string())
                .or_default()
                .insert(obj.id, obj.properties.clone());
            outcomes.push(ObjectOutcome::Accepted);
        }
        outcomes
    }

    async fn list_collections(&self) -> Result<Vec<String>> {
        let mut names: Vec<_> = self.state.lock().unwrap().collections.iter().cloned().collect();
        names.sort();
        Ok(names)
    }

    async fn count(&self, name: &str) -> Result<u64> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .objects
            .get(name)
            .map_or(0, |o| o.len() as u64))
    }
}
