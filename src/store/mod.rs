//! Narrow interface to the vector database plus the Weaviate implementation.

pub mod batch;
pub mod query;
pub mod schema;
pub mod weaviate;

#[cfg(test)]
pub(crate) mod testing;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::info;
use uuid::Uuid;

use crate::error::Result;
use schema::CollectionSchema;

/// One object queued for insertion.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreObject {
    pub id: Uuid,
    pub properties: Map<String, Value>,
}

/// Per-object result of a batch insert, in submission order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObjectOutcome {
    Accepted,
    Rejected(String),
}

/// Operations the loaders need from the vector database.
#[async_trait]
pub trait VectorStore: Send + Sync {
    async fn is_live(&self) -> Result<bool>;

    async fn collection_exists(&self, name: &str) -> Result<bool>;

    async fn create_collection(&self, schema: &CollectionSchema) -> Result<()>;

    async fn delete_collection(&self, name: &str) -> Result<()>;

    /// Write `objects` and report one outcome per object.
    ///
    /// Never fails as a whole: a request that cannot be delivered marks every
    /// object in it as rejected so the retry loop can pick them up.
    async fn insert_batch(&self, collection: &str, objects: &[StoreObject]) -> Vec<ObjectOutcome>;

    async fn list_collections(&self) -> Result<Vec<String>>;

    async fn count(&self, name: &str) -> Result<u64>;
}

/// Create the collection unless it already exists. With `recreate`, an
/// existing collection is dropped first. Returns whether a create happened.
pub async fn ensure_collection(
    store: &dyn VectorStore,
    schema: &CollectionSchema,
    recreate: bool,
) -> Result<bool> {
    if store.collection_exists(&schema.name).await? {
        if !recreate {
            info!(target = "store", collection = %schema.name, "collection exists");
            return Ok(false);
        }
        info!(target = "store", collection = %schema.name, "dropping existing collection");
        store.delete_collection(&schema.name).await?;
    }
    info!(target = "store", collection = %schema.name, "creating collection");
    store.create_collection(schema).await?;
    Ok(true)
}
