use anyhow::{Context, Result};

use crate::error::Result as StoreResult;
use crate::store::weaviate::{WeaviateClient, WeaviateConfig};
use crate::store::VectorStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionCount {
    pub name: String,
    pub total: u64,
}

pub async fn collect_counts(store: &dyn VectorStore) -> StoreResult<Vec<CollectionCount>> {
    let mut out = Vec::new();
    for name in store.list_collections().await? {
        let total = store.count(&name).await?;
        out.push(CollectionCount { name, total });
    }
    Ok(out)
}

/// Name on one line, total on the next.
pub fn render(counts: &[CollectionCount]) -> String {
    let mut out = String::new();
    for c in counts {
        out.push_str(&format!("{}\n{}\n", c.name, c.total));
    }
    out
}

pub async fn run() -> Result<()> {
    let client = WeaviateClient::connect(WeaviateConfig::from_env())
        .await
        .context("connecting to weaviate")?;
    let result = collect_counts(&client).await;
    client.close();
    print!("{}", render(&result.context("counting collections")?));
    Ok(())
}
