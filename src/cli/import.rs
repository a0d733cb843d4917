use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use tracing::info;

use crate::ingest::{ingest_file, IdStrategy, IngestOptions, IngestReport, RecordKind, RetryPolicy};
use crate::source::check_source_path;
use crate::store::weaviate::{WeaviateClient, WeaviateConfig};
use crate::util::env as env_util;

/// Flags shared by both loaders. Unset flags fall back to env, then defaults.
#[derive(Debug, Clone, Args)]
pub struct ImportArgs {
    /// JSON file to load (an array of records or concatenated objects)
    pub path: PathBuf,
    /// Target collection (defaults to `product` / `review`)
    #[arg(long)]
    pub collection: Option<String>,
    /// Objects per batch request (env INGEST_BATCH_SIZE, default 100)
    #[arg(long)]
    pub batch_size: Option<usize>,
    /// Log a progress line every N records, 0 disables (env PROGRESS_INTERVAL)
    #[arg(long)]
    pub progress_interval: Option<u64>,
    /// Upper bound on retry iterations (env MAX_RETRY_ITERATIONS, default 10)
    #[arg(long)]
    pub max_retries: Option<u32>,
    /// Derive object ids from each record's natural key so re-runs overwrite
    #[arg(long, default_value_t = false)]
    pub deterministic_ids: bool,
    /// Drop the collection before loading
    #[arg(long, default_value_t = false)]
    pub recreate: bool,
}

impl ImportArgs {
    pub fn options<K: RecordKind>(&self) -> IngestOptions {
        let defaults = IngestOptions::for_kind::<K>();
        IngestOptions {
            collection: self.collection.clone().unwrap_or(defaults.collection),
            batch_size: self
                .batch_size
                .unwrap_or_else(|| env_util::env_parse("INGEST_BATCH_SIZE", defaults.batch_size)),
            progress_interval: self.progress_interval.unwrap_or_else(|| {
                env_util::env_parse("PROGRESS_INTERVAL", defaults.progress_interval)
            }),
            retry: RetryPolicy {
                max_iterations: self.max_retries.unwrap_or_else(|| {
                    env_util::env_parse("MAX_RETRY_ITERATIONS", defaults.retry.max_iterations)
                }),
            },
            ids: if self.deterministic_ids {
                IdStrategy::Deterministic
            } else {
                IdStrategy::Random
            },
            recreate: self.recreate,
            vectorizer_base_url: env_util::env_opt("VECTORIZER_BASE_URL")
                .or(defaults.vectorizer_base_url),
        }
    }
}

/// Validate the path, connect, load, and always release the client.
pub async fn run<K: RecordKind>(args: ImportArgs) -> Result<IngestReport> {
    check_source_path(&args.path)?;
    let opts = args.options::<K>();

    let client = WeaviateClient::connect(WeaviateConfig::from_env())
        .await
        .context("connecting to weaviate")?;
    let result = ingest_file::<K>(&client, &args.path, &opts).await;
    client.close();

    let report = result.with_context(|| format!("importing {}", args.path.display()))?;
    info!(
        target = "ingest",
        file = %args.path.display(),
        collection = %opts.collection,
        imported = report.imported,
        retried = report.retried,
        retry_iterations = report.retry_iterations,
        skipped = report.skipped,
        anomalies = report.anomalies,
        "import complete"
    );
    Ok(report)
}
