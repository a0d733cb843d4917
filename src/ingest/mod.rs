//! File → store ingestion runs.
//!
//! A run moves through `Idle → SchemaEnsured → Streaming → Flushed`, then
//! `(RetryPending(n) → Flushed)*`, and ends in `Done` or `StuckAborted`.

pub mod progress;
pub mod retry;

use std::io::BufRead;
use std::path::Path;

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::Result;
use crate::normalization::{
    normalize_product, normalize_review, Normalized, ProductRecord, ReviewRecord,
};
use crate::source::{JsonRecordSource, RawRecord};
use crate::store::batch::BatchSink;
use crate::store::schema::{product_schema, review_schema, CollectionSchema};
use crate::store::{ensure_collection, VectorStore};
use progress::ProgressReporter;
pub use retry::{RetryOutcome, RetryPolicy};

/// One kind of record file and the collection it loads into.
pub trait RecordKind {
    type Record: Serialize;

    /// Plural used in progress lines.
    const NOUN: &'static str;
    const DEFAULT_COLLECTION: &'static str;

    fn schema(collection: &str, vectorizer_base_url: Option<&str>) -> CollectionSchema;
    fn normalize(raw: &RawRecord) -> Normalized<Self::Record>;
    fn natural_key(record: &Self::Record) -> Option<String>;
}

pub struct Products;

impl RecordKind for Products {
    type Record = ProductRecord;
    const NOUN: &'static str = "products";
    const DEFAULT_COLLECTION: &'static str = "product";

    fn schema(collection: &str, vectorizer_base_url: Option<&str>) -> CollectionSchema {
        product_schema(collection, vectorizer_base_url)
    }

    fn normalize(raw: &RawRecord) -> Normalized<ProductRecord> {
        normalize_product(raw)
    }

    fn natural_key(record: &ProductRecord) -> Option<String> {
        record.asin.clone()
    }
}

pub struct Reviews;

impl RecordKind for Reviews {
    type Record = ReviewRecord;
    const NOUN: &'static str = "reviews";
    const DEFAULT_COLLECTION: &'static str = "review";

    fn schema(collection: &str, vectorizer_base_url: Option<&str>) -> CollectionSchema {
        review_schema(collection, vectorizer_base_url)
    }

    fn normalize(raw: &RawRecord) -> Normalized<ReviewRecord> {
        normalize_review(raw)
    }

    fn natural_key(record: &ReviewRecord) -> Option<String> {
        record.natural_key()
    }
}

/// How object ids are chosen on first submission.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum IdStrategy {
    /// Random v4 id per object; re-running a file duplicates it.
    #[default]
    Random,
    /// v5 id from the record's natural key, so re-runs overwrite.
    /// Records without a key fall back to a random id.
    Deterministic,
}

impl IdStrategy {
    pub fn assign(self, natural_key: Option<&str>) -> Uuid {
        match (self, natural_key) {
            (IdStrategy::Deterministic, Some(key)) => {
                Uuid::new_v5(&Uuid::NAMESPACE_DNS, key.as_bytes())
            }
            _ => Uuid::new_v4(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestOptions {
    pub collection: String,
    pub batch_size: usize,
    pub progress_interval: u64,
    pub retry: RetryPolicy,
    pub ids: IdStrategy,
    /// Drop and recreate the collection before loading.
    pub recreate: bool,
    pub vectorizer_base_url: Option<String>,
}

impl IngestOptions {
    pub fn for_kind<K: RecordKind>() -> Self {
        Self {
            collection: K::DEFAULT_COLLECTION.to_string(),
            batch_size: 100,
            progress_interval: 100,
            retry: RetryPolicy::default(),
            ids: IdStrategy::Random,
            recreate: false,
            vectorizer_base_url: Some("http://host.docker.internal:1234".into()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestState {
    Idle,
    SchemaEnsured,
    Streaming,
    Flushed,
    RetryPending(u32),
    Done,
    StuckAborted,
}

/// Current state of one run, tagged with the file it is loading.
#[derive(Debug)]
pub(crate) struct RunState {
    label: String,
    current: IngestState,
}

impl RunState {
    pub(crate) fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            current: IngestState::Idle,
        }
    }

    pub(crate) fn label(&self) -> &str {
        &self.label
    }

    pub(crate) fn current(&self) -> IngestState {
        self.current
    }

    pub(crate) fn advance(&mut self, next: IngestState) {
        debug!(
            target = "ingest",
            file = %self.label,
            from = ?self.current,
            to = ?next,
            "state transition"
        );
        self.current = next;
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestReport {
    pub state: IngestState,
    pub collection_created: bool,
    pub imported: u64,
    pub retried: u64,
    pub retry_iterations: u32,
    /// Source values that were not JSON objects.
    pub skipped: u64,
    /// Fields degraded during normalization.
    pub anomalies: u64,
}

fn into_properties<T: Serialize>(record: &T) -> Map<String, Value> {
    match serde_json::to_value(record) {
        Ok(Value::Object(map)) => map,
        _ => Map::new(),
    }
}

/// Load one file into the store. The path is validated before the store is
/// touched.
pub async fn ingest_file<K: RecordKind>(
    store: &dyn VectorStore,
    path: &Path,
    opts: &IngestOptions,
) -> Result<IngestReport> {
    let source = JsonRecordSource::open(path)?;
    let label = path.display().to_string();
    let mut progress = ProgressReporter::new(label.clone(), K::NOUN, opts.progress_interval);
    ingest_records::<K, _>(store, &label, source, opts, &mut progress).await
}

/// Core of a run over an already-open source.
pub async fn ingest_records<K: RecordKind, R: BufRead>(
    store: &dyn VectorStore,
    label: &str,
    mut source: JsonRecordSource<R>,
    opts: &IngestOptions,
    progress: &mut ProgressReporter,
) -> Result<IngestReport> {
    let mut state = RunState::new(label);

    let schema = K::schema(&opts.collection, opts.vectorizer_base_url.as_deref());
    let collection_created = ensure_collection(store, &schema, opts.recreate).await?;
    state.advance(IngestState::SchemaEnsured);

    let mut sink = BatchSink::new(store, opts.collection.clone(), opts.batch_size);
    let mut anomalies = 0u64;

    info!(target = "ingest", file = label, collection = %opts.collection, "opening source");
    state.advance(IngestState::Streaming);
    let mut batch = sink.open_batch();
    for raw in source.by_ref() {
        let raw = match raw {
            Ok(raw) => raw,
            Err(e) => {
                // queued and rejected records still go out before the run ends
                let failed = batch.finish().await;
                state.advance(IngestState::Flushed);
                if failed > 0 {
                    warn!(
                        target = "ingest",
                        file = label,
                        failed,
                        "source unreadable; retrying rejected records before aborting"
                    );
                    let retried =
                        retry::retry_failed(&mut sink, opts.retry, progress, &mut state).await;
                    if let Err(stuck) = retried {
                        warn!(
                            target = "ingest",
                            file = label,
                            error = %stuck,
                            "rejected records lost"
                        );
                    }
                }
                return Err(e);
            }
        };
        let normalized = K::normalize(&raw);
        for anomaly in &normalized.anomalies {
            debug!(
                target = "normalize",
                file = label,
                field = anomaly.field,
                found = %anomaly.found,
                "field degraded"
            );
        }
        anomalies += normalized.anomalies.len() as u64;

        let id = opts.ids.assign(K::natural_key(&normalized.record).as_deref());
        batch.add(into_properties(&normalized.record), Some(id)).await;
        progress.record_imported();
    }
    info!(target = "ingest", file = label, "flushing batch");
    let failed = batch.finish().await;
    state.advance(IngestState::Flushed);
    info!(
        target = "ingest",
        file = label,
        imported = progress.imported(),
        failed,
        "initial load flushed"
    );

    let outcome = retry::retry_failed(&mut sink, opts.retry, progress, &mut state).await?;
    state.advance(IngestState::Done);

    Ok(IngestReport {
        state: state.current(),
        collection_created,
        imported: progress.imported(),
        retried: progress.retried(),
        retry_iterations: outcome.iterations,
        skipped: source.skipped(),
        anomalies,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::IngestError;
    use crate::store::testing::ScriptedStore;
    use std::io::Cursor;

    fn source(input: &str) -> JsonRecordSource<Cursor<Vec<u8>>> {
        JsonRecordSource::from_reader(Cursor::new(input.as_bytes().to_vec()))
    }

    fn opts<K: RecordKind>() -> IngestOptions {
        IngestOptions {
            batch_size: 2,
            vectorizer_base_url: None,
            ..IngestOptions::for_kind::<K>()
        }
    }

    #[tokio::test]
    async fn rejected_record_is_retried_into_place() {
        let input = r#"[
            {"asin": "A1", "title": "first", "category": "Music"},
            {"asin": "A2", "title": "second", "rank": ["1", "2"]},
            {"asin": "A3", "title": "third", "rank": 42}
        ]"#;
        let store = ScriptedStore::default().reject("A2", 1);
        let mut progress = ProgressReporter::silent();

        let report = ingest_records::<Products, _>(
            &store,
            "products.json",
            source(input),
            &opts::<Products>(),
            &mut progress,
        )
        .await
        .unwrap();

        assert_eq!(report.state, IngestState::Done);
        assert!(report.collection_created);
        assert_eq!(report.imported, 3);
        assert_eq!(report.retried, 1);
        assert_eq!(report.retry_iterations, 1);
        assert_eq!(report.anomalies, 1);
        assert_eq!(store.stored_asins("product"), vec!["A1", "A2", "A3"]);

        let stored = store.stored("product");
        let first = stored
            .values()
            .find(|p| p["asin"] == "A1")
            .unwrap();
        assert_eq!(first["category"], serde_json::json!(["Music"]));
    }

    #[tokio::test]
    async fn permanently_rejected_record_aborts_the_run() {
        let store = ScriptedStore::default().reject_always("R2");
        let input = r#"{"asin": "R1", "overall": 5.0}
{"asin": "R2", "overall": "4"}"#;

        let err = ingest_records::<Reviews, _>(
            &store,
            "reviews.json",
            source(input),
            &opts::<Reviews>(),
            &mut ProgressReporter::silent(),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, IngestError::StuckRetry { remaining: 1, .. }));
        assert_eq!(store.stored_asins("review"), vec!["R1"]);
    }

    #[tokio::test]
    async fn parse_failure_flushes_what_was_queued() {
        let store = ScriptedStore::default();
        let err = ingest_records::<Products, _>(
            &store,
            "broken.json",
            source(r#"[{"asin": "A1"}, {"asin": "#),
            &opts::<Products>(),
            &mut ProgressReporter::silent(),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, IngestError::Parse { index: 2, .. }));
        assert_eq!(store.stored_asins("product"), vec!["A1"]);
    }

    #[tokio::test]
    async fn parse_failure_still_retries_rejected_records() {
        let store = ScriptedStore::default().reject("A1", 1);
        let err = ingest_records::<Products, _>(
            &store,
            "broken.json",
            source(r#"[{"asin": "A1"}, {"asin": "A2"}, {"asin": "#),
            &opts::<Products>(),
            &mut ProgressReporter::silent(),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, IngestError::Parse { index: 3, .. }));
        assert_eq!(store.stored_asins("product"), vec!["A1", "A2"]);
    }

    #[tokio::test]
    async fn deterministic_ids_overwrite_on_rerun() {
        let store = ScriptedStore::default();
        let input = r#"[{"asin": "A1"}, {"asin": "A2"}]"#;
        let opts = IngestOptions {
            ids: IdStrategy::Deterministic,
            ..opts::<Products>()
        };
        for _ in 0..2 {
            ingest_records::<Products, _>(
                &store,
                "p.json",
                source(input),
                &opts,
                &mut ProgressReporter::silent(),
            )
            .await
            .unwrap();
        }
        assert_eq!(store.stored("product").len(), 2);
        assert_eq!(store.create_calls(), 1);
    }

    #[tokio::test]
    async fn existing_collection_is_reused() {
        let store = ScriptedStore::default();
        ensure_collection(&store, &product_schema("product", None), false)
            .await
            .unwrap();

        let report = ingest_records::<Products, _>(
            &store,
            "p.json",
            source("[]"),
            &opts::<Products>(),
            &mut ProgressReporter::silent(),
        )
        .await
        .unwrap();
        assert!(!report.collection_created);
        assert_eq!(report.imported, 0);
        assert_eq!(report.state, IngestState::Done);
    }

    #[test]
    fn deterministic_ids_are_stable() {
        let a = IdStrategy::Deterministic.assign(Some("0001393774"));
        let b = IdStrategy::Deterministic.assign(Some("0001393774"));
        assert_eq!(a, b);
        assert_ne!(a, IdStrategy::Random.assign(Some("0001393774")));
        assert_eq!(a.get_version_num(), 5);
    }
}
