//! Weaviate REST/GraphQL client.
//!
//! Endpoints used:
//! - GET    /v1/.well-known/live   liveness
//! - GET    /v1/meta               server version (logged once)
//! - GET    /v1/schema[/{class}]   list / existence
//! - POST   /v1/schema             create class
//! - DELETE /v1/schema/{class}     drop class
//! - POST   /v1/batch/objects      batch insert
//! - POST   /v1/graphql            aggregate counts and queries

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client, RequestBuilder, StatusCode};
use serde_json::{json, Value};
use tracing::{debug, info, instrument, warn};

use super::query::{parse_get_response, GetQuery, QueryHit};
use super::schema::{class_name, CollectionSchema};
use super::{ObjectOutcome, StoreObject, VectorStore};
use crate::error::{IngestError, Result};
use crate::util::env::{env_opt, env_parse};

fn truncate_for_log(mut s: String, max_len: usize) -> String {
    if s.len() > max_len {
        let mut cut = max_len;
        while !s.is_char_boundary(cut) {
            cut -= 1;
        }
        s.truncate(cut);
        s.push('…');
    }
    s
}

#[derive(Debug, Clone)]
pub struct WeaviateConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    /// Forwarded as `X-OpenAI-Api-Key` for the vectorizer module.
    pub openai_api_key: Option<String>,
    pub init_timeout: Duration,
    pub query_timeout: Duration,
    pub insert_timeout: Duration,
}

impl Default for WeaviateConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".into(),
            api_key: None,
            // a local LM Studio endpoint ignores the key but the module wants one
            openai_api_key: Some("NO_KEY_NEEDED_FOR_LM_STUDIO".into()),
            init_timeout: Duration::from_secs(30),
            query_timeout: Duration::from_secs(60),
            insert_timeout: Duration::from_secs(120),
        }
    }
}

impl WeaviateConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            base_url: env_opt("WEAVIATE_URL")
                .unwrap_or(defaults.base_url)
                .trim_end_matches('/')
                .to_string(),
            api_key: env_opt("WEAVIATE_API_KEY"),
            openai_api_key: env_opt("OPENAI_APIKEY").or(defaults.openai_api_key),
            init_timeout: Duration::from_secs(env_parse("WEAVIATE_INIT_TIMEOUT_SECS", 30u64)),
            query_timeout: Duration::from_secs(env_parse("WEAVIATE_QUERY_TIMEOUT_SECS", 60u64)),
            insert_timeout: Duration::from_secs(env_parse("WEAVIATE_INSERT_TIMEOUT_SECS", 120u64)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct WeaviateClient {
    config: WeaviateConfig,
    http: Client,
}

impl WeaviateClient {
    /// Build the HTTP client and confirm the server is live.
    #[instrument(skip(config), fields(url = %config.base_url))]
    pub async fn connect(config: WeaviateConfig) -> Result<Self> {
        url::Url::parse(&config.base_url)
            .map_err(|e| IngestError::Connection(format!("invalid WEAVIATE_URL: {e}")))?;

        let mut headers = header::HeaderMap::new();
        if let Some(key) = config.openai_api_key.as_deref() {
            let value = header::HeaderValue::from_str(key)
                .map_err(|e| IngestError::Connection(format!("invalid OPENAI_APIKEY: {e}")))?;
            headers.insert("x-openai-api-key", value);
        }
        if let Some(key) = config.api_key.as_deref() {
            let value = header::HeaderValue::from_str(&format!("Bearer {key}"))
                .map_err(|e| IngestError::Connection(format!("invalid WEAVIATE_API_KEY: {e}")))?;
            headers.insert(header::AUTHORIZATION, value);
        }
        let http = Client::builder()
            .user_agent(concat!("review-loader/", env!("CARGO_PKG_VERSION")))
            .default_headers(headers)
            .connect_timeout(config.init_timeout)
            .build()?;

        let client = Self { config, http };
        match client.is_live().await {
            Ok(true) => {}
            Ok(false) => return Err(IngestError::Connection("server is not live".into())),
            Err(e) => return Err(IngestError::Connection(e.to_string())),
        }
        if let Ok(meta) = client.meta().await {
            let version = meta.get("version").and_then(Value::as_str).unwrap_or("unknown");
            info!(target = "store", version, "connected to weaviate");
        }
        Ok(client)
    }

    /// Release the connection pool.
    pub fn close(self) {
        debug!(target = "store", url = %self.config.base_url, "closing weaviate client");
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url, path)
    }

    async fn send_json(req: RequestBuilder) -> Result<Value> {
        let resp = req.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(IngestError::Store {
                status: status.as_u16(),
                body: truncate_for_log(body, 500),
            });
        }
        if status == StatusCode::NO_CONTENT {
            return Ok(Value::Null);
        }
        let bytes = resp.bytes().await?;
        if bytes.is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_slice(&bytes).map_err(|e| IngestError::Store {
            status: status.as_u16(),
            body: format!("unparseable response: {e}"),
        })
    }

    pub async fn meta(&self) -> Result<Value> {
        let req = self
            .http
            .get(self.url("/v1/meta"))
            .timeout(self.config.init_timeout);
        Self::send_json(req).await
    }

    /// Run a GraphQL document and return its `data` member.
    pub async fn graphql(&self, query: &str) -> Result<Value> {
        let req = self
            .http
            .post(self.url("/v1/graphql"))
            .timeout(self.config.query_timeout)
            .json(&json!({ "query": query }));
        let mut body = Self::send_json(req).await?;
        if let Some(errors) = body.get("errors").and_then(Value::as_array) {
            if !errors.is_empty() {
                let messages: Vec<&str> = errors
                    .iter()
                    .filter_map(|e| e.get("message").and_then(Value::as_str))
                    .collect();
                return Err(IngestError::Store {
                    status: 200,
                    body: messages.join("; "),
                });
            }
        }
        Ok(body.get_mut("data").map(Value::take).unwrap_or(Value::Null))
    }

    pub async fn get(&self, query: &GetQuery) -> Result<Vec<QueryHit>> {
        let document = query.to_graphql();
        debug!(target = "store", %document, "graphql get");
        let data = self.graphql(&document).await?;
        Ok(parse_get_response(&data, &query.class_name()))
    }
}

/// Map a `/v1/batch/objects` response onto per-object outcomes.
///
/// Weaviate answers with one entry per submitted object, in order; failures
/// carry `result.errors.error[].message`.
pub fn parse_batch_response(body: &Value, expected: usize) -> Vec<ObjectOutcome> {
    let entries = body.as_array().map(Vec::as_slice).unwrap_or_default();
    (0..expected)
        .map(|i| match entries.get(i) {
            None => ObjectOutcome::Rejected("no result returned for object".into()),
            Some(entry) => {
                let messages: Vec<&str> = entry
                    .pointer("/result/errors/error")
                    .and_then(Value::as_array)
                    .map(|errs| {
                        errs.iter()
                            .filter_map(|e| e.get("message").and_then(Value::as_str))
                            .collect()
                    })
                    .unwrap_or_default();
                if messages.is_empty() {
                    ObjectOutcome::Accepted
                } else {
                    ObjectOutcome::Rejected(messages.join("; "))
                }
            }
        })
        .collect()
}

/// Body for `POST /v1/batch/objects`.
pub fn batch_request_body(class: &str, objects: &[StoreObject]) -> Value {
    let objects: Vec<Value> = objects
        .iter()
        .map(|o| {
            json!({
                "class": class,
                "id": o.id,
                "properties": o.properties,
            })
        })
        .collect();
    json!({ "objects": objects })
}

#[async_trait]
impl VectorStore for WeaviateClient {
    async fn is_live(&self) -> Result<bool> {
        let resp = self
            .http
            .get(self.url("/v1/.well-known/live"))
            .timeout(self.config.init_timeout)
            .send()
            .await?;
        Ok(resp.status().is_success())
    }

    async fn collection_exists(&self, name: &str) -> Result<bool> {
        let resp = self
            .http
            .get(self.url(&format!("/v1/schema/{}", class_name(name))))
            .timeout(self.config.query_timeout)
            .send()
            .await?;
        match resp.status() {
            s if s.is_success() => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            s => Err(IngestError::Store {
                status: s.as_u16(),
                body: truncate_for_log(resp.text().await.unwrap_or_default(), 500),
            }),
        }
    }

    async fn create_collection(&self, schema: &CollectionSchema) -> Result<()> {
        let req = self
            .http
            .post(self.url("/v1/schema"))
            .timeout(self.config.query_timeout)
            .json(&schema.to_class_definition());
        Self::send_json(req).await?;
        Ok(())
    }

    async fn delete_collection(&self, name: &str) -> Result<()> {
        let req = self
            .http
            .delete(self.url(&format!("/v1/schema/{}", class_name(name))))
            .timeout(self.config.query_timeout);
        Self::send_json(req).await?;
        Ok(())
    }

    async fn insert_batch(&self, collection: &str, objects: &[StoreObject]) -> Vec<ObjectOutcome> {
        if objects.is_empty() {
            return Vec::new();
        }
        let req = self
            .http
            .post(self.url("/v1/batch/objects"))
            .timeout(self.config.insert_timeout)
            .json(&batch_request_body(&class_name(collection), objects));
        match Self::send_json(req).await {
            Ok(body) => parse_batch_response(&body, objects.len()),
            Err(e) => {
                warn!(
                    target = "store",
                    collection,
                    objects = objects.len(),
                    error = %e,
                    "batch request failed; marking all objects as failed"
                );
                let message = e.to_string();
                vec![ObjectOutcome::Rejected(message); objects.len()]
            }
        }
    }

    async fn list_collections(&self) -> Result<Vec<String>> {
        let req = self
            .http
            .get(self.url("/v1/schema"))
            .timeout(self.config.query_timeout);
        let body = Self::send_json(req).await?;
        Ok(body
            .get("classes")
            .and_then(Value::as_array)
            .map(|classes| {
                classes
                    .iter()
                    .filter_map(|c| c.get("class").and_then(Value::as_str))
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn count(&self, name: &str) -> Result<u64> {
        let class = class_name(name);
        let data = self
            .graphql(&format!("{{ Aggregate {{ {class} {{ meta {{ count }} }} }} }}"))
            .await?;
        Ok(data
            .pointer(&format!("/Aggregate/{class}/0/meta/count"))
            .and_then(Value::as_u64)
            .unwrap_or(0))
    }
}
