//! GraphQL `Get` query builder for the example read paths.

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Value};

use super::schema::class_name;

/// How candidates are retrieved.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchMode {
    NearText(String),
    /// Base64-encoded image bytes.
    NearImage(String),
    Bm25(String),
    Hybrid(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum WhereFilter {
    TextEquals { property: String, value: String },
    DateAfter { property: String, value: DateTime<Utc> },
}

impl WhereFilter {
    fn to_graphql(&self) -> String {
        match self {
            WhereFilter::TextEquals { property, value } => format!(
                "{{path: [{}], operator: Equal, valueText: {}}}",
                quote(property),
                quote(value)
            ),
            WhereFilter::DateAfter { property, value } => format!(
                "{{path: [{}], operator: GreaterThan, valueDate: {}}}",
                quote(property),
                quote(&value.to_rfc3339_opts(SecondsFormat::Secs, true))
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GetQuery {
    pub collection: String,
    pub mode: SearchMode,
    pub filter: Option<WhereFilter>,
    pub limit: u32,
    pub properties: Vec<String>,
}

/// One returned object with whichever ranking metadata applies.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryHit {
    pub properties: Map<String, Value>,
    pub distance: Option<f64>,
    pub score: Option<f64>,
}

impl QueryHit {
    pub fn text(&self, property: &str) -> &str {
        self.properties
            .get(property)
            .and_then(Value::as_str)
            .unwrap_or_default()
    }

    pub fn texts(&self, property: &str) -> Vec<&str> {
        self.properties
            .get(property)
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default()
    }
}

/// JSON string literal; GraphQL string escaping is a subset of JSON's.
fn quote(s: &str) -> String {
    Value::String(s.to_string()).to_string()
}

impl GetQuery {
    pub fn new(collection: impl Into<String>, mode: SearchMode) -> Self {
        Self {
            collection: collection.into(),
            mode,
            filter: None,
            limit: 5,
            properties: Vec::new(),
        }
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = limit;
        self
    }

    pub fn filter(mut self, filter: WhereFilter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn properties<I, S>(mut self, properties: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.properties = properties.into_iter().map(Into::into).collect();
        self
    }

    pub fn class_name(&self) -> String {
        class_name(&self.collection)
    }

    fn additional(&self) -> &'static str {
        match self.mode {
            SearchMode::NearText(_) | SearchMode::NearImage(_) => "_additional { id distance }",
            SearchMode::Bm25(_) | SearchMode::Hybrid(_) => "_additional { id score }",
        }
    }

    pub fn to_graphql(&self) -> String {
        let mut args = vec![match &self.mode {
            SearchMode::NearText(q) => format!("nearText: {{concepts: [{}]}}", quote(q)),
            SearchMode::NearImage(b64) => format!("nearImage: {{image: {}}}", quote(b64)),
            SearchMode::Bm25(q) => format!("bm25: {{query: {}}}", quote(q)),
            SearchMode::Hybrid(q) => format!("hybrid: {{query: {}}}", quote(q)),
        }];
        if let Some(filter) = &self.filter {
            args.push(format!("where: {}", filter.to_graphql()));
        }
        args.push(format!("limit: {}", self.limit));
        format!(
            "{{ Get {{ {}({}) {{ {} {} }} }} }}",
            self.class_name(),
            args.join(", "),
            self.properties.join(" "),
            self.additional()
        )
    }
}

/// Pull `data.Get.<Class>[]` apart into hits.
pub fn parse_get_response(data: &Value, class: &str) -> Vec<QueryHit> {
    let Some(items) = data
        .get("Get")
        .and_then(|g| g.get(class))
        .and_then(Value::as_array)
    else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(Value::as_object)
        .map(|obj| {
            let mut properties = obj.clone();
            let additional = properties.remove("_additional");
            let meta = |key: &str| {
                additional.as_ref().and_then(|a| a.get(key)).and_then(|v| {
                    v.as_f64()
                        .or_else(|| v.as_str().and_then(|s| s.parse().ok()))
                })
            };
            QueryHit {
                distance: meta("distance"),
                score: meta("score"),
                properties,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn near_text_query_document() {
        let q = GetQuery::new("product", SearchMode::NearText("background \"music\"".into()))
            .properties(["title", "asin"])
            .limit(5);
        assert_eq!(
            q.to_graphql(),
            r#"{ Get { Product(nearText: {concepts: ["background \"music\""]}, limit: 5) { title asin _additional { id distance } } } }"#
        );
    }

    #[test]
    fn bm25_with_text_filter() {
        let q = GetQuery::new("review", SearchMode::Bm25("0001393774".into()))
            .filter(WhereFilter::TextEquals {
                property: "asin".into(),
                value: "0001393774".into(),
            })
            .properties(["overall"]);
        let doc = q.to_graphql();
        assert!(doc.starts_with("{ Get { Review(bm25: {query: \"0001393774\"}, where: {path: [\"asin\"], operator: Equal, valueText: \"0001393774\"}, limit: 5)"));
        assert!(doc.contains("_additional { id score }"));
    }

    #[test]
    fn date_filter_is_rfc3339() {
        let f = WhereFilter::DateAfter {
            property: "unixReviewDate".into(),
            value: Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap(),
        };
        assert_eq!(
            f.to_graphql(),
            r#"{path: ["unixReviewDate"], operator: GreaterThan, valueDate: "2020-01-01T00:00:00Z"}"#
        );
    }

    #[test]
    fn parses_hits_and_metadata() {
        let data = json!({ "Get": { "Product": [
            {
                "title": "A",
                "category": ["x", "y"],
                "_additional": { "id": "1", "distance": 0.25 }
            },
            { "title": "B", "_additional": { "id": "2", "score": "0.5" } }
        ] } });
        let hits = parse_get_response(&data, "Product");
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].text("title"), "A");
        assert_eq!(hits[0].texts("category"), vec!["x", "y"]);
        assert_eq!(hits[0].distance, Some(0.25));
        assert!(hits[0].properties.get("_additional").is_none());
        assert_eq!(hits[1].score, Some(0.5));
        assert!(parse_get_response(&json!({}), "Product").is_empty());
    }
}
