//! Example read paths over the loaded collections.

use std::collections::HashSet;

use anyhow::{Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Utc};
use clap::{Args, Subcommand};
use serde_json::Value;

use crate::error::IngestError;
use crate::store::query::{GetQuery, QueryHit, SearchMode, WhereFilter};
use crate::store::weaviate::{WeaviateClient, WeaviateConfig};

const PRODUCT_FIELDS: [&str; 6] = ["title", "brand", "asin", "category", "price", "description"];
const IMAGE_FIELDS: [&str; 4] = ["title", "category", "price", "description"];
const REVIEW_FIELDS: [&str; 5] = [
    "overall",
    "unixReviewDate",
    "reviewerName",
    "reviewText",
    "asin",
];

#[derive(Debug, Clone, Args)]
pub struct QueryArgs {
    #[command(subcommand)]
    pub command: QueryCommand,
    /// Maximum objects per query
    #[arg(long, default_value_t = 5)]
    pub limit: u32,
    #[arg(long, default_value = "product")]
    pub products: String,
    #[arg(long, default_value = "review")]
    pub reviews: String,
}

#[derive(Debug, Clone, Subcommand)]
#[command(rename_all = "kebab-case")]
pub enum QueryCommand {
    /// Semantic search over products
    NearText { query: String },
    /// Products visually similar to the image at URL
    NearImage { url: String },
    /// BM25 keyword search over products
    Keyword { query: String },
    /// Hybrid (vector + keyword) search over products
    Hybrid { query: String },
    /// Semantic search over reviews restricted by a property filter
    Filtered {
        query: String,
        #[arg(long, default_value = "unixReviewDate")]
        property: String,
        /// Keep reviews whose property equals this text
        #[arg(long, conflicts_with = "after")]
        equals: Option<String>,
        /// Keep reviews whose date property is later than this RFC 3339 instant
        #[arg(long)]
        after: Option<DateTime<Utc>>,
    },
    /// Semantic product search followed by each product's reviews
    WithReviews { query: String },
}

/// Drop hits whose `asin` was already seen; hits without one are kept.
pub fn dedupe_by_asin(hits: Vec<QueryHit>) -> Vec<QueryHit> {
    let mut seen = HashSet::new();
    hits.into_iter()
        .filter(|hit| match hit.properties.get("asin").and_then(Value::as_str) {
            Some(asin) => seen.insert(asin.to_string()),
            None => true,
        })
        .collect()
}

pub fn render_product(out: &mut String, hit: &QueryHit) {
    out.push_str(&format!("Product Title: {}\n", hit.text("title")));
    out.push_str(&format!("  Artist: {}\n", hit.text("brand")));
    out.push_str(&format!("  ASIN: {}\n", hit.text("asin")));
    out.push_str("  Categories: \n");
    for c in hit.texts("category") {
        out.push_str(&format!("    {c}\n"));
    }
    out.push_str(&format!("  Price: {}\n", hit.text("price")));
    out.push_str("  Description: \n");
    for d in hit.texts("description") {
        out.push_str(&format!("    {d}\n"));
    }
}

fn review_day(raw: &str) -> String {
    match DateTime::parse_from_rfc3339(raw) {
        Ok(dt) => dt.format("%Y-%m-%d").to_string(),
        Err(_) => raw.chars().take(10).collect(),
    }
}

pub fn render_reviews(out: &mut String, hits: &[QueryHit]) {
    for (i, hit) in hits.iter().enumerate() {
        let score = hit
            .properties
            .get("overall")
            .map(Value::to_string)
            .unwrap_or_default();
        let text: String = hit
            .text("reviewText")
            .chars()
            .filter(|c| *c != '\n' && *c != '\r')
            .collect();
        out.push_str(&format!("  Review {}:\n", i + 1));
        out.push_str(&format!("    Review Score: {score}\n"));
        out.push_str(&format!(
            "    Review Date: {}\n",
            review_day(hit.text("unixReviewDate"))
        ));
        out.push_str(&format!("    Reviewer Name: {}\n", hit.text("reviewerName")));
        out.push_str(&format!("    Review Text: {text}\n"));
    }
}

fn render_image_hit(out: &mut String, hit: &QueryHit) {
    out.push_str(&format!(
        "   {} {:?} {} {:?}\n",
        hit.text("title"),
        hit.texts("category"),
        hit.text("price"),
        hit.texts("description")
    ));
    if let Some(distance) = hit.distance {
        out.push_str(&format!("\tDistance to query: {distance:.3}\n"));
    }
}

pub fn product_query(args: &QueryArgs, mode: SearchMode) -> GetQuery {
    GetQuery::new(&args.products, mode)
        .limit(args.limit)
        .properties(PRODUCT_FIELDS)
}

/// Reviews of one product: keyword match on the asin, filtered to that asin.
pub fn reviews_for(args: &QueryArgs, asin: &str) -> GetQuery {
    GetQuery::new(&args.reviews, SearchMode::Bm25(asin.to_string()))
        .filter(WhereFilter::TextEquals {
            property: "asin".into(),
            value: asin.to_string(),
        })
        .limit(args.limit)
        .properties(REVIEW_FIELDS)
}

pub fn filtered_query(
    args: &QueryArgs,
    query: &str,
    property: &str,
    equals: Option<&str>,
    after: Option<DateTime<Utc>>,
) -> Result<GetQuery, IngestError> {
    let filter = match (equals, after) {
        (Some(value), None) => WhereFilter::TextEquals {
            property: property.to_string(),
            value: value.to_string(),
        },
        (None, Some(value)) => WhereFilter::DateAfter {
            property: property.to_string(),
            value,
        },
        _ => {
            return Err(IngestError::Usage(
                "filtered needs exactly one of --equals or --after".into(),
            ))
        }
    };
    Ok(GetQuery::new(&args.reviews, SearchMode::NearText(query.to_string()))
        .filter(filter)
        .limit(args.limit)
        .properties(REVIEW_FIELDS))
}

async fn image_as_base64(url: &str) -> Result<String> {
    let bytes = reqwest::get(url)
        .await?
        .error_for_status()?
        .bytes()
        .await
        .with_context(|| format!("downloading {url}"))?;
    Ok(STANDARD.encode(&bytes))
}

async fn execute(client: &WeaviateClient, args: &QueryArgs) -> Result<String> {
    let mut out = String::new();
    match &args.command {
        QueryCommand::NearText { query } => {
            let hits = client
                .get(&product_query(args, SearchMode::NearText(query.clone())))
                .await?;
            for hit in dedupe_by_asin(hits) {
                render_product(&mut out, &hit);
            }
        }
        QueryCommand::NearImage { url } => {
            let image = image_as_base64(url).await?;
            let query = GetQuery::new(&args.products, SearchMode::NearImage(image))
                .limit(args.limit)
                .properties(IMAGE_FIELDS);
            for hit in client.get(&query).await? {
                render_image_hit(&mut out, &hit);
            }
        }
        QueryCommand::Keyword { query } => {
            let hits = client
                .get(&product_query(args, SearchMode::Bm25(query.clone())))
                .await?;
            for hit in dedupe_by_asin(hits) {
                render_product(&mut out, &hit);
            }
        }
        QueryCommand::Hybrid { query } => {
            let hits = client
                .get(&product_query(args, SearchMode::Hybrid(query.clone())))
                .await?;
            for hit in hits {
                render_product(&mut out, &hit);
            }
        }
        QueryCommand::Filtered {
            query,
            property,
            equals,
            after,
        } => {
            let get = filtered_query(args, query, property, equals.as_deref(), *after)?;
            render_reviews(&mut out, &client.get(&get).await?);
        }
        QueryCommand::WithReviews { query } => {
            let hits = client
                .get(&product_query(args, SearchMode::NearText(query.clone())))
                .await?;
            for hit in dedupe_by_asin(hits) {
                render_product(&mut out, &hit);
                let reviews = client.get(&reviews_for(args, hit.text("asin"))).await?;
                render_reviews(&mut out, &reviews);
                out.push('\n');
            }
        }
    }
    Ok(out)
}

pub async fn run(args: QueryArgs) -> Result<()> {
    let client = WeaviateClient::connect(WeaviateConfig::from_env())
        .await
        .context("connecting to weaviate")?;
    let result = execute(&client, &args).await;
    client.close();
    print!("{}", result?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use serde_json::json;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        query: QueryArgs,
    }

    fn hit(props: Value) -> QueryHit {
        QueryHit {
            properties: props.as_object().cloned().unwrap(),
            distance: None,
            score: None,
        }
    }

    #[test]
    fn parses_subcommands_and_limit() {
        let cli = TestCli::parse_from(["query", "--limit", "3", "near-text", "dinner music"]);
        assert_eq!(cli.query.limit, 3);
        assert!(matches!(
            cli.query.command,
            QueryCommand::NearText { ref query } if query == "dinner music"
        ));

        let cli = TestCli::parse_from([
            "query",
            "filtered",
            "dystopian",
            "--after",
            "2020-01-01T00:00:00Z",
        ]);
        match cli.query.command {
            QueryCommand::Filtered { after, property, .. } => {
                assert_eq!(property, "unixReviewDate");
                assert_eq!(after.unwrap().to_rfc3339(), "2020-01-01T00:00:00+00:00");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn filtered_requires_one_filter() {
        let cli = TestCli::parse_from(["query", "filtered", "x"]);
        let err = filtered_query(&cli.query, "x", "unixReviewDate", None, None).unwrap_err();
        assert!(matches!(err, IngestError::Usage(_)));
    }

    #[test]
    fn dedupes_by_asin_keeping_first() {
        let hits = vec![
            hit(json!({"asin": "A", "title": "one"})),
            hit(json!({"asin": "B"})),
            hit(json!({"asin": "A", "title": "two"})),
            hit(json!({"title": "no asin"})),
        ];
        let out = dedupe_by_asin(hits);
        assert_eq!(out.len(), 3);
        assert_eq!(out[0].text("title"), "one");
    }

    #[test]
    fn renders_products_and_reviews() {
        let mut out = String::new();
        render_product(
            &mut out,
            &hit(json!({
                "title": "Blue Train", "brand": "John Coltrane", "asin": "0001",
                "category": ["Jazz"], "price": "$9.99", "description": ["Hard bop"]
            })),
        );
        render_reviews(
            &mut out,
            &[hit(json!({
                "overall": 5.0,
                "unixReviewDate": "2015-01-01T00:00:00Z",
                "reviewerName": "Sam",
                "reviewText": "great\r\nrecord"
            }))],
        );
        assert_eq!(
            out,
            "Product Title: Blue Train\n  Artist: John Coltrane\n  ASIN: 0001\n  Categories: \n    Jazz\n  Price: $9.99\n  Description: \n    Hard bop\n  Review 1:\n    Review Score: 5.0\n    Review Date: 2015-01-01\n    Reviewer Name: Sam\n    Review Text: greatrecord\n"
        );
    }

    #[test]
    fn reviews_query_filters_on_asin() {
        let cli = TestCli::parse_from(["query", "with-reviews", "bebop"]);
        let doc = reviews_for(&cli.query, "0001393774").to_graphql();
        assert!(doc.starts_with("{ Get { Review(bm25: {query: \"0001393774\"}, where: {path: [\"asin\"], operator: Equal, valueText: \"0001393774\"}, limit: 5)"));
    }
}
