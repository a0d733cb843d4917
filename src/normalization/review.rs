use serde::Serialize;
use serde_json::Value;

use super::fields::{FieldReader, Normalized};
use crate::source::RawRecord;

/// Review record as stored in the review collection.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReviewRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overall: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verified: Option<bool>,
    #[serde(rename = "reviewerID", skip_serializing_if = "Option::is_none")]
    pub reviewer_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub asin: Option<String>,
    #[serde(rename = "reviewerName", skip_serializing_if = "Option::is_none")]
    pub reviewer_name: Option<String>,
    #[serde(rename = "reviewText", skip_serializing_if = "Option::is_none")]
    pub review_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(rename = "unixReviewTime", skip_serializing_if = "Option::is_none")]
    pub unix_review_time: Option<i64>,
    /// Derived from `unix_review_time`; absent whenever the timestamp is.
    #[serde(rename = "unixReviewDate", skip_serializing_if = "Option::is_none")]
    pub unix_review_date: Option<String>,
    #[serde(rename = "reviewTime", skip_serializing_if = "Option::is_none")]
    pub review_time: Option<String>,
    pub image: Vec<Value>,
}

impl ReviewRecord {
    /// Key used for deterministic identifiers: one reviewer, one product, one day.
    pub fn natural_key(&self) -> Option<String> {
        Some(format!(
            "{}{}{}",
            self.asin.as_deref()?,
            self.reviewer_id.as_deref()?,
            self.review_time.as_deref()?
        ))
    }
}

pub fn normalize_review(raw: &RawRecord) -> Normalized<ReviewRecord> {
    let mut r = FieldReader::new(raw);
    let (unix_review_time, unix_review_date) = r.unix_timestamp("unixReviewTime").unzip();
    let record = ReviewRecord {
        overall: r.number("overall"),
        verified: r.boolean("verified"),
        reviewer_id: r.text("reviewerID"),
        asin: r.text("asin"),
        reviewer_name: r.text("reviewerName"),
        review_text: r.text("reviewText"),
        summary: r.text("summary"),
        unix_review_time,
        unix_review_date,
        review_time: r.text("reviewTime"),
        image: r.array("image"),
    };
    Normalized {
        record,
        anomalies: r.finish(),
    }
}
