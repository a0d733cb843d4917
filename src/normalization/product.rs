use serde::Serialize;
use serde_json::Value;

use super::fields::{FieldReader, Normalized};
use crate::source::RawRecord;

/// Product metadata record as stored in the `product` collection.
///
/// Array fields are always sequences; scalar text fields are omitted from
/// the stored object when the source did not carry them.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProductRecord {
    pub category: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tech1: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tech2: Option<String>,
    pub description: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fit: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub also_buy: Vec<Value>,
    pub image: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub brand: Option<String>,
    pub feature: Vec<Value>,
    pub rank: Vec<Value>,
    pub also_view: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub main_cat: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub asin: Option<String>,
}

pub fn normalize_product(raw: &RawRecord) -> Normalized<ProductRecord> {
    let mut r = FieldReader::new(raw);
    let record = ProductRecord {
        category: r.array("category"),
        tech1: r.text("tech1"),
        tech2: r.text("tech2"),
        description: r.array("description"),
        fit: r.text("fit"),
        title: r.text("title"),
        also_buy: r.array("also_buy"),
        image: r.array("image"),
        brand: r.text("brand"),
        feature: r.array("feature"),
        // rank shows up as a string on some dumps and as a list on others
        rank: r.string_or_array("rank"),
        also_view: r.array("also_view"),
        main_cat: r.text("main_cat"),
        date: r.text("date"),
        price: r.text("price"),
        asin: r.text("asin"),
    };
    Normalized {
        record,
        anomalies: r.finish(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalization::{FieldAnomaly, JsonKind};
    use serde_json::json;

    fn raw(v: Value) -> RawRecord {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn wraps_scalars_and_fills_missing_arrays() {
        let out = normalize_product(&raw(json!({
            "asin": "0001393774",
            "title": "Songs for the Shepherd",
            "brand": "Keith Green",
            "category": "CDs & Vinyl",
            "description": ["disc one", "disc two"],
            "image": "https://example.invalid/a.jpg",
            "rank": "123",
            "price": "$12.99",
            "main_cat": "Music"
        })));

        let p = out.record;
        assert_eq!(p.category, vec![json!("CDs & Vinyl")]);
        assert_eq!(p.description, vec![json!("disc one"), json!("disc two")]);
        assert_eq!(p.image, vec![json!("https://example.invalid/a.jpg")]);
        assert_eq!(p.rank, vec![json!("123")]);
        assert!(p.also_buy.is_empty());
        assert!(p.also_view.is_empty());
        assert!(p.feature.is_empty());
        assert_eq!(p.tech1, None);
        assert!(out.anomalies.is_empty());
    }

    #[test]
    fn numeric_rank_degrades_to_empty_and_is_flagged() {
        let out = normalize_product(&raw(json!({ "asin": "x", "rank": 42 })));
        assert!(out.record.rank.is_empty());
        assert_eq!(
            out.anomalies,
            vec![FieldAnomaly {
                field: "rank",
                found: JsonKind::Number
            }]
        );
    }

    #[test]
    fn serializes_with_store_property_names() {
        let out = normalize_product(&raw(json!({
            "asin": "B1",
            "also_buy": ["B2"],
            "rank": ["1", "2"]
        })));
        let v = serde_json::to_value(&out.record).unwrap();
        assert_eq!(
            v,
            json!({
                "category": [],
                "description": [],
                "also_buy": ["B2"],
                "image": [],
                "feature": [],
                "rank": ["1", "2"],
                "also_view": [],
                "asin": "B1"
            })
        );
    }
}
