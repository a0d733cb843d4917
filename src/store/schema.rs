//! Declared collection schemas and their Weaviate class definitions.

use serde_json::{json, Map, Value};

const VECTORIZER_MODULE: &str = "text2vec-openai";
const GENERATIVE_MODULE: &str = "generative-openai";

/// Logical property type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    Text,
    TextArray,
    Number,
    Boolean,
    Date,
}

impl DataType {
    pub fn as_weaviate(self) -> &'static str {
        match self {
            DataType::Text => "text",
            DataType::TextArray => "text[]",
            DataType::Number => "number",
            DataType::Boolean => "boolean",
            DataType::Date => "date",
        }
    }

    fn is_text(self) -> bool {
        matches!(self, DataType::Text | DataType::TextArray)
    }
}

/// One property plus the indexing hints handed to the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertySpec {
    pub name: &'static str,
    pub data_type: DataType,
    pub skip_vectorization: bool,
    pub index_filterable: Option<bool>,
    pub index_searchable: Option<bool>,
}

impl PropertySpec {
    pub const fn new(name: &'static str, data_type: DataType) -> Self {
        Self {
            name,
            data_type,
            skip_vectorization: false,
            index_filterable: None,
            index_searchable: None,
        }
    }

    pub const fn skip_vectorization(mut self) -> Self {
        self.skip_vectorization = true;
        self
    }

    /// Filterable and searchable.
    pub const fn indexed(mut self) -> Self {
        self.index_filterable = Some(true);
        self.index_searchable = Some(true);
        self
    }

    /// Stored only: not vectorized, not filterable, not searchable.
    pub const fn stored_only(mut self) -> Self {
        self.skip_vectorization = true;
        self.index_filterable = Some(false);
        self.index_searchable = Some(false);
        self
    }

    fn to_json(&self) -> Value {
        let mut prop = Map::new();
        prop.insert("name".into(), json!(self.name));
        prop.insert("dataType".into(), json!([self.data_type.as_weaviate()]));
        if let Some(f) = self.index_filterable {
            prop.insert("indexFilterable".into(), json!(f));
        }
        if let Some(s) = self.index_searchable.filter(|_| self.data_type.is_text()) {
            prop.insert("indexSearchable".into(), json!(s));
        }
        prop.insert(
            "moduleConfig".into(),
            json!({ VECTORIZER_MODULE: { "skip": self.skip_vectorization } }),
        );
        Value::Object(prop)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionSchema {
    pub name: String,
    pub properties: Vec<PropertySpec>,
    /// Base URL of the OpenAI-compatible endpoint used for embeddings and
    /// generation. `None` leaves the store's defaults in place.
    pub vectorizer_base_url: Option<String>,
}

impl CollectionSchema {
    pub fn class_name(&self) -> String {
        class_name(&self.name)
    }

    pub fn property(&self, name: &str) -> Option<&PropertySpec> {
        self.properties.iter().find(|p| p.name == name)
    }

    /// Body for `POST /v1/schema`.
    pub fn to_class_definition(&self) -> Value {
        let mut vectorizer = Map::new();
        let mut generative = Map::new();
        if let Some(base) = &self.vectorizer_base_url {
            vectorizer.insert("baseURL".into(), json!(base));
            generative.insert("baseURL".into(), json!(base));
        }
        json!({
            "class": self.class_name(),
            "vectorizer": VECTORIZER_MODULE,
            "moduleConfig": {
                VECTORIZER_MODULE: vectorizer,
                GENERATIVE_MODULE: generative,
            },
            "properties": self.properties.iter().map(PropertySpec::to_json).collect::<Vec<_>>(),
        })
    }
}

/// Weaviate stores classes with an upper-case first letter.
pub fn class_name(collection: &str) -> String {
    let mut chars = collection.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

pub fn product_schema(name: &str, vectorizer_base_url: Option<&str>) -> CollectionSchema {
    use DataType::*;
    CollectionSchema {
        name: name.to_string(),
        properties: vec![
            PropertySpec::new("category", TextArray).indexed(),
            PropertySpec::new("tech1", Text).stored_only(),
            PropertySpec::new("tech2", Text).stored_only(),
            PropertySpec::new("description", TextArray).indexed(),
            PropertySpec::new("fit", Text).stored_only(),
            PropertySpec::new("title", Text).indexed(),
            PropertySpec::new("also_buy", TextArray).stored_only(),
            PropertySpec::new("image", TextArray).stored_only(),
            PropertySpec::new("brand", Text).indexed(),
            PropertySpec::new("feature", TextArray).stored_only(),
            PropertySpec::new("rank", TextArray).stored_only(),
            PropertySpec::new("also_view", TextArray).stored_only(),
            PropertySpec::new("main_cat", Text).indexed(),
            PropertySpec::new("date", Text).skip_vectorization().indexed(),
            PropertySpec::new("price", Text).skip_vectorization().indexed(),
            PropertySpec::new("asin", Text).indexed(),
        ],
        vectorizer_base_url: vectorizer_base_url.map(str::to_string),
    }
}

pub fn review_schema(name: &str, vectorizer_base_url: Option<&str>) -> CollectionSchema {
    use DataType::*;
    CollectionSchema {
        name: name.to_string(),
        properties: vec![
            PropertySpec::new("overall", Number),
            PropertySpec::new("verified", Boolean).skip_vectorization(),
            PropertySpec::new("reviewerID", Text).skip_vectorization(),
            PropertySpec::new("asin", Text).skip_vectorization(),
            PropertySpec::new("reviewerName", Text).skip_vectorization(),
            PropertySpec::new("reviewText", Text),
            PropertySpec::new("summary", Text),
            PropertySpec::new("unixReviewTime", Number).skip_vectorization(),
            PropertySpec::new("unixReviewDate", Date).skip_vectorization(),
            PropertySpec::new("reviewTime", Text).skip_vectorization(),
            PropertySpec::new("image", TextArray).skip_vectorization(),
        ],
        vectorizer_base_url: vectorizer_base_url.map(str::to_string),
    }
}
