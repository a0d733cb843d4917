//! Raw JSON record → canonical record shaping.

pub mod fields;
pub mod product;
pub mod review;

pub use fields::{FieldAnomaly, JsonKind, Normalized};
pub use product::{normalize_product, ProductRecord};
pub use review::{normalize_review, ReviewRecord};
