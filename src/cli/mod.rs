pub mod count;
pub mod import;
pub mod query;
