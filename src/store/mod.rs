//! Local copies of the catalog: the JSON cache file and the product table.
//!
//! Neither copy is authoritative. Both can lag behind the remote catalog.

pub mod cache;
pub mod database;

pub use cache::ProductCache;
pub use database::ProductTable;
