//! Remote supplier catalog access.
//!
//! This module fetches the full product catalog from the Trendyol supplier
//! API and normalizes it into [`crate::models::Product`] records.

pub mod client;
pub mod html;

pub use client::CatalogClient;
