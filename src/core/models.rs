//! Inputs and outputs of the core services.

use crate::core::cache::CacheStats;
use crate::infrastructure::entities::{Product, ReferencedProduct};

/// An incoming chat message, before validation.
#[derive(Debug, Clone, Default)]
pub struct ChatRequest {
    pub message: Option<String>,
    pub session_id: Option<String>,
    pub customer_email: Option<String>,
    pub customer_name: Option<String>,
    pub ip_address: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ChatReply {
    pub response: String,
    pub referenced_products: Vec<ReferencedProduct>,
    pub session_id: String,
}

#[derive(Debug, Clone)]
pub struct Recommendation {
    pub recommendations: String,
    pub products: Vec<Product>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncReport {
    /// Records received from the catalog.
    pub fetched: usize,
    /// Rows in the product table after the replace.
    pub stored: u64,
}

#[derive(Debug, Clone, Copy)]
pub struct CatalogStats {
    pub total_products: i64,
    pub cache: CacheStats,
}
