//! DI "Interfaces"

use crate::core::models::{CatalogStats, ChatReply, ChatRequest, Recommendation, SyncReport};
use crate::error::AppError;
use crate::infrastructure::entities;
use crate::infrastructure::gemini::GenerationError;
use crate::infrastructure::haravan::CatalogProduct;
use async_trait::async_trait;
use std::sync::Arc;

/// Generates assistant answers grounded in catalog data.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Answers `user_message`. A non-empty `product_context` is shown to the model as the
    /// list of relevant products.
    async fn generate(
        &self,
        user_message: &str,
        product_context: &str,
    ) -> Result<String, GenerationError>;

    /// Picks a few of `products` matching the customer's stated preferences.
    async fn recommend(
        &self,
        preferences: &str,
        products: &[entities::Product],
    ) -> Result<String, GenerationError>;
}

#[async_trait]
pub trait ChatService: Send + Sync {
    /// Runs one chat turn: session touch, product lookup, generation, persistence.
    ///
    /// Returns `Err(AppError::Validation)` before touching any store when the message or
    /// session id is missing. The steps are not transactional: if generation fails the
    /// session has still been touched, but no history row is written.
    async fn handle_message(&self, request: ChatRequest) -> Result<ChatReply, AppError>;

    /// The last `limit` turns of a session, oldest first.
    async fn history(
        &self,
        session_id: &str,
        limit: i64,
    ) -> Result<Vec<entities::ChatMessage>, AppError>;

    async fn recommend(&self, preferences: &str) -> Result<Recommendation, AppError>;
}

#[async_trait]
pub trait ProductService: Send + Sync {
    /// All products, served from the cache when possible.
    async fn list_products(&self) -> Result<Arc<Vec<entities::Product>>, AppError>;

    /// Looks a product up by its Haravan id.
    ///
    /// Returns `Err(AppError::NotFound)` when no such product is stored.
    async fn find_product(&self, external_id: i64) -> Result<entities::Product, AppError>;

    async fn search_products(&self, query: &str) -> Result<Vec<entities::Product>, AppError>;

    async fn stats(&self) -> Result<CatalogStats, AppError>;
}

#[async_trait]
pub trait SyncService: Send + Sync {
    /// Fetches the whole catalog, replaces the product table and clears the cache.
    ///
    /// Concurrent calls run one after another.
    async fn sync_products(&self) -> Result<SyncReport, AppError>;

    /// Fetches one product straight from the catalog, bypassing the store.
    async fn preview_product(&self, external_id: i64) -> Result<CatalogProduct, AppError>;
}
