//! Infrastructure traits, used for DI on higher levels

use crate::infrastructure::entities;
use crate::infrastructure::gemini::GenerationError;
use crate::infrastructure::haravan::{CatalogFetchError, CatalogProduct, RawProduct};
use async_trait::async_trait;

#[async_trait]
pub trait ProductRepository: Send + Sync {
    /// Replaces the whole table with `products` in one transaction.
    ///
    /// Returns the number of rows stored; duplicate external ids collapse to the last one.
    async fn replace_all(&self, products: &[CatalogProduct]) -> Result<u64, sqlx::Error>;

    /// All products ordered by title.
    async fn list_products(&self) -> Result<Vec<entities::Product>, sqlx::Error>;

    /// Products whose title, description or vendor contains `keyword`, ignoring case.
    async fn search_products(
        &self,
        keyword: &str,
        limit: i64,
    ) -> Result<Vec<entities::Product>, sqlx::Error>;

    async fn count_products(&self) -> Result<i64, sqlx::Error>;
}

#[async_trait]
pub trait ChatRepository: Send + Sync {
    /// Inserts the session, or only bumps `last_activity` when it already exists.
    async fn touch_session(
        &self,
        visit: &entities::SessionVisit,
    ) -> Result<entities::ChatSession, sqlx::Error>;

    async fn save_message(
        &self,
        session_id: &str,
        user_message: &str,
        bot_response: &str,
        referenced_products: &[entities::ReferencedProduct],
    ) -> Result<entities::ChatMessage, sqlx::Error>;

    /// The newest `limit` messages of a session, oldest first.
    async fn history(
        &self,
        session_id: &str,
        limit: i64,
    ) -> Result<Vec<entities::ChatMessage>, sqlx::Error>;
}

/// Remote product catalog.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    async fn fetch_all_products(&self) -> Result<Vec<RawProduct>, CatalogFetchError>;

    async fn fetch_product(&self, id: i64) -> Result<RawProduct, CatalogFetchError>;
}

/// Remote text generation: prompt in, text out.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate_text(&self, prompt: &str) -> Result<String, GenerationError>;
}
