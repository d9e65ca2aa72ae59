//! Implementations for the service the app needs.
//!

use crate::core::cache::{Lookup, ProductCache};
use crate::core::models::{CatalogStats, ChatReply, ChatRequest, Recommendation, SyncReport};
use crate::core::traits::{ChatModel, ChatService, ProductService, SyncService};
use crate::core::assistant::{self, MAX_RECOMMENDATION_PRODUCTS};
use crate::error::AppError;
use crate::infrastructure::entities::{ChatMessage, Product, ReferencedProduct, SessionVisit};
use crate::infrastructure::haravan::{self, CatalogProduct};
use crate::infrastructure::traits::{CatalogSource, ChatRepository, ProductRepository};
use async_trait::async_trait;
use di::{Ref, injectable};
use log::{debug, info};
use regex::Regex;
use std::sync::{Arc, LazyLock};
use tokio::sync::{Mutex, MutexGuard};

/// Products shown to the model per chat turn.
const CONTEXT_PRODUCT_LIMIT: i64 = 5;
/// Keywords tried, in message order, before giving up on grounding.
const MAX_KEYWORD_LOOKUPS: usize = 8;
const SEARCH_LIMIT: i64 = 5;
const MIN_QUERY_CHARS: usize = 2;

static KEYWORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b\w{3,}\b").unwrap());

/// Word tokens of at least three characters, in message order.
pub fn extract_keywords(message: &str) -> Vec<&str> {
    KEYWORD.find_iter(message).map(|m| m.as_str()).collect()
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

#[injectable(ChatService)]
pub struct SupportChatService {
    products: Ref<dyn ProductRepository>,
    chats: Ref<dyn ChatRepository>,
    model: Ref<dyn ChatModel>,
}

impl SupportChatService {
    /// Looks products up one keyword at a time and keeps the first keyword that matches.
    async fn grounding_products(&self, message: &str) -> Result<Vec<Product>, AppError> {
        for keyword in extract_keywords(message).into_iter().take(MAX_KEYWORD_LOOKUPS) {
            let matches = self
                .products
                .search_products(keyword, CONTEXT_PRODUCT_LIMIT)
                .await?;

            if !matches.is_empty() {
                debug!("keyword `{keyword}` matched {} products", matches.len());
                return Ok(matches);
            }
        }

        Ok(Vec::new())
    }
}

#[async_trait]
impl ChatService for SupportChatService {
    async fn handle_message(&self, request: ChatRequest) -> Result<ChatReply, AppError> {
        let (Some(message), Some(session_id)) = (
            non_blank(request.message.as_deref()),
            non_blank(request.session_id.as_deref()),
        ) else {
            return Err(AppError::Validation(
                "Message and sessionId are required".to_owned(),
            ));
        };

        self.chats
            .touch_session(&SessionVisit {
                session_id: session_id.to_owned(),
                customer_email: request.customer_email.clone(),
                customer_name: request.customer_name.clone(),
                ip_address: request.ip_address.clone(),
            })
            .await?;

        let matches = self.grounding_products(message).await?;
        let product_context = assistant::product_context(&matches);
        let referenced_products: Vec<ReferencedProduct> =
            matches.iter().map(ReferencedProduct::from).collect();

        let response = self.model.generate(message, &product_context).await?;

        self.chats
            .save_message(session_id, message, &response, &referenced_products)
            .await?;

        Ok(ChatReply {
            response,
            referenced_products,
            session_id: session_id.to_owned(),
        })
    }

    async fn history(&self, session_id: &str, limit: i64) -> Result<Vec<ChatMessage>, AppError> {
        Ok(self.chats.history(session_id, limit).await?)
    }

    async fn recommend(&self, preferences: &str) -> Result<Recommendation, AppError> {
        let preferences = preferences.trim();
        if preferences.is_empty() {
            return Err(AppError::Validation("Preferences are required".to_owned()));
        }

        let mut products = self.products.list_products().await?;
        products.truncate(MAX_RECOMMENDATION_PRODUCTS);

        let recommendations = self.model.recommend(preferences, &products).await?;

        Ok(Recommendation {
            recommendations,
            products,
        })
    }
}

#[injectable(ProductService)]
pub struct CatalogProductService {
    products: Ref<dyn ProductRepository>,
    cache: Ref<ProductCache>,
}

#[async_trait]
impl ProductService for CatalogProductService {
    async fn list_products(&self) -> Result<Arc<Vec<Product>>, AppError> {
        let generation = match self.cache.get() {
            Lookup::Hit(products) => return Ok(products),
            Lookup::Miss(generation) => generation,
        };

        let products = self.products.list_products().await?;

        // An empty table usually means "not synced yet"; don't pin that for an hour.
        if products.is_empty() {
            return Ok(Arc::new(products));
        }

        // A sync that committed while the rows were read has bumped the generation.
        Ok(self.cache.set_if_current(generation, products))
    }

    async fn find_product(&self, external_id: i64) -> Result<Product, AppError> {
        self.list_products()
            .await?
            .iter()
            .find(|product| product.haravan_id == external_id)
            .cloned()
            .ok_or_else(|| AppError::NotFound("Product not found".to_owned()))
    }

    async fn search_products(&self, query: &str) -> Result<Vec<Product>, AppError> {
        let query = query.trim();
        if query.chars().count() < MIN_QUERY_CHARS {
            return Err(AppError::Validation(
                "Search query must be at least 2 characters".to_owned(),
            ));
        }

        Ok(self.products.search_products(query, SEARCH_LIMIT).await?)
    }

    async fn stats(&self) -> Result<CatalogStats, AppError> {
        Ok(CatalogStats {
            total_products: self.products.count_products().await?,
            cache: self.cache.stats(),
        })
    }
}

/// Serializes catalog syncs across requests and the startup task.
#[derive(Default)]
pub struct SyncLock(Mutex<()>);

impl SyncLock {
    pub async fn acquire(&self) -> MutexGuard<'_, ()> {
        self.0.lock().await
    }
}

#[injectable(SyncService)]
pub struct CatalogSyncService {
    catalog: Ref<dyn CatalogSource>,
    products: Ref<dyn ProductRepository>,
    cache: Ref<ProductCache>,
    lock: Ref<SyncLock>,
}

#[async_trait]
impl SyncService for CatalogSyncService {
    async fn sync_products(&self) -> Result<SyncReport, AppError> {
        let _guard = self.lock.acquire().await;
        info!("starting product sync");

        let raw = self.catalog.fetch_all_products().await?;
        let normalized: Vec<CatalogProduct> = raw.iter().map(haravan::format_for_ai).collect();

        let stored = self.products.replace_all(&normalized).await?;
        self.cache.clear();
        info!(
            "product sync finished: {} fetched, {stored} stored, cache cleared",
            raw.len()
        );

        Ok(SyncReport {
            fetched: raw.len(),
            stored,
        })
    }

    async fn preview_product(&self, external_id: i64) -> Result<CatalogProduct, AppError> {
        match self.catalog.fetch_product(external_id).await {
            Ok(product) => Ok(haravan::format_for_ai(&product)),
            Err(e) if e.status() == Some(404) => {
                Err(AppError::NotFound("Product not found in catalog".to_owned()))
            }
            Err(e) => Err(e.into()),
        }
    }
}
