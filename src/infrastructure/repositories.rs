//! DB Repository abstractions

use crate::infrastructure::database::DatabaseConnection;
use crate::infrastructure::entities::{
    ChatMessage, ChatSession, Price, Product, ReferencedProduct, SessionVisit,
};
use crate::infrastructure::haravan::CatalogProduct;
use crate::infrastructure::traits::{ChatRepository, ProductRepository};
use async_trait::async_trait;
use chrono::Utc;
use di::{Ref, injectable};
use log::{error, info};
use sqlx::types::Json;

const PRODUCT_COLUMNS: &str = "id, haravan_id, title, description, price, compare_at_price, image_url, handle, vendor, status, created_at, updated_at";

/// Lower-cased haystack for case-insensitive substring search. SQLite's own `LIKE`
/// only folds ASCII, which would miss Vietnamese titles.
pub fn search_text(title: &str, description: &str, vendor: Option<&str>) -> String {
    [title, description, vendor.unwrap_or_default()]
        .join("\n")
        .to_lowercase()
}

/// `%needle%` with LIKE wildcards in the needle escaped.
fn like_pattern(keyword: &str) -> String {
    let mut pattern = String::with_capacity(keyword.len() + 2);
    pattern.push('%');
    for c in keyword.to_lowercase().chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

#[injectable(ProductRepository)]
pub struct DbProductRepository {
    connection: Ref<DatabaseConnection>,
}

#[async_trait]
impl ProductRepository for DbProductRepository {
    async fn replace_all(&self, products: &[CatalogProduct]) -> Result<u64, sqlx::Error> {
        // Dropping `tx` on an early return rolls the whole replace back.
        let mut tx = self.connection.begin().await?;

        sqlx::query("DELETE FROM products")
            .execute(&mut *tx)
            .await
            .inspect_err(|e| error!("failed to clear products: {e}"))?;

        let now = Utc::now();
        for product in products {
            let description = Some(product.description.as_str()).filter(|d| !d.is_empty());

            sqlx::query(
                "INSERT INTO products (haravan_id, title, description, price, compare_at_price, image_url, handle, vendor, status, search_text, created_at, updated_at) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?) \
                 ON CONFLICT (haravan_id) DO UPDATE SET title = excluded.title, description = excluded.description, price = excluded.price, \
                 compare_at_price = excluded.compare_at_price, image_url = excluded.image_url, handle = excluded.handle, vendor = excluded.vendor, \
                 status = excluded.status, search_text = excluded.search_text, updated_at = excluded.updated_at",
            )
            .bind(product.external_id)
            .bind(&product.title)
            .bind(description)
            .bind(Price(product.price))
            .bind(product.compare_at_price.map(Price))
            .bind(&product.image_url)
            .bind(&product.handle)
            .bind(&product.vendor)
            .bind(&product.status)
            .bind(search_text(
                &product.title,
                &product.description,
                product.vendor.as_deref(),
            ))
            .bind(now)
            .bind(now)
            .execute(&mut *tx)
            .await
            .inspect_err(|e| error!("failed to store product {}: {e}", product.external_id))?;
        }

        let (stored,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM products")
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        info!("replaced catalog with {stored} products");

        Ok(stored as u64)
    }

    async fn list_products(&self) -> Result<Vec<Product>, sqlx::Error> {
        sqlx::query_as(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products ORDER BY title ASC"
        ))
        .fetch_all(&**self.connection)
        .await
        .inspect_err(|e| error!("{e}"))
    }

    async fn search_products(&self, keyword: &str, limit: i64) -> Result<Vec<Product>, sqlx::Error> {
        sqlx::query_as(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE search_text LIKE ? ESCAPE '\\' ORDER BY id ASC LIMIT ?"
        ))
        .bind(like_pattern(keyword))
        .bind(limit)
        .fetch_all(&**self.connection)
        .await
        .inspect_err(|e| error!("{e}"))
    }

    async fn count_products(&self) -> Result<i64, sqlx::Error> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM products")
            .fetch_one(&**self.connection)
            .await?;
        Ok(count)
    }
}

#[injectable(ChatRepository)]
pub struct DbChatRepository {
    connection: Ref<DatabaseConnection>,
}

#[async_trait]
impl ChatRepository for DbChatRepository {
    async fn touch_session(&self, visit: &SessionVisit) -> Result<ChatSession, sqlx::Error> {
        let now = Utc::now();

        sqlx::query_as(
            "INSERT INTO chat_sessions (session_id, customer_email, customer_name, ip_address, created_at, last_activity) \
             VALUES (?, ?, ?, ?, ?, ?) \
             ON CONFLICT (session_id) DO UPDATE SET last_activity = excluded.last_activity \
             RETURNING id, session_id, customer_email, customer_name, ip_address, created_at, last_activity",
        )
        .bind(&visit.session_id)
        .bind(&visit.customer_email)
        .bind(&visit.customer_name)
        .bind(&visit.ip_address)
        .bind(now)
        .bind(now)
        .fetch_one(&**self.connection)
        .await
        .inspect_err(|e| error!("{e}"))
    }

    async fn save_message(
        &self,
        session_id: &str,
        user_message: &str,
        bot_response: &str,
        referenced_products: &[ReferencedProduct],
    ) -> Result<ChatMessage, sqlx::Error> {
        let referenced =
            (!referenced_products.is_empty()).then(|| Json(referenced_products.to_vec()));

        sqlx::query_as(
            "INSERT INTO chat_history (session_id, user_message, bot_response, referenced_products, created_at) \
             VALUES (?, ?, ?, ?, ?) \
             RETURNING id, session_id, user_message, bot_response, referenced_products, created_at",
        )
        .bind(session_id)
        .bind(user_message)
        .bind(bot_response)
        .bind(referenced)
        .bind(Utc::now())
        .fetch_one(&**self.connection)
        .await
        .inspect_err(|e| error!("{e}"))
    }

    async fn history(&self, session_id: &str, limit: i64) -> Result<Vec<ChatMessage>, sqlx::Error> {
        let mut messages: Vec<ChatMessage> = sqlx::query_as(
            "SELECT id, session_id, user_message, bot_response, referenced_products, created_at \
             FROM chat_history WHERE session_id = ? ORDER BY created_at DESC, id DESC LIMIT ?",
        )
        .bind(session_id)
        .bind(limit)
        .fetch_all(&**self.connection)
        .await
        .inspect_err(|e| error!("{e}"))?;

        messages.reverse();
        Ok(messages)
    }
}
