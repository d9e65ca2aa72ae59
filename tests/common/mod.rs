//! Shared test setup: in-memory database, settings and app wiring.
#![allow(dead_code)]

use axum::Router;
use axum::body::Body;
use axum::http::{Request, Response};
use di::ServiceProvider;
use haravan_chat_api::config::Settings;
use haravan_chat_api::infrastructure::database::DatabaseConnection;
use haravan_chat_api::{api, service_provider};
use serde_json::{Value, json};
use sqlx::SqlitePool;
use sqlx::sqlite::SqlitePoolOptions;
use std::collections::HashMap;

pub const ADMIN_KEY: &str = "test-admin-key";

/// A single-connection in-memory database with the schema applied. One connection keeps
/// every query on the same in-memory database.
pub async fn setup_test_db() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    sqlx::migrate!().run(&pool).await.unwrap();
    pool
}

/// Settings pointing both providers at local mock servers.
pub fn test_settings(haravan_url: &str, gemini_url: &str) -> Settings {
    let env: HashMap<&str, String> = HashMap::from([
        ("HARAVAN_API_BASE", haravan_url.to_owned()),
        ("HARAVAN_ACCESS_TOKEN", "test-token".to_owned()),
        ("HARAVAN_FALLBACK", "false".to_owned()),
        ("GEMINI_API_URL", gemini_url.to_owned()),
        ("GEMINI_API_KEY", "test-key".to_owned()),
        ("ADMIN_API_KEY", ADMIN_KEY.to_owned()),
    ]);

    Settings::from_lookup(|key| env.get(key).cloned()).unwrap()
}

pub fn test_provider(settings: &Settings, pool: &SqlitePool) -> ServiceProvider {
    service_provider(settings, DatabaseConnection::from_pool(pool.clone())).unwrap()
}

pub fn create_test_app(settings: &Settings, pool: &SqlitePool) -> Router {
    api::router(test_provider(settings, pool), &settings.server)
}

pub async fn json_body(response: Response<Body>) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

pub fn post_json(uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("Content-Type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

/// A provider product record with a single variant.
pub fn raw_product(id: i64, title: &str, price: &str) -> Value {
    json!({
        "id": id,
        "title": title,
        "body_html": format!("<p>{title} description</p>"),
        "vendor": "CarMate",
        "handle": format!("product-{id}"),
        "status": "active",
        "images": [{ "src": format!("https://cdn.example.com/{id}.jpg") }],
        "variants": [{ "id": id * 10, "price": price, "compare_at_price": "0", "sku": format!("SKU-{id}"), "inventory_quantity": 3 }]
    })
}

/// A page of `count` products with ids starting at `first_id`.
pub fn product_page(first_id: i64, count: usize) -> Value {
    let products: Vec<Value> = (0..count as i64)
        .map(|i| raw_product(first_id + i, &format!("Product {}", first_id + i), "100000"))
        .collect();
    json!({ "products": products })
}

/// A Gemini `generateContent` reply carrying `text`.
pub fn gemini_reply(text: &str) -> Value {
    json!({
        "candidates": [{ "content": { "parts": [{ "text": text }], "role": "model" } }]
    })
}
