//! API Integration Tests
//!
//! Drives the full router with a real in-memory database, while mock servers stand in
//! for Haravan and Gemini.

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::{
    ADMIN_KEY, create_test_app, gemini_reply, get, json_body, post_json, product_page,
    raw_product, setup_test_db, test_provider, test_settings,
};
use haravan_chat_api::config::Settings;
use haravan_chat_api::core::traits::SyncService;
use serde_json::json;
use sqlx::SqlitePool;
use tower::ServiceExt;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct TestEnv {
    haravan: MockServer,
    gemini: MockServer,
    pool: SqlitePool,
    settings: Settings,
}

impl TestEnv {
    async fn start() -> TestEnv {
        let haravan = MockServer::start().await;
        let gemini = MockServer::start().await;
        let pool = setup_test_db().await;
        let settings = test_settings(&haravan.uri(), &gemini.uri());

        TestEnv {
            haravan,
            gemini,
            pool,
            settings,
        }
    }

    fn app(&self) -> axum::Router {
        create_test_app(&self.settings, &self.pool)
    }

    async fn serve_catalog(&self, products: serde_json::Value) {
        Mock::given(method("GET"))
            .and(path("/products.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(products))
            .mount(&self.haravan)
            .await;
    }

    /// Loads whatever the mock catalog serves into the database.
    async fn sync(&self) {
        let provider = test_provider(&self.settings, &self.pool);
        let scope = provider.create_scope();
        scope
            .get_required::<dyn SyncService>()
            .sync_products()
            .await
            .unwrap();
    }

    async fn count(&self, table: &str) -> i64 {
        let (count,): (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM {table}"))
            .fetch_one(&self.pool)
            .await
            .unwrap();
        count
    }
}

fn admin_request(method: &str, uri: &str, authorization: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(value) = authorization {
        builder = builder.header("Authorization", value);
    }
    builder.body(Body::empty()).unwrap()
}

#[tokio::test]
async fn test_health_and_banner() {
    let env = TestEnv::start().await;

    let response = env.app().oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["service"], "haravan-chat-api");
    assert!(json["timestamp"].is_string());

    let response = env.app().oneshot(get("/")).await.unwrap();
    let json = json_body(response).await;
    assert_eq!(json["endpoints"]["chat"], "/api/chat");
    assert_eq!(json["endpoints"]["admin"], "/api/admin");

    let response = env.app().oneshot(get("/api/admin/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert!(json["uptime"].as_f64().unwrap() >= 0.0);
}

#[tokio::test]
async fn test_unknown_route_is_json_404() {
    let env = TestEnv::start().await;

    let response = env.app().oneshot(get("/api/nope")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(
        json_body(response).await,
        json!({ "error": "Not Found", "path": "/api/nope" })
    );
}

#[tokio::test]
async fn test_chat_message_references_matching_products() {
    let env = TestEnv::start().await;
    env.serve_catalog(json!({
        "products": [
            raw_product(1001, "Lốp Michelin", "1250000"),
            raw_product(1002, "Nước rửa kính", "45000")
        ]
    }))
    .await;
    env.sync().await;

    Mock::given(method("POST"))
        .and(body_string_contains("Lốp Michelin"))
        .respond_with(ResponseTemplate::new(200).set_body_json(gemini_reply(
            "Chúng tôi có Lốp Michelin giá khoảng 1.250.000đ.",
        )))
        .expect(1)
        .mount(&env.gemini)
        .await;

    let response = env
        .app()
        .oneshot(post_json(
            "/api/chat/message",
            &json!({ "message": "Tôi cần lốp xe", "sessionId": "s1", "customerName": "An" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let reply = json_body(response).await;

    let (michelin_id,): (i64,) =
        sqlx::query_as("SELECT id FROM products WHERE haravan_id = 1001")
            .fetch_one(&env.pool)
            .await
            .unwrap();

    assert_eq!(reply["sessionId"], "s1");
    assert_eq!(
        reply["response"],
        "Chúng tôi có Lốp Michelin giá khoảng 1.250.000đ."
    );
    let referenced = reply["referencedProducts"].as_array().unwrap();
    assert_eq!(referenced.len(), 1);
    assert_eq!(referenced[0]["id"], michelin_id);
    assert_eq!(referenced[0]["title"], "Lốp Michelin");

    let (session_id, products): (String, Option<String>) = sqlx::query_as(
        "SELECT session_id, referenced_products FROM chat_history WHERE session_id = 's1'",
    )
    .fetch_one(&env.pool)
    .await
    .unwrap();
    assert_eq!(session_id, "s1");
    assert!(products.unwrap().contains("Lốp Michelin"));
    assert_eq!(env.count("chat_sessions").await, 1);
}

#[tokio::test]
async fn test_chat_message_requires_message_and_session() {
    let env = TestEnv::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(gemini_reply("unused")))
        .expect(0)
        .mount(&env.gemini)
        .await;

    for body in [
        json!({ "message": "", "sessionId": "s1" }),
        json!({ "message": "Xin chào" }),
        json!({ "sessionId": "s1" }),
    ] {
        let response = env
            .app()
            .oneshot(post_json("/api/chat/message", &body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            json_body(response).await["error"],
            "Message and sessionId are required"
        );
    }

    assert_eq!(env.count("chat_sessions").await, 0);
    assert_eq!(env.count("chat_history").await, 0);
}

#[tokio::test]
async fn test_malformed_body_is_bad_request() {
    let env = TestEnv::start().await;

    let request = Request::builder()
        .method("POST")
        .uri("/api/chat/message")
        .header("Content-Type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();

    let response = env.app().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["error"], "Invalid request body");
}

#[tokio::test]
async fn test_history_returns_turns_oldest_first() {
    let env = TestEnv::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(gemini_reply("Dạ vâng")))
        .expect(3)
        .mount(&env.gemini)
        .await;

    for message in ["một", "hai", "ba"] {
        let response = env
            .app()
            .oneshot(post_json(
                "/api/chat/message",
                &json!({ "message": message, "sessionId": "s1" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = env
        .app()
        .oneshot(get("/api/chat/history/s1"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;

    assert_eq!(json["sessionId"], "s1");
    assert_eq!(json["count"], 3);
    let messages: Vec<&str> = json["history"]
        .as_array()
        .unwrap()
        .iter()
        .map(|entry| entry["user_message"].as_str().unwrap())
        .collect();
    assert_eq!(messages, vec!["một", "hai", "ba"]);

    let response = env
        .app()
        .oneshot(get("/api/chat/history/s1?limit=1"))
        .await
        .unwrap();
    let json = json_body(response).await;
    assert_eq!(json["count"], 1);
    assert_eq!(json["history"][0]["user_message"], "ba");
}

#[tokio::test]
async fn test_generation_failure_is_500_with_details() {
    let env = TestEnv::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429).set_body_json(json!({
            "error": { "code": 429, "message": "Resource has been exhausted", "status": "RESOURCE_EXHAUSTED" }
        })))
        .mount(&env.gemini)
        .await;

    let response = env
        .app()
        .oneshot(post_json(
            "/api/chat/message",
            &json!({ "message": "Xin chào", "sessionId": "s1" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let json = json_body(response).await;
    assert_eq!(json["error"], "Failed to process message");
    assert!(json["details"].as_str().unwrap().contains("RESOURCE_EXHAUSTED"));

    // The session was touched before generation failed; no turn was stored.
    assert_eq!(env.count("chat_sessions").await, 1);
    assert_eq!(env.count("chat_history").await, 0);
}

#[tokio::test]
async fn test_recommendations() {
    let env = TestEnv::start().await;
    env.serve_catalog(product_page(1, 12)).await;
    env.sync().await;

    Mock::given(method("POST"))
        .and(body_string_contains("lốp cho xe SUV"))
        .respond_with(ResponseTemplate::new(200).set_body_json(gemini_reply("1. Product 1")))
        .mount(&env.gemini)
        .await;

    let response = env
        .app()
        .oneshot(post_json(
            "/api/chat/recommendations",
            &json!({ "preferences": "lốp cho xe SUV" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["recommendations"], "1. Product 1");
    assert_eq!(json["products"].as_array().unwrap().len(), 10);

    let response = env
        .app()
        .oneshot(post_json(
            "/api/chat/recommendations",
            &json!({ "preferences": "  " }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_products_listing_search_and_details() {
    let env = TestEnv::start().await;
    env.serve_catalog(json!({
        "products": [
            raw_product(11, "Michelin Tire X", "2000000"),
            raw_product(12, "Wiper blade", "150000")
        ]
    }))
    .await;
    env.sync().await;

    let response = env.app().oneshot(get("/api/products")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["count"], 2);

    let response = env
        .app()
        .oneshot(get("/api/products/search?q=tire"))
        .await
        .unwrap();
    let json = json_body(response).await;
    assert_eq!(json["query"], "tire");
    assert_eq!(json["count"], 1);
    assert_eq!(json["products"][0]["haravan_id"], 11);
    assert_eq!(json["products"][0]["price"], "2000000");

    let response = env
        .app()
        .oneshot(get("/api/products/search?q=a"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        json_body(response).await["error"],
        "Search query must be at least 2 characters"
    );

    let response = env.app().oneshot(get("/api/products/12")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["title"], "Wiper blade");

    for missing in ["/api/products/999", "/api/products/not-a-number"] {
        let response = env.app().oneshot(get(missing)).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(json_body(response).await["error"], "Product not found");
    }
}

#[tokio::test]
async fn test_sync_invalidates_product_cache() {
    let env = TestEnv::start().await;
    env.serve_catalog(product_page(1, 1)).await;

    let app = env.app();
    let auth = format!("Bearer {ADMIN_KEY}");
    let sync = || admin_request("POST", "/api/admin/sync-products", Some(auth.as_str()));

    let response = app.clone().oneshot(sync()).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        json_body(response).await,
        json!({ "success": true, "message": "Successfully synced 1 products", "count": 1 })
    );

    let response = app.clone().oneshot(get("/api/products")).await.unwrap();
    assert_eq!(json_body(response).await["count"], 1);

    env.haravan.reset().await;
    env.serve_catalog(product_page(1, 3)).await;

    let response = app.clone().oneshot(sync()).await.unwrap();
    assert_eq!(json_body(response).await["count"], 3);

    let response = app.clone().oneshot(get("/api/products")).await.unwrap();
    assert_eq!(json_body(response).await["count"], 3);
}

#[tokio::test]
async fn test_sync_failure_keeps_existing_products() {
    let env = TestEnv::start().await;
    env.serve_catalog(product_page(1, 2)).await;
    env.sync().await;

    env.haravan.reset().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
        .mount(&env.haravan)
        .await;

    let response = env
        .app()
        .oneshot(admin_request(
            "POST",
            "/api/admin/sync-products",
            Some(ADMIN_KEY),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let json = json_body(response).await;
    assert_eq!(json["error"], "Failed to sync products");
    assert!(json["details"].as_str().unwrap().contains("502"));

    assert_eq!(env.count("products").await, 2);
}

#[tokio::test]
async fn test_admin_routes_require_the_api_key() {
    let env = TestEnv::start().await;

    for (method, uri) in [
        ("POST", "/api/admin/sync-products"),
        ("GET", "/api/admin/stats"),
        ("GET", "/api/admin/catalog/1"),
    ] {
        for authorization in [None, Some("Bearer wrong-key")] {
            let response = env
                .app()
                .oneshot(admin_request(method, uri, authorization))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{method} {uri}");
            assert_eq!(json_body(response).await, json!({ "error": "Unauthorized" }));
        }
    }
}

#[tokio::test]
async fn test_admin_rejects_undecodable_authorization() {
    let env = TestEnv::start().await;

    let mut request = admin_request("POST", "/api/admin/sync-products", None);
    request.headers_mut().insert(
        "Authorization",
        axum::http::HeaderValue::from_bytes(&[0xFF, 0xFE]).unwrap(),
    );

    let response = env.app().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json_body(response).await, json!({ "error": "Unauthorized" }));
}

#[tokio::test]
async fn test_admin_stats() {
    let env = TestEnv::start().await;
    env.serve_catalog(product_page(1, 4)).await;
    env.sync().await;

    let app = env.app();
    // warm the cache: one miss, then one hit
    app.clone().oneshot(get("/api/products")).await.unwrap();
    app.clone().oneshot(get("/api/products")).await.unwrap();

    let response = app
        .oneshot(admin_request(
            "GET",
            "/api/admin/stats",
            Some(format!("Bearer {ADMIN_KEY}").as_str()),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["products"]["total"], 4);
    assert_eq!(json["cache"]["keys"], 1);
    assert_eq!(json["cache"]["hits"], 1);
    assert_eq!(json["cache"]["misses"], 1);
}

#[tokio::test]
async fn test_admin_catalog_preview() {
    let env = TestEnv::start().await;

    Mock::given(method("GET"))
        .and(path("/products/42.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "product": raw_product(42, "Lốp Michelin", "1250000")
        })))
        .mount(&env.haravan)
        .await;

    Mock::given(method("GET"))
        .and(path("/products/7.json"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&env.haravan)
        .await;

    let auth = format!("Bearer {ADMIN_KEY}");

    let response = env
        .app()
        .oneshot(admin_request("GET", "/api/admin/catalog/42", Some(auth.as_str())))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["id"], 42);
    assert_eq!(json["description"], "Lốp Michelin description");
    assert_eq!(json["price"], "1250000");
    assert!(json["compare_at_price"].is_null());

    let response = env
        .app()
        .oneshot(admin_request("GET", "/api/admin/catalog/7", Some(auth.as_str())))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(
        json_body(response).await["error"],
        "Product not found in catalog"
    );

    // nothing was written to the store
    assert_eq!(env.count("products").await, 0);
}
