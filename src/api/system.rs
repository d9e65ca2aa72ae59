//! Banner, liveness and the JSON 404.

use axum::Json;
use axum::http::{StatusCode, Uri};
use chrono::{DateTime, Utc};
use serde::Serialize;

const SERVICE_NAME: &str = env!("CARGO_PKG_NAME");
const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Serialize, Debug)]
pub struct Endpoints {
    pub chat: &'static str,
    pub products: &'static str,
    pub admin: &'static str,
}

#[derive(Serialize, Debug)]
pub struct Banner {
    pub message: &'static str,
    pub version: &'static str,
    pub endpoints: Endpoints,
}

#[derive(Serialize, Debug)]
pub struct Health {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
    pub timestamp: DateTime<Utc>,
}

#[derive(Serialize, Debug)]
pub struct NotFound {
    pub error: &'static str,
    pub path: String,
}

pub async fn index() -> Json<Banner> {
    Json(Banner {
        message: "Haravan Chatbot Backend API",
        version: VERSION,
        endpoints: Endpoints {
            chat: "/api/chat",
            products: "/api/products",
            admin: "/api/admin",
        },
    })
}

pub async fn health() -> Json<Health> {
    Json(Health {
        status: "ok",
        service: SERVICE_NAME,
        version: VERSION,
        timestamp: Utc::now(),
    })
}

pub async fn not_found(uri: Uri) -> (StatusCode, Json<NotFound>) {
    (
        StatusCode::NOT_FOUND,
        Json(NotFound {
            error: "Not Found",
            path: uri.path().to_owned(),
        }),
    )
}
