//! Operator endpoints

use crate::api::ExtractAuthorization;
use crate::api::admin::schemas::{AdminHealth, CatalogPreview, ProductTotals, Stats, SyncResult};
use crate::core::admin::{AdminGate, Uptime};
use crate::core::traits::{ProductService, SyncService};
use crate::error::{ApiError, AppError};
use axum::extract::Path;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use di_axum::Inject;

pub fn router() -> Router {
    Router::new()
        .route("/sync-products", post(sync_products))
        .route("/stats", get(stats))
        .route("/health", get(health))
        .route("/catalog/:id", get(catalog_preview))
}

async fn sync_products(
    Inject(gate): Inject<AdminGate>,
    Inject(sync_service): Inject<dyn SyncService>,
    ExtractAuthorization(authorization): ExtractAuthorization,
) -> Result<Json<SyncResult>, ApiError> {
    gate.authorize(authorization.as_deref())?;

    let report = sync_service
        .sync_products()
        .await
        .map_err(|e| e.context("Failed to sync products"))?;

    Ok(Json(SyncResult {
        success: true,
        message: format!("Successfully synced {} products", report.stored),
        count: report.stored,
    }))
}

async fn stats(
    Inject(gate): Inject<AdminGate>,
    Inject(product_service): Inject<dyn ProductService>,
    ExtractAuthorization(authorization): ExtractAuthorization,
) -> Result<Json<Stats>, ApiError> {
    gate.authorize(authorization.as_deref())?;

    let stats = product_service
        .stats()
        .await
        .map_err(|e| e.context("Failed to get stats"))?;

    Ok(Json(Stats {
        products: ProductTotals {
            total: stats.total_products,
        },
        cache: stats.cache,
        timestamp: Utc::now(),
    }))
}

async fn health(Inject(uptime): Inject<Uptime>) -> Json<AdminHealth> {
    Json(AdminHealth {
        status: "ok",
        timestamp: Utc::now(),
        uptime: uptime.elapsed().as_secs_f64(),
    })
}

async fn catalog_preview(
    Inject(gate): Inject<AdminGate>,
    Inject(sync_service): Inject<dyn SyncService>,
    ExtractAuthorization(authorization): ExtractAuthorization,
    Path(id): Path<String>,
) -> Result<Json<CatalogPreview>, ApiError> {
    gate.authorize(authorization.as_deref())?;

    let id: i64 = id
        .parse()
        .map_err(|_| AppError::NotFound("Product not found in catalog".to_owned()))?;

    let product = sync_service
        .preview_product(id)
        .await
        .map_err(|e| e.context("Failed to fetch catalog product"))?;

    Ok(Json(product.into()))
}

pub mod schemas {
    use crate::core::cache::CacheStats;
    use crate::infrastructure::haravan::{CatalogProduct, CatalogVariant};
    use chrono::{DateTime, Utc};
    use rust_decimal::Decimal;
    use serde::Serialize;

    #[derive(Serialize, Debug)]
    pub struct SyncResult {
        pub success: bool,
        pub message: String,
        pub count: u64,
    }

    #[derive(Serialize, Debug)]
    pub struct ProductTotals {
        pub total: i64,
    }

    #[derive(Serialize, Debug)]
    pub struct Stats {
        pub products: ProductTotals,
        pub cache: CacheStats,
        pub timestamp: DateTime<Utc>,
    }

    #[derive(Serialize, Debug)]
    pub struct AdminHealth {
        pub status: &'static str,
        pub timestamp: DateTime<Utc>,
        /// Seconds since startup.
        pub uptime: f64,
    }

    /// A catalog record as the next sync would store it.
    #[derive(Serialize, Debug)]
    pub struct CatalogPreview {
        pub id: i64,
        pub title: String,
        pub price: Decimal,
        pub compare_at_price: Option<Decimal>,
        pub description: String,
        pub image_url: Option<String>,
        pub vendor: Option<String>,
        pub handle: Option<String>,
        pub status: Option<String>,
        pub variants: Vec<CatalogVariant>,
    }

    impl From<CatalogProduct> for CatalogPreview {
        fn from(product: CatalogProduct) -> Self {
            CatalogPreview {
                id: product.external_id,
                title: product.title,
                price: product.price,
                compare_at_price: product.compare_at_price,
                description: product.description,
                image_url: product.image_url,
                vendor: product.vendor,
                handle: product.handle,
                status: product.status,
                variants: product.variants,
            }
        }
    }
}
