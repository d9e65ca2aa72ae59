//! Product catalog endpoints

use crate::api::products::schemas::{Product, ProductList, SearchQuery, SearchResults};
use crate::core::traits::ProductService;
use crate::error::{ApiError, AppError};
use axum::extract::rejection::QueryRejection;
use axum::extract::{Path, Query};
use axum::routing::get;
use axum::{Json, Router};
use di_axum::Inject;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_products))
        .route("/search", get(search_products))
        .route("/:id", get(product_details))
}

async fn list_products(
    Inject(product_service): Inject<dyn ProductService>,
) -> Result<Json<ProductList>, ApiError> {
    let products = product_service
        .list_products()
        .await
        .map_err(|e| e.context("Failed to get products"))?;

    Ok(Json(ProductList {
        count: products.len(),
        products: products.iter().map(Product::from).collect(),
    }))
}

async fn search_products(
    Inject(product_service): Inject<dyn ProductService>,
    query: Result<Query<SearchQuery>, QueryRejection>,
) -> Result<Json<SearchResults>, ApiError> {
    let Query(SearchQuery { q }) = query?;
    let q = q.unwrap_or_default();

    let products = product_service
        .search_products(&q)
        .await
        .map_err(|e| e.context("Failed to search products"))?;

    Ok(Json(SearchResults {
        query: q,
        count: products.len(),
        products: products.iter().map(Product::from).collect(),
    }))
}

/// `id` is the Haravan product id; anything that is not one is simply not found.
async fn product_details(
    Inject(product_service): Inject<dyn ProductService>,
    Path(id): Path<String>,
) -> Result<Json<Product>, ApiError> {
    let id: i64 = id
        .parse()
        .map_err(|_| AppError::NotFound("Product not found".to_owned()))?;

    let product = product_service
        .find_product(id)
        .await
        .map_err(|e| e.context("Failed to get product"))?;

    Ok(Json(Product::from(&product)))
}

pub mod schemas {
    use crate::infrastructure::entities::{self, Price};
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Serialize};

    /// A stored product, shaped like its `products` row.
    #[derive(Serialize, Debug)]
    pub struct Product {
        pub id: i64,
        pub haravan_id: i64,
        pub title: String,
        pub description: Option<String>,
        pub price: Price,
        pub compare_at_price: Option<Price>,
        pub image_url: Option<String>,
        pub handle: Option<String>,
        pub vendor: Option<String>,
        pub status: Option<String>,
        pub created_at: DateTime<Utc>,
        pub updated_at: DateTime<Utc>,
    }

    impl From<&entities::Product> for Product {
        fn from(product: &entities::Product) -> Self {
            Product::from(product.clone())
        }
    }

    impl From<entities::Product> for Product {
        fn from(product: entities::Product) -> Self {
            Product {
                id: product.id,
                haravan_id: product.haravan_id,
                title: product.title,
                description: product.description,
                price: product.price,
                compare_at_price: product.compare_at_price,
                image_url: product.image_url,
                handle: product.handle,
                vendor: product.vendor,
                status: product.status,
                created_at: product.created_at,
                updated_at: product.updated_at,
            }
        }
    }

    #[derive(Serialize, Debug)]
    pub struct ProductList {
        pub count: usize,
        pub products: Vec<Product>,
    }

    #[derive(Deserialize, Debug)]
    pub struct SearchQuery {
        pub q: Option<String>,
    }

    #[derive(Serialize, Debug)]
    pub struct SearchResults {
        pub query: String,
        pub count: usize,
        pub products: Vec<Product>,
    }
}
