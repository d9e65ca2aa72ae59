//! Haravan product catalog client.
//!
//! Resolves which Haravan endpoint to use, walks every product page sequentially and
//! falls back to the generic CHAPI host when the first page is rejected.

use crate::config::{ApiMode, HaravanSettings, PaginationStrategy};
use crate::infrastructure::traits::CatalogSource;
use async_trait::async_trait;
use log::{debug, info, warn};
use regex::Regex;
use reqwest::StatusCode;
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue, LINK};
use rust_decimal::Decimal;
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::LazyLock;
use thiserror::Error;

/// Default commerce endpoint (shop-agnostic public API).
pub const COMMERCE_BASE_URL: &str = "https://apis.haravan.com/com";
const CHAPI_HOST: &str = "https://chapi.myharavan.com";
const PRODUCT_FIELDS: &str =
    "id,title,body_html,vendor,product_type,handle,status,published_at,created_at,images,image,variants";
/// Longest provider error body kept in an error message.
const ERROR_BODY_LIMIT: usize = 512;

static HTML_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").unwrap());

#[derive(Debug, Error)]
pub enum CatalogFetchError {
    #[error("catalog configuration error: {0}")]
    Config(String),

    #[error("catalog request to {endpoint} failed with status {status}: {message}")]
    Status {
        status: u16,
        endpoint: String,
        message: String,
    },

    #[error("catalog request to {endpoint} failed: {source}")]
    Transport {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("unreadable catalog response from {endpoint}: {message}")]
    Decode { endpoint: String, message: String },
}

impl CatalogFetchError {
    pub fn status(&self) -> Option<u16> {
        match self {
            CatalogFetchError::Status { status, .. } => Some(*status),
            CatalogFetchError::Transport { source, .. } => source.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    pub fn endpoint(&self) -> Option<&str> {
        match self {
            CatalogFetchError::Status { endpoint, .. }
            | CatalogFetchError::Transport { endpoint, .. }
            | CatalogFetchError::Decode { endpoint, .. } => Some(endpoint),
            CatalogFetchError::Config(_) => None,
        }
    }

    /// Auth and not-found rejections mean "wrong host", not "provider down".
    fn is_host_rejection(&self) -> bool {
        matches!(
            self.status().and_then(|s| StatusCode::from_u16(s).ok()),
            Some(StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN | StatusCode::NOT_FOUND)
        )
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawImage {
    #[serde(default)]
    pub src: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawVariant {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "lenient_decimal")]
    pub price: Option<Decimal>,
    #[serde(default, deserialize_with = "lenient_decimal")]
    pub compare_at_price: Option<Decimal>,
    #[serde(default)]
    pub sku: Option<String>,
    #[serde(default)]
    pub inventory_quantity: Option<i64>,
}

/// Product record as the provider sends it.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawProduct {
    pub id: i64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub body_html: Option<String>,
    #[serde(default)]
    pub vendor: Option<String>,
    #[serde(default)]
    pub product_type: Option<String>,
    #[serde(default)]
    pub handle: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub published_at: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub images: Vec<RawImage>,
    /// Legacy single-image field.
    #[serde(default)]
    pub image: Option<RawImage>,
    #[serde(default)]
    pub variants: Vec<RawVariant>,
}

impl RawProduct {
    fn is_active(&self) -> bool {
        self.status
            .as_deref()
            .is_none_or(|status| status.eq_ignore_ascii_case("active"))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CatalogVariant {
    pub id: Option<i64>,
    pub title: Option<String>,
    pub price: Option<Decimal>,
    pub compare_at_price: Option<Decimal>,
    pub sku: Option<String>,
    pub inventory_quantity: Option<i64>,
}

/// Flattened product view used for storage and prompt grounding.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CatalogProduct {
    pub external_id: i64,
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

/// Derives the flattened view of a raw record: first variant's prices, plain-text
/// description and first image (falling back to the legacy image field).
pub fn format_for_ai(product: &RawProduct) -> CatalogProduct {
    let primary = product.variants.first();

    CatalogProduct {
        external_id: product.id,
        title: product.title.clone(),
        price: primary.and_then(|v| v.price).unwrap_or(Decimal::ZERO),
        compare_at_price: primary
            .and_then(|v| v.compare_at_price)
            .filter(|price| !price.is_zero()),
        description: strip_html(product.body_html.as_deref().unwrap_or_default()),
        image_url: product
            .images
            .first()
            .and_then(|image| image.src.clone())
            .or_else(|| product.image.as_ref().and_then(|image| image.src.clone()))
            .filter(|src| !src.is_empty()),
        vendor: product.vendor.clone(),
        handle: product.handle.clone(),
        status: product.status.clone(),
        variants: product
            .variants
            .iter()
            .map(|v| CatalogVariant {
                id: v.id,
                title: v.title.clone(),
                price: v.price,
                compare_at_price: v.compare_at_price,
                sku: v.sku.clone(),
                inventory_quantity: v.inventory_quantity,
            })
            .collect(),
    }
}

pub fn strip_html(html: &str) -> String {
    HTML_TAG.replace_all(html, "").trim().to_owned()
}

/// Resolves the base URL for the configured mode. Trailing slashes are removed.
pub fn resolve_base_url(settings: &HaravanSettings) -> Result<String, CatalogFetchError> {
    if let Some(base) = &settings.api_base {
        return Ok(base.trim_end_matches('/').to_owned());
    }

    let mode = settings.mode.unwrap_or(if settings.shop_url.is_some() {
        ApiMode::Admin
    } else {
        ApiMode::Commerce
    });

    match mode {
        ApiMode::Commerce => Ok(COMMERCE_BASE_URL.to_owned()),
        ApiMode::Admin => {
            let shop = settings.shop_url.as_deref().ok_or_else(|| {
                CatalogFetchError::Config("admin mode requires HARAVAN_SHOP_URL".to_owned())
            })?;
            Ok(format!(
                "{}/admin/api/{}",
                shop.trim_end_matches('/'),
                settings.api_version
            ))
        }
        ApiMode::Chapi => Ok(chapi_base_url(&settings.api_version)),
    }
}

fn chapi_base_url(version: &str) -> String {
    format!("{CHAPI_HOST}/{version}")
}

/// Extracts the `rel="next"` target from an RFC 8288 `Link` header.
pub fn parse_next_link(header: &str) -> Option<String> {
    header.split(',').find_map(|entry| {
        let mut parts = entry.split(';');
        let target = parts.next()?.trim();
        let is_next = parts.any(|param| {
            let param = param.trim();
            param
                .strip_prefix("rel=")
                .map(|rel| {
                    rel.trim_matches('"')
                        .split_whitespace()
                        .any(|r| r.eq_ignore_ascii_case("next"))
                })
                .unwrap_or(false)
        });

        if !is_next {
            return None;
        }

        target
            .strip_prefix('<')
            .and_then(|t| t.strip_suffix('>'))
            .map(str::to_owned)
    })
}

fn lenient_decimal<'de, D>(deserializer: D) -> Result<Option<Decimal>, D::Error>
where
    D: Deserializer<'de>,
{
    let parse = |text: &str| {
        Decimal::from_str(text)
            .or_else(|_| Decimal::from_scientific(text))
            .map_err(de::Error::custom)
    };

    match Option::<serde_json::Value>::deserialize(deserializer)? {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::Number(n)) => parse(&n.to_string()).map(Some),
        Some(serde_json::Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(serde_json::Value::String(s)) => parse(s.trim()).map(Some),
        Some(other) => Err(de::Error::custom(format!(
            "expected a price, found {other}"
        ))),
    }
}

#[derive(Debug, Deserialize)]
struct ProductPage {
    #[serde(default)]
    products: Vec<RawProduct>,
}

#[derive(Debug, Deserialize)]
struct SingleProduct {
    product: RawProduct,
}

/// Where the next page request goes.
enum Cursor {
    Start,
    Page(u32),
    Offset(usize),
    Next(String),
}

/// A pagination failure, remembering which page broke.
struct PageFailure {
    page: u32,
    error: CatalogFetchError,
}

pub struct HaravanClient {
    http: reqwest::Client,
    settings: HaravanSettings,
}

impl HaravanClient {
    pub fn new(settings: HaravanSettings) -> Result<HaravanClient, CatalogFetchError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        if let Some(token) = &settings.access_token {
            let invalid = |_| CatalogFetchError::Config("access token is not a valid header".into());
            headers.insert("X-Access-Token", HeaderValue::from_str(token).map_err(invalid)?);
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&format!("Bearer {token}")).map_err(invalid)?,
            );
        }

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(settings.request_timeout)
            .build()
            .map_err(|e| CatalogFetchError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(HaravanClient { http, settings })
    }

    pub fn base_url(&self) -> Result<String, CatalogFetchError> {
        resolve_base_url(&self.settings)
    }

    fn fallback_base_url(&self) -> String {
        self.settings
            .fallback_base
            .as_deref()
            .map(|base| base.trim_end_matches('/').to_owned())
            .unwrap_or_else(|| chapi_base_url(&self.settings.api_version))
    }

    async fn paginate(&self, base: &str) -> Result<Vec<RawProduct>, PageFailure> {
        let endpoint = format!("{base}/products.json");
        let page_size = self.settings.page_size as usize;
        let mut products = Vec::new();
        let mut received = 0usize;
        let mut cursor = match self.settings.pagination {
            PaginationStrategy::Page => Cursor::Page(1),
            PaginationStrategy::Offset => Cursor::Offset(0),
            PaginationStrategy::Link => Cursor::Start,
        };

        for page in 1..=self.settings.max_pages {
            let fail = |error| PageFailure { page, error };

            let request = match &cursor {
                Cursor::Next(url) => self.http.get(url),
                other => {
                    let request = self.http.get(&endpoint).query(&[
                        ("limit", page_size.to_string()),
                        ("fields", PRODUCT_FIELDS.to_owned()),
                    ]);
                    match other {
                        Cursor::Page(number) => request.query(&[("page", number)]),
                        Cursor::Offset(offset) => request.query(&[("offset", offset)]),
                        _ => request,
                    }
                }
            };

            let response = request.send().await.map_err(|source| {
                fail(CatalogFetchError::Transport {
                    endpoint: endpoint.clone(),
                    source,
                })
            })?;

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(fail(CatalogFetchError::Status {
                    status: status.as_u16(),
                    endpoint: endpoint.clone(),
                    message: body.chars().take(ERROR_BODY_LIMIT).collect(),
                }));
            }

            let next_link = response
                .headers()
                .get(LINK)
                .and_then(|value| value.to_str().ok())
                .and_then(parse_next_link);

            let body: ProductPage = response.json().await.map_err(|e| {
                fail(CatalogFetchError::Decode {
                    endpoint: endpoint.clone(),
                    message: e.to_string(),
                })
            })?;

            let count = body.products.len();
            received += count;
            debug!("page {page} from {endpoint}: {count} products");

            products.extend(
                body.products
                    .into_iter()
                    .filter(|p| !self.settings.active_only || p.is_active()),
            );

            if count == 0 {
                return Ok(products);
            }

            cursor = match (next_link, self.settings.pagination) {
                (Some(url), _) => Cursor::Next(url),
                (None, PaginationStrategy::Link) => return Ok(products),
                (None, _) if count < page_size => return Ok(products),
                (None, PaginationStrategy::Page) => Cursor::Page(page + 1),
                (None, PaginationStrategy::Offset) => Cursor::Offset(received),
            };
        }

        warn!(
            "stopped paginating {endpoint} after {} pages; catalog may be incomplete",
            self.settings.max_pages
        );
        Ok(products)
    }
}

#[async_trait]
impl CatalogSource for HaravanClient {
    async fn fetch_all_products(&self) -> Result<Vec<RawProduct>, CatalogFetchError> {
        let base = self.base_url()?;
        info!(
            "fetching products from {base} (shop url: {}, token: {})",
            self.settings.shop_url.as_deref().unwrap_or("not set"),
            if self.settings.access_token.is_some() { "set" } else { "not set" },
        );

        let failure = match self.paginate(&base).await {
            Ok(products) => {
                info!("fetched {} products from {base}", products.len());
                return Ok(products);
            }
            Err(failure) => failure,
        };

        let fallback = self.fallback_base_url();
        let may_fall_back = self.settings.fallback
            && failure.page == 1
            && failure.error.is_host_rejection()
            && fallback != base;

        if !may_fall_back {
            return Err(failure.error);
        }

        warn!(
            "{}; retrying the catalog fetch against {fallback}",
            failure.error
        );

        match self.paginate(&fallback).await {
            Ok(products) => {
                info!("fetched {} products from {fallback}", products.len());
                Ok(products)
            }
            Err(failure) => Err(failure.error),
        }
    }

    async fn fetch_product(&self, id: i64) -> Result<RawProduct, CatalogFetchError> {
        let endpoint = format!("{}/products/{id}.json", self.base_url()?);

        let response = self.http.get(&endpoint).send().await.map_err(|source| {
            CatalogFetchError::Transport {
                endpoint: endpoint.clone(),
                source,
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CatalogFetchError::Status {
                status: status.as_u16(),
                endpoint,
                message: body.chars().take(ERROR_BODY_LIMIT).collect(),
            });
        }

        response
            .json::<SingleProduct>()
            .await
            .map(|body| body.product)
            .map_err(|e| CatalogFetchError::Decode {
                endpoint,
                message: e.to_string(),
            })
    }
}
