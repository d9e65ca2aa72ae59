use crate::config::ServerSettings;
use async_trait::async_trait;
use axum::Router;
use axum::extract::{ConnectInfo, DefaultBodyLimit, FromRequestParts};
use axum::http::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use axum::http::request::Parts;
use axum::http::{HeaderValue, Method};
use axum::routing::get;
use di::ServiceProvider;
use di_axum::RouterServiceProviderExtensions;
use log::warn;
use std::net::SocketAddr;
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

pub mod admin;
pub mod chat;
pub mod products;
pub mod system;

const X_FORWARDED_FOR: &str = "X-Forwarded-For";
const BODY_LIMIT: usize = 10 * 1024 * 1024;

/// The whole HTTP surface, with services resolved from `provider` per request.
pub fn router(provider: ServiceProvider, settings: &ServerSettings) -> Router {
    Router::new()
        .route("/", get(system::index))
        .route("/health", get(system::health))
        .nest("/api/chat", chat::router())
        .nest("/api/products", products::router())
        .nest("/api/admin", admin::router())
        .fallback(system::not_found)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors(&settings.allowed_origins))
                .layer(DefaultBodyLimit::max(BODY_LIMIT)),
        )
        .with_provider(provider)
}

fn cors(allowed_origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("ignoring invalid CORS origin `{origin}`");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION, ACCEPT])
        .allow_credentials(true)
}

/// The raw `Authorization` header, if any. A value that is not visible ASCII counts as
/// missing, so guarded routes answer 401.
#[derive(Debug)]
pub struct ExtractAuthorization(pub Option<String>);

#[async_trait]
impl<S> FromRequestParts<S> for ExtractAuthorization
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> Result<Self, std::convert::Infallible> {
        let authorization = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned);

        Ok(ExtractAuthorization(authorization))
    }
}

/// Caller address: first `X-Forwarded-For` entry, else the socket peer when the server
/// was started with connect info.
#[derive(Debug)]
pub struct ClientIp(pub Option<String>);

#[async_trait]
impl<S> FromRequestParts<S> for ClientIp
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> Result<Self, std::convert::Infallible> {
        let forwarded = parts
            .headers
            .get(X_FORWARDED_FOR)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.split(',').next())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_owned);

        let peer = || {
            parts
                .extensions
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip().to_string())
        };

        Ok(ClientIp(forwarded.or_else(peer)))
    }
}
