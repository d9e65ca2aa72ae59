//! Runtime settings, assembled from environment variables.
//!
//! Every value has a default except credentials; nothing here performs I/O beyond reading
//! the environment (and `.env` through `dotenvy` in [`Settings::from_env`]).

use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Largest page the commerce API hands out.
pub const MAX_PAGE_SIZE: u32 = 250;
/// Lower bound on the pagination safety stop.
pub const MIN_MAX_PAGES: u32 = 100;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {key}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },

    #[error("failed to build {component}: {reason}")]
    Component {
        component: &'static str,
        reason: String,
    },
}

/// Which shape of commerce endpoint to talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiMode {
    Commerce,
    Admin,
    Chapi,
}

impl FromStr for ApiMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "commerce" => Ok(ApiMode::Commerce),
            "admin" => Ok(ApiMode::Admin),
            "chapi" => Ok(ApiMode::Chapi),
            other => Err(format!("unknown api mode `{other}`")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PaginationStrategy {
    /// `page` + `limit` query parameters.
    #[default]
    Page,
    /// `offset` + `limit` query parameters.
    Offset,
    /// Follow `Link: <...>; rel="next"` response headers.
    Link,
}

impl FromStr for PaginationStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "page" => Ok(PaginationStrategy::Page),
            "offset" => Ok(PaginationStrategy::Offset),
            "link" | "link-header" => Ok(PaginationStrategy::Link),
            other => Err(format!("unknown pagination strategy `{other}`")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub database: DatabaseSettings,
    pub haravan: HaravanSettings,
    pub gemini: GeminiSettings,
    pub admin: AdminSettings,
    pub cache: CacheSettings,
    pub startup: StartupSettings,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub port: u16,
    pub allowed_origins: Vec<String>,
    pub log_level: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        ServerSettings {
            port: 3001,
            allowed_origins: vec!["http://localhost:3000".to_owned()],
            log_level: "info".to_owned(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DatabaseSettings {
    pub url: String,
    pub max_connections: u32,
    pub idle_timeout: Duration,
    pub connect_timeout: Duration,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        DatabaseSettings {
            url: "sqlite://chatbot.db".to_owned(),
            max_connections: 20,
            idle_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(2),
        }
    }
}

#[derive(Debug, Clone)]
pub struct HaravanSettings {
    pub access_token: Option<String>,
    pub shop_url: Option<String>,
    /// Used verbatim when set, bypassing mode resolution.
    pub api_base: Option<String>,
    pub mode: Option<ApiMode>,
    pub api_version: String,
    pub pagination: PaginationStrategy,
    pub page_size: u32,
    pub max_pages: u32,
    pub fallback: bool,
    /// Generic host tried when the first page is rejected; defaults to CHAPI.
    pub fallback_base: Option<String>,
    pub active_only: bool,
    pub request_timeout: Duration,
}

impl Default for HaravanSettings {
    fn default() -> Self {
        HaravanSettings {
            access_token: None,
            shop_url: None,
            api_base: None,
            mode: None,
            api_version: "2024-07".to_owned(),
            pagination: PaginationStrategy::Page,
            page_size: MAX_PAGE_SIZE,
            max_pages: MIN_MAX_PAGES,
            fallback: true,
            fallback_base: None,
            active_only: false,
            request_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone)]
pub struct GeminiSettings {
    pub api_key: Option<String>,
    pub api_url: String,
    pub model: String,
    pub temperature: f32,
    pub max_output_tokens: u32,
    pub request_timeout: Duration,
    /// Shop name the assistant introduces itself for.
    pub shop_name: String,
}

impl Default for GeminiSettings {
    fn default() -> Self {
        GeminiSettings {
            api_key: None,
            api_url: "https://generativelanguage.googleapis.com/v1beta".to_owned(),
            model: "gemini-1.5-flash".to_owned(),
            temperature: 0.7,
            max_output_tokens: 1024,
            request_timeout: Duration::from_secs(60),
            shop_name: "CarMate".to_owned(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct AdminSettings {
    pub api_key: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub products_ttl: Duration,
}

impl Default for CacheSettings {
    fn default() -> Self {
        CacheSettings {
            products_ttl: Duration::from_secs(3600),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StartupSettings {
    pub auto_sync: bool,
    pub auto_sync_timeout: Duration,
}

impl Default for StartupSettings {
    fn default() -> Self {
        StartupSettings {
            auto_sync: false,
            auto_sync_timeout: Duration::from_secs(60),
        }
    }
}

impl Settings {
    /// Loads `.env` (if present) and reads the process environment.
    pub fn from_env() -> Result<Settings, ConfigError> {
        dotenvy::dotenv().ok();
        Settings::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds settings from an arbitrary key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Settings, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_owned())
                .filter(|v| !v.is_empty())
        };

        let server_defaults = ServerSettings::default();
        let server = ServerSettings {
            port: parse_or(&get, "PORT", server_defaults.port)?,
            allowed_origins: get("ALLOWED_ORIGINS")
                .map(|origins| {
                    origins
                        .split(',')
                        .map(|o| o.trim().to_owned())
                        .filter(|o| !o.is_empty())
                        .collect()
                })
                .unwrap_or(server_defaults.allowed_origins),
            log_level: get("LOG_LEVEL").unwrap_or(server_defaults.log_level),
        };

        let db_defaults = DatabaseSettings::default();
        let database = DatabaseSettings {
            url: get("DATABASE_URL").unwrap_or(db_defaults.url),
            max_connections: parse_or(&get, "DB_MAX_CONNECTIONS", db_defaults.max_connections)?,
            idle_timeout: secs_or(&get, "DB_IDLE_TIMEOUT_SECS", db_defaults.idle_timeout)?,
            connect_timeout: secs_or(&get, "DB_CONNECT_TIMEOUT_SECS", db_defaults.connect_timeout)?,
        };

        let hv_defaults = HaravanSettings::default();
        let haravan = HaravanSettings {
            access_token: get("HARAVAN_ACCESS_TOKEN"),
            shop_url: get("HARAVAN_SHOP_URL"),
            api_base: get("HARAVAN_API_BASE"),
            mode: parse_opt(&get, "HARAVAN_API_MODE")?,
            api_version: get("HARAVAN_API_VERSION").unwrap_or(hv_defaults.api_version),
            pagination: parse_or(&get, "HARAVAN_PAGINATION", hv_defaults.pagination)?,
            page_size: parse_or(&get, "HARAVAN_PAGE_SIZE", hv_defaults.page_size)?
                .clamp(1, MAX_PAGE_SIZE),
            max_pages: parse_or(&get, "HARAVAN_MAX_PAGES", hv_defaults.max_pages)?
                .max(MIN_MAX_PAGES),
            fallback: flag_or(&get, "HARAVAN_FALLBACK", hv_defaults.fallback)?,
            fallback_base: get("HARAVAN_FALLBACK_BASE"),
            active_only: flag_or(&get, "HARAVAN_ACTIVE_ONLY", hv_defaults.active_only)?,
            request_timeout: secs_or(&get, "HARAVAN_TIMEOUT_SECS", hv_defaults.request_timeout)?,
        };

        let gm_defaults = GeminiSettings::default();
        let gemini = GeminiSettings {
            api_key: get("GEMINI_API_KEY"),
            api_url: get("GEMINI_API_URL").unwrap_or(gm_defaults.api_url),
            model: get("GEMINI_MODEL").unwrap_or(gm_defaults.model),
            temperature: parse_or(&get, "GEMINI_TEMPERATURE", gm_defaults.temperature)?,
            max_output_tokens: parse_or(&get, "GEMINI_MAX_TOKENS", gm_defaults.max_output_tokens)?,
            request_timeout: secs_or(&get, "GEMINI_TIMEOUT_SECS", gm_defaults.request_timeout)?,
            shop_name: get("SHOP_NAME").unwrap_or(gm_defaults.shop_name),
        };

        let admin = AdminSettings {
            api_key: get("ADMIN_API_KEY").or_else(|| get("HARAVAN_API_KEY")),
        };

        let cache = CacheSettings {
            products_ttl: secs_or(
                &get,
                "PRODUCTS_CACHE_TTL_SECS",
                CacheSettings::default().products_ttl,
            )?,
        };

        let startup_defaults = StartupSettings::default();
        let startup = StartupSettings {
            auto_sync: flag_or(&get, "AUTO_SYNC_ON_STARTUP", startup_defaults.auto_sync)?,
            auto_sync_timeout: secs_or(
                &get,
                "AUTO_SYNC_TIMEOUT_SECS",
                startup_defaults.auto_sync_timeout,
            )?,
        };

        Ok(Settings {
            server,
            database,
            haravan,
            gemini,
            admin,
            cache,
            startup,
        })
    }
}

fn parse_opt<T, G>(get: &G, key: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: Display,
    G: Fn(&str) -> Option<String>,
{
    get(key)
        .map(|value| {
            value.parse().map_err(|e: T::Err| ConfigError::Invalid {
                key,
                reason: e.to_string(),
                value,
            })
        })
        .transpose()
}

fn parse_or<T, G>(get: &G, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
    G: Fn(&str) -> Option<String>,
{
    Ok(parse_opt(get, key)?.unwrap_or(default))
}

fn secs_or<G>(get: &G, key: &'static str, default: Duration) -> Result<Duration, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    Ok(parse_opt::<u64, _>(get, key)?
        .map(Duration::from_secs)
        .unwrap_or(default))
}

fn flag_or<G>(get: &G, key: &'static str, default: bool) -> Result<bool, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        None => Ok(default),
        Some(value) => match value.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::Invalid {
                key,
                value,
                reason: "expected a boolean".to_owned(),
            }),
        },
    }
}
