//! Customer-support chat backend for a Haravan shop, answering with Gemini.
//!
//! Library exports, shared by the binary and the integration tests.

pub mod api;
pub mod config;
pub mod core;
pub mod error;
pub mod infrastructure;

use crate::config::{ConfigError, Settings};
use crate::core::admin::{AdminGate, Uptime};
use crate::core::assistant::Assistant;
use crate::core::cache::ProductCache;
use crate::core::services::{
    CatalogProductService, CatalogSyncService, SupportChatService, SyncLock,
};
use crate::core::traits::ChatModel;
use crate::infrastructure::database::DatabaseConnection;
use crate::infrastructure::gemini::GeminiClient;
use crate::infrastructure::haravan::HaravanClient;
use crate::infrastructure::repositories::{DbChatRepository, DbProductRepository};
use crate::infrastructure::traits::{CatalogSource, TextGenerator};
use di::{Injectable, Ref, ServiceCollection, ServiceProvider, existing, existing_as_self};

/// Builds the service container. Everything stateful (pool, cache, HTTP clients, sync
/// lock) is constructed here once and lives as long as the returned provider.
pub fn service_provider(
    settings: &Settings,
    connection: DatabaseConnection,
) -> Result<ServiceProvider, ConfigError> {
    let catalog =
        HaravanClient::new(settings.haravan.clone()).map_err(|e| ConfigError::Component {
            component: "Haravan client",
            reason: e.to_string(),
        })?;

    let generator: Ref<dyn TextGenerator> =
        Ref::new(
            GeminiClient::new(&settings.gemini).map_err(|e| ConfigError::Component {
                component: "Gemini client",
                reason: e.to_string(),
            })?,
        );

    let assistant = Assistant::new(generator, settings.gemini.shop_name.clone()).map_err(|e| {
        ConfigError::Component {
            component: "assistant",
            reason: e.to_string(),
        }
    })?;

    ServiceCollection::new()
        .add(existing_as_self(connection))
        .add(existing_as_self(ProductCache::new(settings.cache.products_ttl)))
        .add(existing_as_self(SyncLock::default()))
        .add(existing_as_self(AdminGate::new(settings.admin.api_key.clone())))
        .add(existing_as_self(Uptime::start()))
        .add(existing::<dyn CatalogSource, HaravanClient>(Box::new(catalog)))
        .add(existing::<dyn ChatModel, Assistant>(Box::new(assistant)))
        .add(DbProductRepository::scoped())
        .add(DbChatRepository::scoped())
        .add(SupportChatService::scoped())
        .add(CatalogProductService::scoped())
        .add(CatalogSyncService::scoped())
        .build_provider()
        .map_err(|e| ConfigError::Component {
            component: "service container",
            reason: e.to_string(),
        })
}
