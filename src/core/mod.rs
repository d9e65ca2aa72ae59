//! Business logic: chat orchestration, catalog sync and caching.

pub mod admin;
pub mod assistant;
pub mod cache;
pub mod models;
pub mod services;
pub mod traits;
