//! Storage and remote providers.

pub mod database;
pub mod entities;
pub mod gemini;
pub mod haravan;
pub mod repositories;
pub mod traits;
