//! Operator access and uptime.

use crate::error::AppError;
use std::time::{Duration, Instant};

/// Guards the admin routes with a shared API key.
pub struct AdminGate {
    api_key: Option<String>,
}

impl AdminGate {
    pub fn new(api_key: Option<String>) -> AdminGate {
        AdminGate {
            api_key: api_key.filter(|key| !key.is_empty()),
        }
    }

    /// Accepts an `Authorization` header that contains the configured key, in any scheme
    /// (`Bearer <key>`, bare key, ...). Without a configured key nothing is accepted.
    pub fn authorize(&self, authorization: Option<&str>) -> Result<(), AppError> {
        match (&self.api_key, authorization) {
            (Some(key), Some(header)) if header.contains(key.as_str()) => Ok(()),
            _ => Err(AppError::Unauthorized),
        }
    }
}

pub struct Uptime {
    started: Instant,
}

impl Uptime {
    pub fn start() -> Uptime {
        Uptime {
            started: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}
