//! Database entities

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::encode::IsNull;
use sqlx::error::BoxDynError;
use sqlx::types::Json;
use sqlx::{Database, Decode, Encode, FromRow, Sqlite, Type};
use std::fmt;
use std::str::FromStr;

/// Exact decimal amount, stored as text so no float rounding ever touches it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Price(pub Decimal);

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<Decimal> for Price {
    fn from(value: Decimal) -> Self {
        Price(value)
    }
}

impl Type<Sqlite> for Price {
    fn type_info() -> <Sqlite as Database>::TypeInfo {
        <str as Type<Sqlite>>::type_info()
    }

    fn compatible(ty: &<Sqlite as Database>::TypeInfo) -> bool {
        <str as Type<Sqlite>>::compatible(ty)
    }
}

impl<'q> Encode<'q, Sqlite> for Price {
    fn encode_by_ref(
        &self,
        buf: &mut <Sqlite as Database>::ArgumentBuffer<'q>,
    ) -> Result<IsNull, BoxDynError> {
        <String as Encode<'q, Sqlite>>::encode(self.0.to_string(), buf)
    }
}

impl<'r> Decode<'r, Sqlite> for Price {
    fn decode(value: <Sqlite as Database>::ValueRef<'r>) -> Result<Self, BoxDynError> {
        let text = <&str as Decode<'r, Sqlite>>::decode(value)?;
        Ok(Price(Decimal::from_str(text.trim())?))
    }
}

#[derive(Debug, Clone, FromRow)]
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

#[derive(Debug, Clone, FromRow)]
pub struct ChatSession {
    pub id: i64,
    pub session_id: String,
    pub customer_email: Option<String>,
    pub customer_name: Option<String>,
    pub ip_address: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

/// Snapshot of a product as it was cited in a bot answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferencedProduct {
    pub id: i64,
    pub title: String,
    pub price: Price,
}

impl From<&Product> for ReferencedProduct {
    fn from(product: &Product) -> Self {
        ReferencedProduct {
            id: product.id,
            title: product.title.clone(),
            price: product.price,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct ChatMessage {
    pub id: i64,
    pub session_id: String,
    pub user_message: String,
    pub bot_response: String,
    pub referenced_products: Option<Json<Vec<ReferencedProduct>>>,
    pub created_at: DateTime<Utc>,
}

/// Fields supplied by the caller when a session is opened or touched.
#[derive(Debug, Clone, Default)]
pub struct SessionVisit {
    pub session_id: String,
    pub customer_email: Option<String>,
    pub customer_name: Option<String>,
    pub ip_address: Option<String>,
}
