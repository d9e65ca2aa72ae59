//! Chat endpoints

use crate::api::ClientIp;
use crate::api::chat::schemas::{
    ChatReply, History, HistoryQuery, PostMessage, RecommendationRequest, Recommendations,
};
use crate::core::models::ChatRequest;
use crate::core::traits::ChatService;
use crate::error::ApiError;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query};
use axum::routing::{get, post};
use axum::{Json, Router};
use di_axum::Inject;

const DEFAULT_HISTORY_LIMIT: i64 = 20;
const MAX_HISTORY_LIMIT: i64 = 100;

pub fn router() -> Router {
    Router::new()
        .route("/message", post(post_message))
        .route("/history/:session_id", get(session_history))
        .route("/recommendations", post(recommendations))
}

async fn post_message(
    Inject(chat_service): Inject<dyn ChatService>,
    ClientIp(ip_address): ClientIp,
    body: Result<Json<PostMessage>, JsonRejection>,
) -> Result<Json<ChatReply>, ApiError> {
    let Json(body) = body?;

    let reply = chat_service
        .handle_message(ChatRequest {
            message: body.message,
            session_id: body.session_id,
            customer_email: body.customer_email,
            customer_name: body.customer_name,
            ip_address,
        })
        .await
        .map_err(|e| e.context("Failed to process message"))?;

    Ok(Json(reply.into()))
}

async fn session_history(
    Inject(chat_service): Inject<dyn ChatService>,
    Path(session_id): Path<String>,
    query: Result<Query<HistoryQuery>, QueryRejection>,
) -> Result<Json<History>, ApiError> {
    let Query(query) = query?;
    let limit = query
        .limit
        .unwrap_or(DEFAULT_HISTORY_LIMIT)
        .clamp(1, MAX_HISTORY_LIMIT);

    let history = chat_service
        .history(&session_id, limit)
        .await
        .map_err(|e| e.context("Failed to get chat history"))?;

    Ok(Json(History {
        session_id,
        count: history.len(),
        history: history.into_iter().map(schemas::HistoryEntry::from).collect(),
    }))
}

async fn recommendations(
    Inject(chat_service): Inject<dyn ChatService>,
    body: Result<Json<RecommendationRequest>, JsonRejection>,
) -> Result<Json<Recommendations>, ApiError> {
    let Json(body) = body?;

    let recommendation = chat_service
        .recommend(body.preferences.as_deref().unwrap_or_default())
        .await
        .map_err(|e| e.context("Failed to get recommendations"))?;

    Ok(Json(recommendation.into()))
}

pub mod schemas {
    use crate::api::products::schemas::Product;
    use crate::core::models;
    use crate::infrastructure::entities::{self, ReferencedProduct};
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Serialize};

    #[derive(Deserialize, Debug)]
    #[serde(rename_all = "camelCase")]
    pub struct PostMessage {
        pub message: Option<String>,
        pub session_id: Option<String>,
        pub customer_email: Option<String>,
        pub customer_name: Option<String>,
    }

    #[derive(Serialize, Debug)]
    #[serde(rename_all = "camelCase")]
    pub struct ChatReply {
        pub response: String,
        pub referenced_products: Vec<ReferencedProduct>,
        pub session_id: String,
    }

    impl From<models::ChatReply> for ChatReply {
        fn from(reply: models::ChatReply) -> Self {
            ChatReply {
                response: reply.response,
                referenced_products: reply.referenced_products,
                session_id: reply.session_id,
            }
        }
    }

    #[derive(Deserialize, Debug)]
    pub struct HistoryQuery {
        pub limit: Option<i64>,
    }

    /// One stored turn, shaped like its `chat_history` row.
    #[derive(Serialize, Debug)]
    pub struct HistoryEntry {
        pub id: i64,
        pub session_id: String,
        pub user_message: String,
        pub bot_response: String,
        pub referenced_products: Option<Vec<ReferencedProduct>>,
        pub created_at: DateTime<Utc>,
    }

    impl From<entities::ChatMessage> for HistoryEntry {
        fn from(message: entities::ChatMessage) -> Self {
            HistoryEntry {
                id: message.id,
                session_id: message.session_id,
                user_message: message.user_message,
                bot_response: message.bot_response,
                referenced_products: message.referenced_products.map(|json| json.0),
                created_at: message.created_at,
            }
        }
    }

    #[derive(Serialize, Debug)]
    #[serde(rename_all = "camelCase")]
    pub struct History {
        pub session_id: String,
        pub history: Vec<HistoryEntry>,
        pub count: usize,
    }

    #[derive(Deserialize, Debug)]
    pub struct RecommendationRequest {
        pub preferences: Option<String>,
    }

    #[derive(Serialize, Debug)]
    pub struct Recommendations {
        pub recommendations: String,
        pub products: Vec<Product>,
    }

    impl From<models::Recommendation> for Recommendations {
        fn from(recommendation: models::Recommendation) -> Self {
            Recommendations {
                recommendations: recommendation.recommendations,
                products: recommendation
                    .products
                    .into_iter()
                    .map(Product::from)
                    .collect(),
            }
        }
    }
}
