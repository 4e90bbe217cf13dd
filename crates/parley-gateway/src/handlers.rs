// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP request handlers.
//!
//! Handlers only translate between HTTP and the engine; every rule lives in
//! `parley-engine`.

use axum::{
    Json,
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use parley_core::types::{
    Conversation, ConversationFilter, ConversationPatch, ConversationStatus, HealthStatus, Message,
};
use parley_engine::{SendRequest, WebhookOutcome, WidgetOutcome, WidgetPost, WidgetReply};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::server::GatewayState;

type ApiResult<T> = Result<Json<T>, ApiError>;

/// Response body for GET /health.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
}

/// Acknowledgement returned for every authenticated webhook.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct WebhookAck {
    pub status: String,
    #[serde(default)]
    pub messages: usize,
    #[serde(default)]
    pub statuses: usize,
}

impl From<WebhookOutcome> for WebhookAck {
    fn from(outcome: WebhookOutcome) -> Self {
        match outcome {
            WebhookOutcome::Processed { messages, statuses } => Self {
                status: "processed".into(),
                messages,
                statuses,
            },
            WebhookOutcome::Duplicate => Self {
                status: "duplicate".into(),
                messages: 0,
                statuses: 0,
            },
            WebhookOutcome::Undecodable => Self {
                status: "ignored".into(),
                messages: 0,
                statuses: 0,
            },
        }
    }
}

/// Query string of GET .../conversations.
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub status: Option<ConversationStatus>,
    pub search: Option<String>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl ListQuery {
    const MAX_LIMIT: u32 = 200;

    fn into_filter(self) -> ConversationFilter {
        let defaults = ConversationFilter::default();
        ConversationFilter {
            status: self.status,
            search: self.search.filter(|s| !s.trim().is_empty()),
            limit: self.limit.unwrap_or(defaults.limit).clamp(1, Self::MAX_LIMIT),
            offset: self.offset.unwrap_or(defaults.offset),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct SinceQuery {
    pub since: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ReasonQuery {
    pub reason: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct BlacklistResponse {
    pub address: String,
    pub blacklisted: bool,
}

/// GET /health
pub async fn get_health(State(state): State<GatewayState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.health.start_time.elapsed().as_secs(),
    })
}

/// POST /webhooks/{provider}/{tenant_id}/{token}
///
/// 200 for every authenticated delivery, whatever happened to its content.
pub async fn post_webhook(
    State(state): State<GatewayState>,
    Path((provider, tenant_id, token)): Path<(String, i64, String)>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookAck>, ApiError> {
    let outcome = state
        .engine
        .webhooks()
        .ingest(tenant_id, &provider, &token, &headers, &body)
        .await?;
    Ok(Json(outcome.into()))
}

/// POST /v1/tenants/{tenant_id}/messages
pub async fn post_message(
    State(state): State<GatewayState>,
    Path(tenant_id): Path<i64>,
    Json(request): Json<SendRequest>,
) -> Result<Response, ApiError> {
    let message = state.engine.outbound().send(tenant_id, &request).await?;
    Ok((StatusCode::CREATED, Json(message)).into_response())
}

/// GET /v1/tenants/{tenant_id}/conversations
pub async fn list_conversations(
    State(state): State<GatewayState>,
    Path(tenant_id): Path<i64>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Vec<Conversation>> {
    let filter = query.into_filter();
    Ok(Json(
        state
            .engine
            .inbox()
            .list_conversations(tenant_id, &filter)
            .await?,
    ))
}

/// GET /v1/tenants/{tenant_id}/conversations/{id}/messages
pub async fn list_messages(
    State(state): State<GatewayState>,
    Path((tenant_id, conversation_id)): Path<(i64, String)>,
) -> ApiResult<Vec<Message>> {
    Ok(Json(
        state
            .engine
            .inbox()
            .message_history(tenant_id, &conversation_id)
            .await?,
    ))
}

/// POST /v1/tenants/{tenant_id}/conversations/{id}/read
pub async fn mark_read(
    State(state): State<GatewayState>,
    Path((tenant_id, conversation_id)): Path<(i64, String)>,
) -> ApiResult<Conversation> {
    Ok(Json(
        state
            .engine
            .inbox()
            .mark_read(tenant_id, &conversation_id)
            .await?,
    ))
}

/// PATCH /v1/tenants/{tenant_id}/conversations/{id}
pub async fn patch_conversation(
    State(state): State<GatewayState>,
    Path((tenant_id, conversation_id)): Path<(i64, String)>,
    Json(patch): Json<ConversationPatch>,
) -> ApiResult<Conversation> {
    Ok(Json(
        state
            .engine
            .inbox()
            .update_conversation(tenant_id, &conversation_id, &patch)
            .await?,
    ))
}

/// POST /v1/tenants/{tenant_id}/blacklist/{address}
pub async fn add_blacklist(
    State(state): State<GatewayState>,
    Path((tenant_id, address)): Path<(i64, String)>,
    Query(query): Query<ReasonQuery>,
) -> ApiResult<BlacklistResponse> {
    let address = state
        .engine
        .inbox()
        .blacklist_add(tenant_id, &address, query.reason.as_deref())
        .await?;
    Ok(Json(BlacklistResponse {
        address,
        blacklisted: true,
    }))
}

/// DELETE /v1/tenants/{tenant_id}/blacklist/{address}
pub async fn remove_blacklist(
    State(state): State<GatewayState>,
    Path((tenant_id, address)): Path<(i64, String)>,
) -> Result<StatusCode, ApiError> {
    let removed = state
        .engine
        .inbox()
        .blacklist_remove(tenant_id, &address)
        .await?;
    Ok(if removed {
        StatusCode::NO_CONTENT
    } else {
        StatusCode::NOT_FOUND
    })
}

/// GET /v1/tenants/{tenant_id}/provider/health
pub async fn provider_health(
    State(state): State<GatewayState>,
    Path(tenant_id): Path<i64>,
) -> ApiResult<HealthStatus> {
    Ok(Json(state.engine.inbox().provider_health(tenant_id).await?))
}

/// POST /widget/{tenant_id}/messages
pub async fn post_widget_message(
    State(state): State<GatewayState>,
    Path(tenant_id): Path<i64>,
    Json(post): Json<WidgetPost>,
) -> Result<Response, ApiError> {
    let outcome = state
        .engine
        .widget()
        .post_customer_message(tenant_id, &post)
        .await?;
    Ok(widget_response(outcome))
}

/// POST /widget/{tenant_id}/responses
pub async fn post_widget_response(
    State(state): State<GatewayState>,
    Path(tenant_id): Path<i64>,
    Json(reply): Json<WidgetReply>,
) -> Result<Response, ApiError> {
    let outcome = state
        .engine
        .widget()
        .post_business_response(tenant_id, &reply)
        .await?;
    Ok(widget_response(outcome))
}

/// GET /widget/{tenant_id}/sessions/{session_id}/messages
pub async fn poll_widget(
    State(state): State<GatewayState>,
    Path((tenant_id, session_id)): Path<(i64, String)>,
    Query(query): Query<SinceQuery>,
) -> ApiResult<Vec<Message>> {
    Ok(Json(
        state
            .engine
            .widget()
            .poll(tenant_id, &session_id, query.since.as_deref())
            .await?,
    ))
}

/// 201 for a new message, 200 when an earlier post was matched.
fn widget_response(outcome: WidgetOutcome) -> Response {
    let status = if outcome.duplicate {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };
    (status, Json(outcome)).into_response()
}
