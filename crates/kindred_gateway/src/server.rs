//! The HTTP edge.
//!
//! Route contract:
//! - `POST /sms` — carrier webhook. Always answers 200 with a body-level
//!   `success` flag (except 429 on rate limiting) so the carrier never
//!   enters a redelivery loop. Delivery receipts and unknown/invalid
//!   senders are acked silently.
//! - `POST /message` — web/dashboard path with real status codes.
//! - `POST /settings/relationship` — relationship change + memory reset.
//! - `GET /health`.

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Form, Json, Router,
};
use kindred_core::EngineError;
use kindred_engine::{MessageEngine, ReplyChannel};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use crate::types::{RelationshipChange, SmsAck, SmsInbound, WebMessage, WebReply};

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<MessageEngine>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/sms", post(handle_sms))
        .route("/message", post(handle_web_message))
        .route("/settings/relationship", post(handle_relationship_change))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Bind and serve until the process exits.
pub async fn run(engine: Arc<MessageEngine>, host: &str, port: u16) -> anyhow::Result<()> {
    let app = router(AppState { engine });
    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Gateway listening on {}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}

async fn health() -> &'static str {
    "ok"
}

async fn handle_sms(
    State(state): State<AppState>,
    Form(inbound): Form<SmsInbound>,
) -> impl IntoResponse {
    if inbound.is_delivery_receipt() {
        tracing::debug!(from = %inbound.from, "Ignoring delivery receipt");
        return (StatusCode::OK, Json(SmsAck::silent()));
    }
    let body = inbound.body.as_deref().unwrap_or_default();

    match state
        .engine
        .handle_inbound(&inbound.from, body, ReplyChannel::Sms)
        .await
    {
        Ok(outcome) => (
            StatusCode::OK,
            Json(SmsAck {
                success: outcome.delivered,
                reply: Some(outcome.reply),
            }),
        ),
        Err(EngineError::RateLimited(identity)) => {
            tracing::warn!(%identity, "Rate limited inbound SMS");
            (StatusCode::TOO_MANY_REQUESTS, Json(SmsAck::silent()))
        }
        Err(e @ (EngineError::InvalidIdentity(_) | EngineError::UserNotFound(_))) => {
            // Silent ack: replying (or erroring) here would make the
            // carrier retry or the stray sender a conversation partner.
            tracing::debug!("Dropping inbound SMS: {}", e);
            (StatusCode::OK, Json(SmsAck::silent()))
        }
        Err(e) => {
            tracing::error!("SMS turn failed: {}", e);
            (
                StatusCode::OK,
                Json(SmsAck {
                    success: false,
                    reply: None,
                }),
            )
        }
    }
}

async fn handle_web_message(
    State(state): State<AppState>,
    Json(msg): Json<WebMessage>,
) -> Result<Json<WebReply>, StatusCode> {
    let outcome = state
        .engine
        .handle_inbound(&msg.identity, &msg.body, ReplyChannel::Web)
        .await
        .map_err(status_for)?;
    Ok(Json(WebReply {
        reply: outcome.reply,
    }))
}

async fn handle_relationship_change(
    State(state): State<AppState>,
    Json(change): Json<RelationshipChange>,
) -> Result<StatusCode, StatusCode> {
    state
        .engine
        .change_relationship(&change.identity, change.relationship)
        .await
        .map_err(status_for)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Status mapping for the retry-capable web caller.
fn status_for(err: EngineError) -> StatusCode {
    match err {
        EngineError::InvalidIdentity(_) => StatusCode::BAD_REQUEST,
        EngineError::UserNotFound(_) => StatusCode::NOT_FOUND,
        EngineError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
        EngineError::Llm(_) | EngineError::Transport(_) => StatusCode::BAD_GATEWAY,
        EngineError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}
