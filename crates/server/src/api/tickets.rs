//! Ticket submission handler.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use ticketrelay_core::InboundRequest;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::metrics::TICKETS_SUBMITTED;
use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request body for submitting a ticket
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitTicketBody {
    /// Free-text complaint or question
    pub user_input: Option<String>,
    pub customer_name: Option<String>,
    pub customer_id: Option<String>,
    /// Caller-chosen id; generated when absent
    pub ticket_id: Option<String>,
}

/// Response for an accepted submission
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitTicketResponse {
    pub status: String,
    pub ticket_id: String,
    pub message: String,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct TicketErrorResponse {
    pub error: String,
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(TicketErrorResponse {
            error: message.into(),
        }),
    )
        .into_response()
}

// ============================================================================
// Handlers
// ============================================================================

/// Enqueue a support request for the worker.
pub async fn submit_ticket(
    State(state): State<Arc<AppState>>,
    body: Result<Json<SubmitTicketBody>, JsonRejection>,
) -> Response {
    let Json(body) = match body {
        Ok(body) => body,
        Err(rejection) => {
            TICKETS_SUBMITTED.with_label_values(&["invalid"]).inc();
            warn!(error = %rejection.body_text(), "Rejected ticket submission");
            return error_response(StatusCode::BAD_REQUEST, rejection.body_text());
        }
    };

    let Some(user_input) = body.user_input.filter(|s| !s.trim().is_empty()) else {
        TICKETS_SUBMITTED.with_label_values(&["invalid"]).inc();
        return error_response(StatusCode::BAD_REQUEST, "userInput is required");
    };

    let ticket_id = body
        .ticket_id
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let mut request = InboundRequest::new(user_input, ticket_id.clone());
    request.customer_name = body.customer_name;
    request.customer_id = body.customer_id;

    let payload = match request.to_bytes() {
        Ok(payload) => payload,
        Err(e) => {
            error!(ticket_id = %ticket_id, error = %e, "Failed to serialize ticket request");
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to encode request");
        }
    };

    if let Err(e) = state.sink().send(&payload).await {
        TICKETS_SUBMITTED.with_label_values(&["unavailable"]).inc();
        error!(ticket_id = %ticket_id, error = %e, "Failed to enqueue ticket request");
        return error_response(
            StatusCode::SERVICE_UNAVAILABLE,
            "Ticket queue is unavailable, try again later",
        );
    }

    TICKETS_SUBMITTED.with_label_values(&["accepted"]).inc();
    info!(ticket_id = %ticket_id, destination = %state.sink().destination(), "Ticket request enqueued");

    (
        StatusCode::ACCEPTED,
        Json(SubmitTicketResponse {
            status: "accepted".to_string(),
            ticket_id,
            message: "Ticket queued for processing".to_string(),
        }),
    )
        .into_response()
}
