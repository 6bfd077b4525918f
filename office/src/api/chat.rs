//! Public chat relay:
//! - POST /api/chat (no authentication)

use crate::server::AppState;
use crate::services::chat::VenueMessage;
use axum::{Json, extract::State};
use backline_agent::ChatReply;
use backline_web::AppError;

/// Forward a venue's message to the booking agent.
///
/// Agent failures are answered with the fallback apology, never an error.
///
/// ```bash
/// curl -X POST http://localhost:8080/api/chat \
///   -H "Content-Type: application/json" \
///   -d '{"message": "Free on June 1?", "sender_name": "Sam", "sender_email": "sam@hall.org"}'
/// ```
///
/// # Errors
///
/// 422 for a blank message.
pub async fn relay(
    State(state): State<AppState>,
    Json(message): Json<VenueMessage>,
) -> Result<Json<ChatReply>, AppError> {
    if message.message.trim().is_empty() {
        return Err(AppError::validation("Message must not be empty"));
    }
    Ok(Json(state.chat.relay(message).await))
}
