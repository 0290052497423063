//! Producer endpoints for user notifications and conversation activity.
//!
//! Handlers validate ids and hand off to [`NotificationService`], which fans
//! the payload out to SSE subscribers and the relay.
//!
//! [`NotificationService`]: crate::services::NotificationService

use axum::{
    Json, Router,
    extract::{Path, State, rejection::JsonRejection},
    routing::post,
};
use std::sync::Arc;

use super::validation::validate_identifier;
use super::{
    ApiError, ApiResponse, AppState, NotificationCountRequest, PresenceRequest, TypingRequest,
};
use crate::services::Notification;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/users/{user_id}/notifications", post(notify_user))
        .route(
            "/users/{user_id}/notifications/bulk",
            post(notify_user_bulk),
        )
        .route(
            "/users/{user_id}/notifications/count",
            post(notification_count),
        )
        .route(
            "/users/{user_id}/notifications/{notification_id}/read",
            post(notification_read),
        )
        .route("/conversations/{conversation_id}/typing", post(typing))
        .route("/conversations/{conversation_id}/presence", post(presence))
}

/// `POST /api/users/{user_id}/notifications`
pub async fn notify_user(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
    payload: Result<Json<Notification>, JsonRejection>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    let user_id = validate_identifier("User id", &user_id)?;
    let Json(notification) = payload?;
    validate_identifier("Notification id", &notification.id)?;

    state
        .notifications()
        .notify_user(user_id, &notification)
        .await;

    Ok(Json(ApiResponse::ok()))
}

/// `POST /api/users/{user_id}/notifications/bulk`
///
/// Body is a JSON array of notifications; an empty array is rejected.
pub async fn notify_user_bulk(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
    payload: Result<Json<Vec<Notification>>, JsonRejection>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    let user_id = validate_identifier("User id", &user_id)?;
    let Json(notifications) = payload?;
    if notifications.is_empty() {
        return Err(ApiError::validation("No notifications to deliver"));
    }
    for notification in &notifications {
        validate_identifier("Notification id", &notification.id)?;
    }

    state
        .notifications()
        .notify_user_bulk(user_id, &notifications)
        .await;

    Ok(Json(ApiResponse::ok()))
}

/// `POST /api/users/{user_id}/notifications/count`
pub async fn notification_count(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
    payload: Result<Json<NotificationCountRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    let user_id = validate_identifier("User id", &user_id)?;
    let Json(request) = payload?;

    state
        .notifications()
        .notification_count(user_id, request.unread_count)
        .await;

    Ok(Json(ApiResponse::ok()))
}

/// `POST /api/users/{user_id}/notifications/{notification_id}/read`
pub async fn notification_read(
    State(state): State<Arc<AppState>>,
    Path((user_id, notification_id)): Path<(String, String)>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    let user_id = validate_identifier("User id", &user_id)?;
    let notification_id = validate_identifier("Notification id", &notification_id)?;

    state
        .notifications()
        .notification_read(user_id, notification_id)
        .await;

    Ok(Json(ApiResponse::ok()))
}

/// `POST /api/conversations/{conversation_id}/typing`
pub async fn typing(
    State(state): State<Arc<AppState>>,
    Path(conversation_id): Path<String>,
    payload: Result<Json<TypingRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    let conversation_id = validate_identifier("Conversation id", &conversation_id)?;
    let Json(request) = payload?;
    let user_id = validate_identifier("User id", &request.user_id)?;

    state
        .notifications()
        .typing_indicator(
            conversation_id,
            user_id,
            &request.user_name,
            request.is_typing,
        )
        .await;

    Ok(Json(ApiResponse::ok()))
}

/// `POST /api/conversations/{conversation_id}/presence`
pub async fn presence(
    State(state): State<Arc<AppState>>,
    Path(conversation_id): Path<String>,
    payload: Result<Json<PresenceRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    let conversation_id = validate_identifier("Conversation id", &conversation_id)?;
    let Json(request) = payload?;
    let user_id = validate_identifier("User id", &request.user_id)?;

    state
        .notifications()
        .presence_update(
            conversation_id,
            user_id,
            &request.user_name,
            request.is_online,
        )
        .await;

    Ok(Json(ApiResponse::ok()))
}
