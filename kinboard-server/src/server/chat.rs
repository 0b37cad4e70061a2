use axum::extract::State;
use axum::http::StatusCode;
use axum::{Extension, Json};
use kinboard_shared::api::{ChatMessageDto, SendMessageReq, ServerEvent};

use super::auth::{AuthCtx, user_dto};
use super::{AppError, AppState, rfc3339};
use crate::storage::codec;
use crate::storage::models::{ChatMessage, User};

pub async fn api_chat_history(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthCtx>,
) -> Result<Json<Vec<ChatMessageDto>>, AppError> {
    let rows = state
        .store
        .list_chat_messages(&auth.claims.family_id, state.config.chat_history_limit)
        .await
        .map_err(AppError::internal)?;
    Ok(Json(
        rows.into_iter()
            .map(|(msg, user)| message_dto(msg, Some(user)))
            .collect(),
    ))
}

/// Persists the message, then fans it out to every other connected session
/// of the same family.
pub async fn api_send_message(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthCtx>,
    Json(body): Json<SendMessageReq>,
) -> Result<(StatusCode, Json<ChatMessageDto>), AppError> {
    let content = body.content.unwrap_or_default();
    let attachments = body.attachments;
    let has_attachments = attachments.as_ref().is_some_and(|a| !a.is_empty());
    if content.trim().is_empty() && !has_attachments {
        return Err(AppError::bad_request("Message content required"));
    }

    let kind = body.kind.unwrap_or_default();
    let (message, author) = state
        .store
        .create_chat_message(
            &auth.claims.family_id,
            &auth.claims.sub,
            &content,
            kind.as_str(),
            attachments,
        )
        .await
        .map_err(AppError::internal)?
        .ok_or_else(|| AppError::not_found("User not found"))?;

    let dto = message_dto(message, Some(author));
    state
        .notifier()
        .publish(&auth.claims.family_id, ServerEvent::Message(dto.clone()))
        .await;
    Ok((StatusCode::CREATED, Json(dto)))
}

fn message_dto(message: ChatMessage, user: Option<User>) -> ChatMessageDto {
    ChatMessageDto {
        id: message.id,
        family_id: message.family_id,
        user_id: message.user_id,
        content: message.content,
        kind: message.kind,
        attachments: codec::value_or_raw(&message.attachments),
        created_at: rfc3339(message.created_at),
        user: user.map(user_dto),
    }
}
