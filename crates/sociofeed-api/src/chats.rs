use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use tracing::{info, warn};
use uuid::Uuid;

use sociofeed_db::models::ChatRow;
use sociofeed_types::api::{CreateChatRequest, MessagePage, PageQuery, Pagination, SendMessageRequest};
use sociofeed_types::models::{Chat, ChatMessage};

use crate::error::{ApiError, ApiResult};
use crate::middleware::AuthUser;
use crate::state::{AppState, AppStateInner, blocking};
use crate::validation::{JsonBody, present};
use crate::views;

pub const DEFAULT_MESSAGE_LIMIT: u32 = 50;
pub const MAX_MESSAGE_LIMIT: u32 = 100;

const NO_ACCESS: &str = "Chat not found or access denied";

/// Resolves the other participant and latest message for `viewer`.
fn chat_view(s: &AppStateInner, chat: ChatRow, viewer: Uuid) -> ApiResult<Chat> {
    let other = s
        .db
        .other_participant(chat.id, viewer)?
        .ok_or_else(|| ApiError::not_found("No other participant found in chat"))?;
    let latest_message = s.db.list_messages(chat.id, 1, 0)?.pop().map(views::message);

    Ok(Chat {
        id: chat.id,
        other_participant: views::summary(other),
        latest_message,
        created_at: chat.created_at,
        updated_at: chat.updated_at,
    })
}

/// GET /api/chat
pub async fn list(
    State(state): State<AppState>,
    AuthUser { id }: AuthUser,
) -> ApiResult<Json<Vec<Chat>>> {
    let rows = blocking(&state, move |s| Ok(s.db.list_chats_for_user(id)?)).await?;

    let chats = rows
        .into_iter()
        .filter_map(|row| {
            let Some(other) = row.other else {
                warn!("Chat {} has no counterpart for user {}", row.chat.id, id);
                return None;
            };
            Some(Chat {
                id: row.chat.id,
                other_participant: views::summary(other),
                latest_message: row.latest_message.map(views::message),
                created_at: row.chat.created_at,
                updated_at: row.chat.updated_at,
            })
        })
        .collect();

    Ok(Json(chats))
}

/// POST /api/chat/create. Returns the existing chat for a pair instead of
/// opening a second one.
pub async fn create(
    State(state): State<AppState>,
    AuthUser { id }: AuthUser,
    JsonBody(req): JsonBody<CreateChatRequest>,
) -> ApiResult<impl IntoResponse> {
    let Some(participant) = req.participant_id else {
        return Err(ApiError::bad_request("Participant ID is required"));
    };
    if participant == id {
        return Err(ApiError::bad_request("Cannot create chat with yourself"));
    }

    let (status, chat) = blocking(&state, move |s| {
        if let Some(existing) = s.db.find_direct_chat(id, participant)? {
            return Ok((StatusCode::OK, chat_view(s, existing, id)?));
        }
        if s.db.get_user_summary(participant)?.is_none() {
            return Err(ApiError::not_found("User not found"));
        }

        let chat = s.db.create_chat(Uuid::new_v4(), id, participant)?;
        info!("Chat {} opened between {} and {}", chat.id, id, participant);
        Ok((StatusCode::CREATED, chat_view(s, chat, id)?))
    })
    .await?;

    Ok((status, Json(chat)))
}

/// GET /api/chat/{chatId}/messages?page=&limit=
pub async fn messages(
    State(state): State<AppState>,
    AuthUser { id }: AuthUser,
    Path(chat_id): Path<Uuid>,
    Query(query): Query<PageQuery>,
) -> ApiResult<Json<MessagePage>> {
    let page = query.page.unwrap_or(1).max(1);
    let limit = query
        .limit
        .unwrap_or(DEFAULT_MESSAGE_LIMIT)
        .clamp(1, MAX_MESSAGE_LIMIT);
    let offset = (page - 1).saturating_mul(limit);

    let (rows, total) = blocking(&state, move |s| {
        if s.db.get_chat_for_participant(chat_id, id)?.is_none() {
            return Err(ApiError::not_found(NO_ACCESS));
        }
        let rows = s.db.list_messages(chat_id, limit, offset)?;
        let total = s.db.count_messages(chat_id)?;
        Ok((rows, total))
    })
    .await?;

    let total_pages = (total as u64).div_ceil(limit as u64) as u32;
    let has_more = (offset as i64) + (rows.len() as i64) < total;

    Ok(Json(MessagePage {
        messages: rows.into_iter().map(views::message).collect(),
        pagination: Pagination {
            current_page: page,
            total_pages,
            total_messages: total,
            has_more,
        },
    }))
}

/// POST /api/chat/send-message
pub async fn send_message(
    State(state): State<AppState>,
    AuthUser { id }: AuthUser,
    JsonBody(req): JsonBody<SendMessageRequest>,
) -> ApiResult<impl IntoResponse> {
    let content = present(req.content.as_deref()).map(str::to_string);
    let (Some(chat_id), Some(receiver_id), Some(content)) = (req.chat_id, req.receiver_id, content)
    else {
        return Err(ApiError::bad_request(
            "Chat ID, content, and receiver ID are required",
        ));
    };

    let message: ChatMessage = blocking(&state, move |s| {
        if !s.db.is_participant(chat_id, id)? {
            return Err(ApiError::not_found(NO_ACCESS));
        }
        let other = s.db.other_participant(chat_id, id)?;
        if other.map(|o| o.id) != Some(receiver_id) {
            return Err(ApiError::bad_request(
                "Receiver is not a participant of this chat",
            ));
        }

        let row = s
            .db
            .insert_message(Uuid::new_v4(), chat_id, id, receiver_id, &content)?;
        Ok(views::message(row))
    })
    .await?;

    info!("Message {} sent in chat {}", message.id, message.chat_id);
    Ok((StatusCode::CREATED, Json(message)))
}

/// GET /api/chat/{chatId}
pub async fn details(
    State(state): State<AppState>,
    AuthUser { id }: AuthUser,
    Path(chat_id): Path<Uuid>,
) -> ApiResult<Json<Chat>> {
    let chat = blocking(&state, move |s| {
        let chat = s
            .db
            .get_chat_for_participant(chat_id, id)?
            .ok_or_else(|| ApiError::not_found(NO_ACCESS))?;
        chat_view(s, chat, id)
    })
    .await?;
    Ok(Json(chat))
}
