use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Account, ChatMessage, Comment, Post, SavedPost, UserSummary};

// -- Auth --
//
// Request fields are optional so that missing fields surface as validation
// messages rather than body rejections.

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub confirm_password: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ActivateRequest {
    pub token: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ResetPasswordRequest {
    pub password: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub message: String,
    pub access_token: String,
    pub refresh_token: String,
    pub user: Account,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResponse {
    pub access_token: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

// -- Users --

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowToggleResponse {
    pub message: String,
    pub is_following: bool,
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub query: Option<String>,
}

// -- Posts --

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreatePostResponse {
    pub message: String,
    pub post: Post,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LikeResponse {
    pub message: String,
    pub likes_count: i64,
    pub liked_users: Vec<UserSummary>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnlikeResponse {
    pub message: String,
    pub likes_count: i64,
}

#[derive(Debug, Default, Deserialize)]
pub struct CommentRequest {
    pub content: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateCommentResponse {
    pub message: String,
    pub comment: Comment,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SavePostResponse {
    pub message: String,
    pub save: SavedPost,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub url: String,
    pub public_id: String,
    #[serde(rename = "type")]
    pub media_type: String,
}

// -- Chat --

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateChatRequest {
    pub participant_id: Option<Uuid>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    pub chat_id: Option<Uuid>,
    pub receiver_id: Option<Uuid>,
    pub content: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub current_page: u32,
    pub total_pages: u32,
    pub total_messages: i64,
    pub has_more: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessagePage {
    pub messages: Vec<ChatMessage>,
    pub pagination: Pagination,
}
