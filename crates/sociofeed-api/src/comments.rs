use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use tracing::info;
use uuid::Uuid;

use sociofeed_db::DbError;
use sociofeed_types::api::{CommentRequest, CreateCommentResponse, MessageResponse};
use sociofeed_types::models::Comment;

use crate::error::{ApiError, ApiResult};
use crate::middleware::AuthUser;
use crate::posts::ensure_post;
use crate::state::{AppState, blocking};
use crate::validation::{JsonBody, present};
use crate::views;

/// GET /api/post/posts/getcomments/{postId}
pub async fn list(
    State(state): State<AppState>,
    Path(post_id): Path<Uuid>,
) -> ApiResult<Json<Vec<Comment>>> {
    let rows = blocking(&state, move |s| {
        ensure_post(s, post_id)?;
        Ok(s.db.list_comments(post_id)?)
    })
    .await?;
    Ok(Json(rows.into_iter().map(views::comment).collect()))
}

/// POST /api/post/posts/comments/{postId}
pub async fn create(
    State(state): State<AppState>,
    AuthUser { id }: AuthUser,
    Path(post_id): Path<Uuid>,
    JsonBody(req): JsonBody<CommentRequest>,
) -> ApiResult<impl IntoResponse> {
    let Some(content) = present(req.content.as_deref()).map(str::to_string) else {
        return Err(ApiError::bad_request("Comment content is required."));
    };

    let row = blocking(&state, move |s| {
        ensure_post(s, post_id)?;
        s.db
            .add_comment(Uuid::new_v4(), post_id, id, &content)
            .map_err(|e| match e {
                DbError::MissingReference(_) => ApiError::not_found("Post not found"),
                other => other.into(),
            })
    })
    .await?;

    info!("User {} commented on post {}", id, post_id);
    Ok((
        StatusCode::CREATED,
        Json(CreateCommentResponse {
            message: "Comment added successfully.".into(),
            comment: views::comment(row),
        }),
    ))
}

/// PUT /api/post/comments/{commentId}; comment author only.
pub async fn edit(
    State(state): State<AppState>,
    AuthUser { id }: AuthUser,
    Path(comment_id): Path<Uuid>,
    JsonBody(req): JsonBody<CommentRequest>,
) -> ApiResult<Json<Comment>> {
    let Some(content) = present(req.content.as_deref()).map(str::to_string) else {
        return Err(ApiError::bad_request("Content cannot be empty"));
    };

    let row = blocking(&state, move |s| {
        let owners = s
            .db
            .comment_ownership(comment_id)?
            .ok_or_else(|| ApiError::not_found("Comment not found"))?;
        if owners.comment_author != id {
            return Err(ApiError::forbidden("Not allowed to edit this comment"));
        }
        s.db
            .update_comment(comment_id, &content)?
            .ok_or_else(|| ApiError::not_found("Comment not found"))
    })
    .await?;

    Ok(Json(views::comment(row)))
}

/// DELETE /api/post/comments/{commentId}; comment author or post author.
pub async fn delete(
    State(state): State<AppState>,
    AuthUser { id }: AuthUser,
    Path(comment_id): Path<Uuid>,
) -> ApiResult<Json<MessageResponse>> {
    blocking(&state, move |s| {
        let owners = s
            .db
            .comment_ownership(comment_id)?
            .ok_or_else(|| ApiError::not_found("Comment not found"))?;
        if owners.comment_author != id && owners.post_author != id {
            return Err(ApiError::forbidden("Unauthorized to delete this comment"));
        }
        s.db.delete_comment(comment_id)?;
        info!("User {} deleted comment {}", id, comment_id);
        Ok(())
    })
    .await?;

    Ok(Json(MessageResponse::new("Comment deleted successfully")))
}
