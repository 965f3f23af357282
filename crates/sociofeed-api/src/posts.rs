use axum::Json;
use axum::extract::{Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use tracing::info;
use uuid::Uuid;

use sociofeed_db::DbError;
use sociofeed_db::models::NewMedia;
use sociofeed_types::api::{
    CreatePostResponse, LikeResponse, MessageResponse, PageQuery, SavePostResponse,
    UnlikeResponse,
};
use sociofeed_types::models::{Post, Profile};

use crate::error::{ApiError, ApiResult};
use crate::media::{MediaUpload, read_file_field, read_text_field, store};
use crate::middleware::{AuthUser, MaybeUser};
use crate::state::{AppState, AppStateInner, blocking};
use crate::users::build_profile;
use crate::views;

pub const FEED_PAGE_SIZE: u32 = 10;
pub const MAX_POST_MEDIA: usize = 4;

fn page_offset(query: &PageQuery) -> u32 {
    let page = query.page.unwrap_or(1).max(1);
    (page - 1).saturating_mul(FEED_PAGE_SIZE)
}

pub(crate) fn ensure_post(s: &AppStateInner, post_id: Uuid) -> ApiResult<Uuid> {
    s.db
        .get_post_author(post_id)?
        .ok_or_else(|| ApiError::not_found("Post not found"))
}

/// POST /api/post/posts (multipart: `content`, up to four `media` files)
pub async fn create_post(
    State(state): State<AppState>,
    AuthUser { id }: AuthUser,
    mut multipart: Multipart,
) -> ApiResult<impl IntoResponse> {
    let mut content = None;
    let mut uploads: Vec<MediaUpload> = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("Invalid multipart body: {}", e.body_text())))?
    {
        match field.name() {
            Some("content") => content = Some(read_text_field(field).await?),
            Some("media") => {
                if uploads.len() == MAX_POST_MEDIA {
                    return Err(ApiError::bad_request(
                        "You can upload a maximum of 4 images.",
                    ));
                }
                let upload = read_file_field(field, "posts").await?;
                if !upload.bytes.is_empty() {
                    uploads.push(upload);
                }
            }
            _ => {}
        }
    }

    let content = content.map(|c| c.trim().to_string()).filter(|c| !c.is_empty());
    if content.is_none() && uploads.is_empty() {
        return Err(ApiError::bad_request("Post must have content or media."));
    }

    let mut media = Vec::with_capacity(uploads.len());
    for upload in uploads {
        let stored = store(&state, upload).await?;
        media.push(NewMedia {
            url: stored.url,
            media_type: stored.media_type,
        });
    }

    let post_id = Uuid::new_v4();
    let post = blocking(&state, move |s| {
        s.db.create_post(post_id, id, content.as_deref(), &media)?;
        s.db
            .get_post(post_id, Some(id))?
            .ok_or_else(|| ApiError::Internal(anyhow::anyhow!("post {post_id} vanished after insert")))
    })
    .await?;

    info!("User {} created post {}", id, post_id);
    Ok((
        StatusCode::CREATED,
        Json(CreatePostResponse {
            message: "Post created successfully.".into(),
            post: views::post(post),
        }),
    ))
}

/// GET /api/post/feed?page=
pub async fn feed(
    State(state): State<AppState>,
    AuthUser { id }: AuthUser,
    Query(query): Query<PageQuery>,
) -> ApiResult<Json<Vec<Post>>> {
    let offset = page_offset(&query);
    let rows = blocking(&state, move |s| Ok(s.db.list_feed(id, FEED_PAGE_SIZE, offset)?)).await?;
    Ok(Json(views::posts(rows)))
}

/// GET /api/post/my-posts?page=
pub async fn my_posts(
    State(state): State<AppState>,
    AuthUser { id }: AuthUser,
    Query(query): Query<PageQuery>,
) -> ApiResult<Json<Vec<Post>>> {
    let offset = page_offset(&query);
    let rows = blocking(&state, move |s| {
        Ok(s.db.list_user_posts(id, Some(id), Some(FEED_PAGE_SIZE), offset)?)
    })
    .await?;
    Ok(Json(views::posts(rows)))
}

/// GET /api/post/user/{userId}
pub async fn user_posts(
    State(state): State<AppState>,
    AuthUser { id: viewer }: AuthUser,
    Path(user_id): Path<Uuid>,
) -> ApiResult<Json<Vec<Post>>> {
    let rows = blocking(&state, move |s| {
        Ok(s.db.list_user_posts(user_id, Some(viewer), None, 0)?)
    })
    .await?;
    Ok(Json(views::posts(rows)))
}

/// GET /api/post/posts/{postId}
pub async fn post_details(
    State(state): State<AppState>,
    MaybeUser(viewer): MaybeUser,
    Path(post_id): Path<Uuid>,
) -> ApiResult<Json<Post>> {
    let row = blocking(&state, move |s| Ok(s.db.get_post(post_id, viewer)?)).await?;
    let row = row.ok_or_else(|| ApiError::not_found("Post not found"))?;
    Ok(Json(views::post(row)))
}

/// GET /api/post/users/{username}
pub async fn user_profile(
    State(state): State<AppState>,
    MaybeUser(viewer): MaybeUser,
    Path(username): Path<String>,
) -> ApiResult<Json<Profile>> {
    let profile = blocking(&state, move |s| {
        let user = s
            .db
            .get_user_by_username(&username)?
            .ok_or_else(|| ApiError::not_found("User not found"))?;
        build_profile(s, user, viewer, false)
    })
    .await?;
    Ok(Json(profile))
}

/// POST /api/post/like/{postId}
pub async fn like(
    State(state): State<AppState>,
    AuthUser { id }: AuthUser,
    Path(post_id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let (likes_count, likers) = blocking(&state, move |s| {
        ensure_post(s, post_id)?;
        s.db.add_like(id, post_id).map_err(|e| match e {
            DbError::Conflict(_) => ApiError::conflict("Post already liked"),
            DbError::MissingReference(_) => ApiError::not_found("Post not found"),
            other => other.into(),
        })?;
        let likers = s.db.list_likers(post_id)?;
        Ok((likers.len() as i64, likers))
    })
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(LikeResponse {
            message: "Post liked".into(),
            likes_count,
            liked_users: views::summaries(likers),
        }),
    ))
}

/// DELETE /api/post/unlike/{postId}
pub async fn unlike(
    State(state): State<AppState>,
    AuthUser { id }: AuthUser,
    Path(post_id): Path<Uuid>,
) -> ApiResult<Json<UnlikeResponse>> {
    let likes_count = blocking(&state, move |s| {
        if !s.db.remove_like(id, post_id)? {
            return Err(ApiError::not_found("Like not found"));
        }
        Ok(s.db.count_likes(post_id)?)
    })
    .await?;

    Ok(Json(UnlikeResponse {
        message: "Post unliked".into(),
        likes_count,
    }))
}

/// POST /api/post/save/{postId}
pub async fn save(
    State(state): State<AppState>,
    AuthUser { id }: AuthUser,
    Path(post_id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let row = blocking(&state, move |s| {
        ensure_post(s, post_id)?;
        s.db.save_post(id, post_id).map_err(|e| match e {
            DbError::Conflict(_) => ApiError::conflict("Post already saved"),
            DbError::MissingReference(_) => ApiError::not_found("Post not found"),
            other => other.into(),
        })
    })
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(SavePostResponse {
            message: "Post saved".into(),
            save: views::saved(row),
        }),
    ))
}

/// DELETE /api/post/unsave-post/{postId}
pub async fn unsave(
    State(state): State<AppState>,
    AuthUser { id }: AuthUser,
    Path(post_id): Path<Uuid>,
) -> ApiResult<Json<MessageResponse>> {
    blocking(&state, move |s| {
        if !s.db.unsave_post(id, post_id)? {
            return Err(ApiError::not_found("Post was not saved by user"));
        }
        Ok(())
    })
    .await?;
    Ok(Json(MessageResponse::new("Post unsaved")))
}

/// GET /api/post/saved
pub async fn saved(
    State(state): State<AppState>,
    AuthUser { id }: AuthUser,
) -> ApiResult<Json<Vec<Post>>> {
    let rows = blocking(&state, move |s| Ok(s.db.list_saved_posts(id)?)).await?;
    Ok(Json(views::posts(rows)))
}
