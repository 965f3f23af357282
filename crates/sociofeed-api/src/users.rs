use axum::Json;
use axum::extract::{Multipart, Path, Query, State};
use tracing::info;
use uuid::Uuid;

use sociofeed_db::DbError;
use sociofeed_db::models::{ProfileUpdate, UserRow};
use sociofeed_types::api::{FollowToggleResponse, SearchQuery};
use sociofeed_types::models::{Account, Profile, UserSummary};

use crate::error::{ApiError, ApiResult};
use crate::media::{read_file_field, read_text_field, store};
use crate::middleware::{AuthUser, MaybeUser};
use crate::state::{AppState, AppStateInner, blocking};
use crate::validation::{Errors, check_username, present};
use crate::views;

const SEARCH_LIMIT: u32 = 10;

/// Assembles a profile page. Viewer-relative flags are only filled in when
/// `personalise` is set.
pub(crate) fn build_profile(
    s: &AppStateInner,
    user: UserRow,
    viewer: Option<Uuid>,
    personalise: bool,
) -> ApiResult<Profile> {
    let counts = s.db.profile_counts(user.id)?;
    let posts = s.db.list_user_posts(user.id, viewer, None, 0)?;

    let (is_following, is_own_profile) = match (personalise, viewer) {
        (true, Some(v)) if v == user.id => (Some(false), Some(true)),
        (true, Some(v)) => (Some(s.db.is_following(v, user.id)?), Some(false)),
        _ => (None, None),
    };

    Ok(Profile {
        id: user.id,
        username: user.username,
        bio: user.bio,
        avatar_url: user.avatar_url,
        followers_count: counts.followers,
        following_count: counts.following,
        posts_count: counts.posts,
        posts: views::posts(posts),
        is_following,
        is_own_profile,
        created_at: user.created_at,
    })
}

/// GET /api/user/profile/{username}
pub async fn profile_by_username(
    State(state): State<AppState>,
    MaybeUser(viewer): MaybeUser,
    Path(username): Path<String>,
) -> ApiResult<Json<Profile>> {
    public_profile(&state, viewer, username).await
}

/// GET /api/user/profile/edit, for the account literally named "edit".
pub async fn profile_named_edit(
    State(state): State<AppState>,
    MaybeUser(viewer): MaybeUser,
) -> ApiResult<Json<Profile>> {
    public_profile(&state, viewer, "edit".to_string()).await
}

async fn public_profile(
    state: &AppState,
    viewer: Option<Uuid>,
    username: String,
) -> ApiResult<Json<Profile>> {
    let profile = blocking(state, move |s| {
        let user = s
            .db
            .get_user_by_username(&username)?
            .ok_or_else(|| ApiError::not_found("User not found"))?;
        build_profile(s, user, viewer, false)
    })
    .await?;
    Ok(Json(profile))
}

/// GET /api/user/profilebyid/{id}
pub async fn profile_by_id(
    State(state): State<AppState>,
    AuthUser { id: viewer }: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Profile>> {
    let profile = blocking(&state, move |s| {
        let user = s
            .db
            .get_user_by_id(id)?
            .ok_or_else(|| ApiError::not_found("User not found"))?;
        build_profile(s, user, Some(viewer), true)
    })
    .await?;
    Ok(Json(profile))
}

/// POST /api/user/follow-toggle/{followedId}
pub async fn follow_toggle(
    State(state): State<AppState>,
    AuthUser { id }: AuthUser,
    Path(followed_id): Path<Uuid>,
) -> ApiResult<Json<FollowToggleResponse>> {
    if id == followed_id {
        return Err(ApiError::bad_request("Can't follow yourself"));
    }

    let is_following = blocking(&state, move |s| {
        if s.db.get_user_summary(followed_id)?.is_none() {
            return Err(ApiError::not_found("User not found"));
        }
        let now_following = s.db.toggle_follow(id, followed_id).map_err(|e| match e {
            DbError::MissingReference(_) => ApiError::not_found("User not found"),
            other => other.into(),
        })?;
        info!(
            "User {} {} {}",
            id,
            if now_following { "followed" } else { "unfollowed" },
            followed_id
        );
        Ok(now_following)
    })
    .await?;

    let message = if is_following {
        "Followed successfully"
    } else {
        "Unfollowed successfully"
    };
    Ok(Json(FollowToggleResponse {
        message: message.into(),
        is_following,
    }))
}

/// GET /api/user/search?query=
pub async fn search(
    State(state): State<AppState>,
    Query(params): Query<SearchQuery>,
) -> ApiResult<Json<Vec<UserSummary>>> {
    let Some(query) = present(params.query.as_deref()).map(str::to_string) else {
        return Ok(Json(Vec::new()));
    };
    let rows = blocking(&state, move |s| Ok(s.db.search_users(&query, SEARCH_LIMIT)?)).await?;
    Ok(Json(views::summaries(rows)))
}

/// GET /api/user/followers/{userId}
pub async fn followers(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> ApiResult<Json<Vec<UserSummary>>> {
    let rows = blocking(&state, move |s| {
        if s.db.get_user_summary(user_id)?.is_none() {
            return Err(ApiError::not_found("User not found"));
        }
        Ok(s.db.list_followers(user_id)?)
    })
    .await?;
    Ok(Json(views::summaries(rows)))
}

/// GET /api/user/following/{userId}
pub async fn following(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> ApiResult<Json<Vec<UserSummary>>> {
    let rows = blocking(&state, move |s| {
        if s.db.get_user_summary(user_id)?.is_none() {
            return Err(ApiError::not_found("User not found"));
        }
        Ok(s.db.list_following(user_id)?)
    })
    .await?;
    Ok(Json(views::summaries(rows)))
}

/// PUT /api/user/profile/edit (multipart: `username`, `bio`, `avatar`)
pub async fn edit_profile(
    State(state): State<AppState>,
    AuthUser { id }: AuthUser,
    mut multipart: Multipart,
) -> ApiResult<Json<Account>> {
    let mut username = None;
    let mut bio = None;
    let mut avatar = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("Invalid multipart body: {}", e.body_text())))?
    {
        match field.name() {
            Some("username") => username = Some(read_text_field(field).await?),
            Some("bio") => bio = Some(read_text_field(field).await?),
            Some("avatar") => avatar = Some(read_file_field(field, "avatars").await?),
            _ => {}
        }
    }

    let username = username.map(|u| u.trim().to_string()).filter(|u| !u.is_empty());
    if let Some(name) = &username {
        let mut errors = Errors::default();
        check_username(Some(name), &mut errors);
        errors.into_result()?;
    }

    // Checked before the avatar is stored so a rejected edit leaves no file.
    if let Some(name) = username.clone() {
        blocking(&state, move |s| ensure_username_free(s, &name, id)).await?;
    }

    let avatar_url = match avatar.filter(|a| !a.bytes.is_empty()) {
        Some(upload) => Some(store(&state, upload).await?.url),
        None => None,
    };

    let updated = blocking(&state, move |s| {
        if let Some(name) = &username {
            ensure_username_free(s, name, id)?;
        }

        let update = ProfileUpdate {
            username: username.as_deref(),
            bio: bio.as_deref(),
            avatar_url: avatar_url.as_deref(),
        };
        let updated = s.db.update_profile(id, &update).map_err(|e| match e {
            DbError::Conflict(_) => ApiError::conflict("Username already taken"),
            other => other.into(),
        })?;
        updated.ok_or_else(|| ApiError::not_found("User not found"))
    })
    .await?;

    info!("User {} updated their profile", id);
    Ok(Json(views::account(updated)))
}

fn ensure_username_free(s: &AppStateInner, name: &str, id: Uuid) -> ApiResult<()> {
    match s.db.get_user_by_username(name)? {
        Some(holder) if holder.id != id => Err(ApiError::conflict("Username already taken")),
        _ => Ok(()),
    }
}
