pub mod auth;
pub mod chats;
pub mod comments;
pub mod error;
pub mod mailer;
pub mod media;
pub mod middleware;
pub mod posts;
pub mod sessions;
pub mod state;
pub mod users;
pub mod validation;

mod views;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::middleware::from_fn_with_state;
use axum::routing::{delete, get, post, put};

pub use error::{ApiError, ApiResult, ErrorKind};
pub use state::{ApiSettings, AppState, AppStateInner};

use middleware::require_auth;

/// Room for four files at the per-file limit plus form overhead.
const MAX_BODY_BYTES: usize = (posts::MAX_POST_MEDIA + 1) * media::MAX_FILE_SIZE;
const AVATAR_BODY_BYTES: usize = media::MAX_FILE_SIZE + 64 * 1024;

/// All `/api` routes with their auth gates applied.
pub fn router(state: AppState) -> Router {
    let gate = from_fn_with_state(state.clone(), require_auth);

    let auth_routes = Router::new()
        .route("/me", get(auth::me))
        .route_layer(gate.clone())
        .route("/register", post(auth::register))
        .route("/activate", post(auth::activate))
        .route("/login", post(auth::login))
        .route("/logout", post(auth::logout))
        .route("/refresh-token", post(auth::refresh_token))
        .route("/forgot-password", post(auth::forgot_password))
        .route("/reset-password/{token}", post(auth::reset_password));

    let user_routes = Router::new()
        .route("/profilebyid/{id}", get(users::profile_by_id))
        .route("/follow-toggle/{followed_id}", post(users::follow_toggle))
        .route_layer(gate.clone())
        // The literal path shadows `/profile/{username}`, so a user named
        // "edit" is served here; only the PUT is gated.
        .route(
            "/profile/edit",
            put(users::edit_profile)
                .route_layer(gate.clone())
                .get(users::profile_named_edit),
        )
        .route("/profile/{username}", get(users::profile_by_username))
        .route("/search", get(users::search))
        .route("/followers/{user_id}", get(users::followers))
        .route("/following/{user_id}", get(users::following))
        .layer(DefaultBodyLimit::max(AVATAR_BODY_BYTES));

    let post_routes = Router::new()
        .route("/posts", post(posts::create_post))
        .route("/feed", get(posts::feed))
        .route("/my-posts", get(posts::my_posts))
        .route("/user/{user_id}", get(posts::user_posts))
        .route("/like/{post_id}", post(posts::like))
        .route("/unlike/{post_id}", delete(posts::unlike))
        .route("/media/upload", post(media::upload))
        .route("/posts/comments/{post_id}", post(comments::create))
        .route(
            "/comments/{comment_id}",
            put(comments::edit).delete(comments::delete),
        )
        .route("/save/{post_id}", post(posts::save))
        .route("/unsave-post/{post_id}", delete(posts::unsave))
        .route("/saved", get(posts::saved))
        .route_layer(gate.clone())
        .route("/posts/getcomments/{post_id}", get(comments::list))
        .route("/users/{username}", get(posts::user_profile))
        .route("/posts/{post_id}", get(posts::post_details))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES));

    let chat_routes = Router::new()
        .route("/", get(chats::list))
        .route("/create", post(chats::create))
        .route("/send-message", post(chats::send_message))
        .route("/{chat_id}/messages", get(chats::messages))
        .route("/{chat_id}", get(chats::details))
        .route_layer(gate.clone());

    Router::new()
        .nest("/api/auth", auth_routes)
        .nest("/api/user", user_routes)
        .nest("/api/post", post_routes)
        .nest("/api/chat", chat_routes)
        .route("/api/chat/", get(chats::list).route_layer(gate))
        .with_state(state)
}
