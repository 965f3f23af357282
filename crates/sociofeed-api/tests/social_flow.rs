mod common;

use axum::http::StatusCode;
use serde_json::json;

use common::{empty_request, json_request, multipart_request, test_app};

const PNG: &[u8] = b"\x89PNG\r\n\x1a\nfake-image-bytes";

#[tokio::test]
async fn follow_toggle_flips_and_updates_counts() {
    let app = test_app();
    let alice = app.signed_in("alice").await;
    let bob = app.signed_in("bob").await;

    let uri = format!("/api/user/follow-toggle/{}", bob.id);
    let reply = app.send(empty_request("POST", &uri, Some(&alice.access_token))).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["isFollowing"], true);
    assert_eq!(reply.body["message"], "Followed successfully");

    let reply = app
        .send(empty_request(
            "GET",
            &format!("/api/user/profilebyid/{}", bob.id),
            Some(&alice.access_token),
        ))
        .await;
    assert_eq!(reply.body["followersCount"], 1);
    assert_eq!(reply.body["isFollowing"], true);
    assert_eq!(reply.body["isOwnProfile"], false);

    let reply = app
        .send(empty_request("GET", &format!("/api/user/followers/{}", bob.id), None))
        .await;
    assert_eq!(reply.body[0]["username"], "alice");

    let reply = app.send(empty_request("POST", &uri, Some(&alice.access_token))).await;
    assert_eq!(reply.body["isFollowing"], false);
    assert_eq!(reply.body["message"], "Unfollowed successfully");

    let own = format!("/api/user/follow-toggle/{}", alice.id);
    let reply = app.send(empty_request("POST", &own, Some(&alice.access_token))).await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.body["error"], "Can't follow yourself");
}

#[tokio::test]
async fn anonymous_profile_has_no_viewer_flags() {
    let app = test_app();
    app.signed_in("carol").await;

    let reply = app
        .send(empty_request("GET", "/api/user/profile/carol", None))
        .await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["postsCount"], 0);
    assert!(reply.body.get("isFollowing").is_none());

    let reply = app
        .send(empty_request("GET", "/api/user/profile/nobody", None))
        .await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn search_matches_usernames_and_ignores_blank_queries() {
    let app = test_app();
    app.signed_in("dana").await;
    app.signed_in("daniel").await;
    app.signed_in("eve").await;

    let reply = app
        .send(empty_request("GET", "/api/user/search?query=dan", None))
        .await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body.as_array().unwrap().len(), 2);

    let reply = app
        .send(empty_request("GET", "/api/user/search?query=%20", None))
        .await;
    assert_eq!(reply.status, StatusCode::OK);
    assert!(reply.body.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn posts_show_up_in_followers_feeds() {
    let app = test_app();
    let alice = app.signed_in("alice").await;
    let bob = app.signed_in("bob").await;

    let reply = app
        .send(multipart_request(
            "POST",
            "/api/post/posts",
            &[("content", "hello world")],
            &[("media", "pic.png", PNG)],
            &bob.access_token,
        ))
        .await;
    assert_eq!(reply.status, StatusCode::CREATED);
    let post = &reply.body["post"];
    assert_eq!(post["content"], "hello world");
    assert_eq!(post["media"][0]["type"], "image");
    assert!(post["media"][0]["url"].as_str().unwrap().starts_with("/uploads/posts/"));
    let post_id = post["id"].as_str().unwrap().to_string();

    let reply = app
        .send(empty_request("GET", "/api/post/feed", Some(&alice.access_token)))
        .await;
    assert!(reply.body.as_array().unwrap().is_empty());

    app.send(empty_request(
        "POST",
        &format!("/api/user/follow-toggle/{}", bob.id),
        Some(&alice.access_token),
    ))
    .await;

    let reply = app
        .send(empty_request("GET", "/api/post/feed", Some(&alice.access_token)))
        .await;
    assert_eq!(reply.body[0]["id"], post_id.as_str());

    let reply = app
        .send(empty_request("GET", &format!("/api/post/posts/{post_id}"), None))
        .await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["likedByCurrentUser"], false);
}

#[tokio::test]
async fn empty_posts_and_too_many_files_are_rejected() {
    let app = test_app();
    let alice = app.signed_in("alice").await;

    let reply = app
        .send(multipart_request(
            "POST",
            "/api/post/posts",
            &[("content", "   ")],
            &[],
            &alice.access_token,
        ))
        .await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.body["error"], "Post must have content or media.");

    let files = [("media", "a.png", PNG); 5];
    let reply = app
        .send(multipart_request(
            "POST",
            "/api/post/posts",
            &[],
            &files,
            &alice.access_token,
        ))
        .await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.body["error"], "You can upload a maximum of 4 images.");
}

#[tokio::test]
async fn like_unlike_and_save_round() {
    let app = test_app();
    let alice = app.signed_in("alice").await;
    let bob = app.signed_in("bob").await;

    let reply = app
        .send(multipart_request(
            "POST",
            "/api/post/posts",
            &[("content", "likeable")],
            &[],
            &alice.access_token,
        ))
        .await;
    let post_id = reply.body["post"]["id"].as_str().unwrap().to_string();

    let like = format!("/api/post/like/{post_id}");
    let reply = app.send(empty_request("POST", &like, Some(&bob.access_token))).await;
    assert_eq!(reply.status, StatusCode::CREATED);
    assert_eq!(reply.body["likesCount"], 1);
    assert_eq!(reply.body["likedUsers"][0]["username"], "bob");

    let reply = app.send(empty_request("POST", &like, Some(&bob.access_token))).await;
    assert_eq!(reply.status, StatusCode::CONFLICT);

    let reply = app
        .send(empty_request(
            "GET",
            &format!("/api/post/posts/{post_id}"),
            Some(&bob.access_token),
        ))
        .await;
    assert_eq!(reply.body["likedByCurrentUser"], true);

    let unlike = format!("/api/post/unlike/{post_id}");
    let reply = app.send(empty_request("DELETE", &unlike, Some(&bob.access_token))).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["likesCount"], 0);
    let reply = app.send(empty_request("DELETE", &unlike, Some(&bob.access_token))).await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);

    let save = format!("/api/post/save/{post_id}");
    let reply = app.send(empty_request("POST", &save, Some(&bob.access_token))).await;
    assert_eq!(reply.status, StatusCode::CREATED);
    assert_eq!(reply.body["save"]["postId"], post_id.as_str());

    let reply = app
        .send(empty_request("GET", "/api/post/saved", Some(&bob.access_token)))
        .await;
    assert_eq!(reply.body[0]["isSaved"], true);

    let unsave = format!("/api/post/unsave-post/{post_id}");
    assert_eq!(
        app.send(empty_request("DELETE", &unsave, Some(&bob.access_token)))
            .await
            .status,
        StatusCode::OK
    );
    let reply = app.send(empty_request("DELETE", &unsave, Some(&bob.access_token))).await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);
    assert_eq!(reply.body["error"], "Post was not saved by user");

    let missing = format!("/api/post/like/{}", uuid::Uuid::new_v4());
    let reply = app.send(empty_request("POST", &missing, Some(&bob.access_token))).await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn comment_permissions_follow_authorship() {
    let app = test_app();
    let author = app.signed_in("author").await;
    let commenter = app.signed_in("commenter").await;
    let stranger = app.signed_in("stranger").await;

    let reply = app
        .send(multipart_request(
            "POST",
            "/api/post/posts",
            &[("content", "discuss")],
            &[],
            &author.access_token,
        ))
        .await;
    let post_id = reply.body["post"]["id"].as_str().unwrap().to_string();

    let reply = app
        .send(json_request(
            "POST",
            &format!("/api/post/posts/comments/{post_id}"),
            json!({ "content": "first!" }),
            Some(&commenter.access_token),
        ))
        .await;
    assert_eq!(reply.status, StatusCode::CREATED);
    let comment_id = reply.body["comment"]["id"].as_str().unwrap().to_string();
    let comment_uri = format!("/api/post/comments/{comment_id}");

    let reply = app
        .send(json_request(
            "PUT",
            &comment_uri,
            json!({ "content": "hijacked" }),
            Some(&author.access_token),
        ))
        .await;
    assert_eq!(reply.status, StatusCode::FORBIDDEN);

    let reply = app
        .send(json_request(
            "PUT",
            &comment_uri,
            json!({ "content": "edited" }),
            Some(&commenter.access_token),
        ))
        .await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["content"], "edited");

    let reply = app
        .send(empty_request(
            "GET",
            &format!("/api/post/posts/getcomments/{post_id}"),
            None,
        ))
        .await;
    assert_eq!(reply.body.as_array().unwrap().len(), 1);

    let reply = app
        .send(empty_request("DELETE", &comment_uri, Some(&stranger.access_token)))
        .await;
    assert_eq!(reply.status, StatusCode::FORBIDDEN);

    // The post's author may remove comments left on it.
    let reply = app
        .send(empty_request("DELETE", &comment_uri, Some(&author.access_token)))
        .await;
    assert_eq!(reply.status, StatusCode::OK);

    let reply = app
        .send(empty_request("DELETE", &comment_uri, Some(&author.access_token)))
        .await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn profile_edit_updates_fields_and_guards_usernames() {
    let app = test_app();
    let alice = app.signed_in("alice").await;
    app.signed_in("bob").await;

    let reply = app
        .send(multipart_request(
            "PUT",
            "/api/user/profile/edit",
            &[("username", "alice2"), ("bio", "hi there")],
            &[("avatar", "me.png", PNG)],
            &alice.access_token,
        ))
        .await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["username"], "alice2");
    assert_eq!(reply.body["bio"], "hi there");
    assert!(reply.body["avatarUrl"].as_str().unwrap().starts_with("/uploads/avatars/"));

    let reply = app
        .send(multipart_request(
            "PUT",
            "/api/user/profile/edit",
            &[("username", "BOB")],
            &[],
            &alice.access_token,
        ))
        .await;
    assert_eq!(reply.status, StatusCode::CONFLICT);
    assert_eq!(reply.body["error"], "Username already taken");
}

#[tokio::test]
async fn rejected_rename_stores_no_avatar() {
    let app = test_app();
    let alice = app.signed_in("alice").await;
    app.signed_in("bob").await;

    let reply = app
        .send(multipart_request(
            "PUT",
            "/api/user/profile/edit",
            &[("username", "BOB")],
            &[("avatar", "me.png", PNG)],
            &alice.access_token,
        ))
        .await;
    assert_eq!(reply.status, StatusCode::CONFLICT);

    let avatars = app.media_root().join("avatars");
    let stored = std::fs::read_dir(&avatars).map(|d| d.count()).unwrap_or(0);
    assert_eq!(stored, 0);

    let reply = app.send(empty_request("GET", "/api/user/profile/alice", None)).await;
    assert!(reply.body["avatarUrl"].is_null());
}

#[tokio::test]
async fn profile_named_edit_is_publicly_reachable() {
    let app = test_app();
    let edit = app.signed_in("edit").await;

    let reply = app.send(empty_request("GET", "/api/user/profile/edit", None)).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["username"], "edit");
    assert_eq!(reply.body["id"], edit.id.as_str());

    let reply = app.send(empty_request("PUT", "/api/user/profile/edit", None)).await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn chat_between_two_users() {
    let app = test_app();
    let alice = app.signed_in("alice").await;
    let bob = app.signed_in("bob").await;
    let eve = app.signed_in("eve").await;

    let reply = app
        .send(json_request(
            "POST",
            "/api/chat/create",
            json!({ "participantId": bob.id }),
            Some(&alice.access_token),
        ))
        .await;
    assert_eq!(reply.status, StatusCode::CREATED);
    assert_eq!(reply.body["otherParticipant"]["username"], "bob");
    assert!(reply.body["latestMessage"].is_null());
    let chat_id = reply.body["id"].as_str().unwrap().to_string();

    // Opening the same pair again reuses the chat.
    let reply = app
        .send(json_request(
            "POST",
            "/api/chat/create",
            json!({ "participantId": alice.id }),
            Some(&bob.access_token),
        ))
        .await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["id"], chat_id.as_str());

    for text in ["hi bob", "are you there?"] {
        let reply = app
            .send(json_request(
                "POST",
                "/api/chat/send-message",
                json!({ "chatId": chat_id, "receiverId": bob.id, "content": text }),
                Some(&alice.access_token),
            ))
            .await;
        assert_eq!(reply.status, StatusCode::CREATED);
        assert_eq!(reply.body["sender"]["username"], "alice");
    }

    let reply = app
        .send(empty_request(
            "GET",
            &format!("/api/chat/{chat_id}/messages?page=1&limit=1"),
            Some(&bob.access_token),
        ))
        .await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["messages"][0]["content"], "are you there?");
    assert_eq!(reply.body["pagination"]["totalMessages"], 2);
    assert_eq!(reply.body["pagination"]["totalPages"], 2);
    assert_eq!(reply.body["pagination"]["hasMore"], true);

    let reply = app
        .send(empty_request("GET", "/api/chat", Some(&bob.access_token)))
        .await;
    assert_eq!(reply.body[0]["latestMessage"]["content"], "are you there?");

    let reply = app
        .send(empty_request("GET", "/api/chat/", Some(&bob.access_token)))
        .await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body[0]["latestMessage"]["content"], "are you there?");
    let reply = app.send(empty_request("GET", "/api/chat/", None)).await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);

    let reply = app
        .send(empty_request(
            "GET",
            &format!("/api/chat/{chat_id}"),
            Some(&eve.access_token),
        ))
        .await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);

    let reply = app
        .send(json_request(
            "POST",
            "/api/chat/send-message",
            json!({ "chatId": chat_id, "receiverId": alice.id, "content": "intruding" }),
            Some(&eve.access_token),
        ))
        .await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);

    let reply = app
        .send(json_request(
            "POST",
            "/api/chat/send-message",
            json!({ "chatId": chat_id, "receiverId": eve.id, "content": "wrong person" }),
            Some(&alice.access_token),
        ))
        .await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);

    let reply = app
        .send(json_request(
            "POST",
            "/api/chat/create",
            json!({ "participantId": alice.id }),
            Some(&alice.access_token),
        ))
        .await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.body["error"], "Cannot create chat with yourself");
}
