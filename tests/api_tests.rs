use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use inkwell_blog::{config::Config, routes, services::MemoryStore, state::AppState};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

fn test_app_with(config: Config) -> Router {
    let state = Arc::new(AppState::new(config, Arc::new(MemoryStore::new())));
    routes::app(state)
}

fn test_app() -> Router {
    test_app_with(Config {
        rate_limit_requests: 10_000,
        ..Default::default()
    })
}

fn token_for(user_id: &str, username: &str) -> String {
    let claims = json!({
        "sub": user_id,
        "username": username,
        "exp": chrono::Utc::now().timestamp() + 3600,
    });
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(b"development-secret"),
    )
    .unwrap()
}

async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {}", token));
    }
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = hyper::body::to_bytes(response.into_body()).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

async fn create_post(app: &Router, token: &str, title: &str, status: &str) -> Value {
    let (code, body) = send(
        app,
        "POST",
        "/api/posts",
        Some(token),
        Some(json!({
            "title": title,
            "body": "<p>Some words about Rust and ownership.</p>",
            "category": "Engineering",
            "tags": ["rust", "Axum"],
            "status": status,
        })),
    )
    .await;
    assert_eq!(code, StatusCode::CREATED, "unexpected body: {}", body);
    body["data"].clone()
}

#[tokio::test]
async fn test_health_reports_store_status() {
    let app = test_app();
    let (status, body) = send(&app, "GET", "/health", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_creating_a_post_requires_authentication() {
    let app = test_app();
    let (status, body) = send(
        &app,
        "POST",
        "/api/posts",
        None,
        Some(json!({ "title": "t", "body": "b", "category": "c" })),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "AUTHENTICATION_ERROR");
}

#[tokio::test]
async fn test_invalid_token_is_treated_as_anonymous() {
    let app = test_app();
    let (status, _) = send(&app, "GET", "/api/posts", Some("not-a-jwt"), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(
        &app,
        "POST",
        "/api/posts",
        Some("not-a-jwt"),
        Some(json!({ "title": "t", "body": "b", "category": "c" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_create_post_derives_slug_and_metadata() {
    let app = test_app();
    let token = token_for("author-1", "ada");

    let first = create_post(&app, &token, "Hello, World!", "published").await;
    let second = create_post(&app, &token, "Hello, World!", "published").await;

    assert_eq!(first["slug"], "hello-world");
    assert_eq!(second["slug"], "hello-world-1");
    assert_eq!(first["category"], "Engineering");
    assert_eq!(first["tags"], json!(["rust", "axum"]));
    assert_eq!(first["readingTime"]["minutes"], 1);
    assert!(first["publishedAt"].is_string());

    let (status, body) = send(&app, "GET", "/api/posts/hello-world", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["id"], first["id"]);
    assert_eq!(body["data"]["views"], 1);
}

#[tokio::test]
async fn test_drafts_are_hidden_from_other_users() {
    let app = test_app();
    let author = token_for("author-1", "ada");
    let reader = token_for("reader-1", "bob");

    let draft = create_post(&app, &author, "Work in progress", "draft").await;
    let uri = format!("/api/posts/{}", draft["id"].as_str().unwrap());

    let (status, _) = send(&app, "GET", &uri, Some(&reader), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, "GET", &uri, Some(&author), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&app, "GET", "/api/posts?status=draft", Some(&reader), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(
        &app,
        "GET",
        "/api/posts?status=draft&author=author-1",
        Some(&author),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["items"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_listing_second_page_of_twenty_five() {
    let app = test_app();
    let token = token_for("author-1", "ada");
    for i in 0..25 {
        create_post(&app, &token, &format!("Post number {}", i), "published").await;
    }

    let (status, body) = send(&app, "GET", "/api/posts?page=2&limit=10", None, None).await;

    assert_eq!(status, StatusCode::OK);
    let data = &body["data"];
    assert_eq!(data["items"].as_array().unwrap().len(), 10);
    assert_eq!(data["pagination"]["currentPage"], 2);
    assert_eq!(data["pagination"]["totalPages"], 3);
    assert_eq!(data["pagination"]["totalItems"], 25);
    assert_eq!(data["pagination"]["hasNext"], true);
    assert_eq!(data["pagination"]["hasPrev"], true);
}

#[tokio::test]
async fn test_listing_rejects_bad_parameters() {
    let app = test_app();

    let (status, body) = send(&app, "GET", "/api/posts?sort=loudest", None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

    let (status, _) = send(&app, "GET", "/api/posts?limit=500", None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, "GET", "/api/posts/trending?days=0", None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_malformed_query_parameters_use_error_body() {
    let app = test_app();

    let (status, body) = send(&app, "GET", "/api/posts?page=-1", None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

    let (status, body) = send(&app, "GET", "/api/comments/post/x?limit=abc", None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_posts_and_comments_include_author_profiles() {
    let app = test_app();
    let author = token_for("author-1", "ada");
    let reader = token_for("reader-1", "bob");

    let post = create_post(&app, &author, "Who wrote this", "published").await;
    assert_eq!(post["author"]["username"], "ada");
    let post_id = post["id"].as_str().unwrap();

    let (_, top) = send(
        &app,
        "POST",
        "/api/comments",
        Some(&author),
        Some(json!({ "postId": post_id, "body": "Author here" })),
    )
    .await;
    let top_id = top["data"]["id"].as_str().unwrap();
    let (status, reply) = send(
        &app,
        "POST",
        "/api/comments",
        Some(&reader),
        Some(json!({ "postId": post_id, "parentCommentId": top_id, "body": "Hi" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(reply["data"]["author"]["username"], "bob");

    let (_, body) = send(&app, "GET", "/api/posts", None, None).await;
    assert_eq!(body["data"]["items"][0]["author"]["username"], "ada");
    assert_eq!(body["data"]["items"][0]["author"]["id"], "author-1");

    let (_, body) = send(&app, "GET", &format!("/api/comments/post/{}", post_id), None, None).await;
    let thread = &body["data"]["items"][0];
    assert_eq!(thread["author"]["username"], "ada");
    assert_eq!(thread["replies"][0]["author"]["username"], "bob");
}

#[tokio::test]
async fn test_draft_engagement_is_hidden_from_other_users() {
    let app = test_app();
    let author = token_for("author-1", "ada");
    let reader = token_for("reader-1", "bob");

    let draft = create_post(&app, &author, "Unannounced launch", "draft").await;
    let draft_id = draft["id"].as_str().unwrap();
    let (_, note) = send(
        &app,
        "POST",
        "/api/comments",
        Some(&author),
        Some(json!({ "postId": draft_id, "body": "todo: polish" })),
    )
    .await;
    let note_id = note["data"]["id"].as_str().unwrap();

    let uri = format!("/api/posts/{}/like", draft_id);
    let (status, _) = send(&app, "POST", &uri, Some(&reader), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let uri = format!("/api/comments/{}/like", note_id);
    let (status, _) = send(&app, "POST", &uri, Some(&reader), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = send(&app, "POST", &uri, Some(&author), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&app, "GET", "/api/comments/user/author-1", Some(&reader), None).await;
    assert_eq!(status, StatusCode::OK);
    let item = &body["data"]["items"][0];
    assert_eq!(item["body"], "todo: polish");
    assert!(item.get("post").is_none());

    let (_, body) = send(&app, "GET", "/api/comments/user/author-1", Some(&author), None).await;
    assert_eq!(body["data"]["items"][0]["post"]["title"], "Unannounced launch");
}

#[tokio::test]
async fn test_like_toggle_flips_state() {
    let app = test_app();
    let author = token_for("author-1", "ada");
    let reader = token_for("reader-1", "bob");
    let post = create_post(&app, &author, "Likeable", "published").await;
    let uri = format!("/api/posts/{}/like", post["id"].as_str().unwrap());

    let (status, body) = send(&app, "POST", &uri, Some(&reader), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], json!({ "isLiked": true, "likeCount": 1 }));

    let (_, body) = send(&app, "POST", &uri, Some(&author), None).await;
    assert_eq!(body["data"], json!({ "isLiked": true, "likeCount": 2 }));

    let (_, body) = send(&app, "POST", &uri, Some(&reader), None).await;
    assert_eq!(body["data"], json!({ "isLiked": false, "likeCount": 1 }));

    let (status, _) = send(&app, "POST", "/api/posts/missing/like", Some(&reader), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_replies_cannot_be_nested_twice() {
    let app = test_app();
    let token = token_for("author-1", "ada");
    let post = create_post(&app, &token, "Discussion", "published").await;
    let post_id = post["id"].as_str().unwrap();

    let (status, top) = send(
        &app,
        "POST",
        "/api/comments",
        Some(&token),
        Some(json!({ "postId": post_id, "body": "First!" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let top_id = top["data"]["id"].as_str().unwrap().to_string();

    let (status, reply) = send(
        &app,
        "POST",
        "/api/comments",
        Some(&token),
        Some(json!({ "postId": post_id, "parentCommentId": top_id, "body": "A reply" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let reply_id = reply["data"]["id"].as_str().unwrap();

    let (status, body) = send(
        &app,
        "POST",
        "/api/comments",
        Some(&token),
        Some(json!({ "postId": post_id, "parentCommentId": reply_id, "body": "Too deep" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["code"], "INVALID_PARENT");

    let (status, body) = send(
        &app,
        "GET",
        &format!("/api/comments/post/{}", post_id),
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let items = body["data"]["items"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["replies"].as_array().unwrap().len(), 1);
    assert_eq!(body["data"]["pagination"]["totalItems"], 1);
}

#[tokio::test]
async fn test_deleting_a_post_removes_its_comments() {
    let app = test_app();
    let token = token_for("author-1", "ada");
    let post = create_post(&app, &token, "Short lived", "published").await;
    let post_id = post["id"].as_str().unwrap();

    let (_, comment) = send(
        &app,
        "POST",
        "/api/comments",
        Some(&token),
        Some(json!({ "postId": post_id, "body": "Soon gone" })),
    )
    .await;
    let comment_id = comment["data"]["id"].as_str().unwrap();

    let (status, _) = send(
        &app,
        "DELETE",
        &format!("/api/posts/{}", post_id),
        Some(&token_for("someone-else", "eve")),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(&app, "DELETE", &format!("/api/posts/{}", post_id), Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(
        &app,
        "POST",
        &format!("/api/comments/{}/like", comment_id),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, "GET", &format!("/api/posts/{}", post_id), None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_trending_endpoint_ranks_liked_posts_first() {
    let app = test_app();
    let author = token_for("author-1", "ada");
    let reader = token_for("reader-1", "bob");

    create_post(&app, &author, "Quiet post", "published").await;
    let popular = create_post(&app, &author, "Popular post", "published").await;
    send(
        &app,
        "POST",
        &format!("/api/posts/{}/like", popular["id"].as_str().unwrap()),
        Some(&reader),
        None,
    )
    .await;

    let (status, body) = send(&app, "GET", "/api/posts/trending?days=7&limit=5", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["period"], "7 days");
    let items = body["data"]["items"].as_array().unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0]["id"], popular["id"]);
    assert!(items[0]["trendingScore"].as_f64().unwrap() > items[1]["trendingScore"].as_f64().unwrap());
}

#[tokio::test]
async fn test_follow_toggle_updates_both_profiles() {
    let app = test_app();
    let alice = token_for("user-alice", "alice");
    let bob = token_for("user-bob", "bob");

    // 第一次认证请求会创建 profile
    send(&app, "GET", "/api/users/search?q=b", Some(&bob), None).await;

    let (status, body) = send(&app, "POST", "/api/users/user-bob/follow", Some(&alice), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["isFollowing"], true);
    assert_eq!(body["data"]["followerCount"], 1);

    let (_, profile) = send(&app, "GET", "/api/users/bob", Some(&alice), None).await;
    assert_eq!(profile["data"]["isFollowing"], true);
    assert_eq!(profile["data"]["followerCount"], 1);

    let (_, following) = send(&app, "GET", "/api/users/user-alice/following", None, None).await;
    assert_eq!(following["data"][0]["username"], "bob");

    let (_, body) = send(&app, "POST", "/api/users/user-bob/follow", Some(&alice), None).await;
    assert_eq!(body["data"]["isFollowing"], false);
    assert_eq!(body["data"]["followerCount"], 0);

    let (status, _) = send(&app, "POST", "/api/users/user-alice/follow", Some(&alice), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, "POST", "/api/users/nobody/follow", Some(&alice), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_user_search_requires_a_term() {
    let app = test_app();
    send(&app, "GET", "/api/posts", Some(&token_for("user-grace", "grace")), None).await;

    let (status, body) = send(&app, "GET", "/api/users/search", None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "BAD_REQUEST");

    let (status, body) = send(&app, "GET", "/api/users/search?q=GRA", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["items"][0]["username"], "grace");
    assert_eq!(body["data"]["pagination"]["totalItems"], 1);
}

#[tokio::test]
async fn test_liked_posts_are_private() {
    let app = test_app();
    let author = token_for("author-1", "ada");
    let reader = token_for("reader-1", "bob");
    let post = create_post(&app, &author, "Worth a like", "published").await;
    send(
        &app,
        "POST",
        &format!("/api/posts/{}/like", post["id"].as_str().unwrap()),
        Some(&reader),
        None,
    )
    .await;

    let (status, body) = send(&app, "GET", "/api/users/reader-1/liked-posts", Some(&reader), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["items"][0]["id"], post["id"]);

    let (status, _) = send(&app, "GET", "/api/users/reader-1/liked-posts", Some(&author), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_rate_limit_rejects_excess_requests() {
    let app = test_app_with(Config {
        rate_limit_requests: 2,
        ..Default::default()
    });

    for _ in 0..2 {
        let (status, _) = send(&app, "GET", "/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, body) = send(&app, "GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["error"]["code"], "RATE_LIMIT_EXCEEDED");
}
