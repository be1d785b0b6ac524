//! Router tests against an in-process mock of the X and GitHub APIs.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, Request, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

use crate::clock::{Clock, ManualClock};
use crate::config::Config;
use crate::error::retry_after_secs;
use crate::state::AppState;
use crate::store::{MemoryStore, ProfileStore, RateLimitStore};

const TOKEN: &str = "test-token";

/// Call counters for the mock upstream.
#[derive(Default)]
struct Upstream {
    user_lookups: AtomicUsize,
    trend_lookups: AtomicUsize,
}

impl Upstream {
    fn users(&self) -> usize {
        self.user_lookups.load(Ordering::SeqCst)
    }
}

fn x_user_json(username: &str, pinned_tweet_id: Option<&str>) -> Value {
    let mut data = json!({
        "id": "42",
        "name": "Test User",
        "username": username,
        "created_at": "2015-03-01T12:00:00.000Z",
        "description": "hello from the mock",
        "profile_image_url": "https://pbs.twimg.com/profile_images/1/abc_normal.jpg",
        "public_metrics": {
            "followers_count": 1234,
            "following_count": 56,
            "tweet_count": 7890,
            "listed_count": 3,
            "like_count": 42
        },
        "verified_type": "blue"
    });
    if let Some(id) = pinned_tweet_id {
        data["pinned_tweet_id"] = json!(id);
    }
    json!({ "data": data })
}

async fn x_user(
    State(upstream): State<Arc<Upstream>>,
    Path(username): Path<String>,
    headers: HeaderMap,
) -> Response {
    upstream.user_lookups.fetch_add(1, Ordering::SeqCst);

    let expected = format!("Bearer {TOKEN}");
    let authorized = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        == Some(expected.as_str());
    if !authorized {
        return (StatusCode::UNAUTHORIZED, Json(json!({ "title": "Unauthorized" })))
            .into_response();
    }

    match username.as_str() {
        "ghost" => Json(json!({
            "errors": [{
                "title": "Not Found Error",
                "detail": "Could not find user with username: [ghost].",
                "type": "https://api.twitter.com/2/problems/resource-not-found"
            }]
        }))
        .into_response(),
        "missing" => StatusCode::NOT_FOUND.into_response(),
        "throttled" => (
            StatusCode::TOO_MANY_REQUESTS,
            [("x-rate-limit-reset", "4102444800")],
        )
            .into_response(),
        "denied" => StatusCode::FORBIDDEN.into_response(),
        "broken" => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
        "garbled" => "not json".into_response(),
        "slow" => {
            tokio::time::sleep(Duration::from_millis(100)).await;
            Json(x_user_json("slow", None)).into_response()
        }
        "alice" => Json(x_user_json("alice", Some("100"))).into_response(),
        "pinfail" => Json(x_user_json("pinfail", Some("999"))).into_response(),
        other => Json(x_user_json(other, None)).into_response(),
    }
}

async fn x_tweet(Path(id): Path<String>) -> Response {
    if id != "100" {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }
    Json(json!({
        "data": {
            "id": "100",
            "text": "gm",
            "created_at": "2024-01-02T03:04:05.000Z",
            "public_metrics": { "retweet_count": 5, "reply_count": 6, "like_count": 7 },
            "attachments": { "media_keys": ["3_1"] }
        }
    }))
    .into_response()
}

async fn x_trends(State(upstream): State<Arc<Upstream>>) -> Json<Value> {
    upstream.trend_lookups.fetch_add(1, Ordering::SeqCst);
    Json(json!({
        "data": [
            { "trend_name": "Rust", "post_count": 1200, "category": "Technology" },
            { "trend_name": "Receipts", "post_count": "5K posts" }
        ]
    }))
}

async fn github_user(
    State(upstream): State<Arc<Upstream>>,
    Path(username): Path<String>,
) -> Response {
    upstream.user_lookups.fetch_add(1, Ordering::SeqCst);

    match username.to_ascii_lowercase().as_str() {
        "octocat" => Json(json!({
            "login": "octocat",
            "name": "The Octocat",
            "blog": "",
            "html_url": "https://github.com/octocat",
            "public_repos": 8,
            "followers": 12345,
            "following": 9,
            "created_at": "2011-01-25T18:44:36Z",
            "updated_at": "2024-01-01T00:00:00Z"
        }))
        .into_response(),
        "limited" => (
            StatusCode::FORBIDDEN,
            [
                ("x-ratelimit-remaining", "0"),
                ("x-ratelimit-reset", "4102444800"),
            ],
        )
            .into_response(),
        _ => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn spawn_upstream() -> (String, Arc<Upstream>) {
    let upstream = Arc::new(Upstream::default());
    let app = Router::new()
        .route("/2/users/by/username/{username}", get(x_user))
        .route("/2/users/personalized_trends", get(x_trends))
        .route("/2/tweets/{id}", get(x_tweet))
        .route("/users/{username}", get(github_user))
        .with_state(upstream.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{addr}"), upstream)
}

struct Harness {
    app: Router,
    clock: Arc<ManualClock>,
    upstream: Arc<Upstream>,
}

async fn harness_with(configure: impl FnOnce(&mut Config)) -> Harness {
    let (base_url, upstream) = spawn_upstream().await;

    let mut config = Config {
        x_bearer_token: Some(TOKEN.to_string()),
        x_api_base_url: base_url.clone(),
        github_api_base_url: base_url,
        ..Config::default()
    };
    configure(&mut config);

    let clock = Arc::new(ManualClock::new(Utc::now()));
    let store = Arc::new(MemoryStore::new(
        config.profile_ttl,
        config.rate_limit_window,
    ));
    let profiles: Arc<dyn ProfileStore> = store.clone();
    let windows: Arc<dyn RateLimitStore> = store;
    let dyn_clock: Arc<dyn Clock> = clock.clone();

    let state = AppState::from_parts(config, profiles, windows, dyn_clock).unwrap();

    Harness {
        app: super::router(state),
        clock,
        upstream,
    }
}

async fn harness() -> Harness {
    harness_with(|_| {}).await
}

struct TestResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Vec<u8>,
}

impl TestResponse {
    fn json(&self) -> Value {
        serde_json::from_slice(&self.body).unwrap()
    }

    fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

fn reset_time_of(res: &TestResponse) -> DateTime<Utc> {
    let raw = res.json()["resetTime"].as_str().unwrap().to_string();
    DateTime::parse_from_rfc3339(&raw).unwrap().with_timezone(&Utc)
}

async fn send(app: &Router, uri: &str, client: &str) -> TestResponse {
    let request = Request::builder()
        .uri(uri)
        .header("x-forwarded-for", client)
        .body(Body::empty())
        .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = response.into_body().collect().await.unwrap().to_bytes().to_vec();

    TestResponse {
        status,
        headers,
        body,
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Health and quota
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn health_reports_service() {
    let h = harness().await;
    let res = send(&h.app, "/health", "1.1.1.1").await;

    assert_eq!(res.status, StatusCode::OK);
    let body = res.json();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "receipt-serve");
    assert_eq!(h.upstream.users(), 0);
}

#[tokio::test]
async fn rate_limit_status_without_window() {
    let h = harness().await;
    let res = send(&h.app, "/api/rate-limit", "1.1.1.1").await;

    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.header("cache-control"), Some("no-store"));
    assert_eq!(
        res.json(),
        json!({ "remaining": 3, "limit": 3, "resetTime": null })
    );
}

// ═══════════════════════════════════════════════════════════════════════════
// Profile lookups
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn x_profile_is_normalized() {
    let h = harness().await;
    let res = send(&h.app, "/api/x/users/alice", "1.1.1.1").await;

    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.header("x-cache-hit"), Some("false"));
    assert_eq!(res.header("x-ratelimit-limit"), Some("3"));
    assert_eq!(res.header("x-ratelimit-remaining"), Some("2"));
    assert!(res.header("x-ratelimit-reset").is_some());
    assert!(res.header("cache-control").is_some());

    let body = res.json();
    assert_eq!(body["username"], "alice");
    assert_eq!(body["verified_type"], "blue");
    assert_eq!(body["public_metrics"]["followers_count"], 1234);
    assert_eq!(
        body["profile_image_url"],
        "https://pbs.twimg.com/profile_images/1/abc.jpg"
    );
    assert_eq!(body["pinned_tweet"]["text"], "gm");
    assert_eq!(body["pinned_tweet"]["like_count"], 7);
    assert_eq!(h.upstream.users(), 1);
}

#[tokio::test]
async fn cache_hits_are_shared_and_not_counted() {
    let h = harness().await;

    let first = send(&h.app, "/api/x/users/alice", "1.1.1.1").await;
    assert_eq!(first.status, StatusCode::OK);

    for uri in ["/api/x/users/alice", "/api/twitter/users/ALICE", "/api/x/users/@Alice"] {
        let res = send(&h.app, uri, "1.1.1.1").await;
        assert_eq!(res.status, StatusCode::OK, "{uri}");
        assert_eq!(res.header("x-cache-hit"), Some("true"), "{uri}");
        assert!(res.header("x-ratelimit-remaining").is_none(), "{uri}");
        assert_eq!(res.json(), first.json());
    }

    assert_eq!(h.upstream.users(), 1);
    let quota = send(&h.app, "/api/rate-limit", "1.1.1.1").await.json();
    assert_eq!(quota["remaining"], 2);
    assert!(quota["resetTime"].is_string());
}

#[tokio::test]
async fn stale_entries_are_refetched() {
    let h = harness().await;

    send(&h.app, "/api/x/users/alice", "1.1.1.1").await;
    h.clock.advance(Duration::from_secs(24 * 60 * 60));

    let res = send(&h.app, "/api/x/users/alice", "1.1.1.1").await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.header("x-cache-hit"), Some("false"));
    assert_eq!(h.upstream.users(), 2);
}

#[tokio::test]
async fn nocache_skips_read_but_counts() {
    let h = harness().await;

    send(&h.app, "/api/x/users/alice", "1.1.1.1").await;
    let res = send(&h.app, "/api/x/users/alice?nocache=1", "1.1.1.1").await;

    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.header("x-cache-hit"), Some("false"));
    assert_eq!(res.header("x-ratelimit-remaining"), Some("1"));
    assert_eq!(h.upstream.users(), 2);
}

#[tokio::test]
async fn quota_exhaustion_rejects_with_reset_time() {
    let h = harness().await;

    for (i, name) in ["a1", "a2", "a3"].iter().enumerate() {
        let res = send(&h.app, &format!("/api/x/users/{name}"), "2.2.2.2").await;
        assert_eq!(res.status, StatusCode::OK);
        assert_eq!(
            res.header("x-ratelimit-remaining"),
            Some((2 - i).to_string().as_str())
        );
    }

    let res = send(&h.app, "/api/x/users/a4", "2.2.2.2").await;
    assert_eq!(res.status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(res.header("x-ratelimit-remaining"), Some("0"));
    assert_eq!(res.header("retry-after"), Some("86400"));

    let body = res.json();
    assert_eq!(body["error"], "Rate limit exceeded");
    assert!(body["resetTime"].is_string());

    // The rejection never reached upstream.
    assert_eq!(h.upstream.users(), 3);

    // Cached usernames are still served.
    let cached = send(&h.app, "/api/x/users/a1", "2.2.2.2").await;
    assert_eq!(cached.status, StatusCode::OK);
    assert_eq!(cached.header("x-cache-hit"), Some("true"));

    // Other clients have their own window.
    let other = send(&h.app, "/api/x/users/a4", "3.3.3.3").await;
    assert_eq!(other.status, StatusCode::OK);
}

#[tokio::test]
async fn window_resets_after_expiry() {
    let h = harness_with(|c| c.rate_limit_max = 1).await;

    assert_eq!(send(&h.app, "/api/x/users/b1", "4.4.4.4").await.status, StatusCode::OK);
    assert_eq!(
        send(&h.app, "/api/x/users/b2", "4.4.4.4").await.status,
        StatusCode::TOO_MANY_REQUESTS
    );

    h.clock.advance(Duration::from_secs(24 * 60 * 60 + 1));

    let res = send(&h.app, "/api/x/users/b2", "4.4.4.4").await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.header("x-ratelimit-remaining"), Some("0"));
}

#[tokio::test]
async fn retry_after_tracks_injected_clock() {
    let h = harness_with(|c| c.rate_limit_max = 1).await;

    assert_eq!(send(&h.app, "/api/x/users/c1", "4.4.4.5").await.status, StatusCode::OK);
    h.clock.advance(Duration::from_secs(12 * 60 * 60));

    let res = send(&h.app, "/api/x/users/c2", "4.4.4.5").await;
    assert_eq!(res.status, StatusCode::TOO_MANY_REQUESTS);

    let reset_time = reset_time_of(&res);
    assert_eq!(reset_time - h.clock.now(), chrono::Duration::hours(12));
    assert_eq!(res.header("retry-after"), Some("43200"));
    assert_eq!(
        res.header("x-ratelimit-reset"),
        Some(reset_time.timestamp().to_string().as_str())
    );
}

#[tokio::test]
async fn concurrent_misses_fetch_once() {
    let h = harness().await;

    let (a, b) = tokio::join!(
        send(&h.app, "/api/x/users/slow", "5.5.5.5"),
        send(&h.app, "/api/x/users/slow", "5.5.5.5"),
    );

    assert_eq!(a.status, StatusCode::OK);
    assert_eq!(b.status, StatusCode::OK);
    assert_eq!(h.upstream.users(), 1);

    let hits = [&a, &b]
        .iter()
        .filter(|r| r.header("x-cache-hit") == Some("true"))
        .count();
    assert_eq!(hits, 1);
}

// ═══════════════════════════════════════════════════════════════════════════
// Error mapping
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn upstream_errors_map_to_statuses() {
    let h = harness_with(|c| c.rate_limit_max = 100).await;

    let cases = [
        ("missing", StatusCode::NOT_FOUND, "User not found"),
        ("ghost", StatusCode::NOT_FOUND, "User not found"),
        ("denied", StatusCode::FORBIDDEN, "Access denied"),
        ("broken", StatusCode::INTERNAL_SERVER_ERROR, "Upstream unavailable"),
        ("garbled", StatusCode::INTERNAL_SERVER_ERROR, "Upstream unavailable"),
    ];

    for (name, status, error) in cases {
        let res = send(&h.app, &format!("/api/x/users/{name}"), "6.6.6.6").await;
        assert_eq!(res.status, status, "{name}");
        let body = res.json();
        assert_eq!(body["error"], error, "{name}");
        assert!(body["details"].is_string(), "{name}");
        assert!(body.get("resetTime").is_none(), "{name}");
    }
}

#[tokio::test]
async fn errors_are_not_cached() {
    let h = harness().await;

    send(&h.app, "/api/x/users/ghost", "7.7.7.7").await;
    let res = send(&h.app, "/api/x/users/ghost", "7.7.7.7").await;

    assert_eq!(res.status, StatusCode::NOT_FOUND);
    assert_eq!(h.upstream.users(), 2);
}

#[tokio::test]
async fn upstream_throttle_carries_reset() {
    let h = harness().await;
    let res = send(&h.app, "/api/x/users/throttled", "8.8.8.8").await;

    assert_eq!(res.status, StatusCode::TOO_MANY_REQUESTS);
    let body = res.json();
    assert_eq!(body["error"], "Upstream rate limit exceeded");
    assert_eq!(body["resetTime"], "2100-01-01T00:00:00.000Z");

    let expected = retry_after_secs(reset_time_of(&res), h.clock.now()).to_string();
    assert_eq!(res.header("retry-after"), Some(expected.as_str()));
}

#[tokio::test]
async fn rejected_credential_is_auth_error() {
    let h = harness_with(|c| c.x_bearer_token = Some("wrong".to_string())).await;
    let res = send(&h.app, "/api/x/users/alice", "9.9.9.9").await;

    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    assert_eq!(res.json()["error"], "Authentication error");
}

#[tokio::test]
async fn missing_credential_is_server_error() {
    let h = harness_with(|c| c.x_bearer_token = None).await;
    let res = send(&h.app, "/api/x/users/alice", "10.0.0.1").await;

    assert_eq!(res.status, StatusCode::INTERNAL_SERVER_ERROR);
    let details = res.json()["details"].as_str().unwrap().to_string();
    assert!(details.contains("X_BEARER_TOKEN"));
    assert_eq!(h.upstream.users(), 0);

    let quota = send(&h.app, "/api/rate-limit", "10.0.0.1").await.json();
    assert_eq!(quota["remaining"], 3);
}

#[tokio::test]
async fn pinned_post_failure_is_omitted() {
    let h = harness().await;
    let res = send(&h.app, "/api/x/users/pinfail", "11.0.0.1").await;

    assert_eq!(res.status, StatusCode::OK);
    let body = res.json();
    assert_eq!(body["pinned_tweet_id"], "999");
    assert!(body.get("pinned_tweet").is_none());
}

#[tokio::test]
async fn invalid_input_is_rejected_early() {
    let h = harness().await;

    for uri in [
        "/api/x/users/bad.name",
        "/api/x/users/this_name_is_far_too_long",
        "/api/github/users/-octo",
        "/api/myspace/users/alice",
    ] {
        let res = send(&h.app, uri, "12.0.0.1").await;
        assert_eq!(res.status, StatusCode::BAD_REQUEST, "{uri}");
        assert_eq!(res.json()["error"], "Invalid request", "{uri}");
    }

    assert_eq!(h.upstream.users(), 0);
    let quota = send(&h.app, "/api/rate-limit", "12.0.0.1").await.json();
    assert_eq!(quota["remaining"], 3);
}

// ═══════════════════════════════════════════════════════════════════════════
// GitHub
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn github_profile_is_normalized() {
    let h = harness_with(|c| c.x_bearer_token = None).await;
    let res = send(&h.app, "/api/github/users/OctoCat", "13.0.0.1").await;

    assert_eq!(res.status, StatusCode::OK);
    let body = res.json();
    assert_eq!(body["login"], "octocat");
    assert_eq!(body["followers"], 12345);
    assert!(body.get("blog").is_none());
}

#[tokio::test]
async fn github_exhausted_quota_is_upstream_throttle() {
    let h = harness().await;
    let res = send(&h.app, "/api/github/users/limited", "14.0.0.1").await;

    assert_eq!(res.status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(res.json()["resetTime"], "2100-01-01T00:00:00.000Z");
}

// ═══════════════════════════════════════════════════════════════════════════
// Trends and receipts
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn trends_are_cached_and_not_counted() {
    let h = harness().await;

    let first = send(&h.app, "/api/x/trends/personalized", "15.0.0.1").await;
    assert_eq!(first.status, StatusCode::OK);
    assert_eq!(first.header("x-cache-hit"), Some("false"));
    assert!(first.header("x-ratelimit-remaining").is_none());

    let body = first.json();
    assert_eq!(body["data"][0]["trend_name"], "Rust");
    assert_eq!(body["data"][0]["post_count"], "1200");
    assert_eq!(body["data"][1]["post_count"], "5K posts");

    let second = send(&h.app, "/api/x/trends/personalized", "15.0.0.1").await;
    assert_eq!(second.header("x-cache-hit"), Some("true"));
    assert_eq!(h.upstream.trend_lookups.load(Ordering::SeqCst), 1);

    let quota = send(&h.app, "/api/rate-limit", "15.0.0.1").await.json();
    assert_eq!(quota["remaining"], 3);

    h.clock.advance(Duration::from_secs(15 * 60));
    send(&h.app, "/api/x/trends/personalized", "15.0.0.1").await;
    assert_eq!(h.upstream.trend_lookups.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn trends_only_for_x() {
    let h = harness().await;
    let res = send(&h.app, "/api/github/trends/personalized", "16.0.0.1").await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn receipt_svg_renders_profile() {
    let h = harness().await;
    let res = send(&h.app, "/api/x/users/alice/receipt.svg", "17.0.0.1").await;

    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.header("content-type"), Some("image/svg+xml"));
    assert_eq!(res.header("x-ratelimit-remaining"), Some("2"));

    let svg = String::from_utf8(res.body.clone()).unwrap();
    assert!(svg.contains("X RECEIPT"));
    assert!(svg.contains("ORDER #ALICE-"));
    assert!(svg.contains("THANK YOU FOR POASTING!"));

    // The JSON endpoint now hits the same cache entry.
    let json = send(&h.app, "/api/x/users/alice", "17.0.0.1").await;
    assert_eq!(json.header("x-cache-hit"), Some("true"));
}

#[tokio::test]
async fn receipt_png_renders_image() {
    let h = harness_with(|c| c.x_bearer_token = None).await;
    let res = send(&h.app, "/api/github/users/octocat/receipt.png", "18.0.0.1").await;

    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.header("content-type"), Some("image/png"));
    assert!(res.body.starts_with(b"\x89PNG"));
}
