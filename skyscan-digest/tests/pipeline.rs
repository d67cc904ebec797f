mod common;

use serde_json::{Value, json};
use skyscan_config::BlueskyConfig;
use skyscan_digest::{SearchHandler, SearchParams};
use skyscan_http::StatusCode;
use skyscan_social::bluesky::BlueskyApi;
use std::time::Duration;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use wiremock::matchers::{method, path, query_param, query_param_is_missing};
use wiremock::{Mock, MockServer, ResponseTemplate};

const LOGIN: &str = "/xrpc/com.atproto.server.createSession";
const SEARCH: &str = "/xrpc/app.bsky.feed.searchPosts";

fn configured() -> BlueskyConfig {
    BlueskyConfig {
        handle: Some("reporter.bsky.social".into()),
        app_password: Some("abcd-efgh-ijkl-mnop".into()),
        ..Default::default()
    }
}

fn handler(server: &MockServer, cfg: &BlueskyConfig) -> SearchHandler<BlueskyApi> {
    let api = BlueskyApi::new(&server.uri())
        .unwrap()
        .with_timeout(Duration::from_secs(2));
    SearchHandler::new(cfg, api)
}

fn params(q: &str) -> SearchParams {
    SearchParams {
        q: Some(q.into()),
        ..Default::default()
    }
}

fn hours_ago(h: i64) -> String {
    (OffsetDateTime::now_utc() - time::Duration::hours(h))
        .format(&Rfc3339)
        .unwrap()
}

fn post(rkey: &str, handle: &str, text: &str, reposts: u64, likes: u64, indexed_at: &str) -> Value {
    json!({
        "uri": format!("at://did:plc:{handle}/app.bsky.feed.post/{rkey}"),
        "cid": format!("cid-{rkey}"),
        "author": { "did": format!("did:plc:{handle}"), "handle": handle },
        "record": { "text": text, "createdAt": indexed_at },
        "indexedAt": indexed_at,
        "repostCount": reposts,
        "likeCount": likes,
    })
}

async fn mount_login(server: &MockServer, times: u64) {
    Mock::given(method("POST"))
        .and(path(LOGIN))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "accessJwt": "access-1",
            "refreshJwt": "refresh-1",
            "handle": "reporter.bsky.social",
            "did": "did:plc:reporter"
        })))
        .expect(times)
        .mount(server)
        .await;
}

async fn mount_no_search(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path(SEARCH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "posts": [] })))
        .expect(0)
        .mount(server)
        .await;
}

fn body(resp: &skyscan_digest::HandlerResponse) -> Value {
    serde_json::to_value(&resp.body).unwrap()
}

#[tokio::test]
async fn trade_search_keeps_only_the_qualifying_post() {
    common::init_test_tracing();
    let server = MockServer::start().await;
    mount_login(&server, 1).await;

    Mock::given(method("GET"))
        .and(path(SEARCH))
        .and(query_param("q", "trade"))
        .and(query_param("sort", "latest"))
        .and(query_param("limit", "25"))
        .and(query_param_is_missing("cursor"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "posts": [
                post("first", "alice.bsky.social", "Big trade https://news.test/a", 15, 2, &hours_ago(1)),
                post("second", "bob.bsky.social", "liked, not shared", 5, 50, &hours_ago(1)),
                post("third", "carol.bsky.social", "old news", 20, 0, &hours_ago(10)),
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let req = SearchParams {
        q: Some("trade".into()),
        hours: Some("6".into()),
        min_reposts: Some("10".into()),
        min_likes: Some("0".into()),
        limit: Some("50".into()),
    };
    let resp = handler(&server, &configured()).handle(&req).await;
    assert_eq!(resp.status, StatusCode::OK);

    let v = body(&resp);
    assert_eq!(v["count"], 1);
    assert_eq!(v["posts"].as_array().unwrap().len(), 1);
    let first = &v["posts"][0];
    assert_eq!(first["id"], "first");
    assert_eq!(first["repostCount"], 15);
    assert_eq!(first["likeCount"], 2);
    assert_eq!(
        first["permalink"],
        "https://bsky.app/profile/alice.bsky.social/post/first"
    );
    assert!(
        first["renderedHtml"]
            .as_str()
            .unwrap()
            .contains("<a href=\"https://news.test/a\"")
    );

    let html = v["prepHtml"].as_str().unwrap();
    assert!(html.starts_with("<ol>\n<li>"));
    assert!(html.contains("<strong>@alice.bsky.social</strong>: Big trade https://news.test/a"));
    assert!(!html.contains("bob.bsky.social"));
    assert!(!html.contains("carol.bsky.social"));
}

#[tokio::test]
async fn malformed_posts_do_not_sink_the_page() {
    common::init_test_tracing();
    let server = MockServer::start().await;
    mount_login(&server, 1).await;

    let mut broken = post("broken", "bob.bsky.social", "x", 0, 0, &hours_ago(1));
    broken["likeCount"] = json!(-1);
    broken["repostCount"] = json!("lots");
    broken["record"]["text"] = json!(42);

    Mock::given(method("GET"))
        .and(path(SEARCH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "posts": [
                post("good", "alice.bsky.social", "solid", 15, 2, &hours_ago(1)),
                broken,
                "not a post",
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let resp = handler(&server, &configured()).handle(&params("trade")).await;
    assert_eq!(resp.status, StatusCode::OK);
    let v = body(&resp);
    assert_eq!(v["count"], 1);
    assert_eq!(v["posts"][0]["id"], "good");
}

#[tokio::test]
async fn paginates_until_the_upstream_runs_dry() {
    common::init_test_tracing();
    let server = MockServer::start().await;
    mount_login(&server, 1).await;

    let now = hours_ago(0);
    let page_one: Vec<Value> = (0..25)
        .map(|i| post(&format!("p1-{i}"), "alice.bsky.social", "t", 1, 0, &now))
        .collect();
    let page_two: Vec<Value> = (0..5)
        .map(|i| post(&format!("p2-{i}"), "alice.bsky.social", "t", 1, 0, &now))
        .collect();

    Mock::given(method("GET"))
        .and(path(SEARCH))
        .and(query_param_is_missing("cursor"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "posts": page_one, "cursor": "c2" })),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(SEARCH))
        .and(query_param("cursor", "c2"))
        .and(query_param("limit", "25"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "posts": page_two })))
        .expect(1)
        .mount(&server)
        .await;

    let req = SearchParams {
        min_reposts: Some("0".into()),
        ..params("trade")
    };
    let resp = handler(&server, &configured()).handle(&req).await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(body(&resp)["count"], 30);
}

#[tokio::test]
async fn missing_credentials_fail_before_any_upstream_call() {
    common::init_test_tracing();
    let server = MockServer::start().await;
    mount_login(&server, 0).await;
    mount_no_search(&server).await;

    let cfg = BlueskyConfig {
        handle: Some("${BLUESKY_HANDLE}".into()),
        ..Default::default()
    };
    let resp = handler(&server, &cfg).handle(&params("trade")).await;
    assert_eq!(resp.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        body(&resp),
        json!({ "error": "Missing Bluesky credentials on server." })
    );
}

#[tokio::test]
async fn blank_query_is_rejected_without_logging_in() {
    common::init_test_tracing();
    let server = MockServer::start().await;
    mount_login(&server, 0).await;
    mount_no_search(&server).await;

    let resp = handler(&server, &configured()).handle(&params("   ")).await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert_eq!(body(&resp), json!({ "error": "Missing query." }));
}

#[tokio::test]
async fn malformed_number_names_the_parameter() {
    common::init_test_tracing();
    let server = MockServer::start().await;
    mount_login(&server, 0).await;

    let req = SearchParams {
        hours: Some("soon".into()),
        ..params("trade")
    };
    let resp = handler(&server, &configured()).handle(&req).await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert!(body(&resp)["error"].as_str().unwrap().contains("hours"));
}

#[tokio::test]
async fn rejected_login_surfaces_the_upstream_message() {
    common::init_test_tracing();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(LOGIN))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": "AuthenticationRequired",
            "message": "Invalid identifier or password"
        })))
        .expect(1)
        .mount(&server)
        .await;
    mount_no_search(&server).await;

    let resp = handler(&server, &configured()).handle(&params("trade")).await;
    assert_eq!(resp.status, StatusCode::INTERNAL_SERVER_ERROR);
    let msg = body(&resp)["error"].as_str().unwrap().to_string();
    assert!(msg.contains("Invalid identifier or password"), "{msg}");
    assert!(!msg.contains("abcd-efgh-ijkl-mnop"), "{msg}");
}

#[tokio::test]
async fn failing_page_aborts_the_whole_request() {
    common::init_test_tracing();
    let server = MockServer::start().await;
    mount_login(&server, 1).await;

    let page_one: Vec<Value> = (0..25)
        .map(|i| post(&format!("p{i}"), "alice.bsky.social", "t", 50, 0, &hours_ago(0)))
        .collect();
    Mock::given(method("GET"))
        .and(path(SEARCH))
        .and(query_param_is_missing("cursor"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "posts": page_one, "cursor": "c2" })),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(SEARCH))
        .and(query_param("cursor", "c2"))
        .respond_with(ResponseTemplate::new(502).set_body_json(json!({
            "error": "UpstreamFailure",
            "message": "appview unavailable"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let resp = handler(&server, &configured()).handle(&params("trade")).await;
    assert_eq!(resp.status, StatusCode::INTERNAL_SERVER_ERROR);
    let v = body(&resp);
    assert!(v.get("posts").is_none());
    assert!(v["error"].as_str().unwrap().contains("appview unavailable"));
}

#[tokio::test]
async fn slow_upstream_times_out_as_a_server_error() {
    common::init_test_tracing();
    let server = MockServer::start().await;
    mount_login(&server, 1).await;
    Mock::given(method("GET"))
        .and(path(SEARCH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "posts": [] }))
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&server)
        .await;

    let api = BlueskyApi::new(&server.uri())
        .unwrap()
        .with_timeout(Duration::from_millis(200));
    let resp = SearchHandler::new(&configured(), api)
        .handle(&params("trade"))
        .await;
    assert_eq!(resp.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body(&resp)["error"].as_str().unwrap().contains("timed out"));
}
