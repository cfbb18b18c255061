//! End-to-end throttling tests.

use reqwest::StatusCode;
use serde_json::{json, Value};

use composite_api_server::config::ThrottleRuleConfig;
use composite_api_server::throttling::ThrottleKind;

mod common;

fn rule(kind: ThrottleKind, rate: u64, key_header: Option<&str>) -> ThrottleRuleConfig {
    ThrottleRuleConfig {
        kind,
        rate,
        period_secs: 60,
        burst: 0,
        key_header: key_header.map(str::to_string),
    }
}

fn widgets() -> Value {
    json!({"/api/widgets": {"method": "GET"}})
}

#[tokio::test]
async fn test_ip_rule_rejects_with_retry_headers() {
    let upstream = common::start_upstream().await;
    let mut config = common::config_for(upstream);
    config.throttling.rules.push(rule(ThrottleKind::Ip, 2, None));
    let server = common::start_server(config).await;
    let client = common::client();

    for remaining in ["1", "0"] {
        let res = client
            .post(server.url("/composite/parallel"))
            .json(&widgets())
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(res.headers()["x-ratelimit-limit"], "2");
        assert_eq!(res.headers()["x-ratelimit-remaining"], remaining);
    }

    let res = client
        .post(server.url("/composite/parallel"))
        .json(&widgets())
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(res.headers()["retry-after"], "60");
    assert!(res.headers().contains_key("x-ratelimit-reset"));

    let body: Value = res.json().await.unwrap();
    assert_eq!(
        body,
        json!({"error": "too_many_requests", "error_description": "Too Many Requests."})
    );

    // Health is never throttled.
    let res = client.get(server.url("/health")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_header_rule_keys_on_header_value() {
    let upstream = common::start_upstream().await;
    let mut config = common::config_for(upstream);
    config
        .throttling
        .rules
        .push(rule(ThrottleKind::Username, 1, Some("x-username")));
    let server = common::start_server(config).await;
    let client = common::client();

    let send = |user: Option<&'static str>| {
        let mut request = client.post(server.url("/composite/chain")).json(&json!({
            "/api/widgets": {"method": "GET", "ref": "widgets"},
        }));
        if let Some(user) = user {
            request = request.header("x-username", user);
        }
        request.send()
    };

    assert_eq!(send(Some("ada")).await.unwrap().status(), StatusCode::OK);
    assert_eq!(send(Some("ada")).await.unwrap().status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(send(Some("grace")).await.unwrap().status(), StatusCode::OK);

    let res = send(None).await.unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "invalid_request");
}

#[tokio::test]
async fn test_rules_apply_in_order() {
    let upstream = common::start_upstream().await;
    let mut config = common::config_for(upstream);
    config.throttling.rules.push(rule(ThrottleKind::Ip, 1, None));
    config
        .throttling
        .rules
        .push(rule(ThrottleKind::Token, 5, None));
    let server = common::start_server(config).await;
    let client = common::client();

    // The outer IP rule answers before the token rule sees the missing header.
    let res = client
        .post(server.url("/composite/parallel"))
        .json(&widgets())
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = client
        .post(server.url("/composite/parallel"))
        .json(&widgets())
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn test_disabled_throttling_allows_everything() {
    let upstream = common::start_upstream().await;
    let mut config = common::config_for(upstream);
    config.throttling.enabled = false;
    config.throttling.rules.push(rule(ThrottleKind::Ip, 1, None));
    let server = common::start_server(config).await;
    let client = common::client();

    for _ in 0..3 {
        let res = client
            .post(server.url("/composite/parallel"))
            .json(&widgets())
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }
}
