//! Failure injection tests for the failover controller.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use axum::body::Bytes;
use axum::http::StatusCode;
use axum::routing::post;
use axum::Router;
use failover_proxy::backend::simulated::FailureMode;
use failover_proxy::backend::BackendId;
use failover_proxy::config::DetectionMode;
use failover_sdk::FailoverClient;
use serde_json::{json, Value};

mod common;

fn client() -> reqwest::Client {
    reqwest::Client::builder().no_proxy().build().unwrap()
}

#[tokio::test]
async fn test_crashed_primary_falls_back_to_spare() {
    let primary = common::spawn_simulated("primary").await;
    let spare = common::spawn_simulated("spare").await;
    let ctl = common::spawn_controller(common::config(primary.addr, spare.addr)).await;
    let sdk = FailoverClient::new(&ctl.url());

    let res = client().get(format!("{}/api", ctl.url())).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.json::<Value>().await.unwrap()["node"], "primary");

    let injected = sdk.inject_failure("crash").await.unwrap();
    assert!(injected.ok);
    assert_eq!(injected.mode, "crash");
    assert!(injected.primary_response.is_some());
    tokio::time::sleep(Duration::from_millis(300)).await;

    let res = client().get(format!("{}/api", ctl.url())).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.json::<Value>().await.unwrap()["node"], "spare");

    // One entry per physical attempt: primary ok, primary failed, spare ok.
    let logs = sdk.logs(10).await.unwrap();
    assert_eq!(logs.total, 3);
    assert_eq!(logs.logs[1].backend, "primary");
    assert_ne!(logs.logs[1].status, json!(200));
    assert_eq!(logs.logs[2].backend, "spare");
    assert_eq!(logs.logs[2].status, json!(200));

    let metrics = sdk.metrics().await.unwrap();
    assert_eq!(metrics.t_fail, Some(injected.t_fail));
    assert!(metrics.time_to_recover_ms.is_some());
    assert_eq!(metrics.active_target, "spare");
    assert_eq!(metrics.counts.total, 3);
    assert_eq!(metrics.counts.failed, 1);
}

#[tokio::test]
async fn test_both_backends_down_returns_bad_gateway() {
    let ctl = common::spawn_controller(common::config(
        common::closed_addr().await,
        common::closed_addr().await,
    ))
    .await;

    let res = client().get(format!("{}/api", ctl.url())).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::BAD_GATEWAY);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "Both primary and spare are unavailable");
    assert!(body["primary"].as_str().unwrap().contains("primary"));
    assert!(body["spare"].as_str().unwrap().contains("spare"));

    let (total, _) = ctl.controller.recent_attempts(10);
    assert_eq!(total, 2);
}

#[tokio::test]
async fn test_silent_primary_times_out_then_spare_answers() {
    let primary = common::start_silent_backend().await;
    let spare = common::spawn_simulated("spare").await;
    let ctl = common::spawn_controller(common::config(primary, spare.addr)).await;

    let res = client().get(format!("{}/api/data", ctl.url())).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.json::<Value>().await.unwrap()["node"], "spare");

    let logs = FailoverClient::new(&ctl.url()).logs(10).await.unwrap();
    assert_eq!(logs.logs[0].status, json!("timeout"));
    assert!(logs.logs[0].latency_ms >= 300);
    assert_eq!(ctl.controller.active_target(), BackendId::Spare);
}

#[tokio::test]
async fn test_primary_server_errors_switch_after_threshold() {
    let primary = common::start_programmable_backend(|| async {
        (500, r#"{"node":"primary","ok":false}"#.to_string())
    })
    .await;
    let spare = common::spawn_simulated("spare").await;
    let ctl = common::spawn_controller(common::config(primary, spare.addr)).await;
    let http = client();

    for _ in 0..3 {
        let res = http.get(format!("{}/api", ctl.url())).send().await.unwrap();
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(res.json::<Value>().await.unwrap()["node"], "primary");
    }
    assert_eq!(ctl.controller.active_target(), BackendId::Spare);

    let res = http.get(format!("{}/api", ctl.url())).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.json::<Value>().await.unwrap()["node"], "spare");
    assert_eq!(ctl.controller.state().switchovers, 1);
}

#[tokio::test]
async fn test_polling_detects_failure_without_traffic() {
    let primary = common::spawn_simulated("primary").await;
    let spare = common::spawn_simulated("spare").await;
    let mut config = common::config(primary.addr, spare.addr);
    config.detection.enabled = true;
    config.detection.interval_ms = 100;
    config.detection.probe_timeout_ms = 80;
    let ctl = common::spawn_controller(config).await;
    let sdk = FailoverClient::new(&ctl.url());

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(ctl.controller.active_target(), BackendId::Primary);

    primary.node.set_mode(FailureMode::ForcedError);
    let controller = ctl.controller.clone();
    assert!(common::eventually(Duration::from_secs(3), || controller.active_target() == BackendId::Spare).await);
    assert_eq!(ctl.controller.state().switchovers, 1);

    // Primary healthy again: no automatic fail-back.
    primary.node.set_mode(FailureMode::Healthy);
    let controller = ctl.controller.clone();
    assert!(common::eventually(Duration::from_secs(3), || !controller.health(BackendId::Primary).is_down()).await);
    assert_eq!(ctl.controller.active_target(), BackendId::Spare);

    let status = sdk.reset().await.unwrap();
    assert_eq!(status.active_target, "primary");
    assert_eq!(status.consecutive_failures, 0);

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(ctl.controller.active_target(), BackendId::Primary);
}

#[tokio::test]
async fn test_heartbeat_mode_switches_on_stale_primary() {
    let primary = common::spawn_simulated("primary").await;
    let spare = common::spawn_simulated("spare").await;
    let mut config = common::config(primary.addr, spare.addr);
    config.detection.enabled = true;
    config.detection.mode = DetectionMode::Heartbeat;
    config.detection.interval_ms = 50;
    config.detection.heartbeat_timeout_ms = 300;
    let ctl = common::spawn_controller(config).await;
    let sdk = FailoverClient::new(&ctl.url());

    // No heartbeat yet: grace period, not down.
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(ctl.controller.active_target(), BackendId::Primary);

    let primary_alive = Arc::new(AtomicBool::new(true));
    let alive = primary_alive.clone();
    let url = ctl.url();
    let pump = tokio::spawn(async move {
        let sdk = FailoverClient::new(&url);
        loop {
            if alive.load(Ordering::SeqCst) {
                let _ = sdk.heartbeat("primary").await;
            }
            let _ = sdk.heartbeat("spare").await;
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    });

    tokio::time::sleep(Duration::from_millis(600)).await;
    assert_eq!(ctl.controller.active_target(), BackendId::Primary);
    assert!(ctl.controller.health(BackendId::Primary).last_heartbeat_at.is_some());

    primary_alive.store(false, Ordering::SeqCst);
    let controller = ctl.controller.clone();
    assert!(common::eventually(Duration::from_secs(2), || controller.active_target() == BackendId::Spare).await);
    assert!(!ctl.controller.health(BackendId::Spare).is_down());

    let status = sdk.status().await.unwrap();
    assert_eq!(status.active_target, "spare");
    assert_eq!(status.primary.status, "down");

    pump.abort();
}

#[tokio::test]
async fn test_heartbeat_validation() {
    let ctl = common::spawn_controller(common::config(
        common::closed_addr().await,
        common::closed_addr().await,
    ))
    .await;
    let http = client();

    // Polling mode refuses heartbeats.
    let res = http
        .post(format!("{}/heartbeat?from=primary", ctl.url()))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);

    let mut config = common::config(common::closed_addr().await, common::closed_addr().await);
    config.detection.mode = DetectionMode::Heartbeat;
    let ctl = common::spawn_controller(config).await;

    let res = http
        .post(format!("{}/heartbeat?from=tertiary", ctl.url()))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = http
        .post(format!("{}/heartbeat?from=spare", ctl.url()))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["ok"], true);
    assert!(body["timestamp"].as_u64().is_some());
}

#[tokio::test]
async fn test_invalid_injection_mode_changes_nothing() {
    let primary = common::spawn_simulated("primary").await;
    let spare = common::spawn_simulated("spare").await;
    let ctl = common::spawn_controller(common::config(primary.addr, spare.addr)).await;

    let res = client()
        .post(format!("{}/inject-failure", ctl.url()))
        .json(&json!({ "mode": "meltdown" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(res.json::<Value>().await.unwrap()["ok"], false);

    assert_eq!(ctl.controller.report().t_fail, None);
    assert_eq!(primary.node.mode(), FailureMode::Healthy);
}

#[tokio::test]
async fn test_injection_defaults_to_timeout() {
    let primary = common::spawn_simulated("primary").await;
    let spare = common::spawn_simulated("spare").await;
    let ctl = common::spawn_controller(common::config(primary.addr, spare.addr)).await;

    let res = client()
        .post(format!("{}/inject-failure", ctl.url()))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["mode"], "timeout");
    assert!(body["tFail"].as_u64().is_some());
    assert_eq!(primary.node.mode(), FailureMode::ForcedTimeout);
}

#[tokio::test]
async fn test_recover_primary_resets_controller() {
    let primary = common::spawn_simulated("primary").await;
    let spare = common::spawn_simulated("spare").await;
    let ctl = common::spawn_controller(common::config(primary.addr, spare.addr)).await;
    let sdk = FailoverClient::new(&ctl.url());

    sdk.inject_failure("error").await.unwrap();
    for _ in 0..3 {
        let _ = sdk.forward_get("/api").await.unwrap();
    }
    assert_eq!(ctl.controller.active_target(), BackendId::Spare);

    let recovered = sdk.recover_primary().await.unwrap();
    assert_eq!(recovered["ok"], true);
    assert_eq!(recovered["state"]["activeTarget"], "primary");
    assert_eq!(primary.node.mode(), FailureMode::Healthy);

    let res = sdk.forward_get("/api").await.unwrap();
    assert_eq!(res.json::<Value>().await.unwrap()["node"], "primary");
}

#[tokio::test]
async fn test_recover_primary_unreachable_still_resets() {
    let spare = common::spawn_simulated("spare").await;
    let ctl = common::spawn_controller(common::config(common::closed_addr().await, spare.addr)).await;
    let generation = ctl.controller.generation();
    ctl.controller.confirm_down(BackendId::Primary, "test", generation);

    let res = client()
        .post(format!("{}/recover-primary", ctl.url()))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(ctl.controller.active_target(), BackendId::Primary);
}

#[tokio::test]
async fn test_status_aliases_and_log_clearing() {
    let primary = common::spawn_simulated("primary").await;
    let spare = common::spawn_simulated("spare").await;
    let ctl = common::spawn_controller(common::config(primary.addr, spare.addr)).await;
    let http = client();

    for _ in 0..4 {
        http.get(format!("{}/api", ctl.url())).send().await.unwrap();
    }

    for path in ["/status", "/failover/status"] {
        let body: Value = http.get(format!("{}{}", ctl.url(), path)).send().await.unwrap().json().await.unwrap();
        assert_eq!(body["activeTarget"], "primary");
        assert_eq!(body["totalRequests"], 4);
        assert_eq!(body["config"]["detection"]["failure_threshold"], 3);
    }

    let body: Value = http.get(format!("{}/logs?limit=2", ctl.url())).send().await.unwrap().json().await.unwrap();
    assert_eq!(body["total"], 4);
    assert_eq!(body["showing"], 2);

    let body: Value = http.delete(format!("{}/logs", ctl.url())).send().await.unwrap().json().await.unwrap();
    assert_eq!(body["cleared"], 4);

    let body: Value = http.post(format!("{}/failover/reset", ctl.url())).send().await.unwrap().json().await.unwrap();
    assert_eq!(body["success"], true);
    assert_eq!(body["activeTarget"], "primary");

    let metrics = FailoverClient::new(&ctl.url()).metrics().await.unwrap();
    assert_eq!(metrics.total_requests, 0);
    assert_eq!(metrics.error_rate, None);
}

#[tokio::test]
async fn test_post_body_forwarded_as_json_with_request_id() {
    let echo = Router::new().route(
        "/api/echo",
        post(|headers: axum::http::HeaderMap, body: Bytes| async move {
            let content_type = headers
                .get("content-type")
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default()
                .to_string();
            let request_id = headers.get("x-request-id").is_some();
            axum::Json(json!({
                "contentType": content_type,
                "hasRequestId": request_id,
                "body": String::from_utf8_lossy(&body),
            }))
        }),
    );
    let primary = common::spawn_router(echo).await;
    let ctl = common::spawn_controller(common::config(primary, common::closed_addr().await)).await;

    let res = client()
        .post(format!("{}/api/echo?x=1", ctl.url()))
        .header("content-type", "application/json")
        .body(r#"{ "hello" : "world" }"#)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert!(res.headers().get("x-request-id").is_some());
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["contentType"], "application/json");
    assert_eq!(body["hasRequestId"], true);
    assert_eq!(body["body"], r#"{"hello":"world"}"#);

    let res = client()
        .post(format!("{}/api/echo", ctl.url()))
        .header("content-type", "application/json")
        .body("not json")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = client()
        .post(format!("{}/api/echo", ctl.url()))
        .header("content-type", "text/plain")
        .body("not json")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["body"], "{}");
}
