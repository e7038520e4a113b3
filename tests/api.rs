use axum::body::{Body, Bytes};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use laundromat::config::SharedEnv;
use laundromat::routes;
use laundromat::upstream::client::UpstreamClient;
use mockito::Matcher;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceExt;

fn app(pairs: &[(&str, String)]) -> Router {
    let env: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect();
    let env: SharedEnv = Arc::new(env);
    routes::router(env, UpstreamClient::new().unwrap())
}

async fn call(
    app: &Router,
    method: &str,
    uri: &str,
    body: Option<Value>,
) -> (StatusCode, Option<String>, Bytes) {
    let mut builder = Request::builder().method(method).uri(uri);
    if body.is_some() {
        builder = builder.header("content-type", "application/json");
    }
    let body = match body {
        Some(v) => Body::from(serde_json::to_string(&v).unwrap()),
        None => Body::empty(),
    };
    let res = app
        .clone()
        .oneshot(builder.body(body).unwrap())
        .await
        .unwrap();
    let status = res.status();
    let cache_control = res
        .headers()
        .get(header::CACHE_CONTROL)
        .map(|v| v.to_str().unwrap().to_owned());
    let bytes = hyper::body::to_bytes(res.into_body()).await.unwrap();
    (status, cache_control, bytes)
}

async fn check(app: &Router, payload: Value) -> (StatusCode, Value) {
    let (status, _, bytes) = call(app, "POST", "/api/check", Some(payload)).await;
    (status, serde_json::from_slice(&bytes).unwrap())
}

fn statuses(body: &Value) -> Vec<(String, String)> {
    body["machines"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| {
            (
                m["id"].as_str().unwrap().to_owned(),
                m["status"].as_str().unwrap().to_owned(),
            )
        })
        .collect()
}

// ── Request validation ──

#[tokio::test]
async fn check_rejects_other_methods() {
    let app = app(&[]);
    let (status, _, bytes) = call(&app, "GET", "/api/check", None).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body, json!({ "error": "POST only" }));
}

#[tokio::test]
async fn check_rejects_invalid_json() {
    let app = app(&[]);
    let req = Request::builder()
        .method("POST")
        .uri("/api/check")
        .header("content-type", "application/json")
        .body(Body::from("{machines: ["))
        .unwrap();
    let res = app.oneshot(req).await.unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let bytes = hyper::body::to_bytes(res.into_body()).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["error"], "Invalid JSON");
}

#[tokio::test]
async fn check_requires_machines() {
    let app = app(&[]);
    for payload in [json!({}), json!({ "machines": [] }), json!({ "machines": "W1" })] {
        let (status, body) = check(&app, payload).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "machines[] required");
    }
}

// ── Probing ──

#[tokio::test]
async fn conflict_from_upstream_means_occupied() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", Matcher::Regex(String::from("^/checkout")))
        .match_header("x-requested-with", "XMLHttpRequest")
        .match_body(Matcher::PartialJson(json!({
            "machine": { "name": "W1" },
            "outlet": { "machineNo": "A1-W1" },
            "mode": "warm",
        })))
        .with_status(409)
        .with_body(r#"{"message":"conflict"}"#)
        .expect(1)
        .create_async()
        .await;

    let app = app(&[
        ("UPSTREAM_ENDPOINT", format!("{}/checkout", server.url())),
        ("UPSTREAM_X_REQUESTED_WITH", String::from("XMLHttpRequest")),
    ]);
    let (status, body) = check(
        &app,
        json!({ "machines": [{ "id": "W1", "machineNo": "A1-W1", "name": "W1" }] }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        statuses(&body),
        vec![(String::from("W1"), String::from("Occupied"))]
    );
    assert!(body["checkedAt"].as_str().unwrap().ends_with('Z'));
    mock.assert_async().await;
}

#[tokio::test]
async fn checkout_url_means_available() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", Matcher::Regex(String::from("^/checkout")))
        .match_body(Matcher::PartialJson(json!({ "amount": 6, "paymentAmount": "6.00" })))
        .with_status(200)
        .with_body(r#"{"status":"url","data":{"url":"https://pay.vendor.example/checkout/xyz"}}"#)
        .create_async()
        .await;

    let app = app(&[("UPSTREAM_ENDPOINT", format!("{}/checkout", server.url()))]);
    let (_, body) = check(
        &app,
        json!({
            "machines": [{ "id": "W2", "machineNo": "A1-W2" }],
            "defaults": { "amount": 6 },
        }),
    )
    .await;

    assert_eq!(
        statuses(&body),
        vec![(String::from("W2"), String::from("Available"))]
    );
    mock.assert_async().await;
}

#[tokio::test]
async fn failing_machine_does_not_stop_the_batch() {
    let mut server = mockito::Server::new_async().await;
    let dryer = server
        .mock("POST", "/dryer-status")
        .match_body(Matcher::Json(json!({ "machineNo": "A1-D1", "operatorId": "op-7" })))
        .with_status(200)
        .with_body("\"c3RhdHVz==\"")
        .expect(1)
        .create_async()
        .await;

    let app = app(&[
        // Nothing listens on port 1, so the washer probe fails to connect
        ("UPSTREAM_ENDPOINT", String::from("http://127.0.0.1:1/checkout")),
        ("DRYER_STATUS_ENDPOINT", format!("{}/dryer-status", server.url())),
        ("DRYER_OPERATOR_ID", String::from("op-7")),
    ]);
    let (status, body) = check(
        &app,
        json!({ "machines": [
            { "id": "W1", "machineNo": "A1-W1", "name": "W1" },
            { "id": "D1", "machineNo": "A1-D1", "name": "D1" },
        ] }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        statuses(&body),
        vec![
            (String::from("W1"), String::from("Error")),
            (String::from("D1"), String::from("Available")),
        ]
    );
    dryer.assert_async().await;
}

#[tokio::test]
async fn missing_endpoint_is_an_error_for_washers_only() {
    let app = app(&[]);
    let (_, body) = check(
        &app,
        json!({ "machines": [
            { "id": "W1", "machineNo": "A1-W1" },
            { "id": "D1", "machineNo": "A1-D1" },
        ] }),
    )
    .await;

    // Dryers without a status endpoint are never asked
    assert_eq!(
        statuses(&body),
        vec![
            (String::from("W1"), String::from("Error")),
            (String::from("D1"), String::from("Unknown")),
        ]
    );
}

#[tokio::test]
async fn hostel_scoped_operator_id_is_used() {
    let mut server = mockito::Server::new_async().await;
    let dryer = server
        .mock("POST", "/dryer-status")
        .match_body(Matcher::Json(json!({ "machineNo": "B2-D3", "operatorId": "east-op" })))
        .with_status(200)
        .with_body("abcd")
        .expect(1)
        .create_async()
        .await;

    let app = app(&[
        ("DRYER_STATUS_ENDPOINT", format!("{}/dryer-status", server.url())),
        ("DRYER_OPERATOR_ID", String::from("generic-op")),
        ("DRYER_OPERATOR_ID_EAST", String::from("east-op")),
    ]);
    let (_, body) = check(
        &app,
        json!({ "hostel": "east", "machines": [{ "machineNo": "B2-D3" }] }),
    )
    .await;

    assert_eq!(
        statuses(&body),
        vec![(String::from("B2-D3"), String::from("Occupied"))]
    );
    dryer.assert_async().await;
}

#[tokio::test]
async fn only_twenty_machines_are_probed() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", Matcher::Regex(String::from("^/checkout")))
        .with_status(400)
        .with_body("bad version")
        .expect(20)
        .create_async()
        .await;

    let machines: Vec<Value> = (0..25)
        .map(|i| json!({ "id": format!("W{}", i), "machineNo": format!("A{}-W1", i) }))
        .collect();
    let app = app(&[("UPSTREAM_ENDPOINT", format!("{}/checkout", server.url()))]);
    let (_, body) = check(&app, json!({ "machines": machines })).await;

    let results = statuses(&body);
    assert_eq!(results.len(), 20);
    assert_eq!(results[19].0, "W19");
    assert!(results.iter().all(|(_, status)| status == "Unknown"));
    mock.assert_async().await;
}

#[tokio::test]
async fn machines_without_a_number_are_skipped() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", Matcher::Regex(String::from("^/checkout")))
        .with_status(200)
        .with_body("machine is currently running")
        .expect(1)
        .create_async()
        .await;

    let app = app(&[("UPSTREAM_ENDPOINT", format!("{}/checkout", server.url()))]);
    let (_, body) = check(
        &app,
        json!({ "machines": [
            { "id": "X1", "machineNo": "<>!" },
            { "id": "X2" },
            "garbage",
            { "id": "W3", "machineNo": "A3-W1" },
        ] }),
    )
    .await;

    assert_eq!(
        statuses(&body),
        vec![(String::from("W3"), String::from("Occupied"))]
    );
    mock.assert_async().await;
}

#[tokio::test]
async fn slow_upstream_times_out_as_error() {
    // Accepts connections and never answers
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });

    let app = app(&[
        ("UPSTREAM_ENDPOINT", format!("http://{}/checkout", addr)),
        ("UPSTREAM_TIMEOUT_SECS", String::from("1")),
    ]);
    let started = std::time::Instant::now();
    let (status, body) = check(
        &app,
        json!({ "machines": [{ "id": "W1", "machineNo": "A1-W1" }] }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        statuses(&body),
        vec![(String::from("W1"), String::from("Error"))]
    );
    assert!(started.elapsed() < std::time::Duration::from_secs(10));
}

#[tokio::test]
async fn redirects_are_not_followed() {
    let mut server = mockito::Server::new_async().await;
    let landing = server
        .mock("POST", "/landing")
        .with_status(200)
        .with_body("https://pay.vendor.example/checkout/abc")
        .expect(0)
        .create_async()
        .await;
    let checkout = server
        .mock("POST", Matcher::Regex(String::from("^/checkout")))
        .with_status(302)
        .with_header("location", &format!("{}/landing", server.url()))
        .expect(1)
        .create_async()
        .await;

    let app = app(&[("UPSTREAM_ENDPOINT", format!("{}/checkout", server.url()))]);
    let (_, body) = check(
        &app,
        json!({ "machines": [{ "id": "W1", "machineNo": "A1-W1" }] }),
    )
    .await;

    assert_eq!(
        statuses(&body),
        vec![(String::from("W1"), String::from("Unknown"))]
    );
    checkout.assert_async().await;
    landing.assert_async().await;
}

#[tokio::test]
async fn failing_dryer_endpoint_means_unknown() {
    let mut server = mockito::Server::new_async().await;
    let dryer = server
        .mock("POST", "/dryer-status")
        .with_status(500)
        .with_body("abc==")
        .expect(1)
        .create_async()
        .await;

    let app = app(&[
        ("DRYER_STATUS_ENDPOINT", format!("{}/dryer-status", server.url())),
        ("DRYER_OPERATOR_ID", String::from("op-7")),
    ]);
    let (_, body) = check(
        &app,
        json!({ "machines": [{ "id": "D1", "machineNo": "A1-D1" }] }),
    )
    .await;

    assert_eq!(
        statuses(&body),
        vec![(String::from("D1"), String::from("Unknown"))]
    );
    dryer.assert_async().await;
}

// ── Config ──

#[tokio::test]
async fn config_is_stable_and_uncached() {
    let app = app(&[
        ("PUBLIC_TITLE", String::from("Block C")),
        (
            "PUBLIC_SITES_JSON",
            String::from(r#"[{"id":"north","machines":[{"id":"N1"}]},{"id":"south"}]"#),
        ),
    ]);

    let (status, cache_control, first) = call(&app, "GET", "/api/config?hostel=south", None).await;
    let (_, _, second) = call(&app, "GET", "/api/config?hostel=south", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cache_control.as_deref(), Some("no-store"));
    assert_eq!(first, second);

    let body: Value = serde_json::from_slice(&first).unwrap();
    assert_eq!(body["selectedHostel"], "south");
    assert_eq!(body["title"], "Block C");
    assert_eq!(body["hostels"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn config_accepts_any_method() {
    let app = app(&[("PUBLIC_MACHINES_JSON", String::from(r#"[{"id":"W1"}]"#))]);
    let (status, _, bytes) = call(&app, "POST", "/api/config", None).await;
    assert_eq!(status, StatusCode::OK);
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["machines"], json!([{ "id": "W1" }]));
    assert!(body.get("hostels").is_none());
}
