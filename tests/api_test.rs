use axum::http::StatusCode;
use bonustree::api::{self, AppState};
use bonustree::notify::MockNotificationSink;
use bonustree::{init_db, Config, Orchestrator, Repository};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tempfile::TempDir;
use tower::util::ServiceExt;

struct TestApp {
    app: axum::Router,
    _temp: TempDir,
}

async fn setup_test_app() -> TestApp {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir
        .path()
        .join("test.db")
        .to_string_lossy()
        .to_string();
    let env: HashMap<String, String> = [
        ("DATABASE_PATH", db_path.as_str()),
        ("MATCHING_BV_PER_UNIT", "100"),
        ("MATCHING_BONUS_PER_UNIT", "500"),
    ]
    .iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();
    let config = Config::from_env_map(env).unwrap();
    let pool = init_db(&db_path).await.expect("init_db failed");
    let repo = Arc::new(Repository::new(pool));
    let orchestrator = Arc::new(Orchestrator::new(
        repo,
        &config,
        Arc::new(MockNotificationSink::new()),
    ));
    let app = api::create_router(AppState::new(config, orchestrator));
    TestApp {
        app,
        _temp: temp_dir,
    }
}

async fn request(app: &axum::Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = axum::http::Request::builder().method(method).uri(uri);
    let req = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(axum::body::Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(axum::body::Body::empty()).unwrap(),
    };

    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

async fn seed_tree(app: &axum::Router) {
    let (status, _) = request(app, "POST", "/v1/tree/roots", Some(json!({"userId": "R"}))).await;
    assert_eq!(status, StatusCode::CREATED);
    for (user, side) in [("A", "left"), ("B", "right")] {
        let (status, body) = request(
            app,
            "POST",
            "/v1/tree/place",
            Some(json!({"newUserId": user, "referrerId": "R", "side": side})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["parentId"], "R");
        assert_eq!(body["side"], side);
    }
}

async fn order(app: &axum::Router, order_id: &str, user: &str, bv: &str) -> (StatusCode, Value) {
    request(
        app,
        "POST",
        "/v1/orders",
        Some(json!({
            "orderId": order_id,
            "userId": user,
            "amount": bv,
            "items": [{"businessVolume": bv}],
        })),
    )
    .await
}

#[tokio::test]
async fn test_health_and_ready() {
    let test_app = setup_test_app().await;
    let (status, _) = request(&test_app.app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = request(&test_app.app, "GET", "/ready", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ready");
}

#[tokio::test]
async fn test_placement_endpoints() {
    let test_app = setup_test_app().await;
    let app = &test_app.app;
    seed_tree(app).await;

    let (status, body) = request(
        app,
        "POST",
        "/v1/tree/place",
        Some(json!({"newUserId": "C", "referrerId": "R", "side": "left"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["parentId"], "A");
    assert_eq!(body["node"]["sponsorId"], "R");
    assert_eq!(body["node"]["status"], "inactive");

    let (status, _) = request(
        app,
        "POST",
        "/v1/tree/place",
        Some(json!({"newUserId": "C", "referrerId": "R", "side": "right"})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = request(
        app,
        "POST",
        "/v1/tree/place",
        Some(json!({"newUserId": "D", "referrerId": "nobody", "side": "left"})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = request(
        app,
        "POST",
        "/v1/tree/place",
        Some(json!({"newUserId": "D", "referrerId": "R", "side": "up"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = request(app, "GET", "/v1/tree/team-side?descendant=C&ancestor=R", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["side"], "left");

    let (status, _) = request(app, "GET", "/v1/tree/team-side?descendant=R&ancestor=B", None).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, body) = request(
        app,
        "PUT",
        "/v1/tree/nodes/B/status",
        Some(json!({"status": "suspended"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "suspended");

    let (status, _) = request(app, "GET", "/v1/tree/nodes/ghost", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_order_matching_and_wallet_flow() {
    let test_app = setup_test_app().await;
    let app = &test_app.app;
    seed_tree(app).await;

    let (status, body) = order(app, "o-r", "R", "0").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "recorded");
    order(app, "o-a", "A", "250").await;
    let (_, body) = order(app, "o-b", "B", "200").await;
    assert_eq!(body["ancestorsCredited"], 1);

    let (_, again) = order(app, "o-b", "B", "200").await;
    assert_eq!(again["status"], "alreadyRecorded");

    let (status, bad) = order(app, "o-x", "B", "lots").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(bad["error"].is_string());

    let (status, node) = request(app, "GET", "/v1/tree/nodes/R", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(node["leftVolume"], "250");
    assert_eq!(node["rightVolume"], "200");

    let (status, report) = request(app, "POST", "/v1/matching/run", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["payoutsCreated"], 2);

    let (status, payouts) = request(app, "GET", "/v1/payouts?user=R", None).await;
    assert_eq!(status, StatusCode::OK);
    let matching: Vec<&Value> = payouts["payouts"]
        .as_array()
        .unwrap()
        .iter()
        .filter(|p| p["name"] == "Matching Bonus")
        .collect();
    assert_eq!(matching.len(), 2);
    assert!(matching.iter().all(|p| p["amount"] == "500"));

    let (status, wallet) = request(app, "GET", "/v1/wallets/R", None).await;
    assert_eq!(status, StatusCode::OK);
    let balance = wallet["balance"].as_str().unwrap().to_string();

    let (status, body) = request(
        app,
        "POST",
        "/v1/wallets/R/withdraw",
        Some(json!({"amount": "1000000"})),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["error"].is_string());

    let (status, debit) = request(
        app,
        "POST",
        "/v1/wallets/R/withdraw",
        Some(json!({"amount": "100"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(debit["transactionType"], "Debit");

    let uri = format!("/v1/payouts/{}/reconcile", debit["payoutId"].as_str().unwrap());
    let (status, failed) = request(app, "POST", &uri, Some(json!({"status": "Failed"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(failed["status"], "Failed");
    let (status, _) = request(app, "POST", &uri, Some(json!({"status": "Completed"}))).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, wallet) = request(app, "GET", "/v1/wallets/R", None).await;
    assert_eq!(wallet["balance"].as_str().unwrap(), balance);
}

#[tokio::test]
async fn test_cycle_rank_and_verification_endpoints() {
    let test_app = setup_test_app().await;
    let app = &test_app.app;
    let (status, _) = request(
        app,
        "POST",
        "/v1/tree/roots",
        Some(json!({"userId": "C", "activatedDate": "01-01-2024"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, stats) = request(app, "GET", "/v1/cycles/C?today=2024-03-05", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["cycleIndex"], 2);
    assert_eq!(stats["remainingDays"], 56);

    let (status, _) = request(app, "GET", "/v1/cycles/C?today=05-03-2024", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = request(
        app,
        "POST",
        "/v1/tree/roots",
        Some(json!({"userId": "X", "activatedDate": "2024/01/01"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, rank) = request(app, "POST", "/v1/ranks/C/evaluate", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(rank["highest"].is_null());
    let (status, _) = request(app, "GET", "/v1/ranks/ghost", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = request(
        app,
        "PUT",
        "/v1/wallets/C/verification",
        Some(json!({"panVerified": true, "pv": "120", "ifsc": "HDFC0001"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["wallet"]["panVerified"], true);
    assert_eq!(body["wallet"]["pv"], "120");
    assert_eq!(body["released"].as_array().unwrap().len(), 0);

    let (status, body) = request(app, "POST", "/v1/wallets/C/release", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["released"].as_array().unwrap().is_empty());

    let (status, _) = request(app, "POST", "/v1/wallets/ghost/release", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
