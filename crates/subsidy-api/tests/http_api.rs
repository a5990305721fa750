//! # HTTP API Tests
//!
//! Exercises the full router (middleware included) against the in-memory
//! ledger: success envelopes, request validation, and the status code chosen
//! for each error category.

use std::io::Write;
use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use ledger_gateway::adapters::SUBSIDY_POOL_ABI;
use ledger_gateway::domain::{parse_address, to_native, Address, EventKind};
use ledger_gateway::{ConnectionManager, InMemoryConnector, InMemoryLedger, InitOutcome, LedgerSettings};
use serde_json::{json, Value};
use subsidy_api::{build_router, ApiConfig};
use tempfile::NamedTempFile;
use tower::ServiceExt;

const SIGNER_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
const SIGNER: &str = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266";
const CONTRACT: &str = "0x5FbDB2315678afecb367f032d93F642f64180aa3";
const USER: &str = "0x70997970C51812dc3A010C7d01b50e0d17dc79C8";

struct TestApp {
    router: Router,
    ledger: Arc<InMemoryLedger>,
    _artifact: NamedTempFile,
}

fn addr(text: &str) -> Address {
    parse_address(text).unwrap()
}

fn app_with_owner(owner: &str, initialize: bool) -> TestApp {
    let mut artifact = NamedTempFile::new().unwrap();
    write!(artifact, r#"{{"abi":{}}}"#, SUBSIDY_POOL_ABI).unwrap();

    let ledger = Arc::new(InMemoryLedger::new(addr(CONTRACT), addr(owner)));
    let connections = Arc::new(ConnectionManager::new(Arc::new(InMemoryConnector::new(
        ledger.clone(),
    ))));

    let mut config = ApiConfig::default();
    config.ledger = LedgerSettings {
        private_key: Some(SIGNER_KEY.into()),
        contract_address: Some(CONTRACT.into()),
        artifact_path: Some(artifact.path().to_path_buf()),
        poll_interval_ms: 5,
        ..LedgerSettings::default()
    };
    if initialize {
        assert_eq!(connections.initialize(&config.ledger), InitOutcome::Ready);
    }

    TestApp {
        router: build_router(&config, connections),
        ledger,
        _artifact: artifact,
    }
}

fn app() -> TestApp {
    app_with_owner(SIGNER, true)
}

async fn send(router: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

async fn get(router: &Router, uri: &str) -> (StatusCode, Value) {
    send(router, Method::GET, uri, None).await
}

async fn post(router: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
    send(router, Method::POST, uri, Some(body)).await
}

#[tokio::test]
async fn test_health_reports_ledger_state() {
    let app = app();
    let (status, body) = get(&app.router, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "OK");
    assert_eq!(body["ledger"]["ready"], true);
    assert_eq!(body["ledger"]["state"], "ready");
    assert!(body["timestamp"].is_string());

    let idle = app_with_owner(SIGNER, false);
    let (status, body) = get(&idle.router, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ledger"]["ready"], false);
    assert_eq!(body["ledger"]["state"], "uninitialized");
}

#[tokio::test]
async fn test_root_and_unknown_endpoint() {
    let app = app();
    let (status, body) = get(&app.router, "/").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["endpoints"]["subsidy"], "/api/subsidy");

    let (status, body) = get(&app.router, "/api/nope?x=1").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Endpoint not found");
    assert_eq!(body["message"], "The endpoint /api/nope?x=1 does not exist");
}

#[tokio::test]
async fn test_fund_add_and_read_balances() {
    let app = app();

    let (status, body) = post(&app.router, "/api/subsidy/fund-pool", json!({"amount": 2})).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["success"], true);
    assert_eq!(body["message"], "Pool funded successfully");
    assert_eq!(body["data"]["amount"], "2.0");
    assert_eq!(body["data"]["amountWei"], "2000000000000000000");
    assert!(body["data"]["transactionHash"].as_str().unwrap().starts_with("0x"));

    let (status, body) = post(
        &app.router,
        "/api/subsidy/add",
        json!({"userAddress": USER, "amount": "0.5"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["message"], "Subsidy added successfully");
    assert_eq!(body["data"]["userAddress"], USER);
    assert_eq!(body["data"]["amountWei"], "500000000000000000");

    let (status, body) = get(&app.router, &format!("/api/subsidy/balance/{USER}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["balance"], "0.5");

    let (_, body) = get(&app.router, "/api/subsidy/pool-balance").await;
    assert_eq!(body["data"]["poolBalance"], "1.5");
    assert_eq!(body["data"]["poolBalanceWei"], "1500000000000000000");
}

#[tokio::test]
async fn test_add_validation() {
    let app = app();

    let (status, body) = post(&app.router, "/api/subsidy/add", json!({"amount": "1"})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Missing required fields");

    let (status, body) = post(
        &app.router,
        "/api/subsidy/add",
        json!({"userAddress": "0xdead", "amount": "1"}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid address");

    let (status, body) = post(
        &app.router,
        "/api/subsidy/add",
        json!({"userAddress": USER, "amount": "-3"}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid amount");
    assert_eq!(body["message"], "Amount must be a positive number");

    let (status, body) = post(&app.router, "/api/subsidy/fund-pool", json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "amount is required");
    assert_eq!(app.ledger.submitted_count(), 0);
}

#[tokio::test]
async fn test_malformed_json_is_bad_request() {
    let app = app();
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/subsidy/fund-pool")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_non_owner_is_forbidden() {
    let app = app_with_owner(USER, true);
    app.ledger.seed_pool(to_native("1").unwrap());

    let (status, body) = post(
        &app.router,
        "/api/subsidy/add",
        json!({"userAddress": USER, "amount": "1"}),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "Access denied");
    assert_eq!(body["message"], "Only contract owner can add subsidies");

    let (status, _) = post(&app.router, "/api/contract/withdraw-remaining", json!({})).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(app.ledger.submitted_count(), 0);
}

#[tokio::test]
async fn test_nothing_to_withdraw() {
    let app = app();

    let (status, body) = post(&app.router, "/api/subsidy/withdraw", json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "No subsidy available");
    assert_eq!(body["message"], "No subsidy balance to withdraw");

    let (status, body) = post(&app.router, "/api/contract/withdraw-remaining", json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "No funds to withdraw");
    assert_eq!(app.ledger.submitted_count(), 0);
}

#[tokio::test]
async fn test_withdrawals_succeed() {
    let app = app();
    app.ledger.credit_subsidy(addr(SIGNER), to_native("1.25").unwrap());

    let (status, body) = post(&app.router, "/api/subsidy/withdraw", json!({})).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["message"], "Subsidy withdrawn successfully");
    assert_eq!(body["data"]["amount"], "1.25");

    app.ledger.seed_pool(to_native("3").unwrap());
    let (status, body) = post(&app.router, "/api/contract/withdraw-remaining", json!({})).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["message"], "Remaining funds withdrawn successfully");
    assert_eq!(body["data"]["amount"], "3.0");
}

#[tokio::test]
async fn test_contract_reads() {
    let app = app();
    app.ledger.seed_pool(to_native("2").unwrap());

    let (status, body) = get(&app.router, "/api/contract/info").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["contractAddress"], CONTRACT);
    assert_eq!(body["data"]["owner"], SIGNER);
    assert_eq!(body["data"]["totalSubsidyPool"], "2.0");
    assert_eq!(body["data"]["contractBalanceWei"], "2000000000000000000");
    assert_eq!(body["data"]["network"], "localhost");

    let (_, body) = get(&app.router, "/api/contract/owner").await;
    assert_eq!(body["data"]["owner"], SIGNER);

    let lower = SIGNER.to_lowercase();
    let (status, body) = get(&app.router, &format!("/api/contract/is-owner/{lower}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["isOwner"], true);
    assert_eq!(body["data"]["address"], lower);
    assert_eq!(body["data"]["owner"], SIGNER);

    let (_, body) = get(&app.router, &format!("/api/contract/is-owner/{USER}")).await;
    assert_eq!(body["data"]["isOwner"], false);

    let (status, body) = get(&app.router, "/api/contract/is-owner/0x12").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid address");
}

#[tokio::test]
async fn test_events_endpoint() {
    let app = app();
    let user = addr(USER);
    let amount = to_native("1").unwrap();
    app.ledger.push_event(EventKind::SubsidyAdded, user, amount, 5);
    app.ledger.push_event(EventKind::SubsidyWithdrawn, user, amount, 3);
    app.ledger.push_event(EventKind::SubsidyPoolFunded, addr(SIGNER), amount, 7);
    app.ledger.push_event(EventKind::SubsidyAdded, user, amount, 1);

    let (status, body) = get(&app.router, "/api/contract/events?fromBlock=0&toBlock=latest&limit=2").await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["totalEvents"], 2);
    assert_eq!(body["data"]["events"][0]["blockNumber"], 7);
    assert_eq!(body["data"]["events"][0]["type"], "SubsidyPoolFunded");
    assert_eq!(body["data"]["events"][1]["blockNumber"], 5);
    assert!(body["data"]["events"][0]["timestamp"].is_null());

    let (status, body) = get(&app.router, "/api/contract/events?fromBlock=tomorrow").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid block range");

    let (status, _) = get(&app.router, "/api/contract/events?limit=many").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_transaction_status_endpoint() {
    let app = app();

    let (status, body) = get(&app.router, "/api/contract/transaction/0x1234").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid transaction hash");

    let missing = format!("0x{}", "cd".repeat(32));
    let (status, body) = get(&app.router, &format!("/api/contract/transaction/{missing}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Transaction not found");
    assert_eq!(body["message"], "Transaction hash not found on the blockchain");

    let (_, funded) = post(&app.router, "/api/subsidy/fund-pool", json!({"amount": "1"})).await;
    let hash = funded["data"]["transactionHash"].as_str().unwrap().to_string();
    let (status, body) = get(&app.router, &format!("/api/contract/transaction/{hash}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "success");
    assert_eq!(body["data"]["from"], SIGNER);
    assert!(body["data"]["timestamp"].is_u64());
}

#[tokio::test]
async fn test_ledger_routes_unavailable_without_connection() {
    let app = app_with_owner(SIGNER, false);

    let (status, body) = get(&app.router, "/api/subsidy/pool-balance").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["message"], "Blockchain connection not available");

    let (status, _) = post(&app.router, "/api/subsidy/fund-pool", json!({"amount": "1"})).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

    let (status, _) = get(&app.router, "/api/contract/info").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_reverted_transaction_is_server_error() {
    let app = app();
    // Empty pool: the contract rejects the grant
    let (status, body) = post(
        &app.router,
        "/api/subsidy/add",
        json!({"userAddress": USER, "amount": "1"}),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Failed to add subsidy");
}
