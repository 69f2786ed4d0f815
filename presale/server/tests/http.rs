use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::thread;

use futures::{Future, Stream};
use hyper::header::CONTENT_TYPE;
use hyper::{Body, Client, HeaderMap, Method, Request, StatusCode};
use serde_json::Value;
use tokio::runtime::current_thread;

use engine::engine_state::{PresaleEngine, PresaleSettings};
use server::routes::ADMIN_SECRET_HEADER;
use server::service;
use storage::ledger::Ledger;
use storage::persistence::JsonFileStore;
use storage::tier::TierTable;

const TIERS_JSON: &str = r#"[
    {"tier": 1, "price_usdc": 0.0003, "max_tokens": 100},
    {"tier": 2, "price_usdc": 0.0004, "max_tokens": 100}
]"#;
const ADMIN_SECRET: &str = "integration-secret";

struct TestServer {
    addr: SocketAddr,
}

struct TestResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: String,
}

impl TestResponse {
    fn json(&self) -> Value {
        serde_json::from_str(&self.body).expect("should be json")
    }
}

impl TestServer {
    fn start(data_dir: &Path) -> TestServer {
        let tiers = TierTable::from_json(TIERS_JSON).expect("should parse tiers");
        let store = JsonFileStore::new(data_dir).expect("should open data dir");
        let settings = PresaleSettings {
            spl_address: "SplMint111".to_string(),
            fee_wallet: "FeeWallet111".to_string(),
            admin_secret: Some(ADMIN_SECRET.to_string()),
            presale_ended: false,
        };
        let engine = Arc::new(PresaleEngine::new(tiers, Ledger::load(store), settings));

        let any_port: SocketAddr = ([127, 0, 0, 1], 0).into();
        let (addr, server) = service::bind(engine, &any_port).expect("should bind");
        thread::spawn(move || hyper::rt::run(server));

        TestServer { addr }
    }

    fn send(&self, method: Method, path: &str, secret: Option<&str>, body: &str) -> TestResponse {
        let mut builder = Request::builder();
        builder
            .method(method)
            .uri(format!("http://{}{}", self.addr, path).as_str());
        if let Some(secret) = secret {
            builder.header(ADMIN_SECRET_HEADER, secret);
        }
        let request = builder
            .body(Body::from(body.to_string()))
            .expect("should build request");

        let client = Client::new();
        let future = client.request(request).and_then(|response| {
            let status = response.status();
            let headers = response.headers().clone();
            response.into_body().concat2().map(move |body| TestResponse {
                status,
                headers,
                body: String::from_utf8_lossy(&body).into_owned(),
            })
        });

        let mut runtime = current_thread::Runtime::new().expect("should create runtime");
        runtime.block_on(future).expect("should block on future")
    }

    fn get(&self, path: &str) -> TestResponse {
        self.send(Method::GET, path, None, "")
    }

    fn post(&self, path: &str, body: &str) -> TestResponse {
        self.send(Method::POST, path, None, body)
    }
}

fn buy_body(wallet: &str, amount: &str, signature: &str) -> String {
    format!(
        r#"{{"wallet":"{}","amount":{},"token":"SOL","transaction_signature":"{}"}}"#,
        wallet, amount, signature
    )
}

#[test]
fn should_raise_total_on_valid_purchase_only() {
    let data_dir = tempfile::tempdir().unwrap();
    let server = TestServer::start(data_dir.path());

    let before = server.get("/status").json()["raised"].as_f64().unwrap();

    let rejected = server.post("/buy", &buy_body("w1", "-5", "neg"));
    assert_eq!(rejected.status, StatusCode::BAD_REQUEST);
    assert_eq!(rejected.json()["error"], "Amount must be greater than zero");

    let accepted = server.post("/buy", &buy_body("w1", "12.5", "fresh"));
    assert_eq!(accepted.status, StatusCode::OK);
    assert_eq!(accepted.headers[CONTENT_TYPE], "application/json");
    assert_eq!(accepted.json()["amount"], 12.5);

    let after = server.get("/status").json()["raised"].as_f64().unwrap();
    assert_eq!(after - before, 12.5);
}

#[test]
fn should_store_duplicate_signature_once() {
    let data_dir = tempfile::tempdir().unwrap();
    let server = TestServer::start(data_dir.path());

    assert_eq!(
        server.post("/buy", &buy_body("w1", "1", "dup")).status,
        StatusCode::OK
    );
    let duplicate = server.post("/buy", &buy_body("w2", "2", "dup"));
    assert_eq!(duplicate.status, StatusCode::CONFLICT);
    assert_eq!(duplicate.json()["error"], "Duplicate transaction signature");

    let snapshot = server.get("/snapshot").json();
    assert_eq!(snapshot["purchases"].as_array().map(Vec::len), Some(1));
    assert_eq!(snapshot["raised"], 1.0);
}

#[test]
fn should_protect_migration_status() {
    let data_dir = tempfile::tempdir().unwrap();
    let server = TestServer::start(data_dir.path());

    let anonymous = server.get("/debug/migration-status");
    assert_eq!(anonymous.status, StatusCode::UNAUTHORIZED);
    assert!(anonymous.json().get("done").is_none());

    let wrong = server.send(
        Method::GET,
        "/debug/migration-status",
        Some("guess"),
        "",
    );
    assert_eq!(wrong.status, StatusCode::UNAUTHORIZED);

    let authorized = server.send(
        Method::GET,
        "/debug/migration-status",
        Some(ADMIN_SECRET),
        "",
    );
    assert_eq!(authorized.status, StatusCode::OK);
    assert!(authorized.json()["done"].is_boolean());
}

#[test]
fn should_persist_ledger_across_restarts() {
    let data_dir = tempfile::tempdir().unwrap();
    let first = TestServer::start(data_dir.path());
    first.post("/buy", &buy_body("w1", "100", "s1"));

    let on_disk = fs::read_to_string(data_dir.path().join("purchases.json")).unwrap();
    assert!(on_disk.contains("\"transaction_signature\": \"s1\""));

    let second = TestServer::start(data_dir.path());
    let status = second.get("/status").json();
    assert_eq!(status["raised"], 100.0);
    assert_eq!(status["currentTier"]["tier"], 2);
    assert_eq!(
        second.post("/buy", &buy_body("w1", "1", "s1")).status,
        StatusCode::CONFLICT
    );
}

#[test]
fn should_start_with_empty_ledger_when_file_is_corrupt() {
    let data_dir = tempfile::tempdir().unwrap();
    fs::write(data_dir.path().join("purchases.json"), "{ not json").unwrap();

    let server = TestServer::start(data_dir.path());

    let status = server.get("/status").json();
    assert_eq!(status["totalPurchases"], 0);
    assert_eq!(
        server.post("/buy", &buy_body("w1", "3", "s1")).status,
        StatusCode::OK
    );

    let set_aside = fs::read_to_string(data_dir.path().join("purchases.json.corrupt")).unwrap();
    assert_eq!(set_aside, "{ not json");
    let rewritten = fs::read_to_string(data_dir.path().join("purchases.json")).unwrap();
    assert!(rewritten.contains("\"transaction_signature\": \"s1\""));
}

#[test]
fn should_keep_serving_after_ids_run_out() {
    let data_dir = tempfile::tempdir().unwrap();
    let seeded = format!(
        r#"[{{"id":{},"wallet":"w0","amount":1,"token":"SOL","transaction_signature":"s0",
            "tier":1,"timestamp":"2024-01-01T00:00:00.000Z","claimed":false}}]"#,
        u64::MAX
    );
    fs::write(data_dir.path().join("purchases.json"), seeded).unwrap();
    let server = TestServer::start(data_dir.path());

    let refused = server.post("/buy", &buy_body("w1", "1", "s1"));
    assert_eq!(refused.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(refused.json()["error"], "Internal server error");

    let status = server.get("/status");
    assert_eq!(status.status, StatusCode::OK);
    assert_eq!(status.json()["totalPurchases"], 1);
    assert_eq!(server.get("/can-claim/w0").status, StatusCode::OK);
}

#[test]
fn should_claim_after_admin_ends_presale() {
    let data_dir = tempfile::tempdir().unwrap();
    let server = TestServer::start(data_dir.path());
    server.post("/buy", &buy_body("w1", "4", "s1"));
    let claim = r#"{"wallet":"w1","transaction_signature":"claim-1"}"#;

    assert_eq!(server.post("/claim", claim).status, StatusCode::FORBIDDEN);

    let toggled = server.send(
        Method::POST,
        "/admin/presale-ended",
        Some(ADMIN_SECRET),
        r#"{"ended":true}"#,
    );
    assert_eq!(toggled.status, StatusCode::OK);
    assert_eq!(toggled.json()["presaleEnded"], true);

    let eligibility = server.get("/can-claim/w1").json();
    assert_eq!(eligibility["canClaim"], true);
    assert_eq!(eligibility["total"], "4");

    let claimed = server.post("/claim", claim);
    assert_eq!(claimed.status, StatusCode::OK);
    assert_eq!(claimed.json()["success"], true);

    let again = server.post("/claim", claim);
    assert_eq!(again.status, StatusCode::BAD_REQUEST);
    assert_eq!(again.json()["error"], "Nothing to claim");

    let on_disk = fs::read_to_string(data_dir.path().join("claims.json")).unwrap();
    assert!(on_disk.contains("claim-1"));
}

#[test]
fn should_serve_tiers_and_export() {
    let data_dir = tempfile::tempdir().unwrap();
    let server = TestServer::start(data_dir.path());
    server.post("/buy", &buy_body("w1", "99", "s1"));

    let tiers = server.get("/tiers").json();
    assert_eq!(tiers["tiers"].as_array().map(Vec::len), Some(2));
    assert_eq!(tiers["currentTier"]["tier"], 1);
    assert_eq!(server.get("/current-tier").json()["tier"], 1);

    let export = server.get("/export");
    assert_eq!(export.status, StatusCode::OK);
    assert_eq!(export.headers[CONTENT_TYPE], "text/csv");
    let mut lines = export.body.lines();
    assert_eq!(
        lines.next(),
        Some("id,wallet,token,amount,transaction_signature,tier,timestamp,claimed")
    );
    assert!(lines.next().unwrap().starts_with("1,w1,SOL,99,s1,1,"));
}

#[test]
fn should_answer_unknown_paths_with_not_found() {
    let data_dir = tempfile::tempdir().unwrap();
    let server = TestServer::start(data_dir.path());

    let missing = server.get("/does-not-exist");
    assert_eq!(missing.status, StatusCode::NOT_FOUND);
    assert_eq!(missing.json()["error"], "Not found");

    assert_eq!(
        server.get("/buy").status,
        StatusCode::METHOD_NOT_ALLOWED
    );
}
