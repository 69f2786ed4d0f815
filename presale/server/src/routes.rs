//! Maps http requests onto presale engine operations.

use std::borrow::Cow;

use hyper::header::{HeaderValue, ALLOW, CONTENT_TYPE};
use hyper::{Body, Chunk, Method, Request, Response, StatusCode};
use percent_encoding::percent_decode_str;
use serde::Serialize;
use serde_json::json;

use engine::engine_state::request::{
    parse_body, BuyRequest, CanClaimBulkRequest, ClaimRequest, PresaleEndedRequest,
};
use engine::engine_state::response::ClaimOutcome;
use engine::engine_state::{Error, PresaleEngine};
use shared::logging;
use shared::newtypes::CorrelationId;
use shared::utils::jsonify;
use storage::persistence::LedgerPersistence;

pub const ADMIN_SECRET_HEADER: &str = "x-admin-secret";

const CAN_CLAIM_PREFIX: &str = "/can-claim/";
const JSON_CONTENT_TYPE: &str = "application/json";
const CSV_CONTENT_TYPE: &str = "text/csv";

const NOT_FOUND_MSG: &str = "Not found";
const METHOD_NOT_ALLOWED_MSG: &str = "Method not allowed";
const NO_TIERS_MSG: &str = "No tiers configured";
const INTERNAL_ERROR_MSG: &str = "Internal server error";

#[derive(Clone, Debug, PartialEq, Eq)]
enum Route<'a> {
    Buy,
    Status,
    Tiers,
    CurrentTier,
    /// Percent-decoded wallet segment.
    CanClaim(Cow<'a, str>),
    CanClaimBulk,
    Claim,
    Snapshot,
    Export,
    MigrationStatus,
    PresaleEnded,
}

/// Resolves a path to its route and the one method it accepts.
fn resolve(path: &str) -> Option<(Method, Route)> {
    let resolved = match path {
        "/buy" => (Method::POST, Route::Buy),
        "/status" => (Method::GET, Route::Status),
        "/tiers" => (Method::GET, Route::Tiers),
        "/current-tier" => (Method::GET, Route::CurrentTier),
        "/can-claim" => (Method::POST, Route::CanClaimBulk),
        "/claim" => (Method::POST, Route::Claim),
        "/snapshot" => (Method::GET, Route::Snapshot),
        "/export" => (Method::GET, Route::Export),
        "/debug/migration-status" => (Method::GET, Route::MigrationStatus),
        "/admin/presale-ended" => (Method::POST, Route::PresaleEnded),
        _ if path.starts_with(CAN_CLAIM_PREFIX) => {
            let segment = &path[CAN_CLAIM_PREFIX.len()..];
            if segment.is_empty() || segment.contains('/') {
                return None;
            }
            let wallet = percent_decode_str(segment).decode_utf8().ok()?;
            (Method::GET, Route::CanClaim(wallet))
        }
        _ => return None,
    };
    Some(resolved)
}

fn with_content_type(
    status: StatusCode,
    content_type: &'static str,
    body: String,
) -> Response<Body> {
    let mut response = Response::new(Body::from(body));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    response
}

fn json_response<T: Serialize>(status: StatusCode, value: &T) -> Response<Body> {
    with_content_type(status, JSON_CONTENT_TYPE, jsonify(value, false))
}

fn ok<T: Serialize>(value: &T) -> Response<Body> {
    json_response(StatusCode::OK, value)
}

fn error_body(status: StatusCode, message: &str) -> Response<Body> {
    json_response(status, &json!({ "error": message }))
}

pub fn not_found() -> Response<Body> {
    error_body(StatusCode::NOT_FOUND, NOT_FOUND_MSG)
}

pub fn internal_error() -> Response<Body> {
    error_body(StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_ERROR_MSG)
}

pub fn status_code(error: &Error) -> StatusCode {
    if error.is_validation() {
        return StatusCode::BAD_REQUEST;
    }
    match error {
        Error::NothingToClaim(_) => StatusCode::BAD_REQUEST,
        Error::DuplicateSignature(_) => StatusCode::CONFLICT,
        Error::PresaleOngoing => StatusCode::FORBIDDEN,
        Error::Unauthorized => StatusCode::UNAUTHORIZED,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_response(correlation_id: CorrelationId, error: &Error) -> Response<Body> {
    let status = status_code(error);
    if status.is_server_error() {
        logging::log_error(&format!(
            "request failed: {}; correlation_id: {}",
            error, correlation_id
        ));
        return internal_error();
    }
    error_body(status, &error.to_string())
}

fn admin_secret(request: &Request<Chunk>) -> Option<&str> {
    request
        .headers()
        .get(ADMIN_SECRET_HEADER)
        .and_then(|value| value.to_str().ok())
}

fn dispatch<P: LedgerPersistence>(
    engine: &PresaleEngine<P>,
    correlation_id: CorrelationId,
    route: Route,
    request: &Request<Chunk>,
) -> Result<Response<Body>, Error> {
    let body = request.body();
    let response = match route {
        Route::Buy => {
            let buy = parse_body::<BuyRequest>(body)?.validate()?;
            ok(&engine.buy(correlation_id, buy)?)
        }
        Route::Status => ok(&engine.status()?),
        Route::Tiers => ok(&engine.tier_overview()?),
        Route::CurrentTier => match engine.current_tier()? {
            Some(tier) => ok(&tier),
            None => error_body(StatusCode::NOT_FOUND, NO_TIERS_MSG),
        },
        Route::CanClaim(wallet) => ok(&engine.can_claim(&wallet)?),
        Route::CanClaimBulk => {
            let bulk = parse_body::<CanClaimBulkRequest>(body)?;
            ok(&engine.can_claim_bulk(&bulk.wallets)?)
        }
        Route::Claim => {
            let claim = parse_body::<ClaimRequest>(body)?.validate()?;
            engine.claim(correlation_id, claim)?;
            ok(&ClaimOutcome { success: true })
        }
        Route::Snapshot => ok(&engine.snapshot()?),
        Route::Export => {
            with_content_type(StatusCode::OK, CSV_CONTENT_TYPE, engine.export_csv()?)
        }
        Route::MigrationStatus => ok(&engine.migration_status(admin_secret(request))?),
        Route::PresaleEnded => {
            let secret = admin_secret(request);
            engine.check_admin_secret(secret)?;
            let toggle = parse_body::<PresaleEndedRequest>(body)?;
            ok(&engine.set_presale_ended(secret, toggle.ended)?)
        }
    };
    Ok(response)
}

/// Handles one request whose body has already been read in full.
pub fn route<P: LedgerPersistence>(
    engine: &PresaleEngine<P>,
    correlation_id: CorrelationId,
    request: &Request<Chunk>,
) -> Response<Body> {
    let (method, route) = match resolve(request.uri().path()) {
        Some(resolved) => resolved,
        None => return not_found(),
    };

    if *request.method() != method {
        let mut response = error_body(StatusCode::METHOD_NOT_ALLOWED, METHOD_NOT_ALLOWED_MSG);
        if let Ok(allow) = HeaderValue::from_str(method.as_str()) {
            response.headers_mut().insert(ALLOW, allow);
        }
        return response;
    }

    dispatch(engine, correlation_id, route, request)
        .unwrap_or_else(|error| error_response(correlation_id, &error))
}

#[cfg(test)]
mod tests {
    use futures::{Future, Stream};
    use serde_json::Value;

    use engine::engine_state::PresaleSettings;
    use storage::ledger::Ledger;
    use storage::persistence::InMemoryStore;
    use storage::records::Purchase;
    use storage::tier::{Tier, TierTable};

    use super::*;

    const SECRET: &str = "s3cret";

    fn test_engine() -> PresaleEngine<InMemoryStore> {
        engine_over(InMemoryStore::new())
    }

    fn engine_over(store: InMemoryStore) -> PresaleEngine<InMemoryStore> {
        let tiers = TierTable::new(vec![
            Tier {
                tier: 1,
                price_usdc: 0.0003,
                max_tokens: 100,
                duration_days: None,
            },
            Tier {
                tier: 2,
                price_usdc: 0.0004,
                max_tokens: 100,
                duration_days: Some(7),
            },
        ])
        .unwrap();
        let settings = PresaleSettings {
            admin_secret: Some(SECRET.to_string()),
            presale_ended: false,
            ..Default::default()
        };
        PresaleEngine::new(tiers, Ledger::load(store), settings)
    }

    fn call(
        engine: &PresaleEngine<InMemoryStore>,
        method: Method,
        uri: &str,
        secret: Option<&str>,
        body: &str,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder();
        builder.method(method).uri(uri);
        if let Some(secret) = secret {
            builder.header(ADMIN_SECRET_HEADER, secret);
        }
        let request = builder.body(Chunk::from(body.to_string())).unwrap();
        let response = route(engine, CorrelationId::new(), &request);
        let status = response.status();
        let bytes = response.into_body().concat2().wait().unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn buy_body(amount: &str, signature: &str) -> String {
        format!(
            r#"{{"wallet":"w1","amount":{},"token":"USDC","transaction_signature":"{}"}}"#,
            amount, signature
        )
    }

    #[test]
    fn should_resolve_routes() {
        assert_eq!(resolve("/buy"), Some((Method::POST, Route::Buy)));
        assert_eq!(
            resolve("/can-claim/abc"),
            Some((Method::GET, Route::CanClaim("abc".into())))
        );
        assert_eq!(
            resolve("/can-claim/abc%31"),
            Some((Method::GET, Route::CanClaim("abc1".into())))
        );
        assert_eq!(resolve("/can-claim/%FF"), None, "not utf-8 once decoded");
        assert_eq!(resolve("/can-claim"), Some((Method::POST, Route::CanClaimBulk)));
        assert_eq!(resolve("/can-claim/"), None);
        assert_eq!(resolve("/can-claim/a/b"), None);
        assert_eq!(resolve("/nope"), None);
    }

    #[test]
    fn should_map_errors_to_status_codes() {
        assert_eq!(status_code(&Error::InvalidJson), StatusCode::BAD_REQUEST);
        assert_eq!(status_code(&Error::NonPositiveAmount), StatusCode::BAD_REQUEST);
        assert_eq!(
            status_code(&Error::DuplicateSignature("s".to_string())),
            StatusCode::CONFLICT
        );
        assert_eq!(status_code(&Error::PresaleOngoing), StatusCode::FORBIDDEN);
        assert_eq!(
            status_code(&Error::NothingToClaim("w".to_string())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(status_code(&Error::Unauthorized), StatusCode::UNAUTHORIZED);
        assert_eq!(
            status_code(&Error::PoisonError),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn should_buy_and_reject_duplicates() {
        let engine = test_engine();

        let (status, purchase) = call(&engine, Method::POST, "/buy", None, &buy_body("10", "s1"));
        assert_eq!(status, StatusCode::OK);
        assert_eq!(purchase["id"], 1);
        assert_eq!(purchase["tier"], 1);
        assert_eq!(purchase["token"], "USDC");

        let (status, body) = call(&engine, Method::POST, "/buy", None, &buy_body("10", "s1"));
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], "Duplicate transaction signature");
    }

    #[test]
    fn should_reject_bad_buy_bodies() {
        let engine = test_engine();

        let (status, body) = call(&engine, Method::POST, "/buy", None, "not json");
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Invalid JSON");

        let (status, body) = call(&engine, Method::POST, "/buy", None, &buy_body("-5", "s1"));
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Amount must be greater than zero");

        let (status, _) = call(&engine, Method::POST, "/buy", None, r#"{"wallet":"w1"}"#);
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (_, status_body) = call(&engine, Method::GET, "/status", None, "");
        assert_eq!(status_body["totalPurchases"], 0);
    }

    #[test]
    fn should_report_status_and_tiers() {
        let engine = test_engine();
        call(&engine, Method::POST, "/buy", None, &buy_body("100", "s1"));

        let (status, body) = call(&engine, Method::GET, "/status", None, "");
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["raised"], 100.0);
        assert_eq!(body["currentTier"]["tier"], 2);
        assert_eq!(body["presaleEnded"], false);

        let (_, body) = call(&engine, Method::GET, "/tiers", None, "");
        assert_eq!(body["tiers"].as_array().map(Vec::len), Some(2));
        assert_eq!(body["currentTier"]["tier"], 2);

        let (status, body) = call(&engine, Method::GET, "/current-tier", None, "");
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["tier"], 2);
        assert_eq!(body["duration_days"], 7);
    }

    #[test]
    fn should_return_not_found_without_tiers() {
        let engine = PresaleEngine::new(
            TierTable::default(),
            Ledger::load(InMemoryStore::new()),
            PresaleSettings::default(),
        );

        let (status, body) = call(&engine, Method::GET, "/current-tier", None, "");

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], NO_TIERS_MSG);
    }

    #[test]
    fn should_gate_claims() {
        let engine = test_engine();
        call(&engine, Method::POST, "/buy", None, &buy_body("5", "s1"));
        let claim = r#"{"wallet":"w1","transaction_signature":"c1"}"#;

        let (status, body) = call(&engine, Method::POST, "/claim", None, claim);
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"], "Presale has not ended");

        let (status, body) = call(
            &engine,
            Method::POST,
            "/admin/presale-ended",
            Some(SECRET),
            r#"{"ended":true}"#,
        );
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["presaleEnded"], true);

        let (_, body) = call(&engine, Method::GET, "/can-claim/w1", None, "");
        assert_eq!(body["canClaim"], true);
        assert_eq!(body["total"], "5");

        let (status, body) = call(&engine, Method::POST, "/claim", None, claim);
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);

        let (status, body) = call(&engine, Method::POST, "/claim", None, claim);
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Nothing to claim");

        let (_, body) = call(
            &engine,
            Method::POST,
            "/can-claim",
            None,
            r#"{"wallets":["w1","w2"]}"#,
        );
        assert_eq!(body["w1"]["canClaim"], false);
        assert_eq!(body["w2"]["total"], "0");
    }

    #[test]
    fn should_require_admin_secret() {
        let engine = test_engine();

        let (status, body) = call(&engine, Method::GET, "/debug/migration-status", None, "");
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "Unauthorized");

        let (status, _) = call(
            &engine,
            Method::GET,
            "/debug/migration-status",
            Some("wrong"),
            "",
        );
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = call(
            &engine,
            Method::POST,
            "/admin/presale-ended",
            None,
            "garbage",
        );
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, body) = call(
            &engine,
            Method::GET,
            "/debug/migration-status",
            Some(SECRET),
            "",
        );
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["done"], false);
    }

    #[test]
    fn should_reject_unknown_routes_and_methods() {
        let engine = test_engine();

        let (status, body) = call(&engine, Method::GET, "/unknown", None, "");
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Not found");

        let (status, _) = call(&engine, Method::GET, "/buy", None, "");
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    }

    #[test]
    fn should_export_csv() {
        let engine = test_engine();
        call(&engine, Method::POST, "/buy", None, &buy_body("1", "s1"));

        let request = Request::get("/export").body(Chunk::default()).unwrap();
        let response = route(&engine, CorrelationId::new(), &request);

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[CONTENT_TYPE], CSV_CONTENT_TYPE);
        let bytes = response.into_body().concat2().wait().unwrap();
        let csv = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(csv.starts_with("id,wallet,token,amount"));
        assert_eq!(csv.lines().count(), 2);
    }

    #[test]
    fn should_decode_wallet_in_can_claim_path() {
        let engine = test_engine();
        call(&engine, Method::POST, "/buy", None, &buy_body("5", "s1"));
        call(
            &engine,
            Method::POST,
            "/admin/presale-ended",
            Some(SECRET),
            r#"{"ended":true}"#,
        );

        let (status, body) = call(&engine, Method::GET, "/can-claim/w%31", None, "");

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["canClaim"], true);
        assert_eq!(body["total"], "5");
    }

    #[test]
    fn should_report_fractional_totals_exactly() {
        let engine = test_engine();
        for (amount, signature) in &[("57.73", "s1"), ("34.22", "s2"), ("8.05", "s3")] {
            let (status, body) = call(&engine, Method::POST, "/buy", None, &buy_body(amount, signature));
            assert_eq!(status, StatusCode::OK);
            assert_eq!(body["tier"], 1);
        }

        let (_, body) = call(&engine, Method::GET, "/status", None, "");
        assert_eq!(body["raised"], 100.0);
        assert_eq!(body["currentTier"]["tier"], 2);

        call(
            &engine,
            Method::POST,
            "/admin/presale-ended",
            Some(SECRET),
            r#"{"ended":true}"#,
        );
        let (_, body) = call(&engine, Method::GET, "/can-claim/w1", None, "");
        assert_eq!(body["total"], "100");
    }

    #[test]
    fn should_fail_only_the_purchase_when_ids_run_out() {
        let last: Purchase = serde_json::from_value(json!({
            "id": u64::MAX,
            "wallet": "w0",
            "amount": 1,
            "token": "USDC",
            "transaction_signature": "s0",
            "tier": 1,
            "timestamp": "2024-01-01T00:00:00.000Z",
        }))
        .unwrap();
        let engine = engine_over(InMemoryStore::with_records(vec![last], vec![]));

        let (status, body) = call(&engine, Method::POST, "/buy", None, &buy_body("1", "s1"));
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], INTERNAL_ERROR_MSG);

        let (status, body) = call(&engine, Method::GET, "/status", None, "");
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["totalPurchases"], 1);

        let (status, _) = call(&engine, Method::POST, "/buy", None, &buy_body("1", "s2"));
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }
}
