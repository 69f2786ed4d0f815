//! Hyper service around the presale routes.
//!
//! Each request gets a fresh `CorrelationId`; its completion is logged together
//! with a `request_duration` metric. A panic inside a handler is turned into a
//! 500 response instead of tearing down the connection.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

use futures::{Future, Stream};
use hyper::service::service_fn;
use hyper::{Body, Chunk, Request, Response, Server};
use log::Level;

use engine::engine_state::PresaleEngine;
use shared::logging;
use shared::newtypes::CorrelationId;
use storage::persistence::LedgerPersistence;

use crate::routes;

const METRIC_DURATION_REQUEST: &str = "request_duration";
const TAG_RESPONSE_HTTP: &str = "http_response";

fn log_request(
    correlation_id: CorrelationId,
    request: &Request<Chunk>,
    response: &Response<Body>,
    start: Instant,
) {
    let duration = start.elapsed();
    let status = response.status();
    let level = if status.is_server_error() {
        Level::Error
    } else {
        Level::Info
    };

    let mut properties = BTreeMap::new();
    properties.insert("correlation_id".to_string(), correlation_id.to_string());
    properties.insert("method".to_string(), request.method().to_string());
    properties.insert("path".to_string(), request.uri().path().to_string());
    properties.insert("status".to_string(), status.as_u16().to_string());
    properties.insert(
        "duration_in_seconds".to_string(),
        format!("{:?}", duration.as_secs_f64()),
    );
    logging::log_details(
        level,
        "{method} {path} {status}; correlation_id: {correlation_id}".to_string(),
        properties,
    );

    logging::log_duration(
        correlation_id,
        METRIC_DURATION_REQUEST,
        TAG_RESPONSE_HTTP,
        duration,
    );
}

fn handle<P>(
    engine: Arc<PresaleEngine<P>>,
    request: Request<Body>,
) -> impl Future<Item = Response<Body>, Error = hyper::Error>
where
    P: LedgerPersistence + Send + 'static,
{
    let start = Instant::now();
    let correlation_id = CorrelationId::new();
    let (parts, body) = request.into_parts();

    body.concat2().map(move |chunk| {
        let request = Request::from_parts(parts, chunk);
        let response = panic::catch_unwind(AssertUnwindSafe(|| {
            routes::route(&engine, correlation_id, &request)
        }))
        .unwrap_or_else(|_| {
            logging::log_error(&format!(
                "handler panicked; correlation_id: {}",
                correlation_id
            ));
            routes::internal_error()
        });
        log_request(correlation_id, &request, &response, start);
        response
    })
}

/// Binds a server for `engine` on `addr`.
///
/// Returns the bound address (useful when binding port 0) and the future that
/// serves connections; drive it with `hyper::rt::run`.
pub fn bind<P>(
    engine: Arc<PresaleEngine<P>>,
    addr: &SocketAddr,
) -> Result<(SocketAddr, impl Future<Item = (), Error = ()>), hyper::Error>
where
    P: LedgerPersistence + Send + 'static,
{
    let new_service = move || {
        let engine = Arc::clone(&engine);
        service_fn(move |request| handle(Arc::clone(&engine), request))
    };

    let server = Server::try_bind(addr)?.serve(new_service);
    let local_addr = server.local_addr();
    let server = server.map_err(|error| logging::log_error(&format!("server error: {}", error)));

    Ok((local_addr, server))
}
