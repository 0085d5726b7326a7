//! HTTP server: accept loop, routing, and status mapping.
//!
//! Each accepted connection is served on its own tokio task; all tasks
//! share one [`TranslateService`]. The cache façade lock is the only
//! synchronization between them.

pub mod config;
pub mod handler;
pub mod protocol;

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use http_body_util::{BodyExt, Full};
use hyper::body::{Bytes, Incoming};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::{HermodError, Result};
use crate::sanitize::{sanitize_request_text, truncate_for_log};
use crate::telemetry;
use crate::version;

pub use config::{CacheConfig, Config, OpenAiConfig, Secrets, ServerConfig};
pub use handler::{TranslateService, TranslationSource};
pub use protocol::{ErrorResponse, TranslateRequest, TranslateResponse};

/// Largest accepted request body, in bytes.
const MAX_BODY_BYTES: usize = 64 * 1024;

/// Bind and serve until the token is cancelled.
///
/// In-flight connection tasks are not awaited on shutdown: each request
/// completes its cache reconciliation before its task ends, and the final
/// save happens after the maintainer drains.
pub async fn run(
    addr: SocketAddr,
    service: Arc<TranslateService>,
    shutdown: CancellationToken,
) -> Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "HTTP server listening");

    loop {
        let (stream, peer) = tokio::select! {
            accepted = listener.accept() => accepted?,
            _ = shutdown.cancelled() => break,
        };

        let io = TokioIo::new(stream);
        let service = Arc::clone(&service);
        tokio::spawn(async move {
            let handler = service_fn(move |req| {
                let service = Arc::clone(&service);
                async move { Ok::<_, Infallible>(route(req, service).await) }
            });
            if let Err(e) = http1::Builder::new().serve_connection(io, handler).await {
                debug!(%peer, error = %e, "connection error");
            }
        });
    }

    info!("HTTP server stopped");
    Ok(())
}

async fn route(req: Request<Incoming>, service: Arc<TranslateService>) -> Response<Full<Bytes>> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    match (method, path.as_str()) {
        (Method::GET, "/health") => health_response(),
        (Method::POST, "/translate") => handle_translate(req, service).await,
        _ => json_response(
            StatusCode::NOT_FOUND,
            Bytes::from_static(b"{\"error\":\"Not Found\"}"),
            false,
        ),
    }
}

fn health_response() -> Response<Full<Bytes>> {
    let body = format!(
        "{{\"status\":\"healthy\",\"service\":\"hermod\",\"version\":\"{}\"}}",
        version::PKG_VERSION
    );
    json_response(StatusCode::OK, Bytes::from(body), false)
}

async fn handle_translate(
    req: Request<Incoming>,
    service: Arc<TranslateService>,
) -> Response<Full<Bytes>> {
    let started = Instant::now();

    let body = match req.into_body().collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            warn!(error = %e, "failed to read request body");
            return error_reply(
                StatusCode::BAD_REQUEST,
                "INVALID_REQUEST",
                "failed to read request body",
                None,
                false,
            );
        }
    };
    if body.len() > MAX_BODY_BYTES {
        return error_reply(
            StatusCode::BAD_REQUEST,
            "INVALID_REQUEST",
            "request body too large",
            None,
            false,
        );
    }

    let request: TranslateRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => {
            warn!(error = %e, "malformed request body");
            return error_reply(
                StatusCode::BAD_REQUEST,
                "INVALID_REQUEST",
                format!("malformed JSON body: {e}"),
                None,
                false,
            );
        }
    };

    if let Err(e) = request.validate() {
        warn!(uuid = %request.uuid, error = %e, "request validation failed");
        return error_reply(
            StatusCode::UNPROCESSABLE_ENTITY,
            "VALIDATION_ERROR",
            e.to_string(),
            Some(&request.uuid),
            false,
        );
    }

    let text = sanitize_request_text(&request.text);
    if text.is_empty() {
        return error_reply(
            StatusCode::UNPROCESSABLE_ENTITY,
            "VALIDATION_ERROR",
            "text is empty after sanitization",
            Some(&request.uuid),
            false,
        );
    }

    info!(
        uuid = %request.uuid,
        from = %request.from,
        to = %request.to,
        text = %truncate_for_log(&text, 50),
        "translation request received"
    );

    let response = match service
        .translate(&request.from, &request.to, &text, &request.uuid)
        .await
    {
        Ok((translated, _source)) => {
            metrics::counter!(telemetry::REQUESTS_TOTAL, "status" => "ok").increment(1);
            info!(
                uuid = %request.uuid,
                result = %truncate_for_log(&translated, 50),
                "translation completed"
            );
            let body = serde_json::to_vec(&TranslateResponse {
                timestamp: &request.timestamp,
                uuid: &request.uuid,
                translated_text: &translated,
            })
            .unwrap_or_default();
            json_response(StatusCode::OK, Bytes::from(body), false)
        }
        Err(e) => {
            metrics::counter!(telemetry::REQUESTS_TOTAL, "status" => "error").increment(1);
            error!(uuid = %request.uuid, error = %e, "translation failed");
            let (status, retryable) = upstream_status(&e);
            error_reply(status, "TRANSLATION_ERROR", e.to_string(), Some(&request.uuid), retryable)
        }
    };

    metrics::histogram!(telemetry::REQUEST_DURATION_SECONDS)
        .record(started.elapsed().as_secs_f64());
    response
}

/// Map an upstream failure to a response status and whether a
/// `Retry-After` header applies.
fn upstream_status(err: &HermodError) -> (StatusCode, bool) {
    match err {
        HermodError::Timeout => (StatusCode::GATEWAY_TIMEOUT, false),
        HermodError::RateLimited { .. } => (StatusCode::SERVICE_UNAVAILABLE, true),
        HermodError::Http(_) => (StatusCode::SERVICE_UNAVAILABLE, true),
        HermodError::Api { status, .. } if *status >= 500 => {
            (StatusCode::SERVICE_UNAVAILABLE, true)
        }
        HermodError::Api { .. } | HermodError::EmptyResponse => (StatusCode::BAD_GATEWAY, false),
        _ => (StatusCode::INTERNAL_SERVER_ERROR, false),
    }
}

fn error_reply(
    status: StatusCode,
    code: &str,
    message: impl Into<String>,
    uuid: Option<&str>,
    retryable: bool,
) -> Response<Full<Bytes>> {
    let body =
        serde_json::to_vec(&ErrorResponse::new(code, message, uuid)).unwrap_or_default();
    json_response(status, Bytes::from(body), retryable)
}

fn json_response(status: StatusCode, body: Bytes, retryable: bool) -> Response<Full<Bytes>> {
    let mut builder = Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .header("Access-Control-Allow-Origin", "*");
    if retryable {
        builder = builder.header("Retry-After", "5");
    }
    builder
        .body(Full::new(body))
        .unwrap_or_else(|_| Response::new(Full::new(Bytes::new())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upstream_status_mapping() {
        assert_eq!(
            upstream_status(&HermodError::Timeout).0,
            StatusCode::GATEWAY_TIMEOUT
        );
        assert_eq!(
            upstream_status(&HermodError::RateLimited { retry_after: None }),
            (StatusCode::SERVICE_UNAVAILABLE, true)
        );
        assert_eq!(
            upstream_status(&HermodError::Api {
                status: 502,
                message: String::new()
            }),
            (StatusCode::SERVICE_UNAVAILABLE, true)
        );
        assert_eq!(
            upstream_status(&HermodError::Api {
                status: 401,
                message: String::new()
            }),
            (StatusCode::BAD_GATEWAY, false)
        );
        assert_eq!(
            upstream_status(&HermodError::Cache("x".into())).0,
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn retryable_errors_carry_retry_after() {
        let resp = error_reply(
            StatusCode::SERVICE_UNAVAILABLE,
            "TRANSLATION_ERROR",
            "upstream down",
            Some("u"),
            true,
        );
        assert_eq!(resp.headers().get("Retry-After").unwrap(), "5");

        let resp = error_reply(
            StatusCode::BAD_GATEWAY,
            "TRANSLATION_ERROR",
            "bad key",
            None,
            false,
        );
        assert!(resp.headers().get("Retry-After").is_none());
    }
}
