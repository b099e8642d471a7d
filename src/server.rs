use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, Request, State};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use base64::prelude::*;
use http::header::AUTHORIZATION;
use http::{HeaderMap, StatusCode};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::classify::{ServerErrorsAsFailures, SharedClassifier};
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::{error, info, warn, Level};

use crate::config::{Config, Credentials};
use crate::events::{self, DecodeError};
use crate::sink::DynMetricSink;
use crate::submit::{SubmissionError, Submitter};

const IDENTIFIER: &str = concat!(env!("CARGO_PKG_NAME"), " ", env!("CARGO_PKG_VERSION"));

/// Upper bound for a `/webhook` body. SendGrid posts batches of a few
/// thousand events, well under this.
pub const MAX_WEBHOOK_BODY_SIZE: usize = 32 * 1024 * 1024;

/// Everything a request handler needs, built once at startup.
#[derive(Clone)]
pub struct AppState {
    pub sink: DynMetricSink,
    pub metric_prefix: Arc<str>,
    pub sample_rate: f64,
    pub credentials: Option<Arc<Credentials>>,
}

impl AppState {
    pub fn new(config: &Config, sink: DynMetricSink) -> Self {
        AppState {
            sink,
            metric_prefix: config.metric_prefix.as_str().into(),
            sample_rate: config.sample_rate,
            credentials: config.credentials().map(Arc::new),
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum WebhookError {
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    Submission(#[from] SubmissionError),
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        let status = match &self {
            WebhookError::Decode(_) => StatusCode::BAD_REQUEST,
            WebhookError::Submission(_) => StatusCode::BAD_GATEWAY,
        };
        (status, self.to_string()).into_response()
    }
}

pub fn router(state: AppState) -> Router {
    let webhook_route = post(webhook)
        .route_layer(DefaultBodyLimit::max(MAX_WEBHOOK_BODY_SIZE))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_basic_auth,
        ));

    Router::new()
        .route("/", get(root))
        .route("/ping", get(ping))
        .route("/webhook", webhook_route)
        .layer(trace_http_layer())
        .with_state(state)
}

/// Request logging: one span and one response line per request.
fn trace_http_layer() -> TraceLayer<SharedClassifier<ServerErrorsAsFailures>> {
    TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_response(DefaultOnResponse::new().level(Level::INFO))
}

/// Binds the listener and serves until ctrl-c.
pub async fn serve(config: &Config, sink: DynMetricSink) -> Result<(), std::io::Error> {
    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(
        %addr,
        basic_auth = config.credentials().is_some(),
        prefix = %config.metric_prefix,
        "server started"
    );

    axum::serve(listener, router(AppState::new(config, sink)))
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        error!(%error, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}

async fn root() -> &'static str {
    IDENTIFIER
}

async fn ping() -> &'static str {
    "pong"
}

async fn webhook(State(state): State<AppState>, body: Bytes) -> Result<(), WebhookError> {
    let batch = events::decode(&body).map_err(|e| {
        warn!(error = %e, "failed to decode webhook payload");
        e
    })?;

    Submitter::new(state.sink.as_ref(), &state.metric_prefix, state.sample_rate)
        .submit(&batch)
        .map_err(|e| {
            error!(
                error = %e,
                index = e.index,
                event = %e.event,
                sg_event_id = %e.sg_event_id,
                "failed to submit webhook events"
            );
            e
        })?;

    info!(events = batch.len(), "webhook events submitted");
    Ok(())
}

// runs before the body is read
async fn require_basic_auth(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    if let Some(expected) = &state.credentials {
        let authorized = basic_auth(request.headers())
            .is_some_and(|(user, pass)| user == expected.username && pass == expected.password);
        if !authorized {
            warn!("rejecting webhook request with missing or invalid credentials");
            return (StatusCode::UNAUTHORIZED, "Unauthorized").into_response();
        }
    }

    next.run(request).await
}

/// Parses an `Authorization: Basic <base64(user:pass)>` header.
fn basic_auth(headers: &HeaderMap) -> Option<(String, String)> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, encoded) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }

    let decoded = BASE64_STANDARD.decode(encoded.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (user, pass) = decoded.split_once(':')?;
    Some((user.to_string(), pass.to_string()))
}

#[cfg(test)]
mod test {
    use super::*;
    use http::HeaderValue;

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn test_basic_auth_parsing() {
        let encoded = BASE64_STANDARD.encode("sendgrid:pa:ss");
        assert_eq!(
            basic_auth(&headers(&format!("Basic {}", encoded))),
            Some(("sendgrid".to_string(), "pa:ss".to_string()))
        );
        assert_eq!(
            basic_auth(&headers(&format!("basic {}", encoded))),
            Some(("sendgrid".to_string(), "pa:ss".to_string()))
        );
    }

    #[test]
    fn test_basic_auth_rejects_malformed() {
        assert_eq!(basic_auth(&HeaderMap::new()), None);
        assert_eq!(basic_auth(&headers("Bearer abc")), None);
        assert_eq!(basic_auth(&headers("Basic not base64!")), None);
        let no_colon = BASE64_STANDARD.encode("sendgrid");
        assert_eq!(basic_auth(&headers(&format!("Basic {}", no_colon))), None);
    }
}
