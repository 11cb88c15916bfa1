//! HTTP tier: `reqwest` client with exponential backoff and jitter for
//! outbound delivery, `axum` server for inbound receipt (spec §5 "HTTP
//! tier: point-to-point request/response between controller processes").
//! Server wiring grounded on `qc-16-api-gateway::service::ApiGatewayService`
//! (axum router + `tokio::net::TcpListener` + `axum::serve`); jitter
//! grounded on `qc-01-peer-discovery::domain::feeler`'s counter-based jitter.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};
use pdsno_types::catalog::MessageType;
use pdsno_types::Envelope;
use tracing::{info, warn};

use crate::errors::TransportError;
use crate::transport::UnicastTransport;

#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    pub max_attempts: u32,
    pub base_backoff: Duration,
    pub max_backoff: Duration,
    pub deadline: Duration,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_backoff: Duration::from_millis(200),
            max_backoff: Duration::from_secs(10),
            deadline: Duration::from_secs(30),
        }
    }
}

/// Outbound HTTP transport. `peer_bases` maps `controller_id` to the base
/// URL of its inbound envelope endpoint
/// (`POST {base}/message/<message_type_lowercase>`, spec §6).
pub struct HttpTransport {
    client: reqwest::Client,
    config: HttpClientConfig,
    peer_bases: HashMap<String, String>,
    attempt_counter: AtomicU64,
}

impl HttpTransport {
    pub fn new(peer_bases: HashMap<String, String>, config: HttpClientConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
            peer_bases,
            attempt_counter: AtomicU64::new(0),
        }
    }

    fn backoff_for(&self, attempt: u32) -> Duration {
        let exp = self.config.base_backoff * 2u32.saturating_pow(attempt.saturating_sub(1));
        let capped = exp.min(self.config.max_backoff);
        let tick = self.attempt_counter.fetch_add(1, Ordering::Relaxed);
        let jitter_ms = tick % (capped.as_millis().max(1) as u64 / 4 + 1);
        capped + Duration::from_millis(jitter_ms)
    }
}

#[async_trait]
impl UnicastTransport for HttpTransport {
    async fn send(&self, envelope: Envelope) -> Result<(), TransportError> {
        let recipient_id = match &envelope.recipient {
            pdsno_types::envelope::Destination::Controller(id) => id.clone(),
            pdsno_types::envelope::Destination::Topic(topic) => {
                return Err(TransportError::UnknownRecipient(format!(
                    "http transport cannot address topic {topic}"
                )))
            }
        };
        let base = self
            .peer_bases
            .get(&recipient_id)
            .ok_or_else(|| TransportError::UnknownRecipient(recipient_id.clone()))?;
        // Endpoint path is keyed by message type per spec §6
        // ("/message/<message_type_lowercase>"), not by recipient.
        let url = format!("{base}/message/{}", envelope.message_type);

        let deadline = tokio::time::Instant::now() + self.config.deadline;
        let mut last_err = None;
        for attempt in 1..=self.config.max_attempts {
            if tokio::time::Instant::now() >= deadline {
                return Err(TransportError::DeadlineExceeded(self.config.deadline));
            }
            match self.client.post(&url).json(&envelope).send().await {
                Ok(response) if response.status().is_success() => return Ok(()),
                Ok(response) => {
                    let status = response.status().as_u16();
                    warn!(%url, status, attempt, "http transport received non-success status");
                    last_err = Some(TransportError::HttpStatus { status });
                    // 400/401/404 (spec §6) are the recipient's final word on
                    // this exact envelope; retrying resends identical bytes
                    // and can only repeat the same rejection.
                    if matches!(status, 400 | 401 | 404) {
                        break;
                    }
                }
                Err(source) => {
                    warn!(%url, attempt, error = %source, "http transport request failed");
                    last_err = Some(TransportError::Http {
                        attempts: attempt,
                        source,
                    });
                }
            }
            if attempt < self.config.max_attempts {
                tokio::time::sleep(self.backoff_for(attempt)).await;
            }
        }
        Err(last_err.unwrap_or(TransportError::DeadlineExceeded(self.config.deadline)))
    }
}

/// What happened to an envelope the sink accepted, so the HTTP layer can
/// map it to the status codes spec §6 names. Structural/unknown-type
/// rejection happens in the router before a sink ever sees the envelope.
pub enum SinkOutcome {
    /// Processed (authentication, if required, passed). Carries a signed
    /// reply envelope when this message type has a synchronous response;
    /// `None` for types whose reply (if any) is delivered as its own later
    /// envelope over the transport fabric instead (e.g. an async
    /// `DISCOVERY_REPORT_ACK`) rather than in the HTTP response body.
    Processed(Option<Envelope>),
    /// C2 envelope verification failed (spec §6: "an invalid signature
    /// returns 401 with no body").
    AuthenticationFailed,
}

/// Callback invoked for every envelope accepted by the inbound HTTP server,
/// after the router has confirmed `message_type` is a recognized type.
#[async_trait]
pub trait EnvelopeSink: Send + Sync {
    async fn accept(&self, message_type: MessageType, envelope: Envelope) -> SinkOutcome;
}

#[derive(Clone)]
struct ServerState {
    sink: Arc<dyn EnvelopeSink>,
}

pub fn build_router(sink: Arc<dyn EnvelopeSink>) -> Router {
    let state = ServerState { sink };
    Router::new()
        .route("/message/:message_type", post(receive_envelope))
        .route("/health", axum::routing::get(health_check))
        .with_state(state)
}

pub async fn serve(addr: std::net::SocketAddr, sink: Arc<dyn EnvelopeSink>) -> std::io::Result<()> {
    let router = build_router(sink);
    info!(%addr, "starting inbound envelope server");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await
}

/// Dispatch for `POST /message/<message_type_lowercase>` (spec §6). A
/// malformed JSON body is rejected by the `Json<Envelope>` extractor before
/// this runs, with axum's default 400 Bad Request.
async fn receive_envelope(
    State(state): State<ServerState>,
    Path(message_type): Path<String>,
    Json(envelope): Json<Envelope>,
) -> impl IntoResponse {
    let Some(message_type) = MessageType::from_wire_name(&message_type) else {
        return StatusCode::NOT_FOUND.into_response();
    };
    match state.sink.accept(message_type, envelope).await {
        SinkOutcome::Processed(Some(reply)) => (StatusCode::OK, Json(reply)).into_response(),
        SinkOutcome::Processed(None) => StatusCode::OK.into_response(),
        SinkOutcome::AuthenticationFailed => StatusCode::UNAUTHORIZED.into_response(),
    }
}

async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "healthy", "service": "pdsno-c3-transport" }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    struct StubSink {
        outcome_is_auth_failure: bool,
    }

    #[async_trait]
    impl EnvelopeSink for StubSink {
        async fn accept(&self, _message_type: MessageType, _envelope: Envelope) -> SinkOutcome {
            if self.outcome_is_auth_failure {
                SinkOutcome::AuthenticationFailed
            } else {
                SinkOutcome::Processed(None)
            }
        }
    }

    fn sample_envelope_json() -> serde_json::Value {
        serde_json::json!({
            "message_id": "m1",
            "sender_id": "lc_zone_a_1",
            "recipient": { "controller": "rc_zone_a" },
            "message_type": "heartbeat",
            "payload": {},
            "signed_at": "2026-07-30T00:00:00Z",
            "nonce": "n1",
            "signature": "deadbeef"
        })
    }

    #[tokio::test]
    async fn unknown_message_type_path_is_404() {
        let router = build_router(Arc::new(StubSink { outcome_is_auth_failure: false }));
        let response = router
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/message/not_a_real_type")
                    .header("content-type", "application/json")
                    .body(Body::from(sample_envelope_json().to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn malformed_body_is_400() {
        let router = build_router(Arc::new(StubSink { outcome_is_auth_failure: false }));
        let response = router
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/message/heartbeat")
                    .header("content-type", "application/json")
                    .body(Body::from("{ not json"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn failed_authentication_is_401_with_no_body() {
        let router = build_router(Arc::new(StubSink { outcome_is_auth_failure: true }));
        let response = router
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/message/heartbeat")
                    .header("content-type", "application/json")
                    .body(Body::from(sample_envelope_json().to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert!(body.is_empty());
    }

    #[tokio::test]
    async fn recognized_type_and_valid_body_is_200() {
        let router = build_router(Arc::new(StubSink { outcome_is_auth_failure: false }));
        let response = router
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/message/heartbeat")
                    .header("content-type", "application/json")
                    .body(Body::from(sample_envelope_json().to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[test]
    fn backoff_grows_and_is_capped() {
        let transport = HttpTransport::new(HashMap::new(), HttpClientConfig::default());
        let first = transport.backoff_for(1);
        let third = transport.backoff_for(3);
        assert!(third >= first);
        assert!(third <= transport.config.max_backoff + Duration::from_secs(1));
    }

    #[tokio::test]
    async fn unknown_peer_is_rejected_before_any_request() {
        let transport = HttpTransport::new(HashMap::new(), HttpClientConfig::default());
        let envelope = Envelope {
            message_id: "m1".into(),
            sender_id: "gc".into(),
            recipient: pdsno_types::envelope::Destination::Controller("ghost".into()),
            message_type: "heartbeat".into(),
            payload: serde_json::json!({}),
            signed_at: "2026-07-30T00:00:00Z".into(),
            nonce: "n1".into(),
            signature: String::new(),
        };
        assert!(matches!(
            transport.send(envelope).await,
            Err(TransportError::UnknownRecipient(_))
        ));
    }
}
