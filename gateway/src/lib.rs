//! The inbound HTTP surface.
//!
//! One route, two modes: `POST /` runs the full assistant cycle for the
//! `title` field of a JSON body, `GET /` answers a single-turn completion for
//! a `message` query parameter. The gateway validates the caller, parses the
//! body, and bounds the wall-clock time of the whole exchange; everything
//! provider-related happens behind the `RequestHandler` seam.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use axum::Router;
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;
use tracing::*;

use completion::RequestHandler;

/// Substring the caller's User-Agent must contain.
pub const USER_AGENT_MARKER: &str = "Kairos";

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(45);

#[derive(Clone, Debug)]
pub struct GatewayConfig {
    pub user_agent_marker: String,
    /// Overall wall-clock bound for one request, provider interaction
    /// included.
    pub request_timeout: Duration,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        GatewayConfig {
            user_agent_marker: USER_AGENT_MARKER.to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

#[derive(Clone)]
struct AppState {
    handler: Arc<dyn RequestHandler>,
    config: Arc<GatewayConfig>,
}

pub fn router(handler: Arc<dyn RequestHandler>, config: GatewayConfig) -> Router {
    Router::new()
        .route(
            "/",
            get(single_turn)
                .post(assistant_run)
                .fallback(method_not_allowed),
        )
        .with_state(AppState {
            handler,
            config: Arc::new(config),
        })
}

/// Binds `addr` and serves until Ctrl-C.
pub async fn serve(
    addr: &str,
    handler: Arc<dyn RequestHandler>,
    config: GatewayConfig,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Listening on {}", listener.local_addr()?);
    axum::serve(listener, router(handler, config))
        .with_graceful_shutdown(async {
            let _signal_err = tokio::signal::ctrl_c().await;
            info!("Received Ctrl-C, shutting down.");
        })
        .await?;
    Ok(())
}

#[derive(Deserialize, Debug, Default)]
struct AssistantRunBody {
    #[serde(default)]
    title: String,
}

#[derive(Deserialize, Debug)]
struct SingleTurnQuery {
    #[serde(default)]
    message: String,
}

#[derive(Serialize, Debug)]
struct ResponseBody {
    response: String,
}

/// Plain-text 405 for anything other than GET/POST on the root route, in
/// place of axum's empty-body default.
async fn method_not_allowed() -> Response {
    (StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed").into_response()
}

fn caller_allowed(headers: &HeaderMap, marker: &str) -> bool {
    headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ua| ua.contains(marker))
}

async fn assistant_run(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    info!("Request received: POST /");

    if !caller_allowed(&headers, &state.config.user_agent_marker) {
        warn!("Rejected caller without the expected User-Agent marker");
        return (StatusCode::FORBIDDEN, "Forbidden").into_response();
    }

    // Parse the body by hand so a bad payload answers 400 before anything
    // touches the provider.
    let data: AssistantRunBody = match serde_json::from_slice(&body) {
        Ok(data) => data,
        Err(e) => {
            warn!("Invalid JSON body: {}", e);
            return (StatusCode::BAD_REQUEST, "Invalid JSON").into_response();
        }
    };
    info!("Received request: {:?}", data);

    let (tx, rx) = oneshot::channel();
    state.handler.answer_request(&data.title, tx);

    match tokio::time::timeout(state.config.request_timeout, rx).await {
        Ok(Ok(response)) => Json(ResponseBody { response }).into_response(),
        Ok(Err(_)) => {
            // The worker dropped its sender without answering.
            error!("Worker dropped the response channel");
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response()
        }
        Err(_) => {
            error!(
                "No answer after {:?}, abandoning the in-flight run",
                state.config.request_timeout
            );
            (StatusCode::GATEWAY_TIMEOUT, "Request timed out.").into_response()
        }
    }
}

async fn single_turn(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<SingleTurnQuery>,
) -> Response {
    info!("Request received: GET /");

    if !caller_allowed(&headers, &state.config.user_agent_marker) {
        warn!("Rejected caller without the expected User-Agent marker");
        return (StatusCode::FORBIDDEN, "Forbidden").into_response();
    }

    let (tx, rx) = oneshot::channel();
    state.handler.single_completion(&query.message, tx);

    match tokio::time::timeout(state.config.request_timeout, rx).await {
        Ok(Ok(Ok(response))) => Json(ResponseBody { response }).into_response(),
        Ok(Ok(Err(e))) => {
            error!("single_completion failed: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response()
        }
        Ok(Err(_)) => {
            error!("Worker dropped the response channel");
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response()
        }
        Err(_) => {
            error!(
                "No answer after {:?}, abandoning the in-flight completion",
                state.config.request_timeout
            );
            (StatusCode::GATEWAY_TIMEOUT, "Request timed out.").into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::error::Error;
    use std::sync::atomic::{AtomicBool, Ordering};

    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tokio::sync::oneshot::Sender;
    use tower::ServiceExt;

    /// Echoes the prompt back, or stays silent forever when `answer` is
    /// false. Records whether it was invoked at all.
    struct EchoHandler {
        answer: bool,
        invoked: Arc<AtomicBool>,
    }

    impl EchoHandler {
        fn new(answer: bool) -> (Self, Arc<AtomicBool>) {
            let invoked = Arc::new(AtomicBool::new(false));
            (
                EchoHandler {
                    answer,
                    invoked: invoked.clone(),
                },
                invoked,
            )
        }
    }

    impl RequestHandler for EchoHandler {
        fn answer_request(&self, prompt: &str, result: Sender<String>) {
            self.invoked.store(true, Ordering::SeqCst);
            if self.answer {
                let _ = result.send(prompt.to_string());
            } else {
                // keep the sender alive so the gateway times out instead of
                // seeing a dropped channel
                tokio::spawn(async move {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    drop(result);
                });
            }
        }

        fn single_completion(
            &self,
            message: &str,
            result: Sender<Result<String, Box<dyn Error + Send + Sync>>>,
        ) {
            self.invoked.store(true, Ordering::SeqCst);
            let r = if self.answer {
                Ok(format!("{} indeed", message))
            } else {
                Err("provider exploded".into())
            };
            let _ = result.send(r);
        }
    }

    fn app(answer: bool, timeout: Duration) -> (Router, Arc<AtomicBool>) {
        let (handler, invoked) = EchoHandler::new(answer);
        let config = GatewayConfig {
            user_agent_marker: USER_AGENT_MARKER.to_string(),
            request_timeout: timeout,
        };
        (router(Arc::new(handler), config), invoked)
    }

    fn post(body: &str, user_agent: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/")
            .header(header::USER_AGENT, user_agent)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn round_trips_the_prompt() {
        let (app, _) = app(true, Duration::from_secs(5));
        let response = app
            .oneshot(post(r#"{"title":"plan my week"}"#, "Kairos/1.0"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["response"], "plan my week");
    }

    #[tokio::test]
    async fn missing_title_defaults_to_empty_prompt() {
        let (app, _) = app(true, Duration::from_secs(5));
        let response = app.oneshot(post("{}", "Kairos/1.0")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["response"], "");
    }

    #[tokio::test]
    async fn invalid_json_never_reaches_the_handler() {
        let (app, invoked) = app(true, Duration::from_secs(5));
        let response = app.oneshot(post("{not json", "Kairos/1.0")).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(!invoked.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn wrong_user_agent_never_reaches_the_handler() {
        let (app, invoked) = app(true, Duration::from_secs(5));
        let response = app
            .oneshot(post(r#"{"title":"x"}"#, "curl/8.0"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert!(!invoked.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn missing_user_agent_is_forbidden() {
        let (app, invoked) = app(true, Duration::from_secs(5));
        let request = Request::builder()
            .method("POST")
            .uri("/")
            .body(Body::from(r#"{"title":"x"}"#))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert!(!invoked.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn unsupported_method_is_rejected() {
        let (app, _) = app(true, Duration::from_secs(5));
        let request = Request::builder()
            .method("DELETE")
            .uri("/")
            .header(header::USER_AGENT, "Kairos/1.0")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"Method Not Allowed");
    }

    #[tokio::test]
    async fn silent_worker_times_out_with_504() {
        let (app, invoked) = app(false, Duration::from_millis(50));
        let response = app
            .oneshot(post(r#"{"title":"x"}"#, "Kairos/1.0"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
        assert!(invoked.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn single_turn_answers_in_the_same_envelope() {
        let (app, _) = app(true, Duration::from_secs(5));
        let request = Request::builder()
            .method("GET")
            .uri("/?message=hello")
            .header(header::USER_AGENT, "Kairos/1.0")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["response"], "hello indeed");
    }

    #[tokio::test]
    async fn single_turn_failure_is_redacted() {
        let (app, _) = app(false, Duration::from_secs(5));
        let request = Request::builder()
            .method("GET")
            .uri("/?message=hello")
            .header(header::USER_AGENT, "Kairos/1.0")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"Internal server error");
    }
}
