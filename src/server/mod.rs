//! HTTP front end for the bot.
//!
//! # Endpoints
//!
//! - `POST /webhook` - Accepts GitHub webhook deliveries (returns 202 Accepted)
//! - `GET /health` - Returns 200 if the server is running
//!
//! Deliveries are authenticated and parsed on the request path. Acting on
//! them happens in the background, so GitHub gets its answer before any
//! API calls or git work begin.

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};

use crate::bot::{MergeBot, MergeEngine};
use crate::github::HostingClient;
use crate::permissions::PermissionResolver;
use crate::webhooks::{GitHubEvent, WebhookSecret};

pub mod health;
pub mod webhook;

pub use health::health_handler;
pub use webhook::{WebhookError, webhook_handler};

/// Receives events that passed authentication and parsing.
pub trait EventSink: Send + Sync + 'static {
    /// Hands `event` off for processing. Must not block.
    fn dispatch(&self, event: GitHubEvent);
}

impl<H, P, E> EventSink for MergeBot<H, P, E>
where
    H: HostingClient,
    P: PermissionResolver,
    E: MergeEngine,
{
    fn dispatch(&self, event: GitHubEvent) {
        MergeBot::dispatch(self, event);
    }
}

/// Shared application state, passed to handlers via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    sink: Arc<dyn EventSink>,
    secret: WebhookSecret,
}

impl AppState {
    pub fn new(sink: Arc<dyn EventSink>, secret: WebhookSecret) -> Self {
        AppState {
            inner: Arc::new(AppStateInner { sink, secret }),
        }
    }

    pub fn sink(&self) -> &dyn EventSink {
        self.inner.sink.as_ref()
    }

    pub fn webhook_secret(&self) -> &WebhookSecret {
        &self.inner.secret
    }
}

/// Builds the Axum router with all endpoints.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/webhook", post(webhook_handler))
        .route("/health", get(health_handler))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use std::sync::Mutex;
    use tower::ServiceExt;

    use crate::types::PrNumber;

    #[derive(Default)]
    struct RecordingSink {
        events: Mutex<Vec<GitHubEvent>>,
    }

    impl EventSink for RecordingSink {
        fn dispatch(&self, event: GitHubEvent) {
            self.events.lock().unwrap().push(event);
        }
    }

    impl RecordingSink {
        fn count(&self) -> usize {
            self.events.lock().unwrap().len()
        }
    }

    const SECRET: &str = "test-secret";

    fn app() -> (Router, Arc<RecordingSink>) {
        let sink = Arc::new(RecordingSink::default());
        let state = AppState::new(sink.clone(), WebhookSecret::new(SECRET));
        (build_router(state), sink)
    }

    fn comment_payload() -> Vec<u8> {
        serde_json::to_vec(&serde_json::json!({
            "action": "created",
            "comment": { "body": "@merge-bot merge", "user": { "login": "octocat" } },
            "issue": { "number": 42, "pull_request": { "url": "https://api.github.com/repos/o/r/pulls/42" } },
            "repository": { "owner": { "login": "o" }, "name": "r" }
        }))
        .unwrap()
    }

    fn webhook_request(secret: &str, event_type: Option<&str>, body: Vec<u8>) -> Request<Body> {
        let signature = WebhookSecret::new(secret).sign(&body);
        let mut builder = Request::builder()
            .method("POST")
            .uri("/webhook")
            .header("content-type", "application/json")
            .header("x-github-delivery", "72d3162e-cc78-11e3-81ab-4c9367dc0958")
            .header("x-hub-signature-256", signature);
        if let Some(event_type) = event_type {
            builder = builder.header("x-github-event", event_type);
        }
        builder.body(Body::from(body)).unwrap()
    }

    async fn body_text(response: axum::response::Response) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    // ─── Health endpoint tests ───

    #[tokio::test]
    async fn health_returns_200() {
        let (app, _) = app();

        let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "OK");
    }

    // ─── Webhook endpoint tests ───

    #[tokio::test]
    async fn webhook_valid_comment_is_dispatched() {
        let (app, sink) = app();

        let response = app
            .oneshot(webhook_request(SECRET, Some("issue_comment"), comment_payload()))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::ACCEPTED);
        let events = sink.events.lock().unwrap();
        assert_eq!(events.len(), 1);
        let GitHubEvent::IssueComment(comment) = &events[0] else {
            panic!("expected IssueComment");
        };
        assert_eq!(comment.pr_number, Some(PrNumber(42)));
        assert_eq!(comment.author_login, "octocat");
    }

    #[tokio::test]
    async fn webhook_invalid_signature_returns_401() {
        let (app, sink) = app();

        let response = app
            .oneshot(webhook_request("wrong-secret", Some("issue_comment"), comment_payload()))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(sink.count(), 0);
    }

    #[tokio::test]
    async fn webhook_missing_signature_returns_401() {
        let (app, sink) = app();

        let request = Request::builder()
            .method("POST")
            .uri("/webhook")
            .header("x-github-event", "issue_comment")
            .body(Body::from(comment_payload()))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(sink.count(), 0);
    }

    #[tokio::test]
    async fn webhook_missing_event_header_returns_400() {
        let (app, sink) = app();

        let response = app.oneshot(webhook_request(SECRET, None, comment_payload())).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(sink.count(), 0);
    }

    #[tokio::test]
    async fn webhook_malformed_payload_returns_400() {
        let (app, sink) = app();

        let response = app
            .oneshot(webhook_request(SECRET, Some("issue_comment"), b"{\"action\":".to_vec()))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(sink.count(), 0);
    }

    #[tokio::test]
    async fn webhook_unknown_event_is_accepted_and_ignored() {
        let (app, sink) = app();

        let response = app
            .oneshot(webhook_request(SECRET, Some("ping"), br#"{"zen":"Keep it logically awesome."}"#.to_vec()))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::ACCEPTED);
        assert_eq!(body_text(response).await, "Ignored");
        assert_eq!(sink.count(), 0);
    }

    #[tokio::test]
    async fn webhook_rejects_get() {
        let (app, _) = app();

        let request = Request::builder().uri("/webhook").body(Body::empty()).unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }
}
