//! Webhook receiver: the platform POSTs each update to a secret path.

use axum::{
    body::Body,
    extract::{Request, State},
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
    Router,
};
use herald_core::{
    config::WebhookConfig, error::HeraldError, traits::RequestGateway, update::Update,
};
use herald_dispatch::Dispatcher;
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tower::ServiceExt;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Largest update body accepted.
const MAX_BODY: usize = 1024 * 1024;

/// Serves `POST <path>` and feeds each body to the dispatcher.
pub struct WebhookTransport {
    gateway: Arc<dyn RequestGateway>,
    dispatcher: Arc<Dispatcher>,
    config: WebhookConfig,
    path: Arc<str>,
    public_url: String,
    allowed_updates: Vec<String>,
    server: Mutex<Option<Server>>,
}

struct Server {
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

#[derive(Clone)]
struct WebhookState {
    dispatcher: Arc<Dispatcher>,
    path: Arc<str>,
    downstream: Option<Router>,
}

impl WebhookTransport {
    pub fn new(
        gateway: Arc<dyn RequestGateway>,
        dispatcher: Arc<Dispatcher>,
        config: WebhookConfig,
        allowed_updates: Vec<String>,
    ) -> Result<Self, HeraldError> {
        config.validate()?;
        let path: Arc<str> = match config.path {
            Some(ref p) => p.as_str().into(),
            None => random_path().into(),
        };
        let public_url = public_url(&config.domain, &path)?;
        Ok(Self {
            gateway,
            dispatcher,
            config,
            path,
            public_url,
            allowed_updates,
            server: Mutex::new(None),
        })
    }

    /// Secret path updates are accepted on.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// URL registered with `setWebhook`.
    pub fn public_url(&self) -> &str {
        &self.public_url
    }

    /// Router answering 403 to everything but `POST <path>`.
    pub fn router(&self) -> Router {
        self.build_router(None)
    }

    /// Router that forwards everything but `POST <path>` to `downstream`.
    pub fn router_with_fallback(&self, downstream: Router) -> Router {
        self.build_router(Some(downstream))
    }

    fn build_router(&self, downstream: Option<Router>) -> Router {
        let state = WebhookState {
            dispatcher: self.dispatcher.clone(),
            path: self.path.clone(),
            downstream,
        };
        Router::new().fallback(handle).with_state(state)
    }

    pub async fn is_running(&self) -> bool {
        self.server.lock().await.is_some()
    }

    /// Register the webhook, bind `host:port` and serve in the background.
    ///
    /// Returns the bound local address.
    pub async fn start(&self) -> Result<SocketAddr, HeraldError> {
        let mut slot = self.server.lock().await;
        if slot.is_some() {
            return Err(HeraldError::AlreadyRunning);
        }

        self.gateway
            .set_webhook(&self.public_url, &self.allowed_updates)
            .await?;
        info!("Webhook registered for {}", self.config.domain);

        let addr = format!("{}:{}", self.config.host, self.config.port);
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|e| HeraldError::Transport(format!("webhook failed to bind to {addr}: {e}")))?;
        let local = listener.local_addr()?;

        let (shutdown, shutdown_rx) = oneshot::channel::<()>();
        let app = self.router();
        let task = tokio::spawn(async move {
            let signal = async {
                let _ = shutdown_rx.await;
            };
            if let Err(e) = axum::serve(listener, app)
                .with_graceful_shutdown(signal)
                .await
            {
                error!("webhook server error: {e}");
            }
        });

        info!("Webhook listening on {local}");
        *slot = Some(Server { shutdown, task });
        Ok(local)
    }

    /// Shut the server down gracefully. The registration is left in place.
    pub async fn stop(&self) {
        let server = self.server.lock().await.take();
        let Some(server) = server else {
            return;
        };
        let _ = server.shutdown.send(());
        if let Err(e) = server.task.await {
            error!("webhook task ended abnormally: {e}");
        }
        info!("Webhook stopped");
    }
}

async fn handle(State(state): State<WebhookState>, req: Request) -> Response {
    if req.method() != Method::POST || req.uri().path() != &*state.path {
        return match state.downstream {
            Some(downstream) => match downstream.oneshot(req).await {
                Ok(resp) => resp,
                Err(never) => match never {},
            },
            None => {
                debug!("webhook: rejected {} {}", req.method(), req.uri().path());
                StatusCode::FORBIDDEN.into_response()
            }
        };
    }

    let body = match axum::body::to_bytes(req.into_body(), MAX_BODY).await {
        Ok(b) => b,
        Err(e) => {
            warn!("webhook: unreadable body: {e}");
            return StatusCode::UNSUPPORTED_MEDIA_TYPE.into_response();
        }
    };
    let value: Value = match serde_json::from_slice(&body) {
        Ok(v) => v,
        Err(e) => {
            warn!("webhook: malformed update: {}", HeraldError::Parse(e.to_string()));
            return StatusCode::UNSUPPORTED_MEDIA_TYPE.into_response();
        }
    };
    // Valid JSON is always acknowledged; a non-2xx answer is redelivered forever.
    let Some(update) = Update::from_value(value) else {
        warn!("webhook: dropping update without an update_id");
        return (StatusCode::OK, Body::empty()).into_response();
    };

    let report = state.dispatcher.dispatch(&update);
    if report.failed() > 0 {
        warn!(
            "update {}: {} of {} handlers failed",
            update.update_id,
            report.failed(),
            report.fired
        );
    }
    (StatusCode::OK, Body::empty()).into_response()
}

/// `/herald/` followed by 64 hex characters.
fn random_path() -> String {
    format!(
        "/herald/{}{}",
        Uuid::new_v4().simple(),
        Uuid::new_v4().simple()
    )
}

/// `https://<host>[:port]<path>` from the configured domain.
fn public_url(domain: &str, path: &str) -> Result<String, HeraldError> {
    let url = reqwest::Url::parse(domain)
        .map_err(|e| HeraldError::Config(format!("invalid webhook domain '{domain}': {e}")))?;
    let host = url
        .host_str()
        .ok_or_else(|| HeraldError::Config(format!("webhook domain '{domain}' has no host")))?;
    Ok(match url.port() {
        Some(port) => format!("https://{host}:{port}{path}"),
        None => format!("https://{host}{path}"),
    })
}
