use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use driftwatch_core::Notifier;
use driftwatch_core::test_helpers::RecordingSink;

use driftwatch_server::build_app;
use driftwatch_server::dispatcher::{Consumer, Dispatcher, Sink};
use driftwatch_server::state::AppState;
use driftwatch_server::webhooks::{self, WebhookRoute};

pub const ACR_PATH: &str = "/hooks/acr";
pub const DOCKER_PATH: &str = "/hooks/docker";
/// Mounted, but nothing subscribes to its event name.
pub const ORPHAN_PATH: &str = "/hooks/orphan";

pub struct TestServer {
    pub addr: SocketAddr,
    pub sink: Arc<RecordingSink>,
    _shutdown: tokio::task::JoinHandle<()>,
}

impl TestServer {
    /// Start a server whose single notifier always succeeds.
    pub async fn new() -> Self {
        Self::with_sink(RecordingSink::succeeding()).await
    }

    /// Start a server with `sink` subscribed to the ACR and Docker webhooks.
    pub async fn with_sink(sink: RecordingSink) -> Self {
        let sink = Arc::new(sink);
        let mut dispatcher = Dispatcher::new(Duration::from_secs(2));
        for event_name in ["acr-push", "hub-push"] {
            dispatcher.subscribe(
                event_name,
                Consumer {
                    name: "ops".to_string(),
                    sink: Sink::Notifier(Arc::clone(&sink) as Arc<dyn Notifier>),
                },
            );
        }

        let routes = vec![
            route(ACR_PATH, "acr-push", "acr", webhooks::acr::normalize),
            route(DOCKER_PATH, "hub-push", "docker", webhooks::docker::normalize),
            route(ORPHAN_PATH, "orphan", "docker", webhooks::docker::normalize),
        ];
        let state = AppState::new(Arc::new(dispatcher), 0, routes.len());
        let app = build_app(state, routes);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        // Give the server a moment to start accepting
        tokio::time::sleep(Duration::from_millis(20)).await;

        Self {
            addr,
            sink,
            _shutdown: handle,
        }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url())
    }
}

fn route(
    path: &str,
    event_name: &str,
    kind: &str,
    normalizer: webhooks::Normalizer,
) -> WebhookRoute {
    WebhookRoute {
        path: path.to_string(),
        event_name: event_name.to_string(),
        kind: kind.to_string(),
        normalizer,
    }
}

pub fn acr_push(repository: &str, tag: &str) -> serde_json::Value {
    serde_json::json!({
        "id": "evt-1",
        "timestamp": "2024-03-01T10:00:00Z",
        "action": "push",
        "target": {"repository": repository, "tag": tag, "digest": "sha256:abc"},
        "request": {"host": "myreg.azurecr.io"}
    })
}

pub fn docker_push(repo_name: &str, tag: &str) -> serde_json::Value {
    serde_json::json!({
        "push_data": {"tag": tag, "pusher": "ci"},
        "repository": {"repo_name": repo_name}
    })
}
