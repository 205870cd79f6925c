use std::future::Future;
use std::sync::Arc;

use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::build_app;
use crate::config::{ConfigError, ServerConfig};
use crate::dispatcher::{Consumer, Dispatcher, Sink};
use crate::factories::Factories;
use crate::poller::Poller;
use crate::poller_manager::PollerManager;
use crate::state::AppState;
use crate::validator::{
    ExternalValidatorService, NotifierValidator, PollerValidator, RepositoryValidator,
};
use crate::webhooks::WebhookRoute;

/// Fatal startup failure. Runtime errors never surface here.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("invalid configuration:\n  - {}", .0.join("\n  - "))]
    Invalid(Vec<String>),
    #[error("external validation failed:\n  - {}", .0.join("\n  - "))]
    ExternalValidation(Vec<String>),
    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        source: std::io::Error,
    },
    #[error("server error: {0}")]
    Serve(std::io::Error),
}

impl StartupError {
    /// Process exit code for this failure.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) | Self::Invalid(_) => 2,
            Self::ExternalValidation(_) => 3,
            Self::HttpClient(_) | Self::Bind { .. } | Self::Serve(_) => 1,
        }
    }
}

/// Everything built from the configuration, ready to run.
pub struct Components {
    pub dispatcher: Arc<Dispatcher>,
    pub pollers: Vec<Poller>,
    pub webhooks: Vec<WebhookRoute>,
    pub validators: ExternalValidatorService,
}

/// Check the configuration, resolve every type tag, and build adapters, the
/// subscription table, and the external validators.
///
/// Structural issues, unknown type tags and adapter construction failures are
/// collected into one list before failing.
pub fn wire(config: &ServerConfig, factories: &Factories) -> Result<Components, StartupError> {
    let watch = &config.watch;
    let mut issues = config.validate();
    issues.extend(factories.check_types(watch));

    let mut sources = Vec::with_capacity(watch.pollers.len());
    for p in &watch.pollers {
        // Unknown tags are already in `issues`.
        if let Ok(build) = factories.sources.resolve(&p.kind) {
            match build(p) {
                Ok(source) => sources.push(source),
                Err(e) => issues.push(format!("poller '{}': {e}", p.event_name)),
            }
        }
    }
    if !issues.is_empty() {
        return Err(StartupError::Invalid(issues));
    }

    for (sink, event_name) in watch.dangling_subscriptions() {
        tracing::warn!(
            consumer = %sink,
            event_name = %event_name,
            "Subscription matches no poller or webhook"
        );
    }

    let mut dispatcher = Dispatcher::new(config.consumer_timeout());
    let mut validators = ExternalValidatorService::new(config.consumer_timeout());

    for r in &watch.repositories {
        let build = factories
            .repositories
            .resolve(&r.kind)
            .map_err(|e| StartupError::Invalid(vec![e.to_string()]))?;
        let updater = build(r);
        for event_name in &r.event_subscriptions {
            dispatcher.subscribe(
                event_name,
                Consumer {
                    name: r.name.clone(),
                    sink: Sink::Repository(Arc::clone(&updater)),
                },
            );
        }
        validators.add(Arc::new(RepositoryValidator {
            name: r.name.clone(),
            updater,
        }));
    }

    for n in &watch.notifiers {
        let build = factories
            .notifiers
            .resolve(&n.kind)
            .map_err(|e| StartupError::Invalid(vec![e.to_string()]))?;
        let notifier = build(n);
        for event_name in &n.event_subscriptions {
            dispatcher.subscribe(
                event_name,
                Consumer {
                    name: n.name.clone(),
                    sink: Sink::Notifier(Arc::clone(&notifier)),
                },
            );
        }
        validators.add(Arc::new(NotifierValidator {
            name: n.name.clone(),
            notifier,
        }));
    }

    for (p, source) in watch.pollers.iter().zip(&sources) {
        validators.add(Arc::new(PollerValidator {
            event_name: p.event_name.clone(),
            source: Arc::clone(source),
        }));
    }

    let dispatcher = Arc::new(dispatcher);
    let pollers = watch
        .pollers
        .iter()
        .zip(sources)
        .map(|(p, source)| Poller::new(p.clone(), source, Arc::clone(&dispatcher)))
        .collect();

    let mut webhooks = Vec::with_capacity(watch.webhooks.len());
    for w in &watch.webhooks {
        let normalizer = *factories
            .webhooks
            .resolve(&w.kind)
            .map_err(|e| StartupError::Invalid(vec![e.to_string()]))?;
        webhooks.push(WebhookRoute {
            path: w.path.clone(),
            event_name: w.event_name.clone(),
            kind: w.kind.clone(),
            normalizer,
        });
    }

    Ok(Components {
        dispatcher,
        pollers,
        webhooks,
        validators,
    })
}

/// Validate, wire, probe, then serve until `shutdown` resolves.
pub async fn run(
    config: ServerConfig,
    factories: Factories,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<(), StartupError> {
    let components = wire(&config, &factories)?;

    tracing::info!(
        probes = components.validators.len(),
        "Validating external dependencies"
    );
    let report = components.validators.validate_all().await;
    if !report.success {
        return Err(StartupError::ExternalValidation(report.errors));
    }

    let listener = tokio::net::TcpListener::bind(&config.listen_addr)
        .await
        .map_err(|source| StartupError::Bind {
            addr: config.listen_addr.clone(),
            source,
        })?;

    let state = AppState::new(
        Arc::clone(&components.dispatcher),
        components.pollers.len(),
        components.webhooks.len(),
    );
    let app = build_app(state, components.webhooks);

    let cancel = CancellationToken::new();
    let pollers = PollerManager::start_all(components.pollers, &cancel);

    tracing::info!(addr = %config.listen_addr, "driftwatch listening");
    let stop = cancel.clone();
    let served = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown.await;
            tracing::info!("Shutdown signal received");
            stop.cancel();
        })
        .await;

    cancel.cancel();
    pollers.stop_all(config.shutdown_grace()).await;
    served.map_err(StartupError::Serve)
}
