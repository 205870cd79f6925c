use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use driftwatch_server::config::ServerConfig;
use driftwatch_server::factories::Factories;
use driftwatch_server::startup::{self, StartupError};

#[tokio::main]
async fn main() {
    init_tracing();
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "driftwatch starting");

    match start().await {
        Ok(()) => tracing::info!("driftwatch stopped"),
        Err(e) => {
            tracing::error!(exit_code = e.exit_code(), "{e}");
            std::process::exit(e.exit_code());
        },
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("DRIFTWATCH_LOG_FORMAT")
        .is_ok_and(|f| f.eq_ignore_ascii_case("json"));
    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

async fn start() -> Result<(), StartupError> {
    let config = ServerConfig::load(&ServerConfig::path_from_env())?;
    let factories = Factories::builtin(&config.system)?;

    let signal = CancellationToken::new();
    spawn_signal_listener(signal.clone());
    startup::run(config, factories, async move { signal.cancelled().await }).await
}

/// Cancel `token` on Ctrl-C or SIGTERM.
fn spawn_signal_listener(token: CancellationToken) {
    tokio::spawn(async move {
        let ctrl_c = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::warn!(error = %e, "Failed to listen for Ctrl-C");
                std::future::pending::<()>().await;
            }
        };

        #[cfg(unix)]
        let terminate = async {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut sig) => {
                    sig.recv().await;
                },
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to listen for SIGTERM");
                    std::future::pending::<()>().await;
                },
            }
        };
        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {},
            _ = terminate => {},
        }
        token.cancel();
    });
}
