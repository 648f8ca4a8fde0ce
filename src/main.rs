use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use merge_bot::bot::MergeBot;
use merge_bot::config::Config;
use merge_bot::git::Workspaces;
use merge_bot::github::GitHubClient;
use merge_bot::permissions::TeamPermissions;
use merge_bot::server::{AppState, build_router};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "merge_bot=info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env().inspect_err(|e| error!(error = %e, "Invalid configuration"))?;
    if config.allowed_users.is_empty() && config.allowed_teams.is_empty() {
        warn!("No allowed users or teams configured; every command will be refused");
    }

    let github = GitHubClient::from_token(config.github_token.clone())?;
    let permissions = TeamPermissions::new(
        github.clone(),
        config.allowed_users.clone(),
        config.allowed_teams.clone(),
        config.team_cache_ttl,
    );
    let workspaces = Workspaces::new(config.workspace.clone());

    let shutdown = CancellationToken::new();
    let bot = MergeBot::new(github, permissions, workspaces, config.bot.clone(), shutdown.clone());
    let app = build_router(AppState::new(Arc::new(bot.clone()), config.webhook_secret.clone()));

    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    info!(
        addr = %config.listen_addr,
        bot = %config.bot.bot_name,
        workspace = %config.workspace.base_dir.display(),
        "Listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
        .await?;

    bot.shutdown().await;
    info!("Stopped");
    Ok(())
}

/// Resolves on Ctrl-C or SIGTERM, or when `token` is cancelled elsewhere.
async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
        _ = token.cancelled() => {}
    }
    info!("Shutdown requested");
    token.cancel();
}
