//! Watch command - monitor a path and ping the canary token.

use anyhow::Context;

use crate::cli::WatchArgs;
use crate::config::{Settings, SessionConfig};
use crate::watcher::{Shutdown, start_session_until};

/// Fold command-line flags over the loaded settings.
pub fn apply_overrides(settings: &mut Settings, args: &WatchArgs) {
    if let Some(path) = &args.path {
        settings.watch.path = path.clone();
    }
    if let Some(url) = &args.token_url {
        settings.alert.token_url = url.clone();
    }
    if let Some(linger) = args.linger {
        settings.watch.linger_ms = u64::try_from(linger.as_millis()).unwrap_or(u64::MAX);
    }
    if args.recursive {
        settings.watch.recursive = true;
    }
}

/// Resolve the session to run from settings and flags.
pub fn session_config(mut settings: Settings, args: &WatchArgs) -> anyhow::Result<SessionConfig> {
    apply_overrides(&mut settings, args);
    settings
        .session_config()
        .context("invalid watch configuration")
}

/// Run the watch command until the source ends or Ctrl-C is pressed.
pub async fn run(args: WatchArgs, settings: Settings) -> anyhow::Result<Shutdown> {
    crate::logging::init_with_config(&settings.logging);

    let config = session_config(settings, &args)?;

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("[watcher] cannot listen for ctrl+c: {e}");
            std::future::pending::<()>().await;
        }
        crate::log_event!("watcher", "received shutdown signal");
    };

    let outcome = start_session_until(&config, shutdown)
        .await
        .with_context(|| format!("watch loop failed for {}", config.path.display()))?;

    Ok(outcome)
}
