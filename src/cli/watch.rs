//! Continuous monitoring command

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{info, warn};
use vpnpp_core::config::toml_config::load_or_default;
use vpnpp_core::config::SharedConfig;
use vpnpp_core::error::VpnppError;
use vpnpp_core::monitor::Scheduler;

use crate::cli::{build_checker, config_path, load};
use crate::host::ConsoleListener;

/// Run the scheduler until Ctrl-C
///
/// On SIGHUP the `[check]` table is re-read from the config file, so
/// `vpnpp config set check.minutes N` followed by `kill -HUP` retimes a
/// running watch. `[probe]` and `[bind]` are read once at start-up.
pub async fn run_watch(config: Option<PathBuf>) -> Result<(), VpnppError> {
    let path = config_path(config)?;
    let config = load(Some(path.clone()))?;
    let checker = build_checker(&config)?;

    let scheduler = Scheduler::new(Arc::new(checker));
    let listener = scheduler
        .hub()
        .add_listener(Arc::new(ConsoleListener::new(scheduler.hub())));

    info!(
        minutes = config.check.check_minutes,
        "Watching VPN port binding, press Ctrl-C to stop"
    );
    scheduler.start();

    wait_for_shutdown(&path, scheduler.checker().config()).await;

    scheduler.destroy();
    scheduler.hub().remove_listener(listener);
    info!(stats = ?scheduler.stats(), "Stopped watching");
    Ok(())
}

/// Re-read the `[check]` table and hand it to the running engine
///
/// A file that fails to load or validate leaves the current settings in
/// effect.
pub fn reload_check_config(path: &Path, shared: &SharedConfig) -> Result<(), VpnppError> {
    let loaded = load_or_default(path)?;
    shared.replace(loaded.check)?;
    Ok(())
}

#[cfg(unix)]
async fn wait_for_shutdown(path: &Path, shared: &SharedConfig) {
    use tokio::signal::unix::{signal, SignalKind};

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let mut hangup = match signal(SignalKind::hangup()) {
        Ok(hangup) => hangup,
        Err(e) => {
            warn!("Failed to listen for SIGHUP, config reload disabled: {}", e);
            if let Err(e) = ctrl_c.await {
                warn!("Failed to listen for Ctrl-C: {}", e);
            }
            return;
        }
    };

    loop {
        tokio::select! {
            result = &mut ctrl_c => {
                if let Err(e) = result {
                    warn!("Failed to listen for Ctrl-C: {}", e);
                }
                return;
            }
            _ = hangup.recv() => {
                info!(path = %path.display(), "SIGHUP received, reloading check settings");
                if let Err(e) = reload_check_config(path, shared) {
                    warn!("Config reload failed, keeping current settings: {}", e);
                }
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown(_path: &Path, _shared: &SharedConfig) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl-C: {}", e);
    }
}
