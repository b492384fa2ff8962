//! modkey-daemon: background daemon coordinating modifier-key hotkeys
//!
//! This daemon runs as a LaunchAgent and provides:
//! - Global modifier tracking and hotkey matching via CGEventTap
//! - The keys manager, which registers each hotkey group only while its
//!   modifier set is held
//! - IPC server for configuration, status queries and event push

use anyhow::Result;
use tokio::sync::{broadcast, mpsc};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use modkey_daemon::config::Config;
use modkey_daemon::events::KeysEvent;
use modkey_daemon::hotkey::{EventTapBackend, HotkeyListener, LogicalKey};
use modkey_daemon::ipc::Server;
use modkey_daemon::lifecycle::ShutdownSignal;
use modkey_daemon::settings::{JsonFileStore, SettingsSync};
use modkey_daemon::state::{HotkeyGroupKind, HotkeyHandler, KeysManager};

/// Logs group activity; consumers follow fired hotkeys over IPC
struct DaemonHandler;

impl HotkeyHandler for DaemonHandler {
    fn on_hotkey(&mut self, group: HotkeyGroupKind, key: LogicalKey) {
        info!(%group, %key, "hotkey");
    }

    fn will_register(&mut self, group: HotkeyGroupKind) {
        info!(%group, "group active");
    }

    fn did_unregister(&mut self, group: HotkeyGroupKind) {
        info!(%group, "group inactive");
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "modkey-daemon starting");

    let config = Config::load()?;
    config.ensure_dirs()?;
    info!(
        ?config.socket_path,
        preview = config.preview_mode,
        "configuration loaded"
    );

    let mut shutdown = ShutdownSignal::new()?;

    // Listener and IPC -> keys manager
    let (input_tx, input_rx) = mpsc::channel(64);
    // Keys manager -> IPC server and subscribers
    let (event_tx, _event_rx) = broadcast::channel::<KeysEvent>(64);

    let backend = EventTapBackend::new();
    let hotkey_listener = HotkeyListener::new(input_tx.clone(), backend.registry());

    let mut manager = KeysManager::new(
        backend,
        DaemonHandler,
        config.manager_options(),
        event_tx.clone(),
    );

    let mut sync = SettingsSync::new(JsonFileStore::new(&config.settings_path))?;
    sync.pull_into(&mut manager);
    info!(path = ?config.settings_path, "hotkey settings loaded");

    let server = Server::new(&config.socket_path, input_tx, event_tx)?;

    // Runs on a dedicated thread
    match hotkey_listener.start() {
        Ok(()) => {
            info!("hotkey listener started");
            server.set_listener_active(true).await;
        }
        Err(e) => {
            error!(?e, "failed to start hotkey listener");
            warn!("continuing without hotkey support - check Accessibility permissions");
        }
    }

    info!("daemon initialized, entering main loop");

    tokio::select! {
        _ = manager.run(input_rx, &mut sync) => {
            info!("keys manager exited");
        }

        result = server.run() => {
            if let Err(e) = result {
                error!(?e, "IPC server error");
            }
        }

        _ = server.track_events() => {
            info!("event mirror exited");
        }

        _ = shutdown.wait() => {
            info!("shutdown signal received");
        }
    }

    info!("shutting down...");

    hotkey_listener.stop();
    manager.shutdown();
    server.shutdown().await;

    info!("modkey-daemon stopped");

    Ok(())
}
