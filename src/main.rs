//! Focus Keeper - a background focus/break timer
//!
//! This is the main entry point: `serve` runs the timer authority, the other
//! subcommands are small views talking to it over HTTP.

use std::{io::Write, sync::Arc, time::Duration};

use anyhow::{bail, Context};
use tokio::{net::TcpListener, sync::mpsc};
use tracing::info;

use focus_keeper::{
    api::create_router,
    config::{Action, Config},
    protocol::{Broadcast, Command, Reply, SessionSummary},
    services::{
        check_systemctl_available, DesktopNotifier, FocusGuard, LogNotifier, NoopFocusGuard,
        NotificationSink, SystemdFocusGuard,
    },
    state::{AppState, BreakKind, Settings},
    store::JsonFileStore,
    utils::shutdown_signal,
    view::{AuthorityLink, HttpLink, SyncMode, ViewSync},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();

    // Initialize tracing with appropriate log level
    tracing_subscriber::fmt()
        .with_env_filter(format!("focus_keeper={},tower_http=info", config.log_level()))
        .init();

    match config.action() {
        Action::Serve => serve(&config).await,
        Action::Watch => watch(&config).await,
        Action::Status => send(&config, Command::GetTimerState).await,
        Action::Start => send(&config, Command::StartTimer).await,
        Action::Break { long, minutes } => {
            let kind = long.then_some(BreakKind::Long);
            send(&config, Command::StartBreak { break_minutes: minutes, kind }).await
        }
        Action::Pause => send(&config, Command::PauseTimer).await,
        Action::Resume => send(&config, Command::ResumeTimer).await,
        Action::Reset => send(&config, Command::ResetTimer).await,
    }
}

/// Run the timer authority until a shutdown signal arrives
async fn serve(config: &Config) -> anyhow::Result<()> {
    info!("Starting focus-keeper v{}", env!("CARGO_PKG_VERSION"));

    let store = Arc::new(JsonFileStore::new(config.data_file()));
    info!("Configuration: address={}, store={}, tick={}ms",
          config.address(), store.path().display(), config.tick_ms);

    let notifier: Arc<dyn NotificationSink> = if config.desktop_notifications {
        Arc::new(DesktopNotifier::default())
    } else {
        Arc::new(LogNotifier)
    };

    // Focus protection through a systemd unit needs systemctl
    let focus_guard: Arc<dyn FocusGuard> = match &config.focus_unit {
        Some(unit) => {
            check_systemctl_available().await.map_err(anyhow::Error::msg)?;
            let guard = SystemdFocusGuard::new(unit.clone());
            info!("Focus protection unit: {}", guard.unit());
            Arc::new(guard)
        }
        None => Arc::new(NoopFocusGuard),
    };

    let state = AppState::builder(store)
        .notifier(notifier)
        .focus_guard(focus_guard)
        .tick_interval(config.tick_interval())
        .streak_interval(config.streak_interval())
        .build();

    // Restore persisted state and start the background tasks
    state.startup().await;

    let app = create_router(Arc::clone(&state));
    let addr = config.address();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;

    info!("Server running on http://{}", addr);
    info!("Endpoints:");
    info!("  POST /message - Send a timer command");
    info!("  GET  /events  - Stream timer broadcasts (SSE)");
    info!("  GET  /state   - Current timer state");
    info!("  GET  /stats   - Focus statistics");
    info!("  GET  /health  - Health check");

    let server = axum::serve(listener, app);

    tokio::select! {
        result = server => {
            if let Err(e) = result {
                tracing::error!("Server error: {}", e);
            }
        }
        _ = shutdown_signal() => {
            info!("Shutdown signal received");
        }
    }

    state.shutdown().await;
    info!("Server shutdown complete");
    Ok(())
}

/// Send one command and print the resulting state
async fn send(config: &Config, command: Command) -> anyhow::Result<()> {
    let link = HttpLink::new(config.base_url());
    let reply = link
        .request(command)
        .await
        .with_context(|| format!("timer authority at {}", link.base_url()))?;
    let snapshot = match reply {
        Reply::State(snapshot) => snapshot,
        _ => match link.request(Command::GetTimerState).await? {
            Reply::State(snapshot) => snapshot,
            other => bail!("unexpected reply: {:?}", other),
        },
    };

    println!(
        "{} {} {} · {} session(s)",
        snapshot.phase.label(),
        snapshot.clock(),
        if snapshot.is_running { "running" } else { "stopped" },
        snapshot.session_count
    );
    Ok(())
}

/// Follow the timer live, falling back to a local countdown while the
/// authority is away
async fn watch(config: &Config) -> anyhow::Result<()> {
    let mut view = ViewSync::new(HttpLink::new(config.base_url()), Settings::default());
    let mut events = match view.connect().await {
        SyncMode::Connected => view.link().subscribe().await.ok(),
        SyncMode::Standalone => None,
    };
    let mut ticker = tokio::time::interval(Duration::from_secs(1));

    loop {
        tokio::select! {
            message = next_broadcast(&mut events) => match message {
                Some(message) => {
                    if let Some(summary) = view.apply(message) {
                        print_summary(&summary);
                    }
                }
                None => {
                    events = None;
                    view.connect().await;
                }
            },
            _ = ticker.tick() => {
                if events.is_none() && view.connect().await == SyncMode::Connected {
                    events = view.link().subscribe().await.ok();
                }
                if let Some(summary) = view.tick_local() {
                    print_summary(&summary);
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }

        let snapshot = view.view();
        print!(
            "\r{:<10} {} {:<8} sessions: {}{}   ",
            snapshot.phase.label(),
            snapshot.clock(),
            if snapshot.is_running { "running" } else { "paused" },
            snapshot.session_count,
            if view.mode() == SyncMode::Standalone { " (local)" } else { "" }
        );
        std::io::stdout().flush().ok();
    }

    println!();
    Ok(())
}

async fn next_broadcast(events: &mut Option<mpsc::Receiver<Broadcast>>) -> Option<Broadcast> {
    match events {
        Some(events) => events.recv().await,
        None => std::future::pending().await,
    }
}

fn print_summary(summary: &SessionSummary) {
    if summary.is_break {
        println!("\nBreak over after {} min. Ready to focus again?", summary.duration);
    } else {
        println!(
            "\nFocus session #{} complete ({} min). Time for a break.",
            summary.session_count, summary.duration
        );
    }
}
