//! Session-complete notifications

use tokio::process::Command;
use tracing::{debug, info};

/// Fire-and-forget notification surface.
///
/// Implementations must return immediately and never fail visibly.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, title: &str, message: &str);
}

/// Writes notifications to the log only
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl NotificationSink for LogNotifier {
    fn notify(&self, title: &str, message: &str) {
        info!("{}: {}", title, message);
    }
}

/// Shows a desktop notification through `notify-send`
#[derive(Debug, Clone)]
pub struct DesktopNotifier {
    app_name: String,
}

impl DesktopNotifier {
    pub fn new(app_name: impl Into<String>) -> Self {
        Self {
            app_name: app_name.into(),
        }
    }
}

impl Default for DesktopNotifier {
    fn default() -> Self {
        Self::new("focus-keeper")
    }
}

impl NotificationSink for DesktopNotifier {
    fn notify(&self, title: &str, message: &str) {
        info!("{}: {}", title, message);

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            debug!("No runtime available for desktop notification");
            return;
        };

        let mut command = Command::new("notify-send");
        command.args(["--app-name", &self.app_name, title, message]);
        runtime.spawn(async move {
            match command.output().await {
                Ok(output) if output.status.success() => {}
                Ok(output) => debug!(
                    "notify-send exited with {}: {}",
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
                Err(e) => debug!("notify-send unavailable: {}", e),
            }
        });
    }
}
