//! External collaborators of the timer authority
//!
//! Desktop notifications and focus protection both live outside this
//! process. Every call here is best-effort: failures are logged and never
//! reach the timer.

pub mod focus_guard;
pub mod notifier;
pub mod system;

pub use focus_guard::{FocusGuard, NoopFocusGuard, SystemdFocusGuard};
pub use notifier::{DesktopNotifier, LogNotifier, NotificationSink};
pub use system::check_systemctl_available;
