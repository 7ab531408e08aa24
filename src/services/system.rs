//! Host system checks and systemd unit control

use tokio::process::Command;
use tracing::{debug, info};

/// Check if systemctl is available on the system
pub async fn check_systemctl_available() -> Result<(), String> {
    Command::new("systemctl")
        .arg("--version")
        .output()
        .await
        .map_err(|_| "systemctl is not available. Focus protection via a systemd unit requires systemd.".to_string())?;

    info!("systemctl is available");
    Ok(())
}

/// Run `systemctl <action> <unit>` and report stderr on failure
pub async fn systemctl(action: &str, unit: &str) -> Result<(), String> {
    debug!("Running systemctl {} {}", action, unit);

    let output = Command::new("systemctl")
        .args([action, unit])
        .output()
        .await
        .map_err(|e| format!("Failed to execute systemctl {}: {}", action, e))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(format!("systemctl {} {} failed: {}", action, unit, stderr.trim()));
    }

    Ok(())
}
