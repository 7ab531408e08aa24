//! Configuration and CLI argument handling

use std::{path::PathBuf, time::Duration};

use clap::{Parser, Subcommand};

/// CLI argument parsing structure
#[derive(Debug, Parser)]
#[command(name = "focus-keeper")]
#[command(about = "Background focus/break timer with live state broadcast")]
#[command(version)]
pub struct Config {
    /// Host address of the timer authority
    #[arg(long, default_value = "127.0.0.1", global = true)]
    pub host: String,

    /// Port of the timer authority
    #[arg(short, long, default_value = "20554", global = true)]
    pub port: u16,

    /// JSON file holding settings, timer state and stats
    #[arg(long, global = true)]
    pub data_file: Option<PathBuf>,

    /// Countdown tick period in milliseconds
    #[arg(long, default_value = "1000")]
    pub tick_ms: u64,

    /// How often the day streak is checked, in minutes
    #[arg(long, default_value = "60")]
    pub streak_check_minutes: u64,

    /// Show desktop notifications through notify-send
    #[arg(long)]
    pub desktop_notifications: bool,

    /// systemd unit started during focus phases to block distractions
    #[arg(long)]
    pub focus_unit: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Action>,
}

/// What to do; serving the timer is the default
#[derive(Debug, Clone, Subcommand)]
pub enum Action {
    /// Run the timer authority
    Serve,
    /// Print the current timer state
    Status,
    /// Start a focus session
    Start,
    /// Start a break
    Break {
        /// Force a long break
        #[arg(long)]
        long: bool,
        /// Break length in minutes
        #[arg(long)]
        minutes: Option<u32>,
    },
    /// Pause the running timer
    Pause,
    /// Continue a paused timer
    Resume,
    /// Stop and load a fresh focus session
    Reset,
    /// Follow the timer live in the terminal
    Watch,
}

impl Config {
    /// Parse configuration from command line arguments
    pub fn parse() -> Self {
        Parser::parse()
    }

    /// Get the server address as a formatted string
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Base URL views use to reach the authority
    pub fn base_url(&self) -> String {
        format!("http://{}", self.address())
    }

    /// Get the appropriate log level based on verbose flag
    pub fn log_level(&self) -> &'static str {
        if self.verbose { "debug" } else { "info" }
    }

    pub fn action(&self) -> Action {
        self.command.clone().unwrap_or(Action::Serve)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_ms.max(10))
    }

    pub fn streak_interval(&self) -> Duration {
        Duration::from_secs(self.streak_check_minutes.max(1) * 60)
    }

    /// Store location: `--data-file`, else the user data directory
    pub fn data_file(&self) -> PathBuf {
        self.data_file.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("focus-keeper")
                .join("store.json")
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serve_is_the_default() {
        let config = Config::try_parse_from(["focus-keeper"]).unwrap();
        assert!(matches!(config.action(), Action::Serve));
        assert_eq!(config.base_url(), "http://127.0.0.1:20554");
        assert_eq!(config.tick_interval(), Duration::from_secs(1));
        assert_eq!(config.streak_interval(), Duration::from_secs(3600));
    }

    #[test]
    fn subcommands_accept_global_flags() {
        let config =
            Config::try_parse_from(["focus-keeper", "break", "--long", "--port", "9000"]).unwrap();
        assert_eq!(config.port, 9000);
        assert!(matches!(
            config.action(),
            Action::Break {
                long: true,
                minutes: None
            }
        ));
    }

    #[test]
    fn explicit_data_file_wins() {
        let config =
            Config::try_parse_from(["focus-keeper", "--data-file", "/tmp/fk.json"]).unwrap();
        assert_eq!(config.data_file(), PathBuf::from("/tmp/fk.json"));
    }
}
