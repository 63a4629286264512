use clap::Parser;
use lib_realtime::PollConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Deserialize, Serialize, Debug, Clone, Default)]
#[clap(about = "Memberhub realtime dashboard server", version)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    #[clap(long, env = "MEMBERHUB_PORT", help = "Port to listen on for dashboard connections.")]
    pub port: Option<u16>,

    #[clap(long, env = "MEMBERHUB_CONFIG_PATH", help = "Path to the JSON configuration file.")]
    pub config_path: Option<PathBuf>,

    #[clap(long, env = "MEMBERHUB_LOG_DIR", help = "Directory for log files.")]
    pub log_dir: Option<PathBuf>,

    #[clap(long, env = "MEMBERHUB_LOG_LEVEL", help = "Logging level (debug, info, warn, error).")]
    pub log_level: Option<String>,

    #[clap(long, env = "MEMBERHUB_API_BASE_URL", help = "Base URL of the association API to poll.")]
    pub api_base_url: Option<String>,

    #[clap(long, env = "MEMBERHUB_API_TOKEN", help = "Bearer token for the association API.")]
    pub api_token: Option<String>,

    #[clap(long, env = "MEMBERHUB_STATS_INTERVAL_SECONDS", help = "Polling interval for dashboard statistics.")]
    pub stats_interval_seconds: Option<u64>,

    #[clap(long, env = "MEMBERHUB_MEMBERS_INTERVAL_SECONDS", help = "Polling interval for the member directory.")]
    pub members_interval_seconds: Option<u64>,

    #[clap(long, env = "MEMBERHUB_EVENTS_INTERVAL_SECONDS", help = "Polling interval for events.")]
    pub events_interval_seconds: Option<u64>,

    #[clap(long, env = "MEMBERHUB_CONTENT_INTERVAL_SECONDS", help = "Polling interval for published content.")]
    pub content_interval_seconds: Option<u64>,

    #[clap(long, env = "MEMBERHUB_FETCH_TIMEOUT_SECONDS", help = "Deadline for one fetch attempt.")]
    pub fetch_timeout_seconds: Option<u64>,

    #[clap(long, env = "MEMBERHUB_BACKOFF_CEILING_SECONDS", help = "Upper bound for the failure backoff delay.")]
    pub backoff_ceiling_seconds: Option<u64>,

    #[clap(long, env = "MEMBERHUB_STALE_AFTER_SECONDS", help = "Age past which a snapshot is reported stale.")]
    pub stale_after_seconds: Option<u64>,

    #[clap(long, env = "MEMBERHUB_FETCH_IMMEDIATELY", help = "Fire the first fetch immediately instead of after one interval.")]
    pub fetch_immediately: Option<bool>,
}

impl Config {
    // Merge two Config structs, where 'other' overrides 'self' for Some values
    fn merge(self, other: Config) -> Config {
        Config {
            port: other.port.or(self.port),
            config_path: other.config_path.or(self.config_path),
            log_dir: other.log_dir.or(self.log_dir),
            log_level: other.log_level.or(self.log_level),
            api_base_url: other.api_base_url.or(self.api_base_url),
            api_token: other.api_token.or(self.api_token),
            stats_interval_seconds: other.stats_interval_seconds.or(self.stats_interval_seconds),
            members_interval_seconds: other
                .members_interval_seconds
                .or(self.members_interval_seconds),
            events_interval_seconds: other
                .events_interval_seconds
                .or(self.events_interval_seconds),
            content_interval_seconds: other
                .content_interval_seconds
                .or(self.content_interval_seconds),
            fetch_timeout_seconds: other.fetch_timeout_seconds.or(self.fetch_timeout_seconds),
            backoff_ceiling_seconds: other
                .backoff_ceiling_seconds
                .or(self.backoff_ceiling_seconds),
            stale_after_seconds: other.stale_after_seconds.or(self.stale_after_seconds),
            fetch_immediately: other.fetch_immediately.or(self.fetch_immediately),
        }
    }

    pub fn port(&self) -> u16 {
        self.port.unwrap_or(9080)
    }

    pub fn log_dir(&self) -> PathBuf {
        self.log_dir.clone().unwrap_or_else(|| PathBuf::from("./logs"))
    }

    pub fn log_level(&self) -> String {
        self.log_level.clone().unwrap_or_else(|| "info".to_string())
    }

    pub fn api_base_url(&self) -> String {
        self.api_base_url
            .clone()
            .unwrap_or_else(|| "http://localhost:8000/".to_string())
    }

    pub fn stale_after(&self) -> Duration {
        Duration::from_secs(self.stale_after_seconds.unwrap_or(60))
    }

    /// Builds the per-domain poll configuration around a nominal interval,
    /// applying the globally configured timeout/ceiling overrides.
    pub fn poll_config(&self, interval_seconds: u64) -> PollConfig {
        let mut cfg = PollConfig::for_interval(Duration::from_secs(interval_seconds));
        if let Some(timeout) = self.fetch_timeout_seconds {
            cfg.timeout = Duration::from_secs(timeout);
        }
        if let Some(ceiling) = self.backoff_ceiling_seconds {
            cfg.backoff_ceiling = Duration::from_secs(ceiling);
        }
        if let Some(immediate) = self.fetch_immediately {
            cfg.fetch_immediately = immediate;
        }
        cfg.stale_after = self.stale_after();
        cfg
    }

    pub fn stats_interval_seconds(&self) -> u64 {
        self.stats_interval_seconds.unwrap_or(30)
    }

    pub fn members_interval_seconds(&self) -> u64 {
        self.members_interval_seconds.unwrap_or(60)
    }

    pub fn events_interval_seconds(&self) -> u64 {
        self.events_interval_seconds.unwrap_or(60)
    }

    pub fn content_interval_seconds(&self) -> u64 {
        self.content_interval_seconds.unwrap_or(120)
    }
}

pub fn load_config() -> Config {
    // 1. Defaults are supplied by the accessor methods; the base config
    //    starts empty.
    let mut current_config = Config::default();

    // 2. Load from config file (server_dashboard.conf) if present.
    //    Allow overriding the config file path with CLI arg / env; fall
    //    back to the user's config directory when the working directory
    //    has no file.
    let cli_args_for_path = Config::parse();
    let config_file_path = cli_args_for_path
        .config_path
        .clone()
        .unwrap_or_else(|| PathBuf::from("server_dashboard.conf"));
    let config_file_path = if config_file_path.exists() {
        config_file_path
    } else {
        dirs::config_dir()
            .map(|dir| dir.join("memberhub").join("server_dashboard.conf"))
            .unwrap_or(config_file_path)
    };

    if config_file_path.exists() {
        if let Ok(config_str) = fs::read_to_string(&config_file_path) {
            if let Ok(file_config) = serde_json::from_str::<Config>(&config_str) {
                current_config = current_config.merge(file_config);
            } else {
                log::warn!(
                    "Failed to parse config file: {}. Falling back to other sources.",
                    config_file_path.display()
                );
            }
        } else {
            log::warn!(
                "Failed to read config file: {}. Falling back to other sources.",
                config_file_path.display()
            );
        }
    } else {
        log::info!(
            "Config file not found at {}. Using defaults and environment/CLI variables.",
            config_file_path.display()
        );
    }

    // 3. Override with environment variables and CLI arguments (clap
    //    handles both); they win over the file.
    current_config.merge(cli_args_for_path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_values_override_file_values() {
        let file: Config = serde_json::from_str(
            r#"{"port": 9000, "statsIntervalSeconds": 15, "logLevel": "debug"}"#,
        )
        .unwrap();
        let cli = Config {
            port: Some(9999),
            ..Config::default()
        };

        let merged = Config::default().merge(file).merge(cli);
        assert_eq!(merged.port(), 9999);
        assert_eq!(merged.stats_interval_seconds(), 15);
        assert_eq!(merged.log_level(), "debug");
    }

    #[test]
    fn test_defaults_apply_when_nothing_is_configured() {
        let config = Config::default();
        assert_eq!(config.port(), 9080);
        assert_eq!(config.stats_interval_seconds(), 30);
        assert_eq!(config.content_interval_seconds(), 120);
        assert_eq!(config.log_level(), "info");
    }

    #[test]
    fn test_poll_config_applies_global_overrides() {
        let config = Config {
            fetch_timeout_seconds: Some(5),
            backoff_ceiling_seconds: Some(300),
            fetch_immediately: Some(false),
            ..Config::default()
        };
        let poll = config.poll_config(30);
        assert_eq!(poll.interval, Duration::from_secs(30));
        assert_eq!(poll.timeout, Duration::from_secs(5));
        assert_eq!(poll.backoff_ceiling, Duration::from_secs(300));
        assert!(!poll.fetch_immediately);
    }
}
