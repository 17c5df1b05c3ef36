use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use genrelay_pipeline::PollConfig;

/// Server configuration loaded from environment variables.
///
/// All fields have sensible defaults suitable for local development.
/// Provider settings (project, location, credentials) are loaded separately
/// by `genrelay_vertex`.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `8000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `120`).
    ///
    /// Image generation is synchronous, so this has to cover a full provider
    /// round trip.
    pub request_timeout_secs: u64,
    /// Total time shutdown waits for pollers to record their final state.
    pub shutdown_timeout_secs: u64,
    /// Directory where generated media is written.
    pub media_dir: PathBuf,
    /// Age after which finished jobs and their files are purged.
    pub media_retention_hours: i64,
    pub media_cleanup_interval_secs: u64,
    pub poll_interval_secs: u64,
    pub poll_max_attempts: u32,
    pub poll_backoff_multiplier: f64,
    pub poll_max_interval_secs: u64,
    pub poll_transient_retries: u32,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                       | Default                  |
    /// |-------------------------------|--------------------------|
    /// | `HOST`                        | `0.0.0.0`                |
    /// | `PORT`                        | `8000`                   |
    /// | `CORS_ORIGINS`                | `http://localhost:5173`  |
    /// | `REQUEST_TIMEOUT_SECS`        | `120`                    |
    /// | `SHUTDOWN_TIMEOUT_SECS`       | `30`                     |
    /// | `MEDIA_DIR`                   | `<tmp>/genrelay-media`   |
    /// | `MEDIA_RETENTION_HOURS`       | `24`                     |
    /// | `MEDIA_CLEANUP_INTERVAL_SECS` | `3600`                   |
    /// | `POLL_INTERVAL_SECS`          | `15`                     |
    /// | `POLL_MAX_ATTEMPTS`           | `30`                     |
    /// | `POLL_BACKOFF_MULTIPLIER`     | `1.0`                    |
    /// | `POLL_MAX_INTERVAL_SECS`      | `120`                    |
    /// | `POLL_TRANSIENT_RETRIES`      | `0`                      |
    ///
    /// Panics on unparsable values so misconfiguration fails at startup.
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let media_dir = std::env::var("MEDIA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| std::env::temp_dir().join("genrelay-media"));

        let config = Self {
            host,
            port: env_or("PORT", 8000),
            cors_origins,
            request_timeout_secs: env_or("REQUEST_TIMEOUT_SECS", 120),
            shutdown_timeout_secs: env_or("SHUTDOWN_TIMEOUT_SECS", 30),
            media_dir,
            media_retention_hours: env_or("MEDIA_RETENTION_HOURS", 24),
            media_cleanup_interval_secs: env_or("MEDIA_CLEANUP_INTERVAL_SECS", 3600),
            poll_interval_secs: env_or("POLL_INTERVAL_SECS", 15),
            poll_max_attempts: env_or("POLL_MAX_ATTEMPTS", 30),
            poll_backoff_multiplier: env_or("POLL_BACKOFF_MULTIPLIER", 1.0),
            poll_max_interval_secs: env_or("POLL_MAX_INTERVAL_SECS", 120),
            poll_transient_retries: env_or("POLL_TRANSIENT_RETRIES", 0),
        };

        if let Err(e) = config.media_retention() {
            panic!("{e}");
        }
        config
    }

    /// Retention window for finished jobs.
    ///
    /// Fails for negative hours and for values `chrono` cannot represent.
    pub fn media_retention(&self) -> Result<chrono::Duration, String> {
        let hours = self.media_retention_hours;
        if hours < 0 {
            return Err(format!("MEDIA_RETENTION_HOURS must not be negative, got {hours}"));
        }
        chrono::Duration::try_hours(hours)
            .ok_or_else(|| format!("MEDIA_RETENTION_HOURS is out of range: {hours}"))
    }

    /// Polling parameters for the operation poller.
    pub fn poll_config(&self) -> PollConfig {
        PollConfig {
            interval: Duration::from_secs(self.poll_interval_secs),
            max_attempts: self.poll_max_attempts.max(1),
            backoff_multiplier: self.poll_backoff_multiplier,
            max_interval: Duration::from_secs(self.poll_max_interval_secs),
            transient_retries: self.poll_transient_retries,
        }
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

fn env_or<T>(key: &str, default: T) -> T
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .unwrap_or_else(|e| panic!("{key} has an invalid value '{raw}': {e}")),
        Err(_) => default,
    }
}
