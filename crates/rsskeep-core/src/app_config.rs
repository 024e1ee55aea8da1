use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

#[derive(Clone)]
pub struct AppConfig {
    /// `None` when `DATABASE_URL` is unset; only database commands require it.
    pub database_url: Option<String>,
    pub env: Environment,
    pub log_level: String,
    pub data_root: PathBuf,
    pub sources_path: PathBuf,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub db_acquire_timeout_secs: u64,
    pub fetch_timeout_secs: u64,
    pub user_agent: String,
    pub fetch_concurrency: usize,
    pub fetch_retry_delay_secs: u64,
    pub reconnect_delay_secs: u64,
    pub cycle_delay_secs: u64,
    pub partition_pause_ms: u64,
    /// Length of the run window in days; fractional values are allowed.
    pub run_days: f64,
}

impl AppConfig {
    /// The run window as a [`Duration`]. Negative or non-finite day counts
    /// collapse to zero.
    #[must_use]
    pub fn run_duration(&self) -> Duration {
        days_to_duration(self.run_days)
    }
}

/// Convert a (possibly fractional) day count into a [`Duration`].
#[must_use]
pub fn days_to_duration(days: f64) -> Duration {
    if !days.is_finite() || days <= 0.0 {
        return Duration::ZERO;
    }
    Duration::try_from_secs_f64(days * 86_400.0).unwrap_or(Duration::MAX)
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("log_level", &self.log_level)
            .field("data_root", &self.data_root)
            .field("sources_path", &self.sources_path)
            .field(
                "database_url",
                &self.database_url.as_ref().map(|_| "[redacted]"),
            )
            .field("db_max_connections", &self.db_max_connections)
            .field("db_min_connections", &self.db_min_connections)
            .field("db_acquire_timeout_secs", &self.db_acquire_timeout_secs)
            .field("fetch_timeout_secs", &self.fetch_timeout_secs)
            .field("user_agent", &self.user_agent)
            .field("fetch_concurrency", &self.fetch_concurrency)
            .field("fetch_retry_delay_secs", &self.fetch_retry_delay_secs)
            .field("reconnect_delay_secs", &self.reconnect_delay_secs)
            .field("cycle_delay_secs", &self.cycle_delay_secs)
            .field("partition_pause_ms", &self.partition_pause_ms)
            .field("run_days", &self.run_days)
            .finish()
    }
}
