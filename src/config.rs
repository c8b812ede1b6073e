//! Runtime configuration from environment variables (`.env` supported in
//! dev via dotenvy, loaded by the binary before this is read).

use std::str::FromStr;

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// HTTP listen port.
    pub port: u16,
    /// Per-fetch timeout in seconds.
    pub fetch_timeout_secs: u64,
    /// Max sources checked in parallel within one cycle.
    pub max_concurrency: usize,
    /// UTC hour (0-23) of the daily scheduled cycle.
    pub schedule_hour_utc: u32,
    /// Whether the daily scheduler is engaged at all.
    pub schedule_enabled: bool,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            port: env_parse("PORT", 4000),
            fetch_timeout_secs: env_parse("FETCH_TIMEOUT_SECS", 20),
            max_concurrency: env_parse("MONITOR_CONCURRENCY", 4),
            schedule_hour_utc: env_parse::<u32>("MONITOR_HOUR_UTC", 8).min(23),
            schedule_enabled: env_parse("MONITOR_SCHEDULE_ENABLED", 1u8) == 1,
        }
    }
}

fn env_parse<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
