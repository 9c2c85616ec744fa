use serde::Deserialize;
use std::env;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub flags: FlagsConfig,
    #[serde(default)]
    pub hotel_service: HotelServiceConfig,
    #[serde(default)]
    pub worker: WorkerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { port: default_port() }
    }
}

fn default_port() -> u16 { 8001 }

/// Flag evaluation service (Flipt-compatible REST API).
#[derive(Debug, Deserialize, Clone)]
pub struct FlagsConfig {
    #[serde(default = "default_flags_url")]
    pub url: String,
    #[serde(default = "default_namespace")]
    pub namespace: String,
    #[serde(default = "default_environment")]
    pub environment: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for FlagsConfig {
    fn default() -> Self {
        Self {
            url: default_flags_url(),
            namespace: default_namespace(),
            environment: default_environment(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl FlagsConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_flags_url() -> String { "http://flipt:8080".into() }
fn default_namespace() -> String { "default".into() }
fn default_environment() -> String { "default".into() }
fn default_timeout_secs() -> u64 { 10 }

/// Booking record and availability service.
#[derive(Debug, Deserialize, Clone)]
pub struct HotelServiceConfig {
    #[serde(default = "default_hotel_service_url")]
    pub url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Total attempts for idempotent reads. 1 means no retry.
    #[serde(default = "default_read_attempts")]
    pub read_attempts: u32,
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
}

impl Default for HotelServiceConfig {
    fn default() -> Self {
        Self {
            url: default_hotel_service_url(),
            timeout_secs: default_timeout_secs(),
            read_attempts: default_read_attempts(),
            retry_backoff_ms: default_retry_backoff_ms(),
        }
    }
}

impl HotelServiceConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_hotel_service_url() -> String { "http://hotel-service:8000/api".into() }
fn default_read_attempts() -> u32 { 1 }
fn default_retry_backoff_ms() -> u64 { 200 }

#[derive(Debug, Deserialize, Clone)]
pub struct WorkerConfig {
    #[serde(default = "default_worker_enabled")]
    pub enabled: bool,
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_shutdown_grace_secs")]
    pub shutdown_grace_secs: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            enabled: default_worker_enabled(),
            poll_interval_secs: default_poll_interval_secs(),
            shutdown_grace_secs: default_shutdown_grace_secs(),
        }
    }
}

impl WorkerConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}

fn default_worker_enabled() -> bool { true }
fn default_poll_interval_secs() -> u64 { 10 }
fn default_shutdown_grace_secs() -> u64 { 5 }

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Not checked in
            .add_source(config::File::with_name("config/local").required(false))
            // Eg.. `INNKEEP__FLAGS__URL=http://localhost:8080`
            .add_source(config::Environment::with_prefix("INNKEEP").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_sources_use_defaults() {
        let config: Config = config::Config::builder()
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(config.server.port, 8001);
        assert_eq!(config.flags.namespace, "default");
        assert_eq!(config.hotel_service.read_attempts, 1);
        assert_eq!(config.worker.poll_interval(), Duration::from_secs(10));
        assert!(config.worker.enabled);
    }

    #[test]
    fn test_overrides_apply_per_key() {
        let config: Config = config::Config::builder()
            .set_override("server.port", 9100)
            .unwrap()
            .set_override("flags.environment", "onoffinc")
            .unwrap()
            .set_override("worker.poll_interval_secs", 0)
            .unwrap()
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(config.server.port, 9100);
        assert_eq!(config.flags.environment, "onoffinc");
        assert_eq!(config.flags.url, "http://flipt:8080");
        // A zero interval would spin; it is clamped to one second.
        assert_eq!(config.worker.poll_interval(), Duration::from_secs(1));
    }
}
