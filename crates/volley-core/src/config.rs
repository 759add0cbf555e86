use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::dispatch::DispatchOptions;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub target: TargetConfig,
    #[serde(default)]
    pub run: RunConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

impl Config {
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    pub fn dispatch_options(&self) -> DispatchOptions {
        DispatchOptions {
            task_count: self.run.task_count,
            concurrency: self.run.concurrency,
            pacing: match self.run.pacing_ms {
                0 => None,
                ms => Some(Duration::from_millis(ms)),
            },
            expect_status: self.target.expect_status,
            log_each_call: self.run.log_each_call,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetConfig {
    /// Endpoint probed with GET requests
    #[serde(default = "default_url")]
    pub url: String,
    /// Request timeout in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Status code counted as a success
    #[serde(default = "default_expect_status")]
    pub expect_status: u16,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            timeout_ms: default_timeout_ms(),
            expect_status: default_expect_status(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Number of calls to issue
    #[serde(default = "default_task_count")]
    pub task_count: u64,
    /// Maximum concurrent in-flight calls
    #[serde(default = "default_concurrency")]
    pub concurrency: u64,
    /// Pause after a call releases its slot, in milliseconds (0 disables)
    #[serde(default = "default_pacing_ms")]
    pub pacing_ms: u64,
    /// Emit one log line per completed call
    #[serde(default = "default_log_each_call")]
    pub log_each_call: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            task_count: default_task_count(),
            concurrency: default_concurrency(),
            pacing_ms: default_pacing_ms(),
            log_each_call: default_log_each_call(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Directory for per-run JSON reports (unset disables writing)
    pub results_dir: Option<String>,
}

fn default_url() -> String {
    "https://randompy.fly.dev/healthz".to_string()
}

fn default_timeout_ms() -> u64 {
    5000
}

fn default_expect_status() -> u16 {
    200
}

fn default_task_count() -> u64 {
    1000
}

fn default_concurrency() -> u64 {
    100
}

fn default_pacing_ms() -> u64 {
    100
}

fn default_log_each_call() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_serde() {
        let config_str = r#"
[target]
url = "http://localhost:8080/healthz"
timeout_ms = 2000
expect_status = 200

[run]
task_count = 50
concurrency = 5
pacing_ms = 0
log_each_call = false

[output]
results_dir = "results"
        "#;

        let config: Config = toml::from_str(config_str).unwrap();
        assert_eq!(config.target.url, "http://localhost:8080/healthz");
        assert_eq!(config.target.timeout_ms, 2000);
        assert_eq!(config.run.task_count, 50);
        assert_eq!(config.run.concurrency, 5);
        assert_eq!(config.run.pacing_ms, 0);
        assert!(!config.run.log_each_call);
        assert_eq!(config.output.results_dir.as_deref(), Some("results"));
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config_str = r#"
[run]
task_count = 10
        "#;

        let config: Config = toml::from_str(config_str).unwrap();
        assert_eq!(config.run.task_count, 10);
        assert_eq!(config.run.concurrency, 100);
        assert_eq!(config.run.pacing_ms, 100);
        assert_eq!(config.target.timeout_ms, 5000);
        assert_eq!(config.target.expect_status, 200);
        assert!(config.output.results_dir.is_none());
    }

    #[test]
    fn test_dispatch_options_conversion() {
        let mut config = Config::default();
        assert_eq!(config.dispatch_options().task_count, 1000);
        assert_eq!(config.dispatch_options().concurrency, 100);
        assert_eq!(
            config.dispatch_options().pacing,
            Some(Duration::from_millis(100))
        );

        config.run.pacing_ms = 0;
        assert_eq!(config.dispatch_options().pacing, None);
    }
}
