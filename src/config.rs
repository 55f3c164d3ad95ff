use std::{fs, path::Path};

use serde::Deserialize;

use crate::{CaseflowError, Result};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// number of async worker threads, range [1, 32768), defaults to 16
    pub async_worker_thread_number: u16,
    /// maximum number of live cases kept by the engine
    pub case_cache_size: usize,
    /// capacity of each case's command queue
    pub command_queue_size: usize,
    /// capacity of the event broadcast queue
    pub event_queue_size: usize,
    /// case runner config
    pub runner: RunnerConfig,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RunnerConfig {
    /// bound on skip-predicate auto firings after one state change
    pub max_auto_fires: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            async_worker_thread_number: 16,
            case_cache_size: 2048,
            command_queue_size: 100,
            event_queue_size: 2048,
            runner: RunnerConfig::default(),
        }
    }
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            max_auto_fires: 1024,
        }
    }
}

impl Config {
    pub fn create<T: AsRef<Path>>(path: T) -> Result<Self> {
        let data = fs::read_to_string(path.as_ref()).map_err(|e| CaseflowError::Config(format!("failed to load config file {:?}: {}", path.as_ref(), e)))?;

        Self::load_from_str(data.as_str())
    }

    pub fn load_from_str(toml_str: &str) -> Result<Self> {
        let config = toml::from_str::<Config>(toml_str)?;
        if config.async_worker_thread_number == 0 {
            return Err(CaseflowError::Config("async_worker_thread_number must be at least 1".to_string()));
        }
        if config.command_queue_size == 0 || config.event_queue_size == 0 {
            return Err(CaseflowError::Config("queue sizes must be at least 1".to_string()));
        }
        Ok(config)
    }
}

#[cfg(test)]
mod test {
    use crate::{CaseflowError, Config};

    #[test]
    fn test_config_deserialize() {
        let toml_str = r#"
        async_worker_thread_number = 10
        command_queue_size = 32

        [runner]
        max_auto_fires = 8
        "#;
        let config = Config::load_from_str(toml_str).unwrap();
        assert_eq!(config.async_worker_thread_number, 10);
        assert_eq!(config.command_queue_size, 32);
        assert_eq!(config.case_cache_size, 2048);
        assert_eq!(config.event_queue_size, 2048);
        assert_eq!(config.runner.max_auto_fires, 8);
    }

    #[test]
    fn test_config_defaults_and_errors() {
        let config = Config::load_from_str("").unwrap();
        assert_eq!(config.runner.max_auto_fires, 1024);

        assert!(matches!(Config::load_from_str("async_worker_thread_number = 0"), Err(CaseflowError::Config(_))));
        assert!(matches!(Config::load_from_str("case_cache_size = \"big\""), Err(CaseflowError::Config(_))));
        assert!(Config::create("/nonexistent/caseflow.toml").is_err());
    }
}
