//! Configuration management for the completion gateway
//!
//! Supports configuration via:
//! 1. Config file (~/.config/completion-gateway/config.toml)
//! 2. Environment variables (GATEWAY_NETWORK_URL, GATEWAY_API_KEY, etc.)
//! 3. CLI arguments (override file/env settings)

use crate::api::{DispatchMode, NetworkConfig};
use crate::gateway::GatewayConfig;
use crate::metrics::{CostTable, ModelCost};
use crate::selection::ResponseSelectionPolicy;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to read config: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    SerializeError(#[from] toml::ser::Error),

    #[error("Missing required configuration: {0}")]
    MissingRequired(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Completion behaviour
    pub gateway: GatewaySettings,

    /// Prompting network endpoint
    pub network: NetworkSettings,

    /// Budget settings
    pub budget: BudgetSettings,

    /// Per-model price overrides, merged over the built-in table
    pub costs: BTreeMap<String, ModelCost>,
}

/// Completion behaviour settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewaySettings {
    /// Model calls are accounted against by default
    pub model: String,

    /// Temperature for generation when the caller gives none
    pub temperature: f32,

    /// Maximum tokens for responses
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Dispatch timeout in seconds
    pub timeout_secs: f64,

    /// "candidates" or "best"
    pub dispatch_mode: DispatchMode,

    /// "longest-response" or "filtered-best"
    pub selection: ResponseSelectionPolicy,

    /// Retries after a transient network failure
    pub max_retries: u32,

    /// Delay between retries in milliseconds
    pub retry_delay_ms: u64,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            model: "gpt-3.5-turbo".to_string(),
            temperature: 0.0,
            max_tokens: None,
            timeout_secs: 24.0,
            dispatch_mode: DispatchMode::Candidates,
            selection: ResponseSelectionPolicy::LongestResponse,
            max_retries: 0,
            retry_delay_ms: 1000,
        }
    }
}

/// Prompting network settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkSettings {
    /// Base URL of the network's HTTP endpoint
    pub base_url: String,

    /// API key (can also use GATEWAY_API_KEY env var)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

impl Default for NetworkSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8091".to_string(),
            api_key: None,
        }
    }
}

/// Budget settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BudgetSettings {
    /// Total budget in USD (0 means unlimited)
    pub total_budget: f64,
}

impl Config {
    /// Get default config file path
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("completion-gateway")
            .join("config.toml")
    }

    /// Load config from default location
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(Self::default_path())
    }

    /// Load config from specific path
    pub fn load_from(path: PathBuf) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default().with_env_overrides());
        }

        let content = std::fs::read_to_string(&path)?;
        let config: Config = toml::from_str(&content)?;

        Ok(config.with_env_overrides())
    }

    /// Apply environment variable overrides
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    fn with_overrides_from<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("GATEWAY_NETWORK_URL") {
            self.network.base_url = url;
        }
        if let Some(key) = lookup("GATEWAY_API_KEY") {
            self.network.api_key = Some(key);
        }
        if let Some(model) = lookup("GATEWAY_MODEL") {
            self.gateway.model = model;
        }
        if let Some(temperature) = lookup("GATEWAY_TEMPERATURE").and_then(|t| t.parse().ok()) {
            self.gateway.temperature = temperature;
        }

        self
    }

    /// Save config to default location
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(Self::default_path())
    }

    /// Save config to specific path
    pub fn save_to(&self, path: PathBuf) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(&path, content)?;

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.network.base_url.trim().is_empty() {
            return Err(ConfigError::MissingRequired(
                "network.base_url (or GATEWAY_NETWORK_URL)".to_string(),
            ));
        }

        if self.gateway.timeout_secs.is_nan() || self.gateway.timeout_secs <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "gateway.timeout_secs must be positive, got {}",
                self.gateway.timeout_secs
            )));
        }

        if self.budget.total_budget < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "budget.total_budget must not be negative, got {}",
                self.budget.total_budget
            )));
        }

        if let Some((model, cost)) = self.costs.iter().find(|(_, cost)| !cost.is_valid()) {
            return Err(ConfigError::Invalid(format!(
                "costs.{}: prices must be finite and not negative ({} / {})",
                model, cost.prompt, cost.completion
            )));
        }

        if !self.cost_table().contains(&self.gateway.model) {
            return Err(ConfigError::Invalid(format!(
                "gateway.model '{}' has no entry in the cost table",
                self.gateway.model
            )));
        }

        Ok(())
    }

    /// Built-in prices with the configured overrides applied
    pub fn cost_table(&self) -> CostTable {
        CostTable::builtin().with_overrides(self.costs.clone())
    }

    pub fn gateway_config(&self) -> GatewayConfig {
        GatewayConfig {
            model: self.gateway.model.clone(),
            temperature: self.gateway.temperature,
            max_tokens: self.gateway.max_tokens,
            timeout: Duration::try_from_secs_f64(self.gateway.timeout_secs)
                .unwrap_or_else(|_| GatewayConfig::default().timeout),
            mode: self.gateway.dispatch_mode,
            selection: self.gateway.selection,
            max_retries: self.gateway.max_retries,
            retry_delay: Duration::from_millis(self.gateway.retry_delay_ms),
        }
    }

    pub fn network_config(&self) -> NetworkConfig {
        NetworkConfig {
            base_url: self.network.base_url.clone(),
            api_key: self.network_api_key(),
        }
    }

    /// Get network API key (from config or env)
    pub fn network_api_key(&self) -> Option<String> {
        self.network
            .api_key
            .clone()
            .or_else(|| std::env::var("GATEWAY_API_KEY").ok())
    }

    /// Generate example config content
    pub fn example() -> String {
        let example = Config::default();
        toml::to_string_pretty(&example).unwrap_or_default()
    }
}

/// Builder for creating Config programmatically
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn network_url(mut self, url: impl Into<String>) -> Self {
        self.config.network.base_url = url.into();
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.network.api_key = Some(key.into());
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.gateway.model = model.into();
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.config.gateway.temperature = temperature;
        self
    }

    pub fn timeout_secs(mut self, timeout_secs: f64) -> Self {
        self.config.gateway.timeout_secs = timeout_secs;
        self
    }

    pub fn dispatch_mode(mut self, mode: DispatchMode) -> Self {
        self.config.gateway.dispatch_mode = mode;
        self
    }

    pub fn selection(mut self, selection: ResponseSelectionPolicy) -> Self {
        self.config.gateway.selection = selection;
        self
    }

    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.config.gateway.max_retries = max_retries;
        self
    }

    pub fn total_budget(mut self, total_budget: f64) -> Self {
        self.config.budget.total_budget = total_budget;
        self
    }

    pub fn model_cost(mut self, model: impl Into<String>, cost: ModelCost) -> Self {
        self.config.costs.insert(model.into(), cost);
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.gateway.model, "gpt-3.5-turbo");
        assert_eq!(config.gateway.timeout_secs, 24.0);
        assert_eq!(config.gateway.selection, ResponseSelectionPolicy::LongestResponse);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_builder() {
        let config = ConfigBuilder::new()
            .network_url("http://validator:9000")
            .api_key("test-key")
            .model("local-llama")
            .model_cost("local-llama", ModelCost::new(0.0, 0.0))
            .selection(ResponseSelectionPolicy::FilteredBest)
            .dispatch_mode(DispatchMode::Best)
            .total_budget(2.5)
            .build();

        assert_eq!(config.network.api_key, Some("test-key".to_string()));
        assert_eq!(config.gateway_config().mode, DispatchMode::Best);
        assert_eq!(config.gateway.model, "local-llama");
        assert_eq!(config.budget.total_budget, 2.5);
        assert!(config.validate().is_ok());
        assert!(config.cost_table().contains("gpt-4"));
    }

    #[test]
    fn test_example_config() {
        let example = Config::example();
        assert!(example.contains("[gateway]"));
        assert!(example.contains("[network]"));
        assert!(example.contains("selection = \"longest-response\""));
    }

    #[test]
    fn test_parse_partial_file() {
        let config: Config = toml::from_str(
            r#"
            [gateway]
            selection = "filtered-best"
            dispatch_mode = "best"
            timeout_secs = 10.0

            [costs."network-default"]
            prompt = 0.001
            completion = 0.002
            "#,
        )
        .unwrap();

        assert_eq!(config.gateway.selection, ResponseSelectionPolicy::FilteredBest);
        assert_eq!(config.gateway.dispatch_mode, DispatchMode::Best);
        assert_eq!(config.gateway.model, "gpt-3.5-turbo");
        assert_eq!(
            config.cost_table().lookup("network-default").unwrap(),
            ModelCost::new(0.001, 0.002)
        );

        let gateway = config.gateway_config();
        assert_eq!(gateway.timeout, Duration::from_secs(10));
        assert_eq!(gateway.mode, DispatchMode::Best);
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let config = ConfigBuilder::new()
            .network_url("http://saved:1234")
            .max_retries(3)
            .build();
        config.save_to(path.clone()).unwrap();

        let loaded = Config::load_from(path).unwrap();
        assert_eq!(loaded.gateway.max_retries, 3);
        assert_eq!(loaded.gateway.selection, config.gateway.selection);
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = Config::load_from(dir.path().join("absent.toml")).unwrap();
        assert_eq!(loaded.gateway.retry_delay_ms, 1000);
    }

    #[test]
    fn test_invalid_file_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[gateway\nmodel = ").unwrap();

        assert!(matches!(
            Config::load_from(path),
            Err(ConfigError::ParseError(_))
        ));
    }

    #[test]
    fn test_overrides() {
        let env: HashMap<&str, &str> = [
            ("GATEWAY_NETWORK_URL", "http://env:1"),
            ("GATEWAY_MODEL", "gpt-4"),
            ("GATEWAY_TEMPERATURE", "0.8"),
        ]
        .into_iter()
        .collect();

        let config = Config::default()
            .with_overrides_from(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.network.base_url, "http://env:1");
        assert_eq!(config.gateway.model, "gpt-4");
        assert_eq!(config.gateway.temperature, 0.8);
        assert_eq!(config.network.api_key, None);
    }

    #[test]
    fn test_unparseable_temperature_ignored() {
        let config = Config::default().with_overrides_from(|key| {
            (key == "GATEWAY_TEMPERATURE").then(|| "warm".to_string())
        });
        assert_eq!(config.gateway.temperature, 0.0);
    }

    #[test]
    fn test_validate_rejects_bad_prices() {
        let negative: Config = toml::from_str(
            r#"
            [costs.cheap]
            prompt = -5.0
            completion = 0.0
            "#,
        )
        .unwrap();
        let err = negative.validate().unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(ref m) if m.contains("cheap")));

        let not_a_number: Config = toml::from_str(
            r#"
            [costs.cheap]
            prompt = 0.001
            completion = nan
            "#,
        )
        .unwrap();
        assert!(matches!(not_a_number.validate(), Err(ConfigError::Invalid(_))));

        let infinite = ConfigBuilder::new()
            .model_cost("gpt-4", ModelCost::new(f64::INFINITY, 0.06))
            .build();
        assert!(infinite.validate().is_err());

        let free = ConfigBuilder::new()
            .model_cost("local", ModelCost::new(0.0, 0.0))
            .build();
        assert!(free.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let unpriced = ConfigBuilder::new().model("mystery").build();
        assert!(matches!(unpriced.validate(), Err(ConfigError::Invalid(_))));

        let no_url = ConfigBuilder::new().network_url("  ").build();
        assert!(matches!(no_url.validate(), Err(ConfigError::MissingRequired(_))));

        let zero_timeout = ConfigBuilder::new().timeout_secs(0.0).build();
        assert!(zero_timeout.validate().is_err());

        let negative = ConfigBuilder::new().total_budget(-1.0).build();
        assert!(negative.validate().is_err());
    }
}
