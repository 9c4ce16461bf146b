//! Configuration module for the fulfillment engine.
//!
//! This module provides structures and utilities for managing engine
//! configuration. It supports loading configuration from TOML files with
//! environment variable resolution, and validates that all required
//! configuration values are properly set.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;
use thiserror::Error;

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
	/// Error that occurs during file I/O operations.
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),
	/// Error that occurs when parsing TOML configuration.
	#[error("Configuration error: {0}")]
	Parse(String),
	/// Error that occurs when configuration validation fails.
	#[error("Validation error: {0}")]
	Validation(String),
}

impl From<toml::de::Error> for ConfigError {
	fn from(err: toml::de::Error) -> Self {
		// Extract just the message without the huge input dump
		let message = err.message().to_string();
		ConfigError::Parse(message)
	}
}

/// Main configuration structure for the fulfillment engine.
///
/// This structure contains all configuration sections required for the
/// engine to operate, including service identity, pipeline timings,
/// storage and gateway backends, and the HTTP API server.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
	/// Configuration specific to the service instance.
	pub service: ServiceConfig,
	/// Configuration for pipeline timings and policy thresholds.
	pub engine: EngineConfig,
	/// Configuration for the storage backend.
	pub storage: StorageConfig,
	/// Configuration for the payment gateway provider.
	pub gateway: GatewayConfig,
	/// Configuration for the HTTP API server.
	pub api: Option<ApiConfig>,
}

/// Configuration specific to the service instance.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServiceConfig {
	/// Unique identifier for this engine instance.
	pub id: String,
}

/// Configuration for pipeline timings and policy thresholds.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EngineConfig {
	/// Interval in seconds between automated-advancer sweeps.
	#[serde(default = "default_advancer_interval")]
	pub advancer_interval_seconds: u64,
	/// Interval in seconds between reconciliation sweeps over
	/// indeterminate ledger entries.
	#[serde(default = "default_reconcile_interval")]
	pub reconcile_interval_seconds: u64,
	/// Deadline in seconds for a single gateway call.
	#[serde(default = "default_gateway_timeout")]
	pub gateway_timeout_seconds: u64,
	/// Days without order activity before a stuck alert is raised.
	#[serde(default = "default_stuck_threshold_days")]
	pub stuck_threshold_days: u64,
	/// Days after purchase before missing tracking raises an alert.
	#[serde(default = "default_tracking_grace_days")]
	pub tracking_grace_days: u64,
	/// Days in transit before a delivery SLA warning is raised.
	#[serde(default = "default_sla_warning_days")]
	pub sla_warning_days: u64,
	/// Minimum length of operator-supplied reason strings.
	#[serde(default = "default_min_reason_length")]
	pub min_reason_length: usize,
	/// Offset from UTC, in hours, of the business day used for
	/// daily and monthly KPI windows.
	#[serde(default = "default_business_utc_offset")]
	pub business_utc_offset_hours: i64,
	/// Retention in seconds for idempotency records.
	#[serde(default = "default_idempotency_ttl")]
	pub idempotency_ttl_seconds: u64,
}

fn default_advancer_interval() -> u64 {
	60
}

fn default_reconcile_interval() -> u64 {
	300
}

fn default_gateway_timeout() -> u64 {
	10
}

fn default_stuck_threshold_days() -> u64 {
	7
}

fn default_tracking_grace_days() -> u64 {
	5
}

fn default_sla_warning_days() -> u64 {
	5
}

fn default_min_reason_length() -> usize {
	5
}

fn default_business_utc_offset() -> i64 {
	3
}

fn default_idempotency_ttl() -> u64 {
	86400
}

impl Default for EngineConfig {
	fn default() -> Self {
		Self {
			advancer_interval_seconds: default_advancer_interval(),
			reconcile_interval_seconds: default_reconcile_interval(),
			gateway_timeout_seconds: default_gateway_timeout(),
			stuck_threshold_days: default_stuck_threshold_days(),
			tracking_grace_days: default_tracking_grace_days(),
			sla_warning_days: default_sla_warning_days(),
			min_reason_length: default_min_reason_length(),
			business_utc_offset_hours: default_business_utc_offset(),
			idempotency_ttl_seconds: default_idempotency_ttl(),
		}
	}
}

/// Configuration for the storage backend.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
	/// Which implementation to use as primary.
	pub primary: String,
	/// Map of storage implementation names to their configurations.
	pub implementations: HashMap<String, toml::Value>,
	/// Interval in seconds for cleaning up expired storage entries.
	#[serde(default = "default_cleanup_interval")]
	pub cleanup_interval_seconds: u64,
}

fn default_cleanup_interval() -> u64 {
	600
}

/// Configuration for the payment gateway provider.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GatewayConfig {
	/// Which implementation to use as primary.
	pub primary: String,
	/// Map of gateway implementation names to their configurations.
	pub implementations: HashMap<String, toml::Value>,
}

/// Configuration for the HTTP API server.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiConfig {
	/// Whether the API server is enabled.
	#[serde(default)]
	pub enabled: bool,
	/// Host address to bind the server to.
	#[serde(default = "default_api_host")]
	pub host: String,
	/// Port to bind the server to.
	#[serde(default = "default_api_port")]
	pub port: u16,
}

fn default_api_host() -> String {
	"127.0.0.1".to_string()
}

fn default_api_port() -> u16 {
	3000
}

/// Resolves environment variables in a string.
///
/// Replaces ${VAR_NAME} with the value of the environment variable VAR_NAME.
/// Supports default values with ${VAR_NAME:-default_value}.
///
/// Input strings are limited to 1MB to prevent ReDoS attacks.
fn resolve_env_vars(input: &str) -> Result<String, ConfigError> {
	const MAX_INPUT_SIZE: usize = 1024 * 1024; // 1MB
	if input.len() > MAX_INPUT_SIZE {
		return Err(ConfigError::Validation(format!(
			"Configuration file too large: {} bytes (max: {} bytes)",
			input.len(),
			MAX_INPUT_SIZE
		)));
	}

	let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]{0,127})(?::-([^}]{0,256}))?\}")
		.map_err(|e| ConfigError::Parse(format!("Regex error: {}", e)))?;

	let mut result = input.to_string();
	let mut replacements = Vec::new();

	for cap in re.captures_iter(input) {
		let full_match = cap.get(0).unwrap();
		let var_name = cap.get(1).unwrap().as_str();
		let default_value = cap.get(2).map(|m| m.as_str());

		let value = match std::env::var(var_name) {
			Ok(v) => v,
			Err(_) => {
				if let Some(default) = default_value {
					default.to_string()
				} else {
					return Err(ConfigError::Validation(format!(
						"Environment variable '{}' not found",
						var_name
					)));
				}
			},
		};

		replacements.push((full_match.start(), full_match.end(), value));
	}

	// Apply replacements in reverse order to maintain positions
	for (start, end, value) in replacements.iter().rev() {
		result.replace_range(start..end, value);
	}

	Ok(result)
}

impl Config {
	/// Loads configuration from a TOML file with environment variable
	/// resolution. The configuration is validated after parsing.
	pub fn from_file(path: &str) -> Result<Self, ConfigError> {
		let content = std::fs::read_to_string(path)?;
		content.parse()
	}

	/// Validates the configuration to ensure all required fields are
	/// properly set.
	fn validate(&self) -> Result<(), ConfigError> {
		if self.service.id.is_empty() {
			return Err(ConfigError::Validation(
				"Service ID cannot be empty".into(),
			));
		}

		// Validate engine config
		if self.engine.advancer_interval_seconds == 0 {
			return Err(ConfigError::Validation(
				"advancer_interval_seconds must be greater than 0".into(),
			));
		}
		if self.engine.reconcile_interval_seconds == 0 {
			return Err(ConfigError::Validation(
				"reconcile_interval_seconds must be greater than 0".into(),
			));
		}
		if self.engine.gateway_timeout_seconds == 0 {
			return Err(ConfigError::Validation(
				"gateway_timeout_seconds must be greater than 0".into(),
			));
		}
		if self.engine.min_reason_length == 0 {
			return Err(ConfigError::Validation(
				"min_reason_length must be greater than 0".into(),
			));
		}
		if self.engine.business_utc_offset_hours.abs() > 14 {
			return Err(ConfigError::Validation(
				"business_utc_offset_hours must be a valid UTC offset".into(),
			));
		}

		// Validate storage config
		if self.storage.implementations.is_empty() {
			return Err(ConfigError::Validation(
				"At least one storage implementation must be configured".into(),
			));
		}
		if !self
			.storage
			.implementations
			.contains_key(&self.storage.primary)
		{
			return Err(ConfigError::Validation(format!(
				"Primary storage '{}' not found in implementations",
				self.storage.primary
			)));
		}
		if self.storage.cleanup_interval_seconds == 0 {
			return Err(ConfigError::Validation(
				"Storage cleanup_interval_seconds must be greater than 0".into(),
			));
		}

		// Validate gateway config
		if self.gateway.implementations.is_empty() {
			return Err(ConfigError::Validation(
				"At least one gateway implementation must be configured".into(),
			));
		}
		if !self
			.gateway
			.implementations
			.contains_key(&self.gateway.primary)
		{
			return Err(ConfigError::Validation(format!(
				"Primary gateway '{}' not found in implementations",
				self.gateway.primary
			)));
		}

		Ok(())
	}
}

/// Implementation of FromStr trait for Config to enable parsing from string.
///
/// Environment variables are resolved and the configuration is
/// automatically validated after parsing.
impl FromStr for Config {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let resolved = resolve_env_vars(s)?;
		let config: Config = toml::from_str(&resolved)?;
		config.validate()?;
		Ok(config)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::fs;
	use tempfile::TempDir;

	const VALID_CONFIG: &str = r#"
[service]
id = "fulfillment-test"

[engine]
advancer_interval_seconds = 60
gateway_timeout_seconds = 10

[storage]
primary = "memory"
cleanup_interval_seconds = 600
[storage.implementations.memory]

[gateway]
primary = "mock"
[gateway.implementations.mock]

[api]
enabled = true
port = 3100
"#;

	#[test]
	fn test_parse_valid_config() {
		let config: Config = VALID_CONFIG.parse().unwrap();
		assert_eq!(config.service.id, "fulfillment-test");
		assert_eq!(config.engine.advancer_interval_seconds, 60);
		// Unspecified engine fields fall back to defaults
		assert_eq!(config.engine.stuck_threshold_days, 7);
		assert_eq!(config.engine.min_reason_length, 5);
		assert_eq!(config.api.unwrap().port, 3100);
	}

	#[test]
	fn test_load_from_file() {
		let temp_dir = TempDir::new().unwrap();
		let config_path = temp_dir.path().join("config.toml");
		fs::write(&config_path, VALID_CONFIG).unwrap();

		let config = Config::from_file(config_path.to_str().unwrap()).unwrap();
		assert_eq!(config.service.id, "fulfillment-test");
	}

	#[test]
	fn test_primary_must_exist_in_implementations() {
		let bad = VALID_CONFIG.replace("primary = \"memory\"", "primary = \"file\"");
		let result: Result<Config, _> = bad.parse();
		assert!(matches!(result, Err(ConfigError::Validation(_))));
	}

	#[test]
	fn test_env_var_resolution_with_default() {
		let with_env = VALID_CONFIG.replace(
			"id = \"fulfillment-test\"",
			"id = \"${FULFILLMENT_TEST_UNSET_ID:-from-default}\"",
		);
		let config: Config = with_env.parse().unwrap();
		assert_eq!(config.service.id, "from-default");
	}

	#[test]
	fn test_missing_env_var_without_default_errors() {
		let with_env = VALID_CONFIG.replace(
			"id = \"fulfillment-test\"",
			"id = \"${FULFILLMENT_TEST_UNSET_ID}\"",
		);
		let result: Result<Config, _> = with_env.parse();
		assert!(matches!(result, Err(ConfigError::Validation(_))));
	}
}
