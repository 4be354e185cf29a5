//! Configuration module for the production board.
//!
//! Configuration is read from TOML. String values may reference environment
//! variables as `${VAR}` or `${VAR:-default}`, which keeps the order API
//! token out of the file.
//!
//! ## Modular Configuration Support
//!
//! Configurations can be split into multiple files:
//! - Use `include = ["backend.toml", "api.toml"]` to include other config files
//! - Each top-level section must be unique across all files (no duplicates allowed)

mod loader;

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
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
		// Only the message; the full error repeats the whole input
		ConfigError::Parse(err.message().to_string())
	}
}

/// Main configuration structure for the production board.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
	/// Identity of this board instance.
	pub board: BoardConfig,
	/// Order API backends.
	pub backend: BackendConfig,
	/// Snapshot storage for the order list.
	pub storage: StorageConfig,
	/// Timing of the confirmed transition sequence.
	#[serde(default)]
	pub transition: TransitionConfig,
	/// Dashboard routes used by navigation actions.
	#[serde(default)]
	pub routes: RoutesConfig,
	/// Configuration for the HTTP API server.
	pub api: Option<ApiConfig>,
}

/// Identity of this board instance.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BoardConfig {
	/// Identifier used in logs.
	pub id: String,
}

/// Configuration for the order API backend.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BackendConfig {
	/// Which implementation to use as primary.
	pub primary: String,
	/// Map of backend implementation names to their raw configurations.
	pub implementations: HashMap<String, toml::Value>,
}

/// Configuration for the snapshot storage.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
	/// Which implementation to use as primary.
	pub primary: String,
	/// Map of storage implementation names to their raw configurations.
	pub implementations: HashMap<String, toml::Value>,
}

/// Timing of the confirmed transition sequence.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TransitionConfig {
	/// Wait between the status update and the refetch, giving the order
	/// API time to settle its history.
	#[serde(default = "default_settle_delay_ms")]
	pub settle_delay_ms: u64,
	/// Hold-off before secondary actions become clickable again after a
	/// partner action.
	#[serde(default = "default_secondary_enable_delay_ms")]
	pub secondary_enable_delay_ms: u64,
	/// Lifetime of an unconfirmed transition request.
	#[serde(default = "default_confirmation_ttl_seconds")]
	pub confirmation_ttl_seconds: u64,
}

impl TransitionConfig {
	pub fn settle_delay(&self) -> Duration {
		Duration::from_millis(self.settle_delay_ms)
	}

	pub fn secondary_enable_delay(&self) -> Duration {
		Duration::from_millis(self.secondary_enable_delay_ms)
	}

	pub fn confirmation_ttl(&self) -> Duration {
		Duration::from_secs(self.confirmation_ttl_seconds)
	}
}

impl Default for TransitionConfig {
	fn default() -> Self {
		Self {
			settle_delay_ms: default_settle_delay_ms(),
			secondary_enable_delay_ms: default_secondary_enable_delay_ms(),
			confirmation_ttl_seconds: default_confirmation_ttl_seconds(),
		}
	}
}

fn default_settle_delay_ms() -> u64 {
	300
}

fn default_secondary_enable_delay_ms() -> u64 {
	500
}

fn default_confirmation_ttl_seconds() -> u64 {
	300
}

/// Dashboard routes that navigation actions point to.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RoutesConfig {
	/// Shaft order page; receives `?orderId=<id>`.
	#[serde(default = "default_shaft_order_route")]
	pub shaft_order: String,
	/// Order creation flow for the early stages; receives `?orderId=<id>&stage=<card id>`.
	#[serde(default = "default_order_creation_route")]
	pub order_creation: String,
}

impl Default for RoutesConfig {
	fn default() -> Self {
		Self {
			shaft_order: default_shaft_order_route(),
			order_creation: default_order_creation_route(),
		}
	}
}

fn default_shaft_order_route() -> String {
	"/dashboard/custom-shafts".to_string()
}

fn default_order_creation_route() -> String {
	"/dashboard/order-creation".to_string()
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
	/// Request timeout in seconds.
	#[serde(default = "default_api_timeout")]
	pub timeout_seconds: u64,
	/// CORS configuration; permissive when absent.
	pub cors: Option<CorsConfig>,
}

/// CORS configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CorsConfig {
	/// Allowed origins for CORS.
	pub allowed_origins: Vec<String>,
}

fn default_api_host() -> String {
	"127.0.0.1".to_string()
}

fn default_api_port() -> u16 {
	3000
}

fn default_api_timeout() -> u64 {
	30
}

/// Resolves environment variables in a string.
///
/// Replaces ${VAR_NAME} with the value of the environment variable VAR_NAME.
/// Supports default values with ${VAR_NAME:-default_value}.
///
/// Input strings are limited to 1MB.
pub(crate) fn resolve_env_vars(input: &str) -> Result<String, ConfigError> {
	const MAX_INPUT_SIZE: usize = 1024 * 1024;
	if input.len() > MAX_INPUT_SIZE {
		return Err(ConfigError::Validation(format!(
			"Configuration file too large: {} bytes (max: {} bytes)",
			input.len(),
			MAX_INPUT_SIZE
		)));
	}

	let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]{0,127})(?::-([^}]{0,256}))?\}")
		.map_err(|e| ConfigError::Parse(format!("Regex error: {}", e)))?;

	let mut missing = None;
	let resolved = re.replace_all(input, |caps: &regex::Captures<'_>| {
		let var_name = &caps[1];
		match (std::env::var(var_name), caps.get(2)) {
			(Ok(value), _) => value,
			(Err(_), Some(default)) => default.as_str().to_string(),
			(Err(_), None) => {
				missing.get_or_insert_with(|| var_name.to_string());
				String::new()
			},
		}
	});

	match missing {
		Some(var_name) => Err(ConfigError::Validation(format!(
			"Environment variable '{}' not found",
			var_name
		))),
		None => Ok(resolved.into_owned()),
	}
}

impl Config {
	/// Loads configuration from a file, resolving includes and environment
	/// variables.
	pub async fn from_file(path: &str) -> Result<Self, ConfigError> {
		let path_buf = Path::new(path);
		let base_dir = path_buf.parent().unwrap_or_else(|| Path::new("."));

		let mut loader = loader::ConfigLoader::new(base_dir);
		let file_name = path_buf
			.file_name()
			.ok_or_else(|| ConfigError::Validation(format!("Invalid path: {}", path)))?;
		loader.load_config(file_name).await
	}

	/// Validates the configuration.
	///
	/// - Board ID must not be empty
	/// - Primary backend and storage must name a configured implementation
	/// - Transition delays must stay within bounds
	/// - Routes must be absolute dashboard paths
	fn validate(&self) -> Result<(), ConfigError> {
		if self.board.id.trim().is_empty() {
			return Err(ConfigError::Validation("Board ID cannot be empty".into()));
		}

		validate_primary("backend", &self.backend.primary, &self.backend.implementations)?;
		validate_primary("storage", &self.storage.primary, &self.storage.implementations)?;

		let transition = &self.transition;
		if transition.settle_delay_ms > 10_000 {
			return Err(ConfigError::Validation(
				"transition.settle_delay_ms cannot exceed 10000".into(),
			));
		}
		if transition.secondary_enable_delay_ms > 10_000 {
			return Err(ConfigError::Validation(
				"transition.secondary_enable_delay_ms cannot exceed 10000".into(),
			));
		}
		if !(1..=3600).contains(&transition.confirmation_ttl_seconds) {
			return Err(ConfigError::Validation(
				"transition.confirmation_ttl_seconds must be between 1 and 3600".into(),
			));
		}

		for (name, route) in [
			("shaft_order", &self.routes.shaft_order),
			("order_creation", &self.routes.order_creation),
		] {
			if !route.starts_with('/') {
				return Err(ConfigError::Validation(format!(
					"routes.{} must start with '/': {}",
					name, route
				)));
			}
		}

		if let Some(api) = self.api.as_ref().filter(|api| api.enabled) {
			if api.port == 0 {
				return Err(ConfigError::Validation("api.port cannot be 0".into()));
			}
			if api.timeout_seconds == 0 {
				return Err(ConfigError::Validation(
					"api.timeout_seconds must be greater than 0".into(),
				));
			}
		}

		Ok(())
	}

	/// A complete configuration backed by the in-memory implementations.
	#[cfg(any(test, feature = "testing"))]
	pub fn for_testing() -> Self {
		let empty = || toml::Value::Table(toml::map::Map::new());
		Config {
			board: BoardConfig {
				id: "test-board".to_string(),
			},
			backend: BackendConfig {
				primary: "memory".to_string(),
				implementations: HashMap::from([("memory".to_string(), empty())]),
			},
			storage: StorageConfig {
				primary: "memory".to_string(),
				implementations: HashMap::from([("memory".to_string(), empty())]),
			},
			transition: TransitionConfig::default(),
			routes: RoutesConfig::default(),
			api: None,
		}
	}
}

fn validate_primary(
	section: &str,
	primary: &str,
	implementations: &HashMap<String, toml::Value>,
) -> Result<(), ConfigError> {
	if implementations.is_empty() {
		return Err(ConfigError::Validation(format!(
			"At least one {} implementation must be configured",
			section
		)));
	}
	if primary.is_empty() {
		return Err(ConfigError::Validation(format!(
			"{} primary implementation cannot be empty",
			section
		)));
	}
	if !implementations.contains_key(primary) {
		return Err(ConfigError::Validation(format!(
			"Primary {} '{}' not found in implementations",
			section, primary
		)));
	}
	Ok(())
}

/// Parses and validates a configuration from a TOML string, resolving
/// environment variables first.
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

	const BASE_CONFIG: &str = r#"
[board]
id = "werkstatt"

[backend]
primary = "http"
[backend.implementations.http]
base_url = "https://api.example.com"
[backend.implementations.memory]

[storage]
primary = "memory"
[storage.implementations.memory]
"#;

	#[test]
	fn test_env_var_resolution() {
		std::env::set_var("BOARD_TEST_HOST", "localhost");
		std::env::set_var("BOARD_TEST_PORT", "8080");

		let input = "base_url = \"http://${BOARD_TEST_HOST}:${BOARD_TEST_PORT}\"";
		let result = resolve_env_vars(input).unwrap();
		assert_eq!(result, "base_url = \"http://localhost:8080\"");

		std::env::remove_var("BOARD_TEST_HOST");
		std::env::remove_var("BOARD_TEST_PORT");
	}

	#[test]
	fn test_env_var_with_default() {
		let input = "auth_token = \"${BOARD_MISSING_TOKEN:-dev-token}\"";
		let result = resolve_env_vars(input).unwrap();
		assert_eq!(result, "auth_token = \"dev-token\"");
	}

	#[test]
	fn test_missing_env_var_error() {
		let result = resolve_env_vars("auth_token = \"${BOARD_MISSING_TOKEN}\"");
		assert!(result.unwrap_err().to_string().contains("BOARD_MISSING_TOKEN"));
	}

	#[test]
	fn test_defaults_are_applied() {
		let config: Config = BASE_CONFIG.parse().unwrap();
		assert_eq!(config.board.id, "werkstatt");
		assert_eq!(config.transition.settle_delay(), Duration::from_millis(300));
		assert_eq!(config.transition.secondary_enable_delay(), Duration::from_millis(500));
		assert_eq!(config.routes.shaft_order, "/dashboard/custom-shafts");
		assert!(config.api.is_none());
	}

	#[test]
	fn test_unknown_primary_backend_rejected() {
		let config_str = BASE_CONFIG.replace("primary = \"http\"", "primary = \"graphql\"");
		let err = Config::from_str(&config_str).unwrap_err();
		assert!(err
			.to_string()
			.contains("Primary backend 'graphql' not found in implementations"));
	}

	#[test]
	fn test_transition_bounds_rejected() {
		let config_str = format!("{}\n[transition]\nsettle_delay_ms = 60000\n", BASE_CONFIG);
		let err = Config::from_str(&config_str).unwrap_err();
		assert!(err.to_string().contains("settle_delay_ms"));

		let config_str = format!("{}\n[transition]\nconfirmation_ttl_seconds = 0\n", BASE_CONFIG);
		assert!(Config::from_str(&config_str).is_err());
	}

	#[test]
	fn test_relative_route_rejected() {
		let config_str = format!("{}\n[routes]\nshaft_order = \"custom-shafts\"\n", BASE_CONFIG);
		let err = Config::from_str(&config_str).unwrap_err();
		assert!(err.to_string().contains("routes.shaft_order"));
	}

	#[test]
	fn test_api_section() {
		let config_str = format!(
			"{}\n[api]\nenabled = true\nport = 8088\n[api.cors]\nallowed_origins = [\"http://localhost:5173\"]\n",
			BASE_CONFIG
		);
		let config = Config::from_str(&config_str).unwrap();
		let api = config.api.unwrap();
		assert_eq!(api.host, "127.0.0.1");
		assert_eq!(api.port, 8088);
		assert_eq!(api.cors.unwrap().allowed_origins.len(), 1);
	}
}
