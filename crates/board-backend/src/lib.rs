//! Order API backend module for the production board.
//!
//! The board never owns order data. Orders are read from and mutated
//! through an external order API; this crate is the seam to it. The
//! `http` implementation talks to the real API, the `memory`
//! implementation simulates it for development and tests.

use async_trait::async_trait;
use board_types::{truncate_id, ConfigSchema, ImplementationRegistry, Stage};
use thiserror::Error;

pub mod implementations {
	pub mod http;
	pub mod memory;
}

/// Errors that can occur while talking to the order API.
#[derive(Debug, Error)]
pub enum BackendError {
	/// The request could not be sent or no response arrived.
	#[error("Network error: {0}")]
	Network(String),
	/// The API answered with a non-success status.
	#[error("Order API returned {status}: {message}")]
	Api { status: u16, message: String },
	/// The API does not know the order.
	#[error("Order not found: {0}")]
	NotFound(String),
	/// The API answered with a body the board cannot use.
	#[error("Invalid response: {0}")]
	InvalidResponse(String),
	/// Error that occurs during configuration validation.
	#[error("Configuration error: {0}")]
	Configuration(String),
}

/// Interface to the external order API.
///
/// Orders are returned as raw JSON; normalization into
/// [`board_types::Order`] happens in the board so that malformed payloads
/// degrade to a placeholder instead of failing the fetch.
#[cfg_attr(feature = "testing", mockall::automock)]
#[async_trait]
pub trait OrderBackendInterface: Send + Sync {
	/// Returns the configuration schema for this backend.
	fn config_schema(&self) -> Box<dyn ConfigSchema>;

	/// Fetches a single order.
	async fn fetch_order(&self, order_id: &str) -> Result<serde_json::Value, BackendError>;

	/// Fetches the orders shown in the production list.
	async fn list_orders(&self) -> Result<Vec<serde_json::Value>, BackendError>;

	/// Moves orders to a stage. The API records the history entries.
	async fn update_order_status(&self, order_ids: &[String], stage: Stage) -> Result<(), BackendError>;

	/// Sets the `isByPartner_2` flag and returns the updated order.
	async fn update_partner_2(
		&self,
		order_id: &str,
		value: bool,
	) -> Result<serde_json::Value, BackendError>;
}

/// Type alias for backend factory functions.
pub type BackendFactory = fn(&toml::Value) -> Result<Box<dyn OrderBackendInterface>, BackendError>;

/// Registry trait for order API backend implementations.
pub trait BackendRegistry: ImplementationRegistry<Factory = BackendFactory> {}

/// Get all registered backend implementations.
pub fn get_all_implementations() -> Vec<(&'static str, BackendFactory)> {
	use implementations::{http, memory};

	vec![
		(http::Registry::NAME, http::Registry::factory()),
		(memory::Registry::NAME, memory::Registry::factory()),
	]
}

/// Service wrapping the configured order API backend.
pub struct BackendService {
	backend: Box<dyn OrderBackendInterface>,
}

impl BackendService {
	pub fn new(backend: Box<dyn OrderBackendInterface>) -> Self {
		Self { backend }
	}

	/// Fetches a single order as raw JSON.
	pub async fn fetch_order(&self, order_id: &str) -> Result<serde_json::Value, BackendError> {
		tracing::debug!(order_id = %truncate_id(order_id), "Fetching order");
		self.backend.fetch_order(order_id).await
	}

	pub async fn list_orders(&self) -> Result<Vec<serde_json::Value>, BackendError> {
		let orders = self.backend.list_orders().await?;
		tracing::debug!(count = orders.len(), "Fetched order list");
		Ok(orders)
	}

	/// Moves a single order to `stage`.
	pub async fn update_order_status(&self, order_id: &str, stage: Stage) -> Result<(), BackendError> {
		tracing::debug!(order_id = %truncate_id(order_id), stage = %stage, "Updating order status");
		self.backend
			.update_order_status(&[order_id.to_string()], stage)
			.await
	}

	/// Sets `isByPartner_2` on an order.
	pub async fn update_partner_2(
		&self,
		order_id: &str,
		value: bool,
	) -> Result<serde_json::Value, BackendError> {
		tracing::debug!(order_id = %truncate_id(order_id), value, "Updating partner flag");
		self.backend.update_partner_2(order_id, value).await
	}
}

/// Unwraps a `{ "data": ... }` envelope if present.
///
/// The order API wraps most responses this way, but not all of them.
pub fn unwrap_envelope(value: serde_json::Value) -> serde_json::Value {
	match value {
		serde_json::Value::Object(mut map) if map.len() == 1 && map.contains_key("data") => {
			map.remove("data").unwrap_or(serde_json::Value::Null)
		},
		other => other,
	}
}
