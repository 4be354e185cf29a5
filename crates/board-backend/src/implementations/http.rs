//! HTTP backend talking to the external order API.
//!
//! Endpoints, relative to `base_url`:
//! - `GET   /orders/{id}`             single order
//! - `GET   /orders`                  production list
//! - `PATCH /orders/status`           `{ "orderIds": [..], "status": "<stage>" }`
//! - `PATCH /orders/{id}/partner-2`   `{ "isByPartner_2": bool }`
//!
//! Responses may be wrapped in a `{ "data": ... }` envelope.

use crate::{
	unwrap_envelope, BackendError, BackendFactory, BackendRegistry, OrderBackendInterface,
};
use async_trait::async_trait;
use board_types::{
	ConfigSchema, Field, FieldType, ImplementationRegistry, Schema, SecretString, Stage,
	ValidationError,
};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde_json::{json, Value};
use std::time::Duration;

const DEFAULT_TIMEOUT_SECONDS: u64 = 30;

/// Order API client.
pub struct HttpOrderBackend {
	client: Client,
	base_url: String,
	auth_token: Option<SecretString>,
}

impl HttpOrderBackend {
	pub fn new(
		base_url: impl Into<String>,
		auth_token: Option<SecretString>,
		timeout: Duration,
	) -> Result<Self, BackendError> {
		let client = Client::builder()
			.pool_idle_timeout(Duration::from_secs(90))
			.timeout(timeout)
			.build()
			.map_err(|e| BackendError::Configuration(e.to_string()))?;

		Ok(Self {
			client,
			base_url: base_url.into().trim_end_matches('/').to_string(),
			auth_token: auth_token.filter(|token| !token.is_empty()),
		})
	}

	fn url(&self, path: &str) -> String {
		format!("{}{}", self.base_url, path)
	}

	/// URL below `/orders/{id}` with the id escaped as one path segment.
	fn order_url(&self, order_id: &str, suffix: &str) -> String {
		self.url(&format!("/orders/{}{}", urlencoding::encode(order_id), suffix))
	}

	fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
		match &self.auth_token {
			Some(token) => token.with_exposed(|t| request.bearer_auth(t)),
			None => request,
		}
	}

	async fn send(&self, request: RequestBuilder, order_id: Option<&str>) -> Result<Response, BackendError> {
		let response = self
			.authorize(request)
			.send()
			.await
			.map_err(|e| BackendError::Network(e.to_string()))?;

		let status = response.status();
		if status.is_success() {
			return Ok(response);
		}
		if status == StatusCode::NOT_FOUND {
			if let Some(id) = order_id {
				return Err(BackendError::NotFound(id.to_string()));
			}
		}
		let message = response.text().await.unwrap_or_default();
		Err(BackendError::Api {
			status: status.as_u16(),
			message,
		})
	}

	async fn json_body(response: Response) -> Result<Value, BackendError> {
		let body = response
			.json::<Value>()
			.await
			.map_err(|e| BackendError::InvalidResponse(e.to_string()))?;
		Ok(unwrap_envelope(body))
	}
}

#[async_trait]
impl OrderBackendInterface for HttpOrderBackend {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(HttpOrderBackendSchema)
	}

	async fn fetch_order(&self, order_id: &str) -> Result<Value, BackendError> {
		let request = self.client.get(self.order_url(order_id, ""));
		let response = self.send(request, Some(order_id)).await?;
		Self::json_body(response).await
	}

	async fn list_orders(&self) -> Result<Vec<Value>, BackendError> {
		let response = self.send(self.client.get(self.url("/orders")), None).await?;
		match Self::json_body(response).await? {
			Value::Array(orders) => Ok(orders),
			other => Err(BackendError::InvalidResponse(format!(
				"Expected an order array, got {}",
				json_kind(&other)
			))),
		}
	}

	async fn update_order_status(&self, order_ids: &[String], stage: Stage) -> Result<(), BackendError> {
		let request = self
			.client
			.patch(self.url("/orders/status"))
			.json(&json!({ "orderIds": order_ids, "status": stage.as_str() }));
		// The response body is not used; success triggers a refetch
		self.send(request, None).await?;
		Ok(())
	}

	async fn update_partner_2(&self, order_id: &str, value: bool) -> Result<Value, BackendError> {
		let request = self
			.client
			.patch(self.order_url(order_id, "/partner-2"))
			.json(&json!({ "isByPartner_2": value }));
		let response = self.send(request, Some(order_id)).await?;
		Self::json_body(response).await
	}
}

fn json_kind(value: &Value) -> &'static str {
	match value {
		Value::Null => "null",
		Value::Bool(_) => "boolean",
		Value::Number(_) => "number",
		Value::String(_) => "string",
		Value::Array(_) => "array",
		Value::Object(_) => "object",
	}
}

/// Configuration schema for the HTTP backend.
pub struct HttpOrderBackendSchema;

impl ConfigSchema for HttpOrderBackendSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let schema = Schema::new(
			vec![Field::new("base_url", FieldType::String).with_validator(|value| {
				match value.as_str() {
					Some(url) if url.starts_with("http://") || url.starts_with("https://") => Ok(()),
					_ => Err("base_url must start with http:// or https://".to_string()),
				}
			})],
			vec![
				Field::new("auth_token", FieldType::String),
				Field::new(
					"timeout_seconds",
					FieldType::Integer {
						min: Some(1),
						max: Some(300),
					},
				),
			],
		);
		schema.validate(config)
	}
}

/// Factory function to create the HTTP backend from configuration.
///
/// Configuration parameters:
/// - `base_url`: order API root (required)
/// - `auth_token`: bearer token (optional)
/// - `timeout_seconds`: request timeout, 1 to 300 (default 30)
pub fn create_backend(config: &toml::Value) -> Result<Box<dyn OrderBackendInterface>, BackendError> {
	HttpOrderBackendSchema
		.validate(config)
		.map_err(|e| BackendError::Configuration(e.to_string()))?;

	let base_url = config
		.get("base_url")
		.and_then(|v| v.as_str())
		.ok_or_else(|| BackendError::Configuration("base_url is required".into()))?;
	let auth_token = config
		.get("auth_token")
		.and_then(|v| v.as_str())
		.map(SecretString::from);
	let timeout_seconds = config
		.get("timeout_seconds")
		.and_then(|v| v.as_integer())
		.map(|n| n as u64)
		.unwrap_or(DEFAULT_TIMEOUT_SECONDS);

	let backend = HttpOrderBackend::new(base_url, auth_token, Duration::from_secs(timeout_seconds))?;
	Ok(Box::new(backend))
}

/// Registry for the HTTP backend implementation.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "http";
	type Factory = BackendFactory;

	fn factory() -> Self::Factory {
		create_backend
	}
}

impl BackendRegistry for Registry {}
