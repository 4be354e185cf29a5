//! In-memory simulation of the order API.
//!
//! Mirrors how the real API records progress: moving an order to a stage
//! finishes every earlier open stage, starts the target stage and sets the
//! order-level status. Moving an order to the stage it is already working
//! on finishes that stage.

use crate::{BackendError, BackendFactory, BackendRegistry, OrderBackendInterface};
use async_trait::async_trait;
use board_types::{
	ConfigSchema, Field, FieldType, ImplementationRegistry, Order, RawOrder,
	RawStageHistoryEntry, Schema, Stage, ValidationError,
};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Simulated order API holding normalized orders.
pub struct MemoryOrderBackend {
	orders: Arc<RwLock<BTreeMap<String, Order>>>,
}

impl MemoryOrderBackend {
	pub fn new() -> Self {
		Self {
			orders: Arc::new(RwLock::new(BTreeMap::new())),
		}
	}

	/// Creates a backend pre-filled with orders.
	pub fn with_orders(orders: impl IntoIterator<Item = Order>) -> Self {
		let orders = orders.into_iter().map(|o| (o.id.clone(), o)).collect();
		Self {
			orders: Arc::new(RwLock::new(orders)),
		}
	}

	/// Loads orders from a JSON array in the order API's shape.
	pub fn from_seed(json: &str) -> Result<Self, BackendError> {
		let raw: Vec<RawOrder> = serde_json::from_str(json)
			.map_err(|e| BackendError::Configuration(format!("Invalid seed file: {}", e)))?;
		let orders = raw
			.into_iter()
			.map(Order::try_from)
			.collect::<Result<Vec<_>, _>>()
			.map_err(|e| BackendError::Configuration(format!("Invalid seed order: {}", e)))?;
		Ok(Self::with_orders(orders))
	}
}

impl Default for MemoryOrderBackend {
	fn default() -> Self {
		Self::new()
	}
}

fn advance(order: &mut Order, stage: Stage, now: &str) {
	for earlier in Stage::ALL.into_iter().take(stage.index()) {
		if order.history.is_open(earlier) {
			order.history.mark_finished(earlier, now);
		}
	}

	let already_current = order.current_stage == Some(stage);
	if already_current && order.history.is_open(stage) {
		order.history.mark_finished(stage, now);
	} else if !order.history.has_started(stage) {
		order.history.mark_started(stage, now);
	}
	order.set_status(stage.as_str());
}

/// Renders an order in the order API's wire shape.
fn to_wire(order: &Order) -> Result<Value, BackendError> {
	let raw = RawOrder {
		id: Some(order.id.clone()),
		document_id: None,
		status: order.status.clone(),
		status_history: order
			.history
			.entries()
			.into_iter()
			.map(|entry| RawStageHistoryEntry {
				status: entry.status.as_str().to_string(),
				started: entry.started,
				finished: entry.finished,
				..Default::default()
			})
			.collect(),
		is_by_partner_1: Some(order.partner.by_partner_1),
		is_by_partner_2: Some(order.partner.by_partner_2),
		is_panding: Some(order.partner.pending),
		employee: order.employee.clone(),
	};
	serde_json::to_value(raw).map_err(|e| BackendError::InvalidResponse(e.to_string()))
}

#[async_trait]
impl OrderBackendInterface for MemoryOrderBackend {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(MemoryOrderBackendSchema)
	}

	async fn fetch_order(&self, order_id: &str) -> Result<Value, BackendError> {
		let orders = self.orders.read().await;
		let order = orders
			.get(order_id)
			.ok_or_else(|| BackendError::NotFound(order_id.to_string()))?;
		to_wire(order)
	}

	async fn list_orders(&self) -> Result<Vec<Value>, BackendError> {
		let orders = self.orders.read().await;
		orders.values().map(to_wire).collect()
	}

	async fn update_order_status(&self, order_ids: &[String], stage: Stage) -> Result<(), BackendError> {
		let mut orders = self.orders.write().await;
		// All-or-nothing, like the real endpoint
		if let Some(missing) = order_ids.iter().find(|id| !orders.contains_key(*id)) {
			return Err(BackendError::NotFound(missing.clone()));
		}

		let now = chrono::Utc::now().to_rfc3339();
		for id in order_ids {
			if let Some(order) = orders.get_mut(id) {
				advance(order, stage, &now);
			}
		}
		Ok(())
	}

	async fn update_partner_2(&self, order_id: &str, value: bool) -> Result<Value, BackendError> {
		let mut orders = self.orders.write().await;
		let order = orders
			.get_mut(order_id)
			.ok_or_else(|| BackendError::NotFound(order_id.to_string()))?;
		order.partner.by_partner_2 = value;
		to_wire(order)
	}
}

/// Configuration schema for the memory backend.
pub struct MemoryOrderBackendSchema;

impl ConfigSchema for MemoryOrderBackendSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		Schema::new(vec![], vec![Field::new("seed_file", FieldType::String)]).validate(config)
	}
}

/// Factory function to create the memory backend from configuration.
///
/// Configuration parameters:
/// - `seed_file`: JSON file with an array of orders to start with (optional)
pub fn create_backend(config: &toml::Value) -> Result<Box<dyn OrderBackendInterface>, BackendError> {
	MemoryOrderBackendSchema
		.validate(config)
		.map_err(|e| BackendError::Configuration(e.to_string()))?;

	let backend = match config.get("seed_file").and_then(|v| v.as_str()) {
		Some(path) => {
			let json = std::fs::read_to_string(path).map_err(|e| {
				BackendError::Configuration(format!("Cannot read seed file {}: {}", path, e))
			})?;
			let backend = MemoryOrderBackend::from_seed(&json)?;
			tracing::info!(seed_file = %path, "Loaded seed orders");
			backend
		},
		None => MemoryOrderBackend::new(),
	};
	Ok(Box::new(backend))
}

/// Registry for the memory backend implementation.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "memory";
	type Factory = BackendFactory;

	fn factory() -> Self::Factory {
		create_backend
	}
}

impl BackendRegistry for Registry {}

#[cfg(test)]
mod tests {
	use super::*;
	use std::io::Write;

	async fn fetch(backend: &MemoryOrderBackend, id: &str) -> Order {
		Order::from_value(backend.fetch_order(id).await.unwrap()).unwrap()
	}

	#[tokio::test]
	async fn test_status_update_finishes_open_stages_and_starts_target() {
		let backend = MemoryOrderBackend::with_orders([Order::new("o-1")
			.with_status("Leistenerstellung")
			.with_entry(Stage::Leistenerstellung, Some("t1"), None)]);

		backend
			.update_order_status(&["o-1".to_string()], Stage::Bettungsherstellung)
			.await
			.unwrap();

		let order = fetch(&backend, "o-1").await;
		assert!(order.history.is_finished(Stage::Leistenerstellung));
		assert!(order.history.is_open(Stage::Bettungsherstellung));
		assert_eq!(order.current_stage, Some(Stage::Bettungsherstellung));
	}

	#[tokio::test]
	async fn test_status_update_on_current_stage_finishes_it() {
		let backend = MemoryOrderBackend::with_orders([Order::new("o-1")
			.with_status("Geliefert")
			.with_entry(Stage::Geliefert, Some("t1"), None)]);

		backend
			.update_order_status(&["o-1".to_string()], Stage::Geliefert)
			.await
			.unwrap();

		let order = fetch(&backend, "o-1").await;
		assert!(order.history.is_finished(Stage::Geliefert));
		assert_eq!(order.current_stage, Some(Stage::Geliefert));
	}

	#[tokio::test]
	async fn test_unknown_order_rejects_whole_batch() {
		let backend = MemoryOrderBackend::with_orders([Order::new("o-1")]);
		let err = backend
			.update_order_status(&["o-1".to_string(), "o-9".to_string()], Stage::Leistenerstellung)
			.await
			.unwrap_err();

		assert!(matches!(err, BackendError::NotFound(id) if id == "o-9"));
		assert!(fetch(&backend, "o-1").await.history.is_empty());
	}

	#[tokio::test]
	async fn test_partner_flag_is_returned_in_wire_shape() {
		let backend = MemoryOrderBackend::with_orders([Order::new("o-1")]);
		let updated = backend.update_partner_2("o-1", true).await.unwrap();

		assert_eq!(updated["isByPartner_2"], true);
		assert_eq!(updated["isPanding"], false);
		assert!(updated["statusHistory"].as_array().unwrap().is_empty());
	}

	#[tokio::test]
	async fn test_factory_loads_seed_file() {
		let mut seed = tempfile::NamedTempFile::new().unwrap();
		write!(
			seed,
			r#"[{{"_id": "o-1", "status": "Schafterstellung", "statusHistory": [
				{{"status": "Schafterstellung", "startedAt": "t1"}}
			], "isByPartner_1": true}}]"#
		)
		.unwrap();

		let config = toml::Value::Table(toml::map::Map::from_iter([(
			"seed_file".to_string(),
			toml::Value::String(seed.path().display().to_string()),
		)]));
		let backend = create_backend(&config).unwrap();

		let order = Order::from_value(backend.fetch_order("o-1").await.unwrap()).unwrap();
		assert!(order.history.is_open(Stage::Schafterstellung));
		assert!(order.partner.by_partner_1);
		assert_eq!(backend.list_orders().await.unwrap().len(), 1);
	}
}
