//! Storage module for the production board.
//!
//! Holds the order snapshots behind the order list, so a confirmed
//! transition can patch a single order in place instead of reloading the
//! whole list. Backends are pluggable; the in-memory backend is the only
//! one shipped.

use async_trait::async_trait;
use board_types::{ConfigSchema, ImplementationRegistry, StorageKey};
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

pub mod implementations {
	pub mod memory;
}

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
	/// Error that occurs when a requested item is not found.
	#[error("Not found")]
	NotFound,
	/// Error that occurs during serialization/deserialization.
	#[error("Serialization error: {0}")]
	Serialization(String),
	/// Error that occurs in the storage backend.
	#[error("Backend error: {0}")]
	Backend(String),
	/// Error that occurs during configuration validation.
	#[error("Configuration error: {0}")]
	Configuration(String),
}

/// Low-level key-value interface implemented by storage backends.
#[async_trait]
pub trait StorageInterface: Send + Sync {
	/// Retrieves raw bytes for the given key.
	async fn get_bytes(&self, key: &str) -> Result<Vec<u8>, StorageError>;

	/// Stores raw bytes, replacing any previous value.
	async fn set_bytes(&self, key: &str, value: Vec<u8>) -> Result<(), StorageError>;

	/// Deletes the value associated with the given key.
	async fn delete(&self, key: &str) -> Result<(), StorageError>;

	/// Checks if a key exists in storage.
	async fn exists(&self, key: &str) -> Result<bool, StorageError>;

	/// Lists all keys starting with `prefix`, sorted.
	async fn list_keys(&self, prefix: &str) -> Result<Vec<String>, StorageError>;

	/// Returns the configuration schema for validation.
	fn config_schema(&self) -> Box<dyn ConfigSchema>;
}

/// Type alias for storage factory functions.
pub type StorageFactory = fn(&toml::Value) -> Result<Box<dyn StorageInterface>, StorageError>;

/// Registry trait for storage implementations.
pub trait StorageRegistry: ImplementationRegistry<Factory = StorageFactory> {}

/// Get all registered storage implementations.
pub fn get_all_implementations() -> Vec<(&'static str, StorageFactory)> {
	use implementations::memory;

	vec![(memory::Registry::NAME, memory::Registry::factory())]
}

/// Typed storage on top of a [`StorageInterface`] backend.
///
/// Values are stored as JSON under `<namespace>:<id>`.
pub struct StorageService {
	backend: Box<dyn StorageInterface>,
}

impl StorageService {
	pub fn new(backend: Box<dyn StorageInterface>) -> Self {
		Self { backend }
	}

	/// Stores a serializable value, creating or overwriting it.
	pub async fn store<T: Serialize>(
		&self,
		namespace: StorageKey,
		id: &str,
		data: &T,
	) -> Result<(), StorageError> {
		let bytes =
			serde_json::to_vec(data).map_err(|e| StorageError::Serialization(e.to_string()))?;
		self.backend.set_bytes(&key(namespace, id), bytes).await
	}

	/// Retrieves and deserializes a value.
	pub async fn retrieve<T: DeserializeOwned>(
		&self,
		namespace: StorageKey,
		id: &str,
	) -> Result<T, StorageError> {
		let bytes = self.backend.get_bytes(&key(namespace, id)).await?;
		serde_json::from_slice(&bytes).map_err(|e| StorageError::Serialization(e.to_string()))
	}

	/// Retrieves every value of a namespace, ordered by id.
	pub async fn retrieve_all<T: DeserializeOwned>(
		&self,
		namespace: StorageKey,
	) -> Result<Vec<T>, StorageError> {
		let prefix = format!("{}:", namespace.as_str());
		let mut values = Vec::new();
		for key in self.backend.list_keys(&prefix).await? {
			// A key may vanish between listing and reading
			match self.backend.get_bytes(&key).await {
				Ok(bytes) => values.push(
					serde_json::from_slice(&bytes)
						.map_err(|e| StorageError::Serialization(e.to_string()))?,
				),
				Err(StorageError::NotFound) => {
					tracing::debug!(key = %key, "Key removed while listing, skipping");
					continue;
				},
				Err(e) => return Err(e),
			}
		}
		Ok(values)
	}

	/// Updates an existing value.
	///
	/// Unlike [`store`](Self::store) this fails with `NotFound` when nothing
	/// is stored under the key yet.
	pub async fn update<T: Serialize>(
		&self,
		namespace: StorageKey,
		id: &str,
		data: &T,
	) -> Result<(), StorageError> {
		let key = key(namespace, id);
		if !self.backend.exists(&key).await? {
			tracing::debug!(key = %key, "Refusing update of missing entry");
			return Err(StorageError::NotFound);
		}
		let bytes =
			serde_json::to_vec(data).map_err(|e| StorageError::Serialization(e.to_string()))?;
		self.backend.set_bytes(&key, bytes).await
	}

	pub async fn remove(&self, namespace: StorageKey, id: &str) -> Result<(), StorageError> {
		self.backend.delete(&key(namespace, id)).await
	}

	pub async fn exists(&self, namespace: StorageKey, id: &str) -> Result<bool, StorageError> {
		self.backend.exists(&key(namespace, id)).await
	}
}

fn key(namespace: StorageKey, id: &str) -> String {
	format!("{}:{}", namespace.as_str(), id)
}

#[cfg(test)]
mod tests {
	use super::*;
	use board_types::{Order, Stage};
	use implementations::memory::MemoryStorage;

	fn service() -> StorageService {
		StorageService::new(Box::new(MemoryStorage::new()))
	}

	#[tokio::test]
	async fn test_order_snapshot_round_trip() {
		let storage = service();
		let order = Order::new("o-1")
			.with_status("Bettungsherstellung")
			.with_entry(Stage::Leistenerstellung, Some("t1"), Some("t2"));

		storage.store(StorageKey::Orders, &order.id, &order).await.unwrap();
		let restored: Order = storage.retrieve(StorageKey::Orders, "o-1").await.unwrap();
		assert_eq!(restored, order);
		assert!(storage.exists(StorageKey::Orders, "o-1").await.unwrap());
	}

	#[tokio::test]
	async fn test_update_requires_existing_value() {
		let storage = service();
		let order = Order::new("o-2");

		let result = storage.update(StorageKey::Orders, "o-2", &order).await;
		assert!(matches!(result, Err(StorageError::NotFound)));

		storage.store(StorageKey::Orders, "o-2", &order).await.unwrap();
		let patched = order.clone().with_status("Geliefert");
		storage.update(StorageKey::Orders, "o-2", &patched).await.unwrap();
		let restored: Order = storage.retrieve(StorageKey::Orders, "o-2").await.unwrap();
		assert_eq!(restored.current_stage, Some(Stage::Geliefert));
	}

	#[tokio::test]
	async fn test_retrieve_all_is_ordered_by_id() {
		let storage = service();
		for id in ["o-b", "o-a", "o-c"] {
			storage.store(StorageKey::Orders, id, &Order::new(id)).await.unwrap();
		}
		storage.remove(StorageKey::Orders, "o-c").await.unwrap();

		let orders: Vec<Order> = storage.retrieve_all(StorageKey::Orders).await.unwrap();
		let ids: Vec<_> = orders.iter().map(|o| o.id.as_str()).collect();
		assert_eq!(ids, vec!["o-a", "o-b"]);
	}
}
