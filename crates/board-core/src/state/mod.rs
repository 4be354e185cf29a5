//! Order snapshots behind the production list.
//!
//! The list holds the last known state of every order. After a transition
//! only the changed fields are patched in, so the list never needs a full
//! reload to reflect a single order's progress.

use board_storage::{StorageError, StorageService};
use board_types::{Order, OrderUpdate, StorageKey};
use std::sync::Arc;
use thiserror::Error;

/// Errors that can occur while reading or writing snapshots.
#[derive(Debug, Error)]
pub enum OrderListError {
	#[error("Storage error: {0}")]
	Storage(String),
}

/// Storage-backed list of order snapshots.
pub struct OrderListStore {
	storage: Arc<StorageService>,
}

impl OrderListStore {
	pub fn new(storage: Arc<StorageService>) -> Self {
		Self { storage }
	}

	/// Stores an order, replacing any previous snapshot.
	pub async fn replace(&self, order: &Order) -> Result<(), OrderListError> {
		self.storage
			.store(StorageKey::Orders, &order.id, order)
			.await
			.map_err(|e| OrderListError::Storage(e.to_string()))
	}

	pub async fn get(&self, order_id: &str) -> Result<Option<Order>, OrderListError> {
		match self.storage.retrieve(StorageKey::Orders, order_id).await {
			Ok(order) => Ok(Some(order)),
			Err(StorageError::NotFound) => Ok(None),
			Err(e) => Err(OrderListError::Storage(e.to_string())),
		}
	}

	/// Patches propagated fields into a listed order.
	///
	/// Returns `None` when the order is not listed.
	pub async fn apply_update(
		&self,
		order_id: &str,
		update: &OrderUpdate,
	) -> Result<Option<Order>, OrderListError> {
		let Some(mut order) = self.get(order_id).await? else {
			return Ok(None);
		};
		order.apply_update(update);
		self.storage
			.update(StorageKey::Orders, order_id, &order)
			.await
			.map_err(|e| OrderListError::Storage(e.to_string()))?;
		Ok(Some(order))
	}

	/// All listed orders, ordered by id.
	pub async fn all(&self) -> Result<Vec<Order>, OrderListError> {
		self.storage
			.retrieve_all(StorageKey::Orders)
			.await
			.map_err(|e| OrderListError::Storage(e.to_string()))
	}
}
