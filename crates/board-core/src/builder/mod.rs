//! Builder pattern for constructing production boards.
//!
//! Composes a ProductionBoard from the configured storage and order
//! backend implementations using factory functions.

use crate::board::ProductionBoard;
use crate::event_bus::EventBus;
use crate::state::OrderListStore;
use board_backend::{BackendError, BackendService, OrderBackendInterface};
use board_config::Config;
use board_storage::{StorageError, StorageInterface, StorageService};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// Errors that can occur during board construction.
#[derive(Debug, Error)]
pub enum BuilderError {
	#[error("Configuration error: {0}")]
	Config(String),
	#[error("Missing required component: {0}")]
	MissingComponent(String),
}

/// Factory functions for every pluggable board component.
pub struct BoardFactories<SF, BF> {
	pub storage_factories: HashMap<String, SF>,
	pub backend_factories: HashMap<String, BF>,
}

/// Builder for constructing a ProductionBoard with pluggable implementations.
pub struct BoardBuilder {
	config: Config,
}

impl BoardBuilder {
	pub fn new(config: Config) -> Self {
		Self { config }
	}

	/// Builds the board using the factories for each component type.
	///
	/// Every configured implementation with a known factory is created, so a
	/// broken secondary configuration fails the build as well.
	pub fn build<SF, BF>(self, factories: BoardFactories<SF, BF>) -> Result<ProductionBoard, BuilderError>
	where
		SF: Fn(&toml::Value) -> Result<Box<dyn StorageInterface>, StorageError>,
		BF: Fn(&toml::Value) -> Result<Box<dyn OrderBackendInterface>, BackendError>,
	{
		// Create storage implementations
		let mut storage_impls = HashMap::new();
		for (name, config) in &self.config.storage.implementations {
			if let Some(factory) = factories.storage_factories.get(name) {
				match factory(config) {
					Ok(implementation) => {
						storage_impls.insert(name.clone(), implementation);
						let is_primary = &self.config.storage.primary == name;
						tracing::info!(component = "storage", implementation = %name, enabled = %is_primary, "Loaded");
					}
					Err(e) => {
						tracing::error!(
							component = "storage",
							implementation = %name,
							error = %e,
							"Failed to create storage implementation"
						);
						return Err(BuilderError::Config(format!(
							"Failed to create storage implementation '{}': {}",
							name, e
						)));
					}
				}
			}
		}

		let primary_storage = &self.config.storage.primary;
		let storage_backend = storage_impls.remove(primary_storage).ok_or_else(|| {
			BuilderError::MissingComponent(format!(
				"Primary storage '{}' has no registered implementation",
				primary_storage
			))
		})?;
		let storage = Arc::new(StorageService::new(storage_backend));

		// Create order backend implementations
		let mut backend_impls = HashMap::new();
		for (name, config) in &self.config.backend.implementations {
			if let Some(factory) = factories.backend_factories.get(name) {
				match factory(config) {
					Ok(implementation) => {
						backend_impls.insert(name.clone(), implementation);
						let is_primary = &self.config.backend.primary == name;
						tracing::info!(component = "backend", implementation = %name, enabled = %is_primary, "Loaded");
					}
					Err(e) => {
						tracing::error!(
							component = "backend",
							implementation = %name,
							error = %e,
							"Failed to create order backend implementation"
						);
						return Err(BuilderError::Config(format!(
							"Failed to create backend implementation '{}': {}",
							name, e
						)));
					}
				}
			}
		}

		let primary_backend = &self.config.backend.primary;
		let backend = backend_impls.remove(primary_backend).ok_or_else(|| {
			BuilderError::MissingComponent(format!(
				"Primary backend '{}' has no registered implementation",
				primary_backend
			))
		})?;

		Ok(ProductionBoard::new(
			self.config,
			Arc::new(BackendService::new(backend)),
			Arc::new(OrderListStore::new(storage)),
			EventBus::new(1000),
		))
	}
}
