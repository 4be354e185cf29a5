//! Dynamic factory registry for board implementations.
//!
//! Collects every registered storage and order backend factory once, and
//! builds the board from the implementations named in the configuration.

use board_backend::BackendFactory;
use board_config::Config;
use board_core::{BoardBuilder, BoardFactories, ProductionBoard};
use board_storage::StorageFactory;
use std::collections::HashMap;
use std::sync::OnceLock;

/// Global registry for all implementation factories
pub struct FactoryRegistry {
	pub storage: HashMap<String, StorageFactory>,
	pub backend: HashMap<String, BackendFactory>,
}

impl FactoryRegistry {
	pub fn new() -> Self {
		Self {
			storage: HashMap::new(),
			backend: HashMap::new(),
		}
	}

	pub fn register_storage(&mut self, name: impl Into<String>, factory: StorageFactory) {
		self.storage.insert(name.into(), factory);
	}

	pub fn register_backend(&mut self, name: impl Into<String>, factory: BackendFactory) {
		self.backend.insert(name.into(), factory);
	}
}

static REGISTRY: OnceLock<FactoryRegistry> = OnceLock::new();

/// Returns the global registry, registering all implementations on first use.
pub fn get_registry() -> &'static FactoryRegistry {
	REGISTRY.get_or_init(|| {
		let mut registry = FactoryRegistry::new();

		for (name, factory) in board_storage::get_all_implementations() {
			tracing::debug!("Registering storage implementation: {}", name);
			registry.register_storage(name, factory);
		}

		for (name, factory) in board_backend::get_all_implementations() {
			tracing::debug!("Registering backend implementation: {}", name);
			registry.register_backend(name, factory);
		}

		registry
	})
}

/// Picks the factory of every configured implementation.
///
/// Fails on the first implementation name nobody registered.
fn select_factories<F: Copy>(
	registry: &HashMap<String, F>,
	configured: &HashMap<String, toml::Value>,
	kind: &str,
) -> Result<HashMap<String, F>, String> {
	let mut factories = HashMap::new();
	for name in configured.keys() {
		let Some(factory) = registry.get(name) else {
			let mut available: Vec<_> = registry.keys().cloned().collect();
			available.sort();
			return Err(format!(
				"Unknown {} implementation '{}'. Available: [{}]",
				kind,
				name,
				available.join(", ")
			));
		};
		factories.insert(name.clone(), *factory);
	}
	Ok(factories)
}

/// Builds the production board using the registry and config.
pub fn build_board_from_config(config: Config) -> Result<ProductionBoard, Box<dyn std::error::Error>> {
	let registry = get_registry();

	let factories = BoardFactories {
		storage_factories: select_factories(
			&registry.storage,
			&config.storage.implementations,
			"storage",
		)?,
		backend_factories: select_factories(
			&registry.backend,
			&config.backend.implementations,
			"backend",
		)?,
	};

	Ok(BoardBuilder::new(config).build(factories)?)
}
