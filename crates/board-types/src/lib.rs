//! Common types for the production board.
//!
//! This crate defines the data types shared by every board crate: the fixed
//! production stages, normalized order snapshots, board and API shapes,
//! events, and configuration validation helpers.

/// API types for HTTP endpoints and request/response structures.
pub mod api;
/// Events published on the board's event bus.
pub mod events;
/// Order snapshots and their ingestion from the order API.
pub mod order;
/// Registry trait for pluggable implementations.
pub mod registry;
/// Redacted secret string for credentials.
pub mod secret_string;
/// Production stages and display states.
pub mod stage;
/// Storage namespaces.
pub mod storage;
/// Utility functions for formatting and timestamps.
pub mod utils;
/// Configuration validation types.
pub mod validation;

pub use api::*;
pub use events::*;
pub use order::*;
pub use registry::ImplementationRegistry;
pub use secret_string::SecretString;
pub use stage::*;
pub use storage::*;
pub use utils::{current_timestamp, truncate_id, with_query};
pub use validation::*;
