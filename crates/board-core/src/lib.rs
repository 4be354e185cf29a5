//! Core logic for the custom shoe production board.
//!
//! Derives the display state of each production stage from an order's
//! status history, decides which actions a stage card offers, and runs
//! confirmed stage transitions against the order API. Components are
//! composed through [`builder::BoardBuilder`].

pub mod board;
pub mod builder;
pub mod classifier;
pub mod event_bus;
pub mod gate;
pub mod state;

pub use board::{BoardError, ProductionBoard};
pub use builder::{BoardBuilder, BoardFactories, BuilderError};
pub use classifier::{classify, classify_board, classify_value, BoardClassification, Classification};
pub use event_bus::EventBus;
pub use gate::{ActionGate, GateError};
