//! Small helpers shared across the board crates.

pub mod formatting;
pub mod helpers;

pub use formatting::{truncate_id, with_query};
pub use helpers::current_timestamp;
