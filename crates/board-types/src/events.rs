//! Event types for board-wide notifications.
//!
//! The board publishes these on its event bus after a stage transition so
//! that the order list and the dashboard widgets can refresh themselves
//! without a full reload.

use crate::{OrderUpdate, Stage};
use serde::{Deserialize, Serialize};

/// Main event type published by the production board.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum BoardEvent {
	/// An order's status fields changed and should be patched in place.
	OrderUpdated { order_id: String, update: OrderUpdate },
	/// The production view list should be reloaded.
	RefetchProductionView,
	/// The statistics cards should be reloaded.
	RefetchCardStatistik,
	/// The production chart should be reloaded.
	RefetchChart,
	/// A confirmed transition failed; nothing was changed locally.
	TransitionFailed {
		order_id: String,
		stage: Stage,
		error: String,
	},
	/// Secondary actions of an order became available again.
	SecondaryActionsEnabled { order_id: String },
}
