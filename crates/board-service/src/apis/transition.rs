//! Stage transitions: request, confirm, cancel.

use super::api_error;
use board_core::ProductionBoard;
use board_types::{APIError, BoardResponse, Stage, TransitionTicketResponse};

/// Opens a confirmation for moving an order to a stage.
///
/// `stage` accepts the stage name or its card id.
pub async fn request_transition(
	order_id: &str,
	stage: &str,
	board: &ProductionBoard,
) -> Result<TransitionTicketResponse, APIError> {
	let stage: Stage = stage.parse().map_err(|e: board_types::UnknownStage| APIError::BadRequest {
		error_type: "UNKNOWN_STAGE".to_string(),
		message: e.to_string(),
	})?;
	board
		.request_transition(order_id, stage)
		.await
		.map_err(api_error)
}

pub async fn confirm_transition(
	token: &str,
	board: &ProductionBoard,
) -> Result<BoardResponse, APIError> {
	board.confirm(token).await.map_err(api_error)
}

pub fn cancel_transition(token: &str, board: &ProductionBoard) -> Result<(), APIError> {
	board.cancel(token).map_err(api_error)
}
