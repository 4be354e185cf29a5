//! Board views of orders.

use super::api_error;
use board_core::ProductionBoard;
use board_types::{APIError, BoardResponse};
use tracing::info;

/// Selects an order and returns its classified board.
pub async fn get_board(order_id: &str, board: &ProductionBoard) -> Result<BoardResponse, APIError> {
	info!("Showing board for order {}", order_id);
	board.select(order_id).await.map_err(api_error)
}

/// Boards of every order in the production list.
pub async fn list_boards(board: &ProductionBoard) -> Result<Vec<BoardResponse>, APIError> {
	let orders = board.orders().await.map_err(api_error)?;
	Ok(orders.iter().map(|order| board.view(order)).collect())
}
