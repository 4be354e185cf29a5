//! Request handling behind the HTTP routes.
//!
//! Handlers here are transport-agnostic: they take the board and plain
//! arguments and return response types or an [`APIError`].

pub mod board;
pub mod transition;

use board_core::{BoardError, GateError};
use board_types::APIError;

/// Maps a board failure to its API error and status code.
pub fn api_error(err: BoardError) -> APIError {
	let message = err.to_string();
	let (status, error_type) = match &err {
		BoardError::OrderNotFound(_) => (404, "ORDER_NOT_FOUND"),
		BoardError::Gate(GateError::UnknownToken(_)) => (404, "UNKNOWN_TOKEN"),
		BoardError::Gate(GateError::Expired(_)) => (404, "TOKEN_EXPIRED"),
		BoardError::Gate(GateError::Disabled(_)) => (409, "ORDER_PENDING"),
		BoardError::Gate(GateError::ActionUnavailable { .. }) => (409, "ACTION_UNAVAILABLE"),
		BoardError::Superseded(_) => (409, "SELECTION_CHANGED"),
		BoardError::Backend(_) => (502, "BACKEND_ERROR"),
		BoardError::InvalidOrder(_) => (502, "INVALID_ORDER_DATA"),
		BoardError::Storage(_) => (500, "STORAGE_ERROR"),
	};
	let error_type = error_type.to_string();
	match status {
		404 => APIError::NotFound { error_type, message },
		409 => APIError::Conflict { error_type, message },
		502 => APIError::BadGateway { error_type, message },
		_ => APIError::InternalServerError { error_type, message },
	}
}
