//! API types for the production board HTTP API.
//!
//! Response shapes use camelCase field names to match what the dashboard
//! frontend already consumes from the order API.

use crate::{PartnerWorkflowState, Stage, StageState};
use serde::{Deserialize, Serialize};
use std::fmt;

/// What happens when an action button is clicked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ActionKind {
	/// Moves the order to the stage through the status-update endpoint.
	StatusUpdate,
	/// Hands the stage to the partner flow, then moves the order to it.
	PartnerThenStatus,
	/// Opens another dashboard page; no status change.
	Navigate,
}

/// A button rendered on a stage card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionView {
	pub kind: ActionKind,
	pub label: String,
	/// Navigation target for [`ActionKind::Navigate`].
	#[serde(skip_serializing_if = "Option::is_none")]
	pub href: Option<String>,
}

/// The buttons of a stage card.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageActions {
	pub primary: Option<ActionView>,
	pub secondary: Option<ActionView>,
	/// All buttons are rendered but not clickable.
	pub disabled: bool,
	/// The secondary button is held back after a partner action.
	#[serde(default)]
	pub secondary_disabled: bool,
}

/// One stage card of the board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageView {
	pub stage: Stage,
	pub card_id: String,
	pub state: StageState,
	/// Name of the classification rule that produced `state`.
	pub rule: String,
	pub actions: StageActions,
}

/// Response for `GET /api/orders/{id}/board`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardResponse {
	pub order_id: String,
	pub status: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub employee_name: Option<String>,
	pub partner: PartnerWorkflowState,
	pub stages: Vec<StageView>,
}

/// Response for `POST /api/orders/{id}/stages/{stage}/transition`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionTicketResponse {
	/// Token to pass to the confirm or cancel endpoint.
	pub token: String,
	pub order_id: String,
	pub stage: Stage,
	/// Question shown in the confirmation dialog.
	pub prompt: String,
	/// UNIX timestamp after which the token is discarded.
	pub expires_at: u64,
}

/// API error response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
	/// Error type/code
	pub error: String,
	/// Human-readable description
	pub message: String,
	/// Additional error context
	pub details: Option<serde_json::Value>,
	/// Suggested retry delay in seconds
	#[serde(rename = "retryAfter")]
	pub retry_after: Option<u64>,
}

/// Structured API error type with HTTP status mapping.
#[derive(Debug)]
pub enum APIError {
	/// Malformed request (400)
	BadRequest { error_type: String, message: String },
	/// Unknown order or confirmation token (404)
	NotFound { error_type: String, message: String },
	/// Action not available in the order's current state (409)
	Conflict { error_type: String, message: String },
	/// Order API failed or returned unusable data (502)
	BadGateway { error_type: String, message: String },
	/// Service unavailable with optional retry information (503)
	ServiceUnavailable {
		error_type: String,
		message: String,
		retry_after: Option<u64>,
	},
	/// Internal server error (500)
	InternalServerError { error_type: String, message: String },
}

impl APIError {
	/// Get the HTTP status code for this error.
	pub fn status_code(&self) -> u16 {
		match self {
			APIError::BadRequest { .. } => 400,
			APIError::NotFound { .. } => 404,
			APIError::Conflict { .. } => 409,
			APIError::BadGateway { .. } => 502,
			APIError::ServiceUnavailable { .. } => 503,
			APIError::InternalServerError { .. } => 500,
		}
	}

	/// Convert to ErrorResponse for JSON serialization.
	pub fn to_error_response(&self) -> ErrorResponse {
		let (error_type, message, retry_after) = match self {
			APIError::BadRequest { error_type, message }
			| APIError::NotFound { error_type, message }
			| APIError::Conflict { error_type, message }
			| APIError::BadGateway { error_type, message }
			| APIError::InternalServerError { error_type, message } => (error_type, message, None),
			APIError::ServiceUnavailable {
				error_type,
				message,
				retry_after,
			} => (error_type, message, *retry_after),
		};
		ErrorResponse {
			error: error_type.clone(),
			message: message.clone(),
			details: None,
			retry_after,
		}
	}
}

impl fmt::Display for APIError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let response = self.to_error_response();
		write!(f, "{} ({}): {}", response.error, self.status_code(), response.message)
	}
}

impl std::error::Error for APIError {}

#[cfg(feature = "axum")]
impl axum::response::IntoResponse for APIError {
	fn into_response(self) -> axum::response::Response {
		use axum::{http::StatusCode, response::Json};

		let status =
			StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
		(status, Json(self.to_error_response())).into_response()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_error_response_mapping() {
		let err = APIError::Conflict {
			error_type: "ACTION_UNAVAILABLE".to_string(),
			message: "Geliefert has no primary action".to_string(),
		};
		assert_eq!(err.status_code(), 409);
		let body = err.to_error_response();
		assert_eq!(body.error, "ACTION_UNAVAILABLE");
		assert!(body.retry_after.is_none());

		let err = APIError::ServiceUnavailable {
			error_type: "BACKEND_UNAVAILABLE".to_string(),
			message: "try later".to_string(),
			retry_after: Some(5),
		};
		assert_eq!(err.to_error_response().retry_after, Some(5));
	}

	#[test]
	fn test_board_response_uses_camel_case() {
		let view = StageView {
			stage: Stage::Schafterstellung,
			card_id: "schafterstellung".to_string(),
			state: StageState::InFertigung,
			rule: "current-stage".to_string(),
			actions: StageActions::default(),
		};
		let json = serde_json::to_value(&view).unwrap();
		assert_eq!(json["cardId"], "schafterstellung");
		assert_eq!(json["state"], "IN FERTIGUNG");
		assert_eq!(json["stage"], "Schafterstellung");
	}
}
