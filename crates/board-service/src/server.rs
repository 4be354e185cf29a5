//! HTTP server for the production board API.

use crate::apis;
use axum::{
	extract::{Path, State},
	http::{HeaderValue, StatusCode},
	response::Json,
	routing::{delete, get, post},
	Router,
};
use board_config::ApiConfig;
use board_core::ProductionBoard;
use board_types::{APIError, BoardResponse, TransitionTicketResponse};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
	cors::{Any, CorsLayer},
	timeout::TimeoutLayer,
	trace::TraceLayer,
};

/// Shared application state for the API server.
#[derive(Clone)]
pub struct AppState {
	pub board: Arc<ProductionBoard>,
}

/// Builds the router with all board routes and middleware.
pub fn router(api_config: &ApiConfig, board: Arc<ProductionBoard>) -> Router {
	Router::new()
		.route("/health", get(handle_health))
		.nest(
			"/api",
			Router::new()
				.route("/orders", get(handle_list_orders))
				.route("/orders/{id}/board", get(handle_get_board))
				.route(
					"/orders/{id}/stages/{stage}/transition",
					post(handle_request_transition),
				)
				.route("/transitions/{token}/confirm", post(handle_confirm_transition))
				.route("/transitions/{token}", delete(handle_cancel_transition)),
		)
		.layer(
			ServiceBuilder::new()
				.layer(TraceLayer::new_for_http())
				.layer(cors_layer(api_config))
				.layer(TimeoutLayer::new(Duration::from_secs(api_config.timeout_seconds))),
		)
		.with_state(AppState { board })
}

fn cors_layer(api_config: &ApiConfig) -> CorsLayer {
	let Some(cors) = &api_config.cors else {
		return CorsLayer::permissive();
	};
	let origins: Vec<HeaderValue> = cors
		.allowed_origins
		.iter()
		.filter_map(|origin| match origin.parse() {
			Ok(value) => Some(value),
			Err(_) => {
				tracing::warn!("Ignoring invalid CORS origin: {}", origin);
				None
			},
		})
		.collect();
	CorsLayer::new()
		.allow_origin(origins)
		.allow_methods(Any)
		.allow_headers(Any)
}

/// Starts the HTTP server and serves until ctrl-c.
pub async fn start_server(
	api_config: ApiConfig,
	board: Arc<ProductionBoard>,
) -> Result<(), Box<dyn std::error::Error>> {
	let app = router(&api_config, board);

	let bind_address = format!("{}:{}", api_config.host, api_config.port);
	let listener = TcpListener::bind(&bind_address).await?;

	tracing::info!("Production board API server starting on {}", bind_address);

	axum::serve(listener, app)
		.with_graceful_shutdown(async {
			tokio::signal::ctrl_c().await.ok();
			tracing::info!("Shutdown signal received");
		})
		.await?;

	Ok(())
}

async fn handle_health() -> Json<Value> {
	Json(json!({ "status": "ok" }))
}

/// Handles GET /api/orders requests.
async fn handle_list_orders(
	State(state): State<AppState>,
) -> Result<Json<Vec<BoardResponse>>, APIError> {
	apis::board::list_boards(&state.board).await.map(Json)
}

/// Handles GET /api/orders/{id}/board requests.
///
/// Selects the order; a slower fetch for a previously selected order is
/// discarded.
async fn handle_get_board(
	Path(id): Path<String>,
	State(state): State<AppState>,
) -> Result<Json<BoardResponse>, APIError> {
	match apis::board::get_board(&id, &state.board).await {
		Ok(response) => Ok(Json(response)),
		Err(e) => {
			tracing::warn!("Board retrieval failed: {}", e);
			Err(e)
		},
	}
}

/// Handles POST /api/orders/{id}/stages/{stage}/transition requests.
async fn handle_request_transition(
	Path((id, stage)): Path<(String, String)>,
	State(state): State<AppState>,
) -> Result<Json<TransitionTicketResponse>, APIError> {
	match apis::transition::request_transition(&id, &stage, &state.board).await {
		Ok(ticket) => Ok(Json(ticket)),
		Err(e) => {
			tracing::warn!("Transition request refused: {}", e);
			Err(e)
		},
	}
}

/// Handles POST /api/transitions/{token}/confirm requests.
async fn handle_confirm_transition(
	Path(token): Path<String>,
	State(state): State<AppState>,
) -> Result<Json<BoardResponse>, APIError> {
	apis::transition::confirm_transition(&token, &state.board)
		.await
		.map(Json)
}

/// Handles DELETE /api/transitions/{token} requests.
async fn handle_cancel_transition(
	Path(token): Path<String>,
	State(state): State<AppState>,
) -> Result<StatusCode, APIError> {
	apis::transition::cancel_transition(&token, &state.board)?;
	Ok(StatusCode::NO_CONTENT)
}
