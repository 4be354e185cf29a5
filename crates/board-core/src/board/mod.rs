//! The production board for custom shoe orders.
//!
//! Ties the pieces together: orders are fetched through the backend,
//! classified, gated, and rendered into a [`BoardResponse`]. Stage
//! transitions go through a confirmation step and, once confirmed, run
//! the update, settle, refetch and propagate sequence in
//! [`transition`].

pub mod selection;
mod transition;

use crate::classifier::{classify_board, BoardClassification};
use crate::event_bus::EventBus;
use crate::gate::{ActionGate, ConfirmationRegistry, GateError};
use crate::state::{OrderListError, OrderListStore};
use board_backend::{BackendError, BackendService};
use board_config::Config;
use board_types::{truncate_id, BoardEvent, BoardResponse, Order, StageView};
use dashmap::DashMap;
use selection::Selection;
use std::sync::atomic::AtomicU64;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::instrument;

/// Errors that can occur during board operations.
#[derive(Debug, Error)]
pub enum BoardError {
	#[error("Order not found: {0}")]
	OrderNotFound(String),
	/// The order API failed.
	#[error("Backend error: {0}")]
	Backend(String),
	#[error("Storage error: {0}")]
	Storage(String),
	/// The order API returned data that is not an order.
	#[error("Invalid order data: {0}")]
	InvalidOrder(String),
	/// Another order was selected while this one was loading.
	#[error("Selection changed while loading order {0}")]
	Superseded(String),
	#[error(transparent)]
	Gate(#[from] GateError),
}

impl From<BackendError> for BoardError {
	fn from(err: BackendError) -> Self {
		match err {
			BackendError::NotFound(id) => BoardError::OrderNotFound(id),
			other => BoardError::Backend(other.to_string()),
		}
	}
}

impl From<OrderListError> for BoardError {
	fn from(err: OrderListError) -> Self {
		BoardError::Storage(err.to_string())
	}
}

/// Production board over the external order API.
pub struct ProductionBoard {
	config: Config,
	backend: Arc<BackendService>,
	orders: Arc<OrderListStore>,
	gate: ActionGate,
	confirmations: ConfirmationRegistry,
	selection: Selection,
	/// Orders whose secondary actions are held, with the hold's sequence number.
	secondary_holds: Arc<DashMap<String, u64>>,
	hold_sequence: AtomicU64,
	event_bus: EventBus,
}

impl ProductionBoard {
	pub fn new(
		config: Config,
		backend: Arc<BackendService>,
		orders: Arc<OrderListStore>,
		event_bus: EventBus,
	) -> Self {
		Self {
			gate: ActionGate::new(config.routes.clone()),
			confirmations: ConfirmationRegistry::new(config.transition.confirmation_ttl()),
			config,
			backend,
			orders,
			selection: Selection::new(),
			secondary_holds: Arc::new(DashMap::new()),
			hold_sequence: AtomicU64::new(0),
			event_bus,
		}
	}

	pub fn config(&self) -> &Config {
		&self.config
	}

	pub fn event_bus(&self) -> &EventBus {
		&self.event_bus
	}

	pub fn subscribe(&self) -> broadcast::Receiver<BoardEvent> {
		self.event_bus.subscribe()
	}

	/// The order currently shown on the board.
	pub async fn selected(&self) -> Option<String> {
		self.selection.selected().await
	}

	/// Selects an order, fetches it and returns its board.
	///
	/// Unusable order data yields the all-waiting placeholder board. Fails
	/// with [`BoardError::Superseded`] when another order was selected
	/// before the fetch completed.
	#[instrument(skip_all, fields(order_id = %truncate_id(order_id)))]
	pub async fn select(&self, order_id: &str) -> Result<BoardResponse, BoardError> {
		let generation = self.selection.select(order_id).await;
		let value = self.backend.fetch_order(order_id).await?;

		if !self.selection.is_current(generation) {
			tracing::debug!("Selection changed during fetch, discarding result");
			return Err(BoardError::Superseded(order_id.to_string()));
		}

		match Order::from_value(value) {
			Ok(order) => {
				self.orders.replace(&order).await?;
				Ok(self.view(&order))
			},
			Err(e) => {
				tracing::warn!(error = %e, "Order data unusable, showing placeholder board");
				Ok(self.placeholder_view(order_id))
			},
		}
	}

	/// Renders the board of an order snapshot.
	pub fn view(&self, order: &Order) -> BoardResponse {
		self.render(order, &classify_board(order))
	}

	/// Board shown while order data is missing: every stage waiting, no actions.
	pub fn placeholder_view(&self, order_id: &str) -> BoardResponse {
		self.render(&Order::new(order_id), &BoardClassification::placeholder())
	}

	fn render(&self, order: &Order, board: &BoardClassification) -> BoardResponse {
		let held = self.secondary_holds.contains_key(&order.id);
		BoardResponse {
			order_id: order.id.clone(),
			status: order.status.clone(),
			employee_name: order.employee.as_ref().and_then(|e| e.employee_name.clone()),
			partner: order.partner,
			stages: board
				.iter()
				.map(|c| StageView {
					stage: c.stage,
					card_id: c.stage.card_id().to_string(),
					state: c.state,
					rule: c.rule.as_str().to_string(),
					actions: self.gate.actions(c.stage, order, board, held),
				})
				.collect(),
		}
	}

	/// Loads the production list from the order API.
	///
	/// Orders that cannot be read are skipped. Returns the number stored.
	pub async fn load_orders(&self) -> Result<usize, BoardError> {
		let mut stored = 0;
		for value in self.backend.list_orders().await? {
			match Order::from_value(value) {
				Ok(order) => {
					self.orders.replace(&order).await?;
					stored += 1;
				},
				Err(e) => tracing::warn!(error = %e, "Skipping unreadable order in list"),
			}
		}
		tracing::info!(count = stored, "Loaded production list");
		Ok(stored)
	}

	/// Order snapshots of the production list.
	pub async fn orders(&self) -> Result<Vec<Order>, BoardError> {
		Ok(self.orders.all().await?)
	}

	/// Reloads the production list whenever the board asks for a refresh.
	///
	/// The task holds the board weakly and ends once it is dropped.
	pub fn spawn_list_refresh(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
		let mut events = self.subscribe();
		let board = Arc::downgrade(self);
		tokio::spawn(async move {
			loop {
				match events.recv().await {
					Ok(BoardEvent::RefetchProductionView) => {},
					Ok(_) => continue,
					Err(broadcast::error::RecvError::Lagged(skipped)) => {
						tracing::warn!(skipped, "List refresh fell behind board events");
					},
					Err(broadcast::error::RecvError::Closed) => break,
				}
				let Some(board) = board.upgrade() else { break };
				if let Err(e) = board.load_orders().await {
					tracing::warn!(error = %e, "Failed to reload production list");
				}
			}
		})
	}

	/// Snapshot of an order, fetched and stored when not yet listed.
	async fn snapshot(&self, order_id: &str) -> Result<Order, BoardError> {
		if let Some(order) = self.orders.get(order_id).await? {
			return Ok(order);
		}
		let order = self.fetch(order_id).await?;
		self.orders.replace(&order).await?;
		Ok(order)
	}

	async fn fetch(&self, order_id: &str) -> Result<Order, BoardError> {
		let value = self.backend.fetch_order(order_id).await?;
		Order::from_value(value).map_err(|e| BoardError::InvalidOrder(e.to_string()))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use board_backend::implementations::memory::MemoryOrderBackend;
	use board_backend::MockOrderBackendInterface;
	use board_storage::{implementations::memory::MemoryStorage, StorageService};
	use board_types::{PartnerWorkflowState, Stage, StageState};
	use serde_json::json;

	pub(super) fn board_with(backend: Box<dyn board_backend::OrderBackendInterface>) -> ProductionBoard {
		let storage = Arc::new(StorageService::new(Box::new(MemoryStorage::new())));
		ProductionBoard::new(
			Config::for_testing(),
			Arc::new(BackendService::new(backend)),
			Arc::new(OrderListStore::new(storage)),
			EventBus::new(64),
		)
	}

	pub(super) fn memory_board(orders: impl IntoIterator<Item = Order>) -> ProductionBoard {
		board_with(Box::new(MemoryOrderBackend::with_orders(orders)))
	}

	#[tokio::test]
	async fn test_select_returns_classified_board() {
		let board = memory_board([Order::new("o-1")
			.with_status("Bodenerstellung")
			.with_entry(Stage::Schafterstellung, Some("t1"), Some("t2"))
			.with_entry(Stage::Bodenerstellung, Some("t3"), None)]);

		let response = board.select("o-1").await.unwrap();
		let states: Vec<_> = response.stages.iter().map(|s| s.state).collect();
		assert_eq!(
			states,
			vec![
				StageState::Abgeschlossen,
				StageState::Abgeschlossen,
				StageState::Abgeschlossen,
				StageState::Abgeschlossen,
				StageState::InFertigung,
				StageState::Wartend
			]
		);
		assert_eq!(response.stages[4].rule, "current-stage");
		assert!(response.stages[4].actions.primary.is_some());
		assert_eq!(board.selected().await.as_deref(), Some("o-1"));
		assert_eq!(board.orders().await.unwrap().len(), 1);
	}

	#[tokio::test]
	async fn test_unknown_order_is_not_found() {
		let board = memory_board([]);
		assert!(matches!(
			board.select("o-404").await,
			Err(BoardError::OrderNotFound(id)) if id == "o-404"
		));
	}

	#[tokio::test]
	async fn test_malformed_order_renders_placeholder() {
		let mut backend = MockOrderBackendInterface::new();
		backend
			.expect_fetch_order()
			.returning(|_| Ok(json!({ "statusHistory": "garbage" })));
		let board = board_with(Box::new(backend));

		let response = board.select("o-1").await.unwrap();
		assert_eq!(response.order_id, "o-1");
		assert!(response
			.stages
			.iter()
			.all(|s| s.state == StageState::Wartend && s.rule == "placeholder"));
		assert!(response.stages.iter().all(|s| s.actions.primary.is_none()));
	}

	#[tokio::test]
	async fn test_pending_order_renders_disabled_actions() {
		let board = memory_board([Order::new("o-1").with_partner(PartnerWorkflowState {
			pending: true,
			..Default::default()
		})]);
		let response = board.select("o-1").await.unwrap();
		assert!(response.partner.pending);
		assert!(response.stages.iter().all(|s| s.actions.disabled));
	}

	#[tokio::test]
	async fn test_load_orders_skips_unreadable_entries() {
		let mut backend = MockOrderBackendInterface::new();
		backend.expect_list_orders().returning(|| {
			Ok(vec![
				json!({ "id": "o-1", "status": "Leistenerstellung" }),
				json!({ "status": "no id" }),
				json!({ "_id": "o-2" }),
			])
		});
		let board = board_with(Box::new(backend));

		assert_eq!(board.load_orders().await.unwrap(), 2);
		let ids: Vec<_> = board.orders().await.unwrap().into_iter().map(|o| o.id).collect();
		assert_eq!(ids, vec!["o-1", "o-2"]);
	}

	#[tokio::test(start_paused = true)]
	async fn test_transition_reloads_production_list() {
		let board = Arc::new(memory_board([Order::new("o-1"), Order::new("o-2")]));
		let refresh = board.spawn_list_refresh();

		let ticket = board
			.request_transition("o-1", Stage::Leistenerstellung)
			.await
			.unwrap();
		assert_eq!(board.orders().await.unwrap().len(), 1);
		board.confirm(&ticket.token).await.unwrap();
		tokio::time::sleep(std::time::Duration::from_millis(1)).await;

		let orders = board.orders().await.unwrap();
		assert_eq!(orders.len(), 2);
		assert_eq!(orders[0].status.as_deref(), Some("Leistenerstellung"));

		drop(board);
		refresh.await.unwrap();
	}
}
