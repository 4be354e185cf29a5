//! Confirmed stage transitions.
//!
//! A confirmed transition runs strictly in sequence:
//! 1. for the shaft stage, hand the order to the partner flow and refetch
//! 2. move the order to the stage through the order API
//! 3. wait for the API to settle
//! 4. refetch the order
//! 5. patch the order's list entry and publish the update
//! 6. ask the list, statistics and chart to refresh
//!
//! Confirming re-checks the gate against a fresh fetch, so a stage that
//! moved on or an order that became pending since the request is refused.
//! Nothing is changed locally before the refetch succeeds, so a failure
//! leaves the board as it was and the user can simply retry.

use super::{BoardError, ProductionBoard};
use crate::classifier::classify_board;
use crate::gate::{confirmation_prompt, PendingTransition};
use board_types::{truncate_id, ActionKind, BoardEvent, BoardResponse, Order, Stage, TransitionTicketResponse};
use std::sync::atomic::Ordering;
use tracing::instrument;

impl ProductionBoard {
	/// Opens a confirmation for moving an order to `stage`.
	///
	/// Fails when the order is pending or the stage offers no primary
	/// action in its current state.
	#[instrument(skip_all, fields(order_id = %truncate_id(order_id), stage = %stage))]
	pub async fn request_transition(
		&self,
		order_id: &str,
		stage: Stage,
	) -> Result<TransitionTicketResponse, BoardError> {
		let purged = self.confirmations.purge_expired();
		if purged > 0 {
			tracing::debug!(purged, "Discarded expired confirmations");
		}

		let order = self.snapshot(order_id).await?;
		let effect = self.gate.authorize(stage, &order, &classify_board(&order))?;
		let pending = self.confirmations.open(&order.id, stage, effect);

		tracing::info!(token = %pending.token, effect = ?effect, "Transition awaiting confirmation");
		Ok(TransitionTicketResponse {
			token: pending.token.to_string(),
			order_id: order.id.clone(),
			stage,
			prompt: confirmation_prompt(&order, stage),
			expires_at: pending.expires_at,
		})
	}

	/// Runs a confirmed transition and returns the refreshed board.
	pub async fn confirm(&self, token: &str) -> Result<BoardResponse, BoardError> {
		let pending = self.confirmations.take(token)?;
		let current = self.fetch(&pending.order_id).await?;
		self.gate
			.authorize(pending.stage, &current, &classify_board(&current))?;

		let order = self.execute(pending).await?;
		Ok(self.view(&order))
	}

	/// Discards a pending transition without side effects.
	pub fn cancel(&self, token: &str) -> Result<(), BoardError> {
		let pending = self.confirmations.cancel(token)?;
		tracing::info!(
			order_id = %truncate_id(&pending.order_id),
			stage = %pending.stage,
			"Transition cancelled"
		);
		Ok(())
	}

	#[instrument(skip_all, fields(order_id = %truncate_id(&pending.order_id), stage = %pending.stage))]
	async fn execute(&self, pending: PendingTransition) -> Result<Order, BoardError> {
		match self.run_transition(&pending).await {
			Ok(order) => {
				tracing::info!(status = ?order.status, "Transition completed");
				Ok(order)
			},
			Err(e) => {
				tracing::error!(error = %e, "Transition failed");
				self.event_bus
					.publish(BoardEvent::TransitionFailed {
						order_id: pending.order_id.clone(),
						stage: pending.stage,
						error: e.to_string(),
					})
					.ok();
				Err(e)
			},
		}
	}

	async fn run_transition(&self, pending: &PendingTransition) -> Result<Order, BoardError> {
		let generation = self.selection.current();
		let order_id = pending.order_id.as_str();
		let with_partner = pending.effect == ActionKind::PartnerThenStatus;

		if with_partner {
			self.backend.update_partner_2(order_id, true).await?;
			let order = self.fetch(order_id).await?;
			tracing::debug!(by_partner_2 = order.partner.by_partner_2, "Partner flow set");
		}

		self.backend.update_order_status(order_id, pending.stage).await?;
		tokio::time::sleep(self.config.transition.settle_delay()).await;
		let order = self.fetch(order_id).await?;

		// The refetch is authoritative for this order's entry whatever is selected now
		let update = order.to_update(with_partner);
		if self.orders.apply_update(order_id, &update).await?.is_none() {
			self.orders.replace(&order).await?;
		}
		self.event_bus
			.publish(BoardEvent::OrderUpdated {
				order_id: order.id.clone(),
				update,
			})
			.ok();
		if !self.selection.is_current(generation) {
			tracing::debug!("Selection changed during transition, board is no longer the selected view");
		}

		for event in [
			BoardEvent::RefetchProductionView,
			BoardEvent::RefetchCardStatistik,
			BoardEvent::RefetchChart,
		] {
			self.event_bus.publish(event).ok();
		}

		if with_partner {
			self.hold_secondary_actions(order_id);
		}
		Ok(order)
	}

	/// Holds an order's secondary actions for the configured delay.
	///
	/// A later hold on the same order supersedes an earlier one; only the
	/// latest timer releases it.
	fn hold_secondary_actions(&self, order_id: &str) {
		let sequence = self.hold_sequence.fetch_add(1, Ordering::SeqCst) + 1;
		self.secondary_holds.insert(order_id.to_string(), sequence);

		let holds = self.secondary_holds.clone();
		let event_bus = self.event_bus.clone();
		let delay = self.config.transition.secondary_enable_delay();
		let order_id = order_id.to_string();
		tokio::spawn(async move {
			tokio::time::sleep(delay).await;
			if holds.remove_if(&order_id, |_, held| *held == sequence).is_some() {
				tracing::debug!(order_id = %truncate_id(&order_id), "Secondary actions enabled");
				event_bus
					.publish(BoardEvent::SecondaryActionsEnabled { order_id })
					.ok();
			}
		});
	}
}

#[cfg(test)]
mod tests {
	use super::super::tests::{board_with, memory_board};
	use super::*;
	use crate::gate::GateError;
	use async_trait::async_trait;
	use board_backend::{BackendError, MockOrderBackendInterface, OrderBackendInterface};
	use board_types::{ConfigSchema, StageState};
	use mockall::{predicate::eq, Sequence};
	use serde_json::{json, Value};
	use std::sync::Arc;
	use std::time::Duration;
	use tokio::sync::{broadcast, Notify};

	fn drain(rx: &mut broadcast::Receiver<BoardEvent>) -> Vec<BoardEvent> {
		let mut events = Vec::new();
		while let Ok(event) = rx.try_recv() {
			events.push(event);
		}
		events
	}

	#[tokio::test(start_paused = true)]
	async fn test_confirmed_transition_updates_and_propagates() {
		let board = memory_board([Order::new("o-1")
			.with_status("Leistenerstellung")
			.with_entry(Stage::Leistenerstellung, Some("t1"), None)]);
		board.select("o-1").await.unwrap();
		let mut events = board.subscribe();

		let ticket = board
			.request_transition("o-1", Stage::Leistenerstellung)
			.await
			.unwrap();
		assert!(ticket.prompt.contains("Leistenerstellung"));

		let response = board.confirm(&ticket.token).await.unwrap();
		assert_eq!(response.stages[0].state, StageState::Abgeschlossen);
		assert_eq!(response.stages[1].state, StageState::InFertigung);

		let events = drain(&mut events);
		assert!(matches!(
			&events[0],
			BoardEvent::OrderUpdated { order_id, update }
				if order_id == "o-1" && update.history.is_finished(Stage::Leistenerstellung)
					&& update.by_partner_2.is_none()
		));
		assert!(matches!(events[1], BoardEvent::RefetchProductionView));
		assert!(matches!(events[2], BoardEvent::RefetchCardStatistik));
		assert!(matches!(events[3], BoardEvent::RefetchChart));

		let listed = board.orders().await.unwrap();
		assert!(listed[0].history.is_finished(Stage::Leistenerstellung));
	}

	#[tokio::test]
	async fn test_cancel_has_no_side_effects() {
		let mut backend = MockOrderBackendInterface::new();
		backend
			.expect_fetch_order()
			.times(1)
			.returning(|_| Ok(json!({ "id": "o-1" })));
		backend.expect_update_order_status().never();
		let board = board_with(Box::new(backend));

		let ticket = board
			.request_transition("o-1", Stage::Leistenerstellung)
			.await
			.unwrap();
		board.cancel(&ticket.token).unwrap();

		assert!(matches!(
			board.confirm(&ticket.token).await,
			Err(BoardError::Gate(GateError::UnknownToken(_)))
		));
	}

	#[tokio::test(start_paused = true)]
	async fn test_schaft_runs_partner_update_before_status() {
		let mut backend = MockOrderBackendInterface::new();
		let mut seq = Sequence::new();
		let ready = json!({
			"id": "o-1",
			"status": "Halbprobenerstellung",
			"statusHistory": [{ "status": "Halbprobenerstellung", "started": "t1", "finished": "t2" }]
		});
		let after = json!({
			"id": "o-1",
			"status": "Schafterstellung",
			"statusHistory": [
				{ "status": "Halbprobenerstellung", "started": "t1", "finished": "t2" },
				{ "status": "Schafterstellung", "started": "t3" }
			],
			"isByPartner_2": true
		});

		for _ in 0..2 {
			// Snapshot at request time, then the re-check at confirm time
			let snapshot = ready.clone();
			backend
				.expect_fetch_order()
				.times(1)
				.in_sequence(&mut seq)
				.returning(move |_| Ok(snapshot.clone()));
		}
		backend
			.expect_update_partner_2()
			.with(eq("o-1"), eq(true))
			.times(1)
			.in_sequence(&mut seq)
			.returning(|_, _| Ok(json!({ "id": "o-1", "isByPartner_2": true })));
		let partnered = ready.clone();
		backend
			.expect_fetch_order()
			.times(1)
			.in_sequence(&mut seq)
			.returning(move |_| Ok(partnered.clone()));
		backend
			.expect_update_order_status()
			.withf(|ids, stage| ids.len() == 1 && ids[0] == "o-1" && *stage == Stage::Schafterstellung)
			.times(1)
			.in_sequence(&mut seq)
			.returning(|_, _| Ok(()));
		backend
			.expect_fetch_order()
			.times(1)
			.in_sequence(&mut seq)
			.returning(move |_| Ok(after.clone()));

		let board = board_with(Box::new(backend));
		let mut events = board.subscribe();
		let ticket = board
			.request_transition("o-1", Stage::Schafterstellung)
			.await
			.unwrap();
		let response = board.confirm(&ticket.token).await.unwrap();

		assert!(response.partner.by_partner_2);
		assert!(matches!(
			drain(&mut events).first(),
			Some(BoardEvent::OrderUpdated { update, .. }) if update.by_partner_2 == Some(true)
		));
	}

	#[tokio::test(start_paused = true)]
	async fn test_failed_status_update_publishes_failure() {
		let mut backend = MockOrderBackendInterface::new();
		backend
			.expect_fetch_order()
			.times(2)
			.returning(|_| Ok(json!({ "id": "o-1" })));
		backend.expect_update_order_status().times(1).returning(|_, _| {
			Err(BackendError::Api {
				status: 500,
				message: "down".into(),
			})
		});
		let board = board_with(Box::new(backend));
		let mut events = board.subscribe();

		let ticket = board
			.request_transition("o-1", Stage::Leistenerstellung)
			.await
			.unwrap();
		let err = board.confirm(&ticket.token).await.unwrap_err();
		assert!(matches!(err, BoardError::Backend(_)));

		let events = drain(&mut events);
		assert_eq!(events.len(), 1);
		assert!(matches!(
			&events[0],
			BoardEvent::TransitionFailed { order_id, stage: Stage::Leistenerstellung, .. } if order_id == "o-1"
		));
		// The list still holds the untouched snapshot
		assert!(board.orders().await.unwrap()[0].history.is_empty());
	}

	#[tokio::test(start_paused = true)]
	async fn test_list_entry_updated_when_selection_moves_on() {
		let board = Arc::new(memory_board([
			Order::new("o-1")
				.with_status("Leistenerstellung")
				.with_entry(Stage::Leistenerstellung, Some("t1"), None),
			Order::new("o-2"),
		]));
		board.select("o-1").await.unwrap();
		let ticket = board
			.request_transition("o-1", Stage::Leistenerstellung)
			.await
			.unwrap();
		let mut events = board.subscribe();

		let confirm = tokio::spawn({
			let board = board.clone();
			async move { board.confirm(&ticket.token).await }
		});
		// Switch orders while the transition waits for the API to settle
		tokio::time::sleep(Duration::from_millis(10)).await;
		board.select("o-2").await.unwrap();

		let response = confirm.await.unwrap().unwrap();
		assert_eq!(response.stages[0].state, StageState::Abgeschlossen);

		let listed = board.orders().await.unwrap();
		let o1 = listed.iter().find(|o| o.id == "o-1").unwrap();
		assert!(o1.history.is_finished(Stage::Leistenerstellung));
		assert!(matches!(
			drain(&mut events).first(),
			Some(BoardEvent::OrderUpdated { order_id, .. }) if order_id == "o-1"
		));

		assert!(matches!(
			board.request_transition("o-1", Stage::Leistenerstellung).await,
			Err(BoardError::Gate(GateError::ActionUnavailable { .. }))
		));
	}

	#[tokio::test(start_paused = true)]
	async fn test_repeated_request_replaces_pending_confirmation() {
		let board = memory_board([Order::new("o-1")]);
		let first = board
			.request_transition("o-1", Stage::Leistenerstellung)
			.await
			.unwrap();
		let second = board
			.request_transition("o-1", Stage::Leistenerstellung)
			.await
			.unwrap();

		assert!(matches!(
			board.confirm(&first.token).await,
			Err(BoardError::Gate(GateError::UnknownToken(_)))
		));
		let response = board.confirm(&second.token).await.unwrap();
		assert_eq!(response.stages[0].state, StageState::InFertigung);
		assert_eq!(response.stages[1].state, StageState::Wartend);
	}

	#[tokio::test]
	async fn test_confirm_refused_when_order_became_pending() {
		let mut backend = MockOrderBackendInterface::new();
		let mut seq = Sequence::new();
		backend
			.expect_fetch_order()
			.times(1)
			.in_sequence(&mut seq)
			.returning(|_| Ok(json!({ "id": "o-1" })));
		backend
			.expect_fetch_order()
			.times(1)
			.in_sequence(&mut seq)
			.returning(|_| Ok(json!({ "id": "o-1", "isPanding": true })));
		backend.expect_update_order_status().never();
		let board = board_with(Box::new(backend));
		let mut events = board.subscribe();

		let ticket = board
			.request_transition("o-1", Stage::Leistenerstellung)
			.await
			.unwrap();
		assert!(matches!(
			board.confirm(&ticket.token).await,
			Err(BoardError::Gate(GateError::Disabled(id))) if id == "o-1"
		));
		assert!(drain(&mut events).is_empty());
	}

	#[tokio::test]
	async fn test_unavailable_stage_is_refused() {
		let board = memory_board([Order::new("o-1")]);
		let err = board
			.request_transition("o-1", Stage::Geliefert)
			.await
			.unwrap_err();
		assert!(matches!(
			err,
			BoardError::Gate(GateError::ActionUnavailable {
				stage: Stage::Geliefert,
				..
			})
		));
	}

	#[tokio::test(start_paused = true)]
	async fn test_secondary_actions_held_after_partner_action() {
		let board = memory_board([Order::new("o-1")
			.with_status("Halbprobenerstellung")
			.with_entry(Stage::Halbprobenerstellung, Some("t1"), Some("t2"))]);
		let mut events = board.subscribe();

		let ticket = board
			.request_transition("o-1", Stage::Schafterstellung)
			.await
			.unwrap();
		board.confirm(&ticket.token).await.unwrap();
		assert!(board.secondary_holds.contains_key("o-1"));
		drain(&mut events);

		tokio::time::sleep(Duration::from_millis(499)).await;
		assert!(board.secondary_holds.contains_key("o-1"));
		tokio::time::sleep(Duration::from_millis(2)).await;
		assert!(!board.secondary_holds.contains_key("o-1"));
		assert!(matches!(
			events.recv().await.unwrap(),
			BoardEvent::SecondaryActionsEnabled { order_id } if order_id == "o-1"
		));
	}

	/// Backend whose fetch of "slow" blocks until released.
	struct GatedBackend {
		release: Arc<Notify>,
	}

	#[async_trait]
	impl OrderBackendInterface for GatedBackend {
		fn config_schema(&self) -> Box<dyn ConfigSchema> {
			unimplemented!("not needed in tests")
		}

		async fn fetch_order(&self, order_id: &str) -> Result<Value, BackendError> {
			if order_id == "slow" {
				self.release.notified().await;
			}
			Ok(json!({ "id": order_id }))
		}

		async fn list_orders(&self) -> Result<Vec<Value>, BackendError> {
			Ok(Vec::new())
		}

		async fn update_order_status(&self, _: &[String], _: Stage) -> Result<(), BackendError> {
			Ok(())
		}

		async fn update_partner_2(&self, order_id: &str, _: bool) -> Result<Value, BackendError> {
			Ok(json!({ "id": order_id }))
		}
	}

	#[tokio::test]
	async fn test_stale_fetch_is_discarded_after_reselection() {
		let release = Arc::new(Notify::new());
		let board = Arc::new(board_with(Box::new(GatedBackend {
			release: release.clone(),
		})));

		let slow = tokio::spawn({
			let board = board.clone();
			async move { board.select("slow").await }
		});
		// Let the slow fetch start before switching
		while board.selected().await.as_deref() != Some("slow") {
			tokio::task::yield_now().await;
		}
		board.select("fast").await.unwrap();
		release.notify_one();

		assert!(matches!(
			slow.await.unwrap(),
			Err(BoardError::Superseded(id)) if id == "slow"
		));
		let ids: Vec<_> = board.orders().await.unwrap().into_iter().map(|o| o.id).collect();
		assert_eq!(ids, vec!["fast"]);
	}
}
