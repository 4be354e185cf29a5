//! Pending transitions awaiting user confirmation.
//!
//! Requesting a transition only parks it under a random token. Nothing
//! reaches the order API until the token is confirmed; cancelling or
//! letting the token expire discards it without side effects. An order has
//! at most one pending transition: opening a new one replaces the old token.

use super::GateError;
use board_types::{current_timestamp, ActionKind, Stage};
use dashmap::DashMap;
use std::time::Duration;
use tokio::time::Instant;
use uuid::Uuid;

/// A transition parked until the user confirms it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingTransition {
	pub token: Uuid,
	pub order_id: String,
	pub stage: Stage,
	pub effect: ActionKind,
	/// UNIX timestamp after which the token is discarded.
	pub expires_at: u64,
	deadline: Instant,
}

/// Registry of pending transitions keyed by token.
pub struct ConfirmationRegistry {
	pending: DashMap<Uuid, PendingTransition>,
	/// Latest token per order.
	by_order: DashMap<String, Uuid>,
	ttl: Duration,
}

impl ConfirmationRegistry {
	pub fn new(ttl: Duration) -> Self {
		Self {
			pending: DashMap::new(),
			by_order: DashMap::new(),
			ttl,
		}
	}

	/// Parks a transition and returns it with its fresh token.
	///
	/// Any transition still pending for the same order is discarded.
	pub fn open(&self, order_id: &str, stage: Stage, effect: ActionKind) -> PendingTransition {
		let pending = PendingTransition {
			token: Uuid::new_v4(),
			order_id: order_id.to_string(),
			stage,
			effect,
			expires_at: current_timestamp() + self.ttl.as_secs(),
			deadline: Instant::now() + self.ttl,
		};
		self.pending.insert(pending.token, pending.clone());
		if let Some(replaced) = self.by_order.insert(pending.order_id.clone(), pending.token) {
			self.pending.remove(&replaced);
		}
		pending
	}

	/// Removes and returns a pending transition for execution.
	///
	/// A token can be taken once; a second confirm of the same token fails
	/// with `UnknownToken`.
	pub fn take(&self, token: &str) -> Result<PendingTransition, GateError> {
		let id = parse_token(token)?;
		let (_, pending) = self
			.pending
			.remove(&id)
			.ok_or_else(|| GateError::UnknownToken(token.to_string()))?;
		self.release(&pending);

		if Instant::now() >= pending.deadline {
			return Err(GateError::Expired(token.to_string()));
		}
		Ok(pending)
	}

	/// Discards a pending transition.
	pub fn cancel(&self, token: &str) -> Result<PendingTransition, GateError> {
		let id = parse_token(token)?;
		let (_, pending) = self
			.pending
			.remove(&id)
			.ok_or_else(|| GateError::UnknownToken(token.to_string()))?;
		self.release(&pending);
		Ok(pending)
	}

	/// Drops every expired transition and returns how many were dropped.
	pub fn purge_expired(&self) -> usize {
		let now = Instant::now();
		let before = self.pending.len();
		self.pending.retain(|_, pending| pending.deadline > now);
		self.by_order.retain(|_, token| self.pending.contains_key(token));
		before - self.pending.len()
	}

	pub fn len(&self) -> usize {
		self.pending.len()
	}

	pub fn is_empty(&self) -> bool {
		self.pending.is_empty()
	}

	fn release(&self, pending: &PendingTransition) {
		self.by_order
			.remove_if(&pending.order_id, |_, token| *token == pending.token);
	}
}

fn parse_token(token: &str) -> Result<Uuid, GateError> {
	Uuid::parse_str(token).map_err(|_| GateError::UnknownToken(token.to_string()))
}
