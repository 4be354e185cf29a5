//! Order types as delivered by the order API and as used by the board.
//!
//! The order API is loose about its history shape: a start marker may be
//! spelled `started` or `startedAt`, a finish marker `finished` or
//! `finishedAt`, and markers may be empty strings, numbers or null. The
//! `Raw*` types accept all of that; [`Order`] is the normalized form every
//! other component works with.

use crate::{Stage, STAGE_COUNT};
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

/// Errors raised while ingesting order data.
#[derive(Debug, Error)]
pub enum OrderDataError {
	/// The payload is not a JSON order object.
	#[error("Malformed order payload: {0}")]
	Malformed(String),
	/// The order has no usable identifier.
	#[error("Order payload has no id")]
	MissingId,
}

/// A history record exactly as the order API sends it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawStageHistoryEntry {
	/// Stage name this record belongs to.
	#[serde(default)]
	pub status: String,
	#[serde(default, deserialize_with = "lenient_marker", skip_serializing_if = "Option::is_none")]
	pub started: Option<String>,
	#[serde(default, deserialize_with = "lenient_marker", skip_serializing_if = "Option::is_none")]
	pub started_at: Option<String>,
	#[serde(default, deserialize_with = "lenient_marker", skip_serializing_if = "Option::is_none")]
	pub finished: Option<String>,
	#[serde(default, deserialize_with = "lenient_marker", skip_serializing_if = "Option::is_none")]
	pub finished_at: Option<String>,
}

impl RawStageHistoryEntry {
	/// Start marker under either spelling; empty strings count as absent.
	pub fn start_marker(&self) -> Option<&str> {
		non_empty(self.started.as_deref()).or_else(|| non_empty(self.started_at.as_deref()))
	}

	/// Finish marker under either spelling; empty strings count as absent.
	pub fn finish_marker(&self) -> Option<&str> {
		non_empty(self.finished.as_deref()).or_else(|| non_empty(self.finished_at.as_deref()))
	}
}

/// Employee assigned to an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Employee {
	#[serde(rename = "employeeName", default)]
	pub employee_name: Option<String>,
}

/// An order exactly as the order API sends it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawOrder {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub id: Option<String>,
	/// Document id; some deployments send it next to or instead of `id`.
	#[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
	pub document_id: Option<String>,
	#[serde(default)]
	pub status: Option<String>,
	#[serde(rename = "statusHistory", default, deserialize_with = "null_as_default")]
	pub status_history: Vec<RawStageHistoryEntry>,
	#[serde(rename = "isByPartner_1", default)]
	pub is_by_partner_1: Option<bool>,
	#[serde(rename = "isByPartner_2", default)]
	pub is_by_partner_2: Option<bool>,
	#[serde(rename = "isPanding", default)]
	pub is_panding: Option<bool>,
	#[serde(default)]
	pub employee: Option<Employee>,
}

/// Normalized start/finish markers of one stage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StageProgress {
	pub started: Option<String>,
	pub finished: Option<String>,
}

impl StageProgress {
	pub fn has_started(&self) -> bool {
		self.started.is_some()
	}

	pub fn is_finished(&self) -> bool {
		self.finished.is_some()
	}

	/// Started but not yet finished.
	pub fn is_open(&self) -> bool {
		self.has_started() && !self.is_finished()
	}
}

/// A normalized history record, one per stage at most.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageHistoryEntry {
	pub status: Stage,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub started: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub finished: Option<String>,
}

/// Per-stage progress of an order, indexed by stage.
///
/// A stage without a record is implicitly not started.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<StageHistoryEntry>", into = "Vec<StageHistoryEntry>")]
pub struct StageHistory {
	slots: [Option<StageProgress>; STAGE_COUNT],
}

impl StageHistory {
	pub fn new() -> Self {
		Self::default()
	}

	/// Records markers for a stage, merging with an existing record.
	///
	/// Existing markers are kept; missing ones are filled in.
	pub fn record(&mut self, stage: Stage, started: Option<String>, finished: Option<String>) {
		let slot = self.slots[stage.index()].get_or_insert_with(StageProgress::default);
		if slot.started.is_none() {
			slot.started = started;
		}
		if slot.finished.is_none() {
			slot.finished = finished;
		}
	}

	/// Sets the start marker of a stage, replacing any previous one.
	pub fn mark_started(&mut self, stage: Stage, at: impl Into<String>) {
		self.slots[stage.index()]
			.get_or_insert_with(StageProgress::default)
			.started = Some(at.into());
	}

	/// Sets the finish marker of a stage, replacing any previous one.
	pub fn mark_finished(&mut self, stage: Stage, at: impl Into<String>) {
		self.slots[stage.index()]
			.get_or_insert_with(StageProgress::default)
			.finished = Some(at.into());
	}

	pub fn get(&self, stage: Stage) -> Option<&StageProgress> {
		self.slots[stage.index()].as_ref()
	}

	pub fn has_started(&self, stage: Stage) -> bool {
		self.get(stage).is_some_and(StageProgress::has_started)
	}

	pub fn is_finished(&self, stage: Stage) -> bool {
		self.get(stage).is_some_and(StageProgress::is_finished)
	}

	pub fn is_open(&self, stage: Stage) -> bool {
		self.get(stage).is_some_and(StageProgress::is_open)
	}

	/// True when no stage has a record.
	pub fn is_empty(&self) -> bool {
		self.slots.iter().all(Option::is_none)
	}

	/// The last stage in production order that carries a finish marker.
	pub fn highest_finished(&self) -> Option<Stage> {
		Stage::ALL
			.into_iter()
			.rev()
			.find(|stage| self.is_finished(*stage))
	}

	/// Records in production order.
	pub fn entries(&self) -> Vec<StageHistoryEntry> {
		Stage::ALL
			.into_iter()
			.filter_map(|stage| {
				self.get(stage).map(|progress| StageHistoryEntry {
					status: stage,
					started: progress.started.clone(),
					finished: progress.finished.clone(),
				})
			})
			.collect()
	}
}

impl From<Vec<StageHistoryEntry>> for StageHistory {
	fn from(entries: Vec<StageHistoryEntry>) -> Self {
		let mut history = StageHistory::new();
		for entry in entries {
			history.record(entry.status, entry.started, entry.finished);
		}
		history
	}
}

impl From<StageHistory> for Vec<StageHistoryEntry> {
	fn from(history: StageHistory) -> Self {
		history.entries()
	}
}

/// Partner-flow flags of an order, kept together instead of being
/// threaded through every condition as loose booleans.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartnerWorkflowState {
	/// Order originated through the partner flow (`isByPartner_1`).
	pub by_partner_1: bool,
	/// Shaft production was handed to the partner flow (`isByPartner_2`).
	pub by_partner_2: bool,
	/// Backend is still processing the order (`isPanding`); disables all actions.
	pub pending: bool,
}

/// A normalized order snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
	pub id: String,
	/// The order-level status string as received, which may name a
	/// non-stage status.
	#[serde(default)]
	pub status: Option<String>,
	/// `status` parsed as a stage; `None` when absent or unknown.
	#[serde(default)]
	pub current_stage: Option<Stage>,
	#[serde(default)]
	pub history: StageHistory,
	#[serde(default)]
	pub partner: PartnerWorkflowState,
	#[serde(default)]
	pub employee: Option<Employee>,
}

impl Order {
	/// Creates an order without status or history.
	pub fn new(id: impl Into<String>) -> Self {
		Self {
			id: id.into(),
			status: None,
			current_stage: None,
			history: StageHistory::new(),
			partner: PartnerWorkflowState::default(),
			employee: None,
		}
	}

	/// Sets the order-level status, parsing it as a stage when possible.
	pub fn with_status(mut self, status: impl Into<String>) -> Self {
		self.set_status(status);
		self
	}

	/// Adds a history record.
	pub fn with_entry(mut self, stage: Stage, started: Option<&str>, finished: Option<&str>) -> Self {
		self.history.record(
			stage,
			non_empty(started).map(str::to_string),
			non_empty(finished).map(str::to_string),
		);
		self
	}

	pub fn with_partner(mut self, partner: PartnerWorkflowState) -> Self {
		self.partner = partner;
		self
	}

	pub fn set_status(&mut self, status: impl Into<String>) {
		let status = status.into();
		self.current_stage = status.parse().ok();
		self.status = Some(status);
	}

	/// Parses an order from an API JSON value.
	pub fn from_value(value: serde_json::Value) -> Result<Self, OrderDataError> {
		let raw: RawOrder = serde_json::from_value(value)
			.map_err(|e| OrderDataError::Malformed(e.to_string()))?;
		Order::try_from(raw)
	}

	/// Applies fields propagated after a successful transition.
	pub fn apply_update(&mut self, update: &OrderUpdate) {
		if let Some(status) = &update.status {
			self.set_status(status.clone());
		}
		self.history = update.history.clone();
		if let Some(by_partner_2) = update.by_partner_2 {
			self.partner.by_partner_2 = by_partner_2;
		}
	}

	/// The partial fields the board propagates to the order list.
	pub fn to_update(&self, include_partner: bool) -> OrderUpdate {
		OrderUpdate {
			status: self.status.clone(),
			history: self.history.clone(),
			by_partner_2: include_partner.then_some(self.partner.by_partner_2),
		}
	}
}

impl TryFrom<RawOrder> for Order {
	type Error = OrderDataError;

	fn try_from(raw: RawOrder) -> Result<Self, Self::Error> {
		let id = non_empty(raw.id.as_deref())
			.or_else(|| non_empty(raw.document_id.as_deref()))
			.ok_or(OrderDataError::MissingId)?
			.to_string();

		let mut history = StageHistory::new();
		for entry in &raw.status_history {
			match entry.status.parse::<Stage>() {
				Ok(stage) => history.record(
					stage,
					entry.start_marker().map(str::to_string),
					entry.finish_marker().map(str::to_string),
				),
				Err(_) => tracing::debug!(
					order_id = %id,
					status = %entry.status,
					"Dropping history entry with unknown stage"
				),
			}
		}

		let status = raw.status.filter(|s| !s.trim().is_empty());
		let current_stage = status.as_deref().and_then(|s| s.parse().ok());

		Ok(Order {
			id,
			status,
			current_stage,
			history,
			partner: PartnerWorkflowState {
				by_partner_1: raw.is_by_partner_1.unwrap_or(false),
				by_partner_2: raw.is_by_partner_2.unwrap_or(false),
				pending: raw.is_panding.unwrap_or(false),
			},
			employee: raw.employee,
		})
	}
}

/// Fields propagated to the order list after a transition, so the list
/// can update in place without a full reload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderUpdate {
	pub status: Option<String>,
	pub history: StageHistory,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub by_partner_2: Option<bool>,
}

fn non_empty(value: Option<&str>) -> Option<&str> {
	value.filter(|s| !s.trim().is_empty())
}

/// Accepts strings, numbers and booleans as markers; null and `false` are absent.
fn lenient_marker<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
	D: Deserializer<'de>,
{
	let value = Option::<serde_json::Value>::deserialize(deserializer)?;
	Ok(match value {
		Some(serde_json::Value::String(s)) => Some(s),
		Some(serde_json::Value::Number(n)) => Some(n.to_string()),
		Some(serde_json::Value::Bool(true)) => Some("true".to_string()),
		_ => None,
	})
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
	D: Deserializer<'de>,
	T: Default + Deserialize<'de>,
{
	Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
