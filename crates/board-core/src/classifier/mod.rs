//! Stage classification.
//!
//! Every stage of an order is shown in exactly one of four states. The
//! state is derived from two sources that may disagree: the per-stage
//! history log and the order-level `status` field, which the order API
//! keeps authoritative. Both are reduced to a single [`Frontier`], the
//! first stage that is not yet complete, and an ordered rule table maps
//! each stage to its state relative to that frontier.
//!
//! Classification is pure: the same order always yields the same board.

mod rules;

#[cfg(test)]
mod property_tests;

pub use rules::RuleId;

use board_types::{truncate_id, Order, Stage, StageState, STAGE_COUNT};
use rules::{StageFacts, RULES};

/// How the frontier stage was determined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrontierKind {
	/// A stage was started and not finished.
	Started,
	/// Nothing is open; the frontier follows the last finished stage.
	AutoAdvance,
	/// Nothing is started or finished yet.
	Fresh,
	/// The order-level status points past the history.
	Authority,
}

/// The first incomplete stage of an order, and how it was found.
///
/// Indices run from 0 to [`STAGE_COUNT`]; an index of `STAGE_COUNT` means
/// every stage is complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frontier {
	/// One past the last finished stage.
	pub finished_bound: usize,
	/// Index of the order-level status, when it names a stage.
	pub authority: Option<usize>,
	/// Frontier derived from history alone.
	pub derived: usize,
	pub derived_kind: FrontierKind,
	/// Combined frontier; the authority wins when it is further along.
	pub index: usize,
	pub kind: FrontierKind,
}

impl Frontier {
	/// Reduces an order's history and status to its frontier.
	pub fn of(order: &Order) -> Self {
		let history = &order.history;
		let finished_bound = history
			.highest_finished()
			.map(|stage| stage.index() + 1)
			.unwrap_or(0);

		let open = Stage::ALL
			.into_iter()
			.skip(finished_bound)
			.find(|stage| history.is_open(*stage));

		let (derived, derived_kind) = match open {
			Some(stage) => (stage.index(), FrontierKind::Started),
			None if finished_bound > 0 => (finished_bound, FrontierKind::AutoAdvance),
			None => (finished_bound, FrontierKind::Fresh),
		};

		let authority = order.current_stage.map(Stage::index);
		let (index, kind) = match authority {
			Some(k) if k > derived => (k, FrontierKind::Authority),
			_ => (derived, derived_kind),
		};

		Self {
			finished_bound,
			authority,
			derived,
			derived_kind,
			index,
			kind,
		}
	}
}

/// The state of one stage and the rule that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
	pub stage: Stage,
	pub state: StageState,
	pub rule: RuleId,
}

/// Classification of all six stages of one order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardClassification {
	stages: [Classification; STAGE_COUNT],
	frontier: Option<Frontier>,
}

impl BoardClassification {
	/// Every stage waiting; used when the order is missing or malformed.
	pub fn placeholder() -> Self {
		Self {
			stages: Stage::ALL.map(|stage| Classification {
				stage,
				state: StageState::Wartend,
				rule: RuleId::Placeholder,
			}),
			frontier: None,
		}
	}

	pub fn get(&self, stage: Stage) -> Classification {
		self.stages[stage.index()]
	}

	pub fn state(&self, stage: Stage) -> StageState {
		self.get(stage).state
	}

	/// Classifications in production order.
	pub fn iter(&self) -> impl Iterator<Item = &Classification> {
		self.stages.iter()
	}

	/// `None` for the placeholder board.
	pub fn frontier(&self) -> Option<Frontier> {
		self.frontier
	}

	pub fn is_placeholder(&self) -> bool {
		self.frontier.is_none()
	}
}

/// Classifies a single stage.
pub fn classify(stage: Stage, order: &Order) -> StageState {
	classify_with_rule(stage, order).state
}

/// Classifies a single stage and reports the rule that matched.
pub fn classify_with_rule(stage: Stage, order: &Order) -> Classification {
	evaluate(stage, order, &Frontier::of(order))
}

/// Classifies every stage of an order.
pub fn classify_board(order: &Order) -> BoardClassification {
	let frontier = Frontier::of(order);
	BoardClassification {
		stages: Stage::ALL.map(|stage| evaluate(stage, order, &frontier)),
		frontier: Some(frontier),
	}
}

/// Classifies an order straight from the order API's JSON.
///
/// Payloads that cannot be read as an order yield the placeholder board.
pub fn classify_value(value: serde_json::Value) -> BoardClassification {
	match Order::from_value(value) {
		Ok(order) => classify_board(&order),
		Err(e) => {
			tracing::warn!(error = %e, "Order data unusable, showing placeholder board");
			BoardClassification::placeholder()
		},
	}
}

fn evaluate(stage: Stage, order: &Order, frontier: &Frontier) -> Classification {
	let facts = StageFacts {
		index: stage.index(),
		started: order.history.has_started(stage),
		finished: order.history.is_finished(stage),
	};

	// The last rule always matches
	let rule = RULES
		.iter()
		.find(|rule| (rule.applies)(frontier, &facts))
		.unwrap_or(&RULES[RULES.len() - 1]);

	tracing::trace!(
		order_id = %truncate_id(&order.id),
		stage = %stage,
		rule = rule.id.as_str(),
		"Classified stage"
	);

	Classification {
		stage,
		state: rule.state,
		rule: rule.id,
	}
}
