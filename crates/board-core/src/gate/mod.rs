//! Action gating for stage cards.
//!
//! Decides which buttons a stage card shows and whether a requested
//! transition is allowed. The per-stage policy is a fixed table; the only
//! inputs are the classified board, the order's history and its partner
//! workflow flags. While the order API reports the order as pending, every
//! action is disabled.

pub mod confirmation;

use crate::classifier::BoardClassification;
use board_config::RoutesConfig;
use board_types::{with_query, ActionKind, ActionView, Order, Stage, StageActions, StageState};
use thiserror::Error;

pub use confirmation::{ConfirmationRegistry, PendingTransition};

const PRIMARY_LABEL: &str = "In Fertigung";
const ORDER_CREATION_LABEL: &str = "Auftrag bearbeiten";
const SHAFT_ORDER_LABEL: &str = "Jetzt Schaft bestellen";

/// Errors returned when an action is refused.
#[derive(Debug, Error)]
pub enum GateError {
	/// The order API is still processing the order.
	#[error("Order {0} is pending, actions are disabled")]
	Disabled(String),
	/// The stage offers no primary action in its current state.
	#[error("No action available for {stage} while {state}")]
	ActionUnavailable { stage: Stage, state: StageState },
	#[error("Unknown confirmation token: {0}")]
	UnknownToken(String),
	#[error("Confirmation token expired: {0}")]
	Expired(String),
}

/// When the primary "In Fertigung" button is shown.
#[derive(Debug, Clone, Copy)]
enum PrimaryRule {
	/// Stage is current or next up.
	WhileActive,
	/// Stage is current or next up and has no finish marker.
	WhileActiveUnfinished,
	/// Stage is incomplete and its prerequisite is done, or the partner
	/// flow, an admin override or an open start makes it available.
	AfterPrerequisite(Stage),
	WhileInFertigung,
}

/// When the secondary navigation button is shown.
#[derive(Debug, Clone, Copy)]
enum SecondaryRule {
	None,
	/// Next to the primary unless the order came through the partner flow.
	OrderCreation,
	/// Next to the primary while the shaft is neither handed to the
	/// partner nor started.
	ShaftOrder { blocked_by_partner_1: bool },
}

#[derive(Debug, Clone, Copy)]
struct StagePolicy {
	primary: PrimaryRule,
	effect: ActionKind,
	secondary: SecondaryRule,
}

const fn policy(stage: Stage) -> StagePolicy {
	use PrimaryRule::*;
	let (primary, effect, secondary) = match stage {
		Stage::Leistenerstellung | Stage::Bettungsherstellung => {
			(WhileActive, ActionKind::StatusUpdate, SecondaryRule::OrderCreation)
		},
		Stage::Halbprobenerstellung => {
			(WhileActiveUnfinished, ActionKind::StatusUpdate, SecondaryRule::None)
		},
		Stage::Schafterstellung => (
			AfterPrerequisite(Stage::Halbprobenerstellung),
			ActionKind::PartnerThenStatus,
			SecondaryRule::ShaftOrder {
				blocked_by_partner_1: false,
			},
		),
		Stage::Bodenerstellung => (
			AfterPrerequisite(Stage::Schafterstellung),
			ActionKind::StatusUpdate,
			SecondaryRule::ShaftOrder {
				blocked_by_partner_1: true,
			},
		),
		Stage::Geliefert => (WhileInFertigung, ActionKind::StatusUpdate, SecondaryRule::None),
	};
	StagePolicy {
		primary,
		effect,
		secondary,
	}
}

/// Status set by an admin directly, with no history recorded yet.
fn is_admin_override(stage: Stage, order: &Order) -> bool {
	order.history.is_empty() && order.current_stage == Some(stage)
}

/// Button policy for stage cards.
#[derive(Debug, Clone)]
pub struct ActionGate {
	routes: RoutesConfig,
}

impl ActionGate {
	pub fn new(routes: RoutesConfig) -> Self {
		Self { routes }
	}

	/// Whether the stage's primary action is shown, ignoring the pending flag.
	pub fn primary_eligible(&self, stage: Stage, order: &Order, board: &BoardClassification) -> bool {
		if board.is_placeholder() {
			return false;
		}
		let state = board.state(stage);
		match policy(stage).primary {
			PrimaryRule::WhileActive => state.is_active(),
			PrimaryRule::WhileActiveUnfinished => {
				state.is_active() && !order.history.is_finished(stage)
			},
			PrimaryRule::AfterPrerequisite(prerequisite) => {
				!state.is_completed()
					&& (order.partner.by_partner_1
						|| board.state(prerequisite).is_completed()
						|| is_admin_override(stage, order)
						|| order.history.is_open(stage))
			},
			PrimaryRule::WhileInFertigung => state == StageState::InFertigung,
		}
	}

	/// The buttons of a stage card.
	///
	/// `secondary_held` keeps the secondary button disabled after a partner
	/// action until the hold is released.
	pub fn actions(
		&self,
		stage: Stage,
		order: &Order,
		board: &BoardClassification,
		secondary_held: bool,
	) -> StageActions {
		let eligible = self.primary_eligible(stage, order, board);
		let StagePolicy {
			effect, secondary, ..
		} = policy(stage);

		let primary = eligible.then(|| ActionView {
			kind: effect,
			label: PRIMARY_LABEL.to_string(),
			href: None,
		});

		let partner = &order.partner;
		let secondary = match secondary {
			SecondaryRule::None => None,
			SecondaryRule::OrderCreation => (eligible && !partner.by_partner_1).then(|| ActionView {
				kind: ActionKind::Navigate,
				label: ORDER_CREATION_LABEL.to_string(),
				href: Some(with_query(
					&self.routes.order_creation,
					&[("orderId", order.id.as_str()), ("stage", stage.card_id())],
				)),
			}),
			SecondaryRule::ShaftOrder {
				blocked_by_partner_1,
			} => {
				let blocked = partner.by_partner_2
					|| (blocked_by_partner_1 && partner.by_partner_1)
					|| order.history.has_started(stage);
				(eligible && !blocked).then(|| ActionView {
					kind: ActionKind::Navigate,
					label: SHAFT_ORDER_LABEL.to_string(),
					href: Some(with_query(&self.routes.shaft_order, &[("orderId", order.id.as_str())])),
				})
			},
		};

		StageActions {
			secondary_disabled: secondary.is_some() && secondary_held,
			primary,
			secondary,
			disabled: partner.pending,
		}
	}

	/// Checks that the stage's primary action may run and returns its effect.
	pub fn authorize(
		&self,
		stage: Stage,
		order: &Order,
		board: &BoardClassification,
	) -> Result<ActionKind, GateError> {
		if order.partner.pending {
			return Err(GateError::Disabled(order.id.clone()));
		}
		if !self.primary_eligible(stage, order, board) {
			return Err(GateError::ActionUnavailable {
				stage,
				state: board.state(stage),
			});
		}
		Ok(policy(stage).effect)
	}
}

/// Question shown before a transition runs.
pub fn confirmation_prompt(order: &Order, stage: Stage) -> String {
	format!(
		"Möchten Sie den Auftrag {} wirklich in den Status \"{}\" setzen?",
		order.id, stage
	)
}
