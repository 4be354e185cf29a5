//! Ordered rule table of the classifier. First match wins.

use super::{Frontier, FrontierKind};
use board_types::StageState;
use std::fmt;

/// Identifies the classification rule that decided a stage's state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuleId {
	/// The stage carries a finish marker.
	ExplicitFinish,
	/// A later stage is finished.
	LaterFinish,
	/// The order-level status is past the stage.
	AuthorityIndex,
	/// The history-derived current stage is past the stage.
	DerivedCurrent,
	/// First stage of an order nothing has happened to yet.
	FreshStart,
	/// The stage is the frontier.
	CurrentStage,
	/// The stage follows an auto-advanced frontier and is untouched.
	NextUp,
	Waiting,
	/// Order data was missing or unusable.
	Placeholder,
}

impl RuleId {
	pub fn as_str(self) -> &'static str {
		match self {
			RuleId::ExplicitFinish => "explicit-finish",
			RuleId::LaterFinish => "later-finish",
			RuleId::AuthorityIndex => "authority-index",
			RuleId::DerivedCurrent => "derived-current",
			RuleId::FreshStart => "fresh-start",
			RuleId::CurrentStage => "current-stage",
			RuleId::NextUp => "next-up",
			RuleId::Waiting => "waiting",
			RuleId::Placeholder => "placeholder",
		}
	}
}

impl fmt::Display for RuleId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// What the rules know about the stage being classified.
pub(super) struct StageFacts {
	pub index: usize,
	pub started: bool,
	pub finished: bool,
}

pub(super) struct Rule {
	pub id: RuleId,
	pub state: StageState,
	pub applies: fn(&Frontier, &StageFacts) -> bool,
}

pub(super) static RULES: [Rule; 8] = [
	Rule {
		id: RuleId::ExplicitFinish,
		state: StageState::Abgeschlossen,
		applies: |_, stage| stage.finished,
	},
	Rule {
		id: RuleId::LaterFinish,
		state: StageState::Abgeschlossen,
		applies: |frontier, stage| stage.index < frontier.finished_bound,
	},
	Rule {
		id: RuleId::AuthorityIndex,
		state: StageState::Abgeschlossen,
		applies: |frontier, stage| frontier.authority.is_some_and(|k| stage.index < k),
	},
	Rule {
		id: RuleId::DerivedCurrent,
		state: StageState::Abgeschlossen,
		applies: |frontier, stage| stage.index < frontier.derived,
	},
	Rule {
		id: RuleId::FreshStart,
		state: StageState::InBearbeitung,
		applies: |frontier, stage| {
			stage.index == frontier.index && frontier.kind == FrontierKind::Fresh
		},
	},
	Rule {
		id: RuleId::CurrentStage,
		state: StageState::InFertigung,
		applies: |frontier, stage| stage.index == frontier.index,
	},
	Rule {
		id: RuleId::NextUp,
		state: StageState::InBearbeitung,
		applies: |frontier, stage| {
			stage.index == frontier.index + 1
				&& frontier.kind == FrontierKind::AutoAdvance
				&& !stage.started
				&& !stage.finished
		},
	},
	Rule {
		id: RuleId::Waiting,
		state: StageState::Wartend,
		applies: |_, _| true,
	},
];

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_table_ends_with_catch_all() {
		let last = &RULES[RULES.len() - 1];
		assert_eq!(last.id, RuleId::Waiting);
		assert_eq!(last.state, StageState::Wartend);
	}

	#[test]
	fn test_rule_names_are_unique() {
		let mut names: Vec<_> = RULES.iter().map(|r| r.id.as_str()).collect();
		names.sort_unstable();
		names.dedup();
		assert_eq!(names.len(), RULES.len());
	}
}
