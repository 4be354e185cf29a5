//! Production stages and their display states.
//!
//! A custom shoe order moves through six fixed stages, always in the same
//! order. Each stage is shown on the board in exactly one of four states.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Number of production stages on the board.
pub const STAGE_COUNT: usize = 6;

/// One of the six sequential production steps of a custom shoe order.
///
/// The declaration order is the production order; `Ord` follows it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Stage {
	Leistenerstellung,
	Bettungsherstellung,
	Halbprobenerstellung,
	Schafterstellung,
	Bodenerstellung,
	Geliefert,
}

/// Error returned when a string names no known stage.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown stage: {0}")]
pub struct UnknownStage(pub String);

impl Stage {
	/// All stages in production order.
	pub const ALL: [Stage; STAGE_COUNT] = [
		Stage::Leistenerstellung,
		Stage::Bettungsherstellung,
		Stage::Halbprobenerstellung,
		Stage::Schafterstellung,
		Stage::Bodenerstellung,
		Stage::Geliefert,
	];

	/// Zero-based position in the production order.
	pub fn index(self) -> usize {
		self as usize
	}

	/// Returns the stage at `index`, if any.
	pub fn from_index(index: usize) -> Option<Self> {
		Self::ALL.get(index).copied()
	}

	/// The stage name as the order API spells it.
	pub fn as_str(self) -> &'static str {
		match self {
			Stage::Leistenerstellung => "Leistenerstellung",
			Stage::Bettungsherstellung => "Bettungsherstellung",
			Stage::Halbprobenerstellung => "Halbprobenerstellung",
			Stage::Schafterstellung => "Schafterstellung",
			Stage::Bodenerstellung => "Bodenerstellung",
			Stage::Geliefert => "Geliefert",
		}
	}

	/// Card identifier used by the board for lookup (the lowercased name).
	pub fn card_id(self) -> &'static str {
		match self {
			Stage::Leistenerstellung => "leistenerstellung",
			Stage::Bettungsherstellung => "bettungsherstellung",
			Stage::Halbprobenerstellung => "halbprobenerstellung",
			Stage::Schafterstellung => "schafterstellung",
			Stage::Bodenerstellung => "bodenerstellung",
			Stage::Geliefert => "geliefert",
		}
	}

	/// The stage that follows this one, `None` for the last stage.
	pub fn next(self) -> Option<Self> {
		Self::from_index(self.index() + 1)
	}

	/// The stage that precedes this one, `None` for the first stage.
	pub fn previous(self) -> Option<Self> {
		self.index().checked_sub(1).and_then(Self::from_index)
	}
}

impl fmt::Display for Stage {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Parses a stage from its API name or card id, ignoring case and
/// surrounding whitespace.
impl FromStr for Stage {
	type Err = UnknownStage;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let needle = s.trim();
		Self::ALL
			.into_iter()
			.find(|stage| stage.card_id().eq_ignore_ascii_case(needle))
			.ok_or_else(|| UnknownStage(s.to_string()))
	}
}

/// Display state of a stage on the production board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StageState {
	/// Completed.
	#[serde(rename = "ABGESCHLOSSEN")]
	Abgeschlossen,
	/// Actively in production.
	#[serde(rename = "IN FERTIGUNG")]
	InFertigung,
	/// Next eligible stage, not yet started.
	#[serde(rename = "IN BEARBEITUNG")]
	InBearbeitung,
	/// Waiting.
	#[serde(rename = "WARTEND")]
	Wartend,
}

impl StageState {
	/// The German label shown in the UI.
	pub fn label(self) -> &'static str {
		match self {
			StageState::Abgeschlossen => "ABGESCHLOSSEN",
			StageState::InFertigung => "IN FERTIGUNG",
			StageState::InBearbeitung => "IN BEARBEITUNG",
			StageState::Wartend => "WARTEND",
		}
	}

	pub fn is_completed(self) -> bool {
		self == StageState::Abgeschlossen
	}

	/// Whether the stage is the current or next-up one.
	pub fn is_active(self) -> bool {
		matches!(self, StageState::InFertigung | StageState::InBearbeitung)
	}
}

impl fmt::Display for StageState {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.label())
	}
}
