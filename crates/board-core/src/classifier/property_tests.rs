//! Property-based tests for the classifier.

use super::*;
use proptest::prelude::*;

/// Markers of one stage: none, started, finished, or both.
fn any_progress() -> impl Strategy<Value = Option<(bool, bool)>> {
	prop_oneof![
		Just(None),
		Just(Some((true, false))),
		Just(Some((false, true))),
		Just(Some((true, true))),
	]
}

fn any_status() -> impl Strategy<Value = Option<String>> {
	prop_oneof![
		Just(None),
		(0..STAGE_COUNT).prop_map(|i| Some(Stage::ALL[i].as_str().to_string())),
		Just(Some("Storniert".to_string())),
	]
}

fn any_order() -> impl Strategy<Value = Order> {
	(prop::collection::vec(any_progress(), STAGE_COUNT), any_status()).prop_map(
		|(progress, status)| {
			let mut order = Order::new("o-prop");
			for (stage, markers) in Stage::ALL.into_iter().zip(progress) {
				if let Some((started, finished)) = markers {
					order = order.with_entry(
						stage,
						started.then_some("t-start"),
						finished.then_some("t-finish"),
					);
				}
			}
			if let Some(status) = status {
				order.set_status(status);
			}
			order
		},
	)
}

proptest! {
	/// A completed stage is never preceded by an incomplete one.
	#[test]
	fn test_monotonic_completion(order in any_order()) {
		let board = classify_board(&order);
		for pair in Stage::ALL.windows(2) {
			if board.state(pair[1]).is_completed() {
				prop_assert!(board.state(pair[0]).is_completed(), "{:?}", board);
			}
		}
	}

	#[test]
	fn test_single_current_stage(order in any_order()) {
		let board = classify_board(&order);
		let count = |state| board.iter().filter(|c| c.state == state).count();
		prop_assert!(count(StageState::InFertigung) <= 1);
		prop_assert!(count(StageState::InBearbeitung) <= 1);
	}

	#[test]
	fn test_finish_marker_always_completes(order in any_order()) {
		let board = classify_board(&order);
		for stage in Stage::ALL {
			if order.history.is_finished(stage) {
				prop_assert_eq!(board.get(stage).rule, RuleId::ExplicitFinish);
			}
		}
	}

	/// On an empty history the status alone decides the board.
	#[test]
	fn test_authority_on_empty_history(k in 1..STAGE_COUNT) {
		let order = Order::new("o-prop").with_status(Stage::ALL[k].as_str());
		let board = classify_board(&order);
		for stage in Stage::ALL {
			let expected = match stage.index() {
				i if i < k => StageState::Abgeschlossen,
				i if i == k => StageState::InFertigung,
				_ => StageState::Wartend,
			};
			prop_assert_eq!(board.state(stage), expected);
		}
	}

	#[test]
	fn test_classification_is_idempotent(order in any_order()) {
		let first = classify_board(&order);
		prop_assert_eq!(&first, &classify_board(&order));
		for stage in Stage::ALL {
			prop_assert_eq!(classify_with_rule(stage, &order), first.get(stage));
		}
	}
}
