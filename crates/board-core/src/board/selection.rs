//! The currently selected order and its generation.
//!
//! Every selection change bumps the generation. Async work captures the
//! generation when it starts and checks it when it completes; results of
//! work started under an older selection are discarded.

use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;

/// Selection generation captured by in-flight work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Generation(u64);

#[derive(Default)]
pub struct Selection {
	generation: AtomicU64,
	order_id: RwLock<Option<String>>,
}

impl Selection {
	pub fn new() -> Self {
		Self::default()
	}

	/// Selects an order and returns the new generation.
	pub async fn select(&self, order_id: &str) -> Generation {
		let mut selected = self.order_id.write().await;
		*selected = Some(order_id.to_string());
		Generation(self.generation.fetch_add(1, Ordering::SeqCst) + 1)
	}

	pub fn current(&self) -> Generation {
		Generation(self.generation.load(Ordering::SeqCst))
	}

	/// Whether no selection change happened since `generation` was taken.
	pub fn is_current(&self, generation: Generation) -> bool {
		self.current() == generation
	}

	pub async fn selected(&self) -> Option<String> {
		self.order_id.read().await.clone()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn test_new_selection_invalidates_older_generation() {
		let selection = Selection::new();
		let first = selection.select("o-1").await;
		assert!(selection.is_current(first));

		let second = selection.select("o-2").await;
		assert!(!selection.is_current(first));
		assert!(selection.is_current(second));
		assert_eq!(selection.selected().await.as_deref(), Some("o-2"));
	}

	#[tokio::test]
	async fn test_reselecting_same_order_still_bumps() {
		let selection = Selection::new();
		let first = selection.select("o-1").await;
		selection.select("o-1").await;
		assert!(!selection.is_current(first));
	}
}
