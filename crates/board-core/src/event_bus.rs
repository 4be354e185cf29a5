//! Broadcast channel for board events.
//!
//! Stands in for the callbacks a parent list view registers: the order
//! list, the statistics cards and the production chart each subscribe and
//! react to the events they care about.

use board_types::BoardEvent;
use tokio::sync::broadcast;

/// Cloneable handle to the board's event channel.
#[derive(Clone)]
pub struct EventBus {
	sender: broadcast::Sender<BoardEvent>,
}

impl EventBus {
	/// Creates a bus buffering up to `capacity` events per slow subscriber.
	pub fn new(capacity: usize) -> Self {
		let (sender, _) = broadcast::channel(capacity);
		Self { sender }
	}

	pub fn subscribe(&self) -> broadcast::Receiver<BoardEvent> {
		self.sender.subscribe()
	}

	/// Publishes an event. Fails only when nobody is subscribed.
	pub fn publish(
		&self,
		event: BoardEvent,
	) -> Result<usize, broadcast::error::SendError<BoardEvent>> {
		self.sender.send(event)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn test_subscribers_receive_events() {
		let bus = EventBus::new(16);
		let mut chart = bus.subscribe();
		let mut stats = bus.subscribe();

		assert_eq!(bus.publish(BoardEvent::RefetchChart).unwrap(), 2);
		assert!(matches!(chart.recv().await.unwrap(), BoardEvent::RefetchChart));
		assert!(matches!(stats.recv().await.unwrap(), BoardEvent::RefetchChart));
	}

	#[test]
	fn test_publish_without_subscribers_fails() {
		let bus = EventBus::new(16);
		assert!(bus.publish(BoardEvent::RefetchProductionView).is_err());
	}
}
