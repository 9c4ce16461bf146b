//! Event bus for broadcasting engine events to interested consumers.
//!
//! Built on a tokio broadcast channel; publishing never blocks and a
//! publish with no live subscribers is not an error.

use fulfillment_types::FulfillmentEvent;
use tokio::sync::broadcast;

/// Broadcast bus for [`FulfillmentEvent`]s.
#[derive(Clone)]
pub struct EventBus {
	sender: broadcast::Sender<FulfillmentEvent>,
}

impl EventBus {
	/// Creates a new event bus with the given channel capacity.
	pub fn new(capacity: usize) -> Self {
		let (sender, _) = broadcast::channel(capacity);
		Self { sender }
	}

	/// Publishes an event to all current subscribers.
	///
	/// Returns the number of subscribers the event reached. An error only
	/// means nobody is listening, which callers typically ignore.
	pub fn publish(
		&self,
		event: FulfillmentEvent,
	) -> Result<usize, broadcast::error::SendError<FulfillmentEvent>> {
		self.sender.send(event)
	}

	/// Creates a new subscription to the event stream.
	pub fn subscribe(&self) -> broadcast::Receiver<FulfillmentEvent> {
		self.sender.subscribe()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use fulfillment_types::OrderEvent;

	#[tokio::test]
	async fn subscribers_receive_published_events() {
		let bus = EventBus::new(16);
		let mut receiver = bus.subscribe();

		bus.publish(FulfillmentEvent::Order(OrderEvent::Created {
			order_id: "o-1".to_string(),
		}))
		.unwrap();

		match receiver.recv().await.unwrap() {
			FulfillmentEvent::Order(OrderEvent::Created { order_id }) => {
				assert_eq!(order_id, "o-1");
			},
			other => panic!("unexpected event: {:?}", other),
		}
	}

	#[test]
	fn publish_without_subscribers_is_not_fatal() {
		let bus = EventBus::new(16);
		let result = bus.publish(FulfillmentEvent::Order(OrderEvent::Created {
			order_id: "o-2".to_string(),
		}));
		assert!(result.is_err());
	}
}
