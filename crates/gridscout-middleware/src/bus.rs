//! In-process, topic-based telemetry bus.
//!
//! Uses [`tokio::sync::broadcast`] channels so every subscriber receives
//! every message and a slow subscriber never blocks the controller.
//!
//! | Topic | Typical traffic |
//! |---|---|
//! | [`Topic::Pose`] | Robot pose after each move |
//! | [`Topic::Map`] | Coverage after each sense cycle |
//! | [`Topic::Session`] | Start, sweep detours, going home, finished |

use gridscout_types::Event;
use tokio::sync::broadcast;
use tracing::warn;

/// Buffered events per topic before slow subscribers start lagging.
const DEFAULT_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    Pose,
    Map,
    Session,
}

/// Shared event bus.  Clones share the same channels.
#[derive(Clone, Debug)]
pub struct EventBus {
    pose: broadcast::Sender<Event>,
    map: broadcast::Sender<Event>,
    session: broadcast::Sender<Event>,
}

impl EventBus {
    /// `capacity` applies to every topic independently.
    pub fn new(capacity: usize) -> Self {
        let (pose, _) = broadcast::channel(capacity);
        let (map, _) = broadcast::channel(capacity);
        let (session, _) = broadcast::channel(capacity);
        Self { pose, map, session }
    }

    /// Publish `event` on `topic`.
    ///
    /// Returns the number of subscribers that were handed the event.  Zero
    /// subscribers is a normal condition.
    pub fn publish(&self, topic: Topic, event: Event) -> usize {
        self.sender(topic).send(event).unwrap_or(0)
    }

    pub fn subscribe(&self, topic: Topic) -> TopicReceiver {
        TopicReceiver {
            topic,
            receiver: self.sender(topic).subscribe(),
        }
    }

    fn sender(&self, topic: Topic) -> &broadcast::Sender<Event> {
        match topic {
            Topic::Pose => &self.pose,
            Topic::Map => &self.map,
            Topic::Session => &self.session,
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

/// Receiver bound to a single [`Topic`].
pub struct TopicReceiver {
    topic: Topic,
    receiver: broadcast::Receiver<Event>,
}

impl TopicReceiver {
    /// Next event on this topic, or `None` once every sender is gone.
    ///
    /// Lag is logged and skipped over.
    pub async fn recv(&mut self) -> Option<Event> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(topic = ?self.topic, lagged_by = n, "subscriber lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Next event if one is already buffered.
    pub fn try_recv(&mut self) -> Option<Event> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => return Some(event),
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    warn!(topic = ?self.topic, lagged_by = n, "subscriber lagged");
                }
                Err(_) => return None,
            }
        }
    }

    pub fn topic(&self) -> Topic {
        self.topic
    }
}
