//! Headless, typed, topic-based publish/subscribe event bus.
//!
//! Uses [`tokio::sync::broadcast`] channels under the hood so that every
//! subscriber receives every message without any single subscriber blocking
//! the others.
//!
//! # Topics
//!
//! | Topic | Typical traffic |
//! |---|---|
//! | [`Topic::Localization`] | Pose samples from the localization stack |
//! | [`Topic::Velocity`] | Expected (commanded) and actual (observed) velocities |
//! | [`Topic::Signals`] | Kill, pause, soft pause, drive-mode toggle, emergency stop |
//! | [`Topic::Status`] | Robot state / drive mode heartbeat, once per tick |
//! | [`Topic::Recovery`] | Backup maneuvers issued after a stall verdict |
//! | [`Topic::StallStatus`] | Reserved; nothing is published here yet |
//!
//! Every published event is stamped with a bus-wide sequence number, so a
//! [`MergedReceiver`] can replay several topics in publish order.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use rover_types::{Event, RoverError};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::TryRecvError;
use tracing::warn;

/// Default queue depth of every topic channel.
const DEFAULT_CAPACITY: usize = 100;

/// Enumeration of all routing topics on the event bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    /// `EventPayload::Pose` samples.
    Localization,
    /// `EventPayload::Velocity` samples, tagged expected or actual.
    Velocity,
    /// `EventPayload::Signal` boolean inputs.
    Signals,
    /// `EventPayload::Status` heartbeat.
    Status,
    /// `EventPayload::Recovery` backup maneuvers.
    Recovery,
    /// Reserved output for stall / navigation PID status.
    StallStatus,
}

/// Shared event bus. Clone it cheaply – all clones share the same underlying
/// broadcast channels.
#[derive(Clone, Debug)]
pub struct EventBus {
    sequence: Arc<AtomicU64>,
    localization: broadcast::Sender<Sequenced>,
    velocity: broadcast::Sender<Sequenced>,
    signals: broadcast::Sender<Sequenced>,
    status: broadcast::Sender<Sequenced>,
    recovery: broadcast::Sender<Sequenced>,
    stall_status: broadcast::Sender<Sequenced>,
}

/// An event tagged with its bus-wide publish position.
#[derive(Clone, Debug)]
struct Sequenced {
    seq: u64,
    event: Event,
}

impl EventBus {
    /// Create a new bus.  `capacity` is applied to every topic channel
    /// independently and must be non-zero.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            sequence: Arc::new(AtomicU64::new(0)),
            localization: broadcast::channel(capacity).0,
            velocity: broadcast::channel(capacity).0,
            signals: broadcast::channel(capacity).0,
            status: broadcast::channel(capacity).0,
            recovery: broadcast::channel(capacity).0,
            stall_status: broadcast::channel(capacity).0,
        }
    }

    /// Publish `event` to the given [`Topic`] channel.
    ///
    /// Returns the number of active receivers that were handed the event, or
    /// [`RoverError::Channel`] when nobody is subscribed to the topic.
    pub fn publish_to(&self, topic: Topic, event: Event) -> Result<usize, RoverError> {
        let seq = self.sequence.fetch_add(1, Ordering::SeqCst);
        self.topic_sender(topic)
            .send(Sequenced { seq, event })
            .map_err(|_| RoverError::Channel(format!("No subscribers for topic {topic:?}")))
    }

    /// Subscribe to a specific [`Topic`] channel.
    ///
    /// The receiver only sees events published after this call.
    pub fn subscribe_to(&self, topic: Topic) -> TopicReceiver {
        TopicReceiver {
            topic,
            receiver: self.topic_sender(topic).subscribe(),
        }
    }

    /// Subscribe to several topics at once, receiving their events merged
    /// in publish order.
    pub fn subscribe_merged(&self, topics: &[Topic]) -> MergedReceiver {
        MergedReceiver {
            inputs: topics
                .iter()
                .map(|&topic| (self.subscribe_to(topic), None))
                .collect(),
        }
    }

    /// Number of live receivers on `topic`.
    pub fn subscriber_count(&self, topic: Topic) -> usize {
        self.topic_sender(topic).receiver_count()
    }

    fn topic_sender(&self, topic: Topic) -> &broadcast::Sender<Sequenced> {
        match topic {
            Topic::Localization => &self.localization,
            Topic::Velocity => &self.velocity,
            Topic::Signals => &self.signals,
            Topic::Status => &self.status,
            Topic::Recovery => &self.recovery,
            Topic::StallStatus => &self.stall_status,
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Topic-bound receiver
// ---------------------------------------------------------------------------

/// A receiver bound to a single [`Topic`] channel.
///
/// Obtained via [`EventBus::subscribe_to`].
pub struct TopicReceiver {
    topic: Topic,
    receiver: broadcast::Receiver<Sequenced>,
}

impl TopicReceiver {
    /// Wait for the next event on this topic.
    ///
    /// Returns:
    /// * `Ok(event)` – a successfully received event.
    /// * `Err(broadcast::error::RecvError::Lagged(n))` – the subscriber fell
    ///   behind and `n` messages were dropped.  The caller decides whether to
    ///   continue or abort.
    /// * `Err(broadcast::error::RecvError::Closed)` – the bus has shut down.
    pub async fn recv(&mut self) -> Result<Event, broadcast::error::RecvError> {
        self.receiver.recv().await.map(|s| s.event)
    }

    /// Take the next queued event without waiting.
    ///
    /// Returns `None` when the queue is empty or the bus is closed.  Dropped
    /// events on a lagging receiver are logged and skipped.
    pub fn try_recv(&mut self) -> Option<Event> {
        self.try_recv_sequenced().map(|s| s.event)
    }

    /// The [`Topic`] this receiver is bound to.
    pub fn topic(&self) -> Topic {
        self.topic
    }

    fn try_recv_sequenced(&mut self) -> Option<Sequenced> {
        loop {
            match self.receiver.try_recv() {
                Ok(sequenced) => return Some(sequenced),
                Err(TryRecvError::Lagged(n)) => {
                    warn!(topic = ?self.topic, lagged_by = n, "TopicReceiver lagged");
                    continue;
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return None,
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Multi-topic receiver
// ---------------------------------------------------------------------------

/// Receives from several topics and yields their events in the order they
/// were published on the bus.
///
/// Obtained via [`EventBus::subscribe_merged`].  Each topic keeps at most one
/// event buffered while the others are compared against it.
pub struct MergedReceiver {
    inputs: Vec<(TopicReceiver, Option<Sequenced>)>,
}

impl MergedReceiver {
    /// Take the oldest queued event across all topics without waiting.
    ///
    /// Returns `None` once every topic queue is empty.
    pub fn try_recv(&mut self) -> Option<(Topic, Event)> {
        for (receiver, head) in &mut self.inputs {
            if head.is_none() {
                *head = receiver.try_recv_sequenced();
            }
        }
        let (receiver, head) = self
            .inputs
            .iter_mut()
            .filter(|(_, head)| head.is_some())
            .min_by_key(|(_, head)| head.as_ref().map(|s| s.seq))?;
        let topic = receiver.topic();
        head.take().map(|s| (topic, s.event))
    }

    /// Topics merged by this receiver.
    pub fn topics(&self) -> Vec<Topic> {
        self.inputs.iter().map(|(rx, _)| rx.topic()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rover_types::{EventPayload, PoseSample, SignalKind};

    fn pose_event(x: f64) -> Event {
        Event::new("localization", EventPayload::Pose(PoseSample::new(x, 0.0, 0.0)))
    }

    fn pose_x(event: &Event) -> f64 {
        match event.payload {
            EventPayload::Pose(pose) => pose.x,
            _ => panic!("expected a pose payload"),
        }
    }

    #[test]
    fn publish_no_subscribers_returns_error() {
        let bus = EventBus::default();
        let result = bus.publish_to(Topic::Status, pose_event(0.0));
        assert!(matches!(result, Err(RoverError::Channel(_))));
    }

    #[tokio::test]
    async fn multiple_subscribers_receive_same_event() -> Result<(), Box<dyn std::error::Error>> {
        let bus = EventBus::default();
        let mut first = bus.subscribe_to(Topic::Localization);
        let mut second = bus.subscribe_to(Topic::Localization);

        let event = pose_event(1.5);
        assert_eq!(bus.publish_to(Topic::Localization, event.clone())?, 2);

        assert_eq!(first.recv().await?.id, event.id);
        assert_eq!(second.recv().await?.id, event.id);
        Ok(())
    }

    /// A subscriber on `Signals` must not receive events published to
    /// `Localization` because they are routed through separate channels.
    #[tokio::test]
    async fn subscriber_does_not_receive_other_topic_events() -> Result<(), Box<dyn std::error::Error>> {
        let bus = EventBus::default();
        let mut signals = bus.subscribe_to(Topic::Signals);
        let _localization = bus.subscribe_to(Topic::Localization);

        bus.publish_to(Topic::Localization, pose_event(0.0))?;

        let result =
            tokio::time::timeout(std::time::Duration::from_millis(50), signals.recv()).await;
        assert!(result.is_err(), "Signals subscriber must not see a pose");
        Ok(())
    }

    #[test]
    fn try_recv_drains_in_order_then_returns_none() -> Result<(), RoverError> {
        let bus = EventBus::default();
        let mut rx = bus.subscribe_to(Topic::Localization);
        assert!(rx.try_recv().is_none());

        for x in [1.0, 2.0, 3.0] {
            bus.publish_to(Topic::Localization, pose_event(x))?;
        }

        let drained: Vec<f64> = std::iter::from_fn(|| rx.try_recv())
            .map(|e| pose_x(&e))
            .collect();
        assert_eq!(drained, vec![1.0, 2.0, 3.0]);
        assert!(rx.try_recv().is_none());
        Ok(())
    }

    /// Flooding a small queue keeps only the newest `capacity` events for a
    /// slow receiver; the dropped ones are skipped instead of blocking.
    #[test]
    fn try_recv_skips_past_lagged_events() {
        const CAPACITY: usize = 4;
        let bus = EventBus::new(CAPACITY);
        let mut slow = bus.subscribe_to(Topic::Localization);

        for x in 0..10 {
            let _ = bus.publish_to(Topic::Localization, pose_event(x as f64));
        }

        let drained: Vec<f64> = std::iter::from_fn(|| slow.try_recv())
            .map(|e| pose_x(&e))
            .collect();
        assert_eq!(drained, vec![6.0, 7.0, 8.0, 9.0]);
    }

    /// Events published to different topics come out of a merged receiver
    /// in the order they were published, not grouped by topic.
    #[test]
    fn merged_receiver_interleaves_topics_in_publish_order() -> Result<(), RoverError> {
        let bus = EventBus::default();
        let mut merged = bus.subscribe_merged(&[Topic::Signals, Topic::Localization]);
        assert_eq!(merged.topics(), vec![Topic::Signals, Topic::Localization]);
        assert!(merged.try_recv().is_none());

        let kill = |value| {
            Event::new(
                "operator",
                EventPayload::Signal {
                    kind: SignalKind::Kill,
                    value,
                },
            )
        };
        bus.publish_to(Topic::Localization, pose_event(1.0))?;
        bus.publish_to(Topic::Signals, kill(true))?;
        bus.publish_to(Topic::Localization, pose_event(2.0))?;
        bus.publish_to(Topic::Signals, kill(false))?;

        let order: Vec<Topic> = std::iter::from_fn(|| merged.try_recv())
            .map(|(topic, _)| topic)
            .collect();
        assert_eq!(
            order,
            vec![
                Topic::Localization,
                Topic::Signals,
                Topic::Localization,
                Topic::Signals
            ]
        );
        Ok(())
    }

    /// Events on topics the merged receiver was not built with are ignored.
    #[test]
    fn merged_receiver_skips_unsubscribed_topics() -> Result<(), RoverError> {
        let bus = EventBus::default();
        let mut merged = bus.subscribe_merged(&[Topic::Localization]);
        let _status = bus.subscribe_to(Topic::Status);

        bus.publish_to(Topic::Status, pose_event(9.0))?;
        bus.publish_to(Topic::Localization, pose_event(3.0))?;

        let (topic, event) = merged
            .try_recv()
            .ok_or(RoverError::Channel("missing".into()))?;
        assert_eq!(topic, Topic::Localization);
        assert_eq!(pose_x(&event), 3.0);
        assert!(merged.try_recv().is_none());
        Ok(())
    }

    #[test]
    fn subscriber_count_tracks_receivers() {
        let bus = EventBus::default();
        assert_eq!(bus.subscriber_count(Topic::Signals), 0);
        let rx = bus.subscribe_to(Topic::Signals);
        assert_eq!(rx.topic(), Topic::Signals);
        assert_eq!(bus.subscriber_count(Topic::Signals), 1);
        drop(rx);
        assert_eq!(bus.subscriber_count(Topic::Signals), 0);
    }

    #[test]
    fn clones_share_channels() -> Result<(), RoverError> {
        let bus = EventBus::default();
        let publisher = bus.clone();
        let mut rx = bus.subscribe_to(Topic::Signals);

        publisher.publish_to(
            Topic::Signals,
            Event::new(
                "operator",
                EventPayload::Signal {
                    kind: SignalKind::Kill,
                    value: true,
                },
            ),
        )?;

        let event = rx.try_recv().ok_or(RoverError::Channel("missing".into()))?;
        assert!(matches!(
            event.payload,
            EventPayload::Signal {
                kind: SignalKind::Kill,
                value: true
            }
        ));
        Ok(())
    }
}
