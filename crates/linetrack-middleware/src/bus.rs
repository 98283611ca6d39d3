//! Headless, typed, topic-based publish/subscribe event bus.
//!
//! Uses [`tokio::sync::broadcast`] channels under the hood so that every
//! subscriber receives every message without any single subscriber blocking
//! the others. A subscriber that falls behind loses the oldest messages and
//! is told how many it missed.
//!
//! # Topics
//!
//! | Topic | Typical traffic | Capacity |
//! |---|---|---|
//! | [`Topic::Camera`] | Frames from the robot camera | bus capacity |
//! | [`Topic::VelocityCommands`] | Commands for `/cmd_vel` | always 1 |
//! | [`Topic::Diagnostics`] | Detection reports, annotated frames, masks | bus capacity |
//! | [`Topic::SystemAlerts`] | Frame-processing faults | bus capacity |
//!
//! Velocity commands are never queued: a slow consumer only ever sees the
//! most recent one.

use linetrack_types::{Event, LineError};
use tokio::sync::broadcast;
use tracing::debug;

/// Default channel capacity for every topic except
/// [`Topic::VelocityCommands`].
const DEFAULT_CAPACITY: usize = 8;

/// Queue depth of [`Topic::VelocityCommands`].
pub const VELOCITY_QUEUE_DEPTH: usize = 1;

/// Enumeration of all routing topics on the event bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    /// Camera frames as received from the robot.
    Camera,
    /// Velocity commands for the drive base.
    VelocityCommands,
    /// Presentation-only output of the controller.
    Diagnostics,
    /// Faults and shutdown notices.
    SystemAlerts,
}

/// Shared event bus. Clone it cheaply – all clones share the same underlying
/// broadcast channels.
#[derive(Clone, Debug)]
pub struct EventBus {
    camera: broadcast::Sender<Event>,
    velocity_commands: broadcast::Sender<Event>,
    diagnostics: broadcast::Sender<Event>,
    system_alerts: broadcast::Sender<Event>,
}

impl EventBus {
    /// Create a new bus.
    ///
    /// `capacity` applies to every topic except
    /// [`Topic::VelocityCommands`], which is fixed at
    /// [`VELOCITY_QUEUE_DEPTH`].
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero (a Tokio broadcast channel requirement).
    pub fn new(capacity: usize) -> Self {
        let (camera, _) = broadcast::channel(capacity);
        let (velocity_commands, _) = broadcast::channel(VELOCITY_QUEUE_DEPTH);
        let (diagnostics, _) = broadcast::channel(capacity);
        let (system_alerts, _) = broadcast::channel(capacity);
        Self {
            camera,
            velocity_commands,
            diagnostics,
            system_alerts,
        }
    }

    /// Publish `event` to the given [`Topic`] channel.
    ///
    /// Returns the number of active receivers that were handed the event.
    /// Returns `Ok(0)` when no subscribers are currently listening on the
    /// topic; the event is dropped.
    pub fn publish_to(&self, topic: Topic, event: Event) -> Result<usize, LineError> {
        match self.topic_sender(topic).send(event) {
            Ok(n) => Ok(n),
            Err(broadcast::error::SendError(_)) => {
                debug!(?topic, "no subscribers; event dropped");
                Ok(0)
            }
        }
    }

    /// Subscribe to a specific [`Topic`] channel.
    ///
    /// Only events published after this call are delivered.
    pub fn subscribe_to(&self, topic: Topic) -> TopicReceiver {
        TopicReceiver {
            topic,
            receiver: self.topic_sender(topic).subscribe(),
        }
    }

    /// Number of live subscribers on `topic`.
    pub fn subscriber_count(&self, topic: Topic) -> usize {
        self.topic_sender(topic).receiver_count()
    }

    fn topic_sender(&self, topic: Topic) -> &broadcast::Sender<Event> {
        match topic {
            Topic::Camera => &self.camera,
            Topic::VelocityCommands => &self.velocity_commands,
            Topic::Diagnostics => &self.diagnostics,
            Topic::SystemAlerts => &self.system_alerts,
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

/// An async receiver bound to a single [`Topic`] channel.
///
/// Obtained via [`EventBus::subscribe_to`].
pub struct TopicReceiver {
    topic: Topic,
    receiver: broadcast::Receiver<Event>,
}

impl TopicReceiver {
    /// Wait for the next event on this topic.
    ///
    /// Returns:
    /// * `Ok(event)` – a successfully received event.
    /// * `Err(broadcast::error::RecvError::Lagged(n))` – the subscriber fell
    ///   behind and `n` messages were dropped. The next call yields the
    ///   oldest message still retained.
    /// * `Err(broadcast::error::RecvError::Closed)` – every sender is gone.
    pub async fn recv(&mut self) -> Result<Event, broadcast::error::RecvError> {
        self.receiver.recv().await
    }

    /// Non-blocking variant of [`recv`][Self::recv].
    pub fn try_recv(&mut self) -> Result<Event, broadcast::error::TryRecvError> {
        self.receiver.try_recv()
    }

    /// The [`Topic`] this receiver is bound to.
    pub fn topic(&self) -> Topic {
        self.topic
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use linetrack_types::{EventPayload, VelocityCommand};

    fn velocity_event(angular_z: f64) -> Event {
        Event::new(
            "test",
            EventPayload::Velocity(VelocityCommand::new(0.8, angular_z)),
        )
    }

    fn angular_z(event: &Event) -> f64 {
        match event.payload {
            EventPayload::Velocity(cmd) => cmd.angular_z,
            _ => panic!("expected a velocity payload"),
        }
    }

    #[test]
    fn publish_without_subscribers_is_not_an_error() {
        let bus = EventBus::default();
        let delivered = bus.publish_to(Topic::Camera, velocity_event(0.0)).unwrap();
        assert_eq!(delivered, 0);
    }

    #[tokio::test]
    async fn multiple_subscribers_receive_same_event() -> Result<(), Box<dyn std::error::Error>> {
        let bus = EventBus::default();
        let mut a = bus.subscribe_to(Topic::Diagnostics);
        let mut b = bus.subscribe_to(Topic::Diagnostics);

        let event = velocity_event(0.5);
        assert_eq!(bus.publish_to(Topic::Diagnostics, event.clone())?, 2);

        assert_eq!(a.recv().await?.id, event.id);
        assert_eq!(b.recv().await?.id, event.id);
        Ok(())
    }

    #[tokio::test]
    async fn topics_are_isolated() -> Result<(), Box<dyn std::error::Error>> {
        let bus = EventBus::default();
        let mut alerts = bus.subscribe_to(Topic::SystemAlerts);
        let _camera = bus.subscribe_to(Topic::Camera);

        bus.publish_to(Topic::Camera, velocity_event(0.0))?;

        let result =
            tokio::time::timeout(std::time::Duration::from_millis(50), alerts.recv()).await;
        assert!(result.is_err(), "SystemAlerts must not see Camera traffic");
        Ok(())
    }

    #[tokio::test]
    async fn velocity_topic_keeps_only_latest_command() -> Result<(), Box<dyn std::error::Error>> {
        let bus = EventBus::default();
        let mut slow = bus.subscribe_to(Topic::VelocityCommands);

        for z in [0.1, 0.2, 0.3] {
            bus.publish_to(Topic::VelocityCommands, velocity_event(z))?;
        }

        assert!(matches!(
            slow.recv().await,
            Err(broadcast::error::RecvError::Lagged(2))
        ));
        let latest = slow.recv().await?;
        assert!((angular_z(&latest) - 0.3).abs() < f64::EPSILON);
        Ok(())
    }

    #[tokio::test]
    async fn camera_topic_reports_lag_for_slow_consumer() {
        let bus = EventBus::new(4);
        let mut slow = bus.subscribe_to(Topic::Camera);
        for _ in 0..100 {
            let _ = bus.publish_to(Topic::Camera, velocity_event(0.0));
        }
        assert!(matches!(
            slow.recv().await,
            Err(broadcast::error::RecvError::Lagged(96))
        ));
    }

    #[test]
    fn subscriber_count_tracks_receivers() {
        let bus = EventBus::default();
        assert_eq!(bus.subscriber_count(Topic::VelocityCommands), 0);
        let rx = bus.subscribe_to(Topic::VelocityCommands);
        assert_eq!(rx.topic(), Topic::VelocityCommands);
        assert_eq!(bus.subscriber_count(Topic::VelocityCommands), 1);
        drop(rx);
        assert_eq!(bus.subscriber_count(Topic::VelocityCommands), 0);
    }
}
