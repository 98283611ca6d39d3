//! WebSocket client for a `rosbridge_server`.
//!
//! [`RosbridgeClient`] bridges between the internal [`EventBus`] and the
//! robot's ROS graph:
//!
//! * **Inbound (Camera)** – publishes on the image topic are decoded and
//!   forwarded to [`Topic::Camera`].
//! * **Outbound (Drive)** – every [`Topic::VelocityCommands`] event becomes a
//!   `geometry_msgs/Twist` publish on the velocity topic.
//! * **Outbound (Diagnostics)** – when a debug topic is configured,
//!   annotated frames and masks from [`Topic::Diagnostics`] are published as
//!   `sensor_msgs/Image` under `<debug_topic>/<label>`.
//!
//! The connection is not retried. When it drops, [`RosbridgeClient::run`]
//! returns and the caller decides what to do.

use futures_util::{SinkExt, StreamExt};
use linetrack_types::{Event, EventPayload, LineError, VelocityCommand};
use tokio::sync::{broadcast, watch};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};

use crate::bus::{EventBus, Topic, TopicReceiver};
use crate::rosbridge::{self, IMAGE_TYPE, Inbound, TWIST_TYPE};

const SOURCE_CAMERA: &str = "linetrack-middleware::rosbridge/camera";

/// Connection and topic settings for [`RosbridgeClient`].
#[derive(Debug, Clone, PartialEq)]
pub struct RosbridgeConfig {
    /// `ws://host:port` of the rosbridge endpoint.
    pub url: String,
    pub image_topic: String,
    pub cmd_vel_topic: String,
    /// Prefix for diagnostic image topics; `None` disables them.
    pub debug_topic: Option<String>,
    /// Bridge-side queue length for the image subscription.
    pub image_queue_length: Option<u32>,
    /// Publish a zero command before disconnecting on shutdown.
    pub stop_on_shutdown: bool,
}

impl Default for RosbridgeConfig {
    fn default() -> Self {
        Self {
            url: "ws://localhost:9090".to_string(),
            image_topic: "/camera/rgb/image_raw".to_string(),
            cmd_vel_topic: "/cmd_vel".to_string(),
            debug_topic: None,
            image_queue_length: None,
            stop_on_shutdown: false,
        }
    }
}

/// Client that ties one rosbridge connection to the [`EventBus`].
pub struct RosbridgeClient {
    bus: EventBus,
    config: RosbridgeConfig,
}

impl RosbridgeClient {
    pub fn new(bus: EventBus, config: RosbridgeConfig) -> Self {
        Self { bus, config }
    }

    pub fn config(&self) -> &RosbridgeConfig {
        &self.config
    }

    /// Operations sent right after the WebSocket handshake: advertise every
    /// output topic, then subscribe to the camera.
    pub fn setup_messages(&self) -> Vec<String> {
        let mut ops = vec![rosbridge::advertise_op(&self.config.cmd_vel_topic, TWIST_TYPE)];
        if let Some(prefix) = &self.config.debug_topic {
            for label in ["output", "mask"] {
                ops.push(rosbridge::advertise_op(
                    &debug_topic_name(prefix, label),
                    IMAGE_TYPE,
                ));
            }
        }
        ops.push(rosbridge::subscribe_op(
            &self.config.image_topic,
            IMAGE_TYPE,
            self.config.image_queue_length,
        ));
        ops
    }

    /// Handle one inbound text frame.
    ///
    /// Images on the configured topic are published to [`Topic::Camera`];
    /// returns the number of bus receivers. Everything else is logged and
    /// yields `Ok(0)`.
    ///
    /// # Errors
    ///
    /// Returns [`LineError::Parsing`] for malformed frames or images.
    pub fn ingest_text(&self, text: &str) -> Result<usize, LineError> {
        match rosbridge::parse_inbound(text)? {
            Inbound::Publish { topic, msg } if topic == self.config.image_topic => {
                let image = rosbridge::decode_image(&msg)?;
                debug!(
                    width = image.width,
                    height = image.height,
                    encoding = %image.encoding,
                    "camera frame received"
                );
                self.bus
                    .publish_to(Topic::Camera, Event::new(SOURCE_CAMERA, EventPayload::Image(image)))
            }
            Inbound::Publish { topic, .. } => {
                debug!(%topic, "ignoring publish on unsubscribed topic");
                Ok(0)
            }
            Inbound::Status { level, msg } => {
                warn!(%level, %msg, "rosbridge status");
                Ok(0)
            }
            Inbound::Other { op } => {
                debug!(%op, "ignoring rosbridge operation");
                Ok(0)
            }
        }
    }

    /// Translate a bus event into the rosbridge frame to send, if any.
    pub fn outbound_message(&self, event: &Event) -> Option<String> {
        match &event.payload {
            EventPayload::Velocity(cmd) => {
                Some(rosbridge::publish_twist(&self.config.cmd_vel_topic, cmd))
            }
            EventPayload::DiagnosticImage { label, image } => self
                .config
                .debug_topic
                .as_ref()
                .map(|prefix| rosbridge::publish_image(&debug_topic_name(prefix, label), image)),
            _ => None,
        }
    }

    /// Connect to the bridge and pump messages until the connection closes
    /// or `shutdown` flips. Shutdown also abandons a handshake in progress.
    ///
    /// # Errors
    ///
    /// Returns [`LineError::Transport`] if the connection cannot be
    /// established or fails mid-stream.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> Result<(), LineError> {
        let url = self.config.url.clone();
        let (ws_stream, _) = tokio::select! {
            _ = shutdown.changed() => {
                info!(%url, "shutdown requested before rosbridge connected");
                return Ok(());
            }
            result = connect_async(url.as_str()) => result
                .map_err(|e| LineError::Transport(format!("rosbridge connect to {url}: {e}")))?,
        };
        info!(%url, image_topic = %self.config.image_topic, "connected to rosbridge");

        let (mut ws_tx, mut ws_rx) = ws_stream.split();
        for op in self.setup_messages() {
            ws_tx
                .send(Message::Text(op.into()))
                .await
                .map_err(|e| LineError::Transport(format!("rosbridge setup: {e}")))?;
        }

        let mut commands = self.bus.subscribe_to(Topic::VelocityCommands);
        let mut diagnostics = self
            .config
            .debug_topic
            .is_some()
            .then(|| self.bus.subscribe_to(Topic::Diagnostics));

        loop {
            let outbound = tokio::select! {
                _ = shutdown.changed() => {
                    info!("shutdown requested; closing rosbridge connection");
                    break;
                }
                result = commands.recv() => match result {
                    Ok(event) => self.outbound_message(&event),
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        debug!(skipped = n, "superseded velocity commands dropped");
                        None
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
                result = recv_optional(&mut diagnostics) => match result {
                    Ok(event) => self.outbound_message(&event),
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        debug!(skipped = n, "diagnostic output lagged");
                        None
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        diagnostics = None;
                        None
                    }
                },
                msg = ws_rx.next() => match msg {
                    Some(Ok(Message::Text(text))) => {
                        if let Err(e) = self.ingest_text(text.as_str()) {
                            warn!(error = %e, "dropping undecodable rosbridge frame");
                        }
                        None
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        info!("rosbridge closed the connection");
                        return Ok(());
                    }
                    Some(Err(e)) => {
                        return Err(LineError::Transport(format!("rosbridge receive: {e}")));
                    }
                    Some(Ok(_)) => None,
                },
            };

            if let Some(text) = outbound {
                ws_tx
                    .send(Message::Text(text.into()))
                    .await
                    .map_err(|e| LineError::Transport(format!("rosbridge send: {e}")))?;
            }
        }

        if self.config.stop_on_shutdown {
            let stop = rosbridge::publish_twist(&self.config.cmd_vel_topic, &VelocityCommand::stop());
            if let Err(e) = ws_tx.send(Message::Text(stop.into())).await {
                warn!(error = %e, "failed to send stop command");
            }
        }
        let _ = ws_tx.send(Message::Close(None)).await;
        Ok(())
    }
}

fn debug_topic_name(prefix: &str, label: &str) -> String {
    format!("{}/{}", prefix.trim_end_matches('/'), label)
}

/// Receive from `rx`, or wait forever when there is no receiver.
async fn recv_optional(
    rx: &mut Option<TopicReceiver>,
) -> Result<Event, broadcast::error::RecvError> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}
