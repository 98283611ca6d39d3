//! `linetrack-middleware` – moves frames in and commands out.
//!
//! # Modules
//!
//! - [`bus`] – typed, topic-based publish/subscribe event bus built on Tokio
//!   broadcast channels.
//! - [`rosbridge`] – the rosbridge v2 JSON wire format: subscribe/advertise
//!   operations, `sensor_msgs/Image` decoding, `geometry_msgs/Twist`
//!   encoding.
//! - [`rosbridge_client`] – WebSocket client that connects the bus to a
//!   running `rosbridge_server`.

pub mod bus;
pub mod rosbridge;
pub mod rosbridge_client;

pub use bus::{EventBus, Topic, TopicReceiver};
pub use rosbridge_client::{RosbridgeClient, RosbridgeConfig};
