//! rosbridge v2 wire format.
//!
//! Every frame on the WebSocket is one JSON object with an `"op"` field. The
//! follower only needs four operations:
//!
//! * `advertise` / `publish` for `/cmd_vel` (and the optional debug images),
//! * `subscribe` for the camera topic,
//! * inbound `publish` frames carrying camera images.
//!
//! `uint8[]` fields such as `sensor_msgs/Image.data` arrive base64-encoded by
//! default; older bridges send a plain JSON integer array, so both are
//! accepted.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use linetrack_types::{LineError, RawImage, VelocityCommand};
use serde::Deserialize;
use serde_json::{Value, json};

pub const IMAGE_TYPE: &str = "sensor_msgs/Image";
pub const TWIST_TYPE: &str = "geometry_msgs/Twist";

/// Maximum accepted image payload, in decoded bytes.
///
/// Larger frames are rejected before decoding to bound memory use from
/// malformed messages. 64 MiB covers 4K RGBA.
pub const MAX_IMAGE_BYTES: usize = 64 * 1024 * 1024;

/// A parsed inbound rosbridge frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// A message published on `topic`.
    Publish { topic: String, msg: Value },
    /// A bridge status report (`"op": "status"`).
    Status { level: String, msg: String },
    /// Any other operation; carried for logging only.
    Other { op: String },
}

/// Parse one text frame received from the bridge.
///
/// # Errors
///
/// Returns [`LineError::Parsing`] when the frame is not a JSON object with a
/// string `op`, or a `publish` lacks `topic` / `msg`.
pub fn parse_inbound(text: &str) -> Result<Inbound, LineError> {
    let value: Value = serde_json::from_str(text)
        .map_err(|e| LineError::Parsing(format!("rosbridge frame is not JSON: {e}")))?;
    let op = value
        .get("op")
        .and_then(Value::as_str)
        .ok_or_else(|| LineError::Parsing("rosbridge frame has no \"op\"".to_string()))?;

    match op {
        "publish" => {
            let topic = value
                .get("topic")
                .and_then(Value::as_str)
                .ok_or_else(|| LineError::Parsing("publish frame has no \"topic\"".to_string()))?;
            let msg = value
                .get("msg")
                .cloned()
                .ok_or_else(|| LineError::Parsing("publish frame has no \"msg\"".to_string()))?;
            Ok(Inbound::Publish {
                topic: topic.to_string(),
                msg,
            })
        }
        "status" => Ok(Inbound::Status {
            level: value
                .get("level")
                .and_then(Value::as_str)
                .unwrap_or("info")
                .to_string(),
            msg: value
                .get("msg")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
        }),
        other => Ok(Inbound::Other {
            op: other.to_string(),
        }),
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum WireBytes {
    Base64(String),
    Array(Vec<u8>),
}

#[derive(Deserialize)]
struct WireImage {
    height: u32,
    width: u32,
    encoding: String,
    #[serde(default)]
    is_bigendian: u8,
    step: u32,
    data: WireBytes,
}

/// Decode the `msg` body of a `sensor_msgs/Image` publish.
///
/// # Errors
///
/// Returns [`LineError::Parsing`] for missing fields, invalid base64, or a
/// payload larger than [`MAX_IMAGE_BYTES`].
pub fn decode_image(msg: &Value) -> Result<RawImage, LineError> {
    let wire = WireImage::deserialize(msg)
        .map_err(|e| LineError::Parsing(format!("invalid {IMAGE_TYPE}: {e}")))?;

    let data = match wire.data {
        WireBytes::Base64(encoded) => {
            // base64 expands 3 bytes into 4 characters.
            if encoded.len() / 4 * 3 > MAX_IMAGE_BYTES {
                return Err(oversized(encoded.len() / 4 * 3));
            }
            BASE64
                .decode(encoded.as_bytes())
                .map_err(|e| LineError::Parsing(format!("image data is not base64: {e}")))?
        }
        WireBytes::Array(bytes) => bytes,
    };
    if data.len() > MAX_IMAGE_BYTES {
        return Err(oversized(data.len()));
    }

    Ok(RawImage {
        height: wire.height,
        width: wire.width,
        encoding: wire.encoding,
        is_bigendian: wire.is_bigendian,
        step: wire.step,
        data,
    })
}

fn oversized(len: usize) -> LineError {
    LineError::Parsing(format!(
        "image payload of {len} bytes exceeds the limit of {MAX_IMAGE_BYTES}"
    ))
}

/// `subscribe` operation. `queue_length` bounds the bridge-side buffer.
pub fn subscribe_op(topic: &str, msg_type: &str, queue_length: Option<u32>) -> String {
    let mut op = json!({
        "op": "subscribe",
        "topic": topic,
        "type": msg_type,
    });
    if let Some(n) = queue_length {
        op["queue_length"] = json!(n);
    }
    op.to_string()
}

/// `advertise` operation, required before publishing on a topic.
pub fn advertise_op(topic: &str, msg_type: &str) -> String {
    json!({
        "op": "advertise",
        "topic": topic,
        "type": msg_type,
    })
    .to_string()
}

/// `publish` of a `geometry_msgs/Twist` with every unused field zeroed.
pub fn publish_twist(topic: &str, cmd: &VelocityCommand) -> String {
    json!({
        "op": "publish",
        "topic": topic,
        "msg": {
            "linear":  { "x": cmd.linear_x, "y": 0.0, "z": 0.0 },
            "angular": { "x": 0.0, "y": 0.0, "z": cmd.angular_z }
        }
    })
    .to_string()
}

/// `publish` of a `sensor_msgs/Image` with base64 `data`.
pub fn publish_image(topic: &str, image: &RawImage) -> String {
    json!({
        "op": "publish",
        "topic": topic,
        "msg": {
            "height": image.height,
            "width": image.width,
            "encoding": image.encoding,
            "is_bigendian": image.is_bigendian,
            "step": image.step,
            "data": BASE64.encode(&image.data),
        }
    })
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_image() -> RawImage {
        RawImage {
            height: 1,
            width: 2,
            encoding: "rgb8".to_string(),
            is_bigendian: 0,
            step: 6,
            data: vec![255, 0, 0, 0, 255, 0],
        }
    }

    #[test]
    fn parse_publish_frame() {
        let text = r#"{"op":"publish","topic":"/camera/rgb/image_raw","msg":{"a":1}}"#;
        let inbound = parse_inbound(text).unwrap();
        assert_eq!(
            inbound,
            Inbound::Publish {
                topic: "/camera/rgb/image_raw".to_string(),
                msg: json!({"a": 1}),
            }
        );
    }

    #[test]
    fn parse_status_frame() {
        let text = r#"{"op":"status","level":"error","msg":"unknown topic"}"#;
        assert_eq!(
            parse_inbound(text).unwrap(),
            Inbound::Status {
                level: "error".to_string(),
                msg: "unknown topic".to_string(),
            }
        );
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(matches!(parse_inbound("not json"), Err(LineError::Parsing(_))));
        assert!(matches!(parse_inbound(r#"{"topic":"/x"}"#), Err(LineError::Parsing(_))));
        assert!(matches!(
            parse_inbound(r#"{"op":"publish","msg":{}}"#),
            Err(LineError::Parsing(_))
        ));
    }

    #[test]
    fn unknown_op_is_carried_through() {
        assert_eq!(
            parse_inbound(r#"{"op":"service_response"}"#).unwrap(),
            Inbound::Other {
                op: "service_response".to_string()
            }
        );
    }

    #[test]
    fn decode_image_with_base64_data() {
        // [255, 0, 0, 0, 255, 0] -> "/wAAAP8A"
        let msg = json!({
            "header": {"frame_id": "camera"},
            "height": 1, "width": 2, "encoding": "rgb8",
            "is_bigendian": 0, "step": 6, "data": "/wAAAP8A"
        });
        assert_eq!(decode_image(&msg).unwrap(), sample_image());
    }

    #[test]
    fn decode_image_with_array_data() {
        let msg = json!({
            "height": 1, "width": 2, "encoding": "rgb8",
            "step": 6, "data": [255, 0, 0, 0, 255, 0]
        });
        assert_eq!(decode_image(&msg).unwrap(), sample_image());
    }

    #[test]
    fn decode_image_rejects_bad_base64() {
        let msg = json!({
            "height": 1, "width": 1, "encoding": "mono8", "step": 1, "data": "%%%"
        });
        assert!(matches!(decode_image(&msg), Err(LineError::Parsing(_))));
    }

    #[test]
    fn decode_image_rejects_missing_fields() {
        let msg = json!({ "width": 1, "encoding": "mono8", "data": [] });
        assert!(matches!(decode_image(&msg), Err(LineError::Parsing(_))));
    }

    #[test]
    fn published_image_decodes_back() {
        let text = publish_image("/follower/debug/mask", &sample_image());
        let Inbound::Publish { topic, msg } = parse_inbound(&text).unwrap() else {
            panic!("expected a publish frame");
        };
        assert_eq!(topic, "/follower/debug/mask");
        assert_eq!(decode_image(&msg).unwrap(), sample_image());
    }

    #[test]
    fn twist_sets_only_linear_x_and_angular_z() {
        let text = publish_twist("/cmd_vel", &VelocityCommand::new(0.8, -0.25));
        let value: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["op"], "publish");
        assert_eq!(value["topic"], "/cmd_vel");
        assert_eq!(value["msg"]["linear"]["x"], 0.8);
        assert_eq!(value["msg"]["linear"]["y"], 0.0);
        assert_eq!(value["msg"]["angular"]["x"], 0.0);
        assert_eq!(value["msg"]["angular"]["z"], -0.25);
    }

    #[test]
    fn subscribe_and_advertise_ops() {
        let sub: Value =
            serde_json::from_str(&subscribe_op("/camera/rgb/image_raw", IMAGE_TYPE, Some(1)))
                .unwrap();
        assert_eq!(sub["op"], "subscribe");
        assert_eq!(sub["type"], "sensor_msgs/Image");
        assert_eq!(sub["queue_length"], 1);

        let sub: Value = serde_json::from_str(&subscribe_op("/x", IMAGE_TYPE, None)).unwrap();
        assert!(sub.get("queue_length").is_none());

        let adv: Value = serde_json::from_str(&advertise_op("/cmd_vel", TWIST_TYPE)).unwrap();
        assert_eq!(adv["op"], "advertise");
        assert_eq!(adv["type"], "geometry_msgs/Twist");
    }
}
