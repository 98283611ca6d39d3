//! [`FollowerNode`] – the single consumer of camera frames.
//!
//! Every frame published on [`Topic::Camera`] is handled synchronously and
//! in order:
//!
//! 1. decode to BGR8,
//! 2. run the [`LineFollower`],
//! 3. publish the command (if any) on [`Topic::VelocityCommands`],
//! 4. publish diagnostics on [`Topic::Diagnostics`].
//!
//! A frame that cannot be decoded is logged and skipped; the next frame is
//! processed normally. Frames that arrive while a previous one is still
//! being processed may be dropped by the bus, in which case the node logs
//! how many it skipped.

use linetrack_control::LineFollower;
use linetrack_middleware::{EventBus, Topic, TopicReceiver};
use linetrack_types::{Event, EventPayload, LineError, RawImage, VelocityCommand};
use linetrack_vision::BgrFrame;
use tokio::sync::{broadcast, watch};
use tracing::{debug, error, info, instrument, warn};

/// Process-wide state of the follower, built once at startup.
pub struct NodeContext {
    /// Node identity, used as the event source prefix.
    pub name: String,
    pub bus: EventBus,
    pub follower: LineFollower,
    /// Publish annotated frames and masks for every processed frame.
    pub publish_debug_images: bool,
}

/// Counters reported when the node stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NodeStats {
    pub frames: u64,
    pub commands: u64,
    pub errors: u64,
    pub skipped: u64,
}

pub struct FollowerNode {
    ctx: NodeContext,
    frames: TopicReceiver,
    source: String,
    stats: NodeStats,
}

impl FollowerNode {
    /// Create the node and subscribe to [`Topic::Camera`] immediately, so no
    /// frame published after this call is missed.
    pub fn new(ctx: NodeContext) -> Self {
        let frames = ctx.bus.subscribe_to(Topic::Camera);
        let source = format!("linetrack-runtime::{}", ctx.name);
        Self {
            ctx,
            frames,
            source,
            stats: NodeStats::default(),
        }
    }

    pub fn stats(&self) -> NodeStats {
        self.stats
    }

    /// Run the controller on one received image and publish its outputs.
    ///
    /// Returns the command that was published, or `None` when no line was
    /// found in the search band.
    ///
    /// # Errors
    ///
    /// Returns [`LineError::InvalidFrame`] or
    /// [`LineError::UnsupportedEncoding`] when the image cannot be decoded.
    #[instrument(
        name = "handle_frame",
        skip_all,
        fields(node = %self.ctx.name, width = raw.width, height = raw.height, encoding = %raw.encoding)
    )]
    pub fn handle_frame(&mut self, raw: &RawImage) -> Result<Option<VelocityCommand>, LineError> {
        self.stats.frames += 1;
        let frame = BgrFrame::from_raw(raw)?;
        let detection = self.ctx.follower.process(&frame)?;

        if let Some(cmd) = detection.command {
            self.stats.commands += 1;
            self.ctx.bus.publish_to(
                Topic::VelocityCommands,
                Event::new(self.source.as_str(), EventPayload::Velocity(cmd)),
            )?;
        }

        self.ctx.bus.publish_to(
            Topic::Diagnostics,
            Event::new(self.source.as_str(), EventPayload::Detection(detection.report())),
        )?;

        if self.ctx.publish_debug_images {
            let annotated = LineFollower::annotate(&frame, &detection);
            for (label, image) in [
                ("output", annotated.to_raw()),
                ("mask", detection.mask.to_raw()),
            ] {
                self.ctx.bus.publish_to(
                    Topic::Diagnostics,
                    Event::new(
                        self.source.as_str(),
                        EventPayload::DiagnosticImage {
                            label: label.to_string(),
                            image,
                        },
                    ),
                )?;
            }
        }

        Ok(detection.command)
    }

    /// Publish a frame failure on [`Topic::SystemAlerts`].
    fn report_fault(&self, err: &LineError) {
        let fault = EventPayload::Fault {
            component: self.ctx.name.clone(),
            message: err.to_string(),
        };
        // Nobody listening is fine; the error is already logged.
        let _ = self
            .ctx
            .bus
            .publish_to(Topic::SystemAlerts, Event::new(self.source.as_str(), fault));
    }

    /// Consume camera frames until `shutdown` flips.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> NodeStats {
        info!(node = %self.ctx.name, "follower node started");

        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                result = self.frames.recv() => match result {
                    Ok(Event { payload: EventPayload::Image(raw), .. }) => {
                        if let Err(e) = self.handle_frame(&raw) {
                            self.stats.errors += 1;
                            error!(node = %self.ctx.name, error = %e, "failed to process frame");
                            self.report_fault(&e);
                        }
                    }
                    Ok(other) => {
                        debug!(source = %other.source, "ignoring non-image event on camera topic");
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        self.stats.skipped += n;
                        warn!(node = %self.ctx.name, skipped = n, "fell behind; stale frames dropped");
                    }
                    // The node's own bus handle keeps every sender alive.
                    Err(broadcast::error::RecvError::Closed) => break,
                },
            }
        }

        info!(
            node = %self.ctx.name,
            frames = self.stats.frames,
            commands = self.stats.commands,
            errors = self.stats.errors,
            skipped = self.stats.skipped,
            "follower node stopped"
        );
        self.stats
    }
}
