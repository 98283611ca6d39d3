//! `linetrack` – runs the camera line follower against a rosbridge server.
//!
//! On startup the binary:
//!
//! 1. Loads `~/.linetrack/config.toml` (or `--config`), falling back to the
//!    defaults when the file is absent, then applies `LINETRACK_*` overrides.
//! 2. Connects to rosbridge, subscribes to the camera topic and advertises
//!    `/cmd_vel`.
//! 3. Runs the follower node until Ctrl-C or until the bridge disconnects.

mod config;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use argh::FromArgs;
use colored::Colorize;
use tokio::sync::watch;
use tracing::{error, info, warn};

use linetrack_control::LineFollower;
use linetrack_middleware::{EventBus, RosbridgeClient};
use linetrack_runtime::{FollowerNode, NodeContext, init_tracing};
use linetrack_types::LineError;

use crate::config::Config;

/// Follow a bright line seen by a downward-looking camera.
#[derive(Debug, FromArgs)]
struct Args {
    /// path to the config file (default ~/.linetrack/config.toml)
    #[argh(option, short = 'c')]
    config: Option<PathBuf>,

    /// rosbridge WebSocket URL, overrides the config file
    #[argh(option)]
    rosbridge_url: Option<String>,

    /// write the effective configuration to the config path and exit
    #[argh(switch)]
    write_config: bool,
}

fn main() -> ExitCode {
    let args: Args = argh::from_env();
    let _guard = init_tracing("linetrack");

    print_banner();

    let path = args.config.unwrap_or_else(config::config_path);
    let mut cfg = match config::load_from(&path) {
        Ok(Some(cfg)) => {
            println!("  Config loaded from {}", path.display().to_string().bold());
            cfg
        }
        Ok(None) => {
            let mut cfg = Config::default();
            config::apply_env_overrides(&mut cfg);
            cfg
        }
        Err(e) => {
            println!("{}: {e}", "Config error".red());
            return ExitCode::FAILURE;
        }
    };
    if let Some(url) = args.rosbridge_url {
        cfg.rosbridge_url = url;
    }

    if args.write_config {
        return match config::save_to(&cfg, &path) {
            Ok(()) => {
                println!("  {} {}", "✓ Wrote".green(), path.display());
                ExitCode::SUCCESS
            }
            Err(e) => {
                println!("{}: {e}", "Config error".red());
                ExitCode::FAILURE
            }
        };
    }

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            error!(error = %e, "failed to start the async runtime");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cfg)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "follower stopped with an error");
            ExitCode::FAILURE
        }
    }
}

async fn run(cfg: Config) -> Result<(), LineError> {
    let follower = LineFollower::new(&cfg.follower)?;
    let bus = EventBus::default();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let shutdown_tx = Arc::new(shutdown_tx);

    let ctrlc_tx = shutdown_tx.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        println!();
        println!("{}", "⚠  Ctrl-C received – stopping the follower …".yellow().bold());
        ctrlc_tx.send_replace(true);
    }) {
        warn!(error = %e, "Failed to install Ctrl-C handler; the follower can only be stopped by killing the process");
    }

    // Subscribe to the camera topic before the bridge starts publishing.
    let node = FollowerNode::new(NodeContext {
        name: cfg.node_name.clone(),
        bus: bus.clone(),
        follower,
        publish_debug_images: cfg.debug_topic.is_some(),
    });
    let node_task = tokio::spawn(node.run(shutdown_rx.clone()));

    info!(url = %cfg.rosbridge_url, image_topic = %cfg.image_topic, "connecting to rosbridge");
    let bridge = RosbridgeClient::new(bus, cfg.rosbridge());
    let result = bridge.run(shutdown_rx).await;

    shutdown_tx.send_replace(true);
    let stats = node_task
        .await
        .map_err(|e| LineError::Channel(format!("follower task did not finish: {e}")))?;
    println!(
        "  {} {} frames, {} commands, {} errors, {} skipped",
        "✓ Follower stopped:".green(),
        stats.frames,
        stats.commands,
        stats.errors,
        stats.skipped
    );
    result
}

fn print_banner() {
    println!();
    println!("{}", "  linetrack".cyan().bold());
    println!("{}", "  camera line follower over rosbridge".dimmed());
    println!();
}
