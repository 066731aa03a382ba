use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use swimfd::cli;
use swimfd::Detector;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse args and env vars
    let args = cli::Cli::parse();

    let (text_layer, json_layer) = if args.log_json {
        (None, Some(tracing_subscriber::fmt::layer().json()))
    } else {
        (Some(tracing_subscriber::fmt::layer()), None)
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "swimfd=info".into()),
        )
        .with(text_layer)
        .with(json_layer)
        .init();

    let status_interval = Duration::from_secs(args.status_interval_secs);
    let settings = args.into_settings();
    let process_id = settings.process_id.clone();

    let detector = Detector::with_udp(settings)
        .with_context(|| format!("Invalid settings for {}", process_id))?;
    let handle = detector
        .start()
        .await
        .with_context(|| format!("Failed to start failure detector {}", process_id))?;
    let running = detector.settings();
    info!(
        "Started failure detector {} with {} peers, probing every {:?} (direct {:?}, indirect {:?}, fan-out {})",
        process_id,
        running.peers.len(),
        running.probe_interval,
        running.direct_timeout,
        running.indirect_timeout,
        running.indirect_fanout
    );

    if status_interval.is_zero() {
        tokio::signal::ctrl_c().await?;
    } else {
        let mut status_timer = tokio::time::interval(status_interval);
        loop {
            tokio::select! {
                _ = status_timer.tick() => log_status(&detector),
                signal = tokio::signal::ctrl_c() => {
                    signal?;
                    break;
                }
            }
        }
    }

    info!("Shutting down failure detector {}", process_id);
    if let Err(e) = handle.leave().await {
        warn!("Leave announcement failed: {}", e);
    }
    Ok(())
}

fn log_status(detector: &Detector) {
    detector.log_membership();
    match serde_json::to_string(&detector.snapshot()) {
        Ok(members) => info!(members = %members, "membership snapshot"),
        Err(e) => warn!("Cannot serialize membership snapshot: {}", e),
    }
    match serde_json::to_string(&detector.stats()) {
        Ok(stats) => info!(stats = %stats, "detector stats"),
        Err(e) => warn!("Cannot serialize detector stats: {}", e),
    }
}
