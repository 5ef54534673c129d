// src/main.rs
//
// blink-replay: feed recorded detection frames through the tracker.
//
//   blink-replay [config.yaml] [frames.jsonl]
//
// Each input line is {"stamp": <seconds>, "points": [[x, y], ...]}. Frames
// are ingested in order on the main task while a second task polls results,
// the way a live receiver and a downstream decoder would share the tracker.

use anyhow::{bail, Context, Result};
use blink_tracker::types::FrameRecord;
use blink_tracker::{BlinkTracker, Config, Identity, ManualClock, PixelPoint};
use std::fs;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

const DEFAULT_CONFIG: &str = "config.yaml";

#[tokio::main]
async fn main() -> Result<()> {
    let mut args = std::env::args().skip(1);
    let config_path = args.next().unwrap_or_else(|| DEFAULT_CONFIG.to_string());
    let Some(frames_path) = args.next() else {
        bail!("usage: blink-replay [config.yaml] <frames.jsonl>");
    };

    let config = Config::load(&config_path)
        .with_context(|| format!("loading configuration from {}", config_path))?;

    let level = &config.logging.level;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("blink_tracker={level},blink_replay={level}"))
    });
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("💡 Blink replay starting");
    info!(
        "Gate: fast ±({:.1},{:.1}) px, polynomial order {}, margin {:.3}s",
        config.tracking.max_pixel_shift_x,
        config.tracking.max_pixel_shift_y,
        config.tracking.polynomial_order,
        config.tracking.prediction_margin
    );

    let frames = load_frames(&frames_path)?;
    info!("✓ {} frames loaded from {}", frames.len(), frames_path);
    if frames.is_empty() {
        warn!("Nothing to replay");
        return Ok(());
    }

    // Recorded stamps drive placeholder times and staleness
    let clock = Arc::new(ManualClock::new(frames[0].stamp));
    let tracker = Arc::new(BlinkTracker::from_config(&config)?.with_clock(clock.clone()));

    let poller = {
        let tracker = Arc::clone(&tracker);
        let period = Duration::from_millis(config.replay.poll_interval_ms.max(1));
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                interval.tick().await;
                let results = tracker.get_results();
                let identified = results
                    .iter()
                    .filter(|r| r.identity.code().is_some())
                    .count();
                debug!(
                    "📡 Poll: {} tracks, {} identified",
                    results.len(),
                    identified
                );
            }
        })
    };

    let mut previous_stamp = frames[0].stamp;
    for frame in &frames {
        if config.replay.realtime {
            let gap = (frame.stamp - previous_stamp).max(0.0);
            tokio::time::sleep(Duration::from_secs_f64(gap)).await;
        } else {
            tokio::task::yield_now().await;
        }
        previous_stamp = frame.stamp;

        clock.set(frame.stamp);
        let points = frame.points.iter().copied().map(PixelPoint::from);
        tracker.process_frame(points, frame.stamp);
    }

    poller.abort();

    let results = tracker.get_results();
    info!("✓ Replay finished: {} live tracks", results.len());

    for result in &results {
        let states: String = result
            .track
            .led_states()
            .iter()
            .map(|on| if *on { '1' } else { '0' })
            .collect();
        let last = result.track.last().map(|o| [o.position.x, o.position.y]);

        if let Identity::Code(index) = result.identity {
            info!("🏷️  ID{} at {:?} [{}]", index, last, states);
        }

        let line = serde_json::json!({
            "identity": result.identity.raw(),
            "label": result.identity.to_string(),
            "states": states,
            "last_position": last,
            "length": result.track.len(),
        });
        println!("{}", line);
    }

    let summary = tracker.metrics().summary();
    println!("{}", serde_json::json!({ "metrics": summary }));

    Ok(())
}

fn load_frames(path: &str) -> Result<Vec<FrameRecord>> {
    let contents =
        fs::read_to_string(path).with_context(|| format!("reading frames from {}", path))?;

    let mut frames = Vec::new();
    for (lineno, line) in contents.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let frame: FrameRecord = serde_json::from_str(line)
            .with_context(|| format!("{}:{}: malformed frame", path, lineno + 1))?;
        frames.push(frame);
    }

    if frames.windows(2).any(|w| w[1].stamp < w[0].stamp) {
        warn!("Frame stamps are not monotonic; replaying in file order");
    }
    Ok(frames)
}
