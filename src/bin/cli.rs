//! CLI that replays a recorded gesture script through a measuring session.
//!
//! Usage:
//!   face-gauge <script.json>                    # Human-readable output
//!   face-gauge <script.json> --json             # JSON output
//!   face-gauge <script.json> -o result.json     # Save to file
//!
//! Script format:
//!
//! ```json
//! {
//!   "image": { "handle": "photo.jpg", "width_px": 1080, "height_px": 1920 },
//!   "viewport": { "x": 400.0, "y": 800.0 },
//!   "calibration": [ { "type": "drag", "landmark": "reference_end", "delta": { "x": 12.0, "y": 0.0 } } ],
//!   "measurement": [ { "type": "set_mode", "mode": "view" }, { "type": "set_zoom", "scale": 2.0 } ]
//! }
//! ```
//!
//! `width_px`/`height_px` may be omitted when `handle` is a readable image
//! file; the dimensions are then read from its header.

use clap::Parser;
use face_gauge::{
    CapturedImage, EngineConfig, EventOutcome, GestureEvent, ImageHandle, LiveReadout,
    MeasurementRecord, Point, Session,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "face-gauge")]
#[command(author, version, about = "Card-calibrated pupillary distance and frame measurements", long_about = None)]
struct Args {
    /// Gesture script (JSON)
    #[arg(required = true)]
    script: PathBuf,

    /// Engine configuration file (JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Output as JSON
    #[arg(short, long)]
    json: bool,

    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Show verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Deserialize, Debug)]
struct Script {
    image: ScriptImage,
    #[serde(default = "default_viewport")]
    viewport: Point,
    #[serde(default)]
    calibration: Vec<GestureEvent>,
    #[serde(default)]
    measurement: Vec<GestureEvent>,
}

#[derive(Deserialize, Debug)]
struct ScriptImage {
    handle: String,
    width_px: Option<u32>,
    height_px: Option<u32>,
}

fn default_viewport() -> Point {
    Point::new(390.0, 844.0)
}

/// Output structure for JSON serialization
#[derive(Serialize)]
struct Output {
    image: String,
    width: u32,
    height: u32,
    pixels_per_mm: f64,
    /// Gesture events that were not applied (ignored, dropped, unknown handle)
    skipped_events: usize,
    measurements: MeasurementRecord,
    #[serde(skip)]
    readouts: Vec<LiveReadout>,
}

fn main() {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    if let Err(e) = run(&args) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let config = match &args.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };

    let script: Script = serde_json::from_str(&std::fs::read_to_string(&args.script)?)?;
    let image = resolve_image(&script.image)?;

    let mut session = Session::new(config, script.viewport)?;
    session.begin_calibration(image.clone())?;

    let mut skipped = 0;
    for event in &script.calibration {
        if session.handle(*event)? != EventOutcome::Applied {
            skipped += 1;
        }
    }
    let calibration = session.confirm_calibration()?;

    for event in &script.measurement {
        if session.handle(*event)? != EventOutcome::Applied {
            skipped += 1;
        }
    }
    let readouts = session
        .measurement_stage()
        .map(|stage| stage.readouts())
        .unwrap_or_default();
    let handoff = session.finalize()?;

    let output = Output {
        image: image.handle.to_string(),
        width: image.width_px,
        height: image.height_px,
        pixels_per_mm: calibration.pixels_per_mm(),
        skipped_events: skipped,
        measurements: handoff.record,
        readouts,
    };

    let output_str = if args.json {
        serde_json::to_string_pretty(&output)?
    } else {
        format_human_readable(&output)
    };

    if let Some(ref path) = args.output {
        std::fs::write(path, &output_str)?;
        tracing::info!(path = %path.display(), "output written");
    } else {
        println!("{}", output_str);
    }

    Ok(())
}

fn resolve_image(source: &ScriptImage) -> Result<CapturedImage, Box<dyn std::error::Error>> {
    let (width, height) = match (source.width_px, source.height_px) {
        (Some(w), Some(h)) => (w, h),
        _ => {
            tracing::debug!(handle = %source.handle, "reading image dimensions from file");
            image::image_dimensions(&source.handle)?
        }
    };
    Ok(CapturedImage::new(ImageHandle::new(source.handle.clone()), width, height))
}

fn format_human_readable(output: &Output) -> String {
    let mut s = String::new();

    s.push_str(&format!("Image: {} ({}x{})\n", output.image, output.width, output.height));
    s.push_str(&format!("Calibration: {:.4} px/mm\n", output.pixels_per_mm));
    if output.skipped_events > 0 {
        s.push_str(&format!("Skipped events: {}\n", output.skipped_events));
    }

    s.push_str("\nMeasurements:\n");
    for readout in &output.readouts {
        s.push_str(&format!("  {}\n", readout));
    }

    s
}
