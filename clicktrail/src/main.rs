//! clicktrail - CLI for the interaction telemetry collector
//!
//! This tool provides commands for:
//! - Checking tracking configuration and endpoint readiness
//! - Showing the persisted user identity
//! - Sending recorded events to the collection endpoint
//! - Rendering click heat maps from an event history file
//!
//! Uses XDG Base Directory specification for file locations:
//! - Config: $XDG_CONFIG_HOME/clicktrail/config.toml (~/.config/clicktrail/config.toml)
//! - Identity: $XDG_DATA_HOME/clicktrail/storage.json (~/.local/share/clicktrail/storage.json)
//! - Logs: $XDG_STATE_HOME/clicktrail/ (~/.local/state/clicktrail/)

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Local;
use clap::{Parser, Subcommand};
use clicktrail_core::collector::HttpTransport;
use clicktrail_core::config::TrackingConfig;
use clicktrail_core::heatmap::{compute_grid, ColorScheme, GridParams, Rgba, TimeRange};
use clicktrail_core::identity::{FileStorage, Identity};
use clicktrail_core::{Config, Event, EventData, TrackingClient};
use serde::de::DeserializeOwned;
use serde::Deserialize;

#[derive(Parser)]
#[command(name = "clicktrail")]
#[command(about = "Interaction telemetry collector and click heat maps")]
#[command(version)]
struct Args {
    /// Verbose output (writes a log file)
    #[arg(short, long)]
    verbose: bool,

    /// Config file (default: ~/.config/clicktrail/config.toml)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show tracking configuration and status
    Status,

    /// Show the persisted user id and a fresh session id
    Identity,

    /// Track events from a file and deliver them to the endpoint
    Send {
        /// JSON array or JSON-lines file of event payloads with `eventType`
        file: PathBuf,
    },

    /// Compute a click heat map from an event history file
    Heatmap {
        /// JSON array or JSON-lines file of tracked events
        file: PathBuf,

        /// Page identifier to aggregate
        #[arg(short, long)]
        page: String,

        /// Grid cell size (default: from config)
        #[arg(short, long)]
        bucket: Option<f64>,

        /// Click count for full intensity (default: from config)
        #[arg(short, long)]
        threshold: Option<u32>,

        /// Time window: all, today, week, month (default: from config)
        #[arg(short, long)]
        range: Option<TimeRange>,

        /// Only count clicks in these categories (repeatable)
        #[arg(short, long = "category")]
        categories: Vec<String>,

        /// Colour scheme: classic, plasma, viridis, grayscale (default: from config)
        #[arg(short, long)]
        scheme: Option<ColorScheme>,
    },
}

/// One line of a `send` input file
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventRecord {
    event_type: String,
    #[serde(flatten)]
    data: EventData,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => Config::load_from(path)
            .with_context(|| format!("failed to load configuration from {}", path.display()))?,
        None => Config::load().context("failed to load configuration")?,
    };

    // Held until exit so buffered log lines are flushed
    let _log_guard = if args.verbose {
        Some(
            clicktrail_core::logging::init(&config.logging)
                .context("failed to initialize logging")?,
        )
    } else {
        None
    };

    tracing::info!("clicktrail starting");

    match args.command {
        Command::Status => cmd_status(&config),
        Command::Identity => cmd_identity(),
        Command::Send { file } => cmd_send(&config, &file),
        Command::Heatmap {
            file,
            page,
            bucket,
            threshold,
            range,
            categories,
            scheme,
        } => {
            let heatmap = &config.heatmap;
            let params = GridParams {
                bucket_size: bucket.unwrap_or(heatmap.bucket_size),
                threshold: threshold.unwrap_or(heatmap.threshold),
            };
            cmd_heatmap(
                &config,
                &file,
                &page,
                params,
                range.unwrap_or(heatmap.time_range),
                categories,
                scheme.unwrap_or(heatmap.color_scheme),
            )
        }
    }
}

fn cmd_status(config: &Config) -> Result<()> {
    println!("clicktrail Configuration");
    println!("========================");
    println!();

    let tracking = &config.tracking;

    println!(
        "Endpoint:        {}",
        tracking.endpoint.as_deref().unwrap_or("<not set>")
    );
    println!(
        "API Key:         {}",
        if tracking.api_key.is_some() {
            "<set>"
        } else {
            "<not set>"
        }
    );
    println!("Batch Size:      {}", tracking.batch_size);
    println!("Flush Interval:  {}ms", tracking.flush_interval_ms);
    println!("Timeout:         {}s", tracking.timeout_secs);
    println!("History Limit:   {}", tracking.history_limit);
    println!("Beacon:          {}", tracking.beacon);

    let heatmap = &config.heatmap;
    println!();
    println!("Bucket Size:     {}", heatmap.bucket_size);
    println!("Threshold:       {}", heatmap.threshold);
    println!("Max Opacity:     {}", heatmap.max_opacity);
    println!("Point Radius:    {}", heatmap.point_radius);
    println!("Color Scheme:    {}", heatmap.color_scheme);
    println!("Time Range:      {}", heatmap.time_range);

    println!();
    if !tracking.is_ready() {
        println!("Status: Not ready (missing required configuration)");
        println!();
        println!("Set the endpoint in {}:", Config::config_path().display());
        println!();
        println!("  [tracking]");
        println!("  endpoint = \"https://telemetry.example.com/api/track\"");
        println!("  api_key = \"ct_live_xxxxxxxxxxxx\"");
        return Ok(());
    }

    let transport = HttpTransport::new(tracking).context("failed to create HTTP transport")?;
    let runtime = tokio::runtime::Runtime::new().context("failed to start async runtime")?;
    let reachable = runtime.block_on(transport.health_check())?;
    tracing::info!(endpoint = %transport.endpoint(), reachable, "Checked tracking endpoint");
    if reachable {
        println!("Status: Ready (endpoint reachable)");
    } else {
        println!("Status: Configured, but endpoint is unreachable");
    }

    Ok(())
}

fn cmd_identity() -> Result<()> {
    let storage = FileStorage::open_default();
    let identity = Identity::new(Some(&storage));

    println!("User ID:     {}", identity.user_id());
    println!("Session ID:  {}", identity.session_id());
    println!("Storage:     {}", storage.path().display());

    Ok(())
}

fn cmd_send(config: &Config, file: &Path) -> Result<()> {
    if !config.tracking.is_ready() {
        println!("Tracking endpoint is not configured. Run 'status' for details.");
        return Ok(());
    }

    let records: Vec<EventRecord> = read_records(file)?;
    tracing::info!(path = %file.display(), events = records.len(), "Loaded events");
    if records.is_empty() {
        println!("No events in {}", file.display());
        return Ok(());
    }

    let identity = Identity::new(Some(&FileStorage::open_default()));
    let runtime = tokio::runtime::Runtime::new().context("failed to start async runtime")?;

    let stats = runtime.block_on(async {
        // A beacon send would be cut off when the runtime shuts down
        let tracking = TrackingConfig {
            beacon: false,
            ..config.tracking.clone()
        };
        let client = TrackingClient::http(&tracking, identity)
            .context("failed to create tracking client")?;

        println!("Tracking {} event(s)...", records.len());
        for record in records {
            client.track(record.event_type, record.data);
        }

        // Size-triggered flushes may already hold batches; wait them out
        // before the runtime is dropped
        let drained = client.drain().await;
        tracing::debug!(?drained, "Drained tracking queue");
        client.destroy().await;
        client.wait_idle().await;

        anyhow::Ok((client.stats(), client.pending_count()))
    })?;

    let (stats, pending) = stats;
    tracing::info!(
        flushes = stats.flushes,
        delivered = stats.events_delivered,
        requeued = stats.events_requeued,
        failures = stats.delivery_failures,
        pending,
        "Send complete"
    );
    println!();
    println!("Stats:");
    println!("  Flushes:    {}", stats.flushes);
    println!("  Delivered:  {}", stats.events_delivered);
    println!("  Requeued:   {}", stats.events_requeued);
    println!("  Failures:   {}", stats.delivery_failures);
    if pending > 0 {
        println!();
        println!("{} event(s) could not be delivered", pending);
    }

    Ok(())
}

fn cmd_heatmap(
    config: &Config,
    file: &Path,
    page: &str,
    params: GridParams,
    range: TimeRange,
    categories: Vec<String>,
    scheme: ColorScheme,
) -> Result<()> {
    let events: Vec<Event> = read_records(file)?;

    let mut filter = range.filter_at(&Local::now()).unwrap_or_default();
    filter.categories = categories;

    let grid = compute_grid(&events, page, Some(&filter), &params);
    if grid.is_empty() {
        println!("No clicks recorded for {}", page);
        return Ok(());
    }

    let palette = scheme.palette();
    let max_opacity = config.heatmap.max_opacity;

    println!(
        "Heat map for {} ({} clicks, {} cells, range: {})",
        page,
        grid.total_clicks(),
        grid.len(),
        range
    );
    println!();
    println!(
        "{:>8} {:>8} {:>6} {:>9} {:>7}  {}",
        "X", "Y", "Count", "Intensity", "Tier", "Color"
    );
    println!("{:-<64}", "");

    for point in grid.iter() {
        let color = Rgba {
            a: point.opacity(max_opacity),
            ..palette.color(point.tier())
        };
        println!(
            "{:>8} {:>8} {:>6} {:>9.2} {:>7}  {}",
            point.x,
            point.y,
            point.count,
            point.intensity,
            point.tier(),
            color
        );
    }

    Ok(())
}

/// Read a JSON array, or one JSON value per line
fn read_records<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;

    if content.trim_start().starts_with('[') {
        return serde_json::from_str(&content)
            .with_context(|| format!("failed to parse {}", path.display()));
    }

    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(n, line)| {
            serde_json::from_str(line)
                .with_context(|| format!("failed to parse {} line {}", path.display(), n + 1))
        })
        .collect()
}
