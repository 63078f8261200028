mod cli;

use seamcut::{
    config, edit,
    inspect::{format_time, TimelineSummary},
    simulate::{self, SimulationPlan},
    timeline::TimelineMapper,
};

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};
use std::path::Path;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "seamcut=trace,seamcut_player=trace,seamcut_timeline=trace,seamcut_core=debug".to_string()
        } else {
            "seamcut=info,seamcut_player=warn,seamcut_timeline=warn,seamcut_core=warn".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Map {
            edit,
            at,
            real,
            tolerance,
            json,
        } => map_time(&edit, at, real, tolerance, json),
        Commands::Inspect { edit, json } => inspect_edit(&edit, json),
        Commands::Simulate {
            edit,
            seeks,
            rate,
            duration,
            source_duration,
            json,
        } => {
            let plan = SimulationPlan {
                seeks,
                rate,
                max_duration: duration,
                source_duration,
            };
            simulate_edit(&edit, cli.config.as_deref(), &plan, json)
        }
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::Version => {
            println!("seamcut {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn map_time(
    path: &Path,
    at: f64,
    real: bool,
    tolerance: Option<f64>,
    json: bool,
) -> Result<()> {
    if !at.is_finite() {
        anyhow::bail!("Time must be a finite number of seconds");
    }
    let timeline = edit::load_edit(path)?;
    let mapper = TimelineMapper::new(timeline);

    let mapping = match (real, tolerance) {
        (true, Some(tolerance)) => mapper.real_to_virtual_with_tolerance(at, tolerance),
        (true, None) => mapper.real_to_virtual(at),
        (false, _) => mapper.virtual_to_real(at),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&mapping)?);
        return Ok(());
    }

    let (from, to) = if real {
        ("real", "virtual")
    } else {
        ("virtual", "real")
    };
    if mapping.is_valid {
        println!(
            "{} {} -> {} {}",
            from,
            format_time(at),
            to,
            format_time(mapping.time)
        );
        if let Some(id) = mapping.segment_id {
            println!("Segment: {}", id);
        }
    } else {
        println!("{} {} is not inside any enabled segment", from, format_time(at));
        let next = if real {
            mapper.next_segment_after_real(at)
        } else {
            mapper.next_segment_after_virtual(at)
        };
        if let Some(segment) = next {
            println!(
                "Next segment starts at virtual {} (real {})",
                format_time(segment.virtual_start_time),
                format_time(segment.real_start_time)
            );
        }
    }

    Ok(())
}

fn inspect_edit(path: &Path, json: bool) -> Result<()> {
    let timeline = edit::load_edit(path)?;
    let summary = TimelineSummary::new(&timeline);

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!("Edit: {}", path.display());
        print!("{}", summary.render());
    }

    Ok(())
}

fn simulate_edit(
    path: &Path,
    config_path: Option<&Path>,
    plan: &SimulationPlan,
    json: bool,
) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;
    let timeline = edit::load_edit(path)?;
    if timeline.enabled_count() == 0 {
        anyhow::bail!("Edit has no enabled segments: {:?}", path);
    }

    tracing::info!(
        seeks = plan.seeks.len(),
        rate = ?plan.rate,
        "Simulating playback of {:?}",
        path
    );
    let report = simulate::run_simulation(&config, timeline, plan)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    for event in &report.events {
        println!("{}", event.describe());
    }
    println!();
    println!(
        "Played {} of {} in {} ({} frames)",
        format_time(report.final_virtual_time),
        format_time(report.duration),
        format_time(report.elapsed),
        report.frames
    );
    println!("Completed: {}", if report.completed { "yes" } else { "no" });
    let counters = &report.debug.counters;
    println!("  Frames throttled: {}", counters.frames_throttled);
    println!("  Gap frames: {}", counters.gap_frames);
    println!("  Drift corrections: {}", counters.drift_corrections);
    println!("  Seeks cancelled: {}", report.debug.seeks_cancelled);

    Ok(())
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    let config = match path {
        Some(p) => {
            println!("Validating config: {:?}", p);
            config::load_config(p)?
        }
        None => match config::find_default_config() {
            Some(p) => {
                println!("Validating config: {:?}", p);
                config::load_config(&p)?
            }
            None => {
                println!("No config file found, using defaults");
                config::Config::default()
            }
        },
    };

    println!("✓ Configuration is valid");
    println!(
        "  Boundary threshold: {} ms",
        config.segments.boundary_threshold_ms
    );
    println!(
        "  Completion debounce: {} ms",
        config.segments.completion_debounce_ms
    );
    println!("  Drift threshold: {} ms", config.player.drift_threshold_ms);
    println!(
        "  Playback rate: {} ({} - {})",
        config.player.default_playback_rate,
        config.player.min_playback_rate,
        config.player.max_playback_rate
    );
    println!("  Simulated frame rate: {}", config.simulation.frame_rate);

    Ok(())
}
