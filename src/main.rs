//! Isomap Flythrough - camera fly-through videos of behavior trajectories
//!
//! CLI commands:
//! - plan: Write the smoothed camera plan as JSON
//! - segments: Print how each labeled run is framed
//! - render: Render the fly-through to video (or PNG frames)
//! - intro: Render the turntable sweep over the whole cloud

mod config;
mod encoder;
mod export;
mod frames;
mod logging;
mod planner;
mod playback;
mod render;
mod trajectory;

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use export::OutputTarget;

#[derive(Parser)]
#[command(name = "isomap_flythrough")]
#[command(about = "Camera fly-through videos of labeled isomap trajectories")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to flythrough.yaml config
    #[arg(short, long, default_value = "flythrough.yaml", global = true)]
    config: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Plan the camera path and write it as JSON
    Plan {
        /// Trajectory table (.json array or .jsonl)
        #[arg(short, long)]
        input: PathBuf,

        /// Output file (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print the framing chosen for each segment
    Segments {
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Render the fly-through
    Render {
        #[arg(short, long)]
        input: PathBuf,

        /// Output video
        #[arg(short, long, default_value = "cluster.mp4")]
        output: PathBuf,

        /// Behavior video file, or a directory of decoded frames
        #[arg(long, alias = "video-frames")]
        video: Option<PathBuf>,

        /// Write PNG frames here instead of encoding a video
        #[arg(long)]
        frames_dir: Option<PathBuf>,
    },

    /// Render the orbit intro
    Intro {
        #[arg(short, long)]
        input: PathBuf,

        #[arg(short, long, default_value = "intro.mp4")]
        output: PathBuf,

        /// Write PNG frames here instead of encoding a video
        #[arg(long)]
        frames_dir: Option<PathBuf>,
    },
}

fn main() -> anyhow::Result<()> {
    let settings = config::Settings::load();
    let _log_guard = logging::init_logging(&settings.log_dir)?;
    tracing::info!("Isomap Flythrough starting up");

    let cli = Cli::parse();
    tracing::debug!("CLI args parsed: config={:?}", cli.config);

    let config = if cli.config.exists() {
        tracing::info!("Loading config from {:?}", cli.config);
        config::Config::load(&cli.config)?
    } else {
        tracing::warn!("Config file not found: {:?}, using defaults", cli.config);
        config::Config::default()
    };
    tracing::info!(
        "Config loaded: {} planned labels, {}x{} @ {} fps",
        config.planner.labels.len(),
        config.render.width,
        config.render.height,
        config.render.fps
    );

    match cli.command {
        Commands::Plan { input, output } => {
            write_plan(&config, &input, output.as_deref())?;
        }

        Commands::Segments { input } => {
            print_segments(&config, &input)?;
        }

        Commands::Render {
            input,
            output,
            video,
            frames_dir,
        } => {
            let target = output_target(output, frames_dir);
            let frames = export::export_flythrough(
                &input,
                &target,
                video.as_deref(),
                &config,
                &settings,
            )?;
            println!("Rendered {} frames -> {}", frames, target.path().display());
        }

        Commands::Intro {
            input,
            output,
            frames_dir,
        } => {
            let target = output_target(output, frames_dir);
            let frames = export::export_intro(&input, &target, &config, &settings)?;
            println!("Rendered {} frames -> {}", frames, target.path().display());
        }
    }

    Ok(())
}

fn output_target(output: PathBuf, frames_dir: Option<PathBuf>) -> OutputTarget {
    match frames_dir {
        Some(dir) => OutputTarget::Frames(dir),
        None => OutputTarget::Video(output),
    }
}

/// Plan and dump the camera rows
fn write_plan(config: &config::Config, input: &Path, output: Option<&Path>) -> anyhow::Result<()> {
    let (_, plan) = export::plan_trajectory(input, config)?;
    let json = serde_json::to_string_pretty(&plan.rows)?;

    match output {
        Some(path) => {
            std::fs::write(path, json)?;
            println!("Wrote {} camera rows to {}", plan.len(), path.display());
        }
        None => println!("{}", json),
    }
    Ok(())
}

/// One line per framed segment
fn print_segments(config: &config::Config, input: &Path) -> anyhow::Result<()> {
    let records = export::load_trajectory(input, config)?;
    let planner = planner::CameraPlanner::new(config.planner.clone())?;
    let views = planner.frame_segments(&records)?;

    println!("Segments ({}):", views.len());
    println!();
    for view in &views {
        let [x, y, z] = view.segment.view_vector;
        println!(
            "  - {} [{} records] view=({:.3}, {:.3}, {:.3}) \
             azimuth {:.1} -> {:.1}, elevation {:.1}, distance {:.3}",
            view.segment.label,
            view.segment.len(),
            x,
            y,
            z,
            view.entry_azimuth,
            view.exit_azimuth,
            view.elevation,
            view.segment.view_distance
        );
    }
    Ok(())
}
