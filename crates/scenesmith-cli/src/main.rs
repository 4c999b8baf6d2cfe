//! Scenesmith CLI
//!
//! The `scenesmith` command repairs, validates and renders generated scene
//! scripts.
//!
//! ## Commands
//!
//! - `repair`: print the repaired script (or what changed)
//! - `validate`: parse a script and report the first syntax error
//! - `render`: run a script file through the full pipeline
//! - `submit`: run a JSON submission payload through the pipeline
//! - `sequence`: render and join a list of segments
//! - `sweep`: delete stale workspaces

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{info, Level};

use scenesmith_core::{normalize, validate, RepairEngine, ScriptSubmission};
use scenesmith_render::{PipelineConfig, ScenePipeline, Segment};

#[derive(Parser)]
#[command(name = "scenesmith")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Repair and render generated animation scripts", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true, env = "SCENESMITH_LOG_JSON")]
    json: bool,

    /// JSON config file
    #[arg(long, global = true, env = "SCENESMITH_CONFIG")]
    config: Option<PathBuf>,

    /// Directory holding per-execution workspaces
    #[arg(long, global = true, env = "SCENESMITH_WORKSPACE_ROOT")]
    workspace_root: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the repaired script
    Repair {
        /// Script file
        file: PathBuf,

        /// The script narrates itself
        #[arg(long)]
        narrated: bool,

        /// Print the repair record as JSON instead of the text
        #[arg(long)]
        record: bool,
    },

    /// Check that a script parses; exits non-zero when it does not
    Validate {
        /// Script file
        file: PathBuf,
    },

    /// Render a script file
    Render {
        /// Script file
        file: PathBuf,

        /// Narration text to synthesize and mux onto the video
        #[arg(long)]
        narration: Option<String>,

        /// Pre-recorded narration audio
        #[arg(long)]
        audio: Option<PathBuf>,

        /// The script narrates itself
        #[arg(long)]
        narrated: bool,
    },

    /// Render a JSON submission payload
    Submit {
        /// Payload file (`script`/`manimCode`, `voiceover`, `narrated_scene`)
        payload: PathBuf,
    },

    /// Render a JSON list of segments and join them
    Sequence {
        /// Segments file: `[{"script": "...", "narration": "..."}, ...]`
        segments: PathBuf,
    },

    /// Delete stale workspaces
    Sweep {
        /// Override the configured maximum age
        #[arg(long)]
        max_age_secs: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    scenesmith_core::init_tracing(cli.json, level);

    let config = load_config(cli.config.as_deref(), cli.workspace_root)?;

    match cli.command {
        Commands::Repair {
            file,
            narrated,
            record,
        } => cmd_repair(&config, &file, narrated, record),
        Commands::Validate { file } => cmd_validate(&file),
        Commands::Render {
            file,
            narration,
            audio,
            narrated,
        } => {
            let mut submission = ScriptSubmission::from_script(read(&file)?).narrated(narrated);
            submission.narration = narration;
            submission.audio = audio;
            cmd_process(config, &submission).await
        }
        Commands::Submit { payload } => {
            let submission = ScriptSubmission::from_json(&read(&payload)?)
                .with_context(|| format!("invalid submission payload {}", payload.display()))?;
            cmd_process(config, &submission).await
        }
        Commands::Sequence { segments } => cmd_sequence(config, &segments).await,
        Commands::Sweep { max_age_secs } => cmd_sweep(config, max_age_secs),
    }
}

/// Config file (if any) with the workspace root override applied.
fn load_config(path: Option<&Path>, workspace_root: Option<PathBuf>) -> Result<PipelineConfig> {
    let mut config = match path {
        Some(path) => PipelineConfig::from_file(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => PipelineConfig::default(),
    };
    if let Some(root) = workspace_root {
        config.workspace_root = root;
    }
    Ok(config)
}

fn read(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn cmd_repair(config: &PipelineConfig, file: &Path, narrated: bool, record: bool) -> Result<()> {
    let engine = RepairEngine::new(config.repair_options(narrated));
    let repaired = engine.repair(&normalize(&read(file)?));
    if record {
        print_json(&repaired.record)
    } else {
        print!("{}", repaired.text);
        Ok(())
    }
}

fn cmd_validate(file: &Path) -> Result<()> {
    let result = validate(&read(file)?);
    print_json(&result)?;
    if !result.valid {
        bail!(
            "{} does not parse (line {})",
            file.display(),
            result.line.unwrap_or(0)
        );
    }
    Ok(())
}

async fn cmd_process(config: PipelineConfig, submission: &ScriptSubmission) -> Result<()> {
    let pipeline = ScenePipeline::new(config);
    let result = pipeline.process(submission).await?;
    info!(
        path = %result.artifact.path.display(),
        attempts = result.attempts_made,
        "render complete"
    );
    print_json(&result)
}

async fn cmd_sequence(config: PipelineConfig, file: &Path) -> Result<()> {
    let segments: Vec<Segment> = serde_json::from_str(&read(file)?)
        .with_context(|| format!("invalid segments file {}", file.display()))?;
    let pipeline = ScenePipeline::new(config);
    let result = pipeline.render_sequence(&segments).await?;
    info!(
        path = %result.artifact.path.display(),
        segments = result.segments.len(),
        "sequence complete"
    );
    print_json(&result)
}

fn cmd_sweep(config: PipelineConfig, max_age_secs: Option<u64>) -> Result<()> {
    let max_age = max_age_secs
        .map(Duration::from_secs)
        .unwrap_or_else(|| config.retention.max_age());
    let pipeline = ScenePipeline::new(config);
    let report = pipeline.workspaces().sweep_older_than(max_age);
    print_json(&report)
}
