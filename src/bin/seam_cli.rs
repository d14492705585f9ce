use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;

use seam_tracker::config::AppConfig;
use seam_tracker::error::ErrorCode;
use seam_tracker::registry::TransformStore;
use seam_tracker::transform::TransformProgram;
use seam_tracker::{ProfileSample, SeamOutput, TrackerHandle};

#[derive(Parser, Debug)]
#[command(
    name = "seam_cli",
    about = "Replay recorded profiles and manage weld seam transform definitions"
)]
struct Cli {
    /// Configuration file (defaults to assets/seam_config.json)
    #[arg(long)]
    config: Option<PathBuf>,
    /// Override the stored transform definitions file
    #[arg(long)]
    codes: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run recorded profiles (one JSON sample per line) through the pipeline
    Replay {
        #[arg(long)]
        profiles: PathBuf,
        /// Task selected before the first sample
        #[arg(long)]
        task: Option<u32>,
        #[arg(long, allow_hyphen_values = true)]
        offset_x: Option<f64>,
        #[arg(long, allow_hyphen_values = true)]
        offset_y: Option<f64>,
        /// Only print confirmed seam positions
        #[arg(long)]
        valid_only: bool,
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Compile and self-test every stored definition
    Check,
    /// Serve the HTTP control surface, optionally feeding recorded profiles
    Serve {
        #[arg(long)]
        profiles: Option<PathBuf>,
        /// Delay between replayed samples
        #[arg(long, default_value_t = 50)]
        interval_ms: u64,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt::init();

    match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::from(1)
        }
    }
}

fn run() -> Result<ExitCode> {
    let cli = Cli::parse();
    let mut config = match &cli.config {
        Some(path) => AppConfig::load_from_file(path),
        None => AppConfig::load(),
    };
    if let Some(codes) = cli.codes {
        config.storage.definitions_path = codes;
    }

    match cli.command {
        Commands::Replay {
            profiles,
            task,
            offset_x,
            offset_y,
            valid_only,
            output,
        } => {
            if let Some(task) = task {
                config.pipeline.initial_task = task;
            }
            config.offsets.x = offset_x.unwrap_or(config.offsets.x);
            config.offsets.y = offset_y.unwrap_or(config.offsets.y);
            run_replay(config, &profiles, valid_only, output)
        }
        Commands::Check => run_check(&config),
        Commands::Serve {
            profiles,
            interval_ms,
        } => run_serve(config, profiles, interval_ms),
    }
}

fn run_replay(
    config: AppConfig,
    profiles: &Path,
    valid_only: bool,
    output_path: Option<PathBuf>,
) -> Result<ExitCode> {
    let samples = read_profiles(profiles)?;
    let handle = TrackerHandle::from_config(config);
    if handle.registry().active_id()?.is_none() {
        eprintln!("Warning: no active task, every output will be invalid");
    }

    let mut outputs = Vec::with_capacity(samples.len());
    for sample in &samples {
        let output = handle.process_sample(sample)?;
        if !valid_only || output.valid {
            outputs.push(output);
        }
    }

    let valid = outputs.iter().filter(|output| output.valid).count();
    emit_outputs(&outputs, output_path)?;
    eprintln!(
        "{} samples replayed, {} confirmed seam positions",
        samples.len(),
        valid
    );
    Ok(ExitCode::from(0))
}

fn run_check(config: &AppConfig) -> Result<ExitCode> {
    let store = TransformStore::new(config.storage.definitions_path.clone());
    let definitions = store.read()?;
    let budget = std::time::Duration::from_millis(config.pipeline.transform_budget_ms);

    let reports: Vec<CheckReport> = definitions
        .iter()
        .map(|def| {
            let checked = TransformProgram::compile(&def.body, &config.segmentation)
                .map_err(|err| err.message())
                .and_then(|program| program.self_test(Some(budget)).map_err(|err| err.message()));
            CheckReport {
                id: def.id,
                valid: checked.is_ok(),
                error: checked.err(),
            }
        })
        .collect();

    println!("{}", serde_json::to_string_pretty(&reports)?);

    if reports.iter().all(|report| report.valid) {
        Ok(ExitCode::from(0))
    } else {
        Ok(ExitCode::from(2))
    }
}

#[cfg(feature = "control_http")]
fn run_serve(config: AppConfig, profiles: Option<PathBuf>, interval_ms: u64) -> Result<ExitCode> {
    use std::sync::Arc;
    use std::time::Duration;

    use seam_tracker::http::{run_http_server, ControlHttpState, HttpSettings};
    use seam_tracker::ControlSurface;

    let samples = match profiles {
        Some(path) => read_profiles(&path)?,
        None => Vec::new(),
    };
    let settings = HttpSettings::from_env();
    let handle = Arc::new(TrackerHandle::from_config(config));

    if !samples.is_empty() {
        let mut sender = handle.start_ingress()?;
        std::thread::spawn(move || loop {
            for sample in &samples {
                sender.push(sample.clone());
                std::thread::sleep(Duration::from_millis(interval_ms));
            }
        });
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("building tokio runtime")?;

    eprintln!(
        "Serving control surface on {} (token prefix {}***)",
        settings.addr,
        settings.token_preview()
    );
    let state = ControlHttpState::new(ControlSurface::new(Arc::clone(&handle)), settings.token);
    runtime.block_on(async move {
        tokio::select! {
            served = run_http_server(state, settings.addr) => served,
            _ = tokio::signal::ctrl_c() => Ok(()),
        }
    })?;

    Ok(ExitCode::from(0))
}

#[cfg(not(feature = "control_http"))]
fn run_serve(_config: AppConfig, _profiles: Option<PathBuf>, _interval_ms: u64) -> Result<ExitCode> {
    anyhow::bail!("seam_cli was built without the control_http feature")
}

fn read_profiles(path: &Path) -> Result<Vec<ProfileSample>> {
    let text = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(idx, line)| {
            serde_json::from_str(line)
                .with_context(|| format!("{}:{}: invalid profile sample", path.display(), idx + 1))
        })
        .collect()
}

fn emit_outputs(outputs: &[SeamOutput], output_path: Option<PathBuf>) -> Result<()> {
    let mut lines = String::new();
    for output in outputs {
        lines.push_str(&serde_json::to_string(output)?);
        lines.push('\n');
    }

    if let Some(path) = output_path {
        fs::write(&path, lines).with_context(|| format!("writing {}", path.display()))?;
    } else {
        print!("{lines}");
    }
    Ok(())
}

#[derive(Serialize)]
struct CheckReport {
    id: u32,
    valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}
