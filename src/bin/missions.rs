//! Missions CLI - Command-line interface for Yousei Missions
//!
//! Commands:
//! - today: Show the mission the catalog assigns for a day
//! - status: Load (or assign) the live mission and print its state
//! - report: Report normalized progress for the live mission
//! - classify: Measure color coverage of a raw RGBA frame
//! - evaluate: Feed a raw RGBA frame to the live color mission
//! - doctor: Diagnose configuration and saved state

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use yousei_missions::classifier::{ColorClassifier, ColorTarget, RgbaFrame};
use yousei_missions::clock::{days_since_epoch, next_utc_midnight, ManualClock};
use yousei_missions::codec;
use yousei_missions::engine::EngineSnapshot;
use yousei_missions::{
    ColorMissionBridge, FrameOutcome, JsonFileStore, KeyValueStore, MissionConfig,
    MissionDefinition, MissionEngine, MissionError, ProgressUpdate, VERSION,
};

/// Missions - Daily fairy missions for Yousei AR
#[derive(Parser)]
#[command(name = "missions")]
#[command(author = "Yousei AR Developers")]
#[command(version = VERSION)]
#[command(about = "Inspect and drive the Yousei daily mission engine", long_about = None)]
struct Cli {
    /// Configuration file (JSON); built-in defaults when omitted
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// State file holding the persisted mission
    #[arg(long, global = true, default_value = "mission_state.json")]
    state: PathBuf,

    /// Evaluate at this instant (RFC 3339) instead of now
    #[arg(long, global = true)]
    at: Option<String>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the mission assigned for the day (does not touch the state file)
    Today,

    /// Print the live mission, assigning one if needed
    Status,

    /// Report normalized progress (0-1) for the live mission
    Report {
        /// Progress value
        progress: f32,
    },

    /// Measure the fraction of a frame matching a target color
    Classify {
        #[command(flatten)]
        frame: FrameArgs,

        /// Target color
        #[arg(long, value_enum)]
        target: TargetArg,
    },

    /// Evaluate a frame against the live color mission
    Evaluate {
        #[command(flatten)]
        frame: FrameArgs,
    },

    /// Diagnose configuration and saved state
    Doctor {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(clap::Args)]
struct FrameArgs {
    /// Raw RGBA8 frame file, row-major (use - for stdin)
    #[arg(short, long)]
    input: PathBuf,

    /// Frame width in pixels
    #[arg(long)]
    width: u32,

    /// Frame height in pixels
    #[arg(long)]
    height: u32,
}

#[derive(Clone, Copy, ValueEnum)]
enum TargetArg {
    /// Foliage green
    Green,
    /// Clear sky blue
    SkyBlue,
}

impl From<TargetArg> for ColorTarget {
    fn from(target: TargetArg) -> Self {
        match target {
            TargetArg::Green => ColorTarget::Green,
            TargetArg::SkyBlue => ColorTarget::SkyBlue,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", serde_json::to_string(&CliError::from(e)).unwrap_or_else(|_| "Unknown error".to_string()));
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("yousei_missions=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr).with_target(false))
        .with(filter)
        .init();
}

fn run(cli: Cli) -> Result<(), MissionsCliError> {
    let now = resolve_time(cli.at.as_deref())?;

    match cli.command {
        Commands::Today => cmd_today(cli.config.as_deref(), now),
        Commands::Status => cmd_status(cli.config.as_deref(), &cli.state, now),
        Commands::Report { progress } => {
            cmd_report(cli.config.as_deref(), &cli.state, now, progress)
        }
        Commands::Classify { frame, target } => {
            cmd_classify(cli.config.as_deref(), &frame, target)
        }
        Commands::Evaluate { frame } => {
            cmd_evaluate(cli.config.as_deref(), &cli.state, now, &frame)
        }
        Commands::Doctor { json } => cmd_doctor(cli.config.as_deref(), &cli.state, now, json),
    }
}

fn resolve_time(at: Option<&str>) -> Result<DateTime<Utc>, MissionsCliError> {
    match at {
        Some(raw) => DateTime::parse_from_rfc3339(raw)
            .map(|t| t.with_timezone(&Utc))
            .map_err(|e| MissionsCliError::InvalidTime(format!("{}: {}", raw, e))),
        None => Ok(Utc::now()),
    }
}

fn load_config(path: Option<&Path>) -> Result<MissionConfig, MissionsCliError> {
    match path {
        Some(path) => Ok(MissionConfig::from_json(&fs::read_to_string(path)?)?),
        None => Ok(MissionConfig::default()),
    }
}

/// Build an engine on the state file and run initialization
fn open_engine(
    config: &MissionConfig,
    state: &Path,
    now: DateTime<Utc>,
) -> Result<MissionEngine, MissionsCliError> {
    let mut engine = MissionEngine::new(
        config.catalog()?,
        config.engine_config(),
        ManualClock::new(now),
        JsonFileStore::new(state),
    );
    engine.initialize()?;
    Ok(engine)
}

fn read_frame(args: &FrameArgs) -> Result<Vec<u8>, MissionsCliError> {
    if args.input.as_os_str() == "-" {
        let mut buf = Vec::new();
        io::Read::read_to_end(&mut io::stdin(), &mut buf)?;
        Ok(buf)
    } else {
        Ok(fs::read(&args.input)?)
    }
}

fn update_label(update: ProgressUpdate) -> &'static str {
    match update {
        ProgressUpdate::NoMission => "no_mission",
        ProgressUpdate::AlreadyCompleted => "already_completed",
        ProgressUpdate::NotAdvanced => "not_advanced",
        ProgressUpdate::Advanced(_) => "advanced",
        ProgressUpdate::Completed => "completed",
    }
}

// ============================================================================
// Commands
// ============================================================================

fn cmd_today(config: Option<&Path>, now: DateTime<Utc>) -> Result<(), MissionsCliError> {
    let config = load_config(config)?;
    let catalog = config.catalog()?;
    let mission = catalog
        .mission_for_day(now, config.seed_offset)
        .ok_or(MissionError::EmptyCatalog)?;

    let report = TodayReport {
        date: now.date_naive().to_string(),
        day: days_since_epoch(now),
        mission: mission.clone(),
        expires_at: next_utc_midnight(now),
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn cmd_status(
    config: Option<&Path>,
    state: &Path,
    now: DateTime<Utc>,
) -> Result<(), MissionsCliError> {
    let config = load_config(config)?;
    let engine = open_engine(&config, state, now)?;
    println!("{}", serde_json::to_string_pretty(&engine.snapshot())?);
    Ok(())
}

fn cmd_report(
    config: Option<&Path>,
    state: &Path,
    now: DateTime<Utc>,
    progress: f32,
) -> Result<(), MissionsCliError> {
    let config = load_config(config)?;
    let mut engine = open_engine(&config, state, now)?;
    let update = engine.report_progress(progress);

    let report = ProgressReport {
        update: update_label(update),
        status: engine.snapshot(),
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn cmd_classify(
    config: Option<&Path>,
    args: &FrameArgs,
    target: TargetArg,
) -> Result<(), MissionsCliError> {
    let config = load_config(config)?;
    let data = read_frame(args)?;
    let frame = RgbaFrame::new(&data, args.width, args.height)?;

    let classifier = ColorClassifier::new(config.classifier);
    let target = ColorTarget::from(target);
    let (sample_width, sample_height) = classifier.sample_dimensions(args.width, args.height);

    let report = ClassifyReport {
        target: target.hue(),
        ratio: classifier.match_ratio(&frame, target),
        sample_width,
        sample_height,
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn cmd_evaluate(
    config: Option<&Path>,
    state: &Path,
    now: DateTime<Utc>,
    args: &FrameArgs,
) -> Result<(), MissionsCliError> {
    let config = load_config(config)?;
    let data = read_frame(args)?;
    let mut frame = RgbaFrame::new(&data, args.width, args.height)?;

    let engine = open_engine(&config, state, now)?.into_handle();
    let mut bridge = ColorMissionBridge::new(engine.clone(), config.classifier, config.color);

    let report = match bridge.on_frame(&mut frame) {
        FrameOutcome::Evaluated {
            ratio,
            progress,
            update,
        } => EvaluateReport {
            outcome: "evaluated",
            ratio: Some(ratio),
            progress: Some(progress),
            update: Some(update_label(update)),
            status: engine.borrow().snapshot(),
        },
        other => EvaluateReport {
            outcome: match other {
                FrameOutcome::NoMission => "no_mission",
                FrameOutcome::NotColorMission => "not_color_mission",
                FrameOutcome::Throttled => "throttled",
                _ => "no_frame",
            },
            ratio: None,
            progress: None,
            update: None,
            status: engine.borrow().snapshot(),
        },
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn cmd_doctor(
    config: Option<&Path>,
    state: &Path,
    now: DateTime<Utc>,
    json: bool,
) -> Result<(), MissionsCliError> {
    let mut checks: Vec<DoctorCheck> = Vec::new();

    checks.push(DoctorCheck {
        name: "version".to_string(),
        status: CheckStatus::Ok,
        message: format!("Yousei Missions version {}", VERSION),
    });

    // Configuration and catalog
    let loaded = match config {
        Some(path) => fs::read_to_string(path)
            .map_err(|e| format!("Cannot read {}: {}", path.display(), e))
            .and_then(|content| MissionConfig::from_json(&content).map_err(|e| e.to_string())),
        None => Ok(MissionConfig::default()),
    };
    let config = match loaded {
        Ok(loaded) => {
            checks.push(DoctorCheck {
                name: "config".to_string(),
                status: CheckStatus::Ok,
                message: match config {
                    Some(path) => format!("{} is valid", path.display()),
                    None => "Using built-in defaults".to_string(),
                },
            });
            Some(loaded)
        }
        Err(message) => {
            checks.push(DoctorCheck {
                name: "config".to_string(),
                status: CheckStatus::Error,
                message,
            });
            None
        }
    };

    if let Some(config) = &config {
        match config.catalog() {
            Ok(catalog) if catalog.is_empty() => checks.push(DoctorCheck {
                name: "catalog".to_string(),
                status: CheckStatus::Warning,
                message: "Mission pool is empty; no mission will be assigned".to_string(),
            }),
            Ok(catalog) => checks.push(DoctorCheck {
                name: "catalog".to_string(),
                status: CheckStatus::Ok,
                message: format!("{} missions", catalog.len()),
            }),
            Err(e) => checks.push(DoctorCheck {
                name: "catalog".to_string(),
                status: CheckStatus::Error,
                message: e.to_string(),
            }),
        }
    }

    // Saved state
    let state_key = config
        .as_ref()
        .map(|c| c.engine_config().state_key)
        .unwrap_or_else(|| codec::STATE_KEY.to_string());
    checks.push(check_state(state, &state_key, now, config.as_ref()));

    // Check stdin is available (for piping frames)
    let stdin_check = if atty::is(atty::Stream::Stdin) {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a TTY (interactive mode)".to_string(),
        }
    } else {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a pipe (frames can be piped with --input -)".to_string(),
        }
    };
    checks.push(stdin_check);

    let report = DoctorReport {
        version: VERSION.to_string(),
        checked_at: now,
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Missions Doctor Report");
        println!("======================");
        println!("Version:    {}", report.version);
        println!("Checked at: {}", report.checked_at);
        println!("\nChecks:");

        for check in &report.checks {
            let status_icon = match check.status {
                CheckStatus::Ok => "[OK]",
                CheckStatus::Warning => "[WARN]",
                CheckStatus::Error => "[ERR]",
            };
            println!("  {} {}: {}", status_icon, check.name, check.message);
        }
    }

    let has_errors = report.checks.iter().any(|c| matches!(c.status, CheckStatus::Error));
    if has_errors {
        Err(MissionsCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

/// Inspect the state file without modifying it
fn check_state(
    state: &Path,
    state_key: &str,
    now: DateTime<Utc>,
    config: Option<&MissionConfig>,
) -> DoctorCheck {
    let check = |status: CheckStatus, message: String| DoctorCheck {
        name: "state".to_string(),
        status,
        message,
    };

    if !state.exists() {
        return check(
            CheckStatus::Warning,
            format!("{} does not exist; a mission will be assigned", state.display()),
        );
    }

    let store = JsonFileStore::new(state);
    let raw = match store.read(state_key) {
        Ok(Some(raw)) => raw,
        Ok(None) => {
            return check(
                CheckStatus::Warning,
                format!("No saved mission under {}", state_key),
            )
        }
        Err(e) => return check(CheckStatus::Error, e.to_string()),
    };

    let saved = match codec::decode_state(&raw) {
        Ok(saved) => saved,
        Err(e) => {
            return check(
                CheckStatus::Error,
                format!("{}; it will be replaced on next start", e),
            )
        }
    };

    let known = config
        .and_then(|c| c.catalog().ok())
        .map_or(true, |catalog| catalog.find(&saved.id).is_some());

    if !known {
        check(
            CheckStatus::Warning,
            format!("Saved mission {} is not in the catalog", saved.id),
        )
    } else if saved.is_expired(now) {
        check(
            CheckStatus::Warning,
            format!("Saved mission {} expired at {}", saved.id, saved.expires_at),
        )
    } else {
        check(
            CheckStatus::Ok,
            format!(
                "Mission {} at {:.0}%{}",
                saved.id,
                saved.progress * 100.0,
                if saved.completed { " (completed)" } else { "" }
            ),
        )
    }
}

// Error types

enum MissionsCliError {
    Io(io::Error),
    Mission(MissionError),
    Json(serde_json::Error),
    InvalidTime(String),
    DoctorFailed,
}

impl From<io::Error> for MissionsCliError {
    fn from(e: io::Error) -> Self {
        MissionsCliError::Io(e)
    }
}

impl From<MissionError> for MissionsCliError {
    fn from(e: MissionError) -> Self {
        MissionsCliError::Mission(e)
    }
}

impl From<serde_json::Error> for MissionsCliError {
    fn from(e: serde_json::Error) -> Self {
        MissionsCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<MissionsCliError> for CliError {
    fn from(e: MissionsCliError) -> Self {
        match e {
            MissionsCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            MissionsCliError::Mission(e) => {
                let (code, hint) = match &e {
                    MissionError::EmptyCatalog => {
                        ("EMPTY_CATALOG", "Add at least one mission to the configuration")
                    }
                    MissionError::InvalidCatalog(_) | MissionError::InvalidConfig(_) => {
                        ("CONFIG_ERROR", "Run 'missions doctor --config <file>' for details")
                    }
                    MissionError::InvalidFrame(_) => {
                        ("FRAME_ERROR", "Frames must be raw RGBA8 with 4 * width * height bytes")
                    }
                    MissionError::JsonError(_) => ("JSON_ERROR", "Check JSON syntax"),
                    _ => ("STATE_ERROR", "Run 'missions doctor' to inspect the state file"),
                };
                CliError {
                    code: code.to_string(),
                    message: e.to_string(),
                    hint: Some(hint.to_string()),
                }
            }
            MissionsCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: None,
            },
            MissionsCliError::InvalidTime(msg) => CliError {
                code: "INVALID_TIME".to_string(),
                message: msg,
                hint: Some("Use RFC 3339, e.g. 2024-01-15T09:30:00Z".to_string()),
            },
            MissionsCliError::DoctorFailed => CliError {
                code: "DOCTOR_FAILED".to_string(),
                message: "One or more health checks failed".to_string(),
                hint: Some("Review the doctor report for details".to_string()),
            },
        }
    }
}

// Report types

#[derive(serde::Serialize)]
struct TodayReport {
    date: String,
    day: i64,
    mission: MissionDefinition,
    expires_at: DateTime<Utc>,
}

#[derive(serde::Serialize)]
struct ProgressReport {
    update: &'static str,
    status: EngineSnapshot,
}

#[derive(serde::Serialize)]
struct ClassifyReport {
    target: f32,
    ratio: f32,
    sample_width: u32,
    sample_height: u32,
}

#[derive(serde::Serialize)]
struct EvaluateReport {
    outcome: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    ratio: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    progress: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    update: Option<&'static str>,
    status: EngineSnapshot,
}

#[derive(serde::Serialize)]
struct DoctorReport {
    version: String,
    checked_at: DateTime<Utc>,
    checks: Vec<DoctorCheck>,
}

#[derive(serde::Serialize)]
struct DoctorCheck {
    name: String,
    status: CheckStatus,
    message: String,
}

#[derive(serde::Serialize)]
enum CheckStatus {
    Ok,
    Warning,
    Error,
}
