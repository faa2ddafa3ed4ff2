//! Drowsy CLI - Command-line interface for Synheart Drowsiness
//!
//! Commands:
//! - run: Process streaming landmark frames from stdin (streaming mode)
//! - transform: Process a recorded landmark file (batch mode)
//! - validate: Validate landmark frame schema
//! - doctor: Diagnose configuration and environment
//! - config: Print the effective configuration

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::fs;
use std::io::{self, BufRead, Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use synheart_drowsiness::alarm::{NullAlarm, TerminalBellAlarm};
use synheart_drowsiness::config::{ProcessorConfig, ENV_OVERRIDES};
use synheart_drowsiness::pipeline::{DrowsinessProcessor, SessionSummary};
use synheart_drowsiness::schema::{FrameAdapter, LandmarkFrame, SCHEMA_VERSION};
use synheart_drowsiness::session_log::{CsvFrameLog, NdjsonFrameLog};
use synheart_drowsiness::types::FrameReport;
use synheart_drowsiness::{DROWSY_VERSION, PRODUCER_NAME};

/// Drowsy - On-device drowsiness and yawn detection from landmark streams
#[derive(Parser)]
#[command(name = "drowsy")]
#[command(author = "Synheart AI Inc")]
#[command(version = DROWSY_VERSION)]
#[command(about = "Detect blinks, yawns and drowsiness from facial landmarks", long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(long, global = true, env = "DROWSY_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Process streaming landmark frames from stdin (streaming mode)
    Run {
        /// Write the per-frame session log to this file
        #[arg(long)]
        log: Option<PathBuf>,

        /// Session log format
        #[arg(long, default_value = "csv")]
        log_format: LogFormat,

        /// Do not ring the terminal bell on alarm
        #[arg(long)]
        no_alarm: bool,

        /// Load detector state from file before processing
        #[arg(long)]
        load_state: Option<PathBuf>,

        /// Save detector state to file on exit
        #[arg(long)]
        save_state: Option<PathBuf>,

        /// Flush output after each report (`--flush false` to buffer)
        #[arg(long, default_value_t = true, action = ArgAction::Set)]
        flush: bool,
    },

    /// Process a recorded landmark file (batch mode)
    Transform {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Report output file path (use - for stdout)
        #[arg(short, long)]
        output: PathBuf,

        /// Input format
        #[arg(long, default_value = "ndjson")]
        input_format: InputFormat,

        /// Output format
        #[arg(long, default_value = "ndjson")]
        output_format: OutputFormat,

        /// Write the per-frame session log to this file
        #[arg(long)]
        log: Option<PathBuf>,

        /// Session log format
        #[arg(long, default_value = "csv")]
        log_format: LogFormat,

        /// Print the session summary to stderr when done
        #[arg(long)]
        summary: bool,
    },

    /// Validate landmark frame schema
    Validate {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Input format
        #[arg(long, default_value = "ndjson")]
        input_format: InputFormat,

        /// Output validation report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Diagnose configuration and environment
    Doctor {
        /// Check a saved state file
        #[arg(long)]
        state: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the effective configuration as TOML
    Config,
}

#[derive(Clone, ValueEnum)]
enum InputFormat {
    /// Newline-delimited JSON (one frame per line)
    Ndjson,
    /// JSON array of frames
    Json,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Newline-delimited JSON (one report per line)
    Ndjson,
    /// JSON array of reports
    Json,
    /// Pretty-printed JSON
    JsonPretty,
}

#[derive(Clone, ValueEnum)]
enum LogFormat {
    /// CSV with a header row
    Csv,
    /// Newline-delimited JSON with a session header line
    Ndjson,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e))
                    .unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), DrowsyCliError> {
    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Run {
            log,
            log_format,
            no_alarm,
            load_state,
            save_state,
            flush,
        } => {
            let config = ProcessorConfig::load_from(config_path)?;
            cmd_run(
                &config,
                log.as_deref(),
                &log_format,
                no_alarm,
                load_state.as_deref(),
                save_state.as_deref(),
                flush,
            )
        }

        Commands::Transform {
            input,
            output,
            input_format,
            output_format,
            log,
            log_format,
            summary,
        } => {
            let config = ProcessorConfig::load_from(config_path)?;
            cmd_transform(
                &config,
                &input,
                &output,
                input_format,
                output_format,
                log.as_deref(),
                &log_format,
                summary,
            )
        }

        Commands::Validate {
            input,
            input_format,
            json,
        } => cmd_validate(&input, input_format, json),

        Commands::Doctor { state, json } => cmd_doctor(config_path, state.as_deref(), json),

        Commands::Config => {
            let config = ProcessorConfig::load_from(config_path)?;
            print!("{}", config.to_toml()?);
            Ok(())
        }
    }
}

/// Build a processor, resuming `saved_state` before the log sink is opened so
/// the log header carries the resumed session id
fn build_processor(
    config: &ProcessorConfig,
    log: Option<&Path>,
    log_format: &LogFormat,
    saved_state: Option<&str>,
) -> Result<DrowsinessProcessor, DrowsyCliError> {
    let mut processor = DrowsinessProcessor::from_config(config);
    if let Some(state_json) = saved_state {
        processor.load_state(state_json)?;
    }
    let processor = match log {
        None => processor,
        Some(path) => match log_format {
            LogFormat::Csv => processor.with_log_sink(CsvFrameLog::create(path)?),
            LogFormat::Ndjson => {
                let sink = NdjsonFrameLog::create(path, processor.session_id())?;
                processor.with_log_sink(sink)
            }
        },
    };
    Ok(processor)
}

fn cmd_run(
    config: &ProcessorConfig,
    log: Option<&Path>,
    log_format: &LogFormat,
    no_alarm: bool,
    load_state: Option<&Path>,
    save_state: Option<&Path>,
    flush: bool,
) -> Result<(), DrowsyCliError> {
    let saved_state = match load_state {
        Some(state_path) => Some(fs::read_to_string(state_path)?),
        None => None,
    };
    let mut processor = build_processor(config, log, log_format, saved_state.as_deref())?;
    processor = if no_alarm {
        processor.with_alarm(NullAlarm)
    } else {
        processor.with_alarm(TerminalBellAlarm::new(config.alert.clone()))
    };

    log::info!("session {} started", processor.session_id());

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = line?;
        let trimmed = line.trim();

        if trimmed.is_empty() {
            continue;
        }

        let frame: LandmarkFrame = serde_json::from_str(trimmed).map_err(|e| {
            DrowsyCliError::ParseError(format!("Failed to parse frame: {}", e))
        })?;

        let report = processor.process_frame(&frame)?;
        writeln!(stdout, "{}", serde_json::to_string(&report)?)?;
        if flush {
            stdout.flush()?;
        }
    }

    processor.flush()?;
    log_summary(&processor.summary());

    if let Some(state_path) = save_state {
        fs::write(state_path, processor.save_state()?)?;
    }

    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn cmd_transform(
    config: &ProcessorConfig,
    input: &Path,
    output: &Path,
    input_format: InputFormat,
    output_format: OutputFormat,
    log: Option<&Path>,
    log_format: &LogFormat,
    summary: bool,
) -> Result<(), DrowsyCliError> {
    let input_data = read_input(input)?;
    let frames = parse_frames(&input_data, &input_format)?;

    if frames.is_empty() {
        return Err(DrowsyCliError::NoFrames);
    }

    let mut processor = build_processor(config, log, log_format, None)?;
    let mut reports: Vec<FrameReport> = Vec::with_capacity(frames.len());
    for frame in &frames {
        reports.push(processor.process_frame(frame)?);
    }
    processor.flush()?;

    let output_data = format_output(&reports, &output_format)?;
    if output.to_string_lossy() == "-" {
        print!("{}", output_data);
    } else {
        fs::write(output, output_data)?;
    }

    let session = processor.summary();
    log_summary(&session);
    if summary {
        eprintln!("{}", serde_json::to_string_pretty(&session)?);
    }

    Ok(())
}

fn cmd_validate(input: &Path, input_format: InputFormat, json: bool) -> Result<(), DrowsyCliError> {
    let input_data = read_input(input)?;
    let frames = parse_frames(&input_data, &input_format)?;

    let results = FrameAdapter::validate_frames(&frames);

    let report = ValidationReport {
        total_frames: frames.len(),
        valid_frames: frames.len() - results.len(),
        invalid_frames: results.len(),
        frames_with_face: frames.iter().filter(|f| f.has_face()).count(),
        errors: results
            .iter()
            .map(|r| ValidationErrorDetail {
                index: r.index,
                error: r.error.to_string(),
            })
            .collect(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Validation Report");
        println!("=================");
        println!("Total frames:     {}", report.total_frames);
        println!("Valid frames:     {}", report.valid_frames);
        println!("Invalid frames:   {}", report.invalid_frames);
        println!("Frames with face: {}", report.frames_with_face);

        if !report.errors.is_empty() {
            println!("\nErrors:");
            for err in &report.errors {
                println!("  - Frame {}: {}", err.index, err.error);
            }
        }
    }

    if report.invalid_frames > 0 {
        Err(DrowsyCliError::ValidationFailed(report.invalid_frames))
    } else {
        Ok(())
    }
}

fn cmd_doctor(
    config_path: Option<&Path>,
    state: Option<&Path>,
    json: bool,
) -> Result<(), DrowsyCliError> {
    let mut checks: Vec<DoctorCheck> = Vec::new();

    checks.push(DoctorCheck {
        name: "version".to_string(),
        status: CheckStatus::Ok,
        message: format!("{} {}", PRODUCER_NAME, DROWSY_VERSION),
    });

    checks.push(DoctorCheck {
        name: "schema_version".to_string(),
        status: CheckStatus::Ok,
        message: format!("Input schema: {}", SCHEMA_VERSION),
    });

    match ProcessorConfig::load_from(config_path) {
        Ok(config) => {
            let source = match config_path {
                Some(path) => path.display().to_string(),
                None => "built-in defaults".to_string(),
            };
            checks.push(DoctorCheck {
                name: "config".to_string(),
                status: CheckStatus::Ok,
                message: format!(
                    "Config valid ({}): EAR < {}, drowsy after {} frames, MAR > {}",
                    source,
                    config.detector.ear_threshold,
                    config.detector.drowsy_frame_threshold,
                    config.detector.mar_threshold
                ),
            });
        }
        Err(e) => checks.push(DoctorCheck {
            name: "config".to_string(),
            status: CheckStatus::Error,
            message: e.to_string(),
        }),
    }

    let overrides: Vec<&str> = ENV_OVERRIDES
        .iter()
        .copied()
        .filter(|key| std::env::var(key).is_ok())
        .collect();
    if !overrides.is_empty() {
        checks.push(DoctorCheck {
            name: "env_overrides".to_string(),
            status: CheckStatus::Warning,
            message: format!("Active overrides: {}", overrides.join(", ")),
        });
    }

    if let Some(state_path) = state {
        let check = if !state_path.exists() {
            DoctorCheck {
                name: "state".to_string(),
                status: CheckStatus::Warning,
                message: "State file does not exist".to_string(),
            }
        } else {
            match fs::read_to_string(state_path) {
                Ok(content) => {
                    let mut probe = DrowsinessProcessor::new();
                    match probe.load_state(&content) {
                        Ok(()) => DoctorCheck {
                            name: "state".to_string(),
                            status: CheckStatus::Ok,
                            message: format!(
                                "State file valid (session {}, {} frames)",
                                probe.session_id(),
                                probe.summary().frames_total
                            ),
                        },
                        Err(e) => DoctorCheck {
                            name: "state".to_string(),
                            status: CheckStatus::Error,
                            message: format!("Invalid state file: {}", e),
                        },
                    }
                }
                Err(e) => DoctorCheck {
                    name: "state".to_string(),
                    status: CheckStatus::Error,
                    message: format!("Cannot read state file: {}", e),
                },
            }
        };
        checks.push(check);
    }

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
            message: "stdin is a pipe (streaming mode ready)".to_string(),
        }
    };
    checks.push(stdin_check);

    let report = DoctorReport {
        producer: PRODUCER_NAME.to_string(),
        version: DROWSY_VERSION.to_string(),
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Drowsy Doctor Report");
        println!("====================");
        println!("Producer: {}", report.producer);
        println!("Version:  {}", report.version);
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

    let has_errors = report
        .checks
        .iter()
        .any(|c| matches!(c.status, CheckStatus::Error));
    if has_errors {
        Err(DrowsyCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

// Helper functions

fn read_input(input: &Path) -> Result<String, DrowsyCliError> {
    if input.to_string_lossy() == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    } else {
        Ok(fs::read_to_string(input)?)
    }
}

fn parse_frames(data: &str, format: &InputFormat) -> Result<Vec<LandmarkFrame>, DrowsyCliError> {
    let frames = match format {
        InputFormat::Ndjson => FrameAdapter::parse_ndjson(data)?,
        InputFormat::Json => FrameAdapter::parse_array(data)?,
    };
    Ok(frames)
}

fn format_output(reports: &[FrameReport], format: &OutputFormat) -> Result<String, DrowsyCliError> {
    match format {
        OutputFormat::Ndjson => {
            let mut lines: Vec<String> = Vec::with_capacity(reports.len());
            for report in reports {
                lines.push(serde_json::to_string(report)?);
            }
            Ok(lines.join("\n") + "\n")
        }
        OutputFormat::Json => Ok(serde_json::to_string(reports)?),
        OutputFormat::JsonPretty => Ok(serde_json::to_string_pretty(reports)?),
    }
}

fn log_summary(summary: &SessionSummary) {
    log::info!(
        "session {}: {} frames ({} skipped), {} blinks, {} yawns, {} alarms",
        summary.session_id,
        summary.frames_total,
        summary.frames_skipped,
        summary.total_blinks,
        summary.total_yawns,
        summary.alarms
    );
}

// Error types

#[derive(Debug)]
enum DrowsyCliError {
    Io(io::Error),
    Compute(synheart_drowsiness::ComputeError),
    Json(serde_json::Error),
    NoFrames,
    ValidationFailed(usize),
    DoctorFailed,
    ParseError(String),
}

impl From<io::Error> for DrowsyCliError {
    fn from(e: io::Error) -> Self {
        DrowsyCliError::Io(e)
    }
}

impl From<synheart_drowsiness::ComputeError> for DrowsyCliError {
    fn from(e: synheart_drowsiness::ComputeError) -> Self {
        DrowsyCliError::Compute(e)
    }
}

impl From<serde_json::Error> for DrowsyCliError {
    fn from(e: serde_json::Error) -> Self {
        DrowsyCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<DrowsyCliError> for CliError {
    fn from(e: DrowsyCliError) -> Self {
        use synheart_drowsiness::ComputeError;

        match e {
            DrowsyCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            DrowsyCliError::Compute(ComputeError::InvalidConfig(msg)) => CliError {
                code: "CONFIG_ERROR".to_string(),
                message: msg,
                hint: Some("Run 'drowsy doctor' to inspect the configuration".to_string()),
            },
            DrowsyCliError::Compute(e) => CliError {
                code: "COMPUTE_ERROR".to_string(),
                message: e.to_string(),
                hint: Some(format!("Ensure input matches {} schema", SCHEMA_VERSION)),
            },
            DrowsyCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            DrowsyCliError::NoFrames => CliError {
                code: "NO_FRAMES".to_string(),
                message: "No frames found in input".to_string(),
                hint: Some("Ensure input file is not empty".to_string()),
            },
            DrowsyCliError::ValidationFailed(count) => CliError {
                code: "VALIDATION_FAILED".to_string(),
                message: format!("{} frames failed validation", count),
                hint: Some("Fix validation errors and retry".to_string()),
            },
            DrowsyCliError::DoctorFailed => CliError {
                code: "DOCTOR_FAILED".to_string(),
                message: "One or more health checks failed".to_string(),
                hint: Some("Review the doctor report for details".to_string()),
            },
            DrowsyCliError::ParseError(msg) => CliError {
                code: "PARSE_ERROR".to_string(),
                message: msg,
                hint: Some("Check input format".to_string()),
            },
        }
    }
}

// Report types

#[derive(serde::Serialize)]
struct ValidationReport {
    total_frames: usize,
    valid_frames: usize,
    invalid_frames: usize,
    frames_with_face: usize,
    errors: Vec<ValidationErrorDetail>,
}

#[derive(serde::Serialize)]
struct ValidationErrorDetail {
    index: usize,
    error: String,
}

#[derive(serde::Serialize)]
struct DoctorReport {
    producer: String,
    version: String,
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
