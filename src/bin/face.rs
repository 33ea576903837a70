//! Face CLI - Command-line interface for Synheart Face
//!
//! Commands:
//! - replay: Run a recorded frame stream through the capture protocol
//! - validate: Validate a recorded frame stream
//! - doctor: Diagnose configuration and record store
//! - schema: Print input/output schema information

use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use synheart_face::adapters::blendshape::names;
use synheart_face::adapters::{ReplayClassifier, ReplaySource};
use synheart_face::encoder::RECORD_FORMAT_VERSION;
use synheart_face::schema::{FrameStreamAdapter, RecordedFrame, FRAME_SCHEMA_VERSION};
use synheart_face::{
    run_session, FileRecordStore, MemoryRecordStore, ProtocolConfig, RecordEncoder, Subject,
    UploadStatus,
};
use synheart_face::{FACE_VERSION, PRODUCER_NAME};

/// Face - Guided facial expression capture and biomarker derivation
#[derive(Parser)]
#[command(name = "face")]
#[command(author = "Synheart AI Inc")]
#[command(version = FACE_VERSION)]
#[command(about = "Replay and inspect guided facial expression captures", long_about = None)]
struct Cli {
    /// Enable debug logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a recorded frame stream through the capture protocol
    Replay {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Input format
        #[arg(long, default_value = "ndjson")]
        input_format: InputFormat,

        /// Subject name
        #[arg(long)]
        name: String,

        /// Subject age in years (1-120)
        #[arg(long)]
        age: i64,

        /// Protocol configuration file (JSON); defaults apply when omitted
        #[arg(long)]
        config: Option<PathBuf>,

        /// Append the record to this NDJSON store
        #[arg(long)]
        store: Option<PathBuf>,

        /// Output format
        #[arg(long, default_value = "json-pretty")]
        output_format: OutputFormat,
    },

    /// Validate a recorded frame stream
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

    /// Diagnose configuration and record store
    Doctor {
        /// Check a protocol configuration file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Check a record store file
        #[arg(long)]
        store: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print schema information
    Schema {
        /// Schema to print (input or output)
        #[arg(value_enum)]
        schema_type: SchemaType,

        /// Output as JSON schema
        #[arg(long)]
        json_schema: bool,
    },
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
    /// Single-line JSON record, suitable for appending to NDJSON
    Ndjson,
    /// Pretty-printed JSON record
    JsonPretty,
}

#[derive(Clone, ValueEnum)]
enum SchemaType {
    /// Input schema (face.frame.v1)
    Input,
    /// Output schema (face.record.v1)
    Output,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

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

fn run(cli: Cli) -> Result<(), FaceCliError> {
    match cli.command {
        Commands::Replay {
            input,
            input_format,
            name,
            age,
            config,
            store,
            output_format,
        } => cmd_replay(
            &input,
            input_format,
            &name,
            age,
            config.as_deref(),
            store.as_deref(),
            output_format,
        ),

        Commands::Validate {
            input,
            input_format,
            json,
        } => cmd_validate(&input, input_format, json),

        Commands::Doctor {
            config,
            store,
            json,
        } => cmd_doctor(config.as_deref(), store.as_deref(), json),

        Commands::Schema {
            schema_type,
            json_schema,
        } => cmd_schema(schema_type, json_schema),
    }
}

fn cmd_replay(
    input: &Path,
    input_format: InputFormat,
    name: &str,
    age: i64,
    config: Option<&Path>,
    store: Option<&Path>,
    output_format: OutputFormat,
) -> Result<(), FaceCliError> {
    let subject = Subject::new(name, age)?;
    let config = load_config(config)?;

    let frames = read_frames(input, &input_format)?;
    if frames.is_empty() {
        return Err(FaceCliError::NoFrames);
    }
    if let Some(invalid) = FrameStreamAdapter::validate_frames(&frames).into_iter().next() {
        return Err(FaceCliError::Validation(invalid.error));
    }

    let mut source = ReplaySource::new(frames);
    let classifier = ReplayClassifier::new();

    match store {
        Some(path) => {
            let mut file_store = FileRecordStore::new(path);
            let outcome = run_session(subject, &mut source, classifier, &mut file_store, config)?;
            match (outcome.upload, file_store.last_saved()) {
                (UploadStatus::Saved(id), Some(stored)) => {
                    println!("{}", format_output(stored, &output_format)?);
                    log::info!("record {id} appended to {}", path.display());
                    Ok(())
                }
                (UploadStatus::Saved(id), None) => {
                    log::warn!("record {id} saved but not retained for output");
                    let envelope = RecordEncoder::new().encode(&outcome.record);
                    println!("{}", format_output(&envelope, &output_format)?);
                    Ok(())
                }
                (UploadStatus::Failed(e), _) => {
                    let envelope = RecordEncoder::new().encode(&outcome.record);
                    println!("{}", format_output(&envelope, &output_format)?);
                    Err(FaceCliError::Store(e))
                }
            }
        }
        None => {
            let mut memory_store = MemoryRecordStore::new();
            let outcome = run_session(subject, &mut source, classifier, &mut memory_store, config)?;
            let envelope = RecordEncoder::new().encode(&outcome.record);
            println!("{}", format_output(&envelope, &output_format)?);
            Ok(())
        }
    }
}

fn cmd_validate(input: &Path, input_format: InputFormat, json: bool) -> Result<(), FaceCliError> {
    let frames = read_frames(input, &input_format)?;
    let results = FrameStreamAdapter::validate_frames(&frames);

    let detected = frames.iter().filter(|f| f.action_units.is_some()).count();
    let report = ValidationReport {
        total_frames: frames.len(),
        valid_frames: frames.len() - results.len(),
        invalid_frames: results.len(),
        frames_with_face: detected,
        duration_ms: match (frames.first(), frames.last()) {
            (Some(first), Some(last)) => (last.t_ms - first.t_ms).max(0.0),
            _ => 0.0,
        },
        errors: results
            .iter()
            .map(|r| ValidationErrorDetail {
                index: r.index,
                t_ms: r.t_ms,
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
        println!("Duration:         {:.0} ms", report.duration_ms);

        if !report.errors.is_empty() {
            println!("\nErrors:");
            for err in &report.errors {
                println!("  - Frame {} (t={} ms): {}", err.index, err.t_ms, err.error);
            }
        }
    }

    if report.invalid_frames > 0 {
        Err(FaceCliError::ValidationFailed(report.invalid_frames))
    } else {
        Ok(())
    }
}

fn cmd_doctor(config: Option<&Path>, store: Option<&Path>, json: bool) -> Result<(), FaceCliError> {
    let mut checks: Vec<DoctorCheck> = Vec::new();

    checks.push(DoctorCheck {
        name: "face_version".to_string(),
        status: CheckStatus::Ok,
        message: format!("Face version {}", FACE_VERSION),
    });

    checks.push(DoctorCheck {
        name: "schema_version".to_string(),
        status: CheckStatus::Ok,
        message: format!(
            "Input schema: {}, output schema: {}",
            FRAME_SCHEMA_VERSION, RECORD_FORMAT_VERSION
        ),
    });

    if let Some(config_path) = config {
        let check = match fs::read_to_string(config_path) {
            Ok(content) => match ProtocolConfig::from_json(&content) {
                Ok(config) => DoctorCheck {
                    name: "config".to_string(),
                    status: CheckStatus::Ok,
                    message: format!(
                        "Config valid (task {} ms, reset timeout {} ms)",
                        config.task_duration_ms, config.reset_timeout_ms
                    ),
                },
                Err(e) => DoctorCheck {
                    name: "config".to_string(),
                    status: CheckStatus::Error,
                    message: format!("Invalid config: {}", e),
                },
            },
            Err(e) => DoctorCheck {
                name: "config".to_string(),
                status: CheckStatus::Error,
                message: format!("Cannot read config file: {}", e),
            },
        };
        checks.push(check);
    } else {
        checks.push(DoctorCheck {
            name: "config".to_string(),
            status: CheckStatus::Ok,
            message: "Using built-in protocol constants".to_string(),
        });
    }

    if let Some(store_path) = store {
        let check = if store_path.exists() {
            match FileRecordStore::new(store_path).load_all() {
                Ok(records) => DoctorCheck {
                    name: "store".to_string(),
                    status: CheckStatus::Ok,
                    message: format!("Record store valid ({} records)", records.len()),
                },
                Err(e) => DoctorCheck {
                    name: "store".to_string(),
                    status: CheckStatus::Error,
                    message: format!("Unreadable record store: {}", e),
                },
            }
        } else {
            DoctorCheck {
                name: "store".to_string(),
                status: CheckStatus::Warning,
                message: "Record store does not exist yet (created on first save)".to_string(),
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
            message: "stdin is a pipe (replay from - ready)".to_string(),
        }
    };
    checks.push(stdin_check);

    let report = DoctorReport {
        producer: PRODUCER_NAME.to_string(),
        version: FACE_VERSION.to_string(),
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Face Doctor Report");
        println!("==================");
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
        Err(FaceCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

fn cmd_schema(schema_type: SchemaType, json_schema: bool) -> Result<(), FaceCliError> {
    match schema_type {
        SchemaType::Input => {
            if json_schema {
                println!("{}", get_input_json_schema());
            } else {
                println!("Input Schema: {}", FRAME_SCHEMA_VERSION);
                println!();
                println!("One JSON object per sampled camera frame:");
                println!();
                println!("- schema_version: \"{}\" (optional)", FRAME_SCHEMA_VERSION);
                println!("- t_ms: monotonic capture time in ms, strictly increasing");
                println!("- action_units: named classifier scores in [0, 1], or absent when no face was detected");
                println!();
                println!("Action units read by the protocol:");
                for name in names::ALL {
                    println!("  - {}", name);
                }
                println!();
                println!("Missing action units read as 0.");
            }
        }
        SchemaType::Output => {
            if json_schema {
                println!("{}", get_output_json_schema());
            } else {
                println!("Output Schema: {}", RECORD_FORMAT_VERSION);
                println!();
                println!("Record envelope contains:");
                println!();
                println!("- format_version: Envelope version ({})", RECORD_FORMAT_VERSION);
                println!("- producer: {{ name, version, instance_id }}");
                println!("- computed_at_utc, platform");
                println!("- record:");
                println!("  - subject: {{ name, age }}");
                println!("  - biomarkers:");
                println!("    - baseline_stability (0-1, lower is steadier)");
                println!("    - smile_metrics: {{ peak_intensity, latency_ms, symmetry }}");
                println!("    - frown_metrics: {{ peak_intensity, latency_ms }}");
                println!("    - blink_rate (events per minute)");
                println!("  - summary: \"normal\" | \"recommend professional consultation\"");
                println!("  - flags: failed checks (baseline, smile, frown, symmetry)");
            }
        }
    }

    Ok(())
}

// Helper functions

fn read_input(input: &Path) -> Result<String, FaceCliError> {
    if input.to_string_lossy() == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    } else {
        Ok(fs::read_to_string(input)?)
    }
}

fn read_frames(input: &Path, input_format: &InputFormat) -> Result<Vec<RecordedFrame>, FaceCliError> {
    let input_data = read_input(input)?;
    let frames = match input_format {
        InputFormat::Ndjson => FrameStreamAdapter::parse_ndjson(&input_data)?,
        InputFormat::Json => FrameStreamAdapter::parse_array(&input_data)?,
    };
    Ok(frames)
}

fn load_config(path: Option<&Path>) -> Result<ProtocolConfig, FaceCliError> {
    match path {
        Some(path) => Ok(ProtocolConfig::from_json(&fs::read_to_string(path)?)?),
        None => Ok(ProtocolConfig::default()),
    }
}

fn format_output<T: serde::Serialize>(
    value: &T,
    format: &OutputFormat,
) -> Result<String, FaceCliError> {
    match format {
        OutputFormat::Ndjson => Ok(serde_json::to_string(value)?),
        OutputFormat::JsonPretty => Ok(serde_json::to_string_pretty(value)?),
    }
}

fn get_input_json_schema() -> String {
    let action_units: serde_json::Map<String, serde_json::Value> = names::ALL
        .iter()
        .map(|name| {
            (
                name.to_string(),
                serde_json::json!({ "type": "number", "minimum": 0, "maximum": 1 }),
            )
        })
        .collect();

    serde_json::json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "$id": "https://synheart.ai/schemas/face.frame.v1.json",
        "title": FRAME_SCHEMA_VERSION,
        "description": "Synheart recorded face classifier frame",
        "type": "object",
        "required": ["t_ms"],
        "properties": {
            "schema_version": {
                "type": "string",
                "const": FRAME_SCHEMA_VERSION
            },
            "t_ms": { "type": "number", "minimum": 0 },
            "action_units": {
                "type": ["object", "null"],
                "properties": action_units,
                "additionalProperties": { "type": "number", "minimum": 0, "maximum": 1 }
            }
        }
    })
    .to_string()
}

fn get_output_json_schema() -> String {
    let metric = serde_json::json!({ "type": "number", "minimum": 0, "maximum": 1 });

    serde_json::json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "$id": "https://synheart.ai/schemas/face.record.v1.json",
        "title": RECORD_FORMAT_VERSION,
        "description": "Synheart face biomarker record envelope",
        "type": "object",
        "required": ["format_version", "producer", "computed_at_utc", "platform", "record"],
        "properties": {
            "format_version": { "type": "string", "const": RECORD_FORMAT_VERSION },
            "producer": {
                "type": "object",
                "properties": {
                    "name": { "type": "string" },
                    "version": { "type": "string" },
                    "instance_id": { "type": "string" }
                }
            },
            "computed_at_utc": { "type": "string", "format": "date-time" },
            "platform": { "type": "string" },
            "record": {
                "type": "object",
                "required": ["subject", "biomarkers", "summary", "flags"],
                "properties": {
                    "subject": {
                        "type": "object",
                        "properties": {
                            "name": { "type": "string", "minLength": 1 },
                            "age": { "type": "integer", "minimum": 1, "maximum": 120 }
                        }
                    },
                    "biomarkers": {
                        "type": "object",
                        "properties": {
                            "baseline_stability": metric,
                            "smile_metrics": {
                                "type": "object",
                                "properties": {
                                    "peak_intensity": metric,
                                    "latency_ms": { "type": "integer", "minimum": 0 },
                                    "symmetry": metric
                                }
                            },
                            "frown_metrics": {
                                "type": "object",
                                "properties": {
                                    "peak_intensity": metric,
                                    "latency_ms": { "type": "integer", "minimum": 0 }
                                }
                            },
                            "blink_rate": { "type": "number", "minimum": 0 }
                        }
                    },
                    "summary": {
                        "type": "string",
                        "enum": ["normal", "recommend professional consultation"]
                    },
                    "flags": {
                        "type": "array",
                        "items": { "type": "string", "enum": ["baseline", "smile", "frown", "symmetry"] }
                    }
                }
            }
        }
    })
    .to_string()
}

// Error types

#[derive(Debug)]
enum FaceCliError {
    Io(io::Error),
    Capture(synheart_face::CaptureError),
    Json(serde_json::Error),
    Validation(synheart_face::schema::ValidationError),
    Store(synheart_face::StoreError),
    NoFrames,
    ValidationFailed(usize),
    DoctorFailed,
}

impl From<io::Error> for FaceCliError {
    fn from(e: io::Error) -> Self {
        FaceCliError::Io(e)
    }
}

impl From<synheart_face::CaptureError> for FaceCliError {
    fn from(e: synheart_face::CaptureError) -> Self {
        FaceCliError::Capture(e)
    }
}

impl From<serde_json::Error> for FaceCliError {
    fn from(e: serde_json::Error) -> Self {
        FaceCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<FaceCliError> for CliError {
    fn from(e: FaceCliError) -> Self {
        use synheart_face::CaptureError;

        match e {
            FaceCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            FaceCliError::Capture(e) => {
                let (code, hint) = match &e {
                    CaptureError::InvalidSubject(_) => {
                        ("INVALID_SUBJECT", "Provide a non-empty name and an age between 1 and 120")
                    }
                    CaptureError::InvalidConfig(_) => {
                        ("INVALID_CONFIG", "Run 'face doctor --config <file>' for details")
                    }
                    CaptureError::Acquisition(_) => {
                        ("ACQUISITION_FAILED", "Check that the recording contains frames")
                    }
                    CaptureError::SourceExhausted(_) => (
                        "RECORDING_TOO_SHORT",
                        "The recording ended before the protocol finished",
                    ),
                    _ => ("PARSE_ERROR", "Ensure input matches the face.frame.v1 schema"),
                };
                CliError {
                    code: code.to_string(),
                    message: e.to_string(),
                    hint: Some(hint.to_string()),
                }
            }
            FaceCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            FaceCliError::Validation(e) => CliError {
                code: "VALIDATION_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Run 'face validate' for details".to_string()),
            },
            FaceCliError::Store(e) => CliError {
                code: "STORE_FAILED".to_string(),
                message: e.to_string(),
                hint: Some("The record was printed but not stored".to_string()),
            },
            FaceCliError::NoFrames => CliError {
                code: "NO_FRAMES".to_string(),
                message: "No frames found in input".to_string(),
                hint: Some("Ensure input file is not empty".to_string()),
            },
            FaceCliError::ValidationFailed(count) => CliError {
                code: "VALIDATION_FAILED".to_string(),
                message: format!("{} frames failed validation", count),
                hint: Some("Fix validation errors and retry".to_string()),
            },
            FaceCliError::DoctorFailed => CliError {
                code: "DOCTOR_FAILED".to_string(),
                message: "One or more health checks failed".to_string(),
                hint: Some("Review the doctor report for details".to_string()),
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
    duration_ms: f64,
    errors: Vec<ValidationErrorDetail>,
}

#[derive(serde::Serialize)]
struct ValidationErrorDetail {
    index: usize,
    t_ms: f64,
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
