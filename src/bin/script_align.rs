use std::path::PathBuf;
use std::time::Duration;

use chrono::Utc;
use clap::{Parser, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use script_align_rs::alignment::report::{build_report, Meta};
use script_align_rs::input::{load_reference, load_transcript};
use script_align_rs::{
    AlignerConfig, AlignmentInput, InsertionPolicy, PipelineStage, SubtitleAlignerBuilder,
    TrackFormat,
};

#[path = "script_align/output_writer.rs"]
mod output_writer;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum FormatChoice {
    Ass,
    Srt,
    Vtt,
}

impl FormatChoice {
    fn track_format(self) -> TrackFormat {
        match self {
            Self::Ass => TrackFormat::Ass,
            Self::Srt => TrackFormat::Srt,
            Self::Vtt => TrackFormat::Vtt,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum PolicyChoice {
    Keep,
    DropUnsupported,
    DropAll,
}

impl PolicyChoice {
    fn insertion_policy(self) -> InsertionPolicy {
        match self {
            Self::Keep => InsertionPolicy::Keep,
            Self::DropUnsupported => InsertionPolicy::DropUnsupported,
            Self::DropAll => InsertionPolicy::DropAll,
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "script_align")]
#[command(about = "Retime an OCR reference script against a timestamped transcript")]
struct Args {
    /// Transcription JSON (segment array or `{"segments": [...]}`, times in seconds).
    #[arg(long, env = "SCRIPT_ALIGN_TRANSCRIPT")]
    transcript: PathBuf,
    /// Reference script, one dialogue line per text line.
    #[arg(long, env = "SCRIPT_ALIGN_REFERENCE")]
    reference: PathBuf,
    #[arg(long, env = "SCRIPT_ALIGN_OUTPUT", default_value = "aligned.ass")]
    output: PathBuf,
    /// Track format; inferred from the output extension when omitted.
    #[arg(long, value_enum, env = "SCRIPT_ALIGN_FORMAT")]
    format: Option<FormatChoice>,
    /// Aligner settings as JSON. Flags below override file values.
    #[arg(long, env = "SCRIPT_ALIGN_CONFIG")]
    config: Option<PathBuf>,
    #[arg(long, env = "SCRIPT_ALIGN_WINDOW_LINES")]
    window_lines: Option<usize>,
    #[arg(long, env = "SCRIPT_ALIGN_MIN_LINE_MS")]
    min_line_ms: Option<u64>,
    #[arg(long, value_enum, env = "SCRIPT_ALIGN_INSERTION_POLICY")]
    insertion_policy: Option<PolicyChoice>,
    /// Semantic matching service endpoint. Fuzzy matching only when omitted.
    #[arg(long, env = "SCRIPT_ALIGN_ORACLE_URL")]
    oracle_url: Option<String>,
    #[arg(long, env = "SCRIPT_ALIGN_ORACLE_API_KEY", hide_env_values = true)]
    oracle_api_key: Option<String>,
    #[arg(long, env = "SCRIPT_ALIGN_ORACLE_TIMEOUT_SECS", default_value_t = 30)]
    oracle_timeout_secs: u64,
    #[arg(long, env = "SCRIPT_ALIGN_ORACLE_CONCURRENCY")]
    oracle_concurrency: Option<usize>,
    /// Fail instead of degrading to fuzzy matching when the oracle quota runs out.
    #[arg(long, env = "SCRIPT_ALIGN_ABORT_ON_ORACLE_QUOTA")]
    abort_on_oracle_quota: bool,
    /// Optional JSON diagnostics report.
    #[arg(long, env = "SCRIPT_ALIGN_REPORT")]
    report: Option<PathBuf>,
}

fn main() {
    init_logging();
    if let Err(err) = run() {
        tracing::error!("{err}");
        std::process::exit(1);
    }
}

fn init_logging() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

fn run() -> Result<(), String> {
    let args = Args::parse();
    let config = resolve_config(&args)?;
    let format = args
        .format
        .map(FormatChoice::track_format)
        .or_else(|| TrackFormat::from_path(&args.output))
        .unwrap_or_default();

    let segments = load_transcript(&args.transcript).map_err(|err| {
        format!(
            "Failed to load transcript '{}': {err}",
            args.transcript.display()
        )
    })?;
    let lines = load_reference(&args.reference).map_err(|err| {
        format!(
            "Failed to load reference script '{}': {err}",
            args.reference.display()
        )
    })?;
    tracing::info!(
        segments = segments.len(),
        lines = lines.len(),
        format = %format,
        "inputs loaded"
    );

    let mut builder = SubtitleAlignerBuilder::new(config.clone());
    if let Some(url) = args.oracle_url.as_deref().filter(|url| !url.trim().is_empty()) {
        builder = builder.with_oracle(build_oracle(url, &args)?);
    }
    let aligner = builder.build().map_err(|err| err.to_string())?;

    let progress = ProgressBar::new_spinner();
    progress.set_style(
        ProgressStyle::with_template("[{elapsed_precise}] {spinner} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    progress.enable_steady_tick(Duration::from_millis(120));

    let input = AlignmentInput { segments, lines };
    let result = aligner.align_observed(&input, &mut |stage| {
        progress.set_message(stage.as_str());
    });
    let output = match result {
        Ok(output) => output,
        Err(err) => {
            progress.abandon_with_message("alignment failed");
            return Err(err.to_string());
        }
    };

    progress.set_message(PipelineStage::Emit.as_str());
    let track = aligner
        .render(&output.entries, format)
        .map_err(|err| err.to_string())?;
    output_writer::write_atomic(&args.output, track.as_bytes())?;
    progress.finish_with_message("alignment complete");

    if let Some(report_path) = &args.report {
        let meta = Meta {
            generated_at: Utc::now().to_rfc3339(),
            transcript_path: args.transcript.display().to_string(),
            reference_path: args.reference.display().to_string(),
            output_format: format.to_string(),
            oracle: aligner.oracle_label(),
            config: config.clone(),
        };
        let report = build_report(meta, &output, config.min_line_duration_ms)
            .map_err(|err| err.to_string())?;
        output_writer::write_report(report_path, &report)?;
    }

    tracing::info!(
        output = %args.output.display(),
        entries = output.entries.len(),
        matched = output.summary.matched_count,
        interpolated = output.summary.interpolated_count,
        dropped = output.summary.dropped_count,
        warnings = output.warnings.len(),
        global_score = output.summary.global_score,
        "subtitle track written"
    );
    Ok(())
}

fn resolve_config(args: &Args) -> Result<AlignerConfig, String> {
    let mut config = match &args.config {
        Some(path) => AlignerConfig::load(path)
            .map_err(|err| format!("Failed to load config '{}': {err}", path.display()))?,
        None => AlignerConfig::default(),
    };
    if let Some(window_lines) = args.window_lines {
        config.window_lines = window_lines;
    }
    if let Some(min_line_ms) = args.min_line_ms {
        config.min_line_duration_ms = min_line_ms;
    }
    if let Some(policy) = args.insertion_policy {
        config.insertion_policy = policy.insertion_policy();
    }
    if let Some(concurrency) = args.oracle_concurrency {
        config.oracle_concurrency = concurrency;
    }
    if args.abort_on_oracle_quota {
        config.abort_on_oracle_quota = true;
    }
    config.validate().map_err(|err| err.to_string())?;
    Ok(config)
}

#[cfg(feature = "http-oracle")]
fn build_oracle(
    url: &str,
    args: &Args,
) -> Result<Box<dyn script_align_rs::SemanticOracle>, String> {
    use script_align_rs::oracle::http::{HttpOracle, HttpOracleConfig};

    let oracle_config = HttpOracleConfig::new(url)
        .with_api_key(args.oracle_api_key.clone())
        .with_timeout(Duration::from_secs(args.oracle_timeout_secs.max(1)));
    let oracle = HttpOracle::new(oracle_config).map_err(|err| err.to_string())?;
    Ok(Box::new(oracle))
}

#[cfg(not(feature = "http-oracle"))]
fn build_oracle(
    _url: &str,
    _args: &Args,
) -> Result<Box<dyn script_align_rs::SemanticOracle>, String> {
    Err("--oracle-url requires the 'http-oracle' feature".to_string())
}
