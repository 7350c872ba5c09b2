use std::fmt;
use std::time::Duration;

use gateway::{Gateway, GatewayConfig, InMemoryAssessmentService};
use hubx_core::model::AssessmentId;
use services::{AssessmentSessionController, Clock, SessionSettings, TimeoutPolicy};
use tracing_subscriber::EnvFilter;

mod shell;

#[derive(Debug, PartialEq, Eq)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidLatency { raw: String },
    MissingAssessment,
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidLatency { raw } => write!(f, "invalid --latency-ms value: {raw}"),
            ArgsError::MissingAssessment => {
                write!(
                    f,
                    "no assessment to take: pass --assessment-id or set HUBX_ASSESSMENT_ID \
                     (required with --api or when the sample catalogue is empty)"
                )
            }
        }
    }
}

impl std::error::Error for ArgsError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p app -- take [--assessment-id <id>] [--api <url>] [--auto-submit] [--latency-ms <ms>]");
    eprintln!("  cargo run -p app -- list");
    eprintln!();
    eprintln!("Without --api the bundled sample assessments are served in memory.");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  HUBX_ASSESSMENT_ID, HUBX_API_URL, HUBX_API_TOKEN, HUBX_TICK_MS, HUBX_AUTO_SUBMIT, HUBX_LOG");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Take,
    List,
}

impl Command {
    fn from_arg(arg: &str) -> Option<Self> {
        match arg {
            "take" => Some(Self::Take),
            "list" => Some(Self::List),
            _ => None,
        }
    }
}

struct Args {
    assessment_id: Option<AssessmentId>,
    api_url: Option<String>,
    auto_submit: bool,
    latency: Duration,
}

impl Args {
    fn parse(args: &mut impl Iterator<Item = String>) -> Result<Self, ArgsError> {
        let mut assessment_id = std::env::var("HUBX_ASSESSMENT_ID")
            .ok()
            .map(AssessmentId::new)
            .filter(|id| !id.is_blank());
        let mut api_url = None;
        let mut auto_submit = false;
        let mut latency = Duration::from_millis(400);

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--assessment-id" => {
                    assessment_id = Some(AssessmentId::new(require_value(args, "--assessment-id")?));
                }
                "--api" => api_url = Some(require_value(args, "--api")?),
                "--auto-submit" => auto_submit = true,
                "--latency-ms" => {
                    let value = require_value(args, "--latency-ms")?;
                    let ms: u64 = value
                        .parse()
                        .map_err(|_| ArgsError::InvalidLatency { raw: value.clone() })?;
                    latency = Duration::from_millis(ms);
                }
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(Self {
            assessment_id,
            api_url,
            auto_submit,
            latency,
        })
    }
}

/// The explicit id wins; otherwise the first sample assessment is taken.
fn pick_assessment(
    explicit: Option<AssessmentId>,
    available: &[AssessmentId],
) -> Result<AssessmentId, ArgsError> {
    match explicit {
        Some(id) => Ok(id),
        None => available.first().cloned().ok_or(ArgsError::MissingAssessment),
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("HUBX_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut argv: Vec<String> = std::env::args().skip(1).collect();

    let cmd = match argv.first().map(String::as_str) {
        None => Command::Take,
        Some("--help" | "-h") => {
            print_usage();
            return Ok(());
        }
        Some(first) if first.starts_with("--") => Command::Take,
        Some(first) => Command::from_arg(first).ok_or_else(|| {
            eprintln!("unknown subcommand: {first}");
            print_usage();
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "unknown subcommand")
        })?,
    };
    if !argv.is_empty() && !argv[0].starts_with("--") {
        argv.remove(0);
    }

    let parsed = Args::parse(&mut argv.into_iter()).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    let mut settings = SessionSettings::from_env()?;
    if parsed.auto_submit {
        settings = settings.with_timeout_policy(TimeoutPolicy::AutoSubmit);
    }

    let api = match parsed.api_url.as_deref() {
        Some(url) => Some(GatewayConfig::new(url)?),
        None => GatewayConfig::from_env()?,
    };

    let (gateway, catalogue) = match api {
        Some(config) => {
            tracing::info!(base_url = %config.base_url, "using remote assessment API");
            (Gateway::http(config), None)
        }
        None => {
            let service = InMemoryAssessmentService::with_sample_catalogue()?
                .with_latency(parsed.latency / 2, parsed.latency);
            (Gateway::in_memory(service.clone()), Some(service))
        }
    };

    let available = match catalogue.as_ref() {
        Some(service) => service.assessment_ids()?,
        None => Vec::new(),
    };

    if cmd == Command::List {
        if available.is_empty() {
            eprintln!("list is only available for the in-memory sample catalogue");
        }
        for id in &available {
            println!("{id}");
        }
        return Ok(());
    }

    let assessment_id = pick_assessment(parsed.assessment_id, &available)?;

    let controller = AssessmentSessionController::new(Clock::default(), gateway, settings);
    shell::run(&controller, assessment_id).await?;
    Ok(())
}

#[tokio::main]
async fn main() {
    init_tracing();
    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
