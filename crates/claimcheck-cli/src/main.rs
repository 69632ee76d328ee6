use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use claimcheck_core::{
    AuditLog, Config, ConfigLoader, SourceSet, TelemetryOptions, TriagePolicy, VerifyOptions,
    init_metrics_from_env, init_telemetry, run_verification_session,
};
use tokio::runtime::Runtime;
use tracing::info;

#[derive(Parser, Debug)]
#[command(
    name = "claimcheck",
    version,
    about = "Verify a claim across news, fact-check and scam lanes"
)]
struct Cli {
    /// Path to a TOML config file (defaults to CLAIMCHECK_CONFIG or ./claimcheck.toml).
    #[arg(long, global = true, env = "CLAIMCHECK_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Verify a single claim and print the final report.
    Check(CheckArgs),
    /// Report which data-source credentials are configured.
    Doctor,
}

#[derive(Args, Debug)]
struct CheckArgs {
    /// Claim, news text or suspicious message to verify.
    claim: String,

    /// Override the configured triage policy.
    #[arg(long, value_enum)]
    policy: Option<PolicyArg>,

    /// Output format of the report.
    #[arg(long, value_enum, default_value_t = OutputFormat::Markdown)]
    format: OutputFormat,

    /// Append the run trace in the given format.
    #[arg(long, value_enum)]
    explain: Option<ExplainFormat>,

    /// Persist the raw trace as `<dir>/<session_id>.json`.
    #[arg(long)]
    trace_dir: Option<PathBuf>,

    /// Optional session ID (a random one is generated otherwise).
    #[arg(long)]
    session: Option<String>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum PolicyArg {
    Multi,
    Single,
}

impl From<PolicyArg> for TriagePolicy {
    fn from(value: PolicyArg) -> Self {
        match value {
            PolicyArg::Multi => TriagePolicy::Multi,
            PolicyArg::Single => TriagePolicy::Single,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Markdown,
    Json,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ExplainFormat {
    Markdown,
    Mermaid,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = ConfigLoader::load(cli.config.clone())?;

    init_telemetry(TelemetryOptions::default().with_level(config.logging.level.clone()))?;
    init_metrics_from_env("claimcheck-cli");

    let rt = Runtime::new()?;
    rt.block_on(async move {
        match cli.command {
            Command::Check(args) => check_command(&config, args).await?,
            Command::Doctor => doctor_command(&config),
        }
        Ok::<(), anyhow::Error>(())
    })?;

    Ok(())
}

async fn check_command(config: &Config, args: CheckArgs) -> Result<()> {
    let credentials = config.credentials();
    let sources = SourceSet::from_config(config, &credentials)
        .context("failed to build data-source clients")?;

    let policy = args
        .policy
        .map(TriagePolicy::from)
        .unwrap_or(config.triage.policy);
    info!(policy = policy.as_str(), "starting claim verification");

    let mut options = VerifyOptions::new(&args.claim).with_policy(policy);
    if let Some(session_id) = args.session {
        options = options.with_session_id(session_id);
    }
    if let Some(dir) = args.trace_dir {
        options = options.with_trace_output_dir(dir);
    }
    if let Some(audit_log) = AuditLog::from_config(&config.logging) {
        options = options.with_audit_log(audit_log);
    }

    let outcome = run_verification_session(sources, options).await?;

    match args.format {
        OutputFormat::Markdown => println!("{}", outcome.markdown),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&outcome.report)?),
    }

    match args.explain {
        Some(ExplainFormat::Markdown) => println!("\n{}", outcome.explain_markdown()),
        Some(ExplainFormat::Mermaid) => println!("\n```mermaid\n{}```", outcome.explain_mermaid()),
        None => {}
    }

    if let Some(path) = &outcome.trace_path {
        info!(path = %path.display(), "trace persisted");
    }
    Ok(())
}

fn doctor_command(config: &Config) {
    let checks = config.check_credentials();

    println!("Data-source credentials:");
    for check in &checks {
        match &check.error {
            None => println!("  {:<20} {:<20} configured", check.source, check.env),
            Some(error) => println!("  {:<20} {:<20} {error}", check.source, check.env),
        }
    }

    let missing = checks.iter().filter(|check| !check.is_configured()).count();
    if missing == 0 {
        println!("\nAll data sources are configured.");
    } else {
        println!(
            "\n{missing} of {} data sources will report errors until their keys are set.",
            checks.len()
        );
    }
}
