use anyhow::{bail, Context, Result};
use bulwark_core::{FeatureFlag, ResilienceConfig, TrendPeriod};
use bulwark_runtime::audit::{AuditLine, MAX_HISTORY};
use bulwark_runtime::{
    AdvisorService, Bulwark, Guarded, JsonLinesAuditSink, LlmProvider, ProviderRegistry,
    UnconfiguredProvider,
};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

const GEMINI: &str = "gemini";

#[derive(Parser)]
#[command(name = "bulwark")]
#[command(about = "Guarded market advisor calls with circuit breakers and feature flags")]
#[command(version)]
struct Cli {
    /// YAML config file, overlaid by environment variables
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Append audit records to this JSON Lines file
    #[arg(long, global = true)]
    audit_log: Option<PathBuf>,

    /// Output format
    #[arg(short, long, global = true, value_enum, default_value_t = Format::Text)]
    format: Format,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the resolved configuration
    Config,

    /// Show advisor health, breaker state and flag values
    Status,

    /// Show the effective feature flags
    Flags {
        /// Preview the flags after entering fallback mode
        #[arg(long)]
        fallback_mode: bool,
    },

    /// Analyze a silver price series
    Analyze {
        /// Analysis window (1H, 1D, 7D, 30D, 1Y)
        #[arg(short, long)]
        period: TrendPeriod,

        /// Price samples in USD per troy ounce (can be specified multiple times)
        #[arg(long = "price", required = true)]
        prices: Vec<f64>,

        /// Correlation id recorded with the audit entry
        #[arg(short, long)]
        session: Option<String>,
    },

    /// Ask the advisor a question
    Advise {
        query: String,

        /// Correlation id recorded with the audit entry
        #[arg(short, long)]
        session: Option<String>,
    },

    /// Read back the audit log
    History {
        /// Only records with this correlation id
        #[arg(short, long)]
        session: Option<String>,

        /// Most recent entries to show (at most 100)
        #[arg(short, long, default_value_t = 20)]
        limit: usize,
    },
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    Text,
    Json,
    Yaml,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();

    let config = ResilienceConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;

    match cli.command {
        Commands::Config => {
            match cli.format {
                Format::Json => emit(Format::Json, &config)?,
                _ => print!("{}", config.to_yaml()?),
            }
            Ok(())
        }
        Commands::Status => {
            let bulwark = bulwark(config, cli.audit_log.as_ref());
            let advisor = bulwark.advisor(provider());
            let status = advisor.status().await;

            if cli.format == Format::Text {
                println!("{}: {:?} via {}", status.service, status.status, status.provider);
                println!("breaker {} is {}", status.breaker.name, status.breaker.state);
                print_flags(&status.features);
                Ok(())
            } else {
                emit(cli.format, &status)
            }
        }
        Commands::Flags { fallback_mode } => {
            let bulwark = bulwark(config, cli.audit_log.as_ref());
            if fallback_mode {
                bulwark.flags().enable_fallback_mode().await;
            }
            let flags = bulwark.flags().get_all_flags().await;

            if cli.format == Format::Text {
                print_flags(&flags);
                Ok(())
            } else {
                emit(cli.format, &flags)
            }
        }
        Commands::Analyze {
            period,
            prices,
            session,
        } => {
            let advisor = advisor(config, cli.audit_log.as_ref());
            let result = advisor
                .analyze_trends(period, &prices, session.as_deref())
                .await?;
            report(cli.format, &result)
        }
        Commands::Advise { query, session } => {
            let advisor = advisor(config, cli.audit_log.as_ref());
            let result = advisor.generate_advice(&query, session.as_deref()).await?;
            report(cli.format, &result)
        }
        Commands::History { session, limit } => {
            let Some(path) = cli.audit_log else {
                bail!("--audit-log is required to read history");
            };
            let lines = JsonLinesAuditSink::new(path).read_all().await?;
            let mut selected: Vec<AuditLine> = lines
                .into_iter()
                .filter(|line| match (&session, line) {
                    (Some(id), AuditLine::Call(record)) => &record.correlation_id == id,
                    (Some(_), AuditLine::Trend(_)) => false,
                    (None, _) => true,
                })
                .collect();
            let skip = selected.len().saturating_sub(limit.min(MAX_HISTORY));
            selected.drain(..skip);

            if cli.format == Format::Text {
                for line in &selected {
                    print_history_line(line);
                }
                Ok(())
            } else {
                emit(cli.format, &selected)
            }
        }
    }
}

fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .try_init();
}

fn bulwark(config: ResilienceConfig, audit_log: Option<&PathBuf>) -> Bulwark {
    let builder = Bulwark::builder().config(config);
    match audit_log {
        Some(path) => builder.audit(Arc::new(JsonLinesAuditSink::new(path))).build(),
        None => builder.build(),
    }
}

fn advisor(config: ResilienceConfig, audit_log: Option<&PathBuf>) -> AdvisorService {
    bulwark(config, audit_log).advisor(provider())
}

/// Gemini when a key is present, otherwise a provider that always fails so
/// calls take the degradation path.
fn provider() -> Arc<dyn LlmProvider> {
    let registry = ProviderRegistry::with_defaults();
    let config = serde_json::json!({});

    match registry
        .validate(GEMINI, &config)
        .and_then(|()| registry.create(GEMINI, &config))
    {
        Ok(provider) => provider,
        Err(e) => {
            tracing::info!(reason = %e, "Model provider unavailable, answers will come from fallback tables");
            Arc::new(UnconfiguredProvider::new(e.to_string()))
        }
    }
}

fn report(format: Format, result: &Guarded<String>) -> Result<()> {
    if format != Format::Text {
        return emit(format, result);
    }

    println!("{}", result.value);
    if let Some(reason) = result.fallback_reason {
        eprintln!("(fallback: {reason})");
    }
    Ok(())
}

fn emit<T: Serialize>(format: Format, value: &T) -> Result<()> {
    match format {
        Format::Yaml => print!("{}", serde_yaml::to_string(value)?),
        _ => println!("{}", serde_json::to_string_pretty(value)?),
    }
    Ok(())
}

fn print_flags(flags: &bulwark_core::FlagSnapshot) {
    for flag in FeatureFlag::ALL {
        let enabled = flags.get(&flag).copied().unwrap_or(false);
        println!(
            "{:<26} {:<5} {}",
            flag.as_str(),
            if enabled { "on" } else { "off" },
            flag.description()
        );
    }
}

fn print_history_line(line: &AuditLine) {
    match line {
        AuditLine::Call(record) => println!(
            "{} {} [{}] {}{}",
            record.created_at.to_rfc3339(),
            record.operation,
            record.correlation_id,
            record.input,
            record
                .fallback_reason
                .map(|reason| format!(" (fallback: {reason})"))
                .unwrap_or_default()
        ),
        AuditLine::Trend(trend) => println!(
            "{} trend {} {:?} avg ${:.2}/oz",
            trend.generated_at.to_rfc3339(),
            trend.period,
            trend.direction,
            trend.average_price
        ),
    }
}
