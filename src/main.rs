use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use reentrancy_analyzer::model::Severity;
use reentrancy_analyzer::report::render_text_report;
use reentrancy_analyzer::{Analyzer, AnalyzerConfig};

/// Cross-contract reentrancy analyzer for Solidity AST artifacts.
#[derive(Parser, Debug)]
#[command(name = "reentrancy-analyzer", version, about)]
struct Cli {
    /// Path to a build-info JSON file, a raw SourceUnit JSON file, or a
    /// directory containing either.
    input: PathBuf,

    /// Write the JSON report here instead of stdout.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Also print a human-readable summary to stderr.
    #[arg(short, long)]
    text: bool,

    /// Drop findings below this severity.
    #[arg(long, value_enum, default_value = "low")]
    severity: SeverityArg,

    /// Exclude safe_external_call findings from the report.
    #[arg(long)]
    hide_safe: bool,

    /// Skip cross-contract resolution; every cross-contract call is
    /// reported as an unresolved external call instead.
    #[arg(long)]
    no_cross_contract: bool,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum SeverityArg {
    Low,
    Medium,
    High,
    Critical,
}

impl From<SeverityArg> for Severity {
    fn from(value: SeverityArg) -> Self {
        match value {
            SeverityArg::Low => Severity::Low,
            SeverityArg::Medium => Severity::Medium,
            SeverityArg::High => Severity::High,
            SeverityArg::Critical => Severity::Critical,
        }
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let config = AnalyzerConfig {
        severity_threshold: cli.severity.into(),
        enable_reentrancy_detection: true,
        enable_cross_contract_resolution: !cli.no_cross_contract,
        report_safe_calls: !cli.hide_safe,
    };

    match run(&cli, config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:?}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli, config: AnalyzerConfig) -> anyhow::Result<()> {
    let analyzer = Analyzer::new(config);
    let report = analyzer.analyze(&cli.input)?;

    let json = serde_json::to_string_pretty(&report)?;
    match &cli.output {
        Some(path) => std::fs::write(path, &json)?,
        None => println!("{json}"),
    }

    if cli.text {
        eprintln!("{}", render_text_report(&report));
    }

    Ok(())
}
