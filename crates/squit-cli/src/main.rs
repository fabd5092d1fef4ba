use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use squit_core::{RunSummary, Squit, SquitConfig, SquitError, SquitResult};
use tracing::error;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "squit")]
#[command(about = "Directory-driven integration tests for request/response services", long_about = None)]
struct Cli {
    #[command(flatten)]
    options: Options,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct Options {
    /// Run configuration file (defaults to ./squit.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Root of the test tree
    #[arg(long, global = true)]
    source_dir: Option<PathBuf>,

    /// Root of the generated artifacts
    #[arg(long, global = true)]
    build_dir: Option<PathBuf>,

    /// Property for ${name} placeholders, as key=value
    #[arg(short = 'P', long = "property", value_parser = parse_property, global = true)]
    properties: Vec<(String, String)>,

    /// Only run tests carrying all of these tags
    #[arg(long, value_delimiter = ',', global = true)]
    tags_all: Vec<String>,

    /// Only run tests carrying any of these tags
    #[arg(long, value_delimiter = ',', global = true)]
    tags_any: Vec<String>,

    /// Run tests flagged ignore
    #[arg(long, global = true)]
    unignore: bool,

    /// Run tests flagged exclude
    #[arg(long, global = true)]
    unexclude: bool,

    /// Number of tests processed at the same time
    #[arg(long, global = true)]
    concurrency: Option<usize>,
}

#[derive(Subcommand)]
enum Commands {
    /// List the selected tests
    Index,
    /// Write processed sources
    Process,
    /// Run fixtures and requests, then process the responses
    Request,
    /// Compare responses and print the outcome
    Diff,
    /// Compare responses and write the reports
    Report {
        /// Open the HTML report in a browser
        #[arg(long)]
        open: bool,
    },
    /// Run every stage
    Run {
        /// Open the HTML report in a browser
        #[arg(long)]
        open: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let cli = Cli::parse();
    match execute(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

/// Returns whether the run succeeded.
async fn execute(cli: Cli) -> Result<bool, SquitError> {
    let config = load_config(cli.options)?;
    let fail_on_failures = config.run.fail_on_failures;
    let squit = Squit::new(config);

    match cli.command {
        Commands::Index => {
            for test in squit.index()? {
                let marker = if test.config.ignore { " (ignored)" } else { "" };
                println!("{}{marker}", test.path.display());
            }
            Ok(true)
        }
        Commands::Process => {
            let tests = squit.index()?;
            let report = squit.process(&tests).await;
            println!("Processed {} tests, {} errors", report.processed, report.errors);
            Ok(report.errors == 0)
        }
        Commands::Request => {
            let tests = squit.index()?;
            let report = squit.request(&tests).await?;
            println!(
                "Executed {} tests, {} skipped, {} errors",
                report.processed, report.skipped, report.errors
            );
            Ok(report.errors == 0)
        }
        Commands::Diff => {
            let tests = squit.index()?;
            let results = squit.diff(&tests);
            print_results(&results);
            Ok(RunSummary::from_results(&results).is_success(fail_on_failures))
        }
        Commands::Report { open } => {
            let tests = squit.index()?;
            let results = squit.diff(&tests);
            let reports = squit.report(&results)?;
            print_results(&results);
            println!("Report: {}", reports.html.display());
            if open {
                open_report(&reports.html);
            }
            Ok(RunSummary::from_results(&results).is_success(fail_on_failures))
        }
        Commands::Run { open } => {
            let outcome = squit.run().await?;
            print_results(&outcome.results);
            println!("Report: {}", outcome.reports.html.display());
            if open {
                open_report(&outcome.reports.html);
            }
            Ok(outcome.summary.is_success(fail_on_failures))
        }
    }
}

fn load_config(options: Options) -> Result<SquitConfig, SquitError> {
    let mut config = match &options.config {
        Some(path) => SquitConfig::from_file(path)?,
        None => SquitConfig::load()?,
    };

    if let Some(dir) = options.source_dir {
        config.paths.source_dir = dir;
    }
    if let Some(dir) = options.build_dir {
        config.paths.build_dir = dir;
    }
    if let Some(concurrency) = options.concurrency {
        config.run.concurrency = concurrency;
    }
    config.properties.extend(options.properties);
    config.run.tags_all.extend(options.tags_all);
    config.run.tags_any.extend(options.tags_any);
    config.run.unignore |= options.unignore;
    config.run.unexclude |= options.unexclude;

    Ok(config)
}

fn print_results(results: &[SquitResult]) {
    for result in results.iter().filter(|r| r.is_failure()) {
        let kind = if result.is_error() { "ERROR" } else { "FAILED" };
        println!("{kind}: {}", result.full_path().display());
        for line in result.difference.lines().take(20) {
            println!("    {line}");
        }
    }

    let summary = RunSummary::from_results(results);
    println!(
        "\n{} tests: {} passed, {} failed, {} errors, {} ignored",
        summary.total, summary.passed, summary.failed, summary.errors, summary.ignored
    );
}

fn open_report(path: &std::path::Path) {
    if let Err(e) = open::that(path) {
        eprintln!("Could not open browser: {}", e);
    }
}

fn parse_property(value: &str) -> Result<(String, String), String> {
    value
        .split_once('=')
        .map(|(key, value)| (key.trim().to_string(), value.to_string()))
        .ok_or_else(|| format!("expected key=value, got '{value}'"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_property() {
        assert_eq!(
            parse_property("endpoint=http://localhost:8080/api").unwrap(),
            ("endpoint".to_string(), "http://localhost:8080/api".to_string())
        );
        assert!(parse_property("missing").is_err());
    }

    #[test]
    fn test_cli_parses_global_options() {
        let cli = Cli::try_parse_from([
            "squit",
            "run",
            "--open",
            "-P",
            "host=example",
            "--tags-any",
            "smoke,fast",
            "--unignore",
        ])
        .unwrap();

        assert!(matches!(cli.command, Commands::Run { open: true }));
        assert_eq!(cli.options.tags_any, vec!["smoke", "fast"]);
        assert_eq!(cli.options.properties, vec![("host".to_string(), "example".to_string())]);
        assert!(cli.options.unignore);
    }
}
