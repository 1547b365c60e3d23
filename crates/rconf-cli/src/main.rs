//! rconf - run shell scripts on many hosts over SSH
//!
//! Usage:
//!   rconf -f scripts/ -H root:secret@10.0.0.5 -H admin@web1 -i ~/.ssh/id_ed25519
//!   rconf -c rconf.toml --format json

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, ValueEnum};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt, util::SubscriberInitExt};

use rconf_core::config::{DEFAULT_CONFIG_FILE, RunConfig, parse_config_file};
use rconf_core::prelude::*;

#[derive(Parser)]
#[command(name = "rconf", version)]
#[command(about = "Run shell scripts on many hosts over SSH", long_about = None)]
struct Cli {
    /// Script paths, globs, directories or URLs (comma-separated or repeated)
    #[arg(short = 'f', long = "filename", value_delimiter = ',')]
    filenames: Vec<String>,

    /// Connection string: user[:password]@host[:port][?sudo=false]
    #[arg(short = 'H', long = "conn")]
    conns: Vec<String>,

    /// Private key for hosts without a password
    #[arg(short = 'i', long)]
    pkey: Option<PathBuf>,

    /// Passphrase of an encrypted private key
    #[arg(long)]
    pkey_pass: Option<String>,

    /// Hosts processed at once [default: 2]
    #[arg(short = 'w', long)]
    workers: Option<usize>,

    /// Log file [default: rconf.log]
    #[arg(short = 'l', long)]
    log: Option<PathBuf>,

    /// Walk directories recursively [default: true]
    #[arg(
        short = 'R',
        long,
        action = ArgAction::Set,
        num_args = 0..=1,
        default_missing_value = "true"
    )]
    recursive: Option<bool>,

    /// Config file [default: ./rconf.toml when present]
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(long, default_value = "table")]
    format: OutputFormat,
}

#[derive(Clone, Copy, ValueEnum, Default)]
enum OutputFormat {
    /// Human-readable table
    #[default]
    Table,
    /// Machine-readable JSON
    Json,
}

impl Cli {
    /// Overlay flags on top of the file configuration.
    fn apply(self, config: &mut RunConfig) {
        if !self.filenames.is_empty() {
            config.filenames = self.filenames;
        }
        if !self.conns.is_empty() {
            config.hosts = self.conns;
        }
        if self.pkey.is_some() {
            config.pkey = self.pkey;
        }
        if self.pkey_pass.is_some() {
            config.pkey_pass = self.pkey_pass;
        }
        if let Some(workers) = self.workers {
            config.workers = workers;
        }
        if let Some(log) = self.log {
            config.log = log;
        }
        if let Some(recursive) = self.recursive {
            config.recursive = recursive;
        }
    }
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let format = cli.format;

    let mut config = load_config(cli.config.as_deref())?;
    cli.apply(&mut config);
    config.validate()?;

    let _guard = init_logging(&config.log)?;

    let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
    let report = runtime.block_on(run(&config))?;

    match format {
        OutputFormat::Table => print_table(&report),
        OutputFormat::Json => print_json(&report)?,
    }

    if report.all_succeeded() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}

fn load_config(path: Option<&Path>) -> Result<RunConfig> {
    match path {
        Some(path) => parse_config_file(path),
        None => {
            let default = Path::new(DEFAULT_CONFIG_FILE);
            if default.is_file() {
                parse_config_file(default)
            } else {
                Ok(RunConfig::default())
            }
        }
    }
}

/// Create the log directory and empty the log file so each run starts a
/// fresh log. Returns the directory and file name for the appender.
fn prepare_log_file(log: &Path) -> Result<(&Path, &OsStr)> {
    let dir = log
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let file_name = log
        .file_name()
        .with_context(|| format!("Invalid log file path: {}", log.display()))?;
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create log directory: {}", dir.display()))?;
    std::fs::File::create(log)
        .with_context(|| format!("Failed to truncate log file: {}", log.display()))?;

    Ok((dir, file_name))
}

/// Log to `log` through a background writer and echo warnings to stderr.
///
/// The returned guard flushes the file on drop and must outlive every log
/// call.
fn init_logging(log: &Path) -> Result<WorkerGuard> {
    let (dir, file_name) = prepare_log_file(log)?;
    let appender = tracing_appender::rolling::never(dir, file_name);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_filter(
                    EnvFilter::try_from_default_env()
                        .unwrap_or_else(|_| "rconf=info,rconf_core=info".into()),
                ),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .compact()
                .with_target(false)
                .with_writer(std::io::stderr)
                .with_filter(LevelFilter::WARN),
        )
        .init();

    Ok(guard)
}

async fn run(config: &RunConfig) -> Result<RunReport> {
    let fetcher = HttpFetcher::new(config.fetch_timeout())?;
    let command = RunCommand::new(Arc::new(SshConnector::new()), Arc::new(fetcher));

    match command.execute(config).await {
        Ok(report) => Ok(report),
        Err(e) => {
            tracing::error!(error = %e, "run aborted");
            Err(e.into())
        }
    }
}

fn print_table(report: &RunReport) {
    let mut hosts: Vec<&HostResult> = report.hosts.iter().collect();
    hosts.sort_by(|a, b| a.host.cmp(&b.host));

    println!("{:<40} RESULT", "HOST");
    println!("{}", "-".repeat(70));
    for entry in hosts {
        println!("{:<40} {}", entry.host, entry.outcome);
    }
    println!("{}", "-".repeat(70));
    println!(
        "{} host(s), {} failed, {:.1}s",
        report.hosts.len(),
        report.failed_count(),
        report.elapsed().num_milliseconds() as f64 / 1000.0
    );
}

fn print_json(report: &RunReport) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(report)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use tempfile::TempDir;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn flags_override_file_config() {
        let cli = Cli::parse_from([
            "rconf",
            "-f",
            "a.sh,scripts/",
            "-H",
            "root:pw@h1",
            "-H",
            "admin@h2?sudo=false",
            "-w",
            "5",
            "-R",
            "false",
        ]);
        let mut config = RunConfig {
            hosts: vec!["old@host".to_string()],
            log: PathBuf::from("/var/log/rconf.log"),
            ..RunConfig::default()
        };

        cli.apply(&mut config);

        assert_eq!(config.filenames, vec!["a.sh", "scripts/"]);
        assert_eq!(config.hosts, vec!["root:pw@h1", "admin@h2?sudo=false"]);
        assert_eq!(config.workers, 5);
        assert!(!config.recursive);
        assert_eq!(config.log, PathBuf::from("/var/log/rconf.log"));
    }

    #[test]
    fn absent_flags_keep_defaults() {
        let cli = Cli::parse_from(["rconf", "-f", "a.sh", "-H", "root:pw@h1"]);
        let mut config = RunConfig::default();

        cli.apply(&mut config);

        assert_eq!(config.workers, 2);
        assert!(config.recursive);
        assert_eq!(config.log, PathBuf::from("rconf.log"));
        assert_eq!(config.pkey, None);
    }

    #[test]
    fn bare_recursive_flag_means_true() {
        let cli = Cli::parse_from(["rconf", "-R", "-f", "a.sh"]);
        assert_eq!(cli.recursive, Some(true));
    }

    #[test]
    fn json_format_is_accepted() {
        let cli = Cli::parse_from(["rconf", "--format", "json"]);
        assert!(matches!(cli.format, OutputFormat::Json));
    }

    #[test]
    fn log_file_is_truncated_each_run() {
        let temp = TempDir::new().unwrap();
        let log = temp.path().join("rconf.log");
        std::fs::write(&log, "previous run\n").unwrap();

        let (dir, file_name) = prepare_log_file(&log).unwrap();

        assert_eq!(dir, temp.path());
        assert_eq!(file_name, "rconf.log");
        assert_eq!(std::fs::read_to_string(&log).unwrap(), "");
    }

    #[test]
    fn log_directory_is_created() {
        let temp = TempDir::new().unwrap();
        let log = temp.path().join("logs/nested/rconf.log");

        prepare_log_file(&log).unwrap();

        assert!(log.is_file());
    }
}
