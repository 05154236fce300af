//! probeforge CLI - wordlist-driven probing tools for authorized testing

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use probeforge_core::{Config, LogFormat, LogLevel, LoggingConfig};
use std::path::PathBuf;
use tracing::debug;
use tracing_subscriber::{
    filter::EnvFilter, layer::SubscriberExt, util::SubscriberInitExt, Layer, Registry,
};

mod commands;
mod output;
mod scanner;
mod utils;

/// probeforge - bounded-concurrency probing for authorized pentesting
#[derive(Parser, Debug)]
#[command(name = "probeforge")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Directory, subdomain, port, SSH and hash probing on one engine")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Verbose output (-v errors, -vv every outcome and debug logs)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode: results only
    #[arg(short = 'q', long = "quiet", global = true)]
    pub quiet: bool,

    /// Configuration file (json, yaml or toml)
    #[arg(short = 'c', long = "config", value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Log format
    #[arg(long = "log-format", value_enum, global = true)]
    pub log_format: Option<CliLogFormat>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Enumerate directories and files on a web server
    Dirs {
        /// Target URL (e.g. http://example.com)
        #[arg(short = 'u', long = "url")]
        url: String,

        /// Directory wordlist
        #[arg(short = 'w', long = "wordlist")]
        wordlist: PathBuf,

        /// Extensions to try for every word (comma-separated, e.g. php,html)
        #[arg(short = 'e', long = "extensions")]
        extensions: Option<String>,

        #[command(flatten)]
        engine: EngineArgs,
    },

    /// Discover subdomains of a domain
    Subdomains {
        /// Target domain (e.g. example.com)
        #[arg(short = 'd', long = "domain")]
        domain: String,

        /// Subdomain wordlist
        #[arg(short = 'w', long = "wordlist")]
        wordlist: PathBuf,

        /// Probe over https instead of http
        #[arg(long = "https")]
        https: bool,

        #[command(flatten)]
        engine: EngineArgs,
    },

    /// TCP connect scan of hosts and ports
    Ports {
        /// Host, IP address or IPv4 CIDR block (e.g. 192.168.1.0/24)
        #[arg(value_name = "TARGET")]
        targets: Vec<String>,

        /// Ports to scan (e.g. 22,80,8000-8010); defaults to common ports
        #[arg(short = 'p', long = "ports")]
        ports: Option<String>,

        /// How hosts are checked for liveness before their ports are scanned
        #[arg(long = "discovery", value_enum, default_value = "ping")]
        discovery: Discovery,

        #[command(flatten)]
        engine: EngineArgs,
    },

    /// SSH password brute force against one user
    Ssh {
        /// Target host or IP address
        #[arg(short = 't', long = "target")]
        target: String,

        /// SSH port
        #[arg(short = 'p', long = "port", default_value = "22")]
        port: u16,

        /// Username to test
        #[arg(short = 'u', long = "user")]
        user: String,

        /// Password wordlist
        #[arg(short = 'w', long = "wordlist")]
        wordlist: PathBuf,

        #[command(flatten)]
        engine: EngineArgs,
    },

    /// Crack a hash against a wordlist
    Crack {
        /// Hash to crack
        #[arg(short = 'H', long = "hash")]
        hash: String,

        /// Hash algorithm
        #[arg(short = 't', long = "hash-type")]
        hash_type: HashType,

        /// Wordlist
        #[arg(short = 'w', long = "wordlist")]
        wordlist: PathBuf,

        #[command(flatten)]
        engine: EngineArgs,
    },

    /// Identify a hash type, or generate a hash
    Hashid {
        /// Hash to analyse, or text to hash with --generate
        hash: String,

        /// Generate a hash of the input with this algorithm
        #[arg(short = 'g', long = "generate")]
        generate: Option<String>,
    },
}

/// Engine options shared by every probing command
#[derive(Args, Debug, Clone, Default)]
pub struct EngineArgs {
    /// Number of concurrent workers
    #[arg(short = 'T', long = "threads", value_name = "NUM")]
    pub threads: Option<usize>,

    /// Per-probe timeout in seconds
    #[arg(long = "timeout", value_name = "SECONDS")]
    pub timeout: Option<f64>,

    /// Minimum delay between two attempts in seconds, across all workers
    #[arg(long = "delay", value_name = "SECONDS")]
    pub delay: Option<f64>,

    /// Append successes to this file as they are found
    #[arg(short = 'o', long = "output", value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Write the final report as JSON
    #[arg(long = "json", value_name = "FILE")]
    pub json: Option<PathBuf>,

    /// Keep going after the first success
    #[arg(long = "all")]
    pub all: bool,

    /// Disable the progress bar
    #[arg(long = "no-progress")]
    pub no_progress: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum HashType {
    Md5,
    Sha1,
    Sha256,
    Sha512,
    Ntlm,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Discovery {
    /// System ping, one echo request per host
    Ping,
    /// TCP connect to common ports
    Tcp,
    /// Scan every host without checking it first
    None,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum CliLogFormat {
    Compact,
    Pretty,
    Json,
}

impl From<CliLogFormat> for LogFormat {
    fn from(format: CliLogFormat) -> Self {
        match format {
            CliLogFormat::Compact => LogFormat::Compact,
            CliLogFormat::Pretty => LogFormat::Pretty,
            CliLogFormat::Json => LogFormat::Json,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let file_config = match &cli.config {
        Some(path) => Some(
            Config::from_file(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?,
        ),
        None => None,
    };

    let logging = file_config
        .as_ref()
        .map(|config| config.logging.clone())
        .unwrap_or_default();
    init_logging(&cli, &logging).context("Failed to initialize logging")?;

    debug!("CLI arguments: {:?}", cli);

    let run_config = file_config.map(|config| config.run);
    commands::execute(&cli, run_config.as_ref()).await
}

/// Initialize logging based on CLI arguments and the config file
///
/// `RUST_LOG` wins over both; logs go to stderr so results stay on stdout.
fn init_logging(cli: &Cli, logging: &LoggingConfig) -> Result<()> {
    let level = if cli.quiet {
        LogLevel::Error
    } else {
        match cli.verbose {
            0 => logging.level,
            1 => LogLevel::Info,
            2 => LogLevel::Debug,
            _ => LogLevel::Trace,
        }
    };

    let filter = match std::env::var(EnvFilter::DEFAULT_ENV) {
        Ok(_) => EnvFilter::try_from_default_env().context("Invalid RUST_LOG directive")?,
        Err(_) => EnvFilter::new(level.as_str()),
    };

    let format = cli.log_format.map(LogFormat::from).unwrap_or(logging.format);
    let fmt_layer: Box<dyn Layer<Registry> + Send + Sync> = match format {
        LogFormat::Compact => tracing_subscriber::fmt::layer()
            .compact()
            .with_target(logging.targets)
            .with_writer(std::io::stderr)
            .boxed(),
        LogFormat::Pretty => tracing_subscriber::fmt::layer()
            .pretty()
            .with_target(logging.targets)
            .with_writer(std::io::stderr)
            .boxed(),
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .with_target(logging.targets)
            .with_writer(std::io::stderr)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(fmt_layer.with_filter(filter))
        .try_init()
        .context("Logging already initialized")?;

    Ok(())
}
