mod platform;

use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use genwatch_logging::gw_info;

use platform::app::{self, Command};
use platform::config::{AppConfig, LogTarget, Ordering};

#[derive(Debug, Parser)]
#[command(name = "genwatch", version, about = "Follow portfolio generation jobs live")]
struct Cli {
    /// RON config file; defaults to ./genwatch.ron when present.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Base URL of the HTTP API.
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Base URL of the live stream; derived from the API URL when omitted.
    #[arg(long, global = true)]
    ws_url: Option<String>,

    /// Bearer token sent with API requests.
    #[arg(long, global = true)]
    token: Option<String>,

    /// Reconnect attempts before a dropped stream counts as failed.
    #[arg(long, global = true)]
    max_retries: Option<u32>,

    #[arg(long, value_enum, global = true)]
    log: Option<LogArg>,

    /// Log level: off, error, warn, info, debug or trace.
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Drop events whose sequence number is not newer than the latest one.
    #[arg(long, global = true)]
    reject_stale: bool,

    /// Do not fetch portfolio previews on status changes.
    #[arg(long, global = true)]
    no_preview: bool,

    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Debug, Subcommand)]
enum CliCommand {
    /// Start a generation job for a portfolio and follow it.
    Generate { portfolio_id: String },
    /// Follow an already running job.
    Watch {
        job_id: String,
        /// Portfolio the job belongs to, used for previews.
        #[arg(long)]
        portfolio: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogArg {
    File,
    Terminal,
    Both,
}

impl Cli {
    /// Layers flags over the file and environment values.
    fn apply_overrides(&self, config: &mut AppConfig) {
        if let Some(api_url) = &self.api_url {
            config.api_url = api_url.clone();
        }
        if let Some(ws_url) = &self.ws_url {
            config.ws_url = Some(ws_url.clone());
        }
        if let Some(token) = &self.token {
            config.access_token = Some(token.clone());
        }
        if let Some(max_retries) = self.max_retries {
            config.reconnect.max_retries = max_retries;
        }
        if let Some(log) = self.log {
            config.log.destination = match log {
                LogArg::File => LogTarget::File,
                LogArg::Terminal => LogTarget::Terminal,
                LogArg::Both => LogTarget::Both,
            };
        }
        if let Some(level) = &self.log_level {
            config.log.level = level.clone();
        }
        if self.reject_stale {
            config.ordering = Ordering::RejectStale;
        }
        if self.no_preview {
            config.preview = false;
        }
    }

    fn command(&self) -> Command {
        match &self.command {
            CliCommand::Generate { portfolio_id } => Command::Generate {
                portfolio_id: portfolio_id.clone(),
            },
            CliCommand::Watch { job_id, portfolio } => Command::Watch {
                job_id: job_id.clone(),
                portfolio_id: portfolio.clone(),
            },
        }
    }
}

fn run(cli: &Cli) -> anyhow::Result<app::Outcome> {
    let mut config = AppConfig::load(cli.config.as_deref())?;
    config.apply_env(|key| std::env::var(key).ok());
    cli.apply_overrides(&mut config);

    genwatch_logging::initialize(config.log_destination(), config.level_filter()?);
    gw_info!("Using API at {}", config.api_url);

    app::run(&config, cli.command(), io::stdout())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(&cli) {
        Ok(outcome) => {
            match &outcome {
                app::Outcome::TriggerFailed { message } => eprintln!("genwatch: {message}"),
                app::Outcome::Failed { error: Some(error) } => eprintln!("genwatch: {error}"),
                _ => {}
            }
            ExitCode::from(outcome.exit_code())
        }
        Err(err) => {
            eprintln!("genwatch: {err:#}");
            ExitCode::from(2)
        }
    }
}
