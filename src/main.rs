//! driftgate: run every governance definition once and alert on drift.
//!
//! Settings come from the embedded defaults, then the overlay file, then
//! these flags. `DEBUG`, `LOGGING`, `NOEXCEPTIONS`, `PARALLEL` and `LAMBDA`
//! in the environment turn the matching switches on (`on`, `true`, `1`).

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use clap::builder::FalseyValueParser;

use driftgate::config::{Config, Settings};
use driftgate::policy::MatchMode;
use driftgate::registry::NetworkFetcher;
use driftgate::{Engine, handle_request, logging};

#[derive(Parser, Debug)]
#[command(name = "driftgate", version, about = "Policy-gated drift detection")]
struct Cli {
    /// Settings overlay (default: ~/.config/driftgate/config.toml).
    #[arg(long)]
    settings: Option<PathBuf>,
    /// Directory holding the policy/definitions files and baselines.
    #[arg(long)]
    path: Option<String>,
    /// Policy file name.
    #[arg(long)]
    config: Option<String>,
    /// Definitions file name.
    #[arg(long)]
    define: Option<String>,
    /// Shell used to run every command.
    #[arg(long)]
    shell: Option<String>,
    /// Deny everything that is not whitelisted.
    #[arg(long, env = "NOEXCEPTIONS", value_parser = FalseyValueParser::new())]
    noexceptions: bool,
    /// How whitelist/blacklist entries are matched.
    #[arg(long, value_enum)]
    match_mode: Option<MatchMode>,
    /// Token replaced with the definition name in force alerts.
    #[arg(long)]
    placeholder: Option<String>,
    /// Evaluate definitions concurrently.
    #[arg(long, env = "PARALLEL", value_parser = FalseyValueParser::new())]
    parallel: bool,
    /// Debug output on the terminal.
    #[arg(long, env = "DEBUG", value_parser = FalseyValueParser::new())]
    debug: bool,
    /// Append to an hourly log file.
    #[arg(long = "log", env = "LOGGING", value_parser = FalseyValueParser::new())]
    logging: bool,
    /// Serverless mode: single source file, shell from $SHELL, one handler call.
    #[arg(long, env = "LAMBDA", value_parser = FalseyValueParser::new())]
    lambda: bool,
    /// Print the pass summary as JSON.
    #[arg(long)]
    json: bool,
}

impl Cli {
    /// CLI flags override the loaded settings. Switches only ever turn on.
    fn apply(&self, s: &mut Settings) {
        if let Some(v) = &self.path {
            s.path = v.clone();
        }
        if let Some(v) = &self.config {
            s.config = v.clone();
        }
        if let Some(v) = &self.define {
            s.define = v.clone();
        }
        if let Some(v) = &self.shell {
            s.shell = v.clone();
        }
        if let Some(v) = self.match_mode {
            s.match_mode = v;
        }
        if let Some(v) = &self.placeholder {
            s.placeholder = v.clone();
        }
        s.noexceptions |= self.noexceptions;
        s.parallel |= self.parallel;
        s.debug |= self.debug;
        s.logging |= self.logging;
        if self.lambda {
            s.single_source = true;
            if self.shell.is_none()
                && let Ok(shell) = std::env::var("SHELL")
            {
                s.shell = shell;
            }
        }
    }
}

fn run(cli: &Cli) -> driftgate::Result<()> {
    let mut config = Config::load(cli.settings.as_deref())?;
    cli.apply(&mut config.settings);
    let settings = &config.settings;
    logging::init(settings.debug, settings.logging, &settings.log_dir()?)?;

    let engine = Engine::from_config(&config, &NetworkFetcher)?;

    if settings.single_source {
        log::debug!("lambda mode: on");
        let status = handle_request(&engine)?;
        println!("{status}");
        return Ok(());
    }

    log::debug!("lambda mode: off");
    let summary = engine.evaluate_all()?;
    if cli.json {
        match serde_json::to_string(&summary) {
            Ok(json) => println!("{json}"),
            Err(e) => log::error!("cannot encode summary: {e}"),
        }
    } else {
        println!("{}", summary.status());
    }
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if log::log_enabled!(log::Level::Error) {
                log::error!("{e}");
            } else {
                eprintln!("driftgate: {e}");
            }
            ExitCode::FAILURE
        }
    }
}
