//! timebox CLI - run a command under a test and a keyword deadline.
//!
//! # Architecture
//!
//! ```text
//! main() -> load config -> init_tracing -> Plan::new(cli, config)
//!        -> spawn_blocking(Plan::execute)   most urgent timeout guards the command
//!        +  watch_interrupts()              Ctrl-C -> SignalMonitor::request_stop
//! ```
//!
//! # Exit codes
//!
//! | Outcome                         | Code            |
//! |---------------------------------|-----------------|
//! | command finished                | its exit code   |
//! | command killed by a signal      | 128 + signal    |
//! | deadline exceeded               | 124             |
//! | bad timeout or config           | 125             |
//! | command not executable / absent | 126 / 127       |
//! | guard failure                   | 70              |
//! | stopped by Ctrl-C               | 130             |

use std::io;
use std::path::{Path, PathBuf};
use std::process::{self, Command, ExitCode, ExitStatus};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::{signal, task};
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use timebox_config::{ConfigError, TimeboxConfig};
use timebox_core::{
    CancelToken, Guard, GuardError, KeywordTimeout, SignalMonitor, StopDisposition,
    StopSignalMonitor, TestTimeout, TimeoutKind, Variables, run_command,
};
use timebox_types::{Resolution, Timeout, format_secs, most_urgent};

const EXIT_FRAMEWORK: u8 = 70;
const EXIT_TIMEOUT: u8 = 124;
const EXIT_CONFIGURATION: u8 = 125;
const EXIT_CANNOT_EXECUTE: u8 = 126;
const EXIT_NOT_FOUND: u8 = 127;
const EXIT_STOPPED: u8 = 130;

#[derive(Debug, Parser)]
#[command(name = "timebox", version, about = "Run a command under test and keyword deadlines")]
struct Cli {
    /// Keyword timeout, e.g. `30s`, `1 min 30 s`, `1:30` or `${limit}`.
    #[arg(short, long, value_name = "TIME")]
    timeout: Option<String>,

    /// Test timeout. Bounds the command together with the keyword timeout.
    #[arg(long, value_name = "TIME")]
    test_timeout: Option<String>,

    /// Failure message used when the keyword timeout fires.
    #[arg(short, long)]
    message: Option<String>,

    /// Variable available as `${NAME}`. Repeatable.
    #[arg(short, long = "variable", value_name = "NAME:VALUE", value_parser = parse_assignment)]
    variables: Vec<(String, String)>,

    /// Config file. Defaults to `$TIMEBOX_CONFIG` or `~/.timebox/config.toml`.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Print the resolved timeouts and exit without running the command.
    #[arg(long)]
    dry_run: bool,

    #[arg(
        required_unless_present = "dry_run",
        trailing_var_arg = true,
        allow_hyphen_values = true,
        value_name = "COMMAND"
    )]
    command: Vec<String>,
}

fn parse_assignment(text: &str) -> Result<(String, String), String> {
    match text.split_once(':') {
        Some((name, value)) if !name.trim().is_empty() => {
            Ok((name.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected NAME:VALUE, got '{text}'")),
    }
}

fn load_config(path: Option<&Path>) -> Result<TimeboxConfig, ConfigError> {
    match path {
        Some(path) => TimeboxConfig::load_from(path),
        None => TimeboxConfig::load().map(Option::unwrap_or_default),
    }
}

fn init_tracing(config_filter: Option<&str>) {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config_filter.unwrap_or("warn")))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr).with_target(false))
        .with(env_filter)
        .init();
}

/// Both scopes of one invocation, resolved and started.
struct Plan {
    test: TestTimeout,
    keyword: KeywordTimeout,
    command: Vec<String>,
}

impl Plan {
    /// Command-line values win over the config file.
    fn new(cli: &Cli, config: &TimeboxConfig) -> Self {
        let defaults = config.timeouts.clone().unwrap_or_default();

        let mut variables: Variables = config.variables.iter().collect();
        for (name, value) in &cli.variables {
            variables.set(name, value.as_str());
        }

        let mut test = TestTimeout::new(
            cli.test_timeout.clone().or(defaults.test).unwrap_or_default(),
            None,
        );
        let mut keyword = KeywordTimeout::new(
            cli.timeout.clone().or(defaults.keyword).unwrap_or_default(),
            cli.message.clone().or(defaults.message),
        );
        test.resolve(&variables);
        keyword.resolve(&variables);
        test.start();
        keyword.start();

        Self {
            test,
            keyword,
            command: cli.command.clone(),
        }
    }

    fn describe(&self) -> u8 {
        let mut code = 0;
        for timeout in [&*self.test, &*self.keyword] {
            println!("{}", describe_timeout(timeout));
            if timeout.config_error().is_some() {
                code = EXIT_CONFIGURATION;
            }
        }
        code
    }

    /// Run the command under the most urgent timeout and return the exit code.
    fn execute(&mut self, guard: &Guard) -> u8 {
        let Some(chosen) = most_urgent([&*self.test, &*self.keyword]) else {
            debug!("No active timeout, running command unguarded");
            return exit_code_for(run_command(&mut build_command(&self.command), &CancelToken::new()));
        };
        let kind = chosen.kind();
        let argv = self.command.clone();
        let result = guard.run(chosen, move |token| {
            run_command(&mut build_command(&argv), token)
        });

        match result {
            Ok(status) => exit_code_for(status),
            Err(err) => {
                if err.is_timeout() && kind == TimeoutKind::Keyword {
                    self.test.mark_keyword_timeout_occurred(true);
                }
                info!(
                    %kind,
                    keyword_timeout_occurred = self.test.keyword_timeout_occurred(),
                    "Guarded command failed"
                );
                eprintln!("timebox: {}", err.message());
                guard_exit_code(&err)
            }
        }
    }
}

fn describe_timeout(timeout: &Timeout) -> String {
    let title = timeout.kind().title();
    match timeout.resolution() {
        Resolution::Unresolved => format!("{title} timeout: none"),
        Resolution::Invalid { error } => format!("{title} timeout: {error}"),
        Resolution::Resolved { secs } => {
            format!("{title} timeout: {} ({})", timeout.raw(), format_secs(*secs))
        }
    }
}

fn build_command(argv: &[String]) -> Command {
    let (program, args) = argv.split_first().map_or(("", &[][..]), |(p, a)| (p.as_str(), a));
    let mut command = Command::new(program);
    command.args(args);
    command
}

fn guard_exit_code(err: &GuardError) -> u8 {
    match err {
        GuardError::Timeout(_) => EXIT_TIMEOUT,
        GuardError::Configuration(_) => EXIT_CONFIGURATION,
        GuardError::Framework(_) => EXIT_FRAMEWORK,
        GuardError::Fatal(_) => EXIT_STOPPED,
    }
}

fn exit_code_for(status: io::Result<ExitStatus>) -> u8 {
    match status {
        Ok(status) => status_code(status),
        Err(err) => {
            eprintln!("timebox: cannot run command: {err}");
            spawn_error_code(&err)
        }
    }
}

fn spawn_error_code(err: &io::Error) -> u8 {
    if err.kind() == io::ErrorKind::NotFound {
        EXIT_NOT_FOUND
    } else {
        EXIT_CANNOT_EXECUTE
    }
}

fn status_code(status: ExitStatus) -> u8 {
    if let Some(code) = status.code() {
        return u8::try_from(code).unwrap_or(1);
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return u8::try_from(128 + signal).unwrap_or(1);
        }
    }
    1
}

/// Route Ctrl-C through the monitor. Inside a guarded call the first request
/// waits for the call to finish; a second one exits at once.
async fn watch_interrupts(monitor: Arc<SignalMonitor>) {
    loop {
        if let Err(err) = signal::ctrl_c().await {
            tracing::warn!("Cannot listen for Ctrl-C: {err}");
            return;
        }
        match monitor.request_stop() {
            StopDisposition::Deferred => {
                eprintln!("timebox: stopping after the current command (Ctrl-C again to force)");
            }
            StopDisposition::Immediate | StopDisposition::Forced => {
                eprintln!("timebox: stopped");
                process::exit(i32::from(EXIT_STOPPED));
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            init_tracing(None);
            eprintln!("timebox: {err}");
            return Ok(ExitCode::from(EXIT_CONFIGURATION));
        }
    };
    init_tracing(config.log_filter());

    let mut plan = Plan::new(&cli, &config);
    if cli.dry_run {
        return Ok(ExitCode::from(plan.describe()));
    }

    let monitor = SignalMonitor::global();
    let guard = Guard::new(monitor.clone()).with_options(config.guard_options());
    tokio::spawn(watch_interrupts(Arc::clone(&monitor)));

    let code = task::spawn_blocking(move || plan.execute(&guard))
        .await
        .context("guarded command panicked")?;

    if monitor.stop_requested() {
        eprintln!("timebox: stopped");
        return Ok(ExitCode::from(EXIT_STOPPED));
    }
    Ok(ExitCode::from(code))
}
