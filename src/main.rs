//! querysh - interactive query shell
//!
//! # Quick Start
//!
//! ```text
//! querysh                          # Interactive shell with ~/.querysh/config.toml
//! querysh -c shell.toml            # Use a specific config file
//! querysh --dry-run                # Echo statements instead of running them
//! querysh -c shell.toml check-config
//! ```
//!
//! Logs go to `~/.querysh/querysh.log` so they never mix with the session.

use std::fs::OpenOptions;
use std::io::Write;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use querysh::command::{Command, CommandContext, CommandRunner, GlobalOptions, TracingLogger};
use querysh::config::Config;
use querysh::repl::{Repl, StatementExecutor};
use querysh::terminal::{TerminalSession, TerminalWriter};

#[derive(Parser)]
#[command(name = "querysh", version, about = "Interactive query shell")]
struct Cli {
    #[command(flatten)]
    global: GlobalOptions,

    #[command(subcommand)]
    command: Option<Cmd>,
}

#[derive(Subcommand)]
enum Cmd {
    /// Start the interactive shell (default)
    Shell,
    /// Validate the file given with --config-file
    CheckConfig,
}

/// Stands in for the engine client: echoes each statement back
struct EchoExecutor;

impl StatementExecutor for EchoExecutor {
    fn execute(&mut self, statement: &str, out: &mut TerminalWriter) -> anyhow::Result<()> {
        writeln!(out, "{}", statement)?;
        Ok(())
    }
}

struct ShellCmd {
    config: Config,
}

impl Command for ShellCmd {
    fn name(&self) -> &str {
        "shell"
    }

    fn command(&mut self, ctx: &CommandContext) -> anyhow::Result<i32> {
        let terminal = TerminalSession::new(&self.config)?;
        let mut repl = Repl::new(terminal, EchoExecutor, ctx.dry_run());
        repl.run()?;
        Ok(0)
    }
}

struct CheckConfigCmd {
    config: Config,
}

impl Command for CheckConfigCmd {
    fn name(&self) -> &str {
        "check-config"
    }

    fn command(&mut self, ctx: &CommandContext) -> anyhow::Result<i32> {
        if !ctx.validate_config_file_present() {
            eprintln!("A config file is required: use --config-file <PATH> (or -c <PATH>)");
            return Ok(1);
        }

        let mut stdout = std::io::stdout();
        if let Some(path) = &ctx.options().config_file {
            writeln!(stdout, "Config file OK: {}", path.display())?;
        }
        writeln!(stdout, "  prompt:        {:?}", self.config.prompt)?;
        writeln!(stdout, "  edit mode:     {:?}", self.config.edit_mode)?;
        writeln!(stdout, "  history limit: {}", self.config.history.limit)?;
        writeln!(stdout, "  status bar:    {}", self.config.status_bar.visible)?;
        writeln!(stdout, "  log file:      {}", self.config.log_path().display())?;
        Ok(0)
    }
}

fn load_config(options: &GlobalOptions) -> anyhow::Result<Config> {
    match options.config_file.as_deref() {
        Some(path) if !path.as_os_str().is_empty() => Ok(Config::load_from(path)?),
        _ => Ok(Config::load()),
    }
}

/// Log to a file; the terminal belongs to the shell
fn init_logging(config: &Config) {
    let log_path = config.log_path();

    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .ok();

    if let Some(file) = log_file {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(&config.log.level));
        let subscriber = FmtSubscriber::builder()
            .with_env_filter(filter)
            .with_writer(std::sync::Mutex::new(file))
            .with_ansi(false)
            .finish();
        let _ = tracing::subscriber::set_global_default(subscriber);
    }
}

fn main() {
    let cli = Cli::parse();

    let config = match load_config(&cli.global) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    };

    init_logging(&config);
    info!("querysh {} starting", env!("CARGO_PKG_VERSION"));

    let runner = CommandRunner::new(cli.global, Arc::new(TracingLogger));
    let status = match cli.command.unwrap_or(Cmd::Shell) {
        Cmd::Shell => runner.run(&mut ShellCmd { config }),
        Cmd::CheckConfig => runner.run(&mut CheckConfigCmd { config }),
    };

    info!(status, "querysh exiting");
    std::process::exit(status);
}
