//! Subcommand execution
//!
//! Every subcommand implements [`Command`] and is started through
//! [`CommandRunner::run`], which times it and reports the elapsed duration
//! to the [`CommandLogger`] the runner was built with.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::Args;
use tracing::{error, info};

pub const CONFIG_FILE_OPTION: &str = "--config-file";
pub const CONFIG_FILE_OPTION_SHORT: &str = "-c";

/// Exit status reported when a command fails with an error
pub const FAILURE_STATUS: i32 = 1;

/// Options accepted by every subcommand
#[derive(Args, Debug, Clone, Default)]
pub struct GlobalOptions {
    /// Specifies a configuration file
    #[arg(short = 'c', long = "config-file", value_name = "PATH", global = true)]
    pub config_file: Option<PathBuf>,

    /// Show what would run without executing any statements
    #[arg(long = "dry-run", global = true)]
    pub dry_run: bool,
}

/// Sink for command lifecycle reports
pub trait CommandLogger: Send + Sync {
    fn execution_time(&self, command: &str, elapsed: Duration);
    fn error(&self, message: &str);
}

/// Reports through `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogger;

impl CommandLogger for TracingLogger {
    fn execution_time(&self, command: &str, elapsed: Duration) {
        info!(
            command,
            elapsed_ms = elapsed.as_millis() as u64,
            "Execution time: {:.3}s",
            elapsed.as_secs_f64()
        );
    }

    fn error(&self, message: &str) {
        error!("{}", message);
    }
}

/// What a command sees while running
pub struct CommandContext {
    options: GlobalOptions,
    logger: Arc<dyn CommandLogger>,
}

impl CommandContext {
    pub fn options(&self) -> &GlobalOptions {
        &self.options
    }

    pub fn dry_run(&self) -> bool {
        self.options.dry_run
    }

    /// Check that a config file was given, logging an error if not
    pub fn validate_config_file_present(&self) -> bool {
        let present = self
            .options
            .config_file
            .as_ref()
            .map_or(false, |path| !path.as_os_str().is_empty());
        if !present {
            self.logger.error(&format!(
                "Config file required but not specified. Specify with {} (or, equivalently, {}).",
                CONFIG_FILE_OPTION, CONFIG_FILE_OPTION_SHORT
            ));
        }
        present
    }
}

/// A CLI subcommand
pub trait Command {
    fn name(&self) -> &str;

    /// Run the command and return its exit status
    fn command(&mut self, ctx: &CommandContext) -> anyhow::Result<i32>;
}

/// Times and logs commands
pub struct CommandRunner {
    ctx: CommandContext,
}

impl CommandRunner {
    pub fn new(options: GlobalOptions, logger: Arc<dyn CommandLogger>) -> Self {
        Self {
            ctx: CommandContext { options, logger },
        }
    }

    pub fn context(&self) -> &CommandContext {
        &self.ctx
    }

    /// Run `cmd`, log how long it took, and return its exit status.
    ///
    /// An error from the command is logged and turned into [`FAILURE_STATUS`].
    pub fn run(&self, cmd: &mut dyn Command) -> i32 {
        let start = Instant::now();
        let result = cmd.command(&self.ctx);
        self.ctx.logger.execution_time(cmd.name(), start.elapsed());

        match result {
            Ok(status) => status,
            Err(e) => {
                self.ctx
                    .logger
                    .error(&format!("{} failed: {:#}", cmd.name(), e));
                FAILURE_STATUS
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct RecordingLogger {
        timings: Mutex<Vec<(String, Duration)>>,
        errors: Mutex<Vec<String>>,
    }

    impl CommandLogger for RecordingLogger {
        fn execution_time(&self, command: &str, elapsed: Duration) {
            self.timings.lock().push((command.to_string(), elapsed));
        }

        fn error(&self, message: &str) {
            self.errors.lock().push(message.to_string());
        }
    }

    struct Fixed(anyhow::Result<i32>);

    impl Command for Fixed {
        fn name(&self) -> &str {
            "fixed"
        }

        fn command(&mut self, _ctx: &CommandContext) -> anyhow::Result<i32> {
            match &self.0 {
                Ok(status) => Ok(*status),
                Err(e) => Err(anyhow::anyhow!("{}", e)),
            }
        }
    }

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        global: GlobalOptions,
    }

    fn make_runner(options: GlobalOptions) -> (CommandRunner, Arc<RecordingLogger>) {
        let logger = Arc::new(RecordingLogger::default());
        (CommandRunner::new(options, logger.clone()), logger)
    }

    #[test]
    fn test_run_returns_status_and_logs_duration() {
        let (runner, logger) = make_runner(GlobalOptions::default());

        assert_eq!(runner.run(&mut Fixed(Ok(0))), 0);
        assert_eq!(runner.run(&mut Fixed(Ok(3))), 3);

        let timings = logger.timings.lock();
        assert_eq!(timings.len(), 2);
        assert_eq!(timings[0].0, "fixed");
        assert!(logger.errors.lock().is_empty());
    }

    #[test]
    fn test_failure_becomes_exit_status() {
        let (runner, logger) = make_runner(GlobalOptions::default());

        let status = runner.run(&mut Fixed(Err(anyhow::anyhow!("engine unreachable"))));
        assert_eq!(status, FAILURE_STATUS);
        // Timing is still reported
        assert_eq!(logger.timings.lock().len(), 1);
        let errors = logger.errors.lock();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("engine unreachable"));
    }

    #[test]
    fn test_missing_config_file() {
        for options in [
            GlobalOptions::default(),
            GlobalOptions {
                config_file: Some(PathBuf::new()),
                dry_run: false,
            },
        ] {
            let (runner, logger) = make_runner(options);
            assert!(!runner.context().validate_config_file_present());
            let errors = logger.errors.lock();
            assert_eq!(errors.len(), 1);
            assert!(errors[0].contains("--config-file"));
            assert!(errors[0].contains("-c"));
        }
    }

    #[test]
    fn test_config_file_present() {
        let (runner, logger) = make_runner(GlobalOptions {
            config_file: Some(PathBuf::from("querysh.toml")),
            dry_run: false,
        });
        assert!(runner.context().validate_config_file_present());
        assert!(logger.errors.lock().is_empty());
    }

    #[test]
    fn test_parse_global_options() {
        let cli = TestCli::parse_from(["querysh", "-c", "a.toml", "--dry-run"]);
        assert_eq!(cli.global.config_file, Some(PathBuf::from("a.toml")));
        assert!(cli.global.dry_run);

        let cli = TestCli::parse_from(["querysh", "--config-file", "b.toml"]);
        assert_eq!(cli.global.config_file, Some(PathBuf::from("b.toml")));
        assert!(!cli.global.dry_run);
    }
}
