//! Read-eval-print loop
//!
//! The loop reads lines from any [`Terminal`], handles shell commands itself
//! and passes everything else to a [`StatementExecutor`].
//!
//! | Command           | Description                                  |
//! |-------------------|----------------------------------------------|
//! | `help`            | List shell commands                          |
//! | `history`         | Show submitted lines with their indices      |
//! | `rerun <N>`       | Run history entry N again                    |
//! | `spool <path>`    | Copy all output to a file                    |
//! | `spool off`       | Stop copying output                          |
//! | `clear`           | Clear the screen                             |
//! | `exit` / `quit`   | Leave the shell                              |
//!
//! A trailing `;` on shell commands is ignored. Ctrl+C abandons the current
//! line; Ctrl+D leaves the shell.

use std::fs::File;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, info};

use crate::error::TerminalError;
use crate::terminal::{SignalHandler, SignalKind, SpoolSink, Terminal, TerminalWriter};

const STATUS_EXECUTING: &str = "Executing statement...";

/// Runs statements against the engine
pub trait StatementExecutor {
    fn execute(&mut self, statement: &str, out: &mut TerminalWriter) -> anyhow::Result<()>;
}

/// Shell-level command parsed from an input line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellCommand {
    Help,
    History,
    Rerun(u64),
    SpoolOn(PathBuf),
    SpoolOff,
    Clear,
    Exit,
}

impl ShellCommand {
    /// Parse a shell command. `None` means the line is a statement.
    pub fn parse(line: &str) -> Option<Result<Self, String>> {
        let line = line.trim().trim_end_matches(';').trim();
        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (line, ""),
        };

        let command = match (word.to_lowercase().as_str(), rest) {
            ("help", "") => ShellCommand::Help,
            ("history", "") => ShellCommand::History,
            ("clear", "") => ShellCommand::Clear,
            ("exit", "") | ("quit", "") => ShellCommand::Exit,
            ("rerun", arg) => {
                return Some(match arg.parse::<u64>() {
                    Ok(index) if index >= 1 => Ok(ShellCommand::Rerun(index)),
                    _ => Err(format!("Invalid history index: '{}'", arg)),
                });
            }
            ("spool", "") => return Some(Err("Usage: spool <path> | spool off".to_string())),
            ("spool", arg) if arg.eq_ignore_ascii_case("off") => ShellCommand::SpoolOff,
            ("spool", arg) => ShellCommand::SpoolOn(PathBuf::from(arg)),
            _ => return None,
        };
        Some(Ok(command))
    }
}

pub struct Repl<T: Terminal, E: StatementExecutor> {
    terminal: T,
    executor: E,
    dry_run: bool,
    /// Cancels the pending read; detached while a statement runs
    interrupt: SignalHandler,
    /// Sink we created for `spool <path>`; we own its lifecycle
    spool: Option<(PathBuf, SpoolSink)>,
}

impl<T: Terminal, E: StatementExecutor> Repl<T, E> {
    pub fn new(terminal: T, executor: E, dry_run: bool) -> Self {
        let cancel = terminal.read_cancel();
        let interrupt: SignalHandler = Arc::new(move |_: SignalKind| cancel.cancel());
        terminal.handle(SignalKind::Interrupt, interrupt.clone());
        terminal.handle(
            SignalKind::WindowResize,
            Arc::new(|_: SignalKind| debug!("terminal resized")),
        );

        Self {
            terminal,
            executor,
            dry_run,
            interrupt,
            spool: None,
        }
    }

    pub fn terminal(&self) -> &T {
        &self.terminal
    }

    /// Read and handle lines until input ends or `exit`
    pub fn run(&mut self) -> anyhow::Result<()> {
        self.print_welcome()?;

        loop {
            let line = match self.terminal.read_line() {
                Ok(line) => line,
                Err(TerminalError::InputClosed) => break,
                Err(e) if e.is_recoverable() => {
                    writeln!(self.terminal.writer(), "^C")?;
                    continue;
                }
                Err(e) => {
                    self.terminal.print_error(&format!("Error reading input: {}", e));
                    break;
                }
            };

            if !self.handle_line(&line)? {
                break;
            }
        }

        self.stop_spool();
        self.terminal.flush()?;
        self.terminal.close();
        Ok(())
    }

    /// Handle one line. Returns false when the shell should exit.
    pub fn handle_line(&mut self, line: &str) -> anyhow::Result<bool> {
        if line.trim().is_empty() {
            return Ok(true);
        }

        match ShellCommand::parse(line) {
            Some(Ok(ShellCommand::Exit)) => return Ok(false),
            Some(Ok(command)) => self.run_command(command)?,
            Some(Err(message)) => self.terminal.print_error(&message),
            None => self.execute(line.trim())?,
        }
        Ok(true)
    }

    fn run_command(&mut self, command: ShellCommand) -> anyhow::Result<()> {
        let mut out = self.terminal.writer();
        match command {
            ShellCommand::Help => print_help(&mut out)?,
            ShellCommand::History => {
                for entry in self.terminal.history() {
                    writeln!(out, "{:>5}  {}", entry.index(), entry.line())?;
                }
            }
            ShellCommand::Rerun(index) => {
                match self.terminal.history_entry(index) {
                    Some(entry) if ShellCommand::parse(entry.line()).is_none() => {
                        writeln!(out, "{}", entry.line())?;
                        self.execute(entry.line().trim())?;
                    }
                    Some(_) => self
                        .terminal
                        .print_error(&format!("History entry {} is not a statement", index)),
                    None => self
                        .terminal
                        .print_error(&format!("No history entry {}", index)),
                }
            }
            ShellCommand::SpoolOn(path) => {
                // Flush and detach first: `path` may be the file being spooled
                self.stop_spool();
                match File::create(&path) {
                    Ok(file) => {
                        let sink = SpoolSink::new(file);
                        self.terminal.set_spool(sink.clone());
                        info!(path = %path.display(), "spooling output");
                        writeln!(out, "Spooling output to {}", path.display())?;
                        self.spool = Some((path, sink));
                    }
                    Err(e) => self
                        .terminal
                        .print_error(&format!("Cannot spool to {}: {}", path.display(), e)),
                }
            }
            ShellCommand::SpoolOff => {
                if self.spool.is_some() {
                    self.stop_spool();
                    writeln!(out, "Spooling stopped")?;
                } else {
                    self.terminal.print_error("Not spooling");
                }
            }
            ShellCommand::Clear => self.terminal.clear_screen()?,
            ShellCommand::Exit => {}
        }
        out.flush()?;
        Ok(())
    }

    fn execute(&mut self, statement: &str) -> anyhow::Result<()> {
        let mut out = self.terminal.writer();
        if self.dry_run {
            writeln!(out, "Dry run, not executed: {}", statement)?;
            return Ok(());
        }

        // No read to cancel while the executor runs: let Ctrl+C stop the process
        self.terminal.unhandle(SignalKind::Interrupt);
        let token = self.terminal.set_status_message(STATUS_EXECUTING);
        let result = self.executor.execute(statement, &mut out);
        self.terminal.release_status(token);
        self.terminal.handle(SignalKind::Interrupt, self.interrupt.clone());

        if let Err(e) = result {
            self.terminal.print_error(&format!("{:#}", e));
        }
        out.flush()?;
        Ok(())
    }

    fn stop_spool(&mut self) {
        if let Some((path, sink)) = self.spool.take() {
            self.terminal.unset_spool();
            if let Err(e) = sink.flush() {
                self.terminal
                    .print_error(&format!("Failed to flush spool {}: {}", path.display(), e));
            }
            info!(path = %path.display(), "spool closed");
        }
    }

    fn print_welcome(&self) -> io::Result<()> {
        let mut out = self.terminal.writer();
        writeln!(out, "querysh {}", env!("CARGO_PKG_VERSION"))?;
        writeln!(out, "Type 'help' for shell commands, Ctrl+D to exit.")?;
        if self.dry_run {
            writeln!(out, "Dry run: statements will not be executed.")?;
        }
        out.flush()
    }
}

fn print_help(out: &mut TerminalWriter) -> io::Result<()> {
    writeln!(out, "Shell commands:")?;
    writeln!(out, "  help              Show this help")?;
    writeln!(out, "  history           Show previous input with indices")?;
    writeln!(out, "  rerun <N>         Run history entry N again")?;
    writeln!(out, "  spool <path>      Copy all output to a file")?;
    writeln!(out, "  spool off         Stop copying output")?;
    writeln!(out, "  clear             Clear the screen")?;
    writeln!(out, "  exit, quit        Leave the shell")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::terminal::{FakeTerminal, SignalRouter};

    /// Records statements and echoes them
    #[derive(Default)]
    struct Echo {
        seen: Vec<String>,
        fail_on: Option<String>,
        /// Whether an interrupt handler was attached while each statement ran
        router: Option<Arc<SignalRouter>>,
        interrupt_handled: Vec<bool>,
    }

    impl StatementExecutor for Echo {
        fn execute(&mut self, statement: &str, out: &mut TerminalWriter) -> anyhow::Result<()> {
            if let Some(router) = &self.router {
                self.interrupt_handled.push(router.is_registered(SignalKind::Interrupt));
            }
            self.seen.push(statement.to_string());
            if self.fail_on.as_deref() == Some(statement) {
                anyhow::bail!("statement rejected: {}", statement);
            }
            writeln!(out, "ok: {}", statement)?;
            Ok(())
        }
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(ShellCommand::parse("help"), Some(Ok(ShellCommand::Help)));
        assert_eq!(ShellCommand::parse(" HISTORY; "), Some(Ok(ShellCommand::History)));
        assert_eq!(ShellCommand::parse("quit"), Some(Ok(ShellCommand::Exit)));
        assert_eq!(ShellCommand::parse("rerun 3"), Some(Ok(ShellCommand::Rerun(3))));
        assert!(matches!(ShellCommand::parse("rerun 0"), Some(Err(_))));
        assert!(matches!(ShellCommand::parse("rerun x"), Some(Err(_))));
        assert_eq!(
            ShellCommand::parse("spool out.txt;"),
            Some(Ok(ShellCommand::SpoolOn(PathBuf::from("out.txt"))))
        );
        assert_eq!(ShellCommand::parse("spool OFF"), Some(Ok(ShellCommand::SpoolOff)));
        assert!(matches!(ShellCommand::parse("spool"), Some(Err(_))));
        assert_eq!(ShellCommand::parse("SELECT 1;"), None);
        assert_eq!(ShellCommand::parse("exit now"), None);
    }

    #[test]
    fn test_statements_reach_executor() {
        let term = FakeTerminal::with_lines(["SELECT 1;", "", "SELECT 2;"]);
        let mut repl = Repl::new(term, Echo::default(), false);
        repl.run().unwrap();

        assert_eq!(repl.executor.seen, vec!["SELECT 1;", "SELECT 2;"]);
        let output = repl.terminal().output();
        assert!(output.contains("ok: SELECT 1;"));
        assert!(output.contains("ok: SELECT 2;"));
        assert!(repl.terminal().is_closed());
        // Overlay released after each statement
        assert_eq!(repl.terminal().status_message(), None);
    }

    #[test]
    fn test_dry_run_skips_executor() {
        let term = FakeTerminal::with_lines(["INSERT INTO t VALUES (1);"]);
        let mut repl = Repl::new(term, Echo::default(), true);
        repl.run().unwrap();

        assert!(repl.executor.seen.is_empty());
        assert!(repl
            .terminal()
            .output()
            .contains("Dry run, not executed: INSERT INTO t VALUES (1);"));
    }

    #[test]
    fn test_exit_stops_reading() {
        let term = FakeTerminal::with_lines(["exit", "SELECT 1;"]);
        let mut repl = Repl::new(term, Echo::default(), false);
        repl.run().unwrap();
        assert!(repl.executor.seen.is_empty());
    }

    #[test]
    fn test_history_and_rerun() {
        let term =
            FakeTerminal::with_lines(["SELECT 1;", "history", "rerun 1", "rerun 2", "rerun 9"]);
        let mut repl = Repl::new(term, Echo::default(), false);
        repl.run().unwrap();

        assert_eq!(repl.executor.seen, vec!["SELECT 1;", "SELECT 1;"]);
        let output = repl.terminal().output();
        assert!(output.contains("    1  SELECT 1;"));
        let errors = repl.terminal().errors();
        assert!(errors.contains("History entry 2 is not a statement"));
        assert!(errors.contains("No history entry 9"));
    }

    #[test]
    fn test_executor_error_is_reported() {
        let term = FakeTerminal::with_lines(["DROP STREAM s;", "SELECT 1;"]);
        let executor = Echo {
            fail_on: Some("DROP STREAM s;".to_string()),
            ..Echo::default()
        };
        let mut repl = Repl::new(term, executor, false);
        repl.run().unwrap();

        assert!(repl.terminal().errors().contains("statement rejected"));
        assert_eq!(repl.executor.seen.len(), 2);
    }

    #[test]
    fn test_interrupt_abandons_line() {
        let mut term = FakeTerminal::new();
        term.push_signal(SignalKind::Interrupt);
        term.push_line("SELECT 1;");
        let mut repl = Repl::new(term, Echo::default(), false);
        repl.run().unwrap();

        assert!(repl.terminal().output().contains("^C"));
        assert_eq!(repl.executor.seen, vec!["SELECT 1;"]);
        assert_eq!(repl.terminal().history().len(), 1);
    }

    #[test]
    fn test_spool_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.txt");
        let term = FakeTerminal::with_lines([
            "SELECT 1;".to_string(),
            format!("spool {}", path.display()),
            "SELECT 2;".to_string(),
            "spool off".to_string(),
            "SELECT 3;".to_string(),
            "spool off".to_string(),
        ]);
        let mut repl = Repl::new(term, Echo::default(), false);
        repl.run().unwrap();

        let spooled = std::fs::read_to_string(&path).unwrap();
        assert!(!spooled.contains("ok: SELECT 1;"));
        assert!(spooled.contains("ok: SELECT 2;"));
        assert!(spooled.contains("Spooling output to"));
        assert!(!spooled.contains("ok: SELECT 3;"));
        assert!(!repl.terminal().is_spooling());
        assert!(repl.terminal().errors().contains("Not spooling"));
    }

    #[test]
    fn test_interrupt_reaches_default_while_executing() {
        let mut term = FakeTerminal::new();
        term.push_line("SELECT 1;");
        term.push_line("DROP STREAM s;");
        let executor = Echo {
            fail_on: Some("DROP STREAM s;".to_string()),
            router: Some(term.signal_router()),
            ..Echo::default()
        };
        let mut repl = Repl::new(term, executor, false);

        assert!(repl.handle_line("SELECT 1;").unwrap());
        assert!(repl.handle_line("DROP STREAM s;").unwrap());

        assert_eq!(repl.executor.interrupt_handled, vec![false, false]);
        // Restored for the next read, also after a failed statement
        assert!(repl.terminal().signal_router().is_registered(SignalKind::Interrupt));
    }

    #[test]
    fn test_respool_same_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.txt");
        let spool = format!("spool {}", path.display());
        let term = FakeTerminal::with_lines([
            spool.clone(),
            "SELECT 1;".to_string(),
            spool,
            "SELECT 2;".to_string(),
        ]);
        let mut repl = Repl::new(term, Echo::default(), false);
        repl.run().unwrap();

        let spooled = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            spooled,
            format!("Spooling output to {}\nok: SELECT 2;\n", path.display())
        );
        assert_eq!(repl.terminal().errors(), "");
    }

    #[test]
    fn test_clear_command() {
        let term = FakeTerminal::with_lines(["clear"]);
        let mut repl = Repl::new(term, Echo::default(), false);
        repl.run().unwrap();
        assert_eq!(repl.terminal().clear_count(), 1);
        assert_eq!(repl.terminal().history().len(), 1);
    }
}
