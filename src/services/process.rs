//! Process execution service for running build-tool invocations.
//!
//! Handles spawning processes, streaming output, and log persistence.

use crate::error::InvocationError;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::time::Instant;

/// A fully rendered external command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    /// Short label used for log file names
    pub label: String,
    pub program: String,
    pub args: Vec<String>,
    /// Directory the child runs in; the parent's directory never changes
    pub working_dir: PathBuf,
    pub envs: Vec<(String, String)>,
}

impl Invocation {
    pub fn new(program: impl Into<String>, working_dir: impl Into<PathBuf>) -> Self {
        Self {
            label: String::new(),
            program: program.into(),
            args: Vec::new(),
            working_dir: working_dir.into(),
            envs: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Command line as a single display string
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// What came back from a finished process
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub success: bool,
    /// `None` when the process was terminated by a signal
    pub exit_code: Option<i32>,
    /// Combined stdout and stderr, in arrival order
    pub output: String,
}

/// Runs one invocation to completion.
///
/// A non-zero exit is reported in [`CommandOutput`]; only a failure to
/// launch the program is an error.
pub trait CommandRunner {
    fn run(&self, invocation: &Invocation) -> Result<CommandOutput, InvocationError>;
}

impl<R: CommandRunner + ?Sized> CommandRunner for &R {
    fn run(&self, invocation: &Invocation) -> Result<CommandOutput, InvocationError> {
        (**self).run(invocation)
    }
}

/// Output event from a running process
#[derive(Debug, Clone)]
enum ProcessOutput {
    Stdout(String),
    Stderr(String),
    Error(String),
}

/// Blocking process runner backed by `std::process`
#[derive(Debug, Default)]
pub struct ProcessRunner {
    /// Log directory, when per-step logs are persisted
    log_dir: Option<PathBuf>,
    sequence: AtomicUsize,
}

impl ProcessRunner {
    /// Create a runner that only captures output
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a runner that also writes one log file per invocation
    pub fn with_log_dir(log_dir: PathBuf) -> Self {
        Self {
            log_dir: Some(log_dir),
            sequence: AtomicUsize::new(0),
        }
    }

    /// Ensure log directory exists
    fn ensure_log_dir(dir: &Path) -> std::io::Result<()> {
        if !dir.exists() {
            fs::create_dir_all(dir)?;
        }
        Ok(())
    }

    /// Generate log file path for an invocation
    fn log_file_path(&self, dir: &Path, invocation: &Invocation) -> PathBuf {
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;
        let label = if invocation.label.is_empty() {
            sanitize_label(&invocation.program)
        } else {
            sanitize_label(&invocation.label)
        };
        dir.join(format!("{:03}-{}.log", seq, label))
    }

    fn open_log(&self, invocation: &Invocation) -> Option<File> {
        let dir = self.log_dir.as_ref()?;
        let result = Self::ensure_log_dir(dir).and_then(|_| {
            let path = self.log_file_path(dir, invocation);
            let mut file = OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(&path)?;
            writeln!(file, "# Command: {}", invocation.command_line())?;
            writeln!(file, "# Started: {}", unix_timestamp())?;
            writeln!(file, "# Directory: {}", invocation.working_dir.display())?;
            writeln!(file, "---")?;
            Ok(file)
        });

        match result {
            Ok(file) => Some(file),
            Err(e) => {
                tracing::warn!("Cannot write step log in {}: {}", dir.display(), e);
                None
            }
        }
    }
}

impl CommandRunner for ProcessRunner {
    fn run(&self, invocation: &Invocation) -> Result<CommandOutput, InvocationError> {
        tracing::debug!(
            "Running `{}` in {}",
            invocation.command_line(),
            invocation.working_dir.display()
        );

        let mut child = Command::new(&invocation.program)
            .args(&invocation.args)
            .envs(invocation.envs.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .current_dir(&invocation.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| InvocationError::Launch {
                program: invocation.program.clone(),
                source,
            })?;

        let start_time = Instant::now();
        let mut log_file = self.open_log(invocation);

        let (output_tx, output_rx) = mpsc::channel();
        let mut readers = Vec::new();

        if let Some(stdout) = child.stdout.take() {
            let tx = output_tx.clone();
            readers.push(std::thread::spawn(move || {
                forward_lines(stdout, tx, ProcessOutput::Stdout)
            }));
        }

        if let Some(stderr) = child.stderr.take() {
            let tx = output_tx.clone();
            readers.push(std::thread::spawn(move || {
                forward_lines(stderr, tx, ProcessOutput::Stderr)
            }));
        }

        // Readers hold the remaining senders; the loop ends once both pipes close.
        drop(output_tx);

        let mut captured = String::new();
        for event in output_rx {
            let (tag, text) = match event {
                ProcessOutput::Stdout(text) => ("OUT", text),
                ProcessOutput::Stderr(text) => ("ERR", text),
                ProcessOutput::Error(text) => ("ERR", format!("<output read error: {}>", text)),
            };
            tracing::debug!(target: "ci_matrix::output", "{}", text);
            if let Some(f) = log_file.as_mut() {
                let _ = writeln!(f, "[{}] {}", tag, text);
            }
            captured.push_str(&text);
            captured.push('\n');
        }

        for reader in readers {
            let _ = reader.join();
        }

        let status = child.wait().map_err(|source| InvocationError::Wait {
            program: invocation.program.clone(),
            source,
        })?;

        tracing::debug!(
            "`{}` finished in {:.1}s with {}",
            invocation.program,
            start_time.elapsed().as_secs_f64(),
            status
        );
        if let Some(f) = log_file.as_mut() {
            let _ = writeln!(f, "--- {}", status);
        }

        Ok(CommandOutput {
            success: status.success(),
            exit_code: status.code(),
            output: captured,
        })
    }
}

/// Consecutive read errors tolerated before a stream is discarded
const MAX_READ_ERRORS: usize = 8;

/// Forward every line of `stream`, decoding lossily.
///
/// The pipe is always drained to EOF so the child never blocks or dies on a
/// closed pipe, even when its output is not valid UTF-8.
fn forward_lines<R, F>(stream: R, tx: mpsc::Sender<ProcessOutput>, wrap: F)
where
    R: Read,
    F: Fn(String) -> ProcessOutput,
{
    let mut reader = BufReader::new(stream);
    let mut buf = Vec::new();
    let mut errors = 0;

    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf) {
            Ok(0) => break,
            Ok(_) => {
                errors = 0;
                let _ = tx.send(wrap(decode_line(&buf)));
            }
            Err(e) => {
                let _ = tx.send(ProcessOutput::Error(e.to_string()));
                errors += 1;
                if errors >= MAX_READ_ERRORS {
                    let _ = std::io::copy(&mut reader, &mut std::io::sink());
                    break;
                }
            }
        }
    }
}

/// Strip the line terminator and replace invalid UTF-8
fn decode_line(raw: &[u8]) -> String {
    let line = raw.strip_suffix(b"\n").unwrap_or(raw);
    let line = line.strip_suffix(b"\r").unwrap_or(line);
    String::from_utf8_lossy(line).into_owned()
}

fn sanitize_label(label: &str) -> String {
    let cleaned: String = label
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect();
    let trimmed = cleaned.trim_matches('-');
    if trimmed.is_empty() {
        "step".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Seconds since the unix epoch
fn unix_timestamp() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};

    let duration = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();

    format!("{}", duration.as_secs())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sh(script: &str, dir: &Path) -> Invocation {
        Invocation::new("sh", dir).arg("-c").arg(script)
    }

    #[test]
    fn test_success_captures_both_streams() {
        let temp = TempDir::new().unwrap();
        let runner = ProcessRunner::new();

        let out = runner
            .run(&sh("echo hello; echo oops >&2", temp.path()))
            .unwrap();
        assert!(out.success);
        assert_eq!(out.exit_code, Some(0));
        assert!(out.output.contains("hello\n"));
        assert!(out.output.contains("oops\n"));
    }

    #[test]
    fn test_non_zero_exit_is_not_an_error() {
        let temp = TempDir::new().unwrap();
        let out = ProcessRunner::new()
            .run(&sh("echo failing; exit 3", temp.path()))
            .unwrap();
        assert!(!out.success);
        assert_eq!(out.exit_code, Some(3));
        assert_eq!(out.output, "failing\n");
    }

    #[test]
    fn test_missing_program_is_launch_error() {
        let temp = TempDir::new().unwrap();
        let err = ProcessRunner::new()
            .run(&Invocation::new("nonexistent_command_xyz", temp.path()))
            .unwrap_err();
        assert!(matches!(err, InvocationError::Launch { program, .. } if program == "nonexistent_command_xyz"));
    }

    #[test]
    fn test_working_dir_and_env_apply_to_child_only() {
        let temp = TempDir::new().unwrap();
        let before = std::env::current_dir().unwrap();

        let out = ProcessRunner::new()
            .run(&sh("pwd; echo \"$RUSTFLAGS\"", temp.path()).env("RUSTFLAGS", "--deny warnings"))
            .unwrap();

        let canonical = temp.path().canonicalize().unwrap();
        assert!(out.output.contains(canonical.to_str().unwrap()));
        assert!(out.output.contains("--deny warnings"));
        assert_eq!(std::env::current_dir().unwrap(), before);
    }

    #[test]
    fn test_log_files_written_per_invocation() {
        let temp = TempDir::new().unwrap();
        let logs = temp.path().join("logs");
        let runner = ProcessRunner::with_log_dir(logs.clone());

        runner
            .run(&sh("echo one", temp.path()).label("check 52840"))
            .unwrap();
        runner.run(&sh("echo two >&2", temp.path())).unwrap();

        let first = fs::read_to_string(logs.join("001-check-52840.log")).unwrap();
        assert!(first.starts_with("# Command: sh -c echo one"));
        assert!(first.contains("[OUT] one"));

        let second = fs::read_to_string(logs.join("002-sh.log")).unwrap();
        assert!(second.contains("[ERR] two"));
    }

    #[test]
    fn test_invalid_utf8_keeps_later_output() {
        let temp = TempDir::new().unwrap();
        let out = ProcessRunner::new()
            .run(&sh(
                "printf 'bad \\377\\n'; echo error: real diagnostic; exit 101",
                temp.path(),
            ))
            .unwrap();

        assert_eq!(out.exit_code, Some(101));
        assert_eq!(out.output, "bad \u{FFFD}\nerror: real diagnostic\n");
    }

    #[test]
    fn test_invalid_utf8_then_large_output_is_drained() {
        let temp = TempDir::new().unwrap();
        let script = "printf 'bad \\377\\n'; \
                      i=0; while [ $i -lt 5000 ]; do \
                      echo 'padding line that keeps the pipe full for a while'; \
                      i=$((i+1)); done; echo tail; exit 3";
        let out = ProcessRunner::new().run(&sh(script, temp.path())).unwrap();

        assert_eq!(out.exit_code, Some(3));
        assert!(out.output.starts_with("bad \u{FFFD}\n"));
        assert!(out.output.ends_with("tail\n"));
        assert_eq!(out.output.lines().count(), 5002);
    }

    #[test]
    fn test_decode_line() {
        assert_eq!(decode_line(b"plain\n"), "plain");
        assert_eq!(decode_line(b"crlf\r\n"), "crlf");
        assert_eq!(decode_line(b"no newline"), "no newline");
        assert_eq!(decode_line(b"latin \xe9\n"), "latin \u{FFFD}");
    }

    #[test]
    fn test_sanitize_label() {
        assert_eq!(sanitize_label("build nrf52-demo/52840"), "build-nrf52-demo-52840");
        assert_eq!(sanitize_label("///"), "step");
    }

    #[test]
    fn test_command_line() {
        let inv = Invocation::new("cargo", "/tmp").args(["check", "--features", "52840"]);
        assert_eq!(inv.command_line(), "cargo check --features 52840");
    }
}
