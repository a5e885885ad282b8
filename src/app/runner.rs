use crate::app::error::RenderError;
use crate::app::invocation::Invocation;
use std::fmt;
use std::io::{self, Read, Write};
use std::process::{Child, ChildStdin, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// How often an exited-yet? check runs while a deadline is armed.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// How long readers get to report after a kill before they are abandoned.
const KILL_GRACE: Duration = Duration::from_millis(500);

/// How a single run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The process exited on its own with this status code.
    Completed(i32),
    /// The process was terminated by a signal it did not get from us.
    Signaled(i32),
    /// The process never started.
    LaunchFailed(String),
    /// The deadline expired and the process was killed.
    TimedOut(Duration),
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Completed(code) => write!(f, "exit status {}", code),
            Outcome::Signaled(signal) => write!(f, "signal {}", signal),
            Outcome::LaunchFailed(reason) => write!(f, "launch failure ({})", reason),
            Outcome::TimedOut(after) => write!(f, "timeout after {}ms", after.as_millis()),
        }
    }
}

/// Everything captured from one run, plus the invocation that produced it.
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    pub invocation: Invocation,
    pub pid: Option<u32>,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub outcome: Outcome,
}

impl ExecutionResult {
    fn launch_failed(invocation: &Invocation, reason: String) -> Self {
        Self {
            invocation: invocation.clone(),
            pid: None,
            stdout: Vec::new(),
            stderr: Vec::new(),
            outcome: Outcome::LaunchFailed(reason),
        }
    }

    pub fn is_success(&self) -> bool {
        self.outcome == Outcome::Completed(0)
    }

    /// The outcome as an error, or `None` if the tool exited with status 0.
    pub fn error(&self) -> Option<RenderError> {
        match &self.outcome {
            Outcome::Completed(0) => None,
            Outcome::Completed(_) | Outcome::Signaled(_) => Some(RenderError::NonZeroExit {
                command_line: self.invocation.command_line(),
                status: self.outcome.to_string(),
                stderr: String::from_utf8_lossy(&self.stderr).into_owned(),
            }),
            Outcome::LaunchFailed(reason) => Some(RenderError::Launch {
                program: self.invocation.program.clone(),
                reason: reason.clone(),
            }),
            Outcome::TimedOut(timeout) => Some(RenderError::Timeout {
                command_line: self.invocation.command_line(),
                timeout: *timeout,
            }),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Stream {
    Stdout,
    Stderr,
}

/// Spawns an invocation, feeds it input and collects what it prints.
///
/// Every run gets its own child and its own three pipes; a `Runner` holds no
/// state between runs and can be shared freely.
#[derive(Debug, Clone, Default)]
pub struct Runner {
    timeout: Option<Duration>,
}

impl Runner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn run(&self, invocation: &Invocation, input: &[u8]) -> ExecutionResult {
        let started = Instant::now();
        let deadline = self.timeout.map(|timeout| started + timeout);

        let mut command = Command::new(&invocation.program);
        command
            .args(&invocation.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            command.process_group(0);
        }

        log::debug!("Launching {}", invocation);
        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(err) => {
                log::warn!("Failed to launch {}: {}", invocation.program, err);
                return ExecutionResult::launch_failed(invocation, err.to_string());
            }
        };
        let pid = child.id();
        log::debug!("Started pid {}", pid);

        let (tx, rx) = mpsc::channel();
        let mut workers = Vec::with_capacity(3);
        if let Some(stdin) = child.stdin.take() {
            workers.push(feed(stdin, input.to_vec()));
        }
        if let Some(stdout) = child.stdout.take() {
            workers.push(drain(stdout, Stream::Stdout, tx.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            workers.push(drain(stderr, Stream::Stderr, tx.clone()));
        }
        drop(tx);

        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        let drained = collect(&rx, deadline, &mut stdout, &mut stderr);
        let status = if drained {
            wait_until(&mut child, deadline)
        } else {
            Ok(None)
        };

        let outcome = match status {
            Ok(Some(status)) => outcome_of(status),
            Ok(None) => {
                let timeout = self.timeout.unwrap_or_default();
                log::warn!(
                    "{} did not finish within {}ms, killing pid {}",
                    invocation.program,
                    timeout.as_millis(),
                    pid
                );
                terminate(&mut child);
                // A descendant outside the group may still hold a pipe.
                collect(&rx, Some(Instant::now() + KILL_GRACE), &mut stdout, &mut stderr);
                Outcome::TimedOut(timeout)
            }
            Err(err) => {
                log::warn!("Lost track of pid {}: {}", pid, err);
                terminate(&mut child);
                collect(&rx, Some(Instant::now() + KILL_GRACE), &mut stdout, &mut stderr);
                Outcome::LaunchFailed(format!("failed to wait for process: {}", err))
            }
        };

        for worker in workers {
            settle(worker);
        }

        match &outcome {
            Outcome::Completed(0) => log::info!(
                "{} finished in {}ms",
                invocation.program,
                started.elapsed().as_millis()
            ),
            Outcome::Completed(_) | Outcome::Signaled(_) => {
                log::warn!("{} ended with {}", invocation.program, outcome)
            }
            _ => {}
        }

        ExecutionResult {
            invocation: invocation.clone(),
            pid: Some(pid),
            stdout,
            stderr,
            outcome,
        }
    }
}

/// Writes all input then closes the pipe so the child sees end of input.
fn feed(mut stdin: ChildStdin, input: Vec<u8>) -> JoinHandle<()> {
    thread::spawn(move || {
        if let Err(err) = stdin.write_all(&input) {
            if err.kind() == io::ErrorKind::BrokenPipe {
                log::debug!("Child closed its input after {} bytes were offered", input.len());
            } else {
                log::warn!("Failed to write input to child: {}", err);
            }
        }
    })
}

fn drain<R>(mut reader: R, stream: Stream, tx: Sender<(Stream, Vec<u8>)>) -> JoinHandle<()>
where
    R: Read + Send + 'static,
{
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Err(err) = reader.read_to_end(&mut buf) {
            log::warn!("Error reading child {:?}: {}", stream, err);
        }
        if tx.send((stream, buf)).is_err() {
            log::debug!("Dropped child {:?}: the run had already returned", stream);
        }
    })
}

/// Joins a worker that is done; one still blocked on a pipe is left detached.
fn settle(worker: JoinHandle<()>) {
    if !worker.is_finished() {
        log::debug!("Leaving a pipe worker detached; a descendant still holds its pipe");
        return;
    }
    if worker.join().is_err() {
        log::warn!("A pipe worker panicked; its stream may be incomplete");
    }
}

/// Gathers both streams until their readers finish. Returns `false` if the
/// deadline passed first.
fn collect(
    rx: &Receiver<(Stream, Vec<u8>)>,
    deadline: Option<Instant>,
    stdout: &mut Vec<u8>,
    stderr: &mut Vec<u8>,
) -> bool {
    loop {
        let received = match deadline {
            None => rx.recv().ok(),
            Some(deadline) => {
                match rx.recv_timeout(deadline.saturating_duration_since(Instant::now())) {
                    Ok(message) => Some(message),
                    Err(RecvTimeoutError::Disconnected) => None,
                    Err(RecvTimeoutError::Timeout) => return false,
                }
            }
        };
        match received {
            Some((Stream::Stdout, bytes)) => *stdout = bytes,
            Some((Stream::Stderr, bytes)) => *stderr = bytes,
            None => return true,
        }
    }
}

/// Waits for exit. `Ok(None)` means the deadline passed first.
fn wait_until(child: &mut Child, deadline: Option<Instant>) -> io::Result<Option<ExitStatus>> {
    let Some(deadline) = deadline else {
        return child.wait().map(Some);
    };
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        let now = Instant::now();
        if now >= deadline {
            return Ok(None);
        }
        thread::sleep(POLL_INTERVAL.min(deadline - now));
    }
}

/// Kills the child together with anything it spawned, then reaps it.
fn terminate(child: &mut Child) {
    #[cfg(unix)]
    {
        if let Ok(pgid) = libc::pid_t::try_from(child.id()) {
            // SAFETY: kill(2) with a negative pid only signals that process group.
            unsafe {
                libc::kill(-pgid, libc::SIGKILL);
            }
        }
    }
    if let Err(err) = child.kill() {
        log::debug!("kill: {}", err);
    }
    if let Err(err) = child.wait() {
        log::warn!("Failed to reap pid {}: {}", child.id(), err);
    }
}

fn outcome_of(status: ExitStatus) -> Outcome {
    if let Some(code) = status.code() {
        return Outcome::Completed(code);
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return Outcome::Signaled(signal);
        }
    }
    Outcome::Completed(-1)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh(script: &str) -> Invocation {
        Invocation {
            program: "sh".into(),
            args: vec!["-c".into(), script.into()],
        }
    }

    fn process_exists(pid: u32) -> bool {
        // SAFETY: signal 0 only probes for existence.
        unsafe { libc::kill(pid as libc::pid_t, 0) == 0 }
    }

    #[test]
    fn echo_stub_returns_input_verbatim() {
        let invocation = Invocation {
            program: "cat".into(),
            args: Vec::new(),
        };
        let input = b"import: from AS1 accept ANY\n\x00\xffbinary tail";
        let result = Runner::new().run(&invocation, input);

        assert_eq!(result.outcome, Outcome::Completed(0));
        assert_eq!(result.stdout, input);
        assert!(result.stderr.is_empty());
        assert!(result.is_success());
        assert!(result.error().is_none());
    }

    #[test]
    fn stderr_and_exit_code_are_captured() {
        let result = Runner::new().run(&sh("printf 'no such as-set' >&2; exit 3"), b"");

        assert_eq!(result.outcome, Outcome::Completed(3));
        assert_eq!(result.stderr, b"no such as-set");
        assert!(result.stdout.is_empty());
        match result.error() {
            Some(RenderError::NonZeroExit { status, stderr, .. }) => {
                assert_eq!(status, "exit status 3");
                assert_eq!(stderr, "no such as-set");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn missing_executable_is_a_launch_failure() {
        let invocation = Invocation {
            program: "/nonexistent/bin/RtConfig".into(),
            args: vec!["-config".into(), "cisco".into()],
        };
        let result = Runner::new().run(&invocation, b"should never be written");

        assert!(matches!(result.outcome, Outcome::LaunchFailed(_)));
        assert_eq!(result.pid, None);
        assert!(result.stdout.is_empty());
        assert!(result.stderr.is_empty());
        assert!(matches!(
            result.error(),
            Some(RenderError::Launch { ref program, .. }) if program == "/nonexistent/bin/RtConfig"
        ));
    }

    #[test]
    fn large_streams_do_not_deadlock() {
        // Bigger than any pipe buffer in every direction at once.
        let input = vec![b'x'; 4 * 1024 * 1024];
        let result = Runner::new()
            .with_timeout(Some(Duration::from_secs(30)))
            .run(&sh("tee /dev/stderr"), &input);

        assert_eq!(result.outcome, Outcome::Completed(0));
        assert_eq!(result.stdout.len(), input.len());
        assert_eq!(result.stderr.len(), input.len());
    }

    #[test]
    fn child_that_ignores_input_still_completes() {
        let input = vec![b'y'; 1024 * 1024];
        let result = Runner::new().run(&sh("printf done"), &input);

        assert_eq!(result.outcome, Outcome::Completed(0));
        assert_eq!(result.stdout, b"done");
    }

    #[test]
    fn hung_child_is_killed_at_deadline() {
        let invocation = Invocation {
            program: "sleep".into(),
            args: vec!["30".into()],
        };
        let started = Instant::now();
        let result = Runner::new()
            .with_timeout(Some(Duration::from_millis(100)))
            .run(&invocation, b"");

        assert_eq!(result.outcome, Outcome::TimedOut(Duration::from_millis(100)));
        assert!(started.elapsed() < Duration::from_secs(5));
        let pid = result.pid.expect("child was spawned");
        assert!(!process_exists(pid));
        assert!(matches!(result.error(), Some(RenderError::Timeout { .. })));
    }

    #[test]
    fn timeout_reaches_forked_helpers() {
        // The shell keeps stdout open through its background child.
        let started = Instant::now();
        let result = Runner::new()
            .with_timeout(Some(Duration::from_millis(100)))
            .run(&sh("printf partial; sleep 30 & wait"), b"");

        assert_eq!(result.outcome, Outcome::TimedOut(Duration::from_millis(100)));
        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(result.stdout, b"partial");
    }

    #[test]
    fn timeout_returns_while_detached_descendant_holds_pipes() {
        let has_setsid = Command::new("setsid")
            .arg("true")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|status| status.success())
            .unwrap_or(false);
        if !has_setsid {
            return;
        }

        // The setsid'd sleep leaves our process group but keeps stdout and stderr.
        let started = Instant::now();
        let result = Runner::new()
            .with_timeout(Some(Duration::from_millis(100)))
            .run(&sh("printf early; setsid sleep 3 & sleep 30"), b"");

        assert_eq!(result.outcome, Outcome::TimedOut(Duration::from_millis(100)));
        assert!(started.elapsed() < Duration::from_secs(2), "took {:?}", started.elapsed());
        assert!(!process_exists(result.pid.expect("child was spawned")));
    }

    #[test]
    fn panicked_worker_is_settled_without_unwinding() {
        let worker = thread::spawn(|| panic!("reader blew up"));
        while !worker.is_finished() {
            thread::sleep(POLL_INTERVAL);
        }
        settle(worker);
    }

    #[test]
    fn signal_termination_is_reported() {
        let result = Runner::new().run(&sh("kill -9 $$"), b"");

        assert_eq!(result.outcome, Outcome::Signaled(libc::SIGKILL));
        assert!(matches!(result.error(), Some(RenderError::NonZeroExit { .. })));
    }

    #[test]
    fn executed_arguments_match_command_line() {
        let invocation = Invocation {
            program: "sh".into(),
            args: vec![
                "-c".into(),
                r#"for a in "$@"; do printf '%s\n' "$a"; done"#.into(),
                "RtConfig".into(),
                "-h".into(),
                "whois.radb.net; echo pwned".into(),
                "-p".into(),
                "0".into(),
            ],
        };
        let result = Runner::new().run(&invocation, b"");

        assert_eq!(result.outcome, Outcome::Completed(0));
        assert_eq!(
            String::from_utf8_lossy(&result.stdout),
            "-h\nwhois.radb.net; echo pwned\n-p\n0\n"
        );
        assert!(result.invocation.command_line().contains("'whois.radb.net; echo pwned'"));
    }
}
