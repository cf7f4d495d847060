//! Lifecycle of the frontend dev server process.
//!
//! One reader thread per output descriptor feeds the classifier; a watcher
//! thread reports the exit. The child is terminated through a registered
//! [`TerminationHook`], so it never outlives the session.

use std::env;
use std::io::{self, Read};
use std::iter;
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use nestipy_core::{Emission, Level, LineBuffer, LineSplit, SessionState, classify};
use portable_pty::{
    Child as PtyChild, ChildKiller, CommandBuilder, MasterPty, PtySize, native_pty_system,
};
use thiserror::Error;

use super::LogSink;
use crate::exit_hooks::{self, HookRegistry, TerminationHook};
use crate::process::exit_code;
use crate::threads::TrackedThread;

const READ_CHUNK: usize = 8192;
const READER_JOIN_TIMEOUT: Duration = Duration::from_secs(2);
const WATCHER_JOIN_TIMEOUT: Duration = Duration::from_secs(5);

const ENV_WEB_PTY: &str = "NESTIPY_WEB_PTY";

#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("Failed to parse command '{command}': {source}")]
    Parse {
        command: String,
        source: shell_words::ParseError,
    },

    #[error("Command is empty")]
    EmptyCommand,

    #[error("Failed to spawn '{command}': {source}")]
    Spawn { command: String, source: io::Error },

    #[error("Dependency install failed with exit code {code}")]
    PreflightFailed { code: i32 },

    #[error("Dependency install interrupted")]
    Interrupted,

    #[error("Failed to start thread: {0}")]
    Thread(io::Error),
}

/// A program invocation: argv, working directory, extra environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: PathBuf,
    pub env: Vec<(String, String)>,
}

impl CommandSpec {
    pub fn from_argv(argv: Vec<String>, cwd: PathBuf) -> Result<Self, SupervisorError> {
        let mut argv = argv.into_iter();
        let program = argv.next().ok_or(SupervisorError::EmptyCommand)?;
        Ok(Self {
            program,
            args: argv.collect(),
            cwd,
            env: Vec::new(),
        })
    }

    pub fn parse(command: &str, cwd: PathBuf) -> Result<Self, SupervisorError> {
        let argv = shell_words::split(command).map_err(|source| SupervisorError::Parse {
            command: command.to_string(),
            source,
        })?;
        Self::from_argv(argv, cwd)
    }

    pub fn with_env(mut self, env: Vec<(String, String)>) -> Self {
        self.env = env;
        self
    }

    pub fn display(&self) -> String {
        shell_words::join(iter::once(&self.program).chain(&self.args))
    }

    fn spawn_error(&self, source: io::Error) -> SupervisorError {
        SupervisorError::Spawn {
            command: self.display(),
            source,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    Pty,
    Pipes,
}

fn parse_bool_env(value: &str) -> Option<bool> {
    match value.trim() {
        "1" | "true" | "TRUE" | "yes" | "YES" | "on" | "ON" => Some(true),
        "0" | "false" | "FALSE" | "no" | "NO" | "off" | "OFF" => Some(false),
        _ => None,
    }
}

/// Pseudo-terminal unless `NESTIPY_WEB_PTY` says otherwise.
pub fn resolve_use_pty() -> bool {
    if let Ok(value) = env::var(ENV_WEB_PTY) {
        if let Some(parsed) = parse_bool_env(&value) {
            return parsed;
        }
        tracing::warn!("ignoring invalid {ENV_WEB_PTY}={value:?}");
    }
    true
}

fn pty_size() -> PtySize {
    let dim = |key: &str, fallback: u16| {
        env::var(key)
            .ok()
            .and_then(|value| value.parse::<u16>().ok())
            .filter(|value| *value > 0)
            .unwrap_or(fallback)
    };
    PtySize {
        rows: dim("LINES", 40),
        cols: dim("COLUMNS", 120),
        pixel_width: 0,
        pixel_height: 0,
    }
}

fn pty_error(err: impl std::fmt::Display) -> io::Error {
    io::Error::other(err.to_string())
}

#[cfg(target_os = "linux")]
fn set_parent_death_signal() -> io::Result<()> {
    if unsafe { libc::prctl(libc::PR_SET_PDEATHSIG, libc::SIGTERM) } == -1 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

/// SIGTERM to the child's whole process group; `taskkill /T` elsewhere.
fn terminate_process_tree(pid: u32) {
    #[cfg(unix)]
    {
        let Ok(pid) = libc::pid_t::try_from(pid) else {
            return;
        };
        if unsafe { libc::kill(-pid, libc::SIGTERM) } == -1 {
            let err = io::Error::last_os_error();
            if err.raw_os_error() != Some(libc::ESRCH) {
                tracing::warn!(pid, "failed to terminate process group: {err}");
            }
        }
    }

    #[cfg(not(unix))]
    {
        let status = Command::new("taskkill")
            .args(["/PID", &pid.to_string(), "/T", "/F"])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();
        if let Err(err) = status {
            tracing::warn!(pid, "failed to terminate process tree: {err}");
        }
    }
}

fn termination_hook(
    name: &str,
    pid: Option<u32>,
    killer: Option<Box<dyn ChildKiller + Send + Sync>>,
    stopping: Arc<AtomicBool>,
) -> Arc<TerminationHook> {
    TerminationHook::new(name, move || {
        stopping.store(true, Ordering::Release);
        match (pid, killer) {
            (Some(pid), _) => terminate_process_tree(pid),
            (None, Some(mut killer)) => {
                if let Err(err) = killer.kill() {
                    tracing::warn!("failed to kill child: {err}");
                }
            }
            (None, None) => {}
        }
    })
}

enum ChildProcess {
    Pty(Box<dyn PtyChild + Send + Sync>),
    Pipe(Child),
}

impl ChildProcess {
    fn wait(&mut self) -> io::Result<i32> {
        match self {
            ChildProcess::Pty(child) => child.wait().map(|status| status.exit_code() as i32),
            ChildProcess::Pipe(child) => child.wait().map(|status| exit_code(&status)),
        }
    }
}

fn dispatch(line: &str, state: &SessionState, sink: &dyn LogSink) {
    for emission in classify(line, state).emissions() {
        sink.emit(emission);
    }
}

/// Read until EOF or error, classifying each completed line. The residual
/// partial line is flushed at the end.
pub fn consume_lines<R: Read>(mut reader: R, state: &SessionState, sink: &dyn LogSink) {
    let mut buffer = LineBuffer::new(LineSplit::NewlineOrCarriage);
    let mut chunk = [0u8; READ_CHUNK];
    loop {
        match reader.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => {
                for line in buffer.push(&chunk[..n]) {
                    dispatch(&line, state, sink);
                }
            }
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => {
                tracing::debug!("frontend stream closed: {err}");
                break;
            }
        }
    }
    if let Some(rest) = buffer.finish() {
        dispatch(&rest, state, sink);
    }
}

/// Owns the running dev server: its reader threads, its watcher, and its
/// termination hook. Dropping the handle tears the process down.
pub struct ProcessHandle {
    pid: Option<u32>,
    transport: Transport,
    hook: Arc<TerminationHook>,
    readers: Vec<TrackedThread>,
    watcher: Option<TrackedThread>,
    // Kept open for the child's lifetime.
    _master: Option<Box<dyn MasterPty + Send>>,
}

impl ProcessHandle {
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub fn transport(&self) -> Transport {
        self.transport
    }

    pub fn has_exited(&self) -> bool {
        self.watcher.as_ref().is_none_or(TrackedThread::is_finished)
    }

    /// Wait for the child to exit by itself, then drain its output.
    #[cfg(test)]
    pub fn wait_timeout(&mut self, timeout: Duration) -> bool {
        let exited = self
            .watcher
            .take()
            .is_none_or(|watcher| watcher.join_timeout(timeout));
        self.join_readers();
        exited
    }

    pub fn shutdown(mut self) {
        self.teardown();
    }

    fn join_readers(&mut self) {
        for reader in self.readers.drain(..) {
            reader.join_timeout(READER_JOIN_TIMEOUT);
        }
    }

    fn teardown(&mut self) {
        self.hook.fire();
        if let Some(watcher) = self.watcher.take() {
            watcher.join_timeout(WATCHER_JOIN_TIMEOUT);
        }
        self.join_readers();
    }
}

impl Drop for ProcessHandle {
    fn drop(&mut self) {
        self.teardown();
    }
}

pub struct ProcessSupervisor {
    state: Arc<SessionState>,
    sink: Arc<dyn LogSink>,
    hooks: Arc<HookRegistry>,
    use_pty: bool,
    color: bool,
}

impl ProcessSupervisor {
    /// Children register their termination hooks with the global registry
    /// and the dev server prefers a pty.
    pub fn new(state: Arc<SessionState>, sink: Arc<dyn LogSink>) -> Self {
        Self {
            state,
            sink,
            hooks: exit_hooks::global(),
            use_pty: true,
            color: false,
        }
    }

    pub fn with_pty(mut self, use_pty: bool) -> Self {
        self.use_pty = use_pty;
        self
    }

    #[cfg(test)]
    fn with_hooks(mut self, hooks: Arc<HookRegistry>) -> Self {
        self.hooks = hooks;
        self
    }

    /// Ask pipe-attached children for colored output.
    pub fn with_color(mut self, color: bool) -> Self {
        self.color = color;
        self
    }

    /// Send a session message through the same sink as the child output.
    pub fn report(&self, level: Level, message: impl Into<String>) {
        self.sink.emit(&Emission::line(level, message));
    }

    /// Run the dependency install to completion. Non-zero exit aborts the
    /// session start. Firing the registered hooks stops the install and
    /// yields [`SupervisorError::Interrupted`].
    pub fn run_install(&self, spec: &CommandSpec) -> Result<(), SupervisorError> {
        self.report(
            Level::Info,
            format!("Installing web dependencies ({})", spec.display()),
        );
        let mut child = self
            .pipe_command(spec)
            .spawn()
            .map_err(|source| spec.spawn_error(source))?;

        // The install runs in its own process group and never sees the
        // terminal's Ctrl-C.
        let stopping = Arc::new(AtomicBool::new(false));
        let hook = termination_hook(
            "web dependency install",
            Some(child.id()),
            None,
            Arc::clone(&stopping),
        );
        self.hooks.register(&hook);

        let readers = match self.spawn_pipe_readers(&mut child, "web-install") {
            Ok(readers) => readers,
            Err(err) => {
                hook.disarm();
                let _ = child.kill();
                let _ = child.wait();
                return Err(err);
            }
        };
        let status = child.wait();
        hook.disarm();
        let status = status.map_err(|source| spec.spawn_error(source))?;
        for reader in readers {
            reader.join_timeout(READER_JOIN_TIMEOUT);
        }

        if stopping.load(Ordering::Acquire) {
            self.report(Level::Warning, "Dependency install interrupted");
            return Err(SupervisorError::Interrupted);
        }
        let code = exit_code(&status);
        if code != 0 {
            self.report(
                Level::Error,
                format!("Dependency install failed with exit code {code}"),
            );
            return Err(SupervisorError::PreflightFailed { code });
        }
        self.report(Level::Success, "Web dependencies installed");
        Ok(())
    }

    /// Spawn the dev server on a pseudo-terminal, falling back to pipes when
    /// no pty can be allocated.
    pub fn spawn_dev_server(&self, spec: &CommandSpec) -> Result<ProcessHandle, SupervisorError> {
        if self.use_pty {
            match self.spawn_pty(spec) {
                Ok(handle) => return Ok(handle),
                Err(err) => tracing::debug!("pty unavailable, using pipes: {err}"),
            }
        }
        self.spawn_pipes(spec)
    }

    fn spawn_pty(&self, spec: &CommandSpec) -> io::Result<ProcessHandle> {
        let pair = native_pty_system().openpty(pty_size()).map_err(pty_error)?;

        let mut builder = CommandBuilder::new(&spec.program);
        builder.args(&spec.args);
        builder.cwd(&spec.cwd);
        if env::var_os("TERM").is_none() {
            builder.env("TERM", "xterm-256color");
        }
        for (key, value) in &spec.env {
            builder.env(key, value);
        }

        let child = pair.slave.spawn_command(builder).map_err(pty_error)?;
        drop(pair.slave);

        let pid = child.process_id();
        let stopping = Arc::new(AtomicBool::new(false));
        let hook = termination_hook(
            "web dev server",
            pid,
            Some(child.clone_killer()),
            Arc::clone(&stopping),
        );
        self.hooks.register(&hook);

        let mut handle = ProcessHandle {
            pid,
            transport: Transport::Pty,
            hook,
            readers: Vec::with_capacity(1),
            watcher: None,
            _master: None,
        };
        let reader = pair.master.try_clone_reader().map_err(pty_error)?;
        handle._master = Some(pair.master);
        handle.readers.push(self.spawn_reader("web-pty", reader)?);
        handle.watcher =
            Some(self.spawn_watcher(ChildProcess::Pty(child), &handle.hook, stopping)?);
        tracing::info!(pid = ?pid, "web dev server started on a pty");
        Ok(handle)
    }

    fn spawn_pipes(&self, spec: &CommandSpec) -> Result<ProcessHandle, SupervisorError> {
        let mut child = self
            .pipe_command(spec)
            .spawn()
            .map_err(|source| spec.spawn_error(source))?;

        let pid = child.id();
        let stopping = Arc::new(AtomicBool::new(false));
        let hook = termination_hook("web dev server", Some(pid), None, Arc::clone(&stopping));
        self.hooks.register(&hook);

        let mut handle = ProcessHandle {
            pid: Some(pid),
            transport: Transport::Pipes,
            hook,
            readers: Vec::with_capacity(2),
            watcher: None,
            _master: None,
        };
        handle.readers = self.spawn_pipe_readers(&mut child, "web")?;
        handle.watcher = Some(
            self.spawn_watcher(ChildProcess::Pipe(child), &handle.hook, stopping)
                .map_err(SupervisorError::Thread)?,
        );
        tracing::info!(pid, "web dev server started on pipes");
        Ok(handle)
    }

    fn pipe_command(&self, spec: &CommandSpec) -> Command {
        let mut command = Command::new(&spec.program);
        command
            .args(&spec.args)
            .current_dir(&spec.cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if self.color {
            command.env("FORCE_COLOR", "1");
        }
        for (key, value) in &spec.env {
            command.env(key, value);
        }

        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            command.process_group(0);
        }

        #[cfg(target_os = "linux")]
        {
            use std::os::unix::process::CommandExt;
            unsafe {
                command.pre_exec(set_parent_death_signal);
            }
        }

        command
    }

    fn spawn_pipe_readers(
        &self,
        child: &mut Child,
        label: &str,
    ) -> Result<Vec<TrackedThread>, SupervisorError> {
        let mut readers = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            readers.push(
                self.spawn_reader(&format!("{label}-stdout"), stdout)
                    .map_err(SupervisorError::Thread)?,
            );
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(
                self.spawn_reader(&format!("{label}-stderr"), stderr)
                    .map_err(SupervisorError::Thread)?,
            );
        }
        Ok(readers)
    }

    fn spawn_reader<R>(&self, name: &str, reader: R) -> io::Result<TrackedThread>
    where
        R: Read + Send + 'static,
    {
        let state = Arc::clone(&self.state);
        let sink = Arc::clone(&self.sink);
        TrackedThread::spawn(name, move || consume_lines(reader, &state, sink.as_ref()))
    }

    fn spawn_watcher(
        &self,
        mut child: ChildProcess,
        hook: &Arc<TerminationHook>,
        stopping: Arc<AtomicBool>,
    ) -> io::Result<TrackedThread> {
        let sink = Arc::clone(&self.sink);
        let hook = Arc::clone(hook);
        TrackedThread::spawn("web-watcher", move || {
            let result = child.wait();
            // Reaped: the pid may be reused from here on.
            hook.disarm();
            let emission = match result {
                Ok(0) => Emission::line(Level::Info, "Web dev server stopped"),
                Ok(_) if stopping.load(Ordering::Acquire) => {
                    Emission::line(Level::Info, "Web dev server stopped")
                }
                Ok(code) => Emission::line(
                    Level::Error,
                    format!("Web dev server exited with code {code}"),
                ),
                Err(err) => Emission::line(
                    Level::Error,
                    format!("Failed to wait for web dev server: {err}"),
                ),
            };
            sink.emit(&emission);
        })
    }
}
