//! The layout engine boundary.
//!
//! A [`LayoutEngine`] accepts a textual graph description and returns the
//! rendered document together with the terminal state of the run. The only
//! production implementation is [`DotExecutable`], which drives a Graphviz
//! `dot` process; tests substitute scripted engines.

use std::{
    env, fmt,
    io::{self, Read, Write},
    path::{Path, PathBuf},
    process::{Child, Command, ExitStatus, Stdio},
    sync::{Mutex, OnceLock},
    thread,
    time::{Duration, Instant},
};

use log::{debug, trace, warn};
use regex::Regex;
use thiserror::Error;

use crate::config::EngineConfig;

/// Errors raised by an engine before a terminal state is reached.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The engine runtime itself crashed. Recoverable once by re-probing the
    /// version and resubmitting.
    #[error("layout engine runtime crashed: {cause}")]
    RuntimeCrash { cause: String },

    #[error("cannot start layout engine `{path}`: {source}")]
    Spawn { path: PathBuf, source: io::Error },

    #[error("no layout engine executable available")]
    NoExecutable,

    #[error("I/O error talking to the layout engine: {0}")]
    Io(#[from] io::Error),
}

/// Output document format requested from the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Svg,
}

impl OutputFormat {
    /// Command-line flag selecting this format.
    pub fn flag(self) -> &'static str {
        match self {
            Self::Svg => "-Tsvg",
        }
    }
}

/// How an engine run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    TerminatedOk,
    /// Killed after exceeding the configured timeout.
    Timeout,
    /// Exited with a non-zero status code.
    Exited(i32),
}

impl ProcessState {
    pub fn is_ok(self) -> bool {
        self == Self::TerminatedOk
    }
}

impl fmt::Display for ProcessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TerminatedOk => write!(f, "TERMINATED_OK"),
            Self::Timeout => write!(f, "TIMEOUT"),
            Self::Exited(code) => write!(f, "EXIT_CODE {code}"),
        }
    }
}

/// Result of one engine submission.
#[derive(Debug, Clone)]
pub struct EngineOutput {
    pub document: String,
    pub state: ProcessState,
    /// Engine-reported cause of an abnormal termination.
    pub cause: Option<String>,
}

impl EngineOutput {
    /// A normally terminated run producing `document`.
    pub fn ok(document: impl Into<String>) -> Self {
        Self {
            document: document.into(),
            state: ProcessState::TerminatedOk,
            cause: None,
        }
    }
}

/// Usability of the resolved engine executable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutableState {
    Ok,
    /// No executable was resolved at all.
    Unset,
    DoesNotExist,
    IsADirectory,
    NotAFile,
    CannotBeRead,
    /// The engine runs in-process and needs no executable.
    Embedded,
}

impl ExecutableState {
    /// Checks the file at `path`.
    pub fn check(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::Unset;
        };
        if !path.exists() {
            return Self::DoesNotExist;
        }
        if path.is_dir() {
            return Self::IsADirectory;
        }
        if !path.is_file() {
            return Self::NotAFile;
        }
        if std::fs::File::open(path).is_err() {
            return Self::CannotBeRead;
        }
        Self::Ok
    }

    pub fn is_usable(self) -> bool {
        matches!(self, Self::Ok | Self::Embedded)
    }

    /// Human readable description used in the missing-engine diagnostic.
    pub fn message(self) -> &'static str {
        match self {
            Self::Ok => "File OK",
            Self::Unset => "No dot executable found",
            Self::DoesNotExist => "File does not exist",
            Self::IsADirectory => "It should be a file, not a directory",
            Self::NotAFile => "Not a valid file",
            Self::CannotBeRead => "File could not be read",
            Self::Embedded => "Embedded engine, no executable required",
        }
    }
}

/// A Graphviz version number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct EngineVersion {
    major: u32,
    minor: u32,
    patch: u32,
}

impl EngineVersion {
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Extracts the first `major.minor[.patch]` number found in `text`.
    ///
    /// ```
    /// # use strata::engine::EngineVersion;
    /// let version = EngineVersion::parse("dot - graphviz version 2.43.0 (0)").unwrap();
    /// assert_eq!(version, EngineVersion::new(2, 43, 0));
    /// assert!(EngineVersion::parse("no digits here").is_none());
    /// ```
    pub fn parse(text: &str) -> Option<Self> {
        static RE: OnceLock<Regex> = OnceLock::new();
        let re = RE.get_or_init(|| {
            Regex::new(r"(\d+)\.(\d+)(?:\.(\d+))?").expect("valid version regex")
        });
        let caps = re.captures(text)?;
        let major = caps.get(1)?.as_str().parse().ok()?;
        let minor = caps.get(2)?.as_str().parse().ok()?;
        let patch = caps
            .get(3)
            .and_then(|m| m.as_str().parse().ok())
            .unwrap_or(0);
        Some(Self::new(major, minor, patch))
    }

    /// Forced label placement (`forcelabels`) exists from 2.30 on.
    pub fn supports_forced_labels(self) -> bool {
        self >= Self::new(2, 30, 0)
    }
}

impl fmt::Display for EngineVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// A graph layout service.
///
/// Implementations are used by exactly one render at a time.
pub trait LayoutEngine {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Lays out `request` and returns the rendered document.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::RuntimeCrash`] when the engine runtime crashed,
    /// and other [`EngineError`]s when the engine could not be driven at all.
    /// A run that terminates abnormally is reported through
    /// [`EngineOutput::state`] instead.
    fn submit(&self, request: &str, format: OutputFormat) -> Result<EngineOutput, EngineError>;

    /// Resolved executable, if the engine needs one.
    fn executable(&self) -> Option<PathBuf>;

    fn executable_state(&self) -> ExecutableState;

    /// Engine version. Cached after the first query unless `refresh` is set.
    fn version(&self, refresh: bool) -> Option<EngineVersion>;
}

/// Drives a Graphviz `dot` executable.
#[derive(Debug)]
pub struct DotExecutable {
    path: Option<PathBuf>,
    timeout: Duration,
    version: Mutex<Option<Option<EngineVersion>>>,
}

impl DotExecutable {
    const ENV_VAR: &'static str = "GRAPHVIZ_DOT";
    const FALLBACK: &'static str = "/usr/bin/dot";
    const POLL_INTERVAL: Duration = Duration::from_millis(10);

    /// Resolves the executable from the configuration, the `GRAPHVIZ_DOT`
    /// environment variable, `PATH`, then `/usr/bin/dot`, in that order.
    pub fn from_config(config: &EngineConfig) -> Self {
        let path = Self::locate(config.dot_path().map(PathBuf::as_path));
        debug!(path:? = path, timeout_secs = config.timeout_secs(); "Resolved dot executable");
        Self::new(path, config.timeout())
    }

    pub fn new(path: Option<PathBuf>, timeout: Duration) -> Self {
        Self {
            path,
            timeout,
            version: Mutex::new(None),
        }
    }

    fn locate(explicit: Option<&Path>) -> Option<PathBuf> {
        if let Some(path) = explicit {
            return Some(path.to_path_buf());
        }
        if let Some(path) = env::var_os(Self::ENV_VAR).filter(|p| !p.is_empty()) {
            return Some(PathBuf::from(path));
        }
        let exe_name = if cfg!(windows) { "dot.exe" } else { "dot" };
        if let Some(found) = env::var_os("PATH").and_then(|paths| {
            env::split_paths(&paths)
                .map(|dir| dir.join(exe_name))
                .find(|candidate| candidate.is_file())
        }) {
            return Some(found);
        }
        let fallback = PathBuf::from(Self::FALLBACK);
        fallback.is_file().then_some(fallback)
    }

    fn query_version(&self) -> Option<EngineVersion> {
        let path = self.path.as_ref()?;
        let mut child = Command::new(path)
            .arg("-V")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .ok()?;
        let stdout = child.stdout.take().map(pump);
        let stderr = child.stderr.take().map(pump);

        if self.wait_until_timeout(&mut child).ok()?.is_none() {
            return None;
        }

        // `dot -V` prints on stderr.
        let text = format!("{}{}", collect(stderr).ok()?, collect(stdout).ok()?);
        let version = EngineVersion::parse(&text);
        debug!(version:? = version; "Queried dot version");
        version
    }

    /// Polls `child` until it exits or the timeout expires, killing it on
    /// expiry. Returns `None` when the child was killed.
    fn wait_until_timeout(&self, child: &mut Child) -> io::Result<Option<ExitStatus>> {
        let started = Instant::now();
        loop {
            if let Some(status) = child.try_wait()? {
                return Ok(Some(status));
            }
            if started.elapsed() >= self.timeout {
                warn!(timeout_secs = self.timeout.as_secs(); "Layout engine timed out, killing it");
                child.kill()?;
                child.wait()?;
                return Ok(None);
            }
            thread::sleep(Self::POLL_INTERVAL);
        }
    }

    fn run(&self, path: &Path, request: &str, format: OutputFormat) -> Result<EngineOutput, EngineError> {
        let mut child = Command::new(path)
            .arg(format.flag())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| EngineError::Spawn {
                path: path.to_path_buf(),
                source,
            })?;

        // Pump both pipes on their own threads so a large response cannot
        // block the request write.
        let stdout = child.stdout.take().map(pump);
        let stderr = child.stderr.take().map(pump);

        if let Some(mut stdin) = child.stdin.take() {
            match stdin.write_all(request.as_bytes()) {
                Ok(()) => {}
                // The engine stopped reading, usually on a syntax error. Its
                // exit state and diagnostics are collected below.
                Err(err) if err.kind() == io::ErrorKind::BrokenPipe => {
                    debug!(err:% = err; "Layout engine closed its input early");
                }
                Err(err) => {
                    let _ = child.kill();
                    let _ = child.wait();
                    let _ = collect(stdout);
                    let _ = collect(stderr);
                    return Err(err.into());
                }
            }
        }

        let status = self.wait_until_timeout(&mut child)?;

        let document = collect(stdout)?;
        let diagnostics = collect(stderr)?;
        let cause = (!diagnostics.trim().is_empty()).then(|| diagnostics.trim().to_string());

        let state = match status {
            None => ProcessState::Timeout,
            Some(status) if status.success() => ProcessState::TerminatedOk,
            Some(status) => match status.code() {
                Some(code) => ProcessState::Exited(code),
                // Terminated by a signal: the engine itself crashed.
                None => {
                    return Err(EngineError::RuntimeCrash {
                        cause: cause.unwrap_or_else(|| status.to_string()),
                    });
                }
            },
        };

        Ok(EngineOutput {
            document,
            state,
            cause,
        })
    }
}

type Pump = thread::JoinHandle<io::Result<String>>;

fn pump<R: Read + Send + 'static>(mut reader: R) -> Pump {
    thread::spawn(move || {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    })
}

fn collect(pump: Option<Pump>) -> io::Result<String> {
    match pump {
        Some(handle) => handle
            .join()
            .map_err(|_| io::Error::other("engine pipe reader panicked"))?,
        None => Ok(String::new()),
    }
}

impl LayoutEngine for DotExecutable {
    fn name(&self) -> &str {
        "dot"
    }

    fn submit(&self, request: &str, format: OutputFormat) -> Result<EngineOutput, EngineError> {
        let path = self.path.as_deref().ok_or(EngineError::NoExecutable)?;
        trace!(request = request; "Submitting layout request");
        self.run(path, request, format)
    }

    fn executable(&self) -> Option<PathBuf> {
        self.path.clone()
    }

    fn executable_state(&self) -> ExecutableState {
        ExecutableState::check(self.path.as_deref())
    }

    fn version(&self, refresh: bool) -> Option<EngineVersion> {
        let Ok(mut cached) = self.version.lock() else {
            return self.query_version();
        };
        if refresh || cached.is_none() {
            *cached = Some(self.query_version());
        }
        cached.flatten()
    }
}
