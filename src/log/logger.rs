use std::{
    fs::{self, OpenOptions},
    io::{self, BufWriter, Write},
    path::{Path, PathBuf},
    sync::mpsc::{self, TrySendError},
    thread,
};

use crate::config::Config;
use crate::log::{log_level::LogLevel, log_msg::LogMsg, logger_handle::LoggerHandle};

/// Flush to disk every 16 lines when debugging so crashes leave a useful tail.
#[cfg(feature = "log-debug")]
const FLUSH_BATCH_SIZE: u32 = 16;

/// Flush every 256 lines otherwise.
#[cfg(not(feature = "log-debug"))]
const FLUSH_BATCH_SIZE: u32 = 256;

pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// Bounded, non-blocking logger writing to a per-process file.
///
/// Producers enqueue through a [`LoggerHandle`]; a dedicated `logger-worker`
/// thread drains the queue, writes one line per message and flushes in
/// batches. Lines at or above `echo_level` are also copied to stderr.
pub struct Logger {
    handle: LoggerHandle,
    thread: Option<thread::JoinHandle<()>>,
    file_path: PathBuf,
}

impl Logger {
    /// Start a server logger from the `[Logging]` section:
    ///
    /// - `server_log_path`: directory (default `logs/` next to the executable)
    /// - `server_log_filename`: file prefix (default `signaling_server`)
    /// - `queue_capacity`: bounded queue length
    /// - `echo_level`: `trace|debug|info|warn|error|off` (default `warn`)
    pub fn start_server(config: &Config) -> Self {
        let prefix =
            config.get_non_empty_or_default("Logging", "server_log_filename", "signaling_server");
        let cap = config
            .get_parsed::<usize>("Logging", "queue_capacity")
            .unwrap_or(DEFAULT_QUEUE_CAPACITY);
        let echo = config
            .get_non_empty("Logging", "echo_level")
            .map_or(Some(LogLevel::Warn), parse_echo_level);

        let dir = config
            .get_non_empty("Logging", "server_log_path")
            .map(expand_path)
            .unwrap_or_else(|| exe_dir_fallback_cwd().join("logs"));

        Self::start_in_dir(dir, prefix, cap, echo)
    }

    /// Start the logger in `dir`, creating it if missing.
    ///
    /// The file is named `{prefix}-{unix_secs}-pid{pid}.log`. If it cannot be
    /// opened the worker falls back to a file in the temp dir, then to
    /// `io::sink()`; starting a logger never fails.
    pub fn start_in_dir<D: AsRef<Path>>(
        dir: D,
        prefix: &str,
        cap: usize,
        echo_level: Option<LogLevel>,
    ) -> Self {
        let dir = dir.as_ref().to_path_buf();
        let _ = fs::create_dir_all(&dir);

        let secs = crate::log::now_millis() / 1000;
        let file_path = dir.join(format!("{prefix}-{secs}-pid{}.log", std::process::id()));

        let (tx, rx) = mpsc::sync_channel::<LogMsg>(cap.max(1));
        let worker_path = file_path.clone();

        let thread = thread::Builder::new()
            .name("logger-worker".into())
            .spawn(move || {
                let mut out = BufWriter::new(open_writer(&worker_path));
                let mut lines_written: u32 = 0;

                while let Ok(m) = rx.recv() {
                    let line = m.render();
                    let _ = writeln!(out, "{line}");
                    if echo_level.is_some_and(|min| m.level >= min) {
                        eprintln!("{line}");
                    }

                    lines_written = lines_written.wrapping_add(1);
                    if lines_written % FLUSH_BATCH_SIZE == 0 {
                        let _ = out.flush();
                    }
                }

                let _ = out.flush();
            })
            .ok();

        Self {
            handle: LoggerHandle { tx },
            thread,
            file_path,
        }
    }

    /// Enqueue directly on the logger; see [`LoggerHandle::try_log`].
    pub fn try_log<S: Into<String>>(
        &self,
        level: LogLevel,
        text: S,
        target: &'static str,
    ) -> Result<(), TrySendError<LogMsg>> {
        self.handle.try_log(level, text, target)
    }

    #[must_use]
    pub fn handle(&self) -> LoggerHandle {
        self.handle.clone()
    }

    #[must_use]
    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    /// Drop this logger's sender and wait for the worker to flush.
    ///
    /// Blocks until every other [`LoggerHandle`] clone has been dropped too.
    pub fn close(self) {
        let Self { handle, thread, .. } = self;
        drop(handle);
        if let Some(t) = thread {
            let _ = t.join();
        }
    }
}

fn open_writer(path: &Path) -> Box<dyn Write + Send> {
    if let Ok(f) = OpenOptions::new().create(true).append(true).open(path) {
        return Box::new(f);
    }
    let fallback = std::env::temp_dir().join("peercall-fallback.log");
    match OpenOptions::new().create(true).append(true).open(fallback) {
        Ok(f) => Box::new(f),
        Err(_) => Box::new(io::sink()),
    }
}

fn parse_echo_level(s: &str) -> Option<LogLevel> {
    match s.to_ascii_lowercase().as_str() {
        "trace" => Some(LogLevel::Trace),
        "debug" => Some(LogLevel::Debug),
        "info" => Some(LogLevel::Info),
        "warn" => Some(LogLevel::Warn),
        "error" => Some(LogLevel::Error),
        _ => None,
    }
}

/// Directory of the running executable, or the current directory.
fn exe_dir_fallback_cwd() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")))
}

/// Expand a leading `~` to the home directory.
fn expand_path(path_str: &str) -> PathBuf {
    let home = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .ok()
        .map(PathBuf::from);

    match (path_str, home) {
        ("~", Some(home)) => home,
        (p, Some(home)) if p.starts_with("~/") || p.starts_with("~\\") => home.join(&p[2..]),
        (p, _) => PathBuf::from(p),
    }
}
