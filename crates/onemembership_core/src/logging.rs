//! Core logging bootstrap and safety policy.
//!
//! # Responsibility
//! - Initialize per-channel rolling log files exactly once per process.
//! - Emit stable, metadata-only diagnostic events from core.
//! - Move rotated log archives out of the active log directory.
//!
//! # Invariants
//! - Logging init is idempotent for the same directory, level and mode.
//! - Logging initialization must not panic.
//! - Re-initialization with a different configuration is rejected.
//! - Writes to each channel file are serialized by the logger backend.
//!
//! Channel records are addressed through the target constants below, e.g.
//! `info!(target: USER_LOG, "event=user_add module=user status=ok")`.

use flexi_logger::writers::{FileLogWriter, LogWriter};
use flexi_logger::{
    Cleanup, Criterion, DeferredNow, Duplicate, FileSpec, Logger, LoggerHandle, Naming, WriteMode,
};
use log::{error, info, Record};
use once_cell::sync::OnceCell;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

const LOG_FILE_BASENAME: &str = "onemembership";
const MAX_LOG_FILE_SIZE_BYTES: u64 = 2 * 1024 * 1024;
const MAX_LOG_FILES: usize = 10;
const MAX_PANIC_PAYLOAD_CHARS: usize = 160;
const ARCHIVE_EXTENSION: &str = "gz";

pub const USER_LOG: &str = "{user}";
pub const SERVICE_PROVIDER_LOG: &str = "{service_provider}";
pub const PROJECT_LOG: &str = "{project}";
pub const SUBSCRIPTION_PLAN_LOG: &str = "{subscription_plan}";
pub const SUBSCRIPTION_LOG: &str = "{subscription}";
pub const TRANSACTION_LOG: &str = "{transaction}";
pub const DELETED_LOG: &str = "{deleted}";
pub const SERVER_LOG: &str = "{server}";
pub const BOT_LOG: &str = "{bot}";
pub const ERROR_LOG: &str = "{error}";
pub const ARCHIVE_LOG: &str = "{archive}";

/// Named log channels, each backed by its own rotating file.
pub const LOG_CHANNELS: &[&str] = &[
    "user",
    "service_provider",
    "project",
    "subscription_plan",
    "subscription",
    "transaction",
    "deleted",
    "server",
    "bot",
    "error",
    "archive",
];

static LOGGING_STATE: OnceCell<LoggingState> = OnceCell::new();
static PANIC_HOOK_INSTALLED: OnceCell<()> = OnceCell::new();

/// Where log records go.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogMode {
    /// Files plus an echo of every record on stdout.
    Debug,
    /// Files only.
    Normal,
    /// Nothing is installed.
    Off,
}

impl LogMode {
    /// Parses `debug`, `normal` or `off`, case-insensitive.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "debug" => Some(Self::Debug),
            "normal" => Some(Self::Normal),
            "off" => Some(Self::Off),
            _ => None,
        }
    }
}

struct LoggingState {
    level: &'static str,
    log_dir: PathBuf,
    mode: LogMode,
    _logger: LoggerHandle,
}

/// Initializes core logging with level, directory and mode.
///
/// Channel files are named after the channel.
/// See [`init_logging_with_files`] to override file basenames.
///
/// # Errors
/// - Returns an error when `level` is unsupported.
/// - Returns an error when `log_dir` is empty, non-absolute, or cannot be created.
/// - Returns an error when logger backend setup fails.
/// - Returns an error when logging is already active with another configuration.
pub fn init_logging(level: &str, log_dir: &str, mode: LogMode) -> Result<(), String> {
    init_logging_with_files(level, log_dir, mode, &BTreeMap::new())
}

/// Initializes core logging with per-channel file basenames.
///
/// `files` maps a channel name from [`LOG_CHANNELS`] to a file basename;
/// missing channels fall back to the channel name. Unknown channels are rejected.
pub fn init_logging_with_files(
    level: &str,
    log_dir: &str,
    mode: LogMode,
    files: &BTreeMap<String, String>,
) -> Result<(), String> {
    let normalized_level = normalize_level(level)?;
    let normalized_dir = normalize_log_dir(log_dir)?;
    if let Some(unknown) = files.keys().find(|name| !LOG_CHANNELS.contains(&name.as_str())) {
        return Err(format!("unknown log channel `{unknown}`"));
    }

    if mode == LogMode::Off {
        return match LOGGING_STATE.get() {
            Some(state) => Err(format!(
                "logging already initialized in {:?} mode; refusing to switch to Off",
                state.mode
            )),
            None => Ok(()),
        };
    }

    if let Some(state) = LOGGING_STATE.get() {
        return check_same_config(state, normalized_level, &normalized_dir, mode);
    }

    let init_dir = normalized_dir.clone();
    let state = LOGGING_STATE.get_or_try_init(|| -> Result<LoggingState, String> {
        std::fs::create_dir_all(&init_dir).map_err(|err| {
            format!(
                "failed to create log directory `{}`: {err}",
                init_dir.display()
            )
        })?;

        let mut logger = Logger::try_with_str(normalized_level)
            .map_err(|err| format!("invalid log level `{normalized_level}`: {err}"))?
            .log_to_file(
                FileSpec::default()
                    .directory(init_dir.as_path())
                    .basename(LOG_FILE_BASENAME),
            )
            .rotate(
                Criterion::Size(MAX_LOG_FILE_SIZE_BYTES),
                Naming::Numbers,
                Cleanup::KeepCompressedFiles(MAX_LOG_FILES),
            )
            .write_mode(WriteMode::BufferAndFlush)
            .append()
            .format_for_files(flexi_logger::detailed_format);

        if mode == LogMode::Debug {
            logger = logger.duplicate_to_stdout(Duplicate::All);
        }

        for channel in LOG_CHANNELS {
            let basename = files
                .get(*channel)
                .map(String::as_str)
                .unwrap_or(channel);
            let writer = channel_writer(&init_dir, basename, mode == LogMode::Debug)?;
            logger = logger.add_writer(*channel, Box::new(writer));
        }

        let handle = logger
            .start()
            .map_err(|err| format!("failed to start logger: {err}"))?;

        install_panic_hook_once();

        info!(
            "event=app_start module=core status=ok platform={} build_mode={} version={}",
            std::env::consts::OS,
            build_mode(),
            env!("CARGO_PKG_VERSION")
        );
        info!(
            "event=core_init module=core status=ok level={} mode={:?} log_dir={}",
            normalized_level,
            mode,
            init_dir.display()
        );

        Ok(LoggingState {
            level: normalized_level,
            log_dir: init_dir,
            mode,
            _logger: handle,
        })
    })?;

    check_same_config(state, normalized_level, &normalized_dir, mode)
}

/// Returns active logging status metadata.
///
/// Returns `None` when logging is disabled or has not been initialized.
pub fn logging_status() -> Option<(&'static str, PathBuf)> {
    LOGGING_STATE
        .get()
        .map(|state| (state.level, state.log_dir.clone()))
}

/// Returns the default log level for current build mode.
///
/// - `debug` builds -> `debug`
/// - `release` builds -> `info`
pub fn default_log_level() -> &'static str {
    if cfg!(debug_assertions) {
        "debug"
    } else {
        "info"
    }
}

/// Moves compressed rotated logs from `log_dir` into `archive_dir`.
///
/// Returns the number of files moved.
pub fn archive_rotated_logs(log_dir: &Path, archive_dir: &Path) -> std::io::Result<usize> {
    std::fs::create_dir_all(archive_dir)?;

    let mut moved = 0;
    for entry in std::fs::read_dir(log_dir)? {
        let path = entry?.path();
        let is_archive = path.is_file()
            && path.extension().and_then(|ext| ext.to_str()) == Some(ARCHIVE_EXTENSION);
        if !is_archive {
            continue;
        }
        let Some(file_name) = path.file_name() else {
            continue;
        };
        let target = archive_dir.join(file_name);
        if let Err(err) = std::fs::rename(&path, &target) {
            error!(
                target: ERROR_LOG,
                "event=log_archive module=logging status=error file={} error={}",
                path.display(),
                sanitize_message(&err.to_string(), MAX_PANIC_PAYLOAD_CHARS)
            );
            return Err(err);
        }
        moved += 1;
    }

    info!(
        target: ARCHIVE_LOG,
        "event=log_archive module=logging status=ok moved={} archive_dir={}",
        moved,
        archive_dir.display()
    );
    Ok(moved)
}

fn check_same_config(
    state: &LoggingState,
    level: &'static str,
    log_dir: &Path,
    mode: LogMode,
) -> Result<(), String> {
    if state.log_dir != log_dir {
        return Err(format!(
            "logging already initialized at `{}`; refusing to switch to `{}`",
            state.log_dir.display(),
            log_dir.display()
        ));
    }
    if state.level != level {
        return Err(format!(
            "logging already initialized with level `{}`; refusing to switch to `{}`",
            state.level, level
        ));
    }
    if state.mode != mode {
        return Err(format!(
            "logging already initialized in {:?} mode; refusing to switch to {:?}",
            state.mode, mode
        ));
    }
    Ok(())
}

/// Rotating channel file, optionally echoed to stdout.
struct ChannelWriter {
    file: FileLogWriter,
    echo: bool,
}

impl LogWriter for ChannelWriter {
    fn write(&self, now: &mut DeferredNow, record: &Record<'_>) -> std::io::Result<()> {
        self.file.write(now, record)?;
        if self.echo {
            let mut out = std::io::stdout().lock();
            flexi_logger::default_format(&mut out, now, record)?;
            out.write_all(b"\n")?;
        }
        Ok(())
    }

    fn flush(&self) -> std::io::Result<()> {
        self.file.flush()
    }

    fn shutdown(&self) {
        self.file.shutdown();
    }
}

fn channel_writer(dir: &Path, basename: &str, echo: bool) -> Result<ChannelWriter, String> {
    let file = FileLogWriter::builder(FileSpec::default().directory(dir).basename(basename))
        .rotate(
            Criterion::Size(MAX_LOG_FILE_SIZE_BYTES),
            Naming::Numbers,
            Cleanup::KeepCompressedFiles(MAX_LOG_FILES),
        )
        .append()
        .format(flexi_logger::detailed_format)
        .try_build()
        .map_err(|err| format!("failed to open log channel `{basename}`: {err}"))?;
    Ok(ChannelWriter { file, echo })
}

fn normalize_level(level: &str) -> Result<&'static str, String> {
    match level.trim().to_ascii_lowercase().as_str() {
        "trace" => Ok("trace"),
        "debug" => Ok("debug"),
        "info" => Ok("info"),
        "warn" | "warning" => Ok("warn"),
        "error" => Ok("error"),
        other => Err(format!(
            "unsupported log level `{other}`; expected trace|debug|info|warn|error"
        )),
    }
}

fn normalize_log_dir(log_dir: &str) -> Result<PathBuf, String> {
    let trimmed = log_dir.trim();
    if trimmed.is_empty() {
        return Err("log_dir cannot be empty".to_string());
    }
    let path = Path::new(trimmed);
    if !path.is_absolute() {
        return Err(format!("log_dir must be an absolute path, got `{trimmed}`"));
    }
    Ok(path.to_path_buf())
}

fn build_mode() -> &'static str {
    if cfg!(debug_assertions) {
        "debug"
    } else {
        "release"
    }
}

fn install_panic_hook_once() {
    if PANIC_HOOK_INSTALLED.get().is_some() {
        return;
    }

    let previous_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        // Panic payloads may carry user input; keep them on one capped line.
        let location = panic_info
            .location()
            .map(|loc| format!("{}:{}", loc.file(), loc.line()))
            .unwrap_or_else(|| "unknown".to_string());
        let payload = panic_payload_summary(panic_info);
        error!(
            target: ERROR_LOG,
            "event=panic_captured module=core status=error location={} payload={}",
            location, payload
        );
        previous_hook(panic_info);
    }));

    let _ = PANIC_HOOK_INSTALLED.set(());
}

fn panic_payload_summary(info: &std::panic::PanicHookInfo<'_>) -> String {
    let payload = if let Some(message) = info.payload().downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = info.payload().downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    };

    sanitize_message(&payload, MAX_PANIC_PAYLOAD_CHARS)
}

/// Flattens `value` to one line and caps it at `max_chars` characters.
pub(crate) fn sanitize_message(value: &str, max_chars: usize) -> String {
    let normalized = value.replace(['\n', '\r'], " ");
    let mut truncated = normalized.chars().take(max_chars).collect::<String>();
    if normalized.chars().count() > max_chars {
        truncated.push_str("...");
    }
    truncated
}

#[cfg(test)]
mod tests {
    use super::{
        archive_rotated_logs, init_logging, init_logging_with_files, logging_status,
        normalize_level, normalize_log_dir, sanitize_message, LogMode,
    };
    use std::collections::BTreeMap;

    #[test]
    fn normalize_level_accepts_known_values() {
        assert_eq!(
            normalize_level("INFO").expect("INFO should normalize"),
            "info"
        );
        assert_eq!(
            normalize_level(" warning ").expect("warning should normalize"),
            "warn"
        );
    }

    #[test]
    fn normalize_log_dir_rejects_relative_path() {
        let error = normalize_log_dir("logs/dev").expect_err("relative paths must be rejected");
        assert!(error.contains("absolute"));
    }

    #[test]
    fn sanitize_message_removes_newlines_and_truncates() {
        let sanitized = sanitize_message("line1\nline2\rline3", 8);
        assert!(!sanitized.contains('\n'));
        assert!(!sanitized.contains('\r'));
        assert!(sanitized.ends_with("..."));
    }

    #[test]
    fn log_mode_parses_known_labels() {
        assert_eq!(LogMode::parse(" DEBUG "), Some(LogMode::Debug));
        assert_eq!(LogMode::parse("normal"), Some(LogMode::Normal));
        assert_eq!(LogMode::parse("off"), Some(LogMode::Off));
        assert_eq!(LogMode::parse("verbose"), None);
    }

    #[test]
    fn unknown_channel_basename_is_rejected() {
        let dir = tempfile::tempdir().expect("temp dir");
        let mut files = BTreeMap::new();
        files.insert("payments".to_string(), "payments".to_string());

        let error = init_logging_with_files(
            "info",
            dir.path().to_str().expect("utf-8 temp dir"),
            LogMode::Normal,
            &files,
        )
        .expect_err("unknown channel must fail");
        assert!(error.contains("payments"));
    }

    #[test]
    fn archive_moves_only_compressed_files() {
        let logs = tempfile::tempdir().expect("temp dir");
        let archive = logs.path().join("archive");
        std::fs::write(logs.path().join("user_r00001.log.gz"), b"old").expect("write gz");
        std::fs::write(logs.path().join("user.log"), b"live").expect("write log");

        let moved = archive_rotated_logs(logs.path(), &archive).expect("archive");

        assert_eq!(moved, 1);
        assert!(archive.join("user_r00001.log.gz").exists());
        assert!(logs.path().join("user.log").exists());
    }

    #[test]
    fn init_logging_is_idempotent_for_same_config_and_rejects_conflicts() {
        let log_dir = tempfile::tempdir().expect("temp dir");
        let log_dir_str = log_dir
            .path()
            .to_str()
            .expect("temp dir should be valid UTF-8")
            .to_string();
        let second_dir = tempfile::tempdir().expect("temp dir");
        let second_dir_str = second_dir
            .path()
            .to_str()
            .expect("temp dir should be valid UTF-8")
            .to_string();

        init_logging("info", &log_dir_str, LogMode::Normal).expect("first init should succeed");
        init_logging("info", &log_dir_str, LogMode::Normal)
            .expect("same config should be idempotent");

        let level_error = init_logging("debug", &log_dir_str, LogMode::Normal)
            .expect_err("level conflict should fail");
        assert!(level_error.contains("refusing to switch"));

        let mode_error = init_logging("info", &log_dir_str, LogMode::Debug)
            .expect_err("mode conflict should fail");
        assert!(mode_error.contains("refusing to switch"));

        let off_error =
            init_logging("info", &log_dir_str, LogMode::Off).expect_err("disabling should fail");
        assert!(off_error.contains("refusing to switch"));

        let dir_error = init_logging("info", &second_dir_str, LogMode::Normal)
            .expect_err("directory conflict should fail");
        assert!(dir_error.contains("refusing to switch"));

        let (active_level, active_dir) = logging_status().expect("logging should be active");
        assert_eq!(active_level, "info");
        assert_eq!(active_dir, log_dir.path());

        // The global logger outlives this test; keep its directory on disk so
        // later tests that log do not hit a deleted directory.
        std::mem::forget(log_dir);
    }
}
