//! Core logging bootstrap and safety policy.
//!
//! # Responsibility
//! - Initialize rolling file logs and/or stderr output once per process.
//! - Emit stable, key=value diagnostic events from core.
//!
//! # Invariants
//! - Logging init is idempotent for an identical `LoggingConfig`.
//! - Re-initialization with a different level, directory or console flag is
//!   rejected.
//! - Logging initialization must not panic.

use crate::config::LoggingConfig;
use flexi_logger::{
    Cleanup, Criterion, Duplicate, FileSpec, Logger, LoggerHandle, Naming, WriteMode,
};
use log::{error, info};
use once_cell::sync::OnceCell;
use std::path::{Path, PathBuf};

const LOG_FILE_BASENAME: &str = "usercrud";
const MAX_LOG_FILE_SIZE_BYTES: u64 = 10 * 1024 * 1024;
const MAX_LOG_FILES: usize = 5;
const MAX_PANIC_PAYLOAD_CHARS: usize = 160;

static LOGGING_STATE: OnceCell<LoggingState> = OnceCell::new();
static PANIC_HOOK_INSTALLED: OnceCell<()> = OnceCell::new();

#[derive(Debug, Clone, PartialEq, Eq)]
struct Settings {
    level: &'static str,
    log_dir: Option<PathBuf>,
    console: bool,
}

struct LoggingState {
    settings: Settings,
    /// Level the installed logger actually filters at.
    active_level: &'static str,
    _logger: LoggerHandle,
}

/// Initializes core logging from configuration.
///
/// With neither a directory nor console output configured, warnings and
/// errors still go to stderr, at `warn` or the configured level if stricter.
///
/// # Errors
/// - Returns an error when the level is unsupported.
/// - Returns an error when `dir` is empty, non-absolute, or cannot be created.
/// - Returns an error when a different configuration is already active.
/// - Returns an error when logger backend setup fails.
pub fn init_logging(config: &LoggingConfig) -> Result<(), String> {
    let requested = Settings {
        level: normalize_level(&config.level)?,
        log_dir: config.dir.as_deref().map(normalize_log_dir).transpose()?,
        console: config.console,
    };

    let state = LOGGING_STATE.get_or_try_init(|| start_logger(requested.clone()))?;
    if state.settings != requested {
        return Err(format!(
            "logging already initialized with {}; refusing to switch to {}",
            describe(&state.settings),
            describe(&requested)
        ));
    }

    Ok(())
}

/// Returns active logging status metadata.
///
/// Returns `None` when logging has not been initialized, otherwise
/// `(active level, log_dir)`.
pub fn logging_status() -> Option<(&'static str, Option<PathBuf>)> {
    LOGGING_STATE
        .get()
        .map(|state| (state.active_level, state.settings.log_dir.clone()))
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

fn start_logger(settings: Settings) -> Result<LoggingState, String> {
    let active_level = if settings.log_dir.is_none() && !settings.console {
        fallback_level(settings.level)
    } else {
        settings.level
    };

    let mut logger = Logger::try_with_str(active_level)
        .map_err(|err| format!("invalid log level `{active_level}`: {err}"))?;

    logger = match settings.log_dir.as_deref() {
        Some(dir) => {
            std::fs::create_dir_all(dir).map_err(|err| {
                format!("failed to create log directory `{}`: {err}", dir.display())
            })?;
            let logger = logger
                .log_to_file(
                    FileSpec::default()
                        .directory(dir)
                        .basename(LOG_FILE_BASENAME),
                )
                .rotate(
                    Criterion::Size(MAX_LOG_FILE_SIZE_BYTES),
                    Naming::Numbers,
                    Cleanup::KeepLogFiles(MAX_LOG_FILES),
                )
                .write_mode(WriteMode::BufferAndFlush)
                .append()
                .format_for_files(flexi_logger::detailed_format);
            if settings.console {
                logger.duplicate_to_stderr(Duplicate::Warn)
            } else {
                logger
            }
        }
        None => logger.log_to_stderr(),
    };

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
        "event=logging_init module=core status=ok active_level={active_level} {}",
        describe(&settings)
    );

    Ok(LoggingState {
        settings,
        active_level,
        _logger: handle,
    })
}

/// Stderr-only fallback keeps warnings and errors, never anything chattier.
fn fallback_level(level: &'static str) -> &'static str {
    match level {
        "error" => "error",
        _ => "warn",
    }
}

fn describe(settings: &Settings) -> String {
    let dir = settings
        .log_dir
        .as_deref()
        .map_or_else(|| "none".to_string(), |dir| dir.display().to_string());
    format!(
        "level={} log_dir={} console={}",
        settings.level, dir, settings.console
    )
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

fn normalize_log_dir(log_dir: &Path) -> Result<PathBuf, String> {
    if log_dir.as_os_str().is_empty() {
        return Err("log dir cannot be empty".to_string());
    }
    if !log_dir.is_absolute() {
        return Err(format!(
            "log dir must be an absolute path, got `{}`",
            log_dir.display()
        ));
    }
    Ok(log_dir.to_path_buf())
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
        // Payloads may echo user input; keep them to one bounded line.
        let location = panic_info
            .location()
            .map(|loc| format!("{}:{}", loc.file(), loc.line()))
            .unwrap_or_else(|| "unknown".to_string());
        let payload = panic_payload_summary(panic_info);
        error!(
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

fn sanitize_message(value: &str, max_chars: usize) -> String {
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
        fallback_level, init_logging, logging_status, normalize_level, normalize_log_dir,
        sanitize_message,
    };
    use crate::config::LoggingConfig;
    use std::path::Path;

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
        assert!(normalize_level("verbose").is_err());
    }

    #[test]
    fn normalize_log_dir_rejects_relative_path() {
        let error =
            normalize_log_dir(Path::new("logs/dev")).expect_err("relative paths must be rejected");
        assert!(error.contains("absolute"));
    }

    #[test]
    fn fallback_level_never_goes_below_warn() {
        assert_eq!(fallback_level("trace"), "warn");
        assert_eq!(fallback_level("debug"), "warn");
        assert_eq!(fallback_level("info"), "warn");
        assert_eq!(fallback_level("warn"), "warn");
        assert_eq!(fallback_level("error"), "error");
    }

    #[test]
    fn sanitize_message_removes_newlines_and_truncates() {
        let sanitized = sanitize_message("line1\nline2\rline3", 8);
        assert!(!sanitized.contains('\n'));
        assert!(!sanitized.contains('\r'));
        assert!(sanitized.ends_with("..."));
    }

    #[test]
    fn init_logging_is_idempotent_for_same_config_and_rejects_conflicts() {
        let log_dir = tempfile::tempdir().expect("temp dir should be created");
        let config = LoggingConfig {
            level: "info".to_string(),
            dir: Some(log_dir.path().to_path_buf()),
            console: false,
        };

        init_logging(&config).expect("first init should succeed");
        init_logging(&config).expect("same config should be idempotent");

        let level_conflict = LoggingConfig {
            level: "debug".to_string(),
            ..config.clone()
        };
        let level_error = init_logging(&level_conflict).expect_err("level conflict should fail");
        assert!(level_error.contains("refusing to switch"));

        let other_dir = tempfile::tempdir().expect("temp dir should be created");
        let dir_conflict = LoggingConfig {
            dir: Some(other_dir.path().to_path_buf()),
            ..config.clone()
        };
        let dir_error = init_logging(&dir_conflict).expect_err("directory conflict should fail");
        assert!(dir_error.contains("refusing to switch"));

        let (active_level, active_dir) = logging_status().expect("logging should be active");
        assert_eq!(active_level, "info");
        assert_eq!(active_dir.as_deref(), Some(log_dir.path()));
    }
}
