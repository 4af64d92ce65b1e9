#![deny(missing_docs)]
//! Shared logging utilities for the genwatch workspace.
//!
//! This crate provides the `gw_*` logging macros used across the codebase,
//! the application logger initializer and a minimal test initializer for the
//! global logger.

use std::cell::RefCell;
use std::fmt;
use std::fs::File;
use std::path::PathBuf;

#[doc(hidden)]
pub use log;
pub use log::LevelFilter;

use simplelog::{
    ColorChoice, CombinedLogger, Config, ConfigBuilder, SharedLogger, TermLogger, TerminalMode,
    WriteLogger,
};

/// Log file written by [`LogDestination::File`] and [`LogDestination::Both`].
pub const LOG_FILE_NAME: &str = "genwatch.log";

thread_local! {
    /// Job the current thread is reporting on, used to prefix log lines.
    /// Only the thread that set it sees it: async tasks on a runtime's worker
    /// pool do not inherit it and name their job in the message instead.
    static CURRENT_JOB: RefCell<Option<String>> = const { RefCell::new(None) };
}

/// Sets the job id that prefixes log lines emitted from the current OS thread.
/// Pass `None` to clear it. Other threads, including tokio workers, are not
/// affected.
pub fn set_current_job(job_id: Option<&str>) {
    CURRENT_JOB.with(|job| *job.borrow_mut() = job_id.map(ToOwned::to_owned));
}

/// Retrieves the job id set for the current thread, if any.
pub fn current_job() -> Option<String> {
    CURRENT_JOB.with(|job| job.borrow().clone())
}

#[doc(hidden)]
pub fn emit(target: &str, level: log::Level, args: fmt::Arguments<'_>) {
    CURRENT_JOB.with(|job| match job.borrow().as_deref() {
        Some(job_id) => log::log!(target: target, level, "[job {}] {}", job_id, args),
        None => log::log!(target: target, level, "{}", args),
    });
}

/// Logs a trace-level message, prefixed with the current job if one is set.
#[macro_export]
macro_rules! gw_trace {
    ($($arg:tt)*) => {{
        $crate::emit(module_path!(), $crate::log::Level::Trace, format_args!($($arg)*));
    }};
}

/// Logs an info-level message, prefixed with the current job if one is set.
#[macro_export]
macro_rules! gw_info {
    ($($arg:tt)*) => {{
        $crate::emit(module_path!(), $crate::log::Level::Info, format_args!($($arg)*));
    }};
}

/// Logs a debug-level message, prefixed with the current job if one is set.
#[macro_export]
macro_rules! gw_debug {
    ($($arg:tt)*) => {{
        $crate::emit(module_path!(), $crate::log::Level::Debug, format_args!($($arg)*));
    }};
}

/// Logs a warn-level message, prefixed with the current job if one is set.
#[macro_export]
macro_rules! gw_warn {
    ($($arg:tt)*) => {{
        $crate::emit(module_path!(), $crate::log::Level::Warn, format_args!($($arg)*));
    }};
}

/// Logs an error-level message, prefixed with the current job if one is set.
#[macro_export]
macro_rules! gw_error {
    ($($arg:tt)*) => {{
        $crate::emit(module_path!(), $crate::log::Level::Error, format_args!($($arg)*));
    }};
}

/// Destination for log output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogDestination {
    /// Write to `./genwatch.log` in the current directory.
    #[default]
    File,
    /// Write to the terminal (stderr for warnings and errors).
    Terminal,
    /// Write to both file and terminal.
    Both,
}

/// Initializes the global logger with the given destination and level.
///
/// For [`LogDestination::File`] or [`LogDestination::Both`], creates
/// `./genwatch.log` in the current working directory. A second call is
/// ignored.
pub fn initialize(destination: LogDestination, level: LevelFilter) {
    let config = build_config();

    let loggers: Vec<Box<dyn SharedLogger>> = match destination {
        LogDestination::File => match create_file_logger(level, config) {
            Some(file_logger) => vec![file_logger],
            None => return,
        },
        LogDestination::Terminal => {
            vec![TermLogger::new(
                level,
                config,
                TerminalMode::Mixed,
                ColorChoice::Auto,
            )]
        }
        LogDestination::Both => {
            let mut loggers: Vec<Box<dyn SharedLogger>> = vec![TermLogger::new(
                level,
                config.clone(),
                TerminalMode::Mixed,
                ColorChoice::Auto,
            )];
            if let Some(file_logger) = create_file_logger(level, config) {
                loggers.push(file_logger);
            }
            loggers
        }
    };

    let _ = CombinedLogger::init(loggers);
}

/// Initializes a simple terminal logger for use in unit tests.
///
/// This safely no-ops if another logger has already been initialized.
pub fn initialize_for_tests() {
    // Use debug level in debug builds, info in release builds.
    let level = if cfg!(debug_assertions) {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    // Ignore the error if a logger was already set by another test.
    let _ = CombinedLogger::init(vec![TermLogger::new(
        level,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )]);
}

fn build_config() -> Config {
    ConfigBuilder::new()
        .set_time_format_rfc3339()
        .set_target_level(LevelFilter::Error)
        .build()
}

fn create_file_logger(level: LevelFilter, config: Config) -> Option<Box<WriteLogger<File>>> {
    let log_path = PathBuf::from(".").join(LOG_FILE_NAME);
    match File::create(&log_path) {
        Ok(file) => Some(WriteLogger::new(level, config, file)),
        Err(err) => {
            eprintln!("Warning: Could not create log file at {:?}: {}", log_path, err);
            None
        }
    }
}
