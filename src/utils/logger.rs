use log::{Level, LevelFilter, Log, Metadata, Record, SetLoggerError};
use std::time::SystemTime;

const RESET: &str = "\x1b[0m";
const GRAY: &str = "\x1b[90m";
const BLUE: &str = "\x1b[34m";
const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";
const RED: &str = "\x1b[31m";

/// Terminal logger used by the command-line tool.
///
/// Lines look like `HH:MM:SS.mmm | LEVEL| message`, with the level colored.
/// Everything goes to stderr so that `info --json` output stays clean.
pub struct Logger {
    level: LevelFilter,
}

impl Logger {
    pub fn new(level: LevelFilter) -> Self {
        Self { level }
    }

    /// Installs the logger as the global `log` backend.
    pub fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
        log::set_boxed_logger(Box::new(Logger::new(level)))?;
        log::set_max_level(level);
        Ok(())
    }

    fn get_timestamp() -> String {
        let now = SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .unwrap_or_default();

        let secs = now.as_secs();
        let millis = now.subsec_millis();

        let hours = (secs / 3600) % 24;
        let minutes = (secs / 60) % 60;
        let seconds = secs % 60;

        format!("{:02}:{:02}:{:02}.{:03}", hours, minutes, seconds, millis)
    }

    fn format_line(level: Level, message: &str) -> String {
        let (level_str, color) = match level {
            Level::Trace => ("TRACE", GRAY),
            Level::Debug => ("DEBUG", BLUE),
            Level::Info => ("INFO ", GREEN),
            Level::Warn => ("WARN ", YELLOW),
            Level::Error => ("ERROR", RED),
        };

        format!(
            "{} | {}{:5}{}| {}",
            Self::get_timestamp(),
            color,
            level_str,
            RESET,
            message
        )
    }
}

impl Log for Logger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        eprintln!("{}", Self::format_line(record.level(), &record.args().to_string()));
    }

    fn flush(&self) {}
}
