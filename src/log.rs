use std::{fmt::Display, fs::OpenOptions, io::{self, BufWriter, Write}, process::id, sync::RwLock};
use chrono::Local;
use once_cell::sync::Lazy;


///
/// Leveled logging.
///


#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Verbose,
    Notice,
    Warning,
}

impl LogLevel {
    fn less(&self, rhs: &Self) -> bool {
        match self {
            Self::Debug => !matches!(rhs, Self::Debug),
            Self::Verbose => matches!(rhs, Self::Notice | Self::Warning),
            Self::Notice => matches!(rhs, Self::Warning),
            Self::Warning => false,
        }
    }
}

impl Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let ch = match self {
            Self::Debug => '.',
            Self::Verbose => '-',
            Self::Notice => '*',
            Self::Warning => '#',
        };
        write!(f, "{ch}")
    }
}

struct Logger {
    verbosity: LogLevel,
    log_file: String,           // "" = log on standard output
}

static LOGGER: Lazy<RwLock<Logger>> = Lazy::new(|| {
    RwLock::new(Logger { verbosity: LogLevel::Notice, log_file: String::new() })
});

pub fn init(verbosity: LogLevel, log_file: &str) {
    let mut logger = LOGGER.write().unwrap();
    logger.verbosity = verbosity;
    logger.log_file = log_file.to_string();
}

pub fn log(level: LogLevel, body: &str) {
    let logger = LOGGER.read().unwrap();
    if level.less(&logger.verbosity) {
        return;
    }

    let mut writer: Box<dyn Write> = if logger.log_file.is_empty() {
        Box::new(io::stdout())
    } else {
        match OpenOptions::new().append(true).create(true).open(&logger.log_file) {
            Ok(f) => Box::new(f),
            Err(_) => {
                eprintln!("Can't open log file: {}", logger.log_file);
                return;
            },
        }
    };

    let mut buf_writer = BufWriter::new(&mut writer);
    let line = format!("[{}] {} {}: {}\n", id(), Local::now().format("%d %b %H:%M:%S%.3f"), level, body);
    if let Err(e) = buf_writer.write_all(line.as_bytes()) {
        eprintln!("Can't write log: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_level_test() {
        assert_eq!(format!("{}", LogLevel::Debug), ".");
        assert_eq!(format!("{}", LogLevel::Warning), "#");
        assert!(LogLevel::Debug.less(&LogLevel::Notice));
        assert!(LogLevel::Notice.less(&LogLevel::Warning));
        assert!(!LogLevel::Warning.less(&LogLevel::Notice));
        assert!(!LogLevel::Verbose.less(&LogLevel::Verbose));
    }

    #[test]
    fn log_print_test() {
        log(LogLevel::Notice, &format!("hello {}", "memds"));
        log(LogLevel::Debug, "filtered out by the default verbosity");
    }
}
