use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for log::Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Debug => log::Level::Debug,
            LogLevel::Info => log::Level::Info,
            LogLevel::Warn => log::Level::Warn,
            LogLevel::Error => log::Level::Error,
        }
    }
}

pub trait OscLogger: Send + Sync {
    fn log(&self, level: LogLevel, component: &str, msg: &str);
}

/// Forwards to the `log` facade, using the component as the target.
/// Output depends on the logger the host installs (e.g. `env_logger`).
pub struct ConsoleLogger;

impl ConsoleLogger {
    pub fn new() -> Arc<Self> {
        Arc::new(Self)
    }
}

impl OscLogger for ConsoleLogger {
    fn log(&self, level: LogLevel, component: &str, msg: &str) {
        log::log!(target: component, log::Level::from(level), "{}", msg);
    }
}

/// Captures log lines in memory. Useful for asserting on diagnostics.
#[derive(Default)]
pub struct MemoryLogger {
    lines: std::sync::Mutex<Vec<(LogLevel, String, String)>>,
}

impl MemoryLogger {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn lines(&self) -> Vec<(LogLevel, String, String)> {
        self.lines.lock().map(|l| l.clone()).unwrap_or_default()
    }

    pub fn contains(&self, level: LogLevel, needle: &str) -> bool {
        self.lines()
            .iter()
            .any(|(l, _, msg)| *l == level && msg.contains(needle))
    }
}

impl OscLogger for MemoryLogger {
    fn log(&self, level: LogLevel, component: &str, msg: &str) {
        if let Ok(mut lines) = self.lines.lock() {
            lines.push((level, component.to_string(), msg.to_string()));
        }
    }
}
