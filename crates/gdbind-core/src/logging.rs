//! `log` sink that reports through the engine.

use std::sync::Arc;

use log::{Level, LevelFilter, Log, Metadata, Record};

use crate::api::NativeApi;
use crate::config::BindingConfig;

/// Forwards errors and warnings to the engine's own printer, so they show up
/// in the editor, and writes everything else to stderr.
pub struct EngineLogger {
    api: Arc<dyn NativeApi>,
    level: LevelFilter,
    forward: bool,
}

impl EngineLogger {
    pub fn new(api: Arc<dyn NativeApi>, config: &BindingConfig) -> Self {
        Self {
            api,
            level: config.max_log_level(),
            forward: config.forward_logs_to_engine(),
        }
    }
}

impl Log for EngineLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let message = record.args().to_string();
        let file = record.file().unwrap_or("<unknown>");
        let line = record.line().unwrap_or(0);
        match record.level() {
            Level::Error if self.forward => self.api.print_error(&message, record.target(), file, line),
            Level::Warn if self.forward => self.api.print_warning(&message, record.target(), file, line),
            level => eprintln!("[{level} {}] {message}", record.target()),
        }
    }

    fn flush(&self) {}
}

/// Installs an [`EngineLogger`] as the global logger.
///
/// Returns `false` and changes nothing when a logger was already installed.
pub fn install_logger(api: Arc<dyn NativeApi>, config: &BindingConfig) -> bool {
    let logger = EngineLogger::new(api, config);
    match log::set_boxed_logger(Box::new(logger)) {
        Ok(()) => {
            log::set_max_level(config.max_log_level());
            true
        }
        Err(_) => false,
    }
}
