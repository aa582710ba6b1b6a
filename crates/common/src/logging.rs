use std::env;

use tracing::*;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};

pub const SVC_LABEL_ENVVAR: &str = "ROLLUP_SVC_LABEL";

pub struct LoggerConfig {
    whoami: String,
}

impl LoggerConfig {
    /// Creates a new instance with whoami set.
    pub fn new(whoami: String) -> Self {
        Self { whoami }
    }

    pub fn with_base_name(s: &str) -> Self {
        Self::new(get_whoami_string(s))
    }

    /// Like [`Self::with_base_name`], but an explicit label wins over the envvar.
    pub fn with_label(base: &str, label: Option<&str>) -> Self {
        match label {
            Some(label) => Self::new(format_whoami(base, Some(label))),
            None => Self::with_base_name(base),
        }
    }

    pub fn whoami(&self) -> &str {
        &self.whoami
    }
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self::with_base_name("(rollup-service)")
    }
}

/// Initializes the logging subsystem with the provided config.
pub fn init(config: LoggerConfig) {
    let filt = tracing_subscriber::EnvFilter::from_default_env();

    // Stdout logging.
    let stdout_sub = tracing_subscriber::fmt::layer().compact().with_filter(filt);

    tracing_subscriber::registry().with(stdout_sub).init();

    info!(whoami = %config.whoami, "logging started");
}

/// Shuts down the logging subsystem.
pub fn finalize() {
    info!("shutting down logging");
}

/// Gets the service label from the standard envvar, which should be included
/// in the whoami string.
pub fn get_service_label_from_env() -> Option<String> {
    env::var(SVC_LABEL_ENVVAR).ok()
}

/// Computes a standard whoami string.
pub fn get_whoami_string(base: &str) -> String {
    format_whoami(base, get_service_label_from_env().as_deref())
}

fn format_whoami(base: &str, label: Option<&str>) -> String {
    match label {
        Some(label) => format!("{base}%{label}"),
        None => base.to_owned(),
    }
}
