//! Error types for the engine binary.
//!
//! [`EngineError`] is the top-level error type that wraps every failure mode
//! during engine startup and the tick loop.

/// Top-level error for the engine binary.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: crate::config::ConfigError,
    },

    /// Registering a scenario listener failed.
    #[error("bus error: {source}")]
    Bus {
        /// The underlying bus error.
        #[from]
        source: tickbus_core::BusError,
    },

    /// The logging filter directive could not be parsed.
    #[error("invalid log filter {directive:?}: {message}")]
    LogFilter {
        /// The directive that failed to parse.
        directive: String,
        /// Description of the parse failure.
        message: String,
    },
}
