/*!
 * Error types for the loopbench application.
 *
 * Settings resolution failures get their own enum so callers can tell an
 * interrupted prompt apart from a genuinely missing value. Database code
 * propagates `anyhow::Error` and never wraps the underlying driver error.
 */

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while resolving settings
#[derive(Error, Debug)]
pub enum SettingsError {
    /// The profile selected with `--config` is not a section of the file
    #[error("No section [{section}] in '{}'.", path.display())]
    UnknownSection {
        /// Requested section name
        section: String,
        /// Settings file that was searched
        path: PathBuf,
    },

    /// Non-interactive load could not find a value anywhere
    #[error("No value for setting '{0}'.")]
    MissingSetting(String),

    /// A value was found but cannot be used
    #[error("Invalid value for setting '{key}': {reason}")]
    InvalidValue {
        /// Setting key
        key: String,
        /// What is wrong with the value
        reason: String,
    },

    /// Input was closed (EOF) while a prompt was waiting for an answer
    #[error("Settings prompt interrupted")]
    Interrupted,

    /// The settings file could not be read or parsed
    #[error("Failed to read settings file '{}': {message}", path.display())]
    Read {
        /// Settings file path
        path: PathBuf,
        /// Parser or I/O message
        message: String,
    },

    /// The settings file could not be written
    #[error("Failed to write settings file '{}': {source}", path.display())]
    Write {
        /// Settings file path
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The configured password command failed to run or exited non-zero
    #[error("Password command `{command}` failed: {message}")]
    PasswordCommand {
        /// Shell command that was run
        command: String,
        /// Exit status or spawn error
        message: String,
    },

    /// Reading from the terminal failed
    #[error("Failed to read from terminal: {0}")]
    Terminal(#[from] std::io::Error),
}

impl SettingsError {
    /// True when the user asked to stop rather than something going wrong
    pub fn is_interrupted(&self) -> bool {
        matches!(self, Self::Interrupted)
    }
}

/// Main application error type that wraps all other errors
#[derive(Error, Debug)]
pub enum AppError {
    /// Error from settings resolution
    #[error("Settings error: {0}")]
    Settings(#[from] SettingsError),

    /// Any other error
    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        match error.downcast::<SettingsError>() {
            Ok(settings) => Self::Settings(settings),
            Err(other) => Self::Unknown(format!("{:#}", other)),
        }
    }
}
