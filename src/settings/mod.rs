/*!
 * Settings for running and analyzing the benchmark.
 *
 * Values come from command-line overrides, the `settings.conf` file or the
 * user, see [`resolver`] for the precedence rules. The resolved [`Settings`]
 * value is built once and handed to whatever needs it.
 */

pub mod cli;
pub mod file;
pub mod keys;
pub mod password;
pub mod resolver;

use std::fmt;
use std::path::{Path, PathBuf};

use log::info;

use crate::errors::SettingsError;

pub use cli::SettingsArgs;
pub use file::{SettingsFile, DEFAULT_SECTION, DEFAULT_SETTINGS_FILENAME};
pub use keys::SettingKey;
pub use resolver::{
    Prompter, ScriptedPrompter, SettingsOverrides, SettingsResolver, TerminalPrompter,
    ValueSource,
};

/// Shown by [`install`] before creating a settings file
pub const INSTALL_INTRO: &str = "\
Settings related to compiling rosetta and connecting to the database are kept
in 'settings.conf'.  Please answer the following questions to create this file:
";

/// Fully resolved settings
#[derive(Clone, PartialEq, Eq)]
pub struct Settings {
    /// Path to the rosetta checkout
    pub rosetta: PathBuf,
    /// Full name recorded with benchmark runs
    pub author: String,
    /// Database name
    pub db_name: String,
    /// Database user
    pub db_user: String,
    /// Command that printed the password
    pub db_password_cmd: String,
    /// Password obtained from `db_password_cmd`
    pub db_password: String,
    /// Database host
    pub db_host: String,
    /// Database port
    pub db_port: u16,
}

impl Settings {
    /// Resolve settings from the file at `path`, prompting on the terminal
    /// when `interactive` is set
    pub fn load<P: AsRef<Path>>(
        path: P,
        overrides: SettingsOverrides,
        interactive: bool,
    ) -> Result<Self, SettingsError> {
        let file = SettingsFile::load(path)?;
        SettingsResolver::new(file, overrides)
            .interactive(interactive)
            .load()
    }

    /// Human-readable listing, one setting per line
    pub fn show(&self, reveal_password: bool) -> String {
        let password = if reveal_password {
            self.db_password.as_str()
        } else {
            "********"
        };

        [
            ("rosetta:", self.rosetta.display().to_string()),
            ("author:", self.author.clone()),
            ("db_name:", self.db_name.clone()),
            ("db_user:", self.db_user.clone()),
            ("db_passwd:", password.to_string()),
            ("db_host:", self.db_host.clone()),
            ("db_port:", self.db_port.to_string()),
        ]
        .iter()
        .map(|(label, value)| format!("{:<11}{}", label, value))
        .collect::<Vec<_>>()
        .join("\n")
    }
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("rosetta", &self.rosetta)
            .field("author", &self.author)
            .field("db_name", &self.db_name)
            .field("db_user", &self.db_user)
            .field("db_password_cmd", &self.db_password_cmd)
            .field("db_password", &"<redacted>")
            .field("db_host", &self.db_host)
            .field("db_port", &self.db_port)
            .finish()
    }
}

/// Create the settings file interactively if it does not exist yet.
///
/// Returns `None` when the file is already there.
pub fn install<P: Prompter>(
    path: &Path,
    overrides: SettingsOverrides,
    mut prompter: P,
) -> Result<Option<Settings>, SettingsError> {
    if path.exists() {
        info!("Settings file {:?} already exists", path);
        return Ok(None);
    }

    prompter.notice(INSTALL_INTRO)?;

    let mut resolver = SettingsResolver::with_prompter(SettingsFile::empty(path), overrides, prompter);
    let settings = resolver.load()?;

    // Everything came from flags, still leave a file behind
    if !path.exists() {
        resolver.file().save()?;
    }

    Ok(Some(settings))
}
