/*!
 * The settings the benchmark needs, with their file keys, override flags,
 * prompts and interactive default suggestions.
 */

use std::fmt;

use crate::errors::SettingsError;

/// Default suggestion for the password command
pub const DEFAULT_PASSWORD_COMMAND: &str = "echo pa55w0rd";

/// Default suggestion for the database host
pub const DEFAULT_DB_HOST: &str = "guybrush-pi.compbio.ucsf.edu";

/// Default suggestion for the database port
pub const DEFAULT_DB_PORT: u16 = 3306;

/// One resolvable setting
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SettingKey {
    /// Path to the rosetta checkout
    Rosetta,
    /// Full name recorded with benchmark runs
    Author,
    /// Database name
    DbName,
    /// Database user
    DbUser,
    /// Shell command printing the database password
    DbPassword,
    /// Database host
    DbHost,
    /// Database port
    DbPort,
}

impl SettingKey {
    /// Every key, in the order they are resolved and prompted for
    pub const ALL: [SettingKey; 7] = [
        SettingKey::Rosetta,
        SettingKey::Author,
        SettingKey::DbName,
        SettingKey::DbUser,
        SettingKey::DbPassword,
        SettingKey::DbHost,
        SettingKey::DbPort,
    ];

    /// Key used inside the settings file
    pub fn name(&self) -> &'static str {
        match self {
            Self::Rosetta => "rosetta",
            Self::Author => "author",
            Self::DbName => "db_name",
            Self::DbUser => "db_user",
            Self::DbPassword => "db_password",
            Self::DbHost => "db_host",
            Self::DbPort => "db_port",
        }
    }

    /// Command-line flag that overrides the key
    pub fn flag(&self) -> &'static str {
        match self {
            Self::Rosetta => "--rosetta",
            Self::Author => "--author",
            Self::DbName => "--db-name",
            Self::DbUser => "--db-user",
            Self::DbPassword => "--db-passwd-cmd",
            Self::DbHost => "--db-host",
            Self::DbPort => "--db-port",
        }
    }

    /// Question shown when the value has to be asked for
    pub fn prompt(&self) -> &'static str {
        match self {
            Self::Rosetta => "Path to rosetta",
            Self::Author => "Your full name",
            Self::DbName => "Database name",
            Self::DbUser => "Database user",
            Self::DbPassword => "Command to get database password",
            Self::DbHost => "Database host",
            Self::DbPort => "Database port",
        }
    }

    /// Suggestion offered at the prompt, taken when the answer is empty
    pub fn default_suggestion(&self) -> Option<String> {
        match self {
            Self::Rosetta | Self::Author => None,
            Self::DbName => Some(format!("{}_loops_benchmark", login_name())),
            Self::DbUser => Some(login_name()),
            Self::DbPassword => Some(DEFAULT_PASSWORD_COMMAND.to_string()),
            Self::DbHost => Some(DEFAULT_DB_HOST.to_string()),
            Self::DbPort => Some(DEFAULT_DB_PORT.to_string()),
        }
    }

    /// Check that a raw value is usable for this key
    pub fn validate(&self, value: &str) -> Result<(), SettingsError> {
        match self {
            Self::DbPort => parse_port(value).map(|_| ()),
            _ if value.trim().is_empty() => Err(SettingsError::InvalidValue {
                key: self.name().to_string(),
                reason: "value is empty".to_string(),
            }),
            _ => Ok(()),
        }
    }
}

impl fmt::Display for SettingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for SettingKey {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Self::ALL
            .into_iter()
            .find(|key| key.name() == s || key.flag() == s)
            .ok_or_else(|| anyhow::anyhow!("Unknown setting: {}", s))
    }
}

/// Parse a database port
pub fn parse_port(value: &str) -> Result<u16, SettingsError> {
    match value.trim().parse::<u16>() {
        Ok(port) if port > 0 => Ok(port),
        _ => Err(SettingsError::InvalidValue {
            key: SettingKey::DbPort.name().to_string(),
            reason: format!("'{}' is not a TCP port", value.trim()),
        }),
    }
}

/// Login name of the current user
pub fn login_name() -> String {
    ["LOGNAME", "USER", "LNAME", "USERNAME"]
        .iter()
        .filter_map(|var| std::env::var(var).ok())
        .find(|name| !name.is_empty())
        .or_else(|| {
            dirs::home_dir()
                .and_then(|home| home.file_name().map(|n| n.to_string_lossy().to_string()))
        })
        .unwrap_or_else(|| "user".to_string())
}
