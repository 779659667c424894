/*!
 * The on-disk settings file.
 *
 * INI sections are settings profiles. The `DEFAULT` section holds the
 * fallback for every profile and is where interactively entered values go.
 * Values are stored verbatim: quotes and backslashes are neither interpreted
 * on read nor escaped on write, so shell commands survive a round trip.
 *
 * Keys are case-insensitive and stored lowercase; when a key is repeated in a
 * section the last occurrence wins. A `;` preceded by whitespace starts an
 * inline comment.
 */

use std::path::{Path, PathBuf};

use ini::{EscapePolicy, Ini, ParseOption, WriteOption};
use log::{debug, info};

use crate::errors::SettingsError;

/// Name of the fallback section
pub const DEFAULT_SECTION: &str = "DEFAULT";

/// Default settings filename, relative to the working directory
pub const DEFAULT_SETTINGS_FILENAME: &str = "settings.conf";

/// Parsed settings file bound to its path
#[derive(Debug, Clone)]
pub struct SettingsFile {
    path: PathBuf,
    ini: Ini,
}

impl SettingsFile {
    /// Load a settings file; a missing file yields an empty one
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, SettingsError> {
        let path = path.as_ref().to_path_buf();

        if !path.exists() {
            debug!("Settings file {:?} does not exist yet", path);
            return Ok(Self::empty(path));
        }

        let ini = Ini::load_from_file_opt(&path, parse_option()).map_err(|e| {
            SettingsError::Read {
                path: path.clone(),
                message: e.to_string(),
            }
        })?;

        debug!("Loaded settings file {:?}", path);
        Ok(Self { path, ini })
    }

    /// Parse settings from a string (the path is only used when saving)
    pub fn from_str_at<P: AsRef<Path>>(content: &str, path: P) -> Result<Self, SettingsError> {
        let path = path.as_ref().to_path_buf();
        let ini = Ini::load_from_str_opt(content, parse_option()).map_err(|e| {
            SettingsError::Read {
                path: path.clone(),
                message: e.to_string(),
            }
        })?;
        Ok(Self { path, ini })
    }

    /// An empty settings file that will be written to `path`
    pub fn empty<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            ini: Ini::new(),
        }
    }

    /// Path the file is read from and saved to
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether a section of that name exists
    pub fn has_section(&self, section: &str) -> bool {
        self.ini.section(Some(section)).is_some()
    }

    /// Named sections, in file order
    pub fn sections(&self) -> Vec<String> {
        self.ini
            .sections()
            .flatten()
            .map(|s| s.to_string())
            .collect()
    }

    /// Value of `key` in `section`, if defined
    pub fn get(&self, section: &str, key: &str) -> Option<&str> {
        self.ini
            .section(Some(section))?
            .iter()
            .filter(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| strip_inline_comment(v))
            .last()
    }

    /// Value of `key` in the `DEFAULT` section
    pub fn get_default(&self, key: &str) -> Option<&str> {
        self.get(DEFAULT_SECTION, key)
    }

    /// Set `key` in `section`, creating the section if needed.
    ///
    /// Replaces every spelling of the key already in the section.
    pub fn set(&mut self, section: &str, key: &str, value: &str) {
        if let Some(props) = self.ini.section_mut(Some(section)) {
            let existing: Vec<String> = props
                .iter()
                .filter(|(k, _)| k.eq_ignore_ascii_case(key))
                .map(|(k, _)| k.to_string())
                .collect();
            for k in existing {
                props.remove_all(&k).for_each(drop);
            }
        }
        self.ini
            .with_section(Some(section))
            .set(key.to_ascii_lowercase(), value);
    }

    /// Write the file back to its path
    pub fn save(&self) -> Result<(), SettingsError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| SettingsError::Write {
                path: self.path.clone(),
                source,
            })?;
        }

        self.ini
            .write_to_file_opt(&self.path, write_option())
            .map_err(|source| SettingsError::Write {
                path: self.path.clone(),
                source,
            })?;

        info!("Saved settings to {:?}", self.path);
        Ok(())
    }
}

/// Drop a trailing `;` comment; only a `;` after whitespace counts
fn strip_inline_comment(value: &str) -> &str {
    match value.find(';') {
        Some(pos) if value[..pos].ends_with(char::is_whitespace) => value[..pos].trim_end(),
        _ => value,
    }
}

fn parse_option() -> ParseOption {
    ParseOption {
        enabled_quote: false,
        enabled_escape: false,
        ..Default::default()
    }
}

fn write_option() -> WriteOption {
    WriteOption {
        escape_policy: EscapePolicy::Nothing,
        ..Default::default()
    }
}
