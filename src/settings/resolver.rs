/*!
 * Settings resolution.
 *
 * Each setting is taken from the first place that defines it:
 *
 * 1. a command-line override,
 * 2. the profile section selected with `--config`,
 * 3. the `DEFAULT` section,
 * 4. an interactive prompt, whose answer is stored in `DEFAULT` and saved
 *    right away.
 *
 * When prompting is not allowed (cluster jobs) an unresolved setting is an
 * error naming the setting.
 */

use std::collections::{BTreeMap, VecDeque};
use std::io::{BufRead, Write};

use log::{debug, warn};

use super::file::{SettingsFile, DEFAULT_SECTION};
use super::keys::{parse_port, SettingKey};
use super::password::run_password_command;
use super::Settings;
use crate::errors::SettingsError;

/// Shown once, before the first question of a load
pub const PROMPT_BANNER: &str = "\
Settings related to running and analyzing the loop modeling benchmark are kept
in 'settings.conf'.  Default values for the following settings are needed:
";

/// Command-line overrides for settings
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SettingsOverrides {
    config: Option<String>,
    values: BTreeMap<SettingKey, String>,
}

impl SettingsOverrides {
    /// No overrides
    pub fn new() -> Self {
        Self::default()
    }

    /// Select a profile section
    pub fn with_config(mut self, section: impl Into<String>) -> Self {
        self.config = Some(section.into());
        self
    }

    /// Override one setting
    pub fn with(mut self, key: SettingKey, value: impl Into<String>) -> Self {
        self.values.insert(key, value.into());
        self
    }

    /// Override one setting if a value was given
    pub fn set(&mut self, key: SettingKey, value: Option<String>) {
        match value {
            Some(value) => {
                self.values.insert(key, value);
            }
            None => {
                self.values.remove(&key);
            }
        }
    }

    /// Select (or clear) the profile section
    pub fn set_config(&mut self, section: Option<String>) {
        self.config = section;
    }

    /// Build overrides from flag/value pairs as a command-line parser yields
    /// them, e.g. `("--db-port", "3307")` or `("-c", "cluster")`
    pub fn from_flags<I, K, V>(flags: I) -> anyhow::Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut overrides = Self::new();
        for (flag, value) in flags {
            match flag.as_ref() {
                "--config" | "-c" => overrides.config = Some(value.into()),
                other => {
                    let key: SettingKey = other.parse()?;
                    overrides.values.insert(key, value.into());
                }
            }
        }
        Ok(overrides)
    }

    /// Selected profile section
    pub fn config(&self) -> Option<&str> {
        self.config.as_deref().filter(|s| !s.is_empty())
    }

    /// Override for `key`; empty values count as absent
    pub fn get(&self, key: SettingKey) -> Option<&str> {
        self.values
            .get(&key)
            .map(|s| s.as_str())
            .filter(|s| !s.is_empty())
    }
}

/// Where a resolved value came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueSource {
    /// Command-line override
    Flag,
    /// The selected profile section
    Profile(String),
    /// The `DEFAULT` section
    Default,
    /// Asked for interactively
    Prompt,
}

/// Asks the user for values
pub trait Prompter {
    /// Show `message` and read one line; `None` means the input was closed
    fn ask(&mut self, message: &str) -> std::io::Result<Option<String>>;

    /// Show an informational message
    fn notice(&mut self, text: &str) -> std::io::Result<()>;
}

/// Prompts on stdout and reads answers from stdin
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalPrompter;

impl Prompter for TerminalPrompter {
    fn ask(&mut self, message: &str) -> std::io::Result<Option<String>> {
        let mut stdout = std::io::stdout();
        write!(stdout, "{}", message)?;
        stdout.flush()?;

        let mut line = String::new();
        if std::io::stdin().lock().read_line(&mut line)? == 0 {
            // Keep the shell prompt off the question line
            writeln!(stdout)?;
            return Ok(None);
        }
        Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
    }

    fn notice(&mut self, text: &str) -> std::io::Result<()> {
        println!("{}", text);
        Ok(())
    }
}

/// Replays canned answers; records every question and notice
#[derive(Debug, Default, Clone)]
pub struct ScriptedPrompter {
    answers: VecDeque<String>,
    /// Questions asked so far
    pub questions: Vec<String>,
    /// Notices shown so far
    pub notices: Vec<String>,
}

impl ScriptedPrompter {
    /// Prompter that answers with `answers` in order, then reports closed input
    pub fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            answers: answers.into_iter().map(Into::into).collect(),
            questions: Vec::new(),
            notices: Vec::new(),
        }
    }
}

impl Prompter for ScriptedPrompter {
    fn ask(&mut self, message: &str) -> std::io::Result<Option<String>> {
        self.questions.push(message.to_string());
        Ok(self.answers.pop_front())
    }

    fn notice(&mut self, text: &str) -> std::io::Result<()> {
        self.notices.push(text.to_string());
        Ok(())
    }
}

/// Resolves settings against a settings file, overrides and a prompter
pub struct SettingsResolver<P: Prompter = TerminalPrompter> {
    file: SettingsFile,
    overrides: SettingsOverrides,
    interactive: bool,
    prompter: P,
    banner_shown: bool,
}

impl SettingsResolver<TerminalPrompter> {
    /// Resolver that prompts on the terminal
    pub fn new(file: SettingsFile, overrides: SettingsOverrides) -> Self {
        Self::with_prompter(file, overrides, TerminalPrompter)
    }
}

impl<P: Prompter> SettingsResolver<P> {
    /// Resolver using the given prompter
    pub fn with_prompter(file: SettingsFile, overrides: SettingsOverrides, prompter: P) -> Self {
        Self {
            file,
            overrides,
            interactive: true,
            prompter,
            banner_shown: false,
        }
    }

    /// Allow or forbid prompting (forbid for jobs without a terminal)
    pub fn interactive(mut self, interactive: bool) -> Self {
        self.interactive = interactive;
        self
    }

    /// The settings file, including any values entered so far
    pub fn file(&self) -> &SettingsFile {
        &self.file
    }

    /// The prompter
    pub fn prompter(&self) -> &P {
        &self.prompter
    }

    /// Give back the settings file and prompter
    pub fn into_parts(self) -> (SettingsFile, P) {
        (self.file, self.prompter)
    }

    /// Resolve one setting
    pub fn resolve(&mut self, key: SettingKey) -> Result<String, SettingsError> {
        self.resolve_with_source(key).map(|(value, _)| value)
    }

    /// Resolve one setting and report where the value came from
    pub fn resolve_with_source(
        &mut self,
        key: SettingKey,
    ) -> Result<(String, ValueSource), SettingsError> {
        let profile = self.check_profile()?;

        if let Some(value) = self.overrides.get(key) {
            debug!("{} taken from {}", key, key.flag());
            return Ok((value.to_string(), ValueSource::Flag));
        }

        if let Some(section) = profile {
            if let Some(value) = self.file.get(&section, key.name()) {
                debug!("{} taken from [{}]", key, section);
                return Ok((value.to_string(), ValueSource::Profile(section)));
            }
        }

        if let Some(value) = self.file.get_default(key.name()) {
            debug!("{} taken from [{}]", key, DEFAULT_SECTION);
            return Ok((value.to_string(), ValueSource::Default));
        }

        if !self.interactive {
            return Err(SettingsError::MissingSetting(key.name().to_string()));
        }

        let value = self.prompt_for(key)?;
        self.file.set(DEFAULT_SECTION, key.name(), &value);
        self.file.save()?;
        Ok((value, ValueSource::Prompt))
    }

    /// Resolve every setting and run the password command
    pub fn load(&mut self) -> Result<Settings, SettingsError> {
        let rosetta = self.resolve(SettingKey::Rosetta)?;
        let author = self.resolve(SettingKey::Author)?;
        let db_name = self.resolve(SettingKey::DbName)?;
        let db_user = self.resolve(SettingKey::DbUser)?;
        let db_password_cmd = self.resolve(SettingKey::DbPassword)?;
        let db_host = self.resolve(SettingKey::DbHost)?;
        let db_port = parse_port(&self.resolve(SettingKey::DbPort)?)?;

        let db_password = run_password_command(&db_password_cmd)?;

        Ok(Settings {
            rosetta: rosetta.into(),
            author,
            db_name,
            db_user,
            db_password_cmd,
            db_password,
            db_host,
            db_port,
        })
    }

    /// Selected profile, failing if the file has no such section.
    ///
    /// `DEFAULT` is the fallback for every profile, never a profile itself.
    fn check_profile(&self) -> Result<Option<String>, SettingsError> {
        match self.overrides.config() {
            Some(section) if section == DEFAULT_SECTION || !self.file.has_section(section) => {
                Err(SettingsError::UnknownSection {
                    section: section.to_string(),
                    path: self.file.path().to_path_buf(),
                })
            }
            other => Ok(other.map(|s| s.to_string())),
        }
    }

    /// Ask until a usable value is given
    fn prompt_for(&mut self, key: SettingKey) -> Result<String, SettingsError> {
        if !self.banner_shown {
            self.banner_shown = true;
            self.prompter.notice(PROMPT_BANNER)?;
        }

        let suggestion = key.default_suggestion();
        let question = match &suggestion {
            Some(default) => format!("{} [{}]: ", key.prompt(), default),
            None => format!("{}: ", key.prompt()),
        };

        loop {
            let answer = self
                .prompter
                .ask(&question)?
                .ok_or(SettingsError::Interrupted)?;
            let answer = answer.trim();

            let value = match (&suggestion, answer.is_empty()) {
                (Some(default), true) => default.clone(),
                (None, true) => continue,
                (_, false) => answer.to_string(),
            };

            match key.validate(&value) {
                Ok(()) => return Ok(value),
                Err(e) => {
                    warn!("{}", e);
                }
            }
        }
    }
}
