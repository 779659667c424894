/*!
 * Integration tests for prompting, persisting and reloading settings files
 */

use std::fs;

use anyhow::Result;

use loopbench::errors::SettingsError;
use loopbench::settings::{
    self, resolver::PROMPT_BANNER, ScriptedPrompter, SettingKey, Settings, SettingsFile,
    SettingsOverrides, SettingsResolver, ValueSource, INSTALL_INTRO,
};

use crate::common;

const ALL_BUT_ROSETTA: &str = "\
[DEFAULT]
author = Kale Kundert
db_name = kale_loops_benchmark
db_user = kale
db_password = echo pa55w0rd
db_host = localhost
db_port = 3306
";

#[test]
fn test_prompt_missingValue_shouldPersistAndReloadWithoutPrompting() -> Result<()> {
    common::init_logging();
    let temp_dir = common::create_temp_dir()?;
    let path = common::create_settings_file(temp_dir.path(), ALL_BUT_ROSETTA)?;

    let mut resolver = SettingsResolver::with_prompter(
        SettingsFile::load(&path)?,
        SettingsOverrides::new(),
        ScriptedPrompter::new(["/opt/rosetta"]),
    );
    let (value, source) = resolver.resolve_with_source(SettingKey::Rosetta)?;
    assert_eq!(value, "/opt/rosetta");
    assert_eq!(source, ValueSource::Prompt);

    let prompter = resolver.prompter();
    assert_eq!(prompter.questions, vec!["Path to rosetta: ".to_string()]);
    assert_eq!(prompter.notices, vec![PROMPT_BANNER.to_string()]);

    // A second load must not need the prompter at all
    let reloaded = SettingsFile::load(&path)?;
    assert_eq!(reloaded.get_default("rosetta"), Some("/opt/rosetta"));
    assert_eq!(reloaded.get_default("author"), Some("Kale Kundert"));

    let settings = Settings::load(&path, SettingsOverrides::new(), false)?;
    assert_eq!(settings.rosetta, std::path::PathBuf::from("/opt/rosetta"));
    Ok(())
}

#[test]
fn test_prompt_severalMissingValues_shouldShowBannerOnce() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let path = temp_dir.path().join("settings.conf");

    let prompter = ScriptedPrompter::new(["/opt/rosetta", "Kale Kundert"]);
    let mut resolver =
        SettingsResolver::with_prompter(SettingsFile::load(&path)?, SettingsOverrides::new(), prompter);
    resolver.resolve(SettingKey::Rosetta)?;
    resolver.resolve(SettingKey::Author)?;

    let (file, prompter) = resolver.into_parts();
    assert_eq!(prompter.notices.len(), 1);
    assert_eq!(prompter.questions.len(), 2);
    assert_eq!(file.get_default("author"), Some("Kale Kundert"));
    assert!(path.exists());
    Ok(())
}

#[test]
fn test_prompt_emptyAnswerWithoutSuggestion_shouldAskAgain() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let path = common::create_settings_file(temp_dir.path(), ALL_BUT_ROSETTA)?;

    let mut resolver = SettingsResolver::with_prompter(
        SettingsFile::load(&path)?,
        SettingsOverrides::new(),
        ScriptedPrompter::new(["", "   ", "/opt/rosetta"]),
    );

    assert_eq!(resolver.resolve(SettingKey::Rosetta)?, "/opt/rosetta");
    assert_eq!(resolver.prompter().questions.len(), 3);
    Ok(())
}

#[test]
fn test_prompt_emptyAnswerWithSuggestion_shouldTakeSuggestion() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let path = temp_dir.path().join("settings.conf");

    let mut resolver = SettingsResolver::with_prompter(
        SettingsFile::load(&path)?,
        SettingsOverrides::new(),
        ScriptedPrompter::new([""]),
    );

    assert_eq!(resolver.resolve(SettingKey::DbHost)?, "guybrush-pi.compbio.ucsf.edu");
    assert_eq!(
        resolver.prompter().questions,
        vec!["Database host [guybrush-pi.compbio.ucsf.edu]: ".to_string()]
    );
    Ok(())
}

#[test]
fn test_prompt_invalidPort_shouldAskUntilValid() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let path = temp_dir.path().join("settings.conf");

    let mut resolver = SettingsResolver::with_prompter(
        SettingsFile::load(&path)?,
        SettingsOverrides::new(),
        ScriptedPrompter::new(["mysql", "0", "70000", "3310"]),
    );

    assert_eq!(resolver.resolve(SettingKey::DbPort)?, "3310");
    assert_eq!(resolver.prompter().questions.len(), 4);
    assert_eq!(SettingsFile::load(&path)?.get_default("db_port"), Some("3310"));
    Ok(())
}

#[test]
fn test_prompt_closedInput_shouldBeInterruptedAndWriteNothing() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let path = temp_dir.path().join("settings.conf");

    let mut resolver = SettingsResolver::with_prompter(
        SettingsFile::load(&path)?,
        SettingsOverrides::new(),
        ScriptedPrompter::default(),
    );

    let err = resolver.resolve(SettingKey::Rosetta).unwrap_err();
    assert!(matches!(err, SettingsError::Interrupted));
    assert!(!path.exists());
    Ok(())
}

#[test]
fn test_install_missingFile_shouldWriteReloadableSettings() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let path = temp_dir.path().join("settings.conf");

    let prompter = ScriptedPrompter::new([
        "/opt/rosetta",
        "Kale Kundert",
        "loops",
        "kale",
        "printf '%s' 'pa55 w0rd'",
        "localhost",
        "",
    ]);
    let installed = settings::install(&path, SettingsOverrides::new(), prompter)?
        .expect("install should create the file");

    assert_eq!(installed.db_password, "pa55 w0rd");
    assert_eq!(installed.db_port, 3306);

    let reloaded = Settings::load(&path, SettingsOverrides::new(), false)?;
    assert_eq!(reloaded, installed);
    Ok(())
}

#[test]
fn test_install_allValuesFromFlags_shouldStillWriteFile() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let path = temp_dir.path().join("nested").join("settings.conf");

    let overrides = SettingsOverrides::new()
        .with(SettingKey::Rosetta, "/opt/rosetta")
        .with(SettingKey::Author, "Kale Kundert")
        .with(SettingKey::DbName, "loops")
        .with(SettingKey::DbUser, "kale")
        .with(SettingKey::DbPassword, "echo pa55w0rd")
        .with(SettingKey::DbHost, "localhost")
        .with(SettingKey::DbPort, "3307");
    let prompter = ScriptedPrompter::default();

    let installed = settings::install(&path, overrides, prompter)?;

    assert_eq!(installed.map(|s| s.db_port), Some(3307));
    assert!(path.exists());
    Ok(())
}

#[test]
fn test_install_existingFile_shouldDoNothing() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let path = common::create_settings_file(temp_dir.path(), common::COMPLETE_SETTINGS)?;

    let installed = settings::install(&path, SettingsOverrides::new(), ScriptedPrompter::default())?;

    assert!(installed.is_none());
    assert_eq!(fs::read_to_string(&path)?, common::COMPLETE_SETTINGS);
    Ok(())
}

#[test]
fn test_install_intro_shouldMentionSettingsFile() {
    assert!(INSTALL_INTRO.contains("settings.conf"));
}

#[test]
fn test_save_profileSections_shouldSurviveRoundTrip() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let path = common::create_settings_file(temp_dir.path(), common::COMPLETE_SETTINGS)?;

    let mut file = SettingsFile::load(&path)?;
    file.set("laptop", "db_host", "127.0.0.1");
    file.save()?;

    let reloaded = SettingsFile::load(&path)?;
    assert_eq!(reloaded.get("cluster", "db_port"), Some("3308"));
    assert_eq!(reloaded.get("laptop", "db_host"), Some("127.0.0.1"));
    assert_eq!(reloaded.get_default("db_password"), Some("echo pa55w0rd"));

    let settings = Settings::load(&path, SettingsOverrides::new().with_config("laptop"), false)?;
    assert_eq!(settings.db_host, "127.0.0.1");
    assert_eq!(settings.db_port, 3306);
    Ok(())
}
