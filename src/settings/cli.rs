//! Settings-related command-line flags, for flattening into any clap parser.

use clap::Args;

use super::keys::SettingKey;
use super::resolver::SettingsOverrides;

/// Flags overriding `settings.conf`
#[derive(Args, Debug, Clone, Default)]
pub struct SettingsArgs {
    /// Use an alternative set of settings; must name a [section] in the settings file
    #[arg(short = 'c', long = "config", value_name = "CONFIG", global = true)]
    pub config: Option<String>,

    /// Override the default rosetta path setting
    #[arg(long, value_name = "PATH", global = true)]
    pub rosetta: Option<String>,

    /// Override the default author setting
    #[arg(long, value_name = "NAME", global = true)]
    pub author: Option<String>,

    /// Override the default database name setting
    #[arg(long = "db-name", value_name = "NAME", global = true)]
    pub db_name: Option<String>,

    /// Override the default database user setting
    #[arg(long = "db-user", value_name = "USER", global = true)]
    pub db_user: Option<String>,

    /// Override the default database password command setting. This should be
    /// a command that prints a password, not a password itself
    #[arg(long = "db-passwd-cmd", value_name = "CMD", global = true)]
    pub db_passwd_cmd: Option<String>,

    /// Override the default database host setting
    #[arg(long = "db-host", value_name = "HOST", global = true)]
    pub db_host: Option<String>,

    /// Override the default database port setting
    #[arg(long = "db-port", value_name = "PORT", global = true)]
    pub db_port: Option<String>,
}

impl From<SettingsArgs> for SettingsOverrides {
    fn from(args: SettingsArgs) -> Self {
        let mut overrides = SettingsOverrides::new();
        overrides.set_config(args.config);
        overrides.set(SettingKey::Rosetta, args.rosetta);
        overrides.set(SettingKey::Author, args.author);
        overrides.set(SettingKey::DbName, args.db_name);
        overrides.set(SettingKey::DbUser, args.db_user);
        overrides.set(SettingKey::DbPassword, args.db_passwd_cmd);
        overrides.set(SettingKey::DbHost, args.db_host);
        overrides.set(SettingKey::DbPort, args.db_port);
        overrides
    }
}
