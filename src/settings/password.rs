//! Runs the configured password command.
//!
//! The settings file never holds the database password itself, only a shell
//! command (e.g. `pass show loops-db`) whose trimmed stdout is the password.

use std::process::{Command, Stdio};

use log::debug;

use crate::errors::SettingsError;

/// Run `command` through the shell and return its trimmed stdout
pub fn run_password_command(command: &str) -> Result<String, SettingsError> {
    debug!("Running password command");

    let output = shell(command)
        .stdin(Stdio::inherit())
        .stderr(Stdio::inherit())
        .output()
        .map_err(|e| SettingsError::PasswordCommand {
            command: command.to_string(),
            message: e.to_string(),
        })?;

    if !output.status.success() {
        return Err(SettingsError::PasswordCommand {
            command: command.to_string(),
            message: match output.status.code() {
                Some(code) => format!("exit status {}", code),
                None => "terminated by signal".to_string(),
            },
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

#[cfg(unix)]
fn shell(command: &str) -> Command {
    let mut cmd = Command::new("sh");
    cmd.arg("-c").arg(command);
    cmd
}

#[cfg(windows)]
fn shell(command: &str) -> Command {
    let mut cmd = Command::new("cmd");
    cmd.arg("/C").arg(command);
    cmd
}
