/*!
 * # loopbench
 *
 * Settings and database access for the loop modeling benchmark.
 *
 * ## Architecture
 *
 * The library is organized in these main modules:
 * - `settings`: resolves rosetta and database settings from command-line
 *   overrides, `settings.conf` profiles and interactive prompts
 * - `database`: schema, session-scoped repository and table export for
 *   benchmark results:
 *   - `database::connection`: connection strings and transactional sessions
 *   - `database::models`: one struct per table
 *   - `database::repository`: inserts and benchmark queries
 *   - `database::table`: row-oriented export
 * - `errors`: custom error types for the application
 *
 * ## License
 *
 * This project is licensed under the MIT License
 */

// Global lints configuration
#![allow(clippy::uninlined_format_args)]
// Test names follow test_subject_condition_shouldOutcome
#![cfg_attr(test, allow(non_snake_case))]

pub mod database;
pub mod errors;
pub mod settings;

// Re-export main types for easier usage
pub use database::{Database, DatabaseUrl, Repository, Table};
pub use errors::{AppError, SettingsError};
pub use settings::{Settings, SettingsOverrides};
