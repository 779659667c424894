/*!
 * Database schema definitions and migrations.
 *
 * Table names are declared here once and referenced by the models; nothing
 * is derived from type names. The benchmark tables (`benchmarks`,
 * `benchmark_protocols`, `protocol_output`) belong to this crate; the
 * feature tables (`protocols` through `total_scores`) mirror what the rosetta
 * features reporters write and are created here so that a fresh database is
 * usable on its own.
 */

use anyhow::{Context, Result};
use log::{debug, info};
use rusqlite::Connection;

/// Current schema version
pub const SCHEMA_VERSION: i32 = 1;

/// Table names
pub mod tables {
    pub const BENCHMARKS: &str = "benchmarks";
    pub const BENCHMARK_PROTOCOLS: &str = "benchmark_protocols";
    pub const PROTOCOLS: &str = "protocols";
    pub const BATCHES: &str = "batches";
    pub const STRUCTURES: &str = "structures";
    pub const RMSD: &str = "protein_rmsd_no_superposition";
    pub const TOTAL_SCORES: &str = "total_scores";
    pub const PROTOCOL_OUTPUT: &str = "protocol_output";

    /// Every table, parents before children
    pub const ALL: [&str; 8] = [
        BENCHMARKS,
        PROTOCOLS,
        BENCHMARK_PROTOCOLS,
        BATCHES,
        STRUCTURES,
        RMSD,
        TOTAL_SCORES,
        PROTOCOL_OUTPUT,
    ];
}

/// Per-connection settings; must run on every new connection
pub fn configure_connection(conn: &Connection) -> Result<()> {
    conn.execute_batch("PRAGMA foreign_keys=ON;")
        .context("Failed to enable foreign keys")?;
    Ok(())
}

/// Initialize the database schema
pub fn initialize_schema(conn: &Connection) -> Result<()> {
    let current_version = get_schema_version(conn)?;

    if current_version == 0 {
        info!("Initializing database schema v{}", SCHEMA_VERSION);
        create_all_tables(conn)?;
        set_schema_version(conn, SCHEMA_VERSION)?;
    } else if current_version < SCHEMA_VERSION {
        info!(
            "Migrating database schema from v{} to v{}",
            current_version, SCHEMA_VERSION
        );
        migrate_schema(conn, current_version)?;
    } else {
        debug!("Database schema is up to date (v{})", current_version);
    }

    Ok(())
}

/// Get the current schema version from the database
fn get_schema_version(conn: &Connection) -> Result<i32> {
    let table_exists: bool = conn
        .query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='schema_version'",
            [],
            |row| row.get(0),
        )
        .context("Failed to check schema_version table existence")?;

    if !table_exists {
        return Ok(0);
    }

    let version: i32 = conn
        .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| {
            row.get(0)
        })
        .unwrap_or(0);

    Ok(version)
}

/// Set the schema version in the database
fn set_schema_version(conn: &Connection, version: i32) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO schema_version (id, version, updated_at) VALUES (1, ?1, datetime('now'))",
        [version],
    )?;
    Ok(())
}

/// Create all database tables
fn create_all_tables(conn: &Connection) -> Result<()> {
    // No-op for in-memory databases
    conn.execute_batch("PRAGMA journal_mode=WAL;")?;

    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            version INTEGER NOT NULL,
            updated_at TEXT NOT NULL
        );
        "#,
    )?;

    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS benchmarks (
            benchmark_id INTEGER PRIMARY KEY AUTOINCREMENT,
            start_time TEXT,
            name TEXT,
            description TEXT
        );

        CREATE TABLE IF NOT EXISTS protocols (
            protocol_id INTEGER PRIMARY KEY,
            specified_options TEXT,
            command_line TEXT,
            svn_url TEXT,
            svn_version TEXT,
            script TEXT
        );

        CREATE TABLE IF NOT EXISTS benchmark_protocols (
            benchmark_id INTEGER NOT NULL REFERENCES benchmarks(benchmark_id),
            protocol_id INTEGER NOT NULL REFERENCES protocols(protocol_id),
            PRIMARY KEY (benchmark_id, protocol_id)
        );
        "#,
    )?;

    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS batches (
            batch_id INTEGER PRIMARY KEY,
            protocol_id INTEGER NOT NULL REFERENCES protocols(protocol_id),
            name TEXT,
            description TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_batches_protocol ON batches(protocol_id);

        CREATE TABLE IF NOT EXISTS structures (
            struct_id INTEGER PRIMARY KEY,
            batch_id INTEGER NOT NULL REFERENCES batches(batch_id),
            tag TEXT,
            input_tag TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_structures_batch ON structures(batch_id);
        "#,
    )?;

    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS protein_rmsd_no_superposition (
            struct_id INTEGER PRIMARY KEY REFERENCES structures(struct_id),
            reference_tag TEXT,
            protein_backbone REAL
        );

        CREATE TABLE IF NOT EXISTS total_scores (
            struct_id INTEGER PRIMARY KEY REFERENCES structures(struct_id),
            score REAL
        );
        "#,
    )?;

    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS protocol_output (
            output_id INTEGER PRIMARY KEY AUTOINCREMENT,
            benchmark_id INTEGER NOT NULL REFERENCES benchmarks(benchmark_id),
            protocol_id INTEGER NOT NULL REFERENCES protocols(protocol_id),
            stdout TEXT,
            stderr TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_protocol_output_benchmark ON protocol_output(benchmark_id);
        "#,
    )?;

    info!("Database schema created successfully");
    Ok(())
}

/// Migrate the schema from one version to another
fn migrate_schema(_conn: &Connection, from_version: i32) -> Result<()> {
    // v1 is the first released schema; anything older was never written
    Err(anyhow::anyhow!(
        "Unknown schema version: {}. Cannot migrate.",
        from_version
    ))
}
