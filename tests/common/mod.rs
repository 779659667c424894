/*!
 * Common test utilities for the loopbench test suite
 */

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Result;
use tempfile::TempDir;

use loopbench::database::{Batch, Benchmark, Protocol, Repository, RmsdMetric, ScoreMetric, Structure};
use loopbench::settings::{SettingsFile, SettingsOverrides, SettingsResolver, ScriptedPrompter};

/// A settings file that answers every key from `[DEFAULT]`
pub const COMPLETE_SETTINGS: &str = "\
[DEFAULT]
rosetta = /opt/rosetta
author = Kale Kundert
db_name = kale_loops_benchmark
db_user = kale
db_password = echo pa55w0rd
db_host = localhost
db_port = 3306

[cluster]
db_host = db.cluster.example.org
db_port = 3308
";

/// Route `log` output through the test harness; safe to call from every test
pub fn init_logging() {
    let _ = env_logger::builder()
        .is_test(true)
        .filter_level(log::LevelFilter::Debug)
        .try_init();
}

/// Creates a temporary directory for test files
pub fn create_temp_dir() -> Result<TempDir> {
    Ok(TempDir::new()?)
}

/// Creates a test file with the given content in the specified directory
pub fn create_test_file(dir: &Path, filename: &str, content: &str) -> Result<PathBuf> {
    let file_path = dir.join(filename);
    fs::write(&file_path, content)?;
    Ok(file_path)
}

/// Writes `settings.conf` into `dir`
pub fn create_settings_file(dir: &Path, content: &str) -> Result<PathBuf> {
    create_test_file(dir, "settings.conf", content)
}

/// Non-interactive resolver over an in-memory settings file
pub fn resolver_for(
    content: &str,
    overrides: SettingsOverrides,
) -> SettingsResolver<ScriptedPrompter> {
    let file = SettingsFile::from_str_at(content, "/nonexistent/settings.conf")
        .expect("test settings should parse");
    SettingsResolver::with_prompter(file, overrides, ScriptedPrompter::default()).interactive(false)
}

/// Ids created by [`seed_benchmark`]
pub struct SeededBenchmark {
    pub benchmark: Benchmark,
    pub linked_struct_ids: Vec<i64>,
    pub unlinked_struct_ids: Vec<i64>,
}

/// Two protocols with two batches each; the benchmark links only protocol 1.
///
/// Structures are inserted out of id order so ordering is actually checked.
pub fn seed_benchmark(repo: &Repository<'_>) -> Result<SeededBenchmark> {
    repo.insert_protocol(&Protocol::new(1))?;
    repo.insert_protocol(&Protocol::new(2))?;

    repo.insert_batch(&Batch::new(10, 1, "kic"))?;
    repo.insert_batch(&Batch::new(11, 1, "kic-fragments"))?;
    repo.insert_batch(&Batch::new(20, 2, "ngk"))?;

    let mut with_metrics = Structure::new(103, 11, "1srp.b");
    with_metrics.rmsd = Some(RmsdMetric::new(103, "1srp", 0.8));
    with_metrics.score = Some(ScoreMetric::new(103, -310.5));
    repo.insert_structure(&with_metrics)?;

    repo.insert_structure(&Structure::new(101, 10, "1srp.a"))?;
    repo.insert_structure(&Structure::new(102, 10, "1srp.c"))?;
    repo.insert_structure(&Structure::new(201, 20, "2cpl.a"))?;

    let benchmark = repo.create_benchmark(
        &Benchmark::new(Some("kic-vs-ngk".to_string()), None),
        &[1, 1],
    )?;

    Ok(SeededBenchmark {
        benchmark,
        linked_struct_ids: vec![101, 102, 103],
        unlinked_struct_ids: vec![201],
    })
}
