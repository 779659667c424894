/*!
 * Integration tests for transactional sessions against database files
 */

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::PathBuf;

use anyhow::{anyhow, Result};

use loopbench::database::schema::tables;
use loopbench::database::{Batch, Benchmark, Database, Protocol, ProtocolOutput};
use loopbench::settings::Settings;

use crate::common;

fn settings(db_name: &str) -> Settings {
    Settings {
        rosetta: PathBuf::from("/opt/rosetta"),
        author: "Kale Kundert".to_string(),
        db_name: db_name.to_string(),
        db_user: "kale".to_string(),
        db_password_cmd: "echo pa55w0rd".to_string(),
        db_password: "pa55w0rd".to_string(),
        db_host: "localhost".to_string(),
        db_port: 3306,
    }
}

#[test]
fn test_connect_shouldCreateNamedFileInDataDir() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let data_dir = temp_dir.path().join("data");

    let db = Database::connect(&settings("kale_loops_benchmark"), &data_dir)?;

    assert_eq!(db.path(), data_dir.join("kale_loops_benchmark.sqlite3"));
    assert!(db.path().exists());
    let url = db.url().expect("connect should keep the url");
    assert_eq!(url.host(), "localhost");
    assert_eq!(url.user(), "kale");
    Ok(())
}

#[test]
fn test_session_committed_shouldBeVisibleAfterReopen() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let path = temp_dir.path().join("loops.sqlite3");

    {
        let mut db = Database::open(&path)?;
        db.session(|repo| {
            repo.insert_protocol(&Protocol::new(1))?;
            repo.insert_batch(&Batch::new(10, 1, "kic"))?;
            Ok(())
        })?;
    }

    let mut db = Database::open(&path)?;
    let batches = db.session(|repo| repo.fetch_all::<Batch>())?;
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].name.as_deref(), Some("kic"));
    Ok(())
}

#[test]
fn test_session_failing_shouldRollBackAndReturnOriginalError() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let mut db = Database::open(temp_dir.path().join("loops.sqlite3"))?;

    let result: Result<()> = db.session(|repo| {
        repo.insert_protocol(&Protocol::new(1))?;
        repo.create_benchmark(&Benchmark::new(Some("aborted".to_string()), None), &[1])?;
        Err(anyhow!("analysis crashed"))
    });

    let err = result.unwrap_err();
    assert_eq!(err.to_string(), "analysis crashed");

    let stats = db.stats()?;
    assert_eq!(stats.count(tables::PROTOCOLS), Some(0));
    assert_eq!(stats.count(tables::BENCHMARKS), Some(0));
    assert_eq!(stats.count(tables::BENCHMARK_PROTOCOLS), Some(0));

    // The connection stays usable after a rollback
    let created = db.session(|repo| {
        repo.insert_protocol(&Protocol::new(1))?;
        repo.create_benchmark(&Benchmark::new(Some("retried".to_string()), None), &[1])
    })?;
    assert_eq!(created.protocol_ids, vec![1]);
    assert_eq!(db.stats()?.count(tables::BENCHMARKS), Some(1));
    Ok(())
}

#[test]
fn test_session_panicking_shouldRollBackAndStayUsable() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let mut db = Database::open(temp_dir.path().join("loops.sqlite3"))?;

    let outcome = catch_unwind(AssertUnwindSafe(|| {
        db.session(|repo| -> Result<()> {
            repo.insert_protocol(&Protocol::new(1))?;
            panic!("analysis crashed");
        })
    }));

    assert!(outcome.is_err());
    assert_eq!(db.stats()?.count(tables::PROTOCOLS), Some(0));

    db.session(|repo| repo.insert_protocol(&Protocol::new(1)))?;
    assert_eq!(db.stats()?.count(tables::PROTOCOLS), Some(1));
    Ok(())
}

#[test]
fn test_session_foreignKeyViolation_shouldRollBackEarlierInserts() -> Result<()> {
    let mut db = Database::open_in_memory()?;

    let result = db.session(|repo| {
        repo.insert_protocol(&Protocol::new(1))?;
        // Batch 20 points at a protocol that does not exist
        repo.insert_batch(&Batch::new(20, 2, "ngk"))?;
        Ok(())
    });

    assert!(result.is_err());
    assert_eq!(db.stats()?.count(tables::PROTOCOLS), Some(0));
    Ok(())
}

#[test]
fn test_session_protocolOutput_shouldRequireLinkedBenchmark() -> Result<()> {
    let mut db = Database::open_in_memory()?;

    let benchmark = db.session(|repo| {
        repo.insert_protocol(&Protocol::new(1))?;
        repo.create_benchmark(&Benchmark::new(None, None), &[1])
    })?;

    let output_id = db.session(|repo| {
        repo.record_protocol_output(&ProtocolOutput::new(benchmark.id(), 1, "ok", ""))
    })?;
    assert!(output_id > 0);

    let orphan = db.session(|repo| {
        repo.record_protocol_output(&ProtocolOutput::new(benchmark.id() + 100, 1, "lost", ""))
    });
    assert!(orphan.is_err());

    let outputs = db.session(|repo| repo.protocol_outputs(benchmark.id()))?;
    assert_eq!(outputs.len(), 1);
    assert_eq!(outputs[0].stdout.as_deref(), Some("ok"));
    Ok(())
}

#[test]
fn test_open_existingFile_shouldKeepSchemaVersion() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let path = temp_dir.path().join("loops.sqlite3");

    drop(Database::open(&path)?);
    let db = Database::open(&path)?;

    let stats = db.stats()?;
    assert_eq!(stats.counts.len(), tables::ALL.len());
    assert!(stats.file_size_bytes > 0);
    Ok(())
}
