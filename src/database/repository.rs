/*!
 * Repository layer for database operations.
 *
 * A `Repository` borrows the connection of an open session (see
 * [`Database::session`](super::Database::session)), so everything it does
 * commits or rolls back together.
 *
 * The benchmark accessors load related rows eagerly: one query per relation,
 * never one per row.
 */

use std::collections::HashMap;

use anyhow::{Context, Result};
use log::debug;
use rusqlite::{params, Connection, OptionalExtension, Params};

use super::models::{
    Batch, Benchmark, Protocol, ProtocolOutput, Record, RmsdMetric, ScoreMetric, Structure,
};
use super::schema::tables;
use super::table::Table;

/// Protocol ids linked to benchmark `?1`
const BENCHMARK_PROTOCOL_IDS: &str =
    "SELECT protocol_id FROM benchmark_protocols WHERE benchmark_id = ?1";

/// Session-scoped query helpers
pub struct Repository<'c> {
    conn: &'c Connection,
}

impl<'c> Repository<'c> {
    /// Repository over a session's connection
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    /// The underlying connection, for ad-hoc SQL
    pub fn connection(&self) -> &Connection {
        self.conn
    }

    // =========================================================================
    // Benchmark Operations
    // =========================================================================

    /// Insert a benchmark and link it to `protocol_ids`.
    ///
    /// The protocol set is written here once; there is no way to change it
    /// afterwards.
    pub fn create_benchmark(&self, benchmark: &Benchmark, protocol_ids: &[i64]) -> Result<Benchmark> {
        self.conn
            .execute(
                "INSERT INTO benchmarks (start_time, name, description) VALUES (?1, ?2, ?3)",
                params![benchmark.start_time, benchmark.name, benchmark.description],
            )
            .context("Failed to insert benchmark")?;
        let benchmark_id = self.conn.last_insert_rowid();

        let mut ids = protocol_ids.to_vec();
        ids.sort_unstable();
        ids.dedup();

        for protocol_id in &ids {
            self.conn
                .execute(
                    "INSERT INTO benchmark_protocols (benchmark_id, protocol_id) VALUES (?1, ?2)",
                    params![benchmark_id, protocol_id],
                )
                .with_context(|| {
                    format!(
                        "Failed to link protocol {} to benchmark {}",
                        protocol_id, benchmark_id
                    )
                })?;
        }

        debug!("Created benchmark {} with {} protocol(s)", benchmark_id, ids.len());

        Ok(Benchmark {
            benchmark_id,
            protocol_ids: ids,
            ..benchmark.clone()
        })
    }

    /// Get a benchmark by ID, with its protocol ids
    pub fn benchmark(&self, benchmark_id: i64) -> Result<Option<Benchmark>> {
        let benchmark = self
            .conn
            .query_row(
                &format!("{} WHERE benchmark_id = ?1", Benchmark::select_sql()),
                [benchmark_id],
                Benchmark::from_row,
            )
            .optional()?;

        match benchmark {
            Some(mut benchmark) => {
                benchmark.protocol_ids = self.benchmark_protocol_ids(benchmark_id)?;
                Ok(Some(benchmark))
            }
            None => Ok(None),
        }
    }

    /// All benchmarks, oldest first, with their protocol ids
    pub fn benchmarks(&self) -> Result<Vec<Benchmark>> {
        let mut benchmarks: Vec<Benchmark> = self.fetch_all()?;

        let mut links: HashMap<i64, Vec<i64>> = HashMap::new();
        let mut stmt = self.conn.prepare(
            "SELECT benchmark_id, protocol_id FROM benchmark_protocols ORDER BY benchmark_id, protocol_id",
        )?;
        let rows = stmt.query_map([], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?)))?;
        for row in rows {
            let (benchmark_id, protocol_id) = row?;
            links.entry(benchmark_id).or_default().push(protocol_id);
        }

        for benchmark in &mut benchmarks {
            benchmark.protocol_ids = links.remove(&benchmark.benchmark_id).unwrap_or_default();
        }

        Ok(benchmarks)
    }

    /// Protocol ids linked to a benchmark, ascending
    pub fn benchmark_protocol_ids(&self, benchmark_id: i64) -> Result<Vec<i64>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{} ORDER BY protocol_id", BENCHMARK_PROTOCOL_IDS))?;
        let ids = stmt
            .query_map([benchmark_id], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<i64>>>()?;
        Ok(ids)
    }

    /// Protocols linked to a benchmark, each with its batches
    pub fn benchmark_protocols(&self, benchmark_id: i64) -> Result<Vec<Protocol>> {
        let mut protocols: Vec<Protocol> = self.query_records(
            &format!(
                "{} WHERE protocol_id IN ({}) ORDER BY protocol_id",
                Protocol::select_sql(),
                BENCHMARK_PROTOCOL_IDS
            ),
            [benchmark_id],
        )?;

        let batches: Vec<Batch> = self.query_records(
            &format!(
                "{} WHERE protocol_id IN ({}) ORDER BY batch_id",
                Batch::select_sql(),
                BENCHMARK_PROTOCOL_IDS
            ),
            [benchmark_id],
        )?;

        let mut by_protocol = group_by(batches, |b| b.protocol_id);
        for protocol in &mut protocols {
            protocol.batches = by_protocol.remove(&protocol.protocol_id).unwrap_or_default();
        }

        Ok(protocols)
    }

    /// Batches of every protocol linked to a benchmark, each with its
    /// structures (and their metrics)
    pub fn benchmark_batches(&self, benchmark_id: i64) -> Result<Vec<Batch>> {
        let mut batches: Vec<Batch> = self.query_records(
            &format!(
                "SELECT {} FROM batches b JOIN protocols p ON b.protocol_id = p.protocol_id \
                 WHERE p.protocol_id IN ({}) ORDER BY b.batch_id",
                Batch::qualified_columns("b"),
                BENCHMARK_PROTOCOL_IDS
            ),
            [benchmark_id],
        )?;

        let structures = self.benchmark_structures(benchmark_id)?;
        let mut by_batch = group_by(structures, |s| s.batch_id);
        for batch in &mut batches {
            batch.structures = by_batch.remove(&batch.batch_id).unwrap_or_default();
        }

        Ok(batches)
    }

    /// Structures of every batch of every protocol linked to a benchmark,
    /// with their metrics, ordered by struct id
    pub fn benchmark_structures(&self, benchmark_id: i64) -> Result<Vec<Structure>> {
        let sql = format!(
            "SELECT {}, {}, {} \
             FROM structures s \
             JOIN batches b ON s.batch_id = b.batch_id \
             JOIN protocols p ON b.protocol_id = p.protocol_id \
             LEFT JOIN {} r ON r.struct_id = s.struct_id \
             LEFT JOIN {} t ON t.struct_id = s.struct_id \
             WHERE p.protocol_id IN ({}) \
             ORDER BY s.struct_id",
            Structure::qualified_columns("s"),
            RmsdMetric::qualified_columns("r"),
            ScoreMetric::qualified_columns("t"),
            tables::RMSD,
            tables::TOTAL_SCORES,
            BENCHMARK_PROTOCOL_IDS
        );

        let rmsd_offset = Structure::COLUMNS.len();
        let score_offset = rmsd_offset + RmsdMetric::COLUMNS.len();

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([benchmark_id], |row| {
            let mut structure = Structure::from_row(row)?;
            structure.rmsd = optional_record(row, rmsd_offset)?;
            structure.score = optional_record(row, score_offset)?;
            Ok(structure)
        })?;

        let structures = rows.collect::<rusqlite::Result<Vec<_>>>()?;
        debug!(
            "Loaded {} structure(s) for benchmark {}",
            structures.len(),
            benchmark_id
        );
        Ok(structures)
    }

    // =========================================================================
    // Feature Table Operations
    // =========================================================================

    /// Insert a protocol
    pub fn insert_protocol(&self, protocol: &Protocol) -> Result<i64> {
        self.conn.execute(
            r#"
            INSERT INTO protocols (
                protocol_id, specified_options, command_line, svn_url, svn_version, script
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                protocol.protocol_id,
                protocol.specified_options,
                protocol.command_line,
                protocol.svn_url,
                protocol.svn_version,
                protocol.script,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Insert a batch
    pub fn insert_batch(&self, batch: &Batch) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO batches (batch_id, protocol_id, name, description) VALUES (?1, ?2, ?3, ?4)",
            params![batch.batch_id, batch.protocol_id, batch.name, batch.description],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Insert a structure, along with whichever metrics it carries
    pub fn insert_structure(&self, structure: &Structure) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO structures (struct_id, batch_id, tag, input_tag) VALUES (?1, ?2, ?3, ?4)",
            params![
                structure.struct_id,
                structure.batch_id,
                structure.tag,
                structure.input_tag
            ],
        )?;
        let struct_id = self.conn.last_insert_rowid();

        if let Some(rmsd) = &structure.rmsd {
            self.insert_rmsd(&RmsdMetric {
                struct_id,
                ..rmsd.clone()
            })?;
        }
        if let Some(score) = &structure.score {
            self.insert_score(&ScoreMetric {
                struct_id,
                ..score.clone()
            })?;
        }

        Ok(struct_id)
    }

    /// Insert the RMSD metric of a structure
    pub fn insert_rmsd(&self, rmsd: &RmsdMetric) -> Result<()> {
        self.conn.execute(
            "INSERT INTO protein_rmsd_no_superposition (struct_id, reference_tag, protein_backbone) VALUES (?1, ?2, ?3)",
            params![rmsd.struct_id, rmsd.reference_tag, rmsd.protein_backbone],
        )?;
        Ok(())
    }

    /// Insert the total score of a structure
    pub fn insert_score(&self, score: &ScoreMetric) -> Result<()> {
        self.conn.execute(
            "INSERT INTO total_scores (struct_id, score) VALUES (?1, ?2)",
            params![score.struct_id, score.score],
        )?;
        Ok(())
    }

    // =========================================================================
    // Protocol Output Operations
    // =========================================================================

    /// Store the captured output of one protocol run
    pub fn record_protocol_output(&self, output: &ProtocolOutput) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO protocol_output (benchmark_id, protocol_id, stdout, stderr) VALUES (?1, ?2, ?3, ?4)",
            params![output.benchmark_id, output.protocol_id, output.stdout, output.stderr],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Captured outputs of a benchmark, in insertion order
    pub fn protocol_outputs(&self, benchmark_id: i64) -> Result<Vec<ProtocolOutput>> {
        self.query_records(
            &format!(
                "{} WHERE benchmark_id = ?1 ORDER BY output_id",
                ProtocolOutput::select_sql()
            ),
            [benchmark_id],
        )
    }

    // =========================================================================
    // Generic Access
    // =========================================================================

    /// Every row of a record's table, in primary key order
    pub fn fetch_all<R: Record>(&self) -> Result<Vec<R>> {
        self.query_records(&format!("{} ORDER BY {}", R::select_sql(), R::ORDER_BY), [])
    }

    /// Run a query whose columns are `R::COLUMNS` and map every row
    pub fn query_records<R: Record, P: Params>(&self, sql: &str, params: P) -> Result<Vec<R>> {
        let mut stmt = self
            .conn
            .prepare(sql)
            .with_context(|| format!("Failed to prepare query on {}", R::TABLE))?;
        let records = stmt
            .query_map(params, R::from_row)?
            .collect::<rusqlite::Result<Vec<R>>>()?;
        Ok(records)
    }

    /// A whole table as rows of column values
    pub fn table_of<R: Record>(&self) -> Result<Table> {
        let records: Vec<R> = self.fetch_all()?;
        Ok(Table::from_records(&records))
    }
}

/// Read a record from a LEFT JOIN; a NULL key means there was no match
fn optional_record<R: Record>(row: &rusqlite::Row<'_>, offset: usize) -> rusqlite::Result<Option<R>> {
    match row.get::<_, Option<i64>>(offset)? {
        Some(_) => R::from_row_at(row, offset).map(Some),
        None => Ok(None),
    }
}

fn group_by<T, F>(items: Vec<T>, key: F) -> HashMap<i64, Vec<T>>
where
    F: Fn(&T) -> i64,
{
    let mut groups: HashMap<i64, Vec<T>> = HashMap::new();
    for item in items {
        groups.entry(key(&item)).or_default().push(item);
    }
    groups
}
