/*!
 * Database entity models.
 *
 * Each struct maps to one table. Relations loaded by the repository live in
 * extra fields that are not columns and never appear in the record view.
 */

use chrono::NaiveDateTime;
use rusqlite::Row;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use super::schema::tables;

/// Uniform column-level view of a table row
pub trait Record: Sized {
    /// Table the record is stored in
    const TABLE: &'static str;

    /// Column names, in select order
    const COLUMNS: &'static [&'static str];

    /// Column used for stable ordering
    const ORDER_BY: &'static str;

    /// Build a record from `COLUMNS.len()` values starting at `offset`
    fn from_row_at(row: &Row<'_>, offset: usize) -> rusqlite::Result<Self>;

    /// Column values, in `COLUMNS` order
    fn values(&self) -> Vec<Value>;

    /// Build a record from a row selected with [`Record::select_sql`]
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Self::from_row_at(row, 0)
    }

    /// Column name to value mapping
    fn as_map(&self) -> Map<String, Value> {
        Self::COLUMNS
            .iter()
            .map(|c| c.to_string())
            .zip(self.values())
            .collect()
    }

    /// Column list qualified with a table alias, e.g. `s.struct_id, s.tag`
    fn qualified_columns(alias: &str) -> String {
        Self::COLUMNS
            .iter()
            .map(|c| format!("{}.{}", alias, c))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// `SELECT <columns> FROM <table>`
    fn select_sql() -> String {
        format!("SELECT {} FROM {}", Self::COLUMNS.join(", "), Self::TABLE)
    }
}

/// One analysis run over a set of protocols
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Benchmark {
    /// Database ID, assigned on insert
    pub benchmark_id: i64,
    /// When the run started (local time)
    pub start_time: Option<NaiveDateTime>,
    /// Short name
    pub name: Option<String>,
    /// Free-form description
    pub description: Option<String>,
    /// Linked protocol ids, ascending
    #[serde(default)]
    pub protocol_ids: Vec<i64>,
}

impl Benchmark {
    /// New benchmark starting now
    pub fn new(name: Option<String>, description: Option<String>) -> Self {
        Self {
            benchmark_id: 0,
            start_time: Some(chrono::Local::now().naive_local()),
            name,
            description,
            protocol_ids: Vec::new(),
        }
    }

    /// Database ID
    pub fn id(&self) -> i64 {
        self.benchmark_id
    }
}

impl std::fmt::Display for Benchmark {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "<Benchmark id={} name={}>",
            self.benchmark_id,
            self.name.as_deref().unwrap_or("None")
        )
    }
}

impl Record for Benchmark {
    const TABLE: &'static str = tables::BENCHMARKS;
    const COLUMNS: &'static [&'static str] = &["benchmark_id", "start_time", "name", "description"];
    const ORDER_BY: &'static str = "benchmark_id";

    fn from_row_at(row: &Row<'_>, offset: usize) -> rusqlite::Result<Self> {
        Ok(Self {
            benchmark_id: row.get(offset)?,
            start_time: row.get(offset + 1)?,
            name: row.get(offset + 2)?,
            description: row.get(offset + 3)?,
            protocol_ids: Vec::new(),
        })
    }

    fn values(&self) -> Vec<Value> {
        vec![
            json!(self.benchmark_id),
            json!(self.start_time.map(format_timestamp)),
            json!(self.name),
            json!(self.description),
        ]
    }
}

/// Link between a benchmark and one of its protocols
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BenchmarkProtocol {
    /// Benchmark
    pub benchmark_id: i64,
    /// Protocol
    pub protocol_id: i64,
}

impl BenchmarkProtocol {
    pub fn new(benchmark_id: i64, protocol_id: i64) -> Self {
        Self {
            benchmark_id,
            protocol_id,
        }
    }
}

impl Record for BenchmarkProtocol {
    const TABLE: &'static str = tables::BENCHMARK_PROTOCOLS;
    const COLUMNS: &'static [&'static str] = &["benchmark_id", "protocol_id"];
    const ORDER_BY: &'static str = "benchmark_id, protocol_id";

    fn from_row_at(row: &Row<'_>, offset: usize) -> rusqlite::Result<Self> {
        Ok(Self {
            benchmark_id: row.get(offset)?,
            protocol_id: row.get(offset + 1)?,
        })
    }

    fn values(&self) -> Vec<Value> {
        vec![json!(self.benchmark_id), json!(self.protocol_id)]
    }
}

/// One experiment configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Protocol {
    /// Database ID
    pub protocol_id: i64,
    /// Options given explicitly on the command line
    pub specified_options: Option<String>,
    /// Full command line
    pub command_line: Option<String>,
    /// Repository URL of the rosetta build
    pub svn_url: Option<String>,
    /// Revision of the rosetta build
    pub svn_version: Option<String>,
    /// Protocol script
    pub script: Option<String>,
    /// Batches run under this protocol, when loaded
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub batches: Vec<Batch>,
}

impl Protocol {
    /// Protocol with the given id and no details
    pub fn new(protocol_id: i64) -> Self {
        Self {
            protocol_id,
            ..Default::default()
        }
    }
}

impl Record for Protocol {
    const TABLE: &'static str = tables::PROTOCOLS;
    const COLUMNS: &'static [&'static str] = &[
        "protocol_id",
        "specified_options",
        "command_line",
        "svn_url",
        "svn_version",
        "script",
    ];
    const ORDER_BY: &'static str = "protocol_id";

    fn from_row_at(row: &Row<'_>, offset: usize) -> rusqlite::Result<Self> {
        Ok(Self {
            protocol_id: row.get(offset)?,
            specified_options: row.get(offset + 1)?,
            command_line: row.get(offset + 2)?,
            svn_url: row.get(offset + 3)?,
            svn_version: row.get(offset + 4)?,
            script: row.get(offset + 5)?,
            batches: Vec::new(),
        })
    }

    fn values(&self) -> Vec<Value> {
        vec![
            json!(self.protocol_id),
            json!(self.specified_options),
            json!(self.command_line),
            json!(self.svn_url),
            json!(self.svn_version),
            json!(self.script),
        ]
    }
}

/// Named group of structure-generation jobs under one protocol
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Batch {
    /// Database ID
    pub batch_id: i64,
    /// Owning protocol
    pub protocol_id: i64,
    /// Batch name
    pub name: Option<String>,
    /// Batch description
    pub description: Option<String>,
    /// Structures generated in this batch, when loaded
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub structures: Vec<Structure>,
}

impl Batch {
    pub fn new(batch_id: i64, protocol_id: i64, name: impl Into<String>) -> Self {
        Self {
            batch_id,
            protocol_id,
            name: Some(name.into()),
            ..Default::default()
        }
    }
}

impl Record for Batch {
    const TABLE: &'static str = tables::BATCHES;
    const COLUMNS: &'static [&'static str] = &["batch_id", "protocol_id", "name", "description"];
    const ORDER_BY: &'static str = "batch_id";

    fn from_row_at(row: &Row<'_>, offset: usize) -> rusqlite::Result<Self> {
        Ok(Self {
            batch_id: row.get(offset)?,
            protocol_id: row.get(offset + 1)?,
            name: row.get(offset + 2)?,
            description: row.get(offset + 3)?,
            structures: Vec::new(),
        })
    }

    fn values(&self) -> Vec<Value> {
        vec![
            json!(self.batch_id),
            json!(self.protocol_id),
            json!(self.name),
            json!(self.description),
        ]
    }
}

/// One generated model
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Structure {
    /// Database ID
    pub struct_id: i64,
    /// Owning batch
    pub batch_id: i64,
    /// Output tag
    pub tag: Option<String>,
    /// Tag of the input structure
    pub input_tag: Option<String>,
    /// Backbone RMSD, when loaded and present
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rmsd: Option<RmsdMetric>,
    /// Total score, when loaded and present
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<ScoreMetric>,
}

impl Structure {
    pub fn new(struct_id: i64, batch_id: i64, tag: impl Into<String>) -> Self {
        Self {
            struct_id,
            batch_id,
            tag: Some(tag.into()),
            ..Default::default()
        }
    }
}

impl Record for Structure {
    const TABLE: &'static str = tables::STRUCTURES;
    const COLUMNS: &'static [&'static str] = &["struct_id", "batch_id", "tag", "input_tag"];
    const ORDER_BY: &'static str = "struct_id";

    fn from_row_at(row: &Row<'_>, offset: usize) -> rusqlite::Result<Self> {
        Ok(Self {
            struct_id: row.get(offset)?,
            batch_id: row.get(offset + 1)?,
            tag: row.get(offset + 2)?,
            input_tag: row.get(offset + 3)?,
            rmsd: None,
            score: None,
        })
    }

    fn values(&self) -> Vec<Value> {
        vec![
            json!(self.struct_id),
            json!(self.batch_id),
            json!(self.tag),
            json!(self.input_tag),
        ]
    }
}

/// Backbone RMSD to the reference, without superposition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RmsdMetric {
    /// Structure the metric belongs to
    pub struct_id: i64,
    /// Tag of the reference structure
    pub reference_tag: Option<String>,
    /// Backbone RMSD in Ångström
    pub protein_backbone: Option<f64>,
}

impl RmsdMetric {
    pub fn new(struct_id: i64, reference_tag: impl Into<String>, protein_backbone: f64) -> Self {
        Self {
            struct_id,
            reference_tag: Some(reference_tag.into()),
            protein_backbone: Some(protein_backbone),
        }
    }
}

impl Record for RmsdMetric {
    const TABLE: &'static str = tables::RMSD;
    const COLUMNS: &'static [&'static str] = &["struct_id", "reference_tag", "protein_backbone"];
    const ORDER_BY: &'static str = "struct_id";

    fn from_row_at(row: &Row<'_>, offset: usize) -> rusqlite::Result<Self> {
        Ok(Self {
            struct_id: row.get(offset)?,
            reference_tag: row.get(offset + 1)?,
            protein_backbone: row.get(offset + 2)?,
        })
    }

    fn values(&self) -> Vec<Value> {
        vec![
            json!(self.struct_id),
            json!(self.reference_tag),
            json!(self.protein_backbone),
        ]
    }
}

/// Total rosetta score of a structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreMetric {
    /// Structure the score belongs to
    pub struct_id: i64,
    /// Total score
    pub score: Option<f64>,
}

impl ScoreMetric {
    pub fn new(struct_id: i64, score: f64) -> Self {
        Self {
            struct_id,
            score: Some(score),
        }
    }
}

impl Record for ScoreMetric {
    const TABLE: &'static str = tables::TOTAL_SCORES;
    const COLUMNS: &'static [&'static str] = &["struct_id", "score"];
    const ORDER_BY: &'static str = "struct_id";

    fn from_row_at(row: &Row<'_>, offset: usize) -> rusqlite::Result<Self> {
        Ok(Self {
            struct_id: row.get(offset)?,
            score: row.get(offset + 1)?,
        })
    }

    fn values(&self) -> Vec<Value> {
        vec![json!(self.struct_id), json!(self.score)]
    }
}

/// Captured stdout/stderr of one protocol run within a benchmark
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolOutput {
    /// Database ID, assigned on insert
    pub output_id: i64,
    /// Benchmark
    pub benchmark_id: i64,
    /// Protocol
    pub protocol_id: i64,
    /// Captured stdout
    pub stdout: Option<String>,
    /// Captured stderr
    pub stderr: Option<String>,
}

impl ProtocolOutput {
    pub fn new(
        benchmark_id: i64,
        protocol_id: i64,
        stdout: impl Into<String>,
        stderr: impl Into<String>,
    ) -> Self {
        Self {
            output_id: 0, // Will be assigned by database
            benchmark_id,
            protocol_id,
            stdout: Some(stdout.into()),
            stderr: Some(stderr.into()),
        }
    }
}

impl Record for ProtocolOutput {
    const TABLE: &'static str = tables::PROTOCOL_OUTPUT;
    const COLUMNS: &'static [&'static str] =
        &["output_id", "benchmark_id", "protocol_id", "stdout", "stderr"];
    const ORDER_BY: &'static str = "output_id";

    fn from_row_at(row: &Row<'_>, offset: usize) -> rusqlite::Result<Self> {
        Ok(Self {
            output_id: row.get(offset)?,
            benchmark_id: row.get(offset + 1)?,
            protocol_id: row.get(offset + 2)?,
            stdout: row.get(offset + 3)?,
            stderr: row.get(offset + 4)?,
        })
    }

    fn values(&self) -> Vec<Value> {
        vec![
            json!(self.output_id),
            json!(self.benchmark_id),
            json!(self.protocol_id),
            json!(self.stdout),
            json!(self.stderr),
        ]
    }
}

/// Timestamp format used in exported records
pub fn format_timestamp(ts: NaiveDateTime) -> String {
    ts.format("%Y-%m-%d %H:%M:%S%.6f").to_string()
}
