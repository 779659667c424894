// Module-specific lints configuration
#![allow(clippy::uninlined_format_args)]

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result, anyhow, bail};
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{Shell, generate};
use log::{debug, error, info, Level, LevelFilter, Log, Metadata, Record, SetLoggerError};

use loopbench::database::{
    Batch, Benchmark, BenchmarkProtocol, Database, Protocol, ProtocolOutput, Record as _,
    Repository, RmsdMetric, ScoreMetric, Structure, Table,
};
use loopbench::database::schema::tables;
use loopbench::errors::AppError;
use loopbench::settings::{
    self, Settings, SettingsArgs, SettingsOverrides, TerminalPrompter, DEFAULT_SETTINGS_FILENAME,
};

/// Exit status used when input closes at a prompt
const INTERRUPTED_EXIT_CODE: u8 = 130;

/// CLI Wrapper for log levels to implement ValueEnum
#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliLogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<CliLogLevel> for LevelFilter {
    fn from(cli_level: CliLogLevel) -> Self {
        match cli_level {
            CliLogLevel::Error => LevelFilter::Error,
            CliLogLevel::Warn => LevelFilter::Warn,
            CliLogLevel::Info => LevelFilter::Info,
            CliLogLevel::Debug => LevelFilter::Debug,
            CliLogLevel::Trace => LevelFilter::Trace,
        }
    }
}

/// Tables that can be exported with the `table` subcommand
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum TableName {
    Benchmarks,
    BenchmarkProtocols,
    Protocols,
    Batches,
    Structures,
    /// protein_rmsd_no_superposition
    Rmsd,
    /// total_scores
    Scores,
    ProtocolOutput,
    /// Structures joined with their RMSD and score
    Metrics,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
enum SettingsCommand {
    /// Create settings.conf interactively if it does not exist yet
    Install,

    /// Print the resolved settings
    Show {
        /// Print the database password instead of a mask
        #[arg(long)]
        reveal_password: bool,
    },
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Manage settings.conf
    Settings {
        #[command(subcommand)]
        action: SettingsCommand,
    },

    /// List benchmarks with database statistics
    Benchmarks,

    /// Show the protocols, batches and outputs of one benchmark
    Benchmark {
        /// Benchmark id
        #[arg(value_name = "ID")]
        id: i64,
    },

    /// Print one table, optionally restricted to a benchmark
    Table {
        /// Table to print
        #[arg(value_enum)]
        name: TableName,

        /// Only rows belonging to this benchmark
        #[arg(short, long, value_name = "ID")]
        benchmark: Option<i64>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Generate shell completions for loopbench
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// loopbench - loop modeling benchmark settings and results
#[derive(Parser, Debug)]
#[command(name = "loopbench")]
#[command(version)]
#[command(about = "Settings and result database for the loop modeling benchmark")]
#[command(long_about = "loopbench resolves the settings needed to build rosetta and reach the
benchmark database, and reads benchmark results back out of that database.

EXAMPLES:
    loopbench settings install                  # Create settings.conf
    loopbench settings show -c cluster          # Show the [cluster] profile
    loopbench --db-port 3307 benchmarks         # Override one setting
    loopbench benchmark 3                       # Protocols and batches of benchmark 3
    loopbench table metrics -b 3 -f json        # RMSD and score per structure
    loopbench completions bash > loopbench.bash # Generate bash completions

SETTINGS:
    Each setting comes from the first of: its command-line flag, the selected
    [section] of settings.conf, the [DEFAULT] section, or a prompt. Prompted
    values are saved to [DEFAULT] so you are only asked once.")]
struct CommandLineOptions {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    settings: SettingsArgs,

    /// Settings file path
    #[arg(long, global = true, value_name = "PATH", default_value = DEFAULT_SETTINGS_FILENAME)]
    settings_file: PathBuf,

    /// Fail instead of prompting for missing settings
    #[arg(long, global = true)]
    non_interactive: bool,

    /// Directory holding the database files
    #[arg(long, global = true, value_name = "DIR", env = "LOOPBENCH_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Log every SQL statement at debug level
    #[arg(long, global = true)]
    echo_sql: bool,

    /// Set logging level
    #[arg(short, long, global = true, value_enum, default_value = "info")]
    log_level: CliLogLevel,
}

struct CustomLogger {
    level: LevelFilter,
}

impl CustomLogger {
    fn new(level: LevelFilter) -> Self {
        CustomLogger { level }
    }

    fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
        let logger = Box::new(CustomLogger::new(level));
        log::set_boxed_logger(logger)?;
        log::set_max_level(level);
        Ok(())
    }

    fn tag_for_level(level: Level) -> &'static str {
        match level {
            Level::Error => "ERROR",
            Level::Warn => "WARN ",
            Level::Info => "INFO ",
            Level::Debug => "DEBUG",
            Level::Trace => "TRACE",
        }
    }

    fn color_for_level(level: Level) -> &'static str {
        match level {
            Level::Error => "1;31",
            Level::Warn => "1;33",
            Level::Info => "1;32",
            Level::Debug => "1;36",
            Level::Trace => "1;35",
        }
    }
}

impl Log for CustomLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let now = chrono::Local::now().format("%H:%M:%S.%3f");
            let level = record.level();

            let mut stderr = std::io::stderr();
            let _ = writeln!(
                stderr,
                "\x1B[{}m{} {} {}\x1B[0m",
                Self::color_for_level(level),
                now,
                Self::tag_for_level(level),
                record.args()
            );
        }
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

fn main() -> ExitCode {
    let cli = CommandLineOptions::parse();

    if let Err(e) = CustomLogger::init(cli.log_level.into()) {
        eprintln!("Failed to initialize logger: {}", e);
        return ExitCode::FAILURE;
    }

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => match AppError::from(e) {
            AppError::Settings(settings_error) if settings_error.is_interrupted() => {
                ExitCode::from(INTERRUPTED_EXIT_CODE)
            }
            other => {
                error!("{}", other);
                ExitCode::FAILURE
            }
        },
    }
}

fn run(cli: CommandLineOptions) -> Result<()> {
    let overrides: SettingsOverrides = cli.settings.clone().into();

    match &cli.command {
        Commands::Completions { shell } => {
            let mut cmd = CommandLineOptions::command();
            generate(*shell, &mut cmd, "loopbench", &mut std::io::stdout());
            Ok(())
        }
        Commands::Settings { action: SettingsCommand::Install } => {
            match settings::install(&cli.settings_file, overrides, TerminalPrompter)? {
                Some(_) => info!("Wrote settings to {:?}", cli.settings_file),
                None => info!("Nothing to do, delete {:?} to start over", cli.settings_file),
            }
            Ok(())
        }
        Commands::Settings { action: SettingsCommand::Show { reveal_password } } => {
            let settings = load_settings(&cli.settings_file, overrides, !cli.non_interactive)?;
            println!("{}", settings.show(*reveal_password));
            Ok(())
        }
        Commands::Benchmarks => {
            let mut db = open_database(&cli, overrides)?;
            let benchmarks = db.session(|repo| repo.benchmarks())?;
            let stats = db.stats()?;

            if benchmarks.is_empty() {
                println!("No benchmarks in {}", db.path().display());
            }
            for benchmark in &benchmarks {
                println!(
                    "{:>5}  {:<19}  {}",
                    benchmark.id(),
                    benchmark.start_time.map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string()).unwrap_or_default(),
                    benchmark.name.as_deref().unwrap_or("")
                );
            }
            info!("{}", stats);
            Ok(())
        }
        Commands::Benchmark { id } => {
            let mut db = open_database(&cli, overrides)?;
            db.session(|repo| show_benchmark(repo, *id))
        }
        Commands::Table { name, benchmark, format } => {
            let mut db = open_database(&cli, overrides)?;
            let table = db.session(|repo| load_table(repo, *name, *benchmark))?;
            debug!("{} row(s)", table.len());

            match *format {
                OutputFormat::Text => print!("{}", table),
                OutputFormat::Json => println!("{}", table.to_json()?),
            }
            Ok(())
        }
    }
}

fn load_settings(path: &Path, overrides: SettingsOverrides, interactive: bool) -> Result<Settings> {
    debug!("Loading settings from {:?}", path);
    Ok(Settings::load(path, overrides, interactive)?)
}

/// Resolve settings and open the database they point at
fn open_database(cli: &CommandLineOptions, overrides: SettingsOverrides) -> Result<Database> {
    let settings = load_settings(&cli.settings_file, overrides, !cli.non_interactive)?;

    let data_dir = match &cli.data_dir {
        Some(dir) => dir.clone(),
        None => Database::default_data_dir()?,
    };

    let mut db = Database::connect(&settings, &data_dir)
        .with_context(|| format!("Failed to connect to database '{}'", settings.db_name))?;
    db.set_echo(cli.echo_sql);
    Ok(db)
}

fn show_benchmark(repo: &Repository<'_>, id: i64) -> Result<()> {
    let benchmark = repo
        .benchmark(id)?
        .ok_or_else(|| anyhow!("No benchmark with id {}", id))?;

    println!("{}", benchmark);
    if let Some(start_time) = benchmark.start_time {
        println!("started:     {}", start_time.format("%Y-%m-%d %H:%M:%S"));
    }
    if let Some(description) = &benchmark.description {
        println!("description: {}", description);
    }

    let structure_counts: BTreeMap<i64, usize> = repo
        .benchmark_batches(id)?
        .iter()
        .map(|batch| (batch.batch_id, batch.structures.len()))
        .collect();

    for protocol in repo.benchmark_protocols(id)? {
        println!(
            "protocol {}: {} batch(es)",
            protocol.protocol_id,
            protocol.batches.len()
        );
        for batch in &protocol.batches {
            println!(
                "  batch {} {}: {} structure(s)",
                batch.batch_id,
                batch.name.as_deref().unwrap_or("-"),
                structure_counts.get(&batch.batch_id).copied().unwrap_or(0)
            );
        }
    }

    let outputs = repo.protocol_outputs(id)?;
    if !outputs.is_empty() {
        println!("{} captured protocol output(s)", outputs.len());
    }
    Ok(())
}

fn load_table(repo: &Repository<'_>, name: TableName, benchmark: Option<i64>) -> Result<Table> {
    let Some(id) = benchmark else {
        return match name {
            TableName::Benchmarks => repo.table_of::<Benchmark>(),
            TableName::BenchmarkProtocols => repo.table_of::<BenchmarkProtocol>(),
            TableName::Protocols => repo.table_of::<Protocol>(),
            TableName::Batches => repo.table_of::<Batch>(),
            TableName::Structures => repo.table_of::<Structure>(),
            TableName::Rmsd => repo.table_of::<RmsdMetric>(),
            TableName::Scores => repo.table_of::<ScoreMetric>(),
            TableName::ProtocolOutput => repo.table_of::<ProtocolOutput>(),
            TableName::Metrics => bail!("The metrics table needs --benchmark"),
        };
    };

    let Some(selected) = repo.benchmark(id)? else {
        bail!("No benchmark with id {}", id);
    };

    let table = match name {
        TableName::Benchmarks => Table::from_records(&[selected]),
        TableName::BenchmarkProtocols => {
            let sql = format!(
                "{} WHERE benchmark_id = ?1 ORDER BY protocol_id",
                BenchmarkProtocol::select_sql()
            );
            Table::from_records(&repo.query_records::<BenchmarkProtocol, _>(&sql, [id])?)
        }
        TableName::Protocols => Table::from_records(&repo.benchmark_protocols(id)?),
        TableName::Batches => Table::from_records(&repo.benchmark_batches(id)?),
        TableName::Structures => Table::from_records(&repo.benchmark_structures(id)?),
        TableName::Rmsd => {
            let rmsd: Vec<RmsdMetric> = repo
                .benchmark_structures(id)?
                .into_iter()
                .filter_map(|s| s.rmsd)
                .collect();
            Table::from_records(&rmsd)
        }
        TableName::Scores => {
            let scores: Vec<ScoreMetric> = repo
                .benchmark_structures(id)?
                .into_iter()
                .filter_map(|s| s.score)
                .collect();
            Table::from_records(&scores)
        }
        TableName::ProtocolOutput => Table::from_records(&repo.protocol_outputs(id)?),
        TableName::Metrics => Table::structure_metrics(&repo.benchmark_structures(id)?),
    };

    debug!("Loaded {} for benchmark {}", table_label(name), id);
    Ok(table)
}

fn table_label(name: TableName) -> &'static str {
    match name {
        TableName::Benchmarks => tables::BENCHMARKS,
        TableName::BenchmarkProtocols => tables::BENCHMARK_PROTOCOLS,
        TableName::Protocols => tables::PROTOCOLS,
        TableName::Batches => tables::BATCHES,
        TableName::Structures => tables::STRUCTURES,
        TableName::Rmsd => tables::RMSD,
        TableName::Scores => tables::TOTAL_SCORES,
        TableName::ProtocolOutput => tables::PROTOCOL_OUTPUT,
        TableName::Metrics => "structure metrics",
    }
}
