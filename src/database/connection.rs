/*!
 * Database connection management.
 *
 * `Database` owns one connection. Work happens inside [`Database::session`],
 * which wraps a closure in a transaction: the transaction commits when the
 * closure returns `Ok` and rolls back otherwise, and the closure's error is
 * handed back untouched.
 */

use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::{debug, info, warn};
use rusqlite::Connection;
use url::Url;

use super::repository::Repository;
use super::schema::{self, tables};
use crate::settings::Settings;

/// Driver name used in connection strings
pub const DRIVER: &str = "sqlite";

/// Default database directory name under user's data directory
const DEFAULT_DB_DIRNAME: &str = "loopbench";

/// Database file extension
const DB_EXTENSION: &str = "sqlite3";

/// Connection parameters, rendered as `<driver>://user:password@host:port/name`
#[derive(Clone, PartialEq, Eq)]
pub struct DatabaseUrl {
    user: String,
    password: String,
    host: String,
    port: u16,
    name: String,
}

impl DatabaseUrl {
    pub fn new(
        user: impl Into<String>,
        password: impl Into<String>,
        host: impl Into<String>,
        port: u16,
        name: impl Into<String>,
    ) -> Result<Self> {
        let url = Self {
            user: user.into(),
            password: password.into(),
            host: host.into(),
            port,
            name: name.into(),
        };

        if url.name.is_empty() || url.name.contains(['/', '\\']) || url.name.starts_with('.') {
            anyhow::bail!("Invalid database name: {:?}", url.name);
        }

        // Reject hosts the URL grammar cannot carry
        url.build(true)?;
        Ok(url)
    }

    /// Connection parameters from resolved settings
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        Self::new(
            settings.db_user.clone(),
            settings.db_password.clone(),
            settings.db_host.clone(),
            settings.db_port,
            settings.db_name.clone(),
        )
    }

    /// Full connection string, password included
    pub fn connection_string(&self) -> String {
        let Ok(url) = self.build(true) else {
            return String::new();
        };
        let mut rendered = url.to_string();

        // Url drops the separator of an empty password; keep `user:@host`
        if self.password.is_empty() && !url.username().is_empty() {
            let at = DRIVER.len() + "://".len() + url.username().len();
            rendered.insert(at, ':');
        }
        rendered
    }

    /// Connection string with the password masked, safe for logs
    pub fn redacted(&self) -> String {
        self.build(false)
            .map(|url| url.to_string())
            .unwrap_or_default()
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn build(&self, with_password: bool) -> Result<Url> {
        let mut url = Url::parse(&format!("{}://{}:{}/", DRIVER, self.host, self.port))
            .with_context(|| format!("Invalid database host: {:?}", self.host))?;

        let password = if with_password { self.password.as_str() } else { "***" };
        url.set_username(&self.user)
            .map_err(|_| anyhow::anyhow!("Cannot set database user in URL"))?;
        if !password.is_empty() {
            url.set_password(Some(password))
                .map_err(|_| anyhow::anyhow!("Cannot set database password in URL"))?;
        }
        url.set_path(&self.name);

        Ok(url)
    }
}

impl fmt::Display for DatabaseUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.redacted())
    }
}

impl fmt::Debug for DatabaseUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("DatabaseUrl").field(&self.redacted()).finish()
    }
}

/// Owner of the database connection
pub struct Database {
    /// Path to the database file
    db_path: PathBuf,
    /// Parameters the database was opened with, if opened from settings
    url: Option<DatabaseUrl>,
    connection: Connection,
}

impl Database {
    /// Open the database named in `settings` under `data_dir`
    pub fn connect(settings: &Settings, data_dir: &Path) -> Result<Self> {
        let url = DatabaseUrl::from_settings(settings)?;
        let db_path = data_dir.join(format!("{}.{}", url.name(), DB_EXTENSION));

        info!("Connecting to {}", url);

        let mut db = Self::open(&db_path)?;
        db.url = Some(url);
        Ok(db)
    }

    /// Open (and if needed create) a database file
    pub fn open<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let db_path = db_path.as_ref().to_path_buf();

        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create database directory: {:?}", parent))?;
        }

        info!("Opening database at: {:?}", db_path);

        let conn = Connection::open(&db_path)
            .with_context(|| format!("Failed to open database: {:?}", db_path))?;

        Self::from_connection(conn, db_path)
    }

    /// Create an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        debug!("Creating in-memory database");

        let conn =
            Connection::open_in_memory().context("Failed to create in-memory database")?;

        Self::from_connection(conn, PathBuf::from(":memory:"))
    }

    fn from_connection(conn: Connection, db_path: PathBuf) -> Result<Self> {
        schema::configure_connection(&conn)?;
        schema::initialize_schema(&conn)?;

        Ok(Self {
            db_path,
            url: None,
            connection: conn,
        })
    }

    /// Default data directory for database files
    pub fn default_data_dir() -> Result<PathBuf> {
        let base_dir = dirs::data_local_dir()
            .or_else(dirs::data_dir)
            .or_else(|| dirs::home_dir().map(|h| h.join(".local").join("share")))
            .ok_or_else(|| anyhow::anyhow!("Could not determine data directory"))?;

        Ok(base_dir.join(DEFAULT_DB_DIRNAME))
    }

    /// Get the database file path
    pub fn path(&self) -> &Path {
        &self.db_path
    }

    /// Connection parameters, when opened with [`Database::connect`]
    pub fn url(&self) -> Option<&DatabaseUrl> {
        self.url.as_ref()
    }

    /// Log every SQL statement at debug level
    pub fn set_echo(&mut self, echo: bool) {
        if echo {
            self.connection.trace(Some(log_statement as fn(&str)));
        } else {
            self.connection.trace(None);
        }
    }

    /// Run `f` inside one transaction.
    ///
    /// Commits if `f` returns `Ok`; rolls back and returns `f`'s error
    /// otherwise. A panic inside `f` also rolls back, since the transaction
    /// is dropped unfinished.
    pub fn session<F, T>(&mut self, f: F) -> Result<T>
    where
        F: FnOnce(&Repository<'_>) -> Result<T>,
    {
        let tx = self
            .connection
            .transaction()
            .context("Failed to begin database session")?;

        let result = f(&Repository::new(&tx));

        match result {
            Ok(value) => {
                tx.commit().context("Failed to commit database session")?;
                debug!("Session committed");
                Ok(value)
            }
            Err(e) => {
                if let Err(rollback_err) = tx.rollback() {
                    warn!("Rollback failed: {}", rollback_err);
                }
                debug!("Session rolled back: {}", e);
                Err(e)
            }
        }
    }

    /// Row counts for every table
    pub fn stats(&self) -> Result<DatabaseStats> {
        let mut counts = Vec::with_capacity(tables::ALL.len());
        for table in tables::ALL {
            let count: i64 = self
                .connection
                .query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| {
                    row.get(0)
                })
                .with_context(|| format!("Failed to count rows in {}", table))?;
            counts.push((table, count));
        }

        let file_size_bytes = if self.db_path.to_string_lossy() != ":memory:" {
            std::fs::metadata(&self.db_path)
                .map(|m| m.len())
                .unwrap_or(0)
        } else {
            0
        };

        Ok(DatabaseStats {
            counts,
            file_size_bytes,
        })
    }
}

fn log_statement(sql: &str) {
    debug!(target: "loopbench::sql", "{}", sql);
}

/// Database statistics
#[derive(Debug, Clone)]
pub struct DatabaseStats {
    /// Row count per table, parents first
    pub counts: Vec<(&'static str, i64)>,
    /// Database file size in bytes
    pub file_size_bytes: u64,
}

impl DatabaseStats {
    /// Row count of one table
    pub fn count(&self, table: &str) -> Option<i64> {
        self.counts
            .iter()
            .find(|(name, _)| *name == table)
            .map(|(_, count)| *count)
    }
}

impl fmt::Display for DatabaseStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let counts = self
            .counts
            .iter()
            .map(|(table, count)| format!("{}: {}", table, count))
            .collect::<Vec<_>>()
            .join(", ");
        write!(f, "{}, Size: {} KB", counts, self.file_size_bytes / 1024)
    }
}
