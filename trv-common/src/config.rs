//! Service variant and runtime configuration
//!
//! Both flavours of the service (the earlier test deployment and the later
//! production one) share a single binary. The variant decides the table
//! name, column nullability and the URL prefix media is served under.

use crate::{Error, Result};
use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Default interval between "update" broadcasts
pub const DEFAULT_NOTIFY_INTERVAL: Duration = Duration::from_secs(2);

/// Default listen address
pub const DEFAULT_BIND: &str = "0.0.0.0:8000";

/// Which flavour of the service is running
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Variant {
    /// Dev/test deployment: every text column required, media under `/static`
    Test,
    /// Production deployment: text columns nullable, media under `/media`
    #[default]
    Production,
}

impl Variant {
    /// Table the variant reads and writes when none is configured
    pub fn default_table(self) -> &'static str {
        match self {
            Variant::Test => "ml_training_finetune_test",
            Variant::Production => "ml_training_finetune",
        }
    }

    /// Whether text columns are created NOT NULL
    pub fn text_columns_required(self) -> bool {
        matches!(self, Variant::Test)
    }

    /// URL prefix media files are served under
    pub fn media_prefix(self) -> &'static str {
        match self {
            Variant::Test => "/static",
            Variant::Production => "/media",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Variant::Test => "test",
            Variant::Production => "production",
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Variant {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "test" | "dev" => Ok(Variant::Test),
            "production" | "prod" => Ok(Variant::Production),
            other => Err(Error::Config(format!(
                "Unknown variant '{}' (expected 'test' or 'production')",
                other
            ))),
        }
    }
}

/// Resolved server configuration
///
/// Built from CLI flags / environment in the binary, or directly in tests.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// sqlx connection string, e.g. `sqlite://rows.db?mode=rwc`
    pub database_url: String,
    /// Directory media files are resolved under
    pub media_dir: PathBuf,
    pub variant: Variant,
    /// Rows table name
    pub table: String,
    pub bind: SocketAddr,
    /// Interval between notifier broadcasts
    pub notify_interval: Duration,
}

impl ServerConfig {
    /// Create a configuration with the variant's defaults
    pub fn new(database_url: impl Into<String>, media_dir: impl Into<PathBuf>, variant: Variant) -> Self {
        Self {
            database_url: database_url.into(),
            media_dir: media_dir.into(),
            variant,
            table: variant.default_table().to_string(),
            bind: SocketAddr::from(([0, 0, 0, 0], 8000)),
            notify_interval: DEFAULT_NOTIFY_INTERVAL,
        }
    }

    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    pub fn with_bind(mut self, bind: SocketAddr) -> Self {
        self.bind = bind;
        self
    }

    pub fn with_notify_interval(mut self, interval: Duration) -> Self {
        self.notify_interval = interval;
        self
    }

    /// Check values that would otherwise fail later in surprising ways
    pub fn validate(&self) -> Result<()> {
        if self.database_url.trim().is_empty() {
            return Err(Error::Config("DATABASE_URL is empty".to_string()));
        }

        if !is_valid_table_name(&self.table) {
            return Err(Error::Config(format!("Invalid table name: {}", self.table)));
        }

        if self.notify_interval.is_zero() {
            return Err(Error::Config("Notify interval must be greater than zero".to_string()));
        }

        Ok(())
    }
}

/// Table names are interpolated into SQL, so only plain identifiers pass
pub fn is_valid_table_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() < 100
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !name.starts_with(|c: char| c.is_ascii_digit())
}
