//! CLI command implementation
//!
//! Loads the configuration, opens the root connection and hands control to
//! the repair orchestrator.

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::errors::{FixerError, Stage};
use crate::node::{Connector, Credentials, MysqlConnector, NodeAddress, Terminology};
use crate::observability::{AuditLog, FileAuditLog, Logger, MemoryAuditLog};
use crate::repair::{RepairOrchestrator, RepairOutcome};

use super::args::Cli;
use super::errors::{CliError, CliResult};
use super::io::StdinConfirmer;

/// Configuration file structure
#[derive(Clone, Serialize, Deserialize)]
pub struct Config {
    /// Node to repair (optional, default 127.0.0.1)
    #[serde(default = "default_host")]
    pub host: String,

    /// Port of the node to repair (optional, default 3306)
    #[serde(default = "default_port")]
    pub port: u16,

    /// Administrative user on the node to repair (required)
    pub user: String,

    #[serde(default)]
    pub password: String,

    /// User for every other node (optional, defaults to `user`)
    #[serde(default)]
    pub monitor_user: Option<String>,

    #[serde(default)]
    pub monitor_password: Option<String>,

    /// "legacy" or "modern" replication statements (optional, default "legacy")
    #[serde(default)]
    pub terminology: Terminology,

    /// Append-only audit file for destructive statements (optional)
    #[serde(default)]
    pub audit_log_path: Option<PathBuf>,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3306
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("monitor_user", &self.monitor_user)
            .field("terminology", &self.terminology)
            .field("audit_log_path", &self.audit_log_path)
            .finish_non_exhaustive()
    }
}

impl Config {
    /// Load configuration from file
    pub fn load(path: &Path) -> CliResult<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| CliError::config_error(format!("Failed to read config: {}", e)))?;

        let config: Config = serde_json::from_str(&content)
            .map_err(|e| CliError::config_error(format!("Invalid config JSON: {}", e)))?;

        config.validate()?;

        Ok(config)
    }

    fn validate(&self) -> CliResult<()> {
        if self.user.trim().is_empty() {
            return Err(CliError::config_error("user must not be empty"));
        }

        if self.host.trim().is_empty() {
            return Err(CliError::config_error("host must not be empty"));
        }

        if self.port == 0 {
            return Err(CliError::config_error("port must be > 0"));
        }

        if matches!(&self.monitor_user, Some(user) if user.trim().is_empty()) {
            return Err(CliError::config_error("monitor_user must not be empty"));
        }

        Ok(())
    }

    pub fn root_address(&self) -> NodeAddress {
        NodeAddress::new(self.host.clone(), self.port)
    }

    pub fn root_credentials(&self) -> Credentials {
        Credentials::new(self.user.clone(), self.password.clone())
    }

    /// Credentials for every non-root node. Flags win over the file, the
    /// file's monitor entries win over the root login.
    pub fn monitor_credentials(
        &self,
        user_flag: Option<&str>,
        password_flag: Option<&str>,
    ) -> Credentials {
        let user = user_flag
            .map(str::to_string)
            .or_else(|| self.monitor_user.clone())
            .unwrap_or_else(|| self.user.clone());
        let password = password_flag
            .map(str::to_string)
            .or_else(|| self.monitor_password.clone())
            .unwrap_or_else(|| self.password.clone());
        Credentials::new(user, password)
    }
}

/// Parse arguments and run one repair
pub fn run() -> CliResult<()> {
    let cli = Cli::parse_args();
    repair(&cli)
}

/// Run one repair against the node named in the configuration
pub fn repair(cli: &Cli) -> CliResult<()> {
    let config = Config::load(&cli.config)?;
    let monitor = config.monitor_credentials(
        cli.monitor_user.as_deref(),
        cli.monitor_password.as_deref(),
    );

    let audit: Box<dyn AuditLog> = match &config.audit_log_path {
        Some(path) => Box::new(FileAuditLog::open(path).map_err(|e| {
            CliError::io_error(format!("Failed to open audit log {}: {}", path.display(), e))
        })?),
        None => Box::new(MemoryAuditLog::new()),
    };

    let connector = MysqlConnector::new(config.terminology)
        .map_err(|e| CliError::io_error(format!("Failed to start runtime: {}", e)))?;

    let address = config.root_address();
    let mut root = connector
        .connect(&address, &config.root_credentials())
        .map_err(|e| FixerError::from_node(Stage::Discover, e))?;

    let mut stdout = io::stdout();
    let mut orchestrator =
        RepairOrchestrator::new(&connector, &monitor, audit.as_ref(), &mut stdout)
            .with_force(cli.force);
    let outcome = orchestrator.run(&mut root, &mut StdinConfirmer)?;

    let outcome_name = match outcome {
        RepairOutcome::Clean => "clean",
        RepairOutcome::Repaired(_) => "repaired",
        RepairOutcome::Declined(_) => "declined",
    };
    Logger::info(
        "REPAIR_FINISHED",
        &[
            ("node", address.to_string().as_str()),
            ("outcome", outcome_name),
            ("phase", orchestrator.phase().as_str()),
        ],
    );

    println!("completed.");
    Ok(())
}
