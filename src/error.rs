use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

use crate::config::Role;

pub type SeederResult<T> = Result<T, SeederError>;

/// Every failure that ends a seeding run. Each variant exits the process with status 1.
#[derive(Error, Debug)]
pub enum SeederError {
    #[error("Configuration error")]
    Config(#[from] ConfigError),

    #[error("Connection error")]
    Connection(#[from] ConnectionError),

    #[error("No customers found in primary database {node}")]
    EmptyDirectory { node: String },

    #[error("Failed to write record manifest")]
    Manifest(#[from] csv::Error),
}

impl SeederError {
    /// The error and its causes on one line, outermost first.
    pub fn report(self) -> String {
        format!("{:#}", anyhow::Error::new(self))
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Failed to read config file {}", .path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {}", .path.display())]
    Malformed {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Missing [{0}] section")]
    MissingSection(Role),

    #[error("Missing required field `{field}` for {role}")]
    MissingField { role: Role, field: &'static str },

    #[error("Invalid transaction target {0}: audit rows are written to the auditor")]
    InvalidTarget(Role),
}

/// Driver failure classes. The database collaborator picks the kind; callers only decide fatality.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionErrorKind {
    /// Network, authentication, server-side or lost-connection failures.
    Operational,
    /// Bad SQL, bad parameters or constraint violations.
    Usage,
    /// The server refused a feature it does not implement.
    Unsupported,
}

impl fmt::Display for ConnectionErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Operational => write!(f, "operational"),
            Self::Usage => write!(f, "usage"),
            Self::Unsupported => write!(f, "unsupported"),
        }
    }
}

#[derive(Error, Debug)]
#[error("{kind} failure on node {node}: {message}")]
pub struct ConnectionError {
    pub kind: ConnectionErrorKind,
    pub node: String,
    pub message: String,
}

impl ConnectionError {
    pub fn new(kind: ConnectionErrorKind, node: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            node: node.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::config::Role;
    use crate::error::{ConfigError, ConnectionError, ConnectionErrorKind, SeederError};

    #[test]
    fn test_connection_error_message_names_kind_and_node() {
        let err = ConnectionError::new(ConnectionErrorKind::Unsupported, "arthur", "no savepoints");
        assert_eq!(
            err.to_string(),
            "unsupported failure on node arthur: no savepoints"
        );
    }

    #[test]
    fn test_seeder_error_wraps_config_error() {
        let err: SeederError = ConfigError::MissingField {
            role: Role::Peer,
            field: "password",
        }
        .into();
        assert_eq!(err.to_string(), "Configuration error");
        assert_eq!(
            err.report(),
            "Configuration error: Missing required field `password` for peer"
        );
    }

    #[test]
    fn test_report_includes_source_chain() {
        let source = toml::from_str::<toml::Value>("[primary").unwrap_err();
        let err: SeederError = ConfigError::Malformed {
            path: "cluster.toml".into(),
            source,
        }
        .into();
        let prefix = "Configuration error: Failed to parse config file cluster.toml: ";
        let report = err.report();
        assert!(report.starts_with(prefix), "{report}");
        assert!(report.len() > prefix.len(), "{report}");
    }
}
