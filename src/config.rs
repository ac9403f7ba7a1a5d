use crate::error::ConfigError;
use serde::Deserialize;
use std::fmt;
use std::io::ErrorKind;
use std::path::Path;
use tracing::{debug, info};

pub const DEFAULT_DATABASE: &str = "test";
pub const DEFAULT_PORT: u16 = 5432;
pub const DEFAULT_TRANSACTIONS: u64 = 1_000;

/// A database role in the simulated cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Primary,
    Secondary,
    Peer,
    Auditor,
}

impl Role {
    /// Connection and close order.
    pub const ALL: [Role; 4] = [Role::Primary, Role::Secondary, Role::Peer, Role::Auditor];
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Primary => write!(f, "primary"),
            Self::Secondary => write!(f, "secondary"),
            Self::Peer => write!(f, "peer"),
            Self::Auditor => write!(f, "auditor"),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct RawCredentials {
    pub name: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub user: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RawRunConfig {
    pub database: Option<String>,
    pub transactions: Option<u64>,
    pub target: Option<Role>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RawClusterConfig {
    pub primary: Option<RawCredentials>,
    pub secondary: Option<RawCredentials>,
    pub peer: Option<RawCredentials>,
    pub auditor: Option<RawCredentials>,
    pub run: Option<RawRunConfig>,
}

#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Logical node name written into every transaction and audit row.
    pub name: String,
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("name", &self.name)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl Credentials {
    fn from_raw(role: Role, raw: RawCredentials) -> Result<Self, ConfigError> {
        let missing = |field| ConfigError::MissingField { role, field };
        Ok(Self {
            name: raw.name.ok_or_else(|| missing("name"))?,
            host: raw.host.ok_or_else(|| missing("host"))?,
            port: raw.port.unwrap_or(DEFAULT_PORT),
            user: raw.user.ok_or_else(|| missing("user"))?,
            password: raw.password.ok_or_else(|| missing("password"))?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    pub database: String,
    pub transactions: u64,
    pub target: Role,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            database: DEFAULT_DATABASE.to_string(),
            transactions: DEFAULT_TRANSACTIONS,
            target: Role::Primary,
        }
    }
}

impl TryFrom<RawRunConfig> for RunConfig {
    type Error = ConfigError;

    fn try_from(value: RawRunConfig) -> Result<Self, ConfigError> {
        let target = value.target.unwrap_or(Role::Primary);
        if target == Role::Auditor {
            return Err(ConfigError::InvalidTarget(target));
        }
        Ok(Self {
            database: value
                .database
                .unwrap_or_else(|| DEFAULT_DATABASE.to_string()),
            transactions: value.transactions.unwrap_or(DEFAULT_TRANSACTIONS),
            target,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterConfig {
    pub primary: Credentials,
    pub secondary: Credentials,
    pub peer: Credentials,
    pub auditor: Credentials,
    pub run: RunConfig,
}

impl ClusterConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => ConfigError::NotFound(path.to_path_buf()),
            _ => ConfigError::Unreadable {
                path: path.to_path_buf(),
                source: e,
            },
        })?;
        let config = Self::from_toml_str(&content).map_err(|e| match e {
            ConfigError::Malformed { source, .. } => ConfigError::Malformed {
                path: path.to_path_buf(),
                source,
            },
            other => other,
        })?;
        info!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let raw: RawClusterConfig =
            toml::from_str(content).map_err(|source| ConfigError::Malformed {
                path: Default::default(),
                source,
            })?;
        let config = Self::try_from(raw)?;
        debug!(?config, "Validated cluster config");
        Ok(config)
    }

    pub fn credentials(&self, role: Role) -> &Credentials {
        match role {
            Role::Primary => &self.primary,
            Role::Secondary => &self.secondary,
            Role::Peer => &self.peer,
            Role::Auditor => &self.auditor,
        }
    }
}

impl TryFrom<RawClusterConfig> for ClusterConfig {
    type Error = ConfigError;

    fn try_from(value: RawClusterConfig) -> Result<Self, ConfigError> {
        let section = |role, raw: Option<RawCredentials>| {
            raw.ok_or(ConfigError::MissingSection(role))
                .and_then(|raw| Credentials::from_raw(role, raw))
        };
        Ok(Self {
            primary: section(Role::Primary, value.primary)?,
            secondary: section(Role::Secondary, value.secondary)?,
            peer: section(Role::Peer, value.peer)?,
            auditor: section(Role::Auditor, value.auditor)?,
            run: value.run.map(RunConfig::try_from).transpose()?.unwrap_or_default(),
        })
    }
}
