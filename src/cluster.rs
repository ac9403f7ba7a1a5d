use crate::config::{ClusterConfig, Role};
use crate::connection::{Connector, NodeConnection, NodeSession};
use crate::customer::CustomerDirectory;
use crate::error::{ConfigError, ConnectionError, ConnectionErrorKind, SeederResult};
use crate::manifest::Manifest;
use crate::transaction::TransactionGenerator;
use rand::Rng;
use std::io::Write;
use tracing::{error, info};

/// Lifecycle of a [`ClusterSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    Ready,
    Closing,
    Closed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub target: String,
    pub inserted: u64,
    /// Size of the customer directory the records were drawn from.
    pub customers: usize,
}

/// The four node sessions. Dropping the set commits and closes whatever is still open.
struct SessionSet<C: NodeConnection> {
    primary: Option<NodeSession<C>>,
    secondary: Option<NodeSession<C>>,
    peer: Option<NodeSession<C>>,
    auditor: Option<NodeSession<C>>,
    state: SessionState,
}

impl<C: NodeConnection> SessionSet<C> {
    fn connect<K>(connector: &K, config: &ClusterConfig) -> Result<Self, ConnectionError>
    where
        K: Connector<Connection = C>,
    {
        let mut sessions = Self {
            primary: None,
            secondary: None,
            peer: None,
            auditor: None,
            state: SessionState::Connecting,
        };
        for role in Role::ALL {
            // On failure `sessions` drops here and closes the ones already open.
            let session = NodeSession::open(
                connector,
                role,
                config.credentials(role),
                &config.run.database,
            )?;
            info!("Connected to {role} {}", session.name());
            *sessions.slot(role) = Some(session);
        }
        Ok(sessions)
    }

    fn slot(&mut self, role: Role) -> &mut Option<NodeSession<C>> {
        match role {
            Role::Primary => &mut self.primary,
            Role::Secondary => &mut self.secondary,
            Role::Peer => &mut self.peer,
            Role::Auditor => &mut self.auditor,
        }
    }

    fn session(&mut self, role: Role) -> Result<&mut NodeSession<C>, ConnectionError> {
        self.slot(role)
            .as_mut()
            .ok_or_else(|| not_open(role))
    }

    fn target_and_auditor(
        &mut self,
        target: Role,
    ) -> SeederResult<(&mut NodeSession<C>, &mut NodeSession<C>)> {
        let target_slot = match target {
            Role::Primary => &mut self.primary,
            Role::Secondary => &mut self.secondary,
            Role::Peer => &mut self.peer,
            Role::Auditor => return Err(ConfigError::InvalidTarget(target).into()),
        };
        let target_session = target_slot.as_mut().ok_or_else(|| not_open(target))?;
        let auditor = self
            .auditor
            .as_mut()
            .ok_or_else(|| not_open(Role::Auditor))?;
        Ok((target_session, auditor))
    }

    /// Commits and closes every open session in role order. A failure on one node is
    /// logged and collected; the remaining nodes are still closed.
    fn close_all(&mut self) -> Vec<ConnectionError> {
        if self.state == SessionState::Closed {
            return Vec::new();
        }
        self.state = SessionState::Closing;

        let mut failures = Vec::new();
        for role in Role::ALL {
            if let Some(session) = self.slot(role).take() {
                info!("Closing connection to {role} {}", session.name());
                if let Err(e) = session.commit_and_close() {
                    error!("Failed to close {role}: {e}");
                    failures.push(e);
                }
            }
        }

        self.state = SessionState::Closed;
        failures
    }
}

impl<C: NodeConnection> Drop for SessionSet<C> {
    fn drop(&mut self) {
        self.close_all();
    }
}

fn not_open(role: Role) -> ConnectionError {
    ConnectionError::new(
        ConnectionErrorKind::Usage,
        role.to_string(),
        "session is not open",
    )
}

/// Scoped ownership of all four node sessions plus the customer directory.
///
/// A `ClusterSession` only exists in the `Ready` state. Whether the run completes or
/// fails, dropping it commits and closes every session in the order primary,
/// secondary, peer, auditor.
pub struct ClusterSession<C: NodeConnection> {
    sessions: SessionSet<C>,
    customers: CustomerDirectory,
}

impl<C: NodeConnection> ClusterSession<C> {
    pub fn open<K>(connector: &K, config: &ClusterConfig) -> SeederResult<Self>
    where
        K: Connector<Connection = C>,
    {
        let mut sessions = SessionSet::connect(connector, config)?;
        let customers = CustomerDirectory::load(sessions.session(Role::Primary)?)?;
        sessions.state = SessionState::Ready;
        Ok(Self {
            sessions,
            customers,
        })
    }

    pub fn state(&self) -> SessionState {
        self.sessions.state
    }

    /// Dual-writes `count` transactions into `target` and the auditor's audit table.
    pub fn insert_transactions<R, W>(
        &mut self,
        generator: &mut TransactionGenerator<R>,
        target: Role,
        count: u64,
        manifest: Option<&mut Manifest<W>>,
    ) -> SeederResult<RunSummary>
    where
        R: Rng,
        W: Write,
    {
        let (target_session, auditor) = self.sessions.target_and_auditor(target)?;
        let inserted = generator.insert_transactions(
            target_session,
            auditor,
            &self.customers,
            count,
            manifest,
        )?;
        Ok(RunSummary {
            target: target_session.name().to_string(),
            inserted,
            customers: self.customers.count(),
        })
    }

    /// Explicit close; returns the per-node failures that dropping would only log.
    pub fn close(mut self) -> Vec<ConnectionError> {
        self.sessions.close_all()
    }
}
