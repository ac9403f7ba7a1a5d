use crate::config::{Credentials, Role};
use crate::error::{ConnectionError, ConnectionErrorKind};
use crate::transaction::{Ledger, TransactionRecord};
use postgres::error::SqlState;
use postgres::{Client, NoTls, Statement};
use std::collections::HashMap;
use tracing::{debug, warn};

const STATEMENT_SAVEPOINT: &str = "cluster_seeder_statement";

/// One live database connection together with its statement handles.
pub trait NodeConnection {
    /// Reads `(id, name)` pairs from the `customers` table.
    fn fetch_customers(&mut self) -> Result<Vec<(i64, String)>, ConnectionError>;

    /// Writes one row into the given ledger table.
    fn insert(&mut self, ledger: Ledger, record: &TransactionRecord) -> Result<(), ConnectionError>;

    fn commit(&mut self) -> Result<(), ConnectionError>;

    fn close(self) -> Result<(), ConnectionError>;
}

/// Opens connections. One network connection per call, no pooling and no retry.
pub trait Connector {
    type Connection: NodeConnection;

    fn connect(
        &self,
        credentials: &Credentials,
        database: &str,
    ) -> Result<Self::Connection, ConnectionError>;
}

/// A named node of the cluster and its exclusively owned connection.
pub struct NodeSession<C: NodeConnection> {
    role: Role,
    name: String,
    connection: C,
}

impl<C: NodeConnection> NodeSession<C> {
    pub fn open<K>(
        connector: &K,
        role: Role,
        credentials: &Credentials,
        database: &str,
    ) -> Result<Self, ConnectionError>
    where
        K: Connector<Connection = C>,
    {
        debug!(
            "Connecting to {role} {}: host={} port={} user={} dbname={}",
            credentials.name, credentials.host, credentials.port, credentials.user, database
        );
        let connection = connector.connect(credentials, database)?;
        Ok(Self {
            role,
            name: credentials.name.clone(),
            connection,
        })
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fetch_customers(&mut self) -> Result<Vec<(i64, String)>, ConnectionError> {
        self.connection.fetch_customers()
    }

    pub fn insert(&mut self, ledger: Ledger, record: &TransactionRecord) -> Result<(), ConnectionError> {
        self.connection.insert(ledger, record)
    }

    /// Commits pending work, then closes. The close is attempted even when the commit fails;
    /// the first failure is returned.
    pub fn commit_and_close(mut self) -> Result<(), ConnectionError> {
        let committed = self.connection.commit();
        let closed = self.connection.close();
        committed.and(closed)
    }
}

/// Connects to PostgreSQL-compatible nodes with the blocking `postgres` client.
#[derive(Debug, Default, Clone, Copy)]
pub struct PgConnector;

pub struct PgConnection {
    node: String,
    client: Client,
    statements: HashMap<Ledger, Statement>,
}

impl Connector for PgConnector {
    type Connection = PgConnection;

    fn connect(
        &self,
        credentials: &Credentials,
        database: &str,
    ) -> Result<PgConnection, ConnectionError> {
        let node = credentials.name.as_str();
        let mut client = postgres::Config::new()
            .host(&credentials.host)
            .port(credentials.port)
            .user(&credentials.user)
            .password(&credentials.password)
            .dbname(database)
            .application_name("cluster-seeder")
            .connect(NoTls)
            .map_err(|e| pg_error(node, e))?;

        // Work stays pending until commit, like an autocommit-off session. Each statement
        // runs under its own savepoint, see `PgConnection::guarded`.
        client
            .batch_execute("BEGIN")
            .map_err(|e| pg_error(node, e))?;

        Ok(PgConnection {
            node: node.to_string(),
            client,
            statements: HashMap::new(),
        })
    }
}

impl PgConnection {
    fn statement(&mut self, ledger: Ledger) -> Result<Statement, ConnectionError> {
        if let Some(statement) = self.statements.get(&ledger) {
            return Ok(statement.clone());
        }
        let statement = self
            .client
            .prepare(&insert_sql(ledger))
            .map_err(|e| pg_error(&self.node, e))?;
        self.statements.insert(ledger, statement.clone());
        Ok(statement)
    }

    /// Runs `op` under a savepoint. A failed statement rolls back only itself and leaves
    /// the node's open transaction usable, so earlier rows still commit at close.
    fn guarded<T>(
        &mut self,
        op: impl FnOnce(&mut Self) -> Result<T, ConnectionError>,
    ) -> Result<T, ConnectionError> {
        self.client
            .batch_execute(&format!("SAVEPOINT {STATEMENT_SAVEPOINT}"))
            .map_err(|e| pg_error(&self.node, e))?;
        match op(self) {
            Ok(value) => {
                self.client
                    .batch_execute(&format!("RELEASE SAVEPOINT {STATEMENT_SAVEPOINT}"))
                    .map_err(|e| pg_error(&self.node, e))?;
                Ok(value)
            }
            Err(err) => {
                if let Err(e) = self
                    .client
                    .batch_execute(&format!("ROLLBACK TO SAVEPOINT {STATEMENT_SAVEPOINT}"))
                {
                    warn!(node = %self.node, "Failed to roll back statement: {}", describe(&e));
                }
                Err(err)
            }
        }
    }
}

impl NodeConnection for PgConnection {
    fn fetch_customers(&mut self) -> Result<Vec<(i64, String)>, ConnectionError> {
        self.guarded(|conn| {
            let rows = conn
                .client
                .query("SELECT id::BIGINT, name::TEXT FROM customers", &[])
                .map_err(|e| pg_error(&conn.node, e))?;

            rows.iter()
                .map(|row| -> Result<(i64, String), ConnectionError> {
                    Ok((
                        row.try_get::<_, i64>(0).map_err(|e| usage_error(&conn.node, e))?,
                        row.try_get::<_, String>(1).map_err(|e| usage_error(&conn.node, e))?,
                    ))
                })
                .collect()
        })
    }

    fn insert(&mut self, ledger: Ledger, record: &TransactionRecord) -> Result<(), ConnectionError> {
        self.guarded(|conn| {
            let statement = conn.statement(ledger)?;
            let uuid = record.uuid.to_string();
            let amount = record.amount.to_string();
            conn.client
                .execute(
                    &statement,
                    &[&record.node, &uuid, &record.customer_id, &amount],
                )
                .map_err(|e| pg_error(&conn.node, e))?;
            Ok(())
        })
    }

    /// `COMMIT` on an aborted transaction silently rolls back, so the transaction is
    /// checked first and an abort is reported as a failure.
    fn commit(&mut self) -> Result<(), ConnectionError> {
        if let Err(e) = self.client.batch_execute("SELECT 1") {
            if e.code() != Some(&SqlState::IN_FAILED_SQL_TRANSACTION) {
                return Err(pg_error(&self.node, e));
            }
            if let Err(e) = self.client.batch_execute("ROLLBACK") {
                warn!(node = %self.node, "Failed to roll back aborted transaction: {}", describe(&e));
            }
            return Err(ConnectionError::new(
                ConnectionErrorKind::Operational,
                &self.node,
                format!("transaction was aborted, pending work rolled back: {}", describe(&e)),
            ));
        }
        self.client
            .batch_execute("COMMIT")
            .map_err(|e| pg_error(&self.node, e))
    }

    fn close(self) -> Result<(), ConnectionError> {
        let node = self.node;
        self.client.close().map_err(|e| pg_error(&node, e))
    }
}

fn insert_sql(ledger: Ledger) -> String {
    format!(
        "INSERT INTO {} (node, uuid, customer_id, amount) \
         VALUES ($1::TEXT, $2::TEXT, $3::BIGINT, $4::TEXT::NUMERIC)",
        ledger.table()
    )
}

fn pg_error(node: &str, err: postgres::Error) -> ConnectionError {
    let kind = match err.code() {
        Some(state) => classify_sqlstate(state.code()),
        None => ConnectionErrorKind::Operational,
    };
    ConnectionError::new(kind, node, describe(&err))
}

fn usage_error(node: &str, err: postgres::Error) -> ConnectionError {
    ConnectionError::new(ConnectionErrorKind::Usage, node, describe(&err))
}

/// Server-side errors only say "db error" through `Display`; spell out the server's
/// message, SQLSTATE and detail instead.
fn describe(err: &postgres::Error) -> String {
    match err.as_db_error() {
        Some(db) => {
            let mut message = format!("{} (SQLSTATE {})", db.message(), db.code().code());
            if let Some(detail) = db.detail() {
                message.push_str(": ");
                message.push_str(detail);
            }
            message
        }
        None => err.to_string(),
    }
}

/// Maps a SQLSTATE onto the failure class by its two-character class prefix.
pub fn classify_sqlstate(code: &str) -> ConnectionErrorKind {
    match code.get(..2) {
        Some("0A") => ConnectionErrorKind::Unsupported,
        Some("22" | "23" | "2B" | "3D" | "3F" | "42") => ConnectionErrorKind::Usage,
        _ => ConnectionErrorKind::Operational,
    }
}
