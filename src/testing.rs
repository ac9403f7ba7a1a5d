//! In-memory cluster used by unit tests. Every connection shares one event log and one
//! committed row store; inserted rows stay pending on their connection until commit.

use crate::config::{ClusterConfig, Credentials};
use crate::connection::{Connector, NodeConnection};
use crate::error::{ConnectionError, ConnectionErrorKind};
use crate::transaction::{Ledger, TransactionRecord};
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Connected { node: String, database: String },
    Inserted { node: String, ledger: Ledger, record: TransactionRecord },
    Committed(String),
    Closed(String),
}

#[derive(Default)]
struct Faults {
    connect: HashSet<String>,
    commit: HashSet<String>,
    close: HashSet<String>,
    /// Node name -> number of inserts that succeed before the next one fails.
    insert_after: HashMap<String, usize>,
}

type Row = (String, Ledger, TransactionRecord);

pub struct MemoryConnector {
    customers: Vec<(i64, String)>,
    events: Rc<RefCell<Vec<Event>>>,
    committed: Rc<RefCell<Vec<Row>>>,
    faults: Rc<RefCell<Faults>>,
}

impl MemoryConnector {
    pub fn new(customers: Vec<(i64, String)>) -> Self {
        Self {
            customers,
            events: Rc::default(),
            committed: Rc::default(),
            faults: Rc::default(),
        }
    }

    pub fn failing_connect(self, node: &str) -> Self {
        self.faults.borrow_mut().connect.insert(node.to_string());
        self
    }

    pub fn failing_commit(self, node: &str) -> Self {
        self.faults.borrow_mut().commit.insert(node.to_string());
        self
    }

    pub fn failing_close(self, node: &str) -> Self {
        self.faults.borrow_mut().close.insert(node.to_string());
        self
    }

    pub fn failing_insert(self, node: &str, after: usize) -> Self {
        self.faults
            .borrow_mut()
            .insert_after
            .insert(node.to_string(), after);
        self
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.borrow().clone()
    }

    /// Rows committed by `node` into `ledger`, in commit order.
    pub fn rows(&self, node: &str, ledger: Ledger) -> Vec<TransactionRecord> {
        self.committed
            .borrow()
            .iter()
            .filter(|(n, l, _)| n == node && *l == ledger)
            .map(|(_, _, record)| record.clone())
            .collect()
    }
}

impl Connector for MemoryConnector {
    type Connection = MemoryConnection;

    fn connect(
        &self,
        credentials: &Credentials,
        database: &str,
    ) -> Result<MemoryConnection, ConnectionError> {
        if self.faults.borrow().connect.contains(&credentials.name) {
            return Err(ConnectionError::new(
                ConnectionErrorKind::Operational,
                &credentials.name,
                "connection refused",
            ));
        }
        self.events.borrow_mut().push(Event::Connected {
            node: credentials.name.clone(),
            database: database.to_string(),
        });
        Ok(MemoryConnection {
            node: credentials.name.clone(),
            customers: self.customers.clone(),
            inserts: 0,
            pending: Vec::new(),
            events: Rc::clone(&self.events),
            committed: Rc::clone(&self.committed),
            faults: Rc::clone(&self.faults),
        })
    }
}

pub struct MemoryConnection {
    node: String,
    customers: Vec<(i64, String)>,
    inserts: usize,
    pending: Vec<Row>,
    events: Rc<RefCell<Vec<Event>>>,
    committed: Rc<RefCell<Vec<Row>>>,
    faults: Rc<RefCell<Faults>>,
}

impl MemoryConnection {
    fn fail(&self, kind: ConnectionErrorKind, message: &str) -> ConnectionError {
        ConnectionError::new(kind, &self.node, message)
    }
}

impl NodeConnection for MemoryConnection {
    fn fetch_customers(&mut self) -> Result<Vec<(i64, String)>, ConnectionError> {
        Ok(self.customers.clone())
    }

    /// A failed insert only loses its own row; earlier pending rows survive to commit.
    fn insert(&mut self, ledger: Ledger, record: &TransactionRecord) -> Result<(), ConnectionError> {
        if let Some(after) = self.faults.borrow().insert_after.get(&self.node) {
            if self.inserts >= *after {
                return Err(self.fail(ConnectionErrorKind::Usage, "duplicate key"));
            }
        }
        self.inserts += 1;
        self.pending
            .push((self.node.clone(), ledger, record.clone()));
        self.events.borrow_mut().push(Event::Inserted {
            node: self.node.clone(),
            ledger,
            record: record.clone(),
        });
        Ok(())
    }

    /// A failed commit rolls back everything pending.
    fn commit(&mut self) -> Result<(), ConnectionError> {
        if self.faults.borrow().commit.contains(&self.node) {
            self.pending.clear();
            return Err(self.fail(ConnectionErrorKind::Operational, "server closed the connection"));
        }
        self.committed.borrow_mut().append(&mut self.pending);
        self.events
            .borrow_mut()
            .push(Event::Committed(self.node.clone()));
        Ok(())
    }

    /// Uncommitted rows are discarded.
    fn close(self) -> Result<(), ConnectionError> {
        self.events.borrow_mut().push(Event::Closed(self.node.clone()));
        if self.faults.borrow().close.contains(&self.node) {
            return Err(self.fail(ConnectionErrorKind::Operational, "broken pipe"));
        }
        Ok(())
    }
}

pub fn credentials(name: &str) -> Credentials {
    Credentials {
        name: name.to_string(),
        host: "localhost".to_string(),
        port: 5432,
        user: "seeder".to_string(),
        password: "secret".to_string(),
    }
}

/// arthur (primary), bedivere (secondary), gawain (peer), merlin (auditor).
pub fn cluster_config() -> ClusterConfig {
    ClusterConfig::from_toml_str(crate::config::tests::SAMPLE).unwrap()
}
