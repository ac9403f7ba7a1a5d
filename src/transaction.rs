use crate::connection::{NodeConnection, NodeSession};
use crate::customer::CustomerDirectory;
use crate::error::SeederResult;
use crate::manifest::Manifest;
use crate::util::signed_fixed_point_2_decimal_to_str;
use rand::Rng;
use serde::{Serialize, Serializer};
use std::fmt;
use std::io::Write;
use tracing::{debug, info};
use uuid::Uuid;

/// Smallest and largest generated amount, in hundredths.
pub const MIN_AMOUNT_CENTS: i64 = -10_000;
pub const MAX_AMOUNT_CENTS: i64 = 10_000;

/// The two tables every dual write touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Ledger {
    Transactions,
    Audit,
}

impl Ledger {
    pub fn table(self) -> &'static str {
        match self {
            Ledger::Transactions => "transactions",
            Ledger::Audit => "audit",
        }
    }
}

/// Signed fixed-point currency amount in hundredths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Amount(i64);

impl Amount {
    pub fn from_cents(cents: i64) -> Self {
        Self(cents)
    }

    pub fn cents(self) -> i64 {
        self.0
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&signed_fixed_point_2_decimal_to_str(self.0))
    }
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

/// One generated transaction. Its audit twin is the same record written to the audit table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransactionRecord {
    pub node: String,
    pub uuid: Uuid,
    pub customer_id: i64,
    pub amount: Amount,
}

pub struct TransactionGenerator<R: Rng> {
    rng: R,
}

impl<R: Rng> TransactionGenerator<R> {
    pub fn new(rng: R) -> Self {
        Self { rng }
    }

    pub fn next_record(&mut self, node: &str, customers: &CustomerDirectory) -> TransactionRecord {
        let customer_id = customers.random_id(&mut self.rng);
        let amount = Amount(self.rng.gen_range(MIN_AMOUNT_CENTS..=MAX_AMOUNT_CENTS));
        let uuid = uuid::Builder::from_random_bytes(self.rng.gen()).into_uuid();
        TransactionRecord {
            node: node.to_string(),
            uuid,
            customer_id,
            amount,
        }
    }

    /// Dual-writes `count` random transactions: one row into the target's transaction
    /// table and its twin into the auditor's audit table.
    ///
    /// The two inserts are not atomic. A failure on the audit insert leaves the
    /// transaction row without a twin, and any failure aborts the remaining iterations.
    pub fn insert_transactions<C, W>(
        &mut self,
        target: &mut NodeSession<C>,
        auditor: &mut NodeSession<C>,
        customers: &CustomerDirectory,
        count: u64,
        mut manifest: Option<&mut Manifest<W>>,
    ) -> SeederResult<u64>
    where
        C: NodeConnection,
        W: Write,
    {
        info!("Inserting {count} transactions into {}", target.name());
        for _ in 0..count {
            let record = self.next_record(target.name(), customers);
            target.insert(Ledger::Transactions, &record)?;
            auditor.insert(Ledger::Audit, &record)?;
            debug!(
                uuid = %record.uuid,
                customer_id = record.customer_id,
                customer = customers.name(record.customer_id).unwrap_or_default(),
                amount = %record.amount,
                "Dual write"
            );
            if let Some(manifest) = manifest.as_deref_mut() {
                manifest.append(&record)?;
            }
        }
        Ok(count)
    }
}
