use crate::error::SeederResult;
use crate::transaction::TransactionRecord;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use tracing::info;

/// CSV log of every completed dual write: `node,uuid,customer_id,amount`.
pub struct Manifest<W: Write = File> {
    writer: csv::Writer<W>,
    written: u64,
}

impl Manifest<File> {
    pub fn create(path: &Path) -> SeederResult<Self> {
        let writer = csv::Writer::from_path(path)?;
        info!("Writing record manifest to {}", path.display());
        Ok(Self { writer, written: 0 })
    }
}

impl<W: Write> Manifest<W> {
    pub fn from_writer(writer: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(writer),
            written: 0,
        }
    }

    pub fn append(&mut self, record: &TransactionRecord) -> SeederResult<()> {
        self.writer.serialize(record)?;
        self.written += 1;
        Ok(())
    }

    pub fn written(&self) -> u64 {
        self.written
    }

    pub fn flush(&mut self) -> SeederResult<()> {
        self.writer.flush().map_err(csv::Error::from)?;
        Ok(())
    }

    pub fn into_inner(self) -> SeederResult<W> {
        self.writer
            .into_inner()
            .map_err(|e| csv::Error::from(e.into_error()).into())
    }
}

#[cfg(test)]
mod tests {
    use crate::manifest::Manifest;
    use crate::transaction::{Amount, TransactionRecord};
    use csv::ReaderBuilder;
    use uuid::Uuid;

    #[test]
    fn test_manifest_rows() {
        let mut manifest = Manifest::from_writer(Vec::new());
        let uuid = Uuid::parse_str("67e55044-10b1-426f-9247-bb680e5fe0c8").unwrap();
        manifest
            .append(&TransactionRecord {
                node: "arthur".to_string(),
                uuid,
                customer_id: 2,
                amount: Amount::from_cents(-1_205),
            })
            .unwrap();
        assert_eq!(manifest.written(), 1);

        let bytes = manifest.into_inner().unwrap();
        let mut reader = ReaderBuilder::new().from_reader(bytes.as_slice());
        assert_eq!(
            reader.headers().unwrap().iter().collect::<Vec<_>>(),
            vec!["node", "uuid", "customer_id", "amount"]
        );
        let record = reader.records().next().unwrap().unwrap();
        assert_eq!(
            record.iter().collect::<Vec<_>>().join(","),
            "arthur,67e55044-10b1-426f-9247-bb680e5fe0c8,2,-12.05"
        );
    }
}
