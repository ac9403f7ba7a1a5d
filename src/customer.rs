use crate::connection::{NodeConnection, NodeSession};
use crate::error::{SeederError, SeederResult};
use rand::Rng;
use std::collections::HashMap;
use tracing::info;

/// Customers known to the primary, loaded once per run. Never empty.
#[derive(Debug, Clone)]
pub struct CustomerDirectory {
    names: HashMap<i64, String>,
    ids: Vec<i64>,
}

impl CustomerDirectory {
    pub fn load<C: NodeConnection>(primary: &mut NodeSession<C>) -> SeederResult<Self> {
        let names: HashMap<i64, String> = primary.fetch_customers()?.into_iter().collect();
        if names.is_empty() {
            return Err(SeederError::EmptyDirectory {
                node: primary.name().to_string(),
            });
        }

        // Sorted so a seeded generator picks the same customers on every run.
        let mut ids: Vec<i64> = names.keys().copied().collect();
        ids.sort_unstable();

        info!("Found {} customers in primary {}", ids.len(), primary.name());
        Ok(Self { names, ids })
    }

    pub fn count(&self) -> usize {
        self.ids.len()
    }

    pub fn name(&self, id: i64) -> Option<&str> {
        self.names.get(&id).map(String::as_str)
    }

    /// Picks a customer id uniformly at random.
    pub fn random_id<R: Rng>(&self, rng: &mut R) -> i64 {
        self.ids[rng.gen_range(0..self.ids.len())]
    }
}
