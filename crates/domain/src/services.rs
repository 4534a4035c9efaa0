use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::Error;

/// Source of time for command handling. Aggregates never call `Utc::now()`
/// directly so tests can pin the clock.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock pinned to a fixed instant, for deterministic tests.
#[derive(Clone, Copy, Debug)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Drug identity resolved from a scanned barcode.
#[derive(Clone, Debug, Serialize, Deserialize, Eq, PartialEq)]
pub struct ResolvedDrug {
    pub drug_id: String,
    pub name: String,
}

/// Stock batch for a drug.
#[derive(Clone, Debug, Serialize, Deserialize, Eq, PartialEq)]
pub struct DrugBatch {
    pub batch_number: String,
    pub expiry_date: DateTime<Utc>,
    pub quantity_available: u32,
}

/// Catalog lookup, implemented by the inventory collaborator.
#[async_trait]
pub trait DrugCatalog: Send + Sync {
    async fn resolve_by_barcode(&self, barcode: &str) -> Result<Option<ResolvedDrug>, Error>;
}

/// Batch lookup, implemented by the inventory collaborator.
#[async_trait]
pub trait BatchDirectory: Send + Sync {
    async fn get_batch(
        &self,
        drug_id: &str,
        batch_number: &str,
    ) -> Result<Option<DrugBatch>, Error>;
}
