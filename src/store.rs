//! Storage contract for allele depth records.
//!
//! Persistence belongs to the host application; the engine only needs a way
//! to obtain records scoped by a filter. The in-memory store backs the CLI
//! and the test suite.

use crate::depth::AlleleDepthRecord;
use crate::filter::AlleleFilter;

/// Source of allele depth records, already scoped to a single
/// organization/dataset context by the host application.
pub trait AlleleStore {
    /// Records matching the filter. Implementations may stream internally;
    /// the returned set is materialized for one aggregation request.
    fn get_alleles(&self, filter: &AlleleFilter) -> Vec<AlleleDepthRecord>;
}

/// Allele depth records held in memory, e.g. parsed from a depth file.
#[derive(Debug, Default, Clone)]
pub struct InMemoryStore {
    records: Vec<AlleleDepthRecord>,
}

impl InMemoryStore {
    pub fn new(records: Vec<AlleleDepthRecord>) -> Self {
        Self { records }
    }

    pub fn records(&self) -> &[AlleleDepthRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl AlleleStore for InMemoryStore {
    fn get_alleles(&self, filter: &AlleleFilter) -> Vec<AlleleDepthRecord> {
        filter.apply(&self.records).cloned().collect()
    }
}
