//! Shared daemon state and request dispatch.

use crate::config::{StubConfig, WorkerKind};
use crate::units::UnitTable;
use compact_str::CompactString;
use std::collections::BTreeMap;
use std::sync::Arc;

pub mod serve;
pub mod uds;

/// State shared by every control connection.
pub struct Daemon {
    /// Node id announced in the greeting.
    pub node_id: CompactString,
    /// Work types this daemon accepts (immutable after init).
    pub workers: Arc<BTreeMap<CompactString, WorkerKind>>,
    /// Submitted units.
    pub units: Arc<UnitTable>,
}

impl Clone for Daemon {
    fn clone(&self) -> Self {
        Self {
            node_id: self.node_id.clone(),
            workers: Arc::clone(&self.workers),
            units: Arc::clone(&self.units),
        }
    }
}

impl Daemon {
    /// Build daemon state from config. A later `[[workers]]` entry replaces
    /// an earlier one with the same work type.
    pub fn new(config: &StubConfig) -> Self {
        let workers = config
            .workers
            .iter()
            .map(|w| (w.work_type.clone(), w.kind.clone()))
            .collect();
        Self {
            node_id: config.node_id.clone(),
            workers: Arc::new(workers),
            units: Arc::new(UnitTable::default()),
        }
    }
}
