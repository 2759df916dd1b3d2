//! Table of submitted units and their progress.

use crate::worker::Outcome;
use bytes::Bytes;
use compact_str::CompactString;
use parking_lot::Mutex;
use protocol::{UnitList, WorkState, WorkStatus};
use rand::{Rng, distr::Alphanumeric};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::AbortHandle;

const UNIT_ID_LEN: usize = 8;

/// Snapshot of a unit's progress.
#[derive(Debug, Clone)]
pub struct Progress {
    /// Current state.
    pub state: WorkState,
    /// Failure or cancellation detail.
    pub detail: String,
    /// Stdout, complete once the state is terminal.
    pub stdout: Bytes,
}

/// One submitted unit.
pub struct Unit {
    /// Work type it was submitted with.
    pub work_type: CompactString,
    /// Node it was submitted to.
    pub node: CompactString,
    progress: watch::Sender<Progress>,
    task: Mutex<Option<AbortHandle>>,
}

impl Unit {
    fn new(work_type: CompactString, node: CompactString) -> Self {
        let (progress, _) = watch::channel(Progress {
            state: WorkState::Pending,
            detail: String::new(),
            stdout: Bytes::new(),
        });
        Self {
            work_type,
            node,
            progress,
            task: Mutex::new(None),
        }
    }

    /// Current progress snapshot.
    pub fn progress(&self) -> Progress {
        self.progress.borrow().clone()
    }

    /// Status document for `work status` and `work list`.
    pub fn status(&self) -> WorkStatus {
        let progress = self.progress.borrow();
        WorkStatus {
            state: progress.state,
            state_name: progress.state.name().into(),
            detail: progress.detail.clone(),
            stdout_size: progress.stdout.len() as u64,
            work_type: self.work_type.clone(),
            node: self.node.clone(),
        }
    }

    /// Wait until the unit reaches a terminal state.
    pub async fn finished(&self) -> Progress {
        let mut rx = self.progress.subscribe();
        match rx.wait_for(|p| p.state.is_terminal()).await {
            Ok(progress) => progress.clone(),
            Err(_) => self.progress(),
        }
    }

    /// Attach the executing task so cancel can abort it.
    pub fn set_task(&self, handle: AbortHandle) {
        *self.task.lock() = Some(handle);
    }

    /// Mark the unit running.
    pub fn start(&self) {
        self.progress.send_modify(|p| {
            if p.state == WorkState::Pending {
                p.state = WorkState::Running;
            }
        });
    }

    /// Record the outcome. Ignored if the unit was already cancelled.
    pub fn finish(&self, outcome: Outcome) {
        self.progress.send_modify(|p| {
            if p.state.is_terminal() {
                return;
            }
            p.stdout = Bytes::from(outcome.stdout);
            match outcome.failure {
                Some(detail) => {
                    p.state = WorkState::Failed;
                    p.detail = detail;
                }
                None => p.state = WorkState::Succeeded,
            }
        });
    }

    /// Abort execution and mark the unit canceled unless already terminal.
    pub fn cancel(&self) {
        if let Some(handle) = self.task.lock().take() {
            handle.abort();
        }
        self.progress.send_modify(|p| {
            if !p.state.is_terminal() {
                p.state = WorkState::Canceled;
                p.detail = "canceled".to_owned();
            }
        });
    }
}

/// All units known to the daemon, keyed by unit id.
#[derive(Default)]
pub struct UnitTable {
    units: Mutex<BTreeMap<CompactString, Arc<Unit>>>,
}

impl UnitTable {
    /// Register a new pending unit under a fresh id.
    pub fn insert(
        &self,
        work_type: CompactString,
        node: CompactString,
    ) -> (CompactString, Arc<Unit>) {
        let unit = Arc::new(Unit::new(work_type, node));
        let mut units = self.units.lock();
        let id = loop {
            let candidate = new_unit_id();
            if !units.contains_key(&candidate) {
                break candidate;
            }
        };
        units.insert(id.clone(), Arc::clone(&unit));
        (id, unit)
    }

    /// Look a unit up by id.
    pub fn get(&self, id: &str) -> Option<Arc<Unit>> {
        self.units.lock().get(id).cloned()
    }

    /// Remove a unit, returning it if it existed.
    pub fn remove(&self, id: &str) -> Option<Arc<Unit>> {
        self.units.lock().remove(id)
    }

    /// Status of every unit.
    pub fn list(&self) -> UnitList {
        self.units
            .lock()
            .iter()
            .map(|(id, unit)| (id.clone(), unit.status()))
            .collect()
    }
}

fn new_unit_id() -> CompactString {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(UNIT_ID_LEN)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique_and_sized() {
        let table = UnitTable::default();
        let (a, _) = table.insert("echo".into(), "localhost".into());
        let (b, _) = table.insert("echo".into(), "localhost".into());
        assert_ne!(a, b);
        assert_eq!(a.len(), UNIT_ID_LEN);
        assert_eq!(table.list().len(), 2);
    }

    #[test]
    fn cancel_after_finish_keeps_outcome() {
        let table = UnitTable::default();
        let (_, unit) = table.insert("echo".into(), "localhost".into());
        unit.start();
        unit.finish(Outcome {
            stdout: b"done".to_vec(),
            failure: None,
        });
        unit.cancel();
        let status = unit.status();
        assert_eq!(status.state, WorkState::Succeeded);
        assert_eq!(status.stdout_size, 4);
    }

    #[test]
    fn finish_after_cancel_is_ignored() {
        let table = UnitTable::default();
        let (id, unit) = table.insert("echo".into(), "localhost".into());
        unit.cancel();
        unit.finish(Outcome {
            stdout: b"late".to_vec(),
            failure: None,
        });
        assert_eq!(unit.status().state, WorkState::Canceled);
        assert!(table.remove(&id).is_some());
        assert!(table.get(&id).is_none());
    }

    #[tokio::test]
    async fn finished_waits_for_terminal_state() {
        let table = UnitTable::default();
        let (_, unit) = table.insert("echo".into(), "localhost".into());
        let waiter = {
            let unit = Arc::clone(&unit);
            tokio::spawn(async move { unit.finished().await })
        };
        unit.start();
        unit.finish(Outcome {
            stdout: b"ok".to_vec(),
            failure: None,
        });
        let progress = waiter.await.unwrap();
        assert_eq!(progress.state, WorkState::Succeeded);
        assert_eq!(&progress.stdout[..], b"ok");
    }
}
