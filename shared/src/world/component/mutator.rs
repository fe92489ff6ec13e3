use std::{
    collections::HashSet,
    sync::{Arc, Mutex, MutexGuard},
};

use crate::reference::ReferenceId;

#[derive(Default)]
struct MutationLog {
    outbound: Vec<ReferenceId>,
    outbound_set: HashSet<ReferenceId>,
    references: Vec<ReferenceId>,
    reference_set: HashSet<ReferenceId>,
}

/// Shared change log every bound member of a world writes into.
///
/// Local writes record the member for outbound replication; reference
/// members also record themselves so the world can re-index them.
#[derive(Clone, Default)]
pub struct FieldMutator {
    log: Arc<Mutex<MutationLog>>,
}

impl FieldMutator {
    pub fn new() -> Self {
        Self::default()
    }

    fn log(&self) -> MutexGuard<'_, MutationLog> {
        // the log holds plain ids, a poisoned lock leaves it consistent
        self.log.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Queues a member for outbound replication
    pub fn mutate(&self, member: ReferenceId) {
        let mut log = self.log();
        if log.outbound_set.insert(member) {
            log.outbound.push(member);
        }
    }

    /// Notes that a reference member's target id changed locally
    pub fn reference_changed(&self, member: ReferenceId) {
        let mut log = self.log();
        if log.reference_set.insert(member) {
            log.references.push(member);
        }
    }

    /// Members queued for outbound replication, in first-mutation order
    pub fn take_outbound(&self) -> Vec<ReferenceId> {
        let mut log = self.log();
        log.outbound_set.clear();
        std::mem::take(&mut log.outbound)
    }

    pub fn take_references(&self) -> Vec<ReferenceId> {
        let mut log = self.log();
        log.reference_set.clear();
        std::mem::take(&mut log.references)
    }

    pub fn has_outbound(&self) -> bool {
        !self.log().outbound.is_empty()
    }
}
