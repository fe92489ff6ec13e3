use crate::{reference::ReferenceId, world::component::field_value::FieldValue};

/// One decoded replication record
#[derive(Clone, Debug, PartialEq)]
pub enum SyncRecord {
    /// A slot exists under `id`; its members follow as field updates
    CreateSlot { id: ReferenceId },
    /// A component of registered `kind` exists under `id`, on `slot`
    AttachComponent {
        id: ReferenceId,
        slot: ReferenceId,
        kind: String,
    },
    FieldUpdate { field: ReferenceId, value: FieldValue },
    /// A slot (with its subtree) or a component was removed
    Destroy { id: ReferenceId },
}

/// Records applied together, in order, inside one batch decode window
#[derive(Clone, Debug, Default, PartialEq)]
pub struct UpdateBatch {
    records: Vec<SyncRecord>,
}

impl UpdateBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: SyncRecord) {
        self.records.push(record);
    }

    pub fn records(&self) -> &[SyncRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn into_records(self) -> Vec<SyncRecord> {
        self.records
    }
}

impl From<Vec<SyncRecord>> for UpdateBatch {
    fn from(records: Vec<SyncRecord>) -> Self {
        Self { records }
    }
}

impl Extend<SyncRecord> for UpdateBatch {
    fn extend<I: IntoIterator<Item = SyncRecord>>(&mut self, iter: I) {
        self.records.extend(iter);
    }
}

/// What applying a batch did
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BatchReport {
    /// Records that took effect
    pub applied: usize,
    /// Records absorbed as problems (unknown ids, bad values, refused creations)
    pub skipped: usize,
    /// Slots whose attachment changed when the batch ended
    pub attached: usize,
}
