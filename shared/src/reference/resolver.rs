use std::collections::{BTreeSet, HashMap, HashSet};

use log::{debug, warn};

use super::{error::ResolverError, ReferenceId};

/// Coarse type of a registered object, used to type-check references
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    Slot,
    Component,
    Member,
}

/// What lives under a registered id, and where to find it in the world
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ObjectRecord {
    Slot,
    Component { slot: ReferenceId },
    /// A sync member, found at `index` in its owner's member list
    Member { owner: ReferenceId, index: usize },
}

impl ObjectRecord {
    pub fn kind(&self) -> ObjectKind {
        match self {
            ObjectRecord::Slot => ObjectKind::Slot,
            ObjectRecord::Component { .. } => ObjectKind::Component,
            ObjectRecord::Member { .. } => ObjectKind::Member,
        }
    }
}

/// Per-world registry mapping [`ReferenceId`]s to live objects.
///
/// Besides the id map it keeps a dependency index from referenced ids to the
/// reference members pointing at them. Registering or removing a referenced
/// object marks its dependents stale; the world re-resolves stale members
/// whenever no batch decode is active.
pub struct ReferenceResolver {
    objects: HashMap<ReferenceId, ObjectRecord>,
    dependents: HashMap<ReferenceId, BTreeSet<ReferenceId>>,
    member_targets: HashMap<ReferenceId, Vec<ReferenceId>>,
    stale: BTreeSet<ReferenceId>,
    batch_depth: u32,
    pending_since: HashMap<ReferenceId, u64>,
    pending_warned: HashSet<ReferenceId>,
}

impl ReferenceResolver {
    pub fn new() -> Self {
        Self {
            objects: HashMap::new(),
            dependents: HashMap::new(),
            member_targets: HashMap::new(),
            stale: BTreeSet::new(),
            batch_depth: 0,
            pending_since: HashMap::new(),
            pending_warned: HashSet::new(),
        }
    }

    // Registry

    pub fn register(&mut self, id: ReferenceId, record: ObjectRecord) -> Result<(), ResolverError> {
        if id.is_null() {
            return Err(ResolverError::NullRegistration);
        }
        if self.objects.contains_key(&id) {
            return Err(ResolverError::AlreadyRegistered { id });
        }
        self.objects.insert(id, record);
        self.mark_dependents_stale(&id);
        Ok(())
    }

    pub fn unregister(&mut self, id: &ReferenceId) -> Option<ObjectRecord> {
        let record = self.objects.remove(id)?;
        if record.kind() == ObjectKind::Member {
            self.untrack(id);
            self.stale.remove(id);
            self.note_settled(id);
        }
        self.mark_dependents_stale(id);
        Some(record)
    }

    pub fn try_resolve(&self, id: &ReferenceId) -> Option<ObjectRecord> {
        if id.is_null() {
            return None;
        }
        self.objects.get(id).copied()
    }

    pub fn contains(&self, id: &ReferenceId) -> bool {
        self.objects.contains_key(id)
    }

    pub fn kind_of(&self, id: &ReferenceId) -> Option<ObjectKind> {
        self.objects.get(id).map(ObjectRecord::kind)
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Drops every registration and all bookkeeping
    pub fn clear(&mut self) {
        self.objects.clear();
        self.dependents.clear();
        self.member_targets.clear();
        self.stale.clear();
        self.batch_depth = 0;
        self.pending_since.clear();
        self.pending_warned.clear();
    }

    // Batch decode

    /// Opens a batch decode window. Windows nest; only the outermost
    /// `end_batch()` closes it.
    pub fn begin_batch(&mut self) {
        self.batch_depth += 1;
        if self.batch_depth == 1 {
            debug!("Batch decode started");
        }
    }

    /// Closes a batch decode window. Returns whether the outermost window
    /// was closed (and deferred resolution may now run).
    pub fn end_batch(&mut self) -> Result<bool, ResolverError> {
        if self.batch_depth == 0 {
            return Err(ResolverError::BatchNotActive);
        }
        self.batch_depth -= 1;
        let closed = self.batch_depth == 0;
        if closed {
            debug!("Batch decode ended with {} stale references", self.stale.len());
        }
        Ok(closed)
    }

    pub fn is_batching(&self) -> bool {
        self.batch_depth > 0
    }

    // Dependency index

    /// Records which ids a reference member currently points at
    pub fn track(&mut self, member: ReferenceId, targets: Vec<ReferenceId>) {
        self.untrack(&member);
        for target in &targets {
            self.dependents.entry(*target).or_default().insert(member);
        }
        if !targets.is_empty() {
            self.member_targets.insert(member, targets);
        }
    }

    pub fn untrack(&mut self, member: &ReferenceId) {
        let Some(targets) = self.member_targets.remove(member) else {
            return;
        };
        for target in targets {
            let mut remove = false;
            if let Some(members) = self.dependents.get_mut(&target) {
                members.remove(member);
                remove = members.is_empty();
            }
            if remove {
                self.dependents.remove(&target);
            }
        }
    }

    /// Reference members pointing at `target`
    pub fn dependents_of(&self, target: &ReferenceId) -> Vec<ReferenceId> {
        self.dependents
            .get(target)
            .map(|members| members.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn mark_stale(&mut self, member: ReferenceId) {
        self.stale.insert(member);
    }

    /// Stale reference members, in id order. Empty while a batch decode is
    /// active: resolution side effects wait for the batch to end.
    pub fn take_stale(&mut self) -> Vec<ReferenceId> {
        if self.is_batching() {
            return Vec::new();
        }
        std::mem::take(&mut self.stale).into_iter().collect()
    }

    fn mark_dependents_stale(&mut self, target: &ReferenceId) {
        if let Some(members) = self.dependents.get(target) {
            self.stale.extend(members.iter().copied());
        }
    }

    // Pending bookkeeping

    pub fn note_pending(&mut self, member: ReferenceId, tick: u64) {
        self.pending_since.entry(member).or_insert(tick);
    }

    pub fn note_settled(&mut self, member: &ReferenceId) {
        self.pending_since.remove(member);
        self.pending_warned.remove(member);
    }

    /// Logs, once per member, references that have been pending for at
    /// least `threshold` ticks. Returns the members newly reported.
    pub fn report_overdue(&mut self, tick: u64, threshold: u64) -> Vec<ReferenceId> {
        let mut overdue: Vec<ReferenceId> = self
            .pending_since
            .iter()
            .filter(|(member, since)| {
                tick.saturating_sub(**since) >= threshold && !self.pending_warned.contains(*member)
            })
            .map(|(member, _)| *member)
            .collect();
        overdue.sort();
        for member in &overdue {
            let targets = self.member_targets.get(member).cloned().unwrap_or_default();
            warn!(
                "Reference member {:?} has been pending for {} ticks, waiting on {:?}",
                member, threshold, targets
            );
            self.pending_warned.insert(*member);
        }
        overdue
    }
}

impl Default for ReferenceResolver {
    fn default() -> Self {
        Self::new()
    }
}
