use std::collections::{BTreeMap, BTreeSet, HashSet, VecDeque};

use log::{debug, warn};

use crate::{reference::ReferenceId, world::component::sync_ref::ReferenceState};

use super::slot::Slot;

/// Per-world arena of slots keyed by id.
///
/// Parent and child links are ids, never pointers. The table also owns the
/// attachment bookkeeping: which slots are deferred, and which are waiting
/// for a given parent to join the visible hierarchy.
pub struct SlotTable {
    root: ReferenceId,
    slots: BTreeMap<ReferenceId, Slot>,
    deferred: BTreeSet<ReferenceId>,
    waiting_on: BTreeMap<ReferenceId, BTreeSet<ReferenceId>>,
}

impl SlotTable {
    pub(crate) fn new(root: Slot) -> Self {
        let root_id = root.id();
        let mut slots = BTreeMap::new();
        slots.insert(root_id, root);
        Self {
            root: root_id,
            slots,
            deferred: BTreeSet::new(),
            waiting_on: BTreeMap::new(),
        }
    }

    pub fn root(&self) -> ReferenceId {
        self.root
    }

    pub fn get(&self, id: &ReferenceId) -> Option<&Slot> {
        self.slots.get(id)
    }

    pub fn get_mut(&mut self, id: &ReferenceId) -> Option<&mut Slot> {
        self.slots.get_mut(id)
    }

    pub fn contains(&self, id: &ReferenceId) -> bool {
        self.slots.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Every slot id, root included, in id order
    pub fn ids(&self) -> Vec<ReferenceId> {
        self.slots.keys().copied().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Slot> {
        self.slots.values()
    }

    /// Slots with no attachment yet, in id order
    pub fn deferred(&self) -> Vec<ReferenceId> {
        self.deferred.iter().copied().collect()
    }

    pub(crate) fn insert(&mut self, slot: Slot) {
        let id = slot.id();
        if id != self.root {
            self.deferred.insert(id);
        }
        self.slots.insert(id, slot);
    }

    /// Removes one slot, detaching it from its parent. Attached children are
    /// left for the caller to remove first.
    pub(crate) fn remove(&mut self, id: &ReferenceId) -> Option<Slot> {
        if *id == self.root {
            return None;
        }
        self.detach(id);
        self.deferred.remove(id);
        for waiting in self.waiting_on.values_mut() {
            waiting.remove(id);
        }
        self.waiting_on.retain(|_, waiting| !waiting.is_empty());
        self.slots.remove(id)
    }

    /// Drops everything, the root included
    pub(crate) fn clear(&mut self) {
        self.slots.clear();
        self.deferred.clear();
        self.waiting_on.clear();
    }

    // Hierarchy queries

    /// Whether the slot is reachable from the root through attachments
    pub fn is_in_hierarchy(&self, id: &ReferenceId) -> bool {
        let mut current = *id;
        let mut visited = HashSet::new();
        loop {
            if current == self.root {
                return self.slots.contains_key(&current);
            }
            if !visited.insert(current) {
                return false;
            }
            match self.slots.get(&current).and_then(Slot::attached_to) {
                Some(parent) => current = parent,
                None => return false,
            }
        }
    }

    /// Whether the slot and every attached ancestor are active
    pub fn is_active_in_hierarchy(&self, id: &ReferenceId) -> bool {
        let mut current = Some(*id);
        let mut visited = HashSet::new();
        while let Some(slot_id) = current {
            if !visited.insert(slot_id) {
                return false;
            }
            let Some(slot) = self.slots.get(&slot_id) else {
                return false;
            };
            if !*slot.active_self.get() {
                return false;
            }
            current = slot.attached_to();
        }
        true
    }

    /// Whether parenting `slot` under `parent` would close a loop, following
    /// the replicated parent links upward from `parent`
    pub fn would_create_cycle(&self, slot: &ReferenceId, parent: &ReferenceId) -> bool {
        let mut current = *parent;
        let mut visited = HashSet::new();
        loop {
            if current == *slot {
                return true;
            }
            if !visited.insert(current) {
                return false;
            }
            let Some(next) = self.slots.get(&current).map(|s| s.parent().target_id()) else {
                return false;
            };
            if next.is_null() {
                return false;
            }
            current = next;
        }
    }

    fn is_attached_below(&self, candidate: &ReferenceId, ancestor: &ReferenceId) -> bool {
        let mut current = *candidate;
        let mut visited = HashSet::new();
        loop {
            if current == *ancestor {
                return true;
            }
            if !visited.insert(current) {
                return false;
            }
            match self.slots.get(&current).and_then(Slot::attached_to) {
                Some(parent) => current = parent,
                None => return false,
            }
        }
    }

    /// Every attached descendant of `id`, children before their parents
    pub fn descendants_post_order(&self, id: &ReferenceId) -> Vec<ReferenceId> {
        let mut order = Vec::new();
        let mut stack = vec![(*id, false)];
        let mut visited = HashSet::new();
        while let Some((current, expanded)) = stack.pop() {
            if expanded {
                if current != *id {
                    order.push(current);
                }
                continue;
            }
            if !visited.insert(current) {
                continue;
            }
            stack.push((current, true));
            if let Some(slot) = self.slots.get(&current) {
                for child in slot.children().iter().rev() {
                    stack.push((*child, false));
                }
            }
        }
        order
    }

    // Attachment

    fn attach(&mut self, child: ReferenceId, parent: ReferenceId) {
        self.detach(&child);
        if let Some(parent_slot) = self.slots.get_mut(&parent) {
            parent_slot.add_child(child);
        }
        if let Some(child_slot) = self.slots.get_mut(&child) {
            child_slot.set_attached_to(Some(parent));
        }
        self.deferred.remove(&child);
    }

    fn detach(&mut self, child: &ReferenceId) {
        let Some(previous) = self.slots.get_mut(child).and_then(|slot| {
            let previous = slot.attached_to();
            slot.set_attached_to(None);
            previous
        }) else {
            return;
        };
        if let Some(parent_slot) = self.slots.get_mut(&previous) {
            parent_slot.remove_child(child);
        }
    }

    fn defer(&mut self, slot: ReferenceId, waiting_for: Option<ReferenceId>) {
        self.detach(&slot);
        self.deferred.insert(slot);
        if let Some(parent) = waiting_for {
            self.waiting_on.entry(parent).or_default().insert(slot);
        }
    }

    fn stop_waiting(&mut self, slot: &ReferenceId) {
        for waiting in self.waiting_on.values_mut() {
            waiting.remove(slot);
        }
        self.waiting_on.retain(|_, waiting| !waiting.is_empty());
    }

    /// Runs the attachment protocol for `queue` and for every slot that was
    /// waiting on a slot attached along the way. A slot is only attached
    /// under a parent that is itself in the visible hierarchy; a null parent
    /// falls back to the root once `running`.
    ///
    /// Returns the slots whose attachment changed, in processing order.
    pub(crate) fn reconcile(
        &mut self,
        queue: impl IntoIterator<Item = ReferenceId>,
        running: bool,
    ) -> Vec<ReferenceId> {
        let mut work: VecDeque<ReferenceId> = queue.into_iter().collect();
        let mut attached = Vec::new();

        while let Some(id) = work.pop_front() {
            if id == self.root {
                continue;
            }
            let Some(slot) = self.slots.get(&id) else {
                continue;
            };
            let reference = slot.parent();
            let current = slot.attached_to();

            let wanted = match reference.state() {
                ReferenceState::Unknown => {
                    self.stop_waiting(&id);
                    if current.is_some() {
                        debug!("Slot {:?} detached, parent id not decoded", id);
                    }
                    self.defer(id, None);
                    continue;
                }
                ReferenceState::Pending => {
                    let target = reference.target_id();
                    self.stop_waiting(&id);
                    if current.is_some() {
                        debug!("Slot {:?} detached, parent {:?} not present", id, target);
                    }
                    self.defer(id, Some(target));
                    continue;
                }
                ReferenceState::Resolved => match reference.target() {
                    Some(parent) => parent,
                    None if running => self.root,
                    None => {
                        self.stop_waiting(&id);
                        self.defer(id, None);
                        continue;
                    }
                },
            };

            if current == Some(wanted) {
                self.deferred.remove(&id);
                self.stop_waiting(&id);
                continue;
            }
            if !self.slots.contains_key(&wanted) {
                self.stop_waiting(&id);
                self.defer(id, Some(wanted));
                continue;
            }
            if wanted == id || self.is_attached_below(&wanted, &id) {
                warn!(
                    "Slot {:?} cannot attach under its own descendant {:?}, keeping current attachment",
                    id, wanted
                );
                // retried once `wanted` re-attaches elsewhere
                self.stop_waiting(&id);
                self.waiting_on.entry(wanted).or_default().insert(id);
                continue;
            }
            if !self.is_in_hierarchy(&wanted) {
                self.stop_waiting(&id);
                self.defer(id, Some(wanted));
                continue;
            }

            self.stop_waiting(&id);
            self.attach(id, wanted);
            debug!("Slot {:?} attached under {:?}", id, wanted);
            attached.push(id);

            if let Some(waiting) = self.waiting_on.remove(&id) {
                work.extend(waiting);
            }
            // descendants waiting on anything below this slot can now proceed
            for descendant in self.descendants_post_order(&id) {
                if let Some(waiting) = self.waiting_on.remove(&descendant) {
                    work.extend(waiting);
                }
            }
        }

        attached
    }
}
