use std::collections::{BTreeMap, BTreeSet, HashSet};

use log::{debug, info, warn};

use crate::{
    reference::{ObjectKind, ObjectRecord, ReferenceAllocator, ReferenceId, ReferenceResolver},
    types::{PeerRole, Tick},
};

use super::{
    component::{
        component::{Component, ComponentContext, SyncMembers},
        field_value::FieldValue,
        hook::{ComponentHook, HookFactory},
        lifecycle::{ComponentLifecycle, LifecycleState},
        member::SyncMember,
        mutator::FieldMutator,
        registry::ComponentRegistry,
    },
    config::WorldConfig,
    error::WorldError,
    record::{BatchReport, SyncRecord, UpdateBatch},
    slot::{Slot, SlotTable},
    state::WorldState,
    task_queue::{WorldTaskQueue, WorldTaskSender},
};

struct ComponentEntry {
    slot: ReferenceId,
    kind: &'static str,
    lifecycle: ComponentLifecycle,
    // taken out while one of its callbacks runs
    component: Option<Box<dyn Component>>,
    hook: Option<Box<dyn ComponentHook>>,
}

type ComponentTable = BTreeMap<ReferenceId, ComponentEntry>;

fn member_mut<'a>(
    slots: &'a mut SlotTable,
    components: &'a mut ComponentTable,
    owner: &ReferenceId,
    index: usize,
) -> Option<&'a mut dyn SyncMember> {
    if let Some(slot) = slots.get_mut(owner) {
        return slot.members_mut().into_iter().nth(index);
    }
    components
        .get_mut(owner)?
        .component
        .as_deref_mut()?
        .members_mut()
        .into_iter()
        .nth(index)
}

fn push_members(batch: &mut UpdateBatch, members: Vec<&dyn SyncMember>) {
    for member in members {
        batch.push(SyncRecord::FieldUpdate {
            field: member.member_id(),
            value: member.encode(),
        });
    }
}

/// Registers an owner and its members, or nothing at all if any id is taken
fn register_owner(
    resolver: &mut ReferenceResolver,
    owner: ReferenceId,
    record: ObjectRecord,
    members: &[ReferenceId],
) -> Result<(), WorldError> {
    if let Some(taken) = std::iter::once(&owner)
        .chain(members)
        .find(|id| resolver.contains(id))
    {
        return Err(WorldError::AlreadyExists { id: *taken });
    }
    resolver.register(owner, record)?;
    for (index, member) in members.iter().enumerate() {
        resolver.register(*member, ObjectRecord::Member { owner, index })?;
    }
    Ok(())
}

fn member_ids(members: Vec<&dyn SyncMember>) -> Vec<ReferenceId> {
    members.iter().map(|member| member.member_id()).collect()
}

/// One replicated scene: the slot tree, its components, and the resolver
/// mapping ids to them.
///
/// A world is single-threaded. Other contexts reach it through
/// [`World::task_sender`].
pub struct World {
    config: WorldConfig,
    role: PeerRole,
    state: WorldState,
    tick: Tick,
    allocator: ReferenceAllocator,
    resolver: ReferenceResolver,
    mutator: FieldMutator,
    slots: SlotTable,
    components: ComponentTable,
    registry: ComponentRegistry,
    hook_factory: Option<Box<dyn HookFactory>>,
    tasks: WorldTaskQueue,
    // reference members whose id arrived from the wire since the last flush
    pending_refresh: BTreeSet<ReferenceId>,
    reconcile_queue: BTreeSet<ReferenceId>,
    // components with remote field changes in the current batch
    remote_changed: BTreeSet<ReferenceId>,
    created: Vec<ReferenceId>,
    destroyed: Vec<ReferenceId>,
}

impl World {
    /// Authority segment the hosting peer allocates from
    pub const HOST_SEGMENT: u8 = 1;

    pub fn new_authority(
        config: WorldConfig,
        registry: ComponentRegistry,
    ) -> Result<Self, WorldError> {
        Self::new(PeerRole::Authority, config, registry)
    }

    /// A replica allocates nothing until it receives its authority segment,
    /// see [`World::assign_authority_segment`]
    pub fn new_replica(
        config: WorldConfig,
        registry: ComponentRegistry,
    ) -> Result<Self, WorldError> {
        Self::new(PeerRole::Replica, config, registry)
    }

    fn new(
        role: PeerRole,
        config: WorldConfig,
        registry: ComponentRegistry,
    ) -> Result<Self, WorldError> {
        let mutator = FieldMutator::new();
        let mut allocator = ReferenceAllocator::new(ReferenceId::WORLD_SEGMENT);
        let root_id = allocator.allocate_block(1 + Slot::MEMBER_COUNT)?;

        let mut root = Slot::new("Root");
        root.bind(root_id, &mutator)?;
        let mut resolver = ReferenceResolver::new();
        register_owner(
            &mut resolver,
            root_id,
            ObjectRecord::Slot,
            &member_ids(root.members()),
        )?;

        if role.is_authority() {
            allocator.reassign(Self::HOST_SEGMENT);
        }
        let tasks = WorldTaskQueue::new(config.task_queue_capacity);
        info!("World created as {:?}", role);

        Ok(Self {
            config,
            role,
            state: WorldState::Connecting,
            tick: 0,
            allocator,
            resolver,
            mutator,
            slots: SlotTable::new(root),
            components: BTreeMap::new(),
            registry,
            hook_factory: None,
            tasks,
            pending_refresh: BTreeSet::new(),
            reconcile_queue: BTreeSet::new(),
            remote_changed: BTreeSet::new(),
            created: Vec::new(),
            destroyed: Vec::new(),
        })
    }

    // Accessors

    pub fn role(&self) -> PeerRole {
        self.role
    }

    pub fn is_authority(&self) -> bool {
        self.role.is_authority()
    }

    pub fn state(&self) -> WorldState {
        self.state
    }

    /// Number of completed ticks
    pub fn tick_count(&self) -> Tick {
        self.tick
    }

    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    pub fn resolver(&self) -> &ReferenceResolver {
        &self.resolver
    }

    pub fn registry(&self) -> &ComponentRegistry {
        &self.registry
    }

    pub fn authority_segment(&self) -> u8 {
        self.allocator.authority()
    }

    pub fn root(&self) -> ReferenceId {
        self.slots.root()
    }

    pub fn slots(&self) -> &SlotTable {
        &self.slots
    }

    pub fn slot(&self, id: &ReferenceId) -> Option<&Slot> {
        self.slots.get(id)
    }

    /// Value fields of the slot may be written through this; the parent
    /// link goes through [`World::set_parent`]
    pub fn slot_mut(&mut self, id: &ReferenceId) -> Option<&mut Slot> {
        self.slots.get_mut(id)
    }

    pub fn children(&self, id: &ReferenceId) -> Vec<ReferenceId> {
        self.slots
            .get(id)
            .map(|slot| slot.children().to_vec())
            .unwrap_or_default()
    }

    /// Where the slot hangs in the visible tree; `None` while deferred
    pub fn effective_parent(&self, id: &ReferenceId) -> Option<ReferenceId> {
        self.slots.get(id).and_then(Slot::attached_to)
    }

    pub fn is_in_hierarchy(&self, id: &ReferenceId) -> bool {
        self.slots.is_in_hierarchy(id)
    }

    pub fn component<T: Component>(&self, id: &ReferenceId) -> Option<&T> {
        self.components
            .get(id)?
            .component
            .as_deref()?
            .as_any()
            .downcast_ref::<T>()
    }

    pub fn component_mut<T: Component>(&mut self, id: &ReferenceId) -> Option<&mut T> {
        self.components
            .get_mut(id)?
            .component
            .as_deref_mut()?
            .as_any_mut()
            .downcast_mut::<T>()
    }

    pub fn component_state(&self, id: &ReferenceId) -> Option<LifecycleState> {
        self.components.get(id).map(|entry| entry.lifecycle.state())
    }

    pub fn component_kind(&self, id: &ReferenceId) -> Option<&'static str> {
        self.components.get(id).map(|entry| entry.kind)
    }

    pub fn components_of(&self, slot: &ReferenceId) -> Vec<ReferenceId> {
        self.slots
            .get(slot)
            .map(|slot| slot.components().to_vec())
            .unwrap_or_default()
    }

    /// First component of type `T` on the slot
    pub fn find_component<T: Component>(&self, slot: &ReferenceId) -> Option<ReferenceId> {
        self.components_of(slot)
            .into_iter()
            .find(|id| self.component::<T>(id).is_some())
    }

    pub fn set_hook_factory(&mut self, factory: impl HookFactory + 'static) {
        self.hook_factory = Some(Box::new(factory));
    }

    /// Handle other contexts use to run work on this world
    pub fn task_sender(&self) -> WorldTaskSender {
        self.tasks.sender()
    }

    pub fn queued_tasks(&self) -> usize {
        self.tasks.len()
    }

    fn ensure_alive(&self) -> Result<(), WorldError> {
        if self.state.is_terminal() {
            return Err(WorldError::Destroyed);
        }
        Ok(())
    }

    fn ensure_structural(&self) -> Result<(), WorldError> {
        self.ensure_alive()?;
        if !self.role.is_authority() && !self.config.allow_replica_creation {
            return Err(WorldError::CreationNotPermitted);
        }
        Ok(())
    }

    fn ensure_can_allocate(&self) -> Result<(), WorldError> {
        self.ensure_structural()?;
        if self.allocator.authority() == ReferenceId::WORLD_SEGMENT {
            return Err(WorldError::NoAuthoritySegment);
        }
        Ok(())
    }

    /// Sets the segment a replica allocates its own ids from, as handed out
    /// in its join grant
    pub fn assign_authority_segment(&mut self, segment: u8) -> Result<(), WorldError> {
        self.ensure_alive()?;
        if self.role.is_authority() || segment == ReferenceId::WORLD_SEGMENT {
            return Err(WorldError::InvalidAuthoritySegment { segment });
        }
        self.allocator.reassign(segment);
        debug!("Replica allocates from authority segment {}", segment);
        Ok(())
    }

    // State machine

    pub fn set_state(&mut self, next: WorldState) -> Result<(), WorldError> {
        if !self.state.can_transition_to(next, self.role) {
            return Err(WorldError::InvalidTransition {
                from: self.state,
                to: next,
            });
        }
        if next == WorldState::Destroyed {
            self.destroy();
            return Ok(());
        }
        info!("World state {:?} -> {:?}", self.state, next);
        self.state = next;
        if next.is_running() {
            // orphans deferred during initial sync may now fall back to the root
            self.reconcile_queue.extend(self.slots.deferred());
            self.settle();
        }
        Ok(())
    }

    /// Bulk teardown. Every hook is told the whole world is going away,
    /// the resolver and the slot tree are released. Idempotent.
    pub fn destroy(&mut self) {
        if self.state.is_terminal() {
            return;
        }
        let ids: Vec<ReferenceId> = self.components.keys().copied().collect();
        for id in ids {
            let Some(mut entry) = self.components.remove(&id) else {
                continue;
            };
            if let Some(mut component) = entry.component.take() {
                if !entry.lifecycle.is_destroyed() {
                    let mut ctx =
                        ComponentContext::new(id, entry.slot, self.role, self.tick, &mut self.slots);
                    component.on_destroy(&mut ctx);
                }
            }
            if let Some(mut hook) = entry.hook.take() {
                hook.destroy(true);
            }
        }
        self.resolver.clear();
        self.slots.clear();
        self.pending_refresh.clear();
        self.reconcile_queue.clear();
        self.remote_changed.clear();
        self.created.clear();
        self.destroyed.clear();
        self.mutator.take_outbound();
        self.mutator.take_references();
        let dropped = self.tasks.close().len();
        if dropped > 0 {
            debug!("Dropped {} queued world tasks on teardown", dropped);
        }
        info!("World state {:?} -> {:?}", self.state, WorldState::Destroyed);
        self.state = WorldState::Destroyed;
    }

    // Local structural operations

    /// Creates a slot under `parent` and returns its id
    pub fn add_slot(&mut self, parent: &ReferenceId, name: &str) -> Result<ReferenceId, WorldError> {
        self.ensure_can_allocate()?;
        if !self.slots.contains(parent) {
            return Err(WorldError::SlotNotFound { id: *parent });
        }
        let id = self.allocator.allocate_block(1 + Slot::MEMBER_COUNT)?;
        let mut slot = Slot::new(name);
        slot.bind(id, &self.mutator)?;
        slot.parent_mut().set_target(Some(*parent));
        register_owner(
            &mut self.resolver,
            id,
            ObjectRecord::Slot,
            &member_ids(slot.members()),
        )?;
        self.slots.insert(slot);
        self.created.push(id);
        self.reconcile_queue.insert(id);
        self.settle();
        debug!("Slot {:?} '{}' created under {:?}", id, name, parent);
        Ok(id)
    }

    /// Replicated reparenting. `None` makes the slot an orphan, which hangs
    /// under the root once the world is running.
    pub fn set_parent(
        &mut self,
        slot: &ReferenceId,
        parent: Option<ReferenceId>,
    ) -> Result<(), WorldError> {
        self.ensure_alive()?;
        if *slot == self.slots.root() {
            return Err(WorldError::RootImmutable);
        }
        if !self.slots.contains(slot) {
            return Err(WorldError::SlotNotFound { id: *slot });
        }
        if let Some(parent) = parent {
            if !self.slots.contains(&parent) {
                return Err(WorldError::SlotNotFound { id: parent });
            }
            if self.slots.would_create_cycle(slot, &parent) {
                warn!("Rejected parenting {:?} under its descendant {:?}", slot, parent);
                return Err(WorldError::CycleDetected {
                    slot: *slot,
                    parent,
                });
            }
        }
        if let Some(entry) = self.slots.get_mut(slot) {
            entry.parent_mut().set_target(parent);
        }
        self.reconcile_queue.insert(*slot);
        self.settle();
        Ok(())
    }

    /// Destroys the slot, its attached subtree and every component on them
    pub fn destroy_slot(&mut self, id: &ReferenceId) -> Result<(), WorldError> {
        self.ensure_structural()?;
        if *id == self.slots.root() {
            return Err(WorldError::RootImmutable);
        }
        if !self.slots.contains(id) {
            return Err(WorldError::SlotNotFound { id: *id });
        }
        let announced = !self.created.contains(id);
        self.remove_slot_tree(id);
        if announced {
            self.destroyed.push(*id);
        }
        self.settle();
        Ok(())
    }

    pub fn attach_component<T: Component + Default>(
        &mut self,
        slot: &ReferenceId,
    ) -> Result<ReferenceId, WorldError> {
        self.attach_component_with(slot, T::default())
    }

    /// Attaches an already-configured component
    pub fn attach_component_with<T: Component>(
        &mut self,
        slot: &ReferenceId,
        component: T,
    ) -> Result<ReferenceId, WorldError> {
        self.ensure_can_allocate()?;
        if !self.slots.contains(slot) {
            return Err(WorldError::SlotNotFound { id: *slot });
        }
        let count = component.members().len() as u64;
        let id = self.allocator.allocate_block(1 + count)?;
        self.insert_component(id, *slot, Box::new(component))?;
        self.created.push(id);
        self.settle();
        Ok(id)
    }

    pub fn destroy_component(&mut self, id: &ReferenceId) -> Result<(), WorldError> {
        self.ensure_structural()?;
        if !self.components.contains_key(id) {
            return Err(WorldError::ComponentNotFound { id: *id });
        }
        let announced = !self.created.contains(id);
        self.remove_component(id);
        if announced {
            self.destroyed.push(*id);
        }
        self.settle();
        Ok(())
    }

    fn insert_component(
        &mut self,
        id: ReferenceId,
        slot: ReferenceId,
        mut component: Box<dyn Component>,
    ) -> Result<(), WorldError> {
        let kind = component.kind();
        for (index, member) in component.members_mut().into_iter().enumerate() {
            member.bind(id.offset(1 + index as u64)?, &self.mutator);
        }
        let members = component.members();
        let ids = member_ids(members);
        register_owner(&mut self.resolver, id, ObjectRecord::Component { slot }, &ids)?;
        for member in component.members() {
            if member.as_reference().is_some() {
                self.pending_refresh.insert(member.member_id());
            }
        }

        let hook = self
            .hook_factory
            .as_mut()
            .and_then(|factory| factory.create_hook(kind));
        let mut lifecycle = ComponentLifecycle::new();
        {
            let mut ctx = ComponentContext::new(id, slot, self.role, self.tick, &mut self.slots);
            component.on_awake(&mut ctx);
        }
        lifecycle.advance(LifecycleState::Awake)?;

        if let Some(owner) = self.slots.get_mut(&slot) {
            owner.add_component(id);
        }
        self.components.insert(
            id,
            ComponentEntry {
                slot,
                kind,
                lifecycle,
                component: Some(component),
                hook,
            },
        );
        debug!("Component {:?} '{}' attached to {:?}", id, kind, slot);
        Ok(())
    }

    fn remove_component(&mut self, id: &ReferenceId) {
        let Some(mut entry) = self.components.remove(id) else {
            return;
        };
        if let Some(mut component) = entry.component.take() {
            if !entry.lifecycle.is_destroyed() {
                let mut ctx =
                    ComponentContext::new(*id, entry.slot, self.role, self.tick, &mut self.slots);
                component.on_destroy(&mut ctx);
            }
            for member in component.members() {
                self.resolver.unregister(&member.member_id());
            }
        }
        if let Some(mut hook) = entry.hook.take() {
            hook.destroy(false);
        }
        if let Err(error) = entry.lifecycle.advance(LifecycleState::Destroyed) {
            warn!("Component {:?}: {}", id, error);
        }
        self.resolver.unregister(id);
        if let Some(slot) = self.slots.get_mut(&entry.slot) {
            slot.remove_component(id);
        }
        self.remote_changed.remove(id);
        self.created.retain(|created| created != id);
        debug!("Component {:?} '{}' destroyed", id, entry.kind);
    }

    fn remove_slot_tree(&mut self, id: &ReferenceId) {
        let mut doomed = self.slots.descendants_post_order(id);
        doomed.push(*id);
        for slot_id in doomed {
            for component in self.components_of(&slot_id) {
                self.remove_component(&component);
            }
            let Some(slot) = self.slots.remove(&slot_id) else {
                continue;
            };
            for member in member_ids(slot.members()) {
                self.resolver.unregister(&member);
            }
            self.resolver.unregister(&slot_id);
            self.reconcile_queue.remove(&slot_id);
            self.created.retain(|created| *created != slot_id);
            debug!("Slot {:?} destroyed", slot_id);
        }
    }

    // Batch decode

    /// Opens a batch decode window. Until the matching `end_batch`, no
    /// reference resolves and no slot is attached.
    pub fn begin_batch(&mut self) {
        self.resolver.begin_batch();
    }

    /// Closes a batch decode window. When the outermost window closes,
    /// references are re-resolved, slots reconciled and `on_changes` runs
    /// for components changed remotely. Returns how many slots changed
    /// attachment.
    pub fn end_batch(&mut self) -> Result<usize, WorldError> {
        if !self.resolver.end_batch()? {
            return Ok(0);
        }
        let attached = self.settle();
        self.dispatch_remote_changes();
        Ok(attached)
    }

    pub fn is_batching(&self) -> bool {
        self.resolver.is_batching()
    }

    /// Applies one inbound record. Outside a batch window its effects
    /// settle immediately.
    pub fn apply_record(&mut self, record: &SyncRecord) -> Result<(), WorldError> {
        self.ensure_alive()?;
        let result = match record {
            SyncRecord::CreateSlot { id } => self.apply_create_slot(*id),
            SyncRecord::AttachComponent { id, slot, kind } => {
                self.apply_attach_component(*id, *slot, kind)
            }
            SyncRecord::FieldUpdate { field, value } => self.apply_field_update(*field, value),
            SyncRecord::Destroy { id } => self.apply_destroy(*id),
        };
        if !self.resolver.is_batching() {
            self.settle();
            self.dispatch_remote_changes();
        }
        result
    }

    /// Applies every record inside one batch window. Problems with single
    /// records are logged and counted, never returned.
    pub fn apply_batch(&mut self, batch: &UpdateBatch) -> Result<BatchReport, WorldError> {
        self.ensure_alive()?;
        let mut report = BatchReport::default();
        self.begin_batch();
        for record in batch.records() {
            match self.apply_record(record) {
                Ok(()) => report.applied += 1,
                Err(error) => {
                    warn!("Skipped inbound record {:?}: {}", record, error);
                    report.skipped += 1;
                }
            }
        }
        report.attached = self.end_batch()?;
        debug!(
            "Batch applied: {} records, {} skipped, {} attachments",
            report.applied, report.skipped, report.attached
        );
        Ok(report)
    }

    fn apply_create_slot(&mut self, id: ReferenceId) -> Result<(), WorldError> {
        self.ensure_structural_remote()?;
        if self.resolver.contains(&id) {
            return Err(WorldError::AlreadyExists { id });
        }
        let mut slot = Slot::new_remote();
        slot.bind(id, &self.mutator)?;
        register_owner(
            &mut self.resolver,
            id,
            ObjectRecord::Slot,
            &member_ids(slot.members()),
        )?;
        self.slots.insert(slot);
        self.reconcile_queue.insert(id);
        Ok(())
    }

    fn apply_attach_component(
        &mut self,
        id: ReferenceId,
        slot: ReferenceId,
        kind: &str,
    ) -> Result<(), WorldError> {
        self.ensure_structural_remote()?;
        if self.resolver.contains(&id) {
            return Err(WorldError::AlreadyExists { id });
        }
        if !self.slots.contains(&slot) {
            return Err(WorldError::SlotNotFound { id: slot });
        }
        let component = self.registry.create(kind)?;
        self.insert_component(id, slot, component)
    }

    fn apply_field_update(&mut self, field: ReferenceId, value: &FieldValue) -> Result<(), WorldError> {
        let (owner, index) = match self.resolver.try_resolve(&field) {
            Some(ObjectRecord::Member { owner, index }) => (owner, index),
            Some(_) => return Err(WorldError::KindMismatch { id: field }),
            None => return Err(WorldError::UnknownId { id: field }),
        };
        let member = member_mut(&mut self.slots, &mut self.components, &owner, index)
            .ok_or(WorldError::UnknownId { id: field })?;
        let changed = member.apply_remote(value)?;
        let is_reference = member.as_reference().is_some();
        if changed {
            if is_reference {
                self.pending_refresh.insert(field);
            }
            if self.components.contains_key(&owner) {
                self.remote_changed.insert(owner);
            }
        }
        Ok(())
    }

    fn apply_destroy(&mut self, id: ReferenceId) -> Result<(), WorldError> {
        self.ensure_structural_remote()?;
        match self.resolver.kind_of(&id) {
            Some(ObjectKind::Slot) if id == self.slots.root() => Err(WorldError::RootImmutable),
            Some(ObjectKind::Slot) => {
                self.remove_slot_tree(&id);
                Ok(())
            }
            Some(ObjectKind::Component) => {
                self.remove_component(&id);
                Ok(())
            }
            Some(ObjectKind::Member) => Err(WorldError::KindMismatch { id }),
            None => Err(WorldError::UnknownId { id }),
        }
    }

    /// Structural records are the authority's to send; the authority only
    /// takes them from replicas when configured to
    fn ensure_structural_remote(&self) -> Result<(), WorldError> {
        if self.role.is_authority() && !self.config.allow_replica_creation {
            return Err(WorldError::CreationNotPermitted);
        }
        Ok(())
    }

    // Resolution and attachment

    /// Re-resolves every reference that may have changed, then reconciles
    /// the slots whose parent may have changed. No-op inside a batch window.
    fn settle(&mut self) -> usize {
        if self.resolver.is_batching() || self.state.is_terminal() {
            return 0;
        }
        self.flush_references();
        let queue = std::mem::take(&mut self.reconcile_queue);
        if queue.is_empty() {
            return 0;
        }
        self.slots.reconcile(queue, self.state.is_running()).len()
    }

    fn flush_references(&mut self) {
        let mut members: BTreeSet<ReferenceId> = self.resolver.take_stale().into_iter().collect();
        members.append(&mut self.pending_refresh);
        members.extend(self.mutator.take_references());
        for member in members {
            self.refresh_member(member);
        }
    }

    fn refresh_member(&mut self, member: ReferenceId) {
        let Some(ObjectRecord::Member { owner, index }) = self.resolver.try_resolve(&member) else {
            return;
        };
        let Some(reference) = member_mut(&mut self.slots, &mut self.components, &owner, index)
            .and_then(|found| found.as_reference_mut())
        else {
            return;
        };
        reference.refresh(&self.resolver);
        let targets = reference.referenced_ids();
        let pending = reference.is_pending();

        self.resolver.track(member, targets);
        if pending {
            self.resolver.note_pending(member, self.tick);
        } else {
            self.resolver.note_settled(&member);
        }
        if index == Slot::PARENT_INDEX && self.slots.contains(&owner) {
            self.reconcile_queue.insert(owner);
        }
    }

    fn dispatch_remote_changes(&mut self) {
        let changed = std::mem::take(&mut self.remote_changed);
        for id in changed {
            let awake = self
                .components
                .get(&id)
                .map(|entry| {
                    entry.lifecycle.state() >= LifecycleState::Awake && !entry.lifecycle.is_destroyed()
                })
                .unwrap_or(false);
            if awake {
                self.run_callback(&id, None, |component, ctx| component.on_changes(ctx));
            }
        }
    }

    // Tick

    /// Runs one world tick: queued tasks, pending resolution, component
    /// starts and updates, then external hooks
    pub fn tick(&mut self) -> Result<(), WorldError> {
        self.ensure_alive()?;
        self.run_tasks();
        // a task may have torn the world down
        self.ensure_alive()?;

        self.settle();
        self.start_components();
        self.update_components();
        self.apply_hooks();
        self.settle();

        if let Some(threshold) = self.config.pending_reference_warning_ticks {
            self.resolver.report_overdue(self.tick, threshold);
        }
        self.tick += 1;
        Ok(())
    }

    fn run_tasks(&mut self) -> usize {
        let tasks = self.tasks.drain();
        let count = tasks.len();
        for task in tasks {
            if self.state.is_terminal() {
                break;
            }
            task(self);
        }
        count
    }

    fn run_callback(
        &mut self,
        id: &ReferenceId,
        advance_to: Option<LifecycleState>,
        callback: impl FnOnce(&mut dyn Component, &mut ComponentContext<'_>),
    ) {
        let Some(entry) = self.components.get_mut(id) else {
            return;
        };
        let Some(mut component) = entry.component.take() else {
            return;
        };
        let slot = entry.slot;
        {
            let mut ctx = ComponentContext::new(*id, slot, self.role, self.tick, &mut self.slots);
            callback(&mut *component, &mut ctx);
        }
        if let Some(entry) = self.components.get_mut(id) {
            entry.component = Some(component);
            if let Some(next) = advance_to {
                if let Err(error) = entry.lifecycle.advance(next) {
                    warn!("Component {:?}: {}", id, error);
                }
            }
        }
    }

    fn required_present(&self, slot: &ReferenceId, required: &[&'static str]) -> bool {
        let present: HashSet<&'static str> = self
            .components_of(slot)
            .iter()
            .filter_map(|id| self.component_kind(id))
            .collect();
        required.iter().all(|kind| present.contains(kind))
    }

    fn start_components(&mut self) {
        let waiting: Vec<(ReferenceId, ReferenceId, &'static [&'static str])> = self
            .components
            .iter()
            .filter(|(_, entry)| entry.lifecycle.state() == LifecycleState::Awake)
            .filter_map(|(id, entry)| {
                let required = entry.component.as_deref()?.required_components();
                Some((*id, entry.slot, required))
            })
            .collect();
        for (id, slot, required) in waiting {
            if !self.slots.is_in_hierarchy(&slot) || !self.required_present(&slot, required) {
                continue;
            }
            self.run_callback(&id, Some(LifecycleState::Started), |component, ctx| {
                component.on_start(ctx)
            });
        }
    }

    fn update_components(&mut self) {
        let started: Vec<(ReferenceId, ReferenceId)> = self
            .components
            .iter()
            .filter(|(_, entry)| entry.lifecycle.has_started())
            .map(|(id, entry)| (*id, entry.slot))
            .collect();
        for (id, slot) in started {
            if !self.slots.is_in_hierarchy(&slot) || !self.slots.is_active_in_hierarchy(&slot) {
                continue;
            }
            self.run_callback(&id, Some(LifecycleState::Updating), |component, ctx| {
                component.on_update(ctx)
            });
        }
    }

    fn apply_hooks(&mut self) {
        for entry in self.components.values_mut() {
            if !entry.lifecycle.has_started() {
                continue;
            }
            let (Some(hook), Some(component)) = (entry.hook.as_mut(), entry.component.as_deref_mut())
            else {
                continue;
            };
            let Some(slot) = self.slots.get(&entry.slot) else {
                continue;
            };
            hook.apply_changes(component, slot);
        }
    }

    // Outbound

    /// Everything changed locally since the last call: creations with all
    /// their member values, then field updates, then destructions. Objects
    /// created and destroyed in between emit nothing.
    pub fn collect_outbound(&mut self) -> UpdateBatch {
        let mut batch = UpdateBatch::new();
        if self.state.is_terminal() {
            return batch;
        }
        let created = std::mem::take(&mut self.created);
        let destroyed = std::mem::take(&mut self.destroyed);
        let mutated = self.mutator.take_outbound();

        let created_set: HashSet<ReferenceId> = created.iter().copied().collect();
        for id in &created {
            self.push_creation(id, &mut batch);
        }
        for field in mutated {
            let Some(ObjectRecord::Member { owner, index }) = self.resolver.try_resolve(&field)
            else {
                continue;
            };
            if created_set.contains(&owner) {
                continue;
            }
            if let Some(value) = self.member_value(&owner, index) {
                batch.push(SyncRecord::FieldUpdate { field, value });
            }
        }
        for id in destroyed {
            batch.push(SyncRecord::Destroy { id });
        }
        batch
    }

    /// The whole data model, root members first, then every slot, then
    /// every component
    pub fn snapshot(&self) -> UpdateBatch {
        let mut batch = UpdateBatch::new();
        if self.state.is_terminal() {
            return batch;
        }
        for slot in self.slots.iter() {
            if !slot.is_root() {
                batch.push(SyncRecord::CreateSlot { id: slot.id() });
            }
            push_members(&mut batch, slot.members());
        }
        for id in self.components.keys() {
            self.push_creation(id, &mut batch);
        }
        batch
    }

    fn push_creation(&self, id: &ReferenceId, batch: &mut UpdateBatch) {
        if let Some(slot) = self.slots.get(id) {
            batch.push(SyncRecord::CreateSlot { id: *id });
            push_members(batch, slot.members());
        } else if let Some(entry) = self.components.get(id) {
            let Some(component) = entry.component.as_deref() else {
                return;
            };
            batch.push(SyncRecord::AttachComponent {
                id: *id,
                slot: entry.slot,
                kind: entry.kind.to_string(),
            });
            push_members(batch, component.members());
        }
    }

    fn member_value(&self, owner: &ReferenceId, index: usize) -> Option<FieldValue> {
        if let Some(slot) = self.slots.get(owner) {
            return slot.members().get(index).map(|member| member.encode());
        }
        self.components
            .get(owner)?
            .component
            .as_deref()?
            .members()
            .get(index)
            .map(|member| member.encode())
    }
}

impl Drop for World {
    fn drop(&mut self) {
        self.destroy();
    }
}
