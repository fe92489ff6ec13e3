use crate::{
    reference::{ObjectKind, ReferenceId, ReferenceIdError},
    types::{Float3, FloatQ},
    world::component::{
        component::SyncMembers,
        member::SyncMember,
        mutator::FieldMutator,
        observer::ObserverId,
        sync_field::SyncField,
        sync_ref::{Referent, SyncRef, TargetChange},
    },
};

/// A node of the replicated scene tree.
///
/// The replicated parent link is `parent`; where the slot currently hangs in
/// the visible tree is `attached_to`, which only the world's reconciliation
/// changes.
pub struct Slot {
    id: ReferenceId,
    pub name: SyncField<String>,
    parent: SyncRef<Slot>,
    pub tag: SyncField<String>,
    pub active_self: SyncField<bool>,
    pub persistent: SyncField<bool>,
    pub position: SyncField<Float3>,
    pub rotation: SyncField<FloatQ>,
    pub scale: SyncField<Float3>,
    attached_to: Option<ReferenceId>,
    children: Vec<ReferenceId>,
    components: Vec<ReferenceId>,
}

impl Referent for Slot {
    const KIND: ObjectKind = ObjectKind::Slot;
}

impl Slot {
    /// Number of replicated members, which is also the number of ids a
    /// slot reserves after its own
    pub const MEMBER_COUNT: u64 = 8;

    /// Position of `parent` in the member list
    pub const PARENT_INDEX: usize = 1;

    pub(crate) fn new(name: &str) -> Self {
        Self {
            id: ReferenceId::NULL,
            name: SyncField::new("name", name.to_string()),
            parent: SyncRef::new("parent"),
            tag: SyncField::new("tag", String::new()),
            active_self: SyncField::new("active_self", true),
            persistent: SyncField::new("persistent", true),
            position: SyncField::new("position", Float3::ZERO),
            rotation: SyncField::new("rotation", FloatQ::IDENTITY),
            scale: SyncField::new("scale", Float3::ONE),
            attached_to: None,
            children: Vec::new(),
            components: Vec::new(),
        }
    }

    /// A slot announced by a peer: its parent stays Unknown until decoded
    pub(crate) fn new_remote() -> Self {
        let mut slot = Self::new("");
        slot.parent.await_decode();
        slot
    }

    /// Assigns the slot id and the member ids that follow it
    pub(crate) fn bind(
        &mut self,
        id: ReferenceId,
        mutator: &FieldMutator,
    ) -> Result<(), ReferenceIdError> {
        self.id = id;
        for (index, member) in self.members_mut().into_iter().enumerate() {
            member.bind(id.offset(1 + index as u64)?, mutator);
        }
        Ok(())
    }

    pub fn id(&self) -> ReferenceId {
        self.id
    }

    pub fn is_root(&self) -> bool {
        self.id == ReferenceId::ROOT_SLOT
    }

    /// The replicated parent reference
    pub fn parent(&self) -> &SyncRef<Slot> {
        &self.parent
    }

    pub(crate) fn parent_mut(&mut self) -> &mut SyncRef<Slot> {
        &mut self.parent
    }

    /// Observes the parent reference resolving to a new target
    pub fn on_parent_changed(
        &mut self,
        observer: impl FnMut(&TargetChange) + Send + 'static,
    ) -> ObserverId {
        self.parent.on_target_changed(observer)
    }

    /// The slot this one currently hangs under in the visible tree
    pub fn attached_to(&self) -> Option<ReferenceId> {
        self.attached_to
    }

    pub fn children(&self) -> &[ReferenceId] {
        &self.children
    }

    pub fn components(&self) -> &[ReferenceId] {
        &self.components
    }

    pub(crate) fn set_attached_to(&mut self, parent: Option<ReferenceId>) {
        self.attached_to = parent;
    }

    pub(crate) fn add_child(&mut self, child: ReferenceId) {
        if !self.children.contains(&child) {
            self.children.push(child);
        }
    }

    pub(crate) fn remove_child(&mut self, child: &ReferenceId) {
        self.children.retain(|id| id != child);
    }

    pub(crate) fn add_component(&mut self, component: ReferenceId) {
        self.components.push(component);
    }

    pub(crate) fn remove_component(&mut self, component: &ReferenceId) {
        self.components.retain(|id| id != component);
    }
}

impl SyncMembers for Slot {
    fn members(&self) -> Vec<&dyn SyncMember> {
        vec![
            &self.name as &dyn SyncMember,
            &self.parent,
            &self.tag,
            &self.active_self,
            &self.persistent,
            &self.position,
            &self.rotation,
            &self.scale,
        ]
    }

    fn members_mut(&mut self) -> Vec<&mut dyn SyncMember> {
        vec![
            &mut self.name as &mut dyn SyncMember,
            &mut self.parent,
            &mut self.tag,
            &mut self.active_self,
            &mut self.persistent,
            &mut self.position,
            &mut self.rotation,
            &mut self.scale,
        ]
    }
}
