use std::any::Any;

use crate::{
    reference::ReferenceId,
    types::{PeerRole, Tick},
    world::slot::{Slot, SlotTable},
};

use super::member::SyncMember;

pub trait AsAny {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Capability: owns replicated members.
///
/// Both methods must list the same members in the same order every time;
/// the order fixes each member's id offset from the owner.
pub trait SyncMembers {
    fn members(&self) -> Vec<&dyn SyncMember>;
    fn members_mut(&mut self) -> Vec<&mut dyn SyncMember>;
}

/// Capability: reacts to lifecycle callbacks. Every hook defaults to a no-op.
pub trait Behavior {
    /// Kinds that must be attached to the same slot before `on_start` runs
    fn required_components(&self) -> &'static [&'static str] {
        &[]
    }

    /// Members are bound and registered when this runs
    fn on_awake(&mut self, _ctx: &mut ComponentContext<'_>) {}

    /// Runs once, after the slot is attached to the world hierarchy and the
    /// required sibling components exist
    fn on_start(&mut self, _ctx: &mut ComponentContext<'_>) {}

    /// Runs once per tick while the slot is active
    fn on_update(&mut self, _ctx: &mut ComponentContext<'_>) {}

    /// Runs after a batch decode changed at least one of this component's
    /// members through the remote path
    fn on_changes(&mut self, _ctx: &mut ComponentContext<'_>) {}

    fn on_destroy(&mut self, _ctx: &mut ComponentContext<'_>) {}
}

/// A behavior unit attached to exactly one slot for its lifetime
pub trait Component: SyncMembers + Behavior + AsAny + Send + 'static {
    /// Registered kind name, identical on every peer
    fn kind(&self) -> &'static str;
}

/// What a component sees of its world while a callback runs
pub struct ComponentContext<'a> {
    component: ReferenceId,
    slot: ReferenceId,
    role: PeerRole,
    tick: Tick,
    slots: &'a mut SlotTable,
}

impl<'a> ComponentContext<'a> {
    pub(crate) fn new(
        component: ReferenceId,
        slot: ReferenceId,
        role: PeerRole,
        tick: Tick,
        slots: &'a mut SlotTable,
    ) -> Self {
        Self {
            component,
            slot,
            role,
            tick,
            slots,
        }
    }

    pub fn component_id(&self) -> ReferenceId {
        self.component
    }

    pub fn slot_id(&self) -> ReferenceId {
        self.slot
    }

    pub fn role(&self) -> PeerRole {
        self.role
    }

    pub fn is_authority(&self) -> bool {
        self.role.is_authority()
    }

    pub fn tick(&self) -> Tick {
        self.tick
    }

    pub fn slot(&self) -> Option<&Slot> {
        self.slots.get(&self.slot)
    }

    pub fn slot_mut(&mut self) -> Option<&mut Slot> {
        self.slots.get_mut(&self.slot)
    }

    pub fn slots(&self) -> &SlotTable {
        self.slots
    }
}
