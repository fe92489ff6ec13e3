use crate::world::slot::Slot;

use super::component::Component;

/// Connection between one component and an external collaborator
/// (renderer, physics, audio).
///
/// The world calls `apply_changes` once per tick after the component's
/// update; implementations use `consume_dirty()` on the component's fields to
/// redo only the work that changed.
pub trait ComponentHook: Send {
    fn apply_changes(&mut self, component: &mut dyn Component, slot: &Slot);

    /// Called exactly once when the component goes away. `world_teardown`
    /// is true when the whole world is being destroyed at once, so
    /// per-object cleanup may be skipped.
    fn destroy(&mut self, world_teardown: bool);
}

/// Supplied by the host to create hooks for the component kinds it handles
pub trait HookFactory: Send {
    fn create_hook(&mut self, kind: &'static str) -> Option<Box<dyn ComponentHook>>;
}
