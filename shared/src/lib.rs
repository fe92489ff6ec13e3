//! # Trellis Shared
//! The replicated scene-graph core: reference ids and their resolver,
//! replicated fields, the slot tree and the world that owns them.

#![deny(trivial_numeric_casts, unstable_features, unused_import_braces)]

mod reference;
mod types;
mod world;

pub use reference::{
    ObjectKind, ObjectRecord, ReferenceAllocator, ReferenceId, ReferenceIdError,
    ReferenceResolver, ResolverError,
};
pub use types::{Float3, FloatQ, PeerRole, Tick};
pub use world::{
    component::{
        component::{AsAny, Behavior, Component, ComponentContext, SyncMembers},
        error::{ComponentError, FieldError, LifecycleError},
        field_value::{FieldValue, SyncValue},
        hook::{ComponentHook, HookFactory},
        lifecycle::{ComponentLifecycle, LifecycleState},
        member::{ReferenceMember, SyncMember},
        mutator::FieldMutator,
        observer::ObserverId,
        registry::ComponentRegistry,
        resource::SharedResource,
        sync_field::{ChangeOrigin, FieldChange, SyncField},
        sync_list::SyncList,
        sync_ref::{AnyComponent, ReferenceState, Referent, SyncRef, TargetChange},
        sync_ref_list::{ElementTargetChange, SyncRefList},
    },
    config::WorldConfig,
    error::WorldError,
    record::{BatchReport, SyncRecord, UpdateBatch},
    slot::{Slot, SlotTable},
    state::WorldState,
    task_queue::{WorldTask, WorldTaskSender},
    world::World,
};
