/// PROPERTY-BASED TESTS: identity and convergence invariants
///
/// Key invariants:
/// 1. Reference ids survive their wire form, garbage decodes to null
/// 2. A replica converges to the authority's tree whatever order the
///    per-slot creation batches arrive in
/// 3. Field writes only mark dirty when the value really changes
use proptest::prelude::*;
use trellis_shared::{
    ComponentRegistry, ReferenceId, SyncField, SyncRecord, UpdateBatch, World, WorldConfig,
    WorldState,
};
use trellis_test::{assert_fully_attached, assert_same_tree};

fn authority_with_tree(parents: &[prop::sample::Index]) -> World {
    let mut world = World::new_authority(WorldConfig::default(), ComponentRegistry::new()).unwrap();
    world.set_state(WorldState::Running).unwrap();
    let mut slots = vec![world.root()];
    for (index, parent) in parents.iter().enumerate() {
        let parent = *parent.get(&slots);
        let name = format!("Slot {}", index);
        let id = world.add_slot(&parent, &name).unwrap();
        slots.push(id);
    }
    world
}

/// Snapshot records grouped by owning slot, one group per slot
fn per_slot_groups(world: &World) -> Vec<UpdateBatch> {
    let snapshot = world.snapshot();
    world
        .slots()
        .ids()
        .into_iter()
        .map(|slot| {
            let owns = |id: &ReferenceId| {
                id.authority() == slot.authority()
                    && id.local() >= slot.local()
                    && id.local() <= slot.local() + 8
            };
            snapshot
                .records()
                .iter()
                .filter(|record| match record {
                    SyncRecord::CreateSlot { id } => owns(id),
                    SyncRecord::FieldUpdate { field, .. } => owns(field),
                    _ => false,
                })
                .cloned()
                .collect::<Vec<_>>()
                .into()
        })
        .collect()
}

proptest! {
    #[test]
    fn prop_reference_id_survives_wire_form(
        authority in any::<u8>(),
        local in 0u64..(1u64 << 56),
    ) {
        let id = ReferenceId::new(authority, local).unwrap();
        let decoded = ReferenceId::from_wire_str(&id.to_wire_string());

        prop_assert_eq!(decoded, id);
        prop_assert_eq!(decoded.authority(), authority);
        prop_assert_eq!(decoded.local(), local);
    }

    #[test]
    fn prop_garbage_decodes_to_null(input in "[a-zA-Z]{1,12}") {
        prop_assert!(ReferenceId::from_wire_str(&input).is_null());
        prop_assert!(input.parse::<ReferenceId>().is_err());
    }

    /// Every slot's creation arrives in its own batch, in random order
    #[test]
    fn prop_shuffled_creation_converges(
        parents in prop::collection::vec(any::<prop::sample::Index>(), 1..12),
        keys in prop::collection::vec(any::<u32>(), 13),
    ) {
        let host = authority_with_tree(&parents);
        let mut groups: Vec<(u32, UpdateBatch)> = per_slot_groups(&host)
            .into_iter()
            .enumerate()
            .map(|(index, group)| (keys[index], group))
            .collect();
        groups.sort_by_key(|(key, _)| *key);

        let mut replica = World::new_replica(WorldConfig::default(), ComponentRegistry::new()).unwrap();
        replica.set_state(WorldState::WaitingForJoinGrant).unwrap();
        replica.set_state(WorldState::InitializingDataModel).unwrap();
        for (_, group) in &groups {
            let report = replica.apply_batch(group).unwrap();
            prop_assert_eq!(report.skipped, 0);
        }
        replica.set_state(WorldState::Running).unwrap();

        assert_same_tree(&host, &replica);
        assert_fully_attached(&replica);
    }

    #[test]
    fn prop_field_dirty_only_on_change(values in prop::collection::vec(any::<i64>(), 1..20)) {
        let mut field = SyncField::new("value", 0i64);
        for value in values {
            field.consume_dirty();
            let before = *field.get();
            let changed = field.set(value);

            prop_assert_eq!(changed, before != value);
            prop_assert_eq!(field.is_dirty(), changed);
            prop_assert_eq!(*field.get(), value);

            // writing the same value again is a no-op
            field.consume_dirty();
            prop_assert!(!field.set(value));
            prop_assert!(!field.is_dirty());
        }
        prop_assert!(!field.consume_dirty());
    }
}
