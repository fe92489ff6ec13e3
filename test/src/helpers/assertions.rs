use trellis_shared::World;

/// Assert that two worlds hold the same slot tree: the same slot ids, names,
/// transforms and visible attachment
pub fn assert_same_tree(expected: &World, actual: &World) {
    let mut expected_ids = expected.slots().ids();
    let mut actual_ids = actual.slots().ids();
    expected_ids.sort();
    actual_ids.sort();
    assert_eq!(expected_ids, actual_ids, "Slot sets differ");

    for id in expected_ids {
        let (left, right) = match (expected.slot(&id), actual.slot(&id)) {
            (Some(left), Some(right)) => (left, right),
            _ => panic!("Slot {:?} missing", id),
        };
        assert_eq!(left.name.get(), right.name.get(), "Name of {:?}", id);
        assert_eq!(left.attached_to(), right.attached_to(), "Attachment of {:?}", id);
        assert_eq!(left.position.get(), right.position.get(), "Position of {:?}", id);
        assert_eq!(left.rotation.get(), right.rotation.get(), "Rotation of {:?}", id);
        assert_eq!(left.scale.get(), right.scale.get(), "Scale of {:?}", id);
        assert_eq!(left.active_self.get(), right.active_self.get(), "Activity of {:?}", id);
    }
}

/// Assert that every slot except the root hangs somewhere in the tree
pub fn assert_fully_attached(world: &World) {
    for id in world.slots().ids() {
        assert!(
            world.is_in_hierarchy(&id),
            "Slot {:?} is not attached to the world hierarchy",
            id
        );
    }
}

/// Assert that a sequence of progress values never decreases
pub fn assert_non_decreasing(values: &[f32]) {
    for pair in values.windows(2) {
        assert!(
            pair[0] <= pair[1],
            "Progress went backwards: {} -> {} in {:?}",
            pair[0],
            pair[1],
            values
        );
    }
}
