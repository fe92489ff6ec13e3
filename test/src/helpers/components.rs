use trellis_shared::{
    Behavior, Component, ComponentContext, ComponentRegistry, Slot, SyncField, SyncList,
    SyncMember, SyncMembers, SyncRef, SyncRefList,
};

/// Points at one slot and keeps a list of followers
pub struct Beacon {
    pub intensity: SyncField<f32>,
    pub target: SyncRef<Slot>,
    pub followers: SyncRefList<Slot>,
    pub tags: SyncList<String>,
    pub remote_changes: usize,
}

impl Default for Beacon {
    fn default() -> Self {
        Self {
            intensity: SyncField::new("intensity", 1.0),
            target: SyncRef::new("target"),
            followers: SyncRefList::new("followers"),
            tags: SyncList::new("tags"),
            remote_changes: 0,
        }
    }
}

impl SyncMembers for Beacon {
    fn members(&self) -> Vec<&dyn SyncMember> {
        vec![
            &self.intensity as &dyn SyncMember,
            &self.target,
            &self.followers,
            &self.tags,
        ]
    }

    fn members_mut(&mut self) -> Vec<&mut dyn SyncMember> {
        vec![
            &mut self.intensity as &mut dyn SyncMember,
            &mut self.target,
            &mut self.followers,
            &mut self.tags,
        ]
    }
}

impl Behavior for Beacon {
    fn on_changes(&mut self, _ctx: &mut ComponentContext<'_>) {
        self.remote_changes += 1;
    }
}

impl Component for Beacon {
    fn kind(&self) -> &'static str {
        "Beacon"
    }
}

/// Drives its slot's rotation angle on the authority; replicas only follow
pub struct Spin {
    pub degrees: SyncField<f32>,
    pub step: f32,
}

impl Default for Spin {
    fn default() -> Self {
        Self {
            degrees: SyncField::new("degrees", 0.0),
            step: 15.0,
        }
    }
}

impl SyncMembers for Spin {
    fn members(&self) -> Vec<&dyn SyncMember> {
        vec![&self.degrees as &dyn SyncMember]
    }

    fn members_mut(&mut self) -> Vec<&mut dyn SyncMember> {
        vec![&mut self.degrees as &mut dyn SyncMember]
    }
}

impl Behavior for Spin {
    fn on_update(&mut self, ctx: &mut ComponentContext<'_>) {
        if ctx.is_authority() {
            let next = (*self.degrees.get() + self.step) % 360.0;
            self.degrees.set(next);
        }
    }
}

impl Component for Spin {
    fn kind(&self) -> &'static str {
        "Spin"
    }
}

/// Registry with every sample component
pub fn sample_registry() -> ComponentRegistry {
    let mut registry = ComponentRegistry::new();
    registry.add::<Beacon>().add::<Spin>();
    registry
}
