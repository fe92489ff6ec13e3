use crate::types::PeerRole;

/// Connection lifecycle of a world
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum WorldState {
    Connecting,
    WaitingForJoinGrant,
    InitializingDataModel,
    Running,
    Failed,
    Destroyed,
}

impl WorldState {
    pub fn is_running(self) -> bool {
        self == WorldState::Running
    }

    /// Destroyed is the only terminal state; a Failed world still has to be
    /// destroyed to release its resources.
    pub fn is_terminal(self) -> bool {
        self == WorldState::Destroyed
    }

    /// Whether `self -> next` is a legal transition for a peer with `role`.
    ///
    /// Authorities go straight from Connecting to Running; replicas pass
    /// through every join phase in order.
    pub fn can_transition_to(self, next: WorldState, role: PeerRole) -> bool {
        use WorldState::*;

        match (self, next) {
            (Destroyed, _) => false,
            (_, Destroyed) => true,
            (Failed, _) => false,
            (_, Failed) => true,
            (Connecting, Running) => role.is_authority(),
            (Connecting, WaitingForJoinGrant)
            | (WaitingForJoinGrant, InitializingDataModel)
            | (InitializingDataModel, Running) => !role.is_authority(),
            _ => false,
        }
    }
}
