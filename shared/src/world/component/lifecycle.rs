use super::error::LifecycleError;

/// Lifecycle of a component. States advance strictly in order; `Updating`
/// repeats; `Destroyed` is reachable from anywhere and final.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LifecycleState {
    Constructed,
    Awake,
    Started,
    Updating,
    Destroyed,
}

#[derive(Clone, Copy, Debug)]
pub struct ComponentLifecycle {
    state: LifecycleState,
}

impl ComponentLifecycle {
    pub fn new() -> Self {
        Self {
            state: LifecycleState::Constructed,
        }
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn is_destroyed(&self) -> bool {
        self.state == LifecycleState::Destroyed
    }

    /// Has run `on_start` (and possibly updates), and is not destroyed
    pub fn has_started(&self) -> bool {
        matches!(self.state, LifecycleState::Started | LifecycleState::Updating)
    }

    pub fn advance(&mut self, to: LifecycleState) -> Result<(), LifecycleError> {
        use LifecycleState::*;

        let allowed = match (self.state, to) {
            (Destroyed, _) => return Err(LifecycleError::AlreadyDestroyed { to }),
            (_, Destroyed) => true,
            (Constructed, Awake) | (Awake, Started) | (Started, Updating) | (Updating, Updating) => {
                true
            }
            _ => false,
        };
        if !allowed {
            return Err(LifecycleError::InvalidTransition {
                from: self.state,
                to,
            });
        }
        self.state = to;
        Ok(())
    }
}

impl Default for ComponentLifecycle {
    fn default() -> Self {
        Self::new()
    }
}
