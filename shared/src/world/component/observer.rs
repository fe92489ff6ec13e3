pub type ObserverId = u32;

/// Explicit observer list owned by a field.
///
/// Observers run synchronously, in subscription order, on the world's own
/// execution context.
pub struct ObserverList<E> {
    next_id: ObserverId,
    observers: Vec<(ObserverId, Box<dyn FnMut(&E) + Send>)>,
}

impl<E> ObserverList<E> {
    pub fn new() -> Self {
        Self {
            next_id: 0,
            observers: Vec::new(),
        }
    }

    pub fn subscribe(&mut self, observer: impl FnMut(&E) + Send + 'static) -> ObserverId {
        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1);
        self.observers.push((id, Box::new(observer)));
        id
    }

    pub fn unsubscribe(&mut self, id: ObserverId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(observer_id, _)| *observer_id != id);
        before != self.observers.len()
    }

    pub fn notify(&mut self, event: &E) {
        for (_, observer) in self.observers.iter_mut() {
            observer(event);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }
}

impl<E> Default for ObserverList<E> {
    fn default() -> Self {
        Self::new()
    }
}
