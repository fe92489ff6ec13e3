use std::{
    fmt,
    ops::Deref,
    sync::{Arc, Mutex},
};

type ReleaseFn<T> = Box<dyn FnOnce(&T) + Send>;

struct ResourceInner<T: Send + Sync> {
    value: T,
    release: Mutex<Option<ReleaseFn<T>>>,
}

impl<T: Send + Sync> Drop for ResourceInner<T> {
    fn drop(&mut self) {
        let release = self
            .release
            .get_mut()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some(release) = release {
            release(&self.value);
        }
    }
}

/// Reference-counted handle to something owned outside the world (a GPU
/// buffer, an audio clip). The release callback runs exactly once, when the
/// last handle is dropped.
pub struct SharedResource<T: Send + Sync> {
    inner: Arc<ResourceInner<T>>,
}

impl<T: Send + Sync> SharedResource<T> {
    pub fn new(value: T, release: impl FnOnce(&T) + Send + 'static) -> Self {
        Self {
            inner: Arc::new(ResourceInner {
                value,
                release: Mutex::new(Some(Box::new(release))),
            }),
        }
    }

    pub fn holders(&self) -> usize {
        Arc::strong_count(&self.inner)
    }
}

impl<T: Send + Sync> Clone for SharedResource<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: Send + Sync> Deref for SharedResource<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.inner.value
    }
}

impl<T: Send + Sync + fmt::Debug> fmt::Debug for SharedResource<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedResource")
            .field("value", &self.inner.value)
            .field("holders", &self.holders())
            .finish()
    }
}
