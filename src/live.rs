use std::sync::Arc;

use parking_lot::RwLock;

/// Shared cell written by the viewer and polled once per frame by the render loop.
///
/// Clones point at the same value, so the loop never has to be restarted to
/// observe a changed flag.
#[derive(Debug, Default)]
pub struct LiveCell<T> {
    value: Arc<RwLock<T>>,
}

impl<T> Clone for LiveCell<T> {
    fn clone(&self) -> Self {
        Self {
            value: Arc::clone(&self.value),
        }
    }
}

impl<T: Copy> LiveCell<T> {
    pub fn new(value: T) -> Self {
        Self {
            value: Arc::new(RwLock::new(value)),
        }
    }

    pub fn get(&self) -> T {
        *self.value.read()
    }

    pub fn set(&self, value: T) {
        *self.value.write() = value;
    }
}

/// Flags the frame loop reads without re-subscribing to preference changes.
#[derive(Debug, Clone, Default)]
pub struct LiveFlags {
    pub wireframe: LiveCell<bool>,
    pub auto_rotate: LiveCell<bool>,
}

impl LiveFlags {
    pub fn new(wireframe: bool, auto_rotate: bool) -> Self {
        Self {
            wireframe: LiveCell::new(wireframe),
            auto_rotate: LiveCell::new(auto_rotate),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_observe_writes() {
        let writer = LiveCell::new(false);
        let reader = writer.clone();
        writer.set(true);
        assert!(reader.get());
    }

    #[test]
    fn flags_are_independent() {
        let flags = LiveFlags::new(false, true);
        let loop_view = flags.clone();
        flags.wireframe.set(true);
        assert!(loop_view.wireframe.get());
        assert!(loop_view.auto_rotate.get());
    }
}
