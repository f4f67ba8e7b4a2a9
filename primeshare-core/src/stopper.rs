//! Cooperative shutdown flag.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A shared flag used to stop running protocol threads.
///
/// Threads are given a clone of the stopper and check it at well-defined
/// points (between rounds); tripping it unwinds the current computation
/// cleanly.
#[derive(Debug, Clone, Default)]
pub struct Stopper {
    stopped: Arc<AtomicBool>,
}

impl Stopper {
    /// Creates a new stopper (not stopped).
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether computation should be stopped.
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Relaxed)
    }

    /// Requests all holders of this stopper to stop.
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stop_is_visible_to_clones() {
        let stopper = Stopper::new();
        let clone = stopper.clone();
        assert!(!clone.is_stopped());
        stopper.stop();
        assert!(clone.is_stopped());
    }
}
