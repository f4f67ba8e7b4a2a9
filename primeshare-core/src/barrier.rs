//! A barrier implementation that allows to synchronize threads.
//!
//! The [CountingBarrier] releases all waiting threads only when (1) the
//! number of threads that called [CountingBarrier::block] reaches a
//! threshold and (2) the barrier has been opened via
//! [CountingBarrier::open]. This gates privacy-peer worker threads between
//! protocol phases while a separate controlling thread sets up the next
//! round: the controller cannot simply wait on a plain barrier, because it
//! must stay responsive while late threads are still arriving.

use std::sync::{Condvar, Mutex};

#[derive(Default)]
struct BarrierState {
    waiting: usize,
    open: bool,
    generation: u64,
}

/// A two-predicate barrier: released iff `waiting >= threshold` and opened.
pub struct CountingBarrier {
    threshold: usize,
    state: Mutex<BarrierState>,
    condvar: Condvar,
}

impl CountingBarrier {
    /// Creates a new counting barrier requiring `threshold` waiting threads.
    pub fn new(threshold: usize) -> Self {
        Self {
            threshold,
            state: Mutex::new(BarrierState::default()),
            condvar: Condvar::new(),
        }
    }

    /// Blocks the calling thread until the barrier releases.
    ///
    /// When this call makes both release conditions true, all waiting
    /// threads are woken, the waiting count resets and the open flag clears.
    pub fn block(&self) {
        let mut state = self.state.lock().expect("barrier lock poisoned");
        state.waiting += 1;
        if state.open && state.waiting >= self.threshold {
            state.waiting = 0;
            state.open = false;
            state.generation += 1;
            self.condvar.notify_all();
            return;
        }
        let generation = state.generation;
        while state.generation == generation {
            state = self.condvar.wait(state).expect("barrier lock poisoned");
        }
    }

    /// Opens the barrier. As soon as enough threads are waiting they are
    /// released.
    pub fn open(&self) {
        let mut state = self.state.lock().expect("barrier lock poisoned");
        state.open = true;
        if state.waiting >= self.threshold {
            state.waiting = 0;
            state.open = false;
            state.generation += 1;
            self.condvar.notify_all();
        }
    }

    /// The number of threads currently waiting at the barrier.
    pub fn waiting(&self) -> usize {
        self.state.lock().expect("barrier lock poisoned").waiting
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn releases_only_when_full_and_open() {
        let barrier = Arc::new(CountingBarrier::new(2));
        let released = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..2 {
            let barrier = Arc::clone(&barrier);
            let released = Arc::clone(&released);
            handles.push(thread::spawn(move || {
                barrier.block();
                released.fetch_add(1, Ordering::SeqCst);
            }));
        }

        // full but not open: nobody may pass
        while barrier.waiting() < 2 {
            thread::yield_now();
        }
        thread::sleep(Duration::from_millis(50));
        assert_eq!(released.load(Ordering::SeqCst), 0);

        barrier.open();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(released.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn open_before_full_waits_for_count() {
        let barrier = Arc::new(CountingBarrier::new(2));
        barrier.open();

        let b = Arc::clone(&barrier);
        let first = thread::spawn(move || b.block());
        thread::sleep(Duration::from_millis(20));
        assert!(!first.is_finished());

        let b = Arc::clone(&barrier);
        let second = thread::spawn(move || b.block());
        first.join().unwrap();
        second.join().unwrap();
    }

    #[test]
    fn reusable_across_cycles() {
        let barrier = Arc::new(CountingBarrier::new(3));
        for _ in 0..4 {
            let mut handles = Vec::new();
            for _ in 0..3 {
                let barrier = Arc::clone(&barrier);
                handles.push(thread::spawn(move || barrier.block()));
            }
            while barrier.waiting() < 3 {
                thread::yield_now();
            }
            barrier.open();
            for handle in handles {
                handle.join().unwrap();
            }
            // flag cleared again after release
            assert_eq!(barrier.waiting(), 0);
        }
    }
}
