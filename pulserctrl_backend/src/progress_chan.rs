//! Progress tracking between the engine thread and the device worker.
//!
//! Every command handed to the worker is counted as posted; the worker reports each one
//! as done. [`ProgressChan::wait_all`] blocks until the two counts meet, which is what
//! "operation complete" means for a threaded transport.

use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

use pulser_backend::{PulserError, Result};

struct Progress {
    posted: usize,
    done: usize,
    // First device error since the last `wait_all`
    error: Option<PulserError>,
}

pub struct ProgressChan {
    state: Arc<Mutex<Progress>>,
    condvar: Arc<Condvar>,
}

impl ProgressChan {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(Progress {
                posted: 0,
                done: 0,
                error: None,
            })),
            condvar: Arc::new(Condvar::new()),
        }
    }

    pub fn new_recvr(&self) -> ProgressRecvr {
        ProgressRecvr {
            state: self.state.clone(),
            condvar: self.condvar.clone(),
        }
    }

    /// Counts one more command as handed to the worker.
    pub fn post(&self) {
        self.state.lock().posted += 1;
    }

    /// Reports a posted command as failed without the worker having seen it.
    pub fn abandon(&self, err: PulserError) {
        self.new_recvr().done(Err(err));
    }

    /// Number of posted commands the worker has not reported yet.
    pub fn pending(&self) -> usize {
        let state = self.state.lock();
        state.posted - state.done
    }

    /// Blocks until every posted command is done and returns the first error among them.
    pub fn wait_all(&self) -> Result<()> {
        let mut guard = self.state.lock();
        while guard.done < guard.posted {
            self.condvar.wait(&mut guard);
        }
        match guard.error.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl Default for ProgressChan {
    fn default() -> Self {
        Self::new()
    }
}

pub struct ProgressRecvr {
    state: Arc<Mutex<Progress>>,
    condvar: Arc<Condvar>,
}

impl ProgressRecvr {
    pub fn done(&self, result: Result<()>) {
        let mut guard = self.state.lock();
        guard.done += 1;
        if let Err(err) = result {
            guard.error.get_or_insert(err);
        }
        debug_assert!(
            guard.done <= guard.posted,
            "done count {} diverged from the posted count {}",
            guard.done,
            guard.posted
        );
        self.condvar.notify_all();
    }
}
