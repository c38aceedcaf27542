//! Bounds the number of preindexes memory-mapped at once
//!
//! Every live [`Preindex`](super::Preindex) owns a permit. Suspending it to a
//! reference returns the permit, resuming takes one. A merge takes all three
//! of its permits in a single `acquire`, so a waiter never holds permits.

use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

use crate::config::MIN_LIVE_PREINDEXES;
use crate::error::{Error, Result};

#[derive(Debug, Default)]
struct BudgetState {
    live: usize,
    peak: usize,
}

#[derive(Debug)]
pub struct MappingBudget {
    /// 0 = unbounded
    capacity: usize,
    state: Mutex<BudgetState>,
    released: Condvar,
}

impl MappingBudget {
    pub fn new(capacity: usize) -> Arc<Self> {
        let capacity = match capacity {
            0 => 0,
            n => n.max(MIN_LIVE_PREINDEXES),
        };
        Arc::new(Self {
            capacity,
            state: Mutex::new(BudgetState::default()),
            released: Condvar::new(),
        })
    }

    pub fn unbounded() -> Arc<Self> {
        Self::new(0)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Block until `permits` are free, then take them all at once.
    ///
    /// A lease holds at most as many permits as the smallest budget, so the
    /// wait always ends.
    pub fn acquire(self: &Arc<Self>, permits: usize) -> Result<MappingLease> {
        if permits == 0 || permits > MIN_LIVE_PREINDEXES {
            return Err(Error::Internal(format!(
                "a lease holds 1 to {} permits, {} requested",
                MIN_LIVE_PREINDEXES, permits
            )));
        }
        let mut state = self.state.lock();
        while self.capacity > 0 && state.live + permits > self.capacity {
            self.released.wait(&mut state);
        }
        state.live += permits;
        state.peak = state.peak.max(state.live);
        Ok(MappingLease {
            budget: Some(Arc::clone(self)),
            permits,
        })
    }

    /// Preindexes currently mapped
    pub fn live(&self) -> usize {
        self.state.lock().live
    }

    /// Most preindexes ever mapped at once
    pub fn peak(&self) -> usize {
        self.state.lock().peak
    }

    fn release(&self, permits: usize) {
        if permits == 0 {
            return;
        }
        let mut state = self.state.lock();
        state.live = state.live.saturating_sub(permits);
        drop(state);
        self.released.notify_all();
    }
}

/// Permits held against a [`MappingBudget`], returned on drop
#[derive(Debug)]
pub struct MappingLease {
    budget: Option<Arc<MappingBudget>>,
    permits: usize,
}

impl MappingLease {
    /// A lease not counted against any budget
    pub fn untracked() -> Self {
        Self {
            budget: None,
            permits: 1,
        }
    }

    pub fn permits(&self) -> usize {
        self.permits
    }

    /// Move one permit into a lease of its own
    pub fn split_one(&mut self) -> Result<MappingLease> {
        if self.budget.is_some() {
            if self.permits <= 1 {
                return Err(Error::Internal(
                    "cannot split the last permit of a lease".into(),
                ));
            }
            self.permits -= 1;
        }
        Ok(MappingLease {
            budget: self.budget.clone(),
            permits: 1,
        })
    }
}

impl Drop for MappingLease {
    fn drop(&mut self) {
        if let Some(budget) = self.budget.take() {
            budget.release(self.permits);
        }
    }
}
