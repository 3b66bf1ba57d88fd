//! Result aggregator: the one place concurrent executors write results.
//!
//! All writes go through a single mutex so the two maps are never seen
//! half-updated. Once [`ResultAggregator::seal`] hands the maps to the
//! caller, further writes are rejected.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::warn;

use crate::error::{Error, Result, TaskError};
use crate::model::{DispatchStats, ExecutionResult, ResultSet, WorkKey};

#[derive(Debug)]
struct Maps<V> {
    successes: HashMap<WorkKey, V>,
    failures: HashMap<WorkKey, TaskError>,
    sealed: bool,
}

#[derive(Debug)]
pub struct ResultAggregator<V> {
    inner: Mutex<Maps<V>>,
}

impl<V> Default for ResultAggregator<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> ResultAggregator<V> {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Maps {
                successes: HashMap::new(),
                failures: HashMap::new(),
                sealed: false,
            }),
        }
    }

    /// Record a value for `key`, replacing any earlier result for it.
    pub fn record_success(&self, key: WorkKey, value: V) -> Result<()> {
        let mut maps = self.lock();
        check_open(&maps, &key)?;
        maps.failures.remove(&key);
        maps.successes.insert(key, value);
        Ok(())
    }

    /// Record a failure for `key`, replacing any earlier result for it.
    pub fn record_failure(&self, key: WorkKey, err: TaskError) -> Result<()> {
        let mut maps = self.lock();
        check_open(&maps, &key)?;
        maps.successes.remove(&key);
        maps.failures.insert(key, err);
        Ok(())
    }

    pub fn record(&self, key: WorkKey, result: ExecutionResult<V>) -> Result<()> {
        match result {
            ExecutionResult::Success(v) => self.record_success(key, v),
            ExecutionResult::Failure(e) => self.record_failure(key, e),
        }
    }

    /// Number of results recorded so far.
    pub fn len(&self) -> usize {
        let maps = self.lock();
        maps.successes.len() + maps.failures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Close the aggregator and take its maps. Later writes fail with
    /// [`Error::AggregatorSealed`]; a second seal returns empty maps.
    pub fn seal(&self, stats: DispatchStats) -> ResultSet<V> {
        let mut maps = self.lock();
        maps.sealed = true;
        ResultSet {
            successes: std::mem::take(&mut maps.successes),
            failures: std::mem::take(&mut maps.failures),
            stats,
        }
    }

    // Each write is one remove/insert pair; a poisoned lock still guards
    // consistent maps.
    fn lock(&self) -> MutexGuard<'_, Maps<V>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn check_open<V>(maps: &Maps<V>, key: &WorkKey) -> Result<()> {
    if maps.sealed {
        warn!(key = %key, "result arrived after handoff, dropped");
        return Err(Error::AggregatorSealed {
            key: key.to_string(),
        });
    }
    Ok(())
}
