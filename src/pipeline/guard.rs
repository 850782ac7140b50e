//! Deduplication guard: each task is scheduled at most once per run.

use std::collections::HashSet;
use std::sync::{Mutex, PoisonError};

use tracing::trace;

use crate::model::Task;

/// Run-scoped set of every task ever admitted.
///
/// The set only grows. Admission is atomic with respect to concurrent
/// callers, so no task can be returned twice across the run.
#[derive(Debug, Default)]
pub struct DedupGuard {
    seen: Mutex<HashSet<Task>>,
}

impl DedupGuard {
    /// Creates an empty guard.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the candidates that were not admitted before, in input order,
    /// and records them as seen. Repeats within one call collapse to the
    /// first occurrence.
    pub fn admit<I>(&self, candidates: I) -> Vec<Task>
    where
        I: IntoIterator<Item = Task>,
    {
        let mut seen = self.seen.lock().unwrap_or_else(PoisonError::into_inner);
        candidates
            .into_iter()
            .filter(|task| {
                let fresh = seen.insert(task.clone());
                if !fresh {
                    trace!(task = %task, "already scheduled");
                }
                fresh
            })
            .collect()
    }

    /// Number of distinct tasks admitted so far.
    #[must_use]
    pub fn seen_count(&self) -> usize {
        self.seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
