//! Explicit execution configuration for data-parallel grid work.
//!
//! Thread count is never a process-wide setting: every solver and searcher
//! that can run data-parallel work holds an [`ExecutionContext`] chosen at
//! construction. The default context is serial.

use std::sync::Arc;

use rayon::ThreadPool;
use serde::{Deserialize, Serialize};

use crate::error::{SolverError, ValidationError};

/// How grid-wide loops are executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ExecutionPolicy {
    /// Plain loops on the calling thread.
    #[default]
    Serial,
    /// Data-parallel loops on a dedicated `rayon` pool.
    Parallel,
}

/// Number of hardware threads available to this process (at least 1).
pub fn hardware_concurrency() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// Execution policy plus the worker pool that backs it.
///
/// Cloning is cheap; clones share the same pool.
#[derive(Debug, Clone, Default)]
pub struct ExecutionContext {
    policy: ExecutionPolicy,
    pool: Option<Arc<ThreadPool>>,
}

impl ExecutionContext {
    /// Serial execution on the calling thread.
    pub fn serial() -> Self {
        Self::default()
    }

    /// Parallel execution on a dedicated pool of `threads` workers.
    ///
    /// # Errors
    ///
    /// [`ValidationError::ParameterOutOfRange`] when `threads == 0`, or
    /// [`SolverError::ExecutionPool`] if the pool cannot be spawned.
    pub fn parallel(threads: usize) -> Result<Self, SolverError> {
        if threads == 0 {
            return Err(ValidationError::ParameterOutOfRange {
                name: "threads".into(),
                value: "0".into(),
                expected: ">= 1".into(),
            }
            .into());
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("vox-geometry-{i}"))
            .build()
            .map_err(|e| SolverError::ExecutionPool(e.to_string()))?;

        Ok(Self {
            policy: ExecutionPolicy::Parallel,
            pool: Some(Arc::new(pool)),
        })
    }

    /// Parallel execution using one worker per hardware thread.
    pub fn with_hardware_concurrency() -> Result<Self, SolverError> {
        Self::parallel(hardware_concurrency())
    }

    /// Build a context from a policy, using `threads` workers when parallel
    /// (`None` means hardware concurrency).
    pub fn from_policy(policy: ExecutionPolicy, threads: Option<usize>) -> Result<Self, SolverError> {
        match policy {
            ExecutionPolicy::Serial => Ok(Self::serial()),
            ExecutionPolicy::Parallel => Self::parallel(threads.unwrap_or_else(hardware_concurrency)),
        }
    }

    /// The configured policy.
    #[inline]
    pub fn policy(&self) -> ExecutionPolicy {
        self.policy
    }

    /// Number of worker threads (1 for serial contexts).
    pub fn threads(&self) -> usize {
        self.pool
            .as_ref()
            .map_or(1, |pool| pool.current_num_threads())
    }

    /// Whether loops should take the data-parallel path.
    #[inline]
    pub fn is_parallel(&self) -> bool {
        self.pool.is_some()
    }

    /// Run `op` inside this context's pool (or directly when serial).
    pub fn install<R, F>(&self, op: F) -> R
    where
        R: Send,
        F: FnOnce() -> R + Send,
    {
        match &self.pool {
            Some(pool) => pool.install(op),
            None => op(),
        }
    }
}
