//! Call interception and timing
//!
//! The [`Interceptor`] times calls and folds the measurements into a shared
//! [`StatsStore`]. Each OS thread gets its own [`CallStack`] so nested calls
//! attribute cumulative time only to their own ancestors.
//!
//! Two entry points share the same bookkeeping:
//! - [`Interceptor::wrap`] / [`Interceptor::invoke`] for dynamic [`Callable`]s
//! - [`Interceptor::enter`] / [`Interceptor::measure`] for plain Rust closures
//!
//! Bookkeeping for one call:
//!
//! ```text
//! enter:   start = now; push (id, start)
//! body:    run the callable
//! finish:  elapsed = now - start; pop
//!          stats[id]: count += 1, total += elapsed, min/max
//!          for frame in remaining frames: stats[frame].cumulative += elapsed
//! ```
//!
//! `finish` runs from the guard's `Drop`, so it also happens when the body
//! returns an error or panics.

use crate::call_stack::{CallStack, EmptyStackError};
use crate::callable::{CallError, CallResult, Callable, Value};
use crate::identity::FunctionIdentity;
use crate::stats::StatsStore;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};
use tracing::{debug, error, trace, warn};

/// Times calls and records them into a [`StatsStore`]
#[derive(Debug, Default)]
pub struct Interceptor {
    store: Arc<StatsStore>,
    stacks: Mutex<HashMap<ThreadId, CallStack>>,
}

impl Interceptor {
    /// Create an interceptor with a fresh statistics store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an interceptor recording into an existing store
    pub fn with_store(store: Arc<StatsStore>) -> Self {
        Self {
            store,
            stacks: Mutex::default(),
        }
    }

    pub fn stats(&self) -> &StatsStore {
        &self.store
    }

    pub fn store(&self) -> Arc<StatsStore> {
        Arc::clone(&self.store)
    }

    /// Number of wrapped calls active on the current thread
    pub fn depth(&self) -> usize {
        self.lock_stacks()
            .get(&thread::current().id())
            .map_or(0, CallStack::depth)
    }

    /// Start timing a call; the returned guard finishes it
    pub fn enter(&self, id: FunctionIdentity) -> CallGuard<'_> {
        let start = Instant::now();
        trace!(function = %id, "push");
        self.lock_stacks()
            .entry(thread::current().id())
            .or_default()
            .push(id.clone(), start);

        CallGuard {
            interceptor: self,
            id,
            start,
            finished: false,
        }
    }

    /// Time a closure under `id`
    ///
    /// # Example
    /// ```
    /// use callprof::identity::FunctionIdentity;
    /// use callprof::interceptor::Interceptor;
    ///
    /// let interceptor = Interceptor::new();
    /// let id = FunctionIdentity::here("square");
    /// let result = interceptor.measure(id.clone(), || 7 * 7);
    ///
    /// assert_eq!(result, 49);
    /// assert_eq!(interceptor.stats().get(&id).unwrap().call_count, 1);
    /// ```
    pub fn measure<F, R>(&self, id: FunctionIdentity, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        let guard = self.enter(id);
        let result = f();
        guard.finish();
        result
    }

    /// Invoke `callable` with timing
    ///
    /// An argument mismatch is degraded to [`Value::Degraded`]; every other
    /// error is returned unchanged after the call has been recorded.
    pub fn invoke(&self, callable: &Callable, args: &[Value]) -> CallResult {
        let guard = self.enter(callable.identity().clone());
        let result = match callable.call(args) {
            Err(CallError::ArgumentMismatch { reason }) => {
                debug!(function = %callable.identity(), %reason, "degraded call");
                Ok(Value::Degraded)
            }
            other => other,
        };
        guard.finish();
        result
    }

    /// Produce a timed wrapper around `callable`
    ///
    /// Already-instrumented callables are returned unchanged, so wrapping is
    /// idempotent.
    pub fn wrap(self: &Arc<Self>, callable: Callable) -> Callable {
        if callable.is_instrumented() {
            debug!(function = %callable.identity(), "already instrumented");
            return callable;
        }

        let interceptor = Arc::clone(self);
        let identity = callable.identity().clone();
        Callable::instrumented(identity, move |args| interceptor.invoke(&callable, args))
    }

    fn lock_stacks(&self) -> MutexGuard<'_, HashMap<ThreadId, CallStack>> {
        self.stacks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn finish_call(&self, id: &FunctionIdentity, start: Instant) -> Duration {
        let elapsed = start.elapsed();
        let thread = thread::current().id();

        let ancestors: Vec<FunctionIdentity> = {
            let mut stacks = self.lock_stacks();
            let Some(stack) = stacks.get_mut(&thread) else {
                drop(stacks);
                stack_violation(EmptyStackError, id);
                return elapsed;
            };
            match stack.pop() {
                Ok(frame) if frame.id != *id => {
                    warn!(expected = %id, popped = %frame.id, "call guards finished out of order");
                }
                Ok(_) => {}
                Err(err) => {
                    drop(stacks);
                    stack_violation(err, id);
                    return elapsed;
                }
            }
            let ancestors = stack
                .active_frames()
                .iter()
                .map(|frame| frame.id.clone())
                .collect();
            if stack.is_empty() {
                stacks.remove(&thread);
            }
            ancestors
        };
        trace!(function = %id, elapsed_us = elapsed.as_micros() as u64, "pop");

        self.store.get_or_create(id).record_call(elapsed);
        for ancestor in &ancestors {
            self.store.get_or_create(ancestor).add_cumulative(elapsed);
        }

        elapsed
    }
}

fn stack_violation(err: EmptyStackError, id: &FunctionIdentity) {
    if thread::panicking() {
        error!(function = %id, "{}", err);
    } else {
        panic!("{} (finishing {})", err, id);
    }
}

/// Scope guard for one timed call
///
/// Finishing (explicitly or on drop) pops the frame and records the
/// measurement.
#[must_use = "dropping the guard immediately ends the timed call"]
#[derive(Debug)]
pub struct CallGuard<'a> {
    interceptor: &'a Interceptor,
    id: FunctionIdentity,
    start: Instant,
    finished: bool,
}

impl CallGuard<'_> {
    pub fn id(&self) -> &FunctionIdentity {
        &self.id
    }

    /// End the call and return its elapsed time
    pub fn finish(mut self) -> Duration {
        self.finished = true;
        self.interceptor.finish_call(&self.id, self.start)
    }
}

impl Drop for CallGuard<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.interceptor.finish_call(&self.id, self.start);
        }
    }
}
