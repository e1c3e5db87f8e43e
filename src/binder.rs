//! Rebinding namespace members to timed wrappers
//!
//! The binder walks a [`Namespace`] tree, asks the [`Interceptor`] for a
//! wrapper around every function and class method the [`FunctionFilter`]
//! accepts, and swaps the wrapper in with [`Namespace::replace`] /
//! [`Class::replace_method`]. Originals are kept in a registry keyed by
//! `(namespace path, member name)`.
//!
//! Already-instrumented callables are skipped, so binding the same tree
//! twice leaves call counts unchanged. Nested namespaces are followed with a
//! visited set keyed by pointer identity, which makes cyclic trees safe.

use crate::callable::Callable;
use crate::filter::FunctionFilter;
use crate::interceptor::Interceptor;
use crate::namespace::{Class, Member, Namespace};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::debug;

/// Counts from one [`Binder::bind`] pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BindReport {
    /// Callables replaced by wrappers
    pub wrapped: usize,
    /// Callables that were already instrumented
    pub skipped: usize,
    /// Callables rejected by the filter
    pub filtered: usize,
    /// Namespaces visited
    pub namespaces: usize,
}

/// Key of an original callable in the binder registry
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BindingKey {
    /// Dotted path of the owning namespace or class
    pub owner: String,
    pub member: String,
}

impl BindingKey {
    pub fn new(owner: impl Into<String>, member: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            member: member.into(),
        }
    }
}

/// Replaces namespace members with interceptor wrappers
#[derive(Debug)]
pub struct Binder {
    interceptor: Arc<Interceptor>,
    filter: FunctionFilter,
    originals: Mutex<HashMap<BindingKey, Callable>>,
}

impl Binder {
    pub fn new(interceptor: Arc<Interceptor>) -> Self {
        Self::with_filter(interceptor, FunctionFilter::all())
    }

    pub fn with_filter(interceptor: Arc<Interceptor>, filter: FunctionFilter) -> Self {
        Self {
            interceptor,
            filter,
            originals: Mutex::default(),
        }
    }

    /// Wrap every eligible callable reachable from `namespace`
    pub fn bind(&self, namespace: &Arc<Namespace>) -> BindReport {
        let mut report = BindReport::default();
        let mut visited = HashSet::new();
        self.bind_namespace(namespace, namespace.name(), &mut visited, &mut report);
        debug!(
            namespace = namespace.name(),
            wrapped = report.wrapped,
            skipped = report.skipped,
            filtered = report.filtered,
            "bind complete"
        );
        report
    }

    /// The callable that was bound at `owner.member` before wrapping
    pub fn original(&self, owner: &str, member: &str) -> Option<Callable> {
        self.originals
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&BindingKey::new(owner, member))
            .cloned()
    }

    /// Number of callables replaced so far
    pub fn bound_count(&self) -> usize {
        self.originals
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn bind_namespace(
        &self,
        namespace: &Arc<Namespace>,
        path: &str,
        visited: &mut HashSet<*const Namespace>,
        report: &mut BindReport,
    ) {
        if !visited.insert(Arc::as_ptr(namespace)) {
            return;
        }
        report.namespaces += 1;

        for (name, member) in namespace.members() {
            match member {
                Member::Function(callable) => {
                    if let Some(wrapper) = self.wrapper_for(&callable, path, &name, report) {
                        namespace.replace(&name, Member::Function(wrapper));
                    }
                }
                Member::Class(class) => {
                    let class_path = format!("{}.{}", path, name);
                    self.bind_class(&class, &class_path, report);
                }
                Member::Namespace(child) => {
                    let child_path = format!("{}.{}", path, name);
                    self.bind_namespace(&child, &child_path, visited, report);
                }
            }
        }
    }

    fn bind_class(&self, class: &Arc<Class>, path: &str, report: &mut BindReport) {
        // Wrapping the unbound method keeps receiver binding at lookup time
        for (name, method) in class.methods() {
            if let Some(wrapper) = self.wrapper_for(&method, path, &name, report) {
                class.replace_method(&name, wrapper);
            }
        }
    }

    fn wrapper_for(
        &self,
        callable: &Callable,
        owner: &str,
        member: &str,
        report: &mut BindReport,
    ) -> Option<Callable> {
        if callable.is_instrumented() {
            report.skipped += 1;
            return None;
        }
        if !self.filter.should_wrap(member) {
            debug!(owner, member, "filtered out");
            report.filtered += 1;
            return None;
        }

        debug!(owner, member, function = %callable.identity(), "wrapping");
        self.originals
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(BindingKey::new(owner, member), callable.clone());
        report.wrapped += 1;
        Some(self.interceptor.wrap(callable.clone()))
    }
}
