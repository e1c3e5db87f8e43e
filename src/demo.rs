//! Built-in demo workloads for the command line
//!
//! The `demo` namespace exercises every profiler path: nested and recursive
//! calls, class methods, a nested namespace that links back to its parent,
//! and a call with mismatched arguments.
//!
//! ```text
//! demo.main
//!   ├── slow / medium / fast
//!   ├── recurse(3) → recurse(2) → recurse(1) → recurse(0)
//!   ├── Worker.process(self, 3) → Worker.step(self) ×3
//!   ├── util.checksum([..])
//!   └── fast(1)   (wrong arity, degraded)
//! ```

use crate::callable::{Arity, CallError, CallResult, Callable, Value};
use crate::namespace::{Class, Member, ModuleRegistry, Namespace};
use anyhow::anyhow;
use std::sync::{Arc, Weak};
use std::thread;
use std::time::Duration;

pub const SLOW_MS: u64 = 50;
pub const MEDIUM_MS: u64 = 20;
pub const FAST_MS: u64 = 5;
const STEP_MS: u64 = 1;

fn call_in(namespace: &Weak<Namespace>, name: &str, args: &[Value]) -> CallResult {
    let namespace = namespace
        .upgrade()
        .ok_or_else(|| anyhow!("namespace dropped before `{}` was called", name))?;
    namespace.call(name, args)
}

#[track_caller]
fn sleeper(name: &str, millis: u64) -> Callable {
    Callable::new(name, Arity::Exact(0), move |_| {
        thread::sleep(Duration::from_millis(millis));
        Ok(Value::Unit)
    })
}

fn worker_class() -> Arc<Class> {
    let class = Class::new("Worker");

    class.define_method(Callable::new("step", Arity::Exact(1), |_| {
        thread::sleep(Duration::from_millis(STEP_MS));
        Ok(Value::Unit)
    }));

    class.define_method(Callable::new("process", Arity::Exact(2), |args| {
        let worker = args[0]
            .as_instance()
            .ok_or_else(|| anyhow!("process() called without a Worker receiver"))?;
        let jobs = Value::int_arg(args, 1)?;
        for _ in 0..jobs {
            worker.call_method("step", &[])?;
        }
        worker.set_field("processed", Value::Int(jobs));
        Ok(Value::Int(jobs))
    }));

    class
}

fn util_namespace(parent: &Arc<Namespace>) -> Arc<Namespace> {
    let util = Namespace::new("util");

    util.define_fn(Callable::new("checksum", Arity::Exact(1), |args| match &args[0] {
        Value::List(items) => {
            let sum = items.iter().filter_map(Value::as_int).sum::<i64>();
            Ok(Value::Int(sum))
        }
        other => Err(CallError::mismatch(format!(
            "checksum() expects a list, not {}",
            other.type_name()
        ))),
    }));

    // Back-reference: binding must not loop forever
    util.define("parent", Member::Namespace(Arc::clone(parent)));
    util
}

/// Build the `demo` namespace
pub fn demo_namespace() -> Arc<Namespace> {
    let demo = Namespace::new("demo");
    let weak = Arc::downgrade(&demo);

    demo.define_fn(sleeper("slow", SLOW_MS));
    demo.define_fn(sleeper("medium", MEDIUM_MS));
    demo.define_fn(sleeper("fast", FAST_MS));

    let this = weak.clone();
    demo.define_fn(Callable::new("recurse", Arity::Exact(1), move |args| {
        let depth = Value::int_arg(args, 0)?;
        thread::sleep(Duration::from_millis(STEP_MS));
        if depth > 0 {
            call_in(&this, "recurse", &[Value::Int(depth - 1)])?;
        }
        Ok(Value::Int(depth))
    }));

    demo.define("Worker", Member::Class(worker_class()));
    demo.define("util", Member::Namespace(util_namespace(&demo)));

    let this = weak;
    demo.define_fn(Callable::new("main", Arity::Exact(0), move |_| {
        call_in(&this, "slow", &[])?;
        call_in(&this, "medium", &[])?;
        call_in(&this, "fast", &[])?;
        call_in(&this, "recurse", &[Value::Int(3)])?;

        let namespace = this
            .upgrade()
            .ok_or_else(|| anyhow!("demo namespace dropped"))?;
        let worker = namespace
            .class("Worker")
            .ok_or_else(|| anyhow!("demo.Worker missing"))?
            .instantiate();
        if let Some(worker) = worker.as_instance() {
            worker.call_method("process", &[Value::Int(3)])?;
        }

        let util = match namespace.get("util") {
            Some(Member::Namespace(util)) => util,
            _ => return Err(anyhow!("demo.util missing").into()),
        };
        let samples = Value::List(vec![Value::Int(1), Value::Int(2), Value::Int(3)]);
        let checksum = util.call("checksum", &[samples])?;

        // Wrong arity: degraded to a sentinel once instrumented
        call_in(&this, "fast", &[Value::Int(1)])?;

        Ok(checksum)
    }));

    demo
}

/// Registry holding every built-in demo namespace
pub fn registry() -> ModuleRegistry {
    let registry = ModuleRegistry::new();
    registry.register(demo_namespace());
    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binder::Binder;
    use crate::interceptor::Interceptor;

    #[test]
    fn test_unbound_main_fails_on_arity_mismatch() {
        let demo = demo_namespace();
        let err = demo.call("main", &[]).unwrap_err();
        assert!(err.is_argument_mismatch());
    }

    #[test]
    fn test_bound_main_runs_and_records() {
        let demo = demo_namespace();
        let interceptor = Arc::new(Interceptor::new());
        let binder = Binder::new(Arc::clone(&interceptor));

        let report = binder.bind(&demo);
        let result = demo.call("main", &[]).unwrap();

        assert_eq!(result, Value::Int(6));
        assert_eq!(report.namespaces, 2);
        let stats = interceptor.stats();
        assert_eq!(stats.find_by_name("recurse").unwrap().1.call_count, 4);
        assert_eq!(stats.find_by_name("step").unwrap().1.call_count, 3);
        assert_eq!(stats.find_by_name("fast").unwrap().1.call_count, 2);
        assert_eq!(stats.find_by_name("checksum").unwrap().1.call_count, 1);
    }

    #[test]
    fn test_sleepers_identify_their_definition_site() {
        let demo = demo_namespace();
        let slow = demo.function("slow").unwrap();
        let medium = demo.function("medium").unwrap();
        let fast = demo.function("fast").unwrap();

        assert_eq!(slow.identity().file(), file!());
        assert_eq!(medium.identity().line(), slow.identity().line() + 1);
        assert_eq!(fast.identity().line(), slow.identity().line() + 2);
    }

    #[test]
    fn test_registry_contains_demo() {
        assert!(registry().load("demo").is_some());
    }
}
