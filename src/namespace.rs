//! Namespaces of rebindable callables
//!
//! A [`Namespace`] is an explicit registry standing in for a module: named
//! members that can be enumerated and replaced through one controlled
//! operation ([`Namespace::replace`]). Calls made through
//! [`Namespace::call`] or [`Instance::call_method`] look the member up at call
//! time, so a rebinding performed by the binder is seen by every later call.

use crate::callable::{CallError, CallResult, Callable, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

/// Entry of a namespace
#[derive(Clone, Debug)]
pub enum Member {
    Function(Callable),
    Class(Arc<Class>),
    Namespace(Arc<Namespace>),
}

/// Named collection of members
pub struct Namespace {
    name: String,
    members: RwLock<BTreeMap<String, Member>>,
}

impl Namespace {
    pub fn new(name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            members: RwLock::default(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Add or overwrite a member
    pub fn define(&self, name: impl Into<String>, member: Member) {
        self.members
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.into(), member);
    }

    /// Add a function under its own name
    pub fn define_fn(&self, callable: Callable) {
        self.define(callable.name().to_string(), Member::Function(callable));
    }

    /// Replace an existing member, returning the previous one
    ///
    /// Unknown names are left untouched and yield `None`.
    pub fn replace(&self, name: &str, member: Member) -> Option<Member> {
        let mut members = self.members.write().unwrap_or_else(PoisonError::into_inner);
        members
            .get_mut(name)
            .map(|slot| std::mem::replace(slot, member))
    }

    pub fn get(&self, name: &str) -> Option<Member> {
        self.members
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    /// Current binding of a function member
    pub fn function(&self, name: &str) -> Option<Callable> {
        match self.get(name) {
            Some(Member::Function(callable)) => Some(callable),
            _ => None,
        }
    }

    pub fn class(&self, name: &str) -> Option<Arc<Class>> {
        match self.get(name) {
            Some(Member::Class(class)) => Some(class),
            _ => None,
        }
    }

    /// Call a function member through its current binding
    pub fn call(&self, name: &str, args: &[Value]) -> CallResult {
        let callable = self
            .function(name)
            .ok_or_else(|| CallError::UnknownAttribute {
                owner: self.name.clone(),
                name: name.to_string(),
            })?;
        callable.call(args)
    }

    /// All members in name order
    pub fn members(&self) -> Vec<(String, Member)> {
        self.members
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(name, member)| (name.clone(), member.clone()))
            .collect()
    }
}

impl fmt::Debug for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Members may link back to this namespace, so only names are printed
        let members = self.members.read().unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("Namespace")
            .field("name", &self.name)
            .field("members", &members.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Method table shared by instances
#[derive(Debug)]
pub struct Class {
    name: String,
    methods: RwLock<BTreeMap<String, Callable>>,
}

impl Class {
    pub fn new(name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            methods: RwLock::default(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Add a method; its first argument is the receiver
    pub fn define_method(&self, callable: Callable) {
        self.methods
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(callable.name().to_string(), callable);
    }

    pub fn method(&self, name: &str) -> Option<Callable> {
        self.methods
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    /// Replace an existing method, returning the previous one
    pub fn replace_method(&self, name: &str, callable: Callable) -> Option<Callable> {
        let mut methods = self.methods.write().unwrap_or_else(PoisonError::into_inner);
        methods
            .get_mut(name)
            .map(|slot| std::mem::replace(slot, callable))
    }

    /// All methods in name order
    pub fn methods(&self) -> Vec<(String, Callable)> {
        self.methods
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(name, callable)| (name.clone(), callable.clone()))
            .collect()
    }

    pub fn instantiate(self: &Arc<Self>) -> Value {
        Value::Instance(Arc::new(Instance {
            class: Arc::clone(self),
            fields: Mutex::default(),
        }))
    }
}

/// Object whose methods are looked up on its class
pub struct Instance {
    class: Arc<Class>,
    fields: Mutex<BTreeMap<String, Value>>,
}

impl Instance {
    pub fn class(&self) -> &Arc<Class> {
        &self.class
    }

    pub fn get_field(&self, name: &str) -> Option<Value> {
        self.fields
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    pub fn set_field(&self, name: impl Into<String>, value: Value) {
        self.fields
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.into(), value);
    }

    /// Call a method with `self` bound as the receiver
    pub fn call_method(self: &Arc<Self>, name: &str, args: &[Value]) -> CallResult {
        let method = self
            .class
            .method(name)
            .ok_or_else(|| CallError::UnknownAttribute {
                owner: self.class.name.clone(),
                name: name.to_string(),
            })?;
        method.bind(Value::Instance(Arc::clone(self))).call(args)
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("class", &self.class.name)
            .finish_non_exhaustive()
    }
}

/// Top-level namespaces addressable by name
#[derive(Debug, Default)]
pub struct ModuleRegistry {
    modules: RwLock<BTreeMap<String, Arc<Namespace>>>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a namespace under its own name
    pub fn register(&self, namespace: Arc<Namespace>) {
        self.modules
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(namespace.name().to_string(), namespace);
    }

    pub fn load(&self, name: &str) -> Option<Arc<Namespace>> {
        self.modules
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    pub fn names(&self) -> Vec<String> {
        self.modules
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callable::Arity;

    fn constant(name: &str, n: i64) -> Callable {
        Callable::new(name, Arity::Exact(0), move |_| Ok(Value::Int(n)))
    }

    #[test]
    fn test_define_and_call() {
        let ns = Namespace::new("math");
        ns.define_fn(constant("one", 1));
        assert_eq!(ns.call("one", &[]).unwrap(), Value::Int(1));
    }

    #[test]
    fn test_call_unknown_member() {
        let ns = Namespace::new("math");
        let err = ns.call("missing", &[]).unwrap_err();
        assert!(matches!(err, CallError::UnknownAttribute { .. }));
        assert_eq!(err.to_string(), "`math` has no attribute `missing`");
    }

    #[test]
    fn test_replace_is_visible_to_late_bound_calls() {
        let ns = Namespace::new("math");
        ns.define_fn(constant("value", 1));

        let previous = ns.replace("value", Member::Function(constant("value", 2)));

        assert!(matches!(previous, Some(Member::Function(_))));
        assert_eq!(ns.call("value", &[]).unwrap(), Value::Int(2));
    }

    #[test]
    fn test_replace_unknown_name_is_noop() {
        let ns = Namespace::new("math");
        assert!(ns.replace("nope", Member::Function(constant("nope", 0))).is_none());
        assert!(ns.get("nope").is_none());
    }

    #[test]
    fn test_members_sorted_by_name() {
        let ns = Namespace::new("m");
        ns.define_fn(constant("zeta", 0));
        ns.define_fn(constant("alpha", 0));
        let names: Vec<_> = ns.members().into_iter().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["alpha", "zeta"]);
    }

    #[test]
    fn test_instance_method_receives_receiver() {
        let class = Class::new("Counter");
        class.define_method(Callable::new("bump", Arity::Exact(2), |args| {
            let receiver = args[0]
                .as_instance()
                .ok_or_else(|| CallError::mismatch("receiver must be an instance"))?;
            let by = Value::int_arg(args, 1)?;
            let current = receiver
                .get_field("count")
                .and_then(|v| v.as_int())
                .unwrap_or(0);
            receiver.set_field("count", Value::Int(current + by));
            Ok(Value::Int(current + by))
        }));

        let value = class.instantiate();
        let instance = value.as_instance().unwrap();
        instance.call_method("bump", &[Value::Int(2)]).unwrap();
        let result = instance.call_method("bump", &[Value::Int(3)]).unwrap();

        assert_eq!(result, Value::Int(5));
        assert_eq!(instance.get_field("count"), Some(Value::Int(5)));
    }

    #[test]
    fn test_registry_load() {
        let registry = ModuleRegistry::new();
        registry.register(Namespace::new("app"));
        assert!(registry.load("app").is_some());
        assert!(registry.load("other").is_none());
        assert_eq!(registry.names(), vec!["app".to_string()]);
    }
}
