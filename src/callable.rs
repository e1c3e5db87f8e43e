//! Dynamically-typed callables that the profiler can wrap and rebind
//!
//! Every callable takes a slice of [`Value`]s and returns a [`CallResult`].
//! Arity is checked before the body runs, so calling with the wrong number
//! of arguments surfaces as [`CallError::ArgumentMismatch`], the one failure
//! kind the interceptor degrades instead of propagating.

use crate::identity::FunctionIdentity;
use crate::namespace::Instance;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Result of invoking a [`Callable`]
pub type CallResult = Result<Value, CallError>;

type Body = dyn Fn(&[Value]) -> CallResult + Send + Sync;

/// Failure raised by a callable
#[derive(Debug, Error)]
pub enum CallError {
    /// Arguments incompatible with the callable's signature
    #[error("argument mismatch: {reason}")]
    ArgumentMismatch { reason: String },

    /// Lookup of a member that does not exist
    #[error("`{owner}` has no attribute `{name}`")]
    UnknownAttribute { owner: String, name: String },

    /// Any other failure raised by the callable body
    #[error(transparent)]
    Failed(#[from] anyhow::Error),
}

impl CallError {
    pub fn mismatch(reason: impl Into<String>) -> Self {
        Self::ArgumentMismatch {
            reason: reason.into(),
        }
    }

    pub fn is_argument_mismatch(&self) -> bool {
        matches!(self, Self::ArgumentMismatch { .. })
    }
}

/// Value passed to and returned from callables
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Unit,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Value>),
    Instance(Arc<Instance>),
    /// Sentinel produced when a call degraded on an argument mismatch
    Degraded,
}

impl Value {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(x) => Some(*x),
            Value::Int(n) => Some(*n as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_instance(&self) -> Option<&Arc<Instance>> {
        match self {
            Value::Instance(instance) => Some(instance),
            _ => None,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Value::Degraded)
    }

    /// Short type name used in mismatch messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Unit => "unit",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::List(_) => "list",
            Value::Instance(_) => "instance",
            Value::Degraded => "degraded",
        }
    }

    /// Extract an integer argument or fail with an argument mismatch
    pub fn int_arg(args: &[Value], index: usize) -> Result<i64, CallError> {
        match args.get(index) {
            Some(Value::Int(n)) => Ok(*n),
            Some(other) => Err(CallError::mismatch(format!(
                "argument {} must be int, not {}",
                index,
                other.type_name()
            ))),
            None => Err(CallError::mismatch(format!("missing argument {}", index))),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Unit, Value::Unit) | (Value::Degraded, Value::Degraded) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Instance(a), Value::Instance(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Unit => write!(f, "()"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(n) => write!(f, "{}", n),
            Value::Float(x) => write!(f, "{}", x),
            Value::Str(s) => write!(f, "{:?}", s),
            Value::List(items) => f.debug_list().entries(items).finish(),
            Value::Instance(instance) => write!(f, "<{} instance>", instance.class().name()),
            Value::Degraded => write!(f, "<degraded>"),
        }
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

/// Number of arguments a callable accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Exact(usize),
    Variadic,
}

impl Arity {
    fn accepts(self, count: usize) -> bool {
        match self {
            Arity::Exact(n) => n == count,
            Arity::Variadic => true,
        }
    }
}

/// A named, shareable callable
///
/// Cloning is cheap: the body is reference-counted.
#[derive(Clone)]
pub struct Callable {
    identity: FunctionIdentity,
    arity: Arity,
    body: Arc<Body>,
    instrumented: bool,
}

impl Callable {
    /// Create a callable whose identity points at the caller's source location
    #[track_caller]
    pub fn new<F>(name: &str, arity: Arity, body: F) -> Self
    where
        F: Fn(&[Value]) -> CallResult + Send + Sync + 'static,
    {
        Self::with_identity(FunctionIdentity::here(name), arity, body)
    }

    pub fn with_identity<F>(identity: FunctionIdentity, arity: Arity, body: F) -> Self
    where
        F: Fn(&[Value]) -> CallResult + Send + Sync + 'static,
    {
        Self {
            identity,
            arity,
            body: Arc::new(body),
            instrumented: false,
        }
    }

    /// Build the wrapper produced by the interceptor
    pub(crate) fn instrumented<F>(identity: FunctionIdentity, body: F) -> Self
    where
        F: Fn(&[Value]) -> CallResult + Send + Sync + 'static,
    {
        // Wrappers accept any arguments; the wrapped callable checks its own arity
        Self {
            identity,
            arity: Arity::Variadic,
            body: Arc::new(body),
            instrumented: true,
        }
    }

    pub fn identity(&self) -> &FunctionIdentity {
        &self.identity
    }

    pub fn name(&self) -> &str {
        self.identity.name()
    }

    pub fn arity(&self) -> Arity {
        self.arity
    }

    /// Whether this callable was produced by the interceptor
    pub fn is_instrumented(&self) -> bool {
        self.instrumented
    }

    /// Invoke the callable
    pub fn call(&self, args: &[Value]) -> CallResult {
        if !self.arity.accepts(args.len()) {
            let expected = match self.arity {
                Arity::Exact(n) => n,
                Arity::Variadic => args.len(),
            };
            return Err(CallError::mismatch(format!(
                "{}() takes {} argument(s) but {} were given",
                self.name(),
                expected,
                args.len()
            )));
        }
        (self.body)(args)
    }

    /// Bind a receiver as the first argument
    ///
    /// The bound callable keeps the identity and instrumentation marker of
    /// `self`, so binding a wrapped method still records into the method's
    /// statistics bucket.
    pub fn bind(&self, receiver: Value) -> Callable {
        let inner = self.clone();
        let arity = match self.arity {
            Arity::Exact(n) => Arity::Exact(n.saturating_sub(1)),
            Arity::Variadic => Arity::Variadic,
        };
        Callable {
            identity: self.identity.clone(),
            arity,
            body: Arc::new(move |args: &[Value]| {
                let mut full = Vec::with_capacity(args.len() + 1);
                full.push(receiver.clone());
                full.extend_from_slice(args);
                inner.call(&full)
            }),
            instrumented: self.instrumented,
        }
    }
}

impl fmt::Debug for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callable")
            .field("identity", &self.identity)
            .field("arity", &self.arity)
            .field("instrumented", &self.instrumented)
            .finish()
    }
}
