//! Live chain of nested wrapped calls on one thread

use crate::identity::FunctionIdentity;
use std::time::Instant;
use thiserror::Error;

/// Popped a frame that was never pushed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("call stack underflow: pop without matching push")]
pub struct EmptyStackError;

/// One active wrapped call
#[derive(Debug, Clone)]
pub struct CallStackFrame {
    pub id: FunctionIdentity,
    pub start: Instant,
}

/// Ordered frames of the calls currently executing, outermost first
#[derive(Debug, Default)]
pub struct CallStack {
    frames: Vec<CallStackFrame>,
}

impl CallStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, id: FunctionIdentity, start: Instant) {
        self.frames.push(CallStackFrame { id, start });
    }

    /// Remove the most recently pushed frame
    pub fn pop(&mut self) -> Result<CallStackFrame, EmptyStackError> {
        self.frames.pop().ok_or(EmptyStackError)
    }

    /// Frames still active, outermost first
    ///
    /// Called right after popping a completed call, these are exactly its
    /// live ancestors.
    pub fn active_frames(&self) -> &[CallStackFrame] {
        &self.frames
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(name: &str) -> FunctionIdentity {
        FunctionIdentity::new(name, "stack.rs", 1)
    }

    #[test]
    fn test_push_pop_is_lifo() {
        let mut stack = CallStack::new();
        stack.push(id("outer"), Instant::now());
        stack.push(id("inner"), Instant::now());

        assert_eq!(stack.depth(), 2);
        assert_eq!(stack.pop().unwrap().id, id("inner"));
        assert_eq!(stack.pop().unwrap().id, id("outer"));
        assert!(stack.is_empty());
    }

    #[test]
    fn test_pop_empty_fails() {
        let mut stack = CallStack::new();
        assert_eq!(stack.pop().unwrap_err(), EmptyStackError);
    }

    #[test]
    fn test_active_frames_excludes_popped_call() {
        let mut stack = CallStack::new();
        stack.push(id("a"), Instant::now());
        stack.push(id("b"), Instant::now());
        stack.push(id("c"), Instant::now());
        stack.pop().unwrap();

        let names: Vec<_> = stack.active_frames().iter().map(|f| f.id.name()).collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn test_recursive_frames_are_kept_separately() {
        let mut stack = CallStack::new();
        stack.push(id("fib"), Instant::now());
        stack.push(id("fib"), Instant::now());
        assert_eq!(stack.depth(), 2);
    }
}
