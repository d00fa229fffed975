//! The template data context: a stack of name/value scopes.

use std::cell::RefCell;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::value::Value;

/// A single scope frame.
pub type Frame = IndexMap<String, Value>;

/// A stack of scopes with shadowing semantics.
///
/// Lookup walks from the innermost frame outward; the first match wins.
/// Directives push a scope around their body and pop it afterwards, so a
/// `Context` is shared by handle (cloning is cheap) and mutated through
/// interior mutability — one render owns one context.
///
/// Two keys are reserved for the engine: `_match_templates` holds the
/// active match templates and `_choose` the state of the innermost choose
/// block. Callers must not touch either.
#[derive(Debug, Clone)]
pub struct Context {
    frames: Rc<RefCell<Vec<Frame>>>,
}

impl Context {
    pub fn new() -> Self {
        Context {
            frames: Rc::new(RefCell::new(vec![Frame::new()])),
        }
    }

    /// Pushes a new innermost frame.
    pub fn push(&self, frame: Frame) {
        self.frames.borrow_mut().push(frame);
    }

    /// Pops the innermost frame. Popping an empty stack is a programmer
    /// error.
    pub fn pop(&self) {
        let popped = self.frames.borrow_mut().pop();
        debug_assert!(popped.is_some(), "pop from empty context stack");
    }

    /// Looks a name up, innermost frame first.
    pub fn get(&self, name: &str) -> Option<Value> {
        let frames = self.frames.borrow();
        frames.iter().rev().find_map(|frame| frame.get(name).cloned())
    }

    /// Sets a name in the innermost frame.
    pub fn set(&self, name: impl Into<String>, value: impl Into<Value>) {
        let mut frames = self.frames.borrow_mut();
        if let Some(top) = frames.last_mut() {
            top.insert(name.into(), value.into());
        }
    }

    pub fn depth(&self) -> usize {
        self.frames.borrow().len()
    }
}

impl Default for Context {
    fn default() -> Self {
        Context::new()
    }
}
