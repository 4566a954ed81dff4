use crate::value::Value;
use std::{cell::RefCell, collections::HashMap, fmt, rc::Rc};

struct Frame {
    bindings: RefCell<HashMap<String, Value>>,
    outer: Option<Scope>,
}

/// A shared handle to one level of the lexical scope chain.
///
/// Cloning the handle does not copy bindings: closures hold a clone of their
/// defining scope and observe definitions made in it after they were created.
#[derive(Clone)]
pub struct Scope(Rc<Frame>);

impl Scope {
    pub fn new() -> Self {
        Scope(Rc::new(Frame {
            bindings: RefCell::new(HashMap::new()),
            outer: None,
        }))
    }

    /// A fresh child scope whose lookups fall back to `self`.
    pub fn enclosed(&self) -> Self {
        Scope(Rc::new(Frame {
            bindings: RefCell::new(HashMap::new()),
            outer: Some(self.clone()),
        }))
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        let mut scope = Some(self);
        while let Some(current) = scope {
            if let Some(value) = current.0.bindings.borrow().get(name) {
                return Some(value.clone());
            }
            scope = current.0.outer.as_ref();
        }
        None
    }

    /// Binds `name` in this scope only; outer scopes are never written.
    pub fn set(&self, name: impl Into<String>, value: Value) {
        self.0.bindings.borrow_mut().insert(name.into(), value);
    }

    pub fn contains_local(&self, name: &str) -> bool {
        self.0.bindings.borrow().contains_key(name)
    }

    pub fn depth(&self) -> usize {
        let mut depth = 0;
        let mut scope = self.0.outer.as_ref();
        while let Some(current) = scope {
            depth += 1;
            scope = current.0.outer.as_ref();
        }
        depth
    }

}

impl Default for Scope {
    fn default() -> Self {
        Scope::new()
    }
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<String> = self.0.bindings.borrow().keys().cloned().collect();
        names.sort();
        f.debug_struct("Scope")
            .field("names", &names)
            .field("depth", &self.depth())
            .finish()
    }
}
