//! # Lexical Scope Chain
//!
//! A scope is a map from name to [`Binding`] plus a strong link to its
//! parent. Closures capture the scope they were declared in by cloning the
//! `Rc`, so the chain outlives any single call frame that happens to hold
//! it — exactly the "shared, not by value" capture semantics in
//! `SPEC_FULL.md` §3 ("Runtime values and cells").
//!
//! `let` bindings are cells (`mutable: true`) that `assign` updates in
//! place; `const` bindings reject reassignment. This is what makes the
//! stdlib's accumulator-style loops (`euclidean`, `phrase`) work: a closure
//! that captures an enclosing `let` sees later mutations.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use super::value::RuntimeValue;
use crate::error::EvalError;

pub struct Binding {
    pub value: RuntimeValue,
    pub mutable: bool,
}

pub struct ScopeData {
    bindings: RefCell<HashMap<String, Binding>>,
    parent: Option<Scope>,
}

/// Scopes are always referenced through `Rc`; cloning a `Scope` clones the
/// pointer, not the bindings.
pub type Scope = Rc<ScopeData>;

pub fn root_scope() -> Scope {
    Rc::new(ScopeData { bindings: RefCell::new(HashMap::new()), parent: None })
}

pub fn child_scope(parent: &Scope) -> Scope {
    Rc::new(ScopeData { bindings: RefCell::new(HashMap::new()), parent: Some(Rc::clone(parent)) })
}

impl ScopeData {
    pub fn declare(&self, name: &str, value: RuntimeValue, mutable: bool) {
        self.bindings.borrow_mut().insert(name.to_string(), Binding { value, mutable });
    }

    pub fn get(&self, name: &str) -> Option<RuntimeValue> {
        if let Some(binding) = self.bindings.borrow().get(name) {
            return Some(binding.value.clone());
        }
        self.parent.as_ref().and_then(|p| p.get(name))
    }

    /// Walks up to the nearest binding named `name` and overwrites its
    /// value in place. Fails on an immutable (`const`) binding or an
    /// unbound name — both are programmer errors the checker should
    /// already have flagged, but the evaluator enforces them too.
    pub fn assign(&self, name: &str, value: RuntimeValue) -> Result<(), EvalError> {
        if let Some(binding) = self.bindings.borrow_mut().get_mut(name) {
            if !binding.mutable {
                return Err(EvalError::InvalidOperation {
                    message: format!("cannot assign to immutable binding '{}'", name),
                });
            }
            binding.value = value;
            return Ok(());
        }
        match &self.parent {
            Some(parent) => parent.assign(name, value),
            None => Err(EvalError::InvalidOperation {
                message: format!("undefined binding '{}'", name),
            }),
        }
    }
}
