//! Lexical scopes and the host function namespace
//!
//! A [`Context`] is a stack of [`Scope`] frames. Frame 0 is the global
//! scope and lives as long as the interpreter; blocks and loop iterations
//! push a frame and pop it when they finish. Variables and functions are
//! separate namespaces inside every frame.

use std::collections::HashMap;

use crate::ast::SourceSpan;
use crate::value::{Callable, Value};

/// One frame of bindings
#[derive(Default)]
pub struct Scope {
    variables: HashMap<String, Value>,
    functions: HashMap<String, Callable>,
}

pub struct Context {
    scopes: Vec<Scope>,
}

impl Context {
    pub fn new() -> Self {
        Self {
            scopes: vec![Scope::default()],
        }
    }

    pub fn push_scope(&mut self) {
        self.scopes.push(Scope::default());
    }

    /// Pop the innermost frame; the global frame is never popped
    pub fn pop_scope(&mut self) {
        if self.scopes.len() > 1 {
            self.scopes.pop();
        }
    }

    /// Drop every frame above the global one
    pub fn unwind(&mut self) {
        self.scopes.truncate(1);
    }

    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    /// Bind `name` in the innermost frame, shadowing outer bindings
    pub fn declare(&mut self, name: &str, value: Value) {
        self.current_mut().variables.insert(name.to_string(), value);
    }

    pub fn get_var(&self, name: &str) -> Option<Value> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.variables.get(name))
            .cloned()
    }

    /// Write-through assignment: update the nearest frame that already
    /// binds `name`, otherwise bind it in the innermost frame.
    pub fn assign(&mut self, name: &str, value: Value) {
        if let Some(slot) = self.find_slot(name) {
            *slot = value;
        } else {
            self.declare(name, value);
        }
    }

    /// Like [`Context::assign`], but an unbound name lands in the global frame
    pub fn assign_or_global(&mut self, name: &str, value: Value) {
        if let Some(slot) = self.find_slot(name) {
            *slot = value;
        } else {
            self.scopes[0].variables.insert(name.to_string(), value);
        }
    }

    fn find_slot(&mut self, name: &str) -> Option<&mut Value> {
        self.scopes
            .iter_mut()
            .rev()
            .find_map(|scope| scope.variables.get_mut(name))
    }

    /// Register a callable in the global frame
    pub fn register(&mut self, callable: Callable) {
        self.scopes[0]
            .functions
            .insert(callable.name().to_string(), callable);
    }

    pub fn get_func(&self, name: &str) -> Option<Callable> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.functions.get(name))
            .cloned()
    }

    pub fn function_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .scopes
            .iter()
            .flat_map(|scope| scope.functions.keys().cloned())
            .collect();
        names.sort();
        names.dedup();
        names
    }

    /// Global variables sorted by name
    pub fn globals(&self) -> Vec<(String, Value)> {
        let mut vars: Vec<(String, Value)> = self.scopes[0]
            .variables
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        vars.sort_by(|a, b| a.0.cmp(&b.0));
        vars
    }

    /// Forget every variable, keeping the registered functions
    pub fn clear_variables(&mut self) {
        self.unwind();
        self.scopes[0].variables.clear();
    }

    fn current_mut(&mut self) -> &mut Scope {
        let last = self.scopes.len() - 1;
        &mut self.scopes[last]
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

/// Scope access handed to a callable while it runs
pub struct CallContext<'a> {
    context: &'a mut Context,
    span: SourceSpan,
}

impl<'a> CallContext<'a> {
    pub fn new(context: &'a mut Context, span: SourceSpan) -> Self {
        Self { context, span }
    }

    pub fn get_var(&self, name: &str) -> Option<Value> {
        self.context.get_var(name)
    }

    /// Write-through; a name bound nowhere is created globally so that
    /// `to=` captures outlive the block that issued them.
    pub fn set_var(&mut self, name: &str, value: Value) {
        self.context.assign_or_global(name, value);
    }

    /// Line of the call site, for log records
    pub fn line(&self) -> usize {
        self.span.line
    }
}
