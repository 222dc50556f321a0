// src/store/mod.rs

//! Layered metadata store populated by recipe parsing
//!
//! One store instance is created per recipe parse, mutated exclusively by the
//! parser's semantic actions, and handed to the build-graph builder when the
//! parse completes. Besides the variable map it owns the auxiliary
//! collections a recipe contributes: task-ordering constraints, event
//! handlers, exported functions, inherited classes, file-composition
//! directives, and verbatim function bodies.
//!
//! Lookup semantics are the heart of the store: the value of a variable is
//! the fold of its operations across all contributing scopes, ascending by
//! priority, with unconditional assignment as a reset point. Variable
//! references (`${NAME}`) in the folded text are resolved at lookup time,
//! except for immediate assignments, which were expanded against the
//! store's state when they were inserted.

mod value;

pub use value::ValueOp;

use std::collections::BTreeMap;

use tracing::{debug, info};

use crate::db::Backend;
use crate::error::Result;
use value::VariableRecord;

/// Attribute used to mark a variable as exported to the task environment
pub const ATTR_EXPORT: &str = "export";

/// Executor kind of a captured function body
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FuncKind {
    Shell,
    Python,
    Fakeroot,
}

/// A task declaration with optional ordering constraints
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskEntry {
    pub name: String,
    pub before: Option<String>,
    pub after: Option<String>,
}

/// A file-composition directive; `required` distinguishes `require` (missing
/// file is an error) from `include` (missing file is skipped)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncludeEntry {
    pub path: String,
    pub required: bool,
}

/// A captured function body, uninterpreted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FuncBody {
    pub name: Option<String>,
    pub kind: FuncKind,
    pub body: String,
}

/// A python function definition with raw argument and body text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefFunc {
    pub name: String,
    pub args: String,
    pub body: String,
}

/// The per-recipe metadata store
#[derive(Debug, Default)]
pub struct MetadataStore {
    vars: BTreeMap<String, VariableRecord>,
    tasks: Vec<TaskEntry>,
    handlers: Vec<String>,
    export_funcs: Vec<String>,
    inherits: Vec<String>,
    includes: Vec<IncludeEntry>,
    funcs: Vec<FuncBody>,
    defs: Vec<DefFunc>,
    scope_priority: i32,
    next_seq: u64,
}

impl MetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Switch the scope priority under which subsequent operations are
    /// recorded. The base recipe parses at priority 0; included files and
    /// conditional overrides contribute at the priority the caller assigns.
    pub fn enter_scope(&mut self, priority: i32) {
        debug!(priority, "entering scope");
        self.scope_priority = priority;
    }

    /// Priority currently in force
    pub fn scope_priority(&self) -> i32 {
        self.scope_priority
    }

    /// Record an operation against a variable in the current scope
    pub fn insert(&mut self, name: &str, op: ValueOp) {
        self.insert_in_scope(name, op, self.scope_priority);
    }

    /// Record an operation against a variable at an explicit scope priority
    pub fn insert_in_scope(&mut self, name: &str, op: ValueOp, priority: i32) {
        // Immediate assignment is the one place expansion order is
        // observable: resolve references now, against the current state.
        let op = match op {
            ValueOp::AssignImmediate(text) => {
                let expanded = self.expand(&text);
                ValueOp::AssignImmediate(expanded)
            }
            other => other,
        };
        debug!(name, ?op, priority, "insert");
        let seq = self.next_seq;
        self.next_seq += 1;
        self.vars
            .entry(name.to_string())
            .or_default()
            .push_op(priority, seq, op);
    }

    /// Resolve a variable to its effective value: fold across scopes, then
    /// expand remaining references against the current store state.
    pub fn lookup(&mut self, name: &str) -> Option<String> {
        let mut seen = Vec::new();
        self.lookup_with_seen(name, &mut seen)
    }

    /// Drop a variable and everything recorded against it
    pub fn remove(&mut self, name: &str) -> bool {
        self.vars.remove(name).is_some()
    }

    /// Set an attribute on a variable, creating the record if the variable
    /// has no value yet. Replaces any previous value of the attribute in a
    /// single map write.
    pub fn insert_attr(&mut self, name: &str, attr: &str, value: &str) {
        debug!(name, attr, value, "insert attribute");
        self.vars
            .entry(name.to_string())
            .or_default()
            .attributes
            .insert(attr.to_string(), value.to_string());
    }

    pub fn lookup_attr(&self, name: &str, attr: &str) -> Option<&str> {
        self.vars
            .get(name)?
            .attributes
            .get(attr)
            .map(String::as_str)
    }

    pub fn remove_attr(&mut self, name: &str, attr: &str) -> bool {
        self.vars
            .get_mut(name)
            .map(|rec| rec.attributes.remove(attr).is_some())
            .unwrap_or(false)
    }

    /// Mark a variable as exported to the environment of executed tasks
    pub fn mark_exported(&mut self, name: &str) {
        self.insert_attr(name, ATTR_EXPORT, "1");
    }

    pub fn is_exported(&self, name: &str) -> bool {
        self.lookup_attr(name, ATTR_EXPORT).is_some()
    }

    /// Expand `${NAME}` references in `text` against the current state.
    /// Unresolvable references (unknown variable, reference cycle) are left
    /// literal.
    pub fn expand(&mut self, text: &str) -> String {
        let mut seen = Vec::new();
        self.expand_with_seen(text, &mut seen)
    }

    fn lookup_with_seen(&mut self, name: &str, seen: &mut Vec<String>) -> Option<String> {
        if seen.iter().any(|s| s == name) {
            return None;
        }
        let folded = self.vars.get_mut(name)?.folded()?;
        seen.push(name.to_string());
        let expanded = self.expand_with_seen(&folded, seen);
        seen.pop();
        Some(expanded)
    }

    fn expand_with_seen(&mut self, text: &str, seen: &mut Vec<String>) -> String {
        let mut out = String::with_capacity(text.len());
        let mut rest = text;
        while let Some(start) = rest.find("${") {
            out.push_str(&rest[..start]);
            let tail = &rest[start + 2..];
            match tail.find('}') {
                Some(end) => {
                    let name = &tail[..end];
                    match self.lookup_with_seen(name, seen) {
                        Some(value) => out.push_str(&value),
                        None => {
                            out.push_str("${");
                            out.push_str(name);
                            out.push('}');
                        }
                    }
                    rest = &tail[end + 1..];
                }
                None => {
                    // Unterminated reference: keep the text as written.
                    out.push_str(&rest[start..]);
                    rest = "";
                }
            }
        }
        out.push_str(rest);
        out
    }

    // Auxiliary collections, appended by semantic actions.

    pub fn add_task(&mut self, name: String, before: Option<String>, after: Option<String>) {
        debug!(name, ?before, ?after, "add task");
        self.tasks.push(TaskEntry {
            name,
            before,
            after,
        });
    }

    pub fn add_handler(&mut self, name: String) {
        debug!(name, "add handler");
        self.handlers.push(name);
    }

    pub fn add_export_func(&mut self, name: String) {
        debug!(name, "add exported function");
        self.export_funcs.push(name);
    }

    pub fn add_inherit(&mut self, name: String) {
        debug!(name, "add inherit");
        self.inherits.push(name);
    }

    pub fn add_include(&mut self, path: String, required: bool) {
        debug!(path, required, "add include");
        self.includes.push(IncludeEntry { path, required });
    }

    pub fn add_func(&mut self, name: Option<String>, kind: FuncKind, body: String) {
        debug!(?name, ?kind, bytes = body.len(), "add function body");
        self.funcs.push(FuncBody { name, kind, body });
    }

    pub fn add_def(&mut self, name: String, args: String, body: String) {
        debug!(name, args, bytes = body.len(), "add python def");
        self.defs.push(DefFunc { name, args, body });
    }

    pub fn tasks(&self) -> &[TaskEntry] {
        &self.tasks
    }

    pub fn handlers(&self) -> &[String] {
        &self.handlers
    }

    pub fn export_funcs(&self) -> &[String] {
        &self.export_funcs
    }

    pub fn inherits(&self) -> &[String] {
        &self.inherits
    }

    pub fn includes(&self) -> &[IncludeEntry] {
        &self.includes
    }

    pub fn funcs(&self) -> &[FuncBody] {
        &self.funcs
    }

    pub fn defs(&self) -> &[DefFunc] {
        &self.defs
    }

    /// Names of all variables with at least one operation or attribute
    pub fn var_names(&self) -> impl Iterator<Item = &str> {
        self.vars.keys().map(String::as_str)
    }

    /// Flush the store's expanded variables and attributes to a persistent
    /// backend under `recipe`. Variable rows are written in one transaction;
    /// a failure rolls the whole batch back.
    pub fn persist(&mut self, backend: &Backend, recipe: &str) -> Result<()> {
        let key = backend.register_recipe(recipe)?;

        let names: Vec<String> = self.vars.keys().cloned().collect();
        let mut rows = Vec::with_capacity(names.len());
        for name in &names {
            if let Some(value) = self.lookup(name) {
                let priority = self.vars[name].top_priority();
                rows.push((name.clone(), value, priority));
            }
        }
        backend.store_vars(key, &rows)?;

        for name in &names {
            for (attr, value) in &self.vars[name].attributes {
                backend.insert_attr(key, name, attr, value)?;
            }
        }

        info!(recipe, vars = rows.len(), "persisted recipe metadata");
        Ok(())
    }
}
