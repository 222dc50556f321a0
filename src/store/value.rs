// src/store/value.rs

//! Value-construction records for metadata variables
//!
//! A variable's value is never stored flat: it is the fold of the operations
//! applied to it, ordered by scope priority and then by insertion order. An
//! unconditional assignment acts as a reset point that discards everything a
//! lower-priority scope accumulated; append/prepend/conditional operations
//! compose incrementally on top of the chain in force.

use std::collections::BTreeMap;

/// One pending operation against a variable's value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueOp {
    /// `=` — assign, references expanded at lookup time
    Assign(String),
    /// `:=` — assign, references already expanded at insert time
    AssignImmediate(String),
    /// `?=` — assign only if nothing earlier in the fold set a value
    CondAssign(String),
    /// `+=` / `.=` — append, with or without a single-space separator
    Append { text: String, with_separator: bool },
    /// `=+` / `=.` — prepend, with or without a single-space separator
    Prepend { text: String, with_separator: bool },
}

/// A [`ValueOp`] stamped with the scope priority it was inserted under and a
/// store-wide sequence number that keeps the fold stable within a scope
#[derive(Debug, Clone)]
pub(crate) struct ScopedOp {
    pub(crate) priority: i32,
    pub(crate) seq: u64,
    pub(crate) op: ValueOp,
}

/// Per-variable record: pending operations, the fold cache, and attributes
#[derive(Debug, Clone, Default)]
pub(crate) struct VariableRecord {
    pub(crate) ops: Vec<ScopedOp>,
    cached_fold: Option<String>,
    dirty: bool,
    pub(crate) attributes: BTreeMap<String, String>,
}

impl VariableRecord {
    /// Record a new operation; the cached fold is stale from here on.
    pub(crate) fn push_op(&mut self, priority: i32, seq: u64, op: ValueOp) {
        self.ops.push(ScopedOp { priority, seq, op });
        self.dirty = true;
    }

    /// Highest scope priority that contributed an operation
    pub(crate) fn top_priority(&self) -> i32 {
        self.ops.iter().map(|o| o.priority).max().unwrap_or(0)
    }

    /// Fold the pending operations into the pre-expansion value. Recomputes
    /// only when an operation arrived since the last fold.
    pub(crate) fn folded(&mut self) -> Option<String> {
        if self.dirty || self.cached_fold.is_none() {
            self.cached_fold = fold_ops(&self.ops);
            self.dirty = false;
        }
        self.cached_fold.clone()
    }
}

/// Join two fragments, inserting a single space only when asked to and both
/// sides are non-empty.
fn join(left: &str, right: &str, with_separator: bool) -> String {
    let mut out = String::with_capacity(left.len() + right.len() + 1);
    out.push_str(left);
    if with_separator && !left.is_empty() && !right.is_empty() {
        out.push(' ');
    }
    out.push_str(right);
    out
}

/// Deterministic fold: ascending priority, insertion order within a priority.
fn fold_ops(ops: &[ScopedOp]) -> Option<String> {
    let mut ordered: Vec<&ScopedOp> = ops.iter().collect();
    ordered.sort_by_key(|o| (o.priority, o.seq));

    let mut value: Option<String> = None;
    for scoped in ordered {
        match &scoped.op {
            ValueOp::Assign(text) | ValueOp::AssignImmediate(text) => {
                value = Some(text.clone());
            }
            ValueOp::CondAssign(text) => {
                if value.is_none() {
                    value = Some(text.clone());
                }
            }
            ValueOp::Append {
                text,
                with_separator,
            } => {
                let current = value.take().unwrap_or_default();
                value = Some(join(&current, text, *with_separator));
            }
            ValueOp::Prepend {
                text,
                with_separator,
            } => {
                let current = value.take().unwrap_or_default();
                value = Some(join(text, &current, *with_separator));
            }
        }
    }
    value
}
