// src/parser/actions.rs

//! Semantic actions invoked on each grammar reduction
//!
//! Every rule maps to exactly one store mutation (or to plumbing that moves
//! a value up the stack). Bodies are accumulated verbatim; nothing in this
//! layer interprets shell or python text.

use crate::parser::{ParseContext, SemanticValue, StackEntry};
use crate::store::{FuncKind, ValueOp};

/// Pull the text out of a right-hand-side slot, releasing the slot
fn text(vals: &mut [SemanticValue], i: usize) -> String {
    std::mem::take(&mut vals[i]).into_text()
}

/// The separator-joining operator spellings (`+=`, `=+`) put a single space
/// between the existing value and the new text; the concatenating spellings
/// (`.=`, `=.`) do not.
fn joins_with_separator(spelling: &str) -> bool {
    !spelling.starts_with('.') && !spelling.ends_with('.')
}

/// Run the semantic action for `rule`, consuming the popped right-hand side.
/// Returns the value pushed for the rule's non-terminal; rules without an
/// action push a neutral placeholder that is never read.
pub(crate) fn dispatch(
    rule: usize,
    rhs: Vec<StackEntry>,
    ctx: &mut ParseContext<'_>,
) -> SemanticValue {
    let mut vals: Vec<SemanticValue> = rhs.into_iter().map(|e| e.value).collect();
    let store = &mut *ctx.store;

    match rule {
        // variable ::= SYMBOL | VARIABLE
        3 | 4 => return std::mem::take(&mut vals[0]),

        // statement ::= EXPORT variable <op> STRING
        5 => {
            let name = text(&mut vals, 1);
            store.insert(&name, ValueOp::Assign(text(&mut vals, 3)));
            store.mark_exported(&name);
        }
        6 => {
            let name = text(&mut vals, 1);
            let op = ValueOp::AssignImmediate(text(&mut vals, 3));
            store.insert(&name, op);
            store.mark_exported(&name);
        }
        7 => {
            let name = text(&mut vals, 1);
            store.insert(&name, ValueOp::CondAssign(text(&mut vals, 3)));
            store.mark_exported(&name);
        }

        // statement ::= variable <op> STRING
        8 => {
            let name = text(&mut vals, 0);
            store.insert(&name, ValueOp::Assign(text(&mut vals, 2)));
        }
        9 => {
            let name = text(&mut vals, 0);
            let with_separator = joins_with_separator(&text(&mut vals, 1));
            let op = ValueOp::Prepend {
                text: text(&mut vals, 2),
                with_separator,
            };
            store.insert(&name, op);
        }
        10 => {
            let name = text(&mut vals, 0);
            let with_separator = joins_with_separator(&text(&mut vals, 1));
            let op = ValueOp::Append {
                text: text(&mut vals, 2),
                with_separator,
            };
            store.insert(&name, op);
        }
        11 => {
            let name = text(&mut vals, 0);
            let op = ValueOp::AssignImmediate(text(&mut vals, 2));
            store.insert(&name, op);
        }
        12 => {
            let name = text(&mut vals, 0);
            store.insert(&name, ValueOp::CondAssign(text(&mut vals, 2)));
        }

        // task ::= TSYMBOL [BEFORE TSYMBOL] [AFTER TSYMBOL], either order
        13 => {
            let name = text(&mut vals, 0);
            let before = text(&mut vals, 2);
            let after = text(&mut vals, 4);
            store.add_task(name, Some(before), Some(after));
        }
        14 => {
            let name = text(&mut vals, 0);
            let after = text(&mut vals, 2);
            let before = text(&mut vals, 4);
            store.add_task(name, Some(before), Some(after));
        }
        15 => {
            store.add_task(text(&mut vals, 0), None, None);
        }
        16 => {
            let name = text(&mut vals, 0);
            let before = text(&mut vals, 2);
            store.add_task(name, Some(before), None);
        }
        17 => {
            let name = text(&mut vals, 0);
            let after = text(&mut vals, 2);
            store.add_task(name, None, Some(after));
        }

        // statement ::= ADDHANDLER SYMBOL
        21 => store.add_handler(text(&mut vals, 1)),

        // func ::= FSYMBOL (fires once per exported function name)
        22 => store.add_export_func(text(&mut vals, 0)),

        // inherit ::= ISYMBOL (fires once per inherited class)
        26 => store.add_inherit(text(&mut vals, 0)),

        // statement ::= INCLUDE ISYMBOL | REQUIRE ISYMBOL
        30 => store.add_include(text(&mut vals, 1), false),
        31 => store.add_include(text(&mut vals, 1), true),

        // proc_body/def_body accumulate raw lines in encounter order
        32 | 38 => {
            let mut body = text(&mut vals, 0);
            body.push_str(&text(&mut vals, 1));
            return SemanticValue::Text(body);
        }
        33 | 39 => return SemanticValue::Text(String::new()),

        // statement ::= variable PROC_OPEN proc_body PROC_CLOSE
        34 => {
            let name = text(&mut vals, 0);
            store.add_func(Some(name), FuncKind::Shell, text(&mut vals, 2));
        }
        // statement ::= PYTHON [SYMBOL] PROC_OPEN proc_body PROC_CLOSE
        35 => {
            let name = text(&mut vals, 1);
            store.add_func(Some(name), FuncKind::Python, text(&mut vals, 3));
        }
        36 => {
            store.add_func(None, FuncKind::Python, text(&mut vals, 2));
        }
        // statement ::= FAKEROOT SYMBOL PROC_OPEN proc_body PROC_CLOSE
        37 => {
            let name = text(&mut vals, 1);
            store.add_func(Some(name), FuncKind::Fakeroot, text(&mut vals, 3));
        }

        // statement ::= SYMBOL DEF_ARGS def_body
        40 => {
            let name = text(&mut vals, 0);
            let args = text(&mut vals, 1);
            store.add_def(name, args, text(&mut vals, 2));
        }

        // List plumbing and the program/statements spine carry no value.
        _ => {}
    }

    SemanticValue::None
}
