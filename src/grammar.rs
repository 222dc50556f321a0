// src/grammar.rs

//! Grammar definition and parse tables for the recipe language
//!
//! The grammar is a small LALR(1) grammar (41 rules, 74 states) over the
//! statement forms of the recipe language: variable assignments in seven
//! operator flavors, task-ordering declarations, handler registration,
//! function export, class inheritance, file composition, and verbatim
//! shell/python/fakeroot function bodies.
//!
//! The action tables below are precomputed for this grammar and packed in the
//! classic single-table form: one flat action array indexed through per-state
//! offsets, with a parallel lookahead array to detect collisions and a
//! per-state default action for lookahead-independent reductions. The engine
//! in [`crate::parser`] interprets them; nothing else in the crate touches
//! the numeric encoding.

/// Grammar symbol identifier (terminals, then non-terminals)
pub type SymbolId = u16;

/// Symbol ids. Terminals come from the lexer; non-terminals are pushed by
/// reductions. Symbol 0 is the end-of-input marker.
pub mod sym {
    use super::SymbolId;

    pub const END: SymbolId = 0;
    pub const SYMBOL: SymbolId = 1;
    pub const VARIABLE: SymbolId = 2;
    pub const EXPORT: SymbolId = 3;
    pub const OP_ASSIGN: SymbolId = 4;
    pub const STRING: SymbolId = 5;
    pub const OP_IMMEDIATE: SymbolId = 6;
    pub const OP_COND: SymbolId = 7;
    pub const OP_PREPEND: SymbolId = 8;
    pub const OP_APPEND: SymbolId = 9;
    pub const TSYMBOL: SymbolId = 10;
    pub const BEFORE: SymbolId = 11;
    pub const AFTER: SymbolId = 12;
    pub const ADDTASK: SymbolId = 13;
    pub const ADDHANDLER: SymbolId = 14;
    pub const FSYMBOL: SymbolId = 15;
    pub const EXPORT_FUNC: SymbolId = 16;
    pub const ISYMBOL: SymbolId = 17;
    pub const INHERIT: SymbolId = 18;
    pub const INCLUDE: SymbolId = 19;
    pub const REQUIRE: SymbolId = 20;
    pub const PROC_BODY: SymbolId = 21;
    pub const PROC_OPEN: SymbolId = 22;
    pub const PROC_CLOSE: SymbolId = 23;
    pub const PYTHON: SymbolId = 24;
    pub const FAKEROOT: SymbolId = 25;
    pub const DEF_BODY: SymbolId = 26;
    pub const DEF_ARGS: SymbolId = 27;

    /// Designated error-recovery symbol
    pub const ERROR: SymbolId = 28;

    pub const NT_PROGRAM: SymbolId = 29;
    pub const NT_STATEMENTS: SymbolId = 30;
    pub const NT_STATEMENT: SymbolId = 31;
    pub const NT_VARIABLE: SymbolId = 32;
    pub const NT_TASK: SymbolId = 33;
    pub const NT_TASKS: SymbolId = 34;
    pub const NT_FUNC: SymbolId = 35;
    pub const NT_FUNCS: SymbolId = 36;
    pub const NT_INHERIT: SymbolId = 37;
    pub const NT_INHERITS: SymbolId = 38;
    pub const NT_PROC_BODY: SymbolId = 39;
    pub const NT_DEF_BODY: SymbolId = 40;
}

/// Number of automaton states
pub const N_STATES: usize = 74;
/// Number of grammar rules
pub const N_RULES: usize = 41;

/// Action code: syntax error in this state for this lookahead
pub const ERROR_ACTION: usize = N_STATES + N_RULES;
/// Action code: the input is accepted
pub const ACCEPT_ACTION: usize = N_STATES + N_RULES + 1;
/// Action code: no action (only returned for an absent lookahead)
pub const NO_ACTION: usize = N_STATES + N_RULES + 2;

/// One grammar rule: left-hand side and number of right-hand-side symbols
#[derive(Debug, Clone, Copy)]
pub struct Rule {
    pub lhs: SymbolId,
    pub arity: usize,
}

/// The rule table, indexed by rule number. The right-hand sides are listed in
/// the comments; [`crate::parser::actions`] dispatches on the same numbering.
pub const RULES: [Rule; N_RULES] = [
    Rule { lhs: sym::NT_PROGRAM, arity: 1 },    //  0: program ::= statements
    Rule { lhs: sym::NT_STATEMENTS, arity: 2 }, //  1: statements ::= statements statement
    Rule { lhs: sym::NT_STATEMENTS, arity: 0 }, //  2: statements ::=
    Rule { lhs: sym::NT_VARIABLE, arity: 1 },   //  3: variable ::= SYMBOL
    Rule { lhs: sym::NT_VARIABLE, arity: 1 },   //  4: variable ::= VARIABLE
    Rule { lhs: sym::NT_STATEMENT, arity: 4 },  //  5: statement ::= EXPORT variable OP_ASSIGN STRING
    Rule { lhs: sym::NT_STATEMENT, arity: 4 },  //  6: statement ::= EXPORT variable OP_IMMEDIATE STRING
    Rule { lhs: sym::NT_STATEMENT, arity: 4 },  //  7: statement ::= EXPORT variable OP_COND STRING
    Rule { lhs: sym::NT_STATEMENT, arity: 3 },  //  8: statement ::= variable OP_ASSIGN STRING
    Rule { lhs: sym::NT_STATEMENT, arity: 3 },  //  9: statement ::= variable OP_PREPEND STRING
    Rule { lhs: sym::NT_STATEMENT, arity: 3 },  // 10: statement ::= variable OP_APPEND STRING
    Rule { lhs: sym::NT_STATEMENT, arity: 3 },  // 11: statement ::= variable OP_IMMEDIATE STRING
    Rule { lhs: sym::NT_STATEMENT, arity: 3 },  // 12: statement ::= variable OP_COND STRING
    Rule { lhs: sym::NT_TASK, arity: 5 },       // 13: task ::= TSYMBOL BEFORE TSYMBOL AFTER TSYMBOL
    Rule { lhs: sym::NT_TASK, arity: 5 },       // 14: task ::= TSYMBOL AFTER TSYMBOL BEFORE TSYMBOL
    Rule { lhs: sym::NT_TASK, arity: 1 },       // 15: task ::= TSYMBOL
    Rule { lhs: sym::NT_TASK, arity: 3 },       // 16: task ::= TSYMBOL BEFORE TSYMBOL
    Rule { lhs: sym::NT_TASK, arity: 3 },       // 17: task ::= TSYMBOL AFTER TSYMBOL
    Rule { lhs: sym::NT_TASKS, arity: 2 },      // 18: tasks ::= tasks task
    Rule { lhs: sym::NT_TASKS, arity: 1 },      // 19: tasks ::= task
    Rule { lhs: sym::NT_STATEMENT, arity: 2 },  // 20: statement ::= ADDTASK tasks
    Rule { lhs: sym::NT_STATEMENT, arity: 2 },  // 21: statement ::= ADDHANDLER SYMBOL
    Rule { lhs: sym::NT_FUNC, arity: 1 },       // 22: func ::= FSYMBOL
    Rule { lhs: sym::NT_FUNCS, arity: 2 },      // 23: funcs ::= funcs func
    Rule { lhs: sym::NT_FUNCS, arity: 1 },      // 24: funcs ::= func
    Rule { lhs: sym::NT_STATEMENT, arity: 2 },  // 25: statement ::= EXPORT_FUNC funcs
    Rule { lhs: sym::NT_INHERIT, arity: 1 },    // 26: inherit ::= ISYMBOL
    Rule { lhs: sym::NT_INHERITS, arity: 2 },   // 27: inherits ::= inherits inherit
    Rule { lhs: sym::NT_INHERITS, arity: 1 },   // 28: inherits ::= inherit
    Rule { lhs: sym::NT_STATEMENT, arity: 2 },  // 29: statement ::= INHERIT inherits
    Rule { lhs: sym::NT_STATEMENT, arity: 2 },  // 30: statement ::= INCLUDE ISYMBOL
    Rule { lhs: sym::NT_STATEMENT, arity: 2 },  // 31: statement ::= REQUIRE ISYMBOL
    Rule { lhs: sym::NT_PROC_BODY, arity: 2 },  // 32: proc_body ::= proc_body PROC_BODY
    Rule { lhs: sym::NT_PROC_BODY, arity: 0 },  // 33: proc_body ::=
    Rule { lhs: sym::NT_STATEMENT, arity: 4 },  // 34: statement ::= variable PROC_OPEN proc_body PROC_CLOSE
    Rule { lhs: sym::NT_STATEMENT, arity: 5 },  // 35: statement ::= PYTHON SYMBOL PROC_OPEN proc_body PROC_CLOSE
    Rule { lhs: sym::NT_STATEMENT, arity: 4 },  // 36: statement ::= PYTHON PROC_OPEN proc_body PROC_CLOSE
    Rule { lhs: sym::NT_STATEMENT, arity: 5 },  // 37: statement ::= FAKEROOT SYMBOL PROC_OPEN proc_body PROC_CLOSE
    Rule { lhs: sym::NT_DEF_BODY, arity: 2 },   // 38: def_body ::= def_body DEF_BODY
    Rule { lhs: sym::NT_DEF_BODY, arity: 0 },   // 39: def_body ::=
    Rule { lhs: sym::NT_STATEMENT, arity: 3 },  // 40: statement ::= SYMBOL DEF_ARGS def_body
];

// Packed action tables. ACTION holds shift targets (< N_STATES), reduce codes
// (N_STATES + rule), and the accept code; LOOKAHEAD mirrors it so an offset
// collision falls back to the per-state DEFAULT action.
const ACTION: [u16; 92] = [
    28, 47, 5, 57, 33, 58, 30, 25, 24, 37, //
    45, 14, 2, 29, 41, 3, 16, 4, 23, 39, //
    69, 8, 11, 17, 26, 48, 47, 32, 21, 42, //
    31, 57, 57, 73, 44, 10, 66, 7, 34, 38, //
    57, 51, 72, 116, 1, 62, 6, 49, 52, 35, //
    36, 59, 54, 9, 20, 64, 43, 22, 40, 50, //
    46, 71, 67, 60, 15, 65, 61, 70, 53, 56, //
    27, 12, 68, 63, 84, 55, 18, 84, 13, 84, //
    84, 84, 84, 84, 84, 84, 84, 84, 84, 84, //
    84, 19,
];

const LOOKAHEAD: [u16; 92] = [
    1, 2, 3, 21, 4, 23, 6, 7, 8, 9, //
    31, 32, 13, 14, 1, 16, 39, 18, 19, 20, //
    37, 38, 22, 24, 25, 1, 2, 4, 10, 6, //
    7, 21, 21, 23, 23, 22, 35, 36, 11, 12, //
    21, 5, 23, 29, 30, 33, 34, 5, 5, 10, //
    12, 10, 5, 22, 39, 15, 40, 11, 10, 5, //
    26, 17, 17, 10, 32, 35, 33, 17, 5, 5, //
    1, 22, 37, 1, 41, 5, 39, 41, 27, 41, //
    41, 41, 41, 41, 41, 41, 41, 41, 41, 41, //
    41, 39,
];

const SHIFT_USE_DEFAULT: i16 = -19;
const SHIFT_MAX: usize = 43;
const SHIFT_OFST: [i16; 44] = [
    -19, -1, 18, 40, 45, 24, 18, 40, 45, -19, //
    -19, -19, -19, -19, 0, 23, -18, 13, 19, 10, //
    11, 27, 53, 50, 63, 64, 69, 49, 51, 72, //
    70, 36, 42, 43, 39, 38, 41, 47, 48, 44, //
    46, 31, 54, 34,
];

const REDUCE_USE_DEFAULT: i16 = -24;
const REDUCE_MAX: usize = 13;
const REDUCE_OFST: [i16; 14] = [
    14, -21, 12, 1, -17, 32, 33, 30, 35, 37, //
    52, -23, 15, 16,
];

const DEFAULT: [u16; N_STATES] = [
    76, 74, 115, 115, 115, 115, 94, 99, 103, 107, //
    107, 107, 107, 113, 115, 115, 115, 115, 115, 115, //
    115, 89, 115, 115, 115, 115, 115, 115, 77, 115, //
    115, 115, 115, 115, 115, 90, 115, 115, 115, 115, //
    91, 115, 115, 114, 111, 75, 112, 78, 77, 79, //
    80, 81, 82, 83, 84, 85, 86, 106, 108, 87, //
    88, 92, 93, 95, 96, 97, 98, 100, 101, 102, //
    104, 105, 109, 110,
];

/// State at the top of the statement loop: `statements` has been recognized
/// and the next statement may begin. Error recovery resynchronizes here; a
/// recovery entry pushed at this state folds into an empty statement as soon
/// as a statement-starting terminal (or the end marker) arrives.
pub const RECOVERY_STATE: usize = 1;

/// Resolve the action for a state and terminal lookahead.
///
/// `None` stands for an absent lookahead (mid reduce chain); it yields
/// [`NO_ACTION`] unless the state's action is lookahead-independent.
pub fn shift_action(state: usize, lookahead: Option<SymbolId>) -> usize {
    debug_assert!(state < N_STATES);
    if state > SHIFT_MAX || SHIFT_OFST[state] == SHIFT_USE_DEFAULT {
        return DEFAULT[state] as usize;
    }
    let Some(la) = lookahead else {
        return NO_ACTION;
    };
    let i = SHIFT_OFST[state] as i32 + la as i32;
    if i < 0 || i >= ACTION.len() as i32 || LOOKAHEAD[i as usize] != la {
        DEFAULT[state] as usize
    } else {
        ACTION[i as usize] as usize
    }
}

/// Resolve the goto action for a state and the non-terminal produced by a
/// reduction.
pub fn reduce_action(state: usize, lhs: SymbolId) -> usize {
    debug_assert!(state < N_STATES);
    if state > REDUCE_MAX || REDUCE_OFST[state] == REDUCE_USE_DEFAULT {
        return DEFAULT[state] as usize;
    }
    let i = REDUCE_OFST[state] as i32 + lhs as i32;
    if i < 0 || i >= ACTION.len() as i32 || LOOKAHEAD[i as usize] != lhs {
        DEFAULT[state] as usize
    } else {
        ACTION[i as usize] as usize
    }
}
