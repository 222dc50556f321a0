// src/parser/mod.rs

//! Shift-reduce parser engine for the recipe language
//!
//! The engine interprets the packed tables in [`crate::grammar`]. It keeps a
//! bounded stack of `(state, symbol, value)` entries; every token payload
//! lives in exactly one stack slot and is released by move when the slot is
//! consumed by a semantic action, discarded during error recovery, or dropped
//! at teardown.
//!
//! Syntax errors do not unwind: they are reported once per burst through the
//! [`ParseContext`], the engine resynchronizes on the designated recovery
//! symbol, and parsing continues. Only stack exhaustion and end-of-input in
//! the middle of recovery are fatal.

pub mod actions;

use tracing::{debug, trace, warn};

use crate::error::Result;
use crate::grammar::{self, SymbolId, sym};
use crate::lexer::Lexer;
use crate::store::MetadataStore;
use crate::token::{Token, TokenSource};

/// Maximum parse stack depth. The grammar bounds statement nesting by design;
/// exceeding this is a fatal parse failure, not a growth event.
pub const MAX_STACK_DEPTH: usize = 100;

/// Number of clean shifts required after an error before another syntax
/// error may be reported.
const ERROR_SHIFT_BUDGET: i32 = 3;

/// Value slot attached to each stack entry
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SemanticValue {
    /// Neutral placeholder, never read by any action
    #[default]
    None,
    /// Owned text: a token payload or an accumulated body
    Text(String),
}

impl SemanticValue {
    fn from_token(token: Token) -> Self {
        match token.text {
            Some(s) => SemanticValue::Text(s),
            None => SemanticValue::None,
        }
    }

    /// Consume the value, yielding its text or the empty string
    pub(crate) fn into_text(self) -> String {
        match self {
            SemanticValue::Text(s) => s,
            SemanticValue::None => String::new(),
        }
    }
}

/// One slot of the parse stack
#[derive(Debug)]
pub(crate) struct StackEntry {
    state: usize,
    symbol: SymbolId,
    pub(crate) value: SemanticValue,
}

/// Result of feeding one token to the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseOutcome {
    /// More input is expected
    Continue,
    /// The input was accepted; the store holds the collected metadata
    Accepted,
    /// Fatal failure (stack exhaustion or end-of-input during recovery)
    Failed,
}

/// A reported syntax error, one per contiguous error region
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxError {
    pub file: String,
    pub line: u32,
}

/// Caller-supplied context threaded through every semantic action
pub struct ParseContext<'a> {
    /// The metadata store populated by semantic actions
    pub store: &'a mut MetadataStore,
    /// Source file name, for diagnostics
    pub file: String,
    /// Current source line, maintained by the driver
    pub line: u32,
    syntax_errors: Vec<SyntaxError>,
}

impl<'a> ParseContext<'a> {
    pub fn new(store: &'a mut MetadataStore, file: impl Into<String>) -> Self {
        Self {
            store,
            file: file.into(),
            line: 0,
            syntax_errors: Vec::new(),
        }
    }

    /// Diagnostics sink: record a syntax error at the current position.
    /// The engine calls this at most once per error burst.
    fn report_syntax_error(&mut self) {
        warn!(file = %self.file, line = self.line, "syntax error");
        self.syntax_errors.push(SyntaxError {
            file: self.file.clone(),
            line: self.line,
        });
    }

    /// Errors reported so far
    pub fn syntax_errors(&self) -> &[SyntaxError] {
        &self.syntax_errors
    }
}

/// The shift-reduce engine
pub struct Parser {
    stack: Vec<StackEntry>,
    error_budget: i32,
}

impl Default for Parser {
    fn default() -> Self {
        Self::new()
    }
}

impl Parser {
    pub fn new() -> Self {
        let mut parser = Self {
            stack: Vec::with_capacity(MAX_STACK_DEPTH),
            error_budget: -1,
        };
        parser.reset();
        parser
    }

    fn reset(&mut self) {
        self.stack.clear();
        self.stack.push(StackEntry {
            state: 0,
            symbol: sym::END,
            value: SemanticValue::None,
        });
        self.error_budget = -1;
    }

    /// Current stack depth, including the bottom sentinel
    pub(crate) fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Feed one `(symbol, token)` pair and run the automaton to a fixed
    /// point: a shift of the token, a terminal outcome, or (for the end
    /// marker) the final reduction chain.
    pub fn feed(
        &mut self,
        symbol: SymbolId,
        token: Token,
        ctx: &mut ParseContext<'_>,
    ) -> ParseOutcome {
        if self.stack.is_empty() {
            // A previous parse finished on this engine; start fresh.
            self.reset();
        }

        let end_of_input = symbol == sym::END;
        let mut lookahead = Some(symbol);
        let mut pending = Some(token);

        while let Some(la) = lookahead {
            let Some(top) = self.stack.last() else {
                break;
            };

            if top.symbol == sym::ERROR {
                // Resynchronizing: tokens are discarded until one can start
                // a statement again (or the input ends), at which point the
                // recovery entry folds into an empty statement.
                let probe = grammar::shift_action(grammar::RECOVERY_STATE, Some(la));
                if probe >= grammar::N_STATES && la != sym::END {
                    trace!(symbol = la, "discard token during recovery");
                    drop(pending.take());
                    lookahead = None;
                    continue;
                }
                self.stack.pop();
                let below = self
                    .stack
                    .last()
                    .map(|e| e.state)
                    .unwrap_or(0);
                let goto = grammar::reduce_action(below, sym::NT_STATEMENT);
                if !self.push(goto, sym::NT_STATEMENT, SemanticValue::None) {
                    return ParseOutcome::Failed;
                }
                continue;
            }

            let act = grammar::shift_action(top.state, Some(la));

            if act < grammar::N_STATES {
                // Shift the lookahead token.
                let value = pending
                    .take()
                    .map(SemanticValue::from_token)
                    .unwrap_or(SemanticValue::None);
                trace!(state = act, symbol = la, "shift");
                if !self.push(act, la, value) {
                    return ParseOutcome::Failed;
                }
                self.error_budget -= 1;
                // End-of-input is re-presented after a shift so the final
                // reductions run; everything else waits for the next token.
                lookahead = if end_of_input && !self.stack.is_empty() {
                    Some(sym::END)
                } else {
                    None
                };
            } else if act < grammar::N_STATES + grammar::N_RULES {
                match self.reduce(act - grammar::N_STATES, ctx) {
                    ReduceOutcome::Continue => {}
                    ReduceOutcome::Accepted => return ParseOutcome::Accepted,
                    ReduceOutcome::Overflow => return ParseOutcome::Failed,
                }
            } else if act == grammar::ERROR_ACTION {
                debug!(symbol = la, line = ctx.line, "parse error action");
                if self.error_budget < 0 {
                    ctx.report_syntax_error();
                }
                if la == sym::END {
                    // End-of-input while a statement is still open: fatal.
                    // Everything held on the stack drops here, exactly once.
                    drop(pending.take());
                    self.stack.clear();
                    return ParseOutcome::Failed;
                }
                // Pop the partial statement until the state that can accept
                // the recovery entry, then park the entry there. The loop
                // re-examines the offending token in recovery mode.
                while self
                    .stack
                    .last()
                    .is_some_and(|e| e.state != grammar::RECOVERY_STATE)
                {
                    self.stack.pop();
                }
                if self.stack.is_empty() {
                    drop(pending.take());
                    return ParseOutcome::Failed;
                }
                if !self.push(
                    grammar::RECOVERY_STATE,
                    sym::ERROR,
                    SemanticValue::None,
                ) {
                    return ParseOutcome::Failed;
                }
                self.error_budget = ERROR_SHIFT_BUDGET;
            } else {
                // Accept reached directly from the action table.
                self.stack.clear();
                return ParseOutcome::Accepted;
            }
        }

        ParseOutcome::Continue
    }

    /// Push a stack entry, enforcing the fixed depth bound. On overflow every
    /// held entry is released and the parse is dead.
    fn push(&mut self, state: usize, symbol: SymbolId, value: SemanticValue) -> bool {
        if self.stack.len() >= MAX_STACK_DEPTH {
            warn!("parse stack overflow, aborting parse");
            self.stack.clear();
            return false;
        }
        self.stack.push(StackEntry {
            state,
            symbol,
            value,
        });
        true
    }

    /// Pop the rule's right-hand side, run its semantic action, and push the
    /// produced non-terminal at the goto state.
    fn reduce(&mut self, rule_no: usize, ctx: &mut ParseContext<'_>) -> ReduceOutcome {
        let rule = grammar::RULES[rule_no];
        trace!(rule = rule_no, arity = rule.arity, "reduce");

        debug_assert!(self.stack.len() > rule.arity);
        let split = self.stack.len() - rule.arity;
        let rhs: Vec<StackEntry> = self.stack.split_off(split);
        let value = actions::dispatch(rule_no, rhs, ctx);

        let below = self
            .stack
            .last()
            .map(|e| e.state)
            .unwrap_or(0);
        let act = grammar::reduce_action(below, rule.lhs);
        if act < grammar::N_STATES {
            if !self.push(act, rule.lhs, value) {
                return ReduceOutcome::Overflow;
            }
            ReduceOutcome::Continue
        } else if act == grammar::ACCEPT_ACTION {
            debug!("input accepted");
            self.stack.clear();
            ReduceOutcome::Accepted
        } else {
            // The tables never produce an error action on a goto.
            debug_assert!(false, "error action on goto for rule {rule_no}");
            ReduceOutcome::Continue
        }
    }
}

enum ReduceOutcome {
    Continue,
    Accepted,
    Overflow,
}

/// Summary of one driven parse
#[derive(Debug)]
pub struct ParseReport {
    pub outcome: ParseOutcome,
    pub syntax_errors: Vec<SyntaxError>,
}

/// Drive a token source to completion against `store`.
///
/// Syntax errors are collected in the report, not returned as `Err`; the
/// caller decides whether a failed or error-laden parse is fatal.
pub fn parse_tokens(
    source: &mut dyn TokenSource,
    store: &mut MetadataStore,
    file: &str,
) -> Result<ParseReport> {
    let mut parser = Parser::new();
    let mut ctx = ParseContext::new(store, file);

    loop {
        let (symbol, token) = source.next_token()?;
        ctx.line = source.line();
        let at_end = symbol == sym::END;
        match parser.feed(symbol, token, &mut ctx) {
            ParseOutcome::Continue => {
                if at_end {
                    // The end marker must resolve the parse one way or the
                    // other; a Continue here means the engine is wedged.
                    return Ok(ParseReport {
                        outcome: ParseOutcome::Failed,
                        syntax_errors: ctx.syntax_errors,
                    });
                }
            }
            ParseOutcome::Accepted => {
                if at_end {
                    return Ok(ParseReport {
                        outcome: ParseOutcome::Accepted,
                        syntax_errors: ctx.syntax_errors,
                    });
                }
                // The automaton can accept early on a top-level token it has
                // no action for; the engine restarts on the next feed and the
                // remaining statements keep accumulating into the same store.
                debug!(line = ctx.line, "accepted before end of input, continuing");
            }
            ParseOutcome::Failed => {
                return Ok(ParseReport {
                    outcome: ParseOutcome::Failed,
                    syntax_errors: ctx.syntax_errors,
                });
            }
        }
    }
}

/// Parse recipe source text into `store` using the reference lexer.
pub fn parse_source(
    text: &str,
    file: &str,
    store: &mut MetadataStore,
) -> Result<ParseReport> {
    let mut lexer = Lexer::new(text);
    parse_tokens(&mut lexer, store, file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MetadataStore;

    fn feed_statement(parser: &mut Parser, ctx: &mut ParseContext<'_>) {
        // VAR = "value"
        let seq = [
            (sym::SYMBOL, Token::text("VAR")),
            (sym::OP_ASSIGN, Token::text("=")),
            (sym::STRING, Token::text("value")),
        ];
        for (s, t) in seq {
            assert_eq!(parser.feed(s, t, ctx), ParseOutcome::Continue);
        }
    }

    #[test]
    fn test_single_statement_accepts() {
        let mut store = MetadataStore::new();
        let mut ctx = ParseContext::new(&mut store, "test.recipe");
        let mut parser = Parser::new();

        feed_statement(&mut parser, &mut ctx);
        assert_eq!(
            parser.feed(sym::END, Token::empty(), &mut ctx),
            ParseOutcome::Accepted
        );
        assert_eq!(store.lookup("VAR").as_deref(), Some("value"));
    }

    #[test]
    fn test_empty_input_accepts() {
        let mut store = MetadataStore::new();
        let mut ctx = ParseContext::new(&mut store, "empty.recipe");
        let mut parser = Parser::new();
        assert_eq!(
            parser.feed(sym::END, Token::empty(), &mut ctx),
            ParseOutcome::Accepted
        );
    }

    #[test]
    fn test_teardown_releases_stack() {
        let mut store = MetadataStore::new();
        let mut ctx = ParseContext::new(&mut store, "test.recipe");
        let mut parser = Parser::new();

        // Feed half a statement so token payloads are parked on the stack,
        // then drop the parser mid-parse. Ownership is by move, so the held
        // payloads are released exactly once, here.
        parser.feed(sym::SYMBOL, Token::text("VAR"), &mut ctx);
        parser.feed(sym::OP_ASSIGN, Token::text("="), &mut ctx);
        assert!(parser.depth() > 1);
        drop(parser);
    }

    #[test]
    fn test_error_reported_once_per_burst() {
        let mut store = MetadataStore::new();
        let mut ctx = ParseContext::new(&mut store, "bad.recipe");
        let mut parser = Parser::new();

        // An operator where a value is expected: one report, then further
        // garbage in the same burst stays silent.
        parser.feed(sym::SYMBOL, Token::text("BROKEN"), &mut ctx);
        parser.feed(sym::OP_ASSIGN, Token::text("="), &mut ctx);
        parser.feed(sym::OP_ASSIGN, Token::text("="), &mut ctx);
        parser.feed(sym::OP_COND, Token::text("?="), &mut ctx);
        assert_eq!(ctx.syntax_errors().len(), 1);

        // A well-formed statement afterwards still lands in the store.
        feed_statement(&mut parser, &mut ctx);
        assert_eq!(
            parser.feed(sym::END, Token::empty(), &mut ctx),
            ParseOutcome::Accepted
        );
        assert_eq!(ctx.syntax_errors().len(), 1);
        assert_eq!(store.lookup("VAR").as_deref(), Some("value"));
    }

    #[test]
    fn test_eof_mid_statement_fails() {
        let mut store = MetadataStore::new();
        let mut ctx = ParseContext::new(&mut store, "trunc.recipe");
        let mut parser = Parser::new();

        parser.feed(sym::SYMBOL, Token::text("VAR"), &mut ctx);
        parser.feed(sym::OP_ASSIGN, Token::text("="), &mut ctx);
        assert_eq!(
            parser.feed(sym::END, Token::empty(), &mut ctx),
            ParseOutcome::Failed
        );
    }
}
