// src/token.rs

//! Tokens and the lexer-to-parser contract
//!
//! A [`Token`] is an owned string payload tagged (externally) with a terminal
//! symbol id. Only some terminals carry a payload: names, quoted values, raw
//! body lines, and operator spellings. The payload is owned by whichever
//! parser-stack slot holds the token and is released exactly once, by move,
//! when the slot is consumed by a semantic action, discarded during error
//! recovery, or dropped at parser teardown.

use crate::grammar::SymbolId;
use crate::error::Result;

/// An owned token payload produced by a lexer
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Token {
    /// Payload text, if this terminal carries one
    pub text: Option<String>,
}

impl Token {
    /// A token carrying a text payload
    pub fn text(s: impl Into<String>) -> Self {
        Self {
            text: Some(s.into()),
        }
    }

    /// A payload-free token (structural keywords, end marker)
    pub fn empty() -> Self {
        Self { text: None }
    }

    /// Consume the token, yielding its payload or the empty string
    pub fn into_text(self) -> String {
        self.text.unwrap_or_default()
    }
}

/// Pull-style token stream consumed by the parser driver
///
/// Implementations yield `(symbol, token)` pairs and signal end-of-input with
/// symbol 0. The end marker must be re-presentable: once exhausted, every
/// further call keeps returning symbol 0 so the caller can drive the final
/// reductions.
pub trait TokenSource {
    /// Produce the next `(symbol, token)` pair
    fn next_token(&mut self) -> Result<(SymbolId, Token)>;

    /// Line number of the most recently produced token, for diagnostics
    fn line(&self) -> u32;
}
