//! symrex: symbolic-derivative regular expression matching.
//!
//! Patterns compile to a tree of algebraic derivative nodes over an
//! alphabet partitioned into minterms. Matching advances one minterm at a
//! time through a memoized, lock-free transition cache, in one of two
//! modes: a Brzozowski-derivative DFA, or a powerset (Antimirov) NFA the
//! automaton switches to when the deterministic state graph grows past its
//! budget. Anchors are resolved through a character-kind context instead
//! of re-derivation, so `^`, `$`, `\b` and friends cost nothing per step.
//!
//! ```
//! # use symrex::Pattern;
//! let p = Pattern::new(r"\b[0-9]+\b").unwrap();
//! assert_eq!(p.find(b"order 1234 shipped"), Some((6, 10)));
//! ```
//!
//! A compiled [`Pattern`] is `Send + Sync`; clone it or share it behind an
//! `Arc` and match from as many threads as needed. Per-worker scratch
//! buffers come from [`Pattern::scratch`].

pub mod algebra;
pub mod automaton;
pub mod byteset;
mod compile;
mod matcher;
mod parser;

use std::fmt;

pub use matcher::Pattern;
pub use parser::ParseError;

/// Errors that can occur while compiling a pattern
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatternError {
    /// The pattern text does not parse.
    Parse(ParseError),
    /// The pattern induces more minterms than a predicate mask can hold.
    TooManyClasses { count: usize },
}

impl fmt::Display for PatternError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PatternError::Parse(e) => write!(f, "invalid pattern: {}", e),
            PatternError::TooManyClasses { count } => {
                write!(
                    f,
                    "pattern induces {} character classes, more than the supported {}",
                    count,
                    algebra::MAX_MINTERMS
                )
            }
        }
    }
}

impl std::error::Error for PatternError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PatternError::Parse(e) => Some(e),
            PatternError::TooManyClasses { .. } => None,
        }
    }
}

impl From<ParseError> for PatternError {
    fn from(e: ParseError) -> Self {
        PatternError::Parse(e)
    }
}
