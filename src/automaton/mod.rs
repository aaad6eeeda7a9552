//! Symbolic-derivative matching automaton.
//!
//! This module implements the per-step matching automaton: given a
//! compiled pattern as a tree of derivative nodes over a minterm alphabet,
//! it advances one minterm at a time and decides nullability under anchor
//! contexts. Two operating modes share one surface:
//!
//! - Brzozowski (deterministic): one state = one derivative node plus the
//!   previous character kind
//! - powerset (Antimirov): one state = an ordered set of NFA core states,
//!   entered when the deterministic graph grows past its budget
//!
//! # Module Organization
//!
//! - `char_kind`: character-kind tags and anchor contexts
//! - `node`: hash-consed derivative nodes and their derivatives/effects
//! - `builder`: state interning, shared transition caches, mode flag
//! - `matching_state`: a single deterministic state and its transitions
//! - `current_state`: the dual-mode per-match cursor
//! - `sparse_set`: insertion-ordered id sets backing powerset states

pub mod builder;
pub mod char_kind;
pub mod current_state;
pub mod matching_state;
pub mod node;
pub mod sparse_set;

pub use builder::{NfaStateId, StateBuilder, StateId, POWERSET_THRESHOLD};
pub use char_kind::{CharKind, Context};
pub use current_state::{CurrentState, PerThreadData};
pub use matching_state::{MatchingState, StateTransitions};
pub use node::{
    alternatives, AnchorKind, Effect, EffectKind, EffectList, NodeBuilder, NodeKind, NodeRef,
    SymbolicNode,
};
pub use sparse_set::{SparseSet, SparseSets};

#[cfg(test)]
mod tests;
