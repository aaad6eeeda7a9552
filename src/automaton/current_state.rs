//! The per-match cursor over either state representation.
//!
//! A `CurrentState` is the position of one match attempt: a single
//! deterministic state, or in powerset mode an insertion-ordered set of NFA
//! core-state ids. The two representations share one query and transition
//! surface; `take_transition` advances by one input minterm and follows the
//! builder's mode flag, re-entering powerset construction the moment the
//! flag is observed flipped.
//!
//! The powerset variant owns its sparse sets, taken from a
//! [`PerThreadData`] scratch bundle at construction and handed back by
//! [`CurrentState::reclaim`]; a bundle belongs to exactly one match attempt
//! at a time.

use std::sync::Arc;

use super::builder::StateBuilder;
use super::char_kind::CharKind;
use super::matching_state::MatchingState;
use super::sparse_set::{SparseSet, SparseSets};
use crate::algebra::MintermAlgebra;

/// Reusable per-worker scratch buffers for powerset mode.
///
/// Obtain one per worker and reuse it across match attempts; the sets are
/// cleared on every reuse so no state leaks between attempts.
#[derive(Default)]
pub struct PerThreadData {
    sets: SparseSets,
}

impl PerThreadData {
    pub fn new() -> Self {
        PerThreadData {
            sets: SparseSets::new(64),
        }
    }
}

/// The cursor of one in-flight match attempt.
pub enum CurrentState<P> {
    /// Brzozowski mode: one canonical state.
    Deterministic(Arc<MatchingState<P>>),
    /// Powerset mode: the active NFA core states, in insertion order, plus
    /// a scratch set the transition swap writes into.
    Powerset {
        states: SparseSet,
        scratch: SparseSet,
    },
}

impl<P> CurrentState<P>
where
    P: Clone + Eq + std::hash::Hash + Send + Sync,
{
    /// Build a cursor positioned at `start`, in whichever mode the builder
    /// is currently in. In powerset mode the start node is treated as a
    /// disjunction and each member becomes one active core state.
    pub fn new<A>(
        builder: &StateBuilder<A>,
        start: &Arc<MatchingState<P>>,
        per_thread: &mut PerThreadData,
    ) -> Self
    where
        A: MintermAlgebra<Pred = P>,
    {
        if !builder.is_powerset() {
            return CurrentState::Deterministic(start.clone());
        }

        let mut states = std::mem::take(&mut per_thread.sets.set1);
        let mut scratch = std::mem::take(&mut per_thread.sets.set2);
        states.clear();
        scratch.clear();

        for alt in start.node_alternatives() {
            if alt.is_nothing() {
                continue;
            }
            let id = builder.create_nfa_state(alt, start.prev_char_kind());
            // Insert dedups; the dense order keeps alternative priority.
            states.insert(id as usize);
        }

        CurrentState::Powerset { states, scratch }
    }

    /// Hand the powerset buffers back to the scratch bundle so the next
    /// attempt on this worker reuses them.
    pub fn reclaim(self, per_thread: &mut PerThreadData) {
        if let CurrentState::Powerset { states, scratch } = self {
            per_thread.sets.set1 = states;
            per_thread.sets.set2 = scratch;
        }
    }

    /// Advance by one input minterm, in place.
    ///
    /// `minterm` may be the algebra's `False`, standing for the final line
    /// terminator; `minterm_id` must then be the builder's reserved
    /// sentinel id so the memoized cell is distinct from a plain newline.
    pub fn take_transition<A>(
        &mut self,
        builder: &StateBuilder<A>,
        minterm_id: u32,
        minterm: &P,
        per_thread: &mut PerThreadData,
    ) where
        A: MintermAlgebra<Pred = P>,
    {
        match self {
            CurrentState::Deterministic(state) => {
                let next = builder.dfa_transition(state, minterm_id, minterm);

                // Populating the cell may have pushed the builder over its
                // state budget; re-check the (monotonic) flag and rebuild
                // this cursor over the destination's alternatives.
                if builder.is_powerset() {
                    *self = CurrentState::new(builder, &next, per_thread);
                } else {
                    *state = next;
                }
            }
            CurrentState::Powerset { states, scratch } => {
                scratch.clear();
                for source in states.iter() {
                    let targets = builder.nfa_transition(source as u32, minterm_id, minterm);
                    for &target in targets.iter() {
                        scratch.insert(target as usize);
                    }
                }
                std::mem::swap(states, scratch);
            }
        }
    }

    /// Whether the pattern at this position starts with a line anchor.
    pub fn starts_with_line_anchor<A>(&self, builder: &StateBuilder<A>) -> bool
    where
        A: MintermAlgebra<Pred = P>,
    {
        match self {
            CurrentState::Deterministic(state) => state.starts_with_line_anchor(),
            CurrentState::Powerset { states, .. } => states
                .iter()
                .any(|id| builder.core_state(id as u32).starts_with_line_anchor()),
        }
    }

    /// Whether the current position is accepting, given the kind of the
    /// next character.
    pub fn is_nullable<A>(&self, builder: &StateBuilder<A>, next_char_kind: CharKind) -> bool
    where
        A: MintermAlgebra<Pred = P>,
    {
        match self {
            CurrentState::Deterministic(state) => state.is_nullable(next_char_kind),
            CurrentState::Powerset { states, .. } => states
                .iter()
                .any(|id| builder.core_state(id as u32).is_nullable(next_char_kind)),
        }
    }

    /// No transition out of here can lead to a match.
    pub fn is_deadend(&self) -> bool {
        match self {
            CurrentState::Deterministic(state) => state.is_deadend(),
            CurrentState::Powerset { states, .. } => states.is_empty(),
        }
    }

    /// The state rejects everything.
    pub fn is_nothing(&self) -> bool {
        match self {
            CurrentState::Deterministic(state) => state.is_nothing(),
            CurrentState::Powerset { states, .. } => states.is_empty(),
        }
    }

    /// Fixed-length marker value, or -1. Powerset mode carries no markers.
    pub fn fixed_length(&self) -> i32 {
        match self {
            CurrentState::Deterministic(state) => state.fixed_length(),
            CurrentState::Powerset { .. } => -1,
        }
    }

    /// Whether this is an initial state. No powerset set qualifies.
    pub fn is_initial_state(&self) -> bool {
        match self {
            CurrentState::Deterministic(state) => state.is_initial(),
            CurrentState::Powerset { .. } => false,
        }
    }
}
