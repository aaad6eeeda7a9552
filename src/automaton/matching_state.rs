//! A single deterministic automaton state.
//!
//! A `MatchingState` pairs a derivative node with the kind of the character
//! preceding the current position; the pair is what anchors need to decide
//! nullability without re-deriving anything. States are interned by the
//! [`StateBuilder`](super::builder::StateBuilder): exactly one canonical
//! instance exists per `(node, prev_char_kind)` value, carrying a stable id
//! assigned at interning time.

use std::sync::Arc;

use smallvec::SmallVec;

use super::builder::{StateBuilder, StateId};
use super::char_kind::{CharKind, Context};
use super::node::{alternatives, EffectList, NodeRef};
use crate::algebra::MintermAlgebra;

/// One deterministic automaton state: `(node, prev_char_kind)`.
///
/// Equality is by value (previous kind plus canonical node identity); the
/// id is stable and assigned once by the builder.
pub struct MatchingState<P> {
    node: NodeRef<P>,
    prev_char_kind: CharKind,
    id: StateId,
    is_initial: bool,
}

/// Transition alternatives out of a state, each with its capture effects.
pub type StateTransitions<P> = SmallVec<[(Arc<MatchingState<P>>, EffectList); 4]>;

impl<P> MatchingState<P> {
    pub(crate) fn new(
        node: NodeRef<P>,
        prev_char_kind: CharKind,
        id: StateId,
        is_initial: bool,
    ) -> Self {
        MatchingState {
            node,
            prev_char_kind,
            id,
            is_initial,
        }
    }

    #[inline]
    pub fn node(&self) -> &NodeRef<P> {
        &self.node
    }

    #[inline]
    pub fn prev_char_kind(&self) -> CharKind {
        self.prev_char_kind
    }

    /// The stable id assigned when the state was interned.
    #[inline]
    pub fn id(&self) -> StateId {
        self.id
    }

    #[inline]
    pub fn is_initial(&self) -> bool {
        self.is_initial
    }

    /// State prefers the shortest match.
    #[inline]
    pub fn is_lazy(&self) -> bool {
        self.node.info().is_lazy
    }

    /// This is a dead-end state: no input can lead to a match.
    #[inline]
    pub fn is_deadend(&self) -> bool {
        self.node.is_nothing()
    }

    /// State rejects everything, including the empty string.
    #[inline]
    pub fn is_nothing(&self) -> bool {
        self.node.is_nothing()
    }

    /// State starts with `^`, `$`, `\A`, `\z` or `\Z`.
    #[inline]
    pub fn starts_with_line_anchor(&self) -> bool {
        self.node.info().starts_with_line_anchor
    }

    /// The fixed-length marker recorded here, or -1 if there is none.
    #[inline]
    pub fn fixed_length(&self) -> i32 {
        self.node.fixed_length()
    }

    /// Whether this state accepts at the current position, given the kind
    /// of the next character. The kind domain is closed by construction;
    /// callers pass one of the five `CharKind` values.
    #[inline]
    pub fn is_nullable(&self, next_char_kind: CharKind) -> bool {
        let context = Context::new(self.prev_char_kind, next_char_kind);
        self.node.is_nullable_for(context)
    }

    /// Classify an incoming minterm into a [`CharKind`].
    ///
    /// The algebra's `False` is not a real character class here: it stands
    /// for the very last `\n` of the input. It classifies as `NewLineS` and
    /// is rewritten in place to the actual newline predicate so derivative
    /// computation still sees a satisfiable predicate. A plain newline seen
    /// from the start state is also `NewLineS`, so a reversed automaton
    /// treats the first `\n` symmetrically to the last.
    pub fn next_char_kind<A>(&self, builder: &StateBuilder<A>, minterm: &mut A::Pred) -> CharKind
    where
        A: MintermAlgebra<Pred = P>,
        P: Clone + Eq + std::hash::Hash + Send + Sync,
    {
        let nodes = builder.nodes();
        let algebra = nodes.algebra();
        if *minterm == algebra.empty() {
            *minterm = nodes.newline_pred().clone();
            return CharKind::NewLineS;
        }
        if *minterm == *nodes.newline_pred() {
            return if self.prev_char_kind == CharKind::StartStop {
                CharKind::NewLineS
            } else {
                CharKind::Newline
            };
        }
        if algebra.is_satisfiable(&algebra.and(nodes.word_letter_pred(), minterm)) {
            return CharKind::WordLetter;
        }
        CharKind::General
    }

    /// Compute the target state for the given input minterm.
    ///
    /// `minterm` may be the algebra's `False`, meaning the final `\n`.
    pub fn next<A>(&self, builder: &StateBuilder<A>, minterm: &A::Pred) -> Arc<MatchingState<P>>
    where
        A: MintermAlgebra<Pred = P>,
        P: Clone + Eq + std::hash::Hash + Send + Sync,
    {
        let mut minterm = minterm.clone();
        let next_char_kind = self.next_char_kind(builder, &mut minterm);
        let context = Context::new(self.prev_char_kind, next_char_kind);

        let derivative = builder
            .nodes()
            .transition_ordered(&self.node, &minterm, context);

        // next_char_kind becomes the prev kind of the target state.
        builder.create_state(&derivative, next_char_kind)
    }

    /// Compute the set of transition alternatives for the given minterm,
    /// each paired with the capture effects to apply when taking it. Every
    /// destination is canonicalized exactly as in [`Self::next`].
    pub fn eager_transitions_with_effects<A>(
        &self,
        builder: &StateBuilder<A>,
        minterm: &A::Pred,
    ) -> StateTransitions<P>
    where
        A: MintermAlgebra<Pred = P>,
        P: Clone + Eq + std::hash::Hash + Send + Sync,
    {
        let mut minterm = minterm.clone();
        let next_char_kind = self.next_char_kind(builder, &mut minterm);
        let context = Context::new(self.prev_char_kind, next_char_kind);

        builder
            .nodes()
            .transitions_with_effects(&self.node, &minterm, context)
            .into_iter()
            .map(|(derivative, effects)| (builder.create_state(&derivative, next_char_kind), effects))
            .collect()
    }

    /// The alternatives this state fans out into in powerset mode: the
    /// members of an `Or` node, or the node itself.
    pub(crate) fn node_alternatives(&self) -> &[NodeRef<P>] {
        alternatives(&self.node)
    }
}

impl<P> PartialEq for MatchingState<P> {
    fn eq(&self, other: &Self) -> bool {
        self.prev_char_kind == other.prev_char_kind && Arc::ptr_eq(&self.node, &other.node)
    }
}

impl<P> Eq for MatchingState<P> {}

impl<P> std::hash::Hash for MatchingState<P> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        (Arc::as_ptr(&self.node) as usize).hash(state);
        self.prev_char_kind.hash(state);
    }
}

impl<P> std::fmt::Debug for MatchingState<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MatchingState")
            .field("id", &self.id)
            .field("prev_char_kind", &self.prev_char_kind)
            .finish()
    }
}
