//! Hash-consed symbolic derivative nodes.
//!
//! A node is an immutable algebraic view of the residual pattern at some
//! position. Nodes are interned: one canonical `Arc` per distinct value,
//! keyed by the addresses of (already canonical) children, so equality and
//! hashing degrade to pointer identity everywhere downstream. The
//! `NodeBuilder` owns the intern table, the character algebra, and the
//! word-letter/newline predicates the anchor machinery needs, and computes
//! derivatives: the ordered eager form used in deterministic mode and the
//! per-alternative enumeration with capture effects used in powerset mode.

use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use super::char_kind::{CharKind, Context};
use crate::algebra::MintermAlgebra;

/// A canonical, shared node reference.
pub type NodeRef<P> = Arc<SymbolicNode<P>>;

/// Anchor variants, each nullable under some contexts only.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum AnchorKind {
    /// `\A`: beginning of input.
    BeginningOfInput,
    /// `\z`: end of input.
    EndOfInput,
    /// `\Z`: end of input, or just before a final newline.
    EndOfInputOrFinalNewline,
    /// `^`: start of a line.
    LineStart,
    /// `$`: end of a line.
    LineEnd,
    /// `\b`
    WordBoundary,
    /// `\B`
    NonWordBoundary,
}

impl AnchorKind {
    fn is_line_anchor(self) -> bool {
        !matches!(self, AnchorKind::WordBoundary | AnchorKind::NonWordBoundary)
    }
}

/// A capture-boundary side effect attached to a transition alternative.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Effect {
    pub kind: EffectKind,
    pub group: u16,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum EffectKind {
    CaptureStart,
    CaptureEnd,
}

/// Effects gathered along one transition alternative.
pub type EffectList = SmallVec<[Effect; 2]>;

/// Transition alternatives paired with their effects.
pub type NodeTransitions<P> = SmallVec<[(NodeRef<P>, EffectList); 4]>;

#[derive(Debug)]
pub enum NodeKind<P> {
    /// The empty language; rejects everything.
    Nothing,
    /// The empty string.
    Epsilon,
    /// One input element satisfying the predicate.
    Singleton(P),
    Concat {
        left: NodeRef<P>,
        right: NodeRef<P>,
    },
    /// Ordered alternatives; flattened, duplicate-free, order is priority.
    Or {
        alts: Vec<NodeRef<P>>,
    },
    Loop {
        body: NodeRef<P>,
        lower: u32,
        upper: Option<u32>,
        lazy: bool,
    },
    Anchor(AnchorKind),
    /// Marks a nullable position together with the fixed length of the
    /// match ending there; used by reverse scans to recover start offsets.
    FixedLengthMarker {
        length: u32,
    },
    CaptureStart {
        group: u16,
    },
    CaptureEnd {
        group: u16,
    },
}

/// Flags precomputed when a node is interned.
#[derive(Clone, Copy, Debug)]
pub struct NodeInfo {
    /// Nullable in every context.
    pub is_always_nullable: bool,
    /// Nullable in at least one context.
    pub can_be_nullable: bool,
    /// Some descendant is an anchor, so nullability is context-sensitive.
    pub contains_anchor: bool,
    /// The node starts with `^`, `$`, `\A`, `\z` or `\Z`.
    pub starts_with_line_anchor: bool,
    /// The node prefers the shortest match (lazy loop at the head).
    pub is_lazy: bool,
}

/// An interned symbolic node. Obtain instances through [`NodeBuilder`];
/// equality of builder output is pointer identity.
#[derive(Debug)]
pub struct SymbolicNode<P> {
    kind: NodeKind<P>,
    info: NodeInfo,
}

impl<P> SymbolicNode<P> {
    #[inline]
    pub fn kind(&self) -> &NodeKind<P> {
        &self.kind
    }

    #[inline]
    pub fn info(&self) -> &NodeInfo {
        &self.info
    }

    /// True if this is the empty language.
    #[inline]
    pub fn is_nothing(&self) -> bool {
        matches!(self.kind, NodeKind::Nothing)
    }

    /// Whether the node accepts the empty string under the given context.
    pub fn is_nullable_for(&self, ctx: Context) -> bool {
        if !self.info.contains_anchor {
            return self.info.is_always_nullable;
        }
        if !self.info.can_be_nullable {
            return false;
        }
        match &self.kind {
            NodeKind::Nothing | NodeKind::Singleton(_) => false,
            NodeKind::Epsilon
            | NodeKind::FixedLengthMarker { .. }
            | NodeKind::CaptureStart { .. }
            | NodeKind::CaptureEnd { .. } => true,
            NodeKind::Anchor(kind) => anchor_nullable(*kind, ctx),
            NodeKind::Concat { left, right } => {
                left.is_nullable_for(ctx) && right.is_nullable_for(ctx)
            }
            NodeKind::Or { alts } => alts.iter().any(|a| a.is_nullable_for(ctx)),
            NodeKind::Loop { body, lower, .. } => *lower == 0 || body.is_nullable_for(ctx),
        }
    }

    /// The fixed length recorded for this state, or -1 if there is none.
    ///
    /// For an `Or`, the largest marker among the alternatives wins.
    pub fn fixed_length(&self) -> i32 {
        match &self.kind {
            NodeKind::FixedLengthMarker { length } => *length as i32,
            NodeKind::Or { alts } => alts
                .iter()
                .map(|a| a.fixed_length())
                .max()
                .unwrap_or(-1),
            _ => -1,
        }
    }
}

/// View a node as its list of alternatives: the members of an `Or`, or the
/// node itself as a single-member disjunction.
pub fn alternatives<P>(node: &NodeRef<P>) -> &[NodeRef<P>] {
    match &node.kind {
        NodeKind::Or { alts } => alts,
        _ => std::slice::from_ref(node),
    }
}

fn anchor_nullable(kind: AnchorKind, ctx: Context) -> bool {
    match kind {
        AnchorKind::BeginningOfInput => ctx.prev() == CharKind::StartStop,
        AnchorKind::EndOfInput => ctx.next() == CharKind::StartStop,
        AnchorKind::EndOfInputOrFinalNewline => ctx.next().is_final_boundary(),
        AnchorKind::LineStart => ctx.prev().is_line_boundary(),
        AnchorKind::LineEnd => ctx.next().is_line_boundary(),
        AnchorKind::WordBoundary => ctx.prev().is_word() != ctx.next().is_word(),
        AnchorKind::NonWordBoundary => ctx.prev().is_word() == ctx.next().is_word(),
    }
}

/// Intern-table key: children are identified by address, which is sound
/// because children are themselves canonical.
#[derive(PartialEq, Eq, Hash)]
enum NodeKey<P> {
    Singleton(P),
    Concat(usize, usize),
    Or(Vec<usize>),
    Loop(usize, u32, Option<u32>, bool),
    Anchor(AnchorKind),
    FixedLengthMarker(u32),
    CaptureStart(u16),
    CaptureEnd(u16),
}

fn addr<P>(node: &NodeRef<P>) -> usize {
    Arc::as_ptr(node) as usize
}

/// Owns the node graph: the intern table, the character algebra, and the
/// predicates anchor classification needs. Derivative computation lives
/// here because it creates nodes.
pub struct NodeBuilder<A: MintermAlgebra> {
    algebra: A,
    word_letter: A::Pred,
    newline: A::Pred,
    interned: Mutex<FxHashMap<NodeKey<A::Pred>, NodeRef<A::Pred>>>,
    nothing: NodeRef<A::Pred>,
    epsilon: NodeRef<A::Pred>,
}

impl<A: MintermAlgebra> NodeBuilder<A> {
    /// `word_letter` and `newline` are the predicates backing `\b`/`\B` and
    /// the newline special cases of minterm classification.
    pub fn new(algebra: A, word_letter: A::Pred, newline: A::Pred) -> Self {
        let nothing = Arc::new(SymbolicNode {
            kind: NodeKind::Nothing,
            info: NodeInfo {
                is_always_nullable: false,
                can_be_nullable: false,
                contains_anchor: false,
                starts_with_line_anchor: false,
                is_lazy: false,
            },
        });
        let epsilon = Arc::new(SymbolicNode {
            kind: NodeKind::Epsilon,
            info: NodeInfo {
                is_always_nullable: true,
                can_be_nullable: true,
                contains_anchor: false,
                starts_with_line_anchor: false,
                is_lazy: false,
            },
        });
        NodeBuilder {
            algebra,
            word_letter,
            newline,
            interned: Mutex::new(FxHashMap::default()),
            nothing,
            epsilon,
        }
    }

    #[inline]
    pub fn algebra(&self) -> &A {
        &self.algebra
    }

    #[inline]
    pub fn word_letter_pred(&self) -> &A::Pred {
        &self.word_letter
    }

    #[inline]
    pub fn newline_pred(&self) -> &A::Pred {
        &self.newline
    }

    #[inline]
    pub fn nothing(&self) -> NodeRef<A::Pred> {
        self.nothing.clone()
    }

    #[inline]
    pub fn epsilon(&self) -> NodeRef<A::Pred> {
        self.epsilon.clone()
    }

    fn intern(
        &self,
        key: NodeKey<A::Pred>,
        make: impl FnOnce() -> SymbolicNode<A::Pred>,
    ) -> NodeRef<A::Pred> {
        let mut map = self.interned.lock();
        if let Some(existing) = map.get(&key) {
            return existing.clone();
        }
        let node = Arc::new(make());
        map.insert(key, node.clone());
        node
    }

    /// A node matching one input element satisfying `pred`.
    pub fn mk_singleton(&self, pred: A::Pred) -> NodeRef<A::Pred> {
        if !self.algebra.is_satisfiable(&pred) {
            return self.nothing();
        }
        self.intern(NodeKey::Singleton(pred.clone()), || SymbolicNode {
            kind: NodeKind::Singleton(pred),
            info: NodeInfo {
                is_always_nullable: false,
                can_be_nullable: false,
                contains_anchor: false,
                starts_with_line_anchor: false,
                is_lazy: false,
            },
        })
    }

    pub fn mk_concat(
        &self,
        left: NodeRef<A::Pred>,
        right: NodeRef<A::Pred>,
    ) -> NodeRef<A::Pred> {
        if left.is_nothing() || right.is_nothing() {
            return self.nothing();
        }
        if matches!(left.kind, NodeKind::Epsilon) {
            return right;
        }
        if matches!(right.kind, NodeKind::Epsilon) {
            return left;
        }
        let key = NodeKey::Concat(addr(&left), addr(&right));
        self.intern(key, || {
            let info = NodeInfo {
                is_always_nullable: left.info.is_always_nullable && right.info.is_always_nullable,
                can_be_nullable: left.info.can_be_nullable && right.info.can_be_nullable,
                contains_anchor: left.info.contains_anchor || right.info.contains_anchor,
                starts_with_line_anchor: left.info.starts_with_line_anchor
                    || (left.info.can_be_nullable && right.info.starts_with_line_anchor),
                is_lazy: left.info.is_lazy,
            };
            SymbolicNode {
                kind: NodeKind::Concat { left, right },
                info,
            }
        })
    }

    /// Ordered disjunction. Nested `Or`s are flattened, `Nothing` members
    /// and duplicates dropped, first occurrence keeps its position.
    pub fn mk_or(&self, alts: Vec<NodeRef<A::Pred>>) -> NodeRef<A::Pred> {
        let mut flat: Vec<NodeRef<A::Pred>> = Vec::with_capacity(alts.len());
        for alt in alts {
            match &alt.kind {
                NodeKind::Nothing => {}
                NodeKind::Or { alts: inner } => {
                    for member in inner {
                        if !flat.iter().any(|f| Arc::ptr_eq(f, member)) {
                            flat.push(member.clone());
                        }
                    }
                }
                _ => {
                    if !flat.iter().any(|f| Arc::ptr_eq(f, &alt)) {
                        flat.push(alt);
                    }
                }
            }
        }
        match flat.len() {
            0 => self.nothing(),
            1 => flat.pop().unwrap(),
            _ => {
                let key = NodeKey::Or(flat.iter().map(addr).collect());
                self.intern(key, || {
                    let info = NodeInfo {
                        is_always_nullable: flat.iter().any(|a| a.info.is_always_nullable),
                        can_be_nullable: flat.iter().any(|a| a.info.can_be_nullable),
                        contains_anchor: flat.iter().any(|a| a.info.contains_anchor),
                        starts_with_line_anchor: flat
                            .iter()
                            .any(|a| a.info.starts_with_line_anchor),
                        is_lazy: flat.iter().all(|a| a.info.is_lazy),
                    };
                    SymbolicNode {
                        kind: NodeKind::Or { alts: flat },
                        info,
                    }
                })
            }
        }
    }

    pub fn mk_loop(
        &self,
        body: NodeRef<A::Pred>,
        lower: u32,
        upper: Option<u32>,
        lazy: bool,
    ) -> NodeRef<A::Pred> {
        if upper == Some(0) {
            return self.epsilon();
        }
        if matches!(body.kind, NodeKind::Epsilon) {
            return self.epsilon();
        }
        if body.is_nothing() {
            return if lower == 0 { self.epsilon() } else { self.nothing() };
        }
        if lower == 1 && upper == Some(1) {
            return body;
        }
        let key = NodeKey::Loop(addr(&body), lower, upper, lazy);
        self.intern(key, || {
            let info = NodeInfo {
                is_always_nullable: lower == 0 || body.info.is_always_nullable,
                can_be_nullable: lower == 0 || body.info.can_be_nullable,
                contains_anchor: body.info.contains_anchor,
                starts_with_line_anchor: body.info.starts_with_line_anchor,
                is_lazy: lazy,
            };
            SymbolicNode {
                kind: NodeKind::Loop {
                    body,
                    lower,
                    upper,
                    lazy,
                },
                info,
            }
        })
    }

    pub fn mk_anchor(&self, kind: AnchorKind) -> NodeRef<A::Pred> {
        self.intern(NodeKey::Anchor(kind), || SymbolicNode {
            kind: NodeKind::Anchor(kind),
            info: NodeInfo {
                is_always_nullable: false,
                can_be_nullable: true,
                contains_anchor: true,
                starts_with_line_anchor: kind.is_line_anchor(),
                is_lazy: false,
            },
        })
    }

    pub fn mk_fixed_length_marker(&self, length: u32) -> NodeRef<A::Pred> {
        self.intern(NodeKey::FixedLengthMarker(length), || SymbolicNode {
            kind: NodeKind::FixedLengthMarker { length },
            info: NodeInfo {
                is_always_nullable: true,
                can_be_nullable: true,
                contains_anchor: false,
                starts_with_line_anchor: false,
                is_lazy: false,
            },
        })
    }

    pub fn mk_capture_start(&self, group: u16) -> NodeRef<A::Pred> {
        self.intern(NodeKey::CaptureStart(group), || SymbolicNode {
            kind: NodeKind::CaptureStart { group },
            info: NodeInfo {
                is_always_nullable: true,
                can_be_nullable: true,
                contains_anchor: false,
                starts_with_line_anchor: false,
                is_lazy: false,
            },
        })
    }

    pub fn mk_capture_end(&self, group: u16) -> NodeRef<A::Pred> {
        self.intern(NodeKey::CaptureEnd(group), || SymbolicNode {
            kind: NodeKind::CaptureEnd { group },
            info: NodeInfo {
                is_always_nullable: true,
                can_be_nullable: true,
                contains_anchor: false,
                starts_with_line_anchor: false,
                is_lazy: false,
            },
        })
    }

    /// The ordered eager derivative: the single node reached after
    /// consuming one element of `minterm` under `ctx`. Alternatives stay
    /// merged into one `Or`, ordered by priority; effects are suppressed.
    pub fn transition_ordered(
        &self,
        node: &NodeRef<A::Pred>,
        minterm: &A::Pred,
        ctx: Context,
    ) -> NodeRef<A::Pred> {
        match &node.kind {
            NodeKind::Nothing
            | NodeKind::Epsilon
            | NodeKind::Anchor(_)
            | NodeKind::FixedLengthMarker { .. }
            | NodeKind::CaptureStart { .. }
            | NodeKind::CaptureEnd { .. } => self.nothing(),
            NodeKind::Singleton(pred) => {
                if self.algebra.is_satisfiable(&self.algebra.and(pred, minterm)) {
                    self.epsilon()
                } else {
                    self.nothing()
                }
            }
            NodeKind::Concat { left, right } => {
                let left_deriv =
                    self.mk_concat(self.transition_ordered(left, minterm, ctx), right.clone());
                if !left.is_nullable_for(ctx) {
                    return left_deriv;
                }
                let right_deriv = self.transition_ordered(right, minterm, ctx);
                // A lazy head prefers exiting, so the skip path wins ties.
                if left.info.is_lazy {
                    self.mk_or(vec![right_deriv, left_deriv])
                } else {
                    self.mk_or(vec![left_deriv, right_deriv])
                }
            }
            NodeKind::Or { alts } => {
                let derivs = alts
                    .iter()
                    .map(|a| self.transition_ordered(a, minterm, ctx))
                    .collect();
                self.mk_or(derivs)
            }
            NodeKind::Loop {
                body,
                lower,
                upper,
                lazy,
            } => {
                let body_deriv = self.transition_ordered(body, minterm, ctx);
                let continued = self.mk_loop(
                    body.clone(),
                    lower.saturating_sub(1),
                    upper.map(|u| u - 1),
                    *lazy,
                );
                self.mk_concat(body_deriv, continued)
            }
        }
    }

    /// Enumerate every transition alternative separately, each paired with
    /// the capture effects its path crosses. This is the powerset-mode
    /// derivative: an `Or` fans out into one entry per member, and the
    /// nullable-skip path through a concatenation records the capture
    /// boundaries of the part skipped over.
    pub fn transitions_with_effects(
        &self,
        node: &NodeRef<A::Pred>,
        minterm: &A::Pred,
        ctx: Context,
    ) -> NodeTransitions<A::Pred> {
        let mut out = NodeTransitions::new();
        self.push_transitions(node, minterm, ctx, &EffectList::new(), &mut out);
        out
    }

    fn push_transitions(
        &self,
        node: &NodeRef<A::Pred>,
        minterm: &A::Pred,
        ctx: Context,
        pending: &EffectList,
        out: &mut NodeTransitions<A::Pred>,
    ) {
        match &node.kind {
            NodeKind::Nothing
            | NodeKind::Epsilon
            | NodeKind::Anchor(_)
            | NodeKind::FixedLengthMarker { .. }
            | NodeKind::CaptureStart { .. }
            | NodeKind::CaptureEnd { .. } => {}
            NodeKind::Singleton(pred) => {
                if self.algebra.is_satisfiable(&self.algebra.and(pred, minterm)) {
                    out.push((self.epsilon(), pending.clone()));
                }
            }
            NodeKind::Or { alts } => {
                for alt in alts {
                    self.push_transitions(alt, minterm, ctx, pending, out);
                }
            }
            NodeKind::Concat { left, right } => {
                let take_left = |out: &mut NodeTransitions<A::Pred>| {
                    let mut left_out = NodeTransitions::new();
                    self.push_transitions(left, minterm, ctx, pending, &mut left_out);
                    for (deriv, effects) in left_out {
                        let joined = self.mk_concat(deriv, right.clone());
                        if !joined.is_nothing() {
                            out.push((joined, effects));
                        }
                    }
                };
                let skip_left = |out: &mut NodeTransitions<A::Pred>| {
                    let mut carried = pending.clone();
                    collect_nullability_effects(left, ctx, &mut carried);
                    self.push_transitions(right, minterm, ctx, &carried, out);
                };
                if !left.is_nullable_for(ctx) {
                    take_left(out);
                } else if left.info.is_lazy {
                    skip_left(out);
                    take_left(out);
                } else {
                    take_left(out);
                    skip_left(out);
                }
            }
            NodeKind::Loop {
                body,
                lower,
                upper,
                lazy,
            } => {
                let continued = self.mk_loop(
                    body.clone(),
                    lower.saturating_sub(1),
                    upper.map(|u| u - 1),
                    *lazy,
                );
                let mut body_out = NodeTransitions::new();
                self.push_transitions(body, minterm, ctx, pending, &mut body_out);
                for (deriv, effects) in body_out {
                    let joined = self.mk_concat(deriv, continued.clone());
                    if !joined.is_nothing() {
                        out.push((joined, effects));
                    }
                }
            }
        }
    }
}

/// Collect the capture effects crossed when a nullable node is skipped over.
///
/// Follows the highest-priority nullable path: the first nullable `Or`
/// member, the body of a mandatory loop, both sides of a concatenation.
fn collect_nullability_effects<P>(node: &NodeRef<P>, ctx: Context, out: &mut EffectList) {
    match &node.kind {
        NodeKind::CaptureStart { group } => out.push(Effect {
            kind: EffectKind::CaptureStart,
            group: *group,
        }),
        NodeKind::CaptureEnd { group } => out.push(Effect {
            kind: EffectKind::CaptureEnd,
            group: *group,
        }),
        NodeKind::Concat { left, right } => {
            collect_nullability_effects(left, ctx, out);
            collect_nullability_effects(right, ctx, out);
        }
        NodeKind::Or { alts } => {
            if let Some(first) = alts.iter().find(|a| a.is_nullable_for(ctx)) {
                collect_nullability_effects(first, ctx, out);
            }
        }
        NodeKind::Loop { body, lower, .. } => {
            // A loop with a mandatory iteration is skipped through its body;
            // an optional loop is skipped by taking zero iterations.
            if *lower > 0 {
                collect_nullability_effects(body, ctx, out);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algebra::{compute_minterms, MintermSetAlgebra};
    use crate::automaton::char_kind::CharKind;
    use crate::byteset::ByteSet;

    fn test_builder() -> NodeBuilder<MintermSetAlgebra> {
        let a = ByteSet::singleton(b'a');
        let word = {
            let mut s = ByteSet::range(b'a', b'z');
            s.add_range(b'A', b'Z');
            s.add_range(b'0', b'9');
            s.add(b'_');
            s
        };
        let nl = ByteSet::singleton(b'\n');
        let alg = MintermSetAlgebra::new(compute_minterms(&[a, word, nl]));
        let word_mask = alg.translate(&word);
        let nl_mask = alg.translate(&nl);
        NodeBuilder::new(alg, word_mask, nl_mask)
    }

    fn ctx(prev: CharKind, next: CharKind) -> Context {
        Context::new(prev, next)
    }

    #[test]
    fn test_interning_is_canonical() {
        let b = test_builder();
        let pred = b.algebra().translate(&ByteSet::singleton(b'a'));
        let s1 = b.mk_singleton(pred);
        let s2 = b.mk_singleton(pred);
        assert!(Arc::ptr_eq(&s1, &s2));

        let c1 = b.mk_concat(s1.clone(), s2.clone());
        let c2 = b.mk_concat(s1.clone(), s2.clone());
        assert!(Arc::ptr_eq(&c1, &c2));
    }

    #[test]
    fn test_constructor_simplifications() {
        let b = test_builder();
        let pred = b.algebra().translate(&ByteSet::singleton(b'a'));
        let a = b.mk_singleton(pred);

        assert!(b.mk_singleton(0).is_nothing());
        assert!(Arc::ptr_eq(&b.mk_concat(b.epsilon(), a.clone()), &a));
        assert!(Arc::ptr_eq(&b.mk_concat(a.clone(), b.epsilon()), &a));
        assert!(b.mk_concat(a.clone(), b.nothing()).is_nothing());
        assert!(b.mk_or(vec![]).is_nothing());
        assert!(Arc::ptr_eq(&b.mk_or(vec![b.nothing(), a.clone()]), &a));
        assert!(Arc::ptr_eq(&b.mk_or(vec![a.clone(), a.clone()]), &a));
        assert!(matches!(
            b.mk_loop(a.clone(), 0, Some(0), false).kind(),
            NodeKind::Epsilon
        ));
        assert!(Arc::ptr_eq(&b.mk_loop(a.clone(), 1, Some(1), false), &a));
    }

    #[test]
    fn test_or_flattening_preserves_order() {
        let b = test_builder();
        let pa = b.algebra().translate(&ByteSet::singleton(b'a'));
        let pb = b.algebra().translate(&ByteSet::singleton(b'b'));
        let a = b.mk_singleton(pa);
        let x = b.mk_singleton(pb);
        let inner = b.mk_or(vec![a.clone(), x.clone()]);
        let outer = b.mk_or(vec![inner, a.clone()]);
        match outer.kind() {
            NodeKind::Or { alts } => {
                assert_eq!(alts.len(), 2);
                assert!(Arc::ptr_eq(&alts[0], &a));
                assert!(Arc::ptr_eq(&alts[1], &x));
            }
            other => panic!("expected Or, got {:?}", other),
        }
    }

    #[test]
    fn test_anchor_nullability() {
        let b = test_builder();
        let caret = b.mk_anchor(AnchorKind::LineStart);
        assert!(caret.is_nullable_for(ctx(CharKind::StartStop, CharKind::General)));
        assert!(caret.is_nullable_for(ctx(CharKind::Newline, CharKind::General)));
        assert!(!caret.is_nullable_for(ctx(CharKind::General, CharKind::General)));
        assert!(!caret.is_nullable_for(ctx(CharKind::WordLetter, CharKind::General)));

        let dollar = b.mk_anchor(AnchorKind::LineEnd);
        assert!(dollar.is_nullable_for(ctx(CharKind::General, CharKind::Newline)));
        assert!(dollar.is_nullable_for(ctx(CharKind::General, CharKind::StartStop)));
        assert!(!dollar.is_nullable_for(ctx(CharKind::General, CharKind::WordLetter)));

        let end_z = b.mk_anchor(AnchorKind::EndOfInputOrFinalNewline);
        assert!(end_z.is_nullable_for(ctx(CharKind::General, CharKind::NewLineS)));
        assert!(end_z.is_nullable_for(ctx(CharKind::General, CharKind::StartStop)));
        assert!(!end_z.is_nullable_for(ctx(CharKind::General, CharKind::Newline)));

        let wb = b.mk_anchor(AnchorKind::WordBoundary);
        assert!(wb.is_nullable_for(ctx(CharKind::StartStop, CharKind::WordLetter)));
        assert!(wb.is_nullable_for(ctx(CharKind::WordLetter, CharKind::General)));
        assert!(!wb.is_nullable_for(ctx(CharKind::WordLetter, CharKind::WordLetter)));
        assert!(!wb.is_nullable_for(ctx(CharKind::General, CharKind::General)));
    }

    #[test]
    fn test_derivative_basics() {
        let b = test_builder();
        let pa = b.algebra().translate(&ByteSet::singleton(b'a'));
        let a = b.mk_singleton(pa);
        let c = ctx(CharKind::StartStop, CharKind::WordLetter);

        // d_a(a) = epsilon, d_b(a) = nothing
        let pb = b.algebra().translate(&ByteSet::singleton(b'b'));
        assert!(matches!(
            b.transition_ordered(&a, &pa, c).kind(),
            NodeKind::Epsilon
        ));
        assert!(b.transition_ordered(&a, &pb, c).is_nothing());

        // d_a(aa) = a
        let aa = b.mk_concat(a.clone(), a.clone());
        assert!(Arc::ptr_eq(&b.transition_ordered(&aa, &pa, c), &a));

        // d_a(a*) = a*
        let star = b.mk_loop(a.clone(), 0, None, false);
        assert!(Arc::ptr_eq(&b.transition_ordered(&star, &pa, c), &star));

        // Bounded loop counts down: d_a(a{2,3}) = a{1,2}
        let bounded = b.mk_loop(a.clone(), 2, Some(3), false);
        let expect = b.mk_loop(a.clone(), 1, Some(2), false);
        assert!(Arc::ptr_eq(&b.transition_ordered(&bounded, &pa, c), &expect));
    }

    #[test]
    fn test_derivative_through_nullable_prefix() {
        let b = test_builder();
        let pa = b.algebra().translate(&ByteSet::singleton(b'a'));
        let pb = b.algebra().translate(&ByteSet::singleton(b'b'));
        let a = b.mk_singleton(pa);
        let x = b.mk_singleton(pb);
        let c = ctx(CharKind::StartStop, CharKind::WordLetter);

        // d_b(a?b) must reach b through the skipped a.
        let opt_a = b.mk_loop(a.clone(), 0, Some(1), false);
        let node = b.mk_concat(opt_a, x.clone());
        let deriv = b.transition_ordered(&node, &pb, c);
        assert!(matches!(deriv.kind(), NodeKind::Epsilon));
    }

    #[test]
    fn test_transitions_with_effects_enumerates_alternatives() {
        let b = test_builder();
        let pa = b.algebra().translate(&ByteSet::singleton(b'a'));
        let a = b.mk_singleton(pa);
        let aa = b.mk_concat(a.clone(), a.clone());
        let or = b.mk_or(vec![a.clone(), aa.clone()]);
        let c = ctx(CharKind::StartStop, CharKind::WordLetter);

        let transitions = b.transitions_with_effects(&or, &pa, c);
        assert_eq!(transitions.len(), 2);
        assert!(matches!(transitions[0].0.kind(), NodeKind::Epsilon));
        assert!(Arc::ptr_eq(&transitions[1].0, &a));
        assert!(transitions[0].1.is_empty());
        assert!(transitions[1].1.is_empty());
    }

    #[test]
    fn test_capture_effects_on_skip_path() {
        let b = test_builder();
        let pa = b.algebra().translate(&ByteSet::singleton(b'a'));
        let x = b.mk_singleton(pa);
        let c = ctx(CharKind::StartStop, CharKind::WordLetter);

        // ( <start 1> <end 1> ) a : consuming `a` crosses both boundaries.
        let group = b.mk_concat(b.mk_capture_start(1), b.mk_capture_end(1));
        let node = b.mk_concat(group, x.clone());
        let transitions = b.transitions_with_effects(&node, &pa, c);
        assert_eq!(transitions.len(), 1);
        let effects = &transitions[0].1;
        assert_eq!(
            effects.as_slice(),
            &[
                Effect {
                    kind: EffectKind::CaptureStart,
                    group: 1
                },
                Effect {
                    kind: EffectKind::CaptureEnd,
                    group: 1
                },
            ]
        );
    }

    #[test]
    fn test_fixed_length() {
        let b = test_builder();
        let pa = b.algebra().translate(&ByteSet::singleton(b'a'));
        let a = b.mk_singleton(pa);

        assert_eq!(a.fixed_length(), -1);
        assert_eq!(b.mk_fixed_length_marker(3).fixed_length(), 3);

        let or = b.mk_or(vec![
            b.mk_fixed_length_marker(2),
            b.mk_fixed_length_marker(5),
            a.clone(),
        ]);
        assert_eq!(or.fixed_length(), 5);
    }

    #[test]
    fn test_lazy_flag_propagation() {
        let b = test_builder();
        let pa = b.algebra().translate(&ByteSet::singleton(b'a'));
        let a = b.mk_singleton(pa);

        let lazy_star = b.mk_loop(a.clone(), 0, None, true);
        assert!(lazy_star.info().is_lazy);
        let headed = b.mk_concat(lazy_star, a.clone());
        assert!(headed.info().is_lazy);

        let greedy_star = b.mk_loop(a.clone(), 0, None, false);
        assert!(!greedy_star.info().is_lazy);
    }
}
