//! Automaton-level tests: canonical interning, transition determinism,
//! mode equivalence, sentinel handling, and shared-cache concurrency.

use std::sync::Arc;

use super::builder::StateBuilder;
use super::char_kind::{CharKind, Context};
use super::current_state::{CurrentState, PerThreadData};
use super::node::{EffectKind, NodeKind};
use crate::algebra::{MintermAlgebra, MintermSetAlgebra};
use crate::matcher::Pattern;

fn builder_of(p: &Pattern) -> &Arc<StateBuilder<MintermSetAlgebra>> {
    p.state_builder()
}

fn minterm_for(p: &Pattern, byte: u8) -> (u32, u64) {
    let algebra = builder_of(p).nodes().algebra();
    let id = algebra.minterm_id(byte);
    (id, algebra.mask_of(id))
}

#[test]
fn test_canonical_state_uniqueness_concurrent() {
    let p = Pattern::new("a|aa").unwrap();
    let builder = builder_of(&p).clone();
    let root = p.root().clone();

    let ids: Vec<u32> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let builder = builder.clone();
                let root = root.clone();
                scope.spawn(move || builder.create_state(&root, CharKind::General).id())
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert!(ids.windows(2).all(|w| w[0] == w[1]));
}

#[test]
fn test_transition_determinism() {
    let p = Pattern::new("a|aa").unwrap();
    let builder = builder_of(&p);
    let (id, mask) = minterm_for(&p, b'a');

    let start = p.initial_for(CharKind::StartStop).clone();
    let first = builder.dfa_transition(&start, id, &mask);
    let second = builder.dfa_transition(&start, id, &mask);

    // Same canonical instance both times, even though the second call hits
    // the cache the first one populated.
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(first, second);
    assert!(Arc::ptr_eq(first.node(), second.node()));
    assert_eq!(first.prev_char_kind(), second.prev_char_kind());
}

#[test]
fn test_blowup_scenario_dfa_and_nfa_agree() {
    // Alternatives `a` and `aa` over "aa": nullable after the first `a`
    // (via `a`) and after the second (via `aa`), in both modes.
    for forced_nfa in [false, true] {
        let p = if forced_nfa {
            Pattern::new_nfa("a|aa").unwrap()
        } else {
            Pattern::new("a|aa").unwrap()
        };
        let builder = builder_of(&p);
        let (id, mask) = minterm_for(&p, b'a');

        let mut scratch = PerThreadData::new();
        let start = p.initial_for(CharKind::StartStop);
        let mut cur = CurrentState::new(builder, start, &mut scratch);
        assert!(!cur.is_nullable(builder, CharKind::StartStop));

        cur.take_transition(builder, id, &mask, &mut scratch);
        assert!(
            cur.is_nullable(builder, CharKind::StartStop),
            "nullable after first 'a' (forced_nfa={})",
            forced_nfa
        );

        cur.take_transition(builder, id, &mask, &mut scratch);
        assert!(
            cur.is_nullable(builder, CharKind::StartStop),
            "nullable after second 'a' (forced_nfa={})",
            forced_nfa
        );

        cur.take_transition(builder, id, &mask, &mut scratch);
        assert!(cur.is_deadend());
        cur.reclaim(&mut scratch);
    }
}

#[test]
fn test_nullability_matches_single_char_acceptance() {
    let patterns = ["a", "[0-9]", "a|b", "ab", "a?"];
    let chars = [b'a', b'b', b'5', b'x'];
    for pattern in patterns {
        let p = Pattern::new(pattern).unwrap();
        let builder = builder_of(&p);
        for c in chars {
            let (id, mask) = minterm_for(&p, c);
            let start = p.initial_for(CharKind::StartStop).clone();
            let after = builder.dfa_transition(&start, id, &mask);
            let accepts_whole = p.find(&[c]).map(|(s, e)| s == 0 && e == 1).unwrap_or(false);
            assert_eq!(
                after.is_nullable(CharKind::General),
                accepts_whole,
                "pattern {:?} on char {:?}",
                pattern,
                c as char
            );
        }
    }
}

#[test]
fn test_sentinel_rewrites_to_newline_predicate() {
    let p = Pattern::new("a\n").unwrap();
    let builder = builder_of(&p);
    let nodes = builder.nodes();
    let algebra = nodes.algebra();

    let start = p.initial_for(CharKind::StartStop).clone();

    // The reserved False classifies as NewLineS and is rewritten in place.
    let mut minterm = algebra.empty();
    let kind = start.next_char_kind(builder, &mut minterm);
    assert_eq!(kind, CharKind::NewLineS);
    assert_eq!(minterm, *nodes.newline_pred());

    // From a StartStop-context state, the destination reached via the
    // sentinel equals the one reached by the real newline predicate.
    let via_sentinel = start.next(builder, &algebra.empty());
    let via_newline = start.next(builder, nodes.newline_pred());
    assert!(Arc::ptr_eq(&via_sentinel, &via_newline));
    assert_eq!(via_sentinel.prev_char_kind(), CharKind::NewLineS);

    // From a mid-input state the same newline is a plain Newline, so the
    // two destinations differ in their context.
    let mid = builder.create_state(p.root(), CharKind::General);
    let via_sentinel = mid.next(builder, &algebra.empty());
    let via_newline = mid.next(builder, nodes.newline_pred());
    assert_eq!(via_sentinel.prev_char_kind(), CharKind::NewLineS);
    assert_eq!(via_newline.prev_char_kind(), CharKind::Newline);
}

#[test]
fn test_line_anchor_context_scenario() {
    // `^ab` entered mid-string (prev kind General) must not accept; the
    // same pattern entered at a line start must.
    let p = Pattern::new("^ab").unwrap();

    // The anchor alone distinguishes the two entry contexts.
    let root_ctx_start = Context::new(CharKind::StartStop, CharKind::General);
    let root_ctx_mid = Context::new(CharKind::General, CharKind::General);
    let anchor = Pattern::new("^").unwrap();
    assert!(anchor.root().is_nullable_for(root_ctx_start));
    assert!(!anchor.root().is_nullable_for(root_ctx_mid));
    assert!(anchor
        .initial_for(CharKind::StartStop)
        .is_nullable(CharKind::General));
    assert!(!anchor
        .initial_for(CharKind::General)
        .is_nullable(CharKind::General));

    // Driven through the matcher: mid-string entry cannot satisfy `^ab`.
    let mut scratch = PerThreadData::new();
    assert_eq!(p.match_end_at(b"xab", 1, &mut scratch), None);
    assert_eq!(p.match_end_at(b"ab", 0, &mut scratch), Some(2));

    // The cursor reports the leading anchor in both modes.
    let builder = builder_of(&p);
    let cur = CurrentState::new(builder, p.initial_for(CharKind::StartStop), &mut scratch);
    assert!(cur.starts_with_line_anchor(builder));

    let nfa = Pattern::new_nfa("^ab").unwrap();
    let builder = builder_of(&nfa);
    let cur = CurrentState::new(builder, nfa.initial_for(CharKind::StartStop), &mut scratch);
    assert!(cur.starts_with_line_anchor(builder));
    cur.reclaim(&mut scratch);
}

#[test]
fn test_eager_transitions_carry_capture_effects() {
    let p = Pattern::new("(a)|b").unwrap();
    let builder = builder_of(&p);
    let (_, mask) = minterm_for(&p, b'a');

    let start = p.initial_for(CharKind::StartStop);
    let transitions = start.eager_transitions_with_effects(builder, &mask);

    // Only the `(a)` alternative survives an `a`, and taking it crosses
    // the group-open boundary.
    assert_eq!(transitions.len(), 1);
    let (dest, effects) = &transitions[0];
    assert!(!dest.is_deadend());
    assert_eq!(effects.len(), 1);
    assert_eq!(effects[0].kind, EffectKind::CaptureStart);
    assert_eq!(effects[0].group, 1);
}

#[test]
fn test_fixed_length_markers_through_states() {
    let p = Pattern::new("ab").unwrap();
    let builder = builder_of(&p);
    let nodes = builder.nodes();

    let marker = nodes.mk_fixed_length_marker(2);
    let state = builder.create_state(&marker, CharKind::General);
    assert_eq!(state.fixed_length(), 2);

    let or = nodes.mk_or(vec![
        nodes.mk_fixed_length_marker(2),
        nodes.mk_fixed_length_marker(7),
    ]);
    let state = builder.create_state(&or, CharKind::General);
    assert_eq!(state.fixed_length(), 7);

    // No marker anywhere: -1.
    assert_eq!(p.initial_for(CharKind::StartStop).fixed_length(), -1);
}

#[test]
fn test_monotonic_mode_flip_under_concurrency() {
    let p = Pattern::new("a|aa|ab").unwrap();
    let builder = builder_of(&p).clone();
    builder.set_powerset_threshold(1);

    let inputs: &[&[u8]] = &[b"aa", b"ab", b"a", b"aab", b"ba"];
    std::thread::scope(|scope| {
        for _ in 0..8 {
            let p = p.clone();
            let builder = builder.clone();
            scope.spawn(move || {
                let mut scratch = p.scratch();
                for _ in 0..50 {
                    for input in inputs {
                        let _ = p.find_with(input, &mut scratch);
                        if builder.is_powerset() {
                            // Once the flip is observed, every cursor this
                            // thread constructs must be powerset.
                            let start = p.initial_for(CharKind::StartStop);
                            let cur = CurrentState::new(&builder, start, &mut scratch);
                            assert!(matches!(cur, CurrentState::Powerset { .. }));
                            cur.reclaim(&mut scratch);
                        }
                    }
                }
            });
        }
    });

    // A budget of one state cannot survive matching `a|aa|ab`.
    assert!(builder.is_powerset());
}

#[test]
fn test_shared_cache_concurrent_matching_agrees() {
    let p = Pattern::new(r"\b(a+|b)[0-9]{2}\b").unwrap();
    let inputs: &[&[u8]] = &[
        b"aa42",
        b"b07 trailing",
        b"prefix a11",
        b"nope",
        b"aaa1",
        b"b999",
    ];
    let expected: Vec<_> = {
        // A fresh pattern, so the shared-cache results below are compared
        // against independently computed answers.
        let reference = Pattern::new(r"\b(a+|b)[0-9]{2}\b").unwrap();
        inputs.iter().map(|i| reference.find(i)).collect()
    };

    std::thread::scope(|scope| {
        for _ in 0..8 {
            let p = p.clone();
            let expected = expected.clone();
            scope.spawn(move || {
                let mut scratch = p.scratch();
                for _ in 0..100 {
                    for (input, want) in inputs.iter().zip(&expected) {
                        assert_eq!(p.find_with(input, &mut scratch), *want);
                    }
                }
            });
        }
    });
}

#[test]
fn test_powerset_entry_from_non_disjunction_start() {
    // A threshold flip can land on any destination node; a non-Or start
    // behaves as a single-member disjunction.
    let p = Pattern::new("abc").unwrap();
    let builder = builder_of(&p);
    builder.force_powerset();

    let mut scratch = PerThreadData::new();
    let start = p.initial_for(CharKind::StartStop);
    let mut cur = CurrentState::new(builder, start, &mut scratch);
    match &cur {
        CurrentState::Powerset { states, .. } => assert_eq!(states.len(), 1),
        CurrentState::Deterministic(_) => panic!("expected powerset cursor"),
    }
    assert!(!cur.starts_with_line_anchor(builder));

    for &b in b"abc" {
        let (id, mask) = minterm_for(&p, b);
        cur.take_transition(builder, id, &mask, &mut scratch);
    }
    assert!(cur.is_nullable(builder, CharKind::StartStop));
    cur.reclaim(&mut scratch);
}

#[test]
fn test_or_node_shape_survives_compilation() {
    let p = Pattern::new("a|aa").unwrap();
    match p.root().kind() {
        NodeKind::Or { alts } => assert_eq!(alts.len(), 2),
        other => panic!("expected Or root, got {:?}", other),
    }
}
