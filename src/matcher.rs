//! Compiled patterns and the per-step match driver.
//!
//! `Pattern` wires the pieces together: parse, compile, intern the initial
//! states, then drive a [`CurrentState`] across the input one minterm at a
//! time, querying nullability at every position. The driver itself is
//! deliberately plain (scan forward from each candidate start); the
//! interesting machinery lives below it in the memoized transitions, the
//! dual modes, the anchor contexts and the final-newline sentinel.

use std::sync::Arc;

use crate::algebra::{MintermAlgebra, MintermSet, MintermSetAlgebra};
use crate::automaton::builder::StateBuilder;
use crate::automaton::char_kind::CharKind;
use crate::automaton::current_state::{CurrentState, PerThreadData};
use crate::automaton::matching_state::MatchingState;
use crate::automaton::node::NodeRef;
use crate::byteset::ByteSet;
use crate::{compile, parser, PatternError};

/// A compiled pattern, shareable across threads.
///
/// All matching state that is per-attempt lives in a [`PerThreadData`]
/// scratch bundle; everything in here is either immutable or a shared
/// lock-free cache, so one `Pattern` (or a clone of it) can serve any
/// number of concurrent matches.
#[derive(Clone)]
pub struct Pattern {
    builder: Arc<StateBuilder<MintermSetAlgebra>>,
    root: NodeRef<MintermSet>,
    /// Initial states indexed by the previous character kind.
    initials: [Arc<MatchingState<MintermSet>>; 5],
    word: ByteSet,
}

impl Pattern {
    /// Compile a pattern, starting in deterministic (Brzozowski) mode.
    pub fn new(pattern: &str) -> Result<Pattern, PatternError> {
        Pattern::with_mode(pattern, false)
    }

    /// Compile a pattern forced into powerset (NFA) mode from the first
    /// transition. Matching behavior is identical to [`Pattern::new`];
    /// this exists to exercise and verify the powerset path directly.
    pub fn new_nfa(pattern: &str) -> Result<Pattern, PatternError> {
        Pattern::with_mode(pattern, true)
    }

    fn with_mode(pattern: &str, force_powerset: bool) -> Result<Pattern, PatternError> {
        let ast = parser::parse(pattern)?;
        let (builder, root) = compile::compile(&ast)?;
        if force_powerset {
            builder.force_powerset();
        }
        // Interned before any matching so the initial flag lands on the
        // canonical instances.
        let initials = [
            builder.create_initial_state(&root, CharKind::General),
            builder.create_initial_state(&root, CharKind::StartStop),
            builder.create_initial_state(&root, CharKind::Newline),
            builder.create_initial_state(&root, CharKind::NewLineS),
            builder.create_initial_state(&root, CharKind::WordLetter),
        ];
        Ok(Pattern {
            builder: Arc::new(builder),
            root,
            initials,
            word: parser::word_class(),
        })
    }

    /// A fresh scratch bundle. Obtain one per worker thread and reuse it
    /// across calls to the `_with` methods to avoid allocation.
    pub fn scratch(&self) -> PerThreadData {
        PerThreadData::new()
    }

    pub fn is_match(&self, haystack: &[u8]) -> bool {
        self.find(haystack).is_some()
    }

    /// Leftmost-longest match as `(start, end)` byte offsets.
    pub fn find(&self, haystack: &[u8]) -> Option<(usize, usize)> {
        let mut scratch = PerThreadData::new();
        self.find_with(haystack, &mut scratch)
    }

    /// Like [`Pattern::find`], reusing a caller-owned scratch bundle.
    pub fn find_with(
        &self,
        haystack: &[u8],
        scratch: &mut PerThreadData,
    ) -> Option<(usize, usize)> {
        for start in 0..=haystack.len() {
            if let Some(end) = self.match_end_at(haystack, start, scratch) {
                return Some((start, end));
            }
        }
        None
    }

    /// End offset of the preferred match beginning at `start`: the longest
    /// one, or the shortest when the pattern prefers laziness there.
    pub fn match_end_at(
        &self,
        haystack: &[u8],
        start: usize,
        scratch: &mut PerThreadData,
    ) -> Option<usize> {
        debug_assert!(start <= haystack.len());
        let builder = &*self.builder;
        let algebra = builder.nodes().algebra();

        let initial = &self.initials[self.prev_kind_at(haystack, start) as usize];
        let mut cur = CurrentState::new(builder, initial, scratch);

        let mut last = None;
        let mut pos = start;
        loop {
            if cur.is_nullable(builder, self.next_kind_at(haystack, pos)) {
                last = Some(pos);
                // A lazy state stops at the first accepting position.
                if let CurrentState::Deterministic(state) = &cur {
                    if state.is_lazy() {
                        break;
                    }
                }
            }
            if pos == haystack.len() || cur.is_deadend() {
                break;
            }

            let byte = haystack[pos];
            let (minterm_id, minterm) = if byte == b'\n' && pos == haystack.len() - 1 {
                // The very last newline travels as the reserved False
                // sentinel under its own cache id.
                (builder.sentinel_minterm_id(), algebra.empty())
            } else {
                let id = algebra.minterm_id(byte);
                (id, algebra.mask_of(id))
            };
            cur.take_transition(builder, minterm_id, &minterm, scratch);
            pos += 1;
        }

        cur.reclaim(scratch);
        last
    }

    /// The kind of the character just before `start`.
    fn prev_kind_at(&self, haystack: &[u8], start: usize) -> CharKind {
        if start == 0 {
            return CharKind::StartStop;
        }
        self.classify(haystack[start - 1], false)
    }

    /// The kind of the character at `pos`, from the matcher's point of
    /// view (`StartStop` past the end, `NewLineS` for a final newline).
    fn next_kind_at(&self, haystack: &[u8], pos: usize) -> CharKind {
        if pos == haystack.len() {
            return CharKind::StartStop;
        }
        self.classify(haystack[pos], pos == haystack.len() - 1)
    }

    fn classify(&self, byte: u8, is_last: bool) -> CharKind {
        if byte == b'\n' {
            if is_last {
                CharKind::NewLineS
            } else {
                CharKind::Newline
            }
        } else if self.word.contains(byte) {
            CharKind::WordLetter
        } else {
            CharKind::General
        }
    }

    pub(crate) fn state_builder(&self) -> &Arc<StateBuilder<MintermSetAlgebra>> {
        &self.builder
    }

    pub(crate) fn root(&self) -> &NodeRef<MintermSet> {
        &self.root
    }

    pub(crate) fn initial_for(&self, prev: CharKind) -> &Arc<MatchingState<MintermSet>> {
        &self.initials[prev as usize]
    }
}
