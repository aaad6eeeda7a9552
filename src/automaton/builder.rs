//! State interning and the shared transition caches.
//!
//! The builder owns everything one compiled pattern shares across all of
//! its concurrent match attempts: the node graph, the canonical state
//! instances, the NFA core-state registry, and the two memoized transition
//! tables. Matching threads only ever read lock-free snapshots; the locks
//! here guard creation paths, which are rare once the caches warm up.
//!
//! Transition-table cells are write-once: concurrent threads may race to
//! compute the same cell, but the computed value is a pure function of
//! `(state, minterm)` and states are interned, so every racer produces the
//! identical `Arc` and the first published value stands. Cell reads/writes
//! go through `OnceLock`, giving the acquire/release pairing the shared
//! tables need; a full-table reallocation (growth) is republished through
//! `ArcSwap`, and any populated cells a stale snapshot write loses are
//! simply recomputed on the next lookup.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};

use arc_swap::ArcSwap;
use log::debug;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use super::char_kind::CharKind;
use super::matching_state::MatchingState;
use super::node::{NodeBuilder, NodeRef};
use crate::algebra::MintermAlgebra;

/// Stable id of an interned deterministic state.
pub type StateId = u32;

/// Id of an NFA core state in powerset mode.
pub type NfaStateId = u32;

/// Deterministic state count above which the automaton switches to
/// powerset mode. Each deterministic state owns a transition-table row, so
/// state count is what actually bounds memory.
pub const POWERSET_THRESHOLD: usize = 10_000;

const INITIAL_TABLE_STATES: usize = 256;

/// A flat memoized transition table: one write-once cell per
/// `(state_id << minterm_bits) | minterm_id`.
struct DeltaTable<V> {
    minterm_bits: u32,
    cells: Box<[OnceLock<V>]>,
}

impl<V: Clone> DeltaTable<V> {
    fn new(minterm_bits: u32, state_capacity: usize) -> Self {
        let size = state_capacity << minterm_bits;
        DeltaTable {
            minterm_bits,
            cells: (0..size).map(|_| OnceLock::new()).collect(),
        }
    }

    #[inline]
    fn state_capacity(&self) -> usize {
        self.cells.len() >> self.minterm_bits
    }

    #[inline]
    fn offset(&self, state: u32, minterm_id: u32) -> usize {
        ((state as usize) << self.minterm_bits) | minterm_id as usize
    }

    #[inline]
    fn get(&self, offset: usize) -> Option<&V> {
        self.cells[offset].get()
    }

    /// Publish a computed value; on a lost race the first writer wins and
    /// its value is returned.
    fn publish(&self, offset: usize, value: V) -> V {
        let cell = &self.cells[offset];
        let _ = cell.set(value);
        cell.get().cloned().unwrap()
    }

    fn grown_from(old: &DeltaTable<V>, new_state_capacity: usize) -> Self {
        let new = DeltaTable::new(old.minterm_bits, new_state_capacity);
        for (i, cell) in old.cells.iter().enumerate() {
            if let Some(v) = cell.get() {
                let _ = new.cells[i].set(v.clone());
            }
        }
        new
    }
}

struct StateIntern<P> {
    map: FxHashMap<(usize, u8), Arc<MatchingState<P>>>,
}

struct NfaIntern {
    map: FxHashMap<(usize, u8), NfaStateId>,
}

/// Owns one compiled pattern's node graph, canonical states, transition
/// caches and mode flag. Shared (behind `Arc`) by every concurrent match.
pub struct StateBuilder<A: MintermAlgebra> {
    nodes: NodeBuilder<A>,
    minterm_count: usize,
    states: Mutex<StateIntern<A::Pred>>,
    nfa: Mutex<NfaIntern>,
    nfa_core: ArcSwap<Vec<Arc<MatchingState<A::Pred>>>>,
    dfa_delta: ArcSwap<DeltaTable<Arc<MatchingState<A::Pred>>>>,
    nfa_delta: ArcSwap<DeltaTable<Arc<[NfaStateId]>>>,
    /// Serializes table growth; never held while matching reads.
    growth: Mutex<()>,
    /// Monotonic: flips deterministic -> powerset once, never back.
    powerset: AtomicBool,
    powerset_threshold: AtomicUsize,
}

impl<A: MintermAlgebra> StateBuilder<A> {
    /// `minterm_count` is the size of the minterm partition; minterm ids
    /// `0..minterm_count` index real minterms and one extra id is reserved
    /// for the final-line-terminator sentinel.
    pub fn new(nodes: NodeBuilder<A>, minterm_count: usize) -> Self {
        let minterm_bits = usize::BITS - minterm_count.leading_zeros();
        StateBuilder {
            nodes,
            minterm_count,
            states: Mutex::new(StateIntern {
                map: FxHashMap::default(),
            }),
            nfa: Mutex::new(NfaIntern {
                map: FxHashMap::default(),
            }),
            nfa_core: ArcSwap::from_pointee(Vec::new()),
            dfa_delta: ArcSwap::from_pointee(DeltaTable::new(minterm_bits, INITIAL_TABLE_STATES)),
            nfa_delta: ArcSwap::from_pointee(DeltaTable::new(minterm_bits, INITIAL_TABLE_STATES)),
            growth: Mutex::new(()),
            powerset: AtomicBool::new(false),
            powerset_threshold: AtomicUsize::new(POWERSET_THRESHOLD),
        }
    }

    #[inline]
    pub fn nodes(&self) -> &NodeBuilder<A> {
        &self.nodes
    }

    #[inline]
    pub fn minterm_count(&self) -> usize {
        self.minterm_count
    }

    /// The reserved minterm id used to cache transitions taken on the
    /// final-line-terminator sentinel (the algebra's `False`).
    #[inline]
    pub fn sentinel_minterm_id(&self) -> u32 {
        self.minterm_count as u32
    }

    /// Whether the automaton has switched to powerset (NFA) mode.
    #[inline]
    pub fn is_powerset(&self) -> bool {
        self.powerset.load(Ordering::Acquire)
    }

    /// Force powerset mode. The flip is monotonic; there is no way back
    /// for the lifetime of the compiled pattern.
    pub fn force_powerset(&self) {
        if self
            .powerset
            .compare_exchange(false, true, Ordering::Release, Ordering::Relaxed)
            .is_ok()
        {
            debug!("switched to powerset mode");
        }
    }

    /// Lower or raise the deterministic state budget. Mainly useful in
    /// tests; the default is [`POWERSET_THRESHOLD`].
    pub fn set_powerset_threshold(&self, threshold: usize) {
        self.powerset_threshold.store(threshold, Ordering::Relaxed);
    }

    /// Number of interned deterministic states so far.
    pub fn state_count(&self) -> usize {
        self.states.lock().map.len()
    }

    /// Get or create the canonical state for `(node, prev_char_kind)`.
    ///
    /// The same pair always returns the same instance with the same id,
    /// no matter which thread asks first.
    pub fn create_state(
        &self,
        node: &NodeRef<A::Pred>,
        prev_char_kind: CharKind,
    ) -> Arc<MatchingState<A::Pred>> {
        self.create_state_inner(node, prev_char_kind, false)
    }

    /// Like [`Self::create_state`], but marks the state as an initial
    /// state. Initial states must be interned before matching begins so
    /// the flag lands on the canonical instance.
    pub fn create_initial_state(
        &self,
        node: &NodeRef<A::Pred>,
        prev_char_kind: CharKind,
    ) -> Arc<MatchingState<A::Pred>> {
        self.create_state_inner(node, prev_char_kind, true)
    }

    fn create_state_inner(
        &self,
        node: &NodeRef<A::Pred>,
        prev_char_kind: CharKind,
        is_initial: bool,
    ) -> Arc<MatchingState<A::Pred>> {
        let key = (Arc::as_ptr(node) as usize, prev_char_kind as u8);
        let mut intern = self.states.lock();
        if let Some(existing) = intern.map.get(&key) {
            return existing.clone();
        }
        let id = intern.map.len() as StateId;
        let state = Arc::new(MatchingState::new(
            node.clone(),
            prev_char_kind,
            id,
            is_initial,
        ));
        intern.map.insert(key, state.clone());
        let count = intern.map.len();
        drop(intern);

        if count > self.powerset_threshold.load(Ordering::Relaxed) {
            self.force_powerset();
        }
        state
    }

    /// Get or create the NFA core state for `(node, prev_char_kind)`,
    /// returning its id in the powerset id space. The underlying
    /// `MatchingState` is the same canonical instance deterministic mode
    /// would use.
    pub fn create_nfa_state(&self, node: &NodeRef<A::Pred>, prev_char_kind: CharKind) -> NfaStateId {
        let key = (Arc::as_ptr(node) as usize, prev_char_kind as u8);
        let mut nfa = self.nfa.lock();
        if let Some(&existing) = nfa.map.get(&key) {
            return existing;
        }
        let state = self.create_state(node, prev_char_kind);
        let id = nfa.map.len() as NfaStateId;
        let mut list = (**self.nfa_core.load()).clone();
        list.push(state);
        // Published before the id can reach any other thread through a
        // transition-table cell, so core_state(id) never misses.
        self.nfa_core.store(Arc::new(list));
        nfa.map.insert(key, id);
        id
    }

    /// Fetch the core state behind an NFA state id.
    #[inline]
    pub fn core_state(&self, id: NfaStateId) -> Arc<MatchingState<A::Pred>> {
        self.nfa_core.load()[id as usize].clone()
    }

    /// Memoized deterministic transition: look up the cached destination
    /// for `(state, minterm_id)` or compute and publish it.
    pub fn dfa_transition(
        &self,
        state: &Arc<MatchingState<A::Pred>>,
        minterm_id: u32,
        minterm: &A::Pred,
    ) -> Arc<MatchingState<A::Pred>> {
        loop {
            let delta = self.dfa_delta.load();
            if (state.id() as usize) >= delta.state_capacity() {
                drop(delta);
                self.grow_dfa(state.id());
                continue;
            }
            let offset = delta.offset(state.id(), minterm_id);
            if let Some(next) = delta.get(offset) {
                return next.clone();
            }
            let next = state.next(self, minterm);
            return delta.publish(offset, next);
        }
    }

    /// Memoized powerset transition: the ordered, duplicate-free list of
    /// NFA state ids reachable from `source` on the given minterm.
    pub fn nfa_transition(
        &self,
        source: NfaStateId,
        minterm_id: u32,
        minterm: &A::Pred,
    ) -> Arc<[NfaStateId]> {
        loop {
            let delta = self.nfa_delta.load();
            if (source as usize) >= delta.state_capacity() {
                drop(delta);
                self.grow_nfa(source);
                continue;
            }
            let offset = delta.offset(source, minterm_id);
            if let Some(targets) = delta.get(offset) {
                return targets.clone();
            }
            let targets = self.compute_nfa_targets(source, minterm);
            return delta.publish(offset, targets);
        }
    }

    fn compute_nfa_targets(&self, source: NfaStateId, minterm: &A::Pred) -> Arc<[NfaStateId]> {
        let source_state = self.core_state(source);
        let transitions = source_state.eager_transitions_with_effects(self, minterm);

        let mut targets: Vec<NfaStateId> = Vec::with_capacity(transitions.len());
        for (dest, _effects) in &transitions {
            // A destination may still be a disjunction; its members become
            // separate core states so the set stays fine-grained.
            for alt in dest.node_alternatives() {
                if alt.is_nothing() {
                    continue;
                }
                let id = self.create_nfa_state(alt, dest.prev_char_kind());
                if !targets.contains(&id) {
                    targets.push(id);
                }
            }
        }
        targets.into()
    }

    fn grow_dfa(&self, state_id: StateId) {
        let _guard = self.growth.lock();
        let current = self.dfa_delta.load_full();
        if (state_id as usize) < current.state_capacity() {
            return;
        }
        let new_capacity = ((state_id as usize) + 1)
            .next_power_of_two()
            .max(current.state_capacity() * 2);
        debug!("growing dfa transition table to {} states", new_capacity);
        self.dfa_delta
            .store(Arc::new(DeltaTable::grown_from(&current, new_capacity)));
    }

    fn grow_nfa(&self, state_id: NfaStateId) {
        let _guard = self.growth.lock();
        let current = self.nfa_delta.load_full();
        if (state_id as usize) < current.state_capacity() {
            return;
        }
        let new_capacity = ((state_id as usize) + 1)
            .next_power_of_two()
            .max(current.state_capacity() * 2);
        debug!("growing nfa transition table to {} states", new_capacity);
        self.nfa_delta
            .store(Arc::new(DeltaTable::grown_from(&current, new_capacity)));
    }
}
