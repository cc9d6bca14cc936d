//! Best-token-per-state map, rebuilt every frame.
//!
//! Two configurations:
//!
//! - **Single-best** (default): one winning token per state key.
//! - **Bounded heap**: up to `k` tokens per key, with emitting states keyed
//!   by `(lex_state, word_history)` so parallel paths through the same HMM
//!   with the same word history share one heap.
//!
//! The heap's lookup contract is deliberate and subtle: a miss on a full
//! heap answers with the *weakest* occupant, so the caller's
//! "candidate beats the current best" gate compares against the weakest
//! incumbent only. This admits more tokens per state than strict k-best
//! would; it is the intended behavior, not an oversight.

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::linguist::{SearchState, StateId};
use crate::token::{TokenArena, TokenId};

/// Key for the best-token map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StateKey {
    /// The search state itself, by id.
    State(StateId),
    /// One HMM traversal with one word history, collapsing parallel paths.
    HmmPath { lex_state: u64, word_history: u64 },
}

impl StateKey {
    fn for_state(state: &dyn SearchState, collapse_hmm_paths: bool) -> StateKey {
        if collapse_hmm_paths && state.is_emitting() {
            if let (Some(lex_state), Some(word_history)) = (state.lex_state(), state.word_history())
            {
                return StateKey::HmmPath {
                    lex_state,
                    word_history,
                };
            }
        }
        StateKey::State(state.id())
    }
}

/// Map from state key to the best token(s) that reached it this frame.
pub enum BestTokenMap {
    Single(FxHashMap<StateKey, TokenId>),
    Heaped {
        map: FxHashMap<StateKey, TokenHeap>,
        heap_size: usize,
    },
}

impl BestTokenMap {
    /// `heap_size` of 0 or 1 selects the single-best variant.
    pub fn new(heap_size: usize, capacity: usize) -> Self {
        if heap_size >= 2 {
            BestTokenMap::Heaped {
                map: FxHashMap::with_capacity_and_hasher(capacity, Default::default()),
                heap_size,
            }
        } else {
            BestTokenMap::Single(FxHashMap::with_capacity_and_hasher(
                capacity,
                Default::default(),
            ))
        }
    }

    /// The incumbent a candidate for `state` must beat.
    ///
    /// Single-best: the recorded token, if any. Heap: the exact-state entry
    /// if present; otherwise `None` while the heap has room, else the
    /// weakest occupant.
    pub fn get(&self, arena: &TokenArena, state: &dyn SearchState) -> Option<TokenId> {
        match self {
            BestTokenMap::Single(map) => map.get(&StateKey::for_state(state, false)).copied(),
            BestTokenMap::Heaped { map, .. } => {
                let heap = map.get(&StateKey::for_state(state, true))?;
                if let Some(token) = heap.find(arena, state.id()) {
                    Some(token)
                } else if !heap.is_full() {
                    None
                } else {
                    heap.smallest()
                }
            }
        }
    }

    /// Record `token` as (one of) the best for `state`.
    pub fn put(&mut self, arena: &TokenArena, state: &dyn SearchState, token: TokenId) {
        match self {
            BestTokenMap::Single(map) => {
                map.insert(StateKey::for_state(state, false), token);
            }
            BestTokenMap::Heaped { map, heap_size } => {
                map.entry(StateKey::for_state(state, true))
                    .or_insert_with(|| TokenHeap::new(*heap_size))
                    .add(arena, token);
            }
        }
    }

    pub fn len(&self) -> usize {
        match self {
            BestTokenMap::Single(map) => map.len(),
            BestTokenMap::Heaped { map, .. } => map.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Bounded per-key token stack, kept sorted descending by score.
pub struct TokenHeap {
    tokens: SmallVec<[TokenId; 3]>,
    capacity: usize,
}

impl TokenHeap {
    fn new(capacity: usize) -> Self {
        Self {
            tokens: SmallVec::new(),
            capacity,
        }
    }

    fn add(&mut self, arena: &TokenArena, token: TokenId) {
        let state_id = arena[token].state().id();
        if let Some(slot) = self
            .tokens
            .iter_mut()
            .find(|t| arena[**t].state().id() == state_id)
        {
            debug_assert!(arena[token].score() > arena[*slot].score());
            *slot = token;
        } else if self.tokens.len() < self.capacity {
            self.tokens.push(token);
        } else if let Some(last) = self.tokens.last_mut() {
            if arena[token].score() > arena[*last].score() {
                *last = token;
            }
        }
        self.tokens
            .sort_unstable_by(|&a, &b| arena[b].score().total_cmp(&arena[a].score()));
    }

    fn find(&self, arena: &TokenArena, state_id: StateId) -> Option<TokenId> {
        self.tokens
            .iter()
            .copied()
            .find(|&t| arena[t].state().id() == state_id)
    }

    fn smallest(&self) -> Option<TokenId> {
        self.tokens.last().copied()
    }

    fn is_full(&self) -> bool {
        self.tokens.len() == self.capacity
    }

    pub fn tokens(&self) -> &[TokenId] {
        &self.tokens
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linguist::{SearchArc, StateClass, StateRef};
    use proptest::prelude::*;
    use std::sync::Arc;

    #[derive(Debug)]
    struct HmmState {
        id: u64,
        lex_state: u64,
        word_history: u64,
    }

    impl SearchState for HmmState {
        fn id(&self) -> StateId {
            StateId(self.id)
        }

        fn class(&self) -> StateClass {
            StateClass(1)
        }

        fn is_emitting(&self) -> bool {
            true
        }

        fn successors(&self) -> Vec<SearchArc> {
            Vec::new()
        }

        fn lex_state(&self) -> Option<u64> {
            Some(self.lex_state)
        }

        fn word_history(&self) -> Option<u64> {
            Some(self.word_history)
        }
    }

    fn hmm_state(id: u64, lex_state: u64, word_history: u64) -> StateRef {
        Arc::new(HmmState {
            id,
            lex_state,
            word_history,
        })
    }

    fn alloc(arena: &mut TokenArena, state: &StateRef, score: f32) -> TokenId {
        arena.alloc(None, Arc::clone(state), score, 0.0, 0.0, 0)
    }

    #[test]
    fn single_best_overwrites() {
        let mut arena = TokenArena::new();
        let state = hmm_state(0, 0, 0);
        let weak = alloc(&mut arena, &state, -5.0);
        let strong = alloc(&mut arena, &state, -1.0);

        let mut map = BestTokenMap::new(0, 4);
        assert_eq!(map.get(&arena, state.as_ref()), None);
        map.put(&arena, state.as_ref(), weak);
        assert_eq!(map.get(&arena, state.as_ref()), Some(weak));
        map.put(&arena, state.as_ref(), strong);
        assert_eq!(map.get(&arena, state.as_ref()), Some(strong));
    }

    #[test]
    fn heap_reports_room_before_full() {
        let mut arena = TokenArena::new();
        // Distinct states sharing one (lex_state, word_history) key.
        let s0 = hmm_state(0, 7, 3);
        let s1 = hmm_state(1, 7, 3);
        let s2 = hmm_state(2, 7, 3);
        let t0 = alloc(&mut arena, &s0, -1.0);

        let mut map = BestTokenMap::new(2, 4);
        map.put(&arena, s0.as_ref(), t0);

        // Same state: exact hit.
        assert_eq!(map.get(&arena, s0.as_ref()), Some(t0));
        // Different state, heap not full: room available.
        assert_eq!(map.get(&arena, s1.as_ref()), None);

        let t1 = alloc(&mut arena, &s1, -2.0);
        map.put(&arena, s1.as_ref(), t1);
        // Full now: a third state sees the weakest occupant.
        assert_eq!(map.get(&arena, s2.as_ref()), Some(t1));
    }

    #[test]
    fn heap_replaces_same_state_and_stays_sorted() {
        let mut arena = TokenArena::new();
        let s0 = hmm_state(0, 1, 1);
        let s1 = hmm_state(1, 1, 1);
        let weak = alloc(&mut arena, &s0, -4.0);
        let other = alloc(&mut arena, &s1, -2.0);
        let strong = alloc(&mut arena, &s0, -1.0);

        let mut map = BestTokenMap::new(3, 4);
        map.put(&arena, s0.as_ref(), weak);
        map.put(&arena, s1.as_ref(), other);
        map.put(&arena, s0.as_ref(), strong);

        match &map {
            BestTokenMap::Heaped { map, .. } => {
                let heap = map.values().next().expect("one heap");
                let scores: Vec<f32> =
                    heap.tokens().iter().map(|&t| arena[t].score()).collect();
                assert_eq!(scores, vec![-1.0, -2.0]);
            }
            BestTokenMap::Single(_) => panic!("expected heap variant"),
        }
    }

    #[test]
    fn full_heap_drops_weaker_candidates() {
        let mut arena = TokenArena::new();
        let s0 = hmm_state(0, 1, 1);
        let s1 = hmm_state(1, 1, 1);
        let s2 = hmm_state(2, 1, 1);
        let a = alloc(&mut arena, &s0, -1.0);
        let b = alloc(&mut arena, &s1, -2.0);
        let c = alloc(&mut arena, &s2, -9.0);

        let mut map = BestTokenMap::new(2, 4);
        map.put(&arena, s0.as_ref(), a);
        map.put(&arena, s1.as_ref(), b);
        map.put(&arena, s2.as_ref(), c);

        // c lost to the weakest occupant; the heap is unchanged.
        assert_eq!(map.get(&arena, s2.as_ref()), Some(b));
    }

    #[test]
    fn non_emitting_states_key_by_state_in_heap_mode() {
        #[derive(Debug)]
        struct Plain(u64);
        impl SearchState for Plain {
            fn id(&self) -> StateId {
                StateId(self.0)
            }
            fn class(&self) -> StateClass {
                StateClass(0)
            }
            fn is_emitting(&self) -> bool {
                false
            }
            fn successors(&self) -> Vec<SearchArc> {
                Vec::new()
            }
        }

        let mut arena = TokenArena::new();
        let state: StateRef = Arc::new(Plain(5));
        let t = arena.alloc(None, Arc::clone(&state), -1.0, 0.0, 0.0, 0);

        let mut map = BestTokenMap::new(3, 4);
        map.put(&arena, state.as_ref(), t);
        assert_eq!(map.get(&arena, state.as_ref()), Some(t));
    }

    proptest! {
        #[test]
        fn heap_keeps_at_most_k_sorted_descending(
            scores in prop::collection::vec(-100.0f32..0.0, 1..20),
            capacity in 2usize..5,
        ) {
            let mut arena = TokenArena::new();
            let mut heap = TokenHeap::new(capacity);
            for (i, &score) in scores.iter().enumerate() {
                let state = hmm_state(i as u64, 0, 0);
                let t = alloc(&mut arena, &state, score);
                heap.add(&arena, t);
            }

            prop_assert!(heap.tokens().len() <= capacity);
            let held: Vec<f32> = heap.tokens().iter().map(|&t| arena[t].score()).collect();
            for pair in held.windows(2) {
                prop_assert!(pair[0] >= pair[1]);
            }
        }
    }
}
