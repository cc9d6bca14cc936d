//! Losing-hypothesis bookkeeping for word-lattice construction.
//!
//! When a token at a word state is superseded, or a candidate loses to the
//! incumbent, the path that lost still names a valid word-lattice edge. The
//! `AlternateHypothesisManager` keeps those edges: for each surviving word
//! token it records the predecessors of every hypothesis that collided with
//! it. Downstream lattice building reads the map; recognition itself never
//! does.

use rustc_hash::FxHashMap;

use crate::token::TokenId;

#[derive(Debug, Default)]
pub struct AlternateHypothesisManager {
    loser_map: FxHashMap<TokenId, Vec<TokenId>>,
}

impl AlternateHypothesisManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `alternate` as an additional predecessor of `winner`.
    pub fn add_alternate_predecessor(&mut self, winner: TokenId, alternate: TokenId) {
        debug_assert_ne!(winner, alternate, "token cannot be its own alternate");
        self.loser_map.entry(winner).or_default().push(alternate);
    }

    /// Re-target alternates recorded for `loser` onto `new_winner`. Used when
    /// a superseded token had already accumulated alternates of its own.
    pub fn change_successor(&mut self, new_winner: TokenId, loser: TokenId) {
        if let Some(mut alternates) = self.loser_map.remove(&loser) {
            self.loser_map
                .entry(new_winner)
                .or_default()
                .append(&mut alternates);
        }
    }

    /// Alternate predecessors recorded for `token`, if any.
    pub fn alternate_predecessors(&self, token: TokenId) -> Option<&[TokenId]> {
        self.loser_map.get(&token).map(Vec::as_slice)
    }

    pub fn has_alternates(&self, token: TokenId) -> bool {
        self.loser_map.contains_key(&token)
    }

    /// Number of tokens with recorded alternates.
    pub fn len(&self) -> usize {
        self.loser_map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.loser_map.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linguist::{SearchArc, SearchState, StateClass, StateId, StateRef};
    use crate::token::TokenArena;
    use std::sync::Arc;

    #[derive(Debug)]
    struct WordState(u64);

    impl SearchState for WordState {
        fn id(&self) -> StateId {
            StateId(self.0)
        }
        fn class(&self) -> StateClass {
            StateClass(0)
        }
        fn is_emitting(&self) -> bool {
            false
        }
        fn is_word(&self) -> bool {
            true
        }
        fn successors(&self) -> Vec<SearchArc> {
            Vec::new()
        }
    }

    fn token(arena: &mut TokenArena, id: u64) -> TokenId {
        let state: StateRef = Arc::new(WordState(id));
        arena.alloc(None, state, 0.0, 0.0, 0.0, 0)
    }

    #[test]
    fn records_alternates_per_winner() {
        let mut arena = TokenArena::new();
        let winner = token(&mut arena, 0);
        let alt_a = token(&mut arena, 1);
        let alt_b = token(&mut arena, 2);

        let mut mgr = AlternateHypothesisManager::new();
        assert!(!mgr.has_alternates(winner));
        mgr.add_alternate_predecessor(winner, alt_a);
        mgr.add_alternate_predecessor(winner, alt_b);

        assert_eq!(mgr.alternate_predecessors(winner), Some(&[alt_a, alt_b][..]));
    }

    #[test]
    fn change_successor_moves_and_merges() {
        let mut arena = TokenArena::new();
        let loser = token(&mut arena, 0);
        let winner = token(&mut arena, 1);
        let alt_a = token(&mut arena, 2);
        let alt_b = token(&mut arena, 3);

        let mut mgr = AlternateHypothesisManager::new();
        mgr.add_alternate_predecessor(loser, alt_a);
        mgr.add_alternate_predecessor(winner, alt_b);
        mgr.change_successor(winner, loser);

        assert!(!mgr.has_alternates(loser));
        assert_eq!(mgr.alternate_predecessors(winner), Some(&[alt_b, alt_a][..]));
    }

    #[test]
    fn change_successor_without_alternates_is_a_no_op() {
        let mut arena = TokenArena::new();
        let loser = token(&mut arena, 0);
        let winner = token(&mut arena, 1);

        let mut mgr = AlternateHypothesisManager::new();
        mgr.change_successor(winner, loser);
        assert!(mgr.is_empty());
    }
}
