//! Token lattice storage.
//!
//! Every partial hypothesis the search produces is a [`Token`] owned by a
//! per-utterance [`TokenArena`]. Predecessor links are arena indices, so the
//! lattice forms a reverse tree that is reclaimed wholesale when the arena is
//! cleared at the start of the next utterance, keeping reference counting out
//! of the hot loop.
//!
//! All scores are natural-log probabilities.

use crate::linguist::StateRef;

/// Index of a token within its [`TokenArena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TokenId(u32);

impl TokenId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// One partial hypothesis: a search state reached at a frame with a score.
#[derive(Debug)]
pub struct Token {
    state: StateRef,
    predecessor: Option<TokenId>,
    frame: u32,
    score: f32,
    acoustic_score: f32,
    language_score: f32,
    insertion_score: f32,
    working_score: f32,
}

impl Token {
    pub fn state(&self) -> &StateRef {
        &self.state
    }

    pub fn predecessor(&self) -> Option<TokenId> {
        self.predecessor
    }

    /// Frame at which this token was created.
    pub fn frame(&self) -> u32 {
        self.frame
    }

    /// Total path score.
    pub fn score(&self) -> f32 {
        self.score
    }

    /// Acoustic contribution accumulated at this token's frame. Zero for
    /// non-emitting tokens.
    pub fn acoustic_score(&self) -> f32 {
        self.acoustic_score
    }

    pub fn language_score(&self) -> f32 {
        self.language_score
    }

    pub fn insertion_score(&self) -> f32 {
        self.insertion_score
    }

    /// Scratch score used by acoustic look-ahead gating. Transient; only
    /// meaningful within the growth pass that wrote it.
    pub fn working_score(&self) -> f32 {
        self.working_score
    }

    pub fn is_emitting(&self) -> bool {
        self.state.is_emitting()
    }

    pub fn is_word(&self) -> bool {
        self.state.is_word()
    }

    pub fn is_final(&self) -> bool {
        self.state.is_final()
    }
}

/// Per-utterance token storage.
///
/// Tokens are append-only; predecessor chains stay valid until [`clear`] is
/// called for the next utterance.
///
/// [`clear`]: TokenArena::clear
#[derive(Debug, Default)]
pub struct TokenArena {
    tokens: Vec<Token>,
}

impl TokenArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every token. Invalidates all outstanding [`TokenId`]s.
    pub fn clear(&mut self) {
        self.tokens.clear();
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Allocate a token. `score` is the entry score; the acoustic score
    /// starts at zero and is finalized by the scorer for emitting tokens.
    pub fn alloc(
        &mut self,
        predecessor: Option<TokenId>,
        state: StateRef,
        score: f32,
        language_score: f32,
        insertion_score: f32,
        frame: u32,
    ) -> TokenId {
        let id = u32::try_from(self.tokens.len()).expect("token arena exhausted");
        self.tokens.push(Token {
            state,
            predecessor,
            frame,
            score,
            acoustic_score: 0.0,
            language_score,
            insertion_score,
            working_score: 0.0,
        });
        TokenId(id)
    }

    pub fn get(&self, id: TokenId) -> &Token {
        &self.tokens[id.index()]
    }

    /// Iterate every live token in allocation order.
    pub fn iter(&self) -> impl Iterator<Item = (TokenId, &Token)> {
        self.tokens
            .iter()
            .enumerate()
            .map(|(index, token)| (TokenId(index as u32), token))
    }

    /// Record the acoustic score for an emitting token, folding it into the
    /// total path score. Called once per token per frame by the scorer.
    pub fn apply_acoustic_score(&mut self, id: TokenId, acoustic_score: f32) {
        let token = &mut self.tokens[id.index()];
        token.acoustic_score = acoustic_score;
        token.score += acoustic_score;
    }

    pub fn set_working_score(&mut self, id: TokenId, working_score: f32) {
        self.tokens[id.index()].working_score = working_score;
    }

    /// Walk the predecessor chain, starting at `from` itself, until a word
    /// token is found.
    pub fn word_ancestor(&self, from: TokenId) -> Option<TokenId> {
        let mut current = Some(from);
        while let Some(id) = current {
            if self.get(id).is_word() {
                return Some(id);
            }
            current = self.get(id).predecessor();
        }
        None
    }

    /// Walk the predecessor chain, starting at `from`'s predecessor, until an
    /// emitting token is found.
    pub fn last_emitting_ancestor(&self, from: TokenId) -> Option<TokenId> {
        let mut current = self.get(from).predecessor();
        while let Some(id) = current {
            if self.get(id).is_emitting() {
                return Some(id);
            }
            current = self.get(id).predecessor();
        }
        None
    }
}

impl std::ops::Index<TokenId> for TokenArena {
    type Output = Token;

    fn index(&self, id: TokenId) -> &Token {
        self.get(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linguist::{SearchArc, SearchState, StateClass, StateId};
    use std::sync::Arc;

    #[derive(Debug)]
    struct TestState {
        id: u64,
        emitting: bool,
        word: bool,
    }

    impl SearchState for TestState {
        fn id(&self) -> StateId {
            StateId(self.id)
        }

        fn class(&self) -> StateClass {
            StateClass(u32::from(self.emitting))
        }

        fn is_emitting(&self) -> bool {
            self.emitting
        }

        fn is_word(&self) -> bool {
            self.word
        }

        fn successors(&self) -> Vec<SearchArc> {
            Vec::new()
        }
    }

    fn state(id: u64, emitting: bool, word: bool) -> StateRef {
        Arc::new(TestState { id, emitting, word })
    }

    #[test]
    fn apply_acoustic_score_folds_into_total() {
        let mut arena = TokenArena::new();
        let t = arena.alloc(None, state(0, true, false), -2.0, 0.0, 0.0, 1);
        arena.apply_acoustic_score(t, -1.5);
        assert!((arena[t].score() - -3.5).abs() < 1e-6);
        assert!((arena[t].acoustic_score() - -1.5).abs() < 1e-6);
    }

    #[test]
    fn word_ancestor_starts_at_token_itself() {
        let mut arena = TokenArena::new();
        let word = arena.alloc(None, state(0, false, true), 0.0, 0.0, 0.0, 0);
        let hmm = arena.alloc(Some(word), state(1, true, false), -1.0, 0.0, 0.0, 1);

        assert_eq!(arena.word_ancestor(word), Some(word));
        assert_eq!(arena.word_ancestor(hmm), Some(word));
    }

    #[test]
    fn word_ancestor_none_without_word_in_chain() {
        let mut arena = TokenArena::new();
        let a = arena.alloc(None, state(0, false, false), 0.0, 0.0, 0.0, 0);
        let b = arena.alloc(Some(a), state(1, true, false), -1.0, 0.0, 0.0, 1);
        assert_eq!(arena.word_ancestor(b), None);
    }

    #[test]
    fn last_emitting_ancestor_skips_self() {
        let mut arena = TokenArena::new();
        let e1 = arena.alloc(None, state(0, true, false), -1.0, 0.0, 0.0, 1);
        let n = arena.alloc(Some(e1), state(1, false, false), -1.2, 0.0, 0.0, 1);
        let e2 = arena.alloc(Some(n), state(2, true, false), -2.0, 0.0, 0.0, 2);

        assert_eq!(arena.last_emitting_ancestor(e2), Some(e1));
        assert_eq!(arena.last_emitting_ancestor(e1), None);
    }

    #[test]
    fn clear_resets_allocation() {
        let mut arena = TokenArena::new();
        arena.alloc(None, state(0, true, false), 0.0, 0.0, 0.0, 0);
        assert_eq!(arena.len(), 1);
        arena.clear();
        assert!(arena.is_empty());
    }
}
