//! Active-list containers.
//!
//! An active list holds the tokens pending expansion for one state-class
//! stratum. Membership is the contract; iteration order is not, and callers
//! must not depend on it. Each list knows the relative beam width and
//! reports a beam threshold of `best_score + relative_beam` (log domain).

use serde::{Deserialize, Serialize};

use crate::token::{TokenArena, TokenId};

/// Contract for active-list implementations.
pub trait ActiveList: Send {
    /// Add a token to the list, tracking the best score seen.
    fn add(&mut self, arena: &TokenArena, token: TokenId);

    /// Remove a token if present. Returns whether it was found.
    fn remove(&mut self, token: TokenId) -> bool;

    /// Current membership. Order is unspecified.
    fn tokens(&self) -> &[TokenId];

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Best-scoring token, as maintained by `add` or overridden by the
    /// scorer via [`set_best_token`](ActiveList::set_best_token).
    fn best_token(&self) -> Option<TokenId>;

    /// Record the best token reported by the scorer for this frame.
    fn set_best_token(&mut self, token: Option<TokenId>);

    /// Highest token score in the list, `-inf` when empty.
    fn best_score(&self, arena: &TokenArena) -> f32;

    /// Growth gate: `best_score + relative_beam_width`.
    fn beam_threshold(&self, arena: &TokenArena) -> f32;

    /// Enforce the absolute beam, dropping the weakest tokens beyond it.
    fn purge(&mut self, arena: &TokenArena);
}

/// Selects the [`ActiveList`] implementation the search manager instantiates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActiveListType {
    /// Unordered bag; purge sorts only when the absolute beam overflows.
    #[default]
    Simple,
    /// Keeps tokens best-first after every purge.
    Sorting,
}

impl ActiveListType {
    /// Create an empty list with the given beams. `relative_beam` is
    /// log-domain (≤ 0); `absolute_beam` of 0 means unbounded.
    pub fn create(self, relative_beam: f32, absolute_beam: usize) -> Box<dyn ActiveList> {
        match self {
            ActiveListType::Simple => Box::new(SimpleActiveList::new(relative_beam, absolute_beam)),
            ActiveListType::Sorting => {
                Box::new(SortingActiveList::new(relative_beam, absolute_beam))
            }
        }
    }
}

fn best_of(tokens: &[TokenId], arena: &TokenArena) -> f32 {
    tokens
        .iter()
        .map(|&t| arena[t].score())
        .fold(f32::NEG_INFINITY, f32::max)
}

fn sort_descending(tokens: &mut [TokenId], arena: &TokenArena) {
    tokens.sort_unstable_by(|&a, &b| arena[b].score().total_cmp(&arena[a].score()));
}

/// Plain bag of tokens.
#[derive(Debug)]
pub struct SimpleActiveList {
    tokens: Vec<TokenId>,
    best_token: Option<TokenId>,
    relative_beam: f32,
    absolute_beam: usize,
}

impl SimpleActiveList {
    pub fn new(relative_beam: f32, absolute_beam: usize) -> Self {
        Self {
            tokens: Vec::new(),
            best_token: None,
            relative_beam,
            absolute_beam,
        }
    }
}

impl ActiveList for SimpleActiveList {
    fn add(&mut self, arena: &TokenArena, token: TokenId) {
        if self
            .best_token
            .map_or(true, |b| arena[token].score() > arena[b].score())
        {
            self.best_token = Some(token);
        }
        self.tokens.push(token);
    }

    fn remove(&mut self, token: TokenId) -> bool {
        match self.tokens.iter().position(|&t| t == token) {
            Some(index) => {
                self.tokens.swap_remove(index);
                if self.best_token == Some(token) {
                    self.best_token = None;
                }
                true
            }
            None => false,
        }
    }

    fn tokens(&self) -> &[TokenId] {
        &self.tokens
    }

    fn len(&self) -> usize {
        self.tokens.len()
    }

    fn best_token(&self) -> Option<TokenId> {
        self.best_token
    }

    fn set_best_token(&mut self, token: Option<TokenId>) {
        self.best_token = token;
    }

    fn best_score(&self, arena: &TokenArena) -> f32 {
        match self.best_token {
            Some(best) => arena[best].score(),
            None => best_of(&self.tokens, arena),
        }
    }

    fn beam_threshold(&self, arena: &TokenArena) -> f32 {
        self.best_score(arena) + self.relative_beam
    }

    fn purge(&mut self, arena: &TokenArena) {
        if self.absolute_beam > 0 && self.tokens.len() > self.absolute_beam {
            sort_descending(&mut self.tokens, arena);
            self.tokens.truncate(self.absolute_beam);
        }
    }
}

/// Active list that is best-first after every purge.
#[derive(Debug)]
pub struct SortingActiveList {
    tokens: Vec<TokenId>,
    best_token: Option<TokenId>,
    relative_beam: f32,
    absolute_beam: usize,
}

impl SortingActiveList {
    pub fn new(relative_beam: f32, absolute_beam: usize) -> Self {
        Self {
            tokens: Vec::new(),
            best_token: None,
            relative_beam,
            absolute_beam,
        }
    }
}

impl ActiveList for SortingActiveList {
    fn add(&mut self, arena: &TokenArena, token: TokenId) {
        if self
            .best_token
            .map_or(true, |b| arena[token].score() > arena[b].score())
        {
            self.best_token = Some(token);
        }
        self.tokens.push(token);
    }

    fn remove(&mut self, token: TokenId) -> bool {
        match self.tokens.iter().position(|&t| t == token) {
            Some(index) => {
                self.tokens.remove(index);
                if self.best_token == Some(token) {
                    self.best_token = None;
                }
                true
            }
            None => false,
        }
    }

    fn tokens(&self) -> &[TokenId] {
        &self.tokens
    }

    fn len(&self) -> usize {
        self.tokens.len()
    }

    fn best_token(&self) -> Option<TokenId> {
        self.best_token
    }

    fn set_best_token(&mut self, token: Option<TokenId>) {
        self.best_token = token;
    }

    fn best_score(&self, arena: &TokenArena) -> f32 {
        match self.best_token {
            Some(best) => arena[best].score(),
            None => best_of(&self.tokens, arena),
        }
    }

    fn beam_threshold(&self, arena: &TokenArena) -> f32 {
        self.best_score(arena) + self.relative_beam
    }

    fn purge(&mut self, arena: &TokenArena) {
        sort_descending(&mut self.tokens, arena);
        if self.absolute_beam > 0 {
            self.tokens.truncate(self.absolute_beam);
        }
    }
}
