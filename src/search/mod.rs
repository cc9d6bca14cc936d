//! `SearchManager` — the word-pruning breadth-first search loop.
//!
//! ## Per-frame cycle
//!
//! ```text
//! take emitting stratum ──► score (frame += 1) ──► prune ──► grow emitting
//!                                                                │
//!                                       ┌────────────────────────┘
//!                                       ▼
//!                          grow non-emitting strata in class order,
//!                          re-pruning each, until all are drained
//!                          (ε-closure complete; next emitting stratum
//!                           is now populated)
//! ```
//!
//! Growth is gated twice: the relative beam keeps a token only while its
//! score stays within `relative_beam_width` of the stratum's best, and the
//! best-token map admits a successor only when it strictly beats the
//! incumbent at its target state. The strict-improvement rule is also what
//! terminates ε-cycles among non-emitting states.
//!
//! All scores are natural-log probabilities; combining along a path is
//! addition.

pub mod active_list;
pub mod active_list_manager;
pub mod alternates;
pub mod best_token;

pub use active_list::{ActiveList, ActiveListType, SimpleActiveList, SortingActiveList};
pub use active_list_manager::ActiveListManager;
pub use alternates::AlternateHypothesisManager;
pub use best_token::{BestTokenMap, StateKey, TokenHeap};

use std::time::{Duration, Instant};

use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Result, TrellisError};
use crate::linguist::{Linguist, SearchState, StateClass};
use crate::pruner::Pruner;
use crate::scorer::AcousticScorer;
use crate::token::{TokenArena, TokenId};

/// Configuration for [`SearchManager`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Active-list implementation to instantiate. Default: `Simple`.
    pub active_list_type: ActiveListType,
    /// Absolute beam: maximum tokens kept per stratum at purge.
    /// 0 = unbounded. Default: 0.
    pub absolute_beam_width: usize,
    /// Relative beam as a linear probability in [0, 1]; converted to log
    /// internally. 0.0 disables the growth gate. Default: 0.0.
    pub relative_beam_width: f64,
    /// Tokens retained per best-token-map key. 0 or 1 = single best
    /// (default); ≥ 2 enables the bounded per-state heap.
    pub token_heap_size: usize,
    /// Dump reachable-token counts after each `recognize` call.
    /// Default: false.
    pub show_token_count: bool,
    /// Assert that arcs never target a class earlier in the state order
    /// (emitting sources excepted). Default: false.
    pub check_state_order: bool,
    /// Maintain the alternate-hypothesis manager for word-lattice
    /// construction. Default: true.
    pub build_word_lattice: bool,
    /// If > 1, growth is skipped on every frame whose number is a multiple
    /// of this interval; the stratum is re-scored against the next frame
    /// instead. Trades accuracy for speed. Default: 0.
    pub grow_skip_interval: u32,
    /// Acoustic look-ahead coefficient for emitting growth. 0 disables.
    /// Default: 0.0.
    pub acoustic_lookahead_frames: f32,
    /// Keep every created token as its successors' predecessor instead of
    /// collapsing to the last word token. Default: false.
    pub keep_all_tokens: bool,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            active_list_type: ActiveListType::Simple,
            absolute_beam_width: 0,
            relative_beam_width: 0.0,
            token_heap_size: 0,
            show_token_count: false,
            check_state_order: false,
            build_word_lattice: true,
            grow_skip_interval: 0,
            acoustic_lookahead_frames: 0.0,
            keep_all_tokens: false,
        }
    }
}

impl SearchConfig {
    /// The configured relative beam in the log domain (≤ 0).
    pub fn relative_beam_log(&self) -> f32 {
        if self.relative_beam_width <= 0.0 {
            f32::NEG_INFINITY
        } else {
            self.relative_beam_width.ln() as f32
        }
    }
}

/// Counters and phase timings for one utterance.
#[derive(Debug, Clone, Copy, Default)]
pub struct SearchStats {
    pub frames_scored: u64,
    pub tokens_scored: u64,
    pub tokens_created: u64,
    pub score_time: Duration,
    pub prune_time: Duration,
    pub grow_time: Duration,
}

/// Snapshot returned by [`SearchManager::recognize`].
///
/// Token ids resolve against the manager's [`TokenArena`]; alternate
/// word-lattice edges live in the manager's
/// [`AlternateHypothesisManager`].
#[derive(Debug, Clone)]
pub struct RecognitionResult {
    /// Word tokens that reached a final state this frame.
    pub result_list: Vec<TokenId>,
    /// Tokens of the last active stratum.
    pub active_tokens: Vec<TokenId>,
    /// Frame counter after this call.
    pub frame: u32,
    /// Whether the scorer reported end of data.
    pub is_final: bool,
}

impl RecognitionResult {
    /// Highest-scoring token, preferring the result list over the active
    /// stratum.
    pub fn best_token(&self, arena: &TokenArena) -> Option<TokenId> {
        let best = |ids: &[TokenId]| {
            ids.iter()
                .copied()
                .max_by(|&a, &b| arena[a].score().total_cmp(&arena[b].score()))
        };
        best(&self.result_list).or_else(|| best(&self.active_tokens))
    }
}

/// Drives the per-frame search against a linguist, scorer, and pruner.
pub struct SearchManager {
    config: SearchConfig,
    relative_beam: f32,
    linguist: Box<dyn Linguist>,
    scorer: Box<dyn AcousticScorer>,
    pruner: Box<dyn Pruner>,
    arena: TokenArena,
    active_list: Box<dyn ActiveList>,
    active_lists: ActiveListManager,
    best_tokens: BestTokenMap,
    alternates: Option<AlternateHypothesisManager>,
    result_list: Vec<TokenId>,
    class_index: FxHashMap<StateClass, usize>,
    current_frame: u32,
    started: bool,
    stats: SearchStats,
}

impl SearchManager {
    pub fn new(
        config: SearchConfig,
        linguist: Box<dyn Linguist>,
        scorer: Box<dyn AcousticScorer>,
        pruner: Box<dyn Pruner>,
    ) -> Self {
        let relative_beam = config.relative_beam_log();
        let active_list = config
            .active_list_type
            .create(relative_beam, config.absolute_beam_width);
        let active_lists = ActiveListManager::new(
            Vec::new(),
            config.active_list_type,
            relative_beam,
            config.absolute_beam_width,
        );
        let best_tokens = BestTokenMap::new(config.token_heap_size, 0);
        Self {
            config,
            relative_beam,
            linguist,
            scorer,
            pruner,
            arena: TokenArena::new(),
            active_list,
            active_lists,
            best_tokens,
            alternates: None,
            result_list: Vec::new(),
            class_index: FxHashMap::default(),
            current_frame: 0,
            started: false,
            stats: SearchStats::default(),
        }
    }

    /// Start recognition: start collaborators, reset the token arena, seed
    /// the initial token, and grow it until the first emitting stratum is
    /// populated.
    ///
    /// # Errors
    /// - [`TrellisError::AlreadyStarted`] if already started.
    /// - [`TrellisError::MissingInitialState`] / [`TrellisError::EmptyStateOrder`]
    ///   on a broken linguist.
    pub fn start(&mut self) -> Result<()> {
        if self.started {
            return Err(TrellisError::AlreadyStarted);
        }
        self.linguist.start()?;
        self.pruner.start()?;
        self.scorer.start()?;
        self.local_start()?;
        self.started = true;
        info!("search started");
        Ok(())
    }

    /// Run up to `n_frames` iterations of the per-frame loop, stopping early
    /// when the scorer reports end of data.
    ///
    /// # Errors
    /// - [`TrellisError::NotStarted`] before `start()`.
    /// - State-order violations when `check_state_order` is enabled.
    pub fn recognize(&mut self, n_frames: usize) -> Result<RecognitionResult> {
        if !self.started {
            return Err(TrellisError::NotStarted);
        }

        let mut done = false;
        for _ in 0..n_frames {
            if done {
                break;
            }
            self.active_list = self.active_lists.take_emitting();

            // Grow skipping re-scores the same stratum against successive
            // frames, accumulating acoustic scores without expansion.
            loop {
                self.current_frame += 1;
                done = !self.score_tokens();
                if done {
                    break;
                }
                let skip = self.config.grow_skip_interval > 1
                    && self.current_frame % self.config.grow_skip_interval == 0;
                if !skip {
                    break;
                }
            }

            if !done {
                let capacity = (self.active_list.len() * 2).max(1);
                self.best_tokens = BestTokenMap::new(self.config.token_heap_size, capacity);
                self.prune_branches();
                self.result_list.clear();
                self.grow_emitting_branches()?;
                self.grow_non_emitting_lists()?;
            }
        }

        let result = RecognitionResult {
            result_list: self.result_list.clone(),
            active_tokens: self.active_list.tokens().to_vec(),
            frame: self.current_frame,
            is_final: done,
        };

        if self.config.show_token_count {
            self.show_token_count();
        }
        Ok(result)
    }

    /// Stop recognition. The token arena and the last result stay readable;
    /// both are reset by the next `start()`.
    ///
    /// # Errors
    /// - [`TrellisError::NotStarted`] if not started.
    pub fn stop(&mut self) -> Result<()> {
        if !self.started {
            return Err(TrellisError::NotStarted);
        }
        self.started = false;
        self.scorer.stop()?;
        self.pruner.stop()?;
        self.linguist.stop()?;
        info!(
            frames = self.stats.frames_scored,
            tokens_created = self.stats.tokens_created,
            tokens_scored = self.stats.tokens_scored,
            "search stopped"
        );
        Ok(())
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Token storage for the current utterance.
    pub fn arena(&self) -> &TokenArena {
        &self.arena
    }

    /// Alternate word-lattice edges, present when `build_word_lattice` is on.
    pub fn alternates(&self) -> Option<&AlternateHypothesisManager> {
        self.alternates.as_ref()
    }

    pub fn current_frame(&self) -> u32 {
        self.current_frame
    }

    pub fn stats(&self) -> SearchStats {
        self.stats
    }

    // ── Internal ─────────────────────────────────────────────────────────

    fn local_start(&mut self) -> Result<()> {
        self.current_frame = 0;
        self.stats = SearchStats::default();
        self.arena.clear();
        self.result_list.clear();

        let order = self.linguist.search_state_order();
        if order.is_empty() {
            return Err(TrellisError::EmptyStateOrder);
        }
        self.class_index = order
            .iter()
            .enumerate()
            .map(|(index, &class)| (class, index))
            .collect();
        self.active_lists = ActiveListManager::new(
            order,
            self.config.active_list_type,
            self.relative_beam,
            self.config.absolute_beam_width,
        );
        self.alternates = if self.config.build_word_lattice {
            Some(AlternateHypothesisManager::new())
        } else {
            None
        };

        let initial = self
            .linguist
            .initial_search_state()
            .ok_or(TrellisError::MissingInitialState)?;
        self.active_list = self.make_list();
        let token = self
            .arena
            .alloc(None, initial, 0.0, 0.0, 0.0, self.current_frame);
        self.active_list.add(&self.arena, token);
        self.best_tokens = BestTokenMap::new(self.config.token_heap_size, 1);

        self.grow_branches()?;
        self.grow_non_emitting_lists()
    }

    fn make_list(&self) -> Box<dyn ActiveList> {
        self.config
            .active_list_type
            .create(self.relative_beam, self.config.absolute_beam_width)
    }

    /// Score the current stratum against the next frame. Returns whether the
    /// scorer had data.
    fn score_tokens(&mut self) -> bool {
        let started = Instant::now();
        let best = self
            .scorer
            .calculate_scores(&mut self.arena, self.active_list.tokens());
        self.stats.score_time += started.elapsed();
        if best.is_some() {
            self.stats.frames_scored += 1;
            self.stats.tokens_scored += self.active_list.len() as u64;
        }
        self.active_list.set_best_token(best);
        best.is_some()
    }

    fn prune_branches(&mut self) {
        let started = Instant::now();
        let fresh = self.make_list();
        let list = std::mem::replace(&mut self.active_list, fresh);
        self.active_list = self.pruner.prune(&self.arena, list);
        self.stats.prune_time += started.elapsed();
    }

    /// Expand every token in the current stratum that passes the relative
    /// beam gate.
    fn grow_branches(&mut self) -> Result<()> {
        let started = Instant::now();
        let threshold = self.active_list.beam_threshold(&self.arena);
        let tokens = self.active_list.tokens().to_vec();
        for token in tokens {
            if self.arena[token].score() >= threshold {
                self.collect_successors(token)?;
            }
        }
        self.stats.grow_time += started.elapsed();
        Ok(())
    }

    /// Emitting-stratum growth with optional acoustic look-ahead: each
    /// token's gate score is extrapolated by the rate of change of its
    /// acoustic score. Path scores themselves are untouched.
    fn grow_emitting_branches(&mut self) -> Result<()> {
        let lookahead = self.config.acoustic_lookahead_frames;
        if lookahead <= 0.0 {
            return self.grow_branches();
        }

        let started = Instant::now();
        let tokens = self.active_list.tokens().to_vec();
        let mut best_working = f32::NEG_INFINITY;
        for &token in &tokens {
            let acoustic = self.arena[token].acoustic_score();
            let delta = match self.arena.last_emitting_ancestor(token) {
                Some(ancestor) => acoustic - self.arena[ancestor].acoustic_score(),
                None => 0.0,
            };
            let working = self.arena[token].score() + (acoustic + delta) * lookahead;
            if working > best_working {
                best_working = working;
            }
            self.arena.set_working_score(token, working);
        }

        let threshold = best_working + self.relative_beam;
        for token in tokens {
            if self.arena[token].working_score() >= threshold {
                self.collect_successors(token)?;
            }
        }
        self.stats.grow_time += started.elapsed();
        Ok(())
    }

    /// Drain non-emitting strata in class order until ε-closure completes.
    /// Strict score improvement at each state bounds this even on cyclic
    /// graphs.
    fn grow_non_emitting_lists(&mut self) -> Result<()> {
        while let Some(list) = self.active_lists.take_next_non_emitting() {
            self.active_list = list;
            self.prune_branches();
            self.grow_branches()?;
        }
        Ok(())
    }

    /// Expand one token: final tokens contribute their word ancestor to the
    /// result list; everything else competes arc by arc against the
    /// best-token map.
    fn collect_successors(&mut self, token: TokenId) -> Result<()> {
        if self.arena[token].is_final() {
            if let Some(word) = self.word_predecessor(token) {
                self.result_list.push(word);
            }
            return Ok(());
        }

        let state = self.arena[token].state().clone();
        let token_score = self.arena[token].score();
        let predecessor = self.word_predecessor(token);

        for arc in state.successors() {
            let next = arc.state;
            if self.config.check_state_order {
                self.check_order(state.as_ref(), next.as_ref())?;
            }

            let entry_score = token_score + arc.probability;
            let incumbent = self.best_tokens.get(&self.arena, next.as_ref());

            let wins = incumbent.map_or(true, |best| entry_score > self.arena[best].score());
            if wins {
                let created = self.arena.alloc(
                    predecessor,
                    next.clone(),
                    entry_score,
                    arc.language_probability,
                    arc.insertion_probability,
                    self.current_frame,
                );
                self.stats.tokens_created += 1;
                self.best_tokens.put(&self.arena, next.as_ref(), created);

                match incumbent {
                    None => self.active_lists.add(&self.arena, created)?,
                    Some(old) => {
                        self.active_lists.replace(&self.arena, old, created)?;
                        if next.is_word() {
                            if let Some(manager) = self.alternates.as_mut() {
                                // The loser's ancestry becomes lattice edges
                                // of the new winner.
                                manager.change_successor(created, old);
                                if let Some(old_predecessor) = self.arena[old].predecessor() {
                                    manager.add_alternate_predecessor(created, old_predecessor);
                                }
                            }
                        }
                    }
                }
            } else if next.is_word() {
                if let (Some(manager), Some(predecessor)) = (self.alternates.as_mut(), predecessor)
                {
                    let incumbent = incumbent.expect("loser implies an incumbent");
                    manager.add_alternate_predecessor(incumbent, predecessor);
                }
            }
        }
        Ok(())
    }

    /// The predecessor recorded on newly created successors: the token
    /// itself under `keep_all_tokens`, otherwise its most recent word
    /// ancestor.
    fn word_predecessor(&self, token: TokenId) -> Option<TokenId> {
        if self.config.keep_all_tokens {
            Some(token)
        } else {
            self.arena.word_ancestor(token)
        }
    }

    fn check_order(&self, from: &dyn SearchState, to: &dyn SearchState) -> Result<()> {
        // Emitting states may target any class.
        if from.is_emitting() {
            return Ok(());
        }
        let from_index = self.class_position(from.class())?;
        let to_index = self.class_position(to.class())?;
        if to_index < from_index {
            return Err(TrellisError::IllegalStateOrder {
                from: from.class(),
                to: to.class(),
            });
        }
        Ok(())
    }

    fn class_position(&self, class: StateClass) -> Result<usize> {
        self.class_index
            .get(&class)
            .copied()
            .ok_or(TrellisError::UnknownStateClass(class))
    }

    /// Count unique tokens reachable from the active and result lists.
    /// Expensive; behind `show_token_count`.
    fn show_token_count(&self) {
        let reachable = |roots: &[TokenId]| {
            let mut seen = FxHashSet::default();
            for &root in roots {
                let mut current = Some(root);
                while let Some(id) = current {
                    if !seen.insert(id) {
                        break;
                    }
                    current = self.arena[id].predecessor();
                }
            }
            seen.len()
        };
        debug!(
            active_lattice = reachable(self.active_list.tokens()),
            result_lattice = reachable(&self.result_list),
            frame = self.current_frame,
            "token count"
        );
    }
}
