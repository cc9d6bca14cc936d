//! Scripted scorer backed by a table of per-frame scores.
//!
//! `TableScorer` replays a fixed sequence of frames: each frame carries a
//! uniform default score plus optional per-state overrides. When the script
//! runs out it reports end of data. Useful for development and for driving
//! the search loop deterministically in tests.

use std::collections::VecDeque;

use rustc_hash::FxHashMap;

use super::AcousticScorer;
use crate::linguist::StateId;
use crate::token::{TokenArena, TokenId};

/// Acoustic scores for one frame.
#[derive(Debug, Clone)]
pub struct FrameScores {
    default_score: f32,
    overrides: FxHashMap<StateId, f32>,
}

impl FrameScores {
    /// Every state scores `default_score` this frame.
    pub fn uniform(default_score: f32) -> Self {
        Self {
            default_score,
            overrides: FxHashMap::default(),
        }
    }

    /// Override the score for one state.
    pub fn with_score(mut self, state: StateId, score: f32) -> Self {
        self.overrides.insert(state, score);
        self
    }

    fn score_for(&self, state: StateId) -> f32 {
        self.overrides.get(&state).copied().unwrap_or(self.default_score)
    }
}

/// Replays a scripted sequence of [`FrameScores`].
#[derive(Debug, Default)]
pub struct TableScorer {
    frames: VecDeque<FrameScores>,
}

impl TableScorer {
    pub fn new(frames: impl IntoIterator<Item = FrameScores>) -> Self {
        Self {
            frames: frames.into_iter().collect(),
        }
    }

    /// `count` frames, each scoring every state at `score`.
    pub fn uniform(score: f32, count: usize) -> Self {
        Self::new((0..count).map(|_| FrameScores::uniform(score)))
    }

    pub fn frames_remaining(&self) -> usize {
        self.frames.len()
    }
}

impl AcousticScorer for TableScorer {
    fn calculate_scores(&mut self, arena: &mut TokenArena, tokens: &[TokenId]) -> Option<TokenId> {
        if tokens.is_empty() {
            return None;
        }
        let frame = self.frames.pop_front()?;

        let mut best: Option<TokenId> = None;
        for &token in tokens {
            let score = frame.score_for(arena[token].state().id());
            arena.apply_acoustic_score(token, score);
            if best.map_or(true, |b| arena[token].score() > arena[b].score()) {
                best = Some(token);
            }
        }
        best
    }
}
