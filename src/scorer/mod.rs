//! Acoustic scoring abstraction.
//!
//! The `AcousticScorer` trait decouples the search loop from any specific
//! acoustic front end. `&mut self` expresses that scorers are stateful:
//! they consume one feature frame per call and may hold model caches.
//! A scorer may parallelize internally, but the call itself is atomic: it
//! scores the whole stratum and returns.

pub mod table;

pub use table::{FrameScores, TableScorer};

use crate::error::Result;
use crate::token::{TokenArena, TokenId};

/// Contract for acoustic scoring backends.
pub trait AcousticScorer: Send {
    /// Lifecycle hook called once per utterance before recognition.
    fn start(&mut self) -> Result<()> {
        Ok(())
    }

    /// Lifecycle hook called when recognition terminates.
    fn stop(&mut self) -> Result<()> {
        Ok(())
    }

    /// Score one stratum of emitting tokens against the next feature frame.
    ///
    /// Implementations must call [`TokenArena::apply_acoustic_score`] for
    /// every token in `tokens`, which finalizes the token's acoustic score
    /// and folds it into its path score.
    ///
    /// Returns the best-scoring token, or `None` when no more frames are
    /// available (including when `tokens` is empty), which ends the
    /// utterance.
    fn calculate_scores(&mut self, arena: &mut TokenArena, tokens: &[TokenId]) -> Option<TokenId>;
}
