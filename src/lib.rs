//! # trellis
//!
//! Word-pruning breadth-first token search core for large-vocabulary
//! continuous speech decoding.
//!
//! ## Architecture
//!
//! ```text
//! Linguist (search graph) ──► SearchManager ◄── AcousticScorer (frames)
//!                                  │
//!                    per frame: score → prune → grow
//!                                  │
//!               TokenArena (hypothesis lattice, arena-allocated)
//!                                  │
//!            RecognitionResult + AlternateHypothesisManager
//!                     (word-lattice construction downstream)
//! ```
//!
//! The crate owns the search loop and the token lattice. Acoustic scoring,
//! search-graph construction, and pruning policy plug in behind the
//! [`AcousticScorer`], [`Linguist`], and [`Pruner`] traits; shipped
//! reference implementations ([`TableScorer`](scorer::TableScorer),
//! [`GraphLinguist`](linguist::GraphLinguist), [`SimplePruner`]) cover
//! development and testing.
//!
//! The core is single-threaded: one `recognize(n)` call is a straight-line
//! computation over at most `n` frames.

#![forbid(unsafe_code)]
#![warn(clippy::all)]

pub mod error;
pub mod linguist;
pub mod pruner;
pub mod scorer;
pub mod search;
pub mod token;

// Convenience re-exports for downstream crates
pub use error::TrellisError;
pub use linguist::{Linguist, SearchArc, SearchState, StateClass, StateId, StateRef};
pub use pruner::{Pruner, SimplePruner};
pub use scorer::AcousticScorer;
pub use search::{
    ActiveListType, AlternateHypothesisManager, RecognitionResult, SearchConfig, SearchManager,
    SearchStats,
};
pub use token::{Token, TokenArena, TokenId};
