//! Search-space abstraction.
//!
//! The `Linguist` trait is the primary extensibility point on the language
//! side: it hands the search manager an initial state and a fixed ordering of
//! state classes, and each `SearchState` enumerates its own outgoing arcs.
//! The search manager never inspects grammar, lexicon, or acoustic topology
//! directly; it only walks this graph.
//!
//! All probabilities on arcs are natural-log domain, so combining them along
//! a path is addition.

pub mod graph;

pub use graph::{GraphBuilder, GraphLinguist, StateSpec};

use std::fmt;
use std::sync::Arc;

use crate::error::Result;

/// Identifies a search state within one linguist's graph.
///
/// Ids must be stable and unique for the lifetime of the graph; the search
/// manager keys its best-token map on them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StateId(pub u64);

/// Dense class tag for a search state.
///
/// The linguist assigns one tag per structural state kind and declares their
/// ordering via [`Linguist::search_state_order`]. Non-emitting classes come
/// strictly before the emitting class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StateClass(pub u32);

/// Shared handle to a node in the linguist's graph.
pub type StateRef = Arc<dyn SearchState>;

/// A node in the linguist's static search graph.
pub trait SearchState: fmt::Debug + Send + Sync {
    /// Stable id, unique within the owning linguist.
    fn id(&self) -> StateId;

    /// Class tag used for active-list routing and state-order checks.
    fn class(&self) -> StateClass;

    /// Whether advancing through this state consumes an acoustic frame.
    fn is_emitting(&self) -> bool;

    /// Whether traversal of this state marks a word boundary.
    fn is_word(&self) -> bool {
        false
    }

    /// Whether this state terminates an utterance.
    fn is_final(&self) -> bool {
        false
    }

    /// Outgoing arcs, with log-domain probabilities.
    fn successors(&self) -> Vec<SearchArc>;

    /// Lexical-state id, for keying parallel HMM paths. Only consulted in
    /// bounded-heap map mode.
    fn lex_state(&self) -> Option<u64> {
        None
    }

    /// Word-history id, for keying parallel HMM paths. Only consulted in
    /// bounded-heap map mode.
    fn word_history(&self) -> Option<u64> {
        None
    }
}

/// A transition between two search states.
#[derive(Clone)]
pub struct SearchArc {
    /// Target state.
    pub state: StateRef,
    /// Total transition log-probability applied to the path score.
    pub probability: f32,
    /// Language-model contribution (log), recorded on the created token.
    pub language_probability: f32,
    /// Insertion penalty contribution (log), recorded on the created token.
    pub insertion_probability: f32,
}

impl fmt::Debug for SearchArc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SearchArc")
            .field("state", &self.state.id())
            .field("probability", &self.probability)
            .finish_non_exhaustive()
    }
}

/// Contract for search-space providers.
pub trait Linguist: Send {
    /// Lifecycle hook called once per utterance before recognition.
    fn start(&mut self) -> Result<()> {
        Ok(())
    }

    /// Lifecycle hook called when recognition terminates.
    fn stop(&mut self) -> Result<()> {
        Ok(())
    }

    /// Entry point of the search graph, or `None` if the graph is empty.
    fn initial_search_state(&self) -> Option<StateRef>;

    /// The fixed class ordering: non-emitting classes first, in expansion
    /// order, with the emitting class last.
    fn search_state_order(&self) -> Vec<StateClass>;
}
