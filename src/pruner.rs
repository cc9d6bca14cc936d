//! Pruning abstraction.
//!
//! A `Pruner` takes an active list after scoring and returns the subset worth
//! growing. The shipped [`SimplePruner`] delegates to the list's own
//! absolute-beam purge; heavier policies (adaptive beams, word-count caps)
//! plug in behind the same trait.

use crate::error::Result;
use crate::search::active_list::ActiveList;
use crate::token::TokenArena;

/// Contract for active-list pruning policies.
pub trait Pruner: Send {
    /// Lifecycle hook called once per utterance before recognition.
    fn start(&mut self) -> Result<()> {
        Ok(())
    }

    /// Lifecycle hook called when recognition terminates.
    fn stop(&mut self) -> Result<()> {
        Ok(())
    }

    /// Reduce `list` to the tokens worth expanding. May return the same list.
    fn prune(&mut self, arena: &TokenArena, list: Box<dyn ActiveList>) -> Box<dyn ActiveList>;
}

/// Default pruner: enforces the list's own absolute beam and nothing else.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimplePruner;

impl Pruner for SimplePruner {
    fn prune(&mut self, arena: &TokenArena, mut list: Box<dyn ActiveList>) -> Box<dyn ActiveList> {
        list.purge(arena);
        list
    }
}
