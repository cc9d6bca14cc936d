//! Stratified active lists, one per state class.
//!
//! The manager routes tokens into per-class slots in the order the linguist
//! declared. The emitting class occupies the last slot; everything before it
//! is non-emitting and is drained in declaration order during ε-closure.

use rustc_hash::FxHashMap;

use super::active_list::{ActiveList, ActiveListType};
use crate::error::{Result, TrellisError};
use crate::linguist::StateClass;
use crate::token::{TokenArena, TokenId};

pub struct ActiveListManager {
    order: Vec<StateClass>,
    index: FxHashMap<StateClass, usize>,
    slots: Vec<Option<Box<dyn ActiveList>>>,
    list_type: ActiveListType,
    relative_beam: f32,
    absolute_beam: usize,
}

impl ActiveListManager {
    /// `order` is the linguist's class ordering; its last entry is the
    /// emitting class.
    pub fn new(
        order: Vec<StateClass>,
        list_type: ActiveListType,
        relative_beam: f32,
        absolute_beam: usize,
    ) -> Self {
        let index: FxHashMap<StateClass, usize> = order
            .iter()
            .enumerate()
            .map(|(i, &class)| (class, i))
            .collect();
        debug_assert_eq!(index.len(), order.len(), "duplicate state class in order");
        let slots = (0..order.len()).map(|_| None).collect();
        Self {
            order,
            index,
            slots,
            list_type,
            relative_beam,
            absolute_beam,
        }
    }

    fn make_list(&self) -> Box<dyn ActiveList> {
        self.list_type.create(self.relative_beam, self.absolute_beam)
    }

    fn slot_index(&self, class: StateClass) -> Result<usize> {
        self.index
            .get(&class)
            .copied()
            .ok_or(TrellisError::UnknownStateClass(class))
    }

    fn slot_mut(&mut self, index: usize) -> &mut Box<dyn ActiveList> {
        if self.slots[index].is_none() {
            self.slots[index] = Some(self.make_list());
        }
        self.slots[index].as_mut().expect("slot just populated")
    }

    /// Route a token into the slot for its state class.
    pub fn add(&mut self, arena: &TokenArena, token: TokenId) -> Result<()> {
        let class = arena[token].state().class();
        let index = self.slot_index(class)?;
        self.slot_mut(index).add(arena, token);
        Ok(())
    }

    /// Replace a superseded token with its better successor in the same slot.
    /// The old token may already be gone from the slot; the new one is added
    /// regardless.
    pub fn replace(&mut self, arena: &TokenArena, old: TokenId, new: TokenId) -> Result<()> {
        let class = arena[old].state().class();
        let index = self.slot_index(class)?;
        let slot = self.slot_mut(index);
        slot.remove(old);
        slot.add(arena, new);
        Ok(())
    }

    /// Take the emitting stratum, leaving an empty slot behind. All tokens in
    /// it share one frame.
    pub fn take_emitting(&mut self) -> Box<dyn ActiveList> {
        match self.order.len() {
            0 => self.make_list(),
            n => self.slots[n - 1].take().unwrap_or_else(|| self.make_list()),
        }
    }

    /// Take the first non-empty non-emitting stratum in class order, or
    /// `None` when ε-closure is complete.
    pub fn take_next_non_emitting(&mut self) -> Option<Box<dyn ActiveList>> {
        let non_emitting = self.order.len().saturating_sub(1);
        for index in 0..non_emitting {
            let occupied = self.slots[index]
                .as_ref()
                .map_or(false, |list| !list.is_empty());
            if occupied {
                return self.slots[index].take();
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linguist::{SearchArc, SearchState, StateId, StateRef};
    use std::sync::Arc;

    #[derive(Debug)]
    struct ClassedState {
        id: u64,
        class: StateClass,
        emitting: bool,
    }

    impl SearchState for ClassedState {
        fn id(&self) -> StateId {
            StateId(self.id)
        }

        fn class(&self) -> StateClass {
            self.class
        }

        fn is_emitting(&self) -> bool {
            self.emitting
        }

        fn successors(&self) -> Vec<SearchArc> {
            Vec::new()
        }
    }

    fn token(arena: &mut TokenArena, id: u64, class: u32, emitting: bool, score: f32) -> TokenId {
        let state: StateRef = Arc::new(ClassedState {
            id,
            class: StateClass(class),
            emitting,
        });
        arena.alloc(None, state, score, 0.0, 0.0, 0)
    }

    fn manager() -> ActiveListManager {
        ActiveListManager::new(
            vec![StateClass(0), StateClass(1), StateClass(2)],
            ActiveListType::Simple,
            f32::NEG_INFINITY,
            0,
        )
    }

    #[test]
    fn routes_by_class_and_takes_in_order() {
        let mut arena = TokenArena::new();
        let mut mgr = manager();
        let later = token(&mut arena, 0, 1, false, -1.0);
        let earlier = token(&mut arena, 1, 0, false, -2.0);
        let emitting = token(&mut arena, 2, 2, true, -3.0);
        for t in [later, earlier, emitting] {
            mgr.add(&arena, t).expect("known class");
        }

        let first = mgr.take_next_non_emitting().expect("class 0 stratum");
        assert_eq!(first.tokens(), &[earlier]);
        let second = mgr.take_next_non_emitting().expect("class 1 stratum");
        assert_eq!(second.tokens(), &[later]);
        assert!(mgr.take_next_non_emitting().is_none());

        let emitting_list = mgr.take_emitting();
        assert_eq!(emitting_list.tokens(), &[emitting]);
    }

    #[test]
    fn take_emitting_yields_fresh_empty_list_when_unused() {
        let mut mgr = manager();
        assert!(mgr.take_emitting().is_empty());
    }

    #[test]
    fn unknown_class_is_fatal() {
        let mut arena = TokenArena::new();
        let mut mgr = manager();
        let stray = token(&mut arena, 0, 9, false, 0.0);
        let err = mgr.add(&arena, stray).expect_err("unknown class");
        assert!(matches!(
            err,
            TrellisError::UnknownStateClass(StateClass(9))
        ));
    }

    #[test]
    fn replace_swaps_tokens_within_slot() {
        let mut arena = TokenArena::new();
        let mut mgr = manager();
        let old = token(&mut arena, 0, 1, false, -4.0);
        let new = token(&mut arena, 1, 1, false, -1.0);
        mgr.add(&arena, old).expect("known class");
        mgr.replace(&arena, old, new).expect("known class");

        let stratum = mgr.take_next_non_emitting().expect("class 1 stratum");
        assert_eq!(stratum.tokens(), &[new]);
    }

    #[test]
    fn non_emitting_stratum_refills_after_take() {
        let mut arena = TokenArena::new();
        let mut mgr = manager();
        let first = token(&mut arena, 0, 0, false, -1.0);
        mgr.add(&arena, first).expect("known class");
        let _ = mgr.take_next_non_emitting().expect("stratum");

        // ε-cycles may deposit more tokens into an already-drained class.
        let second = token(&mut arena, 1, 0, false, -0.5);
        mgr.add(&arena, second).expect("known class");
        let stratum = mgr.take_next_non_emitting().expect("refilled stratum");
        assert_eq!(stratum.tokens(), &[second]);
    }
}
