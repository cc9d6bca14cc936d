//! In-memory search graph with explicit topology.
//!
//! `GraphLinguist` is the reference linguist: states, classes, and arcs are
//! declared up front through a `GraphBuilder`, then frozen. It backs the unit
//! and scenario tests and is a workable linguist for small grammars.

use std::fmt;
use std::sync::Arc;

use super::{Linguist, SearchArc, SearchState, StateClass, StateId, StateRef};

/// Declaration of one graph state, consumed by [`GraphBuilder::add_state`].
#[derive(Debug, Clone, Copy)]
pub struct StateSpec {
    class: StateClass,
    emitting: bool,
    word: bool,
    final_state: bool,
}

impl StateSpec {
    /// A non-emitting, non-word, non-final state of the given class.
    pub fn new(class: StateClass) -> Self {
        Self {
            class,
            emitting: false,
            word: false,
            final_state: false,
        }
    }

    pub fn emitting(mut self) -> Self {
        self.emitting = true;
        self
    }

    pub fn word(mut self) -> Self {
        self.word = true;
        self
    }

    pub fn final_state(mut self) -> Self {
        self.final_state = true;
        self
    }
}

#[derive(Debug)]
struct ArcData {
    target: usize,
    probability: f32,
    language_probability: f32,
    insertion_probability: f32,
}

#[derive(Debug)]
struct NodeData {
    class: StateClass,
    emitting: bool,
    word: bool,
    final_state: bool,
    arcs: Vec<ArcData>,
}

#[derive(Debug)]
struct GraphInner {
    nodes: Vec<NodeData>,
}

/// Builder for [`GraphLinguist`].
#[derive(Debug, Default)]
pub struct GraphBuilder {
    nodes: Vec<NodeData>,
    initial: Option<usize>,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a state and return its index (also its `StateId`).
    pub fn add_state(&mut self, spec: StateSpec) -> usize {
        self.nodes.push(NodeData {
            class: spec.class,
            emitting: spec.emitting,
            word: spec.word,
            final_state: spec.final_state,
            arcs: Vec::new(),
        });
        self.nodes.len() - 1
    }

    /// Add an arc between two previously added states. Probabilities are
    /// log-domain; `probability` is the total applied to the path score.
    pub fn add_arc(
        &mut self,
        from: usize,
        to: usize,
        probability: f32,
        language_probability: f32,
        insertion_probability: f32,
    ) {
        assert!(to < self.nodes.len(), "arc target {to} out of range");
        self.nodes[from].arcs.push(ArcData {
            target: to,
            probability,
            language_probability,
            insertion_probability,
        });
    }

    /// Mark the entry state of the graph.
    pub fn set_initial(&mut self, index: usize) {
        assert!(index < self.nodes.len(), "initial state {index} out of range");
        self.initial = Some(index);
    }

    /// Freeze the graph. `order` is the class ordering handed to the search
    /// manager: non-emitting classes first, emitting class last.
    pub fn build(self, order: Vec<StateClass>) -> GraphLinguist {
        GraphLinguist {
            inner: Arc::new(GraphInner { nodes: self.nodes }),
            initial: self.initial,
            order,
        }
    }
}

/// A frozen in-memory search graph.
pub struct GraphLinguist {
    inner: Arc<GraphInner>,
    initial: Option<usize>,
    order: Vec<StateClass>,
}

impl GraphLinguist {
    /// Convenience: a linear chain of `length` emitting states fed by a
    /// non-emitting entry state and terminated by a final word state.
    ///
    /// Every arc carries `arc_probability` (log-domain) and zero language and
    /// insertion contributions. Class `0` holds the non-emitting states,
    /// class `1` the emitting ones.
    pub fn chain(length: usize, arc_probability: f32) -> GraphLinguist {
        assert!(length > 0, "chain needs at least one emitting state");
        let non_emitting = StateClass(0);
        let emitting = StateClass(1);

        let mut builder = GraphBuilder::new();
        let entry = builder.add_state(StateSpec::new(non_emitting));
        let states: Vec<usize> = (0..length)
            .map(|_| builder.add_state(StateSpec::new(emitting).emitting()))
            .collect();
        let exit = builder.add_state(StateSpec::new(non_emitting).word().final_state());

        builder.add_arc(entry, states[0], arc_probability, 0.0, 0.0);
        for pair in states.windows(2) {
            builder.add_arc(pair[0], pair[1], arc_probability, 0.0, 0.0);
        }
        builder.add_arc(states[length - 1], exit, arc_probability, 0.0, 0.0);
        builder.set_initial(entry);

        builder.build(vec![non_emitting, emitting])
    }

    fn state(&self, index: usize) -> StateRef {
        Arc::new(GraphState {
            graph: Arc::clone(&self.inner),
            index,
        })
    }
}

impl Linguist for GraphLinguist {
    fn initial_search_state(&self) -> Option<StateRef> {
        self.initial.map(|index| self.state(index))
    }

    fn search_state_order(&self) -> Vec<StateClass> {
        self.order.clone()
    }
}

struct GraphState {
    graph: Arc<GraphInner>,
    index: usize,
}

impl GraphState {
    fn node(&self) -> &NodeData {
        &self.graph.nodes[self.index]
    }
}

impl fmt::Debug for GraphState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GraphState({}, {:?})", self.index, self.node().class)
    }
}

impl SearchState for GraphState {
    fn id(&self) -> StateId {
        StateId(self.index as u64)
    }

    fn class(&self) -> StateClass {
        self.node().class
    }

    fn is_emitting(&self) -> bool {
        self.node().emitting
    }

    fn is_word(&self) -> bool {
        self.node().word
    }

    fn is_final(&self) -> bool {
        self.node().final_state
    }

    fn successors(&self) -> Vec<SearchArc> {
        self.node()
            .arcs
            .iter()
            .map(|arc| SearchArc {
                state: Arc::new(GraphState {
                    graph: Arc::clone(&self.graph),
                    index: arc.target,
                }),
                probability: arc.probability,
                language_probability: arc.language_probability,
                insertion_probability: arc.insertion_probability,
            })
            .collect()
    }
}
