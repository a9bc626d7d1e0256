//! Growable NFA node/edge store.
//!
//! Nodes are identified by index into the owning graph, never by pointer.
//! Edges are byte-labeled (`Some(b)`) or epsilon (`None`). Per-rule NFA
//! fragments are compiled into private graphs and then merged into one
//! cumulative automaton; acceptance of a particular rule is recognized
//! purely by "which rule's exit node is in the current DFA state".

#[derive(Debug, Clone, Default)]
pub struct NfaNode {
    /// Outgoing `(label, target)` edges; `None` label is epsilon.
    pub edges: Vec<(Option<u8>, usize)>,
}

/// An NFA fragment: one entry node, one exit node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frag {
    pub entry: usize,
    pub exit: usize,
}

#[derive(Debug, Clone, Default)]
pub struct NfaGraph {
    pub nodes: Vec<NfaNode>,
    /// Global start node; meaningful once the graph is non-empty.
    pub start: usize,
}

impl NfaGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn add_node(&mut self) -> usize {
        let id = self.nodes.len();
        self.nodes.push(NfaNode::default());
        id
    }

    pub fn add_edge(&mut self, from: usize, label: u8, to: usize) {
        self.nodes[from].edges.push((Some(label), to));
    }

    pub fn add_epsilon(&mut self, from: usize, to: usize) {
        self.nodes[from].edges.push((None, to));
    }

    /// Merge `src` (with its designated entry/exit fragment) into `self`.
    ///
    /// The first merge into an empty graph adopts `src` verbatim and makes
    /// the fragment entry the global start. Later merges clone `src`'s
    /// nodes index-shifted and add an epsilon edge from the global start to
    /// the cloned entry. Returns the index of the cloned exit node, which
    /// the caller records as the merged rule's accepting node.
    pub fn merge(&mut self, src: &NfaGraph, frag: Frag) -> usize {
        if self.is_empty() {
            self.nodes = src.nodes.clone();
            self.start = frag.entry;
            return frag.exit;
        }
        let shift = self.nodes.len();
        for node in &src.nodes {
            let edges = node
                .edges
                .iter()
                .map(|&(label, to)| (label, to + shift))
                .collect();
            self.nodes.push(NfaNode { edges });
        }
        self.add_epsilon(self.start, frag.entry + shift);
        frag.exit + shift
    }
}
