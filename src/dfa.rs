//! Subset construction: NFA to DFA.
//!
//! Each DFA state is the epsilon-closed bitmap of its member NFA nodes.
//! Duplicate suppression is by exact bitmap equality against every state
//! built so far — a linear scan per transition, which is a known and
//! accepted trade-off at the automaton sizes this tool sees.
//!
//! State ordinals depend only on worklist order, which depends only on the
//! input NFA; regenerating from identical input yields identical ordinals.

use std::collections::VecDeque;

use crate::bitset::BitSet;
use crate::error::Result;
use crate::nfa::NfaGraph;

/// "No transition" marker in a state's move table.
pub const NONE: u32 = u32::MAX;

#[derive(Debug, Clone)]
pub struct DfaState {
    /// Epsilon-closed NFA node membership.
    pub members: BitSet,
    /// Per-byte target state index, or [`NONE`].
    pub moves: [u32; 256],
}

#[derive(Debug, Clone)]
pub struct Dfa {
    pub states: Vec<DfaState>,
    pub start: usize,
}

/// Extend `set` to its epsilon closure, iterating to a fixed point.
fn close(nfa: &NfaGraph, set: &mut BitSet) {
    let mut changed = true;
    while changed {
        changed = false;
        for node in 0..nfa.len() {
            if !set.test(node) {
                continue;
            }
            for &(label, to) in &nfa.nodes[node].edges {
                if label.is_none() && !set.test(to) {
                    set.set(to);
                    changed = true;
                }
            }
        }
    }
}

fn find_state(states: &[DfaState], members: &BitSet) -> Option<usize> {
    states.iter().position(|s| &s.members == members)
}

/// Run subset construction from the NFA's global start node.
pub fn build(nfa: &NfaGraph) -> Result<Dfa> {
    let mut start_set = BitSet::new(nfa.len())?;
    start_set.set(nfa.start);
    close(nfa, &mut start_set);

    let mut states = vec![DfaState {
        members: start_set,
        moves: [NONE; 256],
    }];
    let mut work: VecDeque<usize> = VecDeque::from([0]);

    while let Some(si) = work.pop_front() {
        log::trace!("dfa: expanding state {} of {}", si, states.len());
        for byte in 0..=255u8 {
            let mut next = BitSet::new(nfa.len())?;
            for node in states[si].members.ones() {
                for &(label, to) in &nfa.nodes[node].edges {
                    if label == Some(byte) {
                        next.set(to);
                    }
                }
            }
            if next.is_empty() {
                continue;
            }
            close(nfa, &mut next);
            let ti = match find_state(&states, &next) {
                Some(ti) => ti,
                None => {
                    let ti = states.len();
                    states.push(DfaState {
                        members: next,
                        moves: [NONE; 256],
                    });
                    work.push_back(ti);
                    ti
                }
            };
            states[si].moves[byte as usize] = ti as u32;
        }
    }

    log::debug!("dfa: {} states from {} nfa nodes", states.len(), nfa.len());
    Ok(Dfa { states, start: 0 })
}
