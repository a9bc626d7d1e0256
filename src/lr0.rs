//! Canonical LR(0) item sets and goto transitions.
//!
//! States are identified by their *kernel*: the sorted, deduplicated set
//! of dot-advanced items that created them. Closure items are expanded on
//! the fly while a state is processed (memoized per nonterminal per state)
//! and never stored, but each state remembers which nonterminals its
//! closure introduced, which the lookahead pass needs for empty-body
//! reductions.
//!
//! All graph links are indices into the owning vectors; worklists are
//! plain queues.

use std::collections::VecDeque;
use std::io::{self, Write};

use crate::bitset::BitSet;
use crate::error::Result;
use crate::grammar::Grammar;

/// A `(production, dot)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Item {
    pub prod: usize,
    pub dot: usize,
}

#[derive(Debug, Clone)]
pub struct State {
    /// Sorted kernel items; immutable once the state is created.
    pub items: Vec<Item>,
    /// Outbound transition indices, in ascending symbol order.
    pub out: Vec<usize>,
    /// Inbound transition indices, in creation order.
    pub inbound: Vec<usize>,
    /// Nonterminals added by this state's closure, ascending.
    pub closure_nts: Vec<usize>,
}

/// A goto edge between two states, plus the per-transition storage used
/// by the lookahead relations: the terminal read set (nonterminal
/// transitions only) and the related-transition list that reads/includes
/// closure operates on.
#[derive(Debug, Clone)]
pub struct Transition {
    pub from: usize,
    pub to: usize,
    pub sym: usize,
    /// Terminal read set, indexed by `terminal - grammar.terms.start`.
    pub read: BitSet,
    pub rels: Vec<usize>,
}

#[derive(Debug, Clone)]
pub struct Automaton {
    pub states: Vec<State>,
    pub transitions: Vec<Transition>,
    pub initial: usize,
}

impl Automaton {
    /// Outbound transition of `state` on `sym`, if any.
    pub fn transition(&self, state: usize, sym: usize) -> Option<usize> {
        self.states[state]
            .out
            .iter()
            .copied()
            .find(|&t| self.transitions[t].sym == sym)
    }
}

/// Closure nonterminals of a kernel: the nonterminals whose productions
/// the full closure would add, each expanded at most once.
fn closure_nonterms(g: &Grammar, kernel: &[Item]) -> Vec<usize> {
    let mut added = vec![false; g.nonterms.end];
    let mut queue: VecDeque<usize> = VecDeque::new();

    let note = |sym: usize, queue: &mut VecDeque<usize>, added: &mut Vec<bool>| {
        if g.is_nonterm(sym) && !added[sym] {
            added[sym] = true;
            queue.push_back(sym);
        }
    };

    for item in kernel {
        let rhs = &g.prods[item.prod].rhs;
        if item.dot < rhs.len() {
            note(rhs[item.dot], &mut queue, &mut added);
        }
    }
    let mut out = Vec::new();
    while let Some(nt) = queue.pop_front() {
        out.push(nt);
        for p in g.prods_of(nt) {
            if let Some(&first) = g.prods[p].rhs.first() {
                note(first, &mut queue, &mut added);
            }
        }
    }
    out.sort_unstable();
    out
}

/// All items of a state: kernel plus dot-0 items of every closure
/// production.
fn full_items(g: &Grammar, state: &State) -> Vec<Item> {
    let mut items = state.items.clone();
    for &nt in &state.closure_nts {
        for p in g.prods_of(nt) {
            items.push(Item { prod: p, dot: 0 });
        }
    }
    items.sort_unstable();
    items.dedup();
    items
}

fn find_state(states: &[State], kernel: &[Item]) -> Option<usize> {
    states.iter().position(|s| s.items == kernel)
}

/// Build the canonical LR(0) automaton from the grammar's productions,
/// starting from the kernel `{(production 0, dot 0)}`.
pub fn build(g: &Grammar) -> Result<Automaton> {
    let nterms = g.terms.len();
    let initial_kernel = vec![Item { prod: 0, dot: 0 }];
    let mut states = vec![State {
        closure_nts: closure_nonterms(g, &initial_kernel),
        items: initial_kernel,
        out: Vec::new(),
        inbound: Vec::new(),
    }];
    let mut transitions: Vec<Transition> = Vec::new();
    let mut work: VecDeque<usize> = VecDeque::from([0]);

    while let Some(si) = work.pop_front() {
        log::trace!("lr0: expanding state {} of {}", si, states.len());
        // Bucket dot-advanced candidate items per transition symbol.
        let mut buckets: Vec<Vec<Item>> = vec![Vec::new(); g.max_symbol()];
        for item in full_items(g, &states[si]) {
            let rhs = &g.prods[item.prod].rhs;
            if item.dot < rhs.len() {
                buckets[rhs[item.dot]].push(Item {
                    prod: item.prod,
                    dot: item.dot + 1,
                });
            }
        }
        for (sym, mut kernel) in buckets.into_iter().enumerate() {
            if kernel.is_empty() {
                continue;
            }
            kernel.sort_unstable();
            kernel.dedup();
            let to = match find_state(&states, &kernel) {
                Some(to) => to,
                None => {
                    let to = states.len();
                    states.push(State {
                        closure_nts: closure_nonterms(g, &kernel),
                        items: kernel,
                        out: Vec::new(),
                        inbound: Vec::new(),
                    });
                    work.push_back(to);
                    to
                }
            };
            let ti = transitions.len();
            transitions.push(Transition {
                from: si,
                to,
                sym,
                read: BitSet::new(nterms)?,
                rels: Vec::new(),
            });
            states[si].out.push(ti);
            states[to].inbound.push(ti);
        }
    }

    log::debug!(
        "lr0: {} states, {} transitions, {} productions",
        states.len(),
        transitions.len(),
        g.prods.len()
    );
    Ok(Automaton {
        states,
        transitions,
        initial: 0,
    })
}

/// Reduce items of a state: kernel items at end of production, plus every
/// empty-body production its closure introduces.
pub fn reduce_items(g: &Grammar, aut: &Automaton, state: usize) -> Vec<Item> {
    let mut out = Vec::new();
    for item in &aut.states[state].items {
        if item.dot == g.prods[item.prod].rhs.len() {
            out.push(*item);
        }
    }
    for &nt in &aut.states[state].closure_nts {
        for p in g.prods_of(nt) {
            if g.prods[p].rhs.is_empty() {
                out.push(Item { prod: p, dot: 0 });
            }
        }
    }
    out.sort_unstable();
    out.dedup();
    out
}

/// Write the item sets in a compact human-readable form, one state per
/// block, the dot rendered as `.`.
pub fn write_states<W: Write>(
    out: &mut W,
    g: &Grammar,
    aut: &Automaton,
    names: &[String],
) -> io::Result<()> {
    let name = |sym: usize| -> String {
        names
            .get(sym)
            .cloned()
            .unwrap_or_else(|| format!("${sym}"))
    };
    writeln!(out, "CS,{}", aut.states.len())?;
    for (i, state) in aut.states.iter().enumerate() {
        for item in full_items(g, state) {
            let p = &g.prods[item.prod];
            let lhs: Vec<String> = p.lhs.iter().map(|&s| name(s)).collect();
            write!(out, "C,{},{} ->", i, lhs.join("|"))?;
            for (j, &s) in p.rhs.iter().enumerate() {
                if j == item.dot {
                    write!(out, " .")?;
                }
                write!(out, " {}", name(s))?;
            }
            if item.dot == p.rhs.len() {
                write!(out, " .")?;
            }
            writeln!(out)?;
        }
        writeln!(out)?;
    }
    Ok(())
}
