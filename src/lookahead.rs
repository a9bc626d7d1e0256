//! Reduce-lookahead computation over the LR(0) automaton.
//!
//! DeRemer–Pennello style, extended for productions with several possible
//! reduction nonterminals:
//!
//! 1. nullable nonterminals, by fixed-point iteration;
//! 2. direct read sets per nonterminal transition;
//! 3. the reads relation, closed with Tarjan SCC — a cycle here (or a
//!    cyclic derivation `A =>+ A` through fully nullable contexts) means
//!    the grammar is not LALR(1) and the pass fails;
//! 4. the includes relation, closed with Tarjan SCC — cycles are legal
//!    and simply share their Follow sets;
//! 5. per-state reduce lookaheads through lookback: back up the body from
//!    the reducing state and union the Follow sets of every reduction
//!    nonterminal's transition at each root.
//!
//! Read/Follow sets live in the transitions themselves (`read`), and both
//! relation passes reuse the per-transition `rels` lists; Tarjan
//! bookkeeping is kept in side arrays local to the closure.

use crate::bitset::BitSet;
use crate::error::{Error, Result};
use crate::grammar::Grammar;
use crate::lr0::{self, Automaton};

/// Reduce entries per state: `(production, lookahead terminals)`, with
/// the lookahead bitset indexed by `terminal - grammar.terms.start`.
#[derive(Debug, Clone)]
pub struct Lookaheads {
    pub reduces: Vec<Vec<(usize, BitSet)>>,
}

/// Least fixed point of "some production of this nonterminal has an
/// all-nullable body".
pub fn nullable_set(g: &Grammar) -> Vec<bool> {
    let mut nullable = vec![false; g.nonterms.end];
    let mut changed = true;
    while changed {
        changed = false;
        for p in &g.prods {
            if p.rhs.iter().all(|&s| g.is_nonterm(s) && nullable[s]) {
                for &lhs in &p.lhs {
                    if !nullable[lhs] {
                        nullable[lhs] = true;
                        changed = true;
                    }
                }
            }
        }
    }
    nullable
}

/// Tarjan-based closure of `sets` over `rels`: afterwards each node's set
/// is the union of its own and every reachable node's set, with SCC
/// members sharing one set. With `fail_on_cycle`, a non-trivial SCC (or
/// self-edge) aborts with [`Error::NotLrGrammar`].
fn close_relation(
    rels: &[Vec<usize>],
    sets: &mut [BitSet],
    fail_on_cycle: bool,
) -> Result<()> {
    struct Walk<'a> {
        rels: &'a [Vec<usize>],
        index: Vec<Option<usize>>,
        low: Vec<usize>,
        on_stack: Vec<bool>,
        stack: Vec<usize>,
        counter: usize,
        fail_on_cycle: bool,
    }

    impl Walk<'_> {
        fn visit(&mut self, v: usize, sets: &mut [BitSet]) -> Result<()> {
            let idx = self.counter;
            self.counter += 1;
            self.index[v] = Some(idx);
            self.low[v] = idx;
            self.stack.push(v);
            self.on_stack[v] = true;

            for i in 0..self.rels[v].len() {
                let w = self.rels[v][i];
                if self.index[w].is_none() {
                    self.visit(w, sets)?;
                    self.low[v] = self.low[v].min(self.low[w]);
                } else if self.on_stack[w] {
                    self.low[v] = self.low[v].min(self.index[w].unwrap());
                }
                let sw = sets[w].clone();
                sets[v].union_with(&sw);
            }

            if self.low[v] == self.index[v].unwrap() {
                let mut members = Vec::new();
                loop {
                    let w = self.stack.pop().unwrap();
                    self.on_stack[w] = false;
                    members.push(w);
                    if w == v {
                        break;
                    }
                }
                let cyclic =
                    members.len() > 1 || self.rels[v].contains(&v);
                if cyclic && self.fail_on_cycle {
                    log::debug!("relation cycle through {} node(s)", members.len());
                    return Err(Error::NotLrGrammar);
                }
                for &m in &members {
                    if m != v {
                        sets[m] = sets[v].clone();
                    }
                }
            }
            Ok(())
        }
    }

    let n = rels.len();
    let mut walk = Walk {
        rels,
        index: vec![None; n],
        low: vec![0; n],
        on_stack: vec![false; n],
        stack: Vec::new(),
        counter: 0,
        fail_on_cycle,
    };
    for v in 0..n {
        if walk.index[v].is_none() {
            walk.visit(v, sets)?;
        }
    }
    Ok(())
}

/// Reject cyclic grammars: `A =>+ A` by unit derivations through fully
/// nullable contexts. Such grammars can never be LALR(1) and would
/// otherwise surface only as an opaque pile of conflicts.
fn check_cyclic(g: &Grammar, nullable: &[bool]) -> Result<()> {
    let n = g.nonterms.end;
    let mut rels: Vec<Vec<usize>> = vec![Vec::new(); n];
    for p in &g.prods {
        for (i, &b) in p.rhs.iter().enumerate() {
            if !g.is_nonterm(b) {
                continue;
            }
            let rest_nullable = p
                .rhs
                .iter()
                .enumerate()
                .all(|(j, &s)| j == i || (g.is_nonterm(s) && nullable[s]));
            if !rest_nullable {
                continue;
            }
            for &a in &p.lhs {
                if a == b {
                    log::debug!("nonterminal {} derives itself", a);
                    return Err(Error::NotLrGrammar);
                }
                rels[a].push(b);
            }
        }
    }
    let mut dummy: Vec<BitSet> = (0..n)
        .map(|_| BitSet::new(0))
        .collect::<Result<_>>()?;
    close_relation(&rels, &mut dummy, true)
}

/// States reachable backwards from `q` along `rhs` (right to left).
fn lookback_roots(aut: &Automaton, q: usize, rhs: &[usize]) -> Vec<usize> {
    let mut cur = vec![q];
    for &sym in rhs.iter().rev() {
        let mut prev = Vec::new();
        for &s in &cur {
            for &ti in &aut.states[s].inbound {
                let t = &aut.transitions[ti];
                if t.sym == sym {
                    prev.push(t.from);
                }
            }
        }
        prev.sort_unstable();
        prev.dedup();
        cur = prev;
    }
    cur
}

/// Compute reduce lookaheads; on return every nonterminal transition's
/// `read` set holds its closed Follow set.
pub fn analyze(g: &Grammar, aut: &mut Automaton) -> Result<Lookaheads> {
    let nullable = nullable_set(g);
    check_cyclic(g, &nullable)?;

    let term_base = g.terms.start;

    // Direct reads: terminals shiftable from a nonterminal transition's
    // target state.
    for ti in 0..aut.transitions.len() {
        if !g.is_nonterm(aut.transitions[ti].sym) {
            continue;
        }
        let target = aut.transitions[ti].to;
        let mut read = std::mem::replace(
            &mut aut.transitions[ti].read,
            BitSet::new(0)?,
        );
        for &to in &aut.states[target].out {
            let sym = aut.transitions[to].sym;
            if g.is_term(sym) {
                read.set(sym - term_base);
            }
        }
        aut.transitions[ti].read = read;
    }
    // End of input is read after the start symbol's goto; seed it there
    // so it propagates to every Follow set through includes.
    let start_sym = g.prods[0].rhs[0];
    if let Some(ti) = aut.transition(aut.initial, start_sym) {
        aut.transitions[ti].read.set(g.eoi - term_base);
    }

    // Reads relation: through nullable nonterminal transitions out of the
    // target state.
    for ti in 0..aut.transitions.len() {
        aut.transitions[ti].rels.clear();
        if !g.is_nonterm(aut.transitions[ti].sym) {
            continue;
        }
        let target = aut.transitions[ti].to;
        for i in 0..aut.states[target].out.len() {
            let to = aut.states[target].out[i];
            let sym = aut.transitions[to].sym;
            if g.is_nonterm(sym) && nullable[sym] {
                aut.transitions[ti].rels.push(to);
            }
        }
    }
    close_transition_sets(aut, true)?;

    // Includes relation: for each nonterminal transition (p, B) and each
    // production reducible to B, walk the body from p; wherever the rest
    // of the body is all nullable and the walked symbol is a nonterminal,
    // that inner transition includes (p, B).
    let mut incl: Vec<Vec<usize>> = vec![Vec::new(); aut.transitions.len()];
    for ti in 0..aut.transitions.len() {
        let b = aut.transitions[ti].sym;
        if !g.is_nonterm(b) {
            continue;
        }
        let p = aut.transitions[ti].from;
        for pi in g.prods_of(b) {
            let rhs = &g.prods[pi].rhs;
            let mut q = p;
            for (i, &sym) in rhs.iter().enumerate() {
                let Some(step) = aut.transition(q, sym) else {
                    // The walk always exists for closure items; a missing
                    // edge means the production is unreachable from here.
                    break;
                };
                let suffix_nullable = rhs[i + 1..]
                    .iter()
                    .all(|&s| g.is_nonterm(s) && nullable[s]);
                if g.is_nonterm(sym) && suffix_nullable {
                    incl[step].push(ti);
                }
                q = aut.transitions[step].to;
            }
        }
    }
    for (ti, rels) in incl.into_iter().enumerate() {
        aut.transitions[ti].rels = rels;
    }
    close_transition_sets(aut, false)?;

    // Lookback: union Follow of every root transition on every possible
    // reduction nonterminal.
    let nterms = g.terms.len();
    let mut reduces = Vec::with_capacity(aut.states.len());
    for q in 0..aut.states.len() {
        let mut entries = Vec::new();
        for item in lr0::reduce_items(g, aut, q) {
            let mut la = BitSet::new(nterms)?;
            if item.prod == 0 {
                // The synthetic wrapper reduces (accepts) on end of input.
                la.set(g.eoi - term_base);
            } else {
                for p in lookback_roots(aut, q, &g.prods[item.prod].rhs) {
                    for &lhs in &g.prods[item.prod].lhs {
                        if let Some(ti) = aut.transition(p, lhs) {
                            la.union_with(&aut.transitions[ti].read);
                        }
                    }
                }
            }
            log::trace!(
                "state {}: reduce {} on {:?}",
                q,
                item.prod,
                la.ones().map(|t| t + term_base).collect::<Vec<_>>()
            );
            entries.push((item.prod, la));
        }
        reduces.push(entries);
    }
    Ok(Lookaheads { reduces })
}

/// Run [`close_relation`] over the transitions' own `rels`/`read` pairs.
fn close_transition_sets(aut: &mut Automaton, fail_on_cycle: bool) -> Result<()> {
    let rels: Vec<Vec<usize>> = aut.transitions.iter().map(|t| t.rels.clone()).collect();
    let mut sets: Vec<BitSet> = aut
        .transitions
        .iter()
        .map(|t| t.read.clone())
        .collect();
    close_relation(&rels, &mut sets, fail_on_cycle)?;
    for (t, s) in aut.transitions.iter_mut().zip(sets) {
        t.read = s;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::Production;
    use crate::lr0::Item;

    fn init_logger() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    // S'=0 S=1 E=2 T=3 | id=4 plus=5 eoi=6
    fn expr_grammar() -> Grammar {
        Grammar::new(
            vec![
                Production::new(0, vec![1]),
                Production::new(1, vec![2]),
                Production::new(2, vec![2, 5, 3]),
                Production::new(2, vec![3]),
                Production::new(3, vec![4]),
            ],
            0..4,
            4..7,
            6,
        )
        .unwrap()
    }

    fn la_of(
        g: &Grammar,
        aut: &Automaton,
        las: &Lookaheads,
        kernel: Item,
        prod: usize,
    ) -> Vec<usize> {
        let state = aut
            .states
            .iter()
            .position(|s| s.items.contains(&kernel))
            .unwrap();
        let (_, set) = las.reduces[state]
            .iter()
            .find(|(p, _)| *p == prod)
            .unwrap();
        set.ones().map(|t| t + g.terms.start).collect()
    }

    #[test]
    fn expr_grammar_lookaheads() {
        init_logger();
        let g = expr_grammar();
        let mut aut = lr0::build(&g).unwrap();
        let las = analyze(&g, &mut aut).unwrap();

        // T -> id . reduces on `+` and end of input.
        assert_eq!(
            la_of(&g, &aut, &las, Item { prod: 4, dot: 1 }, 4),
            vec![5, 6]
        );
        // E -> T . likewise.
        assert_eq!(
            la_of(&g, &aut, &las, Item { prod: 3, dot: 1 }, 3),
            vec![5, 6]
        );
        // E -> E + T . likewise.
        assert_eq!(
            la_of(&g, &aut, &las, Item { prod: 2, dot: 3 }, 2),
            vec![5, 6]
        );
        // S -> E . reduces only at end of input.
        assert_eq!(
            la_of(&g, &aut, &las, Item { prod: 1, dot: 1 }, 1),
            vec![6]
        );
    }

    #[test]
    fn nullable_fixed_point() {
        // S' -> S; S -> A b; A -> (empty) | a
        let g = Grammar::new(
            vec![
                Production::new(0, vec![1]),
                Production::new(1, vec![2, 4]),
                Production::new(2, vec![]),
                Production::new(2, vec![3]),
            ],
            0..3,
            3..6,
            5,
        )
        .unwrap();
        let nullable = nullable_set(&g);
        assert!(!nullable[0] && !nullable[1] && nullable[2]);
    }

    #[test]
    fn nullable_cycle_is_not_lr() {
        init_logger();
        // S'=0 A=1 B=2 | eoi=3; A -> B; B -> A.
        let g = Grammar::new(
            vec![
                Production::new(0, vec![1]),
                Production::new(1, vec![2]),
                Production::new(2, vec![1]),
            ],
            0..3,
            3..4,
            3,
        )
        .unwrap();
        // The fixed point terminates on the cycle...
        let nullable = nullable_set(&g);
        assert!(!nullable[1] && !nullable[2]);
        // ...and the relation pass rejects the grammar.
        let mut aut = lr0::build(&g).unwrap();
        assert_eq!(analyze(&g, &mut aut).unwrap_err(), Error::NotLrGrammar);
    }

    #[test]
    fn empty_production_lookahead() {
        // S' -> S; S -> A b; A -> (empty): A reduces with lookahead {b}.
        let g = Grammar::new(
            vec![
                Production::new(0, vec![1]),
                Production::new(1, vec![2, 3]),
                Production::new(2, vec![]),
            ],
            0..3,
            3..5,
            4,
        )
        .unwrap();
        let mut aut = lr0::build(&g).unwrap();
        let las = analyze(&g, &mut aut).unwrap();
        let entry = las.reduces[aut.initial]
            .iter()
            .find(|(p, _)| *p == 2)
            .unwrap();
        let la: Vec<usize> = entry.1.ones().map(|t| t + g.terms.start).collect();
        assert_eq!(la, vec![3]);
    }

    #[test]
    fn multi_lhs_lookaheads_union() {
        // S' -> S; S -> A a | B b; {A,B} -> c.
        // Reducing `c` may produce either A or B, so its lookahead is
        // the union {a, b}.
        // S'=0 S=1 A=2 B=3 | a=4 b=5 c=6 eoi=7
        let g = Grammar::new(
            vec![
                Production::new(0, vec![1]),
                Production::new(1, vec![2, 4]),
                Production::new(1, vec![3, 5]),
                Production::multi(vec![2, 3], vec![6]),
            ],
            0..4,
            4..8,
            7,
        )
        .unwrap();
        let mut aut = lr0::build(&g).unwrap();
        let las = analyze(&g, &mut aut).unwrap();
        let state = aut
            .states
            .iter()
            .position(|s| s.items.contains(&Item { prod: 3, dot: 1 }))
            .unwrap();
        let (_, set) = las.reduces[state].iter().find(|(p, _)| *p == 3).unwrap();
        let la: Vec<usize> = set.ones().map(|t| t + g.terms.start).collect();
        assert_eq!(la, vec![4, 5]);
    }
}
