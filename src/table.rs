//! Parse table assembly and conflict resolution.
//!
//! The table is a flat `[state][symbol]` matrix of `i32` cells covering
//! both terminal and nonterminal columns: a positive cell is a shift (or
//! goto) target, a negative cell `-(p + 1)` reduces production `p`, and
//! zero is the error action. Reducing production 0 accepts.
//!
//! Shift and reduce actions first land in per-cell chains; a chain longer
//! than one is a conflict and must be resolved away by user directives
//! before the flat table is emitted.

use std::io::{self, Write};

use crate::error::{checked_area, ConflictItem, ConflictPair, Error, Result};
use crate::grammar::Grammar;
use crate::lookahead::{self, Lookaheads};
use crate::lr0::{self, Automaton};

/// One user directive: of the two competing items, keep `prefer`'s
/// action. The pair is matched against a conflict without regard to
/// order, and each directive is consumed by at most one conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub prefer: ConflictItem,
    pub over: ConflictItem,
}

impl Resolution {
    pub const fn new(prefer: ConflictItem, over: ConflictItem) -> Self {
        Self { prefer, over }
    }

    fn matches(&self, a: ConflictItem, b: ConflictItem) -> bool {
        (self.prefer == a && self.over == b) || (self.prefer == b && self.over == a)
    }
}

/// A pending action plus the item that produced it, kept for conflict
/// diagnostics and directive matching.
#[derive(Debug, Clone, Copy)]
struct ActionEntry {
    /// Encoded cell value: positive shift target or `-(prod + 1)`.
    code: i32,
    item: ConflictItem,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseTable {
    /// Row-major `[state][symbol - min_symbol]` action matrix.
    pub cells: Vec<i32>,
    pub num_states: usize,
    pub min_symbol: usize,
    pub num_columns: usize,
    /// Body length per production, for the reduce pop count.
    pub prod_lengths: Vec<usize>,
    /// Candidate reduction nonterminals per production; the consumer
    /// picks one at reduce time (they all lead to a valid goto only for
    /// the paths that can actually reach the reducing state).
    pub prod_lhs: Vec<Vec<usize>>,
}

impl ParseTable {
    /// Action for `state` on `sym`; symbols outside the table's column
    /// range are the error action.
    #[inline]
    pub fn action(&self, state: usize, sym: usize) -> i32 {
        if sym < self.min_symbol || sym - self.min_symbol >= self.num_columns {
            return 0;
        }
        self.cells[state * self.num_columns + (sym - self.min_symbol)]
    }
}

/// The lowest item of `state` whose dot sits before `sym`. Every shift
/// has at least one such item, in the kernel or in the dot-0 closure.
fn shift_item(g: &Grammar, aut: &Automaton, state: usize, sym: usize) -> ConflictItem {
    let st = &aut.states[state];
    let mut best: Option<ConflictItem> = None;
    let mut consider = |item: ConflictItem| {
        if best.is_none_or(|b| item < b) {
            best = Some(item);
        }
    };
    for item in &st.items {
        let rhs = &g.prods[item.prod].rhs;
        if item.dot < rhs.len() && rhs[item.dot] == sym {
            consider(ConflictItem::new(item.prod, item.dot));
        }
    }
    for &nt in &st.closure_nts {
        for p in g.prods_of(nt) {
            if g.prods[p].rhs.first() == Some(&sym) {
                consider(ConflictItem::new(p, 0));
            }
        }
    }
    best.expect("shift transition without a matching item")
}

/// Resolve one cell's chain to a single action.
///
/// All pairs of competing entries must be matched by directives, and all
/// matched directives must agree on one surviving entry.
fn resolve_cell(
    state: usize,
    symbol: usize,
    entries: &[ActionEntry],
    directives: &[Resolution],
    used: &mut [bool],
    unresolved: &mut Vec<ConflictPair>,
) -> Result<i32> {
    debug_assert!(!entries.is_empty());
    if entries.len() == 1 {
        return Ok(entries[0].code);
    }

    let mut winners: Vec<i32> = Vec::new();
    let before = unresolved.len();
    for i in 0..entries.len() {
        for j in i + 1..entries.len() {
            let (a, b) = (entries[i].item, entries[j].item);
            let hit = directives
                .iter()
                .enumerate()
                .find(|(di, d)| !used[*di] && d.matches(a, b));
            match hit {
                Some((di, d)) => {
                    used[di] = true;
                    let keep = if d.prefer == a { entries[i] } else { entries[j] };
                    if !winners.contains(&keep.code) {
                        winners.push(keep.code);
                    }
                }
                None => unresolved.push(ConflictPair { state, symbol, a, b }),
            }
        }
    }
    if unresolved.len() > before {
        // Reported collectively by the caller once every cell is seen.
        return Ok(0);
    }
    if winners.len() != 1 {
        return Err(Error::ConflictingResolutions { state, symbol });
    }
    Ok(winners[0])
}

/// Run the whole pipeline: LR(0) states, reduce lookaheads, action
/// merge, conflict resolution.
pub fn build(g: &Grammar, directives: &[Resolution]) -> Result<ParseTable> {
    let mut aut = lr0::build(g)?;
    let las = lookahead::analyze(g, &mut aut)?;
    assemble(g, &aut, &las, directives)
}

fn assemble(
    g: &Grammar,
    aut: &Automaton,
    las: &Lookaheads,
    directives: &[Resolution],
) -> Result<ParseTable> {
    let min_symbol = g.min_symbol();
    let num_columns = g.max_symbol() - min_symbol;
    let num_states = aut.states.len();
    let area = checked_area(num_states, num_columns)?;
    i32::try_from(num_states).map_err(|_| Error::SizeOverflow)?;
    i32::try_from(g.prods.len()).map_err(|_| Error::SizeOverflow)?;

    let mut chains: Vec<Vec<ActionEntry>> = vec![Vec::new(); area];
    let cell = |state: usize, sym: usize| state * num_columns + (sym - min_symbol);

    for t in &aut.transitions {
        let code = t.to as i32;
        if g.is_nonterm(t.sym) {
            // Gotos are deterministic and can never join a conflict;
            // give them a synthetic item anyway to keep one entry shape.
            chains[cell(t.from, t.sym)].push(ActionEntry {
                code,
                item: ConflictItem::new(0, 0),
            });
        } else {
            chains[cell(t.from, t.sym)].push(ActionEntry {
                code,
                item: shift_item(g, aut, t.from, t.sym),
            });
        }
    }
    for (state, entries) in las.reduces.iter().enumerate() {
        for (prod, la) in entries {
            let code = -(*prod as i32) - 1;
            let item = ConflictItem::new(*prod, g.prods[*prod].rhs.len());
            for t in la.ones() {
                chains[cell(state, t + g.terms.start)].push(ActionEntry { code, item });
            }
        }
    }

    let mut cells = vec![0i32; area];
    let mut used = vec![false; directives.len()];
    let mut unresolved = Vec::new();
    for state in 0..num_states {
        for col in 0..num_columns {
            let idx = state * num_columns + col;
            if chains[idx].is_empty() {
                continue;
            }
            cells[idx] = resolve_cell(
                state,
                col + min_symbol,
                &chains[idx],
                directives,
                &mut used,
                &mut unresolved,
            )?;
        }
    }
    if !unresolved.is_empty() {
        return Err(Error::Conflicts(unresolved));
    }
    for (di, u) in used.iter().enumerate() {
        if !u {
            log::warn!(
                "unused resolution directive: prefer ({}, {}) over ({}, {})",
                directives[di].prefer.prod,
                directives[di].prefer.dot,
                directives[di].over.prod,
                directives[di].over.dot
            );
        }
    }

    log::debug!(
        "parse table: {} states x {} columns, {} productions",
        num_states,
        num_columns,
        g.prods.len()
    );
    Ok(ParseTable {
        cells,
        num_states,
        min_symbol,
        num_columns,
        prod_lengths: g.prods.iter().map(|p| p.rhs.len()).collect(),
        prod_lhs: g.prods.iter().map(|p| p.lhs.clone()).collect(),
    })
}

fn write_item<W: Write>(
    w: &mut W,
    g: &Grammar,
    names: &[String],
    item: ConflictItem,
) -> io::Result<()> {
    let p = &g.prods[item.prod];
    let lhs: Vec<&str> = p.lhs.iter().map(|&s| names[s].as_str()).collect();
    write!(w, "  {} ->", lhs.join("|"))?;
    for (i, &s) in p.rhs.iter().enumerate() {
        if i == item.dot {
            write!(w, " *")?;
        }
        write!(w, " {}", names[s])?;
    }
    if item.dot == p.rhs.len() {
        write!(w, " *")?;
    }
    let kind = if item.dot == p.rhs.len() { "reduce" } else { "shift" };
    writeln!(w, "  ({kind})")
}

/// Render unresolved conflicts the way they appear in generator output:
/// each competing production body with a `*` at the dot.
pub fn write_conflicts<W: Write>(
    w: &mut W,
    g: &Grammar,
    names: &[String],
    pairs: &[ConflictPair],
) -> io::Result<()> {
    for pair in pairs {
        writeln!(
            w,
            "conflict in state {} on {}:",
            pair.state, names[pair.symbol]
        )?;
        write_item(w, g, names, pair.a)?;
        write_item(w, g, names, pair.b)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::Production;

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

    // E=1 ambiguous over `+`: S'=0 E=1 | id=2 plus=3 eoi=4
    fn ambiguous_grammar() -> Grammar {
        Grammar::new(
            vec![
                Production::new(0, vec![1]),
                Production::new(1, vec![1, 3, 1]),
                Production::new(1, vec![2]),
            ],
            0..2,
            2..5,
            4,
        )
        .unwrap()
    }

    /// Drive the table over `input` terminals and record each step as
    /// `s<target>` for shifts and `r<prod>` for reduces.
    fn trace(tab: &ParseTable, input: &[usize]) -> Vec<String> {
        let mut steps = Vec::new();
        let mut stack = vec![0usize];
        let mut pos = 0;
        loop {
            let sym = input[pos];
            let act = tab.action(*stack.last().unwrap(), sym);
            assert_ne!(act, 0, "error action on {sym} with stack {stack:?}");
            if act > 0 {
                steps.push(format!("s{act}"));
                stack.push(act as usize);
                pos += 1;
            } else {
                let prod = (-act - 1) as usize;
                steps.push(format!("r{prod}"));
                if prod == 0 {
                    return steps;
                }
                stack.truncate(stack.len() - tab.prod_lengths[prod]);
                let goto = tab.action(*stack.last().unwrap(), tab.prod_lhs[prod][0]);
                assert!(goto > 0);
                stack.push(goto as usize);
            }
        }
    }

    #[test]
    fn expr_grammar_parse_trace() {
        init_logger();
        let g = expr_grammar();
        let tab = build(&g, &[]).unwrap();
        // id + id: shift id, T -> id, E -> T, shift +, shift id,
        // T -> id, E -> E + T, S -> E, accept.
        let steps = trace(&tab, &[4, 5, 4, 6]);
        let kinds: Vec<char> = steps.iter().map(|s| s.chars().next().unwrap()).collect();
        assert_eq!(kinds, vec!['s', 'r', 'r', 's', 's', 'r', 'r', 'r', 'r']);
        let reduces: Vec<&str> = steps
            .iter()
            .filter(|s| s.starts_with('r'))
            .map(String::as_str)
            .collect();
        assert_eq!(reduces, vec!["r4", "r3", "r4", "r2", "r1", "r0"]);
    }

    #[test]
    fn unresolved_conflict_names_items() {
        init_logger();
        let g = ambiguous_grammar();
        let err = build(&g, &[]).unwrap_err();
        let Error::Conflicts(pairs) = err else {
            panic!("expected Conflicts, got {err:?}");
        };
        assert_eq!(pairs.len(), 1);
        // Shift item E -> E . + E against reduce item E -> E + E .
        assert_eq!(pairs[0].symbol, 3);
        assert_eq!(pairs[0].a, ConflictItem::new(1, 1));
        assert_eq!(pairs[0].b, ConflictItem::new(1, 3));
    }

    #[test]
    fn directive_resolves_shift_reduce() {
        init_logger();
        let g = ambiguous_grammar();
        let shift = ConflictItem::new(1, 1);
        let reduce = ConflictItem::new(1, 3);

        // Shift targets depend on state numbering; keep only the
        // shift/reduce shape of each step.
        let shape = |steps: Vec<String>| -> Vec<String> {
            steps
                .into_iter()
                .map(|s| if s.starts_with('s') { "s".into() } else { s })
                .collect()
        };

        // Preferring the shift associates `id + id + id` to the right:
        // both additions reduce only at end of input.
        let tab = build(&g, &[Resolution::new(shift, reduce)]).unwrap();
        let steps = shape(trace(&tab, &[2, 3, 2, 3, 2, 4]));
        assert_eq!(
            steps,
            vec!["s", "r2", "s", "s", "r2", "s", "s", "r2", "r1", "r1", "r0"]
        );

        // Preferring the reduce associates left: the first addition
        // reduces before the second `+` is shifted. The directive pair
        // matches in either order.
        let tab = build(&g, &[Resolution::new(reduce, shift)]).unwrap();
        let steps = shape(trace(&tab, &[2, 3, 2, 3, 2, 4]));
        assert_eq!(
            steps,
            vec!["s", "r2", "s", "s", "r2", "r1", "s", "s", "r2", "r1", "r0"]
        );
    }

    #[test]
    fn reduce_reduce_conflict_reported() {
        // S -> A | B; A -> id; B -> id. Reducing id is ambiguous at
        // end of input.
        // S'=0 S=1 A=2 B=3 | id=4 eoi=5
        let g = Grammar::new(
            vec![
                Production::new(0, vec![1]),
                Production::new(1, vec![2]),
                Production::new(1, vec![3]),
                Production::new(2, vec![4]),
                Production::new(3, vec![4]),
            ],
            0..4,
            4..6,
            5,
        )
        .unwrap();
        let Error::Conflicts(pairs) = build(&g, &[]).unwrap_err() else {
            panic!("expected Conflicts");
        };
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].symbol, 5);
        assert_eq!(pairs[0].a, ConflictItem::new(3, 1));
        assert_eq!(pairs[0].b, ConflictItem::new(4, 1));
    }

    #[test]
    fn unused_directive_is_harmless() {
        init_logger();
        let g = expr_grammar();
        let stray = Resolution::new(ConflictItem::new(2, 1), ConflictItem::new(4, 1));
        assert!(build(&g, &[stray]).is_ok());
    }

    #[test]
    fn regeneration_is_identical() {
        let g = expr_grammar();
        let a = build(&g, &[]).unwrap();
        let b = build(&g, &[]).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn out_of_range_symbol_is_error_action() {
        let g = expr_grammar();
        let tab = build(&g, &[]).unwrap();
        assert_eq!(tab.action(0, 99), 0);
    }

    #[test]
    fn conflict_rendering() {
        let g = ambiguous_grammar();
        let Error::Conflicts(pairs) = build(&g, &[]).unwrap_err() else {
            panic!("expected Conflicts");
        };
        let names: Vec<String> = ["S'", "E", "id", "+", "$"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let mut out = Vec::new();
        write_conflicts(&mut out, &g, &names, &pairs).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("state"));
        assert!(text.contains("E -> E * + E  (shift)"));
        assert!(text.contains("E -> E + E *  (reduce)"));
    }
}
