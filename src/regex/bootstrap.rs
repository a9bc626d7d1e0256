//! Self-hosted parser for the regex description language.
//!
//! The pattern grammar is itself an LALR(1) grammar; its parse table is
//! generated by this crate's own pipeline on first use and then treated as
//! an immutable constant. A small shift/reduce loop drives Thompson
//! construction as the semantic action of each production.

use once_cell::sync::Lazy;

use super::lexer::Tok;
use crate::bitset::BitSet;
use crate::error::{Error, Result};
use crate::grammar::{Grammar, Production};
use crate::nfa::{Frag, NfaGraph};
use crate::table::{self, ParseTable};

// Symbol ordinals of the bootstrap grammar.
const START: usize = 0;
const ALT: usize = 1;
const CAT: usize = 2;
const FAC: usize = 3;
const T_CHAR: usize = 4;
const T_DOT: usize = 5;
const T_CLASS: usize = 6;
const T_LPAREN: usize = 7;
const T_RPAREN: usize = 8;
const T_PIPE: usize = 9;
const T_STAR: usize = 10;
const T_PLUS: usize = 11;
const T_QUEST: usize = 12;
const T_EOI: usize = 13;

fn pattern_grammar() -> Grammar {
    let prods = vec![
        Production::new(START, vec![ALT]),            // 0
        Production::new(ALT, vec![ALT, T_PIPE, CAT]), // 1
        Production::new(ALT, vec![CAT]),              // 2
        Production::new(CAT, vec![CAT, FAC]),         // 3
        Production::new(CAT, vec![FAC]),              // 4
        Production::new(FAC, vec![FAC, T_STAR]),      // 5
        Production::new(FAC, vec![FAC, T_PLUS]),      // 6
        Production::new(FAC, vec![FAC, T_QUEST]),     // 7
        Production::new(FAC, vec![T_CHAR]),           // 8
        Production::new(FAC, vec![T_DOT]),            // 9
        Production::new(FAC, vec![T_CLASS]),          // 10
        Production::new(FAC, vec![T_LPAREN, ALT, T_RPAREN]), // 11
    ];
    Grammar::new(prods, 0..4, 4..14, T_EOI).expect("pattern grammar symbol ranges")
}

static TABLE: Lazy<ParseTable> = Lazy::new(|| {
    table::build(&pattern_grammar(), &[]).expect("pattern grammar is LALR(1)")
});

/// Semantic value on the parse stack.
enum Val {
    None,
    Bytes(Vec<u8>),
    Class(BitSet),
    Frag(Frag),
}

impl Val {
    fn frag(self) -> Frag {
        match self {
            Val::Frag(f) => f,
            _ => unreachable!("non-fragment value where fragment expected"),
        }
    }
}

fn bytes_frag(g: &mut NfaGraph, bytes: &[u8]) -> Frag {
    let entry = g.add_node();
    let mut cur = entry;
    for &b in bytes {
        let next = g.add_node();
        g.add_edge(cur, b, next);
        cur = next;
    }
    Frag { entry, exit: cur }
}

fn class_frag(g: &mut NfaGraph, set: &BitSet) -> Frag {
    let entry = g.add_node();
    let exit = g.add_node();
    for b in set.ones() {
        g.add_edge(entry, b as u8, exit);
    }
    Frag { entry, exit }
}

fn dot_frag(g: &mut NfaGraph) -> Result<Frag> {
    let mut set = BitSet::new(256)?;
    for b in 0..256 {
        if b != b'\n' as usize {
            set.set(b);
        }
    }
    Ok(class_frag(g, &set))
}

fn concat_frag(g: &mut NfaGraph, a: Frag, b: Frag) -> Frag {
    g.add_epsilon(a.exit, b.entry);
    Frag {
        entry: a.entry,
        exit: b.exit,
    }
}

fn alt_frag(g: &mut NfaGraph, a: Frag, b: Frag) -> Frag {
    let entry = g.add_node();
    let exit = g.add_node();
    g.add_epsilon(entry, a.entry);
    g.add_epsilon(entry, b.entry);
    g.add_epsilon(a.exit, exit);
    g.add_epsilon(b.exit, exit);
    Frag { entry, exit }
}

/// `E*`: bypass epsilon around `E` plus a backward epsilon.
fn star_frag(g: &mut NfaGraph, f: Frag) -> Frag {
    let entry = g.add_node();
    let exit = g.add_node();
    g.add_epsilon(entry, f.entry);
    g.add_epsilon(entry, exit);
    g.add_epsilon(f.exit, f.entry);
    g.add_epsilon(f.exit, exit);
    Frag { entry, exit }
}

fn plus_frag(g: &mut NfaGraph, f: Frag) -> Frag {
    let entry = g.add_node();
    let exit = g.add_node();
    g.add_epsilon(entry, f.entry);
    g.add_epsilon(f.exit, f.entry);
    g.add_epsilon(f.exit, exit);
    Frag { entry, exit }
}

fn quest_frag(g: &mut NfaGraph, f: Frag) -> Frag {
    let entry = g.add_node();
    let exit = g.add_node();
    g.add_epsilon(entry, f.entry);
    g.add_epsilon(entry, exit);
    g.add_epsilon(f.exit, exit);
    Frag { entry, exit }
}

fn terminal_of(tok: &Tok) -> usize {
    match tok {
        Tok::Char(_) => T_CHAR,
        Tok::Dot => T_DOT,
        Tok::Class(_) => T_CLASS,
        Tok::LParen => T_LPAREN,
        Tok::RParen => T_RPAREN,
        Tok::Pipe => T_PIPE,
        Tok::Star => T_STAR,
        Tok::Plus => T_PLUS,
        Tok::Quest => T_QUEST,
    }
}

fn value_of(tok: Tok) -> Val {
    match tok {
        Tok::Char(bytes) => Val::Bytes(bytes),
        Tok::Class(set) => Val::Class(set),
        _ => Val::None,
    }
}

fn reduce(g: &mut NfaGraph, prod: usize, vals: Vec<Val>) -> Result<Val> {
    let mut vals = vals.into_iter();
    let frag = match prod {
        1 => {
            let a = vals.next().unwrap().frag();
            let b = vals.nth(1).unwrap().frag();
            alt_frag(g, a, b)
        }
        2 | 4 => vals.next().unwrap().frag(),
        3 => {
            let a = vals.next().unwrap().frag();
            let b = vals.next().unwrap().frag();
            concat_frag(g, a, b)
        }
        5 => star_frag(g, vals.next().unwrap().frag()),
        6 => plus_frag(g, vals.next().unwrap().frag()),
        7 => quest_frag(g, vals.next().unwrap().frag()),
        8 => match vals.next().unwrap() {
            Val::Bytes(bytes) => bytes_frag(g, &bytes),
            _ => unreachable!(),
        },
        9 => dot_frag(g)?,
        10 => match vals.next().unwrap() {
            Val::Class(set) => class_frag(g, &set),
            _ => unreachable!(),
        },
        11 => vals.nth(1).unwrap().frag(),
        _ => unreachable!("unknown production {prod}"),
    };
    Ok(Val::Frag(frag))
}

/// Parse a token stream into an NFA fragment inside `g`.
///
/// On error, nodes already added to `g` by partial reductions are the
/// caller's problem; [`super::compile`] therefore builds into a scratch
/// graph and merges only on success.
pub(super) fn parse(g: &mut NfaGraph, toks: Vec<Tok>) -> Result<Frag> {
    if toks.is_empty() {
        return Err(Error::RegexSyntax("empty pattern".into()));
    }
    let tab = &*TABLE;
    let grammar = pattern_grammar();

    let mut input = toks
        .into_iter()
        .map(|t| (terminal_of(&t), value_of(t)))
        .chain(std::iter::once((T_EOI, Val::None)));

    let mut states: Vec<usize> = vec![0];
    let mut vals: Vec<Val> = Vec::new();
    let (mut sym, mut val) = input.next().unwrap();

    loop {
        let state = *states.last().unwrap();
        let act = tab.action(state, sym);
        if act > 0 {
            log::trace!("regex parse: shift {} on sym {}", act, sym);
            states.push(act as usize);
            vals.push(std::mem::replace(&mut val, Val::None));
            (sym, val) = input
                .next()
                .ok_or_else(|| Error::RegexSyntax("unexpected end of pattern".into()))?;
        } else if act < 0 {
            let prod = (-act - 1) as usize;
            if prod == 0 {
                // S' -> Alt on end of input: the whole pattern.
                debug_assert_eq!(vals.len(), 1);
                return Ok(vals.pop().unwrap().frag());
            }
            let n = grammar.prods[prod].rhs.len();
            log::trace!("regex parse: reduce prod {} (len {})", prod, n);
            let popped = vals.split_off(vals.len() - n);
            states.truncate(states.len() - n);
            let value = reduce(g, prod, popped)?;
            let lhs = grammar.prods[prod].lhs[0];
            let goto = tab.action(*states.last().unwrap(), lhs);
            debug_assert!(goto > 0, "missing goto after reduce");
            states.push(goto as usize);
            vals.push(value);
        } else {
            return Err(Error::RegexSyntax(if sym == T_EOI {
                "unexpected end of pattern".into()
            } else {
                "unexpected token in pattern".into()
            }));
        }
    }
}
