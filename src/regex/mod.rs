//! Regex compilation: one pattern string to one NFA fragment.
//!
//! The pattern is tokenized by [`lexer`], parsed by the self-hosted LALR
//! table in [`bootstrap`], and lowered to a Thompson NFA fragment. A failed
//! compile leaves the destination graph untouched.

pub mod bootstrap;
pub mod lexer;

use crate::error::Result;
use crate::nfa::{Frag, NfaGraph};

/// Compile `pattern` into an NFA fragment inside `g`.
pub fn compile(g: &mut NfaGraph, pattern: &str) -> Result<Frag> {
    let toks = lexer::tokenize(pattern)?;
    // Build into a scratch graph so a mid-parse failure has no side
    // effects on `g`.
    let mut scratch = NfaGraph::new();
    let frag = bootstrap::parse(&mut scratch, toks)?;
    let shift = if g.is_empty() { 0 } else { g.len() };
    let exit = g.merge(&scratch, frag);
    Ok(Frag {
        entry: frag.entry + shift,
        exit,
    })
}
