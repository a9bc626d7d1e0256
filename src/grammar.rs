//! Grammar inputs: productions over integer-encoded symbols.
//!
//! Symbols are plain ordinals. Nonterminals and terminals live in two
//! caller-chosen, disjoint ranges; the end-of-input marker is one of the
//! terminals. Production 0 is always the synthetic `S' -> S` wrapper.
//!
//! Productions may name *several* reduction nonterminals; which one a
//! reduce step actually produces is chosen by the consuming runtime at
//! reduction time. Everything downstream (closure, lookaheads, goto
//! columns) treats such a production as reducible to each of its left-hand
//! symbols.

use std::ops::Range;

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Production {
    /// One or more reduction nonterminals.
    pub lhs: Vec<usize>,
    /// Body symbol sequence; may be empty.
    pub rhs: Vec<usize>,
}

impl Production {
    pub fn new(lhs: usize, rhs: Vec<usize>) -> Self {
        Self {
            lhs: vec![lhs],
            rhs,
        }
    }

    pub fn multi(lhs: Vec<usize>, rhs: Vec<usize>) -> Self {
        Self { lhs, rhs }
    }
}

#[derive(Debug, Clone)]
pub struct Grammar {
    pub prods: Vec<Production>,
    pub nonterms: Range<usize>,
    pub terms: Range<usize>,
    /// End-of-input terminal ordinal.
    pub eoi: usize,
}

impl Grammar {
    pub fn new(
        prods: Vec<Production>,
        nonterms: Range<usize>,
        terms: Range<usize>,
        eoi: usize,
    ) -> Result<Self> {
        let g = Self {
            prods,
            nonterms,
            terms,
            eoi,
        };
        g.validate()?;
        Ok(g)
    }

    #[inline]
    pub fn is_nonterm(&self, sym: usize) -> bool {
        self.nonterms.contains(&sym)
    }

    #[inline]
    pub fn is_term(&self, sym: usize) -> bool {
        self.terms.contains(&sym)
    }

    /// Smallest ordinal of either range.
    pub fn min_symbol(&self) -> usize {
        self.nonterms.start.min(self.terms.start)
    }

    /// One past the largest ordinal of either range.
    pub fn max_symbol(&self) -> usize {
        self.nonterms.end.max(self.terms.end)
    }

    /// Indices of productions reducible to `nt`.
    pub fn prods_of(&self, nt: usize) -> impl Iterator<Item = usize> + '_ {
        self.prods
            .iter()
            .enumerate()
            .filter(move |(_, p)| p.lhs.contains(&nt))
            .map(|(i, _)| i)
    }

    fn validate(&self) -> Result<()> {
        if self.nonterms.start < self.terms.end && self.terms.start < self.nonterms.end {
            return Err(Error::SymbolRangeOverlap);
        }
        if !self.terms.contains(&self.eoi) {
            return Err(Error::InvalidGrammar(
                "end-of-input marker outside the terminal range",
            ));
        }
        // Production 0 must be the synthetic wrapper: one nonterminal body.
        match self.prods.first() {
            Some(p)
                if p.lhs.len() == 1
                    && p.rhs.len() == 1
                    && self.is_nonterm(p.rhs[0])
                    && self.is_nonterm(p.lhs[0]) => {}
            _ => {
                return Err(Error::InvalidGrammar(
                    "production 0 is not a single-nonterminal wrapper",
                ));
            }
        }
        for p in &self.prods {
            for &s in p.lhs.iter() {
                if !self.is_nonterm(s) {
                    return Err(Error::InvalidGrammar(
                        "reduction symbol is not a nonterminal",
                    ));
                }
            }
            for &s in p.rhs.iter() {
                if !self.is_nonterm(s) && !self.is_term(s) {
                    return Err(Error::InvalidGrammar("body symbol out of range"));
                }
            }
        }
        Ok(())
    }
}
