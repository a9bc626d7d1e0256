//! Error types shared by every generation phase.
//!
//! Table generation is a single batch pass: the first failure aborts the
//! whole run and is propagated by value through every calling frame. No
//! partial tables are ever returned.

use thiserror::Error;

/// A `(production, dot)` item as it appears in conflict diagnostics and
/// resolution directives.
///
/// For a reduce action the dot equals the production body length; for a
/// shift action it marks the body position of the symbol about to be
/// shifted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ConflictItem {
    pub prod: usize,
    pub dot: usize,
}

impl ConflictItem {
    pub const fn new(prod: usize, dot: usize) -> Self {
        Self { prod, dot }
    }
}

/// An unresolved pair of competing actions in one `state × symbol` cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConflictPair {
    pub state: usize,
    pub symbol: usize,
    pub a: ConflictItem,
    pub b: ConflictItem,
}

/// Everything that can go wrong while generating tables.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// Size arithmetic overflowed before an allocation.
    #[error("table size arithmetic overflow")]
    SizeOverflow,

    /// Malformed regular expression structure.
    #[error("regex syntax error: {0}")]
    RegexSyntax(String),

    /// Malformed escape, unterminated class, or illegal byte in a pattern.
    #[error("regex lexical error: {0}")]
    RegexLexical(String),

    /// Terminal and nonterminal ordinal ranges intersect.
    #[error("terminal/nonterminal symbol range overlap")]
    SymbolRangeOverlap,

    /// Structurally malformed grammar input (bad wrapper production,
    /// out-of-range ordinal, misplaced end-of-input marker).
    #[error("invalid grammar: {0}")]
    InvalidGrammar(&'static str),

    /// Cycle in the reads relation: the grammar is not LALR(1).
    #[error("not an LR grammar")]
    NotLrGrammar,

    /// Conflicts left after applying all resolution directives.
    #[error("{} unresolved parse table conflict(s)", .0.len())]
    Conflicts(Vec<ConflictPair>),

    /// Two directives disagree about the same cell.
    #[error("conflicting resolution directives for state {state}, symbol {symbol}")]
    ConflictingResolutions { state: usize, symbol: usize },
}

pub type Result<T> = std::result::Result<T, Error>;

/// Overflow-checked product for table sizing.
#[inline]
pub(crate) fn checked_area(rows: usize, cols: usize) -> Result<usize> {
    rows.checked_mul(cols).ok_or(Error::SizeOverflow)
}
