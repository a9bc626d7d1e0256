//! Released under the terms of the GNU Lesser General Public License,
//! version 3.0 or (at your option) any later version (LGPL-3.0-or-later).
//!
//! Scanner and parser table generation core.
//!
//! `lexlr` turns a grammar-plus-regex language description into the two
//! automata a generated translator runs on:
//!  * **scanner** — compiles an ordered set of regular-expression rules
//!    through NFA construction and subset construction into a flat
//!    byte-transition scan table with per-state actions;
//!  * **table** — builds the canonical LR(0) automaton, computes exact
//!    LALR(1) reduce lookaheads (DeRemer–Pennello relations closed with
//!    Tarjan SCC), resolves conflicts against user directives, and emits
//!    a flat shift/reduce parse table.
//!
//! Productions may declare several reduction nonterminals; the choice is
//! made by the consuming runtime at reduce time, and the generator
//! accounts for every candidate in closures, lookaheads and gotos.
//!
//! Both tables are plain data. Tokenizing the language description,
//! driving the generated automata, and emitting target code are the
//! caller's concern.

pub mod bitset;
pub mod dfa;
pub mod error;
pub mod grammar;
pub mod lookahead;
pub mod lr0;
pub mod nfa;
pub mod regex;
pub mod scanner;
pub mod table;

pub use error::{ConflictItem, ConflictPair, Error, Result};
pub use grammar::{Grammar, Production};
pub use scanner::{Rule, ScanAction, ScanTable};
pub use table::{ParseTable, Resolution};
