//! Scanner compilation: ordered regex rules to a flat scan table.
//!
//! Every rule's pattern compiles to its own NFA fragment; all fragments
//! share one cumulative automaton reached by epsilon from a common start.
//! After subset construction each DFA state is assigned the action of the
//! first-declared rule whose exit node it contains, and the states are
//! flattened into a `(states + 1) * 256` transition table with row 0
//! reserved as the dead state.
//!
//! Maximal munch is the consuming runtime's job: it keeps stepping the
//! table and remembers the last non-default action it saw, then reports
//! that longest accepted prefix when it hits the dead state.

use indexmap::IndexMap;

use crate::dfa;
use crate::error::{checked_area, Error, Result};
use crate::nfa::NfaGraph;
use crate::regex;

/// One scanner rule: pattern plus the opaque action/variant ids the
/// surrounding grammar attached to it. Declaration order is priority
/// order for ties.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    pub pattern: String,
    pub action: u32,
    pub variant: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanAction {
    pub action: u32,
    pub variant: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanTable {
    /// Row-major `(num_states + 1) * 256` move table; row 0 is the dead
    /// state, and cell value 0 means "no move".
    pub transitions: Vec<u32>,
    /// Per-row action; `actions[0]` is the default.
    pub actions: Vec<ScanAction>,
    pub start_state: u32,
    pub default_action: ScanAction,
}

/// Compile one ordered rule set.
pub fn compile(default: ScanAction, rules: &[Rule]) -> Result<ScanTable> {
    if rules.is_empty() {
        // Dead row plus a start row that matches nothing.
        return Ok(ScanTable {
            transitions: vec![0; 2 * 256],
            actions: vec![default; 2],
            start_state: 1,
            default_action: default,
        });
    }

    let mut nfa = NfaGraph::new();
    let mut exits = Vec::with_capacity(rules.len());
    for rule in rules {
        let frag = regex::compile(&mut nfa, &rule.pattern)?;
        exits.push(frag.exit);
    }

    let dfa = dfa::build(&nfa)?;
    let nrows = dfa
        .states
        .len()
        .checked_add(1)
        .ok_or(Error::SizeOverflow)?;
    u32::try_from(nrows).map_err(|_| Error::SizeOverflow)?;

    let mut transitions = vec![0u32; checked_area(nrows, 256)?];
    let mut actions = vec![default; nrows];
    for (si, state) in dfa.states.iter().enumerate() {
        let row = (si + 1) * 256;
        for byte in 0..256 {
            let m = state.moves[byte];
            if m != dfa::NONE {
                transitions[row + byte] = m + 1;
            }
        }
        // First-declared rule whose exit node this state contains.
        for (rule, &exit) in rules.iter().zip(&exits) {
            if state.members.test(exit) {
                actions[si + 1] = ScanAction {
                    action: rule.action,
                    variant: rule.variant,
                };
                break;
            }
        }
    }

    log::debug!(
        "scanner: {} rules -> {} dfa states",
        rules.len(),
        dfa.states.len()
    );
    Ok(ScanTable {
        transitions,
        actions,
        start_state: dfa.start as u32 + 1,
        default_action: default,
    })
}

/// Compile every mode's rule set independently, preserving mode
/// declaration order. Modes are opaque groupings; nothing is shared
/// between their automata.
pub fn compile_modes(
    default: ScanAction,
    modes: &IndexMap<String, Vec<Rule>>,
) -> Result<IndexMap<String, ScanTable>> {
    let mut out = IndexMap::with_capacity(modes.len());
    for (name, rules) in modes {
        log::debug!("scanner: compiling mode {:?} ({} rules)", name, rules.len());
        out.insert(name.clone(), compile(default, rules)?);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn init_logger() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    const DEFAULT: ScanAction = ScanAction {
        action: 0,
        variant: 0,
    };

    fn rule(pattern: &str, action: u32) -> Rule {
        Rule {
            pattern: pattern.into(),
            action,
            variant: 0,
        }
    }

    /// Minimal maximal-munch driver over the emitted table.
    fn scan(tab: &ScanTable, input: &[u8]) -> Option<(u32, usize)> {
        let mut state = tab.start_state as usize;
        let mut best = None;
        for (i, &b) in input.iter().enumerate() {
            state = tab.transitions[state * 256 + b as usize] as usize;
            if state == 0 {
                break;
            }
            let act = tab.actions[state];
            if act != tab.default_action {
                best = Some((act.action, i + 1));
            }
        }
        best
    }

    #[test]
    fn longest_match_beats_declaration_order() {
        init_logger();
        let tab = compile(DEFAULT, &[rule("a", 1), rule("ab", 2)]).unwrap();
        assert_eq!(scan(&tab, b"ab"), Some((2, 2)));
        assert_eq!(scan(&tab, b"a"), Some((1, 1)));
        assert_eq!(scan(&tab, b"b"), None);
    }

    #[test]
    fn duplicate_rules_pick_first() {
        let tab = compile(DEFAULT, &[rule("x", 1), rule("x", 2)]).unwrap();
        assert_eq!(scan(&tab, b"x"), Some((1, 1)));
    }

    #[test]
    fn repetition_and_class() {
        let tab = compile(DEFAULT, &[rule("[0-9]+", 7)]).unwrap();
        assert_eq!(scan(&tab, b"123a"), Some((7, 3)));
        assert_eq!(scan(&tab, b"a1"), None);
    }

    #[test]
    fn variant_survives_flattening() {
        let tab = compile(
            DEFAULT,
            &[Rule {
                pattern: "ab*".into(),
                action: 3,
                variant: 9,
            }],
        )
        .unwrap();
        let mut state = tab.start_state as usize;
        state = tab.transitions[state * 256 + b'a' as usize] as usize;
        assert_ne!(state, 0);
        assert_eq!(tab.actions[state], ScanAction { action: 3, variant: 9 });
    }

    #[test]
    fn dead_row_invariant() {
        let tab = compile(DEFAULT, &[rule("a", 1), rule("[b-d]+", 2)]).unwrap();
        assert_eq!(tab.start_state, 1);
        assert_eq!(tab.actions[0], DEFAULT);
        assert!(tab.transitions[..256].iter().all(|&t| t == 0));
        // Every move stays inside the table.
        let nrows = tab.actions.len() as u32;
        assert!(tab.transitions.iter().all(|&t| t < nrows));
    }

    #[test]
    fn empty_rule_set_matches_nothing() {
        let tab = compile(DEFAULT, &[]).unwrap();
        assert_eq!(scan(&tab, b"anything"), None);
        assert_eq!(tab.actions.len(), 2);
    }

    #[test]
    fn bad_pattern_fails_rule_compile() {
        assert!(compile(DEFAULT, &[rule("a", 1), rule("(b", 2)]).is_err());
    }

    #[test]
    fn modes_compile_independently_in_order() {
        let mut modes = IndexMap::new();
        modes.insert("main".to_string(), vec![rule("a", 1)]);
        modes.insert("string".to_string(), vec![rule("b", 2)]);
        let tabs = compile_modes(DEFAULT, &modes).unwrap();
        let names: Vec<&String> = tabs.keys().collect();
        assert_eq!(names, ["main", "string"]);
        assert_eq!(scan(&tabs["main"], b"a"), Some((1, 1)));
        assert_eq!(scan(&tabs["main"], b"b"), None);
        assert_eq!(scan(&tabs["string"], b"b"), Some((2, 1)));
    }

    proptest! {
        #[test]
        fn recompilation_is_byte_identical(words in proptest::collection::vec("[a-z]{1,4}", 1..6)) {
            let rules: Vec<Rule> = words
                .iter()
                .enumerate()
                .map(|(i, w)| rule(w, i as u32 + 1))
                .collect();
            let a = compile(DEFAULT, &rules).unwrap();
            let b = compile(DEFAULT, &rules).unwrap();
            prop_assert_eq!(a, b);
        }
    }
}
