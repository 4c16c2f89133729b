// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Compilation of expression lists into flat decision programs.
//!
//! The compiler evaluates every expression for every assignment of the
//! referenced keys, producing a truth table of "first matching expression"
//! indices. That table is then split greedily on the key whose two halves
//! reach the most different result sets, yielding a binary decision tree
//! stored as two parallel arrays.

use alloc::boxed::Box;
use alloc::vec::Vec;
use core::fmt;

use crate::expr::StateExpression;
use crate::key::{StateKey, StateKeySet};
use crate::state::AnimationState;

/// Maximum number of distinct keys a program can test.
pub const MAX_KEYS: usize = 16;

/// Maximum number of expressions a program can select between.
pub const MAX_EXPRESSIONS: usize = 254;

/// Marks a decision code as a result rather than a node offset.
pub const RESULT_FLAG: u16 = 0x8000;

/// Why an expression list was not compiled.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum NotOptimizable {
    /// There are no expressions to select between.
    NoExpressions,
    /// More than [`MAX_EXPRESSIONS`] expressions.
    TooManyExpressions(usize),
    /// The expressions do not reference any key.
    NoKeys,
    /// More than [`MAX_KEYS`] distinct keys are referenced.
    TooManyKeys(usize),
    /// The decision tree needs more nodes than a code can address.
    ProgramTooLarge,
}

impl fmt::Display for NotOptimizable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoExpressions => f.write_str("no expressions"),
            Self::TooManyExpressions(n) => {
                write!(f, "{n} expressions exceed the limit of {MAX_EXPRESSIONS}")
            }
            Self::NoKeys => f.write_str("expressions reference no state keys"),
            Self::TooManyKeys(n) => write!(f, "{n} state keys exceed the limit of {MAX_KEYS}"),
            Self::ProgramTooLarge => f.write_str("decision program too large"),
        }
    }
}

impl core::error::Error for NotOptimizable {}

/// A compiled decision procedure equivalent to evaluating a list of
/// expressions in order and returning the index of the first match.
///
/// Node `n` tests `keys()[program_keys()[n]]` and continues with
/// `program_codes()[2 * n]` if the key is active, `program_codes()[2 * n + 1]`
/// otherwise. A code with [`RESULT_FLAG`] set is a final result.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DecisionProgram {
    keys: Box<[StateKey]>,
    program_keys: Box<[u8]>,
    program_codes: Box<[u16]>,
    root: u16,
}

impl DecisionProgram {
    /// Compiles `expressions` into a decision program.
    pub fn compile(expressions: &[StateExpression]) -> Result<Self, NotOptimizable> {
        let num_expr = expressions.len();
        if num_expr == 0 {
            return Err(NotOptimizable::NoExpressions);
        }
        if num_expr > MAX_EXPRESSIONS {
            return Err(NotOptimizable::TooManyExpressions(num_expr));
        }

        let mut used = StateKeySet::new();
        for expr in expressions {
            expr.used_state_keys(&mut used);
        }
        let keys: Box<[StateKey]> = used.iter().collect();
        match keys.len() {
            0 => return Err(NotOptimizable::NoKeys),
            n if n > MAX_KEYS => return Err(NotOptimizable::TooManyKeys(n)),
            _ => {}
        }

        let matrix: Vec<u8> = (0..1_u32 << keys.len())
            .map(|bits| {
                let state = Assignment { keys: &keys, bits };
                let first = expressions
                    .iter()
                    .position(|e| e.evaluate(&state))
                    .unwrap_or(num_expr);
                u8::try_from(first).expect("at most MAX_EXPRESSIONS + 1 results")
            })
            .collect();

        let mut compiler = Compiler {
            matrix: &matrix,
            full: (1_u32 << keys.len()) - 1,
            num_keys: keys.len(),
            program_keys: Vec::new(),
            program_codes: Vec::new(),
        };
        let root = compiler.compile(0, 0)?;

        tracing::trace!(
            keys = keys.len(),
            expressions = num_expr,
            nodes = compiler.program_keys.len(),
            "compiled state select program"
        );

        Ok(Self {
            program_keys: compiler.program_keys.into_boxed_slice(),
            program_codes: compiler.program_codes.into_boxed_slice(),
            keys,
            root,
        })
    }

    /// Returns the index of the first matching expression, or the number of
    /// expressions if none matches.
    #[inline]
    pub fn evaluate<S: AnimationState + ?Sized>(&self, state: &S) -> usize {
        let mut code = self.root;
        while code & RESULT_FLAG == 0 {
            let node = usize::from(code);
            let key = self.keys[usize::from(self.program_keys[node])];
            code = self.program_codes[2 * node + usize::from(!state.is_state_active(key))];
        }
        usize::from(code & !RESULT_FLAG)
    }

    /// The tested keys, in ascending id order.
    #[must_use]
    pub fn keys(&self) -> &[StateKey] {
        &self.keys
    }

    /// Per node: index into [`keys`](Self::keys) of the tested key.
    #[must_use]
    pub fn program_keys(&self) -> &[u8] {
        &self.program_keys
    }

    /// Per node: the code for "key active" followed by the code for "key inactive".
    #[must_use]
    pub fn program_codes(&self) -> &[u16] {
        &self.program_codes
    }

    /// The entry code: node 0, or a result when the outcome is constant.
    #[must_use]
    pub fn root(&self) -> u16 {
        self.root
    }

    /// Returns the number of decision nodes.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.program_keys.len()
    }
}

/// One truth assignment of the program keys: key `i` is active iff bit `i` is set.
struct Assignment<'a> {
    keys: &'a [StateKey],
    bits: u32,
}

impl AnimationState for Assignment<'_> {
    fn is_state_active(&self, key: StateKey) -> bool {
        self.keys
            .binary_search(&key)
            .is_ok_and(|i| self.bits & (1 << i) != 0)
    }
}

/// A set of result indices (`0..=MAX_EXPRESSIONS`).
#[derive(Copy, Clone, Default, PartialEq, Eq)]
struct ResultSet([u64; 4]);

impl ResultSet {
    fn insert(&mut self, result: u8) {
        self.0[usize::from(result >> 6)] |= 1 << (result & 63);
    }

    fn len(&self) -> u32 {
        self.0.iter().map(|w| w.count_ones()).sum()
    }

    fn symmetric_difference_len(&self, other: &Self) -> u32 {
        self.0
            .iter()
            .zip(other.0)
            .map(|(a, b)| (a ^ b).count_ones())
            .sum()
    }
}

struct Compiler<'a> {
    matrix: &'a [u8],
    full: u32,
    num_keys: usize,
    program_keys: Vec<u8>,
    program_codes: Vec<u16>,
}

impl Compiler<'_> {
    /// Calls `f` for every matrix index whose `mask` bits equal `bits`.
    fn for_each_index(&self, bits: u32, mask: u32, mut f: impl FnMut(u32)) {
        let free = self.full & !mask;
        let mut sub = free;
        loop {
            f(bits | sub);
            if sub == 0 {
                break;
            }
            sub = (sub - 1) & free;
        }
    }

    /// Compiles the sub-table with the `mask` keys fixed to `bits`, returning its code.
    fn compile(&mut self, bits: u32, mask: u32) -> Result<u16, NotOptimizable> {
        let mut halves = [[ResultSet::default(); 2]; MAX_KEYS];
        let mut all = ResultSet::default();
        let mut any_result = 0_u8;
        self.for_each_index(bits, mask, |idx| {
            let result = self.matrix[idx as usize];
            any_result = result;
            all.insert(result);
            for (key, half) in halves.iter_mut().enumerate().take(self.num_keys) {
                half[usize::from(idx & (1 << key) != 0)].insert(result);
            }
        });

        if all.len() == 1 {
            return Ok(u16::from(any_result) | RESULT_FLAG);
        }

        let mut best = None;
        let mut best_score = 0;
        for key in (0..self.num_keys).filter(|&k| mask & (1 << k) == 0) {
            let [inactive, active] = &halves[key];
            let score = inactive.symmetric_difference_len(active);
            if best.is_none() || score > best_score {
                best = Some(key);
                best_score = score;
            }
        }
        // More than one result implies at least one unfixed key.
        let key = best.expect("a sub-table with several results has a free key");

        let node = self.program_keys.len();
        if node >= usize::from(RESULT_FLAG) {
            return Err(NotOptimizable::ProgramTooLarge);
        }
        #[expect(clippy::cast_possible_truncation, reason = "key < MAX_KEYS")]
        self.program_keys.push(key as u8);
        self.program_codes.extend([0, 0]);

        let bit = 1_u32 << key;
        let then_code = self.compile(bits | bit, mask | bit)?;
        let else_code = self.compile(bits, mask | bit)?;
        self.program_codes[2 * node] = then_code;
        self.program_codes[2 * node + 1] = else_code;

        #[expect(clippy::cast_possible_truncation, reason = "checked against RESULT_FLAG")]
        Ok(node as u16)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::StateKeyRegistry;
    use crate::state::AnimationStateSet;

    fn exprs(keys: &mut StateKeyRegistry, texts: &[&str]) -> Vec<StateExpression> {
        texts
            .iter()
            .map(|t| StateExpression::parse(t, false, keys).unwrap())
            .collect()
    }

    fn linear(expressions: &[StateExpression], state: &AnimationStateSet) -> usize {
        expressions
            .iter()
            .position(|e| e.evaluate(state))
            .unwrap_or(expressions.len())
    }

    #[test]
    fn refuses_out_of_bounds_inputs() {
        let mut keys = StateKeyRegistry::new();
        assert_eq!(
            DecisionProgram::compile(&[]),
            Err(NotOptimizable::NoExpressions)
        );

        let many: Vec<_> = (0..17)
            .map(|i| StateExpression::check(keys.intern(&alloc::format!("k{i}"))))
            .collect();
        assert_eq!(
            DecisionProgram::compile(&many),
            Err(NotOptimizable::TooManyKeys(17))
        );

        let a = StateExpression::check(keys.intern("a"));
        let too_long = alloc::vec![a; MAX_EXPRESSIONS + 1];
        assert_eq!(
            DecisionProgram::compile(&too_long),
            Err(NotOptimizable::TooManyExpressions(255))
        );
    }

    #[test]
    fn single_key_program() {
        let mut keys = StateKeyRegistry::new();
        let list = exprs(&mut keys, &["hover"]);
        let program = DecisionProgram::compile(&list).unwrap();
        assert_eq!(program.node_count(), 1);
        assert_eq!(program.root(), 0);
        assert_eq!(program.program_codes(), &[RESULT_FLAG, 1 | RESULT_FLAG]);
    }

    #[test]
    fn constant_outcome_has_no_nodes() {
        let mut keys = StateKeyRegistry::new();
        let list = exprs(&mut keys, &["a|!a", "b"]);
        let program = DecisionProgram::compile(&list).unwrap();
        assert_eq!(program.node_count(), 0);
        assert_eq!(program.root(), RESULT_FLAG);
        assert_eq!(program.evaluate(&()), 0);
    }

    #[test]
    fn non_discriminating_key_is_skipped() {
        let mut keys = StateKeyRegistry::new();
        // `b` never changes the outcome.
        let list = exprs(&mut keys, &["a+(b|!b)"]);
        let program = DecisionProgram::compile(&list).unwrap();
        assert_eq!(program.keys().len(), 2);
        assert_eq!(program.program_keys(), &[0]);
    }

    #[test]
    fn matches_linear_evaluation_exhaustively() {
        let mut keys = StateKeyRegistry::new();
        let list = exprs(
            &mut keys,
            &[
                "pressed+armed",
                "hover^selected",
                "!(hover|disabled)",
                "selected+!disabled",
            ],
        );
        let program = DecisionProgram::compile(&list).unwrap();
        let used: Vec<StateKey> = program.keys().to_vec();

        for bits in 0..1_u32 << used.len() {
            let mut state = AnimationStateSet::new();
            for (i, &key) in used.iter().enumerate() {
                state.set_state(key, bits & (1 << i) != 0);
            }
            assert_eq!(program.evaluate(&state), linear(&list, &state), "bits {bits:b}");
        }
    }
}
