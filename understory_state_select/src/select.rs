// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Prioritized selection between state expressions.

use alloc::boxed::Box;
use alloc::vec::Vec;
use core::sync::atomic::{AtomicBool, Ordering};

use crate::expr::StateExpression;
use crate::optimizer::DecisionProgram;
use crate::state::AnimationState;

static USE_OPTIMIZER: AtomicBool = AtomicBool::new(true);

/// An ordered list of state expressions; the first one that holds wins.
///
/// [`evaluate`](Self::evaluate) returns the index of the first matching
/// expression, or [`len`](Self::len) when none matches. Callers typically
/// keep one more asset than expressions and use the last one as the
/// default.
///
/// When the optimizer is enabled the expressions are compiled into a
/// [`DecisionProgram`] at construction. Lists outside the compiler's bounds
/// silently fall back to in-order evaluation; both paths return the same
/// index for every state.
///
/// ```rust
/// use understory_state_select::{AnimationStateSet, StateExpression, StateKeyRegistry, StateSelect};
///
/// let mut keys = StateKeyRegistry::new();
/// let select = StateSelect::new([
///     StateExpression::parse("pressed", false, &mut keys).unwrap(),
///     StateExpression::parse("hover", false, &mut keys).unwrap(),
/// ]);
///
/// let mut state = AnimationStateSet::new();
/// assert_eq!(select.evaluate(&state), 2);
///
/// state.set_state(keys.intern("hover"), true);
/// assert_eq!(select.evaluate(&state), 1);
///
/// state.set_state(keys.intern("pressed"), true);
/// assert_eq!(select.evaluate(&state), 0);
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StateSelect {
    expressions: Box<[StateExpression]>,
    program: Option<DecisionProgram>,
}

impl StateSelect {
    /// Creates a select, compiling it if [`use_optimizer`](Self::use_optimizer) is set.
    pub fn new(expressions: impl IntoIterator<Item = StateExpression>) -> Self {
        Self::with_optimizer(expressions, Self::use_optimizer())
    }

    /// Creates a select, compiling it only if `optimize` is `true`.
    pub fn with_optimizer(
        expressions: impl IntoIterator<Item = StateExpression>,
        optimize: bool,
    ) -> Self {
        let expressions: Box<[StateExpression]> = expressions.into_iter().collect();
        let program = if optimize {
            DecisionProgram::compile(&expressions)
                .inspect_err(|reason| {
                    tracing::debug!(
                        expressions = expressions.len(),
                        %reason,
                        "state select uses linear evaluation"
                    );
                })
                .ok()
        } else {
            None
        };
        Self {
            expressions,
            program,
        }
    }

    /// Returns whether newly created selects are compiled by default.
    #[must_use]
    pub fn use_optimizer() -> bool {
        USE_OPTIMIZER.load(Ordering::Relaxed)
    }

    /// Sets whether newly created selects are compiled by default.
    ///
    /// Existing selects are not affected.
    pub fn set_use_optimizer(enabled: bool) {
        USE_OPTIMIZER.store(enabled, Ordering::Relaxed);
    }

    /// Returns the index of the first expression that holds for `state`, or
    /// [`len`](Self::len) if none does.
    #[inline]
    pub fn evaluate<S: AnimationState + ?Sized>(&self, state: &S) -> usize {
        match &self.program {
            Some(program) => program.evaluate(state),
            None => self.evaluate_linear(state),
        }
    }

    /// Evaluates the expressions in order, ignoring any compiled program.
    pub fn evaluate_linear<S: AnimationState + ?Sized>(&self, state: &S) -> usize {
        self.expressions
            .iter()
            .position(|e| e.evaluate(state))
            .unwrap_or(self.expressions.len())
    }

    /// Returns the number of expressions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.expressions.len()
    }

    /// Returns `true` if there are no expressions.
    ///
    /// An empty select always evaluates to 0.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.expressions.is_empty()
    }

    /// Returns the expression at `index`.
    #[must_use]
    pub fn expression(&self, index: usize) -> Option<&StateExpression> {
        self.expressions.get(index)
    }

    /// Returns all expressions in priority order.
    #[must_use]
    pub fn expressions(&self) -> &[StateExpression] {
        &self.expressions
    }

    /// Returns `true` if evaluation uses a compiled program.
    #[must_use]
    pub fn is_optimized(&self) -> bool {
        self.program.is_some()
    }

    /// Returns the compiled program, if any.
    #[must_use]
    pub fn program(&self) -> Option<&DecisionProgram> {
        self.program.as_ref()
    }
}

/// Collects expressions for a [`StateSelect`], inlining nested selects.
///
/// A nested select guarded by a condition contributes `guard + e` for each of
/// its expressions `e`, in order, so the flattened select picks the same
/// branch as evaluating the guard and then the nested select.
///
/// ```rust
/// use understory_state_select::{
///     AnimationStateSet, StateExpression, StateKeyRegistry, StateSelect, StateSelectBuilder,
/// };
///
/// let mut keys = StateKeyRegistry::new();
/// let mut parse = |t: &str| StateExpression::parse(t, false, &mut keys).unwrap();
///
/// let nested = StateSelect::new([parse("pressed"), parse("hover")]);
/// let select = StateSelectBuilder::new()
///     .push_guarded_select(parse("selected"), &nested)
///     .push(parse("disabled"))
///     .build();
///
/// assert_eq!(select.len(), 3);
/// let mut state = AnimationStateSet::new();
/// state.set_state(keys.intern("selected"), true);
/// state.set_state(keys.intern("hover"), true);
/// assert_eq!(select.evaluate(&state), 1);
/// ```
#[derive(Clone, Debug, Default)]
pub struct StateSelectBuilder {
    expressions: Vec<StateExpression>,
    optimize: Option<bool>,
}

impl StateSelectBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an expression with the lowest priority so far.
    pub fn push(mut self, expression: StateExpression) -> Self {
        self.expressions.push(expression);
        self
    }

    /// Appends every branch of `select`, each conjoined with `guard`.
    pub fn push_guarded_select(mut self, guard: StateExpression, select: &StateSelect) -> Self {
        self.expressions.extend(
            select
                .expressions()
                .iter()
                .map(|e| guard.clone().and(e.clone())),
        );
        self
    }

    /// Overrides the process-wide optimizer default for this select.
    pub fn optimize(mut self, optimize: bool) -> Self {
        self.optimize = Some(optimize);
        self
    }

    /// Returns the number of collected expressions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.expressions.len()
    }

    /// Returns `true` if no expressions were collected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.expressions.is_empty()
    }

    /// Builds the select.
    #[must_use]
    pub fn build(self) -> StateSelect {
        let optimize = self.optimize.unwrap_or_else(StateSelect::use_optimizer);
        StateSelect::with_optimizer(self.expressions, optimize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::StateKeyRegistry;
    use crate::state::AnimationStateSet;

    fn parse_all(keys: &mut StateKeyRegistry, texts: &[&str]) -> Vec<StateExpression> {
        texts
            .iter()
            .map(|t| StateExpression::parse(t, false, keys).unwrap())
            .collect()
    }

    #[test]
    fn no_match_returns_len() {
        let mut keys = StateKeyRegistry::new();
        for optimize in [false, true] {
            let select = StateSelect::with_optimizer(parse_all(&mut keys, &["a", "b"]), optimize);
            assert_eq!(select.is_optimized(), optimize);
            assert_eq!(select.evaluate(&AnimationStateSet::new()), 2);
            assert_eq!(select.evaluate(&()), 2);

            let mut state = AnimationStateSet::new();
            state.set_state(keys.intern("b"), true);
            assert_eq!(select.evaluate(&state), 1);
        }
    }

    #[test]
    fn empty_select_evaluates_to_zero() {
        let select = StateSelect::with_optimizer([], true);
        assert!(select.is_empty());
        assert!(!select.is_optimized());
        assert_eq!(select.evaluate(&()), 0);
    }

    #[test]
    fn unoptimizable_select_falls_back() {
        let mut keys = StateKeyRegistry::new();
        let names: Vec<_> = (0..20).map(|i| alloc::format!("s{i}")).collect();
        let expressions: Vec<_> = names
            .iter()
            .map(|n| StateExpression::check(keys.intern(n)))
            .collect();
        let select = StateSelect::with_optimizer(expressions, true);
        assert!(!select.is_optimized());

        let mut state = AnimationStateSet::new();
        state.set_state(keys.intern("s7"), true);
        state.set_state(keys.intern("s12"), true);
        assert_eq!(select.evaluate(&state), 7);
    }

    #[test]
    fn accessors_preserve_order() {
        let mut keys = StateKeyRegistry::new();
        let list = parse_all(&mut keys, &["x", "y+z", "!x"]);
        let select = StateSelect::with_optimizer(list.clone(), false);
        assert_eq!(select.len(), 3);
        assert_eq!(select.expressions(), &list[..]);
        assert_eq!(select.expression(1), Some(&list[1]));
        assert_eq!(select.expression(3), None);
    }

    #[test]
    fn guarded_inlining_matches_nested_evaluation() {
        let mut keys = StateKeyRegistry::new();
        let nested = StateSelect::with_optimizer(parse_all(&mut keys, &["pressed", "hover"]), false);
        let guard = StateExpression::parse("selected", false, &mut keys).unwrap();
        let tail = StateExpression::parse("disabled", false, &mut keys).unwrap();
        let flat = StateSelectBuilder::new()
            .push_guarded_select(guard.clone(), &nested)
            .push(tail.clone())
            .optimize(true)
            .build();
        assert!(flat.is_optimized());

        let all: Vec<_> = ["selected", "pressed", "hover", "disabled"]
            .iter()
            .map(|n| keys.intern(n))
            .collect();
        for bits in 0_u32..16 {
            let mut state = AnimationStateSet::new();
            for (i, &key) in all.iter().enumerate() {
                state.set_state(key, bits & (1 << i) != 0);
            }
            let expected = if guard.evaluate(&state) && nested.evaluate(&state) < nested.len() {
                nested.evaluate(&state)
            } else if tail.evaluate(&state) {
                nested.len()
            } else {
                nested.len() + 1
            };
            assert_eq!(flat.evaluate(&state), expected, "bits {bits:04b}");
        }
    }
}
