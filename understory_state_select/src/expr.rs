// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Boolean expressions over state keys.

use alloc::boxed::Box;
use alloc::vec::Vec;
use core::fmt;

use crate::key::{StateKey, StateKeyRegistry, StateKeySet};
use crate::parse::{self, ParseError};
use crate::state::AnimationState;

/// The connective of a [`StateExpression::Logic`] node.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum LogicOp {
    /// All children must be true (`+`).
    And,
    /// At least one child must be true (`|`).
    Or,
    /// An odd number of children must be true (`^`).
    Xor,
}

impl LogicOp {
    /// Returns the operator character used in expression text.
    #[must_use]
    pub const fn symbol(self) -> char {
        match self {
            Self::And => '+',
            Self::Or => '|',
            Self::Xor => '^',
        }
    }

    /// Maps an operator character back to its connective.
    #[must_use]
    pub const fn from_symbol(ch: char) -> Option<Self> {
        match ch {
            '+' => Some(Self::And),
            '|' => Some(Self::Or),
            '^' => Some(Self::Xor),
            _ => None,
        }
    }
}

/// A boolean formula over [`StateKey`]s.
///
/// The `negate` flag of a node is applied after its children are combined.
///
/// ```rust
/// use understory_state_select::{AnimationStateSet, StateExpression, StateKeyRegistry};
///
/// let mut keys = StateKeyRegistry::new();
/// let expr = StateExpression::parse("hover+!pressed", false, &mut keys).unwrap();
///
/// let mut state = AnimationStateSet::new();
/// state.set_state(keys.intern("hover"), true);
/// assert!(expr.evaluate(&state));
///
/// state.set_state(keys.intern("pressed"), true);
/// assert!(!expr.evaluate(&state));
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum StateExpression {
    /// True when `key` is active (inverted if `negate`).
    Check {
        /// The tested state.
        key: StateKey,
        /// Invert the result.
        negate: bool,
    },
    /// Combination of two or more children with a single connective.
    Logic {
        /// The connective shared by all children.
        op: LogicOp,
        /// The combined sub-expressions.
        children: Box<[StateExpression]>,
        /// Invert the combined result.
        negate: bool,
    },
}

impl StateExpression {
    /// Parses `text`, XOR-ing `negate` into the root's negation.
    ///
    /// State names are registered in `keys` on first reference. See the
    /// crate documentation for the grammar.
    pub fn parse(
        text: &str,
        negate: bool,
        keys: &mut StateKeyRegistry,
    ) -> Result<Self, ParseError> {
        let mut expr = parse::parse_expression(text, keys)?;
        if negate {
            expr.toggle_negate();
        }
        Ok(expr)
    }

    /// A check of a single state.
    #[must_use]
    pub const fn check(key: StateKey) -> Self {
        Self::Check { key, negate: false }
    }

    /// A logic node over `children`.
    ///
    /// A single child is returned unchanged.
    ///
    /// # Panics
    ///
    /// Panics if `children` is empty.
    #[must_use]
    pub fn logic(op: LogicOp, children: impl IntoIterator<Item = Self>) -> Self {
        let mut children: Vec<Self> = children.into_iter().collect();
        assert!(!children.is_empty(), "logic nodes need at least one child");
        if children.len() == 1 {
            return children.pop().expect("length checked above");
        }
        Self::Logic {
            op,
            children: children.into_boxed_slice(),
            negate: false,
        }
    }

    /// Conjunction of `children` (`a+b+…`).
    #[must_use]
    pub fn all_of(children: impl IntoIterator<Item = Self>) -> Self {
        Self::logic(LogicOp::And, children)
    }

    /// Disjunction of `children` (`a|b|…`).
    #[must_use]
    pub fn any_of(children: impl IntoIterator<Item = Self>) -> Self {
        Self::logic(LogicOp::Or, children)
    }

    /// Exclusive or of `children` (`a^b^…`).
    #[must_use]
    pub fn one_of(children: impl IntoIterator<Item = Self>) -> Self {
        Self::logic(LogicOp::Xor, children)
    }

    /// `self + other`.
    #[must_use]
    pub fn and(self, other: Self) -> Self {
        Self::all_of([self, other])
    }

    /// Returns the expression with its result inverted.
    #[must_use]
    pub fn negate(mut self) -> Self {
        self.toggle_negate();
        self
    }

    /// Returns `true` if the result of this node is inverted.
    #[must_use]
    pub fn is_negated(&self) -> bool {
        match self {
            Self::Check { negate, .. } | Self::Logic { negate, .. } => *negate,
        }
    }

    pub(crate) fn toggle_negate(&mut self) {
        match self {
            Self::Check { negate, .. } | Self::Logic { negate, .. } => *negate = !*negate,
        }
    }

    /// Evaluates the expression against a live state.
    pub fn evaluate<S: AnimationState + ?Sized>(&self, state: &S) -> bool {
        match self {
            Self::Check { key, negate } => *negate ^ state.is_state_active(*key),
            Self::Logic {
                op: LogicOp::Xor,
                children,
                negate,
            } => children
                .iter()
                .fold(*negate, |acc, child| acc ^ child.evaluate(state)),
            Self::Logic {
                op,
                children,
                negate,
            } => {
                let and = *op == LogicOp::And;
                let result = and ^ *negate;
                for child in children {
                    if child.evaluate(state) != and {
                        return !result;
                    }
                }
                result
            }
        }
    }

    /// Adds every key referenced by this expression to `keys`.
    pub fn used_state_keys(&self, keys: &mut StateKeySet) {
        match self {
            Self::Check { key, .. } => {
                keys.insert(*key);
            }
            Self::Logic { children, .. } => {
                for child in children {
                    child.used_state_keys(keys);
                }
            }
        }
    }

    /// Returns a value that formats this expression in its text form,
    /// resolving key names through `keys`.
    ///
    /// The output parses back to an equivalent expression.
    #[must_use]
    pub fn display<'a>(&'a self, keys: &'a StateKeyRegistry) -> DisplayExpression<'a> {
        DisplayExpression { expr: self, keys }
    }
}

/// Helper returned by [`StateExpression::display`].
#[derive(Debug)]
pub struct DisplayExpression<'a> {
    expr: &'a StateExpression,
    keys: &'a StateKeyRegistry,
}

impl DisplayExpression<'_> {
    fn write(&self, expr: &StateExpression, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match expr {
            StateExpression::Check { key, negate } => {
                if *negate {
                    f.write_str("!")?;
                }
                match self.keys.name(*key) {
                    Some(name) => f.write_str(name),
                    None => write!(f, "#{}", key.id()),
                }
            }
            StateExpression::Logic {
                op,
                children,
                negate,
            } => {
                if *negate {
                    f.write_str("!(")?;
                }
                for (i, child) in children.iter().enumerate() {
                    if i > 0 {
                        write!(f, "{}", op.symbol())?;
                    }
                    if matches!(child, StateExpression::Logic { .. }) && !child.is_negated() {
                        f.write_str("(")?;
                        self.write(child, f)?;
                        f.write_str(")")?;
                    } else {
                        self.write(child, f)?;
                    }
                }
                if *negate {
                    f.write_str(")")?;
                }
                Ok(())
            }
        }
    }
}

impl fmt::Display for DisplayExpression<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write(self.expr, f)
    }
}
