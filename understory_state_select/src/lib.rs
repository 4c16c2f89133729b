// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

// After you edit the crate's doc comment, run this command, then check README.md for any missing links
// cargo rdme --workspace-project=understory_state_select --heading-base-level=0

//! Understory State Select: choosing themed assets from boolean widget state.
//!
//! A theme describes which image, font or cursor to use for a widget with
//! small boolean formulas over named states, such as `hover+!pressed`. This
//! crate parses those formulas, evaluates them against a widget's live state,
//! and compiles prioritized lists of them into branch-only decision programs
//! that are cheap enough to run every frame.
//!
//! - [`StateKeyRegistry`] interns state names into dense [`StateKey`] ids.
//! - [`StateExpression`] is a parsed formula; [`StateExpression::parse`] reads
//!   the text form and reports a [`ParseError`] with the failing position.
//! - [`AnimationState`] is what expressions are evaluated against;
//!   [`AnimationStateSet`] is a ready-made implementation.
//! - [`StateSelect`] returns the index of the first expression that holds,
//!   using a [`DecisionProgram`] when one could be compiled.
//!
//! ## Expression syntax
//!
//! ```text
//! sequence := term (op term)*        all ops at one level must be equal
//! term     := '!'? (name | '(' sequence ')')
//! op       := '+' (and) | '|' (or) | '^' (xor)
//! ```
//!
//! Names start with a letter or `_` and continue with letters, digits or `_`.
//! Spaces are allowed between tokens. Mixing operators needs parentheses:
//! `a+b|c` is rejected, `(a+b)|c` is not.
//!
//! ## Example
//!
//! ```rust
//! use understory_state_select::{
//!     AnimationStateSet, StateExpression, StateKeyRegistry, StateSelect,
//! };
//!
//! let mut keys = StateKeyRegistry::new();
//! let mut parse = |text: &str| StateExpression::parse(text, false, &mut keys).unwrap();
//!
//! // images: [pressed, hover, normal]
//! let select = StateSelect::new([parse("pressed+armed"), parse("hover")]);
//! assert!(select.is_optimized());
//!
//! let mut state = AnimationStateSet::new();
//! assert_eq!(select.evaluate(&state), 2);
//!
//! state.set_state(keys.intern("hover"), true);
//! assert_eq!(select.evaluate(&state), 1);
//!
//! state.set_state(keys.intern("pressed"), true);
//! state.set_state(keys.intern("armed"), true);
//! assert_eq!(select.evaluate(&state), 0);
//! ```
//!
//! ## Compiled selects
//!
//! [`DecisionProgram::compile`] builds the full truth table of the
//! expressions over their referenced keys and turns it into a binary decision
//! tree, always splitting on the key that best separates the remaining
//! results. Evaluation then tests at most one key per level. Lists with more
//! than [`MAX_KEYS`] keys or [`MAX_EXPRESSIONS`] expressions are evaluated in
//! order instead; the result is the same either way.
//!
//! ## `no_std` Support
//!
//! This crate is `no_std` and uses `alloc`.

#![no_std]

extern crate alloc;

mod expr;
mod key;
mod optimizer;
mod parse;
mod select;
mod state;

pub use expr::{DisplayExpression, LogicOp, StateExpression};
pub use key::{StateKey, StateKeyRegistry, StateKeySet};
pub use optimizer::{DecisionProgram, MAX_EXPRESSIONS, MAX_KEYS, NotOptimizable, RESULT_FLAG};
pub use parse::{ParseError, ParseErrorKind};
pub use select::{StateSelect, StateSelectBuilder};
pub use state::{AnimationState, AnimationStateSet};
