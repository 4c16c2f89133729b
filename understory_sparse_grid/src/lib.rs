// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

// After you edit the crate's doc comment, run this command, then check README.md for any missing links
// cargo rdme --workspace-project=understory_sparse_grid --heading-base-level=0

//! Understory Sparse Grid: mostly-empty tables keyed by row and column.
//!
//! Tables and spreadsheets often keep per-cell data (custom styles, spans,
//! cached layouts) for a handful of cells among millions. [`SparseGrid`]
//! stores only the occupied cells, ordered by row and then column, in a
//! B-tree of fixed-size pages:
//!
//! - point [`get`](SparseGrid::get), [`set`](SparseGrid::set) and
//!   [`remove`](SparseGrid::remove) are logarithmic;
//! - [`insert_rows`](SparseGrid::insert_rows) and
//!   [`insert_columns`](SparseGrid::insert_columns) only relabel the cells after
//!   the edit point, so the tree keeps its shape;
//! - [`range`](SparseGrid::range) and [`iterate`](SparseGrid::iterate) walk a
//!   rectangle in row-major order by following sibling links between leaf pages.
//!
//! ```rust
//! use understory_sparse_grid::SparseGrid;
//!
//! let mut spans = SparseGrid::default();
//! spans.set(10, 2, (2, 3));
//! spans.set(4, 0, (1, 5));
//!
//! // A row was inserted above both spans.
//! spans.insert_rows(0, 1);
//! assert_eq!(spans.get(11, 2), Some(&(2, 3)));
//!
//! let cells: Vec<_> = spans.iter().map(|(row, col, _)| (row, col)).collect();
//! assert_eq!(cells, [(5, 0), (11, 2)]);
//! ```
//!
//! ## `no_std` Support
//!
//! This crate is `no_std` and uses `alloc`.

#![no_std]

extern crate alloc;

mod grid;

pub use grid::{DEFAULT_PAGE_SIZE, Range, SparseGrid};
