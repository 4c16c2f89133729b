// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The sparse grid B-tree.

use alloc::vec;
use alloc::vec::Vec;
use core::fmt;
use core::mem;

/// Page size used by [`SparseGrid::default`].
pub const DEFAULT_PAGE_SIZE: usize = 32;

type NodeId = usize;

#[derive(Clone, Debug)]
enum Item<T> {
    Entry(T),
    Child(NodeId),
}

/// A keyed slot. For a child slot the key is the largest key in that child.
#[derive(Clone, Debug)]
struct Slot<T> {
    row: usize,
    column: usize,
    item: Item<T>,
}

impl<T> Slot<T> {
    #[inline]
    fn key(&self) -> (usize, usize) {
        (self.row, self.column)
    }

    #[inline]
    fn child(&self) -> NodeId {
        match self.item {
            Item::Child(id) => id,
            Item::Entry(_) => unreachable!("entry slot above the leaf level"),
        }
    }

    #[inline]
    fn entry(&self) -> &T {
        match &self.item {
            Item::Entry(value) => value,
            Item::Child(_) => unreachable!("child slot at the leaf level"),
        }
    }
}

/// A page of slots. Leaf-level nodes are chained through `prev`/`next` in key order.
#[derive(Clone, Debug)]
struct Node<T> {
    slots: Vec<Slot<T>>,
    prev: Option<NodeId>,
    next: Option<NodeId>,
}

impl<T> Node<T> {
    const fn with_slots(slots: Vec<Slot<T>>) -> Self {
        Self {
            slots,
            prev: None,
            next: None,
        }
    }
}

enum Inserted<T> {
    Replaced(T),
    Added(Option<NodeId>),
}

/// A coordinate offset. Callers check `Up` for overflow before applying it.
#[derive(Copy, Clone)]
enum Shift {
    Up(usize),
    Down(usize),
}

impl Shift {
    #[inline]
    fn apply(self, value: usize) -> usize {
        match self {
            Self::Up(n) => value + n,
            Self::Down(n) => value - n,
        }
    }
}

/// Sparse storage of values keyed by `(row, column)`.
///
/// Entries live in a B-tree of fixed-capacity pages ordered by row, then
/// column. Point lookup, insertion and removal are logarithmic; inserting or
/// removing whole rows or columns relabels the coordinates of the entries
/// after the edit point without rebuilding the tree.
///
/// ```rust
/// use understory_sparse_grid::SparseGrid;
///
/// let mut grid = SparseGrid::new(4);
/// grid.set(0, 0, "a");
/// grid.set(2, 1, "b");
/// grid.set(5, 3, "c");
///
/// grid.insert_rows(2, 3);
/// assert_eq!(grid.get(2, 1), None);
/// assert_eq!(grid.get(5, 1), Some(&"b"));
/// assert_eq!(grid.get(8, 3), Some(&"c"));
///
/// grid.remove_rows(2, 3);
/// assert_eq!(grid.get(2, 1), Some(&"b"));
///
/// let row: Vec<_> = grid.range(0, 0, 2, usize::MAX).map(|(r, c, v)| (r, c, *v)).collect();
/// assert_eq!(row, [(0, 0, "a"), (2, 1, "b")]);
/// ```
#[derive(Clone)]
pub struct SparseGrid<T> {
    nodes: Vec<Node<T>>,
    free: Vec<NodeId>,
    root: NodeId,
    levels: usize,
    len: usize,
    page_size: usize,
}

impl<T> Default for SparseGrid<T> {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZE)
    }
}

impl<T: fmt::Debug> fmt::Debug for SparseGrid<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.iter().map(|(r, c, v)| ((r, c), v)))
            .finish()
    }
}

impl<T> SparseGrid<T> {
    /// Creates an empty grid whose pages hold up to `page_size` slots.
    ///
    /// # Panics
    ///
    /// Panics if `page_size < 2`.
    #[must_use]
    pub fn new(page_size: usize) -> Self {
        assert!(page_size >= 2, "page size must be at least 2");
        Self {
            nodes: vec![Node::with_slots(Vec::with_capacity(page_size + 1))],
            free: Vec::new(),
            root: 0,
            levels: 1,
            len: 0,
            page_size,
        }
    }

    /// Returns the page size.
    #[must_use]
    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Returns the number of tree levels (1 while everything fits in one page).
    #[must_use]
    pub fn levels(&self) -> usize {
        self.levels
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if the grid holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Removes all entries.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.free.clear();
        self.nodes
            .push(Node::with_slots(Vec::with_capacity(self.page_size + 1)));
        self.root = 0;
        self.levels = 1;
        self.len = 0;
    }

    /// Returns the entry at `(row, column)`.
    #[must_use]
    pub fn get(&self, row: usize, column: usize) -> Option<&T> {
        let (id, pos) = self.locate(row, column)?;
        let slot = &self.nodes[id].slots[pos];
        (slot.key() == (row, column)).then(|| slot.entry())
    }

    /// Returns a mutable reference to the entry at `(row, column)`.
    pub fn get_mut(&mut self, row: usize, column: usize) -> Option<&mut T> {
        let (id, pos) = self.locate(row, column)?;
        let slot = &mut self.nodes[id].slots[pos];
        if slot.key() != (row, column) {
            return None;
        }
        match &mut slot.item {
            Item::Entry(value) => Some(value),
            Item::Child(_) => unreachable!("child slot at the leaf level"),
        }
    }

    /// Stores `value` at `(row, column)`, returning the value it replaces.
    pub fn set(&mut self, row: usize, column: usize, value: T) -> Option<T> {
        match self.insert_in(self.root, self.levels, row, column, value) {
            Inserted::Replaced(old) => Some(old),
            Inserted::Added(split) => {
                self.len += 1;
                if let Some(sibling) = split {
                    self.grow_root(sibling);
                }
                None
            }
        }
    }

    /// Removes and returns the entry at `(row, column)`.
    pub fn remove(&mut self, row: usize, column: usize) -> Option<T> {
        let removed = self.remove_in(self.root, self.levels, row, column)?;
        self.len -= 1;
        self.shrink_root();
        Some(removed)
    }

    /// Moves every entry with `row >= at` down by `count` rows.
    ///
    /// # Panics
    ///
    /// Panics if a moved row would exceed `usize::MAX`. The grid is left
    /// unchanged in that case.
    pub fn insert_rows(&mut self, at: usize, count: usize) {
        if count == 0 {
            return;
        }
        if let Some((last_row, _)) = self.last_key_in_grid()
            && last_row >= at
        {
            last_row
                .checked_add(count)
                .expect("inserted rows push an entry past usize::MAX");
        }
        self.shift_rows(self.root, self.levels, at, Shift::Up(count));
    }

    /// Deletes the rows `at..at + count` and moves the rows after them up.
    ///
    /// A band reaching past `usize::MAX` deletes every row from `at` on.
    pub fn remove_rows(&mut self, at: usize, count: usize) {
        if count == 0 {
            return;
        }
        let last = at.saturating_add(count - 1);
        let doomed: Vec<_> = self
            .range(at, 0, last, usize::MAX)
            .map(|(r, c, _)| (r, c))
            .collect();
        for (row, column) in doomed {
            self.remove(row, column);
        }
        if let Some(end) = at.checked_add(count) {
            self.shift_rows(self.root, self.levels, end, Shift::Down(count));
        }
    }

    /// Moves every entry with `column >= at` right by `count` columns.
    ///
    /// # Panics
    ///
    /// Panics if a moved column would exceed `usize::MAX`. The grid is left
    /// unchanged in that case.
    pub fn insert_columns(&mut self, at: usize, count: usize) {
        if count == 0 {
            return;
        }
        if let Some(last_column) = self.iter().map(|(_, c, _)| c).filter(|&c| c >= at).max() {
            last_column
                .checked_add(count)
                .expect("inserted columns push an entry past usize::MAX");
        }
        self.shift_columns(self.root, self.levels, at, Shift::Up(count));
    }

    /// Deletes the columns `at..at + count` and moves the columns after them left.
    ///
    /// A band reaching past `usize::MAX` deletes every column from `at` on.
    pub fn remove_columns(&mut self, at: usize, count: usize) {
        if count == 0 {
            return;
        }
        let last = at.saturating_add(count - 1);
        let doomed: Vec<_> = self
            .iter()
            .filter(|&(_, c, _)| (at..=last).contains(&c))
            .map(|(r, c, _)| (r, c))
            .collect();
        for (row, column) in doomed {
            self.remove(row, column);
        }
        if let Some(end) = at.checked_add(count) {
            self.shift_columns(self.root, self.levels, end, Shift::Down(count));
        }
    }

    /// Calls `visit` for each entry with a row in `start_row..=end_row` and a
    /// column in `start_column..=end_column`, in row-major order.
    pub fn iterate(
        &self,
        start_row: usize,
        start_column: usize,
        end_row: usize,
        end_column: usize,
        mut visit: impl FnMut(usize, usize, &T),
    ) {
        for (row, column, value) in self.range(start_row, start_column, end_row, end_column) {
            visit(row, column, value);
        }
    }

    /// Iterates over the entries inside an inclusive rectangle, in row-major order.
    pub fn range(
        &self,
        start_row: usize,
        start_column: usize,
        end_row: usize,
        end_column: usize,
    ) -> Range<'_, T> {
        let (node, pos) = match self.locate(start_row, start_column) {
            Some((id, pos)) => (Some(id), pos),
            None => (None, 0),
        };
        Range {
            grid: self,
            node,
            pos,
            start_column,
            end_row,
            end_column,
        }
    }

    /// Iterates over all entries in row-major order.
    pub fn iter(&self) -> Range<'_, T> {
        self.range(0, 0, usize::MAX, usize::MAX)
    }

    // -------------------------------------------------------------------------
    // Lookup
    // -------------------------------------------------------------------------

    /// Index of the first slot in `id` whose key is not less than `(row, column)`.
    #[inline]
    fn find_pos(&self, id: NodeId, row: usize, column: usize) -> usize {
        self.nodes[id]
            .slots
            .partition_point(|s| s.key() < (row, column))
    }

    /// Finds the leaf slot holding the first key `>= (row, column)`.
    fn locate(&self, row: usize, column: usize) -> Option<(NodeId, usize)> {
        let mut id = self.root;
        for _ in 1..self.levels {
            let pos = self.find_pos(id, row, column);
            id = self.nodes[id].slots.get(pos)?.child();
        }
        let pos = self.find_pos(id, row, column);
        (pos < self.nodes[id].slots.len()).then_some((id, pos))
    }

    /// The largest key stored, if any.
    fn last_key_in_grid(&self) -> Option<(usize, usize)> {
        self.nodes[self.root].slots.last().map(Slot::key)
    }

    fn last_key(&self, id: NodeId) -> (usize, usize) {
        self.nodes[id]
            .slots
            .last()
            .map(Slot::key)
            .expect("non-empty node")
    }

    /// Re-caches the key of child slot `pos` in `parent`.
    fn refresh_key(&mut self, parent: NodeId, pos: usize) {
        let (row, column) = self.last_key(self.nodes[parent].slots[pos].child());
        let slot = &mut self.nodes[parent].slots[pos];
        slot.row = row;
        slot.column = column;
    }

    // -------------------------------------------------------------------------
    // Node arena
    // -------------------------------------------------------------------------

    fn alloc(&mut self, node: Node<T>) -> NodeId {
        match self.free.pop() {
            Some(id) => {
                self.nodes[id] = node;
                id
            }
            None => {
                self.nodes.push(node);
                self.nodes.len() - 1
            }
        }
    }

    fn release(&mut self, id: NodeId) {
        let Node { prev, next, .. } = mem::replace(&mut self.nodes[id], Node::with_slots(Vec::new()));
        if let Some(p) = prev {
            self.nodes[p].next = next;
        }
        if let Some(n) = next {
            self.nodes[n].prev = prev;
        }
        self.free.push(id);
    }

    // -------------------------------------------------------------------------
    // Insertion
    // -------------------------------------------------------------------------

    fn insert_in(
        &mut self,
        id: NodeId,
        level: usize,
        row: usize,
        column: usize,
        value: T,
    ) -> Inserted<T> {
        let pos = self.find_pos(id, row, column);
        if level == 1 {
            let slots = &mut self.nodes[id].slots;
            if let Some(slot) = slots.get_mut(pos)
                && slot.key() == (row, column)
                && let Item::Entry(old) = &mut slot.item
            {
                return Inserted::Replaced(mem::replace(old, value));
            }
            slots.insert(
                pos,
                Slot {
                    row,
                    column,
                    item: Item::Entry(value),
                },
            );
        } else {
            // Keys past the end go into the last child.
            let pos = pos.min(self.nodes[id].slots.len() - 1);
            let child = self.nodes[id].slots[pos].child();
            let split = match self.insert_in(child, level - 1, row, column, value) {
                Inserted::Added(split) => split,
                replaced @ Inserted::Replaced(_) => return replaced,
            };
            self.refresh_key(id, pos);
            if let Some(sibling) = split {
                let (row, column) = self.last_key(sibling);
                self.nodes[id].slots.insert(
                    pos + 1,
                    Slot {
                        row,
                        column,
                        item: Item::Child(sibling),
                    },
                );
            }
        }

        if self.nodes[id].slots.len() > self.page_size {
            Inserted::Added(Some(self.split(id, level == 1)))
        } else {
            Inserted::Added(None)
        }
    }

    /// Moves the upper half of an overfull node into a new right sibling.
    fn split(&mut self, id: NodeId, leaf_level: bool) -> NodeId {
        let half = self.nodes[id].slots.len() / 2;
        let mut upper = Vec::with_capacity(self.page_size + 1);
        upper.extend(self.nodes[id].slots.drain(half..));
        let sibling = self.alloc(Node::with_slots(upper));
        if leaf_level {
            let next = self.nodes[id].next;
            self.nodes[sibling].prev = Some(id);
            self.nodes[sibling].next = next;
            self.nodes[id].next = Some(sibling);
            if let Some(n) = next {
                self.nodes[n].prev = Some(sibling);
            }
        }
        sibling
    }

    fn grow_root(&mut self, sibling: NodeId) {
        let old = self.root;
        let child_slot = |grid: &Self, id: NodeId| {
            let (row, column) = grid.last_key(id);
            Slot {
                row,
                column,
                item: Item::Child(id),
            }
        };
        let mut slots = Vec::with_capacity(self.page_size + 1);
        slots.push(child_slot(self, old));
        slots.push(child_slot(self, sibling));
        self.root = self.alloc(Node::with_slots(slots));
        self.levels += 1;
        tracing::trace!(levels = self.levels, "sparse grid grew a level");
    }

    // -------------------------------------------------------------------------
    // Removal
    // -------------------------------------------------------------------------

    fn remove_in(&mut self, id: NodeId, level: usize, row: usize, column: usize) -> Option<T> {
        let pos = self.find_pos(id, row, column);
        let slot = self.nodes[id].slots.get(pos)?;
        if level == 1 {
            if slot.key() != (row, column) {
                return None;
            }
            return match self.nodes[id].slots.remove(pos).item {
                Item::Entry(value) => Some(value),
                Item::Child(_) => unreachable!("child slot at the leaf level"),
            };
        }
        let child = slot.child();
        let removed = self.remove_in(child, level - 1, row, column)?;
        self.repair_child(id, pos);
        Some(removed)
    }

    /// Restores the fill invariants of child `pos` of `parent` after a removal below it.
    fn repair_child(&mut self, parent: NodeId, pos: usize) {
        let child = self.nodes[parent].slots[pos].child();
        let len = self.nodes[child].slots.len();
        if len == 0 {
            self.nodes[parent].slots.remove(pos);
            self.release(child);
            return;
        }
        self.refresh_key(parent, pos);
        if len < self.page_size / 2 {
            self.try_merge(parent, pos);
        }
    }

    fn child_len(&self, parent: NodeId, pos: usize) -> usize {
        self.nodes[self.nodes[parent].slots[pos].child()].slots.len()
    }

    /// Folds an underfull child into its neighbours, or evens it out with one.
    fn try_merge(&mut self, parent: NodeId, pos: usize) {
        let count = self.nodes[parent].slots.len();
        let len = self.child_len(parent, pos);
        let left = (pos > 0).then(|| self.child_len(parent, pos - 1));
        let right = (pos + 1 < count).then(|| self.child_len(parent, pos + 1));

        match (left, right) {
            (Some(l), _) if l + len <= self.page_size => self.merge_pair(parent, pos - 1),
            (_, Some(r)) if len + r <= self.page_size => self.merge_pair(parent, pos),
            (Some(l), Some(r)) if l + len + r <= 2 * self.page_size => {
                self.merge_three(parent, pos - 1);
            }
            (Some(_), _) => self.redistribute(parent, pos - 1),
            (None, Some(_)) => self.redistribute(parent, pos),
            // Only child: the parent is the root and gets collapsed.
            (None, None) => {}
        }
    }

    /// Appends child `pos + 1` to child `pos` and drops it.
    fn merge_pair(&mut self, parent: NodeId, pos: usize) {
        let a = self.nodes[parent].slots[pos].child();
        let b = self.nodes[parent].slots[pos + 1].child();
        let mut moved = mem::take(&mut self.nodes[b].slots);
        self.nodes[a].slots.append(&mut moved);
        self.nodes[parent].slots.remove(pos + 1);
        self.release(b);
        self.refresh_key(parent, pos);
    }

    /// Spreads children `pos..pos + 3` over two nodes and drops the middle one.
    fn merge_three(&mut self, parent: NodeId, pos: usize) {
        let a = self.nodes[parent].slots[pos].child();
        let b = self.nodes[parent].slots[pos + 1].child();
        let c = self.nodes[parent].slots[pos + 2].child();

        let mut all = mem::take(&mut self.nodes[a].slots);
        all.append(&mut self.nodes[b].slots);
        all.append(&mut self.nodes[c].slots);
        let upper = all.split_off(all.len() / 2);
        self.nodes[a].slots = all;
        self.nodes[c].slots = upper;

        self.nodes[parent].slots.remove(pos + 1);
        self.release(b);
        self.refresh_key(parent, pos);
        self.refresh_key(parent, pos + 1);
    }

    /// Splits the entries of children `pos` and `pos + 1` evenly between them.
    fn redistribute(&mut self, parent: NodeId, pos: usize) {
        let a = self.nodes[parent].slots[pos].child();
        let b = self.nodes[parent].slots[pos + 1].child();

        let mut all = mem::take(&mut self.nodes[a].slots);
        all.append(&mut self.nodes[b].slots);
        let upper = all.split_off(all.len() / 2);
        self.nodes[a].slots = all;
        self.nodes[b].slots = upper;

        self.refresh_key(parent, pos);
        self.refresh_key(parent, pos + 1);
    }

    fn shrink_root(&mut self) {
        while self.levels > 1 {
            match self.nodes[self.root].slots.len() {
                0 => self.levels = 1,
                1 => {
                    let old = self.root;
                    self.root = self.nodes[old].slots[0].child();
                    self.release(old);
                    self.levels -= 1;
                }
                _ => break,
            }
            tracing::trace!(levels = self.levels, "sparse grid dropped a level");
        }
    }

    // -------------------------------------------------------------------------
    // Coordinate shifts
    // -------------------------------------------------------------------------

    fn shift_rows(&mut self, id: NodeId, level: usize, from: usize, shift: Shift) {
        let start = self.nodes[id].slots.partition_point(|s| s.row < from);
        for pos in start..self.nodes[id].slots.len() {
            if level == 1 {
                let slot = &mut self.nodes[id].slots[pos];
                slot.row = shift.apply(slot.row);
            } else {
                let child = self.nodes[id].slots[pos].child();
                self.shift_rows(child, level - 1, from, shift);
                self.refresh_key(id, pos);
            }
        }
    }

    fn shift_columns(&mut self, id: NodeId, level: usize, from: usize, shift: Shift) {
        for pos in 0..self.nodes[id].slots.len() {
            if level == 1 {
                let slot = &mut self.nodes[id].slots[pos];
                if slot.column >= from {
                    slot.column = shift.apply(slot.column);
                }
            } else {
                let child = self.nodes[id].slots[pos].child();
                self.shift_columns(child, level - 1, from, shift);
                self.refresh_key(id, pos);
            }
        }
    }
}

/// Iterator over a rectangle of a [`SparseGrid`], returned by [`SparseGrid::range`].
///
/// Yields `(row, column, &value)` in row-major order.
pub struct Range<'a, T> {
    grid: &'a SparseGrid<T>,
    node: Option<NodeId>,
    pos: usize,
    start_column: usize,
    end_row: usize,
    end_column: usize,
}

impl<T> Clone for Range<'_, T> {
    fn clone(&self) -> Self {
        Self { ..*self }
    }
}

impl<T> fmt::Debug for Range<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Range")
            .field("node", &self.node)
            .field("pos", &self.pos)
            .field("start_column", &self.start_column)
            .field("end_row", &self.end_row)
            .field("end_column", &self.end_column)
            .finish_non_exhaustive()
    }
}

impl<'a, T> Iterator for Range<'a, T> {
    type Item = (usize, usize, &'a T);

    fn next(&mut self) -> Option<Self::Item> {
        let grid = self.grid;
        loop {
            let node = &grid.nodes[self.node?];
            let Some(slot) = node.slots.get(self.pos) else {
                self.node = node.next;
                self.pos = 0;
                continue;
            };
            self.pos += 1;
            if slot.row > self.end_row {
                self.node = None;
                return None;
            }
            if (self.start_column..=self.end_column).contains(&slot.column) {
                return Some((slot.row, slot.column, slot.entry()));
            }
        }
    }
}

impl<'a, T> IntoIterator for &'a SparseGrid<T> {
    type Item = (usize, usize, &'a T);
    type IntoIter = Range<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
