// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! State key identification and interning.
//!
//! This module provides [`StateKey`], a compact handle for a named boolean
//! state signal, the [`StateKeyRegistry`] that hands them out, and
//! [`StateKeySet`], a bitset over key ids.

use alloc::boxed::Box;
use alloc::vec::Vec;
use core::fmt;
use core::hash::BuildHasher;

use hashbrown::DefaultHashBuilder;
use hashbrown::HashMap;
use smallvec::SmallVec;

/// An interned identifier for a named boolean state (e.g. `hover`).
///
/// Keys are handed out by a [`StateKeyRegistry`] with dense ids starting at 0,
/// in order of first use. Equality and hashing are by id, so keys from
/// different registries must not be mixed.
///
/// # Example
///
/// ```rust
/// use understory_state_select::StateKeyRegistry;
///
/// let mut keys = StateKeyRegistry::new();
/// let hover = keys.intern("hover");
/// assert_eq!(hover.id(), 0);
/// assert_eq!(keys.intern("hover"), hover);
/// assert_eq!(keys.name(hover), Some("hover"));
/// ```
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct StateKey(u32);

impl StateKey {
    /// Creates a key from a raw id.
    ///
    /// This is typically done by [`StateKeyRegistry::intern`] rather than
    /// directly.
    #[must_use]
    #[inline]
    pub const fn from_id(id: u32) -> Self {
        Self(id)
    }

    /// Returns the raw numeric id.
    #[must_use]
    #[inline]
    pub const fn id(self) -> u32 {
        self.0
    }

    /// Returns this id as a `usize` index (for tables keyed by state keys).
    #[must_use]
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for StateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("StateKey").field(&self.0).finish()
    }
}

/// Interns state names into dense [`StateKey`] ids.
///
/// A registry is owned by whatever loads themes (one per GUI instance) and is
/// only mutated while themes are parsed. It requires `&mut` access to
/// register names, so sharing one across threads needs external
/// synchronization.
///
/// Names are stored once; lookups go through a hash-bucket index
/// (hash -> small list of candidate keys).
#[derive(Clone)]
pub struct StateKeyRegistry {
    names: Vec<Box<str>>,
    buckets: HashMap<u64, SmallVec<[StateKey; 1]>>,
    build_hasher: DefaultHashBuilder,
}

impl Default for StateKeyRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for StateKeyRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateKeyRegistry")
            .field("names", &self.names)
            .finish_non_exhaustive()
    }
}

impl StateKeyRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            names: Vec::new(),
            buckets: HashMap::new(),
            build_hasher: DefaultHashBuilder::default(),
        }
    }

    /// Returns the number of registered keys.
    #[must_use]
    #[inline]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Returns `true` if no keys are registered.
    #[must_use]
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Returns the key for `name`, registering it on first use.
    ///
    /// New keys get `id = self.len()`.
    ///
    /// # Panics
    ///
    /// Panics if `name` is empty or if more than `u32::MAX` keys are registered.
    pub fn intern(&mut self, name: &str) -> StateKey {
        assert!(!name.is_empty(), "state key names must not be empty");

        let hash = self.build_hasher.hash_one(name);
        if let Some(key) = self.find(hash, name) {
            return key;
        }

        let key = StateKey(u32::try_from(self.names.len()).expect("too many state keys (u32)"));
        self.names.push(name.into());
        self.buckets.entry(hash).or_default().push(key);
        key
    }

    /// Looks up a key by name without registering it.
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<StateKey> {
        self.find(self.build_hasher.hash_one(name), name)
    }

    /// Returns the key with the given id, if it was registered.
    #[must_use]
    pub fn get(&self, id: u32) -> Option<StateKey> {
        ((id as usize) < self.names.len()).then_some(StateKey(id))
    }

    /// Returns the key with the given id.
    ///
    /// # Panics
    ///
    /// Panics if no key with this id has been registered.
    #[must_use]
    pub fn key(&self, id: u32) -> StateKey {
        self.get(id).unwrap_or_else(|| {
            panic!(
                "state key id {id} out of range (registered: {})",
                self.names.len()
            )
        })
    }

    /// Returns the name of a key, if it belongs to this registry.
    #[must_use]
    pub fn name(&self, key: StateKey) -> Option<&str> {
        self.names.get(key.index()).map(|n| &**n)
    }

    /// Iterates over all registered keys in id order.
    pub fn keys(&self) -> impl ExactSizeIterator<Item = StateKey> + '_ {
        (0..self.names.len()).map(|i| StateKey(i as u32))
    }

    fn find(&self, hash: u64, name: &str) -> Option<StateKey> {
        self.buckets
            .get(&hash)?
            .iter()
            .copied()
            .find(|key| &*self.names[key.index()] == name)
    }
}

/// A growable set of [`StateKey`]s, stored as a bitset over key ids.
///
/// Iteration yields keys in ascending id order.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct StateKeySet {
    words: Vec<u64>,
}

impl StateKeySet {
    /// Creates an empty set.
    #[must_use]
    pub const fn new() -> Self {
        Self { words: Vec::new() }
    }

    /// Adds `key`, returning `true` if it was not present.
    pub fn insert(&mut self, key: StateKey) -> bool {
        let (word, bit) = (key.index() / 64, key.index() % 64);
        if word >= self.words.len() {
            self.words.resize(word + 1, 0);
        }
        let mask = 1_u64 << bit;
        let fresh = self.words[word] & mask == 0;
        self.words[word] |= mask;
        fresh
    }

    /// Returns `true` if `key` is in the set.
    #[must_use]
    pub fn contains(&self, key: StateKey) -> bool {
        self.words
            .get(key.index() / 64)
            .is_some_and(|w| w & (1_u64 << (key.index() % 64)) != 0)
    }

    /// Returns the number of keys in the set.
    #[must_use]
    pub fn len(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Returns `true` if the set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|&w| w == 0)
    }

    /// Removes all keys.
    pub fn clear(&mut self) {
        self.words.clear();
    }

    /// Iterates over the keys in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = StateKey> + '_ {
        self.words.iter().enumerate().flat_map(|(wi, &word)| {
            let mut rest = word;
            core::iter::from_fn(move || {
                if rest == 0 {
                    return None;
                }
                let bit = rest.trailing_zeros();
                rest &= rest - 1;
                Some(StateKey(wi as u32 * 64 + bit))
            })
        })
    }
}

impl fmt::Debug for StateKeySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl Extend<StateKey> for StateKeySet {
    fn extend<I: IntoIterator<Item = StateKey>>(&mut self, iter: I) {
        for key in iter {
            self.insert(key);
        }
    }
}

impl FromIterator<StateKey> for StateKeySet {
    fn from_iter<I: IntoIterator<Item = StateKey>>(iter: I) -> Self {
        let mut set = Self::new();
        set.extend(iter);
        set
    }
}
