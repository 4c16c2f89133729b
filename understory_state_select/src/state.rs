// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The animation state capability queried by state expressions.

use alloc::vec::Vec;

use crate::key::StateKey;

/// Read access to a widget's live boolean states.
///
/// Expression evaluation only needs [`is_state_active`](Self::is_state_active);
/// the timing queries are used by animated assets and default to "not
/// animating".
///
/// `()` implements this trait as "no state" (every state inactive), and so
/// does `None::<&S>`, which lets callers without a widget state evaluate
/// selects directly.
pub trait AnimationState {
    /// Returns `true` if the state named by `key` is currently active.
    fn is_state_active(&self, key: StateKey) -> bool;

    /// Returns the time (in the embedder's time unit) since `key` last changed.
    ///
    /// The default reports 0, for implementations that keep no clock.
    fn animation_time(&self, key: StateKey) -> u64 {
        let _ = key;
        0
    }

    /// Returns `true` if a transition of `key` should still be animated.
    fn should_animate_state(&self, key: StateKey) -> bool {
        let _ = key;
        false
    }
}

impl AnimationState for () {
    #[inline]
    fn is_state_active(&self, _key: StateKey) -> bool {
        false
    }
}

impl<S: AnimationState + ?Sized> AnimationState for Option<&S> {
    #[inline]
    fn is_state_active(&self, key: StateKey) -> bool {
        self.is_some_and(|s| s.is_state_active(key))
    }

    #[inline]
    fn animation_time(&self, key: StateKey) -> u64 {
        self.map_or(0, |s| s.animation_time(key))
    }

    #[inline]
    fn should_animate_state(&self, key: StateKey) -> bool {
        self.is_some_and(|s| s.should_animate_state(key))
    }
}

impl<S: AnimationState + ?Sized> AnimationState for &S {
    #[inline]
    fn is_state_active(&self, key: StateKey) -> bool {
        (**self).is_state_active(key)
    }

    #[inline]
    fn animation_time(&self, key: StateKey) -> u64 {
        (**self).animation_time(key)
    }

    #[inline]
    fn should_animate_state(&self, key: StateKey) -> bool {
        (**self).should_animate_state(key)
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
struct Slot {
    active: bool,
    should_animate: bool,
    changed_at: u64,
}

/// A per-widget [`AnimationState`] keyed by [`StateKey`] index.
///
/// Time is supplied by the embedder through [`set_current_time`](Self::set_current_time);
/// each state remembers when it last changed so animated assets can
/// interpolate.
///
/// ```rust
/// use understory_state_select::{AnimationState, AnimationStateSet, StateKeyRegistry};
///
/// let mut keys = StateKeyRegistry::new();
/// let hover = keys.intern("hover");
///
/// let mut state = AnimationStateSet::new();
/// state.set_current_time(100);
/// state.set_state(hover, true);
/// state.set_current_time(150);
///
/// assert!(state.is_state_active(hover));
/// assert_eq!(state.animation_time(hover), 50);
/// assert!(state.should_animate_state(hover));
/// ```
#[derive(Clone, Debug, Default)]
pub struct AnimationStateSet {
    slots: Vec<Slot>,
    now: u64,
}

impl AnimationStateSet {
    /// Creates a state set with every state inactive at time 0.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            slots: Vec::new(),
            now: 0,
        }
    }

    /// Returns the current time.
    #[must_use]
    pub fn current_time(&self) -> u64 {
        self.now
    }

    /// Advances (or rewinds) the clock used for animation times.
    pub fn set_current_time(&mut self, now: u64) {
        self.now = now;
    }

    /// Sets whether `key` is active.
    ///
    /// Only an actual change restarts the animation time and arms
    /// [`should_animate_state`](AnimationState::should_animate_state).
    /// Returns `true` if the value changed.
    pub fn set_state(&mut self, key: StateKey, active: bool) -> bool {
        let now = self.now;
        let slot = self.slot_mut(key);
        if slot.active == active {
            return false;
        }
        slot.active = active;
        slot.changed_at = now;
        slot.should_animate = true;
        true
    }

    /// Restarts the animation time of `key` without changing its value.
    pub fn reset_animation_time(&mut self, key: StateKey) {
        let now = self.now;
        let slot = self.slot_mut(key);
        slot.changed_at = now;
        slot.should_animate = true;
    }

    /// Marks the current transition of `key` as not to be animated.
    pub fn dont_animate(&mut self, key: StateKey) {
        if let Some(slot) = self.slots.get_mut(key.index()) {
            slot.should_animate = false;
        }
    }

    /// Resets every state to inactive, keeping the clock.
    pub fn clear(&mut self) {
        self.slots.clear();
    }

    fn slot_mut(&mut self, key: StateKey) -> &mut Slot {
        if key.index() >= self.slots.len() {
            self.slots.resize(key.index() + 1, Slot::default());
        }
        &mut self.slots[key.index()]
    }
}

impl AnimationState for AnimationStateSet {
    #[inline]
    fn is_state_active(&self, key: StateKey) -> bool {
        self.slots.get(key.index()).is_some_and(|s| s.active)
    }

    /// A state that never changed has held its value since time 0, so it
    /// reports the current time.
    fn animation_time(&self, key: StateKey) -> u64 {
        self.slots
            .get(key.index())
            .map_or(self.now, |s| self.now.saturating_sub(s.changed_at))
    }

    fn should_animate_state(&self, key: StateKey) -> bool {
        self.slots.get(key.index()).is_some_and(|s| s.should_animate)
    }
}
