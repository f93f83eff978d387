// Copyright 2026 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

use std::collections::HashMap;

use crate::datamodel::Category;

/// Issues element and link UIDs.
///
/// UIDs start at 1 so that 0 can serve as a sentinel for uninitialized
/// values, increase monotonically, and are never handed out twice for the
/// lifetime of the manager -- even after the element that held one is
/// deleted or the whole model is reset.
/// Largest UID a caller may [`reserve`](UidManager::reserve).  The half of
/// the range above it is left for [`alloc`](UidManager::alloc).
pub const MAX_RESERVED_UID: i32 = i32::MAX / 2;

#[derive(Clone, Debug)]
pub struct UidManager {
    next: i32,
}

impl UidManager {
    pub fn new() -> Self {
        Self { next: 1 }
    }

    pub fn alloc(&mut self) -> i32 {
        let uid = self.next;
        self.next += 1;
        uid
    }

    /// Claim a UID chosen by the caller (for example one carried over from
    /// an imported model file).  Returns false if the UID could already have
    /// been issued or is above [`MAX_RESERVED_UID`], in which case nothing
    /// changes.  On success `next` is advanced past the claimed UID so
    /// later allocations can't collide.
    pub fn reserve(&mut self, uid: i32) -> bool {
        if uid < self.next || uid > MAX_RESERVED_UID {
            return false;
        }
        self.next = uid + 1;
        true
    }

    /// The most recently issued UID, or 0 if none has been issued.
    pub fn current(&self) -> i32 {
        self.next - 1
    }
}

impl Default for UidManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Generates default element names with a per-category counter:
/// `stock_1`, `stock_2`, `flow_1`, ...
#[derive(Clone, Debug, Default)]
pub struct NameManager {
    counters: HashMap<Category, u32>,
}

impl NameManager {
    pub fn new() -> Self {
        Default::default()
    }

    /// Return the next unused default name for `category`.  Candidates for
    /// which `is_taken` returns true (names a user chose explicitly) are
    /// skipped, consuming their counter value.
    pub fn next_name(&mut self, category: Category, is_taken: impl Fn(&str) -> bool) -> String {
        let counter = self.counters.entry(category).or_insert(0);
        loop {
            *counter += 1;
            let candidate = format!("{}_{}", category.name_prefix(), counter);
            if !is_taken(&candidate) {
                return candidate;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uids_are_monotonic() {
        let mut uids = UidManager::new();
        assert_eq!(0, uids.current());
        assert_eq!(1, uids.alloc());
        assert_eq!(2, uids.alloc());
        assert_eq!(2, uids.current());
    }

    #[test]
    fn reserve_advances_past_claimed_uid() {
        let mut uids = UidManager::new();
        assert!(uids.reserve(10));
        assert_eq!(11, uids.alloc());
        // already issued
        assert!(!uids.reserve(10));
        assert!(!uids.reserve(3));
        assert!(!uids.reserve(0));
        assert_eq!(12, uids.alloc());
    }

    #[test]
    fn reserve_refuses_uids_near_the_top_of_the_range() {
        let mut uids = UidManager::new();
        assert!(!uids.reserve(i32::MAX));
        assert!(!uids.reserve(i32::MAX - 1));
        assert!(!uids.reserve(MAX_RESERVED_UID + 1));
        assert_eq!(0, uids.current());

        assert!(uids.reserve(MAX_RESERVED_UID));
        assert_eq!(MAX_RESERVED_UID + 1, uids.alloc());
        assert_eq!(MAX_RESERVED_UID + 1, uids.current());
    }

    #[test]
    fn default_names_per_category() {
        let mut names = NameManager::new();
        let never = |_: &str| false;
        assert_eq!("stock_1", names.next_name(Category::Stock, never));
        assert_eq!("flow_1", names.next_name(Category::Flow, never));
        assert_eq!("stock_2", names.next_name(Category::Stock, never));
        assert_eq!("variable_1", names.next_name(Category::Auxiliary, never));
        assert_eq!("parameter_1", names.next_name(Category::Parameter, never));
    }

    #[test]
    fn default_names_skip_taken() {
        let mut names = NameManager::new();
        let taken = |name: &str| name == "flow_1" || name == "flow_2";
        assert_eq!("flow_3", names.next_name(Category::Flow, taken));
        assert_eq!("flow_4", names.next_name(Category::Flow, |_| false));
    }
}
