//! The order in which a merge visits word segments
//!
//! Given the destination word list (the sorted union of both inputs) and
//! the two input word lists, [`MergePlan`] yields one [`MergeAction`] per
//! destination word. It touches no postings, so the cursor discipline of a
//! merge can be checked without any files.

use std::cmp::Ordering;

use crate::WordId;
use crate::error::{Error, Result};

/// What to do for one destination word
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeAction {
    /// Both inputs have the word; merge their segments
    MergeBoth { dest: usize, left: usize, right: usize },
    /// Only the left input has the word
    CopyLeft { dest: usize, left: usize },
    /// Only the right input has the word
    CopyRight { dest: usize, right: usize },
}

/// Where the plan is in its walk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanState {
    /// Both inputs have segments left
    Interleave,
    /// Right input exhausted, copying the rest of the left
    DrainLeft,
    /// Left input exhausted, copying the rest of the right
    DrainRight,
    /// All three word lists exhausted together
    Done,
    /// An inconsistency was reported; the plan yields nothing more
    Failed,
}

pub struct MergePlan<'a> {
    dest: &'a [u64],
    left: &'a [u64],
    right: &'a [u64],
    d: usize,
    l: usize,
    r: usize,
    state: PlanState,
}

impl<'a> MergePlan<'a> {
    /// Word lists hold signed word ids as raw words
    pub fn new(dest: &'a [u64], left: &'a [u64], right: &'a [u64]) -> Self {
        let mut plan = Self {
            dest,
            left,
            right,
            d: 0,
            l: 0,
            r: 0,
            state: PlanState::Interleave,
        };
        plan.update_state();
        plan
    }

    pub fn state(&self) -> PlanState {
        self.state
    }

    fn update_state(&mut self) {
        self.state = match (self.l < self.left.len(), self.r < self.right.len()) {
            (true, true) => PlanState::Interleave,
            (true, false) => PlanState::DrainLeft,
            (false, true) => PlanState::DrainRight,
            (false, false) => PlanState::Done,
        };
    }

    fn fail(&mut self, message: String) -> Option<Result<MergeAction>> {
        self.state = PlanState::Failed;
        Some(Err(Error::Corruption(message)))
    }

    fn matches(list: &[u64], index: usize, word: u64) -> bool {
        list.get(index) == Some(&word)
    }
}

impl Iterator for MergePlan<'_> {
    type Item = Result<MergeAction>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.state == PlanState::Failed {
            return None;
        }

        let Some(&word) = self.dest.get(self.d) else {
            if self.state == PlanState::Done {
                return None;
            }
            return self.fail(format!(
                "destination exhausted with {} left and {} right segments remaining",
                self.left.len() - self.l,
                self.right.len() - self.r
            ));
        };

        let in_left = Self::matches(self.left, self.l, word);
        let in_right = Self::matches(self.right, self.r, word);
        let action = match (self.state, in_left, in_right) {
            (PlanState::Interleave, true, true) => MergeAction::MergeBoth {
                dest: self.d,
                left: self.l,
                right: self.r,
            },
            (PlanState::Interleave | PlanState::DrainLeft, true, false) => MergeAction::CopyLeft {
                dest: self.d,
                left: self.l,
            },
            (PlanState::Interleave | PlanState::DrainRight, false, true) => {
                MergeAction::CopyRight {
                    dest: self.d,
                    right: self.r,
                }
            }
            (PlanState::Done, _, _) => {
                return self.fail(format!(
                    "destination has {} words left after both inputs ran out",
                    self.dest.len() - self.d
                ));
            }
            _ => {
                return self.fail(format!(
                    "destination word {} matches neither input (left {:?}, right {:?})",
                    word as WordId,
                    self.left.get(self.l).map(|&w| w as WordId),
                    self.right.get(self.r).map(|&w| w as WordId)
                ));
            }
        };

        match action {
            MergeAction::MergeBoth { .. } => {
                self.l += 1;
                self.r += 1;
            }
            MergeAction::CopyLeft { .. } => self.l += 1,
            MergeAction::CopyRight { .. } => self.r += 1,
        }
        self.d += 1;
        self.update_state();
        Some(Ok(action))
    }
}

/// Number of distinct words in the union of two sorted word lists
pub fn count_union(left: &[u64], right: &[u64]) -> usize {
    let mut count = 0;
    merge_union(left, right, |_| count += 1);
    count
}

/// Visit the sorted union of two sorted word lists
pub fn merge_union<F: FnMut(u64)>(left: &[u64], right: &[u64], mut emit: F) {
    let (mut l, mut r) = (0, 0);
    while l < left.len() && r < right.len() {
        match (left[l] as WordId).cmp(&(right[r] as WordId)) {
            Ordering::Less => {
                emit(left[l]);
                l += 1;
            }
            Ordering::Greater => {
                emit(right[r]);
                r += 1;
            }
            Ordering::Equal => {
                emit(left[l]);
                l += 1;
                r += 1;
            }
        }
    }
    left[l..].iter().for_each(|&w| emit(w));
    right[r..].iter().for_each(|&w| emit(w));
}
