//! Coverage windows: sorted unions of disjoint closed intervals.

use serde::Serialize;

use segfile_record::{ErrorKind, KernelError, Result};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Window {
    intervals: Vec<(f64, f64)>,
}

impl Window {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a window from intervals in any order.
    pub fn from_intervals(intervals: &[(f64, f64)]) -> Result<Self> {
        let mut window = Self::new();
        for &(left, right) in intervals {
            window.insert(left, right)?;
        }
        Ok(window)
    }

    /// Add `[left, right]`, merging with any interval it overlaps or touches.
    pub fn insert(&mut self, left: f64, right: f64) -> Result<()> {
        if left.is_nan() || right.is_nan() || left > right {
            return Err(KernelError::new(
                ErrorKind::InvalidValue,
                format!("interval [{}, {}] is not ordered", left, right),
            ));
        }
        // first interval that ends at or after `left`
        let start = self.intervals.partition_point(|&(_, r)| r < left);
        // one past the last interval that starts at or before `right`
        let end = self.intervals.partition_point(|&(l, _)| l <= right);

        let mut merged = (left, right);
        if start < end {
            merged.0 = merged.0.min(self.intervals[start].0);
            merged.1 = merged.1.max(self.intervals[end - 1].1);
        }
        self.intervals.splice(start..end, std::iter::once(merged));
        Ok(())
    }

    /// Merge every interval of `other` into this window.
    pub fn union_with(&mut self, other: &Window) -> Result<()> {
        for &(left, right) in &other.intervals {
            self.insert(left, right)?;
        }
        Ok(())
    }

    pub fn intervals(&self) -> &[(f64, f64)] {
        &self.intervals
    }

    pub fn len(&self) -> usize {
        self.intervals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }

    pub fn contains(&self, t: f64) -> bool {
        let i = self.intervals.partition_point(|&(_, r)| r < t);
        self.intervals.get(i).is_some_and(|&(l, _)| l <= t)
    }

    /// Total length of all intervals
    pub fn measure(&self) -> f64 {
        self.intervals.iter().map(|(l, r)| r - l).sum()
    }
}
