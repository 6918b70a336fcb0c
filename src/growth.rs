//! Capacity growth strategies.

use crate::error::{Error, Result};

/// Smallest non-zero capacity chosen by [`Growth::Double`].
pub const MIN_NON_ZERO_CAPACITY: usize = 4;

/// How a stack enlarges its buffer once it runs out of slots.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Growth {
    /// Grow to exactly the number of slots required, without slack.
    Exact,
    /// Grow in steps of the given number of slots.
    Delta(usize),
    /// Double the capacity, starting from [`MIN_NON_ZERO_CAPACITY`].
    Double,
}

impl Growth {
    /// Converts a growth increment into a strategy; zero means [`Growth::Exact`].
    #[inline]
    pub fn from_delta(delta: usize) -> Self {
        if delta == 0 {
            Growth::Exact
        } else {
            Growth::Delta(delta)
        }
    }
}

impl Default for Growth {
    fn default() -> Self {
        Growth::Double
    }
}

/// A growth strategy combined with an optional capacity ceiling.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GrowthPolicy {
    growth: Growth,
    max_capacity: Option<usize>,
}

impl GrowthPolicy {
    /// Constructs a policy from a strategy and an optional ceiling.
    #[inline]
    pub fn new(growth: Growth, max_capacity: Option<usize>) -> Self {
        GrowthPolicy {
            growth,
            max_capacity,
        }
    }

    /// Returns the growth strategy.
    #[inline]
    pub fn growth(&self) -> Growth {
        self.growth
    }

    /// Returns the capacity ceiling, if any.
    #[inline]
    pub fn max_capacity(&self) -> Option<usize> {
        self.max_capacity
    }

    /// Computes the capacity to grow to so that `required` elements fit,
    /// given the `current` capacity.
    ///
    /// Returns `current` if it already suffices, and [`None`] if `required`
    /// exceeds the ceiling. Otherwise the step chosen by the strategy is
    /// clamped to the ceiling, so a bounded stack can always fill up to its
    /// maximum.
    ///
    /// # Examples
    /// ```
    /// use bytestack::{Growth, GrowthPolicy};
    ///
    /// let policy = GrowthPolicy::new(Growth::Delta(3), None);
    /// assert_eq!(policy.next_capacity(2, 3), Some(5));
    /// assert_eq!(policy.next_capacity(2, 6), Some(8));
    ///
    /// let bounded = GrowthPolicy::new(Growth::Delta(3), Some(4));
    /// assert_eq!(bounded.next_capacity(2, 3), Some(4));
    /// assert_eq!(bounded.next_capacity(4, 5), None);
    /// ```
    pub fn next_capacity(&self, current: usize, required: usize) -> Option<usize> {
        if required <= current {
            return Some(current);
        }

        let limit = self.max_capacity.unwrap_or(usize::MAX);
        if required > limit {
            return None;
        }

        let next = match self.growth {
            Growth::Exact => required,
            Growth::Delta(delta) => {
                let gap = required - current;
                let steps = gap / delta + usize::from(gap % delta != 0);
                current.saturating_add(steps.saturating_mul(delta))
            }
            Growth::Double => current
                .saturating_mul(2)
                .max(required)
                .max(MIN_NON_ZERO_CAPACITY),
        };

        Some(next.min(limit))
    }

    /// Checks an explicitly requested capacity against the live element
    /// `count` and the ceiling.
    pub fn check_explicit(&self, requested: usize, count: usize) -> Result<()> {
        let too_large = self.max_capacity.map_or(false, |max| requested > max);
        if requested < count || too_large {
            return Err(Error::CapacityExceeded {
                requested,
                count,
                max_capacity: self.max_capacity,
            });
        }
        Ok(())
    }
}
