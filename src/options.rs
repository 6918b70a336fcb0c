//! Construction parameters for stacks.

use crate::error::{Error, Result};
use crate::growth::{Growth, GrowthPolicy};
use crate::storage::ElementLayout;
use crate::type_handle::ElementType;

/// Parameters fixed when a stack is constructed.
///
/// The defaults describe an empty, unbounded stack that doubles its capacity
/// when full and derives its alignment from the element type.
///
/// # Examples
/// ```
/// use bytestack::{Growth, StackOptions};
///
/// let options = StackOptions::new()
///     .capacity(16)
///     .max_capacity(1024)
///     .growth(Growth::Delta(16))
///     .alignment(8);
/// assert_eq!(options.initial_capacity(), 16);
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StackOptions {
    capacity: usize,
    max_capacity: Option<usize>,
    growth: Growth,
    alignment: Option<usize>,
}

impl StackOptions {
    /// Returns the default options.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the number of slots allocated up front.
    #[inline]
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Sets the capacity ceiling.
    #[inline]
    pub fn max_capacity(mut self, max_capacity: usize) -> Self {
        self.max_capacity = Some(max_capacity);
        self
    }

    /// Sets the growth strategy.
    #[inline]
    pub fn growth(mut self, growth: Growth) -> Self {
        self.growth = growth;
        self
    }

    /// Grows in steps of `delta` slots, or exactly as needed if `delta` is zero.
    #[inline]
    pub fn growth_delta(mut self, delta: usize) -> Self {
        self.growth = Growth::from_delta(delta);
        self
    }

    /// Sets the alignment of the buffer in bytes. Must be a power of two.
    #[inline]
    pub fn alignment(mut self, alignment: usize) -> Self {
        self.alignment = Some(alignment);
        self
    }

    /// Returns the number of slots allocated up front.
    #[inline]
    pub fn initial_capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the configured growth policy.
    #[inline]
    pub fn policy(&self) -> GrowthPolicy {
        GrowthPolicy::new(self.growth, self.max_capacity)
    }

    /// Resolves the slot layout for `element`, validating the alignment and
    /// the initial capacity against the ceiling.
    ///
    /// A typed element is never stored less aligned than its type requires.
    pub(crate) fn resolve(&self, element: ElementType) -> Result<ElementLayout> {
        let size = element.size();
        let align = match (element, self.alignment) {
            (ElementType::Typed(handle), Some(align)) if align.is_power_of_two() => {
                align.max(handle.align())
            }
            (ElementType::Typed(handle), None) => handle.align(),
            (_, Some(align)) => align,
            (ElementType::Untyped { .. }, None) => ElementLayout::natural_alignment(size),
        };
        let layout = ElementLayout::new(size, align)?;

        if let Some(max) = self.max_capacity {
            if self.capacity > max {
                return Err(Error::CapacityExceeded {
                    requested: self.capacity,
                    count: 0,
                    max_capacity: Some(max),
                });
            }
        }

        Ok(layout)
    }
}
