//! The type-erased stack engine.
//!
//! An [`ErasedStack`] owns one contiguous buffer of fixed-size slots. Slots
//! `0..len()` hold live elements; slot `len() - 1` is the top of the stack.
//! When a push finds the buffer full, the stack's [`GrowthPolicy`] decides the
//! new capacity, a new buffer is allocated, the live elements are copied over,
//! and only then is the old buffer released.
//!
//! Every operation comes in two flavors: a raw-byte form, which checks only
//! the size of the supplied slice, and a `*_as` form, which additionally
//! checks a [`TypeHandle`] against the element type the stack was built with.
//!
//! Every successful mutation advances the stack's [epoch](ErasedStack::epoch).
//! Borrowed views such as [`top`](ErasedStack::top) are already tied to the
//! stack by the borrow checker; a [`TopToken`] is the detached equivalent and
//! is rejected once the epoch has moved on.

use crate::array::ElementArray;
use crate::error::{Error, Result};
use crate::growth::{Growth, GrowthPolicy};
use crate::options::StackOptions;
use crate::storage::RawBuffer;
use crate::type_handle::{ElementType, TypeGuard, TypeHandle};

use core::fmt::{self, Debug, Formatter};
use core::iter::Rev;
use core::slice::ChunksExact;
use core::sync::atomic::{AtomicUsize, Ordering};

use tracing::{debug, trace};

/// A growable LIFO stack of fixed-size, type-erased elements.
///
/// See the [module-level documentation](crate::stack) for more.
pub struct ErasedStack {
    buf: RawBuffer,
    len: usize,
    guard: TypeGuard,
    policy: GrowthPolicy,
    id: usize,
    epoch: u64,
}

fn next_stack_id() -> usize {
    static NEXT_ID: AtomicUsize = AtomicUsize::new(1);
    NEXT_ID.fetch_add(1, Ordering::Relaxed)
}

/// A detached reference to the top element, valid until the next mutation
/// of the stack that issued it.
///
/// Obtained from [`ErasedStack::top_token`], resolved with
/// [`ErasedStack::resolve`]. Any other stack, clones included, rejects it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TopToken {
    stack: usize,
    index: usize,
    epoch: u64,
}

impl TopToken {
    /// Returns the epoch the token was issued in.
    #[inline]
    pub fn epoch(&self) -> u64 {
        self.epoch
    }
}

/// Iterator over element slots, top first.
pub type Iter<'a> = Rev<ChunksExact<'a, u8>>;

impl ErasedStack {
    /// Constructs an empty, untyped stack for elements of `element_size` bytes.
    ///
    /// Returns [`Error::InvalidArgument`] if `element_size` is zero.
    ///
    /// # Examples
    /// ```
    /// let stack = bytestack::ErasedStack::new(12).unwrap();
    /// assert_eq!(stack.element_size(), 12);
    /// assert_eq!(stack.capacity(), 0);
    /// assert!(stack.type_handle().is_none());
    /// ```
    pub fn new(element_size: usize) -> Result<Self> {
        Self::with_options(element_size, &StackOptions::new())
    }

    /// Constructs an untyped stack with `capacity` slots allocated up front.
    pub fn with_capacity(element_size: usize, capacity: usize) -> Result<Self> {
        Self::with_options(element_size, &StackOptions::new().capacity(capacity))
    }

    /// Constructs an untyped stack from explicit options.
    pub fn with_options(element_size: usize, options: &StackOptions) -> Result<Self> {
        Self::from_element_type(ElementType::Untyped { size: element_size }, options)
    }

    /// Constructs an empty stack whose elements are of the type `handle`
    /// identifies.
    ///
    /// # Examples
    /// ```
    /// use bytestack::{ErasedStack, TypeHandle};
    ///
    /// let stack = ErasedStack::with_type(TypeHandle::of::<u64>()).unwrap();
    /// assert_eq!(stack.element_size(), 8);
    /// assert_eq!(stack.type_handle(), Some(TypeHandle::of::<u64>()));
    /// ```
    pub fn with_type(handle: TypeHandle) -> Result<Self> {
        Self::from_element_type(handle.into(), &StackOptions::new())
    }

    /// Constructs a typed stack with `capacity` slots allocated up front.
    pub fn with_type_and_capacity(handle: TypeHandle, capacity: usize) -> Result<Self> {
        Self::from_element_type(handle.into(), &StackOptions::new().capacity(capacity))
    }

    /// Constructs a typed stack from explicit options.
    pub fn with_type_and_options(handle: TypeHandle, options: &StackOptions) -> Result<Self> {
        Self::from_element_type(handle.into(), options)
    }

    /// Constructs a stack for `element` from explicit options.
    pub fn from_element_type(element: ElementType, options: &StackOptions) -> Result<Self> {
        let guard = TypeGuard::new(element)?;
        let layout = options.resolve(element)?;
        let buf = RawBuffer::try_with_capacity(layout, options.initial_capacity())?;

        trace!(
            element_size = layout.size(),
            alignment = layout.align(),
            capacity = buf.capacity(),
            "stack created"
        );

        Ok(ErasedStack {
            buf,
            len: 0,
            guard,
            policy: options.policy(),
            id: next_stack_id(),
            epoch: 0,
        })
    }

    /// Reconstructs a stack from a snapshot taken by [`to_array`](Self::to_array).
    ///
    /// The new stack has the same element type, alignment and top-to-bottom
    /// order as the snapshot, and exactly as many slots as it has elements.
    ///
    /// # Examples
    /// ```
    /// use bytestack::ErasedStack;
    ///
    /// let mut stack = ErasedStack::new(1)?;
    /// stack.push(&[1])?;
    /// stack.push(&[2])?;
    ///
    /// let copy = ErasedStack::from_array(&stack.to_array(1)?)?;
    /// assert!(copy.iter().eq(stack.iter()));
    /// # Ok::<(), bytestack::Error>(())
    /// ```
    pub fn from_array(array: &ElementArray) -> Result<Self> {
        let options = StackOptions::new()
            .capacity(array.len())
            .alignment(array.alignment());
        Self::from_array_with(array, &options)
    }

    /// Reconstructs a stack from a snapshot using explicit options.
    pub fn from_array_with(array: &ElementArray, options: &StackOptions) -> Result<Self> {
        let element = match array.type_handle() {
            Some(handle) => ElementType::Typed(handle),
            None => ElementType::Untyped {
                size: array.element_size(),
            },
        };

        let mut stack = Self::from_element_type(element, options)?;
        if array.len() > stack.capacity() {
            stack.reserve(array.len())?;
        }
        for slot in array.iter().rev() {
            stack.push_checked(None, slot)?;
        }
        Ok(stack)
    }

    /// Creates an independent copy of the stack, including its spare capacity.
    pub fn try_clone(&self) -> Result<Self> {
        Ok(ErasedStack {
            buf: self.buf.try_relocate(self.buf.capacity(), self.len)?,
            len: self.len,
            guard: self.guard,
            policy: self.policy,
            id: next_stack_id(),
            epoch: 0,
        })
    }

    /// Releases the stack and its buffer.
    ///
    /// Equivalent to dropping it; provided for callers that want the release
    /// to be explicit.
    #[inline]
    pub fn dispose(self) {}

    /// Returns the size of one element in bytes.
    #[inline]
    pub fn element_size(&self) -> usize {
        self.guard.element_size()
    }

    /// Returns the alignment of the buffer in bytes.
    #[inline]
    pub fn alignment(&self) -> usize {
        self.buf.layout().align()
    }

    /// Returns the element type handle, or [`None`] for untyped stacks.
    #[inline]
    pub fn type_handle(&self) -> Option<TypeHandle> {
        self.guard.handle()
    }

    /// Returns the capacity ceiling, if any.
    #[inline]
    pub fn max_capacity(&self) -> Option<usize> {
        self.policy.max_capacity()
    }

    /// Returns the growth strategy.
    #[inline]
    pub fn growth(&self) -> Growth {
        self.policy.growth()
    }

    /// Returns the number of elements the stack can hold without reallocating.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.buf.capacity()
    }

    /// Returns the number of elements in the stack.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if the stack contains no elements.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns `true` if the stack has reached its capacity ceiling.
    /// Always `false` for unbounded stacks.
    #[inline]
    pub fn is_full(&self) -> bool {
        self.policy.max_capacity() == Some(self.len)
    }

    /// Returns the current epoch, which advances with every successful
    /// mutation.
    #[inline]
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    #[inline]
    fn bump(&mut self) {
        self.epoch = self.epoch.wrapping_add(1);
    }

    fn relocate(&mut self, new_capacity: usize) -> Result<()> {
        let buf = self.buf.try_relocate(new_capacity, self.len)?;
        trace!(from = self.buf.capacity(), to = new_capacity, "stack buffer relocated");
        self.buf = buf; // drops previous buffer
        self.bump();
        Ok(())
    }

    fn grow_to_fit(&mut self, required: usize) -> Result<()> {
        match self.policy.next_capacity(self.buf.capacity(), required) {
            Some(cap) if cap == self.buf.capacity() => Ok(()),
            Some(cap) => self.relocate(cap),
            None => {
                debug!(
                    required,
                    capacity = self.buf.capacity(),
                    max_capacity = ?self.policy.max_capacity(),
                    "stack growth refused"
                );
                Err(Error::CapacityExceeded {
                    requested: required,
                    count: self.len,
                    max_capacity: self.policy.max_capacity(),
                })
            }
        }
    }

    /// Sets the capacity to exactly `capacity` slots, shrinking or growing
    /// the buffer.
    ///
    /// Returns [`Error::CapacityExceeded`] if `capacity` is smaller than
    /// [`len`](Self::len) or larger than the ceiling.
    ///
    /// # Examples
    /// ```
    /// let mut stack = bytestack::ErasedStack::new(2)?;
    /// stack.push(&[1, 2])?;
    /// stack.set_capacity(10)?;
    /// assert_eq!(stack.capacity(), 10);
    /// assert!(stack.set_capacity(0).is_err());
    /// # Ok::<(), bytestack::Error>(())
    /// ```
    pub fn set_capacity(&mut self, capacity: usize) -> Result<()> {
        if let Err(e) = self.policy.check_explicit(capacity, self.len) {
            debug!(requested = capacity, count = self.len, "capacity change refused");
            return Err(e);
        }
        if capacity == self.buf.capacity() {
            return Ok(());
        }
        self.relocate(capacity)
    }

    /// Shrinks the capacity to the number of elements held.
    pub fn shrink_to_fit(&mut self) -> Result<()> {
        self.set_capacity(self.len)
    }

    /// Grows the buffer through the growth policy so that `additional` more
    /// elements fit without further reallocation.
    pub fn reserve(&mut self, additional: usize) -> Result<()> {
        let required = self.len.checked_add(additional).ok_or(Error::CapacityExceeded {
            requested: usize::MAX,
            count: self.len,
            max_capacity: self.policy.max_capacity(),
        })?;
        self.grow_to_fit(required)
    }

    fn push_checked(&mut self, handle: Option<TypeHandle>, value: &[u8]) -> Result<()> {
        if value.is_empty() {
            return Err(Error::InvalidArgument("value buffer is empty"));
        }
        self.guard.check(handle, Some(value.len()))?;

        let len = self.len;
        if len == self.buf.capacity() {
            self.grow_to_fit(len + 1)?;
        }

        self.buf.slot_mut(len).copy_from_slice(value);
        self.len = len + 1;
        self.bump();
        Ok(())
    }

    /// Copies `value` onto the top of the stack, growing the buffer if
    /// necessary.
    ///
    /// # Errors
    /// * [`Error::InvalidArgument`] if `value` is empty,
    /// * [`Error::SizeMismatch`] if `value.len()` is not the element size,
    /// * [`Error::CapacityExceeded`] if the growth policy cannot make room,
    /// * [`Error::AllocationFailure`] if the new buffer cannot be allocated.
    #[inline]
    pub fn push(&mut self, value: &[u8]) -> Result<()> {
        self.push_checked(None, value)
    }

    /// Like [`push`](Self::push), but also fails with [`Error::TypeMismatch`]
    /// unless `handle` is the stack's element type.
    #[inline]
    pub fn push_as(&mut self, handle: TypeHandle, value: &[u8]) -> Result<()> {
        self.push_checked(Some(handle), value)
    }

    fn peek_checked(&self, handle: Option<TypeHandle>, out: &mut [u8]) -> Result<()> {
        if out.is_empty() {
            return Err(Error::InvalidArgument("output buffer is empty"));
        }
        self.guard.check(handle, Some(out.len()))?;
        if self.len == 0 {
            return Err(Error::EmptyContainer);
        }

        out.copy_from_slice(self.buf.slot(self.len - 1));
        Ok(())
    }

    /// Removes the top element, copying it into `out`.
    ///
    /// # Errors
    /// * [`Error::InvalidArgument`] if `out` is empty,
    /// * [`Error::SizeMismatch`] if `out.len()` is not the element size,
    /// * [`Error::EmptyContainer`] if there is nothing to pop.
    ///
    /// # Examples
    /// ```
    /// let mut stack = bytestack::ErasedStack::new(2)?;
    /// stack.push(&[1, 2])?;
    /// stack.push(&[3, 4])?;
    ///
    /// let mut out = [0; 2];
    /// stack.pop(&mut out)?;
    /// assert_eq!(out, [3, 4]);
    /// stack.pop(&mut out)?;
    /// assert_eq!(out, [1, 2]);
    /// assert_eq!(stack.pop(&mut out), Err(bytestack::Error::EmptyContainer));
    /// # Ok::<(), bytestack::Error>(())
    /// ```
    pub fn pop(&mut self, out: &mut [u8]) -> Result<()> {
        self.peek_checked(None, out)?;
        self.len -= 1;
        self.bump();
        Ok(())
    }

    /// Like [`pop`](Self::pop), but also fails with [`Error::TypeMismatch`]
    /// unless `handle` is the stack's element type.
    pub fn pop_as(&mut self, handle: TypeHandle, out: &mut [u8]) -> Result<()> {
        self.peek_checked(Some(handle), out)?;
        self.len -= 1;
        self.bump();
        Ok(())
    }

    /// Copies the top element into `out` without removing it.
    ///
    /// Fails under the same conditions as [`pop`](Self::pop).
    #[inline]
    pub fn peek(&self, out: &mut [u8]) -> Result<()> {
        self.peek_checked(None, out)
    }

    /// Like [`peek`](Self::peek), but also fails with [`Error::TypeMismatch`]
    /// unless `handle` is the stack's element type.
    #[inline]
    pub fn peek_as(&self, handle: TypeHandle, out: &mut [u8]) -> Result<()> {
        self.peek_checked(Some(handle), out)
    }

    fn top_index(&self, handle: Option<TypeHandle>, size: Option<usize>) -> Result<usize> {
        if size == Some(0) {
            return Err(Error::InvalidArgument("element size must be non-zero"));
        }
        self.guard.check(handle, size)?;
        if self.len == 0 {
            return Err(Error::EmptyContainer);
        }
        Ok(self.len - 1)
    }

    /// Returns a view of the top element's bytes in place.
    ///
    /// `element_size` must equal the stack's element size. The view borrows
    /// the stack, so it cannot outlive the next mutating call.
    ///
    /// # Examples
    /// ```
    /// let mut stack = bytestack::ErasedStack::new(3)?;
    /// stack.push(&[7, 8, 9])?;
    /// assert_eq!(stack.top(3)?, &[7, 8, 9]);
    /// assert!(stack.top(4).is_err());
    /// # Ok::<(), bytestack::Error>(())
    /// ```
    pub fn top(&self, element_size: usize) -> Result<&[u8]> {
        let index = self.top_index(None, Some(element_size))?;
        Ok(self.buf.slot(index))
    }

    /// Returns a view of the top element checked against `handle`.
    pub fn top_as(&self, handle: TypeHandle) -> Result<&[u8]> {
        let index = self.top_index(Some(handle), None)?;
        Ok(self.buf.slot(index))
    }

    /// Returns a mutable view of the top element's bytes in place.
    ///
    /// Writing through the view does not change the epoch.
    pub fn top_mut(&mut self, element_size: usize) -> Result<&mut [u8]> {
        let index = self.top_index(None, Some(element_size))?;
        Ok(self.buf.slot_mut(index))
    }

    /// Returns a mutable view of the top element checked against `handle`.
    pub fn top_mut_as(&mut self, handle: TypeHandle) -> Result<&mut [u8]> {
        let index = self.top_index(Some(handle), None)?;
        Ok(self.buf.slot_mut(index))
    }

    /// Returns a token for the current top element that can be resolved
    /// later, as long as the stack has not been mutated in between.
    ///
    /// # Examples
    /// ```
    /// use bytestack::{ErasedStack, Error};
    ///
    /// let mut stack = ErasedStack::new(1)?;
    /// stack.push(&[1])?;
    /// let token = stack.top_token()?;
    /// assert_eq!(stack.resolve(token)?, &[1]);
    ///
    /// stack.push(&[2])?;
    /// assert_eq!(stack.resolve(token), Err(Error::StaleReference));
    /// # Ok::<(), Error>(())
    /// ```
    pub fn top_token(&self) -> Result<TopToken> {
        let index = self.top_index(None, None)?;
        Ok(TopToken {
            stack: self.id,
            index,
            epoch: self.epoch,
        })
    }

    #[inline]
    fn validate(&self, token: TopToken) -> Result<usize> {
        if token.stack != self.id || token.epoch != self.epoch || token.index >= self.len {
            return Err(Error::StaleReference);
        }
        Ok(token.index)
    }

    /// Returns the element a [`TopToken`] refers to, or
    /// [`Error::StaleReference`] if the token was issued by another stack or
    /// this stack was mutated since.
    pub fn resolve(&self, token: TopToken) -> Result<&[u8]> {
        let index = self.validate(token)?;
        Ok(self.buf.slot(index))
    }

    /// Mutable counterpart of [`resolve`](Self::resolve).
    pub fn resolve_mut(&mut self, token: TopToken) -> Result<&mut [u8]> {
        let index = self.validate(token)?;
        Ok(self.buf.slot_mut(index))
    }

    fn contains_checked(&self, handle: Option<TypeHandle>, value: &[u8]) -> Result<bool> {
        if value.is_empty() {
            return Err(Error::InvalidArgument("value buffer is empty"));
        }
        self.guard.check(handle, Some(value.len()))?;
        Ok(self.iter().any(|slot| slot == value))
    }

    /// Returns `true` if some element is byte-for-byte equal to `value`.
    ///
    /// # Examples
    /// ```
    /// let mut stack = bytestack::ErasedStack::new(2)?;
    /// stack.push(&[1, 2])?;
    /// assert!(stack.contains(&[1, 2])?);
    /// assert!(!stack.contains(&[2, 1])?);
    /// assert!(stack.contains(&[1]).is_err());
    /// # Ok::<(), bytestack::Error>(())
    /// ```
    #[inline]
    pub fn contains(&self, value: &[u8]) -> Result<bool> {
        self.contains_checked(None, value)
    }

    /// Like [`contains`](Self::contains), but also fails with
    /// [`Error::TypeMismatch`] unless `handle` is the stack's element type.
    #[inline]
    pub fn contains_as(&self, handle: TypeHandle, value: &[u8]) -> Result<bool> {
        self.contains_checked(Some(handle), value)
    }

    /// Removes all elements. The buffer is kept.
    #[inline]
    pub fn clear(&mut self) {
        self.len = 0;
        self.bump();
    }

    /// Returns an iterator over the elements' bytes, from the top down.
    #[inline]
    pub fn iter(&self) -> Iter<'_> {
        self.buf
            .prefix(self.len)
            .chunks_exact(self.guard.element_size())
            .rev()
    }

    fn copy_to_checked(
        &self,
        handle: Option<TypeHandle>,
        out: &mut [u8],
        max_elements: usize,
    ) -> Result<usize> {
        self.guard.check(handle, None)?;

        let size = self.guard.element_size();
        let count = self.len.min(max_elements);
        let required = count * size;
        if out.len() < required {
            return Err(Error::BufferTooSmall {
                required,
                available: out.len(),
            });
        }

        for (dst, src) in out.chunks_exact_mut(size).zip(self.iter().take(count)) {
            dst.copy_from_slice(src);
        }
        Ok(count)
    }

    /// Copies up to `max_elements` elements into `out`, top first, and
    /// returns the number copied.
    ///
    /// Returns [`Error::BufferTooSmall`] rather than copying a truncated
    /// subset if `out` cannot hold `min(len(), max_elements)` elements.
    ///
    /// # Examples
    /// ```
    /// let mut stack = bytestack::ErasedStack::new(1)?;
    /// for b in 1..=3 {
    ///     stack.push(&[b])?;
    /// }
    ///
    /// let mut out = [0; 4];
    /// assert_eq!(stack.copy_to(&mut out, 4)?, 3);
    /// assert_eq!(out, [3, 2, 1, 0]);
    /// assert_eq!(stack.copy_to(&mut out, 2)?, 2);
    /// assert!(stack.copy_to(&mut out[..1], 2).is_err());
    /// # Ok::<(), bytestack::Error>(())
    /// ```
    #[inline]
    pub fn copy_to(&self, out: &mut [u8], max_elements: usize) -> Result<usize> {
        self.copy_to_checked(None, out, max_elements)
    }

    /// Like [`copy_to`](Self::copy_to), but also fails with
    /// [`Error::TypeMismatch`] unless `handle` is the stack's element type.
    #[inline]
    pub fn copy_to_as(&self, handle: TypeHandle, out: &mut [u8], max_elements: usize) -> Result<usize> {
        self.copy_to_checked(Some(handle), out, max_elements)
    }

    /// Copies all elements into a newly allocated [`ElementArray`], top
    /// first. The caller owns the result.
    ///
    /// `element_size` must equal the stack's element size.
    ///
    /// # Examples
    /// ```
    /// let mut stack = bytestack::ErasedStack::new(2)?;
    /// stack.push(&[1, 2])?;
    /// assert_eq!(stack.to_array(2)?.as_bytes(), &[1, 2]);
    /// assert!(stack.to_array(4).is_err());
    /// # Ok::<(), bytestack::Error>(())
    /// ```
    pub fn to_array(&self, element_size: usize) -> Result<ElementArray> {
        if element_size == 0 {
            return Err(Error::InvalidArgument("element size must be non-zero"));
        }
        self.guard.check(None, Some(element_size))?;
        ElementArray::from_stack(self)
    }

    /// Like [`to_array`](Self::to_array), but also fails with
    /// [`Error::TypeMismatch`] unless `handle` is the stack's element type.
    pub fn to_array_as(&self, handle: TypeHandle) -> Result<ElementArray> {
        self.guard.check(Some(handle), None)?;
        ElementArray::from_stack(self)
    }

    pub(crate) fn raw_buffer(&self) -> &RawBuffer {
        &self.buf
    }
}

impl Debug for ErasedStack {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErasedStack")
            .field("element_type", &self.guard.handle())
            .field("element_size", &self.guard.element_size())
            .field("len", &self.len)
            .field("capacity", &self.buf.capacity())
            .field("epoch", &self.epoch)
            .finish()
    }
}

impl<'a> IntoIterator for &'a ErasedStack {
    type Item = &'a [u8];
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;
    use alloc::vec::Vec;

    fn word(x: u32) -> [u8; 4] {
        x.to_ne_bytes()
    }

    fn pop_word(stack: &mut ErasedStack) -> Result<u32> {
        let mut out = [0u8; 4];
        stack.pop(&mut out)?;
        Ok(u32::from_ne_bytes(out))
    }

    #[test]
    fn bounded_delta_growth_scenario() {
        let options = StackOptions::new().capacity(2).max_capacity(4).growth_delta(2);
        let mut stack = ErasedStack::with_options(4, &options).unwrap();
        assert_eq!(stack.capacity(), 2);

        stack.push(&word(1)).unwrap();
        stack.push(&word(2)).unwrap();
        assert_eq!(stack.capacity(), 2);
        stack.push(&word(3)).unwrap();
        assert_eq!(stack.capacity(), 4);
        stack.push(&word(4)).unwrap();
        assert_eq!(stack.len(), 4);
        assert!(stack.is_full());

        let epoch = stack.epoch();
        assert_eq!(
            stack.push(&word(5)),
            Err(Error::CapacityExceeded {
                requested: 5,
                count: 4,
                max_capacity: Some(4)
            })
        );
        assert_eq!(stack.len(), 4);
        assert_eq!(stack.epoch(), epoch);

        assert_eq!(pop_word(&mut stack), Ok(4));
        assert_eq!(pop_word(&mut stack), Ok(3));
        assert_eq!(stack.len(), 2);
    }

    #[test]
    fn delta_growth_fills_up_to_an_uneven_ceiling() {
        let options = StackOptions::new().max_capacity(5).growth_delta(2);
        let mut stack = ErasedStack::with_options(4, &options).unwrap();

        let mut pushed = 0;
        while stack.push(&word(pushed)).is_ok() {
            pushed += 1;
        }
        assert_eq!(pushed, 5);
        assert_eq!(stack.len(), 5);
        assert_eq!(stack.capacity(), 5);
        assert!(stack.is_full());

        let epoch = stack.epoch();
        assert_eq!(
            stack.push(&word(5)),
            Err(Error::CapacityExceeded {
                requested: 6,
                count: 5,
                max_capacity: Some(5)
            })
        );
        assert_eq!(stack.epoch(), epoch);
        assert_eq!(pop_word(&mut stack), Ok(4));
    }

    #[test]
    fn zero_sizes_are_invalid_arguments() {
        let mut stack = ErasedStack::new(4).unwrap();
        stack.push(&word(1)).unwrap();

        let invalid = Error::InvalidArgument("element size must be non-zero");
        assert_eq!(stack.top(0), Err(invalid));
        assert_eq!(stack.top_mut(0), Err(invalid));
        assert_eq!(stack.to_array(0).unwrap_err(), invalid);
        assert_eq!(
            stack.to_array(3).unwrap_err(),
            Error::SizeMismatch { expected: 4, found: 3 }
        );
        assert_eq!(stack.to_array(4).unwrap().as_bytes(), &word(1));
    }

    #[test]
    fn pops_reverse_pushes() {
        let mut stack = ErasedStack::new(4).unwrap();
        for i in 0..100 {
            stack.push(&word(i)).unwrap();
        }
        for i in (0..100).rev() {
            assert_eq!(pop_word(&mut stack), Ok(i));
        }
        assert_eq!(pop_word(&mut stack), Err(Error::EmptyContainer));
    }

    #[test]
    fn exact_growth_allocates_one_slot_at_a_time() {
        let options = StackOptions::new().growth_delta(0);
        let mut stack = ErasedStack::with_options(2, &options).unwrap();
        for i in 1..=5 {
            stack.push(&[i, i]).unwrap();
            assert_eq!(stack.capacity(), usize::from(i));
        }
    }

    #[test]
    fn size_checks_do_not_mutate() {
        let mut stack = ErasedStack::with_capacity(4, 1).unwrap();
        stack.push(&word(9)).unwrap();
        let epoch = stack.epoch();

        assert_eq!(
            stack.push(&[1, 2, 3]),
            Err(Error::SizeMismatch { expected: 4, found: 3 })
        );
        assert_eq!(
            stack.push(&[]),
            Err(Error::InvalidArgument("value buffer is empty"))
        );
        let mut short = [0u8; 2];
        assert_eq!(
            stack.pop(&mut short),
            Err(Error::SizeMismatch { expected: 4, found: 2 })
        );
        assert_eq!(stack.pop(&mut []), Err(Error::InvalidArgument("output buffer is empty")));

        assert_eq!(stack.len(), 1);
        assert_eq!(stack.capacity(), 1);
        assert_eq!(stack.epoch(), epoch);
        assert_eq!(stack.top(4), Ok(&word(9)[..]));
    }

    #[test]
    fn type_guard_rejects_foreign_handles() {
        let u32_handle = TypeHandle::of::<u32>();
        let f32_handle = TypeHandle::of::<f32>();
        let mut stack = ErasedStack::with_type(u32_handle).unwrap();
        stack.push_as(u32_handle, &word(7)).unwrap();
        let epoch = stack.epoch();

        let mut out = [0u8; 4];
        let mismatch = Err(Error::TypeMismatch {
            expected: "u32",
            found: "f32",
        });
        assert_eq!(stack.push_as(f32_handle, &word(1)), mismatch);
        assert_eq!(stack.pop_as(f32_handle, &mut out), mismatch);
        assert_eq!(stack.peek_as(f32_handle, &mut out), mismatch);
        assert_eq!(stack.contains_as(f32_handle, &word(7)), mismatch.map(|()| true));
        assert!(stack.top_as(f32_handle).is_err());
        assert!(stack.top_mut_as(f32_handle).is_err());
        assert!(stack.copy_to_as(f32_handle, &mut out, 1).is_err());
        assert!(stack.to_array_as(f32_handle).is_err());

        assert_eq!(stack.len(), 1);
        assert_eq!(stack.epoch(), epoch);

        // raw-byte calls skip the identity check
        stack.peek(&mut out).unwrap();
        assert_eq!(out, word(7));
        stack.pop_as(u32_handle, &mut out).unwrap();
        assert!(stack.is_empty());
    }

    #[test]
    fn untyped_stack_rejects_typed_calls() {
        let mut stack = ErasedStack::new(4).unwrap();
        assert!(matches!(
            stack.push_as(TypeHandle::of::<u32>(), &word(1)),
            Err(Error::TypeMismatch { expected: "<untyped>", .. })
        ));
        assert!(stack.is_empty());
    }

    #[test]
    fn peek_and_top_leave_the_stack_alone() {
        let mut stack = ErasedStack::new(4).unwrap();
        let mut out = [0u8; 4];
        assert_eq!(stack.peek(&mut out), Err(Error::EmptyContainer));
        assert_eq!(stack.top(4), Err(Error::EmptyContainer));
        assert_eq!(stack.top_token(), Err(Error::EmptyContainer));

        stack.push(&word(1)).unwrap();
        stack.push(&word(2)).unwrap();
        let epoch = stack.epoch();
        stack.peek(&mut out).unwrap();
        assert_eq!(out, word(2));
        assert_eq!(stack.top(4).unwrap(), &word(2));
        assert_eq!(stack.len(), 2);
        assert_eq!(stack.epoch(), epoch);
    }

    #[test]
    fn top_mut_writes_in_place() {
        let mut stack = ErasedStack::new(4).unwrap();
        stack.push(&word(1)).unwrap();
        stack.top_mut(4).unwrap().copy_from_slice(&word(42));
        assert_eq!(pop_word(&mut stack), Ok(42));
    }

    #[test]
    fn tokens_expire_on_any_mutation() {
        let mut stack = ErasedStack::new(4).unwrap();
        stack.push(&word(1)).unwrap();

        let token = stack.top_token().unwrap();
        stack.resolve_mut(token).unwrap().copy_from_slice(&word(5));
        assert_eq!(stack.resolve(token).unwrap(), &word(5));

        stack.clear();
        assert_eq!(stack.resolve(token), Err(Error::StaleReference));

        stack.push(&word(1)).unwrap();
        let token = stack.top_token().unwrap();
        stack.set_capacity(32).unwrap();
        assert_eq!(stack.resolve(token), Err(Error::StaleReference));

        let token = stack.top_token().unwrap();
        let mut out = [0u8; 4];
        stack.pop(&mut out).unwrap();
        assert_eq!(stack.resolve_mut(token), Err(Error::StaleReference));
    }

    #[test]
    fn tokens_are_bound_to_the_issuing_stack() {
        let mut stack = ErasedStack::new(4).unwrap();
        stack.push(&word(1)).unwrap();
        let copy = stack.try_clone().unwrap();
        let mut other = ErasedStack::new(4).unwrap();
        other.push(&word(2)).unwrap();

        let token = stack.top_token().unwrap();
        assert_eq!(copy.resolve(token), Err(Error::StaleReference));
        assert_eq!(other.epoch(), stack.epoch());
        assert_eq!(other.resolve_mut(token), Err(Error::StaleReference));
        assert_eq!(stack.resolve(token).unwrap(), &word(1));

        let token = copy.top_token().unwrap();
        assert_eq!(stack.resolve(token), Err(Error::StaleReference));
        assert_eq!(copy.resolve(token).unwrap(), &word(1));
    }

    #[test]
    fn failed_operations_do_not_expire_tokens() {
        let options = StackOptions::new().max_capacity(1);
        let mut stack = ErasedStack::with_options(4, &options).unwrap();
        stack.push(&word(1)).unwrap();

        let token = stack.top_token().unwrap();
        assert!(stack.push(&word(2)).is_err());
        assert!(stack.set_capacity(2).is_err());
        assert_eq!(stack.resolve(token).unwrap(), &word(1));
    }

    #[test]
    fn contains_compares_bytes() {
        let mut stack = ErasedStack::new(4).unwrap();
        assert_eq!(stack.contains(&word(1)), Ok(false));
        for i in 0..10 {
            stack.push(&word(i)).unwrap();
        }
        assert_eq!(stack.contains(&word(0)), Ok(true));
        assert_eq!(stack.contains(&word(9)), Ok(true));
        assert_eq!(stack.contains(&word(10)), Ok(false));

        let mut out = [0u8; 4];
        stack.pop(&mut out).unwrap();
        // popped slots are no longer live, even though their bytes remain
        assert_eq!(stack.contains(&word(9)), Ok(false));
    }

    #[test]
    fn clear_keeps_capacity_and_is_idempotent() {
        let mut stack = ErasedStack::new(4).unwrap();
        for i in 0..5 {
            stack.push(&word(i)).unwrap();
        }
        let capacity = stack.capacity();

        stack.clear();
        assert_eq!(stack.len(), 0);
        stack.clear();
        assert_eq!(stack.len(), 0);
        assert_eq!(stack.capacity(), capacity);
    }

    #[test]
    fn set_capacity_bounds() {
        let options = StackOptions::new().max_capacity(8);
        let mut stack = ErasedStack::with_options(4, &options).unwrap();
        for i in 0..3 {
            stack.push(&word(i)).unwrap();
        }

        assert_eq!(
            stack.set_capacity(2),
            Err(Error::CapacityExceeded {
                requested: 2,
                count: 3,
                max_capacity: Some(8)
            })
        );
        assert!(stack.set_capacity(9).is_err());

        stack.set_capacity(8).unwrap();
        assert_eq!(stack.capacity(), 8);
        stack.shrink_to_fit().unwrap();
        assert_eq!(stack.capacity(), 3);
        for i in (0..3).rev() {
            assert_eq!(pop_word(&mut stack), Ok(i));
        }
        stack.set_capacity(0).unwrap();
        assert_eq!(stack.capacity(), 0);
    }

    #[test]
    fn reserve_goes_through_the_policy() {
        let options = StackOptions::new().growth_delta(8).max_capacity(16);
        let mut stack = ErasedStack::with_options(1, &options).unwrap();
        stack.reserve(3).unwrap();
        assert_eq!(stack.capacity(), 8);
        stack.reserve(8).unwrap();
        assert_eq!(stack.capacity(), 8);
        stack.reserve(9).unwrap();
        assert_eq!(stack.capacity(), 16);
        assert!(stack.reserve(17).is_err());
        assert!(stack.reserve(usize::MAX).is_err());
    }

    #[test]
    fn copy_to_is_top_first_and_never_truncates() {
        let mut stack = ErasedStack::new(1).unwrap();
        let mut out = [0xFFu8; 3];
        assert_eq!(stack.copy_to(&mut out, 3), Ok(0));
        assert_eq!(stack.copy_to(&mut [], 3), Ok(0));

        for b in 1..=5 {
            stack.push(&[b]).unwrap();
        }
        assert_eq!(stack.copy_to(&mut out, 3), Ok(3));
        assert_eq!(out, [5, 4, 3]);

        assert_eq!(
            stack.copy_to(&mut out, 4),
            Err(Error::BufferTooSmall {
                required: 4,
                available: 3
            })
        );
        assert_eq!(out, [5, 4, 3]);

        let mut big = [0u8; 8];
        assert_eq!(stack.copy_to(&mut big, usize::MAX), Ok(5));
        assert_eq!(&big[..5], &[5, 4, 3, 2, 1]);
    }

    #[test]
    fn array_round_trip_preserves_order() {
        let handle = TypeHandle::of::<u32>();
        let mut stack = ErasedStack::with_type(handle).unwrap();
        for i in 0..6 {
            stack.push_as(handle, &word(i)).unwrap();
        }

        let array = stack.to_array_as(handle).unwrap();
        assert_eq!(array.len(), 6);
        assert_eq!(array.type_handle(), Some(handle));

        let mut copy = ErasedStack::from_array(&array).unwrap();
        assert_eq!(copy.type_handle(), Some(handle));
        assert_eq!(copy.capacity(), 6);
        assert!(copy.iter().eq(stack.iter()));
        for i in (0..6).rev() {
            assert_eq!(pop_word(&mut copy), Ok(i));
        }
    }

    #[test]
    fn try_clone_is_independent() {
        let mut stack = ErasedStack::with_capacity(2, 4).unwrap();
        stack.push(&[1, 1]).unwrap();
        let mut copy = stack.try_clone().unwrap();
        copy.push(&[2, 2]).unwrap();

        assert_eq!(stack.len(), 1);
        assert_eq!(copy.len(), 2);
        assert_eq!(copy.capacity(), 4);
        assert_eq!(stack.top(2).unwrap(), &[1, 1]);
    }

    #[test]
    fn alignment_is_honored_across_growth() {
        let options = StackOptions::new().alignment(64).growth_delta(3);
        let mut stack = ErasedStack::with_options(5, &options).unwrap();
        for i in 0..20u8 {
            stack.push(&[i; 5]).unwrap();
            assert_eq!(stack.raw_buffer().as_bytes().as_ptr() as usize % 64, 0);
        }
        assert_eq!(stack.alignment(), 64);
    }

    #[test]
    fn construction_errors() {
        assert_eq!(
            ErasedStack::new(0).unwrap_err(),
            Error::InvalidArgument("element size must be non-zero")
        );
        assert!(ErasedStack::with_options(4, &StackOptions::new().alignment(7)).is_err());
        assert!(matches!(
            ErasedStack::with_options(4, &StackOptions::new().capacity(9).max_capacity(8)),
            Err(Error::CapacityExceeded { .. })
        ));
        assert_eq!(
            ErasedStack::with_capacity(4, usize::MAX).unwrap_err(),
            Error::AllocationFailure { bytes: usize::MAX }
        );
    }

    #[test]
    fn matches_a_vec_model_under_random_operations() {
        use rand::{rngs::SmallRng, Rng, SeedableRng};

        let mut rng = SmallRng::seed_from_u64(0x5432_1012_3454_3210);
        let options = StackOptions::new().max_capacity(64).growth_delta(4);
        let mut stack = ErasedStack::with_options(4, &options).unwrap();
        let mut model: Vec<u32> = Vec::new();

        for _ in 0..10_000 {
            let epoch = stack.epoch();
            match rng.gen_range(0..10) {
                0..=4 => {
                    let x: u32 = rng.gen();
                    match stack.push(&word(x)) {
                        Ok(()) => model.push(x),
                        Err(e) => {
                            assert!(matches!(e, Error::CapacityExceeded { .. }));
                            assert_eq!(model.len(), 64);
                            assert_eq!(stack.epoch(), epoch);
                        }
                    }
                }
                5..=7 => match pop_word(&mut stack) {
                    Ok(x) => assert_eq!(Some(x), model.pop()),
                    Err(e) => {
                        assert_eq!(e, Error::EmptyContainer);
                        assert!(model.is_empty());
                        assert_eq!(stack.epoch(), epoch);
                    }
                },
                8 => {
                    let x = model.last().copied().unwrap_or_else(|| rng.gen());
                    assert_eq!(stack.contains(&word(x)), Ok(model.contains(&x)));
                }
                _ => {
                    if rng.gen_range(0..20) == 0 {
                        stack.clear();
                        model.clear();
                    }
                }
            }

            assert_eq!(stack.len(), model.len());
            assert!(stack.len() <= stack.capacity());
            assert!(stack.capacity() <= 64);
        }

        let expected: Vec<[u8; 4]> = model.iter().rev().map(|&x| word(x)).collect();
        let actual: Vec<&[u8]> = stack.iter().collect();
        assert_eq!(actual.len(), expected.len());
        for (a, e) in actual.iter().zip(expected.iter()) {
            assert_eq!(a, &&e[..]);
        }

        let mut out = vec![0u8; stack.len() * 4];
        assert_eq!(stack.copy_to(&mut out, usize::MAX), Ok(model.len()));
    }
}
