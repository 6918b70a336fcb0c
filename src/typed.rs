//! A statically typed front-end over [`ErasedStack`].
//!
//! [`Stack<T>`] derives the element size and type handle from `T` and
//! forwards every call through the engine's checked `*_as` path, so the
//! runtime type guard is always engaged. `T` must be plain old data
//! ([`bytemuck::Pod`]) since elements are moved in and out as bytes.

use crate::array::ElementArray;
use crate::error::{Error, Result};
use crate::options::StackOptions;
use crate::stack::ErasedStack;
use crate::type_handle::TypeHandle;

use alloc::vec::Vec;
use bytemuck::Pod;
use core::fmt::{self, Debug, Formatter};
use core::marker::PhantomData;

/// A growable LIFO stack of `T`, backed by an [`ErasedStack`].
///
/// # Examples
/// ```
/// let mut stack = bytestack::Stack::<u32>::new()?;
/// stack.push(1)?;
/// stack.push(2)?;
/// assert_eq!(stack.peek()?, 2);
/// *stack.top_mut()? += 10;
/// assert_eq!(stack.pop()?, 12);
/// assert_eq!(stack.pop()?, 1);
/// assert!(stack.pop().is_err());
/// # Ok::<(), bytestack::Error>(())
/// ```
pub struct Stack<T> {
    inner: ErasedStack,
    elem: PhantomData<T>,
}

impl<T: Pod> Stack<T> {
    #[inline]
    fn handle() -> TypeHandle {
        TypeHandle::of::<T>()
    }

    /// Constructs an empty stack.
    ///
    /// Returns [`Error::InvalidArgument`] for zero-sized `T`.
    pub fn new() -> Result<Self> {
        Self::with_options(&StackOptions::new())
    }

    /// Constructs an empty stack with `capacity` slots allocated up front.
    pub fn with_capacity(capacity: usize) -> Result<Self> {
        Self::with_options(&StackOptions::new().capacity(capacity))
    }

    /// Constructs an empty stack from explicit options.
    pub fn with_options(options: &StackOptions) -> Result<Self> {
        Ok(Stack {
            inner: ErasedStack::with_type_and_options(Self::handle(), options)?,
            elem: PhantomData,
        })
    }

    /// Wraps an erased stack, which must have been built for `T`.
    ///
    /// # Examples
    /// ```
    /// use bytestack::{ErasedStack, Stack, TypeHandle};
    ///
    /// let erased = ErasedStack::with_type(TypeHandle::of::<u16>())?;
    /// assert!(Stack::<u16>::try_from_erased(erased.try_clone()?).is_ok());
    /// assert!(Stack::<i16>::try_from_erased(erased).is_err());
    /// # Ok::<(), bytestack::Error>(())
    /// ```
    pub fn try_from_erased(inner: ErasedStack) -> Result<Self> {
        let handle = Self::handle();
        if inner.type_handle() != Some(handle) {
            return Err(Error::TypeMismatch {
                expected: handle.name(),
                found: inner.type_handle().map_or("<untyped>", |h| h.name()),
            });
        }
        Ok(Stack {
            inner,
            elem: PhantomData,
        })
    }

    /// Returns the underlying erased stack.
    #[inline]
    pub fn as_erased(&self) -> &ErasedStack {
        &self.inner
    }

    /// Unwraps the underlying erased stack.
    #[inline]
    pub fn into_erased(self) -> ErasedStack {
        self.inner
    }

    /// Returns the number of elements in the stack.
    #[inline]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Returns `true` if the stack contains no elements.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Returns the number of elements the stack can hold without reallocating.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.inner.capacity()
    }

    /// Sets the capacity; see [`ErasedStack::set_capacity`].
    #[inline]
    pub fn set_capacity(&mut self, capacity: usize) -> Result<()> {
        self.inner.set_capacity(capacity)
    }

    /// Returns the current epoch; see [`ErasedStack::epoch`].
    #[inline]
    pub fn epoch(&self) -> u64 {
        self.inner.epoch()
    }

    /// Pushes `value` onto the stack.
    #[inline]
    pub fn push(&mut self, value: T) -> Result<()> {
        self.inner.push_as(Self::handle(), bytemuck::bytes_of(&value))
    }

    /// Removes and returns the top element.
    #[inline]
    pub fn pop(&mut self) -> Result<T> {
        let mut value = T::zeroed();
        self.inner
            .pop_as(Self::handle(), bytemuck::bytes_of_mut(&mut value))?;
        Ok(value)
    }

    /// Returns a copy of the top element.
    #[inline]
    pub fn peek(&self) -> Result<T> {
        let mut value = T::zeroed();
        self.inner
            .peek_as(Self::handle(), bytemuck::bytes_of_mut(&mut value))?;
        Ok(value)
    }

    /// Returns a reference to the top element.
    pub fn top(&self) -> Result<&T> {
        let bytes = self.inner.top_as(Self::handle())?;
        bytemuck::try_from_bytes(bytes)
            .map_err(|_| Error::InvalidArgument("element storage is misaligned"))
    }

    /// Returns a mutable reference to the top element.
    pub fn top_mut(&mut self) -> Result<&mut T> {
        let bytes = self.inner.top_mut_as(Self::handle())?;
        bytemuck::try_from_bytes_mut(bytes)
            .map_err(|_| Error::InvalidArgument("element storage is misaligned"))
    }

    /// Returns `true` if some element is bitwise equal to `value`.
    #[inline]
    pub fn contains(&self, value: &T) -> Result<bool> {
        self.inner.contains_as(Self::handle(), bytemuck::bytes_of(value))
    }

    /// Removes all elements, keeping the buffer.
    #[inline]
    pub fn clear(&mut self) {
        self.inner.clear();
    }

    /// Copies up to `out.len()` elements into `out`, top first, and returns
    /// the number copied.
    ///
    /// # Examples
    /// ```
    /// let mut stack = bytestack::Stack::<u64>::new()?;
    /// for i in 0..3 {
    ///     stack.push(i)?;
    /// }
    /// let mut out = [0u64; 2];
    /// assert_eq!(stack.copy_to(&mut out)?, 2);
    /// assert_eq!(out, [2, 1]);
    /// # Ok::<(), bytestack::Error>(())
    /// ```
    pub fn copy_to(&self, out: &mut [T]) -> Result<usize> {
        let max_elements = out.len();
        self.inner
            .copy_to_as(Self::handle(), bytemuck::cast_slice_mut(out), max_elements)
    }

    /// Copies all elements into a new [`ElementArray`], top first.
    #[inline]
    pub fn to_array(&self) -> Result<ElementArray> {
        self.inner.to_array_as(Self::handle())
    }

    /// Copies all elements into a [`Vec`], top first.
    pub fn to_vec(&self) -> Vec<T> {
        self.iter().collect()
    }

    /// Returns an iterator over copies of the elements, top first.
    pub fn iter(&self) -> impl Iterator<Item = T> + DoubleEndedIterator + ExactSizeIterator + '_ {
        self.inner.iter().map(bytemuck::pod_read_unaligned)
    }
}

impl<T: Pod + Debug> Debug for Stack<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}
