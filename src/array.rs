//! Owned snapshots of a stack's contents.

use crate::error::Result;
use crate::stack::ErasedStack;
use crate::storage::RawBuffer;
use crate::type_handle::TypeHandle;

use core::fmt::{self, Debug, Formatter};
use core::slice::ChunksExact;

/// An owned, exactly sized copy of a stack's elements in stack order,
/// top first.
///
/// Created by [`ErasedStack::to_array`]. The memory is released when the
/// array is dropped.
///
/// # Examples
/// ```
/// let mut stack = bytestack::ErasedStack::new(2)?;
/// stack.push(&[1, 1])?;
/// stack.push(&[2, 2])?;
///
/// let array = stack.to_array(2)?;
/// assert_eq!(array.len(), 2);
/// assert_eq!(array.as_bytes(), &[2, 2, 1, 1]);
/// assert_eq!(array.get(1), Some(&[1, 1][..]));
/// # Ok::<(), bytestack::Error>(())
/// ```
pub struct ElementArray {
    buf: RawBuffer,
    type_handle: Option<TypeHandle>,
}

impl ElementArray {
    pub(crate) fn from_stack(stack: &ErasedStack) -> Result<Self> {
        let source = stack.raw_buffer();
        let mut buf = RawBuffer::try_with_capacity(source.layout(), stack.len())?;

        let size = stack.element_size();
        for (dst, src) in buf.as_bytes_mut().chunks_exact_mut(size).zip(stack.iter()) {
            dst.copy_from_slice(src);
        }

        Ok(ElementArray {
            buf,
            type_handle: stack.type_handle(),
        })
    }

    /// Returns the number of elements.
    #[inline]
    pub fn len(&self) -> usize {
        self.buf.capacity()
    }

    /// Returns `true` if the array holds no elements.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.buf.capacity() == 0
    }

    /// Returns the size of one element in bytes.
    #[inline]
    pub fn element_size(&self) -> usize {
        self.buf.layout().size()
    }

    /// Returns the alignment of the underlying memory in bytes.
    #[inline]
    pub fn alignment(&self) -> usize {
        self.buf.layout().align()
    }

    /// Returns the element type handle of the originating stack, if any.
    #[inline]
    pub fn type_handle(&self) -> Option<TypeHandle> {
        self.type_handle
    }

    /// Returns all elements as one byte slice of `len() * element_size()` bytes.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        self.buf.as_bytes()
    }

    /// Returns the bytes of the element at `index`, where index 0 is the
    /// former top of the stack.
    #[inline]
    pub fn get(&self, index: usize) -> Option<&[u8]> {
        if index < self.len() {
            Some(self.buf.slot(index))
        } else {
            None
        }
    }

    /// Returns an iterator over the elements, former top first.
    #[inline]
    pub fn iter(&self) -> ChunksExact<'_, u8> {
        self.buf.as_bytes().chunks_exact(self.element_size())
    }

    /// Rebuilds a stack from this snapshot; see [`ErasedStack::from_array`].
    #[inline]
    pub fn to_stack(&self) -> Result<ErasedStack> {
        ErasedStack::from_array(self)
    }
}

impl Debug for ElementArray {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("ElementArray")
            .field("element_type", &self.type_handle)
            .field("element_size", &self.element_size())
            .field("len", &self.len())
            .finish()
    }
}

impl<'a> IntoIterator for &'a ElementArray {
    type Item = &'a [u8];
    type IntoIter = ChunksExact<'a, u8>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
