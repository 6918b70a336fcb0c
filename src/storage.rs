//! Owned, aligned memory blocks partitioned into fixed-size element slots.
//!
//! A [`RawBuffer`] is the only place in this crate that talks to the
//! allocator. It hands out byte slices over its slots and never reallocates
//! in place: growing or shrinking means allocating a new block, copying the
//! live prefix over, and only then dropping the old block.

use crate::error::{Error, Result};

use alloc::alloc::{alloc_zeroed, dealloc};
use core::alloc::Layout;
use core::fmt::{self, Debug, Formatter};
use core::ptr::NonNull;
use core::slice;

/// Upper bound for the alignment derived from an element's size when none
/// is configured explicitly.
pub const MAX_DEFAULT_ALIGNMENT: usize = 16;

/// Size and buffer alignment of one element slot.
///
/// Slots are packed without padding, so slot `i` starts at byte
/// `i * size()`; every slot is therefore aligned to `align()` only if
/// `size()` is a multiple of it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ElementLayout {
    size: usize,
    align: usize,
}

impl ElementLayout {
    /// Constructs a layout, returning [`Error::InvalidArgument`] if `size` is
    /// zero or `align` is not a power of two.
    pub fn new(size: usize, align: usize) -> Result<Self> {
        if size == 0 {
            return Err(Error::InvalidArgument("element size must be non-zero"));
        }
        if !align.is_power_of_two() {
            return Err(Error::InvalidArgument("alignment must be a power of two"));
        }

        Ok(ElementLayout { size, align })
    }

    /// Returns the largest power of two dividing `size`, capped at
    /// [`MAX_DEFAULT_ALIGNMENT`].
    ///
    /// # Examples
    /// ```
    /// use bytestack::storage::ElementLayout;
    /// assert_eq!(ElementLayout::natural_alignment(12), 4);
    /// assert_eq!(ElementLayout::natural_alignment(3), 1);
    /// assert_eq!(ElementLayout::natural_alignment(64), 16);
    /// ```
    #[inline]
    pub fn natural_alignment(size: usize) -> usize {
        if size == 0 {
            return 1;
        }
        (1usize << size.trailing_zeros()).min(MAX_DEFAULT_ALIGNMENT)
    }

    /// Returns the size of one element in bytes.
    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Returns the alignment of the buffer base in bytes.
    #[inline]
    pub fn align(&self) -> usize {
        self.align
    }

    /// Returns the number of bytes occupied by `count` elements.
    #[inline]
    pub fn bytes_for(&self, count: usize) -> Option<usize> {
        self.size.checked_mul(count)
    }

    fn array(&self, count: usize) -> Result<Layout> {
        let bytes = self
            .bytes_for(count)
            .ok_or(Error::AllocationFailure { bytes: usize::MAX })?;
        Layout::from_size_align(bytes, self.align).map_err(|_| Error::AllocationFailure { bytes })
    }
}

/// An exclusively owned, aligned, zero-initialized block of element slots.
pub struct RawBuffer {
    ptr: NonNull<u8>,
    capacity: usize,
    layout: ElementLayout,
}

// The buffer is plain bytes owned by exactly one value.
unsafe impl Send for RawBuffer {}
unsafe impl Sync for RawBuffer {}

impl RawBuffer {
    /// Allocates a block for `capacity` elements of the given layout.
    ///
    /// No memory is requested for a capacity of zero. Fresh slots are
    /// zero-filled.
    pub fn try_with_capacity(layout: ElementLayout, capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Ok(Self::dangling(layout));
        }

        let array = layout.array(capacity)?;
        let ptr = unsafe { alloc_zeroed(array) };
        match NonNull::new(ptr) {
            Some(ptr) => Ok(RawBuffer {
                ptr,
                capacity,
                layout,
            }),
            None => Err(Error::AllocationFailure {
                bytes: array.size(),
            }),
        }
    }

    #[inline]
    fn dangling(layout: ElementLayout) -> Self {
        // non-null and suitably aligned, since alignments are never zero
        let ptr = unsafe { NonNull::new_unchecked(layout.align() as *mut u8) };
        RawBuffer {
            ptr,
            capacity: 0,
            layout,
        }
    }

    /// Returns the number of element slots.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the element layout this block was allocated for.
    #[inline]
    pub fn layout(&self) -> ElementLayout {
        self.layout
    }

    /// Returns the total size of the block in bytes.
    #[inline]
    pub fn byte_len(&self) -> usize {
        self.layout.size * self.capacity
    }

    /// Extracts a slice over the entire block.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        unsafe { slice::from_raw_parts(self.ptr.as_ptr(), self.byte_len()) }
    }

    /// Extracts a mutable slice over the entire block.
    #[inline]
    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        unsafe { slice::from_raw_parts_mut(self.ptr.as_ptr(), self.byte_len()) }
    }

    /// Returns the bytes of slot `index`.
    ///
    /// # Panics
    /// Panics if `index >= capacity()`.
    #[inline]
    pub fn slot(&self, index: usize) -> &[u8] {
        let size = self.layout.size;
        &self.as_bytes()[index * size..(index + 1) * size]
    }

    /// Returns the bytes of slot `index` mutably.
    ///
    /// # Panics
    /// Panics if `index >= capacity()`.
    #[inline]
    pub fn slot_mut(&mut self, index: usize) -> &mut [u8] {
        let size = self.layout.size;
        &mut self.as_bytes_mut()[index * size..(index + 1) * size]
    }

    /// Returns the bytes of the first `count` slots.
    ///
    /// # Panics
    /// Panics if `count > capacity()`.
    #[inline]
    pub fn prefix(&self, count: usize) -> &[u8] {
        &self.as_bytes()[..count * self.layout.size]
    }

    /// Allocates a new block with `new_capacity` slots and copies the first
    /// `live` slots of `self` into it. `self` is left untouched, so on error
    /// nothing has changed.
    pub fn try_relocate(&self, new_capacity: usize, live: usize) -> Result<RawBuffer> {
        debug_assert!(live <= self.capacity && live <= new_capacity);

        let mut buf = RawBuffer::try_with_capacity(self.layout, new_capacity)?;
        let bytes = live * self.layout.size;
        buf.as_bytes_mut()[..bytes].copy_from_slice(self.prefix(live));
        Ok(buf)
    }
}

impl Drop for RawBuffer {
    fn drop(&mut self) {
        if self.capacity == 0 {
            return;
        }
        if let Ok(array) = self.layout.array(self.capacity) {
            unsafe { dealloc(self.ptr.as_ptr(), array) }
        }
    }
}

impl Debug for RawBuffer {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawBuffer")
            .field("capacity", &self.capacity)
            .field("layout", &self.layout)
            .finish()
    }
}
