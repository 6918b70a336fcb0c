//! Runtime element type identity and the guard that enforces it.

use crate::error::{Error, Result};

use core::any::TypeId;
use core::fmt::{self, Debug, Formatter};
use core::hash::{Hash, Hasher};
use core::mem::{align_of, size_of};

/// An opaque, comparable identity for an element type.
///
/// Two handles are equal exactly when they were obtained for the same type.
/// Size, alignment and name are carried along so that a handle alone is
/// enough to configure a stack.
///
/// # Examples
/// ```
/// use bytestack::TypeHandle;
///
/// assert_eq!(TypeHandle::of::<u32>(), TypeHandle::of::<u32>());
/// assert_ne!(TypeHandle::of::<u32>(), TypeHandle::of::<i32>());
/// assert_eq!(TypeHandle::of::<u64>().size(), 8);
/// ```
#[derive(Clone, Copy)]
pub struct TypeHandle {
    id: TypeId,
    size: usize,
    align: usize,
    name: &'static str,
}

impl TypeHandle {
    /// Returns the handle for `T`.
    #[inline]
    pub fn of<T: 'static>() -> Self {
        TypeHandle {
            id: TypeId::of::<T>(),
            size: size_of::<T>(),
            align: align_of::<T>(),
            name: core::any::type_name::<T>(),
        }
    }

    /// Returns the size of the type in bytes.
    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Returns the minimum alignment of the type in bytes.
    #[inline]
    pub fn align(&self) -> usize {
        self.align
    }

    /// Returns the type's name, for diagnostics only.
    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for TypeHandle {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeHandle {}

impl Hash for TypeHandle {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl Debug for TypeHandle {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_tuple("TypeHandle").field(&self.name).finish()
    }
}

/// A callback producing a [`TypeHandle`] on demand.
pub type TypeOf = fn() -> TypeHandle;

/// Describes the elements a stack is constructed for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ElementType {
    /// Elements of `size` bytes with no runtime type identity.
    Untyped {
        /// Element size in bytes.
        size: usize,
    },
    /// Elements of the given type; the size is taken from the handle.
    Typed(TypeHandle),
}

impl ElementType {
    /// Returns the element size in bytes.
    #[inline]
    pub fn size(&self) -> usize {
        match self {
            ElementType::Untyped { size } => *size,
            ElementType::Typed(handle) => handle.size(),
        }
    }

    /// Returns the type handle, if any.
    #[inline]
    pub fn handle(&self) -> Option<TypeHandle> {
        match self {
            ElementType::Untyped { .. } => None,
            ElementType::Typed(handle) => Some(*handle),
        }
    }
}

impl From<TypeHandle> for ElementType {
    fn from(handle: TypeHandle) -> Self {
        ElementType::Typed(handle)
    }
}

impl From<TypeOf> for ElementType {
    fn from(type_of: TypeOf) -> Self {
        ElementType::Typed(type_of())
    }
}

const UNTYPED: &str = "<untyped>";

/// Checks the type identity and size supplied with each call against the
/// values fixed when the stack was built.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct TypeGuard {
    handle: Option<TypeHandle>,
    element_size: usize,
}

impl TypeGuard {
    pub(crate) fn new(element: ElementType) -> Result<Self> {
        let element_size = element.size();
        if element_size == 0 {
            return Err(Error::InvalidArgument("element size must be non-zero"));
        }

        Ok(TypeGuard {
            handle: element.handle(),
            element_size,
        })
    }

    #[inline]
    pub(crate) fn handle(&self) -> Option<TypeHandle> {
        self.handle
    }

    #[inline]
    pub(crate) fn element_size(&self) -> usize {
        self.element_size
    }

    /// Validates whichever of `handle` and `size` the caller supplied.
    ///
    /// A supplied handle must equal the stored one; an untyped stack matches
    /// no handle at all.
    #[inline]
    pub(crate) fn check(&self, handle: Option<TypeHandle>, size: Option<usize>) -> Result<()> {
        if let Some(found) = handle {
            if self.handle != Some(found) {
                return Err(Error::TypeMismatch {
                    expected: self.handle.map_or(UNTYPED, |h| h.name()),
                    found: found.name(),
                });
            }
        }

        if let Some(found) = size {
            if found != self.element_size {
                return Err(Error::SizeMismatch {
                    expected: self.element_size,
                    found,
                });
            }
        }

        Ok(())
    }
}
