//! Error kinds reported by stack operations.

/// The error type for every fallible operation in this crate.
///
/// A failed operation never modifies the stack it was called on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// An argument was malformed, e.g. an empty value buffer, a zero element
    /// size, or an alignment that is not a power of two.
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    /// The supplied type handle differs from the stack's element type.
    #[error("element type mismatch: expected `{expected}`, found `{found}`")]
    TypeMismatch {
        /// Name of the stack's element type, or `"<untyped>"`.
        expected: &'static str,
        /// Name of the type supplied by the caller.
        found: &'static str,
    },

    /// The supplied byte size differs from the stack's element size.
    #[error("element size mismatch: expected {expected} bytes, found {found}")]
    SizeMismatch {
        /// The stack's element size in bytes.
        expected: usize,
        /// The size supplied by the caller.
        found: usize,
    },

    /// The stack holds no elements.
    #[error("stack is empty")]
    EmptyContainer,

    /// A capacity change would violate `count <= capacity <= max_capacity`.
    #[error(
        "capacity {requested} is out of bounds (count is {count}, maximum is {max_capacity:?})"
    )]
    CapacityExceeded {
        /// The capacity that was asked for or computed by the growth policy.
        requested: usize,
        /// The number of elements held when the request was made.
        count: usize,
        /// The capacity ceiling, if any.
        max_capacity: Option<usize>,
    },

    /// A caller-supplied output buffer cannot hold the requested elements.
    #[error("output buffer too small: {required} bytes required, {available} available")]
    BufferTooSmall {
        /// Bytes needed for the copy.
        required: usize,
        /// Bytes actually supplied.
        available: usize,
    },

    /// The allocator could not satisfy a buffer request.
    #[error("failed to allocate {bytes} bytes")]
    AllocationFailure {
        /// Size of the refused request, or `usize::MAX` if it overflowed.
        bytes: usize,
    },

    /// A [`TopToken`](crate::TopToken) was resolved after the stack changed.
    #[error("top-of-stack token is stale")]
    StaleReference,
}

/// Shorthand for results carrying [`Error`].
pub type Result<T> = core::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::ToString;

    #[test]
    fn messages_name_the_offending_values() {
        let e = Error::SizeMismatch { expected: 4, found: 8 };
        assert_eq!(e.to_string(), "element size mismatch: expected 4 bytes, found 8");

        let e = Error::CapacityExceeded { requested: 5, count: 4, max_capacity: Some(4) };
        assert_eq!(
            e.to_string(),
            "capacity 5 is out of bounds (count is 4, maximum is Some(4))"
        );

        let e = Error::TypeMismatch { expected: "u32", found: "f32" };
        assert_eq!(e.to_string(), "element type mismatch: expected `u32`, found `f32`");
    }
}
