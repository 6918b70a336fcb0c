#![no_std]
#![warn(missing_docs)]

//! Growable, type-erased LIFO stacks with optional runtime type checking.
//!
//! [`ErasedStack`] stores fixed-size elements as raw bytes in a single
//! contiguous, aligned buffer. The element size is fixed at construction,
//! either directly or by a [`TypeHandle`]; in the latter case every call that
//! supplies a handle is checked against it, so misuse is caught at runtime
//! even though the engine itself is not generic.
//!
//! [`Stack<T>`](typed::Stack) is a thin statically typed front-end for plain
//! old data types, forwarding everything to the erased engine.
//!
//! # Examples
//! ```
//! use bytestack::{ErasedStack, Error, StackOptions};
//!
//! let options = StackOptions::new().capacity(2).max_capacity(4).growth_delta(2);
//! let mut stack = ErasedStack::with_options(4, &options)?;
//!
//! for i in 1u32..=4 {
//!     stack.push(&i.to_ne_bytes())?;
//! }
//! assert_eq!(stack.capacity(), 4);
//! assert!(matches!(stack.push(&5u32.to_ne_bytes()), Err(Error::CapacityExceeded { .. })));
//!
//! let mut out = [0u8; 4];
//! stack.pop(&mut out)?;
//! assert_eq!(u32::from_ne_bytes(out), 4);
//! # Ok::<(), Error>(())
//! ```

extern crate alloc;

pub mod array;
pub mod error;
pub mod growth;
pub mod options;
pub mod stack;
pub mod storage;
pub mod type_handle;
pub mod typed;

pub use crate::array::ElementArray;
pub use crate::error::{Error, Result};
pub use crate::growth::{Growth, GrowthPolicy};
pub use crate::options::StackOptions;
pub use crate::stack::{ErasedStack, TopToken};
pub use crate::type_handle::{ElementType, TypeHandle, TypeOf};
pub use crate::typed::Stack;
