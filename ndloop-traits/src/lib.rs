//! Shared traits for the ndloop crates.
//!
//! This crate provides the element and storage abstractions that are shared
//! across `ndloop-view`, `ndloop-kernel`, and external crates that want to
//! plug their own buffer types into the traversal engine:
//!
//! - [`DType`] / [`Element`]: the data type of a strided buffer
//! - [`ElementAccess`] / [`ElementAccessMut`]: indexed `get`/`set` over a flat
//!   buffer, implemented for plain slices and for exotic storage such as the
//!   bit-packed [`PackedBits`]
//! - [`ScratchAlloc`]: storage that can allocate a same-kind workspace

pub mod access;
pub mod dtype;

pub use access::{ElementAccess, ElementAccessMut, PackedBits, ScratchAlloc};
pub use dtype::{DType, Element};
