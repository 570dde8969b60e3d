//! Data types of strided buffers.

use num_complex::Complex;
use std::fmt;

/// Data type of the elements stored behind a view.
///
/// Only the byte width is modelled; the traversal engine uses it to size
/// tiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DType {
    Bool,
    Int8,
    Int16,
    Int32,
    Int64,
    IntSize,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    UIntSize,
    Float32,
    Float64,
    /// Single-precision complex (two `f32` components).
    Complex64,
    /// Double-precision complex (two `f64` components).
    Complex128,
    /// An element type without a fixed-width numeric representation.
    Generic,
}

impl DType {
    /// Bytes per element, or `None` for [`DType::Generic`].
    pub const fn byte_size(self) -> Option<usize> {
        match self {
            DType::Bool | DType::Int8 | DType::UInt8 => Some(1),
            DType::Int16 | DType::UInt16 => Some(2),
            DType::Int32 | DType::UInt32 | DType::Float32 => Some(4),
            DType::Int64 | DType::UInt64 | DType::Float64 | DType::Complex64 => Some(8),
            DType::IntSize | DType::UIntSize => Some(std::mem::size_of::<usize>()),
            DType::Complex128 => Some(16),
            DType::Generic => None,
        }
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DType::Bool => "bool",
            DType::Int8 => "int8",
            DType::Int16 => "int16",
            DType::Int32 => "int32",
            DType::Int64 => "int64",
            DType::IntSize => "isize",
            DType::UInt8 => "uint8",
            DType::UInt16 => "uint16",
            DType::UInt32 => "uint32",
            DType::UInt64 => "uint64",
            DType::UIntSize => "usize",
            DType::Float32 => "float32",
            DType::Float64 => "float64",
            DType::Complex64 => "complex64",
            DType::Complex128 => "complex128",
            DType::Generic => "generic",
        };
        f.write_str(name)
    }
}

/// Element types with a known [`DType`].
///
/// Custom element types opt in with a one-line impl:
/// ```ignore
/// impl Element for MyType {
///     const DTYPE: DType = DType::Generic;
/// }
/// ```
pub trait Element: Copy + 'static {
    const DTYPE: DType;
}

macro_rules! impl_element {
    ($($t:ty => $dtype:ident),* $(,)?) => {
        $(impl Element for $t {
            const DTYPE: DType = DType::$dtype;
        })*
    };
}

impl_element!(
    bool => Bool,
    i8 => Int8,
    i16 => Int16,
    i32 => Int32,
    i64 => Int64,
    isize => IntSize,
    u8 => UInt8,
    u16 => UInt16,
    u32 => UInt32,
    u64 => UInt64,
    usize => UIntSize,
    f32 => Float32,
    f64 => Float64,
    Complex<f32> => Complex64,
    Complex<f64> => Complex128,
);
