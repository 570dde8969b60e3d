//! Element access over flat buffers.
//!
//! Strided views never assume their storage is a plain `[T]`: they read and
//! write through [`ElementAccess`] / [`ElementAccessMut`], which map a flat
//! buffer index to an element. Slices implement these traits by indexing;
//! exotic storage such as [`PackedBits`] implements them with get/set logic.
//!
//! The storage type is a generic parameter of every view, so the choice
//! between indexed and accessor-based access is made once at compile time
//! rather than per element. Indexed storage additionally exposes itself as a
//! slice through [`ElementAccess::as_slice`], which lets unit-stride inner
//! loops run over plain slices.

use std::borrow::BorrowMut;
use std::collections::TryReserveError;

/// Read access to the elements of a flat buffer.
pub trait ElementAccess {
    type Elem: Copy;

    /// Number of addressable elements.
    fn len(&self) -> usize;

    #[inline]
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Read the element at `index`.
    ///
    /// # Panics
    /// Panics if `index >= self.len()`.
    fn get(&self, index: usize) -> Self::Elem;

    /// The buffer as a plain slice, when the storage is indexed memory.
    #[inline(always)]
    fn as_slice(&self) -> Option<&[Self::Elem]> {
        None
    }
}

/// Write access to the elements of a flat buffer.
pub trait ElementAccessMut: ElementAccess {
    /// Write `value` at `index`.
    ///
    /// # Panics
    /// Panics if `index >= self.len()`.
    fn set(&mut self, index: usize, value: Self::Elem);

    #[inline(always)]
    fn as_mut_slice(&mut self) -> Option<&mut [Self::Elem]> {
        None
    }
}

/// Storage that can allocate an owned workspace of the same kind.
///
/// Used for the copy-to-scratch path of non-contiguous sub-views: the
/// workspace must be addressable through the same storage type so that the
/// element primitive sees a single lane type.
pub trait ScratchAlloc: ElementAccessMut {
    type Owned: BorrowMut<Self>;

    /// Allocate `len` elements initialized to `fill`.
    fn try_alloc(len: usize, fill: Self::Elem) -> Result<Self::Owned, TryReserveError>;
}

// ---------------------------------------------------------------------------
// Slices
// ---------------------------------------------------------------------------

impl<T: Copy> ElementAccess for [T] {
    type Elem = T;

    #[inline(always)]
    fn len(&self) -> usize {
        <[T]>::len(self)
    }

    #[inline(always)]
    fn get(&self, index: usize) -> T {
        self[index]
    }

    #[inline(always)]
    fn as_slice(&self) -> Option<&[T]> {
        Some(self)
    }
}

impl<T: Copy> ElementAccessMut for [T] {
    #[inline(always)]
    fn set(&mut self, index: usize, value: T) {
        self[index] = value;
    }

    #[inline(always)]
    fn as_mut_slice(&mut self) -> Option<&mut [T]> {
        Some(self)
    }
}

impl<T: Copy> ScratchAlloc for [T] {
    type Owned = Vec<T>;

    fn try_alloc(len: usize, fill: T) -> Result<Vec<T>, TryReserveError> {
        let mut buf = Vec::new();
        buf.try_reserve_exact(len)?;
        buf.resize(len, fill);
        Ok(buf)
    }
}

// ---------------------------------------------------------------------------
// Bit-packed booleans
// ---------------------------------------------------------------------------

const WORD_BITS: usize = u64::BITS as usize;

/// Boolean storage packing 64 elements per word.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackedBits {
    words: Vec<u64>,
    len: usize,
}

impl PackedBits {
    /// `len` bits, all cleared.
    pub fn new(len: usize) -> Self {
        Self {
            words: vec![0; len.div_ceil(WORD_BITS)],
            len,
        }
    }

    pub fn from_bools(values: &[bool]) -> Self {
        let mut bits = Self::new(values.len());
        for (i, &v) in values.iter().enumerate() {
            bits.set(i, v);
        }
        bits
    }

    pub fn to_vec(&self) -> Vec<bool> {
        (0..self.len).map(|i| self.get(i)).collect()
    }

    /// Number of set bits.
    pub fn count_ones(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    #[inline]
    fn check(&self, index: usize) {
        assert!(
            index < self.len,
            "bit index {} out of bounds for length {}",
            index,
            self.len
        );
    }
}

impl ElementAccess for PackedBits {
    type Elem = bool;

    #[inline]
    fn len(&self) -> usize {
        self.len
    }

    #[inline]
    fn get(&self, index: usize) -> bool {
        self.check(index);
        (self.words[index / WORD_BITS] >> (index % WORD_BITS)) & 1 == 1
    }
}

impl ElementAccessMut for PackedBits {
    #[inline]
    fn set(&mut self, index: usize, value: bool) {
        self.check(index);
        let mask = 1u64 << (index % WORD_BITS);
        let word = &mut self.words[index / WORD_BITS];
        if value {
            *word |= mask;
        } else {
            *word &= !mask;
        }
    }
}

impl ScratchAlloc for PackedBits {
    type Owned = PackedBits;

    fn try_alloc(len: usize, fill: bool) -> Result<PackedBits, TryReserveError> {
        let nwords = len.div_ceil(WORD_BITS);
        let mut words = Vec::new();
        words.try_reserve_exact(nwords)?;
        words.resize(nwords, if fill { u64::MAX } else { 0 });
        // Keep bits past `len` cleared so count_ones stays exact.
        if fill && len % WORD_BITS != 0 {
            if let Some(last) = words.last_mut() {
                *last = (1u64 << (len % WORD_BITS)) - 1;
            }
        }
        Ok(PackedBits { words, len })
    }
}
