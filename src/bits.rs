//! Dense bit arrays sized at build time, with sub-range views for
//! per-orthogonal-region child bits (spec.md §9, "Bit arrays of known
//! width").

use bit_set::BitSet;

/// A flat bit array big enough for `STATE_COUNT`, `REGION_COUNT`, or the
/// total ortho-unit space, plus named sub-range views into it.
#[derive(Debug, Clone, Default)]
pub struct BitArray {
    bits: BitSet,
    len: usize,
}

impl BitArray {
    pub fn with_len(len: usize) -> Self {
        Self {
            bits: BitSet::with_capacity(len),
            len,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn get(&self, index: usize) -> bool {
        debug_assert!(index < self.len);
        self.bits.contains(index)
    }

    #[inline]
    pub fn set(&mut self, index: usize) {
        debug_assert!(index < self.len);
        self.bits.insert(index);
    }

    #[inline]
    pub fn clear_bit(&mut self, index: usize) {
        debug_assert!(index < self.len);
        self.bits.remove(index);
    }

    pub fn clear_all(&mut self) {
        self.bits.clear();
    }

    pub fn any(&self) -> bool {
        !self.bits.is_empty()
    }

    /// A `(unit, width)` sub-range view into this array, as used to locate
    /// one orthogonal region's per-child bits.
    pub fn slice(&self, unit: usize, width: usize) -> BitSlice<'_> {
        debug_assert!(unit + width <= self.len);
        BitSlice {
            array: self,
            unit,
            width,
        }
    }

    pub fn slice_mut(&mut self, unit: usize, width: usize) -> BitSliceMut<'_> {
        debug_assert!(unit + width <= self.len);
        BitSliceMut {
            array: self,
            unit,
            width,
        }
    }
}

/// Read-only view of one `(unit, width)` slice of a [`BitArray`].
pub struct BitSlice<'a> {
    array: &'a BitArray,
    unit: usize,
    width: usize,
}

impl<'a> BitSlice<'a> {
    pub fn width(&self) -> usize {
        self.width
    }

    pub fn get(&self, local: usize) -> bool {
        debug_assert!(local < self.width);
        self.array.get(self.unit + local)
    }

    pub fn any(&self) -> bool {
        (0..self.width).any(|i| self.get(i))
    }
}

/// Mutable view of one `(unit, width)` slice of a [`BitArray`].
pub struct BitSliceMut<'a> {
    array: &'a mut BitArray,
    unit: usize,
    width: usize,
}

impl<'a> BitSliceMut<'a> {
    pub fn width(&self) -> usize {
        self.width
    }

    pub fn get(&self, local: usize) -> bool {
        debug_assert!(local < self.width);
        self.array.get(self.unit + local)
    }

    pub fn set(&mut self, local: usize) {
        debug_assert!(local < self.width);
        self.array.set(self.unit + local);
    }

    pub fn clear_bit(&mut self, local: usize) {
        debug_assert!(local < self.width);
        self.array.clear_bit(self.unit + local);
    }

    pub fn clear_all(&mut self) {
        for i in 0..self.width {
            self.clear_bit(i);
        }
    }
}
