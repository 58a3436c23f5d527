// src/math/sse2.rs
//
// SSE2 specialization of the 4-lane i32 vector. SSE2 is baseline on x86-64,
// so no runtime feature detection is needed. Blend is emulated with and/or
// masks and max(v, 0) with a compare-and-mask, both of which stay inside the
// SSE2 instruction set.

use core::arch::x86_64::*;
use std::ops::{Add, Neg, Sub};

#[derive(Clone, Copy)]
pub struct Vec4i(__m128i);

impl Vec4i {
    #[inline]
    pub fn new(x0: i32, x1: i32, x2: i32, x3: i32) -> Self {
        unsafe { Self(_mm_set_epi32(x3, x2, x1, x0)) }
    }

    #[inline]
    pub fn zero() -> Self {
        unsafe { Self(_mm_setzero_si128()) }
    }

    #[inline]
    pub fn to_array(self) -> [i32; 4] {
        let mut out = [0i32; 4];
        unsafe { _mm_storeu_si128(out.as_mut_ptr() as *mut __m128i, self.0) };
        out
    }

    #[inline]
    pub fn lane<const K: usize>(self) -> i32 {
        unsafe {
            match K {
                0 => _mm_cvtsi128_si32(self.0),
                1 => _mm_cvtsi128_si32(_mm_shuffle_epi32::<0b01>(self.0)),
                2 => _mm_cvtsi128_si32(_mm_shuffle_epi32::<0b10>(self.0)),
                3 => _mm_cvtsi128_si32(_mm_shuffle_epi32::<0b11>(self.0)),
                _ => unreachable!(),
            }
        }
    }

    /// Lane-wise left shift by a runtime amount.
    #[inline]
    pub fn shl(self, n: u32) -> Self {
        unsafe { Self(_mm_sll_epi32(self.0, _mm_cvtsi32_si128(n as i32))) }
    }

    /// Lane-wise arithmetic right shift by one.
    #[inline]
    pub fn shr1(self) -> Self {
        unsafe { Self(_mm_srai_epi32::<1>(self.0)) }
    }

    /// Swap the lanes within each pair: [a, b, c, d] -> [b, a, d, c].
    #[inline]
    pub fn swap_pairs(self) -> Self {
        unsafe { Self(_mm_shuffle_epi32::<0b10_11_00_01>(self.0)) }
    }

    /// Per-lane select: lane k comes from `self` when bit k of KEEP is set,
    /// from `other` otherwise.
    #[inline]
    pub fn blend<const KEEP: u8>(self, other: Self) -> Self {
        unsafe {
            let m = _mm_set_epi32(
                if KEEP & 0b1000 != 0 { -1 } else { 0 },
                if KEEP & 0b0100 != 0 { -1 } else { 0 },
                if KEEP & 0b0010 != 0 { -1 } else { 0 },
                if KEEP & 0b0001 != 0 { -1 } else { 0 },
            );
            Self(_mm_or_si128(
                _mm_and_si128(m, self.0),
                _mm_andnot_si128(m, other.0),
            ))
        }
    }

    #[inline]
    pub fn max_zero(self) -> Self {
        unsafe {
            let pos = _mm_cmpgt_epi32(self.0, _mm_setzero_si128());
            Self(_mm_and_si128(self.0, pos))
        }
    }

    /// True if any lane of `self` is strictly below the matching lane of `other`.
    #[inline]
    pub fn any_lt(self, other: Self) -> bool {
        unsafe { _mm_movemask_epi8(_mm_cmplt_epi32(self.0, other.0)) != 0 }
    }

    /// Bit k set iff lane k is negative.
    #[inline]
    pub fn below_zero_mask(self) -> u32 {
        unsafe {
            let neg = _mm_cmplt_epi32(self.0, _mm_setzero_si128());
            _mm_movemask_ps(_mm_castsi128_ps(neg)) as u32
        }
    }
}

impl Add for Vec4i {
    type Output = Self;
    #[inline]
    fn add(self, rhs: Self) -> Self {
        unsafe { Self(_mm_add_epi32(self.0, rhs.0)) }
    }
}

impl Sub for Vec4i {
    type Output = Self;
    #[inline]
    fn sub(self, rhs: Self) -> Self {
        unsafe { Self(_mm_sub_epi32(self.0, rhs.0)) }
    }
}

impl Neg for Vec4i {
    type Output = Self;
    #[inline]
    fn neg(self) -> Self {
        Self::zero() - self
    }
}

impl PartialEq for Vec4i {
    fn eq(&self, other: &Self) -> bool {
        self.to_array() == other.to_array()
    }
}
impl Eq for Vec4i {}

impl std::fmt::Debug for Vec4i {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Vec4i{:?}", self.to_array())
    }
}
