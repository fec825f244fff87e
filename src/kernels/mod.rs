//! Named element-wise kernels
//!
//! Thin, strongly-typed entry points expressed against the iteration and
//! apply engines. These are the operations featurizers and linear learners
//! call on the hot path; anything type-erased goes through
//! [`crate::cache::DispatchCache`] and lands on one of these.

pub mod predicates;

pub use self::predicates::*;

use crate::apply::apply_with_either_defined_copy;
use crate::core::{Result, VBuffer};
use crate::iter::apply_into_either_defined;
use std::ops::{Add, Mul};

/// `dst[i] = factor * src[i]` over the explicit slots of `src`.
///
/// The destination takes on exactly the source's shape: a sparse source stays
/// sparse with the same support, a dense source gives a dense result.
pub fn scale_into<T>(src: &VBuffer<T>, factor: T, dst: &mut VBuffer<T>)
where
    T: Copy + Default + Mul<Output = T>,
{
    apply_into_either_defined(src, dst, move |_, v: &T| factor * *v);
}

/// `dst = a + factor * b` over the union of both supports.
///
/// Slots explicit in only one operand contribute the other side's implicit
/// zero; the result is sparse with support `S_a ∪ S_b`, or dense when that
/// union covers the whole vector.
pub fn add_mult_into<T>(
    a: &VBuffer<T>,
    factor: T,
    b: &VBuffer<T>,
    dst: &mut VBuffer<T>,
) -> Result<()>
where
    T: Copy + Default + Add<Output = T> + Mul<Output = T>,
{
    apply_with_either_defined_copy(b, a, dst, move |_, vb: &T, va: &T| *va + factor * *vb)
}
