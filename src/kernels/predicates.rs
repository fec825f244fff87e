//! Numeric predicates over floating-point buffers

use crate::core::VBuffer;
use crate::iter::try_for_each_defined;

/// Floating-point element types the predicates operate on.
pub trait FloatElement: Copy {
    fn is_nan(self) -> bool;
    fn is_finite(self) -> bool;
}

impl FloatElement for f32 {
    fn is_nan(self) -> bool {
        f32::is_nan(self)
    }
    fn is_finite(self) -> bool {
        f32::is_finite(self)
    }
}

impl FloatElement for f64 {
    fn is_nan(self) -> bool {
        f64::is_nan(self)
    }
    fn is_finite(self) -> bool {
        f64::is_finite(self)
    }
}

/// True when any explicit slot holds a NaN.
pub fn has_nans<T: FloatElement>(v: &VBuffer<T>) -> bool {
    !try_for_each_defined(v, |_, x: &T| !x.is_nan())
}

/// True when any explicit slot holds a NaN or an infinity.
pub fn has_non_finite<T: FloatElement>(v: &VBuffer<T>) -> bool {
    !try_for_each_defined(v, |_, x: &T| x.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_has_nans_f64() {
        let clean = VBuffer::from_parts(3, 3, vec![1.0f64, 2.0, 3.0], Vec::new()).unwrap();
        assert!(!has_nans(&clean));

        let dirty = VBuffer::from_parts(3, 2, vec![1.0f64, f64::NAN], vec![0, 2]).unwrap();
        assert!(has_nans(&dirty));
    }

    #[test]
    fn test_has_nans_f32() {
        let dirty = VBuffer::from_parts(2, 2, vec![f32::NAN, 1.0f32], Vec::new()).unwrap();
        assert!(has_nans(&dirty));
    }

    #[test]
    fn test_has_non_finite() {
        let inf = VBuffer::from_parts(3, 1, vec![f64::INFINITY], vec![1]).unwrap();
        assert!(has_non_finite(&inf));
        assert!(!has_nans(&inf));

        let neg_inf = VBuffer::from_parts(2, 2, vec![1.0f32, f32::NEG_INFINITY], Vec::new()).unwrap();
        assert!(has_non_finite(&neg_inf));

        let clean = VBuffer::from_parts(2, 1, vec![5.0f64], vec![0]).unwrap();
        assert!(!has_non_finite(&clean));
    }

    #[test]
    fn test_predicates_ignore_implicit_zeros() {
        // Implicit slots are zero by definition, hence finite.
        let v = VBuffer::from_parts(100, 1, vec![1.0f64], vec![50]).unwrap();
        assert!(!has_nans(&v));
        assert!(!has_non_finite(&v));
    }
}
