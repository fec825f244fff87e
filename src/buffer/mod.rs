//! Structural primitives for hybrid vectors
//!
//! These operations rewrite the physical representation of a [`VBuffer`]
//! without touching its visitor surface: zeroing, dense/sparse conversion,
//! single-slot updates, and opportunistic sparsification. Every function
//! re-establishes the representation invariants before returning.

use crate::core::{Result, VBuffer, VectorError};

/// Dense vectors shorter than this are never worth sparsifying.
pub const SPARSIFY_MIN_LENGTH: usize = 20;

/// Set the value of every explicit slot to zero.
///
/// The structure is untouched: `count`, `length`, and the sparse skeleton all
/// survive. A dense clear zeroes the whole vector; a sparse clear zeroes only
/// the defined positions.
pub fn clear<T: Clone + Default>(dst: &mut VBuffer<T>) {
    for v in dst.values[..dst.count].iter_mut() {
        *v = T::default();
    }
}

/// Convert a sparse vector to the equivalent dense one. Dense input is a no-op.
pub fn densify<T: Clone + Default>(dst: &mut VBuffer<T>) {
    if dst.is_dense() {
        return;
    }
    if dst.values.len() < dst.length {
        dst.values.resize(dst.length, T::default());
    }
    // Spread entries from their physical positions to their logical slots,
    // high index to low. indices[k] >= k for a strictly increasing sequence,
    // so a write at slot i never lands on an unread physical position.
    let mut k = dst.count;
    for i in (0..dst.length).rev() {
        if k > 0 && dst.indices[k - 1] == i {
            k -= 1;
            if i != k {
                dst.values[i] = dst.values[k].clone();
            }
        } else {
            dst.values[i] = T::default();
        }
    }
    dst.count = dst.length;
}

/// Ensure slots `[0, k)` are explicitly represented without fully densifying.
///
/// Missing prefix slots materialize as zero-valued entries; entries at or past
/// slot `k` are untouched. The result keeps strictly increasing index order.
pub fn densify_first_k<T: Clone + Default>(dst: &mut VBuffer<T>, k: usize) -> Result<()> {
    if k > dst.length {
        return Err(VectorError::SlotOutOfRange {
            slot: k,
            length: dst.length,
        });
    }
    if dst.is_dense() || k == 0 {
        return Ok(());
    }
    if k == dst.length {
        densify(dst);
        return Ok(());
    }
    if dst.count == 0 {
        // Previously empty: install the identity prefix.
        dst.indices.clear();
        dst.indices.extend(0..k);
        dst.values.clear();
        dst.values.resize(k, T::default());
        dst.count = k;
        return Ok(());
    }
    // Number of existing entries below slot k.
    let present = dst.indices[..dst.count].partition_point(|&i| i < k);
    if present == k {
        // Prefix already contiguous at the front.
        return Ok(());
    }

    let new_count = dst.count + (k - present);
    if dst.values.len() < new_count {
        dst.values.resize(new_count, T::default());
    }
    if dst.indices.len() < new_count {
        dst.indices.resize(new_count, 0);
    }
    // Shift the tail rightward, high end first, so no entry is clobbered
    // before it is read.
    let shift = k - present;
    for t in (present..dst.count).rev() {
        dst.indices[t + shift] = dst.indices[t];
        dst.values[t + shift] = dst.values[t].clone();
    }
    // Fill the prefix, high slot to low, consuming the old prefix entries.
    let mut c = present;
    for slot in (0..k).rev() {
        if c > 0 && dst.indices[c - 1] == slot {
            c -= 1;
            if slot != c {
                dst.values[slot] = dst.values[c].clone();
            }
        } else {
            dst.values[slot] = T::default();
        }
        dst.indices[slot] = slot;
    }
    dst.count = new_count;
    debug_assert!(dst.indices[..dst.count].windows(2).all(|w| w[0] < w[1]));
    Ok(())
}

/// Read and overwrite the value at one logical slot.
///
/// A value written over a previously implicit slot is kept only when it is not
/// the implicit zero (`T::default()`); see [`apply_at_slot_with`] to supply a
/// custom zero predicate.
pub fn apply_at_slot<T, M>(dst: &mut VBuffer<T>, slot: usize, manip: M) -> Result<()>
where
    T: Clone + Default + PartialEq,
    M: FnOnce(usize, &mut T),
{
    apply_at_slot_with(dst, slot, manip, |v| *v == T::default())
}

/// [`apply_at_slot`] with a caller-supplied sparsification guard.
///
/// When the manipulated slot was implicit and the written value satisfies
/// `is_zero`, the structure is left unchanged. Otherwise the new entry is
/// spliced into sorted position; if that raises `count` to `length`, the
/// vector becomes dense.
pub fn apply_at_slot_with<T, M, Z>(
    dst: &mut VBuffer<T>,
    slot: usize,
    manip: M,
    is_zero: Z,
) -> Result<()>
where
    T: Clone + Default,
    M: FnOnce(usize, &mut T),
    Z: Fn(&T) -> bool,
{
    if slot >= dst.length {
        return Err(VectorError::SlotOutOfRange {
            slot,
            length: dst.length,
        });
    }
    if dst.is_dense() {
        manip(slot, &mut dst.values[slot]);
        return Ok(());
    }
    match dst.indices[..dst.count].binary_search(&slot) {
        Ok(pos) => {
            manip(slot, &mut dst.values[pos]);
            Ok(())
        }
        Err(pos) => {
            let mut value = T::default();
            manip(slot, &mut value);
            if is_zero(&value) {
                return Ok(());
            }
            reserve_entry(dst);
            dst.values.truncate(dst.count);
            dst.indices.truncate(dst.count);
            dst.values.insert(pos, value);
            dst.indices.insert(pos, slot);
            dst.count += 1;
            // count == length now means the indices are the identity
            // permutation, so the values already sit in slot order and the
            // vector is dense as-is.
            Ok(())
        }
    }
}

/// Grow the entry arrays ahead of a splice: double the current capacity,
/// capped at the logical length.
fn reserve_entry<T>(dst: &mut VBuffer<T>) {
    let needed = dst.count + 1;
    let cap = dst.length.max(needed);
    if dst.values.capacity() < needed {
        let target = (dst.values.capacity() * 2).clamp(needed, cap);
        dst.values.reserve_exact(target - dst.values.len());
    }
    if dst.indices.capacity() < needed {
        let target = (dst.indices.capacity() * 2).clamp(needed, cap);
        dst.indices.reserve_exact(target - dst.indices.len());
    }
}

/// Copy `src` into `dst`, collapsing a dense source to sparse when few enough
/// slots are non-zero.
///
/// Sparsification is attempted only for dense sources with at least
/// [`SPARSIFY_MIN_LENGTH`] slots; the scan stops as soon as the non-zero count
/// exceeds `floor(length * threshold)`, falling back to a plain dense copy.
/// Sparse sources are copied as-is. `threshold` must lie in `(0, 1)`.
pub fn maybe_sparsify_copy<T, Z>(
    src: &VBuffer<T>,
    dst: &mut VBuffer<T>,
    is_zero: Z,
    threshold: f64,
) -> Result<()>
where
    T: Clone + Default,
    Z: Fn(&T) -> bool,
{
    if !(threshold > 0.0 && threshold < 1.0) {
        return Err(VectorError::InvalidThreshold(threshold));
    }
    if !src.is_dense() || src.length < SPARSIFY_MIN_LENGTH {
        copy_into(src, dst);
        return Ok(());
    }
    let limit = (src.length as f64 * threshold) as usize;
    let mut non_zero = 0usize;
    for v in src.values() {
        if !is_zero(v) {
            non_zero += 1;
            if non_zero > limit {
                copy_into(src, dst);
                return Ok(());
            }
        }
    }
    dst.length = src.length;
    dst.count = non_zero;
    dst.values.clear();
    dst.indices.clear();
    for (i, v) in src.values().iter().enumerate() {
        if !is_zero(v) {
            dst.indices.push(i);
            dst.values.push(v.clone());
        }
    }
    Ok(())
}

/// Plain structural copy of `src` into `dst`, reusing `dst`'s buffers.
pub fn copy_into<T: Clone>(src: &VBuffer<T>, dst: &mut VBuffer<T>) {
    dst.length = src.length;
    dst.count = src.count;
    dst.values.clear();
    dst.values.extend_from_slice(&src.values[..src.count]);
    dst.indices.clear();
    if !src.is_dense() {
        dst.indices.extend_from_slice(&src.indices[..src.count]);
    }
}

/// Truncating copy from a sequential container: `dst` becomes a dense vector
/// holding `source[..length]`. Elements past `length` are ignored; a source
/// shorter than `length` is an error.
pub fn copy_from_list<T: Clone>(source: &[T], dst: &mut VBuffer<T>, length: usize) -> Result<()> {
    if source.len() < length {
        return Err(VectorError::ShortSource {
            needed: length,
            available: source.len(),
        });
    }
    dst.length = length;
    dst.count = length;
    dst.indices.clear();
    dst.values.clear();
    dst.values.extend_from_slice(&source[..length]);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sparse(length: usize, indices: Vec<usize>, values: Vec<f64>) -> VBuffer<f64> {
        let count = indices.len();
        VBuffer::from_parts(length, count, values, indices).unwrap()
    }

    fn dense(values: Vec<f64>) -> VBuffer<f64> {
        let length = values.len();
        VBuffer::from_parts(length, length, values, Vec::new()).unwrap()
    }

    #[test]
    fn test_clear_dense() {
        let mut v = dense(vec![1.0, 2.0, 3.0]);
        clear(&mut v);
        assert!(v.is_dense());
        assert_eq!(v.values(), &[0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_clear_sparse_keeps_skeleton() {
        let mut v = sparse(6, vec![1, 4], vec![2.0, 5.0]);
        clear(&mut v);
        assert_eq!(v.count(), 2);
        assert_eq!(v.indices(), Some(&[1usize, 4][..]));
        assert_eq!(v.values(), &[0.0, 0.0]);
    }

    #[test]
    fn test_clear_is_idempotent() {
        let mut v = sparse(6, vec![1, 4], vec![2.0, 5.0]);
        clear(&mut v);
        let once = v.clone();
        clear(&mut v);
        assert_eq!(v, once);
    }

    #[test]
    fn test_densify_sparse() {
        let mut v = sparse(6, vec![1, 4], vec![2.0, 5.0]);
        densify(&mut v);
        assert!(v.is_dense());
        assert_eq!(v.values(), &[0.0, 2.0, 0.0, 0.0, 5.0, 0.0]);
    }

    #[test]
    fn test_densify_reuses_large_buffer_in_place() {
        // values buffer already has room for the full length
        let mut v =
            VBuffer::from_parts(4, 2, vec![7.0, 3.0, 9.0, 9.0], vec![1, 3, 0, 0]).unwrap();
        densify(&mut v);
        assert!(v.is_dense());
        assert_eq!(v.values(), &[0.0, 7.0, 0.0, 3.0]);
    }

    #[test]
    fn test_densify_entry_at_own_slot() {
        // An entry whose physical position equals its logical slot must survive.
        let mut v = sparse(4, vec![0, 3], vec![4.0, 8.0]);
        densify(&mut v);
        assert_eq!(v.values(), &[4.0, 0.0, 0.0, 8.0]);
    }

    #[test]
    fn test_densify_is_idempotent() {
        let mut v = sparse(5, vec![2], vec![1.0]);
        densify(&mut v);
        let once = v.clone();
        densify(&mut v);
        assert_eq!(v, once);
    }

    #[test]
    fn test_densify_first_k_general_case() {
        let mut v = sparse(6, vec![2, 4], vec![7.0, 9.0]);
        densify_first_k(&mut v, 3).unwrap();
        assert_eq!(v.count(), 4);
        assert_eq!(v.indices(), Some(&[0usize, 1, 2, 4][..]));
        assert_eq!(v.values(), &[0.0, 0.0, 7.0, 9.0]);
    }

    #[test]
    fn test_densify_first_k_wider_prefix() {
        let mut v = sparse(6, vec![2, 4], vec![7.0, 9.0]);
        densify_first_k(&mut v, 4).unwrap();
        assert_eq!(v.count(), 5);
        assert_eq!(v.indices(), Some(&[0usize, 1, 2, 3, 4][..]));
        assert_eq!(v.values(), &[0.0, 0.0, 7.0, 0.0, 9.0]);
    }

    #[test]
    fn test_densify_first_k_zero_is_noop() {
        let mut v = sparse(6, vec![2, 4], vec![7.0, 9.0]);
        let before = v.clone();
        densify_first_k(&mut v, 0).unwrap();
        assert_eq!(v, before);
    }

    #[test]
    fn test_densify_first_k_full_length_densifies() {
        let mut v = sparse(4, vec![1], vec![5.0]);
        densify_first_k(&mut v, 4).unwrap();
        assert!(v.is_dense());
        assert_eq!(v.values(), &[0.0, 5.0, 0.0, 0.0]);
    }

    #[test]
    fn test_densify_first_k_on_empty() {
        let mut v: VBuffer<f64> = VBuffer::empty(6);
        densify_first_k(&mut v, 3).unwrap();
        assert_eq!(v.count(), 3);
        assert_eq!(v.indices(), Some(&[0usize, 1, 2][..]));
        assert_eq!(v.values(), &[0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_densify_first_k_prefix_already_contiguous() {
        let mut v = sparse(8, vec![0, 1, 2, 6], vec![1.0, 2.0, 3.0, 4.0]);
        let before = v.clone();
        densify_first_k(&mut v, 3).unwrap();
        assert_eq!(v, before);
    }

    #[test]
    fn test_densify_first_k_mixed_prefix() {
        // Slot 1 is already explicit inside the prefix, slots 0 and 2 are not.
        let mut v = sparse(8, vec![1, 5], vec![3.0, 6.0]);
        densify_first_k(&mut v, 3).unwrap();
        assert_eq!(v.indices(), Some(&[0usize, 1, 2, 5][..]));
        assert_eq!(v.values(), &[0.0, 3.0, 0.0, 6.0]);
    }

    #[test]
    fn test_densify_first_k_out_of_range() {
        let mut v = sparse(4, vec![1], vec![5.0]);
        let err = densify_first_k(&mut v, 5).unwrap_err();
        assert!(matches!(err, VectorError::SlotOutOfRange { .. }));
    }

    #[test]
    fn test_apply_at_slot_dense() {
        let mut v = dense(vec![1.0, 2.0, 3.0]);
        apply_at_slot(&mut v, 1, |_, x| *x += 10.0).unwrap();
        assert_eq!(v.values(), &[1.0, 12.0, 3.0]);
    }

    #[test]
    fn test_apply_at_slot_sparse_present() {
        let mut v = sparse(6, vec![1, 4], vec![2.0, 5.0]);
        apply_at_slot(&mut v, 4, |_, x| *x = -*x).unwrap();
        assert_eq!(v.values(), &[2.0, -5.0]);
        assert_eq!(v.count(), 2);
    }

    #[test]
    fn test_apply_at_slot_absent_nonzero_splices() {
        let mut v = sparse(6, vec![1, 4], vec![2.0, 5.0]);
        apply_at_slot(&mut v, 3, |_, x| *x = 7.0).unwrap();
        assert_eq!(v.indices(), Some(&[1usize, 3, 4][..]));
        assert_eq!(v.values(), &[2.0, 7.0, 5.0]);
    }

    #[test]
    fn test_apply_at_slot_absent_zero_is_structure_neutral() {
        let mut v = sparse(6, vec![1, 4], vec![2.0, 5.0]);
        apply_at_slot(&mut v, 3, |_, x| *x = 0.0).unwrap();
        assert_eq!(v.count(), 2);
        assert_eq!(v.indices(), Some(&[1usize, 4][..]));
    }

    #[test]
    fn test_apply_at_slot_fill_last_gap_goes_dense() {
        let mut v = sparse(3, vec![0, 2], vec![1.0, 3.0]);
        apply_at_slot(&mut v, 1, |_, x| *x = 2.0).unwrap();
        assert!(v.is_dense());
        assert_eq!(v.values(), &[1.0, 2.0, 3.0]);
        assert_eq!(v.indices(), None);
    }

    #[test]
    fn test_apply_at_slot_custom_zero_predicate() {
        // Treat anything below 0.5 as zero.
        let mut v = sparse(6, vec![1], vec![2.0]);
        apply_at_slot_with(&mut v, 3, |_, x| *x = 0.4, |x| x.abs() < 0.5).unwrap();
        assert_eq!(v.count(), 1);
        apply_at_slot_with(&mut v, 3, |_, x| *x = 0.6, |x| x.abs() < 0.5).unwrap();
        assert_eq!(v.count(), 2);
        assert_eq!(v.get(3), 0.6);
    }

    #[test]
    fn test_apply_at_slot_out_of_range() {
        let mut v = sparse(4, vec![1], vec![5.0]);
        let err = apply_at_slot(&mut v, 4, |_, x| *x = 1.0).unwrap_err();
        assert!(matches!(err, VectorError::SlotOutOfRange { slot: 4, length: 4 }));
        // failed precondition leaves the vector untouched
        assert_eq!(v.count(), 1);
    }

    #[test]
    fn test_maybe_sparsify_copy_collapses() {
        let mut values = vec![0.0; 30];
        values[4] = 1.0;
        values[17] = -2.0;
        let src = dense(values);
        let mut dst = VBuffer::empty(0);
        maybe_sparsify_copy(&src, &mut dst, |x| *x == 0.0, 0.25).unwrap();
        assert!(!dst.is_dense());
        assert_eq!(dst.indices(), Some(&[4usize, 17][..]));
        assert_eq!(dst.values(), &[1.0, -2.0]);
        assert_eq!(dst.len(), 30);
    }

    #[test]
    fn test_maybe_sparsify_copy_too_many_nonzeros_stays_dense() {
        let values: Vec<f64> = (0..30).map(|i| (i % 2) as f64).collect();
        let src = dense(values);
        let mut dst = VBuffer::empty(0);
        maybe_sparsify_copy(&src, &mut dst, |x| *x == 0.0, 0.25).unwrap();
        assert!(dst.is_dense());
        assert!(dst.logically_eq(&src));
    }

    #[test]
    fn test_maybe_sparsify_copy_short_vector_stays_dense() {
        let src = dense(vec![0.0, 0.0, 0.0, 1.0]);
        let mut dst = VBuffer::empty(0);
        maybe_sparsify_copy(&src, &mut dst, |x| *x == 0.0, 0.25).unwrap();
        assert!(dst.is_dense());
    }

    #[test]
    fn test_maybe_sparsify_copy_sparse_source_copied_verbatim() {
        let src = sparse(40, vec![3, 9], vec![1.0, 2.0]);
        let mut dst = VBuffer::empty(0);
        maybe_sparsify_copy(&src, &mut dst, |x| *x == 0.0, 0.25).unwrap();
        assert_eq!(dst, src);
    }

    #[test]
    fn test_maybe_sparsify_copy_rejects_bad_threshold() {
        let src = dense(vec![0.0; 25]);
        let mut dst = VBuffer::empty(0);
        for t in [0.0, 1.0, -0.5, 2.0] {
            let err = maybe_sparsify_copy(&src, &mut dst, |x| *x == 0.0, t).unwrap_err();
            assert!(matches!(err, VectorError::InvalidThreshold(_)));
        }
    }

    #[test]
    fn test_sparsify_then_densify_round_trips() {
        let mut values = vec![0.0; 24];
        values[3] = 2.0;
        values[20] = 4.0;
        let src = dense(values);
        let mut copy = VBuffer::empty(0);
        maybe_sparsify_copy(&src, &mut copy, |x| *x == 0.0, 0.5).unwrap();
        densify(&mut copy);
        assert_eq!(copy, src);
    }

    #[test]
    fn test_copy_from_list() {
        let mut dst = VBuffer::empty(0);
        copy_from_list(&[1.0, 2.0, 3.0, 4.0], &mut dst, 3).unwrap();
        assert!(dst.is_dense());
        assert_eq!(dst.values(), &[1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_copy_from_list_short_source() {
        let mut dst = VBuffer::empty(0);
        let err = copy_from_list(&[1.0], &mut dst, 3).unwrap_err();
        assert!(matches!(err, VectorError::ShortSource { needed: 3, available: 1 }));
    }
}
