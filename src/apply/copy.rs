//! Pair iteration with a separate output buffer
//!
//! Same join semantics as [`crate::apply::in_place`], but the computed values
//! land in a third buffer and the destination operand stays untouched. Under
//! the inner join, destination values at slots outside the source's support
//! are copied into the result verbatim, with no visitor call. The union count
//! is computed before anything is written so the result buffers are sized
//! exactly once; reusing the caller's buffers is an optimization, not a
//! guarantee.

use super::union_count;
use crate::core::{PairProducer, Result, VBuffer, VectorError};

/// Inner-join combine into `res`; `dst` is read-only.
pub fn apply_with_copy<S, D>(
    src: &VBuffer<S>,
    dst: &VBuffer<D>,
    res: &mut VBuffer<D>,
    produce: impl PairProducer<S, D>,
) -> Result<()>
where
    S: Clone + Default,
    D: Clone + Default,
{
    apply_with_copy_core(src, dst, res, produce, false)
}

/// Outer-join combine into `res`; `dst` is read-only.
pub fn apply_with_either_defined_copy<S, D>(
    src: &VBuffer<S>,
    dst: &VBuffer<D>,
    res: &mut VBuffer<D>,
    produce: impl PairProducer<S, D>,
) -> Result<()>
where
    S: Clone + Default,
    D: Clone + Default,
{
    apply_with_copy_core(src, dst, res, produce, true)
}

fn apply_with_copy_core<S, D, F>(
    src: &VBuffer<S>,
    dst: &VBuffer<D>,
    res: &mut VBuffer<D>,
    mut produce: F,
    outer: bool,
) -> Result<()>
where
    S: Clone + Default,
    D: Clone + Default,
    F: PairProducer<S, D>,
{
    if src.length != dst.length {
        return Err(VectorError::LengthMismatch {
            expected: src.length,
            actual: dst.length,
        });
    }
    let n = src.length;
    res.length = n;
    res.values.clear();
    res.indices.clear();

    // Empty source: the result mirrors dst's shape.
    if src.count == 0 {
        res.count = dst.count;
        if !dst.is_dense() {
            res.indices.extend_from_slice(&dst.indices[..dst.count]);
        }
        if outer {
            let zero = S::default();
            let dense = dst.is_dense();
            for k in 0..dst.count {
                let slot = if dense { k } else { dst.indices[k] };
                res.values.push(produce.produce(slot, &zero, &dst.values[k]));
            }
        } else {
            res.values.extend_from_slice(&dst.values[..dst.count]);
        }
        return Ok(());
    }

    // Dense source: dense result, one pass.
    if src.is_dense() {
        res.count = n;
        res.values.reserve(n);
        if dst.is_dense() {
            for i in 0..n {
                res.values.push(produce.produce(i, &src.values[i], &dst.values[i]));
            }
        } else {
            let zero = D::default();
            let mut d = 0;
            for i in 0..n {
                let dv = if d < dst.count && dst.indices[d] == i {
                    d += 1;
                    &dst.values[d - 1]
                } else {
                    &zero
                };
                res.values.push(produce.produce(i, &src.values[i], dv));
            }
        }
        return Ok(());
    }

    // Sparse source, dense destination: dense result.
    if dst.is_dense() {
        res.count = n;
        res.values.reserve(n);
        let zero = S::default();
        let mut s = 0;
        for i in 0..n {
            let sv = if s < src.count && src.indices[s] == i {
                s += 1;
                Some(&src.values[s - 1])
            } else {
                None
            };
            let value = match sv {
                Some(sv) => produce.produce(i, sv, &dst.values[i]),
                None if outer => produce.produce(i, &zero, &dst.values[i]),
                None => dst.values[i].clone(),
            };
            res.values.push(value);
        }
        return Ok(());
    }

    // Sparse source, empty destination: the result takes src's skeleton.
    if dst.count == 0 {
        let zero = D::default();
        res.count = src.count;
        res.indices.extend_from_slice(&src.indices[..src.count]);
        res.values.reserve(src.count);
        for k in 0..src.count {
            res.values.push(produce.produce(src.indices[k], &src.values[k], &zero));
        }
        return Ok(());
    }

    // Both sparse and non-empty: size the result from the union count first.
    let new_count = union_count(&src.indices[..src.count], &dst.indices[..dst.count]);
    debug_assert!(new_count <= n);
    let zero_s = S::default();
    let zero_d = D::default();

    if new_count == n {
        // Union covers every slot: dense result via a full-slot walk.
        res.count = n;
        res.values.reserve(n);
        let mut s = 0;
        let mut d = 0;
        for i in 0..n {
            let s_here = s < src.count && src.indices[s] == i;
            let d_here = d < dst.count && dst.indices[d] == i;
            let value = if s_here {
                s += 1;
                let sv = &src.values[s - 1];
                if d_here {
                    d += 1;
                    produce.produce(i, sv, &dst.values[d - 1])
                } else {
                    produce.produce(i, sv, &zero_d)
                }
            } else {
                debug_assert!(d_here);
                d += 1;
                let dv = &dst.values[d - 1];
                if outer {
                    produce.produce(i, &zero_s, dv)
                } else {
                    dv.clone()
                }
            };
            res.values.push(value);
        }
        return Ok(());
    }

    // Sparse result: forward merge (a third buffer has no aliasing hazard).
    res.count = new_count;
    res.values.reserve(new_count);
    res.indices.reserve(new_count);
    let mut s = 0;
    let mut d = 0;
    while s < src.count || d < dst.count {
        let take_src = d == dst.count
            || (s < src.count && src.indices[s] <= dst.indices[d]);
        if take_src {
            let slot = src.indices[s];
            let value = if d < dst.count && dst.indices[d] == slot {
                d += 1;
                produce.produce(slot, &src.values[s], &dst.values[d - 1])
            } else {
                produce.produce(slot, &src.values[s], &zero_d)
            };
            res.indices.push(slot);
            res.values.push(value);
            s += 1;
        } else {
            let slot = dst.indices[d];
            let value = if outer {
                produce.produce(slot, &zero_s, &dst.values[d])
            } else {
                dst.values[d].clone()
            };
            res.indices.push(slot);
            res.values.push(value);
            d += 1;
        }
    }
    debug_assert_eq!(res.values.len(), new_count);
    Ok(())
}
