//! In-place pair iteration
//!
//! One engine drives both join flavors. The manipulator runs on every
//! explicit slot of `src`, receiving the destination's stored value (or the
//! implicit zero, which then becomes explicit); slots defined only in `dst`
//! are additionally visited under the outer join and preserved verbatim under
//! the inner join. The destination's support therefore grows to the union of
//! both supports, densifying when the union covers every slot.
//!
//! The engine examines nine structural cases in order, each doing the minimal
//! work for its shape. Merges that reuse the destination's buffers run from
//! the high end downward so no entry is overwritten before it is read.

use super::union_count;
use crate::buffer;
use crate::core::{PairManipulator, Result, VBuffer, VectorError};

/// Inner-join in-place combine: visit `src`'s explicit slots against `dst`.
///
/// Slots defined only in `dst` keep their values and see no visitor call.
pub fn apply_with<S, D>(
    src: &VBuffer<S>,
    dst: &mut VBuffer<D>,
    manip: impl PairManipulator<S, D>,
) -> Result<()>
where
    S: Clone + Default,
    D: Clone + Default,
{
    apply_with_core(src, dst, manip, false)
}

/// Outer-join in-place combine: visit every slot defined in either operand.
///
/// Slots missing on one side are presented as the implicit zero.
pub fn apply_with_either_defined<S, D>(
    src: &VBuffer<S>,
    dst: &mut VBuffer<D>,
    manip: impl PairManipulator<S, D>,
) -> Result<()>
where
    S: Clone + Default,
    D: Clone + Default,
{
    apply_with_core(src, dst, manip, true)
}

fn apply_with_core<S, D, F>(
    src: &VBuffer<S>,
    dst: &mut VBuffer<D>,
    mut manip: F,
    outer: bool,
) -> Result<()>
where
    S: Clone + Default,
    D: Clone + Default,
    F: PairManipulator<S, D>,
{
    if src.length != dst.length {
        return Err(VectorError::LengthMismatch {
            expected: src.length,
            actual: dst.length,
        });
    }
    let n = src.length;

    // Case 1: empty source. Inner join has nothing to do; outer join visits
    // the destination's support against zero.
    if src.count == 0 {
        if outer {
            let zero = S::default();
            let dense = dst.is_dense();
            for k in 0..dst.count {
                let slot = if dense { k } else { dst.indices[k] };
                manip.manipulate(slot, &zero, &mut dst.values[k]);
            }
        }
        return Ok(());
    }

    // Case 2: dense source. Every slot is visited, so the destination must be
    // dense too.
    if src.is_dense() {
        buffer::densify(dst);
        for i in 0..n {
            manip.manipulate(i, &src.values[i], &mut dst.values[i]);
        }
        return Ok(());
    }

    // Case 3: dense destination, sparse source.
    if dst.is_dense() {
        walk_dense_dst(src, dst, &mut manip, outer);
        return Ok(());
    }

    // Case 4: empty destination. It takes on the source's skeleton with
    // zero-valued entries.
    if dst.count == 0 {
        dst.indices.clear();
        dst.indices.extend_from_slice(&src.indices[..src.count]);
        dst.values.clear();
        dst.values.resize(src.count, D::default());
        dst.count = src.count;
        for k in 0..src.count {
            manip.manipulate(src.indices[k], &src.values[k], &mut dst.values[k]);
        }
        return Ok(());
    }

    let new_count = union_count(&src.indices[..src.count], &dst.indices[..dst.count]);
    debug_assert!(new_count <= n);

    // Case 5: the union covers every slot — densify and reuse case 3.
    if new_count == n {
        buffer::densify(dst);
        walk_dense_dst(src, dst, &mut manip, outer);
        return Ok(());
    }

    // Case 7: identical supports — lockstep walk.
    if new_count == src.count && new_count == dst.count {
        for k in 0..new_count {
            manip.manipulate(dst.indices[k], &src.values[k], &mut dst.values[k]);
        }
        return Ok(());
    }

    // Case 8: src's support is contained in dst's — walk dst, advancing a
    // source cursor on matches.
    if new_count == dst.count {
        let zero = S::default();
        let mut s = 0;
        for k in 0..dst.count {
            let slot = dst.indices[k];
            if s < src.count && src.indices[s] == slot {
                manip.manipulate(slot, &src.values[s], &mut dst.values[k]);
                s += 1;
            } else if outer {
                manip.manipulate(slot, &zero, &mut dst.values[k]);
            }
        }
        return Ok(());
    }

    // Case 9: dst's support is contained in src's — spread dst's entries onto
    // src's coordinate system (high end first; an entry's position in the
    // superset is never below its position in the subset), then walk in
    // lockstep.
    if new_count == src.count {
        if dst.values.len() < new_count {
            dst.values.resize(new_count, D::default());
        }
        let mut d = dst.count;
        for k in (0..new_count).rev() {
            if d > 0 && dst.indices[d - 1] == src.indices[k] {
                d -= 1;
                if k != d {
                    dst.values[k] = dst.values[d].clone();
                }
            } else {
                dst.values[k] = D::default();
            }
        }
        dst.indices.clear();
        dst.indices.extend_from_slice(&src.indices[..new_count]);
        dst.count = new_count;
        for k in 0..new_count {
            manip.manipulate(src.indices[k], &src.values[k], &mut dst.values[k]);
        }
        return Ok(());
    }

    // Case 6: overlapping supports, neither contained in the other. Merge
    // into the (grown) destination buffers from the high end downward; the
    // write position never drops below the highest unread destination entry.
    let old_count = dst.count;
    if dst.values.len() < new_count {
        dst.values.resize(new_count, D::default());
    }
    if dst.indices.len() < new_count {
        dst.indices.resize(new_count, 0);
    }
    let zero = S::default();
    let mut s = src.count;
    let mut d = old_count;
    for k in (0..new_count).rev() {
        let both = s > 0 && d > 0 && src.indices[s - 1] == dst.indices[d - 1];
        if both {
            s -= 1;
            d -= 1;
            let slot = src.indices[s];
            let mut value = dst.values[d].clone();
            manip.manipulate(slot, &src.values[s], &mut value);
            dst.indices[k] = slot;
            dst.values[k] = value;
        } else if d == 0 || (s > 0 && src.indices[s - 1] > dst.indices[d - 1]) {
            // unique to src
            s -= 1;
            let slot = src.indices[s];
            let mut value = D::default();
            manip.manipulate(slot, &src.values[s], &mut value);
            dst.indices[k] = slot;
            dst.values[k] = value;
        } else {
            // unique to dst
            d -= 1;
            let slot = dst.indices[d];
            let mut value = dst.values[d].clone();
            if outer {
                manip.manipulate(slot, &zero, &mut value);
            }
            dst.indices[k] = slot;
            dst.values[k] = value;
        }
    }
    debug_assert_eq!(s, 0);
    debug_assert_eq!(d, 0);
    dst.count = new_count;
    Ok(())
}

/// Cases 2/3/5 tail: sparse source against a dense destination.
fn walk_dense_dst<S, D, F>(src: &VBuffer<S>, dst: &mut VBuffer<D>, manip: &mut F, outer: bool)
where
    S: Clone + Default,
    F: PairManipulator<S, D>,
{
    if outer {
        let zero = S::default();
        let mut s = 0;
        for i in 0..dst.length {
            if s < src.count && src.indices[s] == i {
                manip.manipulate(i, &src.values[s], &mut dst.values[i]);
                s += 1;
            } else {
                manip.manipulate(i, &zero, &mut dst.values[i]);
            }
        }
    } else {
        for s in 0..src.count {
            let i = src.indices[s];
            manip.manipulate(i, &src.values[s], &mut dst.values[i]);
        }
    }
}
