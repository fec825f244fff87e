//! Single-operand iteration
//!
//! These operators traverse the explicit entries of one vector in increasing
//! slot order. None of them changes the structure of its operand; see
//! [`crate::apply`] for the structure-changing pair operators.

use crate::core::{SlotManipulator, SlotProbe, SlotProducer, SlotVisitor, VBuffer};

/// Visit every explicit entry of `v` in increasing slot order.
pub fn for_each_defined<T>(v: &VBuffer<T>, mut visit: impl SlotVisitor<T>) {
    try_for_each_defined(v, |slot, value: &T| {
        visit.visit(slot, value);
        true
    });
}

/// Visit explicit entries until the probe returns `false`.
///
/// Returns `false` iff the traversal was cut short.
pub fn try_for_each_defined<T>(v: &VBuffer<T>, mut probe: impl SlotProbe<T>) -> bool {
    if v.is_dense() {
        for (i, value) in v.values[..v.count].iter().enumerate() {
            if !probe.probe(i, value) {
                return false;
            }
        }
    } else {
        for k in 0..v.count {
            if !probe.probe(v.indices[k], &v.values[k]) {
                return false;
            }
        }
    }
    true
}

/// Overwrite the value of every explicit entry in place.
///
/// The traversal order and the structure of `v` are the same as
/// [`for_each_defined`]; only stored values change.
pub fn apply_in_place<T>(v: &mut VBuffer<T>, mut manip: impl SlotManipulator<T>) {
    let dense = v.is_dense();
    for k in 0..v.count {
        let slot = if dense { k } else { v.indices[k] };
        manip.manipulate(slot, &mut v.values[k]);
    }
}

/// Compute `dst[i] = f(i, src[i])` over the explicit positions of `src`.
///
/// `dst` takes on exactly `src`'s structural shape: same length, same count,
/// same indices when sparse. `dst`'s buffers are reused when large enough.
pub fn apply_into_either_defined<S, D>(
    src: &VBuffer<S>,
    dst: &mut VBuffer<D>,
    mut produce: impl SlotProducer<S, D>,
) {
    dst.length = src.length;
    dst.count = src.count;
    dst.values.clear();
    dst.indices.clear();
    if src.is_dense() {
        dst.values
            .extend(src.values[..src.count].iter().enumerate().map(|(i, v)| produce.produce(i, v)));
    } else {
        dst.indices.extend_from_slice(&src.indices[..src.count]);
        dst.values.extend(
            src.indices[..src.count]
                .iter()
                .zip(&src.values[..src.count])
                .map(|(&i, v)| produce.produce(i, v)),
        );
    }
}
