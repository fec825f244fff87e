//! Read-only pair iteration
//!
//! Inner and outer joins over the index sets of two vectors of equal logical
//! length. Both traversals visit slots in strictly increasing order; the
//! sparse/sparse cases are two-cursor merges over the sorted index arrays, so
//! the cost stays linear in the number of explicit entries.

use crate::core::{PairProbe, PairVisitor, Result, VBuffer, VectorError};

fn check_lengths<A, B>(a: &VBuffer<A>, b: &VBuffer<B>) -> Result<()> {
    if a.length != b.length {
        return Err(VectorError::LengthMismatch {
            expected: a.length,
            actual: b.length,
        });
    }
    Ok(())
}

/// Visit every slot defined in **both** operands (inner join).
pub fn for_each_both_defined<A, B>(
    a: &VBuffer<A>,
    b: &VBuffer<B>,
    mut visit: impl PairVisitor<A, B>,
) -> Result<()> {
    try_for_each_both_defined(a, b, |slot, x: &A, y: &B| {
        visit.visit(slot, x, y);
        true
    })
    .map(|_| ())
}

/// [`for_each_both_defined`] with early exit.
///
/// Returns `Ok(false)` iff the probe cut the traversal short.
pub fn try_for_each_both_defined<A, B>(
    a: &VBuffer<A>,
    b: &VBuffer<B>,
    mut probe: impl PairProbe<A, B>,
) -> Result<bool> {
    check_lengths(a, b)?;
    match (a.is_dense(), b.is_dense()) {
        (true, true) => {
            for i in 0..a.length {
                if !probe.probe(i, &a.values[i], &b.values[i]) {
                    return Ok(false);
                }
            }
        }
        (true, false) => {
            for k in 0..b.count {
                let i = b.indices[k];
                if !probe.probe(i, &a.values[i], &b.values[k]) {
                    return Ok(false);
                }
            }
        }
        (false, true) => {
            for k in 0..a.count {
                let i = a.indices[k];
                if !probe.probe(i, &a.values[k], &b.values[i]) {
                    return Ok(false);
                }
            }
        }
        (false, false) => {
            let mut ka = 0;
            let mut kb = 0;
            while ka < a.count && kb < b.count {
                match a.indices[ka].cmp(&b.indices[kb]) {
                    std::cmp::Ordering::Less => ka += 1,
                    std::cmp::Ordering::Greater => kb += 1,
                    std::cmp::Ordering::Equal => {
                        if !probe.probe(a.indices[ka], &a.values[ka], &b.values[kb]) {
                            return Ok(false);
                        }
                        ka += 1;
                        kb += 1;
                    }
                }
            }
        }
    }
    Ok(true)
}

/// Visit every slot defined in **either** operand (outer join), supplying the
/// implicit zero for the side where the slot is missing.
pub fn for_each_either_defined<A, B>(
    a: &VBuffer<A>,
    b: &VBuffer<B>,
    mut visit: impl PairVisitor<A, B>,
) -> Result<()>
where
    A: Default,
    B: Default,
{
    try_for_each_either_defined(a, b, |slot, x: &A, y: &B| {
        visit.visit(slot, x, y);
        true
    })
    .map(|_| ())
}

/// [`for_each_either_defined`] with early exit.
pub fn try_for_each_either_defined<A, B>(
    a: &VBuffer<A>,
    b: &VBuffer<B>,
    mut probe: impl PairProbe<A, B>,
) -> Result<bool>
where
    A: Default,
    B: Default,
{
    check_lengths(a, b)?;
    let zero_a = A::default();
    let zero_b = B::default();
    match (a.is_dense(), b.is_dense()) {
        (true, true) => {
            for i in 0..a.length {
                if !probe.probe(i, &a.values[i], &b.values[i]) {
                    return Ok(false);
                }
            }
        }
        (true, false) => {
            let mut kb = 0;
            for i in 0..a.length {
                let vb = if kb < b.count && b.indices[kb] == i {
                    kb += 1;
                    &b.values[kb - 1]
                } else {
                    &zero_b
                };
                if !probe.probe(i, &a.values[i], vb) {
                    return Ok(false);
                }
            }
        }
        (false, true) => {
            let mut ka = 0;
            for i in 0..b.length {
                let va = if ka < a.count && a.indices[ka] == i {
                    ka += 1;
                    &a.values[ka - 1]
                } else {
                    &zero_a
                };
                if !probe.probe(i, va, &b.values[i]) {
                    return Ok(false);
                }
            }
        }
        (false, false) => {
            let mut ka = 0;
            let mut kb = 0;
            while ka < a.count && kb < b.count {
                let go_on = match a.indices[ka].cmp(&b.indices[kb]) {
                    std::cmp::Ordering::Less => {
                        ka += 1;
                        probe.probe(a.indices[ka - 1], &a.values[ka - 1], &zero_b)
                    }
                    std::cmp::Ordering::Greater => {
                        kb += 1;
                        probe.probe(b.indices[kb - 1], &zero_a, &b.values[kb - 1])
                    }
                    std::cmp::Ordering::Equal => {
                        ka += 1;
                        kb += 1;
                        probe.probe(a.indices[ka - 1], &a.values[ka - 1], &b.values[kb - 1])
                    }
                };
                if !go_on {
                    return Ok(false);
                }
            }
            // Drain whichever cursor still has entries.
            while ka < a.count {
                if !probe.probe(a.indices[ka], &a.values[ka], &zero_b) {
                    return Ok(false);
                }
                ka += 1;
            }
            while kb < b.count {
                if !probe.probe(b.indices[kb], &zero_a, &b.values[kb]) {
                    return Ok(false);
                }
                kb += 1;
            }
        }
    }
    Ok(true)
}
