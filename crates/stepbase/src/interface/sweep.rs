//! Sort-and-sweep broadphase along X.

use stepbase_math::Aabb3;

/// Index pairs `(i, j)`, `i < j`, of overlapping boxes.
pub(crate) fn overlapping_pairs(boxes: &[Aabb3]) -> Vec<(usize, usize)> {
    let mut order: Vec<usize> = (0..boxes.len()).collect();
    order.sort_by(|&a, &b| boxes[a].min.x.total_cmp(&boxes[b].min.x));

    let mut active: Vec<usize> = Vec::new();
    let mut pairs = Vec::new();
    for &i in &order {
        let current = &boxes[i];
        active.retain(|&j| boxes[j].max.x >= current.min.x);
        for &j in &active {
            if boxes[j].overlaps(current) {
                pairs.push((i.min(j), i.max(j)));
            }
        }
        active.push(i);
    }
    pairs.sort_unstable();
    pairs
}
