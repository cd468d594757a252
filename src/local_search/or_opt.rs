//! Or-opt neighborhood: relocate segments of one to three consecutive points.

use super::utils::CostMatrix;
use super::LocalSearch;

/// Longest segment moved by a single Or-opt move.
const MAX_SEGMENT: usize = 3;

/// An evaluated relocation of `path[start..start + len]` behind `path[target]`.
#[derive(Debug, Clone, Copy)]
struct Relocation {
    start: usize,
    len: usize,
    target: usize,
    reversed: bool,
    delta: i64,
}

impl LocalSearch {
    /// One sweep of granular Or-opt moves, applying every improving move found.
    pub fn or_opt_neighborhood(&mut self, path: &mut Vec<usize>, costs: &CostMatrix) -> bool {
        let n = path.len();
        if n < 3 {
            return false;
        }

        let mut improvement = false;

        for len in 1..=MAX_SEGMENT {
            let mut start = 1;
            while start + len <= path.len() {
                if self.expired() {
                    return improvement;
                }

                match self.best_relocation(path, costs, start, len) {
                    Some(relocation) => {
                        self.apply_relocation(path, relocation);
                        improvement = true;
                    }
                    None => start += 1,
                }
            }
        }

        improvement
    }

    /// The most improving relocation of the segment starting at `start`.
    fn best_relocation(
        &self,
        path: &[usize],
        costs: &CostMatrix,
        start: usize,
        len: usize,
    ) -> Option<Relocation> {
        let end = start + len - 1;
        let first = path[start];
        let last = path[end];
        let prev = path[start - 1];
        let next = path.get(end + 1).copied();

        let removal_gain = costs.get(prev, first)
            + next.map_or(0, |next| costs.get(last, next) - costs.get(prev, next));

        let mut best: Option<Relocation> = None;

        for &anchor in self.neighbors[first].iter().chain(&self.neighbors[last]) {
            let target = self.positions[anchor];
            // The segment itself, or where it already sits
            if (start - 1..=end).contains(&target) {
                continue;
            }

            let after = path.get(target + 1).copied();
            let detached = after.map_or(0, |after| costs.get(anchor, after));

            for reversed in [false, true] {
                let (head, tail) = if reversed { (last, first) } else { (first, last) };
                let insertion = costs.get(anchor, head)
                    + after.map_or(0, |after| costs.get(tail, after))
                    - detached;
                let delta = insertion - removal_gain;

                if delta < 0 && best.map_or(true, |b| delta < b.delta) {
                    best = Some(Relocation {
                        start,
                        len,
                        target,
                        reversed,
                        delta,
                    });
                }
            }
        }

        best
    }

    fn apply_relocation(&mut self, path: &mut Vec<usize>, relocation: Relocation) {
        let Relocation {
            start,
            len,
            target,
            reversed,
            ..
        } = relocation;

        let mut segment: Vec<usize> = path.drain(start..start + len).collect();
        if reversed {
            segment.reverse();
        }

        let insert_at = if target > start { target - len + 1 } else { target + 1 };
        path.splice(insert_at..insert_at, segment);

        self.refresh_positions(path);
    }
}
