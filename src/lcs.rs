//! Myers O(ND) longest-common-subsequence engine.
//!
//! Implements the divide-and-conquer ("middle snake") variant of Myers'
//! difference algorithm, parameterized by an equality predicate and an
//! operating window, and reports one LCS through a callback invoked once
//! per matched index pair, in order. The reported subsequence is not the
//! unique LCS in general, but the bisection path is deterministic, so the
//! output is reproducible for given inputs.

use crate::tracing_macros::trace;

/// A point in the edit graph addressed by x-coordinate and diagonal.
///
/// The diagonal is `k = x - y`, so the y-coordinate is implicit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KPoint {
    /// Position in the first sequence.
    pub x: isize,
    /// Diagonal index (`x - y`).
    pub k: isize,
}

impl KPoint {
    /// Position in the second sequence.
    pub fn y(self) -> isize {
        self.x - self.k
    }
}

/// An operating window: two K-points bounding the edit graph region under
/// consideration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    /// Upper-left corner of the window.
    pub left: KPoint,
    /// Lower-right corner of the window.
    pub right: KPoint,
}

impl Limits {
    /// The window covering two whole sequences of lengths `n` and `m`.
    pub fn whole(n: usize, m: usize) -> Self {
        Self {
            left: KPoint { x: 0, k: 0 },
            right: KPoint {
                x: n as isize,
                k: n as isize - m as isize,
            },
        }
    }

    /// Extent of the window along the first sequence.
    pub fn n(&self) -> isize {
        self.right.x - self.left.x
    }

    /// Extent of the window along the second sequence.
    pub fn m(&self) -> isize {
        self.right.y() - self.left.y()
    }
}

/// Furthest-reaching x values per diagonal, indexable by negative k.
struct Diagonals {
    values: Vec<isize>,
    offset: isize,
}

impl Diagonals {
    fn new(offset: isize, init: isize) -> Self {
        Self {
            values: vec![init; (2 * offset + 1) as usize],
            offset,
        }
    }

    fn get(&self, k: isize) -> isize {
        self.values[(k + self.offset) as usize]
    }

    fn set(&mut self, k: isize, x: isize) {
        self.values[(k + self.offset) as usize] = x;
    }
}

/// Myers LCS over two sequences with a caller-supplied equality predicate.
pub struct Lcs<'a, T, E> {
    a: &'a [T],
    b: &'a [T],
    equals: E,
}

impl<'a, T, E: Fn(&T, &T) -> bool> Lcs<'a, T, E> {
    /// Create an engine over `a` and `b`.
    pub fn new(a: &'a [T], b: &'a [T], equals: E) -> Self {
        Self { a, b, equals }
    }

    /// Invoke `cb(x, y)` once per matched index pair of one longest common
    /// subsequence, in order, over the whole of both sequences.
    pub fn for_each_common_symbol(&self, cb: &mut dyn FnMut(usize, usize)) {
        self.for_each_common_symbol_in(Limits::whole(self.a.len(), self.b.len()), cb);
    }

    /// Like [`for_each_common_symbol`](Self::for_each_common_symbol), but
    /// restricted to the given window.
    pub fn for_each_common_symbol_in(&self, limits: Limits, cb: &mut dyn FnMut(usize, usize)) {
        self.bisect(limits, cb);
    }

    fn bisect(&self, limits: Limits, cb: &mut dyn FnMut(usize, usize)) {
        let n = limits.n();
        let m = limits.m();
        if n <= 0 || m <= 0 {
            // One-sided insert/delete run: nothing in common.
            return;
        }

        let (d, start, end) = self.middle_snake(&limits);
        trace!(d, ?start, ?end, "middle snake");
        if d > 1 {
            self.bisect(
                Limits {
                    left: limits.left,
                    right: start,
                },
                cb,
            );
            let mut x = start.x;
            while x < end.x {
                cb(x as usize, (x - start.k) as usize);
                x += 1;
            }
            self.bisect(
                Limits {
                    left: end,
                    right: limits.right,
                },
                cb,
            );
        } else if d == 1 {
            // Exactly one insertion or deletion inside the window: walk the
            // shared prefix, skip the lone extra symbol on the longer side,
            // then the remainders pair up.
            let (mut x, mut y) = (limits.left.x, limits.left.y());
            let (rx, ry) = (limits.right.x, limits.right.y());
            while x < rx
                && y < ry
                && (self.equals)(&self.a[x as usize], &self.b[y as usize])
            {
                cb(x as usize, y as usize);
                x += 1;
                y += 1;
            }
            if rx - x > ry - y {
                x += 1;
            } else {
                y += 1;
            }
            while x < rx && y < ry {
                cb(x as usize, y as usize);
                x += 1;
                y += 1;
            }
        } else {
            // d == 0: the window is a single diagonal of matches.
            let (mut x, mut y) = (limits.left.x, limits.left.y());
            while x < limits.right.x {
                cb(x as usize, y as usize);
                x += 1;
                y += 1;
            }
        }
    }

    /// Find a middle snake of the window: returns the window's edit
    /// distance and the snake's start and end K-points (equal diagonal).
    ///
    /// Within the round that first connects the forward and backward
    /// searches, the longest overlapping snake wins; among equally long
    /// snakes the one on the higher diagonal (forward) respectively the
    /// lower diagonal (backward) is kept, so the choice is deterministic.
    fn middle_snake(&self, limits: &Limits) -> (usize, KPoint, KPoint) {
        let bx = limits.left.x;
        let by = limits.left.y();
        let kb = limits.left.k;
        let n = limits.n();
        let m = limits.m();
        let delta = n - m;
        let dmax = (n + m + 1) / 2;
        let odd = delta.rem_euclid(2) == 1;
        let offset = 2 * (n + m) + 1;
        let mut vf = Diagonals::new(offset, 0);
        let mut vb = Diagonals::new(offset, n + 1);

        for d in 0..=dmax {
            // Forward pass: k from -d to d.
            let mut best: Option<(isize, KPoint, KPoint)> = None;
            let mut k = -d;
            while k <= d {
                let mut x = if k == -d || (k != d && vf.get(k - 1) < vf.get(k + 1)) {
                    vf.get(k + 1)
                } else {
                    vf.get(k - 1) + 1
                };
                let mut y = x - k;
                let sx = x;
                while x < n
                    && y < m
                    && (self.equals)(&self.a[(bx + x) as usize], &self.b[(by + y) as usize])
                {
                    x += 1;
                    y += 1;
                }
                vf.set(k, x);
                if odd && (k - delta).abs() <= d - 1 && x >= vb.get(k) {
                    let len = x - sx;
                    if best.is_none_or(|(blen, _, _)| len >= blen) {
                        best = Some((
                            len,
                            KPoint { x: bx + sx, k: kb + k },
                            KPoint { x: bx + x, k: kb + k },
                        ));
                    }
                }
                k += 2;
            }
            if let Some((_, start, end)) = best {
                return ((2 * d - 1) as usize, start, end);
            }

            // Backward pass: diagonals delta - d to delta + d.
            let mut best: Option<(isize, KPoint, KPoint)> = None;
            let mut k2 = -d;
            while k2 <= d {
                let k = k2 + delta;
                let mut x = if k2 == -d || (k2 != d && vb.get(k + 1) - 1 < vb.get(k - 1)) {
                    vb.get(k + 1) - 1
                } else {
                    vb.get(k - 1)
                };
                let mut y = x - k;
                let ex = x;
                while x > 0
                    && y > 0
                    && (self.equals)(
                        &self.a[(bx + x - 1) as usize],
                        &self.b[(by + y - 1) as usize],
                    )
                {
                    x -= 1;
                    y -= 1;
                }
                vb.set(k, x);
                if !odd && k.abs() <= d && x <= vf.get(k) {
                    let len = ex - x;
                    if best.is_none_or(|(blen, _, _)| len > blen) {
                        best = Some((
                            len,
                            KPoint { x: bx + x, k: kb + k },
                            KPoint { x: bx + ex, k: kb + k },
                        ));
                    }
                }
                k2 += 2;
            }
            if let Some((_, start, end)) = best {
                return ((2 * d) as usize, start, end);
            }
        }
        unreachable!("middle snake search exceeded the edit-distance bound");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn common_chars(a: &str, b: &str) -> (Vec<char>, Vec<(usize, usize)>) {
        let av: Vec<char> = a.chars().collect();
        let bv: Vec<char> = b.chars().collect();
        let lcs = Lcs::new(&av, &bv, |x: &char, y: &char| x == y);
        let mut values = Vec::new();
        let mut pairs = Vec::new();
        lcs.for_each_common_symbol(&mut |x, y| {
            values.push(av[x]);
            pairs.push((x, y));
        });
        (values, pairs)
    }

    #[test]
    fn myers_paper_example() {
        let (values, pairs) = common_chars("abcabba", "cbabac");
        assert_eq!(values, vec!['c', 'a', 'b', 'a']);
        assert_eq!(pairs, vec![(2, 0), (3, 2), (4, 3), (6, 4)]);
    }

    #[test]
    fn identical_sequences_match_fully() {
        let (values, pairs) = common_chars("abc", "abc");
        assert_eq!(values, vec!['a', 'b', 'c']);
        assert_eq!(pairs, vec![(0, 0), (1, 1), (2, 2)]);
    }

    #[test]
    fn disjoint_sequences_share_nothing() {
        let (values, _) = common_chars("abc", "xyz");
        assert!(values.is_empty());
    }

    #[test]
    fn empty_sequences() {
        let (values, _) = common_chars("", "abc");
        assert!(values.is_empty());
        let (values, _) = common_chars("abc", "");
        assert!(values.is_empty());
        let (values, _) = common_chars("", "");
        assert!(values.is_empty());
    }

    #[test]
    fn single_edit_runs() {
        // One insertion.
        let (values, pairs) = common_chars("ac", "abc");
        assert_eq!(values, vec!['a', 'c']);
        assert_eq!(pairs, vec![(0, 0), (1, 2)]);
        // One deletion.
        let (values, pairs) = common_chars("abc", "ac");
        assert_eq!(values, vec!['a', 'c']);
        assert_eq!(pairs, vec![(0, 0), (2, 1)]);
    }

    #[test]
    fn output_is_reproducible() {
        let first = common_chars("xmjyauz", "mzjawxu");
        let second = common_chars("xmjyauz", "mzjawxu");
        assert_eq!(first, second);
        // LCS of this classic pair has length 4.
        assert_eq!(first.0.len(), 4);
    }

    #[test]
    fn restricted_window_confines_matches() {
        let av: Vec<char> = "xxabyy".chars().collect();
        let bv: Vec<char> = "zzabww".chars().collect();
        let lcs = Lcs::new(&av, &bv, |x: &char, y: &char| x == y);

        // Window over indices 2..4 of both sequences.
        let limits = Limits {
            left: KPoint { x: 2, k: 0 },
            right: KPoint { x: 4, k: 0 },
        };
        let mut pairs = Vec::new();
        lcs.for_each_common_symbol_in(limits, &mut |x, y| pairs.push((x, y)));
        assert_eq!(pairs, vec![(2, 2), (3, 3)]);
    }

    #[test]
    fn callback_pairs_are_strictly_increasing() {
        let (_, pairs) = common_chars("gacwkxqwmlzjtu", "gawxqkzjmtlu");
        for w in pairs.windows(2) {
            assert!(w[0].0 < w[1].0, "x indices must increase: {:?}", pairs);
            assert!(w[0].1 < w[1].1, "y indices must increase: {:?}", pairs);
        }
    }
}
