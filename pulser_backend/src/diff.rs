//! Run-length difference of two output bitmaps.
//!
//! The synchronization engine paints the old and the new state of every changed pulse into
//! two byte maps and asks [`DiffScanner`] for the places where they disagree. Each
//! [`Run`] it yields is one contiguous hardware write: a maximal span where the maps
//! differ *and* the old value is constant, so the whole span can be set (old value `0`)
//! or reset (old value `1`) with a single command.
//!
//! The scanner owns its cursor: runs come out strictly left to right, each position is
//! inspected once, and the iterator is exhausted for good after the last run.
//!
//! ```
//! use ndarray::array;
//! use pulser_backend::diff::{DiffScanner, Run, Sign};
//!
//! let before = array![0u8, 1, 1, 0, 0, 0];
//! let after = array![0u8, 0, 0, 0, 1, 1];
//! let runs: Vec<Run> = DiffScanner::new(before.view(), after.view()).collect();
//! assert_eq!(
//!     runs,
//!     vec![
//!         Run { sign: Sign::Reset, start: 1, length: 2 },
//!         Run { sign: Sign::Set, start: 4, length: 2 },
//!     ]
//! );
//! ```

use std::fmt;
use std::iter::FusedIterator;

use ndarray::{s, Array1, ArrayView1};

use crate::timebase::Ticks;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sign {
    /// Turn bits on
    Set,
    /// Turn bits off
    Reset,
}

impl Sign {
    /// Output level written by a run of this sign.
    pub fn state(&self) -> bool {
        matches!(self, Sign::Set)
    }
}

/// One contiguous write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Run {
    pub sign: Sign,
    pub start: Ticks,
    pub length: Ticks,
}

impl fmt::Display for Run {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op = match self.sign {
            Sign::Set => "set",
            Sign::Reset => "reset",
        };
        write!(f, "{}({}, {})", op, self.start, self.length)
    }
}

pub struct DiffScanner<'a> {
    before: ArrayView1<'a, u8>,
    after: ArrayView1<'a, u8>,
    cursor: usize,
}

impl<'a> DiffScanner<'a> {
    /// # Panics
    /// If the two maps differ in length.
    pub fn new(before: ArrayView1<'a, u8>, after: ArrayView1<'a, u8>) -> Self {
        assert_eq!(
            before.len(),
            after.len(),
            "diffing bitmaps of different lengths"
        );
        Self {
            before,
            after,
            cursor: 0,
        }
    }
}

impl<'a> Iterator for DiffScanner<'a> {
    type Item = Run;

    fn next(&mut self) -> Option<Run> {
        let len = self.before.len();
        while self.cursor < len && self.before[self.cursor] == self.after[self.cursor] {
            self.cursor += 1;
        }
        if self.cursor >= len {
            return None;
        }
        let start = self.cursor;
        let level = self.before[start];
        while self.cursor < len
            && self.before[self.cursor] != self.after[self.cursor]
            && self.before[self.cursor] == level
        {
            self.cursor += 1;
        }
        Some(Run {
            sign: if level != 0 { Sign::Reset } else { Sign::Set },
            start: start as Ticks,
            length: (self.cursor - start) as Ticks,
        })
    }
}

impl<'a> FusedIterator for DiffScanner<'a> {}

/// Writes a run of ones into `map`, clipped to the map.
pub fn paint(map: &mut Array1<u8>, start: Ticks, length: Ticks) {
    let len = map.len() as Ticks;
    let from = start.clamp(0, len);
    let to = (start + length).clamp(from, len);
    if to > from {
        map.slice_mut(s![from as usize..to as usize]).fill(1);
    }
}

/// Applies runs to a map the way the hardware would.
pub fn apply(map: &mut Array1<u8>, runs: &[Run]) {
    for run in runs {
        let value = u8::from(run.sign.state());
        map.slice_mut(s![run.start as usize..(run.start + run.length) as usize])
            .fill(value);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use ndarray::Array1;
    use proptest::prelude::*;

    fn runs_of(before: &Array1<u8>, after: &Array1<u8>) -> Vec<Run> {
        DiffScanner::new(before.view(), after.view()).collect()
    }

    /// Counts maximal spans where the maps differ and the old value is constant.
    fn count_runs(before: &[u8], after: &[u8]) -> usize {
        let mut count = 0;
        let mut prev: Option<u8> = None;
        for i in 0..before.len() {
            if before[i] != after[i] {
                if prev != Some(before[i]) {
                    count += 1;
                }
                prev = Some(before[i]);
            } else {
                prev = None;
            }
        }
        count
    }

    #[test]
    fn identical_maps_give_nothing() {
        let map = Array1::from(vec![0u8, 1, 1, 0, 1]);
        let mut scanner = DiffScanner::new(map.view(), map.view());
        assert_eq!(scanner.next(), None);
        assert_eq!(scanner.next(), None);
    }

    #[test]
    fn empty_maps() {
        let map = Array1::<u8>::zeros(0);
        assert!(runs_of(&map, &map).is_empty());
    }

    #[test]
    fn moved_pulse_gives_two_runs() {
        let mut before = Array1::<u8>::zeros(1000);
        let mut after = Array1::<u8>::zeros(1000);
        paint(&mut before, 100, 20);
        paint(&mut after, 150, 20);
        assert_eq!(
            runs_of(&before, &after),
            vec![
                Run { sign: Sign::Reset, start: 100, length: 20 },
                Run { sign: Sign::Set, start: 150, length: 20 },
            ]
        );
    }

    #[test]
    fn overlapping_move_only_writes_the_edges() {
        let mut before = Array1::<u8>::zeros(100);
        let mut after = Array1::<u8>::zeros(100);
        paint(&mut before, 10, 20);
        paint(&mut after, 15, 20);
        assert_eq!(
            runs_of(&before, &after),
            vec![
                Run { sign: Sign::Reset, start: 10, length: 5 },
                Run { sign: Sign::Set, start: 30, length: 5 },
            ]
        );
    }

    #[test]
    fn adjacent_runs_of_opposite_sign_are_split() {
        let before = Array1::from(vec![0u8, 0, 1, 1]);
        let after = Array1::from(vec![1u8, 1, 0, 0]);
        let runs = runs_of(&before, &after);
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0], Run { sign: Sign::Set, start: 0, length: 2 });
        assert_eq!(runs[1], Run { sign: Sign::Reset, start: 2, length: 2 });
    }

    #[test]
    fn paint_clips() {
        let mut map = Array1::<u8>::zeros(10);
        paint(&mut map, 8, 5);
        paint(&mut map, -3, 4);
        assert_eq!(map.to_vec(), vec![1, 0, 0, 0, 0, 0, 0, 0, 1, 1]);
    }

    proptest! {
        #[test]
        fn applying_runs_reproduces_after(
            (before, after) in (0usize..300).prop_flat_map(|n| (
                prop::collection::vec(0u8..2, n),
                prop::collection::vec(0u8..2, n),
            ))
        ) {
            let before = Array1::from(before);
            let after = Array1::from(after);
            let runs = runs_of(&before, &after);

            let mut replay = before.clone();
            apply(&mut replay, &runs);
            prop_assert_eq!(&replay, &after);

            prop_assert_eq!(
                runs.len(),
                count_runs(before.as_slice().unwrap(), after.as_slice().unwrap())
            );
            for pair in runs.windows(2) {
                prop_assert!(pair[0].start + pair[0].length <= pair[1].start);
                // Touching runs must differ in sign, otherwise they should have been one
                if pair[0].start + pair[0].length == pair[1].start {
                    prop_assert_ne!(pair[0].sign, pair[1].sign);
                }
            }
        }

        #[test]
        fn equal_maps_never_emit(map in prop::collection::vec(0u8..2, 0..300)) {
            let map = Array1::from(map);
            prop_assert!(runs_of(&map, &map).is_empty());
        }
    }
}
