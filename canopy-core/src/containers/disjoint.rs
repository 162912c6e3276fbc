use std::{cell::Cell, ops::Range};

use crate::error::{Error, Result};

/// Random access to a finite sequence. The items may borrow from the sequence, which allows views such as
/// [`CoordinateRange`](super::CoordinateRange) to hand out lightweight points instead of copies
pub trait RandomAccess {
    type Item<'a>
    where
        Self: 'a;

    /// Number of items
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the item at `index`.
    ///
    /// # Panics
    ///
    /// If `index` is out of bounds
    fn at(&self, index: usize) -> Self::Item<'_>;
}

/// Recovery of the (major, minor) index pair behind a flat [`Cursor`]. The major index identifies the
/// segment that a position belongs to, the minor index is the position within that segment
pub trait IndexTranslation {
    /// Returns the index of the segment that `cursor` points into.
    ///
    /// # Panics
    ///
    /// If `cursor` was not issued by this structure
    fn major_index(&self, cursor: &Cursor) -> usize;

    /// Returns the index within the segment that `cursor` points into.
    ///
    /// # Panics
    ///
    /// If `cursor` was not issued by this structure
    fn minor_index(&self, cursor: &Cursor) -> usize;
}

/// A position in the flat index space of a [`DisjointRange`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Cursor(usize);

impl Cursor {
    /// Creates a cursor for the given flat index. Use [`DisjointRange::cursor`] for a bounds-checked cursor
    pub fn new(index: usize) -> Self {
        Self(index)
    }

    /// The flat (global) index of this cursor
    pub fn index(&self) -> usize {
        self.0
    }
}

/// Concatenation of independently stored segments, presented as one flat sequence with random access.
///
/// Locating the segment of a flat index is a binary search over the segment boundaries, which costs
/// `O(log S)` for `S` segments. The `DisjointRange` remembers the most recently located segment and checks it
/// (and its successor) first, so access patterns with locality are resolved in constant time.
///
/// Appending a segment never changes the mapping for positions in earlier segments, so all previously
/// issued [`Cursor`]s stay valid.
/// ```
/// # use canopy_core::containers::*;
/// let mut range = DisjointRange::new();
/// range.append(CoordinateRange::new(
///     Dataset::from_arrays(vec![("x", Array::new(vec![0.0; 74]))]).unwrap().selection(&["x"]).unwrap(),
/// ));
/// range.append(CoordinateRange::new(
///     Dataset::from_arrays(vec![("x", Array::new(vec![1.0; 74]))]).unwrap().selection(&["x"]).unwrap(),
/// ));
/// let cursor = range.cursor(111).unwrap();
/// assert_eq!(1, range.major_index(&cursor));
/// assert_eq!(37, range.minor_index(&cursor));
/// ```
#[derive(Debug, Clone)]
pub struct DisjointRange<R> {
    segments: Vec<R>,
    /// `bounds[i]..bounds[i + 1]` is the flat index range of segment `i`
    bounds: Vec<usize>,
    last_segment: Cell<usize>,
}

impl<R: RandomAccess> DisjointRange<R> {
    /// Creates a new empty `DisjointRange`
    pub fn new() -> Self {
        Self {
            segments: vec![],
            bounds: vec![0],
            last_segment: Cell::new(0),
        }
    }

    /// Appends `segment` at the end of this range
    pub fn append(&mut self, segment: R) {
        let end = self.len() + segment.len();
        self.segments.push(segment);
        self.bounds.push(end);
    }

    /// Total number of items over all segments
    pub fn len(&self) -> usize {
        self.bounds[self.bounds.len() - 1]
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn num_segments(&self) -> usize {
        self.segments.len()
    }

    /// Returns the segment with the given major index
    pub fn segment(&self, major: usize) -> Option<&R> {
        self.segments.get(major)
    }

    pub fn segments(&self) -> &[R] {
        &self.segments
    }

    /// Returns the flat index range covered by segment `major`
    pub fn segment_bounds(&self, major: usize) -> Option<Range<usize>> {
        if major < self.segments.len() {
            Some(self.bounds[major]..self.bounds[major + 1])
        } else {
            None
        }
    }

    /// Returns a cursor for the flat index `index`.
    ///
    /// # Errors
    ///
    /// Returns an `Error::Index` if `index` is out of bounds
    pub fn cursor(&self, index: usize) -> Result<Cursor> {
        if index < self.len() {
            Ok(Cursor(index))
        } else {
            Err(Error::Index(format!(
                "Index {} is out of bounds for a DisjointRange of length {}",
                index,
                self.len()
            )))
        }
    }

    /// Returns the cursor for position `minor` within segment `major`, or `None` if no such position exists
    pub fn cursor_of(&self, major: usize, minor: usize) -> Option<Cursor> {
        let bounds = self.segment_bounds(major)?;
        let index = bounds.start + minor;
        if index < bounds.end {
            Some(Cursor(index))
        } else {
            None
        }
    }

    /// Returns an iterator over cursors for all positions, in flat order
    pub fn cursors(&self) -> impl ExactSizeIterator<Item = Cursor> {
        (0..self.len()).map(Cursor)
    }

    /// Resolves the flat `index` into its (major, minor) index pair, or `None` if `index` is out of bounds
    pub fn locate(&self, index: usize) -> Option<(usize, usize)> {
        if index >= self.len() {
            return None;
        }
        let last = self.last_segment.get();
        let major = if self.segment_contains(last, index) {
            last
        } else if self.segment_contains(last + 1, index) {
            last + 1
        } else {
            // Number of segments starting at or before `index`. The last of these is non-empty, since
            // `index` is in bounds
            self.bounds[..self.segments.len()].partition_point(|&start| start <= index) - 1
        };
        self.last_segment.set(major);
        Some((major, index - self.bounds[major]))
    }

    /// Returns the item that `cursor` points to.
    ///
    /// # Panics
    ///
    /// If `cursor` is out of bounds
    pub fn get(&self, cursor: &Cursor) -> R::Item<'_> {
        self.at(cursor.0)
    }

    fn segment_contains(&self, major: usize, index: usize) -> bool {
        major < self.segments.len() && self.bounds[major] <= index && index < self.bounds[major + 1]
    }

    fn locate_or_panic(&self, index: usize) -> (usize, usize) {
        match self.locate(index) {
            Some(indices) => indices,
            None => panic!(
                "DisjointRange: Index {} is out of bounds for range of length {}",
                index,
                self.len()
            ),
        }
    }
}

impl<R: RandomAccess> Default for DisjointRange<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: RandomAccess> RandomAccess for DisjointRange<R> {
    type Item<'a> = R::Item<'a> where Self: 'a;

    fn len(&self) -> usize {
        DisjointRange::len(self)
    }

    fn at(&self, index: usize) -> Self::Item<'_> {
        let (major, minor) = self.locate_or_panic(index);
        self.segments[major].at(minor)
    }
}

impl<R: RandomAccess> IndexTranslation for DisjointRange<R> {
    fn major_index(&self, cursor: &Cursor) -> usize {
        self.locate_or_panic(cursor.0).0
    }

    fn minor_index(&self, cursor: &Cursor) -> usize {
        self.locate_or_panic(cursor.0).1
    }
}

#[cfg(test)]
mod tests {
    use rand::{thread_rng, Rng};

    use super::*;

    /// Segment of `len` consecutive integers starting at `first`
    #[derive(Debug, Clone)]
    struct Counting {
        first: usize,
        len: usize,
    }

    impl RandomAccess for Counting {
        type Item<'a> = usize;

        fn len(&self) -> usize {
            self.len
        }

        fn at(&self, index: usize) -> usize {
            assert!(index < self.len, "index out of bounds");
            self.first + index
        }
    }

    fn range_of(lengths: &[usize]) -> DisjointRange<Counting> {
        let mut range = DisjointRange::new();
        let mut first = 0;
        for len in lengths {
            range.append(Counting { first, len: *len });
            first += len;
        }
        range
    }

    #[test]
    fn test_two_segments_of_74() {
        let range = range_of(&[74, 74]);
        assert_eq!(148, range.len());
        assert_eq!(2, range.num_segments());

        let cursor = range.cursor(37).unwrap();
        assert_eq!(0, range.major_index(&cursor));
        assert_eq!(37, range.minor_index(&cursor));

        let cursor = range.cursor(111).unwrap();
        assert_eq!(1, range.major_index(&cursor));
        assert_eq!(37, range.minor_index(&cursor));

        assert!(matches!(range.cursor(148), Err(Error::Index(_))));
    }

    #[test]
    fn test_segment_boundaries() {
        let range = range_of(&[3, 5]);
        for index in 0..3 {
            assert_eq!(Some((0, index)), range.locate(index));
        }
        for index in 3..8 {
            assert_eq!(Some((1, index - 3)), range.locate(index));
        }
        assert_eq!(None, range.locate(8));
    }

    #[test]
    fn test_empty_segments_are_skipped() {
        let range = range_of(&[0, 2, 0, 0, 1, 0]);
        assert_eq!(3, range.len());
        assert_eq!(Some((1, 0)), range.locate(0));
        assert_eq!(Some((1, 1)), range.locate(1));
        assert_eq!(Some((4, 0)), range.locate(2));
        assert_eq!(Some(0..0), range.segment_bounds(0));
        assert_eq!(Some(2..3), range.segment_bounds(4));
        assert_eq!(None, range.segment_bounds(6));
    }

    #[test]
    fn test_empty_range() {
        let range = range_of(&[]);
        assert!(range.is_empty());
        assert_eq!(None, range.locate(0));
        assert_eq!(0, range.cursors().count());
    }

    #[test]
    fn test_random_access_matches_flat_order() {
        let lengths = (0..32)
            .map(|_| thread_rng().gen_range(0..20))
            .collect::<Vec<usize>>();
        let range = range_of(&lengths);
        let total: usize = lengths.iter().sum();
        assert_eq!(total, range.len());

        // Sequential access exercises the cached segment, random access the binary search
        for cursor in range.cursors() {
            assert_eq!(cursor.index(), range.get(&cursor));
        }
        for _ in 0..256 {
            if total == 0 {
                break;
            }
            let index = thread_rng().gen_range(0..total);
            assert_eq!(index, range.at(index));
            let (major, minor) = range.locate(index).unwrap();
            assert_eq!(Some(Cursor::new(index)), range.cursor_of(major, minor));
        }
    }

    #[test]
    fn test_cursors_survive_append() {
        let mut range = range_of(&[4, 4]);
        let cursor = range.cursor(6).unwrap();
        range.append(Counting { first: 8, len: 10 });
        assert_eq!(1, range.major_index(&cursor));
        assert_eq!(2, range.minor_index(&cursor));
        assert_eq!(6, range.get(&cursor));
    }

    #[test]
    fn test_cursor_of() {
        let range = range_of(&[2, 3]);
        assert_eq!(Some(Cursor::new(4)), range.cursor_of(1, 2));
        assert_eq!(None, range.cursor_of(1, 3));
        assert_eq!(None, range.cursor_of(2, 0));
    }
}
