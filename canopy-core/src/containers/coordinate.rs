use nalgebra::DVector;

use crate::{
    error::{Error, Result},
    layout::Element,
    math::MinMax,
};

use super::{RandomAccess, Selection};

/// A single point of a [`Selection`], interpreted as a coordinate with one dimension per selected array. The
/// row index is mutable, so the same `CoordinatePoint` can be re-targeted to every row of the selection
/// without any allocation
#[derive(Debug, Clone, Copy)]
pub struct CoordinatePoint<'a> {
    selection: &'a Selection,
    index: usize,
}

impl<'a> CoordinatePoint<'a> {
    /// Creates a new `CoordinatePoint` for row `index` of `selection`. The index is not validated here, use
    /// [`CoordinatePoint::get`] for checked access
    pub fn new(selection: &'a Selection, index: usize) -> Self {
        Self { selection, index }
    }

    /// Number of dimensions, i.e. the number of arrays in the underlying selection
    pub fn size(&self) -> usize {
        self.selection.len()
    }

    /// Row index this point refers to
    pub fn index(&self) -> usize {
        self.index
    }

    /// Re-targets this point to row `index`
    pub fn set_index(&mut self, index: usize) {
        self.index = index;
    }

    /// The selection this point reads from
    pub fn selection(&self) -> &'a Selection {
        self.selection
    }

    /// Returns the value of dimension `dim` at the current row. This is the unchecked accessor intended for
    /// hot loops where the element type has already been validated, e.g. through [`Selection::ensure_type`].
    ///
    /// # Panics
    ///
    /// If `dim` or the current row index are out of bounds, if dimension `dim` does not store elements of type
    /// `T`, or if its array is not one-dimensional
    pub fn at<T: Element>(&self, dim: usize) -> T {
        let array = &self.selection[dim];
        if array.shape().len() != 1 {
            panic!(
                "CoordinatePoint::at: Dimension {} has shape {:?}, expected a one-dimensional array",
                dim,
                array.shape()
            );
        }
        match T::unwrap_slice(array.data()) {
            Some(values) => values[self.index],
            None => panic!(
                "CoordinatePoint::at: Dimension {} does not store elements of type {}",
                dim,
                T::DATA_TYPE
            ),
        }
    }

    /// Checked version of [`CoordinatePoint::at`].
    ///
    /// # Errors
    ///
    /// Returns an `Error::Index` if `dim` or the current row index are out of bounds, an `Error::Type` if
    /// dimension `dim` does not store elements of type `T`, and an `Error::Invariant` if its array is not
    /// one-dimensional
    pub fn get<T: Element>(&self, dim: usize) -> Result<T> {
        let array = self.selection.get(dim).ok_or_else(|| {
            Error::Index(format!(
                "Dimension {} is out of bounds for a point of size {}",
                dim,
                self.size()
            ))
        })?;
        if array.shape().len() != 1 {
            return Err(Error::Invariant(format!(
                "Dimension {} has shape {:?}, expected a one-dimensional array",
                dim,
                array.shape()
            )));
        }
        if self.index >= array.size_major() {
            return Err(Error::Index(format!(
                "Row {} is out of bounds for a selection of {} rows",
                self.index,
                array.size_major()
            )));
        }
        array.element(self.index)
    }

    /// Copies all dimensions of this point into a vector
    pub fn to_vector<T: Element>(&self) -> Result<DVector<T>> {
        let values = (0..self.size())
            .map(|dim| self.get::<T>(dim))
            .collect::<Result<Vec<_>>>()?;
        Ok(DVector::from_vec(values))
    }
}

/// A lazy sequence of [`CoordinatePoint`]s over all rows of a [`Selection`]. Every call to `iter` starts a
/// fresh traversal at row zero
#[derive(Debug, Clone, Default)]
pub struct CoordinateRange {
    selection: Selection,
}

impl CoordinateRange {
    pub fn new(selection: Selection) -> Self {
        Self { selection }
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    /// Number of points, which is the major-axis size of the selection
    pub fn len(&self) -> usize {
        self.selection.size_major()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of dimensions of each point
    pub fn dimensions(&self) -> usize {
        self.selection.len()
    }

    /// Returns the point at row `index`, or `None` if `index` is out of bounds
    pub fn point(&self, index: usize) -> Option<CoordinatePoint<'_>> {
        if index < self.len() {
            Some(CoordinatePoint::new(&self.selection, index))
        } else {
            None
        }
    }

    pub fn iter(&self) -> CoordinateIter<'_> {
        CoordinateIter {
            point: CoordinatePoint::new(&self.selection, 0),
            head: 0,
            tail: self.len(),
        }
    }

    /// Computes the component-wise minimum and maximum over all points. Returns `None` if the range is empty.
    ///
    /// # Errors
    ///
    /// Returns an `Error::Type` if any dimension does not store elements of type `T`, and an `Error::Invariant`
    /// if any dimension is not a one-dimensional array
    pub fn bounds<T: Element + MinMax>(&self) -> Result<Option<(DVector<T>, DVector<T>)>> {
        self.selection.ensure_type::<T>()?;
        self.selection.ensure_flat()?;
        let mut points = self.iter();
        let first = match points.next() {
            Some(point) => point,
            None => return Ok(None),
        };
        let dims = self.dimensions();
        let mut min = DVector::from_fn(dims, |dim, _| first.at::<T>(dim));
        let mut max = min.clone();
        for point in points {
            for dim in 0..dims {
                let value = point.at::<T>(dim);
                min[dim] = min[dim].infimum(&value);
                max[dim] = max[dim].supremum(&value);
            }
        }
        Ok(Some((min, max)))
    }
}

impl RandomAccess for CoordinateRange {
    type Item<'a> = CoordinatePoint<'a>;

    fn len(&self) -> usize {
        self.selection.size_major()
    }

    fn at(&self, index: usize) -> Self::Item<'_> {
        if index >= RandomAccess::len(self) {
            panic!(
                "CoordinateRange::at: Index {} is out of bounds for range of length {}",
                index,
                RandomAccess::len(self)
            );
        }
        CoordinatePoint::new(&self.selection, index)
    }
}

/// Iterator over the points of a [`CoordinateRange`]
#[derive(Debug, Clone)]
pub struct CoordinateIter<'a> {
    point: CoordinatePoint<'a>,
    head: usize,
    tail: usize,
}

impl<'a> Iterator for CoordinateIter<'a> {
    type Item = CoordinatePoint<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.head == self.tail {
            None
        } else {
            self.point.set_index(self.head);
            self.head += 1;
            Some(self.point)
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.tail - self.head;
        (remaining, Some(remaining))
    }
}

impl<'a> ExactSizeIterator for CoordinateIter<'a> {}

impl<'a> IntoIterator for &'a CoordinateRange {
    type Item = CoordinatePoint<'a>;
    type IntoIter = CoordinateIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
