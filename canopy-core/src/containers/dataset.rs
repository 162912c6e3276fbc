use std::{collections::BTreeMap, ops::Index, sync::Arc};

use crate::{
    error::{Error, Result},
    layout::{DataType, Element},
};

use super::Array;

/// A point cloud stored in columnar memory layout: a mapping from unique names to [`Array`]s. All arrays
/// within a `Dataset` have the same major-axis size, which is the number of points in the point cloud.
///
/// Cloning a `Dataset` is cheap, the clone shares the column storage with the original.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    arrays: BTreeMap<String, Arc<Array>>,
}

impl Dataset {
    /// Creates a new empty `Dataset`
    pub fn new() -> Self {
        Default::default()
    }

    /// Creates a new `Dataset` from the given named arrays.
    /// ```
    /// # use canopy_core::containers::*;
    /// let dataset = Dataset::from_arrays(vec![
    ///     ("x", Array::new(vec![1.0, 1.0, 1.0])),
    ///     ("y", Array::new(vec![2.0, 1.0, 3.0])),
    /// ]).unwrap();
    /// assert_eq!(3, dataset.size_major());
    /// ```
    ///
    /// # Errors
    ///
    /// Returns an `Error::Invariant` if the arrays do not share the same major-axis size
    pub fn from_arrays<S, A, I>(arrays: I) -> Result<Self>
    where
        S: Into<String>,
        A: Into<Arc<Array>>,
        I: IntoIterator<Item = (S, A)>,
    {
        let mut dataset = Self::new();
        for (name, array) in arrays {
            dataset.add(name, array)?;
        }
        Ok(dataset)
    }

    /// Adds `array` under `name` to this `Dataset`. If an array with the same name exists, it is replaced. The
    /// first array added to an empty `Dataset` determines its major-axis size.
    ///
    /// # Errors
    ///
    /// Returns an `Error::Invariant` if the major-axis size of `array` differs from that of the other arrays
    /// in this `Dataset`
    pub fn add<S: Into<String>, A: Into<Arc<Array>>>(&mut self, name: S, array: A) -> Result<()> {
        let name = name.into();
        let array = array.into();
        let expected = self
            .arrays
            .iter()
            .find(|(existing_name, _)| **existing_name != name)
            .map(|(_, existing)| existing.size_major());
        if let Some(expected) = expected {
            if expected != array.size_major() {
                return Err(Error::Invariant(format!(
                    "Array '{}' has major-axis size {}, but the Dataset has size {}",
                    name,
                    array.size_major(),
                    expected
                )));
            }
        }
        self.arrays.insert(name, array);
        Ok(())
    }

    /// Removes the array with the given `name` and returns it, if it exists
    pub fn remove(&mut self, name: &str) -> Option<Arc<Array>> {
        self.arrays.remove(name)
    }

    /// Returns the array with the given `name`, if it exists
    pub fn get(&self, name: &str) -> Option<&Arc<Array>> {
        self.arrays.get(name)
    }

    /// Does this `Dataset` contain an array for every one of the given `names`?
    pub fn contains_all<S: AsRef<str>>(&self, names: &[S]) -> bool {
        names
            .iter()
            .all(|name| self.arrays.contains_key(name.as_ref()))
    }

    /// Returns a [`Selection`] of the arrays with the given `names`, in the order of `names`.
    ///
    /// # Errors
    ///
    /// Returns an `Error::Key` for the first name that is not part of this `Dataset`
    pub fn selection<S: AsRef<str>>(&self, names: &[S]) -> Result<Selection> {
        let arrays = names
            .iter()
            .map(|name| {
                self.arrays.get(name.as_ref()).cloned().ok_or_else(|| {
                    Error::Key(format!("No array named '{}' in Dataset", name.as_ref()))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Selection { arrays })
    }

    /// Number of points, i.e. the common major-axis size of all arrays. Zero for an empty `Dataset`
    pub fn size_major(&self) -> usize {
        self.arrays
            .values()
            .next()
            .map(|array| array.size_major())
            .unwrap_or(0)
    }

    /// Returns an iterator over the names of all arrays, in lexicographic order
    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.arrays.keys().map(|name| name.as_str())
    }

    /// Returns an iterator over all named arrays, in lexicographic order of their names
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Arc<Array>)> + '_ {
        self.arrays.iter().map(|(name, array)| (name.as_str(), array))
    }

    /// Number of arrays
    pub fn len(&self) -> usize {
        self.arrays.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arrays.is_empty()
    }
}

/// An ordered subset of the arrays of a [`Dataset`]. The order is the order in which the names were requested
/// and defines the dimension order whenever the selection is interpreted as coordinates
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Selection {
    arrays: Vec<Arc<Array>>,
}

impl Selection {
    /// Creates a `Selection` from arbitrary arrays.
    ///
    /// # Errors
    ///
    /// Returns an `Error::Invariant` if the arrays do not share the same major-axis size
    pub fn new(arrays: Vec<Arc<Array>>) -> Result<Self> {
        if let Some(first) = arrays.first() {
            if let Some(mismatch) = arrays
                .iter()
                .find(|array| array.size_major() != first.size_major())
            {
                return Err(Error::Invariant(format!(
                    "Selection mixes arrays with major-axis sizes {} and {}",
                    first.size_major(),
                    mismatch.size_major()
                )));
            }
        }
        Ok(Self { arrays })
    }

    /// Number of arrays in this selection, i.e. the dimension of its coordinates
    pub fn len(&self) -> usize {
        self.arrays.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arrays.is_empty()
    }

    /// Common major-axis size of all arrays. An empty selection has size zero
    pub fn size_major(&self) -> usize {
        self.arrays
            .first()
            .map(|array| array.size_major())
            .unwrap_or(0)
    }

    /// Returns the array for dimension `dim`
    pub fn get(&self, dim: usize) -> Option<&Arc<Array>> {
        self.arrays.get(dim)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Array>> + '_ {
        self.arrays.iter()
    }

    /// Returns the common element type of all arrays, or `None` if the selection is empty or mixes types
    pub fn data_type(&self) -> Option<DataType> {
        let first = self.arrays.first()?.data_type();
        if self.arrays.iter().all(|array| array.data_type() == first) {
            Some(first)
        } else {
            None
        }
    }

    /// Checks that all arrays store elements of type `T`.
    ///
    /// # Errors
    ///
    /// Returns an `Error::Type` naming the first dimension whose type differs
    pub fn ensure_type<T: Element>(&self) -> Result<()> {
        match self
            .arrays
            .iter()
            .position(|array| array.data_type() != T::DATA_TYPE)
        {
            Some(dim) => Err(Error::Type(format!(
                "Dimension {} of the selection stores {}, expected {}",
                dim,
                self.arrays[dim].data_type(),
                T::DATA_TYPE
            ))),
            None => Ok(()),
        }
    }

    /// Checks that all arrays are one-dimensional, so that row `i` of every array is its element `i`.
    ///
    /// # Errors
    ///
    /// Returns an `Error::Invariant` naming the first dimension whose array has more than one axis
    pub fn ensure_flat(&self) -> Result<()> {
        match self
            .arrays
            .iter()
            .position(|array| array.shape().len() != 1)
        {
            Some(dim) => Err(Error::Invariant(format!(
                "Dimension {} of the selection has shape {:?}, expected a one-dimensional array",
                dim,
                self.arrays[dim].shape()
            ))),
            None => Ok(()),
        }
    }
}

impl Index<usize> for Selection {
    type Output = Array;

    fn index(&self, dim: usize) -> &Self::Output {
        &self.arrays[dim]
    }
}
