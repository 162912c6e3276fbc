use std::iter::FromIterator;

use crate::{
    error::{Error, Result},
    layout::{ArrayData, DataType, Element},
};

/// A contiguous buffer of homogeneous numeric elements whose type is only known at runtime. In addition to
/// the elements, an `Array` records its shape, the first dimension of which is the major axis. For a column
/// of a point cloud, the major axis is the point axis, so `size_major()` is the number of points.
///
/// `Array`s are immutable after construction. They are shared through `Arc` by all `Dataset`s and `Selection`s
/// that reference them, views never copy the element data.
#[derive(Debug, Clone, PartialEq)]
pub struct Array {
    data: ArrayData,
    shape: Vec<usize>,
}

impl Array {
    /// Creates a new one-dimensional `Array` from the given values
    /// ```
    /// # use canopy_core::containers::*;
    /// # use canopy_core::layout::DataType;
    /// let array = Array::new(vec![1.0_f32, 2.0, 3.0]);
    /// assert_eq!(3, array.size_major());
    /// assert_eq!(DataType::F32, array.data_type());
    /// ```
    pub fn new<T: Element>(values: Vec<T>) -> Self {
        let len = values.len();
        Self {
            data: T::wrap(values),
            shape: vec![len],
        }
    }

    /// Creates a new `Array` from the given values with an explicit `shape`. The values are interpreted in
    /// row-major order.
    ///
    /// # Errors
    ///
    /// Returns an `Error::Invariant` if `shape` is empty or if the product of `shape` does not match the number
    /// of values
    pub fn with_shape<T: Element>(values: Vec<T>, shape: Vec<usize>) -> Result<Self> {
        Self::from_data(T::wrap(values), shape)
    }

    /// Creates a new `Array` from already type-erased storage and a `shape`. Fails for the same reasons as
    /// [`Array::with_shape`]
    pub fn from_data(data: ArrayData, shape: Vec<usize>) -> Result<Self> {
        if shape.is_empty() {
            return Err(Error::Invariant(
                "An Array must have at least one dimension".into(),
            ));
        }
        let expected_len: usize = shape.iter().product();
        if expected_len != data.len() {
            return Err(Error::Invariant(format!(
                "Shape {:?} requires {} elements, but {} were given",
                shape,
                expected_len,
                data.len()
            )));
        }
        Ok(Self { data, shape })
    }

    /// Returns the runtime element type of this `Array`
    pub fn data_type(&self) -> DataType {
        self.data.data_type()
    }

    /// Returns the type-erased storage of this `Array`
    pub fn data(&self) -> &ArrayData {
        &self.data
    }

    /// Returns the shape of this `Array`. The shape always has at least one dimension
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Total number of elements
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Size of the major (first) axis
    pub fn size_major(&self) -> usize {
        self.shape[0]
    }

    /// Returns all elements as a slice of `T`.
    ///
    /// # Errors
    ///
    /// Returns an `Error::Type` if this `Array` does not store elements of type `T`
    pub fn as_slice<T: Element>(&self) -> Result<&[T]> {
        T::unwrap_slice(&self.data).ok_or_else(|| {
            Error::Type(format!(
                "Array stores elements of type {}, but {} was requested",
                self.data_type(),
                T::DATA_TYPE
            ))
        })
    }

    /// Returns the element at the flat `index`. The caller asserts the element type through `T`.
    /// ```
    /// # use canopy_core::containers::*;
    /// let array = Array::new(vec![4_i32, 5, 6]);
    /// assert_eq!(5, array.element::<i32>(1).unwrap());
    /// assert!(array.element::<f64>(1).is_err());
    /// assert!(array.element::<i32>(3).is_err());
    /// ```
    ///
    /// # Errors
    ///
    /// Returns an `Error::Type` if `T` is not the element type of this `Array`, and an `Error::Index` if
    /// `index` is out of bounds
    pub fn element<T: Element>(&self, index: usize) -> Result<T> {
        let values = self.as_slice::<T>()?;
        values.get(index).copied().ok_or_else(|| {
            Error::Index(format!(
                "Element index {} is out of bounds for Array of length {}",
                index,
                values.len()
            ))
        })
    }
}

impl<T: Element> From<Vec<T>> for Array {
    fn from(values: Vec<T>) -> Self {
        Self::new(values)
    }
}

impl<T: Element> FromIterator<T> for Array {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}
