use std::fmt::{Debug, Display};

use static_assertions::const_assert_eq;

/// Possible element types of an [`Array`](crate::containers::Array)
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DataType {
    U8,
    I8,
    U16,
    I16,
    U32,
    I32,
    U64,
    I64,
    F32,
    F64,
}

impl DataType {
    /// Returns the size in bytes of a single element of this `DataType`
    /// ```
    /// # use canopy_core::layout::*;
    /// assert_eq!(8, DataType::F64.size());
    /// assert_eq!(2, DataType::I16.size());
    /// ```
    pub const fn size(&self) -> usize {
        match self {
            DataType::U8 | DataType::I8 => 1,
            DataType::U16 | DataType::I16 => 2,
            DataType::U32 | DataType::I32 | DataType::F32 => 4,
            DataType::U64 | DataType::I64 | DataType::F64 => 8,
        }
    }

    /// Is this a floating point type?
    pub fn is_float(&self) -> bool {
        matches!(self, DataType::F32 | DataType::F64)
    }
}

impl Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            DataType::U8 => "u8",
            DataType::I8 => "i8",
            DataType::U16 => "u16",
            DataType::I16 => "i16",
            DataType::U32 => "u32",
            DataType::I32 => "i32",
            DataType::U64 => "u64",
            DataType::I64 => "i64",
            DataType::F32 => "f32",
            DataType::F64 => "f64",
        };
        write!(f, "{}", name)
    }
}

/// Typed storage of an [`Array`](crate::containers::Array). The variant is the tag of the erased element
/// type, every access path matches on it before interpreting the values
#[derive(Debug, Clone, PartialEq)]
pub enum ArrayData {
    U8(Vec<u8>),
    I8(Vec<i8>),
    U16(Vec<u16>),
    I16(Vec<i16>),
    U32(Vec<u32>),
    I32(Vec<i32>),
    U64(Vec<u64>),
    I64(Vec<i64>),
    F32(Vec<f32>),
    F64(Vec<f64>),
}

macro_rules! with_values {
    ($data:expr, $values:ident => $body:expr) => {
        match $data {
            ArrayData::U8($values) => $body,
            ArrayData::I8($values) => $body,
            ArrayData::U16($values) => $body,
            ArrayData::I16($values) => $body,
            ArrayData::U32($values) => $body,
            ArrayData::I32($values) => $body,
            ArrayData::U64($values) => $body,
            ArrayData::I64($values) => $body,
            ArrayData::F32($values) => $body,
            ArrayData::F64($values) => $body,
        }
    };
}

impl ArrayData {
    /// Returns the `DataType` tag of this storage
    pub fn data_type(&self) -> DataType {
        match self {
            ArrayData::U8(_) => DataType::U8,
            ArrayData::I8(_) => DataType::I8,
            ArrayData::U16(_) => DataType::U16,
            ArrayData::I16(_) => DataType::I16,
            ArrayData::U32(_) => DataType::U32,
            ArrayData::I32(_) => DataType::I32,
            ArrayData::U64(_) => DataType::U64,
            ArrayData::I64(_) => DataType::I64,
            ArrayData::F32(_) => DataType::F32,
            ArrayData::F64(_) => DataType::F64,
        }
    }

    /// Number of elements in this storage
    pub fn len(&self) -> usize {
        with_values!(self, values => values.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the element at `index` converted to `f64`, regardless of the stored type. Returns `None` if
    /// `index` is out of bounds. 64-bit integers beyond 2^53 lose precision
    pub fn element_as_f64(&self, index: usize) -> Option<f64> {
        with_values!(self, values => values.get(index).map(|v| *v as f64))
    }
}

/// Trait that maps a Rust scalar type to its runtime [`DataType`] and to the matching [`ArrayData`] variant.
/// It is implemented for all supported element types and cannot be implemented outside of canopy in a
/// meaningful way, since `ArrayData` is closed
pub trait Element: Copy + PartialOrd + Debug + Send + Sync + 'static {
    /// The runtime tag for `Self`
    const DATA_TYPE: DataType;

    /// Wraps a vector of `Self` into the matching storage variant
    fn wrap(values: Vec<Self>) -> ArrayData;

    /// Returns the values of `data` if `data` stores elements of type `Self`, `None` otherwise
    fn unwrap_slice(data: &ArrayData) -> Option<&[Self]>;
}

macro_rules! impl_element {
    ($type:ty, $variant:ident) => {
        impl Element for $type {
            const DATA_TYPE: DataType = DataType::$variant;

            fn wrap(values: Vec<Self>) -> ArrayData {
                ArrayData::$variant(values)
            }

            fn unwrap_slice(data: &ArrayData) -> Option<&[Self]> {
                match data {
                    ArrayData::$variant(values) => Some(values.as_slice()),
                    _ => None,
                }
            }
        }

        const_assert_eq!(std::mem::size_of::<$type>(), DataType::$variant.size());
    };
}

impl_element! {u8, U8}
impl_element! {i8, I8}
impl_element! {u16, U16}
impl_element! {i16, I16}
impl_element! {u32, U32}
impl_element! {i32, I32}
impl_element! {u64, U64}
impl_element! {i64, I64}
impl_element! {f32, F32}
impl_element! {f64, F64}
