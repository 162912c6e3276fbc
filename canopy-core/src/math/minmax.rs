use std::cmp;

/// Helper trait for computing minimum and maximum values of the element types that an
/// [`Array`](crate::containers::Array) can store. Floating point types are compared with `<` and `>`, so a
/// NaN on the left-hand side never wins
pub trait MinMax {
    /// Computes the infimum of this value and `other`, which for scalar types is simply the minimum
    ///
    /// # Example
    /// ```
    /// use canopy_core::math::MinMax;
    ///
    /// assert_eq!(5i32.infimum(&3i32), 3i32);
    /// assert_eq!(1.5f64.infimum(&2.0), 1.5);
    /// ```
    fn infimum(&self, other: &Self) -> Self;
    /// Computes the supremum of this value and `other`, which for scalar types is simply the maximum
    ///
    /// # Example
    /// ```
    /// use canopy_core::math::MinMax;
    ///
    /// assert_eq!(5i32.supremum(&3i32), 5i32);
    /// ```
    fn supremum(&self, other: &Self) -> Self;
}

macro_rules! impl_minmax_for_integer_type {
    ($type:tt) => {
        impl MinMax for $type {
            fn infimum(&self, other: &Self) -> Self {
                cmp::min(*self, *other)
            }

            fn supremum(&self, other: &Self) -> Self {
                cmp::max(*self, *other)
            }
        }
    };
}

macro_rules! impl_minmax_for_float_type {
    ($type:tt) => {
        impl MinMax for $type {
            fn infimum(&self, other: &Self) -> Self {
                if *self < *other {
                    *self
                } else {
                    *other
                }
            }

            fn supremum(&self, other: &Self) -> Self {
                if *self > *other {
                    *self
                } else {
                    *other
                }
            }
        }
    };
}

impl_minmax_for_integer_type! {u8}
impl_minmax_for_integer_type! {u16}
impl_minmax_for_integer_type! {u32}
impl_minmax_for_integer_type! {u64}
impl_minmax_for_integer_type! {i8}
impl_minmax_for_integer_type! {i16}
impl_minmax_for_integer_type! {i32}
impl_minmax_for_integer_type! {i64}
impl_minmax_for_float_type! {f32}
impl_minmax_for_float_type! {f64}
