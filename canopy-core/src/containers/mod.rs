//! Columnar point cloud containers and the views through which they are accessed.
//!
//! # Data model
//!
//! The basic building block is the [`Array`], a type-erased buffer of numeric elements. Its element type is
//! one of a fixed set of primitive types (see [`DataType`](crate::layout::DataType)) and is checked on every
//! typed access. Arrays are grouped into named point clouds, called [`Dataset`]s, which uphold the invariant
//! that all of their arrays have the same major-axis size. This size is the number of points.
//!
//! # Views
//!
//! Views never copy array data, they hold `Arc`s to the arrays they reference:
//! - A [`Selection`] is an ordered subset of the arrays of a `Dataset`, chosen by name
//! - A [`CoordinatePoint`] interprets one row of a `Selection` as a coordinate with one dimension per array
//! - A [`CoordinateRange`] is the sequence of all `CoordinatePoint`s of a `Selection`
//! - A [`DisjointRange`] concatenates independently stored ranges into one flat sequence. Positions within it
//!   are addressed through [`Cursor`]s, which can be translated back into a (major, minor) index pair through
//!   the [`IndexTranslation`] trait

mod array;
pub use self::array::*;

mod dataset;
pub use self::dataset::*;

mod coordinate;
pub use self::coordinate::*;

mod disjoint;
pub use self::disjoint::*;
