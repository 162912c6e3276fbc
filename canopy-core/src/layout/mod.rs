//! Runtime description of the element types that an [`Array`](crate::containers::Array) can store

mod data_type;
pub use self::data_type::*;
