#![warn(clippy::all)]

//! Core data structures for hierarchical point cloud stores
//!
//! canopy stores point clouds in columnar form (see the [containers](crate::containers) module) on the nodes of an
//! n-ary ownership tree (see the [tree](crate::tree) module). The `canopy-index` crate builds scoped views and
//! spatial queries on top of these structures.

pub extern crate nalgebra;

pub mod containers;
mod error;
pub use self::error::*;
/// Runtime element types of point cloud columns
pub mod layout;
/// Useful mathematical tools when working with point cloud data
pub mod math;
pub mod tree;
