#![warn(clippy::all)]
//! Spatial queries over hierarchies of point clouds.
//!
//! A [`Tree`](canopy_core::tree::Tree) of [`Points`] stores named point clouds in every node. For a node and
//! a [`Scope`], a [`ScopedView`] aggregates the matching point clouds of the subtree below the node and indexes
//! their coordinates in a [`ScopedKdTree`] for nearest-neighbor and radius queries. Views are cached and follow
//! structural edits of the tree.

// k-d tree over disjoint coordinate ranges, which grows with its input
pub mod kd;
pub use self::kd::*;

// Node values with named point clouds and a cache of scoped views
pub mod points;
pub use self::points::*;

mod scope;
pub use self::scope::*;

mod scoped_view;
pub use self::scoped_view::ScopedView;
