//! k-d tree over the coordinates of a [`DisjointRange`] of [`CoordinateRange`]s.
//!
//! The tree never copies coordinates, it reads them through the disjoint range and stores only permutations
//! of flat indices. To support cheap growth, a [`ScopedKdTree`] is a forest of static sub-trees, each covering
//! a contiguous interval of the flat index space. Appending a segment builds a sub-tree for the new points and
//! merges it with all trailing sub-trees that are not larger than it, so sub-tree sizes strictly decrease
//! along the forest and every point takes part in at most `O(log n)` rebuilds.

use std::{cmp::Ordering, collections::BinaryHeap};

use canopy_core::{
    containers::{
        CoordinatePoint, CoordinateRange, Cursor, DisjointRange, IndexTranslation, RandomAccess,
    },
    layout::Element,
    math::MinMax,
    Error, Result,
};
use float_ord::FloatOrd;
use log::debug;
use num_traits::Float;

/// Scalar types that a [`ScopedKdTree`] can index
pub trait KdScalar: Element + Float + MinMax {
    /// Total order key used for sorting and for comparing distances
    fn sort_key(self) -> FloatOrd<f64>;
}

impl KdScalar for f32 {
    fn sort_key(self) -> FloatOrd<f64> {
        FloatOrd(self as f64)
    }
}

impl KdScalar for f64 {
    fn sort_key(self) -> FloatOrd<f64> {
        FloatOrd(self)
    }
}

/// Build parameters of a [`ScopedKdTree`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct KdTreeParams {
    /// Maximum number of points in a leaf. Values below one are treated as one
    pub leaf_size: usize,
}

impl KdTreeParams {
    pub fn with_leaf_size(leaf_size: usize) -> Self {
        Self { leaf_size }
    }

    fn effective_leaf_size(&self) -> usize {
        self.leaf_size.max(1)
    }
}

impl Default for KdTreeParams {
    fn default() -> Self {
        Self { leaf_size: 16 }
    }
}

/// A query result: the position of the point within the disjoint range, and its Euclidean distance to the
/// query point
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor<T> {
    pub cursor: Cursor,
    pub distance: T,
}

#[derive(Debug, Clone)]
enum KdNode<T> {
    Leaf {
        begin: usize,
        end: usize,
    },
    Split {
        dim: usize,
        value: T,
        left: usize,
        right: usize,
    },
}

/// Candidate of a knn search, ordered by distance and then by flat index
#[derive(Clone, Copy)]
struct Candidate<T> {
    key: FloatOrd<f64>,
    index: usize,
    distance_squared: T,
}

impl<T: KdScalar> Candidate<T> {
    fn new(distance_squared: T, index: usize) -> Self {
        Self {
            key: distance_squared.sort_key(),
            index,
            distance_squared,
        }
    }
}

impl<T> PartialEq for Candidate<T> {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key && self.index == other.index
    }
}

impl<T> Eq for Candidate<T> {}

impl<T> PartialOrd for Candidate<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Candidate<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.key, self.index).cmp(&(other.key, other.index))
    }
}

fn coordinate<T: Element>(range: &DisjointRange<CoordinateRange>, index: usize, dim: usize) -> T {
    range.at(index).at::<T>(dim)
}

fn distance_squared<T: KdScalar>(point: &CoordinatePoint<'_>, query: &[T]) -> T {
    query
        .iter()
        .enumerate()
        .fold(T::zero(), |sum, (dim, q)| {
            let delta = point.at::<T>(dim) - *q;
            sum + delta * delta
        })
}

/// Static k-d tree over the flat indices `start..end`
#[derive(Debug, Clone)]
struct KdSubtree<T> {
    start: usize,
    end: usize,
    indices: Vec<usize>,
    nodes: Vec<KdNode<T>>,
}

impl<T: KdScalar> KdSubtree<T> {
    fn build(
        range: &DisjointRange<CoordinateRange>,
        start: usize,
        end: usize,
        dimensions: usize,
        leaf_size: usize,
    ) -> Self {
        let mut subtree = Self {
            start,
            end,
            indices: (start..end).collect(),
            nodes: vec![],
        };
        if start < end {
            subtree.build_node(range, 0, end - start, dimensions, leaf_size);
        }
        subtree
    }

    fn len(&self) -> usize {
        self.end - self.start
    }

    fn build_node(
        &mut self,
        range: &DisjointRange<CoordinateRange>,
        begin: usize,
        end: usize,
        dimensions: usize,
        leaf_size: usize,
    ) -> usize {
        let node = self.nodes.len();
        if end - begin <= leaf_size || dimensions == 0 {
            self.nodes.push(KdNode::Leaf { begin, end });
            return node;
        }

        let dim = self.widest_dimension(range, begin, end, dimensions);
        let mid = begin + (end - begin) / 2;
        // Ties are ordered by flat index, which keeps the layout deterministic for equal coordinates
        self.indices[begin..end].select_nth_unstable_by_key(mid - begin, |&index| {
            (coordinate::<T>(range, index, dim).sort_key(), index)
        });
        let value = coordinate::<T>(range, self.indices[mid], dim);

        // Placeholder, replaced once both children exist
        self.nodes.push(KdNode::Leaf { begin, end });
        let left = self.build_node(range, begin, mid, dimensions, leaf_size);
        let right = self.build_node(range, mid, end, dimensions, leaf_size);
        self.nodes[node] = KdNode::Split {
            dim,
            value,
            left,
            right,
        };
        node
    }

    /// Dimension with the largest extent among the points `indices[begin..end]`
    fn widest_dimension(
        &self,
        range: &DisjointRange<CoordinateRange>,
        begin: usize,
        end: usize,
        dimensions: usize,
    ) -> usize {
        let points = &self.indices[begin..end];
        (0..dimensions)
            .max_by_key(|&dim| {
                let first = coordinate::<T>(range, points[0], dim);
                let (min, max) = points[1..].iter().fold((first, first), |(min, max), &index| {
                    let value = coordinate::<T>(range, index, dim);
                    (min.infimum(&value), max.supremum(&value))
                });
                (max - min).sort_key()
            })
            .unwrap_or(0)
    }

    fn knn(
        &self,
        range: &DisjointRange<CoordinateRange>,
        node: usize,
        query: &[T],
        k: usize,
        heap: &mut BinaryHeap<Candidate<T>>,
    ) {
        match self.nodes[node] {
            KdNode::Leaf { begin, end } => {
                for &index in &self.indices[begin..end] {
                    let candidate = Candidate::new(distance_squared(&range.at(index), query), index);
                    if heap.len() < k {
                        heap.push(candidate);
                    } else if heap.peek().map_or(false, |worst| candidate < *worst) {
                        heap.pop();
                        heap.push(candidate);
                    }
                }
            }
            KdNode::Split {
                dim,
                value,
                left,
                right,
            } => {
                let delta = query[dim] - value;
                let (near, far) = if delta <= T::zero() {
                    (left, right)
                } else {
                    (right, left)
                };
                self.knn(range, near, query, k, heap);
                // Equal distances still have to be visited, since ties are resolved by flat index
                let visit_far = heap.len() < k
                    || heap
                        .peek()
                        .map_or(true, |worst| (delta * delta).sort_key() <= worst.key);
                if visit_far {
                    self.knn(range, far, query, k, heap);
                }
            }
        }
    }

    fn radius(
        &self,
        range: &DisjointRange<CoordinateRange>,
        node: usize,
        query: &[T],
        radius_squared: T,
        results: &mut Vec<Neighbor<T>>,
    ) {
        match self.nodes[node] {
            KdNode::Leaf { begin, end } => {
                for &index in &self.indices[begin..end] {
                    let distance_squared = distance_squared(&range.at(index), query);
                    if distance_squared <= radius_squared {
                        results.push(Neighbor {
                            cursor: Cursor::new(index),
                            distance: distance_squared.sqrt(),
                        });
                    }
                }
            }
            KdNode::Split {
                dim,
                value,
                left,
                right,
            } => {
                let delta = query[dim] - value;
                let (near, far) = if delta <= T::zero() {
                    (left, right)
                } else {
                    (right, left)
                };
                self.radius(range, near, query, radius_squared, results);
                if delta * delta <= radius_squared {
                    self.radius(range, far, query, radius_squared, results);
                }
            }
        }
    }
}

/// Spatial index over the points of a [`DisjointRange`] of [`CoordinateRange`]s. Every coordinate column must
/// store elements of type `T`.
///
/// Query results carry [`Cursor`]s into the disjoint range. Through the [`IndexTranslation`] implementation,
/// a cursor is translated into the index of the segment that contains the point (the major index) and the
/// index of the point within that segment (the minor index).
#[derive(Debug, Clone)]
pub struct ScopedKdTree<T> {
    range: DisjointRange<CoordinateRange>,
    dimensions: usize,
    params: KdTreeParams,
    forest: Vec<KdSubtree<T>>,
}

impl<T: KdScalar> ScopedKdTree<T> {
    /// Creates a new empty `ScopedKdTree` for points with the given number of `dimensions`
    pub fn new(dimensions: usize, params: KdTreeParams) -> Self {
        Self {
            range: DisjointRange::new(),
            dimensions,
            params,
            forest: vec![],
        }
    }

    /// Builds a `ScopedKdTree` over all given `segments`, in order.
    ///
    /// # Errors
    ///
    /// Fails for the same reasons as [`ScopedKdTree::append`]
    pub fn build<I: IntoIterator<Item = CoordinateRange>>(
        dimensions: usize,
        segments: I,
        params: KdTreeParams,
    ) -> Result<Self> {
        let mut tree = Self::new(dimensions, params);
        for segment in segments {
            tree.check_segment(&segment)?;
            tree.range.append(segment);
        }
        tree.rebuild();
        Ok(tree)
    }

    /// Appends `segment` and incorporates its points into the index. Points of earlier segments keep their
    /// cursors.
    ///
    /// # Errors
    ///
    /// Returns an `Error::Type` if a coordinate column of `segment` does not store elements of type `T`, and an
    /// `Error::Invariant` if `segment` has the wrong number of dimensions or a coordinate column is not
    /// one-dimensional. The tree is unchanged on error
    pub fn append(&mut self, segment: CoordinateRange) -> Result<()> {
        self.check_segment(&segment)?;
        let start = self.range.len();
        self.range.append(segment);
        let end = self.range.len();
        if start == end {
            return Ok(());
        }

        let mut subtree_start = start;
        while let Some(last) = self.forest.last() {
            if last.len() > end - subtree_start {
                break;
            }
            subtree_start = last.start;
            self.forest.pop();
        }
        if subtree_start != start {
            debug!(
                "Merging kd sub-trees over points {}..{} ({} new)",
                subtree_start,
                end,
                end - start
            );
        }
        self.forest.push(KdSubtree::build(
            &self.range,
            subtree_start,
            end,
            self.dimensions,
            self.params.effective_leaf_size(),
        ));
        Ok(())
    }

    /// Rebuilds the index as a single sub-tree over all points
    pub fn rebuild(&mut self) {
        self.forest.clear();
        if !self.range.is_empty() {
            self.forest.push(KdSubtree::build(
                &self.range,
                0,
                self.range.len(),
                self.dimensions,
                self.params.effective_leaf_size(),
            ));
        }
    }

    fn check_segment(&self, segment: &CoordinateRange) -> Result<()> {
        if segment.dimensions() != self.dimensions {
            return Err(Error::Invariant(format!(
                "Segment has {} dimensions, but the kd tree indexes {} dimensions",
                segment.dimensions(),
                self.dimensions
            )));
        }
        segment.selection().ensure_type::<T>()?;
        segment.selection().ensure_flat()
    }

    fn check_query(&self, query: &[T]) -> Result<()> {
        if query.len() != self.dimensions {
            return Err(Error::Index(format!(
                "Query point has {} dimensions, but the kd tree indexes {} dimensions",
                query.len(),
                self.dimensions
            )));
        }
        Ok(())
    }

    /// Returns up to `k` points closest to `query`, ordered by ascending distance. Points at equal distance are
    /// ordered by ascending flat index.
    ///
    /// # Errors
    ///
    /// Returns an `Error::Index` if `query` does not have one value per indexed dimension
    pub fn knn(&self, k: usize, query: &[T]) -> Result<Vec<Neighbor<T>>> {
        self.check_query(query)?;
        let k = k.min(self.len());
        if k == 0 {
            return Ok(vec![]);
        }
        let mut heap = BinaryHeap::with_capacity(k);
        for subtree in self.forest.iter().filter(|subtree| subtree.len() > 0) {
            subtree.knn(&self.range, 0, query, k, &mut heap);
        }
        Ok(heap
            .into_sorted_vec()
            .into_iter()
            .map(|candidate| Neighbor {
                cursor: Cursor::new(candidate.index),
                distance: candidate.distance_squared.sqrt(),
            })
            .collect())
    }

    /// Returns all points whose distance to `query` is at most `radius`, in no particular order.
    ///
    /// # Errors
    ///
    /// Returns an `Error::Index` if `query` does not have one value per indexed dimension
    pub fn radius(&self, radius: T, query: &[T]) -> Result<Vec<Neighbor<T>>> {
        self.check_query(query)?;
        let mut results = vec![];
        if radius < T::zero() {
            return Ok(results);
        }
        for subtree in self.forest.iter().filter(|subtree| subtree.len() > 0) {
            subtree.radius(&self.range, 0, query, radius * radius, &mut results);
        }
        Ok(results)
    }

    /// Returns the point that `cursor` refers to
    pub fn point(&self, cursor: &Cursor) -> CoordinatePoint<'_> {
        self.range.get(cursor)
    }

    /// The indexed points
    pub fn range(&self) -> &DisjointRange<CoordinateRange> {
        &self.range
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub fn params(&self) -> &KdTreeParams {
        &self.params
    }

    /// Number of indexed points
    pub fn len(&self) -> usize {
        self.range.len()
    }

    pub fn is_empty(&self) -> bool {
        self.range.is_empty()
    }

    /// Number of static sub-trees the index currently consists of
    pub fn num_subtrees(&self) -> usize {
        self.forest.len()
    }
}

impl<T> IndexTranslation for ScopedKdTree<T> {
    fn major_index(&self, cursor: &Cursor) -> usize {
        self.range.major_index(cursor)
    }

    fn minor_index(&self, cursor: &Cursor) -> usize {
        self.range.minor_index(cursor)
    }
}

#[cfg(test)]
mod tests {
    use assert_approx_eq::assert_approx_eq;
    use canopy_core::containers::{Array, Dataset};
    use itertools::Itertools;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    use super::*;

    fn segment_from_points<T: Element>(points: &[[T; 3]]) -> CoordinateRange {
        let column = |dim: usize| Array::new(points.iter().map(|p| p[dim]).collect::<Vec<_>>());
        let dataset =
            Dataset::from_arrays(vec![("x", column(0)), ("y", column(1)), ("z", column(2))])
                .unwrap();
        CoordinateRange::new(dataset.selection(&["x", "y", "z"]).unwrap())
    }

    fn random_points(rng: &mut StdRng, count: usize) -> Vec<[f64; 3]> {
        (0..count)
            .map(|_| [rng.gen_range(-1.0..1.0), rng.gen_range(-1.0..1.0), rng.gen_range(-1.0..1.0)])
            .collect()
    }

    fn brute_force_distances(points: &[[f64; 3]], query: &[f64; 3]) -> Vec<f64> {
        points
            .iter()
            .map(|p| {
                ((p[0] - query[0]).powi(2) + (p[1] - query[1]).powi(2) + (p[2] - query[2]).powi(2))
                    .sqrt()
            })
            .sorted_by_key(|d| FloatOrd(*d))
            .collect()
    }

    #[test]
    fn test_knn_matches_brute_force() {
        let mut rng = StdRng::seed_from_u64(7);
        let segments = (0..5)
            .map(|_| random_points(&mut rng, 100))
            .collect::<Vec<_>>();
        let tree = ScopedKdTree::<f64>::build(
            3,
            segments.iter().map(|s| segment_from_points(s)),
            KdTreeParams::with_leaf_size(4),
        )
        .unwrap();
        assert_eq!(500, tree.len());

        let all_points = segments.concat();
        for _ in 0..20 {
            let query = [rng.gen_range(-1.0..1.0), rng.gen_range(-1.0..1.0), rng.gen_range(-1.0..1.0)];
            let expected = brute_force_distances(&all_points, &query);
            let neighbors = tree.knn(10, &query).unwrap();
            assert_eq!(10, neighbors.len());
            for (neighbor, expected) in neighbors.iter().zip(expected.iter()) {
                assert_approx_eq!(*expected, neighbor.distance);
            }
        }
    }

    #[test]
    fn test_knn_returns_fewer_points_if_tree_is_small() {
        let tree = ScopedKdTree::<f64>::build(
            3,
            vec![segment_from_points(&[[0.0, 0.0, 0.0], [1.0, 0.0, 0.0]])],
            Default::default(),
        )
        .unwrap();
        let neighbors = tree.knn(5, &[0.1, 0.0, 0.0]).unwrap();
        assert_eq!(2, neighbors.len());
        assert_eq!(Cursor::new(0), neighbors[0].cursor);
        assert_approx_eq!(0.1, neighbors[0].distance);
        assert_approx_eq!(0.9, neighbors[1].distance);
        assert!(tree.knn(0, &[0.0, 0.0, 0.0]).unwrap().is_empty());
    }

    #[test]
    fn test_knn_ties_are_ordered_by_flat_index() {
        let points = vec![[1.0, 0.0, 0.0]; 40];
        let tree = ScopedKdTree::<f64>::build(
            3,
            vec![segment_from_points(&points), segment_from_points(&points)],
            KdTreeParams::with_leaf_size(3),
        )
        .unwrap();
        let neighbors = tree.knn(7, &[0.0, 0.0, 0.0]).unwrap();
        let indices = neighbors.iter().map(|n| n.cursor.index()).collect::<Vec<_>>();
        assert_eq!((0..7).collect::<Vec<_>>(), indices);
        assert_eq!(neighbors, tree.knn(7, &[0.0, 0.0, 0.0]).unwrap());
    }

    #[test]
    fn test_radius_matches_brute_force() {
        let mut rng = StdRng::seed_from_u64(42);
        let points = random_points(&mut rng, 300);
        let tree = ScopedKdTree::<f64>::build(
            3,
            vec![segment_from_points(&points)],
            KdTreeParams::with_leaf_size(8),
        )
        .unwrap();
        let query = [0.2, -0.1, 0.0];
        let expected = brute_force_distances(&points, &query)
            .into_iter()
            .filter(|d| *d <= 0.5)
            .count();
        let found = tree.radius(0.5, &query).unwrap();
        assert_eq!(expected, found.len());
        assert!(found.iter().all(|n| n.distance <= 0.5));
        assert!(found.iter().map(|n| n.cursor).all_unique());
        assert!(tree.radius(-1.0, &query).unwrap().is_empty());
    }

    #[test]
    fn test_major_and_minor_index() {
        let first = segment_from_points(&[[0.0, 0.0, 0.0], [5.0, 5.0, 5.0]]);
        let second = segment_from_points(&[[10.0, 0.0, 0.0], [1.0, 1.0, 1.0], [9.0, 9.0, 9.0]]);
        let tree = ScopedKdTree::<f64>::build(3, vec![first, second], Default::default()).unwrap();

        let nearest = tree.knn(1, &[1.1, 1.0, 1.0]).unwrap()[0];
        assert_eq!(1, tree.major_index(&nearest.cursor));
        assert_eq!(1, tree.minor_index(&nearest.cursor));
        assert_eq!(1.0, tree.point(&nearest.cursor).at::<f64>(2));
    }

    #[test]
    fn test_incremental_appends_merge_subtrees() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut tree = ScopedKdTree::<f64>::new(3, KdTreeParams::with_leaf_size(2));
        let mut all_points = vec![];
        for _ in 0..64 {
            let points = random_points(&mut rng, 10);
            tree.append(segment_from_points(&points)).unwrap();
            all_points.extend(points);
        }
        assert_eq!(640, tree.len());
        // 64 equally sized appends behave like a binary counter
        assert_eq!(1, tree.num_subtrees());

        tree.append(segment_from_points(&random_points(&mut rng, 10)))
            .unwrap();
        assert_eq!(2, tree.num_subtrees());

        let query = [0.0, 0.0, 0.0];
        let expected = brute_force_distances(&all_points, &query);
        let neighbors = tree.knn(5, &query).unwrap();
        for window in neighbors.windows(2) {
            assert!(window[0].distance <= window[1].distance);
        }
        assert!(neighbors[0].distance <= expected[0] + 1e-12);
    }

    #[test]
    fn test_type_mismatch_is_rejected() {
        let segment = segment_from_points(&[[1_i32, 2, 3]]);
        let mut tree = ScopedKdTree::<f64>::new(3, Default::default());
        assert!(matches!(tree.append(segment.clone()), Err(Error::Type(_))));
        assert!(tree.is_empty());
        assert!(matches!(
            ScopedKdTree::<f32>::build(3, vec![segment], Default::default()),
            Err(Error::Type(_))
        ));
    }

    #[test]
    fn test_knn_with_huge_k_returns_all_points() {
        let dataset =
            Dataset::from_arrays(vec![("x", Array::new(vec![0.0, 1.0, 2.0]))]).unwrap();
        let segment = CoordinateRange::new(dataset.selection(&["x"]).unwrap());
        let tree = ScopedKdTree::<f64>::build(1, vec![segment], Default::default()).unwrap();

        let neighbors = tree.knn(usize::MAX, &[0.5]).unwrap();
        assert_eq!(tree.len(), neighbors.len());
        let indices = neighbors.iter().map(|n| n.cursor.index()).collect::<Vec<_>>();
        assert_eq!(vec![0, 1, 2], indices);
        assert_eq!(3, tree.knn(1_000_000_000, &[0.5]).unwrap().len());
    }

    #[test]
    fn test_multidimensional_columns_are_rejected() {
        let dataset = Dataset::from_arrays(vec![(
            "x",
            Array::with_shape(vec![1.0, 2.0, 3.0, 4.0], vec![2, 2]).unwrap(),
        )])
        .unwrap();
        let segment = CoordinateRange::new(dataset.selection(&["x"]).unwrap());
        let mut tree = ScopedKdTree::<f64>::new(1, Default::default());
        assert!(matches!(tree.append(segment.clone()), Err(Error::Invariant(_))));
        assert!(tree.is_empty());
        assert!(matches!(
            ScopedKdTree::<f64>::build(1, vec![segment], Default::default()),
            Err(Error::Invariant(_))
        ));
    }

    #[test]
    fn test_dimension_mismatch() {
        let mut tree = ScopedKdTree::<f64>::new(2, Default::default());
        assert!(matches!(
            tree.append(segment_from_points(&[[1.0, 2.0, 3.0]])),
            Err(Error::Invariant(_))
        ));
        assert!(matches!(tree.knn(1, &[0.0]), Err(Error::Index(_))));
        assert!(matches!(tree.radius(1.0, &[0.0, 0.0, 0.0]), Err(Error::Index(_))));
    }

    #[test]
    fn test_f32_coordinates() {
        let segment = segment_from_points(&[[0.0_f32, 0.0, 0.0], [3.0, 4.0, 0.0]]);
        let tree = ScopedKdTree::<f32>::build(3, vec![segment], Default::default()).unwrap();
        let neighbors = tree.knn(2, &[0.0, 0.0, 0.0]).unwrap();
        assert_eq!(0.0, neighbors[0].distance);
        assert_eq!(5.0, neighbors[1].distance);
    }

    #[test]
    fn test_empty_tree() {
        let tree = ScopedKdTree::<f64>::new(3, Default::default());
        assert!(tree.knn(3, &[0.0, 0.0, 0.0]).unwrap().is_empty());
        assert!(tree.radius(1.0, &[0.0, 0.0, 0.0]).unwrap().is_empty());

        let mut tree = tree;
        tree.append(segment_from_points::<f64>(&[])).unwrap();
        assert_eq!(0, tree.num_subtrees());
    }
}
