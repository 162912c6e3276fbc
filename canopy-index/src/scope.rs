use std::fmt::{Display, Formatter};

/// Identifies a scoped view: which point cloud, which coordinate arrays, and how many levels of the tree below
/// (and including) the starting node take part.
///
/// A `depth` of zero means unbounded, i.e. the whole subtree. Otherwise, the nodes at distance `0..depth` from
/// the starting node are included. The order of `coords` is significant: it defines the dimension order of the
/// view, so two scopes with the same coordinate names in a different order are different scopes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Scope {
    pub pcname: String,
    pub depth: usize,
    pub coords: Vec<String>,
}

impl Scope {
    /// Creates a new `Scope`
    ///
    /// ```
    /// # use canopy_index::Scope;
    /// let scope = Scope::new("3d", ["x", "y", "z"], 1);
    /// assert_eq!(r#"<Scope "3d" L1 x,y,z>"#, scope.to_string());
    /// ```
    pub fn new<P, C, I>(pcname: P, coords: I, depth: usize) -> Self
    where
        P: Into<String>,
        C: Into<String>,
        I: IntoIterator<Item = C>,
    {
        Self {
            pcname: pcname.into(),
            depth,
            coords: coords.into_iter().map(Into::into).collect(),
        }
    }

    /// Number of dimensions of views with this scope
    pub fn dimensions(&self) -> usize {
        self.coords.len()
    }

    /// Is the node at distance `distance` from the starting node part of this scope?
    pub fn includes_distance(&self, distance: usize) -> bool {
        self.depth == 0 || distance < self.depth
    }
}

impl Display for Scope {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "<Scope \"{}\" L{} {}>",
            self.pcname,
            self.depth,
            self.coords.join(",")
        )
    }
}
