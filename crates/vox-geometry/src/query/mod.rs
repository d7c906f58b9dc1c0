//! Spatial query engines: list-based intersection / nearest-neighbour
//! queries and point neighbour searchers.

pub mod bounding_box;
pub mod list_query_engine;
pub mod point_hash_grid_searcher;
pub mod point_simple_list_searcher;
pub mod ray;

use glam::DVec3;
use serde::{Deserialize, Serialize};

pub use bounding_box::{BoundingBox3, BoxRayIntersection3};
pub use list_query_engine::ListQueryEngine3;
pub use point_hash_grid_searcher::PointParallelHashGridSearcher3;
pub use point_simple_list_searcher::PointSimpleListSearcher3;
pub use ray::Ray3;

/// Closest item hit by a ray and its distance along the ray.
#[derive(Debug)]
pub struct ClosestIntersection3<'a, T> {
    pub item: &'a T,
    pub distance: f64,
}

/// Item nearest to a query point and its distance.
#[derive(Debug)]
pub struct NearestNeighbor3<'a, T> {
    pub item: &'a T,
    pub distance: f64,
}

/// Box and ray intersection queries over a collection of items.
///
/// Geometry is supplied by the caller through test closures, so the engine
/// stays agnostic of what `T` is.
pub trait IntersectionQueryEngine3<T> {
    /// True if any item passes `test` against `bbox`.
    fn intersects_box<F>(&self, bbox: &BoundingBox3, test: F) -> bool
    where
        F: Fn(&T, &BoundingBox3) -> bool;

    /// True if any item passes `test` against `ray`.
    fn intersects_ray<F>(&self, ray: &Ray3, test: F) -> bool
    where
        F: Fn(&T, &Ray3) -> bool;

    /// Visit every item that passes `test` against `bbox`.
    fn for_each_intersecting_item_box<F, V>(&self, bbox: &BoundingBox3, test: F, visitor: V)
    where
        F: Fn(&T, &BoundingBox3) -> bool,
        V: FnMut(&T);

    /// Visit every item that passes `test` against `ray`.
    fn for_each_intersecting_item_ray<F, V>(&self, ray: &Ray3, test: F, visitor: V)
    where
        F: Fn(&T, &Ray3) -> bool,
        V: FnMut(&T);

    /// Item with the smallest hit distance. `distance` returns `f64::MAX`
    /// (or anything not below it) for a miss.
    fn closest_intersection<F>(&self, ray: &Ray3, distance: F) -> Option<ClosestIntersection3<'_, T>>
    where
        F: Fn(&T, &Ray3) -> f64;
}

/// Nearest-neighbour queries over a collection of items.
pub trait NearestNeighborQueryEngine3<T> {
    /// Item minimising `distance(item, point)`, or `None` when empty.
    fn nearest<F>(&self, point: DVec3, distance: F) -> Option<NearestNeighbor3<'_, T>>
    where
        F: Fn(&T, DVec3) -> f64;
}

/// Fixed-radius neighbour search over a point set.
pub trait PointNeighborSearcher3 {
    /// Short name for logs and CLI output.
    fn type_name(&self) -> &'static str;

    /// Index `points`, replacing any previous contents.
    fn build(&mut self, points: &[DVec3]);

    /// Call `callback(index, point)` for every indexed point within
    /// `radius` (inclusive) of `origin`. `index` refers to the slice passed
    /// to [`build`](Self::build).
    fn for_each_nearby_point<F>(&self, origin: DVec3, radius: f64, callback: F)
    where
        F: FnMut(usize, DVec3);

    /// True if any indexed point lies within `radius` of `origin`.
    fn has_nearby_point(&self, origin: DVec3, radius: f64) -> bool;
}

/// Hash-grid layout for [`PointParallelHashGridSearcher3`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchGridConfig {
    /// Buckets per axis; keys wrap around beyond this.
    pub resolution: [usize; 3],
    /// Bucket edge length. Queries are cheapest when this is about twice
    /// the search radius.
    pub grid_spacing: f64,
}

impl Default for SearchGridConfig {
    fn default() -> Self {
        Self {
            resolution: [64, 64, 64],
            grid_spacing: 1.0,
        }
    }
}
