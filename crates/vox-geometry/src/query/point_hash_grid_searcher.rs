//! Uniform hash-grid point searcher.
//!
//! Points are bucketed by `floor(p / grid_spacing)`, and bucket coordinates
//! wrap around `resolution` before being flattened into a key, so an
//! unbounded domain maps onto a fixed table. Building is a parallel map
//! (key per point) followed by a sort by key and a serial pass that records
//! the `[start, end)` range of every non-empty bucket.

use std::ops::ControlFlow;

use glam::DVec3;
use rayon::prelude::*;
use tracing::debug;

use super::{PointNeighborSearcher3, SearchGridConfig};
use crate::error::SolverError;
use crate::execution::ExecutionContext;
use crate::validation::validate_search_grid;

/// Marks an empty bucket in the start/end tables.
const EMPTY_BUCKET: usize = usize::MAX;

/// Hash-grid neighbour searcher with a parallel build step.
///
/// `Clone` copies the indexed points, so a clone keeps answering queries
/// over the point set it was built from.
#[derive(Debug, Clone)]
pub struct PointParallelHashGridSearcher3 {
    resolution: [usize; 3],
    grid_spacing: f64,
    ctx: ExecutionContext,

    /// Indexed points, ordered by key.
    points: Vec<DVec3>,
    keys: Vec<usize>,
    /// `sorted_indices[j]` is the caller's index of `points[j]`.
    sorted_indices: Vec<usize>,
    start_index_table: Vec<usize>,
    end_index_table: Vec<usize>,
}

impl PointParallelHashGridSearcher3 {
    /// # Errors
    ///
    /// [`SolverError::InvalidInput`] if any resolution axis is zero or the
    /// spacing is not finite and positive.
    pub fn new(resolution: [usize; 3], grid_spacing: f64) -> Result<Self, SolverError> {
        Self::from_config(&SearchGridConfig {
            resolution,
            grid_spacing,
        })
    }

    pub fn from_config(config: &SearchGridConfig) -> Result<Self, SolverError> {
        validate_search_grid(config)?;
        let buckets = config.resolution.iter().product();
        Ok(Self {
            resolution: config.resolution,
            grid_spacing: config.grid_spacing,
            ctx: ExecutionContext::serial(),
            points: Vec::new(),
            keys: Vec::new(),
            sorted_indices: Vec::new(),
            start_index_table: vec![EMPTY_BUCKET; buckets],
            end_index_table: vec![EMPTY_BUCKET; buckets],
        })
    }

    /// Run the key map and sort on `ctx`.
    pub fn with_execution(mut self, ctx: ExecutionContext) -> Self {
        self.ctx = ctx;
        self
    }

    pub fn resolution(&self) -> [usize; 3] {
        self.resolution
    }

    pub fn grid_spacing(&self) -> f64 {
        self.grid_spacing
    }

    /// Indexed points in bucket order.
    pub fn points(&self) -> &[DVec3] {
        &self.points
    }

    /// Bucket key of each entry of [`points`](Self::points).
    pub fn keys(&self) -> &[usize] {
        &self.keys
    }

    pub fn sorted_indices(&self) -> &[usize] {
        &self.sorted_indices
    }

    /// First position in [`points`](Self::points) for each bucket, or
    /// `usize::MAX` when the bucket is empty.
    pub fn start_index_table(&self) -> &[usize] {
        &self.start_index_table
    }

    /// One past the last position for each bucket, or `usize::MAX`.
    pub fn end_index_table(&self) -> &[usize] {
        &self.end_index_table
    }

    /// Unwrapped bucket coordinate containing `position`.
    pub fn bucket_index(&self, position: DVec3) -> [i64; 3] {
        let b = (position / self.grid_spacing).floor();
        [b.x as i64, b.y as i64, b.z as i64]
    }

    /// Table key of a bucket coordinate, wrapping each axis.
    pub fn hash_key_from_bucket_index(&self, bucket: [i64; 3]) -> usize {
        let [rx, ry, rz] = self.resolution;
        let x = bucket[0].rem_euclid(rx as i64) as usize;
        let y = bucket[1].rem_euclid(ry as i64) as usize;
        let z = bucket[2].rem_euclid(rz as i64) as usize;
        (z * ry + y) * rx + x
    }

    pub fn hash_key_from_position(&self, position: DVec3) -> usize {
        self.hash_key_from_bucket_index(self.bucket_index(position))
    }

    /// Sorted, deduplicated keys of every bucket overlapping the sphere.
    fn nearby_keys(&self, origin: DVec3, radius: f64) -> Vec<usize> {
        let lo = ((origin - DVec3::splat(radius)) / self.grid_spacing).floor();
        let hi = ((origin + DVec3::splat(radius)) / self.grid_spacing).floor();

        // Past `resolution` buckets an axis wraps onto itself, so a wider
        // (or unbounded) span visits the whole axis.
        let mut start = [0i64; 3];
        let mut span = [0i64; 3];
        for axis in 0..3 {
            let res = self.resolution[axis] as i64;
            let width = hi[axis] - lo[axis] + 1.0;
            if width.is_finite() && width < res as f64 {
                start[axis] = (lo[axis] as i64).rem_euclid(res);
                span[axis] = width as i64;
            } else {
                span[axis] = res;
            }
        }

        let mut keys = Vec::with_capacity((span[0] * span[1] * span[2]) as usize);
        for dz in 0..span[2] {
            for dy in 0..span[1] {
                for dx in 0..span[0] {
                    keys.push(self.hash_key_from_bucket_index([
                        start[0] + dx,
                        start[1] + dy,
                        start[2] + dz,
                    ]));
                }
            }
        }
        keys.sort_unstable();
        keys.dedup();
        keys
    }

    /// Visit stored positions `j` of points within `radius` of `origin`.
    fn visit_nearby<F>(&self, origin: DVec3, radius: f64, mut visit: F)
    where
        F: FnMut(usize) -> ControlFlow<()>,
    {
        if self.points.is_empty() || radius.is_nan() || radius < 0.0 {
            return;
        }
        let radius_sq = radius * radius;

        for key in self.nearby_keys(origin, radius) {
            let start = self.start_index_table[key];
            if start == EMPTY_BUCKET {
                continue;
            }
            let end = self.end_index_table[key];
            for j in start..end {
                if self.points[j].distance_squared(origin) <= radius_sq
                    && visit(j).is_break()
                {
                    return;
                }
            }
        }
    }
}

impl PointNeighborSearcher3 for PointParallelHashGridSearcher3 {
    fn type_name(&self) -> &'static str {
        "PointParallelHashGridSearcher3"
    }

    fn build(&mut self, points: &[DVec3]) {
        self.start_index_table.fill(EMPTY_BUCKET);
        self.end_index_table.fill(EMPTY_BUCKET);
        self.points.clear();
        self.keys.clear();
        self.sorted_indices.clear();
        if points.is_empty() {
            return;
        }

        let keys: Vec<usize> = if self.ctx.is_parallel() {
            self.ctx.install(|| {
                points
                    .par_iter()
                    .map(|&p| self.hash_key_from_position(p))
                    .collect()
            })
        } else {
            points
                .iter()
                .map(|&p| self.hash_key_from_position(p))
                .collect()
        };

        let mut order: Vec<usize> = (0..points.len()).collect();
        if self.ctx.is_parallel() {
            self.ctx.install(|| order.par_sort_by_key(|&i| keys[i]));
        } else {
            order.sort_by_key(|&i| keys[i]);
        }

        self.points = order.iter().map(|&i| points[i]).collect();
        self.keys = order.iter().map(|&i| keys[i]).collect();
        self.sorted_indices = order;

        let n = self.keys.len();
        self.start_index_table[self.keys[0]] = 0;
        for i in 1..n {
            if self.keys[i] != self.keys[i - 1] {
                self.start_index_table[self.keys[i]] = i;
                self.end_index_table[self.keys[i - 1]] = i;
            }
        }
        self.end_index_table[self.keys[n - 1]] = n;

        debug!(
            "hash grid built: {} points, {} non-empty buckets of {}",
            n,
            self.start_index_table
                .iter()
                .filter(|&&s| s != EMPTY_BUCKET)
                .count(),
            self.start_index_table.len(),
        );
    }

    fn for_each_nearby_point<F>(&self, origin: DVec3, radius: f64, mut callback: F)
    where
        F: FnMut(usize, DVec3),
    {
        self.visit_nearby(origin, radius, |j| {
            callback(self.sorted_indices[j], self.points[j]);
            ControlFlow::Continue(())
        });
    }

    fn has_nearby_point(&self, origin: DVec3, radius: f64) -> bool {
        let mut found = false;
        self.visit_nearby(origin, radius, |_| {
            found = true;
            ControlFlow::Break(())
        });
        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_wrap_negative_buckets() {
        let s = PointParallelHashGridSearcher3::new([4, 4, 4], 1.0).unwrap();
        assert_eq!(s.hash_key_from_bucket_index([-1, 0, 0]), 3);
        assert_eq!(s.hash_key_from_bucket_index([4, 5, 0]), 4);
        assert_eq!(
            s.hash_key_from_position(DVec3::new(0.5, 1.5, 2.5)),
            (2 * 4 + 1) * 4
        );
    }

    #[test]
    fn tables_cover_sorted_points() {
        let points = [
            DVec3::new(0.1, 0.1, 0.1),
            DVec3::new(2.5, 0.1, 0.1),
            DVec3::new(0.2, 0.3, 0.4),
            DVec3::new(-0.5, 0.0, 0.0),
        ];
        let mut s = PointParallelHashGridSearcher3::new([4, 4, 4], 1.0).unwrap();
        s.build(&points);

        assert!(s.keys().windows(2).all(|w| w[0] <= w[1]));
        // Bucket 0 holds the two points near the origin in input order.
        assert_eq!(s.start_index_table()[0], 0);
        assert_eq!(s.end_index_table()[0], 2);
        assert_eq!(&s.sorted_indices()[..2], &[0, 2]);
        assert_eq!(s.start_index_table()[1], EMPTY_BUCKET);
        // Bucket -1 wraps to x = 3.
        assert_eq!(s.start_index_table()[3], 3);
        assert_eq!(s.end_index_table()[3], 4);
    }

    #[test]
    fn query_reports_inclusive_radius() {
        let points = [DVec3::ZERO, DVec3::new(1.0, 0.0, 0.0), DVec3::new(1.5, 0.0, 0.0)];
        let mut s = PointParallelHashGridSearcher3::new([8, 8, 8], 1.0).unwrap();
        s.build(&points);

        let mut found = Vec::new();
        s.for_each_nearby_point(DVec3::ZERO, 1.0, |i, _| found.push(i));
        found.sort_unstable();
        assert_eq!(found, vec![0, 1]);
        assert!(s.has_nearby_point(DVec3::new(3.0, 0.0, 0.0), 1.5));
        assert!(!s.has_nearby_point(DVec3::new(3.0, 0.0, 0.0), 1.4));
        assert!(!s.has_nearby_point(DVec3::ZERO, -1.0));
    }

    #[test]
    fn unbounded_radius_visits_every_bucket() {
        let points = [DVec3::ZERO, DVec3::new(2.5, -7.0, 30.0)];
        let mut s = PointParallelHashGridSearcher3::new([4, 4, 4], 1.0).unwrap();
        s.build(&points);

        for radius in [1e19, f64::INFINITY] {
            assert_eq!(s.nearby_keys(DVec3::ZERO, radius).len(), 64);
            let mut found = Vec::new();
            s.for_each_nearby_point(DVec3::ZERO, radius, |i, _| found.push(i));
            found.sort_unstable();
            assert_eq!(found, vec![0, 1]);
            assert!(s.has_nearby_point(DVec3::new(100.0, 0.0, 0.0), radius));
        }
    }

    #[test]
    fn bad_layout_rejected() {
        assert!(PointParallelHashGridSearcher3::new([0, 1, 1], 1.0).is_err());
        assert!(PointParallelHashGridSearcher3::new([1, 1, 1], f64::NAN).is_err());
    }
}
