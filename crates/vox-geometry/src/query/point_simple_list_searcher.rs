use glam::DVec3;

use super::PointNeighborSearcher3;

/// Brute-force searcher: every query scans every point.
#[derive(Debug, Clone, Default)]
pub struct PointSimpleListSearcher3 {
    points: Vec<DVec3>,
}

impl PointSimpleListSearcher3 {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn points(&self) -> &[DVec3] {
        &self.points
    }
}

impl PointNeighborSearcher3 for PointSimpleListSearcher3 {
    fn type_name(&self) -> &'static str {
        "PointSimpleListSearcher3"
    }

    fn build(&mut self, points: &[DVec3]) {
        self.points.clear();
        self.points.extend_from_slice(points);
    }

    fn for_each_nearby_point<F>(&self, origin: DVec3, radius: f64, mut callback: F)
    where
        F: FnMut(usize, DVec3),
    {
        if radius.is_nan() || radius < 0.0 {
            return;
        }
        let radius_sq = radius * radius;
        for (i, &p) in self.points.iter().enumerate() {
            if p.distance_squared(origin) <= radius_sq {
                callback(i, p);
            }
        }
    }

    fn has_nearby_point(&self, origin: DVec3, radius: f64) -> bool {
        radius >= 0.0
            && self
                .points
                .iter()
                .any(|p| p.distance_squared(origin) <= radius * radius)
    }
}
