use glam::DVec3;

use super::ray::Ray3;

/// Axis-aligned box `[lower, upper]`, closed on both ends.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox3 {
    pub lower: DVec3,
    pub upper: DVec3,
}

/// Entry and exit distances of a ray through a box.
///
/// When the ray starts inside the box, `t_near` is the exit distance and
/// `t_far` is `f64::MAX`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoxRayIntersection3 {
    pub t_near: f64,
    pub t_far: f64,
}

impl BoundingBox3 {
    /// Box spanning two arbitrary corners.
    pub fn new(a: DVec3, b: DVec3) -> Self {
        Self {
            lower: a.min(b),
            upper: a.max(b),
        }
    }

    /// Inverted box that any `merge` turns into a valid one.
    pub fn empty() -> Self {
        Self {
            lower: DVec3::splat(f64::MAX),
            upper: DVec3::splat(-f64::MAX),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.lower.cmpgt(self.upper).any()
    }

    pub fn center(&self) -> DVec3 {
        (self.lower + self.upper) * 0.5
    }

    pub fn extent(&self) -> DVec3 {
        self.upper - self.lower
    }

    pub fn contains(&self, point: DVec3) -> bool {
        point.cmpge(self.lower).all() && point.cmple(self.upper).all()
    }

    /// True if the boxes share at least one point.
    pub fn overlaps(&self, other: &BoundingBox3) -> bool {
        self.lower.cmple(other.upper).all() && other.lower.cmple(self.upper).all()
    }

    pub fn merge_point(&mut self, point: DVec3) {
        self.lower = self.lower.min(point);
        self.upper = self.upper.max(point);
    }

    pub fn merge(&mut self, other: &BoundingBox3) {
        self.lower = self.lower.min(other.lower);
        self.upper = self.upper.max(other.upper);
    }

    /// Grow every face outward by `delta`.
    pub fn expand(&mut self, delta: f64) {
        self.lower -= DVec3::splat(delta);
        self.upper += DVec3::splat(delta);
    }

    pub fn intersects(&self, ray: &Ray3) -> bool {
        self.slab_interval(ray).is_some()
    }

    pub fn closest_intersection(&self, ray: &Ray3) -> Option<BoxRayIntersection3> {
        let (t_min, t_max) = self.slab_interval(ray)?;
        if self.contains(ray.origin) {
            Some(BoxRayIntersection3 {
                t_near: t_max,
                t_far: f64::MAX,
            })
        } else {
            Some(BoxRayIntersection3 {
                t_near: t_min,
                t_far: t_max,
            })
        }
    }

    /// Parameter interval `[t_min, t_max]` (with `t_min >= 0`) the ray
    /// spends inside the box.
    fn slab_interval(&self, ray: &Ray3) -> Option<(f64, f64)> {
        let mut t_min = 0.0_f64;
        let mut t_max = f64::MAX;
        let origin = ray.origin.to_array();
        let direction = ray.direction.to_array();
        let lower = self.lower.to_array();
        let upper = self.upper.to_array();

        for axis in 0..3 {
            if direction[axis] == 0.0 {
                // Parallel to this slab: inside it or never.
                if origin[axis] < lower[axis] || origin[axis] > upper[axis] {
                    return None;
                }
                continue;
            }
            let inv = 1.0 / direction[axis];
            let mut t_near = (lower[axis] - origin[axis]) * inv;
            let mut t_far = (upper[axis] - origin[axis]) * inv;
            if t_near > t_far {
                std::mem::swap(&mut t_near, &mut t_far);
            }
            t_min = t_min.max(t_near);
            t_max = t_max.min(t_far);
            if t_min > t_max {
                return None;
            }
        }
        Some((t_min, t_max))
    }
}

impl Default for BoundingBox3 {
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_box() -> BoundingBox3 {
        BoundingBox3::new(DVec3::ZERO, DVec3::ONE)
    }

    #[test]
    fn corners_are_sorted() {
        let b = BoundingBox3::new(DVec3::new(1.0, -1.0, 2.0), DVec3::new(-1.0, 1.0, 0.0));
        assert_eq!(b.lower, DVec3::new(-1.0, -1.0, 0.0));
        assert_eq!(b.upper, DVec3::new(1.0, 1.0, 2.0));
    }

    #[test]
    fn contains_is_closed() {
        let b = unit_box();
        assert!(b.contains(DVec3::ONE));
        assert!(b.contains(DVec3::ZERO));
        assert!(!b.contains(DVec3::new(1.0 + 1e-12, 0.5, 0.5)));
    }

    #[test]
    fn overlap_touching_faces() {
        let a = unit_box();
        let b = BoundingBox3::new(DVec3::new(1.0, 0.0, 0.0), DVec3::new(2.0, 1.0, 1.0));
        let c = BoundingBox3::new(DVec3::splat(1.5), DVec3::splat(2.0));
        assert!(a.overlaps(&b));
        assert!(!a.overlaps(&c));
    }

    #[test]
    fn ray_from_outside() {
        let ray = Ray3::new(DVec3::new(-1.0, 0.5, 0.5), DVec3::X);
        let hit = unit_box().closest_intersection(&ray).unwrap();
        assert!((hit.t_near - 1.0).abs() < 1e-12);
        assert!((hit.t_far - 2.0).abs() < 1e-12);
    }

    #[test]
    fn ray_from_inside_reports_exit() {
        let ray = Ray3::new(DVec3::splat(0.5), DVec3::Y);
        let hit = unit_box().closest_intersection(&ray).unwrap();
        assert!((hit.t_near - 0.5).abs() < 1e-12);
        assert_eq!(hit.t_far, f64::MAX);
    }

    #[test]
    fn ray_pointing_away_misses() {
        let ray = Ray3::new(DVec3::new(-1.0, 0.5, 0.5), -DVec3::X);
        assert!(!unit_box().intersects(&ray));
        let parallel = Ray3::new(DVec3::new(-1.0, 2.0, 0.5), DVec3::X);
        assert!(!unit_box().intersects(&parallel));
    }

    #[test]
    fn merge_from_empty() {
        let mut b = BoundingBox3::empty();
        assert!(b.is_empty());
        b.merge_point(DVec3::new(1.0, 2.0, 3.0));
        b.merge_point(DVec3::new(-1.0, 0.0, 5.0));
        assert_eq!(b.lower, DVec3::new(-1.0, 0.0, 3.0));
        assert_eq!(b.upper, DVec3::new(1.0, 2.0, 5.0));
        assert_eq!(b.center(), DVec3::new(0.0, 1.0, 4.0));
    }
}
