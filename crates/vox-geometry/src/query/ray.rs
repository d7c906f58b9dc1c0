use glam::DVec3;

/// Half-line `origin + t * direction`, `t >= 0`, with a unit direction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray3 {
    pub origin: DVec3,
    pub direction: DVec3,
}

impl Ray3 {
    /// The direction is normalised; a zero direction stays zero.
    pub fn new(origin: DVec3, direction: DVec3) -> Self {
        Self {
            origin,
            direction: direction.normalize_or_zero(),
        }
    }

    #[inline]
    pub fn point_at(&self, t: f64) -> DVec3 {
        self.origin + self.direction * t
    }
}

impl Default for Ray3 {
    /// Origin at zero, pointing along +x.
    fn default() -> Self {
        Self {
            origin: DVec3::ZERO,
            direction: DVec3::X,
        }
    }
}
