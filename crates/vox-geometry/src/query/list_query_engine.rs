use glam::DVec3;

use super::{
    BoundingBox3, ClosestIntersection3, IntersectionQueryEngine3, NearestNeighbor3,
    NearestNeighborQueryEngine3, Ray3,
};

/// Linear-scan query engine: every query tests every item.
///
/// No acceleration structure; useful as a correctness baseline and for small
/// item counts.
#[derive(Debug, Clone, PartialEq)]
pub struct ListQueryEngine3<T> {
    items: Vec<T>,
}

impl<T> ListQueryEngine3<T> {
    pub fn new() -> Self {
        Self { items: Vec::new() }
    }

    pub fn add(&mut self, item: T) {
        self.items.push(item);
    }

    pub fn add_all(&mut self, items: impl IntoIterator<Item = T>) {
        self.items.extend(items);
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }
}

impl<T> Default for ListQueryEngine3<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> FromIterator<T> for ListQueryEngine3<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self {
            items: iter.into_iter().collect(),
        }
    }
}

impl<T> IntersectionQueryEngine3<T> for ListQueryEngine3<T> {
    fn intersects_box<F>(&self, bbox: &BoundingBox3, test: F) -> bool
    where
        F: Fn(&T, &BoundingBox3) -> bool,
    {
        self.items.iter().any(|item| test(item, bbox))
    }

    fn intersects_ray<F>(&self, ray: &Ray3, test: F) -> bool
    where
        F: Fn(&T, &Ray3) -> bool,
    {
        self.items.iter().any(|item| test(item, ray))
    }

    fn for_each_intersecting_item_box<F, V>(&self, bbox: &BoundingBox3, test: F, mut visitor: V)
    where
        F: Fn(&T, &BoundingBox3) -> bool,
        V: FnMut(&T),
    {
        for item in self.items.iter().filter(|&item| test(item, bbox)) {
            visitor(item);
        }
    }

    fn for_each_intersecting_item_ray<F, V>(&self, ray: &Ray3, test: F, mut visitor: V)
    where
        F: Fn(&T, &Ray3) -> bool,
        V: FnMut(&T),
    {
        for item in self.items.iter().filter(|&item| test(item, ray)) {
            visitor(item);
        }
    }

    fn closest_intersection<F>(&self, ray: &Ray3, distance: F) -> Option<ClosestIntersection3<'_, T>>
    where
        F: Fn(&T, &Ray3) -> f64,
    {
        let mut best: Option<ClosestIntersection3<'_, T>> = None;
        let mut best_distance = f64::MAX;
        for item in &self.items {
            let d = distance(item, ray);
            if d < best_distance {
                best_distance = d;
                best = Some(ClosestIntersection3 { item, distance: d });
            }
        }
        best
    }
}

impl<T> NearestNeighborQueryEngine3<T> for ListQueryEngine3<T> {
    fn nearest<F>(&self, point: DVec3, distance: F) -> Option<NearestNeighbor3<'_, T>>
    where
        F: Fn(&T, DVec3) -> f64,
    {
        let mut best: Option<NearestNeighbor3<'_, T>> = None;
        for item in &self.items {
            let d = distance(item, point);
            if best.as_ref().map_or(true, |b| d < b.distance) {
                best = Some(NearestNeighbor3 { item, distance: d });
            }
        }
        best
    }
}
