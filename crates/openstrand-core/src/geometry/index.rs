//! Spatial hash for endpoint coincidence queries.

use kurbo::Point;
use std::collections::HashMap;

/// Buckets points into square cells so coincidence lookups stay linear in
/// the number of endpoints instead of quadratic.
#[derive(Debug, Clone)]
pub struct EndpointIndex<K> {
    cell_size: f64,
    buckets: HashMap<(i64, i64), Vec<(K, Point)>>,
}

impl<K: Clone> EndpointIndex<K> {
    /// Create an index whose cells are `cell_size` wide.
    pub fn new(cell_size: f64) -> Self {
        Self {
            cell_size: cell_size.max(f64::EPSILON),
            buckets: HashMap::new(),
        }
    }

    fn cell_of(&self, point: Point) -> (i64, i64) {
        (
            (point.x / self.cell_size).floor() as i64,
            (point.y / self.cell_size).floor() as i64,
        )
    }

    /// Insert a keyed point.
    pub fn insert(&mut self, key: K, point: Point) {
        let cell = self.cell_of(point);
        self.buckets.entry(cell).or_default().push((key, point));
    }

    /// All keys whose point lies within `radius` of `point`.
    pub fn within(&self, point: Point, radius: f64) -> Vec<K> {
        let (cx, cy) = self.cell_of(point);
        let reach = (radius / self.cell_size).ceil() as i64;
        let mut result = Vec::new();
        for dx in -reach..=reach {
            for dy in -reach..=reach {
                if let Some(bucket) = self.buckets.get(&(cx + dx, cy + dy)) {
                    result.extend(
                        bucket
                            .iter()
                            .filter(|(_, p)| p.distance(point) <= radius)
                            .map(|(k, _)| k.clone()),
                    );
                }
            }
        }
        result
    }

    /// Number of indexed points.
    pub fn len(&self) -> usize {
        self.buckets.values().map(Vec::len).sum()
    }

    /// Whether the index is empty.
    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }
}
