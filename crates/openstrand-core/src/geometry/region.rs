//! Filled regions and the boolean operations masks are built from.

use super::FLATTEN_TOLERANCE;
use geo::orient::{Direction, Orient};
use geo::{Area, BooleanOps, Contains, Coord, LineString, MultiPolygon, Polygon};
use kurbo::{BezPath, PathEl, Point, Rect};

/// Areas below this are treated as empty.
const EMPTY_AREA: f64 = 1e-6;

/// A polygon with optional holes, in canvas coordinates.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RegionPolygon {
    pub exterior: Vec<Point>,
    pub holes: Vec<Vec<Point>>,
}

/// A filled area made of zero or more polygons.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Region {
    pub polygons: Vec<RegionPolygon>,
}

impl Region {
    /// A region with no area.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Whether the region has no polygons at all.
    pub fn has_no_polygons(&self) -> bool {
        self.polygons.is_empty()
    }

    /// Axis-aligned bounds of all exterior rings.
    pub fn bounds(&self) -> Option<Rect> {
        let mut result: Option<Rect> = None;
        for point in self.polygons.iter().flat_map(|p| p.exterior.iter()) {
            let r = Rect::from_points(*point, *point);
            result = Some(match result {
                Some(acc) => acc.union(r),
                None => r,
            });
        }
        result
    }

    /// Center of the bounding rectangle.
    pub fn bounds_center(&self) -> Option<Point> {
        self.bounds().map(|b| b.center())
    }

    /// Convert to a closed path (one subpath per ring).
    pub fn to_path(&self) -> BezPath {
        let mut path = BezPath::new();
        for polygon in &self.polygons {
            append_ring(&mut path, &polygon.exterior, true);
            for hole in &polygon.holes {
                append_ring(&mut path, hole, false);
            }
        }
        path
    }

    /// Quadrilateral region from four corners in drawing order.
    pub fn from_quad(corners: [Point; 4]) -> Self {
        Self {
            polygons: vec![RegionPolygon {
                exterior: corners.to_vec(),
                holes: Vec::new(),
            }],
        }
    }

    /// Axis-aligned rectangle region.
    pub fn from_rect(rect: Rect) -> Self {
        Self::from_quad([
            Point::new(rect.x0, rect.y0),
            Point::new(rect.x1, rect.y0),
            Point::new(rect.x1, rect.y1),
            Point::new(rect.x0, rect.y1),
        ])
    }
}

fn signed_area(ring: &[Point]) -> f64 {
    let Some(&last) = ring.last() else {
        return 0.0;
    };
    let mut prev = last;
    let mut sum = 0.0;
    for &p in ring {
        sum += prev.x * p.y - p.x * prev.y;
        prev = p;
    }
    sum / 2.0
}

/// Exteriors and holes get opposite windings so nonzero fill leaves holes open.
fn append_ring(path: &mut BezPath, ring: &[Point], exterior: bool) {
    let reversed = (signed_area(ring) < 0.0) == exterior;
    let mut points: Box<dyn Iterator<Item = &Point>> =
        if reversed { Box::new(ring.iter().rev()) } else { Box::new(ring.iter()) };
    if let Some(first) = points.next() {
        path.move_to(*first);
        for p in points {
            path.line_to(*p);
        }
        path.close_path();
    }
}

/// Boolean operations on filled regions.
///
/// Masks only need this capability; the backing polygon library is an
/// implementation detail of the chosen `RegionOps`.
pub trait RegionOps: std::fmt::Debug {
    /// Build a region from the rings of a path. Overlapping rings merge.
    fn from_path(&self, path: &BezPath) -> Region;

    /// `a ∩ b`.
    fn intersect(&self, a: &Region, b: &Region) -> Region;

    /// `a \ b`.
    fn subtract(&self, a: &Region, b: &Region) -> Region;

    /// `a ∪ b`.
    fn union(&self, a: &Region, b: &Region) -> Region;

    /// Enclosed area.
    fn area(&self, region: &Region) -> f64;

    /// Whether `point` lies strictly inside the region.
    fn contains(&self, region: &Region, point: Point) -> bool;

    /// Whether the region encloses no area.
    fn is_empty(&self, region: &Region) -> bool {
        self.area(region) < EMPTY_AREA
    }
}

/// [`RegionOps`] backed by `geo`'s boolean operations.
#[derive(Debug, Clone, Copy, Default)]
pub struct GeoRegionOps;

impl GeoRegionOps {
    pub fn new() -> Self {
        Self
    }
}

fn to_coord(p: &Point) -> Coord<f64> {
    Coord { x: p.x, y: p.y }
}

fn ring_to_line_string(ring: &[Point]) -> LineString<f64> {
    // geo closes rings on construction
    LineString::from(ring.iter().map(to_coord).collect::<Vec<_>>())
}

fn line_string_to_ring(ls: &LineString<f64>) -> Vec<Point> {
    let mut ring: Vec<Point> = ls.coords().map(|c| Point::new(c.x, c.y)).collect();
    if ring.len() > 1 && ring.first() == ring.last() {
        ring.pop();
    }
    ring
}

fn to_geo(region: &Region) -> MultiPolygon<f64> {
    MultiPolygon::new(
        region
            .polygons
            .iter()
            .filter(|p| p.exterior.len() >= 3)
            .map(|p| {
                Polygon::new(
                    ring_to_line_string(&p.exterior),
                    p.holes.iter().map(|h| ring_to_line_string(h)).collect(),
                )
            })
            .collect(),
    )
}

fn from_geo(mp: &MultiPolygon<f64>) -> Region {
    let oriented = mp.orient(Direction::Default);
    Region {
        polygons: oriented
            .0
            .iter()
            .map(|poly| RegionPolygon {
                exterior: line_string_to_ring(poly.exterior()),
                holes: poly.interiors().iter().map(line_string_to_ring).collect(),
            })
            .filter(|p| p.exterior.len() >= 3)
            .collect(),
    }
}

/// Flatten a path into closed rings.
fn flatten_rings(path: &BezPath) -> Vec<Vec<Point>> {
    let mut rings = Vec::new();
    let mut current: Vec<Point> = Vec::new();
    kurbo::flatten(path.iter(), FLATTEN_TOLERANCE, |el| match el {
        PathEl::MoveTo(p) => {
            if current.len() >= 3 {
                rings.push(std::mem::take(&mut current));
            }
            current.clear();
            current.push(p);
        }
        PathEl::LineTo(p) => current.push(p),
        PathEl::ClosePath => {
            if current.len() >= 3 {
                rings.push(std::mem::take(&mut current));
            }
            current.clear();
        }
        _ => {}
    });
    if current.len() >= 3 {
        rings.push(current);
    }
    rings
}

impl RegionOps for GeoRegionOps {
    fn from_path(&self, path: &BezPath) -> Region {
        // Union ring by ring so self-overlapping stroker output collapses
        // into simple polygons.
        let mut acc = MultiPolygon::<f64>::new(Vec::new());
        for ring in flatten_rings(path) {
            let polygon = Polygon::new(ring_to_line_string(&ring), Vec::new());
            acc = acc.union(&MultiPolygon::new(vec![polygon]));
        }
        from_geo(&acc)
    }

    fn intersect(&self, a: &Region, b: &Region) -> Region {
        from_geo(&to_geo(a).intersection(&to_geo(b)))
    }

    fn subtract(&self, a: &Region, b: &Region) -> Region {
        from_geo(&to_geo(a).difference(&to_geo(b)))
    }

    fn union(&self, a: &Region, b: &Region) -> Region {
        from_geo(&to_geo(a).union(&to_geo(b)))
    }

    fn area(&self, region: &Region) -> f64 {
        to_geo(region).unsigned_area()
    }

    fn contains(&self, region: &Region, point: Point) -> bool {
        to_geo(region).contains(&geo::Point::new(point.x, point.y))
    }
}
