use serde::{Deserialize, Serialize};

/// Geographic point in degrees.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatLon {
    pub lat: f64,
    pub lon: f64,
}

impl LatLon {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

/// Axis-aligned geographic bounding box in degrees.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoBounds {
    pub min: LatLon,
    pub max: LatLon,
}

impl GeoBounds {
    pub fn new(min: LatLon, max: LatLon) -> Self {
        Self { min, max }
    }

    /// Degenerate box covering a single point.
    pub fn point(p: LatLon) -> Self {
        Self { min: p, max: p }
    }

    pub fn contains(&self, p: LatLon) -> bool {
        p.lat >= self.min.lat && p.lat <= self.max.lat && p.lon >= self.min.lon && p.lon <= self.max.lon
    }

    pub fn intersects(&self, other: &GeoBounds) -> bool {
        !(other.min.lat > self.max.lat
            || other.max.lat < self.min.lat
            || other.min.lon > self.max.lon
            || other.max.lon < self.min.lon)
    }

    /// Grows the box to cover `p`.
    pub fn expand(&mut self, p: LatLon) {
        self.min.lat = self.min.lat.min(p.lat);
        self.min.lon = self.min.lon.min(p.lon);
        self.max.lat = self.max.lat.max(p.lat);
        self.max.lon = self.max.lon.max(p.lon);
    }

    pub fn center(&self) -> LatLon {
        LatLon::new(
            (self.min.lat + self.max.lat) / 2.0,
            (self.min.lon + self.max.lon) / 2.0,
        )
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::{GeoBounds, LatLon};

    fn bounds(min_lat: f64, min_lon: f64, max_lat: f64, max_lon: f64) -> GeoBounds {
        GeoBounds::new(LatLon::new(min_lat, min_lon), LatLon::new(max_lat, max_lon))
    }

    #[test]
    fn contains_is_inclusive() {
        let b = bounds(0.0, 0.0, 10.0, 10.0);
        assert!(b.contains(LatLon::new(0.0, 0.0)));
        assert!(b.contains(LatLon::new(10.0, 10.0)));
        assert!(!b.contains(LatLon::new(10.1, 5.0)));
    }

    #[test]
    fn intersects_detects_overlap_and_touch() {
        let a = bounds(0.0, 0.0, 10.0, 10.0);
        assert!(a.intersects(&bounds(5.0, 5.0, 15.0, 15.0)));
        assert!(a.intersects(&bounds(10.0, 10.0, 20.0, 20.0)));
        assert!(!a.intersects(&bounds(10.5, 0.0, 20.0, 10.0)));
    }

    #[test]
    fn expand_grows_to_cover_point() {
        let mut b = GeoBounds::point(LatLon::new(1.0, 2.0));
        b.expand(LatLon::new(-1.0, 4.0));
        assert_eq!(b.min, LatLon::new(-1.0, 2.0));
        assert_eq!(b.max, LatLon::new(1.0, 4.0));
        assert_eq!(b.center(), LatLon::new(0.0, 3.0));
    }
}
