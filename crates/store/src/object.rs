use std::collections::BTreeMap;

use foundation::{GeoBounds, LatLon, ObjectId};
use serde::{Deserialize, Serialize};

/// Vector geometry of a geographic object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Geometry {
    Point(LatLon),
    Line(Vec<LatLon>),
    /// Outer ring first, holes after.
    Area(Vec<Vec<LatLon>>),
}

impl Geometry {
    /// Bounding box of the geometry, `None` when it has no points.
    pub fn bounds(&self) -> Option<GeoBounds> {
        let mut points = self.points();
        let first = points.next()?;
        let mut bounds = GeoBounds::point(first);
        for p in points {
            bounds.expand(p);
        }
        Some(bounds)
    }

    /// Bounding-box center, used for marker placement.
    pub fn center(&self) -> Option<LatLon> {
        self.bounds().map(|b| b.center())
    }

    fn points(&self) -> Box<dyn Iterator<Item = LatLon> + '_> {
        match self {
            Geometry::Point(p) => Box::new(std::iter::once(*p)),
            Geometry::Line(vertices) => Box::new(vertices.iter().copied()),
            Geometry::Area(rings) => Box::new(rings.iter().flatten().copied()),
        }
    }
}

/// Edit metadata delivered with an object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObjectMeta {
    pub timestamp: Option<String>,
    pub version: Option<u32>,
    pub changeset: Option<u64>,
    pub user: Option<String>,
}

/// Summary of one relation member, delivered inline with its parent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Member {
    pub id: ObjectId,
    pub role: String,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

/// Externally sourced geographic entity. Immutable once delivered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Object {
    pub id: ObjectId,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
    #[serde(default)]
    pub meta: ObjectMeta,
    pub geometry: Geometry,
    #[serde(default)]
    pub members: Vec<Member>,
}

impl Object {
    pub fn new(id: ObjectId, geometry: Geometry) -> Self {
        Self {
            id,
            tags: BTreeMap::new(),
            meta: ObjectMeta::default(),
            geometry,
            members: Vec::new(),
        }
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(|v| v.as_str())
    }

    pub fn intersects(&self, bounds: &GeoBounds) -> bool {
        self.geometry
            .bounds()
            .map(|b| b.intersects(bounds))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::{Geometry, Object};
    use foundation::{GeoBounds, LatLon, ObjectId};
    use pretty_assertions::assert_eq;

    #[test]
    fn line_bounds_cover_all_vertices() {
        let geom = Geometry::Line(vec![
            LatLon::new(1.0, 2.0),
            LatLon::new(-1.0, 5.0),
            LatLon::new(0.5, 3.0),
        ]);
        let bounds = geom.bounds().unwrap();
        assert_eq!(bounds.min, LatLon::new(-1.0, 2.0));
        assert_eq!(bounds.max, LatLon::new(1.0, 5.0));
        assert_eq!(geom.center(), Some(LatLon::new(0.0, 3.5)));
    }

    #[test]
    fn empty_geometry_has_no_bounds() {
        assert_eq!(Geometry::Line(vec![]).bounds(), None);
        assert_eq!(Geometry::Area(vec![]).center(), None);
    }

    #[test]
    fn intersects_uses_geometry_bounds() {
        let ob = Object::new(ObjectId::node(1), Geometry::Point(LatLon::new(5.0, 5.0)));
        let near = GeoBounds::new(LatLon::new(0.0, 0.0), LatLon::new(10.0, 10.0));
        let far = GeoBounds::new(LatLon::new(20.0, 20.0), LatLon::new(30.0, 30.0));
        assert!(ob.intersects(&near));
        assert!(!ob.intersects(&far));
    }

    #[test]
    fn deserializes_wire_form() {
        let ob: Object = serde_json::from_str(
            r#"{
                "id": "n42",
                "tags": {"name": "Old Oak", "natural": "tree"},
                "geometry": {"Point": {"lat": 48.2, "lon": 16.3}},
                "members": [{"id": "n7", "role": "root", "tags": {}}]
            }"#,
        )
        .unwrap();
        assert_eq!(ob.id, ObjectId::node(42));
        assert_eq!(ob.tag("name"), Some("Old Oak"));
        assert_eq!(ob.members.len(), 1);
        assert_eq!(ob.meta.version, None);
    }
}
