use std::collections::BTreeMap;

use foundation::Zoom;
use serde::Deserialize;

/// Declarative layer definition: what to query per zoom band, and the
/// zoom band the layer is active in at all.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LayerConfig {
    /// Query text keyed by the zoom level it starts applying at; the
    /// highest band at or below the current zoom wins.
    pub query: BTreeMap<u8, String>,
    pub min_zoom: u8,
    pub max_zoom: Option<u8>,
}

impl Default for LayerConfig {
    fn default() -> Self {
        Self {
            query: BTreeMap::new(),
            min_zoom: 16,
            max_zoom: None,
        }
    }
}

impl LayerConfig {
    /// One query for every zoom level, active everywhere.
    pub fn single_query(ql: impl Into<String>) -> Self {
        let mut query = BTreeMap::new();
        query.insert(0, ql.into());
        Self {
            query,
            min_zoom: 0,
            max_zoom: None,
        }
    }

    pub fn in_band(&self, zoom: Zoom) -> bool {
        zoom.0 >= self.min_zoom && self.max_zoom.map(|max| zoom.0 <= max).unwrap_or(true)
    }

    pub fn query_for(&self, zoom: Zoom) -> Option<&str> {
        self.query
            .range(..=zoom.0)
            .next_back()
            .map(|(_, ql)| ql.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::LayerConfig;
    use foundation::Zoom;

    #[test]
    fn highest_band_at_or_below_zoom_wins() {
        let config: LayerConfig = serde_json::from_str(
            r#"{
                "query": {"13": "natural=tree", "16": "natural"},
                "min_zoom": 13
            }"#,
        )
        .unwrap();

        assert_eq!(config.query_for(Zoom(12)), None);
        assert_eq!(config.query_for(Zoom(13)), Some("natural=tree"));
        assert_eq!(config.query_for(Zoom(15)), Some("natural=tree"));
        assert_eq!(config.query_for(Zoom(16)), Some("natural"));
        assert_eq!(config.query_for(Zoom(19)), Some("natural"));
    }

    #[test]
    fn band_limits_are_inclusive() {
        let config = LayerConfig {
            min_zoom: 13,
            max_zoom: Some(17),
            ..LayerConfig::default()
        };
        assert!(!config.in_band(Zoom(12)));
        assert!(config.in_band(Zoom(13)));
        assert!(config.in_band(Zoom(17)));
        assert!(!config.in_band(Zoom(18)));
    }

    #[test]
    fn defaults_mirror_the_classic_layer() {
        let config = LayerConfig::default();
        assert_eq!(config.min_zoom, 16);
        assert_eq!(config.max_zoom, None);
        assert_eq!(config.query_for(Zoom(18)), None);
    }
}
