use std::collections::BTreeMap;

use foundation::ObjectId;

use crate::marker::MarkerSpec;
use crate::symbology::Style;

/// Handle to one concrete visual artifact owned by a render sink.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ArtifactId(pub u64);

/// Render-side port of the feature cache.
///
/// Shapes, markers and popups are created once per entry and then mutated
/// in place; view membership is toggled separately so an artifact keeps
/// its identity across style updates. After `destroy` the sink must not
/// retain the artifact.
pub trait RenderSink {
    fn create_shape(&mut self, object: ObjectId, variant: &str, style: &Style) -> ArtifactId;
    fn update_shape(&mut self, artifact: ArtifactId, style: &Style);

    fn create_marker(&mut self, object: ObjectId, spec: &MarkerSpec) -> ArtifactId;
    fn update_marker(&mut self, artifact: ArtifactId, spec: &MarkerSpec);

    fn create_popup(&mut self, object: ObjectId) -> ArtifactId;
    /// Patches popup content in place, open or not.
    fn set_popup_content(&mut self, artifact: ArtifactId, html: &str);

    fn add_to_view(&mut self, artifact: ArtifactId);
    fn remove_from_view(&mut self, artifact: ArtifactId);
    fn destroy(&mut self, artifact: ArtifactId);
}

/// What a [`MemorySink`] artifact currently is.
#[derive(Debug, Clone, PartialEq)]
pub enum SinkKind {
    Shape { variant: String, style: Style },
    Marker { spec: MarkerSpec },
    Popup { html: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct SinkRecord {
    pub object: ObjectId,
    pub kind: SinkKind,
    pub in_view: bool,
}

/// Headless sink that records artifacts as data.
///
/// Used by tests and by embeddings that drive the cache without a real
/// renderer attached.
#[derive(Debug, Default)]
pub struct MemorySink {
    next_id: u64,
    artifacts: BTreeMap<ArtifactId, SinkRecord>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    fn alloc(&mut self, record: SinkRecord) -> ArtifactId {
        let id = ArtifactId(self.next_id);
        self.next_id += 1;
        self.artifacts.insert(id, record);
        id
    }

    pub fn record(&self, artifact: ArtifactId) -> Option<&SinkRecord> {
        self.artifacts.get(&artifact)
    }

    pub fn len(&self) -> usize {
        self.artifacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }

    pub fn in_view(&self, artifact: ArtifactId) -> bool {
        self.artifacts
            .get(&artifact)
            .map(|r| r.in_view)
            .unwrap_or(false)
    }

    /// Number of artifacts currently in the view tree.
    pub fn view_len(&self) -> usize {
        self.artifacts.values().filter(|r| r.in_view).count()
    }

    /// Shape artifacts of `object` that are in view, by variant name.
    pub fn shown_variants(&self, object: ObjectId) -> Vec<&str> {
        self.artifacts
            .values()
            .filter_map(|r| match &r.kind {
                SinkKind::Shape { variant, .. } if r.object == object && r.in_view => {
                    Some(variant.as_str())
                }
                _ => None,
            })
            .collect()
    }

    pub fn popup_html(&self, object: ObjectId) -> Option<&str> {
        self.artifacts.values().find_map(|r| match &r.kind {
            SinkKind::Popup { html } if r.object == object => Some(html.as_str()),
            _ => None,
        })
    }
}

impl RenderSink for MemorySink {
    fn create_shape(&mut self, object: ObjectId, variant: &str, style: &Style) -> ArtifactId {
        self.alloc(SinkRecord {
            object,
            kind: SinkKind::Shape {
                variant: variant.to_string(),
                style: style.clone(),
            },
            in_view: false,
        })
    }

    fn update_shape(&mut self, artifact: ArtifactId, style: &Style) {
        if let Some(record) = self.artifacts.get_mut(&artifact)
            && let SinkKind::Shape { style: s, .. } = &mut record.kind
        {
            *s = style.clone();
        }
    }

    fn create_marker(&mut self, object: ObjectId, spec: &MarkerSpec) -> ArtifactId {
        self.alloc(SinkRecord {
            object,
            kind: SinkKind::Marker { spec: spec.clone() },
            in_view: false,
        })
    }

    fn update_marker(&mut self, artifact: ArtifactId, spec: &MarkerSpec) {
        if let Some(record) = self.artifacts.get_mut(&artifact)
            && let SinkKind::Marker { spec: s } = &mut record.kind
        {
            *s = spec.clone();
        }
    }

    fn create_popup(&mut self, object: ObjectId) -> ArtifactId {
        self.alloc(SinkRecord {
            object,
            kind: SinkKind::Popup {
                html: String::new(),
            },
            in_view: false,
        })
    }

    fn set_popup_content(&mut self, artifact: ArtifactId, html: &str) {
        if let Some(record) = self.artifacts.get_mut(&artifact)
            && let SinkKind::Popup { html: h } = &mut record.kind
        {
            *h = html.to_string();
        }
    }

    fn add_to_view(&mut self, artifact: ArtifactId) {
        if let Some(record) = self.artifacts.get_mut(&artifact) {
            record.in_view = true;
        }
    }

    fn remove_from_view(&mut self, artifact: ArtifactId) {
        if let Some(record) = self.artifacts.get_mut(&artifact) {
            record.in_view = false;
        }
    }

    fn destroy(&mut self, artifact: ArtifactId) {
        self.artifacts.remove(&artifact);
    }
}
