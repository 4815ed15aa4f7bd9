use std::collections::BTreeMap;

use foundation::ObjectId;
use store::Object;

use crate::evaluate::PresentationResult;
use crate::sink::ArtifactId;

/// Cached wrapper around one object plus its derived render state.
///
/// Owned exclusively by the cache; artifact handles are registered into
/// the render sink's view tree only while `is_shown`.
#[derive(Debug)]
pub struct FeatureEntry {
    pub object: Object,
    /// Last evaluated presentation, `None` until the first evaluation.
    pub presentation: Option<PresentationResult>,
    /// One shape artifact per variant name ever materialized.
    pub shapes: BTreeMap<String, ArtifactId>,
    pub marker: Option<ArtifactId>,
    pub popup: Option<ArtifactId>,
    /// Variant names currently in the view.
    pub applied: Vec<String>,
    pub is_shown: bool,
}

impl FeatureEntry {
    pub fn new(object: Object) -> Self {
        Self {
            object,
            presentation: None,
            shapes: BTreeMap::new(),
            marker: None,
            popup: None,
            applied: Vec::new(),
            is_shown: false,
        }
    }

    pub fn id(&self) -> ObjectId {
        self.object.id
    }

    pub fn title(&self) -> Option<&str> {
        self.presentation.as_ref().map(|p| p.title.as_str())
    }
}
