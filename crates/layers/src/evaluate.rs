use std::collections::BTreeMap;

use foundation::{ObjectId, ObjectKind, Zoom};
use store::{Object, ObjectMeta};
use thiserror::Error;

use crate::marker::MarkerContent;
use crate::symbology::Style;

/// Summary of one relation member, exposed to evaluation.
#[derive(Debug, Clone)]
pub struct MemberContext<'a> {
    pub id: ObjectId,
    pub sequence: usize,
    pub role: &'a str,
    pub tags: &'a BTreeMap<String, String>,
}

/// Read-only snapshot of everything an evaluator may look at.
#[derive(Debug, Clone)]
pub struct EvalContext<'a> {
    pub id: ObjectId,
    pub kind: ObjectKind,
    pub tags: &'a BTreeMap<String, String>,
    pub meta: &'a ObjectMeta,
    pub members: Vec<MemberContext<'a>>,
    pub zoom: Zoom,
}

impl<'a> EvalContext<'a> {
    pub fn for_object(object: &'a Object, zoom: Zoom) -> Self {
        Self {
            id: object.id,
            kind: object.id.kind,
            tags: &object.tags,
            meta: &object.meta,
            members: object
                .members
                .iter()
                .enumerate()
                .map(|(sequence, m)| MemberContext {
                    id: m.id,
                    sequence,
                    role: m.role.as_str(),
                    tags: &m.tags,
                })
                .collect(),
            zoom,
        }
    }
}

/// Structured result of evaluating one object's presentation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PresentationResult {
    /// Every known style variant, whether currently active or not.
    pub variants: BTreeMap<String, Style>,
    /// Variant names that should be in the view right now.
    pub active: Vec<String>,
    pub marker: Option<MarkerContent>,
    /// Secondary overlay drawn on top of the marker.
    pub sign: Option<String>,
    pub title: String,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("presentation evaluation failed: {message}")]
pub struct EvalError {
    pub message: String,
}

impl EvalError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Produces presentation results from object context.
///
/// Expected to be a pure function of the context; the cache re-invokes it
/// whenever zoom or pin state changes.
pub trait PresentationEvaluator {
    fn evaluate(&self, ctx: &EvalContext<'_>) -> Result<PresentationResult, EvalError>;
}

/// Adapter letting a plain closure act as an evaluator.
pub struct FnEvaluator<F>(pub F);

impl<F> PresentationEvaluator for FnEvaluator<F>
where
    F: Fn(&EvalContext<'_>) -> Result<PresentationResult, EvalError>,
{
    fn evaluate(&self, ctx: &EvalContext<'_>) -> Result<PresentationResult, EvalError> {
        (self.0)(ctx)
    }
}

/// Minimal evaluator: one `default` variant, title from common name tags.
#[derive(Debug, Clone, Default)]
pub struct BasicEvaluator {
    pub style: Style,
    pub marker: Option<MarkerContent>,
}

impl PresentationEvaluator for BasicEvaluator {
    fn evaluate(&self, ctx: &EvalContext<'_>) -> Result<PresentationResult, EvalError> {
        let title = ctx
            .tags
            .get("name")
            .or_else(|| ctx.tags.get("operator"))
            .or_else(|| ctx.tags.get("ref"))
            .cloned()
            .unwrap_or_else(|| ctx.id.to_string());

        let mut variants = BTreeMap::new();
        variants.insert("default".to_string(), self.style.clone());

        Ok(PresentationResult {
            variants,
            active: vec!["default".to_string()],
            marker: self.marker.clone(),
            sign: None,
            title,
            body: String::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{BasicEvaluator, EvalContext, PresentationEvaluator};
    use foundation::{LatLon, ObjectId, Zoom};
    use store::{Geometry, Member, Object};

    #[test]
    fn context_snapshots_members_with_sequence() {
        let mut ob = Object::new(ObjectId::relation(5), Geometry::Line(vec![]));
        ob.members.push(Member {
            id: ObjectId::node(1),
            role: "stop".to_string(),
            tags: Default::default(),
        });
        ob.members.push(Member {
            id: ObjectId::way(2),
            role: "route".to_string(),
            tags: Default::default(),
        });

        let ctx = EvalContext::for_object(&ob, Zoom(14));
        assert_eq!(ctx.members.len(), 2);
        assert_eq!(ctx.members[1].sequence, 1);
        assert_eq!(ctx.members[1].role, "route");
        assert_eq!(ctx.zoom, Zoom(14));
    }

    #[test]
    fn basic_evaluator_titles_from_name_tags() {
        let named = Object::new(ObjectId::node(1), Geometry::Point(LatLon::new(0.0, 0.0)))
            .with_tag("name", "Fountain");
        let anonymous = Object::new(ObjectId::node(2), Geometry::Point(LatLon::new(0.0, 0.0)));

        let eval = BasicEvaluator::default();
        let ctx = EvalContext::for_object(&named, Zoom(16));
        assert_eq!(eval.evaluate(&ctx).unwrap().title, "Fountain");

        let ctx = EvalContext::for_object(&anonymous, Zoom(16));
        assert_eq!(eval.evaluate(&ctx).unwrap().title, "n2");
    }

    #[test]
    fn closures_evaluate_through_the_adapter() {
        let eval = super::FnEvaluator(|_ctx: &EvalContext<'_>| {
            Ok(super::PresentationResult::default())
        });
        let ob = Object::new(ObjectId::node(1), Geometry::Point(LatLon::new(0.0, 0.0)));
        let ctx = EvalContext::for_object(&ob, Zoom(0));
        assert!(eval.evaluate(&ctx).is_ok());
    }
}
