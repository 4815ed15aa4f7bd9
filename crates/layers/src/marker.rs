use foundation::LatLon;
use serde::{Deserialize, Serialize};

/// Marker content produced by evaluation, before anchor derivation.
///
/// Dimensions are the declared ones; measuring undeclared content is the
/// render sink's business, so undeclared dimensions stay 0 here.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkerContent {
    pub html: String,
    pub width: Option<f64>,
    pub height: Option<f64>,
    pub anchor_x: Option<f64>,
    pub anchor_y: Option<f64>,
    pub sign_anchor_x: f64,
    pub sign_anchor_y: f64,
    pub popup_anchor_x: f64,
    pub popup_anchor_y: f64,
}

/// Rendered icon box: size plus top-left-relative anchor point.
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct IconBox {
    pub width: f64,
    pub height: f64,
    pub anchor_x: f64,
    pub anchor_y: f64,
}

impl MarkerContent {
    /// Anchor defaults to half the declared size; explicit anchor
    /// attributes override it.
    pub fn icon_box(&self) -> IconBox {
        let width = self.width.unwrap_or(0.0);
        let height = self.height.unwrap_or(0.0);
        IconBox {
            width,
            height,
            anchor_x: self.anchor_x.unwrap_or(width / 2.0),
            anchor_y: self.anchor_y.unwrap_or(height / 2.0),
        }
    }
}

/// Offset of the sign overlay relative to the marker box, in pixels.
pub fn sign_offset(icon: &IconBox, sign_anchor_x: f64, sign_anchor_y: f64) -> (f64, f64) {
    (
        icon.anchor_x + sign_anchor_x,
        -icon.height + icon.anchor_y + sign_anchor_y,
    )
}

/// Sign overlay placed on top of a marker.
#[derive(Debug, Clone, PartialEq)]
pub struct SignSpec {
    pub html: String,
    pub offset: (f64, f64),
}

/// Fully derived marker, ready for the render sink.
#[derive(Debug, Clone, PartialEq)]
pub struct MarkerSpec {
    pub at: LatLon,
    pub html: String,
    pub icon: IconBox,
    pub sign: Option<SignSpec>,
    pub popup_anchor: (f64, f64),
}

/// Derives the sink-ready marker for an object anchored at `at`.
///
/// A sign alone still yields a marker (it is part of the marker content);
/// no content and no sign yields none.
pub fn marker_spec(
    at: LatLon,
    content: Option<&MarkerContent>,
    sign_html: Option<&str>,
) -> Option<MarkerSpec> {
    let has_content = content.map(|c| !c.html.is_empty()).unwrap_or(false);
    if !has_content && sign_html.is_none() {
        return None;
    }

    let content = content.cloned().unwrap_or_default();
    let icon = content.icon_box();
    let sign = sign_html.map(|html| SignSpec {
        html: html.to_string(),
        offset: sign_offset(&icon, content.sign_anchor_x, content.sign_anchor_y),
    });

    Some(MarkerSpec {
        at,
        html: content.html,
        icon,
        sign,
        popup_anchor: (content.popup_anchor_x, content.popup_anchor_y),
    })
}
