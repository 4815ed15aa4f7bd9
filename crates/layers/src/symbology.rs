use serde::{Deserialize, Serialize};

/// Text drawn along or next to a shape.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextStyle {
    pub content: String,
    pub repeat: bool,
    pub offset: f64,
    pub below: bool,
    pub fill: Option<String>,
    pub font_size: Option<f64>,
}

/// Structured style for one rendered shape variant.
///
/// Replaces the conventionally-prefixed `style:*` property bags of the
/// upstream configuration format: every field is explicit, and variant
/// names live in [`crate::evaluate::PresentationResult::variants`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Style {
    /// Stroke color, opaque to the core (CSS-style string).
    pub color: String,
    pub width: f64,
    pub opacity: f64,
    pub fill_color: Option<String>,
    pub fill_opacity: f64,
    /// Point rendering radius in pixels.
    pub radius: f64,
    pub dash_array: Option<String>,
    /// Render plane the shape goes to (overlay planes draw above base ones).
    pub plane: Option<String>,
    /// Perpendicular line offset in pixels.
    pub offset: f64,
    pub text: Option<TextStyle>,
}

impl Default for Style {
    fn default() -> Self {
        Self {
            color: "#3388ff".to_string(),
            width: 3.0,
            opacity: 1.0,
            fill_color: None,
            fill_opacity: 0.2,
            radius: 10.0,
            dash_array: None,
            plane: None,
            offset: 0.0,
            text: None,
        }
    }
}

impl Style {
    /// Built-in style of the `hover` variant: a fat black outline on its
    /// own overlay plane.
    pub fn hover_default() -> Self {
        Self {
            color: "black".to_string(),
            width: 3.0,
            opacity: 1.0,
            radius: 12.0,
            plane: Some("hover".to_string()),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Style;

    #[test]
    fn hover_default_targets_overlay_plane() {
        let style = Style::hover_default();
        assert_eq!(style.plane.as_deref(), Some("hover"));
        assert_eq!(style.radius, 12.0);
    }

    #[test]
    fn deserializes_sparse_definitions() {
        let style: Style = serde_json::from_str(r#"{"color": "red", "width": 1.5}"#).unwrap();
        assert_eq!(style.color, "red");
        assert_eq!(style.width, 1.5);
        assert_eq!(style.opacity, 1.0);
    }
}
