use serde::{Deserialize, Serialize};

/// Map zoom level (0 = whole world).
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Zoom(pub u8);
