pub mod bounds;
pub mod ids;
pub mod zoom;

// Shared primitives only; anything with behavior lives upstack.
pub use bounds::*;
pub use ids::*;
pub use zoom::*;
