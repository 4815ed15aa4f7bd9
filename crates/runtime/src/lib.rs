pub mod events;
pub mod tick;

pub use events::*;
pub use tick::*;
