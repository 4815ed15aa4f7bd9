pub mod cache;
pub mod config;
pub mod coordinator;
pub mod entry;
pub mod evaluate;
pub mod events;
pub mod marker;
pub mod roster;
pub mod sink;
pub mod symbology;

pub use cache::*;
pub use config::*;
pub use coordinator::*;
pub use entry::*;
pub use evaluate::*;
pub use events::*;
pub use marker::*;
pub use roster::*;
pub use sink::*;
pub use symbology::*;
