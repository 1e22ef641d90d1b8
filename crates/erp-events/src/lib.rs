pub mod delivery_log;
pub mod events;
pub mod logger;
pub mod traits;

pub use delivery_log::*;
pub use events::*;
pub use logger::*;
pub use traits::*;
