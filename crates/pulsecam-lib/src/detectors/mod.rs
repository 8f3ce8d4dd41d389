pub mod peaks;
pub mod snore;

pub use peaks::*;
pub use snore::*;
