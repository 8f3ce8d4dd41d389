pub mod quality;
pub mod spectrum;

pub use quality::*;
pub use spectrum::*;
