pub mod conditioning;
pub mod config;
pub mod detectors;
pub mod error;
pub mod io;
pub mod metrics;
pub mod pipeline;
pub mod plot;
pub mod reconcile;
pub mod screening;
pub mod signal;

pub use config::PulsecamConfig;
pub use error::{PulsecamError, Result};
pub use pipeline::*;
pub use reconcile::*;
pub use signal::*;
